//! Deterministic parsing of user-facing date inputs.
//!
//! All tool arguments that carry a date go through [`resolve_date`], which
//! interprets relative German/English forms first and a fixed list of
//! absolute formats second, with an explicit policy for dates that land in
//! the past. Chat imports are full of historical timestamps, so the past
//! handling is the part that matters most.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// How the input was interpreted. Callers log a warning for
/// `HistoricalKept` and `BumpedToTomorrow`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateResolution {
    Relative,
    ExplicitYear,
    CurrentYearAssumed,
    HistoricalKept,
    BumpedToTomorrow,
    FallbackDefault,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub resolution: DateResolution,
}

impl ResolvedDate {
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.resolution,
            DateResolution::HistoricalKept
                | DateResolution::BumpedToTomorrow
                | DateResolution::FallbackDefault
        )
    }
}

pub const FALLBACK_DAYS: i64 = 3;

/// Resolve a user-supplied date string relative to `today` (UTC).
pub fn resolve_date(input: &str, today: NaiveDate) -> ResolvedDate {
    if let Some(days) = parse_relative(input) {
        return ResolvedDate { date: today + Duration::days(days), resolution: DateResolution::Relative };
    }

    if let Some((date, explicit_year)) = parse_absolute(input, today) {
        if date >= today {
            let resolution = if explicit_year {
                DateResolution::ExplicitYear
            } else {
                DateResolution::CurrentYearAssumed
            };
            return ResolvedDate { date, resolution };
        }
        if !explicit_year || date.year() < today.year() {
            return ResolvedDate { date, resolution: DateResolution::HistoricalKept };
        }
        return ResolvedDate {
            date: today + Duration::days(1),
            resolution: DateResolution::BumpedToTomorrow,
        };
    }

    ResolvedDate {
        date: today + Duration::days(FALLBACK_DAYS),
        resolution: DateResolution::FallbackDefault,
    }
}

/// Convenience wrapper producing a schedulable UTC instant (09:00 UTC).
pub fn resolve_due_at(input: &str, now: DateTime<Utc>) -> (DateTime<Utc>, DateResolution) {
    let resolved = resolve_date(input, now.date_naive());
    (at_due_time(resolved.date), resolved.resolution)
}

pub fn at_due_time(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0).expect("09:00 is a valid time"))
}

fn parse_relative(input: &str) -> Option<i64> {
    let text = input.trim().to_lowercase();
    match text.as_str() {
        "heute" | "today" => return Some(0),
        "morgen" | "tomorrow" => return Some(1),
        "übermorgen" | "uebermorgen" => return Some(2),
        _ => {}
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        ["in", count, unit] => unit_days(unit, count.parse().ok()?),
        [count, unit] => unit_days(unit, count.parse().ok()?),
        _ => None,
    }
}

fn unit_days(unit: &str, count: i64) -> Option<i64> {
    if count < 0 {
        return None;
    }
    if unit.starts_with("tag") || unit.starts_with("day") {
        Some(count)
    } else if unit.starts_with("woche") || unit.starts_with("week") {
        Some(count * 7)
    } else {
        None
    }
}

/// Returns the parsed date plus whether the year was given explicitly.
fn parse_absolute(input: &str, today: NaiveDate) -> Option<(NaiveDate, bool)> {
    let text = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some((date, true));
    }

    // Dotted and slashed forms are parsed by hand: chrono's %Y would accept
    // a two-digit year and skip the century pivot.
    let parts: Vec<&str> = text.trim_end_matches(['.', '/']).split(['.', '/']).collect();
    match parts.as_slice() {
        [day, month, year] => {
            let day: u32 = day.trim().parse().ok()?;
            let month: u32 = month.trim().parse().ok()?;
            let year = year.trim();
            let full_year: i32 = if year.len() <= 2 {
                let short_year: i32 = year.parse().ok()?;
                if short_year < 50 {
                    2000 + short_year
                } else {
                    1900 + short_year
                }
            } else {
                year.parse().ok()?
            };
            NaiveDate::from_ymd_opt(full_year, month, day).map(|date| (date, true))
        }
        [day, month] => {
            let day: u32 = day.trim().parse().ok()?;
            let month: u32 = month.trim().parse().ok()?;
            NaiveDate::from_ymd_opt(today.year(), month, day).map(|date| (date, false))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 16).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn relative_forms_in_both_languages() {
        assert_eq!(resolve_date("heute", today()).date, today());
        assert_eq!(resolve_date("tomorrow", today()).date, date(2025, 12, 17));
        assert_eq!(resolve_date("übermorgen", today()).date, date(2025, 12, 18));
        assert_eq!(resolve_date("in 3 Tagen", today()).date, date(2025, 12, 19));
        assert_eq!(resolve_date("in 2 weeks", today()).date, date(2025, 12, 30));
        assert_eq!(resolve_date("5 tage", today()).date, date(2025, 12, 21));
    }

    #[test]
    fn relative_distance_law() {
        // resolve("in 3 days") - resolve("tomorrow") == 2 days, at any today.
        for probe in [today(), date(2024, 2, 28), date(2026, 1, 1)] {
            let far = resolve_date("in 3 days", probe).date;
            let near = resolve_date("tomorrow", probe).date;
            assert_eq!(far - near, Duration::days(2));
        }
    }

    #[test]
    fn absolute_formats_with_explicit_year() {
        assert_eq!(resolve_date("2026-01-05", today()).date, date(2026, 1, 5));
        assert_eq!(resolve_date("05.01.2026", today()).date, date(2026, 1, 5));
        assert_eq!(resolve_date("05/01/2026", today()).date, date(2026, 1, 5));
        assert_eq!(resolve_date("2026-01-05", today()).resolution, DateResolution::ExplicitYear);
    }

    #[test]
    fn two_digit_years_pivot_at_fifty() {
        assert_eq!(resolve_date("05.01.26", today()).date, date(2026, 1, 5));
        assert_eq!(resolve_date("05.01.99", today()).date, date(1999, 1, 5));
    }

    #[test]
    fn day_month_defaults_to_current_year() {
        let resolved = resolve_date("24.12", today());
        assert_eq!(resolved.date, date(2025, 12, 24));
        assert_eq!(resolved.resolution, DateResolution::CurrentYearAssumed);
    }

    #[test]
    fn past_date_without_explicit_year_kept_as_historical() {
        let resolved = resolve_date("20.11", today());
        assert_eq!(resolved.date, date(2025, 11, 20));
        assert_eq!(resolved.resolution, DateResolution::HistoricalKept);
        assert!(resolved.is_degraded());
    }

    #[test]
    fn past_date_with_explicit_current_year_bumps_to_tomorrow() {
        let resolved = resolve_date("20.11.2025", today());
        assert_eq!(resolved.date, date(2025, 12, 17));
        assert_eq!(resolved.resolution, DateResolution::BumpedToTomorrow);
    }

    #[test]
    fn past_date_with_explicit_prior_year_kept() {
        let resolved = resolve_date("20.11.2024", today());
        assert_eq!(resolved.date, date(2024, 11, 20));
        assert_eq!(resolved.resolution, DateResolution::HistoricalKept);
    }

    #[test]
    fn garbage_falls_back_to_three_days() {
        let resolved = resolve_date("irgendwann mal", today());
        assert_eq!(resolved.date, date(2025, 12, 19));
        assert_eq!(resolved.resolution, DateResolution::FallbackDefault);
    }

    #[test]
    fn due_time_is_nine_utc() {
        let (due, _) = resolve_due_at("morgen", Utc.with_ymd_and_hms(2025, 12, 16, 22, 0, 0).unwrap());
        assert_eq!(due, Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap());
    }
}
