//! Monthly token quota gate.
//!
//! Checked before the first provider call of a request and again before
//! every follow-up call, so a runaway tool loop terminates at the next
//! check instead of burning through the budget.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use chief_core::{PlanTier, UserProfile};
use chief_db::repositories::{RepositoryError, UsageRepository};

/// Over-limit verdict. Carries everything the fixed user-facing message
/// and the response flags need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimitReached {
    pub used: u64,
    pub limit: u64,
    pub suggested_tier: Option<PlanTier>,
}

impl LimitReached {
    /// The fixed German reply sent instead of a completion.
    pub fn user_message(&self) -> String {
        let mut message = format!(
            "⚠️ Dein monatliches Kontingent ist aufgebraucht: {} von {} Tokens verwendet. \
             Am Monatsersten geht es automatisch weiter.",
            self.used, self.limit
        );
        if let Some(tier) = self.suggested_tier {
            message.push_str(&format!(
                " Mit dem {}-Plan bekommst du sofort wieder Luft.",
                capitalized(tier.as_str())
            ));
        }
        message
    }
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[derive(Clone)]
pub struct QuotaGate {
    usage: Arc<dyn UsageRepository>,
}

impl QuotaGate {
    pub fn new(usage: Arc<dyn UsageRepository>) -> Self {
        Self { usage }
    }

    /// `Some(LimitReached)` when the month-to-date total meets or exceeds
    /// the tier ceiling.
    pub async fn check(
        &self,
        profile: &UserProfile,
        today: NaiveDate,
    ) -> Result<Option<LimitReached>, RepositoryError> {
        let month_start = today.with_day0(0).unwrap_or(today);
        let used = self.usage.month_tokens(&profile.id, month_start).await?;
        let limit = profile.plan_tier.monthly_token_limit();
        if used >= limit {
            return Ok(Some(LimitReached {
                used,
                limit,
                suggested_tier: profile.plan_tier.suggested_upgrade(),
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use chief_core::domain::usage::DailyUsage;
    use chief_core::UserId;
    use chief_db::repositories::InMemoryUsageRepository;

    use super::*;

    fn profile(tier: PlanTier) -> UserProfile {
        let mut profile = UserProfile::new(UserId(Uuid::new_v4()), "Max Mustermann");
        profile.plan_tier = tier;
        profile
    }

    async fn burn(repo: &InMemoryUsageRepository, user: &UserId, tokens: u64) {
        repo.add_daily(DailyUsage {
            user_id: *user,
            usage_date: Utc::now().date_naive(),
            input_tokens: tokens,
            output_tokens: 0,
            calls: 1,
            tool_calls: 0,
            cost: Decimal::ZERO,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn under_limit_passes() {
        let usage = Arc::new(InMemoryUsageRepository::default());
        let profile = profile(PlanTier::Starter);
        burn(&usage, &profile.id, 100).await;

        let gate = QuotaGate::new(usage);
        let verdict = gate.check(&profile, Utc::now().date_naive()).await.unwrap();
        assert!(verdict.is_none());
    }

    #[tokio::test]
    async fn over_limit_carries_counters_and_upgrade() {
        let usage = Arc::new(InMemoryUsageRepository::default());
        let profile = profile(PlanTier::Starter);
        burn(&usage, &profile.id, 600_000).await;

        let gate = QuotaGate::new(usage);
        let verdict = gate.check(&profile, Utc::now().date_naive()).await.unwrap().unwrap();
        assert_eq!(verdict.used, 600_000);
        assert_eq!(verdict.limit, 500_000);
        assert_eq!(verdict.suggested_tier, Some(PlanTier::Pro));
        assert!(verdict.user_message().starts_with("⚠️"));
        assert!(verdict.user_message().contains("600000"));
    }

    #[tokio::test]
    async fn elite_over_limit_has_no_upgrade_hint() {
        let usage = Arc::new(InMemoryUsageRepository::default());
        let profile = profile(PlanTier::Elite);
        burn(&usage, &profile.id, 11_000_000).await;

        let gate = QuotaGate::new(usage);
        let verdict = gate.check(&profile, Utc::now().date_naive()).await.unwrap().unwrap();
        assert_eq!(verdict.suggested_tier, None);
        assert!(!verdict.user_message().contains("-Plan"));
    }
}
