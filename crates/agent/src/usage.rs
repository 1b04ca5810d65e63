//! Per-call usage accounting and the aggregations built on top of it.
//!
//! Every provider call writes one append-only record and accumulates into
//! the (owner, date) daily row. The aggregations are pure reductions over
//! those rows.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use chief_core::domain::usage::{DailyUsage, UsageRecord};
use chief_core::{OrgId, UserId, UserProfile};
use chief_db::repositories::{RepositoryError, UsageRepository};
use chief_llm::{pricing, TokenUsage};

#[derive(Clone)]
pub struct UsageTracker {
    usage: Arc<dyn UsageRepository>,
}

/// Cost and savings aggregate over a window of per-call records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SavingsReport {
    pub calls: u64,
    pub tokens: u64,
    pub actual_cost: Decimal,
    pub all_top_cost: Decimal,
}

impl SavingsReport {
    pub fn saved(&self) -> Decimal {
        self.all_top_cost - self.actual_cost
    }
}

impl UsageTracker {
    pub fn new(usage: Arc<dyn UsageRepository>) -> Self {
        Self { usage }
    }

    /// Record one provider call: append-only row plus the daily upsert.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_call(
        &self,
        profile: &UserProfile,
        model: &str,
        intent: &str,
        session_id: Option<Uuid>,
        tool_calls: u32,
        usage: TokenUsage,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let cost = pricing::cost(model, usage);
        self.usage
            .append(UsageRecord {
                id: Uuid::new_v4(),
                user_id: profile.id,
                organization_id: profile.organization_id,
                model: model.to_string(),
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cost,
                intent: intent.to_string(),
                session_id,
                tool_calls,
                recorded_at: now,
            })
            .await?;
        self.usage
            .add_daily(DailyUsage {
                user_id: profile.id,
                usage_date: now.date_naive(),
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                calls: 1,
                tool_calls: u64::from(tool_calls),
                cost,
            })
            .await
    }

    pub async fn daily_summary(
        &self,
        user_id: &UserId,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyUsage>, RepositoryError> {
        let since = (now - Duration::days(days)).date_naive();
        self.usage.daily_summary(user_id, since).await
    }

    pub async fn org_totals(
        &self,
        organization_id: &OrgId,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<(u64, Decimal), RepositoryError> {
        self.usage.org_totals(organization_id, now - Duration::days(days)).await
    }

    /// What the window actually cost versus what it would have cost had
    /// every call gone to `top_model`.
    pub async fn savings(
        &self,
        user_id: &UserId,
        top_model: &str,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<SavingsReport, RepositoryError> {
        let records = self.usage.records_since(user_id, now - Duration::days(days)).await?;
        let mut report = SavingsReport::default();
        for record in records {
            let usage = TokenUsage {
                input_tokens: record.input_tokens,
                output_tokens: record.output_tokens,
            };
            report.calls += 1;
            report.tokens += usage.total();
            report.actual_cost += record.cost;
            report.all_top_cost += pricing::cost(top_model, usage);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chief_db::repositories::InMemoryUsageRepository;

    use super::*;

    fn profile() -> UserProfile {
        UserProfile::new(UserId(Uuid::new_v4()), "Max Mustermann")
    }

    #[tokio::test]
    async fn record_call_feeds_daily_and_per_call_rows() {
        let repo = Arc::new(InMemoryUsageRepository::default());
        let tracker = UsageTracker::new(repo.clone());
        let profile = profile();
        let now = Utc::now();
        let usage = TokenUsage { input_tokens: 1_000, output_tokens: 200 };

        tracker.record_call(&profile, "gpt-4o-mini", "ACTION", None, 2, usage, now).await.unwrap();
        tracker.record_call(&profile, "gpt-4o-mini", "ACTION_followup", None, 0, usage, now)
            .await
            .unwrap();

        let days = tracker.daily_summary(&profile.id, 1, now).await.unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].total_tokens(), 2_400);
        assert_eq!(days[0].calls, 2);
        assert_eq!(days[0].tool_calls, 2);

        let records = repo.records_since(&profile.id, now - Duration::hours(1)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].intent, "ACTION");
    }

    #[tokio::test]
    async fn savings_compare_actual_against_top_tier() {
        let repo = Arc::new(InMemoryUsageRepository::default());
        let tracker = UsageTracker::new(repo);
        let profile = profile();
        let now = Utc::now();
        let usage = TokenUsage { input_tokens: 100_000, output_tokens: 10_000 };

        tracker.record_call(&profile, "gpt-4o-mini", "CHAT", None, 0, usage, now).await.unwrap();

        let report = tracker.savings(&profile.id, "gpt-4o", 7, now).await.unwrap();
        assert_eq!(report.calls, 1);
        assert_eq!(report.tokens, 110_000);
        assert!(report.saved() > Decimal::ZERO);
    }

    #[tokio::test]
    async fn top_tier_calls_save_nothing() {
        let repo = Arc::new(InMemoryUsageRepository::default());
        let tracker = UsageTracker::new(repo);
        let profile = profile();
        let now = Utc::now();
        let usage = TokenUsage { input_tokens: 5_000, output_tokens: 500 };

        tracker.record_call(&profile, "gpt-4o", "CHAT", None, 0, usage, now).await.unwrap();

        let report = tracker.savings(&profile.id, "gpt-4o", 7, now).await.unwrap();
        assert_eq!(report.saved(), Decimal::ZERO);
    }
}
