use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use chief_core::domain::usage::{DailyUsage, UsageRecord};
use chief_core::domain::user::{OrgId, UserId};

use super::{
    decode_err, parse_date, parse_datetime, parse_decimal, parse_uuid, RepositoryError,
    UsageRepository,
};
use crate::DbPool;

pub struct SqlUsageRepository {
    pool: DbPool,
}

impl SqlUsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<UsageRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let organization_id: Option<String> =
        row.try_get("organization_id").map_err(decode_err)?;
    let input_tokens: i64 = row.try_get("input_tokens").map_err(decode_err)?;
    let output_tokens: i64 = row.try_get("output_tokens").map_err(decode_err)?;
    let cost: String = row.try_get("cost").map_err(decode_err)?;
    let session_id: Option<String> = row.try_get("session_id").map_err(decode_err)?;
    let tool_calls: i64 = row.try_get("tool_calls").map_err(decode_err)?;
    let recorded_at: String = row.try_get("recorded_at").map_err(decode_err)?;

    Ok(UsageRecord {
        id: parse_uuid(&id)?,
        user_id: UserId(parse_uuid(&user_id)?),
        organization_id: organization_id.map(|s| parse_uuid(&s).map(OrgId)).transpose()?,
        model: row.try_get("model").map_err(decode_err)?,
        input_tokens: input_tokens.max(0) as u64,
        output_tokens: output_tokens.max(0) as u64,
        cost: parse_decimal(&cost)?,
        intent: row.try_get("intent").map_err(decode_err)?,
        session_id: session_id.map(|s| parse_uuid(&s)).transpose()?,
        tool_calls: tool_calls.clamp(0, i64::from(u32::MAX)) as u32,
        recorded_at: parse_datetime(&recorded_at)?,
    })
}

#[async_trait::async_trait]
impl UsageRepository for SqlUsageRepository {
    async fn append(&self, record: UsageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO usage_records (id, user_id, organization_id, model, input_tokens,
                                        output_tokens, cost, intent, session_id, tool_calls,
                                        recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.user_id.0.to_string())
        .bind(record.organization_id.map(|org| org.0.to_string()))
        .bind(&record.model)
        .bind(record.input_tokens as i64)
        .bind(record.output_tokens as i64)
        .bind(record.cost.to_string())
        .bind(&record.intent)
        .bind(record.session_id.map(|id| id.to_string()))
        .bind(i64::from(record.tool_calls))
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_daily(&self, delta: DailyUsage) -> Result<(), RepositoryError> {
        // Accumulating upsert: the daily row is a running total, so the
        // conflict arm adds rather than replaces. Cost is re-read because
        // SQLite cannot add decimal strings.
        let existing: Option<String> = sqlx::query(
            "SELECT cost FROM usage_daily WHERE user_id = ? AND usage_date = ?",
        )
        .bind(delta.user_id.0.to_string())
        .bind(delta.usage_date.format("%Y-%m-%d").to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(|row| row.try_get("cost").map_err(decode_err))
        .transpose()?;

        let new_cost = match existing {
            Some(raw) => parse_decimal(&raw)? + delta.cost,
            None => delta.cost,
        };

        sqlx::query(
            "INSERT INTO usage_daily (user_id, usage_date, input_tokens, output_tokens,
                                      calls, tool_calls, cost)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, usage_date) DO UPDATE SET
                 input_tokens = usage_daily.input_tokens + excluded.input_tokens,
                 output_tokens = usage_daily.output_tokens + excluded.output_tokens,
                 calls = usage_daily.calls + excluded.calls,
                 tool_calls = usage_daily.tool_calls + excluded.tool_calls,
                 cost = ?",
        )
        .bind(delta.user_id.0.to_string())
        .bind(delta.usage_date.format("%Y-%m-%d").to_string())
        .bind(delta.input_tokens as i64)
        .bind(delta.output_tokens as i64)
        .bind(delta.calls as i64)
        .bind(delta.tool_calls as i64)
        .bind(delta.cost.to_string())
        .bind(new_cost.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn month_tokens(
        &self,
        user_id: &UserId,
        month_start: NaiveDate,
    ) -> Result<u64, RepositoryError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(input_tokens + output_tokens), 0) AS total
             FROM usage_daily WHERE user_id = ? AND usage_date >= ?",
        )
        .bind(user_id.0.to_string())
        .bind(month_start.format("%Y-%m-%d").to_string())
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total").map_err(decode_err)?;
        Ok(total.max(0) as u64)
    }

    async fn daily_summary(
        &self,
        user_id: &UserId,
        since: NaiveDate,
    ) -> Result<Vec<DailyUsage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, usage_date, input_tokens, output_tokens, calls, tool_calls, cost
             FROM usage_daily WHERE user_id = ? AND usage_date >= ?
             ORDER BY usage_date ASC",
        )
        .bind(user_id.0.to_string())
        .bind(since.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let owner: String = row.try_get("user_id").map_err(decode_err)?;
                let usage_date: String = row.try_get("usage_date").map_err(decode_err)?;
                let input_tokens: i64 = row.try_get("input_tokens").map_err(decode_err)?;
                let output_tokens: i64 = row.try_get("output_tokens").map_err(decode_err)?;
                let calls: i64 = row.try_get("calls").map_err(decode_err)?;
                let tool_calls: i64 = row.try_get("tool_calls").map_err(decode_err)?;
                let cost: String = row.try_get("cost").map_err(decode_err)?;
                Ok(DailyUsage {
                    user_id: UserId(parse_uuid(&owner)?),
                    usage_date: parse_date(&usage_date)?,
                    input_tokens: input_tokens.max(0) as u64,
                    output_tokens: output_tokens.max(0) as u64,
                    calls: calls.max(0) as u64,
                    tool_calls: tool_calls.max(0) as u64,
                    cost: parse_decimal(&cost)?,
                })
            })
            .collect()
    }

    async fn org_totals(
        &self,
        organization_id: &OrgId,
        since: DateTime<Utc>,
    ) -> Result<(u64, Decimal), RepositoryError> {
        let rows = sqlx::query(
            "SELECT input_tokens, output_tokens, cost FROM usage_records
             WHERE organization_id = ? AND recorded_at >= ?",
        )
        .bind(organization_id.0.to_string())
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut tokens: u64 = 0;
        let mut cost = Decimal::ZERO;
        for row in &rows {
            let input: i64 = row.try_get("input_tokens").map_err(decode_err)?;
            let output: i64 = row.try_get("output_tokens").map_err(decode_err)?;
            let raw_cost: String = row.try_get("cost").map_err(decode_err)?;
            tokens += (input.max(0) + output.max(0)) as u64;
            cost += parse_decimal(&raw_cost)?;
        }
        Ok((tokens, cost))
    }

    async fn records_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, organization_id, model, input_tokens, output_tokens, cost,
                    intent, session_id, tool_calls, recorded_at
             FROM usage_records WHERE user_id = ? AND recorded_at >= ?
             ORDER BY recorded_at ASC",
        )
        .bind(user_id.0.to_string())
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use chief_core::domain::usage::{DailyUsage, UsageRecord};
    use chief_core::domain::user::{UserId, UserProfile};

    use super::SqlUsageRepository;
    use crate::repositories::{ProfileRepository, SqlProfileRepository, UsageRepository};
    use crate::{connect_with_settings, migrations};

    async fn pool_with_user() -> (crate::DbPool, UserId) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let user_id = UserId(Uuid::new_v4());
        SqlProfileRepository::new(pool.clone())
            .save_profile(UserProfile::new(user_id, "Max"))
            .await
            .expect("seed user");
        (pool, user_id)
    }

    fn daily(user_id: UserId, date: NaiveDate, input: u64, output: u64) -> DailyUsage {
        DailyUsage {
            user_id,
            usage_date: date,
            input_tokens: input,
            output_tokens: output,
            calls: 1,
            tool_calls: 2,
            cost: Decimal::new(5, 3),
        }
    }

    #[tokio::test]
    async fn daily_upsert_accumulates() {
        let (pool, user_id) = pool_with_user().await;
        let repo = SqlUsageRepository::new(pool);
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        repo.add_daily(daily(user_id, date, 1_000, 200)).await.expect("first");
        repo.add_daily(daily(user_id, date, 500, 100)).await.expect("second");

        let summary = repo.daily_summary(&user_id, date).await.expect("summary");
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].input_tokens, 1_500);
        assert_eq!(summary[0].output_tokens, 300);
        assert_eq!(summary[0].calls, 2);
        assert_eq!(summary[0].cost, Decimal::new(10, 3));
    }

    #[tokio::test]
    async fn month_tokens_sums_from_month_start() {
        let (pool, user_id) = pool_with_user().await;
        let repo = SqlUsageRepository::new(pool);
        let in_month = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let before = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();

        repo.add_daily(daily(user_id, in_month, 1_000, 200)).await.expect("in month");
        repo.add_daily(daily(user_id, before, 9_000, 900)).await.expect("before");

        let month_start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(repo.month_tokens(&user_id, month_start).await.expect("total"), 1_200);
    }

    #[tokio::test]
    async fn record_round_trip() {
        let (pool, user_id) = pool_with_user().await;
        let repo = SqlUsageRepository::new(pool);
        let record = UsageRecord {
            id: Uuid::new_v4(),
            user_id,
            organization_id: None,
            model: "gpt-4o-mini".to_string(),
            input_tokens: 1_200,
            output_tokens: 340,
            cost: Decimal::new(384, 6),
            intent: "query".to_string(),
            session_id: Some(Uuid::new_v4()),
            tool_calls: 3,
            recorded_at: Utc::now(),
        };
        repo.append(record.clone()).await.expect("append");

        let loaded = repo
            .records_since(&user_id, record.recorded_at - chrono::Duration::minutes(1))
            .await
            .expect("load");
        assert_eq!(loaded, vec![record]);
    }
}
