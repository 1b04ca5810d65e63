use chrono::{DateTime, Utc};
use sqlx::Row;

use chief_core::channel::Channel;
use chief_core::domain::followup::{
    FlowTag, FollowUpId, FollowUpStatus, FollowUpSuggestion, MessageCategory, Priority,
};
use chief_core::domain::lead::LeadId;
use chief_core::domain::user::UserId;

use super::{decode_err, parse_datetime, parse_uuid, FollowUpRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFollowUpRepository {
    pool: DbPool,
}

impl SqlFollowUpRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const FOLLOW_UP_COLUMNS: &str = "id, user_id, lead_id, flow, stage, template_key, channel,
       suggested_message, reason, due_at, status, previous_message, previous_category,
       priority, created_at";

fn parse_channel_opt(raw: Option<String>) -> Option<Channel> {
    raw.and_then(|s| serde_json::from_value(serde_json::Value::String(s)).ok())
}

fn channel_as_str(channel: &Channel) -> String {
    match serde_json::to_value(channel) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "unknown".to_string(),
    }
}

fn row_to_suggestion(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<FollowUpSuggestion, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let lead_id: String = row.try_get("lead_id").map_err(decode_err)?;
    let flow: String = row.try_get("flow").map_err(decode_err)?;
    let stage: i64 = row.try_get("stage").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let previous_category: Option<String> =
        row.try_get("previous_category").map_err(decode_err)?;
    let priority: String = row.try_get("priority").map_err(decode_err)?;
    let due_at: String = row.try_get("due_at").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(FollowUpSuggestion {
        id: FollowUpId(parse_uuid(&id)?),
        user_id: UserId(parse_uuid(&user_id)?),
        lead_id: LeadId(parse_uuid(&lead_id)?),
        flow: flow.parse::<FlowTag>().map_err(decode_err)?,
        stage: stage.max(0) as u32,
        template_key: row.try_get("template_key").map_err(decode_err)?,
        channel: parse_channel_opt(row.try_get("channel").map_err(decode_err)?),
        suggested_message: row.try_get("suggested_message").map_err(decode_err)?,
        reason: row.try_get("reason").map_err(decode_err)?,
        due_at: parse_datetime(&due_at)?,
        status: status.parse::<FollowUpStatus>().map_err(decode_err)?,
        previous_message: row.try_get("previous_message").map_err(decode_err)?,
        previous_category: previous_category
            .map(|s| s.parse::<MessageCategory>().map_err(decode_err))
            .transpose()?,
        priority: priority.parse::<Priority>().map_err(decode_err)?,
        created_at: parse_datetime(&created_at)?,
    })
}

#[async_trait::async_trait]
impl FollowUpRepository for SqlFollowUpRepository {
    async fn find_by_id(
        &self,
        user_id: &UserId,
        id: &FollowUpId,
    ) -> Result<Option<FollowUpSuggestion>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {FOLLOW_UP_COLUMNS} FROM follow_up_suggestions
             WHERE user_id = ? AND id = ?"
        ))
        .bind(user_id.0.to_string())
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_suggestion(r)?)),
            None => Ok(None),
        }
    }

    async fn find_pending_for_lead(
        &self,
        user_id: &UserId,
        lead_id: &LeadId,
    ) -> Result<Option<FollowUpSuggestion>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {FOLLOW_UP_COLUMNS} FROM follow_up_suggestions
             WHERE user_id = ? AND lead_id = ? AND status = 'pending'"
        ))
        .bind(user_id.0.to_string())
        .bind(lead_id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_suggestion(r)?)),
            None => Ok(None),
        }
    }

    async fn list_due_between(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FollowUpSuggestion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {FOLLOW_UP_COLUMNS} FROM follow_up_suggestions
             WHERE user_id = ? AND status = 'pending' AND due_at >= ? AND due_at < ?
             ORDER BY due_at ASC"
        ))
        .bind(user_id.0.to_string())
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_suggestion).collect()
    }

    async fn list_pending(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<FollowUpSuggestion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {FOLLOW_UP_COLUMNS} FROM follow_up_suggestions
             WHERE user_id = ? AND status = 'pending'
             ORDER BY due_at ASC LIMIT ?"
        ))
        .bind(user_id.0.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_suggestion).collect()
    }

    async fn save(&self, suggestion: FollowUpSuggestion) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO follow_up_suggestions (id, user_id, lead_id, flow, stage,
                                                template_key, channel, suggested_message,
                                                reason, due_at, status, previous_message,
                                                previous_category, priority, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 flow = excluded.flow,
                 stage = excluded.stage,
                 template_key = excluded.template_key,
                 channel = excluded.channel,
                 suggested_message = excluded.suggested_message,
                 reason = excluded.reason,
                 due_at = excluded.due_at,
                 status = excluded.status,
                 previous_message = excluded.previous_message,
                 previous_category = excluded.previous_category,
                 priority = excluded.priority",
        )
        .bind(suggestion.id.0.to_string())
        .bind(suggestion.user_id.0.to_string())
        .bind(suggestion.lead_id.0.to_string())
        .bind(suggestion.flow.as_str())
        .bind(i64::from(suggestion.stage))
        .bind(&suggestion.template_key)
        .bind(suggestion.channel.as_ref().map(channel_as_str))
        .bind(&suggestion.suggested_message)
        .bind(&suggestion.reason)
        .bind(suggestion.due_at.to_rfc3339())
        .bind(suggestion.status.as_str())
        .bind(&suggestion.previous_message)
        .bind(suggestion.previous_category.map(|category| category.as_str()))
        .bind(suggestion.priority.as_str())
        .bind(suggestion.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_status(
        &self,
        user_id: &UserId,
        id: &FollowUpId,
        status: FollowUpStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE follow_up_suggestions SET status = ? WHERE user_id = ? AND id = ?",
        )
        .bind(status.as_str())
        .bind(user_id.0.to_string())
        .bind(id.0.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use chief_core::domain::followup::{FollowUpStatus, FollowUpSuggestion};
    use chief_core::domain::lead::Lead;
    use chief_core::domain::user::{UserId, UserProfile};

    use super::SqlFollowUpRepository;
    use crate::repositories::{
        FollowUpRepository, LeadRepository, ProfileRepository, SqlLeadRepository,
        SqlProfileRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn seeded() -> (crate::DbPool, UserId, Lead) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let user_id = UserId(Uuid::new_v4());
        SqlProfileRepository::new(pool.clone())
            .save_profile(UserProfile::new(user_id, "Max"))
            .await
            .expect("seed user");
        let lead = Lead::new(user_id, "Lisa Huber");
        SqlLeadRepository::new(pool.clone()).save(lead.clone()).await.expect("seed lead");
        (pool, user_id, lead)
    }

    #[tokio::test]
    async fn pending_suggestion_round_trip() {
        let (pool, user_id, lead) = seeded().await;
        let repo = SqlFollowUpRepository::new(pool);
        let due = Utc::now() + Duration::days(3);
        let suggestion =
            FollowUpSuggestion::manual(user_id, lead.id, due, Some("nachfassen".to_string()));

        repo.save(suggestion.clone()).await.expect("save");
        let loaded = repo
            .find_pending_for_lead(&user_id, &lead.id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(loaded, suggestion);
    }

    #[tokio::test]
    async fn second_pending_for_same_lead_hits_unique_index() {
        let (pool, user_id, lead) = seeded().await;
        let repo = SqlFollowUpRepository::new(pool);
        let due = Utc::now() + Duration::days(3);

        repo.save(FollowUpSuggestion::manual(user_id, lead.id, due, None))
            .await
            .expect("first");
        let error = repo
            .save(FollowUpSuggestion::manual(user_id, lead.id, due, None))
            .await
            .expect_err("duplicate");
        assert!(error.is_unique_violation());
    }

    #[tokio::test]
    async fn sent_suggestion_frees_the_pending_slot() {
        let (pool, user_id, lead) = seeded().await;
        let repo = SqlFollowUpRepository::new(pool);
        let due = Utc::now() + Duration::days(3);

        let first = FollowUpSuggestion::manual(user_id, lead.id, due, None);
        repo.save(first.clone()).await.expect("first");
        repo.set_status(&user_id, &first.id, FollowUpStatus::Sent).await.expect("mark sent");

        repo.save(FollowUpSuggestion::manual(user_id, lead.id, due, None))
            .await
            .expect("second pending after first sent");
    }

    #[tokio::test]
    async fn due_window_is_half_open() {
        let (pool, user_id, lead) = seeded().await;
        let repo = SqlFollowUpRepository::new(pool);
        let now = Utc::now();
        let due = now + Duration::days(2);
        repo.save(FollowUpSuggestion::manual(user_id, lead.id, due, None))
            .await
            .expect("save");

        let hits = repo
            .list_due_between(&user_id, now, now + Duration::days(3))
            .await
            .expect("window");
        assert_eq!(hits.len(), 1);

        let misses = repo
            .list_due_between(&user_id, now, now + Duration::days(1))
            .await
            .expect("window");
        assert!(misses.is_empty());
    }
}
