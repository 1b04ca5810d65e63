use sqlx::Row;

use chief_core::channel::Channel;
use chief_core::domain::interaction::{InteractionId, InteractionLog, Outcome};
use chief_core::domain::lead::LeadId;
use chief_core::domain::user::UserId;

use super::{decode_err, parse_datetime, parse_uuid, InteractionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInteractionRepository {
    pool: DbPool,
}

impl SqlInteractionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const INTERACTION_COLUMNS: &str =
    "id, user_id, lead_id, channel, summary, details, outcome, sentiment, occurred_at, created_at";

fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> Result<InteractionLog, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let lead_id: String = row.try_get("lead_id").map_err(decode_err)?;
    let channel: Option<String> = row.try_get("channel").map_err(decode_err)?;
    let details_json: String = row.try_get("details").map_err(decode_err)?;
    let outcome: Option<String> = row.try_get("outcome").map_err(decode_err)?;
    let occurred_at: String = row.try_get("occurred_at").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(InteractionLog {
        id: InteractionId(parse_uuid(&id)?),
        user_id: UserId(parse_uuid(&user_id)?),
        lead_id: LeadId(parse_uuid(&lead_id)?),
        channel: channel
            .and_then(|s| serde_json::from_value::<Channel>(serde_json::Value::String(s)).ok()),
        summary: row.try_get("summary").map_err(decode_err)?,
        details: serde_json::from_str(&details_json).map_err(decode_err)?,
        outcome: outcome.map(|s| s.parse::<Outcome>().map_err(decode_err)).transpose()?,
        sentiment: row.try_get("sentiment").map_err(decode_err)?,
        occurred_at: parse_datetime(&occurred_at)?,
        created_at: parse_datetime(&created_at)?,
    })
}

#[async_trait::async_trait]
impl InteractionRepository for SqlInteractionRepository {
    async fn append(&self, log: InteractionLog) -> Result<(), RepositoryError> {
        let details_json = serde_json::to_string(&log.details).map_err(decode_err)?;
        let channel = log.channel.as_ref().map(|c| match serde_json::to_value(c) {
            Ok(serde_json::Value::String(s)) => s,
            _ => "unknown".to_string(),
        });

        sqlx::query(
            "INSERT INTO interaction_logs (id, user_id, lead_id, channel, summary, details,
                                           outcome, sentiment, occurred_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(log.id.0.to_string())
        .bind(log.user_id.0.to_string())
        .bind(log.lead_id.0.to_string())
        .bind(channel)
        .bind(&log.summary)
        .bind(details_json)
        .bind(log.outcome.map(|outcome| outcome.as_str()))
        .bind(&log.sentiment)
        .bind(log.occurred_at.to_rfc3339())
        .bind(log.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_lead(
        &self,
        user_id: &UserId,
        lead_id: &LeadId,
        limit: u32,
    ) -> Result<Vec<InteractionLog>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {INTERACTION_COLUMNS} FROM interaction_logs
             WHERE user_id = ? AND lead_id = ?
             ORDER BY occurred_at DESC LIMIT ?"
        ))
        .bind(user_id.0.to_string())
        .bind(lead_id.0.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_log).collect()
    }

    async fn recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<InteractionLog>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {INTERACTION_COLUMNS} FROM interaction_logs
             WHERE user_id = ? ORDER BY occurred_at DESC LIMIT ?"
        ))
        .bind(user_id.0.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_log).collect()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use chief_core::domain::interaction::{InteractionLog, Outcome};
    use chief_core::domain::lead::Lead;
    use chief_core::domain::user::{UserId, UserProfile};

    use super::SqlInteractionRepository;
    use crate::repositories::{
        InteractionRepository, LeadRepository, ProfileRepository, SqlLeadRepository,
        SqlProfileRepository,
    };
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn append_and_list_round_trip() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let user_id = UserId(Uuid::new_v4());
        SqlProfileRepository::new(pool.clone())
            .save_profile(UserProfile::new(user_id, "Max"))
            .await
            .expect("seed user");
        let lead = Lead::new(user_id, "Lisa Huber");
        SqlLeadRepository::new(pool.clone()).save(lead.clone()).await.expect("seed lead");

        let repo = SqlInteractionRepository::new(pool);
        let mut log = InteractionLog::new(user_id, lead.id, "Call ging gut");
        log.outcome = Some(Outcome::Positive);
        log.details.key_facts = vec!["will Starterpaket".to_string()];
        repo.append(log.clone()).await.expect("append");

        let loaded = repo.list_for_lead(&user_id, &lead.id, 10).await.expect("list");
        assert_eq!(loaded, vec![log]);
    }
}
