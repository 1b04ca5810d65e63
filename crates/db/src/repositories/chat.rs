use sqlx::Row;
use uuid::Uuid;

use chief_core::domain::chat::{ChatRole, StoredChatMessage};
use chief_core::domain::user::UserId;

use super::{decode_err, parse_datetime, parse_uuid, RepositoryError, TranscriptRepository};
use crate::DbPool;

pub struct SqlTranscriptRepository {
    pool: DbPool,
}

impl SqlTranscriptRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredChatMessage, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let session_id: String = row.try_get("session_id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let role: String = row.try_get("role").map_err(decode_err)?;
    let tool_calls_json: Option<String> = row.try_get("tool_calls").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(StoredChatMessage {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        user_id: UserId(parse_uuid(&user_id)?),
        role: role.parse::<ChatRole>().map_err(decode_err)?,
        content: row.try_get("content").map_err(decode_err)?,
        tool_calls: tool_calls_json
            .map(|raw| serde_json::from_str(&raw).map_err(decode_err))
            .transpose()?,
        tool_call_id: row.try_get("tool_call_id").map_err(decode_err)?,
        created_at: parse_datetime(&created_at)?,
    })
}

#[async_trait::async_trait]
impl TranscriptRepository for SqlTranscriptRepository {
    async fn append(&self, message: StoredChatMessage) -> Result<(), RepositoryError> {
        let tool_calls_json = message
            .tool_calls
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(decode_err)?;

        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, user_id, role, content, tool_calls,
                                        tool_call_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(message.session_id.to_string())
        .bind(message.user_id.0.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&tool_calls_json)
        .bind(&message.tool_call_id)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_for_session(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<StoredChatMessage>, RepositoryError> {
        // Newest `limit` rows, returned oldest-first for prompt assembly.
        let rows = sqlx::query(
            "SELECT id, session_id, user_id, role, content, tool_calls, tool_call_id, created_at
             FROM (SELECT * FROM chat_messages WHERE session_id = ?
                   ORDER BY created_at DESC LIMIT ?)
             ORDER BY created_at ASC",
        )
        .bind(session_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use chief_core::domain::chat::{ChatRole, StoredChatMessage};
    use chief_core::domain::user::{UserId, UserProfile};

    use super::SqlTranscriptRepository;
    use crate::repositories::{ProfileRepository, SqlProfileRepository, TranscriptRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn recent_messages_come_back_in_chronological_order() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let user_id = UserId(Uuid::new_v4());
        SqlProfileRepository::new(pool.clone())
            .save_profile(UserProfile::new(user_id, "Max"))
            .await
            .expect("seed user");

        let repo = SqlTranscriptRepository::new(pool);
        let session_id = Uuid::new_v4();
        let base = Utc::now();

        for (offset, text) in ["erste", "zweite", "dritte"].iter().enumerate() {
            let mut message =
                StoredChatMessage::new(session_id, user_id, ChatRole::User, *text);
            message.created_at = base + Duration::seconds(offset as i64);
            repo.append(message).await.expect("append");
        }

        let recent = repo.recent_for_session(&session_id, 2).await.expect("recent");
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["zweite", "dritte"]);
    }
}
