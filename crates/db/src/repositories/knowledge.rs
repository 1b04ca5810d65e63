use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use chief_core::domain::knowledge::{KnowledgeCategory, KnowledgeEntry, KnowledgeId};
use chief_core::domain::preference::{PreferenceCategory, UserPreference};
use chief_core::domain::user::UserId;

use super::{
    decode_err, parse_datetime, parse_uuid, InsightRepository, KnowledgeRepository,
    PreferenceRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlKnowledgeRepository {
    pool: DbPool,
}

impl SqlKnowledgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl KnowledgeRepository for SqlKnowledgeRepository {
    async fn list(&self, user_id: &UserId) -> Result<Vec<KnowledgeEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, category, content, created_at FROM knowledge_entries
             WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(decode_err)?;
                let owner: String = row.try_get("user_id").map_err(decode_err)?;
                let category: String = row.try_get("category").map_err(decode_err)?;
                let created_at: String = row.try_get("created_at").map_err(decode_err)?;
                Ok(KnowledgeEntry {
                    id: KnowledgeId(parse_uuid(&id)?),
                    user_id: UserId(parse_uuid(&owner)?),
                    category: category.parse::<KnowledgeCategory>().map_err(decode_err)?,
                    content: row.try_get("content").map_err(decode_err)?,
                    created_at: parse_datetime(&created_at)?,
                })
            })
            .collect()
    }

    async fn insert_if_new(&self, entry: KnowledgeEntry) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO knowledge_entries (id, user_id, category, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.id.0.to_string())
        .bind(entry.user_id.0.to_string())
        .bind(entry.category.as_str())
        .bind(&entry.content)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct SqlPreferenceRepository {
    pool: DbPool,
}

impl SqlPreferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PreferenceRepository for SqlPreferenceRepository {
    async fn list(&self, user_id: &UserId) -> Result<Vec<UserPreference>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, category, key, value, updated_at FROM user_preferences
             WHERE user_id = ? ORDER BY category, key",
        )
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let owner: String = row.try_get("user_id").map_err(decode_err)?;
                let category: String = row.try_get("category").map_err(decode_err)?;
                let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;
                Ok(UserPreference {
                    user_id: UserId(parse_uuid(&owner)?),
                    category: category.parse::<PreferenceCategory>().map_err(decode_err)?,
                    key: row.try_get("key").map_err(decode_err)?,
                    value: row.try_get("value").map_err(decode_err)?,
                    updated_at: parse_datetime(&updated_at)?,
                })
            })
            .collect()
    }

    async fn upsert(&self, preference: UserPreference) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_preferences (user_id, category, key, value, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, category, key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(preference.user_id.0.to_string())
        .bind(preference.category.as_str())
        .bind(&preference.key)
        .bind(&preference.value)
        .bind(preference.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub struct SqlInsightRepository {
    pool: DbPool,
}

impl SqlInsightRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InsightRepository for SqlInsightRepository {
    async fn recent(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT insight FROM learning_insights
             WHERE user_id = ? AND created_at >= ?
             ORDER BY created_at DESC",
        )
        .bind(user_id.0.to_string())
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get("insight").map_err(decode_err)).collect()
    }

    async fn append(&self, user_id: &UserId, insight: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO learning_insights (id, user_id, insight, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.0.to_string())
        .bind(insight)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use chief_core::domain::knowledge::{KnowledgeCategory, KnowledgeEntry};
    use chief_core::domain::preference::{PreferenceCategory, UserPreference};
    use chief_core::domain::user::{UserId, UserProfile};

    use super::{SqlKnowledgeRepository, SqlPreferenceRepository};
    use crate::repositories::{
        KnowledgeRepository, PreferenceRepository, ProfileRepository, SqlProfileRepository,
    };
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

    #[tokio::test]
    async fn duplicate_knowledge_content_is_ignored() {
        let (pool, user_id) = pool_with_user().await;
        let repo = SqlKnowledgeRepository::new(pool);

        let first =
            KnowledgeEntry::new(user_id, KnowledgeCategory::Product, "Starterpaket 49 EUR");
        assert!(repo.insert_if_new(first).await.expect("first"));

        let duplicate =
            KnowledgeEntry::new(user_id, KnowledgeCategory::Product, "Starterpaket 49 EUR");
        assert!(!repo.insert_if_new(duplicate).await.expect("duplicate"));

        assert_eq!(repo.list(&user_id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn preference_upsert_replaces_value() {
        let (pool, user_id) = pool_with_user().await;
        let repo = SqlPreferenceRepository::new(pool);

        repo.upsert(UserPreference::new(user_id, PreferenceCategory::Signature, "default", "LG Max"))
            .await
            .expect("insert");
        repo.upsert(UserPreference::new(
            user_id,
            PreferenceCategory::Signature,
            "default",
            "Beste Gruesse, Max",
        ))
        .await
        .expect("update");

        let prefs = repo.list(&user_id).await.expect("list");
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].value, "Beste Gruesse, Max");
    }
}
