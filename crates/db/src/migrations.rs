use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_TABLES: &[&str] = &[
        "organizations",
        "user_profiles",
        "leads",
        "follow_up_suggestions",
        "interaction_logs",
        "knowledge_entries",
        "user_preferences",
        "chat_messages",
        "usage_records",
        "usage_daily",
        "power_hour_sessions",
        "pending_actions",
        "learning_insights",
    ];

    async fn table_count(pool: &sqlx::SqlitePool, name: &str) -> i64 {
        sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("query sqlite_master")
        .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            assert_eq!(table_count(&pool, table).await, 1, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        for table in MANAGED_TABLES {
            assert_eq!(table_count(&pool, table).await, 0, "leftover table {table}");
        }
    }

    #[tokio::test]
    async fn pending_follow_up_uniqueness_is_partial() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query(
            "INSERT INTO user_profiles (id, display_name, created_at) VALUES ('u1', 'Max', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert user");
        sqlx::query(
            "INSERT INTO leads (id, user_id, name, created_at, updated_at)
             VALUES ('l1', 'u1', 'Lisa', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert lead");

        let insert = "INSERT INTO follow_up_suggestions (id, user_id, lead_id, due_at, status, created_at)
                      VALUES (?, 'u1', 'l1', '2026-01-05T09:00:00Z', ?, '2026-01-01T00:00:00Z')";
        sqlx::query(insert).bind("f1").bind("pending").execute(&pool).await.expect("first pending");

        // A second pending row for the same (user, lead) violates the index.
        let duplicate = sqlx::query(insert).bind("f2").bind("pending").execute(&pool).await;
        assert!(duplicate.is_err());

        // A sent row does not.
        sqlx::query(insert).bind("f3").bind("sent").execute(&pool).await.expect("sent row");
    }
}
