use chrono::NaiveDate;
use sqlx::Row;

use chief_core::domain::lead::LeadId;
use chief_core::domain::pending::PendingAction;
use chief_core::domain::user::UserId;

use super::{decode_err, parse_date, parse_uuid, PendingActionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPendingActionRepository {
    pool: DbPool,
}

impl SqlPendingActionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PendingActionRepository for SqlPendingActionRepository {
    async fn due_on(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<PendingAction>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, detail, action_type, due_date, lead_id
             FROM pending_actions WHERE user_id = ? AND due_date <= ?
             ORDER BY due_date ASC",
        )
        .bind(user_id.0.to_string())
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(decode_err)?;
                let owner: String = row.try_get("user_id").map_err(decode_err)?;
                let due_date: String = row.try_get("due_date").map_err(decode_err)?;
                let lead_id: Option<String> = row.try_get("lead_id").map_err(decode_err)?;
                Ok(PendingAction {
                    id: parse_uuid(&id)?,
                    user_id: UserId(parse_uuid(&owner)?),
                    title: row.try_get("title").map_err(decode_err)?,
                    detail: row.try_get("detail").map_err(decode_err)?,
                    action_type: row.try_get("action_type").map_err(decode_err)?,
                    due_date: parse_date(&due_date)?,
                    lead_id: lead_id.map(|s| parse_uuid(&s).map(LeadId)).transpose()?,
                })
            })
            .collect()
    }

    async fn save(&self, action: PendingAction) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pending_actions (id, user_id, title, detail, action_type, due_date, lead_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 detail = excluded.detail,
                 action_type = excluded.action_type,
                 due_date = excluded.due_date,
                 lead_id = excluded.lead_id",
        )
        .bind(action.id.to_string())
        .bind(action.user_id.0.to_string())
        .bind(&action.title)
        .bind(&action.detail)
        .bind(&action.action_type)
        .bind(action.due_date.format("%Y-%m-%d").to_string())
        .bind(action.lead_id.map(|lead| lead.0.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use chief_core::domain::pending::PendingAction;
    use chief_core::domain::user::{UserId, UserProfile};

    use super::SqlPendingActionRepository;
    use crate::repositories::{PendingActionRepository, ProfileRepository, SqlProfileRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn due_on_includes_overdue_items() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let user_id = UserId(Uuid::new_v4());
        SqlProfileRepository::new(pool.clone())
            .save_profile(UserProfile::new(user_id, "Max"))
            .await
            .expect("seed user");

        let repo = SqlPendingActionRepository::new(pool);
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        for (title, due) in [
            ("Rechnung senden", today - chrono::Duration::days(2)),
            ("Demo vorbereiten", today),
            ("Quartalsplanung", today + chrono::Duration::days(5)),
        ] {
            repo.save(PendingAction {
                id: Uuid::new_v4(),
                user_id,
                title: title.to_string(),
                detail: None,
                action_type: "task".to_string(),
                due_date: due,
                lead_id: None,
            })
            .await
            .expect("save");
        }

        let due = repo.due_on(&user_id, today).await.expect("due");
        let titles: Vec<_> = due.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Rechnung senden", "Demo vorbereiten"]);
    }
}
