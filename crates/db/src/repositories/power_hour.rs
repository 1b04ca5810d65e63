use sqlx::Row;

use chief_core::domain::power_hour::PowerHourSession;
use chief_core::domain::user::UserId;

use super::{decode_err, parse_datetime, parse_datetime_opt, parse_uuid, PowerHourRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPowerHourRepository {
    pool: DbPool,
}

impl SqlPowerHourRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<PowerHourSession, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let active: i64 = row.try_get("active").map_err(decode_err)?;
    let started_at: String = row.try_get("started_at").map_err(decode_err)?;
    let contacts_made: i64 = row.try_get("contacts_made").map_err(decode_err)?;
    let messages_sent: i64 = row.try_get("messages_sent").map_err(decode_err)?;
    let actual_duration_minutes: Option<i64> =
        row.try_get("actual_duration_minutes").map_err(decode_err)?;

    Ok(PowerHourSession {
        id: parse_uuid(&id)?,
        user_id: UserId(parse_uuid(&user_id)?),
        active: active != 0,
        started_at: parse_datetime(&started_at)?,
        ended_at: parse_datetime_opt(row.try_get("ended_at").map_err(decode_err)?)?,
        contacts_made: contacts_made.clamp(0, i64::from(u32::MAX)) as u32,
        messages_sent: messages_sent.clamp(0, i64::from(u32::MAX)) as u32,
        actual_duration_minutes,
    })
}

#[async_trait::async_trait]
impl PowerHourRepository for SqlPowerHourRepository {
    async fn find_active(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PowerHourSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, active, started_at, ended_at, contacts_made, messages_sent,
                    actual_duration_minutes
             FROM power_hour_sessions
             WHERE user_id = ? AND active = 1
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_session(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: PowerHourSession) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO power_hour_sessions (id, user_id, active, started_at, ended_at,
                                              contacts_made, messages_sent,
                                              actual_duration_minutes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 active = excluded.active,
                 ended_at = excluded.ended_at,
                 contacts_made = excluded.contacts_made,
                 messages_sent = excluded.messages_sent,
                 actual_duration_minutes = excluded.actual_duration_minutes",
        )
        .bind(session.id.to_string())
        .bind(session.user_id.0.to_string())
        .bind(i64::from(session.active))
        .bind(session.started_at.to_rfc3339())
        .bind(session.ended_at.map(|dt| dt.to_rfc3339()))
        .bind(i64::from(session.contacts_made))
        .bind(i64::from(session.messages_sent))
        .bind(session.actual_duration_minutes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use chief_core::domain::power_hour::PowerHourSession;
    use chief_core::domain::user::{UserId, UserProfile};

    use super::SqlPowerHourRepository;
    use crate::repositories::{PowerHourRepository, ProfileRepository, SqlProfileRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn active_session_found_until_ended() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let user_id = UserId(Uuid::new_v4());
        SqlProfileRepository::new(pool.clone())
            .save_profile(UserProfile::new(user_id, "Max"))
            .await
            .expect("seed user");

        let repo = SqlPowerHourRepository::new(pool);
        let started = Utc::now();
        let mut session = PowerHourSession::start(user_id, started);
        session.contacts_made = 4;
        repo.save(session.clone()).await.expect("save");

        let active = repo.find_active(&user_id).await.expect("find").expect("active");
        assert_eq!(active.contacts_made, 4);

        session.end(started + Duration::minutes(55));
        repo.save(session).await.expect("save ended");

        assert!(repo.find_active(&user_id).await.expect("find").is_none());
    }
}
