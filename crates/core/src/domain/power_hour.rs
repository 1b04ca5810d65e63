use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

/// Flag-bearing row gating the rapid lead-capture fast path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerHourSession {
    pub id: Uuid,
    pub user_id: UserId,
    pub active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub contacts_made: u32,
    pub messages_sent: u32,
    pub actual_duration_minutes: Option<i64>,
}

impl PowerHourSession {
    pub fn start(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            active: true,
            started_at: now,
            ended_at: None,
            contacts_made: 0,
            messages_sent: 0,
            actual_duration_minutes: None,
        }
    }

    pub fn end(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.ended_at = Some(now);
        self.actual_duration_minutes = Some((now - self.started_at).num_minutes());
    }
}
