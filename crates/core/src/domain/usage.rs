use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::{OrgId, UserId};

/// Append-only per-call billing row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub organization_id: Option<OrgId>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: Decimal,
    pub intent: String,
    pub session_id: Option<Uuid>,
    pub tool_calls: u32,
    pub recorded_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Accumulated daily usage, upserted on (user, date).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub user_id: UserId,
    pub usage_date: NaiveDate,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub calls: u64,
    pub tool_calls: u64,
    pub cost: Decimal,
}

impl DailyUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
