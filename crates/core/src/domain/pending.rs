use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lead::LeadId;
use super::user::UserId;

/// Externally generated work item surfaced into the agent's context.
/// Read-only to the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: Uuid,
    pub user_id: UserId,
    pub title: String,
    pub detail: Option<String>,
    pub action_type: String,
    pub due_date: NaiveDate,
    pub lead_id: Option<LeadId>,
}
