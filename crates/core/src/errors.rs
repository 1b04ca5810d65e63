use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::lead::LeadStatus;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("invalid lead status transition from {from:?} to {to:?}")]
    InvalidStatusTransition { from: LeadStatus, to: LeadStatus },
    #[error("sales stage {0} is out of range (0-8)")]
    InvalidSalesStage(u8),
    #[error("a pending follow-up already exists for this lead")]
    DuplicatePendingFollowUp { existing_id: Uuid, existing_due_at: DateTime<Utc> },
    #[error("no lead matched `{0}`")]
    UnknownLead(String),
    #[error("unknown {field} value `{value}`")]
    UnknownEnumValue { field: &'static str, value: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
