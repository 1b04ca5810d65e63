use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::Channel;
use crate::errors::DomainError;

use super::lead::LeadId;
use super::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowUpId(pub Uuid);

/// Named follow-up sequence. Each flow has ordered stages with per-stage
/// wait durations; the last stage repeats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowTag {
    ColdNoReply,
    InterestedLater,
    Erstkontakt,
    Manual,
}

impl FlowTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ColdNoReply => "COLD_NO_REPLY",
            Self::InterestedLater => "INTERESTED_LATER",
            Self::Erstkontakt => "ERSTKONTAKT",
            Self::Manual => "MANUAL",
        }
    }

    fn stage_waits(&self) -> &'static [i64] {
        match self {
            Self::ColdNoReply => &[3, 5, 7],
            Self::InterestedLater => &[7, 14],
            Self::Erstkontakt => &[1, 3, 5],
            Self::Manual => &[3],
        }
    }

    /// Days to wait before the follow-up at `stage` comes due.
    pub fn wait_days(&self, stage: u32) -> i64 {
        let waits = self.stage_waits();
        let index = (stage as usize).min(waits.len() - 1);
        waits[index]
    }

    pub fn stage_count(&self) -> u32 {
        self.stage_waits().len() as u32
    }
}

impl std::str::FromStr for FlowTag {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "COLD_NO_REPLY" => Ok(Self::ColdNoReply),
            "INTERESTED_LATER" => Ok(Self::InterestedLater),
            "ERSTKONTAKT" => Ok(Self::Erstkontakt),
            "MANUAL" => Ok(Self::Manual),
            other => Err(DomainError::UnknownEnumValue {
                field: "flow tag",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    Pending,
    Sent,
    Skipped,
    Snoozed,
}

impl FollowUpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Skipped => "skipped",
            Self::Snoozed => "snoozed",
        }
    }
}

impl std::str::FromStr for FollowUpStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "skipped" => Ok(Self::Skipped),
            "snoozed" => Ok(Self::Snoozed),
            other => Err(DomainError::UnknownEnumValue {
                field: "follow-up status",
                value: other.to_string(),
            }),
        }
    }
}

/// Category of the previous outbound message, used to pick the next draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    FirstContact,
    ProductInfo,
    FollowUp,
    ObjectionHandling,
    Generic,
}

impl MessageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstContact => "first_contact",
            Self::ProductInfo => "product_info",
            Self::FollowUp => "follow_up",
            Self::ObjectionHandling => "objection_handling",
            Self::Generic => "generic",
        }
    }
}

impl std::str::FromStr for MessageCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first_contact" => Ok(Self::FirstContact),
            "product_info" => Ok(Self::ProductInfo),
            "follow_up" => Ok(Self::FollowUp),
            "objection_handling" => Ok(Self::ObjectionHandling),
            "generic" => Ok(Self::Generic),
            other => Err(DomainError::UnknownEnumValue {
                field: "message category",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(DomainError::UnknownEnumValue {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// A scheduled, not-yet-sent nudge for a lead. Invariant: at most one
/// pending suggestion per (owner, lead).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowUpSuggestion {
    pub id: FollowUpId,
    pub user_id: UserId,
    pub lead_id: LeadId,
    pub flow: FlowTag,
    pub stage: u32,
    pub template_key: Option<String>,
    pub channel: Option<Channel>,
    pub suggested_message: Option<String>,
    pub reason: Option<String>,
    pub due_at: DateTime<Utc>,
    pub status: FollowUpStatus,
    pub previous_message: Option<String>,
    pub previous_category: Option<MessageCategory>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl FollowUpSuggestion {
    pub fn manual(
        user_id: UserId,
        lead_id: LeadId,
        due_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: FollowUpId(Uuid::new_v4()),
            user_id,
            lead_id,
            flow: FlowTag::Manual,
            stage: 0,
            template_key: None,
            channel: None,
            suggested_message: None,
            reason,
            due_at,
            status: FollowUpStatus::Pending,
            previous_message: None,
            previous_category: None,
            priority: Priority::Medium,
            created_at: Utc::now(),
        }
    }
}
