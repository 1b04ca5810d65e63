use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

use super::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            other => Err(DomainError::UnknownEnumValue {
                field: "chat role",
                value: other.to_string(),
            }),
        }
    }
}

/// A transcript row. `tool_calls` carries the provider-shaped call list on
/// assistant turns; `tool_call_id` ties a tool turn back to its call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: UserId,
    pub role: ChatRole,
    pub content: String,
    pub tool_calls: Option<serde_json::Value>,
    pub tool_call_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredChatMessage {
    pub fn new(
        session_id: Uuid,
        user_id: UserId,
        role: ChatRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            user_id,
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            created_at: Utc::now(),
        }
    }
}
