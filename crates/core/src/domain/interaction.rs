use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::Channel;
use crate::errors::DomainError;

use super::lead::LeadId;
use super::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub Uuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Positive,
    Neutral,
    Negative,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    /// Signed warmth delta applied to the lead when this outcome is logged.
    pub fn temperature_delta(&self) -> i8 {
        match self {
            Self::Positive => 5,
            Self::Neutral => 0,
            Self::Negative => -5,
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" | "positiv" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" | "negativ" => Ok(Self::Negative),
            other => Err(DomainError::UnknownEnumValue {
                field: "outcome",
                value: other.to_string(),
            }),
        }
    }
}

/// Structured facts captured alongside an interaction summary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionDetails {
    #[serde(default)]
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub next_steps: Option<String>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
}

/// Append-only record of a conversation with a lead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionLog {
    pub id: InteractionId,
    pub user_id: UserId,
    pub lead_id: LeadId,
    pub channel: Option<Channel>,
    pub summary: String,
    pub details: InteractionDetails,
    pub outcome: Option<Outcome>,
    pub sentiment: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InteractionLog {
    pub fn new(user_id: UserId, lead_id: LeadId, summary: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: InteractionId(Uuid::new_v4()),
            user_id,
            lead_id,
            channel: None,
            summary: summary.into(),
            details: InteractionDetails::default(),
            outcome: None,
            sentiment: None,
            occurred_at: now,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_deltas() {
        assert_eq!(Outcome::Positive.temperature_delta(), 5);
        assert_eq!(Outcome::Neutral.temperature_delta(), 0);
        assert_eq!(Outcome::Negative.temperature_delta(), -5);
    }

    #[test]
    fn german_outcome_aliases_parse() {
        assert_eq!("positiv".parse::<Outcome>().unwrap(), Outcome::Positive);
        assert_eq!("negativ".parse::<Outcome>().unwrap(), Outcome::Negative);
    }
}
