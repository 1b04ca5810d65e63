use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

use super::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceCategory {
    Signature,
    MessageStyle,
    Greeting,
    Language,
    Rules,
}

impl PreferenceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::MessageStyle => "message_style",
            Self::Greeting => "greeting",
            Self::Language => "language",
            Self::Rules => "rules",
        }
    }
}

impl std::str::FromStr for PreferenceCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "signature" => Ok(Self::Signature),
            "message_style" => Ok(Self::MessageStyle),
            "greeting" => Ok(Self::Greeting),
            "language" => Ok(Self::Language),
            "rules" => Ok(Self::Rules),
            other => Err(DomainError::UnknownEnumValue {
                field: "preference category",
                value: other.to_string(),
            }),
        }
    }
}

/// A structured override of agent behaviour, keyed (owner, category, key).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: UserId,
    pub category: PreferenceCategory,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    pub fn new(
        user_id: UserId,
        category: PreferenceCategory,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self { user_id, category, key: key.into(), value: value.into(), updated_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn category_round_trip() {
        for category in [
            PreferenceCategory::Signature,
            PreferenceCategory::MessageStyle,
            PreferenceCategory::Greeting,
            PreferenceCategory::Language,
            PreferenceCategory::Rules,
        ] {
            assert_eq!(category.as_str().parse::<PreferenceCategory>().unwrap(), category);
        }
    }

    #[test]
    fn preference_carries_owner() {
        let user = UserId(Uuid::new_v4());
        let preference = UserPreference::new(user, PreferenceCategory::Signature, "default", "LG Max");
        assert_eq!(preference.user_id, user);
        assert_eq!(preference.value, "LG Max");
    }
}
