use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

use super::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeId(pub Uuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeCategory {
    Identity,
    Company,
    Product,
    Preferences,
    Style,
    Personal,
    Business,
    Contacts,
}

impl KnowledgeCategory {
    pub const ALL: [KnowledgeCategory; 8] = [
        Self::Identity,
        Self::Company,
        Self::Product,
        Self::Preferences,
        Self::Style,
        Self::Personal,
        Self::Business,
        Self::Contacts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Company => "company",
            Self::Product => "product",
            Self::Preferences => "preferences",
            Self::Style => "style",
            Self::Personal => "personal",
            Self::Business => "business",
            Self::Contacts => "contacts",
        }
    }
}

impl std::str::FromStr for KnowledgeCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(Self::Identity),
            "company" => Ok(Self::Company),
            "product" => Ok(Self::Product),
            "preferences" => Ok(Self::Preferences),
            "style" => Ok(Self::Style),
            "personal" => Ok(Self::Personal),
            "business" => Ok(Self::Business),
            "contacts" => Ok(Self::Contacts),
            other => Err(DomainError::UnknownEnumValue {
                field: "knowledge category",
                value: other.to_string(),
            }),
        }
    }
}

/// A user-scoped durable fact. De-duplicated on (owner, category, content).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: KnowledgeId,
    pub user_id: UserId,
    pub category: KnowledgeCategory,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(user_id: UserId, category: KnowledgeCategory, content: impl Into<String>) -> Self {
        Self {
            id: KnowledgeId(Uuid::new_v4()),
            user_id,
            category,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

pub const MIN_KNOWLEDGE_CONTENT_CHARS: usize = 4;

/// A candidate fact extracted by the learning extractor, before validation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct KnowledgeCandidate {
    pub category: String,
    pub content: String,
}

impl KnowledgeCandidate {
    /// Validate into a typed category + trimmed content, or reject.
    pub fn validate(&self) -> Option<(KnowledgeCategory, String)> {
        let category = self.category.parse::<KnowledgeCategory>().ok()?;
        let content = self.content.trim();
        if content.chars().count() < MIN_KNOWLEDGE_CONTENT_CHARS {
            return None;
        }
        Some((category, content.to_string()))
    }
}
