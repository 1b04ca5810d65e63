//! Tiered model selection.

use chief_core::config::AppConfig;
use chief_core::Intent;

/// Free-tier ceiling: above this estimate even small talk goes mid-tier.
pub const FREE_TIER_TOKEN_CEILING: u32 = 10_000;

/// Keywords that signal a high-stakes coaching conversation worth the top
/// model regardless of intent.
const STRATEGIC_KEYWORDS: &[&str] = &[
    "strategie",
    "strategy",
    "closing",
    "verkaufspsychologie",
    "schwieriger kunde",
    "schwierige kundin",
    "einwandbehandlung komplex",
    "positionierung",
    "preisverhandlung",
    "skalieren",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelTier {
    Free,
    Mid,
    Top,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Mid => "mid",
            Self::Top => "top",
        }
    }
}

/// A concrete routable model: tier plus the provider model name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelChoice {
    pub tier: ModelTier,
    pub name: String,
}

/// The configured model names per tier.
#[derive(Clone, Debug)]
pub struct ModelCatalog {
    pub top: String,
    pub mid: String,
    pub small: String,
    pub free: String,
}

impl ModelCatalog {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top: config.primary.top_model.clone(),
            mid: config.primary.mid_model.clone(),
            small: config.primary.small_model.clone(),
            free: config.free.model.clone(),
        }
    }

    pub fn top(&self) -> ModelChoice {
        ModelChoice { tier: ModelTier::Top, name: self.top.clone() }
    }

    pub fn mid(&self) -> ModelChoice {
        ModelChoice { tier: ModelTier::Mid, name: self.mid.clone() }
    }

    pub fn free(&self) -> ModelChoice {
        ModelChoice { tier: ModelTier::Free, name: self.free.clone() }
    }

    /// The smaller same-provider model a rate-limited top call falls back to.
    pub fn sibling_of(&self, choice: &ModelChoice) -> Option<ModelChoice> {
        match choice.tier {
            ModelTier::Top => {
                Some(ModelChoice { tier: ModelTier::Mid, name: self.small.clone() })
            }
            ModelTier::Mid | ModelTier::Free => None,
        }
    }

    /// Routing rules in order: strategic keyword, tool need, content work,
    /// cheap chat, default mid.
    pub fn route(
        &self,
        intent: Intent,
        needs_tools: bool,
        message: &str,
        estimated_tokens: u32,
    ) -> ModelChoice {
        let lowered = message.to_lowercase();
        if STRATEGIC_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            return self.top();
        }
        if needs_tools {
            return self.mid();
        }
        match intent {
            Intent::Content => self.mid(),
            Intent::Chat | Intent::Query if estimated_tokens <= FREE_TIER_TOKEN_CEILING => {
                self.free()
            }
            _ => self.mid(),
        }
    }

    /// Calls that consume tool results must stay on a tool-capable model.
    pub fn route_followup(&self) -> ModelChoice {
        self.mid()
    }
}
