use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub Uuid);

/// Pricing and capability bucket of a user's subscription. Gates the
/// monthly token ceiling enforced by the quota gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Pro,
    Elite,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Elite => "elite",
        }
    }

    pub fn monthly_token_limit(&self) -> u64 {
        match self {
            Self::Starter => 500_000,
            Self::Pro => 2_000_000,
            Self::Elite => 10_000_000,
        }
    }

    /// The tier a limit-reached response should suggest upgrading to.
    pub fn suggested_upgrade(&self) -> Option<PlanTier> {
        match self {
            Self::Starter => Some(Self::Pro),
            Self::Pro => Some(Self::Elite),
            Self::Elite => None,
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "elite" => Ok(Self::Elite),
            other => Err(format!("unknown plan tier `{other}`")),
        }
    }
}

/// Identity block used to personalise prompts. Immutable during a turn;
/// refreshed through the profile cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub vertical: Option<String>,
    pub organization_id: Option<OrgId>,
    pub monthly_revenue_goal: Option<Decimal>,
    pub mlm_company: Option<String>,
    pub mlm_rank: Option<String>,
    pub mlm_next_rank: Option<String>,
    pub mlm_team_size: Option<u32>,
    pub plan_tier: PlanTier,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            vertical: None,
            organization_id: None,
            monthly_revenue_goal: None,
            mlm_company: None,
            mlm_rank: None,
            mlm_next_rank: None,
            mlm_team_size: None,
            plan_tier: PlanTier::Starter,
            created_at: Utc::now(),
        }
    }

    pub fn first_name(&self) -> &str {
        self.display_name.split_whitespace().next().unwrap_or(&self.display_name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub storybook: Option<super::context::Storybook>,
    pub signals: Option<super::context::TeamSignals>,
}
