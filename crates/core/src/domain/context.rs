//! Read-model structs the context loader assembles for prompt building.
//! Plain data only: nothing here can re-enter the orchestrator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// Organisational brand layer: stories, product descriptions, guardrails.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storybook {
    #[serde(default)]
    pub stories: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub guardrails: Vec<String>,
}

impl Storybook {
    pub fn is_empty(&self) -> bool {
        self.stories.is_empty() && self.products.is_empty() && self.guardrails.is_empty()
    }
}

/// Team-curated signals distributed with the organisation record: detected
/// winning patterns, broadcasts, and the current team benchmark line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSignals {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub broadcasts: Vec<String>,
    #[serde(default)]
    pub benchmark: Option<String>,
}

impl TeamSignals {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.broadcasts.is_empty() && self.benchmark.is_none()
    }
}

/// The in-prompt layer carrying user rules, detected patterns, team
/// broadcasts, and anonymised collective insights.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivingOs {
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub broadcasts: Vec<String>,
    #[serde(default)]
    pub collective_insights: Vec<String>,
    #[serde(default)]
    pub benchmark: Option<String>,
}

impl LivingOs {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
            && self.patterns.is_empty()
            && self.broadcasts.is_empty()
            && self.collective_insights.is_empty()
            && self.benchmark.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCount {
    pub channel: Channel,
    pub count: u32,
}

/// Ghost counts and per-platform outreach stats. A ghost is a contact that
/// has been awaiting a reply beyond the auto-follow-up threshold.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachState {
    pub ghosts: u32,
    pub awaiting_reply: u32,
    #[serde(default)]
    pub per_channel: Vec<ChannelCount>,
}

impl OutreachState {
    pub fn is_empty(&self) -> bool {
        self.ghosts == 0 && self.awaiting_reply == 0 && self.per_channel.is_empty()
    }
}

/// Non-advisory finance snapshot for the workflow context fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinanceSummary {
    pub open_items: u32,
    pub overdue_items: u32,
    pub month_revenue: Decimal,
}

impl FinanceSummary {
    pub fn is_empty(&self) -> bool {
        self.open_items == 0 && self.overdue_items == 0 && self.month_revenue.is_zero()
    }
}
