use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::Channel;
use crate::errors::DomainError;

use super::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub Uuid);

/// Pipeline status of a lead. Leads are never deleted; `Lost` is the
/// soft-delete state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
    Parked,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Parked => "parked",
        }
    }

    fn pipeline_rank(&self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::Contacted => Some(1),
            Self::Qualified => Some(2),
            Self::Proposal => Some(3),
            Self::Negotiation => Some(4),
            Self::Won | Self::Lost | Self::Parked => None,
        }
    }

    /// Whether moving `self -> to` is a legal pipeline transition.
    ///
    /// Forward movement along the pipeline is always allowed (stage skips
    /// included), as is parking or losing an active lead. Parked and lost
    /// leads can be reactivated into `Contacted`. `Won` is terminal except
    /// through the explicit convert path, which is a no-op when already won.
    pub fn can_transition(&self, to: LeadStatus) -> bool {
        if *self == to {
            return true;
        }
        match (self, to) {
            (Self::Won, _) => false,
            (_, Self::Lost) | (_, Self::Parked) => true,
            (Self::Parked, Self::Contacted) | (Self::Lost, Self::Contacted) => true,
            (Self::Parked, _) | (Self::Lost, _) => false,
            (_, Self::Won) => true,
            (from, to) => match (from.pipeline_rank(), to.pipeline_rank()) {
                (Some(from_rank), Some(to_rank)) => to_rank > from_rank,
                _ => false,
            },
        }
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "proposal" => Ok(Self::Proposal),
            "negotiation" => Ok(Self::Negotiation),
            "won" | "customer" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            "parked" => Ok(Self::Parked),
            other => Err(DomainError::UnknownEnumValue {
                field: "lead status",
                value: other.to_string(),
            }),
        }
    }
}

/// Derived warmth tag. The stored value is a 0-100 score; the tag is a
/// projection of it, so the two can never diverge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Cold,
    Warm,
    Hot,
}

impl Temperature {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=33 => Self::Cold,
            34..=66 => Self::Warm,
            _ => Self::Hot,
        }
    }

    /// Midpoint score for when a tool argument supplies only the tag.
    pub fn canonical_score(&self) -> u8 {
        match self {
            Self::Cold => 15,
            Self::Warm => 50,
            Self::Hot => 85,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Warm => "warm",
            Self::Hot => "hot",
        }
    }
}

impl std::str::FromStr for Temperature {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cold" | "kalt" => Ok(Self::Cold),
            "warm" => Ok(Self::Warm),
            "hot" | "heiss" | "heiß" => Ok(Self::Hot),
            other => Err(DomainError::UnknownEnumValue {
                field: "temperature",
                value: other.to_string(),
            }),
        }
    }
}

/// Conversation-level state, orthogonal to the pipeline status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    NeverContacted,
    AwaitingReply,
    InConversation,
    Customer,
    Lost,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeverContacted => "never_contacted",
            Self::AwaitingReply => "awaiting_reply",
            Self::InConversation => "in_conversation",
            Self::Customer => "customer",
            Self::Lost => "lost",
        }
    }
}

impl std::str::FromStr for ContactStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "never_contacted" => Ok(Self::NeverContacted),
            "awaiting_reply" => Ok(Self::AwaitingReply),
            "in_conversation" => Ok(Self::InConversation),
            "customer" => Ok(Self::Customer),
            "lost" => Ok(Self::Lost),
            other => Err(DomainError::UnknownEnumValue {
                field: "contact status",
                value: other.to_string(),
            }),
        }
    }
}

/// Events that drive the contact-status machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactEvent {
    OutboundSent,
    InboundObserved,
    Converted,
    MarkedLost,
}

/// Pure transition function for the contact-status machine. Events that do
/// not apply in the current state leave it unchanged.
pub fn apply_contact_event(current: ContactStatus, event: ContactEvent) -> ContactStatus {
    use ContactStatus::*;
    match (current, event) {
        (NeverContacted, ContactEvent::OutboundSent) => AwaitingReply,
        (InConversation, ContactEvent::OutboundSent) => AwaitingReply,
        (AwaitingReply, ContactEvent::InboundObserved) => InConversation,
        (_, ContactEvent::Converted) => Customer,
        (_, ContactEvent::MarkedLost) => Lost,
        (current, _) => current,
    }
}

/// Outcome of the auto-send eligibility check consumed by the outbound
/// inbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AutoSendDecision {
    FirstContact,
    FollowUp,
    Blocked { reason: &'static str },
}

const AUTO_FOLLOW_UP_AFTER_DAYS: i64 = 2;

pub fn can_auto_send(lead: &Lead, now: DateTime<Utc>) -> AutoSendDecision {
    match lead.contact_status {
        ContactStatus::NeverContacted => AutoSendDecision::FirstContact,
        ContactStatus::AwaitingReply => match lead.awaiting_reply_since {
            Some(since) if now - since >= Duration::days(AUTO_FOLLOW_UP_AFTER_DAYS) => {
                AutoSendDecision::FollowUp
            }
            Some(_) => AutoSendDecision::Blocked { reason: "awaiting_reply_too_recent" },
            None => AutoSendDecision::Blocked { reason: "awaiting_reply_since_missing" },
        },
        ContactStatus::InConversation => {
            AutoSendDecision::Blocked { reason: "active_conversation" }
        }
        ContactStatus::Customer => AutoSendDecision::Blocked { reason: "already_customer" },
        ContactStatus::Lost => AutoSendDecision::Blocked { reason: "lead_lost" },
    }
}

pub const MAX_SALES_STAGE: u8 = 8;

/// A tracked contact. Created and mutated exclusively through tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub user_id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub instagram: Option<String>,
    pub facebook_url: Option<String>,
    pub linkedin: Option<String>,
    pub whatsapp: Option<String>,
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub temperature_score: u8,
    pub tags: Vec<String>,
    pub sales_stage: u8,
    pub followup_flow: Option<super::followup::FlowTag>,
    pub flow_stage: u32,
    pub next_contact_at: Option<DateTime<Utc>>,
    pub contact_status: ContactStatus,
    pub awaiting_reply_since: Option<DateTime<Utc>>,
    pub last_outbound_at: Option<DateTime<Utc>>,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub source_channel: Option<Channel>,
    pub customer_since: Option<DateTime<Utc>>,
    pub customer_value: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: LeadId(Uuid::new_v4()),
            user_id,
            name: name.into(),
            email: None,
            phone: None,
            instagram: None,
            facebook_url: None,
            linkedin: None,
            whatsapp: None,
            notes: None,
            status: LeadStatus::New,
            temperature_score: Temperature::Cold.canonical_score(),
            tags: Vec::new(),
            sales_stage: 0,
            followup_flow: None,
            flow_stage: 0,
            next_contact_at: None,
            contact_status: ContactStatus::NeverContacted,
            awaiting_reply_since: None,
            last_outbound_at: None,
            last_inbound_at: None,
            source_channel: None,
            customer_since: None,
            customer_value: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    pub fn temperature(&self) -> Temperature {
        Temperature::from_score(self.temperature_score)
    }

    /// Bump the warmth score by a signed delta, clamped to [0, 100].
    pub fn bump_temperature(&mut self, delta: i8) {
        let bumped = i16::from(self.temperature_score) + i16::from(delta);
        self.temperature_score = bumped.clamp(0, 100) as u8;
    }

    /// Apply a contact-status event, stamping the bookkeeping timestamps.
    pub fn apply_contact_event(&mut self, event: ContactEvent, now: DateTime<Utc>) {
        let next = apply_contact_event(self.contact_status, event);
        match event {
            ContactEvent::OutboundSent => {
                self.last_outbound_at = Some(now);
                if next == ContactStatus::AwaitingReply
                    && self.contact_status != ContactStatus::AwaitingReply
                {
                    self.awaiting_reply_since = Some(now);
                }
                // First outbound moves the pipeline out of `new` as well.
                if self.status == LeadStatus::New {
                    self.status = LeadStatus::Contacted;
                }
            }
            ContactEvent::InboundObserved => {
                self.last_inbound_at = Some(now);
                if next == ContactStatus::InConversation {
                    self.awaiting_reply_since = None;
                }
            }
            ContactEvent::Converted | ContactEvent::MarkedLost => {
                self.awaiting_reply_since = None;
            }
        }
        self.contact_status = next;
        self.updated_at = now;
    }

    pub fn set_status(&mut self, to: LeadStatus, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_transition(to) {
            return Err(DomainError::InvalidStatusTransition { from: self.status, to });
        }
        self.status = to;
        match to {
            LeadStatus::Won => self.apply_contact_event(ContactEvent::Converted, now),
            LeadStatus::Lost => self.apply_contact_event(ContactEvent::MarkedLost, now),
            _ => self.updated_at = now,
        }
        Ok(())
    }

    pub fn set_sales_stage(&mut self, stage: u8, now: DateTime<Utc>) -> Result<(), DomainError> {
        if stage > MAX_SALES_STAGE {
            return Err(DomainError::InvalidSalesStage(stage));
        }
        self.sales_stage = stage;
        self.updated_at = now;
        Ok(())
    }

    /// Merge new tags into the existing set, preserving insertion order.
    pub fn merge_tags<I: IntoIterator<Item = String>>(&mut self, new_tags: I) {
        for tag in new_tags {
            let tag = tag.trim().to_string();
            if tag.is_empty() {
                continue;
            }
            if !self.tags.iter().any(|existing| existing.eq_ignore_ascii_case(&tag)) {
                self.tags.push(tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead() -> Lead {
        Lead::new(UserId(Uuid::new_v4()), "Lisa Huber")
    }

    #[test]
    fn forward_pipeline_transitions_allowed() {
        assert!(LeadStatus::New.can_transition(LeadStatus::Contacted));
        assert!(LeadStatus::Contacted.can_transition(LeadStatus::Proposal));
        assert!(LeadStatus::Negotiation.can_transition(LeadStatus::Won));
    }

    #[test]
    fn backward_pipeline_transitions_rejected() {
        assert!(!LeadStatus::Proposal.can_transition(LeadStatus::Contacted));
        assert!(!LeadStatus::Won.can_transition(LeadStatus::New));
    }

    #[test]
    fn parked_leads_can_be_reactivated() {
        assert!(LeadStatus::Parked.can_transition(LeadStatus::Contacted));
        assert!(!LeadStatus::Parked.can_transition(LeadStatus::Won));
    }

    #[test]
    fn contact_machine_outbound_then_inbound() {
        let mut lead = lead();
        let now = Utc::now();
        lead.apply_contact_event(ContactEvent::OutboundSent, now);
        assert_eq!(lead.contact_status, ContactStatus::AwaitingReply);
        assert_eq!(lead.awaiting_reply_since, Some(now));

        lead.apply_contact_event(ContactEvent::InboundObserved, now);
        assert_eq!(lead.contact_status, ContactStatus::InConversation);
        assert!(lead.awaiting_reply_since.is_none());
    }

    #[test]
    fn first_outbound_moves_the_pipeline_to_contacted() {
        let mut lead = lead();
        assert_eq!(lead.status, LeadStatus::New);

        lead.apply_contact_event(ContactEvent::OutboundSent, Utc::now());
        assert_eq!(lead.status, LeadStatus::Contacted);

        // Later pipeline stages are left alone.
        let now = Utc::now();
        lead.set_status(LeadStatus::Qualified, now).unwrap();
        lead.apply_contact_event(ContactEvent::OutboundSent, now);
        assert_eq!(lead.status, LeadStatus::Qualified);
    }

    #[test]
    fn inbound_before_any_outbound_is_ignored() {
        let status = apply_contact_event(ContactStatus::NeverContacted, ContactEvent::InboundObserved);
        assert_eq!(status, ContactStatus::NeverContacted);
    }

    #[test]
    fn auto_send_never_contacted_is_first_contact() {
        assert_eq!(can_auto_send(&lead(), Utc::now()), AutoSendDecision::FirstContact);
    }

    #[test]
    fn auto_send_awaiting_reply_needs_two_days() {
        let mut lead = lead();
        let now = Utc::now();
        lead.apply_contact_event(ContactEvent::OutboundSent, now - Duration::days(1));
        assert_eq!(
            can_auto_send(&lead, now),
            AutoSendDecision::Blocked { reason: "awaiting_reply_too_recent" }
        );

        lead.awaiting_reply_since = Some(now - Duration::days(3));
        assert_eq!(can_auto_send(&lead, now), AutoSendDecision::FollowUp);
    }

    #[test]
    fn auto_send_blocked_for_customers() {
        let mut lead = lead();
        lead.apply_contact_event(ContactEvent::Converted, Utc::now());
        assert_eq!(
            can_auto_send(&lead, Utc::now()),
            AutoSendDecision::Blocked { reason: "already_customer" }
        );
    }

    #[test]
    fn temperature_bump_clamps() {
        let mut lead = lead();
        lead.temperature_score = 98;
        lead.bump_temperature(5);
        assert_eq!(lead.temperature_score, 100);
        lead.temperature_score = 2;
        lead.bump_temperature(-5);
        assert_eq!(lead.temperature_score, 0);
    }

    #[test]
    fn temperature_tag_derives_from_score() {
        assert_eq!(Temperature::from_score(10), Temperature::Cold);
        assert_eq!(Temperature::from_score(50), Temperature::Warm);
        assert_eq!(Temperature::from_score(90), Temperature::Hot);
    }

    #[test]
    fn merge_tags_is_case_insensitive_dedup() {
        let mut lead = lead();
        lead.merge_tags(vec!["Fitness".to_string(), "vip".to_string()]);
        lead.merge_tags(vec!["fitness".to_string(), "neu".to_string()]);
        assert_eq!(lead.tags, vec!["Fitness", "vip", "neu"]);
    }

    #[test]
    fn sales_stage_bounds_enforced() {
        let mut lead = lead();
        assert!(lead.set_sales_stage(8, Utc::now()).is_ok());
        assert!(lead.set_sales_stage(9, Utc::now()).is_err());
    }
}
