//! Core domain model and deterministic algorithms for the CHIEF sales agent.
//!
//! Everything in this crate is pure: no I/O, no clocks other than the ones
//! callers pass in. The orchestrator (`chief-agent`) and the persistence
//! layer (`chief-db`) both build on these types.
//!
//! # Safety Principle
//!
//! The LLM is an untrusted executor. It never decides state transitions,
//! due dates, or contact normalisation — those are deterministic functions
//! in this crate, and tool handlers apply them before anything is written.

pub mod channel;
pub mod config;
pub mod contact;
pub mod dates;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod tokens;

pub use chrono;
pub use uuid;

pub use channel::{Channel, Direction, NextMessageKind, TranscriptAnalysis};
pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::followup::{FlowTag, FollowUpId, FollowUpStatus, FollowUpSuggestion, Priority};
pub use domain::lead::{
    AutoSendDecision, ContactEvent, ContactStatus, Lead, LeadId, LeadStatus, Temperature,
};
pub use domain::user::{OrgId, PlanTier, UserId, UserProfile};
pub use errors::DomainError;
pub use intent::Intent;
