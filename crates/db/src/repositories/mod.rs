use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use chief_core::domain::chat::StoredChatMessage;
use chief_core::domain::context::OutreachState;
use chief_core::domain::followup::{FollowUpId, FollowUpStatus, FollowUpSuggestion};
use chief_core::domain::interaction::InteractionLog;
use chief_core::domain::knowledge::KnowledgeEntry;
use chief_core::domain::lead::{Lead, LeadId, LeadStatus};
use chief_core::domain::pending::PendingAction;
use chief_core::domain::power_hour::PowerHourSession;
use chief_core::domain::preference::UserPreference;
use chief_core::domain::usage::{DailyUsage, UsageRecord};
use chief_core::domain::user::{OrgId, Organization, UserId, UserProfile};

pub mod chat;
pub mod followup;
pub mod interaction;
pub mod knowledge;
pub mod lead;
pub mod memory;
pub mod pending;
pub mod power_hour;
pub mod profile;
pub mod usage;

pub use chat::SqlTranscriptRepository;
pub use followup::SqlFollowUpRepository;
pub use interaction::SqlInteractionRepository;
pub use knowledge::{SqlInsightRepository, SqlKnowledgeRepository, SqlPreferenceRepository};
pub use lead::SqlLeadRepository;
pub use memory::{
    InMemoryFollowUpRepository, InMemoryInsightRepository, InMemoryInteractionRepository,
    InMemoryKnowledgeRepository, InMemoryLeadRepository, InMemoryPendingActionRepository,
    InMemoryPowerHourRepository, InMemoryPreferenceRepository, InMemoryProfileRepository,
    InMemoryTranscriptRepository, InMemoryUsageRepository,
};
pub use pending::SqlPendingActionRepository;
pub use power_hour::SqlPowerHourRepository;
pub use profile::SqlProfileRepository;
pub use usage::SqlUsageRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<chief_core::DomainError> for RepositoryError {
    fn from(error: chief_core::DomainError) -> Self {
        RepositoryError::Decode(error.to_string())
    }
}

impl RepositoryError {
    /// Whether the underlying failure was a SQLite unique-constraint hit.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_profile(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError>;
    async fn save_profile(&self, profile: UserProfile) -> Result<(), RepositoryError>;
    async fn find_organization(&self, id: &OrgId)
        -> Result<Option<Organization>, RepositoryError>;
    async fn save_organization(&self, organization: Organization)
        -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(
        &self,
        user_id: &UserId,
        id: &LeadId,
    ) -> Result<Option<Lead>, RepositoryError>;

    /// Case-insensitive substring match against the lead name.
    async fn find_by_name(
        &self,
        user_id: &UserId,
        fragment: &str,
    ) -> Result<Vec<Lead>, RepositoryError>;

    async fn list_recent(&self, user_id: &UserId, limit: u32)
        -> Result<Vec<Lead>, RepositoryError>;

    async fn list_by_status(
        &self,
        user_id: &UserId,
        status: LeadStatus,
    ) -> Result<Vec<Lead>, RepositoryError>;

    async fn search_by_tag(&self, user_id: &UserId, tag: &str)
        -> Result<Vec<Lead>, RepositoryError>;

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError>;

    async fn status_counts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<(LeadStatus, u64)>, RepositoryError>;

    /// Ghost and awaiting-reply counts. A lead is a ghost when it has been
    /// awaiting a reply since before `ghost_cutoff`.
    async fn outreach_state(
        &self,
        user_id: &UserId,
        ghost_cutoff: DateTime<Utc>,
    ) -> Result<OutreachState, RepositoryError>;

    async fn month_won_revenue(
        &self,
        user_id: &UserId,
        month_start: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError>;

    /// Customers with no logged contact in either direction since `cutoff`.
    async fn inactive_customers(
        &self,
        user_id: &UserId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Lead>, RepositoryError>;
}

#[async_trait]
pub trait FollowUpRepository: Send + Sync {
    async fn find_by_id(
        &self,
        user_id: &UserId,
        id: &FollowUpId,
    ) -> Result<Option<FollowUpSuggestion>, RepositoryError>;

    async fn find_pending_for_lead(
        &self,
        user_id: &UserId,
        lead_id: &LeadId,
    ) -> Result<Option<FollowUpSuggestion>, RepositoryError>;

    async fn list_due_between(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FollowUpSuggestion>, RepositoryError>;

    async fn list_pending(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<FollowUpSuggestion>, RepositoryError>;

    async fn save(&self, suggestion: FollowUpSuggestion) -> Result<(), RepositoryError>;

    async fn set_status(
        &self,
        user_id: &UserId,
        id: &FollowUpId,
        status: FollowUpStatus,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn append(&self, log: InteractionLog) -> Result<(), RepositoryError>;

    async fn list_for_lead(
        &self,
        user_id: &UserId,
        lead_id: &LeadId,
        limit: u32,
    ) -> Result<Vec<InteractionLog>, RepositoryError>;

    async fn recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<InteractionLog>, RepositoryError>;
}

#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    async fn list(&self, user_id: &UserId) -> Result<Vec<KnowledgeEntry>, RepositoryError>;

    /// Insert unless an identical (owner, category, content) row exists.
    /// Returns whether a row was written.
    async fn insert_if_new(&self, entry: KnowledgeEntry) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn list(&self, user_id: &UserId) -> Result<Vec<UserPreference>, RepositoryError>;
    async fn upsert(&self, preference: UserPreference) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InsightRepository: Send + Sync {
    async fn recent(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, RepositoryError>;

    async fn append(&self, user_id: &UserId, insight: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TranscriptRepository: Send + Sync {
    async fn append(&self, message: StoredChatMessage) -> Result<(), RepositoryError>;

    /// Most recent messages of a session in chronological order.
    async fn recent_for_session(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<StoredChatMessage>, RepositoryError>;
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn append(&self, record: UsageRecord) -> Result<(), RepositoryError>;

    /// Accumulate into the (owner, date) daily row.
    async fn add_daily(&self, delta: DailyUsage) -> Result<(), RepositoryError>;

    async fn month_tokens(
        &self,
        user_id: &UserId,
        month_start: NaiveDate,
    ) -> Result<u64, RepositoryError>;

    async fn daily_summary(
        &self,
        user_id: &UserId,
        since: NaiveDate,
    ) -> Result<Vec<DailyUsage>, RepositoryError>;

    /// Total (tokens, cost) across an organization since `since`.
    async fn org_totals(
        &self,
        organization_id: &OrgId,
        since: DateTime<Utc>,
    ) -> Result<(u64, Decimal), RepositoryError>;

    async fn records_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>, RepositoryError>;
}

#[async_trait]
pub trait PowerHourRepository: Send + Sync {
    async fn find_active(&self, user_id: &UserId)
        -> Result<Option<PowerHourSession>, RepositoryError>;
    async fn save(&self, session: PowerHourSession) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PendingActionRepository: Send + Sync {
    async fn due_on(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<PendingAction>, RepositoryError>;

    async fn save(&self, action: PendingAction) -> Result<(), RepositoryError>;
}

pub(crate) fn decode_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(e.to_string())
}

pub(crate) fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_err)
}

pub(crate) fn parse_datetime_opt(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|s| parse_datetime(&s)).transpose()
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, RepositoryError> {
    raw.parse().map_err(decode_err)
}

pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal, RepositoryError> {
    raw.parse().map_err(decode_err)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(decode_err)
}
