//! The CHIEF orchestrator: intent classification, layered context
//! loading, tiered model routing, the tool-calling loop, quota gating,
//! usage accounting, the Power-Hour fast path, and learning extraction.
//!
//! Everything here is wired through injected dependencies — repositories
//! behind trait objects, the provider behind [`chief_llm::ChatProvider`] —
//! so the whole loop runs unchanged against sqlite or in-memory stores.

use std::sync::Arc;

use chief_db::repositories::{
    FollowUpRepository, InMemoryFollowUpRepository, InMemoryInsightRepository,
    InMemoryInteractionRepository, InMemoryKnowledgeRepository, InMemoryLeadRepository,
    InMemoryPendingActionRepository, InMemoryPowerHourRepository, InMemoryPreferenceRepository,
    InMemoryProfileRepository, InMemoryTranscriptRepository, InMemoryUsageRepository,
    InsightRepository, InteractionRepository, KnowledgeRepository, LeadRepository,
    PendingActionRepository, PowerHourRepository, PreferenceRepository, ProfileRepository,
    SqlFollowUpRepository, SqlInsightRepository, SqlInteractionRepository, SqlKnowledgeRepository,
    SqlLeadRepository, SqlPendingActionRepository, SqlPowerHourRepository, SqlPreferenceRepository,
    SqlProfileRepository, SqlTranscriptRepository, SqlUsageRepository, TranscriptRepository,
    UsageRepository,
};
use chief_db::DbPool;

pub mod cache;
pub mod classify;
pub mod context;
pub mod error;
pub mod learning;
pub mod power_hour;
pub mod prompt;
pub mod quota;
pub mod runtime;
pub mod tools;
pub mod usage;

pub use cache::ProfileCache;
pub use context::{ContextBundle, ContextLoader};
pub use error::AgentError;
pub use prompt::PromptOptions;
pub use quota::{LimitReached, QuotaGate};
pub use runtime::{AgentRequest, AgentResponse, HistoryTurn, Orchestrator};
pub use tools::{ToolExecutor, ToolOutcome};
pub use usage::UsageTracker;

/// Every store the orchestrator touches, bundled behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub profiles: Arc<dyn ProfileRepository>,
    pub leads: Arc<dyn LeadRepository>,
    pub follow_ups: Arc<dyn FollowUpRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
    pub knowledge: Arc<dyn KnowledgeRepository>,
    pub preferences: Arc<dyn PreferenceRepository>,
    pub insights: Arc<dyn InsightRepository>,
    pub transcripts: Arc<dyn TranscriptRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub power_hours: Arc<dyn PowerHourRepository>,
    pub pending_actions: Arc<dyn PendingActionRepository>,
}

impl Repositories {
    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            profiles: Arc::new(SqlProfileRepository::new(pool.clone())),
            leads: Arc::new(SqlLeadRepository::new(pool.clone())),
            follow_ups: Arc::new(SqlFollowUpRepository::new(pool.clone())),
            interactions: Arc::new(SqlInteractionRepository::new(pool.clone())),
            knowledge: Arc::new(SqlKnowledgeRepository::new(pool.clone())),
            preferences: Arc::new(SqlPreferenceRepository::new(pool.clone())),
            insights: Arc::new(SqlInsightRepository::new(pool.clone())),
            transcripts: Arc::new(SqlTranscriptRepository::new(pool.clone())),
            usage: Arc::new(SqlUsageRepository::new(pool.clone())),
            power_hours: Arc::new(SqlPowerHourRepository::new(pool.clone())),
            pending_actions: Arc::new(SqlPendingActionRepository::new(pool)),
        }
    }

    /// Fully in-memory wiring, used by orchestrator tests and `doctor`.
    pub fn in_memory() -> Self {
        Self {
            profiles: Arc::new(InMemoryProfileRepository::default()),
            leads: Arc::new(InMemoryLeadRepository::default()),
            follow_ups: Arc::new(InMemoryFollowUpRepository::default()),
            interactions: Arc::new(InMemoryInteractionRepository::default()),
            knowledge: Arc::new(InMemoryKnowledgeRepository::default()),
            preferences: Arc::new(InMemoryPreferenceRepository::default()),
            insights: Arc::new(InMemoryInsightRepository::default()),
            transcripts: Arc::new(InMemoryTranscriptRepository::default()),
            usage: Arc::new(InMemoryUsageRepository::default()),
            power_hours: Arc::new(InMemoryPowerHourRepository::default()),
            pending_actions: Arc::new(InMemoryPendingActionRepository::default()),
        }
    }
}
