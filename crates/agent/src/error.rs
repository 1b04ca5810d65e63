use thiserror::Error;
use uuid::Uuid;

use chief_db::repositories::RepositoryError;
use chief_llm::LlmError;

/// Failures that escape the orchestrator. Tool-level failures never show
/// up here — they are folded into the tool result envelope instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no profile found for user {0}")]
    UnknownUser(Uuid),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Provider(#[from] LlmError),
}
