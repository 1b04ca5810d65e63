//! The coaching endpoint: one POST carries a user message through the
//! orchestrator and returns the assistant reply plus session metadata.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
    Router,
};
use chief_agent::{AgentError, AgentRequest, AgentResponse, HistoryTurn, Orchestrator};
use chief_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct AgentApiState {
    orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub message: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub history: Vec<RunHistoryTurn>,
}

#[derive(Debug, Deserialize)]
pub struct RunHistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub message: String,
    pub tools_used: Vec<String>,
    pub session_id: Uuid,
    pub model: Option<String>,
    pub limit_reached: bool,
    pub power_hour: bool,
}

impl From<AgentResponse> for RunResponse {
    fn from(response: AgentResponse) -> Self {
        Self {
            message: response.message,
            tools_used: response.tools_used,
            session_id: response.session_id,
            model: response.model,
            limit_reached: response.limit_reached,
            power_hour: response.power_hour,
        }
    }
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/agent/run", post(run))
        .with_state(AgentApiState { orchestrator })
}

pub async fn run(
    State(state): State<AgentApiState>,
    Json(request): Json<RunRequest>,
) -> axum::response::Response {
    let agent_request = AgentRequest {
        user_id: UserId(request.user_id),
        message: request.message,
        session_id: request.session_id,
        history: request
            .history
            .into_iter()
            .map(|turn| HistoryTurn { role: turn.role, content: turn.content })
            .collect(),
    };

    match state.orchestrator.handle(agent_request).await {
        Ok(response) => {
            info!(
                event_name = "agent_run_completed",
                session_id = %response.session_id,
                tools_used = response.tools_used.len(),
                limit_reached = response.limit_reached,
                "agent run completed"
            );
            (StatusCode::OK, Json(RunResponse::from(response))).into_response()
        }
        Err(error) => {
            let status = match &error {
                AgentError::UnknownUser(_) => StatusCode::NOT_FOUND,
                AgentError::Provider(_) => StatusCode::BAD_GATEWAY,
                AgentError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error!(event_name = "agent_run_failed", error = %error, "agent run failed");
            (status, Json(json!({ "error": error.to_string() }))).into_response()
        }
    }
}
