//! The request loop: quota gate, Power-Hour preempt, classification,
//! context assembly, routed completion, sequential tool execution, and
//! transcript/usage persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use chief_core::config::IntegrationsConfig;
use chief_core::domain::chat::{ChatRole, StoredChatMessage};
use chief_core::{intent, tokens, UserId};
use chief_llm::{ChatMessage, ChatProvider, ModelCatalog, ToolChoice};

use crate::classify::classify;
use crate::context::ContextLoader;
use crate::error::AgentError;
use crate::power_hour;
use crate::prompt::{self, PromptOptions};
use crate::quota::QuotaGate;
use crate::tools::{registry, ToolExecutor};
use crate::usage::UsageTracker;
use crate::{learning, ProfileCache, Repositories};

/// How many prior turns ride along as conversational memory.
const MAX_HISTORY_TURNS: usize = 5;
/// Hard ceiling on provider round-trips per request.
const MAX_TOOL_ROUNDS: usize = 6;

#[derive(Clone, Debug)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug)]
pub struct AgentRequest {
    pub user_id: UserId,
    pub message: String,
    pub session_id: Option<Uuid>,
    pub history: Vec<HistoryTurn>,
}

#[derive(Clone, Debug)]
pub struct AgentResponse {
    pub message: String,
    pub tools_used: Vec<String>,
    pub session_id: Uuid,
    pub model: Option<String>,
    pub limit_reached: bool,
    pub power_hour: bool,
}

pub struct Orchestrator {
    repos: Repositories,
    provider: Arc<dyn ChatProvider>,
    catalog: ModelCatalog,
    loader: ContextLoader,
    executor: ToolExecutor,
    quota: QuotaGate,
    tracker: UsageTracker,
}

impl Orchestrator {
    pub fn new(
        repos: Repositories,
        provider: Arc<dyn ChatProvider>,
        catalog: ModelCatalog,
        integrations: IntegrationsConfig,
    ) -> Self {
        let cache = Arc::new(ProfileCache::new());
        Self {
            loader: ContextLoader::new(repos.clone(), cache),
            executor: ToolExecutor::new(repos.clone(), integrations),
            quota: QuotaGate::new(repos.usage.clone()),
            tracker: UsageTracker::new(repos.usage.clone()),
            repos,
            provider,
            catalog,
        }
    }

    pub async fn handle(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        self.handle_at(request, Utc::now()).await
    }

    pub async fn handle_at(
        &self,
        request: AgentRequest,
        now: DateTime<Utc>,
    ) -> Result<AgentResponse, AgentError> {
        let profile = self.loader.profile(&request.user_id).await?;
        let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);

        self.repos
            .transcripts
            .append(StoredChatMessage::new(
                session_id,
                profile.id,
                ChatRole::User,
                &request.message,
            ))
            .await?;

        if let Some(limit) = self.quota.check(&profile, now.date_naive()).await? {
            info!(event_name = "quota_blocked", user_id = %profile.id.0, used = limit.used);
            let message = limit.user_message();
            self.persist_assistant(session_id, &profile.id, &message, &[]).await?;
            return Ok(AgentResponse {
                message,
                tools_used: Vec::new(),
                session_id,
                model: None,
                limit_reached: true,
                power_hour: power_hour::is_active(&self.repos, &profile).await?,
            });
        }

        let power_hour_active = power_hour::is_active(&self.repos, &profile).await?;
        if let Some(reply) =
            power_hour::preempt(&self.repos, &profile, &request.message, now).await?
        {
            self.persist_assistant(session_id, &profile.id, &reply, &[]).await?;
            return Ok(AgentResponse {
                message: reply,
                tools_used: Vec::new(),
                session_id,
                model: None,
                limit_reached: false,
                power_hour: true,
            });
        }

        let intent = classify(self.provider.as_ref(), &self.catalog, &request.message).await;
        let needs_tools = intent::needs_tools(intent, &request.message);

        let bundle = self.loader.load(&profile.id, Some(&request.message)).await?;
        let system = prompt::assemble(&bundle, &PromptOptions { power_hour_active });

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::system(system));
        let skip = request.history.len().saturating_sub(MAX_HISTORY_TURNS);
        for turn in request.history.iter().skip(skip) {
            match turn.role.as_str() {
                "assistant" => messages.push(ChatMessage::assistant(turn.content.clone())),
                _ => messages.push(ChatMessage::user(turn.content.clone())),
            }
        }
        messages.push(ChatMessage::user(request.message.clone()));

        let estimated = tokens::estimate_messages(
            messages.iter().filter_map(|m| m.content.as_deref()),
        );
        let mut choice = self.catalog.route(intent, needs_tools, &request.message, estimated);
        info!(
            event_name = "request_routed",
            intent = intent.as_str(),
            model = %choice.name,
            needs_tools,
            estimated_tokens = estimated
        );

        let tool_specs = needs_tools.then(registry::catalog);
        let mut intent_label = intent.as_str().to_string();
        let mut tools_used: Vec<String> = Vec::new();
        let mut limit_reached = false;
        let mut rounds = 0usize;
        let reply = loop {
            // Past the round ceiling the model must answer in text.
            let tool_choice = tool_specs.as_ref().map(|_| {
                if rounds < MAX_TOOL_ROUNDS { ToolChoice::Auto } else { ToolChoice::None }
            });
            let completion = self
                .provider
                .complete(&choice, &messages, tool_specs.as_deref(), tool_choice)
                .await?;
            rounds += 1;
            self.tracker
                .record_call(
                    &profile,
                    &choice.name,
                    &intent_label,
                    Some(session_id),
                    completion.tool_calls.len() as u32,
                    completion.usage,
                    now,
                )
                .await?;

            if !completion.wants_tools() {
                break completion.content;
            }
            if rounds > MAX_TOOL_ROUNDS {
                warn!(event_name = "tool_loop_ceiling", rounds);
                break completion.content;
            }

            messages.push(ChatMessage::assistant_tool_calls(completion.tool_calls.clone()));
            for call in &completion.tool_calls {
                let outcome = self
                    .executor
                    .execute(&profile, &call.function.name, &call.function.arguments, now)
                    .await;
                info!(
                    event_name = "tool_executed",
                    tool = %call.function.name,
                    success = outcome.success
                );
                tools_used.push(call.function.name.clone());
                messages.push(ChatMessage::tool_result(call.id.clone(), outcome.to_json()));
            }

            // Tool results mid-loop can only make the next call bigger, so
            // the gate runs again before every round.
            if let Some(limit) = self.quota.check(&profile, now.date_naive()).await? {
                limit_reached = true;
                break limit.user_message();
            }
            choice = self.catalog.route_followup();
            intent_label = format!("{}_followup", intent.as_str());
        };

        self.persist_assistant(session_id, &profile.id, &reply, &tools_used).await?;

        if !limit_reached {
            learning::extract_and_store(
                self.provider.as_ref(),
                &self.catalog,
                self.repos.knowledge.as_ref(),
                &profile.id,
                &request.message,
                &reply,
            )
            .await;
        }

        Ok(AgentResponse {
            message: reply,
            tools_used,
            session_id,
            model: Some(choice.name),
            limit_reached,
            power_hour: power_hour_active,
        })
    }

    async fn persist_assistant(
        &self,
        session_id: Uuid,
        user_id: &UserId,
        content: &str,
        tools_used: &[String],
    ) -> Result<(), AgentError> {
        let mut row = StoredChatMessage::new(session_id, *user_id, ChatRole::Assistant, content);
        if !tools_used.is_empty() {
            row.tool_calls = Some(json!(tools_used));
        }
        self.repos.transcripts.append(row).await?;
        Ok(())
    }
}
