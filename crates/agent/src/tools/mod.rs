//! Tool registry and executor.
//!
//! The catalog is data (`registry::catalog()`); execution is a single
//! `match` on the tool name. Handlers are the only code that mutates the
//! domain model, and nothing a handler does can escape the result
//! envelope — every failure becomes `{ success: false, error }`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use chief_core::config::IntegrationsConfig;
use chief_core::{DomainError, Lead, LeadId, UserId, UserProfile};
use chief_db::repositories::RepositoryError;

use crate::Repositories;

pub mod content;
pub mod followups;
pub mod interactions;
pub mod leads;
pub mod memory;
pub mod messaging;
pub mod registry;
pub mod stats;

/// Uniform result envelope handed back to the model as a tool message.
#[derive(Clone, Debug, Serialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ToolOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), payload: Map::new() }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut payload = Map::new();
        payload.insert("error".to_string(), Value::String(message.clone()));
        Self { success: false, message, payload }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            json!({ "success": false, "error": "unserialisable tool result" }).to_string()
        })
    }
}

/// Internal handler failure, folded into the envelope by the executor.
#[derive(Debug)]
pub(crate) enum ToolError {
    Message(String),
    DuplicateFollowUp { existing_id: Uuid, existing_due_at: DateTime<Utc> },
    Disabled(&'static str),
}

impl ToolError {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<RepositoryError> for ToolError {
    fn from(error: RepositoryError) -> Self {
        Self::Message(format!("Speicherfehler: {error}"))
    }
}

impl From<DomainError> for ToolError {
    fn from(error: DomainError) -> Self {
        Self::Message(error.to_string())
    }
}

pub(crate) type ToolResult = Result<ToolOutcome, ToolError>;

pub struct ToolExecutor {
    pub(crate) repos: Repositories,
    pub(crate) integrations: IntegrationsConfig,
    pub(crate) http: reqwest::Client,
}

impl ToolExecutor {
    pub fn new(repos: Repositories, integrations: IntegrationsConfig) -> Self {
        Self { repos, integrations, http: reqwest::Client::new() }
    }

    /// Run one tool call. `arguments` is the raw JSON string from the
    /// provider; `now` is injected so date policy is testable.
    pub async fn execute(
        &self,
        profile: &UserProfile,
        name: &str,
        arguments: &str,
        now: DateTime<Utc>,
    ) -> ToolOutcome {
        let args: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(arguments) {
                Ok(value) => value,
                Err(error) => {
                    return ToolOutcome::fail(format!("Ungueltige Tool-Argumente: {error}"))
                }
            }
        };

        let result = self.dispatch(profile, name, &args, now).await;
        match result {
            Ok(outcome) => outcome,
            Err(ToolError::Message(message)) => {
                warn!(event_name = "tool_failed", tool = name, error = %message);
                ToolOutcome::fail(message)
            }
            Err(ToolError::DuplicateFollowUp { existing_id, existing_due_at }) => {
                ToolOutcome::fail(
                    "Fuer diesen Lead existiert bereits ein offenes Follow-up. \
                     Nutze update_follow_up statt eines neuen Eintrags.",
                )
                .with("existing_id", json!(existing_id))
                .with("existing_due_at", json!(existing_due_at.to_rfc3339()))
            }
            Err(ToolError::Disabled(integration)) => ToolOutcome::fail(format!(
                "{integration} ist nicht konfiguriert. Der zugehoerige API-Schluessel fehlt."
            )),
        }
    }

    async fn dispatch(
        &self,
        profile: &UserProfile,
        name: &str,
        args: &Value,
        now: DateTime<Utc>,
    ) -> ToolResult {
        let user_id = &profile.id;
        match name {
            // Reads.
            "list_leads" => stats::list_leads(self, user_id, args).await,
            "get_lead_details" => stats::get_lead_details(self, user_id, args).await,
            "get_lead_history" => stats::get_lead_history(self, user_id, args).await,
            "search_leads_by_tag" => stats::search_leads_by_tag(self, user_id, args).await,
            "list_followups" => stats::list_followups(self, user_id, args, now).await,
            "followup_inbox" => stats::followup_inbox(self, user_id, args).await,
            "today_summary" => stats::today_summary(self, user_id, now).await,
            "pipeline_stats" => stats::pipeline_stats(self, user_id).await,
            "performance_stats" => stats::performance_stats(self, user_id, now).await,
            "commission_status" => stats::commission_status(self, profile, now).await,
            "churn_risks" => stats::churn_risks(self, user_id, now).await,
            "get_calendar" => stats::get_calendar(self, user_id, args, now).await,
            "usage_report" => stats::usage_report(self, user_id, now).await,
            // Content.
            "draft_message" => content::draft_message(self, user_id, args).await,
            "handle_objection" => content::handle_objection(self, user_id, args).await,
            "generate_sequence" => content::generate_sequence(self, user_id, args).await,
            "generate_customer_protocol" => {
                content::generate_customer_protocol(self, user_id, args).await
            }
            // Lead writes.
            "create_lead" => leads::create_lead(self, user_id, args, now).await,
            "quick_update_lead" => leads::quick_update_lead(self, user_id, args, now).await,
            "update_lead_status" => leads::update_lead_status(self, user_id, args, now).await,
            "convert_to_customer" => leads::convert_to_customer(self, user_id, args, now).await,
            "update_lead_stage" => leads::update_lead_stage(self, user_id, args, now).await,
            // Follow-up writes.
            "create_follow_up" => followups::create_follow_up(self, user_id, args, now).await,
            "update_follow_up" => followups::update_follow_up(self, user_id, args, now).await,
            "bulk_create_followups" => {
                followups::bulk_create_followups(self, user_id, args, now).await
            }
            "start_followup_flow" => followups::start_followup_flow(self, user_id, args, now).await,
            // Logging.
            "log_interaction" => interactions::log_interaction(self, user_id, args, now).await,
            "log_message_sent" => interactions::log_message_sent(self, user_id, args, now).await,
            // Memory.
            "save_user_knowledge" => memory::save_user_knowledge(self, user_id, args).await,
            "save_user_preference" => memory::save_user_preference(self, user_id, args).await,
            // External effects.
            "prepare_message" => messaging::prepare_message(self, user_id, args).await,
            "research_company" => messaging::research_company(self, args).await,
            "schedule_meeting" => messaging::schedule_meeting(self, user_id, args, now).await,
            other => Err(ToolError::msg(format!("Unbekanntes Tool `{other}`"))),
        }
    }
}

/// Resolve a `lead_name_or_id` argument: UUID lookup first, then a
/// case-insensitive substring match with exact-equality preference.
pub(crate) async fn resolve_lead(
    repos: &Repositories,
    user_id: &UserId,
    raw: &str,
) -> Result<Lead, ToolError> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<Uuid>() {
        if let Some(lead) = repos.leads.find_by_id(user_id, &LeadId(id)).await? {
            return Ok(lead);
        }
    }

    let matches = repos.leads.find_by_name(user_id, raw).await?;
    if matches.is_empty() {
        return Err(ToolError::msg(format!("Kein Lead gefunden fuer `{raw}`")));
    }
    Ok(matches
        .iter()
        .find(|lead| lead.name.eq_ignore_ascii_case(raw))
        .unwrap_or(&matches[0])
        .clone())
}

pub(crate) fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arg_str(args, key).ok_or_else(|| ToolError::msg(format!("Pflichtfeld `{key}` fehlt")))
}

pub(crate) fn arg_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

/// A list argument: either a JSON array of strings or one comma-joined
/// string.
pub(crate) fn arg_strings(args: &Value, key: &str) -> Vec<String> {
    match args.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::executor_with_user;
    use super::*;

    #[tokio::test]
    async fn unknown_tool_is_a_failed_envelope() {
        let (executor, profile) = executor_with_user().await;
        let outcome = executor.execute(&profile, "fly_to_moon", "{}", Utc::now()).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("fly_to_moon"));
    }

    #[tokio::test]
    async fn malformed_arguments_are_a_failed_envelope() {
        let (executor, profile) = executor_with_user().await;
        let outcome = executor.execute(&profile, "list_leads", "{not json", Utc::now()).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn resolve_prefers_exact_name_match() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Anna Steiner")).await.unwrap();
        executor.repos.leads.save(Lead::new(profile.id, "Anna")).await.unwrap();

        let lead = resolve_lead(&executor.repos, &profile.id, "anna").await.unwrap();
        assert_eq!(lead.name, "Anna");
    }

    #[tokio::test]
    async fn resolve_accepts_a_uuid() {
        let (executor, profile) = executor_with_user().await;
        let lead = Lead::new(profile.id, "Lisa Huber");
        executor.repos.leads.save(lead.clone()).await.unwrap();

        let found = resolve_lead(&executor.repos, &profile.id, &lead.id.0.to_string())
            .await
            .unwrap();
        assert_eq!(found.id, lead.id);
    }

    #[tokio::test]
    async fn resolve_never_crosses_owners() {
        let (executor, profile) = executor_with_user().await;
        let stranger = UserId(Uuid::new_v4());
        executor.repos.leads.save(Lead::new(stranger, "Lisa Huber")).await.unwrap();

        assert!(resolve_lead(&executor.repos, &profile.id, "Lisa").await.is_err());
    }

    #[test]
    fn envelope_json_flattens_payload() {
        let outcome = ToolOutcome::ok("erledigt").with("lead_id", json!("abc"));
        let value: Value = serde_json::from_str(&outcome.to_json()).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["lead_id"], json!("abc"));
    }

    #[test]
    fn failure_envelope_carries_error_field() {
        let value: Value = serde_json::from_str(&ToolOutcome::fail("kaputt").to_json()).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("kaputt"));
    }
}
