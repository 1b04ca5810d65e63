//! Conversation logging. Every logged touch updates the lead's contact
//! state so the outreach overview stays truthful.

use chrono::{DateTime, Days, Utc};
use serde_json::{json, Value};

use chief_core::dates::{at_due_time, resolve_due_at, FALLBACK_DAYS};
use chief_core::domain::followup::FollowUpSuggestion;
use chief_core::domain::interaction::{InteractionDetails, InteractionLog, Outcome};
use chief_core::domain::lead::ContactEvent;
use chief_core::{Channel, UserId};

use super::{arg_str, arg_strings, require_str, resolve_lead, ToolError, ToolExecutor, ToolOutcome, ToolResult};

pub(crate) async fn log_interaction(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let mut lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let summary = require_str(args, "summary")?;

    let outcome = match arg_str(args, "outcome") {
        Some(raw) => Some(raw.parse::<Outcome>().map_err(ToolError::from)?),
        None => None,
    };
    let tags = arg_strings(args, "tags");

    let mut log = InteractionLog::new(*user_id, lead.id, summary);
    log.channel = arg_str(args, "channel").and_then(|raw| raw.parse::<Channel>().ok());
    log.outcome = outcome;
    log.occurred_at = now;
    log.details = InteractionDetails {
        key_facts: arg_strings(args, "key_facts"),
        tags: tags.clone(),
        next_steps: arg_str(args, "next_steps").map(str::to_string),
        objections: arg_strings(args, "objections"),
        budget: arg_str(args, "budget").map(str::to_string),
        timeline: arg_str(args, "timeline").map(str::to_string),
    };
    exec.repos.interactions.append(log.clone()).await?;

    lead.merge_tags(tags);
    if let Some(outcome) = outcome {
        lead.bump_temperature(outcome.temperature_delta());
    }
    lead.apply_contact_event(ContactEvent::InboundObserved, now);
    lead.updated_at = now;
    exec.repos.leads.save(lead.clone()).await?;

    let mut result = ToolOutcome::ok(format!("Gespraech mit `{}` geloggt.", lead.name))
        .with("interaction_id", json!(log.id.0))
        .with("temperature_score", json!(lead.temperature_score));

    if let Some(raw) = arg_str(args, "follow_up_date") {
        if exec.repos.follow_ups.find_pending_for_lead(user_id, &lead.id).await?.is_none() {
            let (due_at, _) = resolve_due_at(raw, now);
            let suggestion = FollowUpSuggestion::manual(
                *user_id,
                lead.id,
                due_at,
                log.details.next_steps.clone().or_else(|| Some(summary.to_string())),
            );
            exec.repos.follow_ups.save(suggestion.clone()).await?;
            result = result
                .with("follow_up_id", json!(suggestion.id.0))
                .with("follow_up_due_at", json!(due_at.to_rfc3339()));
        }
    }
    Ok(result)
}

/// Record an outbound message. The lead moves to awaiting-reply and gets
/// a safety-net follow-up if none is open.
pub(crate) async fn log_message_sent(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let mut lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let channel = arg_str(args, "channel").and_then(|raw| raw.parse::<Channel>().ok());

    let mut log = InteractionLog::new(
        *user_id,
        lead.id,
        arg_str(args, "message")
            .map(|text| format!("Nachricht gesendet: {text}"))
            .unwrap_or_else(|| "Nachricht gesendet".to_string()),
    );
    log.channel = channel;
    log.occurred_at = now;
    exec.repos.interactions.append(log).await?;

    lead.apply_contact_event(ContactEvent::OutboundSent, now);
    if lead.source_channel.is_none() {
        lead.source_channel = channel;
    }
    lead.updated_at = now;
    exec.repos.leads.save(lead.clone()).await?;

    let mut result = ToolOutcome::ok(format!(
        "Versand an `{}` protokolliert. Der Lead wartet jetzt auf Antwort.",
        lead.name
    ))
    .with("lead_id", json!(lead.id.0));

    if exec.repos.follow_ups.find_pending_for_lead(user_id, &lead.id).await?.is_none() {
        let due_at = at_due_time(
            now.date_naive()
                .checked_add_days(Days::new(FALLBACK_DAYS as u64))
                .unwrap_or_else(|| now.date_naive()),
        );
        let suggestion = FollowUpSuggestion::manual(
            *user_id,
            lead.id,
            due_at,
            Some("Nachfassen nach Erstnachricht".to_string()),
        );
        exec.repos.follow_ups.save(suggestion.clone()).await?;
        result = result
            .with("follow_up_id", json!(suggestion.id.0))
            .with("follow_up_due_at", json!(due_at.to_rfc3339()));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use chief_core::domain::lead::{ContactStatus, Lead, LeadStatus};

    use crate::tools::testutil::executor_with_user;

    use super::*;

    #[tokio::test]
    async fn positive_outcome_warms_the_lead_and_merges_tags() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Anna Steiner")).await.unwrap();

        let outcome = log_interaction(
            &executor,
            &profile.id,
            &json!({
                "lead": "Anna Steiner",
                "summary": "Langes Gespraech, will Infos zum Starterpaket",
                "outcome": "positiv",
                "tags": ["starterpaket"],
            }),
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(outcome.success);

        let lead = resolve_lead(&executor.repos, &profile.id, "Anna Steiner").await.unwrap();
        assert_eq!(lead.temperature_score, 20);
        assert!(lead.tags.contains(&"starterpaket".to_string()));
        assert!(lead.last_inbound_at.is_some());
    }

    #[tokio::test]
    async fn a_reply_after_outreach_ends_the_waiting_state() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Nora Antwort")).await.unwrap();
        log_message_sent(
            &executor,
            &profile.id,
            &json!({ "lead": "Nora Antwort", "channel": "whatsapp" }),
            Utc::now(),
        )
        .await
        .unwrap();

        log_interaction(
            &executor,
            &profile.id,
            &json!({ "lead": "Nora Antwort", "summary": "Hat geantwortet, klingt interessiert" }),
            Utc::now(),
        )
        .await
        .unwrap();

        let lead = resolve_lead(&executor.repos, &profile.id, "Nora Antwort").await.unwrap();
        assert_eq!(lead.contact_status, ContactStatus::InConversation);
        assert!(lead.awaiting_reply_since.is_none());
    }

    #[tokio::test]
    async fn interaction_can_plan_a_followup_inline() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Max Beispiel")).await.unwrap();

        let outcome = log_interaction(
            &executor,
            &profile.id,
            &json!({
                "lead": "Max Beispiel",
                "summary": "Will naechste Woche entscheiden",
                "follow_up_date": "in 7 Tagen",
            }),
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(outcome.payload.contains_key("follow_up_id"));
    }

    #[tokio::test]
    async fn sent_message_moves_the_lead_to_awaiting_reply() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Lisa Huber")).await.unwrap();

        let outcome = log_message_sent(
            &executor,
            &profile.id,
            &json!({ "lead": "Lisa Huber", "channel": "instagram" }),
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(outcome.success);
        assert!(outcome.payload.contains_key("follow_up_id"));

        let lead = resolve_lead(&executor.repos, &profile.id, "Lisa Huber").await.unwrap();
        assert_eq!(lead.status, LeadStatus::Contacted);
        assert_eq!(lead.contact_status, ContactStatus::AwaitingReply);
        assert!(lead.awaiting_reply_since.is_some());
        assert_eq!(lead.source_channel, Some(Channel::Instagram));
    }

    #[tokio::test]
    async fn second_sent_message_does_not_duplicate_the_followup() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Tom Zwei")).await.unwrap();
        let args = json!({ "lead": "Tom Zwei", "channel": "whatsapp" });

        log_message_sent(&executor, &profile.id, &args, Utc::now()).await.unwrap();
        let second = log_message_sent(&executor, &profile.id, &args, Utc::now()).await.unwrap();
        assert!(second.success);
        assert!(!second.payload.contains_key("follow_up_id"));
    }
}
