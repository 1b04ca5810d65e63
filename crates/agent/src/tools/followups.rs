//! Follow-up planning tools.
//!
//! One open follow-up per lead is the rule; a second create is rejected
//! with a pointer to the existing entry so the model can update instead.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use chief_core::dates::{resolve_due_at, DateResolution};
use chief_core::domain::followup::{
    FollowUpId, FollowUpStatus, FollowUpSuggestion, FlowTag, Priority,
};
use chief_core::domain::lead::LeadStatus;
use chief_core::UserId;

use super::{arg_str, require_str, resolve_lead, ToolError, ToolExecutor, ToolOutcome, ToolResult};

pub(crate) async fn create_follow_up(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;

    if let Some(existing) =
        exec.repos.follow_ups.find_pending_for_lead(user_id, &lead.id).await?
    {
        return Err(ToolError::DuplicateFollowUp {
            existing_id: existing.id.0,
            existing_due_at: existing.due_at,
        });
    }

    let (due_at, resolution) = resolve_due_at(arg_str(args, "date").unwrap_or(""), now);
    let suggestion = FollowUpSuggestion::manual(
        *user_id,
        lead.id,
        due_at,
        arg_str(args, "reason").map(str::to_string),
    );
    exec.repos.follow_ups.save(suggestion.clone()).await?;

    let mut outcome = ToolOutcome::ok(format!(
        "Follow-up fuer `{}` am {} geplant.",
        lead.name,
        due_at.format("%d.%m.%Y")
    ))
    .with("follow_up_id", json!(suggestion.id.0))
    .with("due_at", json!(due_at.to_rfc3339()));
    if matches!(
        resolution,
        DateResolution::HistoricalKept
            | DateResolution::BumpedToTomorrow
            | DateResolution::FallbackDefault
    ) {
        outcome = outcome.with("date_note", json!(format!("{resolution:?}")));
    }
    Ok(outcome)
}

pub(crate) async fn update_follow_up(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let Some(mut suggestion) =
        exec.repos.follow_ups.find_pending_for_lead(user_id, &lead.id).await?
    else {
        return Ok(ToolOutcome::fail(format!(
            "Kein offenes Follow-up fuer `{}`.",
            lead.name
        )));
    };

    let mut changed = false;
    if let Some(raw) = arg_str(args, "date") {
        let (due_at, _) = resolve_due_at(raw, now);
        suggestion.due_at = due_at;
        changed = true;
    }
    if let Some(reason) = arg_str(args, "reason") {
        suggestion.reason = Some(reason.to_string());
        changed = true;
    }
    if let Some(raw) = arg_str(args, "status") {
        suggestion.status = raw.parse::<FollowUpStatus>().map_err(ToolError::from)?;
        changed = true;
    }
    if !changed {
        return Ok(ToolOutcome::fail("Keine Aenderungen angegeben."));
    }

    exec.repos.follow_ups.save(suggestion.clone()).await?;
    Ok(ToolOutcome::ok(format!(
        "Follow-up fuer `{}` aktualisiert: {} am {}.",
        lead.name,
        suggestion.status.as_str(),
        suggestion.due_at.format("%d.%m.%Y")
    ))
    .with("follow_up_id", json!(suggestion.id.0))
    .with("due_at", json!(suggestion.due_at.to_rfc3339())))
}

/// Plan follow-ups for many leads at once. Leads with an open follow-up
/// are skipped, never duplicated.
pub(crate) async fn bulk_create_followups(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let leads = match arg_str(args, "status") {
        Some(raw) => {
            let status = raw.parse::<LeadStatus>().map_err(ToolError::from)?;
            exec.repos.leads.list_by_status(user_id, status).await?
        }
        None => exec.repos.leads.list_recent(user_id, 200).await?,
    };

    let (due_at, _) = resolve_due_at(arg_str(args, "date").unwrap_or(""), now);
    let reason = arg_str(args, "reason").map(str::to_string);

    let mut created = 0u32;
    let mut skipped = 0u32;
    for lead in &leads {
        if exec.repos.follow_ups.find_pending_for_lead(user_id, &lead.id).await?.is_some() {
            skipped += 1;
            continue;
        }
        let suggestion = FollowUpSuggestion::manual(*user_id, lead.id, due_at, reason.clone());
        exec.repos.follow_ups.save(suggestion).await?;
        created += 1;
    }

    Ok(ToolOutcome::ok(format!(
        "{created} Follow-ups angelegt, {skipped} Leads hatten schon eines."
    ))
    .with("created", json!(created))
    .with("skipped", json!(skipped))
    .with("due_at", json!(due_at.to_rfc3339())))
}

/// Put a lead on a named follow-up sequence and schedule its first step.
pub(crate) async fn start_followup_flow(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let mut lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let flow = require_str(args, "flow")?.parse::<FlowTag>().map_err(ToolError::from)?;

    if let Some(existing) =
        exec.repos.follow_ups.find_pending_for_lead(user_id, &lead.id).await?
    {
        return Err(ToolError::DuplicateFollowUp {
            existing_id: existing.id.0,
            existing_due_at: existing.due_at,
        });
    }

    let due_at = now + Duration::days(flow.wait_days(0));
    let suggestion = FollowUpSuggestion {
        id: FollowUpId(uuid::Uuid::new_v4()),
        user_id: *user_id,
        lead_id: lead.id,
        flow,
        stage: 0,
        template_key: None,
        channel: lead.source_channel,
        suggested_message: None,
        reason: Some(format!("Flow {} gestartet", flow.as_str())),
        due_at,
        status: FollowUpStatus::Pending,
        previous_message: None,
        previous_category: None,
        priority: Priority::Medium,
        created_at: now,
    };

    lead.followup_flow = Some(flow);
    lead.flow_stage = 0;
    lead.next_contact_at = Some(due_at);
    lead.updated_at = now;

    exec.repos.follow_ups.save(suggestion.clone()).await?;
    exec.repos.leads.save(lead.clone()).await?;

    Ok(ToolOutcome::ok(format!(
        "`{}` ist jetzt im Flow {}. Naechster Schritt am {}.",
        lead.name,
        flow.as_str(),
        due_at.format("%d.%m.%Y")
    ))
    .with("follow_up_id", json!(suggestion.id.0))
    .with("flow", json!(flow.as_str()))
    .with("due_at", json!(due_at.to_rfc3339())))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use chief_core::domain::lead::Lead;

    use crate::tools::testutil::executor_with_user;

    use super::*;

    #[tokio::test]
    async fn second_create_reports_the_existing_entry() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Anna Steiner")).await.unwrap();
        let args = json!({ "lead": "Anna Steiner", "date": "morgen" });
        let now = Utc::now();

        let first = create_follow_up(&executor, &profile.id, &args, now).await.unwrap();
        assert!(first.success);

        let second = executor
            .execute(&profile, "create_follow_up", &args.to_string(), now)
            .await;
        assert!(!second.success);
        assert!(second.payload.contains_key("existing_id"));
        assert!(second.payload.contains_key("existing_due_at"));
        assert!(second.message.contains("update_follow_up"));
    }

    #[tokio::test]
    async fn historical_dates_are_bumped_to_tomorrow() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Max Beispiel")).await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 12, 16, 12, 0, 0).unwrap();

        let outcome = create_follow_up(
            &executor,
            &profile.id,
            &json!({ "lead": "Max Beispiel", "date": "20.11.2025" }),
            now,
        )
        .await
        .unwrap();

        assert!(outcome.success);
        let due = outcome.payload["due_at"].as_str().unwrap();
        assert!(due.starts_with("2025-12-17T09:00"), "{due}");
        assert!(outcome.payload.contains_key("date_note"));
    }

    #[tokio::test]
    async fn missing_date_falls_back_to_three_days() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Eva Ohne")).await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();

        let outcome = create_follow_up(
            &executor,
            &profile.id,
            &json!({ "lead": "Eva Ohne" }),
            now,
        )
        .await
        .unwrap();
        assert!(outcome.payload["due_at"].as_str().unwrap().starts_with("2026-03-05"));
    }

    #[tokio::test]
    async fn update_moves_the_open_followup() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Tom Schieber")).await.unwrap();
        let now = Utc::now();
        create_follow_up(&executor, &profile.id, &json!({ "lead": "Tom Schieber" }), now)
            .await
            .unwrap();

        let outcome = update_follow_up(
            &executor,
            &profile.id,
            &json!({ "lead": "Tom Schieber", "date": "in 7 Tagen", "status": "snoozed" }),
            now,
        )
        .await
        .unwrap();
        assert!(outcome.success);
        assert!(outcome.message.contains("snoozed"));
    }

    #[tokio::test]
    async fn bulk_skips_leads_with_open_followups() {
        let (executor, profile) = executor_with_user().await;
        let now = Utc::now();
        executor.repos.leads.save(Lead::new(profile.id, "Lead Eins")).await.unwrap();
        executor.repos.leads.save(Lead::new(profile.id, "Lead Zwei")).await.unwrap();
        create_follow_up(&executor, &profile.id, &json!({ "lead": "Lead Eins" }), now)
            .await
            .unwrap();

        let outcome =
            bulk_create_followups(&executor, &profile.id, &json!({}), now).await.unwrap();
        assert_eq!(outcome.payload["created"], json!(1));
        assert_eq!(outcome.payload["skipped"], json!(1));
    }

    #[tokio::test]
    async fn flow_start_schedules_the_first_step() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Kalt Kontakt")).await.unwrap();
        let now = Utc::now();

        let outcome = start_followup_flow(
            &executor,
            &profile.id,
            &json!({ "lead": "Kalt Kontakt", "flow": "cold_no_reply" }),
            now,
        )
        .await
        .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.payload["flow"], json!("COLD_NO_REPLY"));

        let lead = resolve_lead(&executor.repos, &profile.id, "Kalt Kontakt").await.unwrap();
        assert_eq!(lead.followup_flow, Some(FlowTag::ColdNoReply));
        let next = lead.next_contact_at.unwrap();
        assert_eq!((next - now).num_days(), 3);
    }
}
