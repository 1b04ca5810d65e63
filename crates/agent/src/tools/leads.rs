//! Lead write operations: create, patch, pipeline moves, conversion.

use chrono::{DateTime, Days, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use chief_core::contact::{normalize_instagram, normalize_linkedin, normalize_whatsapp};
use chief_core::dates::at_due_time;
use chief_core::domain::followup::FollowUpSuggestion;
use chief_core::domain::lead::{ContactEvent, Lead, LeadStatus, Temperature};
use chief_core::{Channel, UserId};

use super::{arg_str, arg_strings, require_str, resolve_lead, ToolError, ToolExecutor, ToolOutcome, ToolResult};

/// Days until the automatic follow-up after a lead is created.
const NEW_LEAD_FOLLOWUP_DAYS: u64 = 3;

pub(crate) async fn create_lead(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let name = require_str(args, "name")?;

    let existing = exec.repos.leads.find_by_name(user_id, name).await?;
    if let Some(dup) = existing.iter().find(|lead| lead.name.eq_ignore_ascii_case(name)) {
        return Ok(ToolOutcome::fail(format!("Lead `{}` existiert bereits.", dup.name))
            .with("lead_id", json!(dup.id.0)));
    }

    let mut lead = Lead::new(*user_id, name);
    apply_contact_fields(&mut lead, args);
    lead.notes = arg_str(args, "notes").map(str::to_string);
    lead.source_channel =
        arg_str(args, "source_channel").and_then(|raw| raw.parse::<Channel>().ok());
    lead.merge_tags(arg_strings(args, "tags"));
    lead.created_at = now;
    lead.updated_at = now;

    let due_at = at_due_time(
        now.date_naive().checked_add_days(Days::new(NEW_LEAD_FOLLOWUP_DAYS)).unwrap_or_else(|| now.date_naive()),
    );
    let suggestion = FollowUpSuggestion::manual(
        *user_id,
        lead.id,
        due_at,
        Some("Automatisch beim Anlegen geplant".to_string()),
    );

    exec.repos.leads.save(lead.clone()).await?;
    exec.repos.follow_ups.save(suggestion.clone()).await?;

    Ok(ToolOutcome::ok(format!(
        "Lead `{}` angelegt. Follow-up am {}.",
        lead.name,
        due_at.format("%d.%m.%Y")
    ))
    .with("lead_id", json!(lead.id.0))
    .with("follow_up_id", json!(suggestion.id.0))
    .with("follow_up_due_at", json!(due_at.to_rfc3339())))
}

pub(crate) async fn quick_update_lead(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let mut lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let mut changed: Vec<&str> = Vec::new();

    if let Some(raw) = arg_str(args, "status") {
        let status = raw.parse::<LeadStatus>().map_err(ToolError::from)?;
        lead.set_status(status, now)?;
        changed.push("status");
    }
    if let Some(raw) = arg_str(args, "temperature") {
        lead.temperature_score = parse_temperature(raw)?;
        changed.push("temperature");
    }
    let tags = arg_strings(args, "tags");
    if !tags.is_empty() {
        lead.merge_tags(tags);
        changed.push("tags");
    }
    if apply_contact_fields_from(&mut lead, args) {
        changed.push("kontaktdaten");
    }
    if let Some(notes) = arg_str(args, "notes") {
        lead.notes = Some(match lead.notes.take() {
            Some(old) => format!("{old}\n{notes}"),
            None => notes.to_string(),
        });
        changed.push("notes");
    }

    if changed.is_empty() {
        return Ok(ToolOutcome::fail("Keine Aenderungen angegeben."));
    }
    lead.updated_at = now;
    exec.repos.leads.save(lead.clone()).await?;

    Ok(ToolOutcome::ok(format!("`{}` aktualisiert: {}.", lead.name, changed.join(", ")))
        .with("lead_id", json!(lead.id.0)))
}

pub(crate) async fn update_lead_status(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let mut lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let status = require_str(args, "status")?.parse::<LeadStatus>().map_err(ToolError::from)?;
    lead.set_status(status, now)?;
    exec.repos.leads.save(lead.clone()).await?;

    Ok(ToolOutcome::ok(format!("`{}` ist jetzt im Status {}.", lead.name, status.as_str()))
        .with("lead_id", json!(lead.id.0))
        .with("status", json!(status.as_str())))
}

/// The authoritative path to customer status. Idempotent: converting an
/// existing customer only updates the value.
pub(crate) async fn convert_to_customer(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let mut lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let value = parse_value(args)?;

    let already_won = lead.status == LeadStatus::Won;
    if !already_won {
        lead.set_status(LeadStatus::Won, now)?;
        lead.apply_contact_event(ContactEvent::Converted, now);
        lead.customer_since = Some(now);
    }
    if value.is_some() {
        lead.customer_value = value;
    }
    lead.updated_at = now;
    exec.repos.leads.save(lead.clone()).await?;

    let message = if already_won {
        format!("`{}` war bereits Kunde.", lead.name)
    } else {
        format!("`{}` ist jetzt Kunde. Glueckwunsch!", lead.name)
    };
    let mut outcome = ToolOutcome::ok(message).with("lead_id", json!(lead.id.0));
    if let Some(value) = lead.customer_value {
        outcome = outcome.with("customer_value", json!(value.to_string()));
    }
    Ok(outcome)
}

pub(crate) async fn update_lead_stage(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let mut lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let stage = args
        .get("stage")
        .and_then(Value::as_u64)
        .ok_or_else(|| ToolError::msg("Pflichtfeld `stage` fehlt"))?;
    let stage = u8::try_from(stage).map_err(|_| ToolError::msg("Ungueltige Verkaufsphase"))?;
    lead.set_sales_stage(stage, now)?;
    exec.repos.leads.save(lead.clone()).await?;

    Ok(ToolOutcome::ok(format!("`{}` ist jetzt in Phase {stage}.", lead.name))
        .with("lead_id", json!(lead.id.0))
        .with("sales_stage", json!(stage)))
}

/// `cold`/`warm`/`hot` or a number in 0..=100.
fn parse_temperature(raw: &str) -> Result<u8, ToolError> {
    if let Ok(temperature) = raw.parse::<Temperature>() {
        return Ok(temperature.canonical_score());
    }
    raw.parse::<u8>()
        .ok()
        .filter(|score| *score <= 100)
        .ok_or_else(|| ToolError::msg(format!("Ungueltige Temperatur `{raw}`")))
}

fn parse_value(args: &Value) -> Result<Option<Decimal>, ToolError> {
    match args.get("value") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(|_| ToolError::msg(format!("Ungueltiger Umsatzwert `{raw}`"))),
        Some(Value::Number(number)) => number
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .map(Some)
            .ok_or_else(|| ToolError::msg("Ungueltiger Umsatzwert")),
        Some(other) => Err(ToolError::msg(format!("Ungueltiger Umsatzwert `{other}`"))),
    }
}

fn apply_contact_fields(lead: &mut Lead, args: &Value) {
    apply_contact_fields_from(lead, args);
}

/// Returns whether any contact field was set.
fn apply_contact_fields_from(lead: &mut Lead, args: &Value) -> bool {
    let mut touched = false;
    if let Some(email) = arg_str(args, "email") {
        lead.email = Some(email.to_ascii_lowercase());
        touched = true;
    }
    if let Some(phone) = arg_str(args, "phone") {
        lead.phone = Some(normalize_whatsapp(phone));
        touched = true;
    }
    if let Some(handle) = arg_str(args, "instagram") {
        lead.instagram = Some(normalize_instagram(handle));
        touched = true;
    }
    if let Some(url) = arg_str(args, "facebook_url") {
        lead.facebook_url = Some(url.to_string());
        touched = true;
    }
    if let Some(handle) = arg_str(args, "linkedin") {
        lead.linkedin = Some(normalize_linkedin(handle));
        touched = true;
    }
    if let Some(number) = arg_str(args, "whatsapp") {
        lead.whatsapp = Some(normalize_whatsapp(number));
        touched = true;
    }
    touched
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::tools::testutil::executor_with_user;

    use super::*;

    #[tokio::test]
    async fn create_normalizes_handles_and_plans_a_followup() {
        let (executor, profile) = executor_with_user().await;
        let now = Utc::now();
        let args = json!({
            "name": "Anna Steiner",
            "instagram": "@anna.s",
            "whatsapp": "0664 123 45 67",
            "tags": ["fitness", "Fitness", "wien"],
        });

        let outcome = create_lead(&executor, &profile.id, &args, now).await.unwrap();
        assert!(outcome.success, "{}", outcome.message);

        let lead = resolve_lead(&executor.repos, &profile.id, "Anna Steiner").await.unwrap();
        assert_eq!(lead.instagram.as_deref(), Some("anna.s"));
        assert_eq!(lead.whatsapp.as_deref(), Some("+436641234567"));
        assert_eq!(lead.tags, vec!["fitness", "wien"]);

        let pending = executor
            .repos
            .follow_ups
            .find_pending_for_lead(&profile.id, &lead.id)
            .await
            .unwrap();
        assert!(pending.is_some());
    }

    #[tokio::test]
    async fn create_rejects_an_exact_duplicate_name() {
        let (executor, profile) = executor_with_user().await;
        let args = json!({ "name": "Max Beispiel" });
        let now = Utc::now();
        assert!(create_lead(&executor, &profile.id, &args, now).await.unwrap().success);

        let second = create_lead(&executor, &profile.id, &args, now).await.unwrap();
        assert!(!second.success);
        assert!(second.payload.contains_key("lead_id"));
    }

    #[tokio::test]
    async fn status_transitions_are_validated() {
        let (executor, profile) = executor_with_user().await;
        let lead = Lead::new(profile.id, "Lisa Huber");
        executor.repos.leads.save(lead).await.unwrap();

        let backwards = update_lead_status(
            &executor,
            &profile.id,
            &json!({ "lead": "Lisa Huber", "status": "negotiation" }),
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(backwards.success);

        let result = update_lead_status(
            &executor,
            &profile.id,
            &json!({ "lead": "Lisa Huber", "status": "contacted" }),
            Utc::now(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn convert_is_idempotent() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Tom Kunde")).await.unwrap();
        let args = json!({ "lead": "Tom Kunde", "value": 499.90 });

        let first = convert_to_customer(&executor, &profile.id, &args, Utc::now()).await.unwrap();
        assert!(first.success);
        let second = convert_to_customer(&executor, &profile.id, &args, Utc::now()).await.unwrap();
        assert!(second.success);
        assert!(second.message.contains("bereits"));

        let lead = resolve_lead(&executor.repos, &profile.id, "Tom Kunde").await.unwrap();
        assert_eq!(lead.status, LeadStatus::Won);
        assert!(lead.customer_since.is_some());
    }

    #[tokio::test]
    async fn temperature_accepts_words_and_scores() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Eva Warm")).await.unwrap();

        quick_update_lead(
            &executor,
            &profile.id,
            &json!({ "lead": "Eva Warm", "temperature": "hot" }),
            Utc::now(),
        )
        .await
        .unwrap();
        let lead = resolve_lead(&executor.repos, &profile.id, "Eva Warm").await.unwrap();
        assert_eq!(lead.temperature(), Temperature::Hot);

        quick_update_lead(
            &executor,
            &profile.id,
            &json!({ "lead": "Eva Warm", "temperature": "20" }),
            Utc::now(),
        )
        .await
        .unwrap();
        let lead = resolve_lead(&executor.repos, &profile.id, "Eva Warm").await.unwrap();
        assert_eq!(lead.temperature_score, 20);
    }
}
