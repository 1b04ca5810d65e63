//! Outward-facing tools. Nothing here sends on the user's behalf:
//! `prepare_message` produces a deep link the user taps themselves.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use chief_core::contact::{instagram_link, linkedin_link, mailto_link, whatsapp_link};
use chief_core::dates::resolve_due_at;
use chief_core::domain::pending::PendingAction;
use chief_core::{Channel, UserId};

use super::{arg_str, require_str, resolve_lead, ToolError, ToolExecutor, ToolOutcome, ToolResult};

const PLACES_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";

pub(crate) async fn prepare_message(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let channel = require_str(args, "channel")?
        .parse::<Channel>()
        .map_err(ToolError::from)?;
    let text = require_str(args, "text")?;

    let link = match channel {
        Channel::WhatsApp => {
            let number = lead
                .whatsapp
                .as_deref()
                .or(lead.phone.as_deref())
                .ok_or_else(|| {
                    ToolError::msg(format!("Keine WhatsApp-Nummer fuer `{}`.", lead.name))
                })?;
            whatsapp_link(number, text)
        }
        Channel::Email => {
            let address = lead.email.as_deref().ok_or_else(|| {
                ToolError::msg(format!("Keine E-Mail-Adresse fuer `{}`.", lead.name))
            })?;
            let subject = arg_str(args, "subject").unwrap_or("Kurze Frage");
            mailto_link(address, subject, text)
        }
        Channel::Instagram => {
            let handle = lead.instagram.as_deref().ok_or_else(|| {
                ToolError::msg(format!("Kein Instagram-Handle fuer `{}`.", lead.name))
            })?;
            instagram_link(handle)
        }
        Channel::LinkedIn => {
            let handle = lead.linkedin.as_deref().ok_or_else(|| {
                ToolError::msg(format!("Kein LinkedIn-Profil fuer `{}`.", lead.name))
            })?;
            linkedin_link(handle)
        }
        other => {
            return Err(ToolError::msg(format!(
                "Kein Versandlink fuer Kanal `{}` verfuegbar.",
                other.as_str()
            )))
        }
    };

    let mut outcome = ToolOutcome::ok(format!(
        "Link fuer `{}` ueber {} bereit. Einmal tippen, pruefen, senden.",
        lead.name,
        channel.as_str()
    ))
    .with("link", json!(link))
    .with("channel", json!(channel.as_str()))
    .with("lead_id", json!(lead.id.0));
    if matches!(channel, Channel::Instagram | Channel::LinkedIn) {
        // No prefill on these platforms; the text rides along for copy-paste.
        outcome = outcome.with("text", json!(text));
    }
    Ok(outcome)
}

#[derive(Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    results: Vec<PlaceResult>,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct PlaceResult {
    name: String,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

pub(crate) async fn research_company(exec: &ToolExecutor, args: &Value) -> ToolResult {
    let query = require_str(args, "query")?;
    let Some(key) = exec.integrations.places_api_key.as_ref() else {
        return Err(ToolError::Disabled("Die Firmenrecherche"));
    };

    let response = exec
        .http
        .get(PLACES_ENDPOINT)
        .query(&[("query", query), ("key", key.expose_secret())])
        .send()
        .await
        .map_err(|error| ToolError::msg(format!("Recherche fehlgeschlagen: {error}")))?;
    let body: PlacesResponse = response
        .json()
        .await
        .map_err(|error| ToolError::msg(format!("Unlesbare Antwort der Suche: {error}")))?;

    if body.status != "OK" || body.results.is_empty() {
        return Ok(ToolOutcome::fail(format!("Nichts gefunden zu `{query}`.")));
    }

    let companies: Vec<Value> = body
        .results
        .iter()
        .take(3)
        .map(|place| {
            json!({
                "name": place.name,
                "address": place.formatted_address,
                "categories": place.types,
            })
        })
        .collect();
    Ok(ToolOutcome::ok(format!("{} Treffer zu `{query}`.", companies.len()))
        .with("companies", Value::Array(companies)))
}

/// Store the meeting as a local task. With a configured calendar key the
/// entry is additionally flagged for the sync worker.
pub(crate) async fn schedule_meeting(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let (due_at, _) = resolve_due_at(require_str(args, "date")?, now);
    let title = arg_str(args, "title")
        .map(str::to_string)
        .unwrap_or_else(|| format!("Termin mit {}", lead.name));

    let action = PendingAction {
        id: Uuid::new_v4(),
        user_id: *user_id,
        title: title.clone(),
        detail: Some(format!("Lead: {}", lead.name)),
        action_type: "meeting".to_string(),
        due_date: due_at.date_naive(),
        lead_id: Some(lead.id),
    };
    exec.repos.pending_actions.save(action.clone()).await?;

    let synced = exec.integrations.calendar_api_key.is_some();
    let message = if synced {
        format!("Termin `{title}` am {} angelegt.", due_at.format("%d.%m.%Y"))
    } else {
        format!(
            "Termin `{title}` am {} lokal gespeichert. Ohne Kalender-Anbindung \
             traegst du ihn selbst ein.",
            due_at.format("%d.%m.%Y")
        )
    };
    Ok(ToolOutcome::ok(message)
        .with("action_id", json!(action.id))
        .with("date", json!(action.due_date.to_string()))
        .with("calendar_synced", json!(synced)))
}
