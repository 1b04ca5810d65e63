//! Copy-ready message drafting.
//!
//! Drafts are deterministic templates filled from lead state. The model
//! polishes them in its reply; the tool layer never calls back into the
//! provider.

use serde_json::{json, Value};

use chief_core::channel::NextMessageKind;
use chief_core::domain::interaction::Outcome;
use chief_core::domain::lead::{ContactStatus, Lead};
use chief_core::{Channel, UserId};

use super::{arg_str, arg_u64, require_str, resolve_lead, ToolExecutor, ToolOutcome, ToolResult};

/// Fill the draft template for one message kind. Also used by the
/// power-hour fast path.
pub(crate) fn message_for(kind: NextMessageKind, lead_first: &str, sender_first: &str) -> String {
    match kind {
        NextMessageKind::FirstContact => format!(
            "Hey {lead_first}! 😊 Ich bin {sender_first} und bin ueber dein Profil gestolpert. \
             Mir gefaellt, was du machst. Darf ich dir kurz zeigen, woran ich gerade arbeite? \
             Kein Druck, bei Interesse schicke ich dir gern mehr."
        ),
        NextMessageKind::FollowupAfterResponse => format!(
            "Hey {lead_first}, danke dir nochmal fuer deine Antwort! Ich wollte kurz \
             nachhaken: Passt es dir diese Woche fuer einen kurzen Austausch? \
             15 Minuten reichen voellig. Liebe Gruesse, {sender_first}"
        ),
        NextMessageKind::FollowupNoResponse => format!(
            "Hey {lead_first}, ich wollte meine Nachricht nochmal nach oben holen — \
             ich weiss, der Alltag ist voll. 😊 Wenn es gerade nicht passt, sag einfach \
             kurz Bescheid. Liebe Gruesse, {sender_first}"
        ),
    }
}

fn kind_from_arg(raw: &str) -> Option<NextMessageKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "first_contact" | "erstkontakt" => Some(NextMessageKind::FirstContact),
        "followup_after_response" => Some(NextMessageKind::FollowupAfterResponse),
        "followup_no_response" => Some(NextMessageKind::FollowupNoResponse),
        _ => None,
    }
}

fn kind_from_lead(lead: &Lead) -> NextMessageKind {
    match lead.contact_status {
        ContactStatus::NeverContacted => NextMessageKind::FirstContact,
        ContactStatus::AwaitingReply => NextMessageKind::FollowupNoResponse,
        _ => NextMessageKind::FollowupAfterResponse,
    }
}

/// Per-channel length ceiling the final copy should respect.
fn channel_limit(channel: Channel) -> Option<usize> {
    match channel {
        Channel::Sms => Some(160),
        Channel::Instagram => Some(500),
        Channel::WhatsApp | Channel::Telegram => Some(1000),
        _ => None,
    }
}

pub(crate) async fn draft_message(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let sender = exec
        .repos
        .profiles
        .find_profile(user_id)
        .await?
        .map(|profile| profile.first_name().to_string())
        .unwrap_or_default();

    let kind = arg_str(args, "message_type")
        .and_then(kind_from_arg)
        .unwrap_or_else(|| kind_from_lead(&lead));
    let channel = arg_str(args, "channel")
        .and_then(|raw| raw.parse::<Channel>().ok())
        .or(lead.source_channel);

    let draft = message_for(kind, lead.first_name(), &sender);
    let mut outcome = ToolOutcome::ok(format!("Entwurf fuer `{}` bereit.", lead.name))
        .with("draft", json!(draft))
        .with("message_type", json!(match kind {
            NextMessageKind::FirstContact => "first_contact",
            NextMessageKind::FollowupAfterResponse => "followup_after_response",
            NextMessageKind::FollowupNoResponse => "followup_no_response",
        }));
    if let Some(channel) = channel {
        outcome = outcome.with("channel", json!(channel.as_str()));
        if let Some(limit) = channel_limit(channel) {
            outcome = outcome.with("max_chars", json!(limit));
        }
    }
    if let Some(tone) = arg_str(args, "tone") {
        outcome = outcome.with("tone", json!(tone));
    }
    Ok(outcome)
}

pub(crate) async fn handle_objection(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let objection = require_str(args, "objection")?;
    let lead_first = match arg_str(args, "lead") {
        Some(raw) => resolve_lead(&exec.repos, user_id, raw).await?.first_name().to_string(),
        None => "du".to_string(),
    };

    let lowered = objection.to_lowercase();
    let (label, reply) = if lowered.contains("zeit") {
        (
            "keine_zeit",
            format!(
                "Verstehe ich total, {lead_first} — genau deshalb lohnt sich ein kurzer \
                 Blick: Die meisten starten mit 3-4 Stunden pro Woche. Wann haettest du \
                 mal 15 Minuten?"
            ),
        )
    } else if lowered.contains("geld") || lowered.contains("teuer") || lowered.contains("kost") {
        (
            "zu_teuer",
            format!(
                "Fair, {lead_first}. Darf ich fragen: teuer im Vergleich wozu? Lass uns \
                 kurz durchrechnen, was du rausbekommst — dann entscheidest du auf \
                 Zahlenbasis, nicht aus dem Bauch."
            ),
        )
    } else if lowered.contains("ueberlegen") || lowered.contains("überlegen") {
        (
            "will_ueberlegen",
            format!(
                "Klar, nimm dir die Zeit, {lead_first}. Nur damit ich dich richtig \
                 unterstuetze: Was genau moechtest du noch durchdenken — das Produkt, \
                 den Zeitpunkt oder das Investment?"
            ),
        )
    } else if lowered.contains("partner") || lowered.contains("mann") || lowered.contains("frau") {
        (
            "partner_fragen",
            format!(
                "Gute Idee, {lead_first} — sowas entscheidet man zu zweit. Sollen wir \
                 einen kurzen Termin machen, bei dem ihr beide eure Fragen loswerdet?"
            ),
        )
    } else {
        (
            "allgemein",
            format!(
                "Danke fuer deine Offenheit, {lead_first}. Was muesste denn passieren, \
                 damit es fuer dich ein klares Ja wird?"
            ),
        )
    };

    Ok(ToolOutcome::ok("Einwand-Antwort bereit.")
        .with("objection_type", json!(label))
        .with("draft", json!(reply)))
}

/// A numbered outreach sequence: day offsets follow the Erstkontakt flow.
pub(crate) async fn generate_sequence(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let sender = exec
        .repos
        .profiles
        .find_profile(user_id)
        .await?
        .map(|profile| profile.first_name().to_string())
        .unwrap_or_default();
    let steps = arg_u64(args, "steps").unwrap_or(3).clamp(2, 5) as usize;

    let kinds = [
        NextMessageKind::FirstContact,
        NextMessageKind::FollowupNoResponse,
        NextMessageKind::FollowupNoResponse,
        NextMessageKind::FollowupNoResponse,
        NextMessageKind::FollowupNoResponse,
    ];
    let day_offsets = [0i64, 1, 4, 9, 14];

    let sequence: Vec<Value> = (0..steps)
        .map(|index| {
            json!({
                "step": index + 1,
                "day": day_offsets[index],
                "message": message_for(kinds[index], lead.first_name(), &sender),
            })
        })
        .collect();

    Ok(ToolOutcome::ok(format!("{steps}-Schritte-Sequenz fuer `{}`.", lead.name))
        .with("sequence", Value::Array(sequence)))
}

pub(crate) async fn generate_customer_protocol(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let history = exec.repos.interactions.list_for_lead(user_id, &lead.id, 50).await?;
    if history.is_empty() {
        return Ok(ToolOutcome::fail(format!("Keine Historie fuer `{}`.", lead.name)));
    }

    let mut protocol = format!(
        "# Kundenprotokoll: {}\nStatus: {} | Temperatur: {} | Phase: {}\n",
        lead.name,
        lead.status.as_str(),
        lead.temperature().as_str(),
        lead.sales_stage
    );
    for entry in &history {
        protocol.push_str(&format!(
            "\n## {}{}\n{}\n",
            entry.occurred_at.format("%d.%m.%Y"),
            match entry.outcome {
                Some(Outcome::Positive) => " (positiv)",
                Some(Outcome::Negative) => " (negativ)",
                _ => "",
            },
            entry.summary
        ));
        for fact in &entry.details.key_facts {
            protocol.push_str(&format!("- {fact}\n"));
        }
        if let Some(next) = &entry.details.next_steps {
            protocol.push_str(&format!("Naechste Schritte: {next}\n"));
        }
    }

    Ok(ToolOutcome::ok(format!("Protokoll fuer `{}` mit {} Eintraegen.", lead.name, history.len()))
        .with("protocol", json!(protocol)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use chief_core::domain::interaction::InteractionLog;

    use crate::tools::testutil::executor_with_user;

    use super::*;

    #[tokio::test]
    async fn draft_kind_follows_the_contact_state() {
        let (executor, profile) = executor_with_user().await;
        let mut lead = Lead::new(profile.id, "Anna Steiner");
        lead.contact_status = ContactStatus::AwaitingReply;
        executor.repos.leads.save(lead).await.unwrap();

        let outcome = draft_message(&executor, &profile.id, &json!({ "lead": "Anna" }))
            .await
            .unwrap();
        assert_eq!(outcome.payload["message_type"], json!("followup_no_response"));
        let draft = outcome.payload["draft"].as_str().unwrap();
        assert!(draft.contains("Anna"));
        assert!(draft.contains("Max"));
    }

    #[tokio::test]
    async fn sms_drafts_carry_a_length_ceiling() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Tom Kurz")).await.unwrap();

        let outcome = draft_message(
            &executor,
            &profile.id,
            &json!({ "lead": "Tom Kurz", "channel": "sms" }),
        )
        .await
        .unwrap();
        assert_eq!(outcome.payload["max_chars"], json!(160));
    }

    #[tokio::test]
    async fn objections_are_typed_by_keyword() {
        let (executor, profile) = executor_with_user().await;
        let outcome = handle_objection(
            &executor,
            &profile.id,
            &json!({ "objection": "Das ist mir viel zu teuer" }),
        )
        .await
        .unwrap();
        assert_eq!(outcome.payload["objection_type"], json!("zu_teuer"));
    }

    #[tokio::test]
    async fn sequence_length_is_clamped() {
        let (executor, profile) = executor_with_user().await;
        executor.repos.leads.save(Lead::new(profile.id, "Eva Serie")).await.unwrap();

        let outcome = generate_sequence(
            &executor,
            &profile.id,
            &json!({ "lead": "Eva Serie", "steps": 9 }),
        )
        .await
        .unwrap();
        assert_eq!(outcome.payload["sequence"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn protocol_collects_key_facts() {
        let (executor, profile) = executor_with_user().await;
        let lead = Lead::new(profile.id, "Klara Kundin");
        executor.repos.leads.save(lead.clone()).await.unwrap();
        let mut log = InteractionLog::new(profile.id, lead.id, "Erstgespraech gefuehrt");
        log.details.key_facts = vec!["Budget 200 EUR".to_string()];
        executor.repos.interactions.append(log).await.unwrap();

        let outcome = generate_customer_protocol(
            &executor,
            &profile.id,
            &json!({ "lead": "Klara Kundin" }),
        )
        .await
        .unwrap();
        let protocol = outcome.payload["protocol"].as_str().unwrap();
        assert!(protocol.contains("Budget 200 EUR"));
        assert!(protocol.contains("Kundenprotokoll: Klara Kundin"));
    }
}
