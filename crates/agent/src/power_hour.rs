//! Power-Hour fast path: rapid contact capture without the LLM loop.
//!
//! While a session is active, plain pasted names and chat exports are
//! handled deterministically (lead upsert, contact event, follow-up,
//! copy-ready draft) and the orchestrator skips classification and
//! routing entirely.

use chrono::{DateTime, Utc};
use tracing::info;

use chief_core::channel::{analyze_transcript, quick_capture_name, Direction, NextMessageKind};
use chief_core::dates::{at_due_time, FALLBACK_DAYS};
use chief_core::domain::followup::FollowUpSuggestion;
use chief_core::domain::lead::{ContactEvent, ContactStatus, Lead};
use chief_core::domain::power_hour::PowerHourSession;
use chief_core::{Channel, UserProfile};

use crate::error::AgentError;
use crate::tools::content::message_for;
use crate::Repositories;

const START_COMMAND: &str = "/powerhour";
const END_COMMANDS: [&str; 3] = ["/stop", "/ende", "fertig"];

/// Whether a Power-Hour session is currently running for this user.
pub async fn is_active(repos: &Repositories, profile: &UserProfile) -> Result<bool, AgentError> {
    Ok(repos.power_hours.find_active(&profile.id).await?.is_some())
}

/// Try to handle the message on the fast path. `Ok(None)` means the
/// message belongs to the normal pipeline.
pub async fn preempt(
    repos: &Repositories,
    profile: &UserProfile,
    message: &str,
    now: DateTime<Utc>,
) -> Result<Option<String>, AgentError> {
    let trimmed = message.trim();
    let lowered = trimmed.to_lowercase();
    let session = repos.power_hours.find_active(&profile.id).await?;

    if lowered.starts_with(START_COMMAND) {
        if session.is_some() {
            return Ok(Some(
                "⚡ Deine Power-Hour laeuft schon! Schick mir Namen oder Chats — \
                 `/stop` beendet sie."
                    .to_string(),
            ));
        }
        let session = PowerHourSession::start(profile.id, now);
        repos.power_hours.save(session).await?;
        info!(event_name = "power_hour_started", user_id = %profile.id.0);
        return Ok(Some(format!(
            "⚡ Power-Hour gestartet, {}! Ab jetzt zaehlt jeder Kontakt.\n\
             Schick mir einfach einen Namen (z.B. `Anna Steiner Instagram`) oder \
             fuege einen Chatverlauf ein — ich erledige den Rest. \
             Mit `/stop`, `/ende` oder `fertig` beendest du die Session.",
            profile.first_name()
        )));
    }

    let Some(mut session) = session else {
        return Ok(None);
    };

    if END_COMMANDS.contains(&lowered.as_str()) {
        session.end(now);
        let summary = format!(
            "⚡ Power-Hour beendet! {} Minuten, {} Kontakte erfasst, {} Nachrichten \
             rausgeschickt. Stark, {}! 💪",
            session.actual_duration_minutes.unwrap_or(0),
            session.contacts_made,
            session.messages_sent,
            profile.first_name()
        );
        repos.power_hours.save(session).await?;
        info!(event_name = "power_hour_ended", user_id = %profile.id.0);
        return Ok(Some(summary));
    }

    let capture = match quick_capture_name(trimmed) {
        Some(name) => Capture { name, channel: None, kind: None, outbound: true, inbound: false },
        None => {
            let analysis = analyze_transcript(trimmed);
            // No recognisable contact: let the normal pipeline answer, with
            // the power-hour overlay in the prompt.
            let Some(name) = analysis.lead_name.clone() else {
                return Ok(None);
            };
            Capture {
                name,
                channel: (analysis.channel != Channel::Unknown).then_some(analysis.channel),
                kind: Some(analysis.next_message_kind()),
                outbound: analysis.any_outbound(),
                inbound: analysis.last_direction() == Some(Direction::Inbound),
            }
        }
    };

    let mut lead = find_or_create(repos, profile, &capture.name).await?;
    if lead.source_channel.is_none() {
        lead.source_channel = capture.channel;
    }
    if capture.outbound {
        lead.apply_contact_event(ContactEvent::OutboundSent, now);
    }
    if capture.inbound {
        lead.apply_contact_event(ContactEvent::InboundObserved, now);
    }
    lead.updated_at = now;
    repos.leads.save(lead.clone()).await?;

    let due_at = at_due_time(
        now.date_naive()
            .checked_add_days(chrono::Days::new(FALLBACK_DAYS as u64))
            .unwrap_or_else(|| now.date_naive()),
    );
    let planned = if repos.follow_ups.find_pending_for_lead(&profile.id, &lead.id).await?.is_none()
    {
        repos
            .follow_ups
            .save(FollowUpSuggestion::manual(
                profile.id,
                lead.id,
                due_at,
                Some("Power-Hour Kontakt".to_string()),
            ))
            .await?;
        true
    } else {
        false
    };

    session.contacts_made += 1;
    session.messages_sent += 1;
    let count = session.contacts_made;
    repos.power_hours.save(session).await?;

    let kind = capture.kind.unwrap_or_else(|| match lead.contact_status {
        ContactStatus::NeverContacted => NextMessageKind::FirstContact,
        ContactStatus::AwaitingReply => NextMessageKind::FollowupNoResponse,
        _ => NextMessageKind::FollowupAfterResponse,
    });
    let draft = message_for(kind, lead.first_name(), profile.first_name());

    let mut reply = format!(
        "⚡ {} erfasst — Kontakt Nr. {count} in dieser Power-Hour.\n\n---\n{draft}\n---\n",
        lead.name
    );
    if planned {
        reply.push_str(&format!("\nFollow-up steht fuer den {}.", due_at.format("%d.%m.%Y")));
    }
    reply.push_str(" Weiter geht's!");
    Ok(Some(reply))
}

struct Capture {
    name: String,
    channel: Option<Channel>,
    kind: Option<NextMessageKind>,
    outbound: bool,
    inbound: bool,
}

async fn find_or_create(
    repos: &Repositories,
    profile: &UserProfile,
    name: &str,
) -> Result<Lead, AgentError> {
    let matches = repos.leads.find_by_name(&profile.id, name).await?;
    if let Some(found) = matches.iter().find(|lead| lead.name.eq_ignore_ascii_case(name)) {
        return Ok(found.clone());
    }
    Ok(Lead::new(profile.id, name))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use chief_core::domain::lead::LeadStatus;
    use chief_core::UserId;

    use super::*;

    async fn setup() -> (Repositories, UserProfile) {
        let repos = Repositories::in_memory();
        let profile = UserProfile::new(UserId(Uuid::new_v4()), "Max Mustermann");
        repos.profiles.save_profile(profile.clone()).await.unwrap();
        (repos, profile)
    }

    #[tokio::test]
    async fn messages_outside_a_session_pass_through() {
        let (repos, profile) = setup().await;
        let handled = preempt(&repos, &profile, "Wie laeuft meine Pipeline?", Utc::now())
            .await
            .unwrap();
        assert!(handled.is_none());
    }

    #[tokio::test]
    async fn questions_during_a_session_fall_through_to_the_pipeline() {
        let (repos, profile) = setup().await;
        let now = Utc::now();
        preempt(&repos, &profile, "/powerhour", now).await.unwrap();

        let handled = preempt(&repos, &profile, "wie viele habe ich schon geschafft?", now)
            .await
            .unwrap();
        assert!(handled.is_none());
    }

    #[tokio::test]
    async fn quick_capture_creates_lead_followup_and_draft() {
        let (repos, profile) = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 18, 0, 0).unwrap();
        preempt(&repos, &profile, "/powerhour", now).await.unwrap();

        let reply = preempt(&repos, &profile, "Anna Steiner", now)
            .await
            .unwrap()
            .expect("fast path handles captures");
        assert!(reply.contains("Kontakt Nr. 1"));
        assert!(reply.contains("---"));
        assert!(reply.contains("Anna"));

        let lead = &repos.leads.find_by_name(&profile.id, "Anna Steiner").await.unwrap()[0];
        assert_eq!(lead.status, LeadStatus::Contacted);
        assert_eq!(lead.contact_status, ContactStatus::AwaitingReply);
        assert!(repos
            .follow_ups
            .find_pending_for_lead(&profile.id, &lead.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn transcript_with_inbound_last_drafts_a_response_followup() {
        let (repos, profile) = setup().await;
        let now = Utc::now();
        preempt(&repos, &profile, "/powerhour", now).await.unwrap();

        let export = "Alexandra Pereni\n\
            Nachrichten und Anrufe sind mit Ende-zu-Ende-Verschlüsselung geschützt.\n\
            Du: Hey Alexandra, schoen dich kennenzulernen!\n\
            Alexandra: Hallo! Danke dir, sehr gerne.\n";
        let reply = preempt(&repos, &profile, export, now).await.unwrap().unwrap();
        assert!(reply.contains("danke dir nochmal fuer deine Antwort"), "{reply}");

        let lead = &repos.leads.find_by_name(&profile.id, "Alexandra").await.unwrap()[0];
        assert_eq!(lead.source_channel, Some(Channel::WhatsApp));
        assert_eq!(lead.contact_status, ContactStatus::InConversation);
    }

    #[tokio::test]
    async fn ending_reports_the_session_counters() {
        let (repos, profile) = setup().await;
        let started = Utc.with_ymd_and_hms(2026, 2, 10, 18, 0, 0).unwrap();
        preempt(&repos, &profile, "/powerhour", started).await.unwrap();
        preempt(&repos, &profile, "Anna Steiner", started).await.unwrap();
        preempt(&repos, &profile, "Tom Weber", started).await.unwrap();

        let reply = preempt(&repos, &profile, "fertig", started + Duration::minutes(50))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("50 Minuten"), "{reply}");
        assert!(reply.contains("2 Kontakte"), "{reply}");
        assert!(repos.power_hours.find_active(&profile.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn double_start_is_a_friendly_noop() {
        let (repos, profile) = setup().await;
        preempt(&repos, &profile, "/powerhour", Utc::now()).await.unwrap();
        let reply = preempt(&repos, &profile, "/powerhour", Utc::now()).await.unwrap().unwrap();
        assert!(reply.contains("laeuft schon"));
    }
}
