//! Demo dataset for local runs, written through the same repositories the
//! agent uses.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use chief_core::channel::Channel;
use chief_core::domain::context::{Storybook, TeamSignals};
use chief_core::domain::followup::FollowUpSuggestion;
use chief_core::domain::interaction::{InteractionLog, Outcome};
use chief_core::domain::knowledge::{KnowledgeCategory, KnowledgeEntry};
use chief_core::domain::lead::{ContactEvent, Lead, LeadStatus};
use chief_core::domain::user::{OrgId, Organization, PlanTier, UserId, UserProfile};

use crate::repositories::{
    FollowUpRepository, InteractionRepository, KnowledgeRepository, LeadRepository,
    ProfileRepository, RepositoryError, SqlFollowUpRepository, SqlInteractionRepository,
    SqlKnowledgeRepository, SqlLeadRepository, SqlProfileRepository,
};
use crate::DbPool;

pub struct SeedResult {
    pub user_id: UserId,
    pub organization_id: OrgId,
    pub leads: usize,
    pub follow_ups: usize,
}

/// Insert a demo user with a small pipeline. Idempotent per invocation only
/// in the sense that it always creates a fresh user.
pub async fn seed_demo_data(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
    let profiles = SqlProfileRepository::new(pool.clone());
    let leads = SqlLeadRepository::new(pool.clone());
    let follow_ups = SqlFollowUpRepository::new(pool.clone());
    let interactions = SqlInteractionRepository::new(pool.clone());
    let knowledge = SqlKnowledgeRepository::new(pool.clone());

    let now = Utc::now();
    let organization_id = OrgId(Uuid::new_v4());
    profiles
        .save_organization(Organization {
            id: organization_id,
            name: "Team Aurora".to_string(),
            storybook: Some(Storybook {
                stories: vec!["Gegruendet 2019, 40 Partner in DACH".to_string()],
                products: vec!["Starterpaket 49 EUR/Monat".to_string()],
                guardrails: vec!["Keine Einkommensversprechen".to_string()],
            }),
            signals: Some(TeamSignals {
                patterns: vec!["Story-Antworten konvertieren besser als Kalt-DMs".to_string()],
                broadcasts: vec!["Neue Produktlinie ab Montag im Shop".to_string()],
                benchmark: Some("Team-Schnitt: 10 Erstkontakte pro Woche".to_string()),
            }),
        })
        .await?;

    let user_id = UserId(Uuid::new_v4());
    let mut profile = UserProfile::new(user_id, "Max Mustermann");
    profile.vertical = Some("fitness".to_string());
    profile.organization_id = Some(organization_id);
    profile.monthly_revenue_goal = Some(Decimal::new(5_000, 0));
    profile.mlm_company = Some("Aurora Nutrition".to_string());
    profile.mlm_rank = Some("Bronze".to_string());
    profile.mlm_next_rank = Some("Silber".to_string());
    profile.mlm_team_size = Some(7);
    profile.plan_tier = PlanTier::Pro;
    profiles.save_profile(profile).await?;

    let mut lisa = Lead::new(user_id, "Lisa Huber");
    lisa.instagram = Some("lisa.huber".to_string());
    lisa.tags = vec!["fitness".to_string(), "warm".to_string()];
    lisa.source_channel = Some(Channel::Instagram);
    lisa.temperature_score = 55;
    lisa.set_status(LeadStatus::Contacted, now)?;
    lisa.apply_contact_event(ContactEvent::OutboundSent, now - Duration::days(1));

    let mut tom = Lead::new(user_id, "Tom Berger");
    tom.whatsapp = Some("+436601234567".to_string());
    tom.source_channel = Some(Channel::WhatsApp);
    tom.apply_contact_event(ContactEvent::OutboundSent, now - Duration::days(5));

    let mut anna = Lead::new(user_id, "Anna Steiner");
    anna.email = Some("anna@example.com".to_string());
    anna.set_status(LeadStatus::Won, now - Duration::days(12))?;
    anna.customer_since = Some(now - Duration::days(12));
    anna.customer_value = Some(Decimal::new(249, 0));

    let seeded = [lisa.clone(), tom.clone(), anna];
    for lead in &seeded {
        leads.save(lead.clone()).await?;
    }

    let mut follow_up_count = 0usize;
    for (lead, days) in [(&lisa, 3i64), (&tom, 1)] {
        follow_ups
            .save(FollowUpSuggestion::manual(
                user_id,
                lead.id,
                now + Duration::days(days),
                Some("nachfassen".to_string()),
            ))
            .await?;
        follow_up_count += 1;
    }

    let mut call_log = InteractionLog::new(user_id, lisa.id, "Story-Reaktion, Interesse an Abnehm-Challenge");
    call_log.channel = Some(Channel::Instagram);
    call_log.outcome = Some(Outcome::Positive);
    call_log.details.key_facts = vec!["will im April starten".to_string()];
    interactions.append(call_log).await?;

    knowledge
        .insert_if_new(KnowledgeEntry::new(
            user_id,
            KnowledgeCategory::Style,
            "Kurze Nachrichten, per Du, maximal ein Emoji",
        ))
        .await?;

    Ok(SeedResult { user_id, organization_id, leads: seeded.len(), follow_ups: follow_up_count })
}

#[cfg(test)]
mod tests {
    use chief_core::domain::user::PlanTier;

    use super::seed_demo_data;
    use crate::repositories::{LeadRepository, ProfileRepository, SqlLeadRepository, SqlProfileRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_creates_a_usable_pipeline() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let result = seed_demo_data(&pool).await.expect("seed");
        assert_eq!(result.leads, 3);
        assert_eq!(result.follow_ups, 2);

        let profile = SqlProfileRepository::new(pool.clone())
            .find_profile(&result.user_id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(profile.plan_tier, PlanTier::Pro);

        let leads = SqlLeadRepository::new(pool)
            .list_recent(&result.user_id, 10)
            .await
            .expect("leads");
        assert_eq!(leads.len(), 3);
    }
}
