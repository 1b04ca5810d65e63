//! Layered context assembly for the system prompt.
//!
//! One concurrent fan-out over every independent read. A failing slot
//! degrades to its default value with a warning; a request never dies
//! because one context layer was unavailable.

use std::sync::Arc;

use chrono::{Datelike, Duration, TimeZone, Utc};
use tracing::warn;

use chief_core::domain::context::{FinanceSummary, LivingOs, OutreachState, Storybook};
use chief_core::domain::interaction::InteractionLog;
use chief_core::domain::knowledge::KnowledgeEntry;
use chief_core::domain::pending::PendingAction;
use chief_core::domain::preference::{PreferenceCategory, UserPreference};
use chief_core::domain::user::Organization;
use chief_core::{Lead, UserId, UserProfile};
use chief_db::repositories::RepositoryError;

use crate::cache::ProfileCache;
use crate::error::AgentError;
use crate::Repositories;

const RECENT_ACTIVITY_LIMIT: u32 = 10;
const INSIGHT_WINDOW_DAYS: i64 = 30;
const GHOST_AFTER_DAYS: i64 = 2;
const FINANCE_FOLLOW_UP_SCAN: u32 = 50;

/// Everything the prompt assembler needs, as plain data. Nothing in here
/// can call back into the orchestrator.
#[derive(Clone, Debug)]
pub struct ContextBundle {
    pub profile: UserProfile,
    pub organization: Option<Organization>,
    pub knowledge: Vec<KnowledgeEntry>,
    pub preferences: Vec<UserPreference>,
    pub recent_activity: Vec<InteractionLog>,
    pub pending_today: Vec<PendingAction>,
    pub finance: FinanceSummary,
    pub outreach: OutreachState,
    pub living_os: LivingOs,
    pub mentioned_leads: Vec<Lead>,
}

impl ContextBundle {
    pub fn storybook(&self) -> Option<&Storybook> {
        self.organization.as_ref().and_then(|org| org.storybook.as_ref())
    }
}

#[derive(Clone)]
pub struct ContextLoader {
    repos: Repositories,
    cache: Arc<ProfileCache>,
}

fn slot<T: Default>(label: &'static str, result: Result<T, RepositoryError>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            warn!(event_name = "context_slot_failed", slot = label, error = %error);
            T::default()
        }
    }
}

impl ContextLoader {
    pub fn new(repos: Repositories, cache: Arc<ProfileCache>) -> Self {
        Self { repos, cache }
    }

    pub async fn profile(&self, user_id: &UserId) -> Result<UserProfile, AgentError> {
        if let Some(profile) = self.cache.get(user_id) {
            return Ok(profile);
        }
        let profile = self
            .repos
            .profiles
            .find_profile(user_id)
            .await?
            .ok_or(AgentError::UnknownUser(user_id.0))?;
        self.cache.insert(profile.clone());
        Ok(profile)
    }

    pub async fn load(
        &self,
        user_id: &UserId,
        query: Option<&str>,
    ) -> Result<ContextBundle, AgentError> {
        let profile = self.profile(user_id).await?;
        let now = Utc::now();
        let today = now.date_naive();
        let month_start = Utc
            .with_ymd_and_hms(today.year(), today.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);

        let (knowledge, preferences, month_revenue, recent_activity, insights, pending_today, outreach, open_follow_ups) = tokio::join!(
            self.repos.knowledge.list(user_id),
            self.repos.preferences.list(user_id),
            self.repos.leads.month_won_revenue(user_id, month_start),
            self.repos.interactions.recent(user_id, RECENT_ACTIVITY_LIMIT),
            self.repos.insights.recent(user_id, now - Duration::days(INSIGHT_WINDOW_DAYS)),
            self.repos.pending_actions.due_on(user_id, today),
            self.repos.leads.outreach_state(user_id, now - Duration::days(GHOST_AFTER_DAYS)),
            self.repos.follow_ups.list_pending(user_id, FINANCE_FOLLOW_UP_SCAN),
        );

        let knowledge = slot("knowledge", knowledge);
        let preferences = slot("preferences", preferences);
        let month_revenue = slot("month_revenue", month_revenue);
        let recent_activity = slot("recent_activity", recent_activity);
        let insights = slot("insights", insights);
        let pending_today = slot("pending_actions", pending_today);
        let outreach = slot("outreach", outreach);
        let open_follow_ups = slot("open_follow_ups", open_follow_ups);

        let organization = match profile.organization_id {
            Some(org_id) => slot(
                "organization",
                self.repos.profiles.find_organization(&org_id).await,
            ),
            None => None,
        };

        let finance = FinanceSummary {
            open_items: open_follow_ups.len() as u32,
            overdue_items: open_follow_ups.iter().filter(|f| f.due_at < now).count() as u32,
            month_revenue,
        };

        let signals = organization
            .as_ref()
            .and_then(|org| org.signals.clone())
            .unwrap_or_default();
        let living_os = LivingOs {
            rules: preferences
                .iter()
                .filter(|p| p.category == PreferenceCategory::Rules)
                .map(|p| p.value.clone())
                .collect(),
            patterns: signals.patterns,
            broadcasts: signals.broadcasts,
            collective_insights: insights,
            benchmark: signals.benchmark,
        };

        let mentioned_leads = match query {
            Some(query) => self.mentioned_leads(user_id, query).await,
            None => Vec::new(),
        };

        Ok(ContextBundle {
            profile,
            organization,
            knowledge,
            preferences,
            recent_activity,
            pending_today,
            finance,
            outreach,
            living_os,
            mentioned_leads,
        })
    }

    /// Look up leads whose names the query appears to mention.
    async fn mentioned_leads(&self, user_id: &UserId, query: &str) -> Vec<Lead> {
        let mut leads: Vec<Lead> = Vec::new();
        for candidate in candidate_names(query) {
            match self.repos.leads.find_by_name(user_id, &candidate).await {
                Ok(matches) => {
                    for lead in matches {
                        if !leads.iter().any(|known| known.id == lead.id) {
                            leads.push(lead);
                        }
                    }
                }
                Err(error) => {
                    warn!(event_name = "context_slot_failed", slot = "mentioned_leads", error = %error);
                }
            }
        }
        leads
    }
}

const MAX_NAME_CANDIDATES: usize = 5;

fn is_cap_word(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(first) if first.is_uppercase())
        && chars.all(|c| c.is_lowercase() || c == '-' || c == '\'')
        && word.chars().count() >= 2
}

/// Candidate lead names: quoted spans first, then capitalised token runs.
/// The leading word of the query is skipped; it is capitalised by grammar,
/// not because it names anyone.
pub(crate) fn candidate_names(query: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    let mut push = |candidate: String| {
        let candidate = candidate.trim().to_string();
        if !candidate.is_empty()
            && candidates.len() < MAX_NAME_CANDIDATES
            && !candidates.iter().any(|known| known.eq_ignore_ascii_case(&candidate))
        {
            candidates.push(candidate);
        }
    };

    for quote in ['"', '\''] {
        let chunks: Vec<&str> = query.split(quote).collect();
        // Odd-indexed chunks are quoted, but only when a closing quote
        // followed (apostrophes inside words never pair up).
        for index in (1..chunks.len()).step_by(2) {
            if index + 1 < chunks.len() {
                push(chunks[index].to_string());
            }
        }
    }

    let words: Vec<&str> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '\''))
        .collect();
    let mut index = 1;
    while index < words.len() {
        if is_cap_word(words[index]) {
            let mut run = vec![words[index]];
            while index + 1 < words.len() && is_cap_word(words[index + 1]) {
                index += 1;
                run.push(words[index]);
            }
            push(run.join(" "));
        }
        index += 1;
    }

    candidates
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use chief_core::domain::context::TeamSignals;
    use chief_core::domain::user::OrgId;
    use chief_core::Lead;

    use super::*;

    #[test]
    fn quoted_spans_are_candidates() {
        let candidates = candidate_names("was weisst du ueber \"Lisa Huber\"?");
        assert_eq!(candidates, vec!["Lisa Huber"]);
    }

    #[test]
    fn capitalised_runs_are_candidates_but_not_the_leading_word() {
        let candidates = candidate_names("Zeige mir alles zu Max Mustermann bitte");
        assert_eq!(candidates, vec!["Max Mustermann"]);
        assert!(candidate_names("Hallo wie geht es dir").is_empty());
    }

    #[tokio::test]
    async fn load_attaches_mentioned_leads_and_defaults_empty_slots() {
        let repos = Repositories::in_memory();
        let cache = Arc::new(ProfileCache::new());
        let profile = UserProfile::new(UserId(Uuid::new_v4()), "Max Mustermann");
        repos.profiles.save_profile(profile.clone()).await.unwrap();
        repos.leads.save(Lead::new(profile.id, "Lisa Huber")).await.unwrap();

        let loader = ContextLoader::new(repos, cache);
        let bundle = loader.load(&profile.id, Some("was lief zuletzt mit Lisa?")).await.unwrap();

        assert_eq!(bundle.profile.id, profile.id);
        assert_eq!(bundle.mentioned_leads.len(), 1);
        assert_eq!(bundle.mentioned_leads[0].name, "Lisa Huber");
        assert!(bundle.knowledge.is_empty());
        assert!(bundle.outreach.is_empty());
        assert!(bundle.finance.is_empty());
    }

    #[tokio::test]
    async fn organization_signals_fill_the_living_os() {
        let repos = Repositories::in_memory();
        let organization = Organization {
            id: OrgId(Uuid::new_v4()),
            name: "Team Nord".to_string(),
            storybook: None,
            signals: Some(TeamSignals {
                patterns: vec!["Sprachnachrichten konvertieren besser".to_string()],
                broadcasts: vec!["Challenge startet Montag".to_string()],
                benchmark: Some("Team-Schnitt: 12 Kontakte/Woche".to_string()),
            }),
        };
        repos.profiles.save_organization(organization.clone()).await.unwrap();
        let mut profile = UserProfile::new(UserId(Uuid::new_v4()), "Max Mustermann");
        profile.organization_id = Some(organization.id);
        repos.profiles.save_profile(profile.clone()).await.unwrap();

        let loader = ContextLoader::new(repos, Arc::new(ProfileCache::new()));
        let bundle = loader.load(&profile.id, None).await.unwrap();

        assert_eq!(bundle.living_os.patterns, vec!["Sprachnachrichten konvertieren besser"]);
        assert_eq!(bundle.living_os.broadcasts, vec!["Challenge startet Montag"]);
        assert_eq!(
            bundle.living_os.benchmark.as_deref(),
            Some("Team-Schnitt: 12 Kontakte/Woche")
        );
    }

    #[tokio::test]
    async fn unknown_user_is_a_hard_error() {
        let loader = ContextLoader::new(Repositories::in_memory(), Arc::new(ProfileCache::new()));
        let missing = UserId(Uuid::new_v4());
        assert!(matches!(loader.load(&missing, None).await, Err(AgentError::UnknownUser(_))));
    }

    #[tokio::test]
    async fn profile_lookups_hit_the_cache_second_time() {
        let repos = Repositories::in_memory();
        let cache = Arc::new(ProfileCache::new());
        let profile = UserProfile::new(UserId(Uuid::new_v4()), "Max Mustermann");
        repos.profiles.save_profile(profile.clone()).await.unwrap();

        let loader = ContextLoader::new(repos.clone(), cache.clone());
        loader.profile(&profile.id).await.unwrap();

        // A profile rewrite is invisible until the TTL expires.
        let mut renamed = profile.clone();
        renamed.display_name = "Maximilian".to_string();
        repos.profiles.save_profile(renamed).await.unwrap();
        assert_eq!(loader.profile(&profile.id).await.unwrap().display_name, "Max Mustermann");
    }
}
