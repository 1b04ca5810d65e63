//! In-memory repository implementations for orchestrator tests.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use chief_core::domain::chat::StoredChatMessage;
use chief_core::domain::context::{ChannelCount, OutreachState};
use chief_core::domain::followup::{FollowUpId, FollowUpStatus, FollowUpSuggestion};
use chief_core::domain::interaction::InteractionLog;
use chief_core::domain::knowledge::KnowledgeEntry;
use chief_core::domain::lead::{ContactStatus, Lead, LeadId, LeadStatus};
use chief_core::domain::pending::PendingAction;
use chief_core::domain::power_hour::PowerHourSession;
use chief_core::domain::preference::UserPreference;
use chief_core::domain::usage::{DailyUsage, UsageRecord};
use chief_core::domain::user::{OrgId, Organization, UserId, UserProfile};

use super::{
    FollowUpRepository, InsightRepository, InteractionRepository, KnowledgeRepository,
    LeadRepository, PendingActionRepository, PowerHourRepository, PreferenceRepository,
    ProfileRepository, RepositoryError, TranscriptRepository, UsageRepository,
};

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
    organizations: RwLock<HashMap<Uuid, Organization>>,
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_profile(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.profiles.read().await.get(&id.0).cloned())
    }

    async fn save_profile(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        self.profiles.write().await.insert(profile.id.0, profile);
        Ok(())
    }

    async fn find_organization(
        &self,
        id: &OrgId,
    ) -> Result<Option<Organization>, RepositoryError> {
        Ok(self.organizations.read().await.get(&id.0).cloned())
    }

    async fn save_organization(&self, organization: Organization) -> Result<(), RepositoryError> {
        self.organizations.write().await.insert(organization.id.0, organization);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<HashMap<Uuid, Lead>>,
}

impl InMemoryLeadRepository {
    async fn owned(&self, user_id: &UserId) -> Vec<Lead> {
        let mut leads: Vec<Lead> = self
            .leads
            .read()
            .await
            .values()
            .filter(|lead| lead.user_id == *user_id)
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        leads
    }
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(
        &self,
        user_id: &UserId,
        id: &LeadId,
    ) -> Result<Option<Lead>, RepositoryError> {
        Ok(self
            .leads
            .read()
            .await
            .get(&id.0)
            .filter(|lead| lead.user_id == *user_id)
            .cloned())
    }

    async fn find_by_name(
        &self,
        user_id: &UserId,
        fragment: &str,
    ) -> Result<Vec<Lead>, RepositoryError> {
        let needle = fragment.trim().to_lowercase();
        Ok(self
            .owned(user_id)
            .await
            .into_iter()
            .filter(|lead| lead.name.to_lowercase().contains(&needle))
            .collect())
    }

    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Lead>, RepositoryError> {
        let mut leads = self.owned(user_id).await;
        leads.truncate(limit as usize);
        Ok(leads)
    }

    async fn list_by_status(
        &self,
        user_id: &UserId,
        status: LeadStatus,
    ) -> Result<Vec<Lead>, RepositoryError> {
        Ok(self
            .owned(user_id)
            .await
            .into_iter()
            .filter(|lead| lead.status == status)
            .collect())
    }

    async fn search_by_tag(
        &self,
        user_id: &UserId,
        tag: &str,
    ) -> Result<Vec<Lead>, RepositoryError> {
        let needle = tag.trim().to_lowercase();
        Ok(self
            .owned(user_id)
            .await
            .into_iter()
            .filter(|lead| lead.tags.iter().any(|t| t.to_lowercase() == needle))
            .collect())
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        self.leads.write().await.insert(lead.id.0, lead);
        Ok(())
    }

    async fn status_counts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<(LeadStatus, u64)>, RepositoryError> {
        let mut counts: Vec<(LeadStatus, u64)> = Vec::new();
        for lead in self.owned(user_id).await {
            match counts.iter_mut().find(|(status, _)| *status == lead.status) {
                Some((_, count)) => *count += 1,
                None => counts.push((lead.status, 1)),
            }
        }
        Ok(counts)
    }

    async fn outreach_state(
        &self,
        user_id: &UserId,
        ghost_cutoff: DateTime<Utc>,
    ) -> Result<OutreachState, RepositoryError> {
        let mut state = OutreachState::default();
        for lead in self.owned(user_id).await {
            if lead.contact_status != ContactStatus::AwaitingReply {
                continue;
            }
            state.awaiting_reply += 1;
            if lead.awaiting_reply_since.is_some_and(|ts| ts < ghost_cutoff) {
                state.ghosts += 1;
            }
            let channel = lead.source_channel.unwrap_or_default();
            match state.per_channel.iter_mut().find(|entry| entry.channel == channel) {
                Some(entry) => entry.count += 1,
                None => state.per_channel.push(ChannelCount { channel, count: 1 }),
            }
        }
        Ok(state)
    }

    async fn month_won_revenue(
        &self,
        user_id: &UserId,
        month_start: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError> {
        Ok(self
            .owned(user_id)
            .await
            .into_iter()
            .filter(|lead| {
                lead.status == LeadStatus::Won
                    && lead.customer_since.is_some_and(|since| since >= month_start)
            })
            .filter_map(|lead| lead.customer_value)
            .sum())
    }

    async fn inactive_customers(
        &self,
        user_id: &UserId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Lead>, RepositoryError> {
        Ok(self
            .owned(user_id)
            .await
            .into_iter()
            .filter(|lead| {
                lead.status == LeadStatus::Won
                    && !lead.last_outbound_at.is_some_and(|ts| ts >= cutoff)
                    && !lead.last_inbound_at.is_some_and(|ts| ts >= cutoff)
            })
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryFollowUpRepository {
    suggestions: RwLock<HashMap<Uuid, FollowUpSuggestion>>,
}

impl InMemoryFollowUpRepository {
    async fn owned(&self, user_id: &UserId) -> Vec<FollowUpSuggestion> {
        let mut items: Vec<FollowUpSuggestion> = self
            .suggestions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == *user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        items
    }
}

#[async_trait::async_trait]
impl FollowUpRepository for InMemoryFollowUpRepository {
    async fn find_by_id(
        &self,
        user_id: &UserId,
        id: &FollowUpId,
    ) -> Result<Option<FollowUpSuggestion>, RepositoryError> {
        Ok(self
            .suggestions
            .read()
            .await
            .get(&id.0)
            .filter(|s| s.user_id == *user_id)
            .cloned())
    }

    async fn find_pending_for_lead(
        &self,
        user_id: &UserId,
        lead_id: &LeadId,
    ) -> Result<Option<FollowUpSuggestion>, RepositoryError> {
        Ok(self
            .owned(user_id)
            .await
            .into_iter()
            .find(|s| s.lead_id == *lead_id && s.status == FollowUpStatus::Pending))
    }

    async fn list_due_between(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FollowUpSuggestion>, RepositoryError> {
        Ok(self
            .owned(user_id)
            .await
            .into_iter()
            .filter(|s| {
                s.status == FollowUpStatus::Pending && s.due_at >= from && s.due_at < to
            })
            .collect())
    }

    async fn list_pending(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<FollowUpSuggestion>, RepositoryError> {
        let mut pending: Vec<FollowUpSuggestion> = self
            .owned(user_id)
            .await
            .into_iter()
            .filter(|s| s.status == FollowUpStatus::Pending)
            .collect();
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn save(&self, suggestion: FollowUpSuggestion) -> Result<(), RepositoryError> {
        let mut suggestions = self.suggestions.write().await;
        // Mirror the partial unique index the SQL schema enforces.
        if suggestion.status == FollowUpStatus::Pending {
            let conflict = suggestions.values().any(|existing| {
                existing.id != suggestion.id
                    && existing.user_id == suggestion.user_id
                    && existing.lead_id == suggestion.lead_id
                    && existing.status == FollowUpStatus::Pending
            });
            if conflict {
                return Err(RepositoryError::Decode(
                    "UNIQUE constraint: one pending follow-up per lead".to_string(),
                ));
            }
        }
        suggestions.insert(suggestion.id.0, suggestion);
        Ok(())
    }

    async fn set_status(
        &self,
        user_id: &UserId,
        id: &FollowUpId,
        status: FollowUpStatus,
    ) -> Result<(), RepositoryError> {
        let mut suggestions = self.suggestions.write().await;
        if let Some(s) = suggestions.get_mut(&id.0) {
            if s.user_id == *user_id {
                s.status = status;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryInteractionRepository {
    logs: RwLock<Vec<InteractionLog>>,
}

#[async_trait::async_trait]
impl InteractionRepository for InMemoryInteractionRepository {
    async fn append(&self, log: InteractionLog) -> Result<(), RepositoryError> {
        self.logs.write().await.push(log);
        Ok(())
    }

    async fn list_for_lead(
        &self,
        user_id: &UserId,
        lead_id: &LeadId,
        limit: u32,
    ) -> Result<Vec<InteractionLog>, RepositoryError> {
        let mut logs: Vec<InteractionLog> = self
            .logs
            .read()
            .await
            .iter()
            .filter(|log| log.user_id == *user_id && log.lead_id == *lead_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        logs.truncate(limit as usize);
        Ok(logs)
    }

    async fn recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<InteractionLog>, RepositoryError> {
        let mut logs: Vec<InteractionLog> = self
            .logs
            .read()
            .await
            .iter()
            .filter(|log| log.user_id == *user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        logs.truncate(limit as usize);
        Ok(logs)
    }
}

#[derive(Default)]
pub struct InMemoryKnowledgeRepository {
    entries: RwLock<Vec<KnowledgeEntry>>,
}

#[async_trait::async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn list(&self, user_id: &UserId) -> Result<Vec<KnowledgeEntry>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn insert_if_new(&self, entry: KnowledgeEntry) -> Result<bool, RepositoryError> {
        let mut entries = self.entries.write().await;
        let duplicate = entries.iter().any(|existing| {
            existing.user_id == entry.user_id
                && existing.category == entry.category
                && existing.content == entry.content
        });
        if duplicate {
            return Ok(false);
        }
        entries.push(entry);
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceRepository {
    preferences: RwLock<Vec<UserPreference>>,
}

#[async_trait::async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn list(&self, user_id: &UserId) -> Result<Vec<UserPreference>, RepositoryError> {
        Ok(self
            .preferences
            .read()
            .await
            .iter()
            .filter(|p| p.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, preference: UserPreference) -> Result<(), RepositoryError> {
        let mut preferences = self.preferences.write().await;
        match preferences.iter_mut().find(|p| {
            p.user_id == preference.user_id
                && p.category == preference.category
                && p.key == preference.key
        }) {
            Some(existing) => *existing = preference,
            None => preferences.push(preference),
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryInsightRepository {
    insights: RwLock<Vec<(Uuid, String, DateTime<Utc>)>>,
}

#[async_trait::async_trait]
impl InsightRepository for InMemoryInsightRepository {
    async fn recent(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .insights
            .read()
            .await
            .iter()
            .filter(|(owner, _, created)| *owner == user_id.0 && *created >= since)
            .map(|(_, insight, _)| insight.clone())
            .collect())
    }

    async fn append(&self, user_id: &UserId, insight: &str) -> Result<(), RepositoryError> {
        self.insights.write().await.push((user_id.0, insight.to_string(), Utc::now()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTranscriptRepository {
    messages: RwLock<Vec<StoredChatMessage>>,
}

impl InMemoryTranscriptRepository {
    pub async fn all(&self) -> Vec<StoredChatMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait::async_trait]
impl TranscriptRepository for InMemoryTranscriptRepository {
    async fn append(&self, message: StoredChatMessage) -> Result<(), RepositoryError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn recent_for_session(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<StoredChatMessage>, RepositoryError> {
        let mut messages: Vec<StoredChatMessage> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.session_id == *session_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let skip = messages.len().saturating_sub(limit as usize);
        Ok(messages.split_off(skip))
    }
}

#[derive(Default)]
pub struct InMemoryUsageRepository {
    records: RwLock<Vec<UsageRecord>>,
    daily: RwLock<HashMap<(Uuid, NaiveDate), DailyUsage>>,
}

#[async_trait::async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn append(&self, record: UsageRecord) -> Result<(), RepositoryError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn add_daily(&self, delta: DailyUsage) -> Result<(), RepositoryError> {
        let mut daily = self.daily.write().await;
        let entry = daily
            .entry((delta.user_id.0, delta.usage_date))
            .or_insert_with(|| DailyUsage {
                user_id: delta.user_id,
                usage_date: delta.usage_date,
                input_tokens: 0,
                output_tokens: 0,
                calls: 0,
                tool_calls: 0,
                cost: Decimal::ZERO,
            });
        entry.input_tokens += delta.input_tokens;
        entry.output_tokens += delta.output_tokens;
        entry.calls += delta.calls;
        entry.tool_calls += delta.tool_calls;
        entry.cost += delta.cost;
        Ok(())
    }

    async fn month_tokens(
        &self,
        user_id: &UserId,
        month_start: NaiveDate,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .daily
            .read()
            .await
            .values()
            .filter(|d| d.user_id == *user_id && d.usage_date >= month_start)
            .map(DailyUsage::total_tokens)
            .sum())
    }

    async fn daily_summary(
        &self,
        user_id: &UserId,
        since: NaiveDate,
    ) -> Result<Vec<DailyUsage>, RepositoryError> {
        let mut days: Vec<DailyUsage> = self
            .daily
            .read()
            .await
            .values()
            .filter(|d| d.user_id == *user_id && d.usage_date >= since)
            .cloned()
            .collect();
        days.sort_by_key(|d| d.usage_date);
        Ok(days)
    }

    async fn org_totals(
        &self,
        organization_id: &OrgId,
        since: DateTime<Utc>,
    ) -> Result<(u64, Decimal), RepositoryError> {
        let records = self.records.read().await;
        let mut tokens = 0u64;
        let mut cost = Decimal::ZERO;
        for record in records.iter().filter(|r| {
            r.organization_id == Some(*organization_id) && r.recorded_at >= since
        }) {
            tokens += record.total_tokens();
            cost += record.cost;
        }
        Ok((tokens, cost))
    }

    async fn records_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>, RepositoryError> {
        let mut records: Vec<UsageRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == *user_id && r.recorded_at >= since)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }
}

#[derive(Default)]
pub struct InMemoryPowerHourRepository {
    sessions: RwLock<HashMap<Uuid, PowerHourSession>>,
}

#[async_trait::async_trait]
impl PowerHourRepository for InMemoryPowerHourRepository {
    async fn find_active(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PowerHourSession>, RepositoryError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == *user_id && s.active)
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn save(&self, session: PowerHourSession) -> Result<(), RepositoryError> {
        self.sessions.write().await.insert(session.id, session);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPendingActionRepository {
    actions: RwLock<Vec<PendingAction>>,
}

#[async_trait::async_trait]
impl PendingActionRepository for InMemoryPendingActionRepository {
    async fn due_on(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<PendingAction>, RepositoryError> {
        let mut due: Vec<PendingAction> = self
            .actions
            .read()
            .await
            .iter()
            .filter(|a| a.user_id == *user_id && a.due_date <= date)
            .cloned()
            .collect();
        due.sort_by_key(|a| a.due_date);
        Ok(due)
    }

    async fn save(&self, action: PendingAction) -> Result<(), RepositoryError> {
        let mut actions = self.actions.write().await;
        match actions.iter_mut().find(|a| a.id == action.id) {
            Some(existing) => *existing = action,
            None => actions.push(action),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use chief_core::domain::followup::FollowUpSuggestion;
    use chief_core::domain::lead::Lead;
    use chief_core::domain::user::UserId;

    use super::{InMemoryFollowUpRepository, InMemoryLeadRepository};
    use crate::repositories::{FollowUpRepository, LeadRepository};

    #[tokio::test]
    async fn in_memory_lead_search_matches_sql_semantics() {
        let repo = InMemoryLeadRepository::default();
        let user_id = UserId(Uuid::new_v4());
        repo.save(Lead::new(user_id, "Lisa Huber")).await.unwrap();

        assert_eq!(repo.find_by_name(&user_id, "LISA").await.unwrap().len(), 1);
        assert!(repo
            .find_by_name(&UserId(Uuid::new_v4()), "Lisa")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn in_memory_follow_up_rejects_second_pending() {
        let repo = InMemoryFollowUpRepository::default();
        let user_id = UserId(Uuid::new_v4());
        let lead = Lead::new(user_id, "Lisa Huber");
        let due = Utc::now() + Duration::days(3);

        repo.save(FollowUpSuggestion::manual(user_id, lead.id, due, None)).await.unwrap();
        assert!(repo
            .save(FollowUpSuggestion::manual(user_id, lead.id, due, None))
            .await
            .is_err());
    }
}
