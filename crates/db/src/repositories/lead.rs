use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use chief_core::channel::Channel;
use chief_core::domain::context::{ChannelCount, OutreachState};
use chief_core::domain::followup::FlowTag;
use chief_core::domain::lead::{ContactStatus, Lead, LeadId, LeadStatus};
use chief_core::domain::user::UserId;

use super::{
    decode_err, parse_datetime, parse_datetime_opt, parse_decimal, parse_uuid, LeadRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const LEAD_COLUMNS: &str = "id, user_id, name, email, phone, instagram, facebook_url, linkedin,
       whatsapp, notes, status, temperature_score, tags, sales_stage, followup_flow,
       flow_stage, next_contact_at, contact_status, awaiting_reply_since, last_outbound_at,
       last_inbound_at, source_channel, customer_since, customer_value, created_at, updated_at";

fn parse_channel_opt(raw: Option<String>) -> Option<Channel> {
    raw.and_then(|s| serde_json::from_value(serde_json::Value::String(s)).ok())
}

fn channel_as_str(channel: &Channel) -> String {
    match serde_json::to_value(channel) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "unknown".to_string(),
    }
}

fn row_to_lead(row: &sqlx::sqlite::SqliteRow) -> Result<Lead, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let temperature_score: i64 = row.try_get("temperature_score").map_err(decode_err)?;
    let tags_json: String = row.try_get("tags").map_err(decode_err)?;
    let sales_stage: i64 = row.try_get("sales_stage").map_err(decode_err)?;
    let followup_flow: Option<String> = row.try_get("followup_flow").map_err(decode_err)?;
    let flow_stage: i64 = row.try_get("flow_stage").map_err(decode_err)?;
    let contact_status: String = row.try_get("contact_status").map_err(decode_err)?;
    let customer_value: Option<String> = row.try_get("customer_value").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(Lead {
        id: LeadId(parse_uuid(&id)?),
        user_id: UserId(parse_uuid(&user_id)?),
        name: row.try_get("name").map_err(decode_err)?,
        email: row.try_get("email").map_err(decode_err)?,
        phone: row.try_get("phone").map_err(decode_err)?,
        instagram: row.try_get("instagram").map_err(decode_err)?,
        facebook_url: row.try_get("facebook_url").map_err(decode_err)?,
        linkedin: row.try_get("linkedin").map_err(decode_err)?,
        whatsapp: row.try_get("whatsapp").map_err(decode_err)?,
        notes: row.try_get("notes").map_err(decode_err)?,
        status: status.parse::<LeadStatus>().map_err(decode_err)?,
        temperature_score: temperature_score.clamp(0, 100) as u8,
        tags: serde_json::from_str(&tags_json).map_err(decode_err)?,
        sales_stage: sales_stage.clamp(0, i64::from(u8::MAX)) as u8,
        followup_flow: followup_flow
            .map(|s| s.parse::<FlowTag>().map_err(decode_err))
            .transpose()?,
        flow_stage: flow_stage.max(0) as u32,
        next_contact_at: parse_datetime_opt(
            row.try_get("next_contact_at").map_err(decode_err)?,
        )?,
        contact_status: contact_status.parse::<ContactStatus>().map_err(decode_err)?,
        awaiting_reply_since: parse_datetime_opt(
            row.try_get("awaiting_reply_since").map_err(decode_err)?,
        )?,
        last_outbound_at: parse_datetime_opt(
            row.try_get("last_outbound_at").map_err(decode_err)?,
        )?,
        last_inbound_at: parse_datetime_opt(
            row.try_get("last_inbound_at").map_err(decode_err)?,
        )?,
        source_channel: parse_channel_opt(
            row.try_get("source_channel").map_err(decode_err)?,
        ),
        customer_since: parse_datetime_opt(
            row.try_get("customer_since").map_err(decode_err)?,
        )?,
        customer_value: customer_value.map(|s| parse_decimal(&s)).transpose()?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn rows_to_leads(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<Lead>, RepositoryError> {
    rows.iter().map(row_to_lead).collect()
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(
        &self,
        user_id: &UserId,
        id: &LeadId,
    ) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE user_id = ? AND id = ?"
        ))
        .bind(user_id.0.to_string())
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_lead(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_name(
        &self,
        user_id: &UserId,
        fragment: &str,
    ) -> Result<Vec<Lead>, RepositoryError> {
        let pattern = format!("%{}%", fragment.trim().to_lowercase());
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE user_id = ? AND LOWER(name) LIKE ?
             ORDER BY updated_at DESC"
        ))
        .bind(user_id.0.to_string())
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows_to_leads(rows)
    }

    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE user_id = ? ORDER BY updated_at DESC LIMIT ?"
        ))
        .bind(user_id.0.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows_to_leads(rows)
    }

    async fn list_by_status(
        &self,
        user_id: &UserId,
        status: LeadStatus,
    ) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE user_id = ? AND status = ? ORDER BY updated_at DESC"
        ))
        .bind(user_id.0.to_string())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows_to_leads(rows)
    }

    async fn search_by_tag(
        &self,
        user_id: &UserId,
        tag: &str,
    ) -> Result<Vec<Lead>, RepositoryError> {
        // Tags are a JSON array of strings; match the quoted element.
        let pattern = format!("%\"{}\"%", tag.trim().to_lowercase().replace('"', ""));
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE user_id = ? AND LOWER(tags) LIKE ?
             ORDER BY updated_at DESC"
        ))
        .bind(user_id.0.to_string())
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows_to_leads(rows)
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let tags_json = serde_json::to_string(&lead.tags).map_err(decode_err)?;

        sqlx::query(
            "INSERT INTO leads (id, user_id, name, email, phone, instagram, facebook_url,
                                linkedin, whatsapp, notes, status, temperature_score, tags,
                                sales_stage, followup_flow, flow_stage, next_contact_at,
                                contact_status, awaiting_reply_since, last_outbound_at,
                                last_inbound_at, source_channel, customer_since,
                                customer_value, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 phone = excluded.phone,
                 instagram = excluded.instagram,
                 facebook_url = excluded.facebook_url,
                 linkedin = excluded.linkedin,
                 whatsapp = excluded.whatsapp,
                 notes = excluded.notes,
                 status = excluded.status,
                 temperature_score = excluded.temperature_score,
                 tags = excluded.tags,
                 sales_stage = excluded.sales_stage,
                 followup_flow = excluded.followup_flow,
                 flow_stage = excluded.flow_stage,
                 next_contact_at = excluded.next_contact_at,
                 contact_status = excluded.contact_status,
                 awaiting_reply_since = excluded.awaiting_reply_since,
                 last_outbound_at = excluded.last_outbound_at,
                 last_inbound_at = excluded.last_inbound_at,
                 source_channel = excluded.source_channel,
                 customer_since = excluded.customer_since,
                 customer_value = excluded.customer_value,
                 updated_at = excluded.updated_at",
        )
        .bind(lead.id.0.to_string())
        .bind(lead.user_id.0.to_string())
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.instagram)
        .bind(&lead.facebook_url)
        .bind(&lead.linkedin)
        .bind(&lead.whatsapp)
        .bind(&lead.notes)
        .bind(lead.status.as_str())
        .bind(i64::from(lead.temperature_score))
        .bind(tags_json)
        .bind(i64::from(lead.sales_stage))
        .bind(lead.followup_flow.map(|flow| flow.as_str()))
        .bind(i64::from(lead.flow_stage))
        .bind(lead.next_contact_at.map(|dt| dt.to_rfc3339()))
        .bind(lead.contact_status.as_str())
        .bind(lead.awaiting_reply_since.map(|dt| dt.to_rfc3339()))
        .bind(lead.last_outbound_at.map(|dt| dt.to_rfc3339()))
        .bind(lead.last_inbound_at.map(|dt| dt.to_rfc3339()))
        .bind(lead.source_channel.as_ref().map(channel_as_str))
        .bind(lead.customer_since.map(|dt| dt.to_rfc3339()))
        .bind(lead.customer_value.map(|value| value.to_string()))
        .bind(lead.created_at.to_rfc3339())
        .bind(lead.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn status_counts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<(LeadStatus, u64)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM leads WHERE user_id = ? GROUP BY status",
        )
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status").map_err(decode_err)?;
                let count: i64 = row.try_get("count").map_err(decode_err)?;
                Ok((status.parse::<LeadStatus>().map_err(decode_err)?, count.max(0) as u64))
            })
            .collect()
    }

    async fn outreach_state(
        &self,
        user_id: &UserId,
        ghost_cutoff: DateTime<Utc>,
    ) -> Result<OutreachState, RepositoryError> {
        let rows = sqlx::query(
            "SELECT awaiting_reply_since, source_channel FROM leads
             WHERE user_id = ? AND contact_status = 'awaiting_reply'",
        )
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut state = OutreachState::default();
        let mut per_channel: Vec<ChannelCount> = Vec::new();

        for row in &rows {
            state.awaiting_reply += 1;
            let since = parse_datetime_opt(
                row.try_get("awaiting_reply_since").map_err(decode_err)?,
            )?;
            if since.is_some_and(|ts| ts < ghost_cutoff) {
                state.ghosts += 1;
            }
            let channel = parse_channel_opt(
                row.try_get("source_channel").map_err(decode_err)?,
            )
            .unwrap_or_default();
            match per_channel.iter_mut().find(|entry| entry.channel == channel) {
                Some(entry) => entry.count += 1,
                None => per_channel.push(ChannelCount { channel, count: 1 }),
            }
        }

        state.per_channel = per_channel;
        Ok(state)
    }

    async fn month_won_revenue(
        &self,
        user_id: &UserId,
        month_start: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError> {
        let rows = sqlx::query(
            "SELECT customer_value FROM leads
             WHERE user_id = ? AND status = 'won'
               AND customer_since IS NOT NULL AND customer_since >= ?
               AND customer_value IS NOT NULL",
        )
        .bind(user_id.0.to_string())
        .bind(month_start.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut total = Decimal::ZERO;
        for row in &rows {
            let raw: Option<String> = row.try_get("customer_value").map_err(decode_err)?;
            if let Some(raw) = raw {
                total += parse_decimal(&raw)?;
            }
        }
        Ok(total)
    }

    async fn inactive_customers(
        &self,
        user_id: &UserId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Lead>, RepositoryError> {
        // Missing timestamps compare as '' which sorts before any RFC 3339
        // value, so never-contacted customers count as inactive.
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE user_id = ? AND status = 'won'
               AND COALESCE(last_outbound_at, '') < ?
               AND COALESCE(last_inbound_at, '') < ?
             ORDER BY updated_at ASC"
        ))
        .bind(user_id.0.to_string())
        .bind(cutoff.to_rfc3339())
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows_to_leads(rows)
    }
}
