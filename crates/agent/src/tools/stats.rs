//! Read-only tools: lists, pipeline views, and aggregate reports.

use chrono::{DateTime, Datelike, Days, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use chief_core::domain::followup::FollowUpSuggestion;
use chief_core::domain::lead::{Lead, LeadStatus, Temperature};
use chief_core::{UserId, UserProfile};

use super::{arg_str, arg_u64, require_str, resolve_lead, ToolError, ToolExecutor, ToolOutcome, ToolResult};

fn lead_brief(lead: &Lead) -> Value {
    json!({
        "id": lead.id.0,
        "name": lead.name,
        "status": lead.status.as_str(),
        "temperature": lead.temperature().as_str(),
        "sales_stage": lead.sales_stage,
        "contact_status": lead.contact_status.as_str(),
        "next_contact_at": lead.next_contact_at.map(|at| at.to_rfc3339()),
        "tags": lead.tags,
    })
}

fn followup_brief(entry: &FollowUpSuggestion, lead_name: Option<&str>) -> Value {
    json!({
        "id": entry.id.0,
        "lead_id": entry.lead_id.0,
        "lead_name": lead_name,
        "flow": entry.flow.as_str(),
        "due_at": entry.due_at.to_rfc3339(),
        "status": entry.status.as_str(),
        "reason": entry.reason,
    })
}

pub(crate) async fn list_leads(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let limit = arg_u64(args, "limit").unwrap_or(20).min(50) as u32;
    let mut leads = match arg_str(args, "status") {
        Some(raw) => {
            let status = raw.parse::<LeadStatus>().map_err(ToolError::from)?;
            exec.repos.leads.list_by_status(user_id, status).await?
        }
        None => exec.repos.leads.list_recent(user_id, limit).await?,
    };
    if let Some(raw) = arg_str(args, "temperature") {
        let wanted = raw.parse::<Temperature>().map_err(ToolError::from)?;
        leads.retain(|lead| lead.temperature() == wanted);
    }
    leads.truncate(limit as usize);

    Ok(ToolOutcome::ok(format!("{} Leads gefunden.", leads.len()))
        .with("count", json!(leads.len()))
        .with("leads", Value::Array(leads.iter().map(lead_brief).collect())))
}

pub(crate) async fn get_lead_details(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let pending = exec.repos.follow_ups.find_pending_for_lead(user_id, &lead.id).await?;

    Ok(ToolOutcome::ok(format!("Daten zu `{}`.", lead.name))
        .with(
            "lead",
            json!({
                "id": lead.id.0,
                "name": lead.name,
                "email": lead.email,
                "phone": lead.phone,
                "instagram": lead.instagram,
                "facebook_url": lead.facebook_url,
                "linkedin": lead.linkedin,
                "whatsapp": lead.whatsapp,
                "notes": lead.notes,
                "status": lead.status.as_str(),
                "temperature": lead.temperature().as_str(),
                "temperature_score": lead.temperature_score,
                "sales_stage": lead.sales_stage,
                "tags": lead.tags,
                "contact_status": lead.contact_status.as_str(),
                "source_channel": lead.source_channel.map(|c| c.as_str()),
                "followup_flow": lead.followup_flow.map(|f| f.as_str()),
                "customer_since": lead.customer_since.map(|at| at.to_rfc3339()),
                "customer_value": lead.customer_value.map(|v| v.to_string()),
                "created_at": lead.created_at.to_rfc3339(),
            }),
        )
        .with(
            "open_follow_up",
            pending.map(|entry| followup_brief(&entry, Some(&lead.name))).unwrap_or(Value::Null),
        ))
}

pub(crate) async fn get_lead_history(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let lead = resolve_lead(&exec.repos, user_id, require_str(args, "lead")?).await?;
    let limit = arg_u64(args, "limit").unwrap_or(10).min(50) as u32;
    let history = exec.repos.interactions.list_for_lead(user_id, &lead.id, limit).await?;

    let entries: Vec<Value> = history
        .iter()
        .map(|entry| {
            json!({
                "occurred_at": entry.occurred_at.to_rfc3339(),
                "channel": entry.channel.map(|c| c.as_str()),
                "summary": entry.summary,
                "outcome": entry.outcome.map(|o| o.as_str()),
                "key_facts": entry.details.key_facts,
                "next_steps": entry.details.next_steps,
            })
        })
        .collect();

    Ok(ToolOutcome::ok(format!("{} Eintraege zu `{}`.", entries.len(), lead.name))
        .with("lead_id", json!(lead.id.0))
        .with("history", Value::Array(entries)))
}

pub(crate) async fn search_leads_by_tag(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let tag = require_str(args, "tag")?;
    let leads = exec.repos.leads.search_by_tag(user_id, tag).await?;
    Ok(ToolOutcome::ok(format!("{} Leads mit Tag `{tag}`.", leads.len()))
        .with("leads", Value::Array(leads.iter().map(lead_brief).collect())))
}

pub(crate) async fn list_followups(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let timeframe = arg_str(args, "timeframe").unwrap_or("today");
    let day_start = now.date_naive().and_hms_opt(0, 0, 0).expect("midnight").and_utc();

    let entries = match timeframe {
        "today" => {
            exec.repos
                .follow_ups
                .list_due_between(user_id, day_start, day_start + Duration::days(1))
                .await?
        }
        "week" => {
            exec.repos
                .follow_ups
                .list_due_between(user_id, day_start, day_start + Duration::days(7))
                .await?
        }
        "overdue" => {
            exec.repos
                .follow_ups
                .list_due_between(user_id, day_start - Duration::days(365), now)
                .await?
        }
        "all" => exec.repos.follow_ups.list_pending(user_id, 100).await?,
        other => return Err(ToolError::msg(format!("Unbekannter Zeitraum `{other}`"))),
    };

    let mut briefs = Vec::with_capacity(entries.len());
    for entry in &entries {
        let name = exec
            .repos
            .leads
            .find_by_id(user_id, &entry.lead_id)
            .await?
            .map(|lead| lead.name);
        briefs.push(followup_brief(entry, name.as_deref()));
    }

    Ok(ToolOutcome::ok(format!("{} Follow-ups ({timeframe}).", briefs.len()))
        .with("timeframe", json!(timeframe))
        .with("followups", Value::Array(briefs)))
}

pub(crate) async fn followup_inbox(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let limit = arg_u64(args, "limit").unwrap_or(20).min(50) as u32;
    let entries = exec.repos.follow_ups.list_pending(user_id, limit).await?;

    let mut briefs = Vec::with_capacity(entries.len());
    for entry in &entries {
        let name = exec
            .repos
            .leads
            .find_by_id(user_id, &entry.lead_id)
            .await?
            .map(|lead| lead.name);
        briefs.push(followup_brief(entry, name.as_deref()));
    }
    Ok(ToolOutcome::ok(format!("{} offene Follow-ups.", briefs.len()))
        .with("inbox", Value::Array(briefs)))
}

pub(crate) async fn today_summary(
    exec: &ToolExecutor,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> ToolResult {
    let today = now.date_naive();
    let day_start = today.and_hms_opt(0, 0, 0).expect("midnight").and_utc();

    let due_today = exec
        .repos
        .follow_ups
        .list_due_between(user_id, day_start, day_start + Duration::days(1))
        .await?;
    let overdue = exec
        .repos
        .follow_ups
        .list_due_between(user_id, day_start - Duration::days(365), day_start)
        .await?;
    let actions = exec.repos.pending_actions.due_on(user_id, today).await?;
    let outreach =
        exec.repos.leads.outreach_state(user_id, now - Duration::days(2)).await?;

    Ok(ToolOutcome::ok(format!(
        "Heute: {} Follow-ups faellig, {} ueberfaellig, {} Aufgaben, {} Kontakte warten auf Antwort.",
        due_today.len(),
        overdue.len(),
        actions.len(),
        outreach.awaiting_reply
    ))
    .with("due_today", json!(due_today.len()))
    .with("overdue", json!(overdue.len()))
    .with(
        "tasks",
        Value::Array(
            actions
                .iter()
                .map(|action| {
                    json!({
                        "title": action.title,
                        "type": action.action_type,
                        "detail": action.detail,
                    })
                })
                .collect(),
        ),
    )
    .with("ghosts", json!(outreach.ghosts))
    .with("awaiting_reply", json!(outreach.awaiting_reply)))
}

pub(crate) async fn pipeline_stats(exec: &ToolExecutor, user_id: &UserId) -> ToolResult {
    let counts = exec.repos.leads.status_counts(user_id).await?;
    let total: u64 = counts.iter().map(|(_, count)| count).sum();

    let by_status: Vec<Value> = counts
        .iter()
        .map(|(status, count)| json!({ "status": status.as_str(), "count": count }))
        .collect();
    Ok(ToolOutcome::ok(format!("{total} Leads in der Pipeline."))
        .with("total", json!(total))
        .with("by_status", Value::Array(by_status)))
}

pub(crate) async fn performance_stats(
    exec: &ToolExecutor,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> ToolResult {
    let week_ago = now - Duration::days(7);
    let interactions = exec.repos.interactions.recent(user_id, 200).await?;
    let logged = interactions.iter().filter(|entry| entry.occurred_at >= week_ago).count();
    let positive = interactions
        .iter()
        .filter(|entry| entry.occurred_at >= week_ago)
        .filter(|entry| {
            entry.outcome == Some(chief_core::domain::interaction::Outcome::Positive)
        })
        .count();
    let outreach =
        exec.repos.leads.outreach_state(user_id, now - Duration::days(2)).await?;

    Ok(ToolOutcome::ok(format!(
        "Letzte 7 Tage: {logged} Gespraeche geloggt, davon {positive} positiv."
    ))
    .with("interactions_7d", json!(logged))
    .with("positive_7d", json!(positive))
    .with("awaiting_reply", json!(outreach.awaiting_reply))
    .with("ghosts", json!(outreach.ghosts)))
}

pub(crate) async fn commission_status(
    exec: &ToolExecutor,
    profile: &UserProfile,
    now: DateTime<Utc>,
) -> ToolResult {
    let month_start = now
        .date_naive()
        .with_day0(0)
        .expect("first of month is valid")
        .and_hms_opt(0, 0, 0)
        .expect("midnight")
        .and_utc();
    let revenue = exec.repos.leads.month_won_revenue(&profile.id, month_start).await?;

    let mut outcome = ToolOutcome::ok(format!("Monatsumsatz bisher: {revenue} EUR."))
        .with("month_revenue", json!(revenue.to_string()));
    if let Some(goal) = profile.monthly_revenue_goal {
        if !goal.is_zero() {
            let percent = (revenue / goal * Decimal::from(100)).round();
            outcome = outcome
                .with("goal", json!(goal.to_string()))
                .with("goal_percent", json!(percent.to_string()));
        }
    }
    Ok(outcome)
}

pub(crate) async fn churn_risks(
    exec: &ToolExecutor,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> ToolResult {
    let cutoff = now - Duration::days(30);
    let customers = exec.repos.leads.inactive_customers(user_id, cutoff).await?;

    let risks: Vec<Value> = customers
        .iter()
        .map(|lead| {
            json!({
                "id": lead.id.0,
                "name": lead.name,
                "customer_since": lead.customer_since.map(|at| at.to_rfc3339()),
                "last_contact": lead
                    .last_outbound_at
                    .max(lead.last_inbound_at)
                    .map(|at| at.to_rfc3339()),
            })
        })
        .collect();
    Ok(ToolOutcome::ok(format!(
        "{} Kunden ohne Kontakt in den letzten 30 Tagen.",
        risks.len()
    ))
    .with("customers", Value::Array(risks)))
}

pub(crate) async fn get_calendar(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
    now: DateTime<Utc>,
) -> ToolResult {
    let days = arg_u64(args, "days").unwrap_or(7).clamp(1, 30);
    let day_start = now.date_naive().and_hms_opt(0, 0, 0).expect("midnight").and_utc();
    let followups = exec
        .repos
        .follow_ups
        .list_due_between(user_id, day_start, day_start + Duration::days(days as i64))
        .await?;

    let mut entries: Vec<Value> = Vec::new();
    for entry in &followups {
        let name = exec
            .repos
            .leads
            .find_by_id(user_id, &entry.lead_id)
            .await?
            .map(|lead| lead.name);
        entries.push(json!({
            "date": entry.due_at.date_naive().to_string(),
            "kind": "follow_up",
            "lead_name": name,
            "reason": entry.reason,
        }));
    }
    for offset in 0..days {
        let date = now
            .date_naive()
            .checked_add_days(Days::new(offset))
            .unwrap_or_else(|| now.date_naive());
        for action in exec.repos.pending_actions.due_on(user_id, date).await? {
            entries.push(json!({
                "date": date.to_string(),
                "kind": action.action_type,
                "title": action.title,
                "detail": action.detail,
            }));
        }
    }
    entries.sort_by(|a, b| a["date"].as_str().cmp(&b["date"].as_str()));

    Ok(ToolOutcome::ok(format!("{} Termine in den naechsten {days} Tagen.", entries.len()))
        .with("entries", Value::Array(entries)))
}

pub(crate) async fn usage_report(
    exec: &ToolExecutor,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> ToolResult {
    let since = now.date_naive() - Duration::days(7);
    let days = exec.repos.usage.daily_summary(user_id, since).await?;

    let tokens: u64 = days.iter().map(|day| day.input_tokens + day.output_tokens).sum();
    let calls: u64 = days.iter().map(|day| day.calls).sum();
    let cost: Decimal = days.iter().map(|day| day.cost).sum();

    Ok(ToolOutcome::ok(format!(
        "Letzte 7 Tage: {calls} Anfragen, {tokens} Tokens, {cost} USD."
    ))
    .with("calls", json!(calls))
    .with("tokens", json!(tokens))
    .with("cost", json!(cost.to_string()))
    .with(
        "days",
        Value::Array(
            days.iter()
                .map(|day| {
                    json!({
                        "date": day.usage_date.to_string(),
                        "tokens": day.input_tokens + day.output_tokens,
                        "calls": day.calls,
                        "cost": day.cost.to_string(),
                    })
                })
                .collect(),
        ),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use chief_core::domain::followup::FollowUpSuggestion;
    use chief_core::domain::lead::ContactEvent;

    use crate::tools::testutil::executor_with_user;

    use super::*;

    #[tokio::test]
    async fn list_leads_filters_by_temperature() {
        let (executor, profile) = executor_with_user().await;
        let mut hot = Lead::new(profile.id, "Heiss Hans");
        hot.temperature_score = 90;
        executor.repos.leads.save(hot).await.unwrap();
        executor.repos.leads.save(Lead::new(profile.id, "Kalt Kurt")).await.unwrap();

        let outcome = list_leads(&executor, &profile.id, &json!({ "temperature": "hot" }))
            .await
            .unwrap();
        assert_eq!(outcome.payload["count"], json!(1));
    }

    #[tokio::test]
    async fn followup_timeframes_use_half_open_windows() {
        let (executor, profile) = executor_with_user().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();

        // One lead per entry; a lead can only carry one pending follow-up.
        for (days_ahead, name) in [(0i64, "Heute Hanna"), (3, "Bald Berta"), (20, "Spaeter Sepp")] {
            let lead = Lead::new(profile.id, name);
            executor.repos.leads.save(lead.clone()).await.unwrap();
            let entry = FollowUpSuggestion::manual(
                profile.id,
                lead.id,
                now + Duration::days(days_ahead),
                None,
            );
            executor.repos.follow_ups.save(entry).await.unwrap();
        }

        let today = list_followups(&executor, &profile.id, &json!({ "timeframe": "today" }), now)
            .await
            .unwrap();
        assert_eq!(today.payload["followups"].as_array().unwrap().len(), 1);

        let week = list_followups(&executor, &profile.id, &json!({ "timeframe": "week" }), now)
            .await
            .unwrap();
        assert_eq!(week.payload["followups"].as_array().unwrap().len(), 2);

        let all = list_followups(&executor, &profile.id, &json!({ "timeframe": "all" }), now)
            .await
            .unwrap();
        assert_eq!(all.payload["followups"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn commission_status_reports_goal_progress() {
        let (executor, mut profile) = executor_with_user().await;
        profile.monthly_revenue_goal = Some(Decimal::from(1000));
        executor.repos.profiles.save_profile(profile.clone()).await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 4, 15, 9, 0, 0).unwrap();
        let mut customer = Lead::new(profile.id, "Tom Kunde");
        customer.status = LeadStatus::Won;
        customer.customer_since = Some(now - Duration::days(3));
        customer.customer_value = Some(Decimal::from(250));
        executor.repos.leads.save(customer).await.unwrap();

        let outcome = commission_status(&executor, &profile, now).await.unwrap();
        assert_eq!(outcome.payload["month_revenue"], json!("250"));
        assert_eq!(outcome.payload["goal_percent"], json!("25"));
    }

    #[tokio::test]
    async fn churn_risks_only_lists_stale_customers() {
        let (executor, profile) = executor_with_user().await;
        let now = Utc::now();

        let mut stale = Lead::new(profile.id, "Alte Kundin");
        stale.status = LeadStatus::Won;
        stale.apply_contact_event(ContactEvent::Converted, now - Duration::days(90));
        stale.last_outbound_at = Some(now - Duration::days(45));
        executor.repos.leads.save(stale).await.unwrap();

        let mut fresh = Lead::new(profile.id, "Neue Kundin");
        fresh.status = LeadStatus::Won;
        fresh.apply_contact_event(ContactEvent::Converted, now);
        fresh.last_outbound_at = Some(now - Duration::days(2));
        executor.repos.leads.save(fresh).await.unwrap();

        let outcome = churn_risks(&executor, &profile.id, now).await.unwrap();
        let customers = outcome.payload["customers"].as_array().unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0]["name"], json!("Alte Kundin"));
    }

    #[tokio::test]
    async fn today_summary_counts_tasks_and_followups() {
        let (executor, profile) = executor_with_user().await;
        let lead = Lead::new(profile.id, "Eva Heute");
        executor.repos.leads.save(lead.clone()).await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();

        executor
            .repos
            .follow_ups
            .save(FollowUpSuggestion::manual(profile.id, lead.id, now + Duration::hours(2), None))
            .await
            .unwrap();

        let outcome = today_summary(&executor, &profile.id, now).await.unwrap();
        assert_eq!(outcome.payload["due_today"], json!(1));
        assert_eq!(outcome.payload["overdue"], json!(0));
    }
}
