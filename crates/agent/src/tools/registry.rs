//! The declarative tool catalog advertised to the model.
//!
//! Pure data. The executor's `dispatch` match is the single source of
//! behaviour; a registry test keeps the two in sync.

use serde_json::{json, Value};

use chief_llm::ToolSpec;

fn object(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

fn lead_ref() -> Value {
    json!({ "type": "string", "description": "Lead-Name oder Lead-UUID" })
}

fn relative_date(description: &str) -> Value {
    json!({
        "type": "string",
        "description": format!("{description} — relativ angeben, z.B. 'morgen' oder 'in 3 Tagen'"),
    })
}

pub fn catalog() -> Vec<ToolSpec> {
    vec![
        // Reads.
        ToolSpec::function(
            "list_leads",
            "Listet Leads des Nutzers, optional nach Status oder Temperatur gefiltert.",
            object(
                json!({
                    "status": { "type": "string", "enum": ["new", "contacted", "qualified", "proposal", "negotiation", "won", "lost", "parked"] },
                    "temperature": { "type": "string", "enum": ["cold", "warm", "hot"] },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 50 }
                }),
                &[],
            ),
        ),
        ToolSpec::function(
            "get_lead_details",
            "Alle gespeicherten Daten zu einem Lead.",
            object(json!({ "lead": lead_ref() }), &["lead"]),
        ),
        ToolSpec::function(
            "get_lead_history",
            "Interaktions-Historie eines Leads, neueste zuerst.",
            object(
                json!({ "lead": lead_ref(), "limit": { "type": "integer", "minimum": 1, "maximum": 50 } }),
                &["lead"],
            ),
        ),
        ToolSpec::function(
            "search_leads_by_tag",
            "Sucht Leads mit einem bestimmten Tag.",
            object(json!({ "tag": { "type": "string" } }), &["tag"]),
        ),
        ToolSpec::function(
            "list_followups",
            "Follow-ups nach Zeitraum: today, week, overdue oder all.",
            object(
                json!({ "timeframe": { "type": "string", "enum": ["today", "week", "overdue", "all"] } }),
                &[],
            ),
        ),
        ToolSpec::function(
            "followup_inbox",
            "Die offenen Follow-up-Vorschlaege, faelligste zuerst.",
            object(json!({ "limit": { "type": "integer", "minimum": 1, "maximum": 50 } }), &[]),
        ),
        ToolSpec::function(
            "today_summary",
            "Tagesueberblick: faellige Follow-ups, Aufgaben, Outreach-Lage.",
            object(json!({}), &[]),
        ),
        ToolSpec::function(
            "pipeline_stats",
            "Lead-Anzahl pro Pipeline-Status.",
            object(json!({}), &[]),
        ),
        ToolSpec::function(
            "performance_stats",
            "Aktivitaets- und Nutzungsstatistik der letzten 7 Tage.",
            object(json!({}), &[]),
        ),
        ToolSpec::function(
            "commission_status",
            "Monatsumsatz gegen das Umsatzziel des Nutzers.",
            object(json!({}), &[]),
        ),
        ToolSpec::function(
            "churn_risks",
            "Kunden ohne Kontakt in den letzten 30 Tagen.",
            object(json!({}), &[]),
        ),
        ToolSpec::function(
            "get_calendar",
            "Faellige Follow-ups und Termine der naechsten Tage.",
            object(json!({ "days": { "type": "integer", "minimum": 1, "maximum": 30 } }), &[]),
        ),
        ToolSpec::function(
            "usage_report",
            "Token-Verbrauch und Kosten der letzten 7 Tage.",
            object(json!({}), &[]),
        ),
        // Content.
        ToolSpec::function(
            "draft_message",
            "Entwirft eine kopierbare Nachricht fuer einen Lead.",
            object(
                json!({
                    "lead": lead_ref(),
                    "channel": { "type": "string", "enum": ["whatsapp", "instagram", "facebook", "linkedin", "telegram", "sms", "email"] },
                    "message_type": { "type": "string", "enum": ["first_contact", "followup_after_response", "followup_no_response"] },
                    "tone": { "type": "string" }
                }),
                &["lead"],
            ),
        ),
        ToolSpec::function(
            "handle_objection",
            "Formuliert eine Antwort auf einen Einwand.",
            object(
                json!({ "lead": lead_ref(), "objection": { "type": "string" } }),
                &["objection"],
            ),
        ),
        ToolSpec::function(
            "generate_sequence",
            "Erzeugt eine Follow-up-Nachrichtensequenz fuer einen Lead.",
            object(
                json!({ "lead": lead_ref(), "steps": { "type": "integer", "minimum": 2, "maximum": 5 } }),
                &["lead"],
            ),
        ),
        ToolSpec::function(
            "generate_customer_protocol",
            "Fasst die Historie eines Kunden als Protokoll zusammen.",
            object(json!({ "lead": lead_ref() }), &["lead"]),
        ),
        // Lead writes.
        ToolSpec::function(
            "create_lead",
            "Legt einen neuen Lead an. Handles werden normalisiert, ein 3-Tage-Follow-up wird automatisch erstellt.",
            object(
                json!({
                    "name": { "type": "string" },
                    "email": { "type": "string" },
                    "phone": { "type": "string" },
                    "instagram": { "type": "string" },
                    "facebook_url": { "type": "string" },
                    "linkedin": { "type": "string" },
                    "whatsapp": { "type": "string" },
                    "notes": { "type": "string" },
                    "source_channel": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }),
                &["name"],
            ),
        ),
        ToolSpec::function(
            "quick_update_lead",
            "Aktualisiert Felder eines Leads: Status, Temperatur, Tags, Kanaele, Notizen.",
            object(
                json!({
                    "lead": lead_ref(),
                    "status": { "type": "string" },
                    "temperature": { "type": "string", "description": "cold/warm/hot oder Zahl 0-100" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "email": { "type": "string" },
                    "phone": { "type": "string" },
                    "instagram": { "type": "string" },
                    "whatsapp": { "type": "string" },
                    "linkedin": { "type": "string" },
                    "notes": { "type": "string" }
                }),
                &["lead"],
            ),
        ),
        ToolSpec::function(
            "update_lead_status",
            "Setzt den Pipeline-Status, validiert gegen die erlaubten Uebergaenge.",
            object(
                json!({ "lead": lead_ref(), "status": { "type": "string" } }),
                &["lead", "status"],
            ),
        ),
        ToolSpec::function(
            "convert_to_customer",
            "Markiert einen Lead als gewonnenen Kunden, optional mit Umsatzwert.",
            object(
                json!({ "lead": lead_ref(), "value": { "type": "number", "description": "Umsatz in EUR" } }),
                &["lead"],
            ),
        ),
        ToolSpec::function(
            "update_lead_stage",
            "Setzt die Verkaufsphase (0-8).",
            object(
                json!({ "lead": lead_ref(), "stage": { "type": "integer", "minimum": 0, "maximum": 8 } }),
                &["lead", "stage"],
            ),
        ),
        // Follow-up writes.
        ToolSpec::function(
            "create_follow_up",
            "Plant ein Follow-up. Schlaegt fehl, wenn bereits eines offen ist.",
            object(
                json!({
                    "lead": lead_ref(),
                    "date": relative_date("Faelligkeit"),
                    "reason": { "type": "string" }
                }),
                &["lead"],
            ),
        ),
        ToolSpec::function(
            "update_follow_up",
            "Verschiebt oder schliesst das offene Follow-up eines Leads.",
            object(
                json!({
                    "lead": lead_ref(),
                    "date": relative_date("Neue Faelligkeit"),
                    "status": { "type": "string", "enum": ["pending", "sent", "skipped", "snoozed"] },
                    "reason": { "type": "string" }
                }),
                &["lead"],
            ),
        ),
        ToolSpec::function(
            "bulk_create_followups",
            "Legt Follow-ups fuer alle oder gefilterte Leads an; vorhandene offene bleiben unberuehrt.",
            object(
                json!({
                    "status": { "type": "string", "description": "nur Leads mit diesem Status" },
                    "date": relative_date("Faelligkeit"),
                    "reason": { "type": "string" }
                }),
                &[],
            ),
        ),
        ToolSpec::function(
            "start_followup_flow",
            "Startet einen Follow-up-Flow (COLD_NO_REPLY, INTERESTED_LATER, ERSTKONTAKT, MANUAL).",
            object(
                json!({ "lead": lead_ref(), "flow": { "type": "string" } }),
                &["lead", "flow"],
            ),
        ),
        // Logging.
        ToolSpec::function(
            "log_interaction",
            "Loggt ein Gespraech: Zusammenfassung, Ausgang, Fakten, Tags.",
            object(
                json!({
                    "lead": lead_ref(),
                    "summary": { "type": "string" },
                    "channel": { "type": "string" },
                    "outcome": { "type": "string", "enum": ["positive", "neutral", "negative"] },
                    "key_facts": { "type": "array", "items": { "type": "string" } },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "next_steps": { "type": "string" },
                    "follow_up_date": relative_date("optionales Follow-up")
                }),
                &["lead", "summary"],
            ),
        ),
        ToolSpec::function(
            "log_message_sent",
            "Protokolliert eine versendete Nachricht; setzt den Lead auf contacted und plant ein 3-Tage-Follow-up.",
            object(
                json!({ "lead": lead_ref(), "channel": { "type": "string" }, "message": { "type": "string" } }),
                &["lead"],
            ),
        ),
        // Memory.
        ToolSpec::function(
            "save_user_knowledge",
            "Merkt sich einen dauerhaften Fakt ueber den Nutzer.",
            object(
                json!({
                    "category": { "type": "string", "enum": ["identity", "company", "product", "preferences", "style", "personal", "business", "contacts"] },
                    "content": { "type": "string" }
                }),
                &["category", "content"],
            ),
        ),
        ToolSpec::function(
            "save_user_preference",
            "Speichert eine strukturierte Einstellung (Signatur, Stil, Sprache, Regeln).",
            object(
                json!({
                    "category": { "type": "string", "enum": ["signature", "message_style", "greeting", "language", "rules"] },
                    "key": { "type": "string" },
                    "value": { "type": "string" }
                }),
                &["category", "key", "value"],
            ),
        ),
        // External effects.
        ToolSpec::function(
            "prepare_message",
            "Erzeugt einen Deep-Link zum Versand (wa.me, mailto, Instagram, LinkedIn). Versendet nichts.",
            object(
                json!({
                    "lead": lead_ref(),
                    "channel": { "type": "string", "enum": ["whatsapp", "email", "instagram", "linkedin"] },
                    "text": { "type": "string" },
                    "subject": { "type": "string", "description": "nur fuer E-Mail" }
                }),
                &["lead", "channel", "text"],
            ),
        ),
        ToolSpec::function(
            "research_company",
            "Sucht oeffentliche Firmendaten (Adresse, Branche).",
            object(json!({ "query": { "type": "string" } }), &["query"]),
        ),
        ToolSpec::function(
            "schedule_meeting",
            "Legt einen Termin mit einem Lead an.",
            object(
                json!({
                    "lead": lead_ref(),
                    "date": relative_date("Termin"),
                    "title": { "type": "string" }
                }),
                &["lead", "date"],
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;

    use crate::tools::testutil::executor_with_user;

    use super::*;

    #[test]
    fn names_are_unique_and_schemas_are_objects() {
        let catalog = catalog();
        let names: HashSet<&str> =
            catalog.iter().map(|spec| spec.function.name.as_str()).collect();
        assert_eq!(names.len(), catalog.len());
        for spec in &catalog {
            assert_eq!(spec.function.parameters["type"], "object", "{}", spec.function.name);
            assert!(!spec.function.description.is_empty());
        }
    }

    #[tokio::test]
    async fn every_advertised_tool_dispatches() {
        let (executor, profile) = executor_with_user().await;
        for spec in catalog() {
            let outcome =
                executor.execute(&profile, &spec.function.name, "{}", Utc::now()).await;
            assert!(
                !outcome.message.contains("Unbekanntes Tool"),
                "{} is advertised but not dispatched",
                spec.function.name
            );
        }
    }
}
