//! System-prompt assembly.
//!
//! A pure function over the context bundle. Fragments are concatenated in
//! a fixed precedence order; the mandatory ones (shortcuts, formatting,
//! stage machine, psychology primer, domain base) are always emitted,
//! everything else only when its context slot holds data.

use chief_core::domain::preference::PreferenceCategory;
use chief_core::Channel;

use crate::context::ContextBundle;

#[derive(Clone, Copy, Debug, Default)]
pub struct PromptOptions {
    pub power_hour_active: bool,
}

const SHORTCUTS: &str = "\
## Kurzbefehle
Der Nutzer verwendet Einzelbuchstaben-Abkuerzungen:
- `fu <name> <datum>` = Follow-up anlegen
- `l <name>` = Lead-Details zeigen
- `n <name>: <text>` = Notiz / Interaktion loggen
- `s <name>` = Nachricht fuer den Lead entwerfen
Behandle sie wie vollstaendige Anweisungen.";

const FORMATTING: &str = "\
## Formatierung
Kopierbare Nachrichten an Leads enthalten NIE Markdown, keine Aufzaehlungszeichen
und hoechstens ein Emoji. Deine eigenen Antworten an den Nutzer sind kurz,
deutsch und ohne Floskeln. Keine doppelten Leerzeilen.";

const SALES_STAGES: &str = "\
## Verkaufsphasen (0-8)
0 Erstkontakt, 1 Rapport, 2 Bedarf, 3 Problem verstanden, 4 Loesung gezeigt,
5 Einwaende behandelt, 6 Angebot, 7 Abschluss, 8 Kunde. Disqualifiziert faellt
heraus (Status lost). Bewege Leads nur vorwaerts und nie zwei Phasen auf einmal
ohne Beleg aus dem Gespraech.";

const SALES_PSYCHOLOGY: &str = "\
## Verkaufspsychologie
Fragen vor Argumenten. Spiegle die Sprache des Leads. Kein Druck vor Phase 5;
Verknappung nur wenn real. Einwaende sind Kaufsignale: erst anerkennen, dann
isolieren, dann aufloesen.";

const DOMAIN_BASE: &str = "\
## Werkzeuge und Daten
Nutze fuer jede Aktion und jede Datenfrage die bereitgestellten Tools; antworte
nie mit erfundenen CRM-Daten. Leads haben Status (new, contacted, qualified,
proposal, negotiation, won, lost, parked), Temperatur (0-100, kalt/warm/heiss)
und Kontaktstatus. Follow-up-Flows: COLD_NO_REPLY (3/5/7 Tage),
INTERESTED_LATER (7/14), ERSTKONTAKT (1/3/5), MANUAL (3).
Pro Lead ist hoechstens ein offenes Follow-up erlaubt; bei einem Duplikat nutze
update_follow_up. Datumsangaben in Tool-Argumenten IMMER relativ angeben
(\"morgen\", \"in 3 Tagen\") — niemals absolute Daten aus importierten Chats
uebernehmen, die liegen in der Vergangenheit.";

const POWER_HOUR_OVERLAY: &str = "\
## Power-Hour
Der Nutzer ist im Schnellerfassungs-Modus. Antworte maximal knapp: Lead
anlegen, Follow-up setzen, eine kopierbare Nachricht zwischen --- Zeilen
liefern. Keine Rueckfragen, kein Smalltalk.";

const FINANCE_DISCLAIMER: &str =
    "Hinweis: Zahlen sind Rohdaten aus dem CRM, keine Finanzberatung.";

fn section(out: &mut String, body: &str) {
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(body.trim_end());
}

fn channel_guidance(channel: Channel) -> Option<&'static str> {
    match channel {
        Channel::Instagram => Some(
            "Instagram: Erstnachricht unter 300 Zeichen, Bezug auf Story oder Post, \
             kein Link in der ersten DM.",
        ),
        Channel::WhatsApp => Some(
            "WhatsApp: persoenlich und kurz, Sprachnachricht anbieten, \
             keine Massennachrichten-Formulierungen.",
        ),
        Channel::LinkedIn => Some(
            "LinkedIn: professionell, Bezug auf Profil oder Branche, \
             kein Pitch in der Kontaktanfrage.",
        ),
        Channel::Email => Some("E-Mail: klare Betreffzeile, ein Thema, eine Handlungsaufforderung."),
        _ => None,
    }
}

/// Build the single system message. Fragment order is load-bearing:
/// earlier fragments bind later behaviour.
pub fn assemble(bundle: &ContextBundle, options: &PromptOptions) -> String {
    let mut out = String::new();

    // 1-4: mandatory preamble.
    section(&mut out, SHORTCUTS);
    section(&mut out, FORMATTING);
    section(&mut out, SALES_STAGES);
    section(&mut out, SALES_PSYCHOLOGY);

    // 5: identity.
    let mut identity = format!(
        "## Dein Nutzer\n{} — sprich ihn mit Vornamen an; Signaturen verwenden \
         den vollen Namen woertlich.",
        bundle.profile.display_name
    );
    if let Some(org) = &bundle.organization {
        identity.push_str(&format!("\nTeam: {}.", org.name));
    }
    if let Some(goal) = bundle.profile.monthly_revenue_goal {
        identity.push_str(&format!("\nMonatsziel: {goal} EUR Umsatz."));
    }
    section(&mut out, &identity);

    // 6: knowledge, preferences first.
    let preferences: Vec<&str> = bundle
        .preferences
        .iter()
        .filter(|p| p.category != PreferenceCategory::Rules)
        .map(|p| p.value.as_str())
        .collect();
    if !preferences.is_empty() || !bundle.knowledge.is_empty() {
        let mut knowledge = String::from("## Wissen ueber den Nutzer");
        if !preferences.is_empty() {
            knowledge.push_str("\nImmer anwenden:");
            for value in &preferences {
                knowledge.push_str(&format!("\n- {value}"));
            }
        }
        if !bundle.knowledge.is_empty() {
            knowledge.push_str("\nGemerkt:");
            for entry in &bundle.knowledge {
                knowledge.push_str(&format!("\n- [{}] {}", entry.category.as_str(), entry.content));
            }
        }
        section(&mut out, &knowledge);
    }

    // 7: vertical templates.
    if let Some(vertical) = &bundle.profile.vertical {
        section(
            &mut out,
            &format!(
                "## Branche\nDer Nutzer arbeitet im Bereich {vertical}. Beispiele, \
                 Einwaende und Nutzenargumente aus dieser Branche waehlen."
            ),
        );
    }

    // 8: MLM block with current rank data.
    if let Some(company) = &bundle.profile.mlm_company {
        let mut mlm = format!(
            "## Network-Marketing\nFirma: {company}. Produkt- und Comp-Plan-Wissen \
             dieser Firma verwenden, keine Konkurrenzprodukte empfehlen."
        );
        if let Some(rank) = &bundle.profile.mlm_rank {
            mlm.push_str(&format!("\nAktueller Rang: {rank}."));
        }
        if let Some(next) = &bundle.profile.mlm_next_rank {
            mlm.push_str(&format!(" Naechstes Ziel: {next}."));
        }
        if let Some(team) = bundle.profile.mlm_team_size {
            mlm.push_str(&format!("\nTeamgroesse: {team}."));
        }
        section(&mut out, &mlm);
    }

    // 9: channel guidance for the channels actually in play.
    let mut guidance: Vec<&'static str> = Vec::new();
    for lead in &bundle.mentioned_leads {
        if let Some(text) = lead.source_channel.and_then(channel_guidance) {
            if !guidance.contains(&text) {
                guidance.push(text);
            }
        }
    }
    if !guidance.is_empty() {
        section(&mut out, &format!("## Kanal-Regeln\n{}", guidance.join("\n")));
    }

    // 10: mandatory domain base.
    section(&mut out, DOMAIN_BASE);

    // 11: mode overlays.
    if options.power_hour_active {
        section(&mut out, POWER_HOUR_OVERLAY);
    }

    // 12: living OS.
    if !bundle.living_os.is_empty() {
        let mut living = String::from("## Arbeitsregeln und Muster");
        for rule in &bundle.living_os.rules {
            living.push_str(&format!("\nRegel: {rule}"));
        }
        for pattern in &bundle.living_os.patterns {
            living.push_str(&format!("\nMuster: {pattern}"));
        }
        for broadcast in &bundle.living_os.broadcasts {
            living.push_str(&format!("\nTeam: {broadcast}"));
        }
        for insight in &bundle.living_os.collective_insights {
            living.push_str(&format!("\nErkenntnis: {insight}"));
        }
        if let Some(benchmark) = &bundle.living_os.benchmark {
            living.push_str(&format!("\nBenchmark: {benchmark}"));
        }
        section(&mut out, &living);
    }

    // 13: brand storybook.
    if let Some(storybook) = bundle.storybook() {
        if !storybook.is_empty() {
            let mut brand = String::from("## Storybook");
            for story in &storybook.stories {
                brand.push_str(&format!("\nStory: {story}"));
            }
            for product in &storybook.products {
                brand.push_str(&format!("\nProdukt: {product}"));
            }
            for guardrail in &storybook.guardrails {
                brand.push_str(&format!("\nRegel: {guardrail}"));
            }
            section(&mut out, &brand);
        }
    }

    // 14: outreach context.
    if !bundle.outreach.is_empty() {
        let mut outreach = format!(
            "## Outreach-Lage\n{} Kontakte warten auf Antwort, davon {} Ghosts \
             (seit mehr als 2 Tagen still).",
            bundle.outreach.awaiting_reply, bundle.outreach.ghosts
        );
        for entry in &bundle.outreach.per_channel {
            outreach.push_str(&format!("\n- {}: {}", entry.channel.as_str(), entry.count));
        }
        section(&mut out, &outreach);
    }

    // 15: workflow context.
    if !bundle.pending_today.is_empty() || !bundle.finance.is_empty() {
        let mut workflow = String::from("## Heute");
        for action in &bundle.pending_today {
            workflow.push_str(&format!("\n- [{}] {}", action.action_type, action.title));
        }
        if !bundle.finance.is_empty() {
            workflow.push_str(&format!(
                "\nOffene Follow-ups: {} ({} ueberfaellig). Monatsumsatz: {} EUR.\n{}",
                bundle.finance.open_items,
                bundle.finance.overdue_items,
                bundle.finance.month_revenue,
                FINANCE_DISCLAIMER
            ));
        }
        section(&mut out, &workflow);
    }

    out
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use chief_core::domain::context::{FinanceSummary, LivingOs, OutreachState};
    use chief_core::domain::knowledge::{KnowledgeCategory, KnowledgeEntry};
    use chief_core::{UserId, UserProfile};

    use super::*;

    fn bundle() -> ContextBundle {
        ContextBundle {
            profile: UserProfile::new(UserId(Uuid::new_v4()), "Max Mustermann"),
            organization: None,
            knowledge: Vec::new(),
            preferences: Vec::new(),
            recent_activity: Vec::new(),
            pending_today: Vec::new(),
            finance: FinanceSummary::default(),
            outreach: OutreachState::default(),
            living_os: LivingOs::default(),
            mentioned_leads: Vec::new(),
        }
    }

    #[test]
    fn mandatory_fragments_always_present() {
        let prompt = assemble(&bundle(), &PromptOptions::default());
        for heading in ["## Kurzbefehle", "## Formatierung", "## Verkaufsphasen", "## Verkaufspsychologie", "## Werkzeuge und Daten"] {
            assert!(prompt.contains(heading), "missing {heading}");
        }
    }

    #[test]
    fn empty_slots_are_omitted() {
        let prompt = assemble(&bundle(), &PromptOptions::default());
        assert!(!prompt.contains("## Wissen"));
        assert!(!prompt.contains("## Outreach-Lage"));
        assert!(!prompt.contains("## Power-Hour"));
        assert!(!prompt.contains("## Heute"));
    }

    #[test]
    fn fragment_order_is_stable() {
        let mut bundle = bundle();
        bundle.outreach.ghosts = 3;
        bundle.outreach.awaiting_reply = 5;
        bundle.living_os.rules.push("nie vor 9 Uhr schreiben".to_string());
        let prompt = assemble(&bundle, &PromptOptions { power_hour_active: true });

        let position = |needle: &str| prompt.find(needle).unwrap_or_else(|| panic!("missing {needle}"));
        assert!(position("## Kurzbefehle") < position("## Dein Nutzer"));
        assert!(position("## Werkzeuge und Daten") < position("## Power-Hour"));
        assert!(position("## Power-Hour") < position("## Arbeitsregeln und Muster"));
        assert!(position("## Arbeitsregeln und Muster") < position("## Outreach-Lage"));
    }

    #[test]
    fn knowledge_lists_preferences_before_entries() {
        let mut bundle = bundle();
        bundle.knowledge.push(KnowledgeEntry::new(
            bundle.profile.id,
            KnowledgeCategory::Style,
            "kurze Saetze",
        ));
        let prompt = assemble(&bundle, &PromptOptions::default());
        assert!(prompt.contains("[style] kurze Saetze"));
    }

    #[test]
    fn finance_block_carries_the_disclaimer() {
        let mut bundle = bundle();
        bundle.finance = FinanceSummary {
            open_items: 4,
            overdue_items: 1,
            month_revenue: Decimal::new(24900, 2),
        };
        let prompt = assemble(&bundle, &PromptOptions::default());
        assert!(prompt.contains("keine Finanzberatung"));
        assert!(prompt.contains("Offene Follow-ups: 4 (1 ueberfaellig)"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let bundle = bundle();
        let options = PromptOptions::default();
        assert_eq!(assemble(&bundle, &options), assemble(&bundle, &options));
    }
}
