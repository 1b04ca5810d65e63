//! Keyword-based intent classification (first stage).
//!
//! The word lists are disjoint and checked in a fixed order, so the pass
//! is a pure function. Anything unmatched falls through to the LLM
//! fallback in the orchestrator, which defaults to `Chat` on any doubt.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Query,
    Action,
    Content,
    Chat,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Action => "ACTION",
            Self::Content => "CONTENT",
            Self::Chat => "CHAT",
        }
    }

    /// Parse the first token of an LLM classification reply; anything
    /// unrecognised is `None` (the caller defaults to `Chat`).
    pub fn parse_label(reply: &str) -> Option<Intent> {
        let first = reply.split_whitespace().next()?;
        let token: String =
            first.chars().filter(|c| c.is_ascii_alphabetic()).collect::<String>().to_uppercase();
        match token.as_str() {
            "QUERY" => Some(Self::Query),
            "ACTION" => Some(Self::Action),
            "CONTENT" => Some(Self::Content),
            "CHAT" => Some(Self::Chat),
            _ => None,
        }
    }
}

const ACTION_KEYWORDS: &[&str] = &[
    "erstelle",
    "erstell",
    "anlegen",
    "lege an",
    "follow-up",
    "followup",
    "follow up",
    "fu ",
    "termin",
    "speichere",
    "speicher",
    "aktualisiere",
    "ändere",
    "markiere",
    "logge",
    "trage ein",
    "verschiebe",
    "create",
    "schedule",
    "update ",
    "log ",
    "remind",
    "convert",
];

const CONTENT_KEYWORDS: &[&str] = &[
    "schreibe",
    "schreib",
    "formuliere",
    "entwirf",
    "nachricht für",
    "nachricht an",
    "antwort auf",
    "einwand",
    "objection",
    "draft",
    "write a message",
    "sequenz",
    "vorlage",
];

const QUERY_KEYWORDS: &[&str] = &[
    "zeige",
    "zeig",
    "wie viele",
    "wieviele",
    "welche leads",
    "welcher lead",
    "liste",
    "übersicht",
    "statistik",
    "stats",
    "pipeline",
    "umsatz",
    "offene",
    "fällig",
    "heute dran",
    "show me",
    "list my",
    "how many",
    "wer ist",
];

/// First-stage classification. Returns `None` when no keyword list fires.
pub fn classify_keywords(message: &str) -> Option<Intent> {
    let lower = message.to_lowercase();
    if ACTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Intent::Action);
    }
    if CONTENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Intent::Content);
    }
    if QUERY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Intent::Query);
    }
    None
}

const CRM_HINTS: &[&str] =
    &["lead", "kunde", "kontakt", "follow", "termin", "pipeline", "interessent"];

/// Whether the first provider call should be offered the tool catalog.
pub fn needs_tools(intent: Intent, message: &str) -> bool {
    if matches!(intent, Intent::Action | Intent::Query) {
        return true;
    }
    let lower = message.to_lowercase();
    CRM_HINTS.iter().any(|hint| lower.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_keywords_win() {
        assert_eq!(classify_keywords("Erstelle Lead Max Mustermann"), Some(Intent::Action));
        assert_eq!(classify_keywords("fu Lisa morgen"), Some(Intent::Action));
    }

    #[test]
    fn content_keywords() {
        assert_eq!(classify_keywords("Schreibe eine Nachricht an Anna"), Some(Intent::Content));
    }

    #[test]
    fn query_keywords() {
        assert_eq!(classify_keywords("Zeige meine Pipeline"), Some(Intent::Query));
        assert_eq!(classify_keywords("wie viele leads habe ich?"), Some(Intent::Query));
    }

    #[test]
    fn smalltalk_matches_nothing() {
        assert_eq!(classify_keywords("Danke dir, bis später!"), None);
    }

    #[test]
    fn classification_is_deterministic() {
        let message = "Erstelle Lead Max und schreibe ihm eine Nachricht";
        assert_eq!(classify_keywords(message), classify_keywords(message));
        assert_eq!(classify_keywords(message), Some(Intent::Action));
    }

    #[test]
    fn parse_label_takes_first_token() {
        assert_eq!(Intent::parse_label("ACTION"), Some(Intent::Action));
        assert_eq!(Intent::parse_label("query, because the user asks"), Some(Intent::Query));
        assert_eq!(Intent::parse_label("I think this is chat"), None);
        assert_eq!(Intent::parse_label(""), None);
    }

    #[test]
    fn needs_tools_for_crm_mentions_even_in_chat() {
        assert!(needs_tools(Intent::Chat, "was war nochmal mit dem Lead von gestern?"));
        assert!(!needs_tools(Intent::Chat, "erzähl mir einen Witz"));
        assert!(needs_tools(Intent::Action, "egal was"));
    }
}
