//! Messaging-channel detection and chat-export parsing.
//!
//! Pasted exports from the big messengers carry recognisable markers; the
//! detector keys off those, falling back to SMS for very short inputs with
//! no URL. Parsing is line oriented and deterministic — the same text
//! always yields the same analysis.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    WhatsApp,
    Instagram,
    Facebook,
    LinkedIn,
    Telegram,
    Sms,
    Email,
    #[default]
    Unknown,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
            Self::LinkedIn => "linkedin",
            Self::Telegram => "telegram",
            Self::Sms => "sms",
            Self::Email => "email",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Self::WhatsApp),
            "instagram" => Ok(Self::Instagram),
            "facebook" => Ok(Self::Facebook),
            "linkedin" => Ok(Self::LinkedIn),
            "telegram" => Ok(Self::Telegram),
            "sms" => Ok(Self::Sms),
            "email" | "mail" => Ok(Self::Email),
            "unknown" => Ok(Self::Unknown),
            other => Err(DomainError::UnknownEnumValue {
                field: "channel",
                value: other.to_string(),
            }),
        }
    }
}

const SMS_MAX_CHARS: usize = 80;

pub fn detect_channel(text: &str) -> Channel {
    let lower = text.to_lowercase();
    if lower.contains("ende-zu-ende-verschlüsselung")
        || lower.contains("end-to-end encrypted")
        || lower.contains("wa.me")
        || lower.contains("whatsapp")
    {
        Channel::WhatsApp
    } else if lower.contains("hat auf deine story reagiert") || lower.contains("instagram") {
        Channel::Instagram
    } else if lower.contains("messenger") || lower.contains("facebook") {
        Channel::Facebook
    } else if lower.contains("linkedin") {
        Channel::LinkedIn
    } else if lower.contains("forwarded from") || lower.contains("telegram") {
        Channel::Telegram
    } else if lower.chars().count() < SMS_MAX_CHARS && !lower.contains("http") {
        Channel::Sms
    } else {
        Channel::Unknown
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
    Inbound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptMessage {
    pub direction: Direction,
    pub text: String,
    pub timestamp: Option<NaiveDateTime>,
}

/// Which message the agent should draft next, based on who spoke last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextMessageKind {
    FirstContact,
    FollowupAfterResponse,
    FollowupNoResponse,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptAnalysis {
    pub channel: Channel,
    pub lead_name: Option<String>,
    pub messages: Vec<TranscriptMessage>,
}

impl TranscriptAnalysis {
    pub fn any_outbound(&self) -> bool {
        self.messages.iter().any(|m| m.direction == Direction::Outbound)
    }

    pub fn last_direction(&self) -> Option<Direction> {
        self.messages.last().map(|m| m.direction)
    }

    pub fn next_message_kind(&self) -> NextMessageKind {
        match self.last_direction() {
            None => NextMessageKind::FirstContact,
            Some(Direction::Inbound) => NextMessageKind::FollowupAfterResponse,
            Some(Direction::Outbound) => NextMessageKind::FollowupNoResponse,
        }
    }
}

pub fn analyze_transcript(text: &str) -> TranscriptAnalysis {
    let channel = detect_channel(text);
    let mut messages: Vec<TranscriptMessage> = Vec::new();
    let mut sender_name: Option<String> = None;
    let mut pending_timestamp: Option<NaiveDateTime> = None;
    let mut current_direction: Option<Direction> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(timestamp) = parse_timestamp(line) {
            pending_timestamp = Some(timestamp);
            continue;
        }

        let lower = line.to_lowercase();
        if lower.starts_with("du hast folgendes gesendet") {
            current_direction = Some(Direction::Outbound);
            continue;
        }
        if let Some(rest) = strip_marker(line, &["du:", "gesendet:"]) {
            push_message(&mut messages, Direction::Outbound, rest, &mut pending_timestamp);
            current_direction = Some(Direction::Outbound);
            continue;
        }
        if let Some((name, rest)) = split_sender(line) {
            if sender_name.is_none() {
                sender_name = Some(name);
            }
            push_message(&mut messages, Direction::Inbound, rest, &mut pending_timestamp);
            current_direction = Some(Direction::Inbound);
            continue;
        }

        match current_direction {
            Some(direction) => {
                push_message(&mut messages, direction, line.to_string(), &mut pending_timestamp);
            }
            // Header lines before any direction marker are metadata.
            None => {}
        }
    }

    let lead_name = extract_lead_name(text).or(sender_name);
    TranscriptAnalysis { channel, lead_name, messages }
}

fn push_message(
    messages: &mut Vec<TranscriptMessage>,
    direction: Direction,
    text: String,
    pending_timestamp: &mut Option<NaiveDateTime>,
) {
    let text = text.trim().to_string();
    if text.is_empty() {
        return;
    }
    messages.push(TranscriptMessage { direction, text, timestamp: pending_timestamp.take() });
}

fn strip_marker(line: &str, markers: &[&str]) -> Option<String> {
    let lower = line.to_lowercase();
    for marker in markers {
        if lower.starts_with(marker) {
            return Some(line[marker.len()..].trim().to_string());
        }
    }
    None
}

/// `"Lisa: text"`-style inbound lines. The sender prefix must be a
/// proper-cased name and not the German first person "Du".
fn split_sender(line: &str) -> Option<(String, String)> {
    let (prefix, rest) = line.split_once(':')?;
    let prefix = prefix.trim();
    if prefix.eq_ignore_ascii_case("du") || prefix.eq_ignore_ascii_case("gesendet") {
        return None;
    }
    if !is_proper_cased_name(prefix) {
        return None;
    }
    Some((prefix.to_string(), rest.trim().to_string()))
}

fn parse_timestamp(line: &str) -> Option<NaiveDateTime> {
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(line, "%d.%m.%Y, %H:%M") {
        return Some(timestamp);
    }
    // "Alexandra, 28.11.2025, 16:22" — try everything after the first comma.
    let (_, tail) = line.split_once(", ")?;
    NaiveDateTime::parse_from_str(tail.trim(), "%d.%m.%Y, %H:%M").ok()
}

fn is_cap_word(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_uppercase() {
        return false;
    }
    let mut len = 1;
    for c in chars {
        if !(c.is_lowercase() || c == '-' || c == '\'') {
            return false;
        }
        len += 1;
    }
    len >= 2
}

fn is_proper_cased_name(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    (1..=3).contains(&words.len()) && words.iter().all(|w| is_cap_word(w))
}

/// Extract a lead name: the first line if it is a proper-cased name, else
/// the first `Firstname Lastname` pair anywhere in the text.
pub fn extract_lead_name(text: &str) -> Option<String> {
    if let Some(first_line) = text.lines().map(str::trim).find(|l| !l.is_empty()) {
        let candidate = first_line.trim_end_matches(':').trim();
        if is_proper_cased_name(candidate) {
            return Some(candidate.to_string());
        }
    }

    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'').to_string())
        .collect();
    words
        .windows(2)
        .find(|pair| is_cap_word(&pair[0]) && is_cap_word(&pair[1]))
        .map(|pair| format!("{} {}", pair[0], pair[1]))
}

const QUICK_CAPTURE_MAX_WORDS: usize = 8;

/// A short phrase with a capitalised name qualifies for Power-Hour quick
/// capture ("Max Mustermann Instagram fitness").
pub fn quick_capture_name(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.lines().count() > 2 || trimmed.split_whitespace().count() > QUICK_CAPTURE_MAX_WORDS {
        return None;
    }
    extract_lead_name(trimmed)
}
