//! Best-effort learning extraction after each exchange.
//!
//! A free-tier completion proposes durable facts about the user as a JSON
//! array; each candidate is validated and de-duplicated before storage.
//! Every failure path degrades to "nothing learned"; nothing here may
//! surface to the user.

use tracing::{debug, warn};

use chief_core::domain::knowledge::{KnowledgeCandidate, KnowledgeEntry};
use chief_core::UserId;
use chief_db::repositories::KnowledgeRepository;
use chief_llm::{ChatMessage, ChatProvider, ModelCatalog};

const EXTRACT_INSTRUCTION: &str = "Extrahiere dauerhafte Fakten ueber den Nutzer aus dem \
    Gespraech: Identitaet, Firma, Produkt, Arbeitsweise, Stil, Persoenliches. \
    Keine Fakten ueber Leads, keine Tagesdetails, nichts Spekulatives. \
    Antworte NUR mit einem JSON-Array: \
    [{\"category\": \"identity|company|product|preferences|style|personal|business|contacts\", \
    \"content\": \"...\"}]. Leeres Array, wenn nichts Dauerhaftes dabei ist.";

/// Extract and persist durable facts from one exchange. Returns how many
/// new facts were stored.
pub async fn extract_and_store(
    provider: &dyn ChatProvider,
    catalog: &ModelCatalog,
    knowledge: &dyn KnowledgeRepository,
    user_id: &UserId,
    user_message: &str,
    assistant_reply: &str,
) -> u32 {
    let transcript = format!("Nutzer: {user_message}\nAssistent: {assistant_reply}");
    let messages = [ChatMessage::system(EXTRACT_INSTRUCTION), ChatMessage::user(transcript)];

    let completion = match provider.complete(&catalog.free(), &messages, None, None).await {
        Ok(completion) => completion,
        Err(error) => {
            warn!(event_name = "learning_call_failed", error = %error);
            return 0;
        }
    };

    let candidates = match parse_candidates(&completion.content) {
        Some(candidates) => candidates,
        None => {
            warn!(event_name = "learning_unparseable", reply = %completion.content);
            return 0;
        }
    };

    let mut stored = 0u32;
    for candidate in candidates {
        let Some((category, content)) = candidate.validate() else {
            debug!(event_name = "learning_candidate_rejected", category = %candidate.category);
            continue;
        };
        match knowledge.insert_if_new(KnowledgeEntry::new(*user_id, category, content)).await {
            Ok(true) => stored += 1,
            Ok(false) => {}
            Err(error) => {
                warn!(event_name = "learning_store_failed", error = %error);
            }
        }
    }
    if stored > 0 {
        debug!(event_name = "learning_stored", count = stored);
    }
    stored
}

/// Tolerant JSON extraction: code fences and prose around the array are
/// common in small-model output.
fn parse_candidates(raw: &str) -> Option<Vec<KnowledgeCandidate>> {
    let trimmed = strip_fences(raw);
    if let Ok(candidates) = serde_json::from_str::<Vec<KnowledgeCandidate>>(trimmed) {
        return Some(candidates);
    }
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
