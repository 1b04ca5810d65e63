//! Two-stage intent classification: keyword pass, then a one-word
//! free-tier completion. Anything unparseable or failing defaults to
//! `Chat` — misclassification must never block a reply.

use tracing::warn;

use chief_core::{intent, Intent};
use chief_llm::{ChatMessage, ChatProvider, ModelCatalog};

const CLASSIFY_INSTRUCTION: &str = "Klassifiziere die Nachricht des Nutzers. \
    Antworte mit genau einem Wort: QUERY, ACTION, CONTENT oder CHAT. \
    Keine Begruendung, keine Satzzeichen.";

pub async fn classify(
    provider: &dyn ChatProvider,
    catalog: &ModelCatalog,
    message: &str,
) -> Intent {
    if let Some(intent) = intent::classify_keywords(message) {
        return intent;
    }

    let messages =
        [ChatMessage::system(CLASSIFY_INSTRUCTION), ChatMessage::user(message.to_string())];
    match provider.complete(&catalog.free(), &messages, None, None).await {
        Ok(completion) => Intent::parse_label(&completion.content).unwrap_or_else(|| {
            warn!(event_name = "classify_unparseable", reply = %completion.content);
            Intent::Chat
        }),
        Err(error) => {
            warn!(event_name = "classify_failed", error = %error);
            Intent::Chat
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chief_llm::{Completion, LlmError, ModelChoice, TokenUsage, ToolChoice, ToolSpec};

    use super::*;

    struct ScriptedProvider {
        replies: Mutex<Vec<Result<String, ()>>>,
        models_seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn complete(
            &self,
            model: &ModelChoice,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolSpec]>,
            _tool_choice: Option<ToolChoice>,
        ) -> Result<Completion, LlmError> {
            self.models_seen.lock().unwrap().push(model.name.clone());
            match self.replies.lock().unwrap().remove(0) {
                Ok(content) => Ok(Completion {
                    content,
                    tool_calls: Vec::new(),
                    usage: TokenUsage::default(),
                }),
                Err(()) => Err(LlmError::Exhausted { model: model.name.clone() }),
            }
        }
    }

    fn provider(replies: Vec<Result<String, ()>>) -> ScriptedProvider {
        ScriptedProvider { replies: Mutex::new(replies), models_seen: Mutex::new(Vec::new()) }
    }

    fn catalog() -> ModelCatalog {
        ModelCatalog {
            top: "top".to_string(),
            mid: "mid".to_string(),
            small: "small".to_string(),
            free: "free".to_string(),
        }
    }

    #[tokio::test]
    async fn keyword_hit_skips_the_provider() {
        let provider = provider(vec![]);
        let intent = classify(&provider, &catalog(), "Erstelle Lead Max").await;
        assert_eq!(intent, Intent::Action);
        assert!(provider.models_seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fallback_uses_the_free_tier() {
        let provider = provider(vec![Ok("QUERY".to_string())]);
        let intent = classify(&provider, &catalog(), "hm, was denkst du?").await;
        assert_eq!(intent, Intent::Query);
        assert_eq!(*provider.models_seen.lock().unwrap(), vec!["free".to_string()]);
    }

    #[tokio::test]
    async fn garbage_or_errors_default_to_chat() {
        let rambling = provider(vec![Ok("keine Ahnung ehrlich gesagt".to_string())]);
        assert_eq!(classify(&rambling, &catalog(), "tja").await, Intent::Chat);

        let erroring = provider(vec![Err(())]);
        assert_eq!(classify(&erroring, &catalog(), "tja").await, Intent::Chat);
    }
}
