//! HTTP chat-completion client with rate-limit fallback and retries.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use chief_core::config::AppConfig;

use crate::api_types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Completion, ToolChoice, ToolSpec,
};
use crate::router::{ModelCatalog, ModelChoice, ModelTier};

const MAX_ATTEMPTS: u32 = 3;
const GENERIC_RETRY_SLEEP: Duration = Duration::from_secs(5);

/// Rate-limit backoff: `min(30s, 10s · attempt)`.
fn rate_limit_sleep(attempt: u32) -> Duration {
    Duration::from_secs((10 * u64::from(attempt)).min(30))
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model `{model}` unavailable after retries")]
    Exhausted { model: String },
}

#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        model: &ModelChoice,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<Completion, LlmError>;
}

struct Endpoint {
    base_url: String,
    api_key: Option<SecretString>,
}

pub struct HttpProviderClient {
    http: reqwest::Client,
    primary: Endpoint,
    free: Endpoint,
    catalog: ModelCatalog,
    request_timeout: Duration,
}

/// What a single attempt came back with, before retry policy is applied.
enum AttemptOutcome {
    Success(Completion),
    RateLimited,
    Timeout,
    Failed(LlmError),
}

impl HttpProviderClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            primary: Endpoint {
                base_url: config.primary.base_url.trim_end_matches('/').to_string(),
                api_key: config.primary.api_key.clone(),
            },
            free: Endpoint {
                base_url: config.free.base_url.trim_end_matches('/').to_string(),
                api_key: config.free.api_key.clone(),
            },
            catalog: ModelCatalog::from_config(config),
            request_timeout: Duration::from_secs(config.primary.timeout_secs.max(1)),
        })
    }

    fn endpoint_for(&self, tier: ModelTier) -> &Endpoint {
        match tier {
            ModelTier::Free => &self.free,
            ModelTier::Mid | ModelTier::Top => &self.primary,
        }
    }

    async fn attempt(
        &self,
        model: &ModelChoice,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        tool_choice: Option<ToolChoice>,
    ) -> AttemptOutcome {
        let endpoint = self.endpoint_for(model.tier);
        let request = ChatCompletionRequest {
            model: model.name.clone(),
            messages: messages.to_vec(),
            temperature: None,
            max_tokens: None,
            tools: tools.map(<[ToolSpec]>::to_vec),
            tool_choice,
        };

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", endpoint.base_url))
            .timeout(self.request_timeout)
            .json(&request);
        if let Some(key) = &endpoint.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(error) if error.is_timeout() => return AttemptOutcome::Timeout,
            Err(error) => return AttemptOutcome::Failed(error.into()),
        };

        let status = response.status();
        if status.as_u16() == 429 {
            return AttemptOutcome::RateLimited;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return AttemptOutcome::Failed(LlmError::Api { status: status.as_u16(), body });
        }

        match response.json::<ChatCompletionResponse>().await {
            Ok(parsed) => AttemptOutcome::Success(Completion::from_response(parsed)),
            Err(error) => AttemptOutcome::Failed(error.into()),
        }
    }

    async fn complete_with_retries(
        &self,
        model: &ModelChoice,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<Completion, LlmError> {
        let mut current = model.clone();
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(&current, messages, tools, tool_choice).await {
                AttemptOutcome::Success(completion) => return Ok(completion),
                AttemptOutcome::RateLimited => {
                    // First 429 on the top tier switches to the smaller
                    // sibling immediately instead of waiting.
                    if attempt == 1 {
                        if let Some(sibling) = self.catalog.sibling_of(&current) {
                            warn!(
                                event_name = "llm_rate_limited_fallback",
                                from = %current.name,
                                to = %sibling.name,
                                "rate limited, switching to sibling model"
                            );
                            current = sibling;
                            continue;
                        }
                    }
                    let sleep = rate_limit_sleep(attempt);
                    warn!(
                        event_name = "llm_rate_limited",
                        model = %current.name,
                        attempt,
                        sleep_secs = sleep.as_secs(),
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(sleep).await;
                }
                AttemptOutcome::Timeout => {
                    warn!(
                        event_name = "llm_timeout",
                        model = %current.name,
                        attempt,
                        "request timed out, retrying"
                    );
                    last_error = Some(LlmError::Exhausted { model: current.name.clone() });
                    tokio::time::sleep(GENERIC_RETRY_SLEEP).await;
                }
                AttemptOutcome::Failed(error) => {
                    warn!(
                        event_name = "llm_error",
                        model = %current.name,
                        attempt,
                        error = %error,
                        "provider error, retrying"
                    );
                    last_error = Some(error);
                    tokio::time::sleep(GENERIC_RETRY_SLEEP).await;
                }
            }
        }

        // Last-ditch: one attempt on the mid tier before giving up.
        let mid = self.catalog.mid();
        if mid != current {
            warn!(
                event_name = "llm_last_ditch_mid",
                from = %current.name,
                to = %mid.name,
                "retries exhausted, trying mid tier once"
            );
            if let AttemptOutcome::Success(completion) =
                self.attempt(&mid, messages, tools, tool_choice).await
            {
                return Ok(completion);
            }
        }

        Err(last_error.unwrap_or(LlmError::Exhausted { model: current.name }))
    }
}

#[async_trait::async_trait]
impl ChatProvider for HttpProviderClient {
    async fn complete(
        &self,
        model: &ModelChoice,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<Completion, LlmError> {
        self.complete_with_retries(model, messages, tools, tool_choice).await
    }
}
