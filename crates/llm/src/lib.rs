//! Provider-facing chat-completion layer: wire types, model routing,
//! pricing, and the retrying HTTP client.

pub mod api_types;
pub mod client;
pub mod pricing;
pub mod router;

pub use api_types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Completion, FunctionCall,
    FunctionSpec, TokenUsage, ToolCall, ToolChoice, ToolSpec,
};
pub use client::{ChatProvider, HttpProviderClient, LlmError};
pub use router::{ModelCatalog, ModelChoice, ModelTier};
