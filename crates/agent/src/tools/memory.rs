//! Persistent memory tools: free-form knowledge and structured
//! preferences.

use serde_json::{json, Value};

use chief_core::domain::knowledge::{KnowledgeCategory, KnowledgeEntry};
use chief_core::domain::preference::{PreferenceCategory, UserPreference};
use chief_core::UserId;

use super::{require_str, ToolError, ToolExecutor, ToolOutcome, ToolResult};

pub(crate) async fn save_user_knowledge(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let category = require_str(args, "category")?
        .parse::<KnowledgeCategory>()
        .map_err(ToolError::from)?;
    let content = require_str(args, "content")?;
    if content.chars().count() < chief_core::domain::knowledge::MIN_KNOWLEDGE_CONTENT_CHARS {
        return Ok(ToolOutcome::fail("Zu kurz, um es zu merken."));
    }

    let entry = KnowledgeEntry::new(*user_id, category, content);
    let written = exec.repos.knowledge.insert_if_new(entry).await?;
    let message = if written {
        format!("Gemerkt ({}).", category.as_str())
    } else {
        "Das wusste ich schon.".to_string()
    };
    Ok(ToolOutcome::ok(message).with("stored", json!(written)))
}

pub(crate) async fn save_user_preference(
    exec: &ToolExecutor,
    user_id: &UserId,
    args: &Value,
) -> ToolResult {
    let category = require_str(args, "category")?
        .parse::<PreferenceCategory>()
        .map_err(ToolError::from)?;
    let key = require_str(args, "key")?;
    let value = require_str(args, "value")?;

    let preference = UserPreference::new(*user_id, category, key, value);
    exec.repos.preferences.upsert(preference).await?;
    Ok(ToolOutcome::ok(format!("Einstellung `{key}` gespeichert."))
        .with("category", json!(category.as_str())))
}
