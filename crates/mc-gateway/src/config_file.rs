//! Model hint read from the gateway's own config file.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".openclaw").join("openclaw.json"))
}

/// `agents.defaults.model.primary`, or `agents.defaults.model` when it is a
/// plain string.
pub fn parse_model_hint(contents: &str) -> Option<String> {
    let value: Value = serde_json::from_str(contents).ok()?;
    let model = value.pointer("/agents/defaults/model")?;
    let name = match model {
        Value::String(name) => name.as_str(),
        Value::Object(_) => model.get("primary")?.as_str()?,
        _ => return None,
    };
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Missing or unreadable files yield `None`.
pub async fn read_model_hint(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => parse_model_hint(&contents),
        Err(err) => {
            debug!(event = "model_hint_unavailable", path = %path.display(), error = %err);
            None
        }
    }
}
