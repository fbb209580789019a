//! Model action parsing and validation
//!
//! A reply is free-form text. It is read as a JSON object first whole, then
//! from the first `{` to the last `}`, and the object is then checked against
//! the action schema and the session's tool policy.

use serde_json::{Map, Value};
use thiserror::Error;

use tether_bus::{value_text, Artifact};

/// A schema violation. The display text is shown to the model verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("`type` must be `tool` or `final`")]
    InvalidType,

    #[error("`tool` is required when `type` is `tool`")]
    MissingTool,

    #[error("Tool `{0}` is not allowed.")]
    ToolNotAllowed(String),

    #[error("`args` must be an object")]
    InvalidArgs,

    #[error("`answer` is required when `type` is `final`")]
    MissingAnswer,
}

/// One validated model step
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Tool {
        thought: Option<String>,
        tool: String,
        args: Map<String, Value>,
    },
    Final {
        thought: Option<String>,
        answer: String,
        artifacts: Vec<Artifact>,
    },
}

/// Pull a JSON object out of a model reply
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Some(map);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// The trimmed `thought`, when it is a non-blank string
pub fn thought_of(object: &Map<String, Value>) -> Option<String> {
    object
        .get("thought")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Keep artifacts that are objects carrying name, mime and content
pub fn filter_artifacts(value: Option<&Value>) -> Vec<Artifact> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let item = item.as_object()?;
            Some(Artifact {
                name: value_text(item.get("name")?),
                mime: value_text(item.get("mime")?),
                content: value_text(item.get("content")?),
            })
        })
        .collect()
}

impl Action {
    /// Validate a parsed object against the schema and the allowed-tool set
    pub fn from_object<F>(mut object: Map<String, Value>, is_allowed: F) -> Result<Self, ActionError>
    where
        F: Fn(&str) -> bool,
    {
        let thought = thought_of(&object);
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);

        match kind.as_deref() {
            Some("tool") => {
                let tool = match object.get("tool") {
                    Some(Value::String(name)) if !name.is_empty() => name.clone(),
                    Some(Value::Null) | None => return Err(ActionError::MissingTool),
                    Some(Value::String(_)) => return Err(ActionError::MissingTool),
                    Some(other) => return Err(ActionError::ToolNotAllowed(other.to_string())),
                };
                if !is_allowed(&tool) {
                    return Err(ActionError::ToolNotAllowed(tool));
                }

                let args = match object.remove("args") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(args)) => args,
                    Some(_) => return Err(ActionError::InvalidArgs),
                };

                Ok(Action::Tool {
                    thought,
                    tool,
                    args,
                })
            }
            Some("final") => {
                let answer = match object.get("answer") {
                    None => return Err(ActionError::MissingAnswer),
                    Some(Value::Null) => String::new(),
                    Some(value) => value_text(value).trim().to_string(),
                };
                let artifacts = filter_artifacts(object.get("artifacts"));

                Ok(Action::Final {
                    thought,
                    answer,
                    artifacts,
                })
            }
            _ => Err(ActionError::InvalidType),
        }
    }
}
