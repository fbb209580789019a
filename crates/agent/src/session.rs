//! Per-run session state

use serde_json::Value;
use tether_bus::{value_text, Hello, Start};
use tether_provider::Message;

/// Appended to any text cut down by [`clamp`]
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Cap `text` at `limit` characters, marking the cut when one happens
pub fn clamp(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
    }
}

/// One argument from a tool's schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    pub kind: String,
    pub required: bool,
    pub description: String,
}

/// A tool as advertised by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub summary: String,
    pub args: Vec<ArgSpec>,
}

impl ToolDescriptor {
    /// Read one `tool_catalog.tools[]` entry. Non-object entries yield `None`;
    /// schema properties that are not objects are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let name = obj.get("name").map(value_text).unwrap_or_default();
        let summary = obj
            .get("summary")
            .map(value_text)
            .unwrap_or_default()
            .trim()
            .to_string();

        let schema = obj.get("args_schema").and_then(Value::as_object);
        let required: Vec<String> = schema
            .and_then(|s| s.get("required"))
            .and_then(Value::as_array)
            .map(|items| items.iter().map(value_text).collect())
            .unwrap_or_default();

        let args = schema
            .and_then(|s| s.get("properties"))
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(key, desc)| {
                        let desc = desc.as_object()?;
                        Some(ArgSpec {
                            name: key.clone(),
                            kind: desc
                                .get("type")
                                .map(value_text)
                                .unwrap_or_else(|| "string".to_string()),
                            required: required.contains(key),
                            description: desc
                                .get("description")
                                .map(value_text)
                                .unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name,
            summary,
            args,
        })
    }
}

/// Everything one run knows, built from the handshake and grown every step
#[derive(Debug, Clone)]
pub struct Session {
    pub goal: String,
    pub context: Vec<(String, String)>,
    pub allowed_tools: Vec<String>,
    pub tool_catalog: Vec<ToolDescriptor>,
    pub stdout_limit: usize,
    pub step_count: u32,
    pub messages: Vec<Message>,
    max_message_length: usize,
}

impl Session {
    pub fn new(max_message_length: usize, stdout_limit: usize) -> Self {
        Self {
            goal: String::new(),
            context: Vec::new(),
            allowed_tools: Vec::new(),
            tool_catalog: Vec::new(),
            stdout_limit,
            step_count: 0,
            messages: Vec::new(),
            max_message_length,
        }
    }

    /// Take catalog, limits and policy from `hello`
    pub fn apply_hello(&mut self, hello: &Hello) {
        self.tool_catalog = hello
            .tools()
            .iter()
            .filter_map(ToolDescriptor::from_value)
            .collect();
        if let Some(limit) = hello.stdout_limit() {
            self.stdout_limit = limit;
        }
        let mut allowed = hello.allowed_tools();
        let mut seen = std::collections::HashSet::new();
        allowed.retain(|name| seen.insert(name.clone()));
        self.allowed_tools = allowed;
    }

    /// Take goal and context from `start`
    pub fn apply_start(&mut self, start: &Start) {
        self.goal = start.goal_text();
        self.context = start.context_entries();
    }

    pub fn is_allowed(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool)
    }

    /// Append a message, clamped to the session's length cap
    pub fn push(&mut self, mut message: Message) {
        message.content = clamp(&message.content, self.max_message_length);
        self.messages.push(message);
    }
}
