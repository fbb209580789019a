//! Context builder for assembling agent prompts

use tether_bus::{value_text, ToolResult};
use tether_provider::Message;
use tracing::debug;

use crate::session::{clamp, Session, ToolDescriptor};

/// Fixed instructions opening every conversation
pub const AGENT_INSTRUCTIONS: &str = "You are an automation agent working inside a host \
application. The host owns a sandboxed filesystem and a fixed set of tools; you act only by \
asking the host to run one of them. Every reply MUST be exactly one JSON object, with no code \
fences and no surrounding prose, using this schema: {\"type\": \"tool\" | \"final\", \
\"thought\": string, \"tool\": string?, \"args\": object?, \"answer\": string?, \
\"artifacts\": list?}. For \"type\": \"tool\", name the tool in \"tool\" and pass its \
arguments in \"args\" exactly as the catalog describes. For \"type\": \"final\", put the \
human-facing summary in \"answer\" and optionally attach artifacts, each with name, mime and \
content fields. Run shell commands and scripts only through the tools that provide them; \
nothing executes implicitly. Never invent tools or arguments outside the policy. Keep \
\"thought\" short and explain why you chose the action.";

/// Sent when a reply could not be read as a JSON object
pub const INVALID_JSON_PROMPT: &str = "Your last message was not valid JSON. Respond with a \
single JSON object that follows the required schema.";

/// Closing line of the opening user message
const SCHEMA_REMINDER: &str = "Respond with JSON actions that follow the required schema.";

/// Render the catalog as prompt text: a `Tool` header per entry followed by
/// one line per argument.
pub fn format_tool_catalog(tools: &[ToolDescriptor]) -> String {
    let mut lines = Vec::new();

    for tool in tools.iter().filter(|t| !t.name.is_empty()) {
        if tool.summary.is_empty() {
            lines.push(format!("Tool {}", tool.name));
        } else {
            lines.push(format!("Tool {}: {}", tool.name, tool.summary));
        }

        for arg in &tool.args {
            let marker = if arg.required {
                "(required)"
            } else {
                "(optional)"
            };
            let line = format!("- {}: {} {} {}", arg.name, arg.kind, marker, arg.description);
            lines.push(line.trim_end().to_string());
        }
    }

    lines.join("\n")
}

/// Builds the conversation text the model sees
pub struct ContextBuilder;

impl ContextBuilder {
    /// Instructions plus the rendered catalog
    pub fn build_system_prompt(session: &Session) -> String {
        let catalog = format_tool_catalog(&session.tool_catalog);
        if catalog.is_empty() {
            AGENT_INSTRUCTIONS.to_string()
        } else {
            format!("{}\n\nAvailable tools:\n{}", AGENT_INSTRUCTIONS, catalog)
        }
    }

    /// Goal, context, policy and the schema reminder
    pub fn build_user_prompt(session: &Session) -> String {
        let goal = if session.goal.is_empty() {
            "n/a"
        } else {
            session.goal.as_str()
        };
        let mut parts = vec![format!("Goal: {}", goal)];

        if !session.context.is_empty() {
            let lines: Vec<String> = session
                .context
                .iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect();
            parts.push(format!("Context:\n{}", lines.join("\n")));
        }

        if !session.allowed_tools.is_empty() {
            parts.push(format!("Allowed tools: {}", session.allowed_tools.join(", ")));
        }

        parts.push(SCHEMA_REMINDER.to_string());
        parts.join("\n\n")
    }

    /// Seed the session with its system and user messages
    pub fn build_messages(session: &mut Session) {
        let system = Self::build_system_prompt(session);
        let user = Self::build_user_prompt(session);
        debug!(
            "conversation seeded: {} tools in catalog, {} allowed",
            session.tool_catalog.len(),
            session.allowed_tools.len()
        );

        session.messages.clear();
        session.push(Message::system(system));
        session.push(Message::user(user));
    }

    /// Render a tool result as the observation the model reads next
    pub fn observation(tool: &str, result: &ToolResult, stdout_limit: usize) -> String {
        let stream = |v: &serde_json::Value| match v {
            serde_json::Value::Null => String::new(),
            other => value_text(other),
        };
        let stdout = clamp(&stream(&result.stdout), stdout_limit);
        let stderr = clamp(&stream(&result.stderr), stdout_limit);

        let mut parts = vec![
            format!(
                "Observation: tool {} completed (ok={}, exit_code={}).",
                tool, result.ok, result.exit_code
            ),
            format!(
                "stdout:\n{}",
                if stdout.is_empty() { "<empty>" } else { stdout.as_str() }
            ),
        ];

        if !stderr.is_empty() {
            parts.push(format!("stderr:\n{}", stderr));
        }

        if let Some(meta @ serde_json::Value::Object(_)) = &result.meta {
            parts.push(format!("meta: {}", meta));
        }

        parts.join("\n")
    }
}
