//! Host message bus
//!
//! Newline-delimited JSON messages exchanged with the hosting process, and
//! the [`Transport`] that carries them. Inbound lines arrive on a single
//! ordered channel; outbound messages leave through another, so the host
//! observes them in exactly the order they were sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

pub mod stdio;

pub use stdio::{spawn_stdin_pump, spawn_stdout_writer, pump_lines, write_lines};

/// `hello`: catalog, limits and policy from the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hello {
    #[serde(default)]
    pub tool_catalog: Value,
    #[serde(default)]
    pub limits: Value,
    #[serde(default)]
    pub policy: Value,
}

impl Hello {
    /// Raw descriptors from `tool_catalog.tools`
    pub fn tools(&self) -> &[Value] {
        self.tool_catalog
            .get("tools")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `limits.stdout_bytes`, accepting numbers or numeric strings
    pub fn stdout_limit(&self) -> Option<usize> {
        match self.limits.get("stdout_bytes")? {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// `policy.allowed_tools`, each entry coerced to text
    pub fn allowed_tools(&self) -> Vec<String> {
        self.policy
            .get("allowed_tools")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(value_text).collect())
            .unwrap_or_default()
    }
}

/// `start`: the goal and its context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Start {
    #[serde(default)]
    pub goal: Value,
    #[serde(default)]
    pub context: Value,
}

impl Start {
    pub fn goal_text(&self) -> String {
        match &self.goal {
            Value::Null => String::new(),
            other => value_text(other),
        }
    }

    /// Context entries in the order the host sent them
    pub fn context_entries(&self) -> Vec<(String, String)> {
        self.context
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), value_text(v)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `tool_result`: the host's answer to a `tool_call`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub ok: Value,
    #[serde(default)]
    pub exit_code: Value,
    #[serde(default)]
    pub stdout: Value,
    #[serde(default)]
    pub stderr: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ToolResult {
    /// Correlation id as text
    pub fn call_id(&self) -> String {
        match &self.id {
            Value::Null => String::new(),
            other => value_text(other),
        }
    }
}

/// Messages the host sends to the agent
#[derive(Debug, Clone)]
pub enum Inbound {
    Hello(Hello),
    Start(Start),
    ToolResult(ToolResult),
    Error { message: String },
    /// Any other object, retained verbatim
    Other(Value),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Known {
    Hello(Hello),
    Start(Start),
    ToolResult(ToolResult),
    Error {
        #[serde(default)]
        message: Value,
    },
}

impl Inbound {
    /// Classify a JSON object by its `type`. Unknown types become
    /// [`Inbound::Other`] so they can still be queued.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Known>(value.clone()) {
            Ok(Known::Hello(h)) => Inbound::Hello(h),
            Ok(Known::Start(s)) => Inbound::Start(s),
            Ok(Known::ToolResult(r)) => Inbound::ToolResult(r),
            Ok(Known::Error { message }) => Inbound::Error {
                message: match message {
                    Value::Null => String::new(),
                    other => value_text(&other),
                },
            },
            Err(_) => Inbound::Other(value),
        }
    }

    /// The wire `type` tag
    pub fn kind(&self) -> &str {
        match self {
            Inbound::Hello(_) => "hello",
            Inbound::Start(_) => "start",
            Inbound::ToolResult(_) => "tool_result",
            Inbound::Error { .. } => "error",
            Inbound::Other(v) => v.get("type").and_then(Value::as_str).unwrap_or("unknown"),
        }
    }
}

/// File produced by the agent's final answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub mime: String,
    pub content: String,
}

/// Messages the agent sends to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Log {
        message: String,
    },
    Indicator {
        status: String,
        step: u32,
        tool: String,
    },
    ToolCall {
        id: String,
        name: String,
        args: Map<String, Value>,
    },
    Final {
        answer: String,
        artifacts: Vec<Artifact>,
    },
    Error {
        message: String,
    },
}

impl Outbound {
    pub fn log(message: impl Into<String>) -> Self {
        Outbound::Log {
            message: message.into(),
        }
    }

    pub fn final_answer(answer: impl Into<String>, artifacts: Vec<Artifact>) -> Self {
        Outbound::Final {
            answer: answer.into(),
            artifacts,
        }
    }

    /// The wire `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Log { .. } => "log",
            Outbound::Indicator { .. } => "indicator",
            Outbound::ToolCall { .. } => "tool_call",
            Outbound::Final { .. } => "final",
            Outbound::Error { .. } => "error",
        }
    }
}

/// Render a JSON value as plain text: strings unquoted, everything else as JSON
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Channel types
pub type LineSender = mpsc::UnboundedSender<String>;
pub type LineReceiver = mpsc::UnboundedReceiver<String>;
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Line-oriented JSON transport to the host
#[derive(Debug)]
pub struct Transport {
    lines: LineReceiver,
    outbound: OutboundSender,
}

impl Transport {
    pub fn new(lines: LineReceiver, outbound: OutboundSender) -> Self {
        Self { lines, outbound }
    }

    /// Create a transport with fresh channels
    pub fn channels() -> (Self, LineSender, OutboundReceiver) {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        (Self::new(line_rx, out_tx), line_tx, out_rx)
    }

    /// Queue one message for the host. A closed outbound side is logged,
    /// never raised.
    pub fn send(&self, msg: Outbound) {
        trace!("outbound {}", msg.kind());
        if let Err(e) = self.outbound.send(msg) {
            warn!("host output closed, dropping {} message", e.0.kind());
        }
    }

    /// Next inbound message, or `None` at end of stream. Blank lines are
    /// skipped; malformed lines are reported to the host and skipped.
    pub async fn recv(&mut self) -> Option<Inbound> {
        loop {
            let line = self.lines.recv().await?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(line) {
                Ok(value @ Value::Object(_)) => {
                    let msg = Inbound::from_value(value);
                    trace!("inbound {}", msg.kind());
                    return Some(msg);
                }
                Ok(_) | Err(_) => {
                    debug!("rejecting malformed inbound line ({} bytes)", line.len());
                    self.send(Outbound::Error {
                        message: "invalid json".to_string(),
                    });
                }
            }
        }
    }
}
