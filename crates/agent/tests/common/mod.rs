//! Shared fixtures for agent loop tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tether_agent::{AgentLoop, Outcome};
use tether_bus::{LineSender, Outbound, OutboundReceiver, Transport};
use tether_config::Config;
use tether_provider::{ChatParams, ChatResponse, Message, Provider};
use tokio::task::JoinHandle;

/// Provider that replays canned replies and records every request
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    seen: Arc<Mutex<Vec<ChatParams>>>,
}

impl ScriptedProvider {
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            repeat: None,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every request with the same reply
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            repeat: Some(reply.into()),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle on the recorded requests, usable after the provider moves
    pub fn requests(&self) -> Arc<Mutex<Vec<ChatParams>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> tether_provider::Result<ChatResponse> {
        self.seen.lock().unwrap().push(params);
        let next = self.replies.lock().unwrap().pop_front();
        let reply = next
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| r#"{"type":"final","answer":"script exhausted"}"#.to_string());
        Ok(ChatResponse::text(reply))
    }

    fn default_model(&self) -> String {
        "scripted-model".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Host side of a running agent
pub struct Host {
    tx: Option<LineSender>,
    pub rx: OutboundReceiver,
    pub handle: JoinHandle<Outcome>,
}

impl Host {
    /// Start an agent with default config on in-memory channels
    pub fn spawn<P: Provider + 'static>(provider: P) -> Self {
        Self::spawn_with(provider, &Config::default())
    }

    pub fn spawn_with<P: Provider + 'static>(provider: P, config: &Config) -> Self {
        let (transport, tx, rx) = Transport::channels();
        let agent = AgentLoop::new(provider, transport, config);
        let handle = tokio::spawn(agent.run());
        Self {
            tx: Some(tx),
            rx,
            handle,
        }
    }

    pub fn send(&self, value: Value) {
        self.send_line(&value.to_string());
    }

    pub fn send_line(&self, line: &str) {
        self.tx
            .as_ref()
            .expect("input already closed")
            .send(line.to_string())
            .unwrap();
    }

    /// End of input, as when the host closes stdin
    pub fn close_input(&mut self) {
        self.tx = None;
    }

    /// Send `hello` allowing the given tools, then `start`
    pub fn handshake(&self, allowed: &[&str], goal: &str) {
        self.send(hello(allowed));
        self.send(json!({"type": "start", "goal": goal, "context": {}}));
    }

    /// Read outbound messages until a `tool_call`, returning its id and
    /// everything seen on the way
    pub async fn next_tool_call(&mut self) -> (String, Vec<Outbound>) {
        let mut seen = Vec::new();
        while let Some(msg) = self.rx.recv().await {
            if let Outbound::ToolCall { id, .. } = &msg {
                let id = id.clone();
                seen.push(msg);
                return (id, seen);
            }
            seen.push(msg);
        }
        panic!("agent stopped before issuing a tool call: {:?}", seen);
    }

    /// Wait for the agent to stop and collect the rest of its output
    pub async fn finish(mut self) -> (Outcome, Vec<Outbound>) {
        let outcome = self.handle.await.unwrap();
        let mut rest = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            rest.push(msg);
        }
        (outcome, rest)
    }
}

pub fn hello(allowed: &[&str]) -> Value {
    let tools: Vec<Value> = allowed
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "summary": format!("Run {}", name),
                "args_schema": {
                    "properties": {"path": {"type": "string", "description": "target path"}},
                    "required": ["path"]
                }
            })
        })
        .collect();

    json!({
        "type": "hello",
        "tool_catalog": {"tools": tools},
        "limits": {"stdout_bytes": 4096},
        "policy": {"allowed_tools": allowed}
    })
}

pub fn tool_result(id: &str, stdout: &str) -> Value {
    json!({
        "type": "tool_result",
        "id": id,
        "ok": true,
        "exit_code": 0,
        "stdout": stdout,
        "stderr": ""
    })
}

pub fn tool_action(tool: &str) -> String {
    json!({"type": "tool", "tool": tool, "args": {"path": "."}}).to_string()
}

pub fn final_action(answer: &str) -> String {
    json!({"type": "final", "answer": answer}).to_string()
}

pub fn kinds(messages: &[Outbound]) -> Vec<&'static str> {
    messages.iter().map(Outbound::kind).collect()
}

/// Content of the last message in a recorded request
pub fn last_message(params: &ChatParams) -> &Message {
    params.messages.last().unwrap()
}
