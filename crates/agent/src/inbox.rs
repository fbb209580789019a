//! Host messages that arrived while the agent was busy elsewhere

use std::collections::{HashMap, VecDeque};

use tether_bus::{Inbound, ToolResult};
use tracing::{debug, warn};

/// What the inbox already holds for a tool wait
#[derive(Debug, Clone)]
pub enum Claim {
    /// The result for the awaited id
    Result(ToolResult),
    /// A host `error` queued ahead of any matching result
    HostError(String),
}

/// Early or out-of-band inbound messages plus tool results keyed by call id
#[derive(Debug, Default)]
pub struct Inbox {
    queue: VecDeque<Inbound>,
    pending: HashMap<String, ToolResult>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message in arrival order
    pub fn push(&mut self, msg: Inbound) {
        match &msg {
            Inbound::Error { message } => warn!("host reported error: {}", message),
            other => debug!("queued early {} message", other.kind()),
        }
        self.queue.push_back(msg);
    }

    /// File a tool result under its call id. The first result for an id wins.
    pub fn stash(&mut self, result: ToolResult) {
        let id = result.call_id();
        if self.pending.contains_key(&id) {
            warn!("duplicate tool_result for {}, keeping the first", id);
            return;
        }
        self.pending.insert(id, result);
    }

    /// Move every queued tool result into the pending map, leaving other
    /// messages queued in order
    pub fn absorb_results(&mut self) {
        let queued = std::mem::take(&mut self.queue);
        for msg in queued {
            match msg {
                Inbound::ToolResult(result) => self.stash(result),
                other => self.queue.push_back(other),
            }
        }
    }

    /// Resolve a wait on `id` from what has already arrived. A pending result
    /// wins; otherwise the queue is read in arrival order, filing other
    /// results, until the matching result or a host error turns up. Messages
    /// after that point stay queued.
    pub fn claim(&mut self, id: &str) -> Option<Claim> {
        if let Some(result) = self.pending.remove(id) {
            return Some(Claim::Result(result));
        }

        let queued = std::mem::take(&mut self.queue);
        let mut claim = None;
        for msg in queued {
            if claim.is_some() {
                self.queue.push_back(msg);
                continue;
            }
            match msg {
                Inbound::ToolResult(result) if result.call_id() == id => {
                    claim = Some(Claim::Result(result));
                }
                Inbound::ToolResult(result) => self.stash(result),
                Inbound::Error { message } => claim = Some(Claim::HostError(message)),
                other => self.queue.push_back(other),
            }
        }
        claim
    }

    /// Run the start-of-step pass: results go to pending, host errors stay
    /// queued for the next tool wait, everything else is consumed
    pub fn dispatch(&mut self) {
        self.absorb_results();
        self.queue.retain(|msg| match msg {
            Inbound::Error { .. } => true,
            other => {
                debug!("ignoring queued {} message", other.kind());
                false
            }
        });
    }

    /// Number of queued messages still waiting for dispatch
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of results filed but not yet claimed
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
