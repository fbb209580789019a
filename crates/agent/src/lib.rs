//! Host-driven agent core
//!
//! Handshake, prompt assembly, action validation, tool-call correlation and
//! the bounded step loop that ties them together.

use thiserror::Error;

pub mod action;
pub mod context;
pub mod handshake;
pub mod inbox;
pub mod loop_agent;
pub mod session;

pub use action::{Action, ActionError};
pub use context::ContextBuilder;
pub use inbox::{Claim, Inbox};
pub use loop_agent::{AgentLoop, Outcome, StopReason};
pub use session::{clamp, Session, ToolDescriptor, TRUNCATION_MARKER};

/// Fatal session errors. The display text becomes the `final` answer.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent did not receive initialization data.")]
    NoHandshake,

    #[error("LLM unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Tool execution failed or no result returned.")]
    ToolWait,
}

pub type Result<T> = std::result::Result<T, AgentError>;
