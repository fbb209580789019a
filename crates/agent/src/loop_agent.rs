//! Agent loop - core processing engine

use tracing::{debug, error, info, warn};

use tether_bus::{Artifact, Inbound, Outbound, ToolResult, Transport};
use tether_config::Config;
use tether_provider::{complete, is_unavailable, ChatParams, Message, Provider};

use crate::action::{extract_json_object, thought_of, Action};
use crate::context::{ContextBuilder, INVALID_JSON_PROMPT};
use crate::handshake::handshake;
use crate::inbox::{Claim, Inbox};
use crate::session::Session;
use crate::AgentError;

/// Used when the model finishes with a blank answer
pub const EMPTY_ANSWER_FALLBACK: &str = "Agent finished without a detailed answer.";

/// Sent when the step budget runs out
pub const STEPS_EXHAUSTED: &str = "Reached maximum number of reasoning steps without completion.";

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced a valid `final` action
    Answered,
    /// The step budget ran out
    StepsExhausted,
    /// A fatal condition ended the run early
    Aborted,
}

/// Summary of a finished run. Its `answer` is what went out in the `final`
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub answer: String,
    pub artifacts: Vec<Artifact>,
    pub steps: u32,
    pub reason: StopReason,
}

/// A normal end to the step loop
struct Completion {
    answer: String,
    artifacts: Vec<Artifact>,
    reason: StopReason,
}

/// The agent loop drives one session from handshake to `final`
pub struct AgentLoop<P: Provider> {
    provider: P,
    transport: Transport,
    inbox: Inbox,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_steps: u32,
    max_message_length: usize,
    default_stdout_limit: usize,
    call_seq: u64,
}

impl<P: Provider> AgentLoop<P> {
    /// Create a new agent loop
    pub fn new(provider: P, transport: Transport, config: &Config) -> Self {
        let model = if config.provider.model.is_empty() {
            provider.default_model()
        } else {
            config.provider.model.clone()
        };

        Self {
            provider,
            transport,
            inbox: Inbox::new(),
            model,
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            max_steps: config.agent.max_steps,
            max_message_length: config.agent.max_message_length,
            default_stdout_limit: config.agent.default_stdout_limit,
            call_seq: 0,
        }
    }

    /// Run the session to completion. Exactly one `final` message is sent,
    /// and it is the last message sent.
    pub async fn run(mut self) -> Outcome {
        let mut session = Session::new(self.max_message_length, self.default_stdout_limit);

        let result = match handshake(&mut self.transport, &mut session, &mut self.inbox).await {
            Ok(()) => {
                ContextBuilder::build_messages(&mut session);
                self.drive(&mut session).await
            }
            Err(e) => Err(e),
        };

        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                error!("session aborted: {}", e);
                Completion {
                    answer: e.to_string(),
                    artifacts: Vec::new(),
                    reason: StopReason::Aborted,
                }
            }
        };

        self.transport.send(Outbound::final_answer(
            completion.answer.clone(),
            completion.artifacts.clone(),
        ));

        Outcome {
            answer: completion.answer,
            artifacts: completion.artifacts,
            steps: session.step_count,
            reason: completion.reason,
        }
    }

    /// The step loop
    async fn drive(&mut self, session: &mut Session) -> Result<Completion, AgentError> {
        while session.step_count < self.max_steps {
            session.step_count += 1;
            let step = session.step_count;
            debug!("Agent step {}", step);

            self.inbox.dispatch();

            let params = ChatParams {
                model: self.model.clone(),
                messages: session.messages.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            };
            let reply = complete(&self.provider, params).await;
            if is_unavailable(&reply) {
                return Err(AgentError::ProviderUnavailable(reply));
            }
            session.push(Message::assistant(reply.clone()));

            let Some(object) = extract_json_object(&reply) else {
                self.log(format!("step {}: invalid JSON response, requesting retry", step));
                session.push(Message::user(INVALID_JSON_PROMPT));
                continue;
            };

            if let Some(thought) = thought_of(&object) {
                self.log(format!("step {}: {}", step, thought));
            }

            let action = match Action::from_object(object, |name| session.is_allowed(name)) {
                Ok(action) => action,
                Err(e) => {
                    self.log(format!("step {}: {}", step, e));
                    session.push(Message::user(format!(
                        "{} Please reply with a valid JSON action.",
                        e
                    )));
                    continue;
                }
            };

            match action {
                Action::Tool { tool, args, .. } => {
                    let id = self.next_call_id(step);
                    self.transport.send(Outbound::Indicator {
                        status: "tool".to_string(),
                        step,
                        tool: tool.clone(),
                    });
                    self.transport.send(Outbound::ToolCall {
                        id: id.clone(),
                        name: tool.clone(),
                        args,
                    });

                    let result = self.await_result(&id).await?;
                    let observation =
                        ContextBuilder::observation(&tool, &result, session.stdout_limit);
                    session.push(Message::user(observation));
                }
                Action::Final {
                    answer, artifacts, ..
                } => {
                    let answer = if answer.is_empty() {
                        EMPTY_ANSWER_FALLBACK.to_string()
                    } else {
                        answer
                    };
                    info!(
                        "final answer after {} steps with {} artifacts",
                        step,
                        artifacts.len()
                    );
                    return Ok(Completion {
                        answer,
                        artifacts,
                        reason: StopReason::Answered,
                    });
                }
            }
        }

        warn!("step budget of {} exhausted", self.max_steps);
        Ok(Completion {
            answer: STEPS_EXHAUSTED.to_string(),
            artifacts: Vec::new(),
            reason: StopReason::StepsExhausted,
        })
    }

    /// Session-unique correlation id built from the step and a call counter
    fn next_call_id(&mut self, step: u32) -> String {
        self.call_seq += 1;
        format!("call-{}-{}", step, self.call_seq)
    }

    /// Block until the result for `id` arrives. Results for other ids are
    /// filed for later; other messages are queued.
    async fn await_result(&mut self, id: &str) -> Result<ToolResult, AgentError> {
        match self.inbox.claim(id) {
            Some(Claim::Result(result)) => {
                debug!("result for {} was already pending", id);
                return Ok(result);
            }
            Some(Claim::HostError(message)) => {
                self.log(format!("host error: {}", message));
                return Err(AgentError::ToolWait);
            }
            None => {}
        }

        loop {
            match self.transport.recv().await {
                None => {
                    warn!("input closed while waiting for {}", id);
                    return Err(AgentError::ToolWait);
                }
                Some(Inbound::ToolResult(result)) => {
                    if result.call_id() == id {
                        return Ok(result);
                    }
                    debug!("stashing out-of-order result {}", result.call_id());
                    self.inbox.stash(result);
                }
                Some(Inbound::Error { message }) => {
                    self.log(format!("host error: {}", message));
                    return Err(AgentError::ToolWait);
                }
                Some(other) => self.inbox.push(other),
            }
        }
    }

    /// Send a `log` message to the host and mirror it to the trace
    fn log(&self, message: String) {
        info!("{}", message);
        self.transport.send(Outbound::Log { message });
    }
}
