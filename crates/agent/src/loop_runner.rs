//! The agent reasoning loop implementation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use flowsmith_config::AppConfig;
use flowsmith_core::agent::AgentProfile;
use flowsmith_core::error::PipelineError;
use flowsmith_core::event::{DomainEvent, EventBus};
use flowsmith_core::message::{Conversation, MessageToolCall};
use flowsmith_core::provider::{Provider, ToolDefinition};
use flowsmith_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::reasoning::ReasoningStage;
use crate::state::{transition, Bounds, LoopEvent, LoopState};
use crate::tool_stage::ToolStage;

/// Reasoning calls allowed per run unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// What a loop run that reached `Done` produced.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// The full turn record, ending with the final reply
    pub conversation: Conversation,
    pub reply: String,
    /// Reasoning calls made
    pub iterations: u32,
    /// Tool calls executed
    pub tool_calls: u32,
}

/// Alternates the reasoning stage and the tool stage until the model
/// replies, something fails, or the iteration bound is reached.
pub struct AgentLoop {
    reasoning: ReasoningStage,
    tool_stage: ToolStage,
    registry: Arc<ToolRegistry>,
    max_iterations: u32,
    event_bus: Option<Arc<EventBus>>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            reasoning: ReasoningStage::new(provider, model, temperature),
            tool_stage: ToolStage::new(registry.clone()),
            registry,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            event_bus: None,
        }
    }

    /// Build a loop using the chat settings from `config`.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        config: &AppConfig,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(provider, model, config.chat_temperature, registry)
            .with_max_iterations(config.agent.max_tool_iterations)
            .with_max_tokens(config.max_tokens)
    }

    /// Set the most reasoning calls one run may make (at least 1).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.reasoning = self.reasoning.with_max_tokens(max);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.tool_stage = self.tool_stage.with_event_bus(bus.clone());
        self.event_bus = Some(bus);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Definitions of the tools `profile` may call: registered tools the
    /// profile lists, in the profile's order.
    pub fn offered_tools(&self, profile: &AgentProfile) -> Vec<ToolDefinition> {
        let mut seen = HashSet::new();
        profile
            .tools
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| match self.registry.lookup(name) {
                Some(tool) => Some(tool.to_definition()),
                None => {
                    warn!(agent = %profile.name, tool = %name, "Agent lists an unregistered tool");
                    None
                }
            })
            .collect()
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Drive `conversation` to a terminal state.
    ///
    /// The conversation is expected to be seeded already (system prompt,
    /// prior turns, user message). Returns the outcome on `Done` and the
    /// failure on `Failed`.
    pub async fn run(
        &self,
        profile: &AgentProfile,
        mut conversation: Conversation,
    ) -> Result<LoopOutcome, PipelineError> {
        let offered = self.offered_tools(profile);
        let offered_names: HashSet<&str> = offered.iter().map(|d| d.name.as_str()).collect();

        info!(
            conversation_id = %conversation.id,
            agent = %profile.name,
            messages = conversation.len(),
            tools = offered.len(),
            max_iterations = self.max_iterations,
            "Agent loop started"
        );

        let mut state = LoopState::Reasoning;
        let mut iteration = 0;
        let mut tool_calls = 0;
        let mut pending: Vec<MessageToolCall> = Vec::new();

        while !state.is_terminal() {
            let event = match &state {
                LoopState::Reasoning => {
                    iteration += 1;
                    match self.reasoning.reason(&conversation, &offered).await {
                        Ok(response) => {
                            if let Some(usage) = &response.usage {
                                self.publish(DomainEvent::ResponseGenerated {
                                    conversation_id: conversation.id.to_string(),
                                    model: response.model.clone(),
                                    tokens_used: usage.total_tokens,
                                    timestamp: Utc::now(),
                                });
                            }
                            let message = response.message;
                            if message.requests_tools() {
                                let unknown = unknown_tools(&message.tool_calls, &offered_names);
                                pending = message.tool_calls.clone();
                                conversation.push(message);
                                LoopEvent::ToolsRequested { unknown }
                            } else {
                                conversation.push(message);
                                LoopEvent::Replied
                            }
                        }
                        Err(e) => LoopEvent::ReasoningFailed(e.to_string()),
                    }
                }
                LoopState::AwaitingTool => {
                    let calls = std::mem::take(&mut pending);
                    match self.tool_stage.execute(&calls, &mut conversation).await {
                        Ok(ran) => {
                            tool_calls += ran;
                            LoopEvent::ToolsAnswered
                        }
                        Err(e) => LoopEvent::ToolRejected(e),
                    }
                }
                LoopState::Done | LoopState::Failed(_) => break,
            };

            let from = state.label();
            state = transition(
                state,
                event,
                Bounds {
                    iteration,
                    max_iterations: self.max_iterations,
                },
            );
            debug!(
                conversation_id = %conversation.id,
                iteration,
                from,
                to = state.label(),
                "Agent loop transition"
            );
        }

        let failure = match &state {
            LoopState::Failed(e) => Some(e.kind()),
            _ => None,
        };
        self.publish(DomainEvent::LoopFinished {
            conversation_id: conversation.id.to_string(),
            iterations: iteration,
            tool_calls,
            failure,
            timestamp: Utc::now(),
        });

        match state {
            LoopState::Done => {
                let reply = conversation.final_reply().unwrap_or_default().to_string();
                info!(
                    conversation_id = %conversation.id,
                    iterations = iteration,
                    tool_calls,
                    "Agent loop finished"
                );
                Ok(LoopOutcome {
                    conversation,
                    reply,
                    iterations: iteration,
                    tool_calls,
                })
            }
            LoopState::Failed(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    iterations = iteration,
                    kind = %e.kind(),
                    error = %e,
                    "Agent loop failed"
                );
                Err(e)
            }
            other => Err(PipelineError::Internal(format!(
                "agent loop stopped while {}",
                other.label()
            ))),
        }
    }
}

/// Requested tool names outside `offered`, deduplicated, in request order.
fn unknown_tools(calls: &[MessageToolCall], offered: &HashSet<&str>) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();
    for call in calls {
        if !offered.contains(call.name.as_str()) && !unknown.contains(&call.name) {
            unknown.push(call.name.clone());
        }
    }
    unknown
}
