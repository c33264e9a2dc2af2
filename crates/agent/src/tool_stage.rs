//! The tool stage: runs the calls a reasoning turn asked for.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use flowsmith_core::error::{PipelineError, Violation};
use flowsmith_core::event::{DomainEvent, EventBus};
use flowsmith_core::message::{Conversation, Message, MessageToolCall};
use flowsmith_core::tool::{ToolCall, ToolRegistry};
use serde_json::Value;
use tracing::{debug, warn};

/// Executes requested tool calls through the registry and records each
/// result as a tool turn.
pub struct ToolStage {
    registry: Arc<ToolRegistry>,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolStage {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Run every call in order, appending one tool turn per call.
    ///
    /// Returns how many calls ran. The first call the registry refuses, or
    /// whose tool errors, ends the batch with that failure. Tool-level
    /// rejections (`success = false`) are normal output and do not.
    pub async fn execute(
        &self,
        calls: &[MessageToolCall],
        conversation: &mut Conversation,
    ) -> Result<u32, PipelineError> {
        let mut executed = 0;
        for tc in calls {
            let call = ToolCall {
                id: tc.id.clone(),
                name: tc.name.clone(),
                arguments: parse_arguments(tc)?,
            };

            let start = Instant::now();
            let result = self.registry.invoke(&call).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(tool_result) => {
                    debug!(
                        tool = %tc.name,
                        call_id = %tc.id,
                        success = tool_result.success,
                        duration_ms,
                        "Tool executed"
                    );
                    self.publish(&tc.name, tool_result.success, duration_ms);
                    conversation.push(Message::tool_result(&tc.id, tool_result.output));
                    executed += 1;
                }
                Err(e) => {
                    warn!(tool = %tc.name, call_id = %tc.id, error = %e, "Tool call rejected");
                    self.publish(&tc.name, false, duration_ms);
                    return Err(e.into());
                }
            }
        }
        Ok(executed)
    }

    fn publish(&self, tool_name: &str, success: bool, duration_ms: u64) {
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: tool_name.to_string(),
                success,
                duration_ms,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Decode a call's argument string. Blank means no arguments.
fn parse_arguments(call: &MessageToolCall) -> Result<Value, PipelineError> {
    if call.arguments.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&call.arguments).map_err(|e| PipelineError::Validation {
        subject: format!("{} arguments", call.name),
        violations: vec![Violation::new("arguments", format!("not valid JSON: {e}"))],
    })
}
