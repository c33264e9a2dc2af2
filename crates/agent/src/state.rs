//! Agent loop states and the transition function between them.
//!
//! The loop driver only performs side effects (model calls, tool calls) and
//! reports what happened as a [`LoopEvent`]. Every routing decision,
//! including the iteration bound, is made here by [`transition`].

use flowsmith_core::error::PipelineError;

/// Where an agent loop run currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    /// Waiting on the reasoning stage
    Reasoning,
    /// Tool calls requested and known; waiting on their results
    AwaitingTool,
    /// The reasoning stage produced a final reply
    Done,
    /// The run ended with this failure
    Failed(PipelineError),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::AwaitingTool => "awaiting_tool",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

/// What the last stage reported.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// The model answered with text and no tool calls
    Replied,
    /// The model asked for tools; `unknown` lists names it may not call
    ToolsRequested { unknown: Vec<String> },
    /// The model call itself failed
    ReasoningFailed(String),
    /// Every requested tool ran and its result was appended
    ToolsAnswered,
    /// A tool call could not be carried out
    ToolRejected(PipelineError),
}

impl LoopEvent {
    fn label(&self) -> &'static str {
        match self {
            Self::Replied => "replied",
            Self::ToolsRequested { .. } => "tools_requested",
            Self::ReasoningFailed(_) => "reasoning_failed",
            Self::ToolsAnswered => "tools_answered",
            Self::ToolRejected(_) => "tool_rejected",
        }
    }
}

/// Iteration bookkeeping the transition function needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Reasoning calls made so far in this run
    pub iteration: u32,
    /// Most reasoning calls a run may make
    pub max_iterations: u32,
}

/// The next state after `event` happens in `state`.
///
/// Terminal states absorb every event. Tool requests that arrive on the last
/// allowed iteration fail the run with `LoopLimitExceeded` instead of running,
/// since no reasoning call would be left to read their results.
pub fn transition(state: LoopState, event: LoopEvent, bounds: Bounds) -> LoopState {
    match (state, event) {
        (terminal @ (LoopState::Done | LoopState::Failed(_)), _) => terminal,

        (LoopState::Reasoning, LoopEvent::Replied) => LoopState::Done,
        (LoopState::Reasoning, LoopEvent::ToolsRequested { unknown }) if !unknown.is_empty() => {
            LoopState::Failed(PipelineError::UnknownTool(unknown.join(", ")))
        }
        (LoopState::Reasoning, LoopEvent::ToolsRequested { .. }) => {
            if bounds.iteration >= bounds.max_iterations {
                LoopState::Failed(PipelineError::LoopLimitExceeded {
                    max_iterations: bounds.max_iterations,
                })
            } else {
                LoopState::AwaitingTool
            }
        }
        (LoopState::Reasoning, LoopEvent::ReasoningFailed(reason)) => {
            LoopState::Failed(PipelineError::Reasoning(reason))
        }

        (LoopState::AwaitingTool, LoopEvent::ToolsAnswered) => LoopState::Reasoning,
        (LoopState::AwaitingTool, LoopEvent::ToolRejected(err)) => LoopState::Failed(err),

        (state, event) => LoopState::Failed(PipelineError::Internal(format!(
            "agent loop received '{}' while {}",
            event.label(),
            state.label()
        ))),
    }
}
