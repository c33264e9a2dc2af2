//! The agent loop: the part of a chat run where the model reasons, calls
//! tools, and reasons again.
//!
//! A run is a small state machine ([`state`]). The [`AgentLoop`] performs the
//! side effects of each state through two stages:
//!
//! 1. **Reasoning**: send the conversation and offered tools to the model
//! 2. **Tools**: validate and execute each requested call, appending results
//!
//! and asks [`state::transition`] where to go next. A run ends with a final
//! reply, or with the first failure.

pub mod loop_runner;
pub mod reasoning;
pub mod state;
pub mod step;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tool_stage;

pub use loop_runner::{AgentLoop, LoopOutcome, DEFAULT_MAX_ITERATIONS};
pub use reasoning::ReasoningStage;
pub use state::{transition, Bounds, LoopEvent, LoopState};
pub use step::{keys, AgentLoopStep};
pub use tool_stage::ToolStage;
