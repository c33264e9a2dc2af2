//! Runs an [`AgentLoop`] as one pipeline step.

use std::sync::Arc;

use async_trait::async_trait;
use flowsmith_core::agent::AgentProfile;
use flowsmith_core::error::Result;
use flowsmith_core::message::Conversation;
use flowsmith_pipeline::{Context, Step};

use crate::loop_runner::AgentLoop;

/// Context keys shared by the chat pipeline's steps.
pub mod keys {
    /// [`AgentProfile`](flowsmith_core::AgentProfile) the run uses
    pub const PROFILE: &str = "agent_profile";
    /// Seeded [`Conversation`](flowsmith_core::Conversation); replaced by the full record afterwards
    pub const CONVERSATION: &str = "conversation";
    pub const REPLY: &str = "reply";
    pub const ITERATIONS: &str = "iterations";
    pub const TOOL_CALLS: &str = "tool_calls";
}

/// Reads the profile and seeded conversation from the context, drives the
/// loop to a terminal state and writes the outcome back.
pub struct AgentLoopStep {
    agent_loop: Arc<AgentLoop>,
}

impl AgentLoopStep {
    pub fn new(agent_loop: Arc<AgentLoop>) -> Self {
        Self { agent_loop }
    }
}

#[async_trait]
impl Step for AgentLoopStep {
    fn name(&self) -> &str {
        "agent_loop"
    }

    async fn run(&self, ctx: &mut Context) -> Result<()> {
        let profile: AgentProfile = ctx.require(keys::PROFILE)?;
        let conversation: Conversation = ctx.require(keys::CONVERSATION)?;

        let outcome = self.agent_loop.run(&profile, conversation).await;
        ctx.mark_finished();
        let outcome = outcome?;

        ctx.insert(keys::CONVERSATION, &outcome.conversation)?;
        ctx.insert(keys::REPLY, &outcome.reply)?;
        ctx.insert(keys::ITERATIONS, &outcome.iterations)?;
        ctx.insert(keys::TOOL_CALLS, &outcome.tool_calls)?;
        Ok(())
    }
}
