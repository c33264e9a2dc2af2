//! The chat pipeline: preparation → agent loop → extraction.

use std::sync::Arc;

use async_trait::async_trait;
use flowsmith_agent::{keys, AgentLoop, AgentLoopStep};
use flowsmith_core::agent::{AgentProfile, AgentStore};
use flowsmith_core::error::{PipelineError, Result, Violation};
use flowsmith_core::message::{Conversation, Message};
use flowsmith_core::tool::ToolRegistry;
use flowsmith_pipeline::{Context, Pipeline, Step};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Context key for the user-visible reply text.
pub const RESPONSE: &str = "response";

/// Shown when the agent finished without any text.
pub const EMPTY_REPLY_FALLBACK: &str =
    "I processed your request but couldn't generate a proper response.";

/// Input payload of one chat pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// `None` runs against the default profile
    #[serde(default)]
    pub agent_id: Option<String>,
    pub message: String,
    /// Earlier turns of the same chat, oldest first
    #[serde(default)]
    pub prior: Vec<Message>,
}

/// Resolves the agent, snapshots its profile and seeds the conversation.
pub struct PreparationStep {
    agents: Arc<dyn AgentStore>,
    registry: Arc<ToolRegistry>,
    default_system_prompt: String,
}

impl PreparationStep {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        registry: Arc<ToolRegistry>,
        default_system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            agents,
            registry,
            default_system_prompt: default_system_prompt.into(),
        }
    }

    /// The profile used when no agent is named: default prompt, every registered tool.
    pub fn default_profile(&self) -> AgentProfile {
        AgentProfile {
            agent_id: None,
            name: "Default Assistant".into(),
            system_prompt: self.default_system_prompt.clone(),
            tools: self.registry.names().into_iter().map(String::from).collect(),
        }
    }

    async fn resolve(&self, agent_id: Option<&str>) -> Result<AgentProfile> {
        let Some(id) = agent_id else {
            return Ok(self.default_profile());
        };
        match self.agents.get(id).await? {
            Some(agent) if agent.active => Ok(agent.profile()),
            Some(_) => {
                debug!(agent = %id, "Agent is inactive");
                Err(PipelineError::AgentNotFound(id.to_string()))
            }
            None => Err(PipelineError::AgentNotFound(id.to_string())),
        }
    }
}

#[async_trait]
impl Step for PreparationStep {
    fn name(&self) -> &str {
        "preparation"
    }

    async fn run(&self, ctx: &mut Context) -> Result<()> {
        let request: ChatRequest = serde_json::from_value(ctx.input.clone())
            .map_err(|e| PipelineError::Internal(format!("malformed chat request: {e}")))?;

        let message = request.message.trim();
        if message.is_empty() {
            return Err(PipelineError::Validation {
                subject: "chat request".into(),
                violations: vec![Violation::new("message", "must not be empty")],
            });
        }

        let profile = self.resolve(request.agent_id.as_deref()).await?;

        let conversation = Conversation::seeded(&profile.system_prompt, request.prior, message);
        debug!(
            agent = %profile.name,
            conversation_id = %conversation.id,
            messages = conversation.len(),
            "Chat prepared"
        );

        ctx.insert(keys::PROFILE, &profile)?;
        ctx.insert(keys::CONVERSATION, &conversation)
    }
}

/// Pulls the final assistant text out of the finished loop.
pub struct ExtractionStep;

#[async_trait]
impl Step for ExtractionStep {
    fn name(&self) -> &str {
        "extraction"
    }

    async fn run(&self, ctx: &mut Context) -> Result<()> {
        let reply: String = ctx.require(keys::REPLY)?;
        let response = match reply.trim() {
            "" => EMPTY_REPLY_FALLBACK,
            text => text,
        };
        ctx.insert(RESPONSE, response)
    }
}

/// Preparation, the agent loop, and extraction, in that order.
pub fn chat_pipeline(preparation: PreparationStep, agent_loop: Arc<AgentLoop>) -> Pipeline {
    Pipeline::empty("chat")
        .then(preparation)
        .then(AgentLoopStep::new(agent_loop))
        .then(ExtractionStep)
}
