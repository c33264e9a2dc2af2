//! Caller-facing entry points for both pipelines.

use std::sync::Arc;

use flowsmith_agent::{keys, AgentLoop};
use flowsmith_config::AppConfig;
use flowsmith_core::agent::AgentStore;
use flowsmith_core::error::PipelineError;
use flowsmith_core::event::EventBus;
use flowsmith_core::flow::{FlowConfig, FlowStore};
use flowsmith_core::message::{Conversation, Message};
use flowsmith_core::provider::Provider;
use flowsmith_core::tool::ToolRegistry;
use flowsmith_pipeline::{Context, Pipeline};
use serde_json::Value;
use tracing::info;

use crate::chat_pipeline::{chat_pipeline, ChatRequest, PreparationStep, RESPONSE};
use crate::config_pipeline::{config_pipeline, keys as config_keys, save_flow_pipeline, GenerationStep};

/// Everything the pipelines call out to.
pub struct Collaborators {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub registry: Arc<ToolRegistry>,
    pub agents: Arc<dyn AgentStore>,
    pub flows: Arc<dyn FlowStore>,
    pub event_bus: Option<Arc<EventBus>>,
}

/// A flow that passed validation and was stored.
#[derive(Debug, Clone)]
pub struct GeneratedFlow {
    /// Id the flow store assigned
    pub id: String,
    pub flow: FlowConfig,
}

impl GeneratedFlow {
    fn from_context(ctx: &Context) -> Result<Self, PipelineError> {
        Ok(Self {
            id: ctx.require(config_keys::FLOW_ID)?,
            flow: ctx.require(config_keys::FLOW)?,
        })
    }
}

/// Validates and stores flow documents written by hand or elsewhere.
///
/// Needs only a flow store, so callers without a provider can use it.
pub struct FlowSaver {
    pipeline: Pipeline,
}

impl FlowSaver {
    pub fn new(store: Arc<dyn FlowStore>) -> Self {
        Self {
            pipeline: save_flow_pipeline(store),
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.pipeline = self.pipeline.with_event_bus(bus);
        self
    }

    /// Check `document` against the flow schema and store it.
    pub async fn save(&self, document: Value) -> Result<GeneratedFlow, PipelineError> {
        let ctx = self.pipeline.run(document).await.into_result()?;
        let saved = GeneratedFlow::from_context(&ctx)?;
        info!(flow_id = %saved.id, "Flow document saved");
        Ok(saved)
    }
}

/// A successful chat run.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub agent_id: Option<String>,
    /// Full turn record, including tool turns
    pub conversation: Conversation,
    pub iterations: u32,
    pub tool_calls: u32,
}

impl ChatReply {
    /// Turns to pass as `prior` on the next message of the same chat.
    pub fn history(&self) -> Vec<Message> {
        self.conversation.messages().to_vec()
    }
}

/// Builds the config and chat pipelines once and runs them per request.
///
/// Each call starts an independent run; nothing is shared between runs
/// except the read-only collaborators.
pub struct Orchestrator {
    config: Pipeline,
    chat: Pipeline,
    saver: FlowSaver,
}

impl Orchestrator {
    pub fn new(app: &AppConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            provider,
            model,
            registry,
            agents,
            flows,
            event_bus,
        } = collaborators;

        let generation = GenerationStep::new(provider.clone(), model.clone(), app.config_temperature)
            .with_max_tokens(app.max_tokens);
        let mut saver = FlowSaver::new(flows.clone());
        let mut config = config_pipeline(generation, flows);

        let mut agent_loop = AgentLoop::from_config(provider, model, app, registry.clone());
        if let Some(bus) = &event_bus {
            agent_loop = agent_loop.with_event_bus(bus.clone());
        }
        let preparation = PreparationStep::new(agents, registry, app.agent.default_system_prompt.clone());
        let mut chat = chat_pipeline(preparation, Arc::new(agent_loop));

        if let Some(bus) = event_bus {
            config = config.with_event_bus(bus.clone());
            saver = saver.with_event_bus(bus.clone());
            chat = chat.with_event_bus(bus);
        }

        Self { config, chat, saver }
    }

    /// Generate, validate and store a flow from a free-text description.
    pub async fn run_config_pipeline(&self, text: &str) -> Result<GeneratedFlow, PipelineError> {
        let ctx = self.config.run(Value::String(text.to_string())).await.into_result()?;
        let generated = GeneratedFlow::from_context(&ctx)?;
        info!(flow_id = %generated.id, "Config pipeline succeeded");
        Ok(generated)
    }

    /// Validate and store a flow document the caller already has.
    pub async fn save_flow(&self, document: Value) -> Result<GeneratedFlow, PipelineError> {
        self.saver.save(document).await
    }

    /// Answer one chat message, optionally continuing an earlier conversation.
    ///
    /// A blank `agent_id` is the same as none.
    pub async fn run_chat_pipeline(
        &self,
        agent_id: Option<&str>,
        message: &str,
        prior: Vec<Message>,
    ) -> Result<ChatReply, PipelineError> {
        let agent_id = agent_id.map(str::trim).filter(|id| !id.is_empty()).map(String::from);
        let request = ChatRequest {
            agent_id: agent_id.clone(),
            message: message.to_string(),
            prior,
        };
        let input = serde_json::to_value(&request)
            .map_err(|e| PipelineError::Internal(format!("chat request is not serializable: {e}")))?;

        let ctx = self.chat.run(input).await.into_result()?;
        Ok(ChatReply {
            text: ctx.require(RESPONSE)?,
            agent_id,
            conversation: ctx.require(keys::CONVERSATION)?,
            iterations: ctx.require(keys::ITERATIONS)?,
            tool_calls: ctx.require(keys::TOOL_CALLS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_agent::testing::{make_text_response, SequentialMockProvider};
    use flowsmith_core::ErrorKind;
    use flowsmith_store::{default_agents, InMemoryAgentStore, InMemoryFlowStore};
    use flowsmith_tools::default_registry;
    use serde_json::json;

    fn orchestrator(provider: Arc<SequentialMockProvider>, bus: Option<Arc<EventBus>>) -> Orchestrator {
        Orchestrator::new(
            &AppConfig::default(),
            Collaborators {
                provider,
                model: "mock-model".into(),
                registry: Arc::new(default_registry()),
                agents: Arc::new(InMemoryAgentStore::with_agents(default_agents())),
                flows: Arc::new(InMemoryFlowStore::new()),
                event_bus: bus,
            },
        )
    }

    #[tokio::test]
    async fn chat_reply_carries_history() {
        let provider = Arc::new(SequentialMockProvider::single_text("Hello"));
        let reply = orchestrator(provider, None)
            .run_chat_pipeline(Some(" banking_assistant "), "Hi", vec![])
            .await
            .unwrap();
        assert_eq!(reply.text, "Hello");
        assert_eq!(reply.agent_id.as_deref(), Some("banking_assistant"));
        assert_eq!(reply.iterations, 1);
        assert_eq!(reply.history().len(), 3);
    }

    #[tokio::test]
    async fn blank_agent_id_uses_the_default_profile() {
        let provider = Arc::new(SequentialMockProvider::single_text("Hi there"));
        let reply = orchestrator(provider.clone(), None)
            .run_chat_pipeline(Some("  "), "Hi", vec![])
            .await
            .unwrap();
        assert!(reply.agent_id.is_none());
        let prompt = &provider.requests()[0].messages[0].content;
        assert_eq!(prompt, AppConfig::default().agent.default_system_prompt.trim());
    }

    #[tokio::test]
    async fn failures_keep_their_kind() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let err = orchestrator(provider, None)
            .run_chat_pipeline(Some("nobody"), "Hi", vec![])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentNotFoundError);
        assert_eq!(err.user_message(), "I apologize, but the requested agent is not available.");
    }

    #[tokio::test]
    async fn config_pipeline_returns_the_stored_flow() {
        let draft = json!({
            "id": "greeting",
            "name": "Greeting",
            "nodes": [{ "id": "hello", "type": "output" }]
        });
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response(&draft.to_string())]));
        let generated = orchestrator(provider.clone(), None)
            .run_config_pipeline("Say hello")
            .await
            .unwrap();
        assert!(generated.id.starts_with("greeting_"));
        assert_eq!(generated.flow.nodes.len(), 1);

        let sent = &provider.requests()[0];
        assert!((sent.temperature - AppConfig::default().config_temperature).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn save_flow_stores_only_valid_documents() {
        let flows = Arc::new(InMemoryFlowStore::new());
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let orchestrator = Orchestrator::new(
            &AppConfig::default(),
            Collaborators {
                provider: provider.clone(),
                model: "mock-model".into(),
                registry: Arc::new(default_registry()),
                agents: Arc::new(InMemoryAgentStore::new()),
                flows: flows.clone(),
                event_bus: None,
            },
        );

        let err = orchestrator
            .save_flow(json!({ "id": "x", "name": "X", "nodes": [] }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaError);
        assert!(flows.is_empty().await);

        let saved = orchestrator
            .save_flow(json!({ "id": "x", "name": "X", "nodes": [{ "id": "a", "type": "input" }] }))
            .await
            .unwrap();
        assert_eq!(flows.load(&saved.id).await.unwrap(), Some(saved.flow));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn pipelines_publish_to_the_shared_bus() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let provider = Arc::new(SequentialMockProvider::single_text("Hello"));
        orchestrator(provider, Some(bus))
            .run_chat_pipeline(None, "Hi", vec![])
            .await
            .unwrap();

        let mut steps = Vec::new();
        let mut loop_finished = false;
        while let Ok(event) = rx.try_recv() {
            match event.as_ref() {
                flowsmith_core::DomainEvent::StepCompleted { step, .. } => steps.push(step.clone()),
                flowsmith_core::DomainEvent::LoopFinished { .. } => loop_finished = true,
                _ => {}
            }
        }
        assert_eq!(steps, vec!["preparation", "agent_loop", "extraction"]);
        assert!(loop_finished);
    }
}
