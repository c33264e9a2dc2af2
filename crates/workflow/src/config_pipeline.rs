//! The config generation pipeline: description → draft → validated flow → stored flow.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flowsmith_core::error::{PipelineError, Result};
use flowsmith_core::flow::{FlowConfig, FlowStore};
use flowsmith_core::message::Message;
use flowsmith_core::provider::{Provider, ProviderRequest};
use flowsmith_pipeline::{Context, FnStep, Pipeline, Step};
use serde_json::Value;
use tracing::{debug, info};

/// Context keys written by the config pipeline's steps.
pub mod keys {
    /// Unvalidated JSON produced by the generation step
    pub const DRAFT: &str = "draft_config";
    /// The validated [`FlowConfig`](flowsmith_core::FlowConfig)
    pub const FLOW: &str = "flow_config";
    /// Id the flow store assigned
    pub const FLOW_ID: &str = "flow_id";
}

const FORMAT_TEMPLATE: &str = r#"{
  "id": "string - short unique identifier, lowercase with underscores",
  "name": "string - descriptive name for the workflow",
  "description": "string - brief description of what this workflow does",
  "version": "string - version number (e.g. '1.0')",
  "nodes": [
    {
      "id": "string - unique node identifier",
      "name": "string - node name",
      "type": "string - input, processing, decision, tool, output, ...",
      "description": "string - what this node does",
      "parameters": "object - any parameters this node needs"
    }
  ],
  "edges": [
    { "from": "string - source node id", "to": "string - target node id", "condition": "string or null" }
  ],
  "flow_logic": "string - how the nodes connect and flow",
  "system_instructions": "string - instructions for AI behavior when following this workflow",
  "triggers": ["strings - what starts this workflow"],
  "expected_outputs": ["strings - what this workflow produces"]
}"#;

/// The prompt sent to the model for one description.
pub fn generation_prompt(description: &str) -> String {
    format!(
        "You are an AI workflow designer. Create a structured workflow configuration in JSON \
         format based on the user's description.\n\n\
         User Input: {description}\n\n\
         Create a JSON configuration that follows this EXACT format:\n{FORMAT_TEMPLATE}\n\n\
         Requirements:\n\
         1. Use the exact field names and structure shown above\n\
         2. Fill in realistic values based on the user's description\n\
         3. Create 2-5 logical nodes for the workflow\n\
         4. Every edge must connect two node ids that exist\n\
         5. Make system_instructions detailed and actionable\n\
         6. Include relevant triggers and expected outputs\n\n\
         Respond ONLY with valid JSON. No markdown code blocks, no explanation.\n\
         Start directly with {{ and end with }}."
    )
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Turns the free-text description in `ctx.input` into a draft document.
pub struct GenerationStep {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl GenerationStep {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

#[async_trait]
impl Step for GenerationStep {
    fn name(&self) -> &str {
        "generation"
    }

    async fn run(&self, ctx: &mut Context) -> Result<()> {
        let description = ctx.input.as_str().map(str::trim).unwrap_or_default();
        if description.is_empty() {
            return Err(PipelineError::Generation("workflow description is empty".into()));
        }

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::user(generation_prompt(description))],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: Vec::new(),
        };
        debug!(provider = self.provider.name(), model = %self.model, "Requesting flow draft");

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let cleaned = strip_code_fences(&response.message.content);
        if cleaned.is_empty() {
            return Err(PipelineError::Generation("model returned an empty response".into()));
        }
        let draft: Value = serde_json::from_str(cleaned)
            .map_err(|e| PipelineError::Generation(format!("model output is not valid JSON: {e}")))?;

        ctx.insert(keys::DRAFT, &draft)
    }
}

/// Checks the draft against the flow schema.
///
/// Failures carry every schema violation as [`PipelineError::Schema`].
pub struct ValidationStep;

#[async_trait]
impl Step for ValidationStep {
    fn name(&self) -> &str {
        "validation"
    }

    async fn run(&self, ctx: &mut Context) -> Result<()> {
        let draft: Value = ctx.require(keys::DRAFT)?;
        let flow = FlowConfig::from_document(&draft)
            .map_err(|violations| PipelineError::Schema { violations })?;
        debug!(flow = %flow.id, nodes = flow.nodes.len(), edges = flow.edges.len(), "Flow draft is valid");
        ctx.insert(keys::FLOW, &flow)
    }
}

/// Stamps the creation time and hands the flow to the store.
pub struct PersistenceStep {
    store: Arc<dyn FlowStore>,
}

impl PersistenceStep {
    pub fn new(store: Arc<dyn FlowStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Step for PersistenceStep {
    fn name(&self) -> &str {
        "persistence"
    }

    async fn run(&self, ctx: &mut Context) -> Result<()> {
        let mut flow: FlowConfig = ctx.require(keys::FLOW)?;
        flow.created_at.get_or_insert_with(Utc::now);

        let id = self.store.save(&flow).await?;
        info!(flow_id = %id, name = %flow.name, "Flow config saved");

        ctx.insert(keys::FLOW, &flow)?;
        ctx.insert(keys::FLOW_ID, &id)
    }
}

/// Generation, validation and persistence, in that order.
pub fn config_pipeline(generation: GenerationStep, store: Arc<dyn FlowStore>) -> Pipeline {
    Pipeline::empty("config_generation")
        .then(generation)
        .then(ValidationStep)
        .then(PersistenceStep::new(store))
}

/// Validation and persistence of a document the caller already has.
///
/// The document is taken from `ctx.input` as is; no model is involved.
pub fn save_flow_pipeline(store: Arc<dyn FlowStore>) -> Pipeline {
    let intake = FnStep::new("intake", |ctx: &mut Context| {
        let document = ctx.input.clone();
        ctx.insert(keys::DRAFT, &document)
    });
    Pipeline::empty("flow_save")
        .then(intake)
        .then(ValidationStep)
        .then(PersistenceStep::new(store))
}
