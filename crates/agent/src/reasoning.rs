//! The reasoning stage: one model call per loop iteration.

use std::sync::Arc;

use flowsmith_core::error::ProviderError;
use flowsmith_core::message::Conversation;
use flowsmith_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use tracing::{debug, warn};

/// Sends the conversation so far to the model and returns its next turn.
pub struct ReasoningStage {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ReasoningStage {
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

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for the next turn, offering only `tools`.
    pub async fn reason(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ProviderResponse, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: conversation.messages().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
        };

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            messages = conversation.len(),
            tools = tools.len(),
            "Calling model"
        );

        self.provider.complete(request).await.inspect_err(|e| {
            warn!(provider = self.provider.name(), error = %e, "Model call failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_text_response, SequentialMockProvider};
    use flowsmith_core::message::Role;

    #[tokio::test]
    async fn forwards_conversation_and_tools() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("Hi")]));
        let stage = ReasoningStage::new(provider.clone(), "mock-model", 0.7).with_max_tokens(256);
        let conv = Conversation::seeded("Be brief.", vec![], "Hello");
        let tools = vec![ToolDefinition {
            name: "create_bank_account".into(),
            description: "Open an account".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];

        let response = stage.reason(&conv, &tools).await.unwrap();
        assert_eq!(response.message.content, "Hi");
        assert_eq!(response.message.role, Role::Assistant);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].tools, tools);
        assert_eq!(requests[0].max_tokens, Some(256));
        assert!((requests[0].temperature - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let stage = ReasoningStage::new(provider, "mock-model", 0.7);
        let conv = Conversation::seeded("", vec![], "Hello");
        assert!(stage.reason(&conv, &[]).await.is_err());
    }
}
