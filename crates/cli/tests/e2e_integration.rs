//! End-to-end integration tests for flowsmith.
//!
//! These tests drive both pipelines through the orchestrator, from raw
//! input to caller-facing result, against scripted providers and real stores.

use std::sync::{Arc, Mutex};

use flowsmith_config::AppConfig;
use flowsmith_core::agent::AgentStore;
use flowsmith_core::error::{ErrorKind, PipelineError, ProviderError};
use flowsmith_core::event::{DomainEvent, EventBus};
use flowsmith_core::flow::FlowStore;
use flowsmith_core::message::{Message, MessageToolCall, Role};
use flowsmith_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use flowsmith_store::{
    agent_flows, assign_flow, FileAgentStore, FileFlowStore, InMemoryAgentStore, InMemoryFlowStore,
};
use flowsmith_tools::default_registry;
use flowsmith_workflow::{Collaborators, FlowSaver, Orchestrator};
use serde_json::json;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted responses in sequence and records every request.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn text(response: &str) -> Self {
        Self::new(vec![text_response(response)])
    }

    fn tool_then_text(tool_calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![tool_response(tool_calls), text_response(answer)])
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::Network("script exhausted".into()));
        }
        Ok(responses.remove(0))
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock".into(),
    }
}

fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls("", tool_calls),
        usage: usage(),
        model: "mock".into(),
    }
}

fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

fn in_memory(provider: Arc<ScriptedProvider>, config: &AppConfig) -> Orchestrator {
    Orchestrator::new(
        config,
        Collaborators {
            provider,
            model: "mock".into(),
            registry: Arc::new(default_registry()),
            agents: Arc::new(InMemoryAgentStore::with_agents(flowsmith_store::default_agents())),
            flows: Arc::new(InMemoryFlowStore::new()),
            event_bus: None,
        },
    )
}

// ── E2E: Chat pipeline ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_chat_plain_reply() {
    let provider = Arc::new(ScriptedProvider::text("Hello"));
    let reply = in_memory(provider.clone(), &AppConfig::default())
        .run_chat_pipeline(Some("banking_assistant"), "Hi there", vec![])
        .await
        .expect("chat should succeed");

    assert_eq!(reply.text, "Hello");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn e2e_chat_opens_a_bank_account() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![make_tool_call(
            "create_bank_account",
            json!({"name": "Ada", "second_name": "Lovelace", "id_number": "12345678", "balance": "250"}),
        )],
        "Your account ACC34567803 is ready.",
    ));
    let reply = in_memory(provider.clone(), &AppConfig::default())
        .run_chat_pipeline(Some("banking_assistant"), "Open an account for Ada Lovelace", vec![])
        .await
        .unwrap();

    assert_eq!(reply.text, "Your account ACC34567803 is ready.");
    assert_eq!(reply.tool_calls, 1);
    assert_eq!(reply.iterations, 2);

    // The tool turn stays in the record but is not the reply
    let tool_turn = reply
        .conversation
        .messages()
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool turn recorded");
    assert!(tool_turn.content.contains("Account Number: ACC34567803"));
    assert!(tool_turn.content.contains("Initial Balance: 250.00"));
    assert_eq!(provider.request(1).messages.last().unwrap().role, Role::Tool);
}

#[tokio::test]
async fn e2e_chat_tool_rejection_reenters_reasoning() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![make_tool_call("create_bank_account", json!({"name": "", "balance": 10}))],
        "What is your first name?",
    ));
    let reply = in_memory(provider.clone(), &AppConfig::default())
        .run_chat_pipeline(Some("banking_assistant"), "Open an account with 10", vec![])
        .await
        .unwrap();

    assert_eq!(reply.text, "What is your first name?");
    assert_eq!(provider.calls(), 2);
    let tool_turn = provider.request(1).messages.last().unwrap().clone();
    assert_eq!(tool_turn.content, "Error: First name is required");
}

#[tokio::test]
async fn e2e_chat_unknown_tool_fails_without_retry() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![make_tool_call("doesNotExist", json!({}))],
        "unreachable",
    ));
    let err = in_memory(provider.clone(), &AppConfig::default())
        .run_chat_pipeline(Some("banking_assistant"), "Do the thing", vec![])
        .await
        .unwrap_err();

    assert_eq!(err, PipelineError::UnknownTool("doesNotExist".into()));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn e2e_chat_tools_are_scoped_to_the_agent() {
    // customer_support has no tools, so the bank tool is unknown to it
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![make_tool_call("create_bank_account", json!({"name": "Ada"}))],
        "unreachable",
    ));
    let err = in_memory(provider.clone(), &AppConfig::default())
        .run_chat_pipeline(Some("customer_support"), "Open an account", vec![])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnknownToolError);
    assert!(provider.request(0).tools.is_empty());
}

#[tokio::test]
async fn e2e_chat_loop_limit_is_configurable() {
    let mut config = AppConfig::default();
    config.agent.max_tool_iterations = 2;
    let call = make_tool_call("create_bank_account", json!({"name": "Ada"}));
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![call.clone()]),
        tool_response(vec![call.clone()]),
        tool_response(vec![call]),
    ]));

    let err = in_memory(provider.clone(), &config)
        .run_chat_pipeline(None, "Keep opening accounts", vec![])
        .await
        .unwrap_err();

    assert_eq!(err, PipelineError::LoopLimitExceeded { max_iterations: 2 });
    assert_eq!(provider.calls(), 2);
    assert!(err.user_message().contains("maximum number of tool call iterations"));
}

#[tokio::test]
async fn e2e_chat_model_failure_is_reported() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let err = in_memory(provider, &AppConfig::default())
        .run_chat_pipeline(None, "Hello?", vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReasoningFailure);
}

#[tokio::test]
async fn e2e_chat_history_carries_forward() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("What name should the account use?"),
        text_response("Thanks, Ada."),
    ]));
    let orchestrator = in_memory(provider.clone(), &AppConfig::default());

    let first = orchestrator
        .run_chat_pipeline(Some("banking_assistant"), "I want an account", vec![])
        .await
        .unwrap();
    let second = orchestrator
        .run_chat_pipeline(Some("banking_assistant"), "Ada", first.history())
        .await
        .unwrap();

    assert_eq!(second.text, "Thanks, Ada.");
    let roles: Vec<Role> = provider.request(1).messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User]
    );
}

#[tokio::test]
async fn e2e_concurrent_chats_do_not_share_state() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("one"),
        text_response("two"),
    ]));
    let orchestrator = Arc::new(in_memory(provider.clone(), &AppConfig::default()));

    let a = tokio::spawn({
        let o = orchestrator.clone();
        async move { o.run_chat_pipeline(None, "first", vec![]).await }
    });
    let b = tokio::spawn({
        let o = orchestrator.clone();
        async move { o.run_chat_pipeline(None, "second", vec![]).await }
    });
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    let mut replies = vec![a.text, b.text];
    replies.sort();
    assert_eq!(replies, vec!["one", "two"]);
    assert_eq!(a.conversation.len(), 3);
    assert_eq!(b.conversation.len(), 3);
}

// ── E2E: Config pipeline ─────────────────────────────────────────────────

fn account_flow_json() -> String {
    json!({
        "id": "bank_account_creation",
        "name": "Bank Account Creation",
        "description": "Collect customer details and open an account",
        "nodes": [
            { "id": "collect", "name": "Collect details", "type": "input" },
            { "id": "open", "name": "Open account", "type": "tool",
              "parameters": { "tool": "create_bank_account" } },
            { "id": "confirm", "name": "Confirm", "type": "output" }
        ],
        "edges": [
            { "from": "collect", "to": "open" },
            { "from": "open", "to": "confirm", "condition": "account created" }
        ],
        "system_instructions": "Ask for any missing customer detail before opening the account.",
        "triggers": ["customer asks for a new account"],
        "expected_outputs": ["account number"]
    })
    .to_string()
}

#[tokio::test]
async fn e2e_generate_persists_to_disk_and_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let flows = Arc::new(FileFlowStore::new(dir.path().join("flows")));
    let provider = Arc::new(ScriptedProvider::text(&format!("```json\n{}\n```", account_flow_json())));
    let orchestrator = Orchestrator::new(
        &AppConfig::default(),
        Collaborators {
            provider,
            model: "mock".into(),
            registry: Arc::new(default_registry()),
            agents: Arc::new(InMemoryAgentStore::new()),
            flows: flows.clone(),
            event_bus: None,
        },
    );

    let generated = orchestrator
        .run_config_pipeline("A flow that opens bank accounts")
        .await
        .unwrap();

    assert!(generated.id.starts_with("bank_account_creation_"));
    assert!(dir.path().join("flows").join(format!("{}.json", generated.id)).exists());
    let loaded = flows.load(&generated.id).await.unwrap().unwrap();
    assert_eq!(loaded, generated.flow);

    let listed = flows.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Bank Account Creation");
}

#[tokio::test]
async fn e2e_generate_rejects_invalid_documents() {
    let bad = json!({
        "id": "",
        "name": "Broken",
        "nodes": [{ "id": "a", "type": "input" }, { "id": "a", "type": "output" }],
        "edges": [{ "from": "a", "to": "b" }]
    })
    .to_string();
    let provider = Arc::new(ScriptedProvider::text(&bad));
    let err = in_memory(provider, &AppConfig::default())
        .run_config_pipeline("anything")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaError);
    let fields: Vec<&str> = err.violations().iter().map(|v| v.field.as_str()).collect();
    assert_eq!(fields, vec!["id", "nodes[1].id", "edges[0].to"]);
}

#[tokio::test]
async fn e2e_saving_a_hand_written_flow() {
    let dir = tempfile::tempdir().unwrap();
    let flows = Arc::new(FileFlowStore::new(dir.path().join("flows")));
    let saver = FlowSaver::new(flows.clone());

    let mut broken: serde_json::Value = serde_json::from_str(&account_flow_json()).unwrap();
    broken["edges"][0]["to"] = json!("nowhere");
    broken["description"] = json!(null);
    let err = saver.save(broken).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaError);
    assert_eq!(err.violations()[0].field, "edges[0].to");
    assert!(flows.list().await.unwrap().is_empty());

    let document: serde_json::Value = serde_json::from_str(&account_flow_json()).unwrap();
    let saved = saver.save(document).await.unwrap();
    assert!(saved.flow.created_at.is_some());
    assert_eq!(flows.load(&saved.id).await.unwrap(), Some(saved.flow));
}

// ── E2E: Agents and flows on disk ────────────────────────────────────────

#[tokio::test]
async fn e2e_assigned_flows_resolve_for_an_agent() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(FileAgentStore::open(dir.path().join("agents")).unwrap());
    let flows = Arc::new(FileFlowStore::new(dir.path().join("flows")));
    let bus = Arc::new(EventBus::new(64));
    let mut rx = bus.subscribe();

    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response(&account_flow_json()),
        text_response("Happy to help with your account."),
    ]));
    let orchestrator = Orchestrator::new(
        &AppConfig::default(),
        Collaborators {
            provider,
            model: "mock".into(),
            registry: Arc::new(default_registry()),
            agents: agents.clone(),
            flows: flows.clone(),
            event_bus: Some(bus),
        },
    );

    let generated = orchestrator.run_config_pipeline("open accounts").await.unwrap();
    assert!(assign_flow(agents.as_ref(), "sales_assistant", &generated.id).await.unwrap());

    let sales = agents.get("sales_assistant").await.unwrap().unwrap();
    let resolved = agent_flows(&sales, flows.as_ref()).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].1.name, "Bank Account Creation");

    // A reopened store sees the assignment
    let reopened = FileAgentStore::open(dir.path().join("agents")).unwrap();
    let sales = reopened.get("sales_assistant").await.unwrap().unwrap();
    assert!(sales.flows.contains(&generated.id));

    orchestrator
        .run_chat_pipeline(Some("sales_assistant"), "Hi", vec![])
        .await
        .unwrap();

    let mut pipelines = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::StepCompleted { pipeline, step, .. } = event.as_ref() {
            pipelines.push(format!("{pipeline}/{step}"));
        }
    }
    assert_eq!(
        pipelines,
        vec![
            "config_generation/generation",
            "config_generation/validation",
            "config_generation/persistence",
            "chat/preparation",
            "chat/agent_loop",
            "chat/extraction",
        ]
    );
}
