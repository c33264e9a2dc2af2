//! Agent management on top of any [`AgentStore`].

use flowsmith_config::DEFAULT_SYSTEM_PROMPT;
use flowsmith_core::agent::{slugify, Agent, AgentStore};
use flowsmith_core::error::StoreError;
use flowsmith_core::flow::{FlowConfig, FlowStore};
use tracing::{info, warn};

const SUPPORT_PROMPT: &str = "You are a helpful customer support assistant. You can help with:\n\
- General inquiries\n\
- Product information\n\
- Troubleshooting\n\
- Account questions\n\n\
Be professional, empathetic, and solution-oriented in your responses.";

const SALES_PROMPT: &str = "You are a knowledgeable sales assistant. You help customers:\n\
- Discover products that meet their needs\n\
- Understand product features and benefits\n\
- Make informed purchasing decisions\n\
- Process orders and handle sales inquiries\n\n\
Be consultative, informative, and customer-focused.";

/// The agents a fresh installation starts with.
pub fn default_agents() -> Vec<Agent> {
    vec![
        Agent::new(
            "Banking Assistant",
            "Specialized in bank account creation and banking services",
            DEFAULT_SYSTEM_PROMPT,
        )
        .with_tools(["create_bank_account"])
        .with_flows(["bank_account_creation"]),
        Agent::new(
            "Customer Support",
            "General customer support and inquiry handling",
            SUPPORT_PROMPT,
        )
        .with_flows(["customer_support_flow"]),
        Agent::new(
            "Sales Assistant",
            "Product recommendations and sales support",
            SALES_PROMPT,
        )
        .with_flows(["sales_flow"]),
    ]
}

/// Save the default agents if `store` holds none. Returns how many were added.
pub async fn seed_default_agents(store: &dyn AgentStore) -> Result<usize, StoreError> {
    if !store.list().await?.is_empty() {
        return Ok(0);
    }
    let agents = default_agents();
    let count = agents.len();
    for agent in agents {
        store.save(agent).await?;
    }
    info!(count, "Seeded default agents");
    Ok(count)
}

/// Create a new agent whose id is the slug of `name`.
///
/// Fails with [`StoreError::AlreadyExists`] if that id is taken.
pub async fn create_agent(
    store: &dyn AgentStore,
    name: &str,
    description: &str,
    system_prompt: &str,
    tools: Vec<String>,
) -> Result<Agent, StoreError> {
    let id = slugify(name);
    if store.get(&id).await?.is_some() {
        return Err(StoreError::AlreadyExists(id));
    }
    store
        .save(Agent::new(name.trim(), description, system_prompt).with_tools(tools))
        .await
}

/// Assign `flow_id` to an agent. Returns `false` if it was already assigned.
pub async fn assign_flow(store: &dyn AgentStore, agent_id: &str, flow_id: &str) -> Result<bool, StoreError> {
    let mut agent = store
        .get(agent_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(agent_id.to_string()))?;
    if !agent.assign_flow(flow_id) {
        return Ok(false);
    }
    store.save(agent).await?;
    Ok(true)
}

/// Unassign `flow_id` from an agent. Returns `false` if it was not assigned.
pub async fn remove_flow(store: &dyn AgentStore, agent_id: &str, flow_id: &str) -> Result<bool, StoreError> {
    let mut agent = store
        .get(agent_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(agent_id.to_string()))?;
    if !agent.remove_flow(flow_id) {
        return Ok(false);
    }
    store.save(agent).await?;
    Ok(true)
}

/// Resolve an agent's assigned flow ids to documents, skipping missing ones.
pub async fn agent_flows(
    agent: &Agent,
    flows: &dyn FlowStore,
) -> Result<Vec<(String, FlowConfig)>, StoreError> {
    let mut resolved = Vec::with_capacity(agent.flows.len());
    for id in &agent.flows {
        match flows.load(id).await? {
            Some(flow) => resolved.push((id.clone(), flow)),
            None => warn!(agent = %agent.id, flow = %id, "Assigned flow not found"),
        }
    }
    Ok(resolved)
}
