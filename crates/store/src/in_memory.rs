//! In-memory stores: useful for testing and ephemeral sessions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flowsmith_core::agent::{Agent, AgentStore};
use flowsmith_core::error::StoreError;
use flowsmith_core::flow::{FlowConfig, FlowStore, FlowSummary};
use tokio::sync::RwLock;

use crate::new_flow_id;

/// Agents kept in a map keyed by id.
pub struct InMemoryAgentStore {
    agents: Arc<RwLock<BTreeMap<String, Agent>>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// A store pre-populated with `agents`.
    pub fn with_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        let map = agents.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self {
            agents: Arc::new(RwLock::new(map)),
        }
    }
}

impl Default for InMemoryAgentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn get(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(self.agents.read().await.values().cloned().collect())
    }

    async fn save(&self, mut agent: Agent) -> Result<Agent, StoreError> {
        agent.updated_at = Utc::now();
        self.agents
            .write()
            .await
            .insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.agents.write().await.remove(id).is_some())
    }
}

/// Flow configs kept in a map keyed by storage id.
pub struct InMemoryFlowStore {
    flows: Arc<RwLock<BTreeMap<String, FlowConfig>>>,
}

impl InMemoryFlowStore {
    pub fn new() -> Self {
        Self {
            flows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.flows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.flows.read().await.is_empty()
    }
}

impl Default for InMemoryFlowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn save(&self, flow: &FlowConfig) -> Result<String, StoreError> {
        let id = new_flow_id(&flow.name, flow.created_at.unwrap_or_else(Utc::now));
        self.flows.write().await.insert(id.clone(), flow.clone());
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<Option<FlowConfig>, StoreError> {
        Ok(self.flows.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<FlowSummary>, StoreError> {
        Ok(self
            .flows
            .read()
            .await
            .iter()
            .map(|(id, flow)| flow.summary(id))
            .collect())
    }
}
