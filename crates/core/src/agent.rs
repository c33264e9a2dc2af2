//! Agent records and the store contract the chat pipeline reads them through.
//!
//! An agent is a configured persona: system prompt, assigned tools and
//! assigned flows. The core never manages agent lifecycle; it takes a
//! read-only [`AgentProfile`] snapshot at preparation time and uses that for
//! the whole run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A stored agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    /// Names of tools this agent may call
    #[serde(default)]
    pub tools: Vec<String>,
    /// Ids of flows assigned to this agent
    #[serde(default)]
    pub flows: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Agent {
    /// Create a new active agent whose id is the slug of its name.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: slugify(&name),
            name,
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            flows: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flows<I, S>(mut self, flows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flows = flows.into_iter().map(Into::into).collect();
        self
    }

    /// Assign a flow. Returns `false` if it was already assigned.
    pub fn assign_flow(&mut self, flow_id: &str) -> bool {
        if self.flows.iter().any(|f| f == flow_id) {
            return false;
        }
        self.flows.push(flow_id.to_string());
        true
    }

    /// Unassign a flow. Returns `false` if it was not assigned.
    pub fn remove_flow(&mut self, flow_id: &str) -> bool {
        let before = self.flows.len();
        self.flows.retain(|f| f != flow_id);
        self.flows.len() != before
    }

    /// The loop configuration this agent contributes to a chat run.
    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            agent_id: Some(self.id.clone()),
            name: self.name.clone(),
            system_prompt: self.system_prompt.clone(),
            tools: self.tools.clone(),
        }
    }
}

/// Read-only snapshot of the agent settings a chat run uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// `None` for the built-in default profile
    pub agent_id: Option<String>,
    pub name: String,
    pub system_prompt: String,
    pub tools: Vec<String>,
}

/// Persistence for agents.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Fetch one agent.
    async fn get(&self, id: &str) -> Result<Option<Agent>, StoreError>;

    /// All agents, ordered by id.
    async fn list(&self) -> Result<Vec<Agent>, StoreError>;

    /// Insert or replace an agent, stamping `updated_at`. Returns the stored record.
    async fn save(&self, agent: Agent) -> Result<Agent, StoreError>;

    /// Remove an agent. Returns `false` if it did not exist.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Lowercase `name` and fold every run of non-alphanumerics into `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() { "untitled".into() } else { slug }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Banking Assistant"), "banking_assistant");
        assert_eq!(slugify("  Sales -- Assistant! "), "sales_assistant");
        assert_eq!(slugify("Customer-Support"), "customer_support");
        assert_eq!(slugify("???"), "untitled");
    }

    #[test]
    fn new_agent_is_active_with_slug_id() {
        let agent = Agent::new("Banking Assistant", "Opens accounts", "You are a banker.")
            .with_tools(["create_bank_account"]);
        assert_eq!(agent.id, "banking_assistant");
        assert!(agent.active);
        assert_eq!(agent.tools, vec!["create_bank_account"]);
    }

    #[test]
    fn flow_assignment_is_idempotent() {
        let mut agent = Agent::new("Support", "", "");
        assert!(agent.assign_flow("onboarding"));
        assert!(!agent.assign_flow("onboarding"));
        assert_eq!(agent.flows.len(), 1);
        assert!(agent.remove_flow("onboarding"));
        assert!(!agent.remove_flow("onboarding"));
        assert!(agent.flows.is_empty());
    }

    #[test]
    fn profile_snapshots_loop_settings() {
        let agent = Agent::new("Banker", "", "Be precise.").with_tools(["create_bank_account"]);
        let profile = agent.profile();
        assert_eq!(profile.agent_id.as_deref(), Some("banker"));
        assert_eq!(profile.system_prompt, "Be precise.");
        assert_eq!(profile.tools, agent.tools);
    }

    #[test]
    fn agent_deserializes_with_defaults() {
        let agent: Agent = serde_json::from_value(serde_json::json!({
            "id": "x",
            "name": "X",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(agent.active);
        assert!(agent.tools.is_empty());
    }
}
