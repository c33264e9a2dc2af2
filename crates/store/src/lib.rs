//! Agent and flow config persistence for flowsmith.
//!
//! Two backends per record type: an in-memory one for tests and ephemeral
//! runs, and a file one that keeps one pretty-printed JSON document per
//! record under the configured storage directories.

pub mod agents;
pub mod file_backend;
pub mod in_memory;

use chrono::{DateTime, Utc};
use flowsmith_core::agent::slugify;

pub use agents::{agent_flows, assign_flow, create_agent, default_agents, remove_flow, seed_default_agents};
pub use file_backend::{FileAgentStore, FileFlowStore};
pub use in_memory::{InMemoryAgentStore, InMemoryFlowStore};

/// Storage id for a new flow: `<slug>_<YYYYmmdd_HHMMSS>_<8 hex>`.
pub fn new_flow_id(name: &str, at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", slugify(name), at.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn flow_ids_are_slugged_and_timestamped() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let id = new_flow_id("Account Opening", at);
        assert!(id.starts_with("account_opening_20250314_092653_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn flow_ids_are_unique_within_a_second() {
        let at = Utc::now();
        assert_ne!(new_flow_id("x", at), new_flow_id("x", at));
    }
}
