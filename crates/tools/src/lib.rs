//! Built-in tool implementations for flowsmith.
//!
//! Tools give an agent the ability to act mid-conversation. Each one is
//! registered once at startup through [`default_registry`].

pub mod bank_account;

use flowsmith_core::tool::ToolRegistry;

pub use bank_account::BankAccountTool;

/// Create a tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in [Box::new(BankAccountTool) as Box<dyn flowsmith_core::Tool>] {
        if let Err(e) = registry.register(tool) {
            tracing::warn!(error = %e, "Skipping built-in tool");
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_bank_account_tool() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["create_bank_account"]);
        let defs = registry.definitions();
        assert_eq!(defs[0].parameters["required"], serde_json::json!(["name"]));
    }
}
