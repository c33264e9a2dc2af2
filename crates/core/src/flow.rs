//! Flow configuration documents.
//!
//! A flow config is the structured workflow the config generation pipeline
//! produces from a natural-language description: a set of typed nodes and the
//! edges that connect them. Documents are checked against a fixed schema on
//! the raw JSON first, so every problem is reported at once, and only then
//! deserialized into [`FlowConfig`].

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, Violation};
use crate::tool::value_kind;

/// A validated flow configuration.
///
/// Optional fields read `null` the same as a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default = "default_version", deserialize_with = "null_as_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub nodes: Vec<FlowNode>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<FlowEdge>,
    /// Prose description of how the nodes connect
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub flow_logic: String,
    /// Instructions for an agent following this flow
    #[serde(default, deserialize_with = "null_as_default")]
    pub system_instructions: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub triggers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_outputs: Vec<String>,
}

fn default_version() -> String {
    "1.0".into()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_version))
}

/// One processing node of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Map<String, Value>,
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Listing entry for stored flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    /// Storage id (not the document's own `id`)
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl FlowConfig {
    /// Validate a raw document and deserialize it.
    pub fn from_document(document: &Value) -> Result<Self, Vec<Violation>> {
        let violations = validate_flow_document(document);
        if !violations.is_empty() {
            return Err(violations);
        }
        serde_json::from_value(document.clone())
            .map_err(|e| vec![Violation::new("document", e.to_string())])
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn summary(&self, storage_id: impl Into<String>) -> FlowSummary {
        FlowSummary {
            id: storage_id.into(),
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
        }
    }
}

/// Persistence for flow configs.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Store a document under a newly assigned id and return that id.
    async fn save(&self, flow: &FlowConfig) -> Result<String, StoreError>;

    /// Load a document by storage id.
    async fn load(&self, id: &str) -> Result<Option<FlowConfig>, StoreError>;

    /// Summaries of every stored document, ordered by storage id.
    async fn list(&self) -> Result<Vec<FlowSummary>, StoreError>;
}

// ── Schema ────────────────────────────────────────────────────────────────

fn require_text(obj: &Map<String, Value>, key: &str, path: &str, out: &mut Vec<Violation>) -> Option<String> {
    let field = join_path(path, key);
    match obj.get(key) {
        None | Some(Value::Null) => {
            out.push(Violation::new(field, "required field is missing"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            out.push(Violation::new(field, "must not be empty"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            out.push(Violation::new(field, format!("expected string, found {}", value_kind(other))));
            None
        }
    }
}

fn optional_of(obj: &Map<String, Value>, key: &str, path: &str, expected: &str, out: &mut Vec<Violation>) {
    let Some(value) = obj.get(key) else { return };
    let ok = match (expected, value) {
        (_, Value::Null) => true,
        ("string", Value::String(_)) => true,
        ("object", Value::Object(_)) => true,
        ("string[]", Value::Array(items)) => items.iter().all(Value::is_string),
        _ => false,
    };
    if !ok {
        out.push(Violation::new(
            join_path(path, key),
            format!("expected {expected}, found {}", value_kind(value)),
        ));
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() { key.to_string() } else { format!("{path}.{key}") }
}

/// Check a raw flow document against the fixed schema.
///
/// Returns every violation found; an empty vector means the document is valid.
pub fn validate_flow_document(document: &Value) -> Vec<Violation> {
    let mut out = Vec::new();
    let Value::Object(root) = document else {
        out.push(Violation::new(
            "document",
            format!("expected object, found {}", value_kind(document)),
        ));
        return out;
    };

    require_text(root, "id", "", &mut out);
    require_text(root, "name", "", &mut out);
    for key in ["description", "version", "flow_logic", "system_instructions"] {
        optional_of(root, key, "", "string", &mut out);
    }
    for key in ["triggers", "expected_outputs"] {
        optional_of(root, key, "", "string[]", &mut out);
    }
    if let Some(created) = root.get("created_at") {
        match created {
            Value::Null => {}
            Value::String(s) if DateTime::parse_from_rfc3339(s).is_ok() => {}
            _ => out.push(Violation::new("created_at", "expected an RFC 3339 timestamp")),
        }
    }

    let mut node_ids = HashSet::new();
    match root.get("nodes") {
        None | Some(Value::Null) => out.push(Violation::new("nodes", "required field is missing")),
        Some(Value::Array(nodes)) if nodes.is_empty() => {
            out.push(Violation::new("nodes", "a flow needs at least one node"));
        }
        Some(Value::Array(nodes)) => {
            for (i, node) in nodes.iter().enumerate() {
                let path = format!("nodes[{i}]");
                let Value::Object(node) = node else {
                    out.push(Violation::new(&path, format!("expected object, found {}", value_kind(node))));
                    continue;
                };
                if let Some(id) = require_text(node, "id", &path, &mut out) {
                    if !node_ids.insert(id.clone()) {
                        out.push(Violation::new(format!("{path}.id"), format!("duplicate node id '{id}'")));
                    }
                }
                require_text(node, "type", &path, &mut out);
                optional_of(node, "name", &path, "string", &mut out);
                optional_of(node, "description", &path, "string", &mut out);
                optional_of(node, "parameters", &path, "object", &mut out);
            }
        }
        Some(other) => out.push(Violation::new(
            "nodes",
            format!("expected array, found {}", value_kind(other)),
        )),
    }

    match root.get("edges") {
        None | Some(Value::Null) => {}
        Some(Value::Array(edges)) => {
            for (i, edge) in edges.iter().enumerate() {
                let path = format!("edges[{i}]");
                let Value::Object(edge) = edge else {
                    out.push(Violation::new(&path, format!("expected object, found {}", value_kind(edge))));
                    continue;
                };
                for end in ["from", "to"] {
                    if let Some(target) = require_text(edge, end, &path, &mut out) {
                        if !node_ids.contains(&target) {
                            out.push(Violation::new(
                                format!("{path}.{end}"),
                                format!("references unknown node '{target}'"),
                            ));
                        }
                    }
                }
                optional_of(edge, "condition", &path, "string", &mut out);
            }
        }
        Some(other) => out.push(Violation::new(
            "edges",
            format!("expected array, found {}", value_kind(other)),
        )),
    }

    out
}
