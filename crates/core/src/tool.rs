//! Tool trait and registry: the capabilities an agent may invoke mid-conversation.
//!
//! Each tool declares an ordered list of typed parameters. The registry checks
//! a call's arguments against that list (reporting every violation, not just
//! the first) before the tool function ever sees them.
//!
//! A tool's own domain checks (an empty customer name, a negative balance) are
//! not registry failures: the tool returns them as ordinary output with
//! `success = false`, and the agent loop carries on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ToolError, Violation};
use crate::provider::ToolDefinition;

/// Arguments after validation and coercion.
pub type ToolArguments = Map<String, Value>;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool accepted the request
    pub success: bool,

    /// Human-readable output fed back to the reasoning stage
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    /// A domain-level rejection, delivered as normal tool output.
    pub fn rejected(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: false,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The JSON type a parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Return `value` converted to this type, if it already is one or is an
    /// unambiguous scalar spelling of one.
    fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),

            (Self::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(value.clone())
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| Value::from(f as i64))
                }
            }
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

            (Self::Boolean, Value::Bool(_)) => Some(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            (Self::Object, Value::Object(_)) | (Self::Array, Value::Array(_)) => Some(value.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, typed parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Name of the JSON type of `value`, for violation messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `arguments` against `params`, coercing compatible scalars.
///
/// Every parameter is examined; the error lists all violations found.
/// Arguments not named in `params` are passed through untouched.
pub fn validate_arguments(params: &[ParamSpec], arguments: &Value) -> Result<ToolArguments, Vec<Violation>> {
    let Value::Object(given) = arguments else {
        return Err(vec![Violation::new(
            "arguments",
            format!("expected a JSON object, found {}", value_kind(arguments)),
        )]);
    };

    let mut validated = given.clone();
    let mut violations = Vec::new();

    for param in params {
        match given.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    violations.push(Violation::new(&param.name, "missing required parameter"));
                }
            }
            Some(value) => match param.param_type.coerce(value) {
                Some(coerced) => {
                    validated.insert(param.name.clone(), coerced);
                }
                None => violations.push(Violation::new(
                    &param.name,
                    format!("expected {}, found {}", param.param_type, value_kind(value)),
                )),
            },
        }
    }

    if violations.is_empty() {
        Ok(validated)
    } else {
        Err(violations)
    }
}

/// The core Tool trait.
///
/// Tools are registered once at startup and never mutated afterwards.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_bank_account").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Ordered parameter list.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Validate raw arguments. Defaults to checking them against [`Tool::parameters`].
    fn validate(&self, arguments: &Value) -> Result<ToolArguments, Vec<Violation>> {
        validate_arguments(&self.parameters(), arguments)
    }

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: ToolArguments) -> std::result::Result<ToolResult, ToolError>;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value {
        let params = self.parameters();
        let properties: Map<String, Value> = params
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.param_type.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, keyed by unique name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool definitions, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Validate and run a tool call.
    ///
    /// Only a fully valid argument set reaches the tool function.
    pub async fn invoke(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let arguments = tool
            .validate(&call.arguments)
            .map_err(|violations| ToolError::InvalidArguments {
                tool_name: call.name.clone(),
                violations,
            })?;

        debug!(tool = %call.name, call_id = %call.id, "Invoking tool");
        let mut result = tool.execute(arguments).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters(&self) -> Vec<ParamSpec> {
            vec![
                ParamSpec::required("text", ParamType::String, "Text to echo"),
                ParamSpec::required("times", ParamType::Integer, "Repetitions"),
                ParamSpec::optional("loud", ParamType::Boolean, "Uppercase the output"),
            ]
        }
        async fn execute(&self, arguments: ToolArguments) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("");
            let times = arguments["times"].as_i64().unwrap_or(1).max(0) as usize;
            let mut output = text.repeat(times);
            if arguments.get("loud").and_then(Value::as_bool).unwrap_or(false) {
                output = output.to_uppercase();
            }
            Ok(ToolResult::ok(output))
        }
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        registry
    }

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: args,
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = echo_registry();
        assert!(registry.lookup("echo").is_some());
        assert!(registry.lookup("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = echo_registry();
        let err = registry.register(Box::new(EchoTool)).unwrap_err();
        assert_eq!(err, ToolError::AlreadyRegistered("echo".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn schema_lists_required_parameters() {
        let defs = echo_registry().definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].parameters["required"], json!(["text", "times"]));
        assert_eq!(defs[0].parameters["properties"]["loud"]["type"], "boolean");
    }

    #[tokio::test]
    async fn invoke_runs_valid_call() {
        let result = echo_registry()
            .invoke(&call(json!({"text": "ab", "times": 2})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "abab");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn invoke_coerces_scalars() {
        let result = echo_registry()
            .invoke(&call(json!({"text": 7, "times": "3", "loud": "true"})))
            .await
            .unwrap();
        assert_eq!(result.output, "777");
    }

    #[tokio::test]
    async fn invoke_reports_every_violation() {
        let err = echo_registry()
            .invoke(&call(json!({"times": [1], "loud": "maybe"})))
            .await
            .unwrap_err();
        let ToolError::InvalidArguments { tool_name, violations } = err else {
            panic!("expected InvalidArguments");
        };
        assert_eq!(tool_name, "echo");
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["text", "times", "loud"]);
        assert_eq!(violations[0].message, "missing required parameter");
        assert_eq!(violations[1].message, "expected integer, found array");
    }

    #[tokio::test]
    async fn invoke_rejects_non_object_arguments() {
        let err = echo_registry().invoke(&call(json!("hello"))).await.unwrap_err();
        let ToolError::InvalidArguments { violations, .. } = err else {
            panic!("expected InvalidArguments");
        };
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "arguments");
    }

    #[tokio::test]
    async fn invoke_missing_tool() {
        let registry = ToolRegistry::new();
        let err = registry.invoke(&call(json!({}))).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn null_optional_is_ignored() {
        let params = vec![ParamSpec::optional("note", ParamType::String, "")];
        let args = validate_arguments(&params, &json!({"note": null})).unwrap();
        assert_eq!(args["note"], Value::Null);
    }

    #[test]
    fn integer_rejects_fractional_values() {
        let params = vec![ParamSpec::required("n", ParamType::Integer, "")];
        assert!(validate_arguments(&params, &json!({"n": 2.5})).is_err());
        assert_eq!(validate_arguments(&params, &json!({"n": 4.0})).unwrap()["n"], json!(4));
    }
}
