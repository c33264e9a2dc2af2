//! Error types for the flowsmith domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`PipelineError`] is the one
//! failure type that flows through pipeline steps up to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias used by pipeline steps.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A single rule broken by a payload (tool arguments, a flow document, a request).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Path of the offending field, e.g. `nodes[1].id` or `balance`
    pub field: String,

    /// What is wrong with it
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Stable, serializable failure kind surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    SchemaError,
    UnknownToolError,
    AgentNotFoundError,
    GenerationError,
    ReasoningFailure,
    LoopLimitExceeded,
    ToolFailed,
    StorageError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::SchemaError => "schema_error",
            Self::UnknownToolError => "unknown_tool_error",
            Self::AgentNotFoundError => "agent_not_found_error",
            Self::GenerationError => "generation_error",
            Self::ReasoningFailure => "reasoning_failure",
            Self::LoopLimitExceeded => "loop_limit_exceeded",
            Self::ToolFailed => "tool_failed",
            Self::StorageError => "storage_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The failure a pipeline run ends with.
///
/// Steps return it, the engine records it on the context and stops, and the
/// caller-facing layer receives it unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Validation failed for {subject}: {}", join_violations(.violations))]
    Validation {
        subject: String,
        violations: Vec<Violation>,
    },

    #[error("Flow config failed schema validation: {}", join_violations(.violations))]
    Schema { violations: Vec<Violation> },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Config generation failed: {0}")]
    Generation(String),

    #[error("Reasoning stage failed: {0}")]
    Reasoning(String),

    #[error("Agent did not converge within {max_iterations} reasoning iterations")]
    LoopLimitExceeded { max_iterations: u32 },

    #[error("Tool {tool_name} failed: {reason}")]
    ToolFailed { tool_name: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// The stable kind of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::Schema { .. } => ErrorKind::SchemaError,
            Self::UnknownTool(_) => ErrorKind::UnknownToolError,
            Self::AgentNotFound(_) => ErrorKind::AgentNotFoundError,
            Self::Generation(_) => ErrorKind::GenerationError,
            Self::Reasoning(_) => ErrorKind::ReasoningFailure,
            Self::LoopLimitExceeded { .. } => ErrorKind::LoopLimitExceeded,
            Self::ToolFailed { .. } => ErrorKind::ToolFailed,
            Self::Storage(_) => ErrorKind::StorageError,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Violations carried by validation-style failures (empty otherwise).
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation { violations, .. } | Self::Schema { violations } => violations,
            _ => &[],
        }
    }

    /// A sentence suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::AgentNotFound(_) => {
                "I apologize, but the requested agent is not available.".into()
            }
            Self::LoopLimitExceeded { .. } => {
                "I've reached the maximum number of tool call iterations. Please provide further guidance.".into()
            }
            Self::Reasoning(_) | Self::Generation(_) => {
                "I apologize, but I couldn't reach the language model. Please try again.".into()
            }
            other => format!("I apologize, but I encountered an error: {other}"),
        }
    }
}

impl From<ToolError> for PipelineError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(name) => Self::UnknownTool(name),
            ToolError::InvalidArguments {
                tool_name,
                violations,
            } => Self::Validation {
                subject: format!("{tool_name} arguments"),
                violations,
            },
            ToolError::ExecutionFailed { tool_name, reason } => {
                Self::ToolFailed { tool_name, reason }
            }
            ToolError::AlreadyRegistered(name) => {
                Self::Internal(format!("tool registered twice: {name}"))
            }
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid arguments for {tool_name}: {}", join_violations(.violations))]
    InvalidArguments {
        tool_name: String,
        violations: Vec<Violation>,
    },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(String),

    #[error("Stored record {id} is unreadable: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
