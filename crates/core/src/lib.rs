//! # Flowsmith Core
//!
//! Domain types, traits, and error definitions shared by every flowsmith crate.
//! Nothing here talks to the network or the filesystem; it defines the model
//! the other crates implement against.
//!
//! ## Layout
//!
//! - [`provider`]: the reasoning backend seam, injected into pipelines
//! - [`tool`]: tool contract plus the registry that validates arguments
//! - [`message`]: conversation turns
//! - [`agent`] / [`flow`]: stored records and their store traits
//! - [`error`]: [`PipelineError`], the one failure type callers see
//! - [`event`]: broadcast bus for observers

pub mod agent;
pub mod error;
pub mod event;
pub mod flow;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{slugify, Agent, AgentProfile, AgentStore};
pub use error::{ErrorKind, PipelineError, ProviderError, Result, StoreError, ToolError, Violation};
pub use event::{DomainEvent, EventBus};
pub use flow::{validate_flow_document, FlowConfig, FlowEdge, FlowNode, FlowStore, FlowSummary};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{ParamSpec, ParamType, Tool, ToolArguments, ToolCall, ToolRegistry, ToolResult};
