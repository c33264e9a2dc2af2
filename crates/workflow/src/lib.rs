//! The two concrete pipelines flowsmith runs, and the orchestrator that
//! exposes them to callers.
//!
//! - **Config generation**: free-text description → draft flow config →
//!   schema validation → flow store. A document written elsewhere takes
//!   the same validation and storage path through [`FlowSaver`].
//! - **Chat**: message → prepared conversation → agent loop → reply text.
//!
//! Both are plain [`Pipeline`](flowsmith_pipeline::Pipeline)s, so a failure
//! in any step stops the run and reaches the caller with its kind intact.

pub mod chat_pipeline;
pub mod config_pipeline;
pub mod orchestrator;

pub use chat_pipeline::{chat_pipeline, ChatRequest, ExtractionStep, PreparationStep, EMPTY_REPLY_FALLBACK};
pub use config_pipeline::{config_pipeline, save_flow_pipeline, GenerationStep, PersistenceStep, ValidationStep};
pub use orchestrator::{ChatReply, Collaborators, FlowSaver, GeneratedFlow, Orchestrator};
