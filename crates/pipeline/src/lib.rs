//! Step pipelines: the execution engine both flowsmith pipelines run on.
//!
//! A [`Pipeline`] is an ordered, immutable list of [`Step`]s sharing one
//! mutable [`Context`]. Steps run left to right; the first failure is
//! recorded on the context and nothing after it runs.

pub mod context;
pub mod pipeline;
pub mod step;

pub use context::Context;
pub use pipeline::Pipeline;
pub use step::{FnStep, Step};
