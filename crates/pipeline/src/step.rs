//! The Step contract.

use async_trait::async_trait;
use flowsmith_core::error::Result;

use crate::context::Context;

/// One named stage of a pipeline.
///
/// Steps hold no per-run state; the same instance may serve many runs at
/// once. Everything a run needs lives in the [`Context`].
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Read from and write to `ctx`. An `Err` stops the pipeline.
    async fn run(&self, ctx: &mut Context) -> Result<()>;
}

/// A synchronous step built from a closure.
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut Context) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&mut Context) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut Context) -> Result<()> {
        (self.f)(ctx)
    }
}
