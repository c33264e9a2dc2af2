//! The pipeline engine.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use flowsmith_core::event::{DomainEvent, EventBus};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::step::Step;

/// An ordered, immutable sequence of steps.
///
/// Cloning is cheap and shares the step list. [`Pipeline::then`] returns a
/// new pipeline; the receiver keeps exactly the steps it had.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    steps: Arc<[Arc<dyn Step>]>,
    event_bus: Option<Arc<EventBus>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Arc<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            steps: steps.into(),
            event_bus: None,
        }
    }

    /// A pipeline with no steps.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Publish step events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// A new pipeline with `step` appended.
    pub fn then(&self, step: impl Step + 'static) -> Self {
        self.then_shared(Arc::new(step))
    }

    /// Like [`Pipeline::then`], for a step already behind an `Arc`.
    pub fn then_shared(&self, step: Arc<dyn Step>) -> Self {
        let mut steps: Vec<Arc<dyn Step>> = self.steps.iter().cloned().collect();
        steps.push(step);
        Self {
            name: self.name.clone(),
            steps: steps.into(),
            event_bus: self.event_bus.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run every step in order against a fresh context.
    ///
    /// Stops at the first failing step and records its error on the returned
    /// context. Never retries.
    pub async fn run(&self, input: Value) -> Context {
        let mut ctx = Context::new(input);
        let started = Instant::now();
        info!(pipeline = %self.name, steps = self.steps.len(), "Pipeline started");

        for step in self.steps.iter() {
            let step_started = Instant::now();
            let outcome = step.run(&mut ctx).await;
            let duration_ms = step_started.elapsed().as_millis() as u64;

            match outcome {
                Ok(()) => {
                    debug!(pipeline = %self.name, step = step.name(), duration_ms, "Step completed");
                    self.publish(DomainEvent::StepCompleted {
                        pipeline: self.name.clone(),
                        step: step.name().to_string(),
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    warn!(
                        pipeline = %self.name,
                        step = step.name(),
                        kind = %e.kind(),
                        error = %e,
                        "Step failed, stopping pipeline"
                    );
                    self.publish(DomainEvent::StepFailed {
                        pipeline: self.name.clone(),
                        step: step.name().to_string(),
                        kind: e.kind(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    ctx.fail(e);
                    break;
                }
            }
        }

        info!(
            pipeline = %self.name,
            failed = ctx.is_failed(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        ctx
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}
