//! The per-run record threaded through a pipeline.

use std::collections::HashMap;

use flowsmith_core::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Mutable state for one pipeline run.
///
/// Owned by the run that created it. Steps communicate through `data`,
/// keyed by names the steps agree on.
#[derive(Debug, Clone)]
pub struct Context {
    /// Payload the run was started with
    pub input: Value,
    data: HashMap<String, Value>,
    error: Option<PipelineError>,
    finished: bool,
}

impl Context {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            data: HashMap::new(),
            error: None,
            finished: false,
        }
    }

    /// Store a value under `key`, replacing any previous one.
    pub fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| PipelineError::Internal(format!("context key '{key}' is not serializable: {e}")))?;
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    /// Read `key` as `T`. `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    PipelineError::Internal(format!("context key '{key}' has an unexpected shape: {e}"))
                })
            })
            .transpose()
    }

    /// Read `key` as `T`, failing if an earlier step did not set it.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)?
            .ok_or_else(|| PipelineError::Internal(format!("context key '{key}' was never set")))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Keys currently set, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.data.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// The failure that stopped the run, if any.
    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn fail(&mut self, error: PipelineError) {
        self.error = Some(error);
    }

    /// Whether an agent loop in this run reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// `Ok(self)` for a clean run, the recorded failure otherwise.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Draft {
        id: String,
        nodes: u32,
    }

    #[test]
    fn typed_values_roundtrip() {
        let mut ctx = Context::new(json!("describe a flow"));
        ctx.insert("draft", &Draft { id: "x".into(), nodes: 2 }).unwrap();
        let draft: Draft = ctx.require("draft").unwrap();
        assert_eq!(draft, Draft { id: "x".into(), nodes: 2 });
        assert_eq!(ctx.keys(), vec!["draft"]);
    }

    #[test]
    fn missing_and_misshapen_keys() {
        let mut ctx = Context::new(Value::Null);
        assert!(ctx.get::<String>("absent").unwrap().is_none());
        assert_eq!(
            ctx.require::<String>("absent").unwrap_err().kind(),
            flowsmith_core::ErrorKind::InternalError
        );

        ctx.insert("count", &3).unwrap();
        assert!(ctx.get::<String>("count").is_err());
    }

    #[test]
    fn fresh_context_is_clean() {
        let ctx = Context::new(json!({"message": "hi"}));
        assert!(!ctx.is_failed());
        assert!(!ctx.is_finished());
        assert!(ctx.into_result().is_ok());
    }
}
