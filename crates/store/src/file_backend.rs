//! File-based stores: one pretty-printed JSON document per record.
//!
//! Layout:
//! - agents: `<agents_dir>/<agent id>.json`
//! - flows: `<flows_dir>/<storage id>.json`
//!
//! Agents are loaded into memory on open and written through on every
//! mutation. Flows are read from disk on demand, since they are written once
//! and never updated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flowsmith_core::agent::{Agent, AgentStore};
use flowsmith_core::error::StoreError;
use flowsmith_core::flow::{FlowConfig, FlowStore, FlowSummary};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::agents::default_agents;
use crate::new_flow_id;

fn io_error(action: &str, path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io(format!("Failed to {action} {}: {e}", path.display()))
}

fn record_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.json"))
}

fn write_record<T: serde::Serialize>(dir: &Path, id: &str, record: &T) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir).map_err(|e| io_error("create directory", dir, e))?;
    let path = record_path(dir, id);
    let content = serde_json::to_string_pretty(record)?;
    std::fs::write(&path, content).map_err(|e| io_error("write", &path, e))
}

/// Every `*.json` file in `dir` as `(file stem, contents)`, sorted by stem.
/// A missing directory reads as empty.
fn read_records(dir: &Path) -> Result<Vec<(String, String)>, StoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error("read directory", dir, e)),
    };

    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => records.push((stem.to_string(), content)),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
        }
    }
    records.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(records)
}

/// A directory of agent records, cached in memory.
pub struct FileAgentStore {
    dir: PathBuf,
    agents: Arc<RwLock<BTreeMap<String, Agent>>>,
}

impl FileAgentStore {
    /// Open the store at `dir`, seeding the default agents if it holds none.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let mut agents = BTreeMap::new();
        for (id, content) in read_records(&dir)? {
            match serde_json::from_str::<Agent>(&content) {
                Ok(agent) => {
                    agents.insert(agent.id.clone(), agent);
                }
                Err(e) => warn!(id = %id, error = %e, "Skipping corrupted agent record"),
            }
        }

        if agents.is_empty() {
            for agent in default_agents() {
                write_record(&dir, &agent.id, &agent)?;
                agents.insert(agent.id.clone(), agent);
            }
            info!(dir = %dir.display(), count = agents.len(), "Seeded default agents");
        }

        debug!(dir = %dir.display(), count = agents.len(), "File agent store loaded");
        Ok(Self {
            dir,
            agents: Arc::new(RwLock::new(agents)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl AgentStore for FileAgentStore {
    async fn get(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(self.agents.read().await.values().cloned().collect())
    }

    async fn save(&self, mut agent: Agent) -> Result<Agent, StoreError> {
        agent.updated_at = Utc::now();
        let mut agents = self.agents.write().await;
        write_record(&self.dir, &agent.id, &agent)?;
        agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut agents = self.agents.write().await;
        if agents.remove(id).is_none() {
            return Ok(false);
        }
        let path = record_path(&self.dir, id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(io_error("remove", &path, e)),
        }
    }
}

/// A directory of flow config documents.
pub struct FileFlowStore {
    dir: PathBuf,
}

impl FileFlowStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl FlowStore for FileFlowStore {
    async fn save(&self, flow: &FlowConfig) -> Result<String, StoreError> {
        let id = new_flow_id(&flow.name, flow.created_at.unwrap_or_else(Utc::now));
        write_record(&self.dir, &id, flow)?;
        debug!(id = %id, "Flow config saved");
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<Option<FlowConfig>, StoreError> {
        // Storage ids never contain path separators
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Ok(None);
        }
        let path = record_path(&self.dir, id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read", &path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn list(&self) -> Result<Vec<FlowSummary>, StoreError> {
        let mut summaries = Vec::new();
        for (id, content) in read_records(&self.dir)? {
            match serde_json::from_str::<Value>(&content) {
                Ok(doc) => summaries.push(FlowSummary {
                    name: doc["name"].as_str().unwrap_or(&id).to_string(),
                    description: doc["description"].as_str().unwrap_or_default().to_string(),
                    created_at: doc["created_at"]
                        .as_str()
                        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                        .map(|t| t.with_timezone(&Utc)),
                    id,
                }),
                Err(e) => warn!(id = %id, error = %e, "Skipping corrupted flow record"),
            }
        }
        Ok(summaries)
    }
}
