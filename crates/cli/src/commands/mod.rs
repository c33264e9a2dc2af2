//! Subcommand implementations and the wiring they share.

pub mod agents;
pub mod chat;
pub mod flows;
pub mod generate;
pub mod onboard;
pub mod tools;

use std::sync::Arc;

use anyhow::{bail, Context as _};
use flowsmith_config::AppConfig;
use flowsmith_core::event::EventBus;
use flowsmith_providers::{build_from_config, resolve_model};
use flowsmith_store::{FileAgentStore, FileFlowStore};
use flowsmith_workflow::{Collaborators, Orchestrator};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Load `~/.flowsmith/config.toml` plus environment overrides.
pub fn load_config() -> anyhow::Result<AppConfig> {
    AppConfig::load().context("Failed to load config")
}

pub fn agent_store(config: &AppConfig) -> anyhow::Result<Arc<FileAgentStore>> {
    let store = FileAgentStore::open(config.storage.agents_path())
        .with_context(|| format!("Failed to open agent store at {}", config.storage.agents_path().display()))?;
    Ok(Arc::new(store))
}

pub fn flow_store(config: &AppConfig) -> Arc<FileFlowStore> {
    Arc::new(FileFlowStore::new(config.storage.flows_path()))
}

/// Build an orchestrator over the file stores and the configured provider.
///
/// With `verbose`, domain events are logged at debug level as they happen.
pub fn orchestrator(config: &AppConfig, verbose: bool) -> anyhow::Result<Orchestrator> {
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY = 'sk-or-v1-...'   (recommended)");
        eprintln!("    OPENAI_API_KEY     = 'sk-...'         (for OpenAI direct)");
        eprintln!("    GOOGLE_API_KEY     = '...'            (for Gemini)");
        eprintln!("    FLOWSMITH_API_KEY  = '...'            (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("No API key found. See above for setup instructions.");
    }

    let router = build_from_config(config);
    let Some(provider) = router.default() else {
        bail!("Provider '{}' is not configured", config.default_provider);
    };
    let model = resolve_model(config, &config.default_provider);
    debug!(provider = %config.default_provider, model = %model, "Using provider");

    let event_bus = verbose.then(|| {
        let bus = Arc::new(EventBus::default());
        spawn_event_logger(&bus);
        bus
    });

    Ok(Orchestrator::new(
        config,
        Collaborators {
            provider,
            model,
            registry: Arc::new(flowsmith_tools::default_registry()),
            agents: agent_store(config)?,
            flows: flow_store(config),
            event_bus,
        },
    ))
}

fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(event = ?event, "Domain event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event logger fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
