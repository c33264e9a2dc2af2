//! `flowsmith flows`: list, inspect and save flow configs.

use std::path::PathBuf;

use anyhow::{bail, Context as _};
use clap::Subcommand;
use flowsmith_core::flow::FlowStore;
use flowsmith_workflow::FlowSaver;

#[derive(Subcommand)]
pub enum FlowsAction {
    /// List stored flows
    List,

    /// Print one flow as JSON
    Show {
        /// Flow id as printed by `flows list`
        id: String,
    },

    /// Validate a flow document from a JSON file and store it
    Save {
        /// Path to the JSON document
        file: PathBuf,
    },
}

pub async fn run(action: FlowsAction) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let store = super::flow_store(&config);

    match action {
        FlowsAction::List => {
            let flows = store.list().await?;
            if flows.is_empty() {
                println!("No flows yet. Create one with `flowsmith generate`.");
                return Ok(());
            }
            println!("{:<48} {:<28} CREATED", "ID", "NAME");
            for flow in flows {
                let created = flow
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into());
                println!("{:<48} {:<28} {created}", flow.id, flow.name);
            }
        }
        FlowsAction::Show { id } => {
            let Some(flow) = store.load(&id).await? else {
                bail!("Flow not found: {id}");
            };
            println!("{}", serde_json::to_string_pretty(&flow).context("Failed to render flow")?);
        }
        FlowsAction::Save { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let document: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;

            match FlowSaver::new(store).save(document).await {
                Ok(saved) => println!("✅ Saved flow '{}' as {}", saved.flow.name, saved.id),
                Err(e) => {
                    eprintln!("  [{}] {e}", e.kind());
                    for violation in e.violations() {
                        eprintln!("    - {violation}");
                    }
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
