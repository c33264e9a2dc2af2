//! flowsmith CLI: the main entry point.
//!
//! Commands:
//! - `onboard`   Write a starter config and data directories
//! - `generate`  Turn a workflow description into a stored flow config
//! - `chat`      Interactive or single-message chat with an agent
//! - `flows`     List, inspect and save flow configs
//! - `agents`    Manage agents and their flow assignments
//! - `tools`     List the tools agents can call

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "flowsmith",
    about = "flowsmith: workflow configs and tool-calling agents from plain language",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and data directories
    Onboard,

    /// Generate a flow config from a natural-language description
    Generate {
        /// What the workflow should do
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },

    /// Chat with an agent
    Chat {
        /// Agent id (defaults to the built-in assistant)
        #[arg(short, long)]
        agent: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Inspect and save flow configs
    Flows {
        #[command(subcommand)]
        action: commands::flows::FlowsAction,
    },

    /// Manage agents
    Agents {
        #[command(subcommand)]
        action: commands::agents::AgentsAction,
    },

    /// List registered tools
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run()?,
        Commands::Generate { description } => {
            commands::generate::run(&description.join(" "), cli.verbose).await?
        }
        Commands::Chat { agent, message } => commands::chat::run(agent, message, cli.verbose).await?,
        Commands::Flows { action } => commands::flows::run(action).await?,
        Commands::Agents { action } => commands::agents::run(action).await?,
        Commands::Tools => commands::tools::run(),
    }

    Ok(())
}
