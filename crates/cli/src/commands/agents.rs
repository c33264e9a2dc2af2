//! `flowsmith agents`: manage agents and their flow assignments.

use anyhow::bail;
use clap::Subcommand;
use flowsmith_core::agent::AgentStore;
use flowsmith_store::{agent_flows, assign_flow, create_agent, remove_flow};

#[derive(Subcommand)]
pub enum AgentsAction {
    /// List all agents
    List,

    /// Show one agent with its assigned flows
    Show { id: String },

    /// Create an agent; its id is derived from the name
    Create {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// System prompt (defaults to the configured default prompt)
        #[arg(long)]
        prompt: Option<String>,

        /// Comma-separated tool names
        #[arg(long, value_delimiter = ',')]
        tools: Vec<String>,
    },

    /// Delete an agent
    Delete { id: String },

    /// Assign a stored flow to an agent
    AssignFlow { agent: String, flow: String },

    /// Remove a flow from an agent
    RemoveFlow { agent: String, flow: String },
}

pub async fn run(action: AgentsAction) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let store = super::agent_store(&config)?;

    match action {
        AgentsAction::List => {
            println!("{:<24} {:<24} {:<7} TOOLS", "ID", "NAME", "ACTIVE");
            for agent in store.list().await? {
                println!(
                    "{:<24} {:<24} {:<7} {}",
                    agent.id,
                    agent.name,
                    if agent.active { "yes" } else { "no" },
                    agent.tools.join(", ")
                );
            }
        }
        AgentsAction::Show { id } => {
            let Some(agent) = store.get(&id).await? else {
                bail!("Agent not found: {id}");
            };
            println!("{} ({})", agent.name, agent.id);
            println!("  {}", agent.description);
            println!("  Active:  {}", agent.active);
            println!("  Tools:   {}", agent.tools.join(", "));
            println!("  Updated: {}", agent.updated_at.format("%Y-%m-%d %H:%M"));
            println!("\n  System prompt:\n{}\n", agent.system_prompt);

            let flows = agent_flows(&agent, super::flow_store(&config).as_ref()).await?;
            println!("  Flows ({} of {} assigned found):", flows.len(), agent.flows.len());
            for (flow_id, flow) in flows {
                println!("    - {flow_id}: {}", flow.name);
            }
        }
        AgentsAction::Create {
            name,
            description,
            prompt,
            tools,
        } => {
            let registry = flowsmith_tools::default_registry();
            let tools: Vec<String> = tools
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            for tool in tools.iter().filter(|t| !registry.contains(t)) {
                eprintln!("⚠️  '{tool}' is not a registered tool; it will not be offered");
            }
            let prompt = prompt.unwrap_or_else(|| config.agent.default_system_prompt.clone());
            let agent = create_agent(store.as_ref(), &name, &description, &prompt, tools).await?;
            println!("✅ Created agent {}", agent.id);
        }
        AgentsAction::Delete { id } => {
            if store.delete(&id).await? {
                println!("✅ Deleted agent {id}");
            } else {
                bail!("Agent not found: {id}");
            }
        }
        AgentsAction::AssignFlow { agent, flow } => {
            if assign_flow(store.as_ref(), &agent, &flow).await? {
                println!("✅ Assigned {flow} to {agent}");
            } else {
                println!("  {flow} was already assigned to {agent}");
            }
        }
        AgentsAction::RemoveFlow { agent, flow } => {
            if remove_flow(store.as_ref(), &agent, &flow).await? {
                println!("✅ Removed {flow} from {agent}");
            } else {
                println!("  {flow} was not assigned to {agent}");
            }
        }
    }

    Ok(())
}
