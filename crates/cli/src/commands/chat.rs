//! `flowsmith chat`: interactive or single-message chat mode.

use std::io::Write;

use flowsmith_core::message::Message;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(agent: Option<String>, message: Option<String>, verbose: bool) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let orchestrator = super::orchestrator(&config, verbose)?;
    let agent = agent.as_deref();

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let outcome = orchestrator.run_chat_pipeline(agent, &msg, Vec::new()).await;
        eprint!("\r              \r");
        return match outcome {
            Ok(reply) => {
                println!("{}", reply.text);
                Ok(())
            }
            Err(e) => {
                println!("{}", e.user_message());
                Err(e.into())
            }
        };
    }

    println!();
    println!("  flowsmith chat: interactive mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Agent:     {}", agent.unwrap_or("default assistant"));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<Message> = Vec::new();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let outcome = orchestrator.run_chat_pipeline(agent, line, history.clone()).await;
        eprint!("\r     \r");

        match outcome {
            Ok(reply) => {
                println!();
                for text in reply.text.lines() {
                    println!("  Assistant > {text}");
                }
                println!();
                history = reply.history();
            }
            Err(e) => {
                eprintln!("  [{}] {e}", e.kind());
                println!("  Assistant > {}", e.user_message());
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}
