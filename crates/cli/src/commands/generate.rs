//! `flowsmith generate`: description in, stored flow config out.

use anyhow::Context as _;

pub async fn run(description: &str, verbose: bool) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let orchestrator = super::orchestrator(&config, verbose)?;

    eprint!("  Generating...");
    let outcome = orchestrator.run_config_pipeline(description).await;
    eprint!("\r               \r");

    match outcome {
        Ok(generated) => {
            println!("✅ Saved flow '{}' as {}", generated.flow.name, generated.id);
            let json = serde_json::to_string_pretty(&generated.flow).context("Failed to render flow")?;
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            eprintln!("  [{}] {e}", e.kind());
            for violation in e.violations() {
                eprintln!("    - {violation}");
            }
            Err(e.into())
        }
    }
}
