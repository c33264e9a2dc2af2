//! `flowsmith onboard`: first-time setup.

use flowsmith_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let storage = AppConfig::default().storage;

    println!("flowsmith: first-time setup");
    println!("===========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    for dir in [storage.flows_path(), storage.agents_path()] {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            println!("✅ Created {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your API key", config_path.display());
        println!("   2. Run: flowsmith generate \"describe your workflow\"");
        println!("   3. Run: flowsmith chat --agent banking_assistant\n");
    }

    Ok(())
}
