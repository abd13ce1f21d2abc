//! `provost init` — Write a starter config file.

use provost_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Provost — first-time setup");
    println!();

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete it and re-run init.");
        println!();
        return Ok(());
    }

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  Created config.toml at: {}", config_path.display());
    println!();
    println!("  Next steps:");
    println!("    1. Add your API key to the config file,");
    println!("       or set PROVOST_API_KEY / OPENAI_API_KEY");
    println!("    2. Run: provost query \"Create a Computer Science program with code CS\"");
    println!();

    Ok(())
}
