//! `genbi config`: configuration management commands.

use genbi_config::AppConfig;

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{config:#?}");
    Ok(())
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set GENBI_API_KEY or OPENAI_API_KEY)");
            }
            if config.charts.renderer_command.is_empty() {
                warnings.push("No chart renderer configured; charts are disabled");
            }
            if config.agent.turn_timeout_secs.is_none() {
                warnings.push("No turn timeout set; a stuck turn runs forever");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Model:     {}", config.default_model);
            println!("   Endpoint:  {}", config.api_url);
            println!("   Dialect:   {}", config.database.dialect_name());
            println!("   Artifacts: {} max", config.artifacts.max_entries);
            Ok(())
        }
        Err(e) => {
            println!("   Config error: {e}");
            Err(e.into())
        }
    }
}

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
