//! `taskweave config`: show the effective configuration or write a default.

use taskweave_config::AppConfig;

pub fn run(init: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();

    if init {
        if config_path.exists() {
            println!("Config already exists at: {}", config_path.display());
            println!("Edit it manually or delete it and re-run `taskweave config --init`.");
            return Ok(());
        }
        std::fs::create_dir_all(AppConfig::config_dir())?;
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created {}", config_path.display());
        println!("Add your API key there or set TASKWEAVE_API_KEY.");
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("# {}", config_path.display());
    println!("{}", render(&config)?);
    Ok(())
}

/// TOML rendering with the API key masked.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.provider.api_key.is_some() {
        shown.provider.api_key = Some("***".into());
    }
    toml::to_string_pretty(&shown)
}
