//! `taskweave agents`: list configured agents and their capabilities.

use std::sync::Arc;

use taskweave_config::AppConfig;
use taskweave_core::event::EventBus;

use crate::runtime::{build_catalog, selection_for};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let catalog = build_catalog(&Arc::new(EventBus::default()))?;

    println!("Configured agents ({}):", config.agents.len());
    for def in &config.agents {
        let actions = selection_for(def).select(&catalog)?;

        println!();
        println!("  {}", def.name);
        if !def.description.is_empty() {
            println!("    {}", def.description);
        }
        println!("    Tags:           {}", def.tags.join(", "));
        if !def.tools.is_empty() {
            println!("    Tools:          {}", def.tools.join(", "));
        }
        println!("    Capabilities:   {}", actions.names().join(", "));
        println!("    Max iterations: {}", config.max_iterations_for(def));
        for goal in &def.goals {
            println!("    Goal [{}] {}", goal.priority, goal.name);
        }
    }

    Ok(())
}
