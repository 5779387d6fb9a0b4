//! `taskweave tools`: list the capability catalog.

use std::sync::Arc;

use taskweave_core::event::EventBus;

use crate::runtime::build_catalog;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = build_catalog(&Arc::new(EventBus::default()))?;

    let entries = catalog.entries().iter().chain(catalog.terminal());
    println!("Capabilities ({}):", catalog.len());
    for entry in entries {
        let d = &entry.descriptor;
        let marker = if d.is_terminal() { " (terminal)" } else { "" };
        println!();
        println!("  {}{marker}", d.name());
        println!("    {}", d.description());
        println!("    Tags:       {}", entry.tags.join(", "));
        println!("    Parameters: {}", d.parameters());
    }

    Ok(())
}
