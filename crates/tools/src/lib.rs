//! Built-in capabilities for taskweave.
//!
//! - `terminate`: the designated terminal capability (tag `system`)
//! - `echo`: returns its input, handy for wiring checks (tag `debug`)
//! - `list_agents`: describes the agents available for delegation (tag `agents`)
//!
//! Domain capabilities are registered next to these by whoever assembles
//! the catalog.

pub mod echo;
pub mod list_agents;
pub mod terminate;

use taskweave_core::catalog::{CapabilityCatalog, CatalogBuilder};
use taskweave_core::error::RegistryError;

/// Add every built-in capability to `builder`, designating `terminate` as
/// the terminal capability.
pub fn register_builtins(builder: CatalogBuilder) -> Result<CatalogBuilder, RegistryError> {
    Ok(builder
        .register(echo::echo()?, ["debug"])
        .register(list_agents::list_agents()?, ["agents"])
        .designate_terminal(terminate::terminate()?, ["system"]))
}

/// A catalog holding only the built-in capabilities.
pub fn builtin_catalog() -> Result<CapabilityCatalog, RegistryError> {
    register_builtins(CatalogBuilder::new())?.build()
}
