//! Action registry: the capabilities exposed to one agent instance.
//!
//! A registry is selected from a [`CapabilityCatalog`] once, when the agent
//! is built, and handed to the agent by value; nothing mutates it after
//! that.

use std::collections::HashMap;

use crate::capability::CapabilityDescriptor;
use crate::catalog::CapabilityCatalog;
use crate::error::RegistryError;

/// Name-keyed set of capabilities, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: Vec<CapabilityDescriptor>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select every catalog entry whose tags intersect `tags`.
    ///
    /// The catalog's designated terminal capability is never selected here;
    /// see [`ActionRegistry::register_terminal`].
    pub fn from_catalog<S: AsRef<str>>(catalog: &CapabilityCatalog, tags: &[S]) -> Self {
        let mut registry = Self::new();
        for entry in catalog.entries() {
            if entry.has_any_tag(tags) {
                registry.register(entry.descriptor.clone());
            }
        }
        registry
    }

    /// Register a capability. Replaces any existing capability with the same name.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) {
        let name = descriptor.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.actions[pos] = descriptor,
            None => {
                self.index.insert(name, self.actions.len());
                self.actions.push(descriptor);
            }
        }
    }

    /// Opt in to the catalog's designated terminal capability.
    pub fn register_terminal(&mut self, catalog: &CapabilityCatalog) -> Result<(), RegistryError> {
        let entry = catalog.terminal().ok_or(RegistryError::MissingTerminal)?;
        self.register(entry.descriptor.clone());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.index.get(name).map(|&pos| &self.actions[pos])
    }

    /// All capabilities in registration order.
    pub fn list(&self) -> &[CapabilityDescriptor] {
        &self.actions
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(CapabilityDescriptor::name).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Declarative registry selection: tags, an optional name allow-list and
/// the terminal opt-in.
#[derive(Debug, Clone, Default)]
pub struct RegistrySelection {
    tags: Vec<String>,
    names: Vec<String>,
    include_terminal: bool,
}

impl RegistrySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Select by name. Combined with tags, a capability has to match both.
    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn include_terminal(mut self) -> Self {
        self.include_terminal = true;
        self
    }

    pub fn select(&self, catalog: &CapabilityCatalog) -> Result<ActionRegistry, RegistryError> {
        let mut registry = ActionRegistry::new();
        // No tags and no names selects nothing.
        if !self.tags.is_empty() || !self.names.is_empty() {
            for entry in catalog.entries() {
                if !self.tags.is_empty() && !entry.has_any_tag(&self.tags) {
                    continue;
                }
                if !self.names.is_empty()
                    && !self.names.iter().any(|n| n == entry.descriptor.name())
                {
                    continue;
                }
                registry.register(entry.descriptor.clone());
            }
        }
        if self.include_terminal {
            registry.register_terminal(catalog)?;
        }
        Ok(registry)
    }
}
