//! Capability catalog: the explicit, process-wide list of capabilities
//! every action registry is selected from.
//!
//! The catalog is assembled once with [`CatalogBuilder`] before any agent is
//! built and is immutable afterwards, so a registry can never be built from
//! a half-populated catalog.

use std::collections::{BTreeMap, HashSet};

use crate::capability::CapabilityDescriptor;
use crate::error::RegistryError;

/// A capability together with the tags used to select it.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub descriptor: CapabilityDescriptor,
    pub tags: Vec<String>,
}

impl CatalogEntry {
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.tags.iter().any(|own| own == t.as_ref()))
    }
}

/// Collects capability descriptors before the catalog is frozen.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: Vec<CatalogEntry>,
    terminal: Option<CatalogEntry>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I, S>(mut self, descriptor: CapabilityDescriptor, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(CatalogEntry {
            descriptor,
            tags: tags.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Set the capability that is withheld from tag selection and only
    /// added to a registry on explicit request.
    pub fn designate_terminal<I, S>(mut self, descriptor: CapabilityDescriptor, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terminal = Some(CatalogEntry {
            descriptor,
            tags: tags.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn build(self) -> Result<CapabilityCatalog, RegistryError> {
        let mut seen = HashSet::new();
        for entry in self.entries.iter().chain(self.terminal.iter()) {
            if !seen.insert(entry.descriptor.name().to_string()) {
                return Err(RegistryError::DuplicateCapability(
                    entry.descriptor.name().to_string(),
                ));
            }
        }

        let mut tag_index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in self.entries.iter().chain(self.terminal.iter()) {
            for tag in &entry.tags {
                tag_index
                    .entry(tag.clone())
                    .or_default()
                    .push(entry.descriptor.name().to_string());
            }
        }

        tracing::debug!(
            capabilities = self.entries.len(),
            tags = tag_index.len(),
            terminal = self.terminal.is_some(),
            "Capability catalog built"
        );

        Ok(CapabilityCatalog {
            entries: self.entries,
            terminal: self.terminal,
            tag_index,
        })
    }
}

/// Immutable catalog with a tag index built once at construction.
#[derive(Debug)]
pub struct CapabilityCatalog {
    entries: Vec<CatalogEntry>,
    terminal: Option<CatalogEntry>,
    tag_index: BTreeMap<String, Vec<String>>,
}

impl CapabilityCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Entries eligible for tag selection (the designated terminal excluded).
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn terminal(&self) -> Option<&CatalogEntry> {
        self.terminal.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .chain(self.terminal.iter())
            .find(|e| e.descriptor.name() == name)
    }

    /// Capability names carrying `tag`, in registration order.
    pub fn names_for_tag(&self, tag: &str) -> &[String] {
        self.tag_index.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tags_of(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(|e| e.tags.as_slice())
    }

    /// Every known tag, sorted.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tag_index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.terminal.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
