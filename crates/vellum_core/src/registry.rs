//! Field-group definition registry seam.

use crate::types::DefinitionId;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;

/// Read-only view of the field-group definitions that currently exist.
///
/// Definitions are owned elsewhere; the core only asks whether one still
/// exists when restoring historical content.
pub trait DefinitionRegistry: Send + Sync + fmt::Debug {
    /// Returns true if the definition has not been deleted.
    fn exists(&self, definition: DefinitionId) -> bool;
}

/// A definition registry kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryDefinitions {
    defined: RwLock<HashSet<DefinitionId>>,
}

impl InMemoryDefinitions {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the given definitions.
    #[must_use]
    pub fn with_definitions(definitions: impl IntoIterator<Item = DefinitionId>) -> Self {
        Self {
            defined: RwLock::new(definitions.into_iter().collect()),
        }
    }

    /// Registers a definition.
    pub fn define(&self, definition: DefinitionId) {
        self.defined.write().insert(definition);
    }

    /// Permanently deletes a definition. Returns false if it was unknown.
    pub fn remove(&self, definition: DefinitionId) -> bool {
        self.defined.write().remove(&definition)
    }

    /// Returns the number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defined.read().len()
    }

    /// Returns true if no definitions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defined.read().is_empty()
    }
}

impl DefinitionRegistry for InMemoryDefinitions {
    fn exists(&self, definition: DefinitionId) -> bool {
        self.defined.read().contains(&definition)
    }
}
