//! Immutable, order-preserving pass registries
//!
//! A registry is an explicit value handed to the stack builder; there is
//! no process-wide default. "Configuring" the engine means building a new
//! registry, never mutating a shared one.

use crate::error::ValidationError;
use crate::factory::PassFactory;
use indexmap::IndexMap;

/// Named pass factories in insertion order
pub struct PassRegistry<O, S> {
    factories: IndexMap<String, PassFactory<O, S>>,
}

impl<O, S> PassRegistry<O, S> {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Adds a factory; a second factory under an existing name is a
    /// collision, never a silent override
    pub fn register(&mut self, factory: PassFactory<O, S>) -> Result<(), ValidationError> {
        let name = factory.name().to_owned();
        if self.factories.contains_key(&name) {
            return Err(ValidationError::Collision { name });
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Looks up a factory by name
    pub fn get(&self, name: &str) -> Option<&PassFactory<O, S>> {
        self.factories.get(name)
    }

    /// Whether a factory is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Iterates factories in registration order
    pub fn iter(&self) -> impl Iterator<Item = &PassFactory<O, S>> {
        self.factories.values()
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<O, S> Default for PassRegistry<O, S> {
    fn default() -> Self {
        Self::new()
    }
}
