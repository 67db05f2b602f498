//! Name-keyed construction of reflected objects.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::reflect::attributed::Reflected;
use crate::reflect::signature::TypeRegistry;

/// Constructor for one concrete reflected type. Takes the type registry so
/// the fresh object can populate its own attribute table.
pub type CreateFn = fn(&TypeRegistry) -> Result<Box<dyn Reflected>>;

/// Maps registered type names to constructors, so documents can name the
/// concrete types they instantiate.
///
/// Registration is explicit: each concrete type is registered by the caller
/// at startup rather than through static initializers, keeping construction
/// order visible.
#[derive(Debug, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, CreateFn>,
}

impl FactoryRegistry {
    pub fn new() -> FactoryRegistry {
        FactoryRegistry::default()
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no factories are registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Whether `name` has a registered factory
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registers a constructor under `name`
    pub fn register(&mut self, name: impl Into<String>, create: CreateFn) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::DuplicateRegistration { name });
        }
        debug!(type_name = %name, "registering factory");
        self.factories.insert(name, create);
        Ok(())
    }

    /// Removes the constructor for `name`, reporting whether one existed
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    /// Constructs a fresh instance of the type registered under `name`
    pub fn create(&self, name: &str, types: &TypeRegistry) -> Result<Box<dyn Reflected>> {
        let create = self.factories.get(name).ok_or_else(|| Error::UnknownType {
            name: name.to_string(),
        })?;
        debug!(type_name = name, "creating instance");
        create(types)
    }
}
