//! Per-type attribute signatures and the registry that resolves them.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::datum::{OpaqueRef, ValueKind};
use crate::model::scope::{Scope, SELF_ATTRIBUTE};
use crate::reflect::attributed::Reflected;

/// How a prescribed attribute's storage relates to the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The cell aliases a native field of the object
    External,
    /// The cell owns nested child tables
    Nested,
}

/// One prescribed attribute of a type: name, kind, element count, and how
/// it binds to the object
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub kind: ValueKind,
    pub count: usize,
    pub binding: Binding,
}

impl Signature {
    /// An attribute aliasing a native field of `kind` with `count` elements
    pub fn external(name: impl Into<String>, kind: ValueKind, count: usize) -> Signature {
        Signature {
            name: name.into(),
            kind,
            count,
            binding: Binding::External,
        }
    }

    /// An attribute owning `count` nested child tables
    pub fn nested(name: impl Into<String>, count: usize) -> Signature {
        Signature {
            name: name.into(),
            kind: ValueKind::Table,
            count,
            binding: Binding::Nested,
        }
    }
}

#[derive(Debug)]
struct TypeInfo {
    signatures: Vec<Signature>,
    parent: Option<String>,
}

/// Registry of per-type signature lists with single inheritance.
///
/// A type's effective signatures are its ancestors' lists followed by its
/// own, resolved lazily and cached. Resolution freezes the type and its
/// ancestors: once instances may exist, changing a layout would silently
/// desynchronize them, so mutation of frozen types is refused.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeInfo>,
    resolved: RwLock<HashMap<String, Arc<[Signature]>>>,
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        TypeRegistry::default()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Whether `name` has been resolved and is therefore immutable
    pub fn is_frozen(&self, name: &str) -> bool {
        self.resolved.read().contains_key(name)
    }

    /// Registers `name` with its own signatures and an optional parent
    /// type. The parent need not be registered yet; it is checked at
    /// resolution time.
    pub fn add_type(
        &mut self,
        name: impl Into<String>,
        signatures: Vec<Signature>,
        parent: Option<&str>,
    ) -> Result<()> {
        let name = name.into();
        if self.types.contains_key(&name) {
            return Err(Error::DuplicateRegistration { name });
        }
        if self.is_frozen(&name) {
            return Err(Error::SignaturesFrozen { name });
        }
        if parent == Some(name.as_str()) {
            return Err(Error::CycleDetected {
                reason: format!("type '{}' cannot be its own parent", name),
            });
        }
        debug!(type_name = %name, count = signatures.len(), "registering type");
        self.types.insert(
            name,
            TypeInfo {
                signatures,
                parent: parent.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Unregisters `name`. Refused once the type is frozen.
    pub fn remove_type(&mut self, name: &str) -> Result<()> {
        if self.is_frozen(name) {
            return Err(Error::SignaturesFrozen {
                name: name.to_string(),
            });
        }
        if self.types.remove(name).is_none() {
            return Err(Error::UnknownType {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// The effective signature list for `name`: ancestors first, then the
    /// type's own. Resolving freezes `name` and every ancestor.
    pub fn signatures(&self, name: &str) -> Result<Arc<[Signature]>> {
        let mut visiting = Vec::new();
        self.resolve(name, &mut visiting)
    }

    fn resolve(&self, name: &str, visiting: &mut Vec<String>) -> Result<Arc<[Signature]>> {
        if let Some(cached) = self.resolved.read().get(name) {
            return Ok(Arc::clone(cached));
        }
        if visiting.iter().any(|n| n == name) {
            return Err(Error::CycleDetected {
                reason: format!("type '{}' appears in its own ancestor chain", name),
            });
        }
        let info = self.types.get(name).ok_or_else(|| Error::UnknownType {
            name: name.to_string(),
        })?;

        visiting.push(name.to_string());
        let mut list = match &info.parent {
            Some(parent) => self.resolve(parent, visiting)?.to_vec(),
            None => Vec::new(),
        };
        visiting.pop();

        list.extend(info.signatures.iter().cloned());
        let resolved: Arc<[Signature]> = list.into();
        self.resolved
            .write()
            .insert(name.to_string(), Arc::clone(&resolved));
        debug!(type_name = name, attributes = resolved.len(), "resolved signatures");
        Ok(resolved)
    }

    /// Whether `key` is prescribed for `type_name`. The reserved self
    /// attribute is prescribed for every type.
    pub fn is_prescribed(&self, type_name: &str, key: &str) -> bool {
        if key == SELF_ATTRIBUTE {
            return true;
        }
        match self.signatures(type_name) {
            Ok(signatures) => signatures.iter().any(|s| s.name == key),
            Err(_) => false,
        }
    }

    /// Builds the object's prescribed attributes into its table.
    ///
    /// The reserved self attribute comes first, holding an opaque handle to
    /// the table itself. Each external signature is then bound to the
    /// object's matching native field, and each nested signature gets its
    /// child tables appended. Safe to call again on a copied object: cells
    /// re-alias onto the copy's own fields.
    pub fn populate(&self, object: &dyn Reflected) -> Result<()> {
        let signatures = self.signatures(object.type_name())?;
        let scope = object.attributes();

        {
            let mut table = scope.borrow_mut();
            let datum = table.append(SELF_ATTRIBUTE)?;
            datum.set_kind(ValueKind::Pointer)?;
            datum.set(OpaqueRef::new(Rc::clone(scope)), 0)?;
        }

        for signature in signatures.iter() {
            match signature.binding {
                Binding::External => {
                    let slot = object.field_slot(&signature.name).ok_or_else(|| {
                        Error::BindingFailed {
                            type_name: object.type_name().to_string(),
                            attribute: signature.name.clone(),
                        }
                    })?;
                    if slot.kind() != signature.kind {
                        return Err(Error::mismatch(
                            signature.kind.name(),
                            slot.kind().name(),
                        ));
                    }
                    if slot.len() != signature.count {
                        return Err(Error::BindingMismatch {
                            attribute: signature.name.clone(),
                            expected: signature.count,
                            got: slot.len(),
                        });
                    }
                    let mut table = scope.borrow_mut();
                    let datum = table.append(&signature.name)?;
                    datum.set_storage(slot)?;
                }
                Binding::Nested => {
                    let existing = scope
                        .borrow()
                        .find(&signature.name)
                        .map(|d| d.len())
                        .unwrap_or(0);
                    for _ in existing..signature.count {
                        Scope::append_scope(scope, &signature.name)?;
                    }
                }
            }
        }

        debug!(type_name = object.type_name(), "populated attribute table");
        Ok(())
    }

    /// Deep-copies every auxiliary attribute of `source` into `target`'s
    /// table. Prescribed attributes and the self entry are left alone.
    pub fn copy_auxiliary(&self, source: &dyn Reflected, target: &dyn Reflected) -> Result<()> {
        let source_scope = source.attributes();
        let target_scope = target.attributes();
        if Rc::ptr_eq(source_scope, target_scope) {
            return Ok(());
        }

        let src = source_scope.borrow();
        let mut dst = target_scope.borrow_mut();
        for (key, datum) in src.iter() {
            if self.is_prescribed(source.type_name(), key) {
                continue;
            }
            *dst.append(key)? = datum.deep_clone(target_scope);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(names: &[&str]) -> Vec<Signature> {
        names
            .iter()
            .map(|n| Signature::external(*n, ValueKind::Integer, 1))
            .collect()
    }

    #[test]
    fn test_add_and_remove() {
        let mut registry = TypeRegistry::new();
        registry.add_type("Monster", flat(&["Health"]), None).unwrap();

        assert!(registry.contains("Monster"));
        assert!(matches!(
            registry.add_type("Monster", flat(&[]), None),
            Err(Error::DuplicateRegistration { .. })
        ));

        registry.remove_type("Monster").unwrap();
        assert!(matches!(
            registry.remove_type("Monster"),
            Err(Error::UnknownType { .. })
        ));
    }

    #[test]
    fn test_inheritance_concatenates_parent_first() {
        let mut registry = TypeRegistry::new();
        registry.add_type("Base", flat(&["A", "B"]), None).unwrap();
        registry.add_type("Derived", flat(&["C"]), Some("Base")).unwrap();

        let signatures = registry.signatures("Derived").unwrap();
        let names: Vec<_> = signatures.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn test_resolution_freezes_ancestors() {
        let mut registry = TypeRegistry::new();
        registry.add_type("Base", flat(&["A"]), None).unwrap();
        registry.add_type("Derived", flat(&["B"]), Some("Base")).unwrap();

        registry.signatures("Derived").unwrap();
        assert!(registry.is_frozen("Derived"));
        assert!(registry.is_frozen("Base"));

        assert!(matches!(
            registry.remove_type("Base"),
            Err(Error::SignaturesFrozen { .. })
        ));
        // unfrozen siblings can still be removed
        registry.add_type("Other", flat(&[]), None).unwrap();
        registry.remove_type("Other").unwrap();
    }

    #[test]
    fn test_ancestor_cycle_detected() {
        let mut registry = TypeRegistry::new();
        registry.add_type("A", flat(&[]), Some("B")).unwrap();
        registry.add_type("B", flat(&[]), Some("A")).unwrap();

        assert!(matches!(
            registry.signatures("A"),
            Err(Error::CycleDetected { .. })
        ));
        assert!(matches!(
            registry.add_type("C", flat(&[]), Some("C")).unwrap_err(),
            Error::CycleDetected { .. }
        ));
    }

    #[test]
    fn test_unknown_parent_surfaces_at_resolution() {
        let mut registry = TypeRegistry::new();
        registry.add_type("Orphaned", flat(&[]), Some("Missing")).unwrap();
        assert!(matches!(
            registry.signatures("Orphaned"),
            Err(Error::UnknownType { .. })
        ));
    }

    #[test]
    fn test_is_prescribed() {
        let mut registry = TypeRegistry::new();
        registry.add_type("Monster", flat(&["Health"]), None).unwrap();

        assert!(registry.is_prescribed("Monster", "Health"));
        assert!(registry.is_prescribed("Monster", SELF_ATTRIBUTE));
        assert!(!registry.is_prescribed("Monster", "Nickname"));
        assert!(!registry.is_prescribed("Unregistered", "Health"));
    }
}
