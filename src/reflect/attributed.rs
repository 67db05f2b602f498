//! The trait reflected objects implement, plus attribute classification
//! helpers.

use std::any::Any;

use crate::error::{Error, Result};
use crate::model::field::ExternalSlot;
use crate::model::scope::{ScopeHandle, SELF_ATTRIBUTE};
use crate::reflect::signature::TypeRegistry;

/// An object whose native fields are published through an attribute table.
///
/// Implementors own a [`ScopeHandle`] and a set of `Field<T>` members, and
/// answer [`field_slot`](Reflected::field_slot) lookups so that
/// [`TypeRegistry::populate`] can alias the table's cells onto those fields.
/// A derived type answers for its inherited attribute names as well as its
/// own.
pub trait Reflected: Any {
    /// The registered name of this object's type
    fn type_name(&self) -> &str;

    /// This object's attribute table
    fn attributes(&self) -> &ScopeHandle;

    /// An alias onto the native field backing the named attribute, or
    /// `None` when no field carries that name
    fn field_slot(&self, name: &str) -> Option<ExternalSlot>;

    /// Upcast for callers that need to downcast to the concrete type
    fn as_any(&self) -> &dyn Any;
}

/// Whether `key` names any attribute of `object`, prescribed or auxiliary
pub fn is_attribute(object: &dyn Reflected, key: &str) -> bool {
    object.attributes().borrow().contains_key(key)
}

/// Whether `key` is declared by the object's type (or an ancestor). The
/// reserved self attribute counts as prescribed.
pub fn is_prescribed_attribute(
    registry: &TypeRegistry,
    object: &dyn Reflected,
    key: &str,
) -> bool {
    registry.is_prescribed(object.type_name(), key)
}

/// Whether `key` names an attribute added at runtime rather than declared
/// by the type
pub fn is_auxiliary_attribute(
    registry: &TypeRegistry,
    object: &dyn Reflected,
    key: &str,
) -> bool {
    is_attribute(object, key) && !is_prescribed_attribute(registry, object, key)
}

/// Adds an empty auxiliary cell named `key` to the object's table.
/// Idempotent for an existing auxiliary key; rejects prescribed names,
/// since overwriting one would detach it from the object's native fields.
pub fn append_auxiliary(
    registry: &TypeRegistry,
    object: &dyn Reflected,
    key: &str,
) -> Result<()> {
    if key == SELF_ATTRIBUTE || is_prescribed_attribute(registry, object, key) {
        return Err(Error::PrescribedAttribute {
            key: key.to_string(),
        });
    }
    object.attributes().borrow_mut().append(key)?;
    Ok(())
}
