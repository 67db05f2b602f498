//! The object model: typed cells, native field aliases, and attribute tables

pub mod datum;
pub mod field;
pub mod scope;

pub use datum::{Datum, Mat4, OpaqueRef, Value, ValueKind, Vec4};
pub use field::{ExternalSlot, Field, FieldSlot, FieldValue};
pub use scope::{Scope, ScopeHandle, SELF_ATTRIBUTE};
