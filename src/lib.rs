//! # tabula
//!
//! Data-driven attribute tables, runtime reflection, and JSON-driven object
//! construction for real-time applications.
//!
//! The pieces fit together like this: a [`Datum`] is a type-tagged cell
//! holding one or more homogeneous values, either owned or aliasing a
//! native [`Field`] of a live object. A [`Scope`] is an ordered,
//! hierarchical table of named cells. A [`TypeRegistry`] holds per-type
//! [`Signature`] lists (with single inheritance) and populates a reflected
//! object's table from them, aliasing cells onto the object's fields so
//! that data-driven writes land directly in native state. A
//! [`FactoryRegistry`] constructs registered types by name, and a
//! [`ParseCoordinator`] walks JSON documents through a handler chain to
//! build trees and instantiate objects.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tabula::{FactoryRegistry, ParseCoordinator, TypeRegistry};
//!
//! let mut parser = ParseCoordinator::new(
//!     Arc::new(TypeRegistry::new()),
//!     Arc::new(FactoryRegistry::new()),
//! );
//! let root = parser.parse(r#"{"Name": "Rex", "Steps": 3}"#)?;
//!
//! let table = root.borrow();
//! assert_eq!(table.find("Name").unwrap().get_string(0)?, "Rex");
//! assert_eq!(table.find("Steps").unwrap().get_integer(0)?, 3);
//! # Ok::<(), tabula::Error>(())
//! ```

pub mod error;
pub mod model;
pub mod parse;
pub mod reflect;
pub mod serialize;

pub use error::{Error, Result};
pub use model::{
    Datum, ExternalSlot, Field, FieldSlot, FieldValue, Mat4, OpaqueRef, Scope, ScopeHandle,
    Value, ValueKind, Vec4, SELF_ATTRIBUTE,
};
pub use parse::{
    Flow, ParseContext, ParseCoordinator, ParseHandler, UnknownKeyPolicy, MAX_DEPTH,
};
pub use reflect::{
    append_auxiliary, is_attribute, is_auxiliary_attribute, is_prescribed_attribute, Binding,
    CreateFn, FactoryRegistry, Reflected, Signature, TypeRegistry,
};
pub use serialize::{to_json, to_string_pretty};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
