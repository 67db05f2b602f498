//! Error types for the tabula attribute system

use thiserror::Error;

/// Errors surfaced by cells, tables, registries, and the parse pipeline
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Cell errors
    /// Writing or reading a cell with the wrong kind
    ///
    /// **Triggered by:** pushing a string into an integer cell, reading a
    /// float out of a string cell, and similar kind conflicts
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected kind or shape
        expected: String,
        /// Actual kind or shape
        got: String,
    },

    /// Attempting to change the kind of an already-typed cell
    ///
    /// A cell's kind is fixed at first assignment and never changes for the
    /// life of the cell.
    #[error("Type locked: cell is {current}, cannot become {requested}")]
    TypeLocked {
        /// The kind the cell is locked to
        current: String,
        /// The kind that was requested
        requested: String,
    },

    /// Element access beyond the populated range of a cell
    #[error("Index out of range: {index} for cell of length {length}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Cell length
        length: usize,
    },

    /// Growing, resizing, or re-aliasing a cell in a way external storage
    /// forbids, or aliasing onto a populated owned cell
    #[error("Aliasing violation: {operation}")]
    AliasingViolation {
        /// Description of the forbidden operation
        operation: String,
    },

    /// A declared attribute could not be bound to a native field of the
    /// object being populated
    #[error("Cannot bind attribute '{attribute}' of type {type_name}")]
    BindingFailed {
        /// The owning type name
        type_name: String,
        /// The attribute that failed to bind
        attribute: String,
    },

    /// A bound native field's element count disagrees with the declared
    /// signature
    #[error("Attribute '{attribute}' declares {expected} element(s) but the bound field holds {got}")]
    BindingMismatch {
        /// The attribute in question
        attribute: String,
        /// Declared element count
        expected: usize,
        /// Actual field length
        got: usize,
    },

    // Table errors
    /// Empty strings are not valid attribute names
    #[error("Attribute names may not be empty")]
    EmptyKey,

    /// Adoption that would make a table its own ancestor
    #[error("Cycle detected: {reason}")]
    CycleDetected {
        /// What the offending relationship was
        reason: String,
    },

    /// Appending an auxiliary attribute over a prescribed one
    #[error("'{key}' is a prescribed attribute and cannot be appended as auxiliary")]
    PrescribedAttribute {
        /// The conflicting attribute name
        key: String,
    },

    // Registry errors
    /// Registering a name that is already registered
    #[error("Duplicate registration: {name}")]
    DuplicateRegistration {
        /// The already-registered name
        name: String,
    },

    /// Lookup or creation of a name that was never registered
    #[error("Unknown type: {name}")]
    UnknownType {
        /// The unregistered name
        name: String,
    },

    /// Mutating a signature list after instances of the type exist
    ///
    /// Resolving a type's signatures (which object construction does)
    /// freezes the type and its ancestors; changing the layout afterwards
    /// would silently desynchronize live instances.
    #[error("Signatures for '{name}' are frozen: instances have been constructed")]
    SignaturesFrozen {
        /// The frozen type name
        name: String,
    },

    // Parse errors
    /// No handler in the chain accepted a document key
    #[error("Unhandled key: '{key}'")]
    UnhandledKey {
        /// The rejected key
        key: String,
    },

    /// Document text or structure the pipeline cannot interpret
    #[error("Malformed document: {reason}")]
    MalformedDocument {
        /// What was wrong
        reason: String,
    },

    /// Reading a document from the filesystem failed
    #[error("I/O error: {message}")]
    Io {
        /// The underlying error message
        message: String,
    },
}

impl Error {
    /// Shorthand for a [`Error::TypeMismatch`] from two kind names
    pub fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Shorthand for a [`Error::MalformedDocument`]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedDocument {
            reason: reason.into(),
        }
    }
}

/// Result type for tabula operations
pub type Result<T> = std::result::Result<T, Error>;
