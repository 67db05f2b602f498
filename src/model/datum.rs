use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use lazy_static::lazy_static;

use crate::error::{Error, Result};
use crate::model::field::ExternalSlot;
use crate::model::scope::ScopeHandle;

/// 4-component float vector, laid out exactly as the native field
pub type Vec4 = [f32; 4];

/// 4x4 float matrix, row-major, laid out exactly as the native field
pub type Mat4 = [[f32; 4]; 4];

/// The fixed set of kinds a cell can hold. A cell only ever has one kind,
/// fixed at first assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 32-bit signed integer
    Integer,
    /// 32-bit float
    Float,
    /// UTF-8 string
    String,
    /// 4-component float vector
    Vector,
    /// 4x4 float matrix
    Matrix,
    /// Opaque object handle, compared by identity
    Pointer,
    /// Nested attribute table, owned by the cell
    Table,
}

lazy_static! {
    /// Kind names as they appear in documents
    static ref NAME_TO_KIND: HashMap<&'static str, ValueKind> = {
        let mut m = HashMap::new();
        m.insert("integer", ValueKind::Integer);
        m.insert("float", ValueKind::Float);
        m.insert("string", ValueKind::String);
        m.insert("vector", ValueKind::Vector);
        m.insert("matrix", ValueKind::Matrix);
        m.insert("pointer", ValueKind::Pointer);
        m.insert("table", ValueKind::Table);
        m
    };
}

impl ValueKind {
    /// Looks up a kind by its document name
    pub fn from_name(name: &str) -> Option<ValueKind> {
        NAME_TO_KIND.get(name).copied()
    }

    /// The document name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Vector => "vector",
            ValueKind::Matrix => "matrix",
            ValueKind::Pointer => "pointer",
            ValueKind::Table => "table",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Opaque object handle. Clones share the referent; equality is pointer
/// identity, never structural.
#[derive(Clone)]
pub struct OpaqueRef(Rc<dyn Any>);

impl OpaqueRef {
    /// Wraps a value in an opaque handle
    pub fn new<T: Any>(value: T) -> Self {
        OpaqueRef(Rc::new(value))
    }

    /// Attempts to view the referent as a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &OpaqueRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for OpaqueRef {
    fn default() -> Self {
        OpaqueRef(Rc::new(()))
    }
}

impl PartialEq for OpaqueRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<opaque>")
    }
}

/// A single typed value in transit between callers and cells
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer
    Integer(i32),
    /// 32-bit float
    Float(f32),
    /// UTF-8 string
    String(String),
    /// 4-component float vector
    Vector(Vec4),
    /// 4x4 float matrix
    Matrix(Mat4),
    /// Opaque object handle
    Pointer(OpaqueRef),
}

impl Value {
    /// The kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Vector(_) => ValueKind::Vector,
            Value::Matrix(_) => ValueKind::Matrix,
            Value::Pointer(_) => ValueKind::Pointer,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec4> for Value {
    fn from(v: Vec4) -> Self {
        Value::Vector(v)
    }
}

impl From<Mat4> for Value {
    fn from(v: Mat4) -> Self {
        Value::Matrix(v)
    }
}

impl From<OpaqueRef> for Value {
    fn from(v: OpaqueRef) -> Self {
        Value::Pointer(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Vector(v) => write!(f, "vec4({}, {}, {}, {})", v[0], v[1], v[2], v[3]),
            Value::Matrix(_) => write!(f, "mat4"),
            Value::Pointer(_) => write!(f, "<opaque>"),
        }
    }
}

/// Owned, growable storage for a cell, one variant per kind
#[derive(Debug)]
enum OwnedStore {
    /// Kind not yet assigned
    Empty,
    Integer(Vec<i32>),
    Float(Vec<f32>),
    String(Vec<String>),
    Vector(Vec<Vec4>),
    Matrix(Vec<Mat4>),
    Pointer(Vec<OpaqueRef>),
    Table(Vec<ScopeHandle>),
}

impl OwnedStore {
    fn empty_of(kind: ValueKind) -> OwnedStore {
        match kind {
            ValueKind::Integer => OwnedStore::Integer(Vec::new()),
            ValueKind::Float => OwnedStore::Float(Vec::new()),
            ValueKind::String => OwnedStore::String(Vec::new()),
            ValueKind::Vector => OwnedStore::Vector(Vec::new()),
            ValueKind::Matrix => OwnedStore::Matrix(Vec::new()),
            ValueKind::Pointer => OwnedStore::Pointer(Vec::new()),
            ValueKind::Table => OwnedStore::Table(Vec::new()),
        }
    }

    fn kind(&self) -> Option<ValueKind> {
        match self {
            OwnedStore::Empty => None,
            OwnedStore::Integer(_) => Some(ValueKind::Integer),
            OwnedStore::Float(_) => Some(ValueKind::Float),
            OwnedStore::String(_) => Some(ValueKind::String),
            OwnedStore::Vector(_) => Some(ValueKind::Vector),
            OwnedStore::Matrix(_) => Some(ValueKind::Matrix),
            OwnedStore::Pointer(_) => Some(ValueKind::Pointer),
            OwnedStore::Table(_) => Some(ValueKind::Table),
        }
    }

    fn len(&self) -> usize {
        match self {
            OwnedStore::Empty => 0,
            OwnedStore::Integer(v) => v.len(),
            OwnedStore::Float(v) => v.len(),
            OwnedStore::String(v) => v.len(),
            OwnedStore::Vector(v) => v.len(),
            OwnedStore::Matrix(v) => v.len(),
            OwnedStore::Pointer(v) => v.len(),
            OwnedStore::Table(v) => v.len(),
        }
    }

    fn capacity(&self) -> usize {
        match self {
            OwnedStore::Empty => 0,
            OwnedStore::Integer(v) => v.capacity(),
            OwnedStore::Float(v) => v.capacity(),
            OwnedStore::String(v) => v.capacity(),
            OwnedStore::Vector(v) => v.capacity(),
            OwnedStore::Matrix(v) => v.capacity(),
            OwnedStore::Pointer(v) => v.capacity(),
            OwnedStore::Table(v) => v.capacity(),
        }
    }

    fn shrink_to_fit(&mut self) {
        match self {
            OwnedStore::Empty => {}
            OwnedStore::Integer(v) => v.shrink_to_fit(),
            OwnedStore::Float(v) => v.shrink_to_fit(),
            OwnedStore::String(v) => v.shrink_to_fit(),
            OwnedStore::Vector(v) => v.shrink_to_fit(),
            OwnedStore::Matrix(v) => v.shrink_to_fit(),
            OwnedStore::Pointer(v) => v.shrink_to_fit(),
            OwnedStore::Table(v) => v.shrink_to_fit(),
        }
    }
}

/// Where a cell's elements live
#[derive(Debug)]
enum Storage {
    /// The cell owns its elements and may grow
    Owned(OwnedStore),
    /// The cell aliases a native field of a live object. Never grows,
    /// never deep-copied; copying copies the alias.
    External(ExternalSlot),
}

/// Type-tagged container holding zero or more homogeneous values.
///
/// A `Datum` either owns its storage or aliases a native field of a
/// reflected object. Its kind is fixed at first assignment: writing a
/// different kind fails with [`Error::TypeMismatch`], and re-declaring a
/// different kind fails with [`Error::TypeLocked`].
#[derive(Debug)]
pub struct Datum {
    storage: Storage,
}

impl Default for Datum {
    fn default() -> Self {
        Datum {
            storage: Storage::Owned(OwnedStore::Empty),
        }
    }
}

impl Datum {
    /// An empty cell with no kind assigned yet
    pub fn new() -> Datum {
        Datum::default()
    }

    /// An empty owned cell locked to the given kind
    pub fn typed(kind: ValueKind) -> Datum {
        Datum {
            storage: Storage::Owned(OwnedStore::empty_of(kind)),
        }
    }

    /// The kind this cell is locked to, if any
    pub fn kind(&self) -> Option<ValueKind> {
        match &self.storage {
            Storage::Owned(store) => store.kind(),
            Storage::External(slot) => Some(slot.kind()),
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Owned(store) => store.len(),
            Storage::External(slot) => slot.len(),
        }
    }

    /// Whether the cell holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated capacity. Meaningful only for owned storage; for an
    /// external cell this is its fixed length.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(store) => store.capacity(),
            Storage::External(slot) => slot.len(),
        }
    }

    /// Whether the cell aliases external storage
    pub fn is_external(&self) -> bool {
        matches!(self.storage, Storage::External(_))
    }

    /// Locks the cell to a kind. Idempotent for the same kind; fails with
    /// [`Error::TypeLocked`] for a different one.
    pub fn set_kind(&mut self, kind: ValueKind) -> Result<()> {
        match self.kind() {
            None => {
                self.storage = Storage::Owned(OwnedStore::empty_of(kind));
                Ok(())
            }
            Some(current) if current == kind => Ok(()),
            Some(current) => Err(Error::TypeLocked {
                current: current.name().to_string(),
                requested: kind.name().to_string(),
            }),
        }
    }

    /// Aliases this cell onto the native field behind `slot`.
    ///
    /// Re-pointing an already-aliased cell at a new field of the same kind
    /// is allowed; this is how a copied object re-binds its cells to its
    /// own fields. Fails with [`Error::AliasingViolation`] if the cell owns
    /// elements that would be discarded, and with [`Error::TypeLocked`] if
    /// a declared kind disagrees with the slot's.
    pub fn set_storage(&mut self, slot: ExternalSlot) -> Result<()> {
        if let Storage::Owned(store) = &self.storage {
            if store.len() > 0 {
                return Err(Error::AliasingViolation {
                    operation: "cannot alias a populated owned cell".to_string(),
                });
            }
        }

        if let Some(kind) = self.kind() {
            if kind != slot.kind() {
                return Err(Error::TypeLocked {
                    current: kind.name().to_string(),
                    requested: slot.kind().name().to_string(),
                });
            }
        }

        self.storage = Storage::External(slot);
        Ok(())
    }

    /// Appends a value. Assigns the cell's kind on first write; fails with
    /// [`Error::AliasingViolation`] on an external cell (aliased storage
    /// never grows).
    pub fn push(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if self.kind().is_none() {
            self.set_kind(value.kind())?;
        }
        self.check_kind(value.kind())?;

        match &mut self.storage {
            Storage::External(_) => Err(Error::AliasingViolation {
                operation: "cannot grow an aliased cell".to_string(),
            }),
            Storage::Owned(store) => {
                match (store, value) {
                    (OwnedStore::Integer(v), Value::Integer(x)) => v.push(x),
                    (OwnedStore::Float(v), Value::Float(x)) => v.push(x),
                    (OwnedStore::String(v), Value::String(x)) => v.push(x),
                    (OwnedStore::Vector(v), Value::Vector(x)) => v.push(x),
                    (OwnedStore::Matrix(v), Value::Matrix(x)) => v.push(x),
                    (OwnedStore::Pointer(v), Value::Pointer(x)) => v.push(x),
                    // check_kind has already ruled everything else out
                    _ => unreachable!("kind checked before dispatch"),
                }
                Ok(())
            }
        }
    }

    /// Writes a value at `index`. On owned storage, `index == len` appends;
    /// on external storage the index must address an existing element.
    pub fn set(&mut self, value: impl Into<Value>, index: usize) -> Result<()> {
        let value = value.into();
        if self.kind().is_none() {
            self.set_kind(value.kind())?;
        }
        self.check_kind(value.kind())?;

        if let Storage::External(slot) = &self.storage {
            if index >= slot.len() {
                return Err(Error::IndexOutOfRange {
                    index,
                    length: slot.len(),
                });
            }
            return slot.set(index, value);
        }

        let len = self.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, length: len });
        }
        if index == len {
            return self.push(value);
        }
        match &mut self.storage {
            Storage::Owned(store) => match (store, value) {
                (OwnedStore::Integer(v), Value::Integer(x)) => v[index] = x,
                (OwnedStore::Float(v), Value::Float(x)) => v[index] = x,
                (OwnedStore::String(v), Value::String(x)) => v[index] = x,
                (OwnedStore::Vector(v), Value::Vector(x)) => v[index] = x,
                (OwnedStore::Matrix(v), Value::Matrix(x)) => v[index] = x,
                (OwnedStore::Pointer(v), Value::Pointer(x)) => v[index] = x,
                _ => unreachable!("kind checked before dispatch"),
            },
            Storage::External(_) => unreachable!("handled above"),
        }
        Ok(())
    }

    /// Reads the value at `index`. Table cells are reached through
    /// [`Datum::get_scope`] instead.
    pub fn get(&self, index: usize) -> Result<Value> {
        if self.kind() == Some(ValueKind::Table) {
            return Err(Error::mismatch("a value kind", "table"));
        }
        self.value_at(index).ok_or(Error::IndexOutOfRange {
            index,
            length: self.len(),
        })
    }

    /// Reads the integer at `index`
    pub fn get_integer(&self, index: usize) -> Result<i32> {
        match self.get(index)? {
            Value::Integer(v) => Ok(v),
            other => Err(Error::mismatch("integer", other.kind().name())),
        }
    }

    /// Reads the float at `index`
    pub fn get_float(&self, index: usize) -> Result<f32> {
        match self.get(index)? {
            Value::Float(v) => Ok(v),
            other => Err(Error::mismatch("float", other.kind().name())),
        }
    }

    /// Reads the string at `index`
    pub fn get_string(&self, index: usize) -> Result<String> {
        match self.get(index)? {
            Value::String(v) => Ok(v),
            other => Err(Error::mismatch("string", other.kind().name())),
        }
    }

    /// Reads the vector at `index`
    pub fn get_vector(&self, index: usize) -> Result<Vec4> {
        match self.get(index)? {
            Value::Vector(v) => Ok(v),
            other => Err(Error::mismatch("vector", other.kind().name())),
        }
    }

    /// Reads the matrix at `index`
    pub fn get_matrix(&self, index: usize) -> Result<Mat4> {
        match self.get(index)? {
            Value::Matrix(v) => Ok(v),
            other => Err(Error::mismatch("matrix", other.kind().name())),
        }
    }

    /// Reads the opaque handle at `index`
    pub fn get_pointer(&self, index: usize) -> Result<OpaqueRef> {
        match self.get(index)? {
            Value::Pointer(v) => Ok(v),
            other => Err(Error::mismatch("pointer", other.kind().name())),
        }
    }

    /// Hands out the owned child table at `index`
    pub fn get_scope(&self, index: usize) -> Result<ScopeHandle> {
        match &self.storage {
            Storage::Owned(OwnedStore::Table(v)) => {
                v.get(index).cloned().ok_or(Error::IndexOutOfRange {
                    index,
                    length: v.len(),
                })
            }
            _ => Err(Error::mismatch(
                "table",
                self.kind().map(|k| k.name()).unwrap_or("untyped"),
            )),
        }
    }

    /// Resizes owned storage, default-filling new elements. Fails on
    /// external cells and on table cells (children are appended through
    /// their parent table instead).
    pub fn resize(&mut self, count: usize) -> Result<()> {
        match &mut self.storage {
            Storage::External(_) => Err(Error::AliasingViolation {
                operation: "cannot resize an aliased cell".to_string(),
            }),
            Storage::Owned(store) => match store {
                OwnedStore::Empty => Err(Error::mismatch("a typed cell", "untyped")),
                OwnedStore::Integer(v) => {
                    v.resize(count, 0);
                    Ok(())
                }
                OwnedStore::Float(v) => {
                    v.resize(count, 0.0);
                    Ok(())
                }
                OwnedStore::String(v) => {
                    v.resize(count, String::new());
                    Ok(())
                }
                OwnedStore::Vector(v) => {
                    v.resize(count, [0.0; 4]);
                    Ok(())
                }
                OwnedStore::Matrix(v) => {
                    v.resize(count, [[0.0; 4]; 4]);
                    Ok(())
                }
                OwnedStore::Pointer(v) => {
                    v.resize_with(count, OpaqueRef::default);
                    Ok(())
                }
                OwnedStore::Table(_) => Err(Error::mismatch("a value kind", "table")),
            },
        }
    }

    /// Releases excess owned capacity. No effect on external cells.
    pub fn shrink_to_fit(&mut self) {
        if let Storage::Owned(store) = &mut self.storage {
            store.shrink_to_fit();
        }
    }

    fn check_kind(&self, incoming: ValueKind) -> Result<()> {
        match self.kind() {
            Some(kind) if kind != incoming => {
                Err(Error::mismatch(kind.name(), incoming.name()))
            }
            _ => Ok(()),
        }
    }

    fn value_at(&self, index: usize) -> Option<Value> {
        match &self.storage {
            Storage::External(slot) => slot.get(index),
            Storage::Owned(store) => match store {
                OwnedStore::Empty | OwnedStore::Table(_) => None,
                OwnedStore::Integer(v) => v.get(index).copied().map(Value::Integer),
                OwnedStore::Float(v) => v.get(index).copied().map(Value::Float),
                OwnedStore::String(v) => v.get(index).cloned().map(Value::String),
                OwnedStore::Vector(v) => v.get(index).copied().map(Value::Vector),
                OwnedStore::Matrix(v) => v.get(index).copied().map(Value::Matrix),
                OwnedStore::Pointer(v) => v.get(index).cloned().map(Value::Pointer),
            },
        }
    }

    // Child-table plumbing, reachable only through Scope so parent links
    // stay consistent.

    pub(crate) fn push_scope(&mut self, child: ScopeHandle) -> Result<()> {
        self.set_kind(ValueKind::Table)?;
        match &mut self.storage {
            Storage::Owned(OwnedStore::Table(v)) => {
                v.push(child);
                Ok(())
            }
            _ => Err(Error::mismatch(
                "table",
                self.kind().map(|k| k.name()).unwrap_or("untyped"),
            )),
        }
    }

    pub(crate) fn remove_scope(&mut self, child: &ScopeHandle) -> bool {
        if let Storage::Owned(OwnedStore::Table(v)) = &mut self.storage {
            if let Some(pos) = v.iter().position(|c| Rc::ptr_eq(c, child)) {
                v.remove(pos);
                return true;
            }
        }
        false
    }

    pub(crate) fn scopes(&self) -> &[ScopeHandle] {
        match &self.storage {
            Storage::Owned(OwnedStore::Table(v)) => v,
            _ => &[],
        }
    }

    /// Deep copy for table adoption into `new_parent`: owned elements are
    /// cloned, child tables recursively cloned and re-parented, external
    /// cells keep their alias target.
    pub(crate) fn deep_clone(&self, new_parent: &ScopeHandle) -> Datum {
        let storage = match &self.storage {
            Storage::External(slot) => Storage::External(slot.clone()),
            Storage::Owned(store) => Storage::Owned(match store {
                OwnedStore::Empty => OwnedStore::Empty,
                OwnedStore::Integer(v) => OwnedStore::Integer(v.clone()),
                OwnedStore::Float(v) => OwnedStore::Float(v.clone()),
                OwnedStore::String(v) => OwnedStore::String(v.clone()),
                OwnedStore::Vector(v) => OwnedStore::Vector(v.clone()),
                OwnedStore::Matrix(v) => OwnedStore::Matrix(v.clone()),
                OwnedStore::Pointer(v) => OwnedStore::Pointer(v.clone()),
                OwnedStore::Table(v) => OwnedStore::Table(
                    v.iter()
                        .map(|child| {
                            let cloned = crate::model::scope::Scope::deep_clone(child);
                            cloned.borrow_mut().set_parent(new_parent);
                            cloned
                        })
                        .collect(),
                ),
            }),
        };
        Datum { storage }
    }
}

impl PartialEq for Datum {
    /// Structural equality: kind, length, and element values. Capacity and
    /// storage mode are excluded; an external cell equals an owned cell
    /// holding the same values. Pointers compare by identity, child tables
    /// recursively.
    fn eq(&self, other: &Self) -> bool {
        if self.kind() != other.kind() || self.len() != other.len() {
            return false;
        }
        if self.kind() == Some(ValueKind::Table) {
            let a = self.scopes();
            let b = other.scopes();
            return a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| *x.borrow() == *y.borrow());
        }
        (0..self.len()).all(|i| self.value_at(i) == other.value_at(i))
    }
}
