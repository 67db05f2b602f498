//! Native field storage for reflected objects.
//!
//! A [`Field<T>`] is the object-side half of an aliased attribute: the object
//! owns the field, and a table cell aliases it through an [`ExternalSlot`].
//! Writes through either side are visible through the other. Fields have a
//! fixed element count after construction; neither side can grow them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::model::datum::{Mat4, OpaqueRef, Value, ValueKind, Vec4};

/// Shared backing store for one native field
pub type FieldSlot<T> = Rc<RefCell<Vec<T>>>;

/// A typed native field of a reflected object.
///
/// Cloning a `Field` copies its contents into a fresh backing store; the
/// clone is not aliased by any cell that aliased the original. This is what
/// lets a copied object re-bind its cells to its own fields.
#[derive(Debug)]
pub struct Field<T> {
    slot: FieldSlot<T>,
}

impl<T> Field<T> {
    /// A single-element field holding `value`
    pub fn new(value: T) -> Field<T> {
        Field {
            slot: Rc::new(RefCell::new(vec![value])),
        }
    }

    /// A field of `count` elements built from the given values
    pub fn from_values(values: Vec<T>) -> Field<T> {
        Field {
            slot: Rc::new(RefCell::new(values)),
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.slot.borrow().len()
    }

    /// Whether the field holds no elements
    pub fn is_empty(&self) -> bool {
        self.slot.borrow().is_empty()
    }

    /// Reads the element at `index`
    pub fn get(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.slot.borrow().get(index).cloned()
    }

    /// Writes the element at `index`; returns `false` when out of range
    pub fn set(&self, index: usize, value: T) -> bool {
        let mut slot = self.slot.borrow_mut();
        match slot.get_mut(index) {
            Some(element) => {
                *element = value;
                true
            }
            None => false,
        }
    }

    /// Reads the first element; the common case for scalar fields.
    ///
    /// # Panics
    ///
    /// Panics if the field is empty. Use [`Field::get`] for fields whose
    /// element count may be zero.
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        self.slot.borrow()[0].clone()
    }

    /// Writes the first element.
    ///
    /// # Panics
    ///
    /// Panics if the field is empty. Use [`Field::set`] for fields whose
    /// element count may be zero.
    pub fn set_value(&self, value: T) {
        self.slot.borrow_mut()[0] = value;
    }
}

impl<T: Default + Clone> Field<T> {
    /// A field of `count` default-valued elements
    pub fn with_len(count: usize) -> Field<T> {
        Field {
            slot: Rc::new(RefCell::new(vec![T::default(); count])),
        }
    }
}

impl<T: Clone> Clone for Field<T> {
    fn clone(&self) -> Self {
        Field {
            slot: Rc::new(RefCell::new(self.slot.borrow().clone())),
        }
    }
}

impl<T: Default> Default for Field<T> {
    fn default() -> Self {
        Field::new(T::default())
    }
}

impl<T: PartialEq> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.slot.borrow() == *other.slot.borrow()
    }
}

impl<T: FieldValue> Field<T> {
    /// Hands out an alias onto this field's backing store, for a cell to
    /// adopt via `Datum::set_storage`
    pub fn external_slot(&self) -> ExternalSlot {
        T::wrap(Rc::clone(&self.slot))
    }
}

/// Element types a cell can alias
pub trait FieldValue: Clone + Sized {
    /// The cell kind this element type maps to
    const KIND: ValueKind;

    /// Wraps a shared backing store in the type-erased alias
    fn wrap(slot: FieldSlot<Self>) -> ExternalSlot;
}

impl FieldValue for i32 {
    const KIND: ValueKind = ValueKind::Integer;
    fn wrap(slot: FieldSlot<Self>) -> ExternalSlot {
        ExternalSlot::Integer(slot)
    }
}

impl FieldValue for f32 {
    const KIND: ValueKind = ValueKind::Float;
    fn wrap(slot: FieldSlot<Self>) -> ExternalSlot {
        ExternalSlot::Float(slot)
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::String;
    fn wrap(slot: FieldSlot<Self>) -> ExternalSlot {
        ExternalSlot::String(slot)
    }
}

impl FieldValue for Vec4 {
    const KIND: ValueKind = ValueKind::Vector;
    fn wrap(slot: FieldSlot<Self>) -> ExternalSlot {
        ExternalSlot::Vector(slot)
    }
}

impl FieldValue for Mat4 {
    const KIND: ValueKind = ValueKind::Matrix;
    fn wrap(slot: FieldSlot<Self>) -> ExternalSlot {
        ExternalSlot::Matrix(slot)
    }
}

impl FieldValue for OpaqueRef {
    const KIND: ValueKind = ValueKind::Pointer;
    fn wrap(slot: FieldSlot<Self>) -> ExternalSlot {
        ExternalSlot::Pointer(slot)
    }
}

/// Type-erased alias onto a native field. The cell-side half of aliased
/// storage: reads and in-range writes pass through to the field, growth is
/// impossible, and clones share the same backing store.
#[derive(Clone)]
pub enum ExternalSlot {
    Integer(FieldSlot<i32>),
    Float(FieldSlot<f32>),
    String(FieldSlot<String>),
    Vector(FieldSlot<Vec4>),
    Matrix(FieldSlot<Mat4>),
    Pointer(FieldSlot<OpaqueRef>),
}

impl ExternalSlot {
    /// The kind of the aliased field
    pub fn kind(&self) -> ValueKind {
        match self {
            ExternalSlot::Integer(_) => ValueKind::Integer,
            ExternalSlot::Float(_) => ValueKind::Float,
            ExternalSlot::String(_) => ValueKind::String,
            ExternalSlot::Vector(_) => ValueKind::Vector,
            ExternalSlot::Matrix(_) => ValueKind::Matrix,
            ExternalSlot::Pointer(_) => ValueKind::Pointer,
        }
    }

    /// Fixed length of the aliased field
    pub fn len(&self) -> usize {
        match self {
            ExternalSlot::Integer(s) => s.borrow().len(),
            ExternalSlot::Float(s) => s.borrow().len(),
            ExternalSlot::String(s) => s.borrow().len(),
            ExternalSlot::Vector(s) => s.borrow().len(),
            ExternalSlot::Matrix(s) => s.borrow().len(),
            ExternalSlot::Pointer(s) => s.borrow().len(),
        }
    }

    /// Whether the aliased field holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the element at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            ExternalSlot::Integer(s) => s.borrow().get(index).copied().map(Value::Integer),
            ExternalSlot::Float(s) => s.borrow().get(index).copied().map(Value::Float),
            ExternalSlot::String(s) => s.borrow().get(index).cloned().map(Value::String),
            ExternalSlot::Vector(s) => s.borrow().get(index).copied().map(Value::Vector),
            ExternalSlot::Matrix(s) => s.borrow().get(index).copied().map(Value::Matrix),
            ExternalSlot::Pointer(s) => s.borrow().get(index).cloned().map(Value::Pointer),
        }
    }

    /// Writes the element at `index`. The value's kind must match the
    /// field's and the index must be in range.
    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        let length = self.len();
        if index >= length {
            return Err(Error::IndexOutOfRange { index, length });
        }
        match (self, value) {
            (ExternalSlot::Integer(s), Value::Integer(v)) => s.borrow_mut()[index] = v,
            (ExternalSlot::Float(s), Value::Float(v)) => s.borrow_mut()[index] = v,
            (ExternalSlot::String(s), Value::String(v)) => s.borrow_mut()[index] = v,
            (ExternalSlot::Vector(s), Value::Vector(v)) => s.borrow_mut()[index] = v,
            (ExternalSlot::Matrix(s), Value::Matrix(v)) => s.borrow_mut()[index] = v,
            (ExternalSlot::Pointer(s), Value::Pointer(v)) => s.borrow_mut()[index] = v,
            (slot, value) => {
                return Err(Error::mismatch(slot.kind().name(), value.kind().name()));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ExternalSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ExternalSlot({}, len {})", self.kind(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_scalar_access() {
        let field = Field::new(10);
        assert_eq!(field.value(), 10);
        field.set_value(20);
        assert_eq!(field.value(), 20);
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn test_field_indexed_access() {
        let field = Field::from_values(vec![1.0f32, 2.0, 3.0]);
        assert_eq!(field.get(2), Some(3.0));
        assert!(field.set(1, 9.0));
        assert_eq!(field.get(1), Some(9.0));
        assert!(!field.set(3, 0.0));
        assert_eq!(field.get(3), None);
    }

    #[test]
    fn test_slot_aliases_field() {
        let field = Field::new(String::from("before"));
        let slot = field.external_slot();

        assert_eq!(slot.kind(), ValueKind::String);
        assert_eq!(slot.get(0), Some(Value::String("before".to_string())));

        // write through the field, read through the slot
        field.set_value("after".to_string());
        assert_eq!(slot.get(0), Some(Value::String("after".to_string())));

        // write through the slot, read through the field
        slot.set(0, Value::String("again".to_string())).unwrap();
        assert_eq!(field.value(), "again");
    }

    #[test]
    fn test_slot_rejects_wrong_kind_and_range() {
        let field = Field::new(1i32);
        let slot = field.external_slot();

        assert!(matches!(
            slot.set(0, Value::Float(1.0)),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            slot.set(1, Value::Integer(2)),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_field_clone_is_deep() {
        let field = Field::new(5);
        let slot = field.external_slot();
        let copy = field.clone();

        copy.set_value(99);
        // the original and its alias are untouched
        assert_eq!(field.value(), 5);
        assert_eq!(slot.get(0), Some(Value::Integer(5)));
    }

    #[test]
    #[should_panic]
    fn test_value_on_empty_field_panics() {
        let field: Field<i32> = Field::from_values(Vec::new());
        field.value();
    }

    #[test]
    fn test_empty_field_indexed_access() {
        let field: Field<i32> = Field::from_values(Vec::new());
        assert!(field.is_empty());
        assert_eq!(field.get(0), None);
        assert!(!field.set(0, 1));
    }

    #[test]
    fn test_with_len_defaults() {
        let field: Field<Vec4> = Field::with_len(2);
        assert_eq!(field.len(), 2);
        assert_eq!(field.get(1), Some([0.0; 4]));
    }
}
