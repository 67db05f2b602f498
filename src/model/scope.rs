//! Hierarchical attribute tables.
//!
//! A [`Scope`] maps string names to [`Datum`] cells, preserving insertion
//! order, and owns any child tables nested under it. Tables are handled
//! through [`ScopeHandle`] so that children can hold a back-link to their
//! parent and so that opaque handles to a table stay valid while it moves
//! around the tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::model::datum::{Datum, ValueKind};

/// Reserved attribute holding an object's handle to itself. Always the first
/// entry of a reflected object's table and excluded from equality.
pub const SELF_ATTRIBUTE: &str = "self";

/// Shared handle to a table
pub type ScopeHandle = Rc<RefCell<Scope>>;

/// An ordered name-to-cell table with an optional parent.
///
/// Entry-level operations (`append`, `find`, iteration) live on `Scope`
/// itself; operations that touch the tree shape (`append_scope`, `adopt`,
/// `search`, `deep_clone`) are associated functions over handles, since they
/// must update parent links on both sides.
#[derive(Debug, Default)]
pub struct Scope {
    parent: Weak<RefCell<Scope>>,
    entries: Vec<(String, Datum)>,
    index: HashMap<String, usize>,
}

impl Scope {
    /// A fresh parentless table
    pub fn new_root() -> ScopeHandle {
        Rc::new(RefCell::new(Scope::default()))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no attributes
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` names an attribute of this table
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// The cell for `key`, creating an empty untyped one if absent.
    /// Idempotent: appending an existing key returns the existing cell
    /// untouched. Empty keys are rejected.
    pub fn append(&mut self, key: &str) -> Result<&mut Datum> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        let idx = match self.index.get(key) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.entries.push((key.to_string(), Datum::new()));
                self.index.insert(key.to_string(), i);
                i
            }
        };
        Ok(&mut self.entries[idx].1)
    }

    /// The cell for `key`, if present
    pub fn find(&self, key: &str) -> Option<&Datum> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Mutable access to the cell for `key`, if present
    pub fn find_mut(&mut self, key: &str) -> Option<&mut Datum> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// The cell at insertion position `position`
    pub fn datum_at(&self, position: usize) -> Option<&Datum> {
        self.entries.get(position).map(|(_, d)| d)
    }

    /// The attribute name at insertion position `position`
    pub fn key_at(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(|(k, _)| k.as_str())
    }

    /// Attributes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.entries.iter().map(|(k, d)| (k.as_str(), d))
    }

    /// Removes every attribute. Children still held elsewhere survive as
    /// parentless tables.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// This table's parent, if it is nested under one
    pub fn parent(&self) -> Option<ScopeHandle> {
        self.parent.upgrade()
    }

    pub(crate) fn set_parent(&mut self, parent: &ScopeHandle) {
        self.parent = Rc::downgrade(parent);
    }

    /// Appends a fresh child table under `key` on the table cell there,
    /// returning a handle to the child
    pub fn append_scope(parent: &ScopeHandle, key: &str) -> Result<ScopeHandle> {
        let child = Rc::new(RefCell::new(Scope {
            parent: Rc::downgrade(parent),
            ..Scope::default()
        }));
        {
            let mut table = parent.borrow_mut();
            let datum = table.append(key)?;
            datum.push_scope(Rc::clone(&child))?;
        }
        Ok(child)
    }

    /// The `index`-th child table under `key`, if any
    pub fn child_at(parent: &ScopeHandle, key: &str, index: usize) -> Option<ScopeHandle> {
        let table = parent.borrow();
        table.find(key).and_then(|d| d.scopes().get(index).cloned())
    }

    /// Re-homes `child` under `parent` at `key`, detaching it from its
    /// current parent first. Rejects adoptions that would make a table its
    /// own ancestor.
    pub fn adopt(parent: &ScopeHandle, child: &ScopeHandle, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if Rc::ptr_eq(parent, child) {
            return Err(Error::CycleDetected {
                reason: "a table cannot adopt itself".to_string(),
            });
        }
        if Scope::is_ancestor_of(child, parent) {
            return Err(Error::CycleDetected {
                reason: format!("adopting under '{}' would make the table its own ancestor", key),
            });
        }
        // The target cell must be able to hold tables before we detach the
        // child from its current home.
        {
            let table = parent.borrow();
            if let Some(existing) = table.find(key) {
                if let Some(kind) = existing.kind() {
                    if kind != ValueKind::Table {
                        return Err(Error::mismatch("table", kind.name()));
                    }
                }
            }
        }
        Scope::orphan(child);
        {
            let mut table = parent.borrow_mut();
            let datum = table.append(key)?;
            datum.push_scope(Rc::clone(child))?;
        }
        child.borrow_mut().parent = Rc::downgrade(parent);
        Ok(())
    }

    /// Detaches `child` from its parent, leaving it a parentless table.
    /// Returns whether anything was detached.
    pub fn orphan(child: &ScopeHandle) -> bool {
        let parent = child.borrow().parent.upgrade();
        match parent {
            Some(parent) => {
                let removed = {
                    let mut table = parent.borrow_mut();
                    table
                        .entries
                        .iter_mut()
                        .any(|(_, datum)| datum.remove_scope(child))
                };
                child.borrow_mut().parent = Weak::new();
                removed
            }
            None => false,
        }
    }

    /// Whether `candidate` is an ancestor of `node`
    pub fn is_ancestor_of(candidate: &ScopeHandle, node: &ScopeHandle) -> bool {
        let mut current = node.borrow().parent.upgrade();
        while let Some(scope) = current {
            if Rc::ptr_eq(&scope, candidate) {
                return true;
            }
            current = scope.borrow().parent.upgrade();
        }
        false
    }

    /// Whether `candidate` is a descendant of `node`
    pub fn is_descendant_of(candidate: &ScopeHandle, node: &ScopeHandle) -> bool {
        Scope::is_ancestor_of(node, candidate)
    }

    /// Walks from `start` up through its ancestors looking for `key`,
    /// returning the nearest table that defines it
    pub fn search(start: &ScopeHandle, key: &str) -> Option<ScopeHandle> {
        let mut current = Some(Rc::clone(start));
        while let Some(scope) = current {
            if scope.borrow().contains_key(key) {
                return Some(scope);
            }
            let next = scope.borrow().parent.upgrade();
            current = next;
        }
        None
    }

    /// Locates `child` among `parent`'s nested tables, returning the key it
    /// sits under and its index within that cell
    pub fn find_contained_scope(parent: &ScopeHandle, child: &ScopeHandle) -> Option<(String, usize)> {
        let table = parent.borrow();
        for (key, datum) in &table.entries {
            if let Some(pos) = datum.scopes().iter().position(|c| Rc::ptr_eq(c, child)) {
                return Some((key.clone(), pos));
            }
        }
        None
    }

    /// Deep copy of a table: owned cells are cloned element-wise, child
    /// tables recursively cloned and re-parented under the copy, and aliased
    /// cells keep aliasing the same native fields as the source. The copy is
    /// parentless regardless of where the source sits.
    pub fn deep_clone(source: &ScopeHandle) -> ScopeHandle {
        let clone = Scope::new_root();
        {
            let src = source.borrow();
            let mut dst = clone.borrow_mut();
            for (key, datum) in &src.entries {
                let copied = datum.deep_clone(&clone);
                let position = dst.entries.len();
                dst.index.insert(key.clone(), position);
                dst.entries.push((key.clone(), copied));
            }
        }
        clone
    }
}

impl PartialEq for Scope {
    /// Structural equality over attributes: the same names in the same
    /// insertion order with equal cells. The reserved `"self"` entry is
    /// skipped on both sides, since its value is per-instance. Child tables
    /// compare recursively, aliased cells by their current values.
    fn eq(&self, other: &Self) -> bool {
        let mut mine = self.entries.iter().filter(|(k, _)| k != SELF_ATTRIBUTE);
        let mut theirs = other.entries.iter().filter(|(k, _)| k != SELF_ATTRIBUTE);
        loop {
            match (mine.next(), theirs.next()) {
                (None, None) => return true,
                (Some((key_a, datum_a)), Some((key_b, datum_b))) => {
                    if key_a != key_b || datum_a != datum_b {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}
