//! Shared state threaded through the handler chain during a parse.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::scope::{Scope, ScopeHandle};
use crate::reflect::attributed::Reflected;
use crate::reflect::factory::FactoryRegistry;
use crate::reflect::signature::TypeRegistry;

/// Nesting cap for documents; deeper trees are rejected rather than
/// overflowing the stack
pub const MAX_DEPTH: usize = 128;

/// One level of table nesting currently being filled
#[derive(Debug, Clone)]
pub struct Frame {
    /// The document key this table sits under
    pub key: String,
    /// The table being filled
    pub scope: ScopeHandle,
}

/// Everything the handlers share while walking a document: the registries,
/// the tree under construction, the frame stack, and any typed objects
/// constructed along the way.
pub struct ParseContext {
    types: Arc<TypeRegistry>,
    factories: Arc<FactoryRegistry>,
    root: ScopeHandle,
    stack: Vec<Frame>,
    depth: usize,
    objects: Vec<Box<dyn Reflected>>,
}

impl ParseContext {
    pub fn new(types: Arc<TypeRegistry>, factories: Arc<FactoryRegistry>) -> ParseContext {
        ParseContext {
            types,
            factories,
            root: Scope::new_root(),
            stack: Vec::new(),
            depth: 0,
            objects: Vec::new(),
        }
    }

    /// The signature registry in effect for this parse
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The factory registry in effect for this parse
    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub(crate) fn shared_types(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.types)
    }

    pub(crate) fn shared_factories(&self) -> Arc<FactoryRegistry> {
        Arc::clone(&self.factories)
    }

    /// The tree being populated
    pub fn root(&self) -> &ScopeHandle {
        &self.root
    }

    /// The table writes currently land in: the innermost open frame, or
    /// the root outside any frame
    pub fn current_scope(&self) -> ScopeHandle {
        match self.stack.last() {
            Some(frame) => frame.scope.clone(),
            None => self.root.clone(),
        }
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn push_frame(&mut self, key: &str, scope: ScopeHandle) {
        self.stack.push(Frame {
            key: key.to_string(),
            scope,
        });
    }

    pub(crate) fn pop_frame(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::malformed(format!(
                "document nesting exceeds {} levels",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
    }

    /// Retains a typed object constructed during the parse so it outlives
    /// the document walk
    pub fn keep_object(&mut self, object: Box<dyn Reflected>) {
        self.objects.push(object);
    }

    /// Hands the constructed objects to the caller, leaving the context
    /// empty of them
    pub fn take_objects(&mut self) -> Vec<Box<dyn Reflected>> {
        std::mem::take(&mut self.objects)
    }

    /// Rewinds the context onto a new target tree, dropping any leftover
    /// frames, depth, and constructed objects
    pub fn reset(&mut self, root: ScopeHandle) {
        self.root = root;
        self.stack.clear();
        self.depth = 0;
        self.objects.clear();
    }
}
