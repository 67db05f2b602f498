//! The document parse pipeline: a coordinator that walks JSON and a chain
//! of handlers that interpret each key.

pub mod context;
pub mod handlers;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::scope::{Scope, ScopeHandle};
use crate::reflect::attributed::Reflected;
use crate::reflect::factory::FactoryRegistry;
use crate::reflect::signature::TypeRegistry;

pub use context::{Frame, ParseContext, MAX_DEPTH};
pub use handlers::{
    ClassMarkerHandler, Flow, ParseHandler, ScalarHandler, TableHandler, TypedValueHandler,
};

/// What to do with a key no handler in the chain accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeyPolicy {
    /// Fail the parse
    #[default]
    Error,
    /// Log the key and keep going, for documents written against a newer
    /// grammar
    Skip,
}

/// Walks a JSON document and routes every key/value pair through the
/// handler chain, first acceptor wins.
///
/// A coordinator owns its [`ParseContext`] and handler chain; the stock
/// chain implements the table grammar. Each `parse` call starts from a
/// fresh root table.
pub struct ParseCoordinator {
    handlers: Vec<Box<dyn ParseHandler>>,
    context: ParseContext,
    policy: UnknownKeyPolicy,
}

impl ParseCoordinator {
    /// A coordinator with the stock handler chain
    pub fn new(types: Arc<TypeRegistry>, factories: Arc<FactoryRegistry>) -> ParseCoordinator {
        ParseCoordinator {
            handlers: vec![
                Box::new(ClassMarkerHandler),
                Box::new(TypedValueHandler),
                Box::new(TableHandler),
                Box::new(ScalarHandler),
            ],
            context: ParseContext::new(types, factories),
            policy: UnknownKeyPolicy::default(),
        }
    }

    /// Sets the unknown-key policy
    pub fn with_policy(mut self, policy: UnknownKeyPolicy) -> ParseCoordinator {
        self.policy = policy;
        self
    }

    /// The unknown-key policy in effect
    pub fn policy(&self) -> UnknownKeyPolicy {
        self.policy
    }

    /// Appends a handler to the chain. Earlier handlers win ties, so custom
    /// grammar extensions that overlap the stock chain belong in a fresh
    /// coordinator built around them.
    pub fn add_handler(&mut self, handler: Box<dyn ParseHandler>) {
        self.handlers.push(handler);
    }

    /// The shared state of the current parse
    pub fn context(&self) -> &ParseContext {
        &self.context
    }

    /// Parses document text into a fresh root table
    pub fn parse(&mut self, text: &str) -> Result<ScopeHandle> {
        let document: Json =
            serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?;
        self.parse_json(&document)
    }

    /// Parses an already-decoded document into a fresh root table
    pub fn parse_json(&mut self, document: &Json) -> Result<ScopeHandle> {
        let members = document
            .as_object()
            .ok_or_else(|| Error::malformed("top level of a document must be an object"))?;
        self.context.reset(Scope::new_root());
        debug!(keys = members.len(), "parsing document");
        for (key, value) in members {
            self.parse_pair(key, value)?;
        }
        Ok(self.context.root().clone())
    }

    /// Parses document text directly into an existing object's attribute
    /// table, filling its prescribed cells in place
    pub fn parse_into(&mut self, text: &str, target: &dyn Reflected) -> Result<()> {
        let document: Json =
            serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?;
        let members = document
            .as_object()
            .ok_or_else(|| Error::malformed("top level of a document must be an object"))?;
        self.context.reset(target.attributes().clone());
        for (key, value) in members {
            self.parse_pair(key, value)?;
        }
        Ok(())
    }

    /// Reads and parses a document file
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<ScopeHandle> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| Error::Io {
            message: format!("{}: {}", path.as_ref().display(), e),
        })?;
        self.parse(&text)
    }

    /// Typed objects constructed by the last parse
    pub fn take_objects(&mut self) -> Vec<Box<dyn Reflected>> {
        self.context.take_objects()
    }

    /// An independent coordinator sharing this one's registries and policy:
    /// pristine handlers, fresh context, fresh root. Used to parse
    /// sub-documents without disturbing a parse in progress.
    pub fn fork(&self) -> ParseCoordinator {
        ParseCoordinator {
            handlers: self.handlers.iter().map(|h| h.fresh()).collect(),
            context: ParseContext::new(
                self.context.shared_types(),
                self.context.shared_factories(),
            ),
            policy: self.policy,
        }
    }

    /// Routes one pair. Arrays are destructured here so handlers always see
    /// a single element and its index.
    fn parse_pair(&mut self, key: &str, value: &Json) -> Result<()> {
        match value.as_array() {
            Some(elements) => {
                for (index, element) in elements.iter().enumerate() {
                    self.dispatch(key, element, true, index)?;
                }
                Ok(())
            }
            None => self.dispatch(key, value, false, 0),
        }
    }

    fn dispatch(
        &mut self,
        key: &str,
        value: &Json,
        is_array_element: bool,
        index: usize,
    ) -> Result<()> {
        self.context.enter()?;
        let result = self.dispatch_inner(key, value, is_array_element, index);
        self.context.exit();
        result
    }

    fn dispatch_inner(
        &mut self,
        key: &str,
        value: &Json,
        is_array_element: bool,
        index: usize,
    ) -> Result<()> {
        let accepted = self
            .handlers
            .iter()
            .position(|h| h.can_handle(&self.context, key, value));
        let Some(position) = accepted else {
            return match self.policy {
                UnknownKeyPolicy::Error => Err(Error::UnhandledKey {
                    key: key.to_string(),
                }),
                UnknownKeyPolicy::Skip => {
                    warn!(key, "no handler accepted key, skipping");
                    Ok(())
                }
            };
        };

        let flow =
            self.handlers[position].start(&mut self.context, key, value, is_array_element, index)?;
        if flow == Flow::Descend {
            if let Some(members) = value.as_object() {
                for (member_key, member_value) in members {
                    self.parse_pair(member_key, member_value)?;
                }
            }
        }
        self.handlers[position].end(&mut self.context, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> ParseCoordinator {
        ParseCoordinator::new(
            Arc::new(TypeRegistry::new()),
            Arc::new(FactoryRegistry::new()),
        )
    }

    #[test]
    fn test_rejects_non_object_top_level() {
        let mut parser = coordinator();
        assert!(matches!(
            parser.parse("[1, 2, 3]"),
            Err(Error::MalformedDocument { .. })
        ));
        assert!(matches!(
            parser.parse("not json at all"),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_unknown_key_policy() {
        let mut parser = coordinator();
        assert!(matches!(
            parser.parse(r#"{"Odd": null}"#),
            Err(Error::UnhandledKey { .. })
        ));

        let mut lenient = coordinator().with_policy(UnknownKeyPolicy::Skip);
        let root = lenient.parse(r#"{"Odd": null, "Kept": 1}"#).unwrap();
        let table = root.borrow();
        assert!(table.find("Odd").is_none());
        assert_eq!(table.find("Kept").unwrap().get_integer(0).unwrap(), 1);
    }

    #[test]
    fn test_depth_cap() {
        let mut document = String::from("{\"N\": 1}");
        for _ in 0..MAX_DEPTH + 1 {
            document = format!("{{\"N\": {}}}", document);
        }
        let mut parser = coordinator();
        assert!(matches!(
            parser.parse(&document),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_each_parse_starts_fresh() {
        let mut parser = coordinator();
        let first = parser.parse(r#"{"A": 1}"#).unwrap();
        let second = parser.parse(r#"{"B": 2}"#).unwrap();

        assert!(!std::rc::Rc::ptr_eq(&first, &second));
        assert!(second.borrow().find("A").is_none());
    }
}
