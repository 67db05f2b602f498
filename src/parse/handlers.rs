//! The handler chain that interprets document keys.
//!
//! Each key/value pair is offered to the handlers in order and the first
//! acceptor owns it. The stock chain understands the table grammar: nested
//! objects become child tables, objects carrying a `"class"` marker are
//! constructed through the factory registry, `{"type": ..., "value": ...}`
//! wrappers declare a kind explicitly, and bare scalars infer theirs.

use serde_json::Value as Json;
use tracing::trace;

use crate::error::{Error, Result};
use crate::model::datum::{Mat4, Value, ValueKind, Vec4};
use crate::model::scope::Scope;
use crate::parse::context::ParseContext;

/// The marker key naming the concrete type a table should be constructed as
pub const CLASS_KEY: &str = "class";
/// The wrapper key declaring a cell's kind
pub const TYPE_KEY: &str = "type";
/// The wrapper key carrying the cell's payload
pub const VALUE_KEY: &str = "value";

/// What the coordinator should do after a handler accepts a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Walk the pair's members; the handler opened a frame for them
    Descend,
    /// The pair is fully consumed
    Consumed,
}

/// One link in the chain. Handlers are stateless; per-parse state lives in
/// the [`ParseContext`].
pub trait ParseHandler {
    /// Whether this handler owns the given pair
    fn can_handle(&self, context: &ParseContext, key: &str, value: &Json) -> bool;

    /// Consumes the pair, or opens a frame and asks the coordinator to
    /// descend. `index` is the pair's position when it was an array element.
    fn start(
        &self,
        context: &mut ParseContext,
        key: &str,
        value: &Json,
        is_array_element: bool,
        index: usize,
    ) -> Result<Flow>;

    /// Closes whatever `start` opened
    fn end(&self, context: &mut ParseContext, key: &str) -> Result<()>;

    /// A pristine handler of the same kind, for forked coordinators
    fn fresh(&self) -> Box<dyn ParseHandler>;
}

/// Swallows the `"class"` marker during member walks; the enclosing table
/// handler has already acted on it.
#[derive(Debug, Default)]
pub struct ClassMarkerHandler;

impl ParseHandler for ClassMarkerHandler {
    fn can_handle(&self, _context: &ParseContext, key: &str, value: &Json) -> bool {
        key == CLASS_KEY && value.is_string()
    }

    fn start(
        &self,
        _context: &mut ParseContext,
        _key: &str,
        _value: &Json,
        _is_array_element: bool,
        _index: usize,
    ) -> Result<Flow> {
        Ok(Flow::Consumed)
    }

    fn end(&self, _context: &mut ParseContext, _key: &str) -> Result<()> {
        Ok(())
    }

    fn fresh(&self) -> Box<dyn ParseHandler> {
        Box::new(ClassMarkerHandler)
    }
}

/// Interprets `{"type": ..., "value": ...}` wrappers, the only way vectors
/// and matrices enter a document.
#[derive(Debug, Default)]
pub struct TypedValueHandler;

impl ParseHandler for TypedValueHandler {
    fn can_handle(&self, _context: &ParseContext, _key: &str, value: &Json) -> bool {
        value
            .as_object()
            .is_some_and(|o| o.contains_key(TYPE_KEY) && o.contains_key(VALUE_KEY))
    }

    fn start(
        &self,
        context: &mut ParseContext,
        key: &str,
        value: &Json,
        _is_array_element: bool,
        index: usize,
    ) -> Result<Flow> {
        let wrapper = value
            .as_object()
            .ok_or_else(|| Error::malformed("wrapper must be an object"))?;
        let kind_name = wrapper
            .get(TYPE_KEY)
            .and_then(Json::as_str)
            .ok_or_else(|| Error::malformed("wrapper 'type' must be a string"))?;
        let kind = ValueKind::from_name(kind_name).ok_or_else(|| {
            Error::malformed(format!("unknown kind '{}' in wrapper", kind_name))
        })?;
        if matches!(kind, ValueKind::Table | ValueKind::Pointer) {
            return Err(Error::malformed(format!(
                "kind '{}' cannot appear in a value wrapper",
                kind
            )));
        }
        let payload = wrapper
            .get(VALUE_KEY)
            .ok_or_else(|| Error::malformed("wrapper is missing 'value'"))?;
        let values = decode_payload(kind, payload)?;

        trace!(key, kind = %kind, count = values.len(), "typed value");
        let scope = context.current_scope();
        let mut table = scope.borrow_mut();
        let datum = table.append(key)?;
        datum.set_kind(kind)?;
        for (offset, value) in values.into_iter().enumerate() {
            datum.set(value, index + offset)?;
        }
        Ok(Flow::Consumed)
    }

    fn end(&self, _context: &mut ParseContext, _key: &str) -> Result<()> {
        Ok(())
    }

    fn fresh(&self) -> Box<dyn ParseHandler> {
        Box::new(TypedValueHandler)
    }
}

/// Turns remaining objects into child tables, constructing through the
/// factory registry when a `"class"` marker names a concrete type.
#[derive(Debug, Default)]
pub struct TableHandler;

impl ParseHandler for TableHandler {
    fn can_handle(&self, _context: &ParseContext, _key: &str, value: &Json) -> bool {
        value.is_object()
    }

    fn start(
        &self,
        context: &mut ParseContext,
        key: &str,
        value: &Json,
        _is_array_element: bool,
        index: usize,
    ) -> Result<Flow> {
        let class = value
            .as_object()
            .and_then(|o| o.get(CLASS_KEY))
            .and_then(Json::as_str);
        let parent = context.current_scope();

        let child = match class {
            Some(class_name) => {
                trace!(key, class = class_name, "constructing table");
                let factories = context.shared_factories();
                let types = context.shared_types();
                let object = factories.create(class_name, &types)?;
                Scope::adopt(&parent, object.attributes(), key)?;
                let child = object.attributes().clone();
                context.keep_object(object);
                child
            }
            None => match Scope::child_at(&parent, key, index) {
                // prescribed nested tables already exist; fill them in place
                Some(existing) => existing,
                None => Scope::append_scope(&parent, key)?,
            },
        };

        context.push_frame(key, child);
        Ok(Flow::Descend)
    }

    fn end(&self, context: &mut ParseContext, key: &str) -> Result<()> {
        let frame = context.pop_frame();
        debug_assert!(frame.is_some_and(|f| f.key == key));
        Ok(())
    }

    fn fresh(&self) -> Box<dyn ParseHandler> {
        Box::new(TableHandler)
    }
}

/// Writes bare scalars, inferring the kind from the JSON value unless the
/// target cell already declares one.
#[derive(Debug, Default)]
pub struct ScalarHandler;

impl ParseHandler for ScalarHandler {
    fn can_handle(&self, _context: &ParseContext, _key: &str, value: &Json) -> bool {
        value.is_number() || value.is_string() || value.is_boolean()
    }

    fn start(
        &self,
        context: &mut ParseContext,
        key: &str,
        value: &Json,
        _is_array_element: bool,
        index: usize,
    ) -> Result<Flow> {
        let scope = context.current_scope();
        let mut table = scope.borrow_mut();
        let datum = table.append(key)?;
        let converted = scalar_to_value(value, datum.kind())?;
        datum.set(converted, index)?;
        Ok(Flow::Consumed)
    }

    fn end(&self, _context: &mut ParseContext, _key: &str) -> Result<()> {
        Ok(())
    }

    fn fresh(&self) -> Box<dyn ParseHandler> {
        Box::new(ScalarHandler)
    }
}

/// Converts a scalar JSON value, honoring the target cell's declared kind.
/// A declared float cell accepts integer literals; everything else must
/// match exactly.
fn scalar_to_value(value: &Json, hint: Option<ValueKind>) -> Result<Value> {
    match value {
        Json::Bool(b) => Ok(Value::Integer(*b as i32)),
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Number(n) => {
            if hint == Some(ValueKind::Float) {
                return Ok(Value::Float(number_to_f32(value)?));
            }
            match n.as_i64() {
                Some(i) => {
                    let narrowed = i32::try_from(i).map_err(|_| {
                        Error::malformed(format!("integer {} does not fit in 32 bits", i))
                    })?;
                    Ok(Value::Integer(narrowed))
                }
                None => Ok(Value::Float(number_to_f32(value)?)),
            }
        }
        other => Err(Error::malformed(format!("unexpected scalar: {}", other))),
    }
}

fn number_to_f32(value: &Json) -> Result<f32> {
    value
        .as_f64()
        .map(|f| f as f32)
        .ok_or_else(|| Error::malformed(format!("expected a number, got {}", value)))
}

fn decode_i32(value: &Json) -> Result<i32> {
    let wide = value
        .as_i64()
        .ok_or_else(|| Error::malformed(format!("expected an integer, got {}", value)))?;
    i32::try_from(wide)
        .map_err(|_| Error::malformed(format!("integer {} does not fit in 32 bits", wide)))
}

fn decode_vec4(value: &Json) -> Result<Vec4> {
    let elements = value
        .as_array()
        .filter(|a| a.len() == 4)
        .ok_or_else(|| Error::malformed("a vector is an array of 4 numbers"))?;
    let mut out = [0.0f32; 4];
    for (i, element) in elements.iter().enumerate() {
        out[i] = number_to_f32(element)?;
    }
    Ok(out)
}

fn decode_mat4(value: &Json) -> Result<Mat4> {
    let rows = value
        .as_array()
        .filter(|a| a.len() == 4)
        .ok_or_else(|| Error::malformed("a matrix is an array of 4 rows"))?;
    let mut out = [[0.0f32; 4]; 4];
    for (i, row) in rows.iter().enumerate() {
        out[i] = decode_vec4(row)?;
    }
    Ok(out)
}

/// Decodes a wrapper payload into one or more values of the declared kind.
/// Scalars accept either a bare value or an array of them; a vector payload
/// is an array of 4 numbers (or an array of those), a matrix payload an
/// array of 4 rows (or an array of those).
fn decode_payload(kind: ValueKind, payload: &Json) -> Result<Vec<Value>> {
    match kind {
        ValueKind::Integer => match payload.as_array() {
            Some(elements) => elements.iter().map(|e| decode_i32(e).map(Value::Integer)).collect(),
            None => Ok(vec![Value::Integer(decode_i32(payload)?)]),
        },
        ValueKind::Float => match payload.as_array() {
            Some(elements) => elements
                .iter()
                .map(|e| number_to_f32(e).map(Value::Float))
                .collect(),
            None => Ok(vec![Value::Float(number_to_f32(payload)?)]),
        },
        ValueKind::String => match payload.as_array() {
            Some(elements) => elements
                .iter()
                .map(|e| {
                    e.as_str()
                        .map(|s| Value::String(s.to_string()))
                        .ok_or_else(|| Error::malformed("expected a string"))
                })
                .collect(),
            None => payload
                .as_str()
                .map(|s| vec![Value::String(s.to_string())])
                .ok_or_else(|| Error::malformed("expected a string")),
        },
        ValueKind::Vector => {
            let elements = payload
                .as_array()
                .ok_or_else(|| Error::malformed("a vector payload must be an array"))?;
            if elements.first().is_some_and(Json::is_array) {
                elements.iter().map(|e| decode_vec4(e).map(Value::Vector)).collect()
            } else {
                Ok(vec![Value::Vector(decode_vec4(payload)?)])
            }
        }
        ValueKind::Matrix => {
            let elements = payload
                .as_array()
                .ok_or_else(|| Error::malformed("a matrix payload must be an array"))?;
            let nested_matrices = elements
                .first()
                .and_then(Json::as_array)
                .and_then(|row| row.first())
                .is_some_and(Json::is_array);
            if nested_matrices {
                elements.iter().map(|e| decode_mat4(e).map(Value::Matrix)).collect()
            } else {
                Ok(vec![Value::Matrix(decode_mat4(payload)?)])
            }
        }
        ValueKind::Table | ValueKind::Pointer => Err(Error::malformed(format!(
            "kind '{}' cannot appear in a value wrapper",
            kind
        ))),
    }
}
