//! Emits an attribute tree back out as a document.
//!
//! The inverse of the parse grammar: scalars emit bare (single element) or
//! as arrays, vectors and matrices emit inside `{"type": ..., "value": ...}`
//! wrappers, child tables recurse. The reserved self entry, pointer cells,
//! and empty or untyped cells have no document form and are skipped.

use serde_json::{Map, Number, Value as Json};

use crate::error::{Error, Result};
use crate::model::datum::{Datum, ValueKind};
use crate::model::scope::{ScopeHandle, SELF_ATTRIBUTE};

/// Encodes a table as a JSON document value
pub fn to_json(scope: &ScopeHandle) -> Result<Json> {
    let table = scope.borrow();
    let mut out = Map::new();
    for (key, datum) in table.iter() {
        if key == SELF_ATTRIBUTE {
            continue;
        }
        let Some(kind) = datum.kind() else { continue };
        if kind == ValueKind::Pointer || datum.is_empty() {
            continue;
        }
        out.insert(key.to_string(), encode_datum(datum, kind)?);
    }
    Ok(Json::Object(out))
}

/// Encodes a table as pretty-printed document text
pub fn to_string_pretty(scope: &ScopeHandle) -> Result<String> {
    let document = to_json(scope)?;
    serde_json::to_string_pretty(&document).map_err(|e| Error::malformed(e.to_string()))
}

fn encode_datum(datum: &Datum, kind: ValueKind) -> Result<Json> {
    match kind {
        ValueKind::Integer => {
            let mut values = Vec::with_capacity(datum.len());
            for i in 0..datum.len() {
                values.push(Json::from(datum.get_integer(i)?));
            }
            Ok(unwrap_single(values))
        }
        ValueKind::Float => {
            let mut values = Vec::with_capacity(datum.len());
            for i in 0..datum.len() {
                values.push(f32_to_json(datum.get_float(i)?)?);
            }
            Ok(unwrap_single(values))
        }
        ValueKind::String => {
            let mut values = Vec::with_capacity(datum.len());
            for i in 0..datum.len() {
                values.push(Json::from(datum.get_string(i)?));
            }
            Ok(unwrap_single(values))
        }
        ValueKind::Vector => {
            let mut values = Vec::with_capacity(datum.len());
            for i in 0..datum.len() {
                let v = datum.get_vector(i)?;
                values.push(encode_vec4(&v)?);
            }
            Ok(wrap(kind, unwrap_single(values)))
        }
        ValueKind::Matrix => {
            let mut values = Vec::with_capacity(datum.len());
            for i in 0..datum.len() {
                let m = datum.get_matrix(i)?;
                let rows = m.iter().map(encode_vec4).collect::<Result<Vec<_>>>()?;
                values.push(Json::Array(rows));
            }
            Ok(wrap(kind, unwrap_single(values)))
        }
        ValueKind::Table => {
            let mut children = Vec::with_capacity(datum.len());
            for i in 0..datum.len() {
                children.push(to_json(&datum.get_scope(i)?)?);
            }
            Ok(unwrap_single(children))
        }
        ValueKind::Pointer => Err(Error::mismatch("a serializable kind", "pointer")),
    }
}

fn unwrap_single(mut values: Vec<Json>) -> Json {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Json::Array(values)
    }
}

fn wrap(kind: ValueKind, value: Json) -> Json {
    let mut wrapper = Map::new();
    wrapper.insert("type".to_string(), Json::from(kind.name()));
    wrapper.insert("value".to_string(), value);
    Json::Object(wrapper)
}

fn encode_vec4(v: &[f32; 4]) -> Result<Json> {
    let components = v.iter().map(|c| f32_to_json(*c)).collect::<Result<Vec<_>>>()?;
    Ok(Json::Array(components))
}

fn f32_to_json(value: f32) -> Result<Json> {
    Number::from_f64(value as f64)
        .map(Json::Number)
        .ok_or_else(|| Error::malformed(format!("float {} has no document form", value)))
}
