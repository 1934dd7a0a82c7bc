//! JSON-friendly projection of a decoded stream.
//!
//! The full value tree keeps every structural detail (class
//! descriptors, per-class field maps, annotation lists). The minimal
//! projection strips that down to the data a payload analyst cares
//! about: descriptors and inheritance maps are dropped, reshaped
//! containers collapse to their `value`, and binary blocks become
//! base64 strings.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Number, Value as Json};

use crate::decoder::{parse_with, DecodeOptions, Decoded};
use crate::error::ObjectStreamError;
use crate::value::{FieldMap, JavaValue};

/// Parses a stream and returns the minimal JSON form of its contents.
pub fn parse_minimal(data: &[u8]) -> Result<Vec<Json>, ObjectStreamError> {
    parse_minimal_with(data, DecodeOptions::default())
}

pub fn parse_minimal_with(
    data: &[u8],
    options: DecodeOptions,
) -> Result<Vec<Json>, ObjectStreamError> {
    let decoded = parse_with(data, options)?;
    Ok(minimal(&decoded))
}

/// Projects an already decoded stream into minimal JSON.
pub fn minimal(decoded: &Decoded) -> Vec<Json> {
    decoded
        .contents
        .iter()
        .map(|value| friendly(value, decoded, &mut Vec::new()))
        .collect()
}

fn friendly(value: &JavaValue, decoded: &Decoded, active: &mut Vec<u32>) -> Json {
    match value {
        JavaValue::Null | JavaValue::EndBlock => Json::Null,
        JavaValue::Bool(b) => Json::Bool(*b),
        JavaValue::Byte(b) => Json::from(*b),
        JavaValue::Char(code) => match char::from_u32(*code as u32) {
            Some(c) => Json::String(c.to_string()),
            None => Json::String('\u{fffd}'.to_string()),
        },
        JavaValue::Short(n) => Json::from(*n),
        JavaValue::Int(n) => Json::from(*n),
        JavaValue::Long(n) => Json::from(*n),
        JavaValue::Float(f) => float_json(*f as f64),
        JavaValue::Double(f) => float_json(*f),
        JavaValue::Str(s) => Json::String(s.clone()),
        JavaValue::Bytes(bytes) => Json::String(format!(
            "data:application/octet-stream;base64,{}",
            BASE64.encode(bytes)
        )),
        JavaValue::Object(object) => field_map_json(&object.fields, decoded, active),
        JavaValue::Array(array) => Json::Array(
            array
                .elements
                .iter()
                .map(|element| friendly(element, decoded, active))
                .collect(),
        ),
        JavaValue::Enum(e) => Json::String(e.constant.clone()),
        // Raw class descriptors never survive the minimal projection.
        JavaValue::Class(_) => Json::Null,
        JavaValue::Ref(wire) => {
            if active.contains(wire) {
                // A cycle back into a value currently being rendered.
                return Json::Null;
            }
            match decoded.handles.get(*wire) {
                Some(target) => {
                    active.push(*wire);
                    let out = friendly(target, decoded, active);
                    active.pop();
                    out
                }
                None => Json::Null,
            }
        }
        JavaValue::List(items) => Json::Array(
            items
                .iter()
                .map(|item| friendly(item, decoded, active))
                .collect(),
        ),
        JavaValue::Map(entries) => {
            let mut map = Map::new();
            for (key, entry) in entries {
                map.insert(key.clone(), friendly(entry, decoded, active));
            }
            Json::Object(map)
        }
    }
}

fn field_map_json(fields: &FieldMap, decoded: &Decoded, active: &mut Vec<u32>) -> Json {
    let mut map = Map::new();
    for (key, value) in fields {
        if key == "extends" || value.is_class() {
            continue;
        }
        map.insert(key.clone(), friendly(value, decoded, active));
    }
    unwrap_value(Json::Object(map))
}

/// Promotes `{value}` and `{value, @, ...}` maps to their `value`.
fn unwrap_value(json: Json) -> Json {
    if let Json::Object(ref map) = json {
        if let Some(value) = map.get("value") {
            if map.contains_key("@") || map.len() == 1 {
                return value.clone();
            }
        }
    }
    json
}

/// Re-applies the minimal rewrite rules to a JSON tree: drops `extends`
/// keys and unwraps `value` maps. The projection is a fixpoint of this.
pub fn minimize_tree(json: &Json) -> Json {
    match json {
        Json::Array(items) => Json::Array(items.iter().map(minimize_tree).collect()),
        Json::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if key == "extends" {
                    continue;
                }
                out.insert(key.clone(), minimize_tree(value));
            }
            unwrap_value(Json::Object(out))
        }
        other => other.clone(),
    }
}

fn float_json(f: f64) -> Json {
    match Number::from_f64(f) {
        Some(n) => Json::Number(n),
        None => Json::Null,
    }
}
