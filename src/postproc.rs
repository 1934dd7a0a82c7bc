//! Container reshaping for well-known serializable classes.
//!
//! Objects of recognized classes carry their real payload inside the
//! `writeObject` annotation stream. A post-processor turns that opaque
//! element list back into an idiomatic container under the `value` key.

use std::collections::HashMap;

use crate::error::ObjectStreamError;
use crate::handles::HandleTable;
use crate::value::{put, FieldMap, JavaValue};

/// A reshaping hook: receives the field map read so far plus the object
/// annotation elements, and returns the rewritten field map.
pub type PostProc =
    fn(&HandleTable, FieldMap, &[JavaValue]) -> Result<FieldMap, ObjectStreamError>;

/// Registry of post-processors keyed by `className@serialVersionUID`
/// (UID as lowercase hex).
#[derive(Debug, Clone)]
pub struct PostProcRegistry {
    procs: HashMap<String, PostProc>,
}

impl Default for PostProcRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PostProcRegistry {
    /// A registry with no entries.
    pub fn empty() -> Self {
        Self {
            procs: HashMap::new(),
        }
    }

    /// The default registry covering the common `java.util` containers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.insert("java.util.ArrayList@7881d21d99c7619d", list_values);
        registry.insert("java.util.ArrayDeque@207cda2e240da08b", list_values);
        registry.insert("java.util.HashMap@0507dac1c31660d1", map_entries);
        registry.insert("java.util.Hashtable@13bb0f25214ae4b8", map_entries);
        registry.insert("java.util.EnumMap@065d7df7be907ca1", enum_map_entries);
        registry.insert("java.util.HashSet@ba44859596b8b734", set_members);
        registry.insert("java.util.Date@686a81014b597419", date_millis);
        registry
    }

    pub fn insert(&mut self, key: &str, proc_fn: PostProc) {
        self.procs.insert(key.to_owned(), proc_fn);
    }

    pub fn get(&self, key: &str) -> Option<PostProc> {
        self.procs.get(key).copied()
    }
}

fn shape_err(msg: &str) -> ObjectStreamError {
    ObjectStreamError::BadContainerShape(msg.to_owned())
}

/// Reads a big-endian `i32` element count from the first annotation
/// block at the given byte offset.
fn header_size(annotations: &[JavaValue], offset: usize) -> Result<usize, ObjectStreamError> {
    let block = annotations
        .first()
        .and_then(JavaValue::as_bytes)
        .ok_or_else(|| shape_err("first annotation is not a data block"))?;
    if block.len() < offset + 4 {
        return Err(shape_err("header block too short"));
    }
    let size = i32::from_be_bytes([
        block[offset],
        block[offset + 1],
        block[offset + 2],
        block[offset + 3],
    ]);
    usize::try_from(size).map_err(|_| shape_err("negative element count"))
}

/// Resolves an annotation element to a string key, following one level
/// of back-reference. Non-string keys yield `None` and are skipped.
fn string_key(handles: &HandleTable, value: &JavaValue) -> Option<String> {
    match value {
        JavaValue::Str(s) => Some(s.clone()),
        JavaValue::Ref(wire) => match handles.get(*wire) {
            Some(JavaValue::Str(s)) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn enum_key(handles: &HandleTable, value: &JavaValue) -> Option<String> {
    match value {
        JavaValue::Enum(e) => Some(e.constant.clone()),
        JavaValue::Ref(wire) => match handles.get(*wire) {
            Some(JavaValue::Enum(e)) => Some(e.constant.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// `ArrayList` / `ArrayDeque`: size header, then one element each.
fn list_values(
    _handles: &HandleTable,
    mut fields: FieldMap,
    annotations: &[JavaValue],
) -> Result<FieldMap, ObjectStreamError> {
    let size = header_size(annotations, 0)?;
    if annotations.len() != size + 1 {
        return Err(shape_err("element count does not match size header"));
    }
    put(&mut fields, "value", JavaValue::List(annotations[1..].to_vec()));
    Ok(fields)
}

/// `HashMap` / `Hashtable`: bucket count then size, then key/value pairs.
fn map_entries(
    handles: &HandleTable,
    fields: FieldMap,
    annotations: &[JavaValue],
) -> Result<FieldMap, ObjectStreamError> {
    let size = header_size(annotations, 4)?;
    read_pairs(handles, fields, annotations, size, string_key)
}

/// `EnumMap`: size header, then key/value pairs with enum-constant keys.
fn enum_map_entries(
    handles: &HandleTable,
    fields: FieldMap,
    annotations: &[JavaValue],
) -> Result<FieldMap, ObjectStreamError> {
    let size = header_size(annotations, 0)?;
    read_pairs(handles, fields, annotations, size, enum_key)
}

fn read_pairs(
    handles: &HandleTable,
    mut fields: FieldMap,
    annotations: &[JavaValue],
    size: usize,
    key_of: fn(&HandleTable, &JavaValue) -> Option<String>,
) -> Result<FieldMap, ObjectStreamError> {
    if size * 2 + 1 > annotations.len() {
        return Err(shape_err("entry count does not match size header"));
    }
    let mut entries = Vec::with_capacity(size);
    for i in 0..size {
        let key = &annotations[2 * i + 1];
        let value = annotations[2 * i + 2].clone();
        if let Some(key) = key_of(handles, key) {
            entries.push((key, value));
        }
    }
    put(&mut fields, "value", JavaValue::Map(entries));
    Ok(fields)
}

/// `HashSet`: capacity, load factor, then size, then one member each.
fn set_members(
    handles: &HandleTable,
    mut fields: FieldMap,
    annotations: &[JavaValue],
) -> Result<FieldMap, ObjectStreamError> {
    let size = header_size(annotations, 8)?;
    if annotations.len() != size + 1 {
        return Err(shape_err("member count does not match size header"));
    }
    let mut members = Vec::with_capacity(size);
    for member in &annotations[1..] {
        if let Some(key) = string_key(handles, member) {
            members.push((key, JavaValue::Bool(true)));
        }
    }
    put(&mut fields, "value", JavaValue::Map(members));
    Ok(fields)
}

/// `Date`: eight bytes of epoch milliseconds.
fn date_millis(
    _handles: &HandleTable,
    mut fields: FieldMap,
    annotations: &[JavaValue],
) -> Result<FieldMap, ObjectStreamError> {
    let block = annotations
        .first()
        .and_then(JavaValue::as_bytes)
        .ok_or_else(|| shape_err("first annotation is not a data block"))?;
    if block.len() < 8 {
        return Err(shape_err("timestamp block too short"));
    }
    let millis = i64::from_be_bytes([
        block[0], block[1], block[2], block[3], block[4], block[5], block[6], block[7],
    ]);
    put(&mut fields, "value", JavaValue::Long(millis));
    Ok(fields)
}
