use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A decoded message or field value.
///
/// Rather than generating a bespoke Rust type per schema-declared record (the
/// original generated Python source modules at runtime for this), every
/// decoded value is represented uniformly by this tagged tree. Record field
/// order is preserved via `IndexMap` so re-serialization matches declaration
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    Record(IndexMap<String, Value>),
    Enum { type_name: String, index: u8, name: String },
    // `Array` must come before `Bytes`: JSON has no distinct byte-string
    // shape, so both serialize as a plain number array and `#[serde(untagged)]`
    // picks whichever variant is tried first on deserialize. Ordering `Array`
    // first keeps schema-declared arrays (the common case) round-tripping as
    // `Array` through the repr cache; a `Bytes` value (CameraImage/JPEGImage
    // raw pixels) instead comes back as `Array(vec![U8(..), ...])`, which
    // `Value::as_bytes` no longer recognizes. Those two built-ins persist
    // their own interlace/layout metadata inside the record they return
    // (see `decoder::decode_camera_image`), so a caller should match on the
    // record's fields rather than call `as_bytes` on a cache-reloaded image.
    Array(Vec<Value>),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Record(m) => Some(m),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_record().and_then(|m| m.get(name))
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            Value::I32(v) => Some(*v as u32),
            Value::U8(v) => Some(*v as u32),
            Value::U16(v) => Some(*v as u32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The reflection-style attribute map used as a message or frame's
    /// representation dictionary.
    pub fn as_dict(&self) -> IndexMap<String, Value> {
        match self {
            Value::Record(m) => m.clone(),
            other => {
                let mut m = IndexMap::new();
                m.insert("value".to_string(), other.clone());
                m
            }
        }
    }
}
