//! ConfigCodec: deterministic, printable encoding of nested config values.
//!
//! Used for group keys and persisted UI state, not by the stream pipeline.
//!
//! ```text
//! "O-" + base64url( value )
//!
//! value := NULL
//!        | BOOL  u8
//!        | INT   zigzag-varint
//!        | FLOAT f64 LE (8)
//!        | STRING varint-len utf8
//!        | ARRAY varint-count value*
//!        | MAP   varint-count (varint-len utf8 value)*
//! ```
//!
//! Map keys are written in the order the caller holds them. Two maps with
//! the same entries in a different order encode differently; call
//! `ConfigValue::canonical` first when a canonical key is needed.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::constants::{tags, CONFIG_MAX_DEPTH, CONFIG_PREFIX};
use crate::varint;

#[derive(Debug, Clone)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Map(Vec<(String, ConfigValue)>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing `{CONFIG_PREFIX}` prefix")]
    MissingPrefix,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unknown tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("input ends early at byte {0}")]
    Truncated(usize),
    #[error("malformed varint at byte {0}")]
    MalformedVarint(usize),
    #[error("invalid UTF-8 at byte {0}")]
    InvalidUtf8(usize),
    #[error("invalid bool byte 0x{0:02x}")]
    InvalidBool(u8),
    #[error("nesting deeper than {max}")]
    TooDeep { max: usize },
    #[error("{extra} trailing bytes")]
    TrailingBytes { extra: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("nesting deeper than {max}")]
    TooDeep { max: usize },
}

impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        use ConfigValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConfigValue {}

impl ConfigValue {
    /// Same value with every map's keys sorted, recursively.
    pub fn canonical(&self) -> ConfigValue {
        match self {
            ConfigValue::Array(items) => ConfigValue::Array(items.iter().map(ConfigValue::canonical).collect()),
            ConfigValue::Map(entries) => {
                let mut sorted: Vec<_> = entries.iter().map(|(k, v)| (k.clone(), v.canonical())).collect();
                sorted.sort_by(|a, b| a.0.cmp(&b.0));
                ConfigValue::Map(sorted)
            }
            other => other.clone(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// JSON view. Non-finite floats have no JSON form and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            ConfigValue::Null => J::Null,
            ConfigValue::Bool(b) => J::Bool(*b),
            ConfigValue::Int(i) => J::from(*i),
            ConfigValue::Float(f) => serde_json::Number::from_f64(*f).map(J::Number).unwrap_or(J::Null),
            ConfigValue::String(s) => J::String(s.clone()),
            ConfigValue::Array(items) => J::Array(items.iter().map(ConfigValue::to_json).collect()),
            ConfigValue::Map(entries) => J::Object(entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => ConfigValue::Null,
            J::Bool(b) => ConfigValue::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Int(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            J::String(s) => ConfigValue::String(s),
            J::Array(items) => ConfigValue::Array(items.into_iter().map(ConfigValue::from).collect()),
            J::Object(map) => ConfigValue::Map(map.into_iter().map(|(k, v)| (k, ConfigValue::from(v))).collect()),
        }
    }
}

// ============================================================
// Encode
// ============================================================

/// Fails only on values nested deeper than `decode` accepts, so every
/// string this returns decodes back to `value`.
pub fn encode(value: &ConfigValue) -> Result<String, EncodeError> {
    let mut body = Vec::new();
    write_value(&mut body, value, 0)?;
    let mut out = String::with_capacity(CONFIG_PREFIX.len() + body.len() * 4 / 3 + 4);
    out.push_str(CONFIG_PREFIX);
    URL_SAFE_NO_PAD.encode_string(&body, &mut out);
    Ok(out)
}

/// Encode a JSON document (e.g. a table config) as an opaque string.
pub fn encode_json(value: &serde_json::Value) -> Result<String, EncodeError> {
    encode(&ConfigValue::from(value.clone()))
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    varint::write_u64(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

fn write_value(out: &mut Vec<u8>, value: &ConfigValue, depth: usize) -> Result<(), EncodeError> {
    // Same bound as `Cursor::value`.
    if depth > CONFIG_MAX_DEPTH {
        return Err(EncodeError::TooDeep { max: CONFIG_MAX_DEPTH });
    }

    match value {
        ConfigValue::Null => out.push(tags::NULL),
        ConfigValue::Bool(b) => {
            out.push(tags::BOOL);
            out.push(*b as u8);
        }
        ConfigValue::Int(i) => {
            out.push(tags::INT);
            varint::write_i64(out, *i);
        }
        ConfigValue::Float(f) => {
            out.push(tags::FLOAT);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        ConfigValue::String(s) => {
            out.push(tags::STRING);
            write_str(out, s);
        }
        ConfigValue::Array(items) => {
            out.push(tags::ARRAY);
            varint::write_u64(out, items.len() as u64);
            for item in items {
                write_value(out, item, depth + 1)?;
            }
        }
        ConfigValue::Map(entries) => {
            out.push(tags::MAP);
            varint::write_u64(out, entries.len() as u64);
            for (k, v) in entries {
                write_str(out, k);
                write_value(out, v, depth + 1)?;
            }
        }
    }
    Ok(())
}

// ============================================================
// Decode
// ============================================================

pub fn decode(s: &str) -> Result<ConfigValue, DecodeError> {
    let b64 = s.strip_prefix(CONFIG_PREFIX).ok_or(DecodeError::MissingPrefix)?;
    let body = URL_SAFE_NO_PAD.decode(b64)?;

    let mut cur = Cursor { buf: &body, pos: 0 };
    let value = cur.value(0)?;
    if cur.pos != body.len() {
        return Err(DecodeError::TrailingBytes { extra: body.len() - cur.pos });
    }
    Ok(value)
}

pub fn decode_json(s: &str) -> Result<serde_json::Value, DecodeError> {
    decode(s).map(|v| v.to_json())
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        let end = end.ok_or(DecodeError::Truncated(self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn varint(&mut self) -> Result<u64, DecodeError> {
        let (v, used) = varint::read_u64(&self.buf[self.pos..]).ok_or(DecodeError::MalformedVarint(self.pos))?;
        self.pos += used;
        Ok(v)
    }

    fn len(&mut self) -> Result<usize, DecodeError> {
        let at = self.pos;
        usize::try_from(self.varint()?).map_err(|_| DecodeError::Truncated(at))
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.len()?;
        let at = self.pos;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8(at))
    }

    fn value(&mut self, depth: usize) -> Result<ConfigValue, DecodeError> {
        if depth > CONFIG_MAX_DEPTH {
            return Err(DecodeError::TooDeep { max: CONFIG_MAX_DEPTH });
        }

        let tag = self.byte()?;
        let value = match tag {
            tags::NULL => ConfigValue::Null,
            tags::BOOL => match self.byte()? {
                0 => ConfigValue::Bool(false),
                1 => ConfigValue::Bool(true),
                other => return Err(DecodeError::InvalidBool(other)),
            },
            tags::INT => ConfigValue::Int(varint::zigzag_decode(self.varint()?)),
            tags::FLOAT => ConfigValue::Float(f64::from_bits(LittleEndian::read_u64(self.take(8)?))),
            tags::STRING => ConfigValue::String(self.string()?),
            tags::ARRAY => {
                let count = self.len()?;
                // Every item takes at least one byte.
                let mut items = Vec::with_capacity(count.min(self.buf.len() - self.pos));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                ConfigValue::Array(items)
            }
            tags::MAP => {
                let count = self.len()?;
                let mut entries = Vec::with_capacity(count.min(self.buf.len() - self.pos));
                for _ in 0..count {
                    let key = self.string()?;
                    entries.push((key, self.value(depth + 1)?));
                }
                ConfigValue::Map(entries)
            }
            other => return Err(DecodeError::UnknownTag(other)),
        };
        Ok(value)
    }
}
