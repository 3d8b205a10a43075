use num_enum::TryFromPrimitive;
use thiserror::Error;

use crate::constants::tags;

/// Type tag in the first byte of every value frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum ValueTag {
    Null       = tags::NULL,
    Bool       = tags::BOOL,
    Int        = tags::INT,
    Float      = tags::FLOAT,
    String     = tags::STRING,
    Blob       = tags::BLOB,
    EmptyArray = tags::EMPTY_ARRAY,
    EmptyMap   = tags::EMPTY_MAP,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueDecodeError {
    #[error("key segment {segment} is not valid UTF-8")]
    InvalidKey { segment: usize },
    #[error("value frame is empty (no type tag)")]
    MissingTag,
    #[error("unknown value tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("{tag:?} payload must be {expected} bytes, got {actual}")]
    BadLength {
        tag: ValueTag,
        expected: usize,
        actual: usize,
    },
    #[error("invalid bool byte 0x{0:02x}")]
    InvalidBool(u8),
    #[error("malformed varint payload")]
    MalformedVarint,
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("{tag:?} payload has {extra} trailing bytes")]
    TrailingBytes { tag: ValueTag, extra: usize },
}
