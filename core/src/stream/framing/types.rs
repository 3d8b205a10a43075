use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// One frame exactly as read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPair {
    pub key: Bytes,
    pub value: Bytes,
}

impl RawPair {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// Encoded size of this pair including both length prefixes.
    pub fn wire_len(&self) -> usize {
        2 * crate::constants::LEN_PREFIX + self.key.len() + self.value.len()
    }
}

/// Which part of a frame was being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePart {
    KeyLen,
    Key,
    ValueLen,
    Value,
}

impl fmt::Display for FramePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FramePart::KeyLen   => "key length",
            FramePart::Key      => "key",
            FramePart::ValueLen => "value length",
            FramePart::Value    => "value",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("{part} declares {declared} bytes, limit is {max}")]
    FrameTooLarge {
        part: FramePart,
        declared: usize,
        max: usize,
    },
    #[error("stream ended inside {part}: needed {needed} bytes, had {available}")]
    Truncated {
        part: FramePart,
        needed: usize,
        available: usize,
    },
}
