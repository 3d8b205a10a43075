//! Wire framing: length-prefixed key/value frames.
//!
//! Responsibilities:
//! - Split a byte stream into `RawPair`s, reassembling across chunks
//! - Guard against corrupt length prefixes
//! - Encode pairs back into the same layout
//!
//! Non-responsibilities:
//! - Path or value interpretation
//! - Record grouping

pub mod types;
pub mod encode;
pub mod decode;

pub use types::{FramePart, FramingError, RawPair};
pub use encode::{encode_frame, encode_frame_into, FrameWriter};
pub use decode::FrameDecoder;
