//! runstream-core
//!
//! Pull-based decoder for framed path/value streams of experiment-run data.
//! Pure Rust, no FFI.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod config;
pub mod types;
pub mod value;
pub mod varint;

// Config value codec (group keys, persisted UI state)
pub mod codec;
pub mod telemetry;

// Stream layers
pub mod stream;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::codec::{ConfigValue, DecodeError, EncodeError};
    pub use crate::config::{PipelineConfig, ReadPolicy};
    pub use crate::stream::{
        decode_records, open_input, spawn_decoder, AbortSignal, InputSource, MemoryTransport, RecordStream,
        RequestSlot, Transport,
    };
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::types::PipelineError;
    pub use crate::value::{Leaf, Node, Path, PathSegment, Record, ScalarValue};
}
