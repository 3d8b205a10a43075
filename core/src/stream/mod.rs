//! stream: pull-based decoding of framed path/value streams into records.
//!
//! Layers, leaves first:
//!
//! ```text
//! Transport -> AdjustableReader -> FrameDecoder -> PathValueDecoder -> TreeFolder
//! ```
//!
//! Each layer owns its upstream; nothing is shared between streams.

pub mod io;
pub mod cancel;
pub mod reader;
pub mod framing;
pub mod pathval;
pub mod fold;
pub mod pipeline;

pub use io::{
    channel_transport,
    open_input,
    ChannelTransport,
    ChunkSender,
    InputSource,
    MemoryTransport,
    ReadTransport,
    Transport,
};

pub use cancel::{abort_pair, AbortHandle, AbortSignal, RequestSlot};
pub use reader::{AdjustableReader, StreamError};
pub use framing::{FrameDecoder, FramingError, RawPair};
pub use pathval::{PathValueDecoder, ValueDecodeError};
pub use fold::{fold_pairs, unfold, FoldError, TreeFolder};
pub use pipeline::{decode_records, spawn_decoder, RecordReceiver, RecordStream};
