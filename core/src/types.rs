use thiserror::Error;

use crate::config::ConfigError;
use crate::stream::fold::FoldError;
use crate::stream::framing::FramingError;
use crate::stream::pathval::ValueDecodeError;
use crate::stream::reader::StreamError;

/// Unified error yielded by every pipeline stage.
/// - `From<T>` impls enable `?` across stages.
/// - The first error ends the sequence; nothing is skipped or retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure, abort, or use after failure.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Corrupt or truncated frame.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Unknown tag or malformed payload.
    #[error("value error: {0}")]
    Value(#[from] ValueDecodeError),

    /// Pair that cannot be placed in its record.
    #[error("fold error: {0}")]
    Fold(#[from] FoldError),

    /// Rejected before the first byte was read.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// `true` when the stream was cancelled rather than broken.
    pub fn is_aborted(&self) -> bool {
        matches!(self, PipelineError::Stream(StreamError::Aborted))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Stream(StreamError::Io(e))
    }
}
