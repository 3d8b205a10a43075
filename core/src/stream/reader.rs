//! AdjustableReader: hint-driven chunk puller over a `Transport`.
//!
//! The caller may change `size_hint` on every call. Bytes the transport
//! delivered beyond the hint stay in a pending buffer and are served first
//! on the next call, so nothing is lost or duplicated across hints.

use std::io;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::stream::cancel::AbortSignal;
use crate::stream::io::Transport;
use crate::telemetry::{DecodeCounters, Stage, StageTimes};

/// Transport-level failure. Terminal: there is no retry inside the pipeline.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("stream aborted")]
    Aborted,
    #[error("stream closed after an earlier failure")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Open,
    Eof,
    Aborted,
    Failed,
}

pub struct AdjustableReader<T: Transport> {
    transport: Option<T>,
    pending: Bytes,
    state: CursorState,
    signal: AbortSignal,
    counters: DecodeCounters,
    stage_times: StageTimes,
}

impl<T: Transport> AdjustableReader<T> {
    pub fn new(transport: T) -> Self {
        Self::with_signal(transport, AbortSignal::never())
    }

    pub fn with_signal(mut transport: T, signal: AbortSignal) -> Self {
        transport.watch_abort(&signal);
        Self {
            transport: Some(transport),
            pending: Bytes::new(),
            state: CursorState::Open,
            signal,
            counters: DecodeCounters::default(),
            stage_times: StageTimes::default(),
        }
    }

    /// Return between 1 and `size_hint` bytes, or `None` at end of stream.
    pub fn read(&mut self, size_hint: usize) -> Result<Option<Bytes>, StreamError> {
        match self.state {
            CursorState::Aborted => return Err(StreamError::Aborted),
            CursorState::Failed => return Err(StreamError::Closed),
            CursorState::Open | CursorState::Eof => {}
        }

        if self.signal.is_aborted() {
            debug!(pending = self.pending.len(), "[READER] abort requested, releasing transport");
            self.state = CursorState::Aborted;
            self.pending = Bytes::new();
            self.release();
            return Err(StreamError::Aborted);
        }

        let hint = size_hint.max(1);

        while self.pending.is_empty() {
            if self.state == CursorState::Eof {
                return Ok(None);
            }
            self.pull(hint)?;
        }

        let n = hint.min(self.pending.len());
        Ok(Some(self.pending.split_to(n)))
    }

    /// Put unconsumed bytes back in front of the stream.
    pub fn push_back(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        if self.pending.is_empty() {
            self.pending = bytes;
        } else {
            let mut joined = BytesMut::with_capacity(bytes.len() + self.pending.len());
            joined.extend_from_slice(&bytes);
            joined.extend_from_slice(&self.pending);
            self.pending = joined.freeze();
        }
    }

    /// Bytes already pulled from the transport but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn is_eof(&self) -> bool {
        self.state == CursorState::Eof && self.pending.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.transport.is_none()
    }

    pub fn counters(&self) -> &DecodeCounters {
        &self.counters
    }

    pub fn stage_times(&self) -> &StageTimes {
        &self.stage_times
    }

    /// Release the transport now. Buffered bytes stay readable.
    pub fn release(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.release();
            trace!("[READER] transport released");
        }
    }

    fn pull(&mut self, hint: usize) -> Result<(), StreamError> {
        let Some(transport) = self.transport.as_mut() else {
            self.state = CursorState::Eof;
            return Ok(());
        };

        let start = Instant::now();
        let res = transport.read_chunk(hint);
        self.stage_times.add(Stage::Read, start.elapsed());

        match res {
            Ok(Some(chunk)) => {
                trace!(len = chunk.len(), hint, "[READER] chunk");
                self.counters.add_chunk(chunk.len());
                self.pending = chunk;
                Ok(())
            }
            Ok(None) => {
                debug!(bytes = self.counters.bytes_read, chunks = self.counters.chunks_read, "[READER] end of stream");
                self.state = CursorState::Eof;
                self.release();
                Ok(())
            }
            Err(_) if self.signal.is_aborted() => {
                debug!("[READER] abort woke a blocked pull, releasing transport");
                self.state = CursorState::Aborted;
                self.pending = Bytes::new();
                self.release();
                Err(StreamError::Aborted)
            }
            Err(e) => {
                warn!(error = %e, "[READER] transport failed");
                self.state = CursorState::Failed;
                self.release();
                Err(StreamError::Io(e))
            }
        }
    }
}

impl<T: Transport> Drop for AdjustableReader<T> {
    fn drop(&mut self) {
        self.release();
    }
}
