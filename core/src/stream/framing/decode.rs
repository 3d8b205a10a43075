use std::time::Instant;

use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::constants::LEN_PREFIX;
use crate::stream::framing::types::{FramePart, FramingError, RawPair};
use crate::stream::io::Transport;
use crate::stream::reader::{AdjustableReader, StreamError};
use crate::telemetry::{DecodeCounters, Stage, StageTelemetry, StageTimes};
use crate::types::PipelineError;

/// Lazy, single-pass frame splitter.
///
/// Frames may straddle any number of reader chunks; missing bytes are pulled
/// on demand. Fused: after the end of stream or an error it yields `None`.
pub struct FrameDecoder<T: Transport> {
    reader: AdjustableReader<T>,
    buf: BytesMut,
    config: PipelineConfig,
    done: bool,
    counters: DecodeCounters,
    stage_times: StageTimes,
}

impl<T: Transport> FrameDecoder<T> {
    pub fn new(reader: AdjustableReader<T>, config: PipelineConfig) -> Self {
        Self {
            reader,
            buf: BytesMut::new(),
            config,
            done: false,
            counters: DecodeCounters::default(),
            stage_times: StageTimes::default(),
        }
    }

    pub fn from_transport(transport: T, config: PipelineConfig) -> Self {
        Self::new(AdjustableReader::new(transport), config)
    }

    pub fn reader(&self) -> &AdjustableReader<T> {
        &self.reader
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Make sure `needed` bytes are buffered. `false` if the stream ended first.
    fn fill(&mut self, needed: usize) -> Result<bool, StreamError> {
        while self.buf.len() < needed {
            let hint = self.config.next_read_size(needed - self.buf.len());
            match self.reader.read(hint)? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    fn read_len(&mut self, part: FramePart) -> Result<Option<usize>, PipelineError> {
        if !self.fill(LEN_PREFIX)? {
            // A clean end is only possible before a new frame starts.
            if part == FramePart::KeyLen && self.buf.is_empty() {
                return Ok(None);
            }
            return Err(FramingError::Truncated {
                part,
                needed: LEN_PREFIX,
                available: self.buf.len(),
            }
            .into());
        }

        let declared = LittleEndian::read_u32(&self.buf[..LEN_PREFIX]) as usize;
        self.buf.advance(LEN_PREFIX);

        if declared > self.config.max_frame_len {
            return Err(FramingError::FrameTooLarge {
                part,
                declared,
                max: self.config.max_frame_len,
            }
            .into());
        }
        Ok(Some(declared))
    }

    fn read_payload(&mut self, part: FramePart, len: usize) -> Result<bytes::Bytes, PipelineError> {
        if !self.fill(len)? {
            return Err(FramingError::Truncated {
                part,
                needed: len,
                available: self.buf.len(),
            }
            .into());
        }
        Ok(self.buf.split_to(len).freeze())
    }

    fn next_pair(&mut self) -> Result<Option<RawPair>, PipelineError> {
        let Some(key_len) = self.read_len(FramePart::KeyLen)? else {
            return Ok(None);
        };
        let key = self.read_payload(FramePart::Key, key_len)?;

        let value_len = self
            .read_len(FramePart::ValueLen)?
            .ok_or(FramingError::Truncated { part: FramePart::ValueLen, needed: LEN_PREFIX, available: 0 })?;
        let value = self.read_payload(FramePart::Value, value_len)?;

        self.counters.add_frame(key_len, value_len);
        trace!(key_len, value_len, "[FRAME] pair");
        Ok(Some(RawPair { key, value }))
    }
}

impl<T: Transport> Iterator for FrameDecoder<T> {
    type Item = Result<RawPair, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = Instant::now();
        let read_before = self.reader.stage_times().get(Stage::Read);
        let res = self.next_pair();
        let read_spent = self.reader.stage_times().get(Stage::Read).saturating_sub(read_before);
        self.stage_times.add(Stage::Frame, start.elapsed().saturating_sub(read_spent));

        match res {
            Ok(Some(pair)) => Some(Ok(pair)),
            Ok(None) => {
                debug!(frames = self.counters.frames, "[FRAME] stream complete");
                self.done = true;
                None
            }
            Err(e) => {
                debug!(error = %e, "[FRAME] decode failed, dropping stream");
                self.done = true;
                self.buf.clear();
                self.reader.release();
                Some(Err(e))
            }
        }
    }
}

impl<T: Transport> StageTelemetry for FrameDecoder<T> {
    fn report(&self, counters: &mut DecodeCounters, times: &mut StageTimes) {
        counters.merge(self.reader.counters());
        times.merge(self.reader.stage_times());
        counters.merge(&self.counters);
        times.merge(&self.stage_times);
    }
}
