//! telemetry/counters.rs
//! Mutable counters collected while a stream is decoded.
//!
//! Converted into an immutable `TelemetrySnapshot` on request.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Deterministic counters collected during stream decoding
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeCounters {
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub frames: u64,
    pub bytes_key: u64,
    pub bytes_value: u64,
    pub leaves: u64,
    pub records: u64,
}

impl DecodeCounters {
    /// Record one chunk pulled from the transport.
    pub fn add_chunk(&mut self, len: usize) {
        self.chunks_read += 1;
        self.bytes_read += len as u64;
    }

    /// Record one complete frame.
    pub fn add_frame(&mut self, key_len: usize, value_len: usize) {
        self.frames += 1;
        self.bytes_key += key_len as u64;
        self.bytes_value += value_len as u64;
    }

    pub fn add_leaf(&mut self) {
        self.leaves += 1;
    }

    pub fn add_record(&mut self) {
        self.records += 1;
    }

    /// Bytes spent on length prefixes, assuming complete frames only.
    pub fn framing_overhead_bytes(&self) -> u64 {
        self.frames * 2 * crate::constants::LEN_PREFIX as u64
    }

    pub fn merge(&mut self, other: &DecodeCounters) {
        self.chunks_read += other.chunks_read;
        self.bytes_read += other.bytes_read;
        self.frames += other.frames;
        self.bytes_key += other.bytes_key;
        self.bytes_value += other.bytes_value;
        self.leaves += other.leaves;
        self.records += other.records;
    }
}

impl AddAssign for DecodeCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
