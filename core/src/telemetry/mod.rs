//! telemetry/mod.rs
//! Decode telemetry: counters, stage timers, and immutable snapshots.
//!
//! Each pipeline stage keeps its own counters and stage times; the record
//! stream merges them into one `TelemetrySnapshot` on request, so stages
//! never share mutable state.

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;

/// Implemented by every pipeline stage: merge the upstream stage's counters
/// and stage times first, then its own.
pub trait StageTelemetry {
    fn report(&self, counters: &mut DecodeCounters, times: &mut StageTimes);
}
