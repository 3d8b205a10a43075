//! telemetry/snapshot.rs
//! Immutable view of a decode run, serializable for logs and the CLI.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::DecodeCounters;
use crate::telemetry::timers::{StageTimes, TelemetryTimer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub counters: DecodeCounters,
    pub throughput_bytes_per_sec: f64,
    /// Mean leaves per emitted record.
    pub leaves_per_record: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
}

impl TelemetrySnapshot {
    pub fn from(counters: &DecodeCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();

        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_read as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let leaves_per_record = if counters.records > 0 {
            counters.leaves as f64 / counters.records as f64
        } else {
            0.0
        };

        Self {
            counters: counters.clone(),
            throughput_bytes_per_sec: throughput,
            leaves_per_record,
            elapsed,
            stage_times: timer.stage_times.clone(),
        }
    }

    pub fn total_stage_time(&self) -> Duration {
        self.stage_times.total()
    }

    /// Internal consistency:
    /// - every byte counted in a frame was read from the transport
    /// - stage times never exceed wall time
    pub fn sanity_check(&self) -> bool {
        let c = &self.counters;
        c.bytes_key + c.bytes_value + c.framing_overhead_bytes() <= c.bytes_read
            && self.total_stage_time() <= self.elapsed
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
