//! config.rs
//! Pipeline configuration and the adaptive read-size policy.
//!
//! Every field has a default (see `constants`), so a JSON config only needs
//! the fields it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    ALLOWED_READ_SIZES, DEFAULT_FOLD_DEPTH, DEFAULT_INFLIGHT_RECORDS, DEFAULT_MAX_ARRAY_GAP,
    DEFAULT_MAX_ARRAY_INDEX, DEFAULT_MAX_FRAME_LEN, DEFAULT_MAX_READ_SIZE, DEFAULT_READ_SIZE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a requested read size is snapped to `ALLOWED_READ_SIZES`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPolicy {
    /// Smallest allowed size that covers the request.
    #[default]
    RoundUp,
    /// Largest allowed size not above the request.
    RoundDown,
    /// Use the request as is.
    Exact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Baseline hint passed to the transport.
    pub read_size: usize,
    /// Upper bound for any single hint.
    pub max_read_size: usize,
    pub read_policy: ReadPolicy,
    /// Largest key or value length a frame may declare.
    pub max_frame_len: usize,
    /// Leading path segments that identify a record.
    pub fold_depth: usize,
    /// Largest array index accepted while folding.
    pub max_array_index: u64,
    /// Largest jump past an array's current length; the gap is padded with
    /// `Null`, so this bounds what one pair can allocate.
    pub max_array_gap: u64,
    /// Channel capacity of the threaded decoder.
    pub inflight_records: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_size: DEFAULT_READ_SIZE,
            max_read_size: DEFAULT_MAX_READ_SIZE,
            read_policy: ReadPolicy::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            fold_depth: DEFAULT_FOLD_DEPTH,
            max_array_index: DEFAULT_MAX_ARRAY_INDEX,
            max_array_gap: DEFAULT_MAX_ARRAY_GAP,
            inflight_records: DEFAULT_INFLIGHT_RECORDS,
        }
    }
}

impl PipelineConfig {
    pub fn with_fold_depth(mut self, fold_depth: usize) -> Self {
        self.fold_depth = fold_depth;
        self
    }

    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if self.read_size == 0 {
            return Err(invalid("read_size", "must be > 0"));
        }
        if self.max_read_size < self.read_size {
            return Err(ConfigError::Invalid {
                field: "max_read_size",
                reason: format!("{} is below read_size {}", self.max_read_size, self.read_size),
            });
        }
        if self.max_frame_len == 0 || self.max_frame_len > u32::MAX as usize {
            return Err(invalid("max_frame_len", "must be in 1..=u32::MAX"));
        }
        if self.fold_depth == 0 {
            return Err(invalid("fold_depth", "must be >= 1"));
        }
        if self.inflight_records == 0 {
            return Err(invalid("inflight_records", "must be > 0"));
        }
        Ok(())
    }

    /// Hint for a read that must still deliver `missing` bytes.
    pub fn next_read_size(&self, missing: usize) -> usize {
        best_read_size(missing.max(self.read_size), self.read_policy, self.max_read_size)
    }
}

/// Snap `requested` to the allowed read sizes, clamped to `1..=max`.
pub fn best_read_size(requested: usize, policy: ReadPolicy, max: usize) -> usize {
    let size = match policy {
        ReadPolicy::Exact => requested,
        ReadPolicy::RoundUp => ALLOWED_READ_SIZES
            .iter()
            .copied()
            .find(|&allowed| requested <= allowed)
            .unwrap_or(requested),
        ReadPolicy::RoundDown => ALLOWED_READ_SIZES
            .iter()
            .copied()
            .take_while(|&allowed| allowed <= requested)
            .last()
            .unwrap_or(ALLOWED_READ_SIZES[0]),
    };
    size.clamp(1, max.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_snaps_to_next_allowed() {
        assert_eq!(best_read_size(5000, ReadPolicy::RoundUp, usize::MAX), 16 * 1024);
        assert_eq!(best_read_size(64 * 1024, ReadPolicy::RoundUp, usize::MAX), 64 * 1024);
    }

    #[test]
    fn round_up_keeps_oversized_request_but_caps_at_max() {
        assert_eq!(best_read_size(10 << 20, ReadPolicy::RoundUp, usize::MAX), 10 << 20);
        assert_eq!(best_read_size(10 << 20, ReadPolicy::RoundUp, 1 << 20), 1 << 20);
    }

    #[test]
    fn round_down_never_goes_below_smallest() {
        assert_eq!(best_read_size(100, ReadPolicy::RoundDown, usize::MAX), 4 * 1024);
        assert_eq!(best_read_size(70_000, ReadPolicy::RoundDown, usize::MAX), 64 * 1024);
    }

    #[test]
    fn exact_is_clamped_to_one() {
        assert_eq!(best_read_size(0, ReadPolicy::Exact, 10), 1);
        assert_eq!(best_read_size(7, ReadPolicy::Exact, 10), 7);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = PipelineConfig::from_json_str(r#"{ "fold_depth": 2, "read_policy": "exact" }"#).unwrap();
        assert_eq!(cfg.fold_depth, 2);
        assert_eq!(cfg.read_policy, ReadPolicy::Exact);
        assert_eq!(cfg.read_size, DEFAULT_READ_SIZE);
    }

    #[test]
    fn zero_fold_depth_is_rejected() {
        let err = PipelineConfig::default().with_fold_depth(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "fold_depth", .. }));
    }

    #[test]
    fn read_size_above_max_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.read_size = cfg.max_read_size + 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "max_read_size", .. })));
    }
}
