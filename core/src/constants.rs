//! Protocol constants and pipeline defaults.
//!
//! Wire protocol v1:
//!
//! ```text
//! [ key_len   (u32 LE) ]
//! [ key       (key_len)   ]   path segments joined by PATH_SEPARATOR
//! [ value_len (u32 LE) ]
//! [ value     (value_len) ]   [ tag (1) ][ payload ]
//! ```

/// Version of the framing + value encoding below.
pub const PROTOCOL_VERSION: u8 = 1;

/// Width of every length prefix, in bytes.
pub const LEN_PREFIX: usize = 4;

/// Separator between path segments inside a key. Never valid in UTF-8.
pub const PATH_SEPARATOR: u8 = 0xFE;

/// Value type tags.
pub mod tags {
    pub const NULL: u8        = 0x00;
    pub const BOOL: u8        = 0x01;
    pub const INT: u8         = 0x02;
    pub const FLOAT: u8       = 0x03;
    pub const STRING: u8      = 0x04;
    pub const BLOB: u8        = 0x05;
    pub const EMPTY_ARRAY: u8 = 0x06;
    pub const EMPTY_MAP: u8   = 0x07;
    // Config codec only
    pub const ARRAY: u8       = 0x08;
    pub const MAP: u8         = 0x09;
}

/// Defaults when a config field is omitted.
pub const DEFAULT_READ_SIZE: usize = 64 * 1024; // 64 KiB
pub const DEFAULT_MAX_READ_SIZE: usize = 4 * 1024 * 1024; // 4 MiB
/// Corruption guard: no single key or value may declare more than this.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024; // 64 MiB
pub const DEFAULT_FOLD_DEPTH: usize = 1;
pub const DEFAULT_MAX_ARRAY_INDEX: u64 = 1 << 20;
/// Most `Null` slots a single pair may pad an array with.
pub const DEFAULT_MAX_ARRAY_GAP: u64 = 1024;
pub const DEFAULT_INFLIGHT_RECORDS: usize = 64;

/// Read sizes the adaptive policy snaps to (in bytes).
pub const ALLOWED_READ_SIZES: &[usize] = &[
    4 * 1024,    // 4 KiB
    16 * 1024,   // 16 KiB
    64 * 1024,   // 64 KiB
    256 * 1024,  // 256 KiB
    1024 * 1024, // 1 MiB
    4096 * 1024, // 4 MiB
];

/// Config codec: prefix on every encoded string.
pub const CONFIG_PREFIX: &str = "O-";
/// Config codec: nesting limit enforced on decode.
pub const CONFIG_MAX_DEPTH: usize = 128;
