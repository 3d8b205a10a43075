//! Path/value layer: key bytes -> `Path`, value bytes -> typed `Leaf`.

pub mod types;
pub mod encode;
pub mod decode;

pub use types::{ValueDecodeError, ValueTag};
pub use encode::{encode_pair_into, encode_pairs, encode_path, encode_value};
pub use decode::{decode_pair, decode_path, decode_value, PathValueDecoder};
