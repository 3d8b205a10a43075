//! Zigzag LEB128 integers.
//!
//! Shared by the value frames (`Int64` payload) and the config codec
//! (integers, string lengths and item counts).

/// Longest LEB128 encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

#[inline]
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub fn write_u64(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v as u8 & 0x7F) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

pub fn write_i64(out: &mut Vec<u8>, v: i64) {
    write_u64(out, zigzag_encode(v));
}

/// Read one varint from the front of `buf`, returning the value and the
/// number of bytes consumed. `None` on a truncated, overlong or
/// non-minimal encoding, so every value has exactly one byte form.
pub fn read_u64(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        let bits = (byte & 0x7F) as u64;
        // The tenth byte may only carry the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && bits > 1 {
            return None;
        }
        value |= bits << (7 * i);
        if byte & 0x80 == 0 {
            // A zero final byte after a continuation adds nothing.
            if i > 0 && byte == 0 {
                return None;
            }
            return Some((value, i + 1));
        }
    }
    None
}

pub fn read_i64(buf: &[u8]) -> Option<(i64, usize)> {
    read_u64(buf).map(|(v, n)| (zigzag_decode(v), n))
}
