use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::constants::LEN_PREFIX;
use crate::stream::framing::types::{FramePart, FramingError};

/// Encode one key/value pair into wire format.
///
/// Layout:
///
/// ```text
/// [ key_len   (4, LE) ]
/// [ key       (N)     ]
/// [ value_len (4, LE) ]
/// [ value     (M)     ]
/// ```
pub fn encode_frame(key: &[u8], value: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut out = Vec::with_capacity(2 * LEN_PREFIX + key.len() + value.len());
    encode_frame_into(&mut out, key, value)?;
    Ok(out)
}

pub fn encode_frame_into(out: &mut Vec<u8>, key: &[u8], value: &[u8]) -> Result<(), FramingError> {
    let key_len = prefix(FramePart::KeyLen, key.len())?;
    let value_len = prefix(FramePart::ValueLen, value.len())?;

    out.extend_from_slice(&key_len.to_le_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(&value_len.to_le_bytes());
    out.extend_from_slice(value);
    Ok(())
}

fn prefix(part: FramePart, len: usize) -> Result<u32, FramingError> {
    u32::try_from(len).map_err(|_| FramingError::FrameTooLarge {
        part,
        declared: len,
        max: u32::MAX as usize,
    })
}

/// Streaming frame writer over any `Write`.
#[derive(Debug)]
pub struct FrameWriter<W: Write> {
    out: W,
    frames: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, frames: 0 }
    }

    pub fn write_pair(&mut self, key: &[u8], value: &[u8]) -> std::io::Result<()> {
        let to_io = |e: FramingError| std::io::Error::new(std::io::ErrorKind::InvalidInput, e);
        let key_len = prefix(FramePart::KeyLen, key.len()).map_err(to_io)?;
        let value_len = prefix(FramePart::ValueLen, value.len()).map_err(to_io)?;

        self.out.write_u32::<LittleEndian>(key_len)?;
        self.out.write_all(key)?;
        self.out.write_u32::<LittleEndian>(value_len)?;
        self.out.write_all(value)?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
