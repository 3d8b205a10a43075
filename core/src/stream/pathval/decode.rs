use std::time::Instant;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::constants::PATH_SEPARATOR;
use crate::stream::framing::RawPair;
use crate::stream::pathval::types::{ValueDecodeError, ValueTag};
use crate::telemetry::{DecodeCounters, Stage, StageTelemetry, StageTimes};
use crate::types::PipelineError;
use crate::value::{Leaf, Path, PathSegment, ScalarValue};
use crate::varint;

/// Split key bytes on the separator and classify each segment lexically.
pub fn decode_path(key: &[u8]) -> Result<Path, ValueDecodeError> {
    if key.is_empty() {
        return Ok(Path::default());
    }
    key.split(|b| *b == PATH_SEPARATOR)
        .enumerate()
        .map(|(segment, raw)| {
            std::str::from_utf8(raw)
                .map(PathSegment::classify)
                .map_err(|_| ValueDecodeError::InvalidKey { segment })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Path::new)
}

/// Decode a tagged value payload. Blobs are zero-copy slices of `value`.
pub fn decode_value(value: Bytes) -> Result<Leaf, ValueDecodeError> {
    let Some(&raw_tag) = value.first() else {
        return Err(ValueDecodeError::MissingTag);
    };
    let tag = ValueTag::try_from(raw_tag).map_err(|_| ValueDecodeError::UnknownTag(raw_tag))?;
    let payload = value.slice(1..);

    let leaf = match tag {
        ValueTag::Null => {
            expect_empty(tag, &payload)?;
            Leaf::Scalar(ScalarValue::Null)
        }
        ValueTag::Bool => {
            expect_len(tag, &payload, 1)?;
            match payload[0] {
                0 => Leaf::Scalar(ScalarValue::Bool(false)),
                1 => Leaf::Scalar(ScalarValue::Bool(true)),
                other => return Err(ValueDecodeError::InvalidBool(other)),
            }
        }
        ValueTag::Int => {
            let (v, used) = varint::read_i64(&payload).ok_or(ValueDecodeError::MalformedVarint)?;
            if used != payload.len() {
                return Err(ValueDecodeError::TrailingBytes { tag, extra: payload.len() - used });
            }
            Leaf::Scalar(ScalarValue::Int(v))
        }
        ValueTag::Float => {
            expect_len(tag, &payload, 8)?;
            // from_bits keeps NaN payloads and signed infinities as sent.
            Leaf::Scalar(ScalarValue::Float(f64::from_bits(LittleEndian::read_u64(&payload))))
        }
        ValueTag::String => {
            let s = std::str::from_utf8(&payload).map_err(|_| ValueDecodeError::InvalidUtf8)?;
            Leaf::Scalar(ScalarValue::String(s.to_string()))
        }
        ValueTag::Blob => Leaf::Scalar(ScalarValue::Blob(payload)),
        ValueTag::EmptyArray => {
            expect_empty(tag, &payload)?;
            Leaf::EmptyArray
        }
        ValueTag::EmptyMap => {
            expect_empty(tag, &payload)?;
            Leaf::EmptyMap
        }
    };
    Ok(leaf)
}

pub fn decode_pair(pair: RawPair) -> Result<(Path, Leaf), ValueDecodeError> {
    let path = decode_path(&pair.key)?;
    let leaf = decode_value(pair.value)?;
    Ok((path, leaf))
}

fn expect_len(tag: ValueTag, payload: &[u8], expected: usize) -> Result<(), ValueDecodeError> {
    if payload.len() != expected {
        return Err(ValueDecodeError::BadLength { tag, expected, actual: payload.len() });
    }
    Ok(())
}

fn expect_empty(tag: ValueTag, payload: &[u8]) -> Result<(), ValueDecodeError> {
    if !payload.is_empty() {
        return Err(ValueDecodeError::TrailingBytes { tag, extra: payload.len() });
    }
    Ok(())
}

/// Turns `RawPair`s into `(Path, Leaf)`s. Fused on first error.
pub struct PathValueDecoder<I> {
    inner: I,
    done: bool,
    counters: DecodeCounters,
    stage_times: StageTimes,
}

impl<I> PathValueDecoder<I>
where
    I: Iterator<Item = Result<RawPair, PipelineError>>,
{
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            done: false,
            counters: DecodeCounters::default(),
            stage_times: StageTimes::default(),
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

impl<I> Iterator for PathValueDecoder<I>
where
    I: Iterator<Item = Result<RawPair, PipelineError>>,
{
    type Item = Result<(Path, Leaf), PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let pair = match self.inner.next() {
            Some(Ok(pair)) => pair,
            Some(Err(e)) => {
                self.done = true;
                return Some(Err(e));
            }
            None => {
                self.done = true;
                return None;
            }
        };

        let start = Instant::now();
        let res = decode_pair(pair);
        self.stage_times.add(Stage::Decode, start.elapsed());

        match res {
            Ok(decoded) => {
                self.counters.add_leaf();
                Some(Ok(decoded))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

impl<I: StageTelemetry> StageTelemetry for PathValueDecoder<I> {
    fn report(&self, counters: &mut DecodeCounters, times: &mut StageTimes) {
        self.inner.report(counters, times);
        counters.merge(&self.counters);
        times.merge(&self.stage_times);
    }
}
