use crate::constants::{tags, PATH_SEPARATOR};
use crate::stream::framing::{encode_frame_into, FramingError};
use crate::value::{Leaf, Path, PathSegment, ScalarValue};
use crate::varint;

/// Join segments with the separator. Digit-only string keys re-read as
/// indices, since classification is lexical.
pub fn encode_path(path: &Path) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, seg) in path.segments().iter().enumerate() {
        if i > 0 {
            out.push(PATH_SEPARATOR);
        }
        match seg {
            PathSegment::Key(k) => out.extend_from_slice(k.as_bytes()),
            PathSegment::Index(idx) => out.extend_from_slice(idx.to_string().as_bytes()),
        }
    }
    out
}

pub fn encode_value(leaf: &Leaf) -> Vec<u8> {
    let mut out = Vec::new();
    match leaf {
        Leaf::EmptyArray => out.push(tags::EMPTY_ARRAY),
        Leaf::EmptyMap => out.push(tags::EMPTY_MAP),
        Leaf::Scalar(v) => match v {
            ScalarValue::Null => out.push(tags::NULL),
            ScalarValue::Bool(b) => {
                out.push(tags::BOOL);
                out.push(*b as u8);
            }
            ScalarValue::Int(i) => {
                out.push(tags::INT);
                varint::write_i64(&mut out, *i);
            }
            ScalarValue::Float(f) => {
                out.push(tags::FLOAT);
                out.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            ScalarValue::String(s) => {
                out.push(tags::STRING);
                out.extend_from_slice(s.as_bytes());
            }
            ScalarValue::Blob(b) => {
                out.push(tags::BLOB);
                out.extend_from_slice(b);
            }
        },
    }
    out
}

/// Append one framed `(path, leaf)` pair to `out`.
pub fn encode_pair_into(out: &mut Vec<u8>, path: &Path, leaf: &Leaf) -> Result<(), FramingError> {
    encode_frame_into(out, &encode_path(path), &encode_value(leaf))
}

/// Frame a whole pair sequence into one buffer.
pub fn encode_pairs<'a, I>(pairs: I) -> Result<Vec<u8>, FramingError>
where
    I: IntoIterator<Item = &'a (Path, Leaf)>,
{
    let mut out = Vec::new();
    for (path, leaf) in pairs {
        encode_pair_into(&mut out, path, leaf)?;
    }
    Ok(out)
}
