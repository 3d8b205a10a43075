//! value.rs
//! Value model shared by the decode pipeline: paths, scalars and record trees.

use std::fmt;

use bytes::Bytes;

/// One segment of a path: a map key or an array position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(u64),
}

impl PathSegment {
    /// Lexical classification: non-empty, ASCII digits only, fits `u64`.
    pub fn classify(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(idx) = segment.parse::<u64>() {
                return PathSegment::Index(idx);
            }
        }
        PathSegment::Key(segment.to_string())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Key(s.to_string())
    }
}

impl From<u64> for PathSegment {
    fn from(i: u64) -> Self {
        PathSegment::Index(i)
    }
}

/// Ordered list of segments locating a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(pub Vec<PathSegment>);

impl Path {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Path(segments)
    }

    /// Build from dotted text, classifying each part lexically.
    /// `"runA.params.0"` -> `[Key(runA), Key(params), Index(0)]`.
    pub fn parse_dotted(s: &str) -> Self {
        if s.is_empty() {
            return Path::default();
        }
        Path(s.split('.').map(PathSegment::classify).collect())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

/// Typed leaf value.
///
/// Equality compares floats by bit pattern: a NaN equals the identical NaN
/// and never equals `Null` or `Float(0.0)`.
#[derive(Debug, Clone)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Blob(Bytes),
}

impl ScalarValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Bool(_) => "bool",
            ScalarValue::Int(_) => "int",
            ScalarValue::Float(_) => "float",
            ScalarValue::String(_) => "string",
            ScalarValue::Blob(_) => "blob",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        use ScalarValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Blob(a), Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::String(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::String(v)
    }
}

/// Payload of one value frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    Scalar(ScalarValue),
    EmptyArray,
    EmptyMap,
}

impl Leaf {
    pub fn into_node(self) -> Node {
        match self {
            Leaf::Scalar(v) => Node::Scalar(v),
            Leaf::EmptyArray => Node::Array(Vec::new()),
            Leaf::EmptyMap => Node::Map(Vec::new()),
        }
    }
}

impl From<ScalarValue> for Leaf {
    fn from(v: ScalarValue) -> Self {
        Leaf::Scalar(v)
    }
}

/// Record tree node. Maps keep first-insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Scalar(ScalarValue),
    Array(Vec<Node>),
    Map(Vec<(String, Node)>),
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(ScalarValue::Null)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn index(&self, idx: usize) -> Option<&Node> {
        match self {
            Node::Array(items) => items.get(idx),
            _ => None,
        }
    }

    /// Walk a path from this node.
    pub fn lookup(&self, path: &Path) -> Option<&Node> {
        path.segments().iter().try_fold(self, |node, seg| match seg {
            PathSegment::Key(k) => node.get(k),
            PathSegment::Index(i) => node.index(usize::try_from(*i).ok()?),
        })
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Node::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Number of scalar leaves below (and including) this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Scalar(_) => 1,
            Node::Array(items) => items.iter().map(Node::leaf_count).sum(),
            Node::Map(entries) => entries.iter().map(|(_, v)| v.leaf_count()).sum(),
        }
    }
}

impl From<ScalarValue> for Node {
    fn from(v: ScalarValue) -> Self {
        Node::Scalar(v)
    }
}

// Scalar shorthands for `Leaf` and `Node`.
macro_rules! scalar_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Leaf {
                fn from(v: $t) -> Self {
                    Leaf::Scalar(ScalarValue::from(v))
                }
            }

            impl From<$t> for Node {
                fn from(v: $t) -> Self {
                    Node::Scalar(ScalarValue::from(v))
                }
            }
        )*
    };
}

scalar_from!(bool, i64, f64, &str, String);

/// A fully folded tree identified by its key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Path,
    pub root: Node,
}

impl Record {
    /// Key prefix rendered as text, e.g. `"runA"`.
    pub fn key_string(&self) -> String {
        self.key.to_string()
    }

    pub fn into_parts(self) -> (String, Node) {
        (self.key.to_string(), self.root)
    }
}
