//! TreeFolder: groups `(Path, Leaf)` pairs into one `Record` per top-level key.
//!
//! Relies on the stream delivering all pairs of a key contiguously, so a key
//! change (or the end of input) is enough to close a record. No look-ahead,
//! no rewind.

use std::collections::HashMap;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::telemetry::{DecodeCounters, Stage, StageTelemetry, StageTimes};
use crate::types::PipelineError;
use crate::value::{Leaf, Node, Path, PathSegment, Record};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FoldError {
    #[error("path `{path}` has {len} segments, fold depth is {depth}")]
    ShallowPath { path: String, len: usize, depth: usize },
    #[error("array index {index} under `{path}` exceeds limit {max}")]
    IndexOutOfRange { path: String, index: u64, max: u64 },
    #[error("key `{key}` under `{path}` targets an array")]
    KeyKindConflict { path: String, key: String },
    #[error("leaf at `{path}` lands on an existing container")]
    LeafOnContainer { path: String },
}

/// Bounds on array growth. `max_gap` caps the `Null` padding one pair may add.
#[derive(Debug, Clone, Copy)]
struct ArrayLimits {
    max_index: u64,
    max_gap: u64,
}

/// Position of every map entry in the open record, keyed by its path below
/// the record key. Containers are never replaced once created, so entries
/// never go stale.
type MapSlots = HashMap<Vec<PathSegment>, usize>;

struct Accumulator {
    key: Path,
    root: Node,
    slots: MapSlots,
    leaves: usize,
}

pub struct TreeFolder<I> {
    inner: I,
    fold_depth: usize,
    limits: ArrayLimits,
    current: Option<Accumulator>,
    done: bool,
    counters: DecodeCounters,
    stage_times: StageTimes,
}

impl<I> TreeFolder<I>
where
    I: Iterator<Item = Result<(Path, Leaf), PipelineError>>,
{
    pub fn new(inner: I, config: &PipelineConfig) -> Self {
        Self {
            inner,
            fold_depth: config.fold_depth.max(1),
            limits: ArrayLimits {
                max_index: config.max_array_index,
                max_gap: config.max_array_gap,
            },
            current: None,
            done: false,
            counters: DecodeCounters::default(),
            stage_times: StageTimes::default(),
        }
    }

    pub fn with_fold_depth(inner: I, fold_depth: usize) -> Self {
        Self::new(inner, &PipelineConfig::default().with_fold_depth(fold_depth))
    }

    pub fn fold_depth(&self) -> usize {
        self.fold_depth
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    fn finish(&mut self, acc: Accumulator) -> Record {
        self.counters.add_record();
        trace!(key = %acc.key, leaves = acc.leaves, "[FOLD] record complete");
        Record { key: acc.key, root: acc.root }
    }

    /// Insert one pair; returns the record it closed, if any.
    fn accept(&mut self, path: Path, leaf: Leaf) -> Result<Option<Record>, FoldError> {
        if path.len() < self.fold_depth {
            return Err(FoldError::ShallowPath {
                path: path.to_string(),
                len: path.len(),
                depth: self.fold_depth,
            });
        }

        let (prefix, rest) = path.segments().split_at(self.fold_depth);

        let closed = match &self.current {
            Some(acc) if acc.key.segments() == prefix => None,
            _ => self.current.replace(Accumulator {
                key: Path::new(prefix.to_vec()),
                root: Node::null(),
                slots: MapSlots::new(),
                leaves: 0,
            }),
        };

        let limits = self.limits;
        if let Some(acc) = self.current.as_mut() {
            place(&mut acc.root, &mut acc.slots, rest, leaf, limits)?;
            acc.leaves += 1;
        }

        Ok(closed.map(|acc| self.finish(acc)))
    }
}

impl<I> Iterator for TreeFolder<I>
where
    I: Iterator<Item = Result<(Path, Leaf), PipelineError>>,
{
    type Item = Result<Record, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            match self.inner.next() {
                None => {
                    self.done = true;
                    let last = self.current.take()?;
                    return Some(Ok(self.finish(last)));
                }
                Some(Err(e)) => {
                    self.done = true;
                    if let Some(acc) = self.current.take() {
                        debug!(key = %acc.key, leaves = acc.leaves, "[FOLD] upstream failed, discarding partial record");
                    }
                    return Some(Err(e));
                }
                Some(Ok((path, leaf))) => {
                    let start = Instant::now();
                    let res = self.accept(path, leaf);
                    self.stage_times.add(Stage::Fold, start.elapsed());

                    match res {
                        Ok(Some(record)) => return Some(Ok(record)),
                        Ok(None) => continue,
                        Err(e) => {
                            self.done = true;
                            self.current = None;
                            return Some(Err(e.into()));
                        }
                    }
                }
            }
        }
    }
}

impl<I: StageTelemetry> StageTelemetry for TreeFolder<I> {
    fn report(&self, counters: &mut DecodeCounters, times: &mut StageTimes) {
        self.inner.report(counters, times);
        counters.merge(&self.counters);
        times.merge(&self.stage_times);
    }
}

fn container_for(segment: &PathSegment) -> Node {
    match segment {
        PathSegment::Index(_) => Node::Array(Vec::new()),
        PathSegment::Key(_) => Node::Map(Vec::new()),
    }
}

fn trail(rest: &[PathSegment], pos: usize) -> String {
    Path::new(rest[..pos].to_vec()).to_string()
}

/// Store `leaf` at `rest` below `root`, creating containers on demand.
///
/// Once a position holds a container its kind is fixed: a later child of
/// the other kind is a `KeyKindConflict`, and a leaf landing on it is a
/// `LeafOnContainer` (a marker of the same kind is a no-op). A scalar is
/// still overwritten by a later scalar or by a container.
fn place(
    root: &mut Node,
    slots: &mut MapSlots,
    rest: &[PathSegment],
    leaf: Leaf,
    limits: ArrayLimits,
) -> Result<(), FoldError> {
    let mut node = root;
    let mut at: Vec<PathSegment> = Vec::with_capacity(rest.len());
    for pos in 0..rest.len() {
        node = child(node, slots, rest, pos, &mut at, limits)?;
    }

    let same_kind = matches!(
        (&leaf, &*node),
        (Leaf::EmptyArray, Node::Array(_)) | (Leaf::EmptyMap, Node::Map(_))
    );
    if same_kind {
        return Ok(());
    }
    match node {
        Node::Scalar(_) => {
            *node = leaf.into_node();
            Ok(())
        }
        Node::Array(_) | Node::Map(_) => Err(FoldError::LeafOnContainer { path: trail(rest, rest.len()) }),
    }
}

/// Step from `node` into its child named by `rest[pos]`. `at` tracks the
/// normalised path walked so far.
fn child<'n>(
    node: &'n mut Node,
    slots: &mut MapSlots,
    rest: &[PathSegment],
    pos: usize,
    at: &mut Vec<PathSegment>,
    limits: ArrayLimits,
) -> Result<&'n mut Node, FoldError> {
    let head = &rest[pos];
    match node {
        Node::Scalar(_) => {
            *node = container_for(head);
            child(node, slots, rest, pos, at, limits)
        }
        Node::Array(items) => match head {
            PathSegment::Index(index) => {
                let index = *index;
                let max = limits.max_index.min((items.len() as u64).saturating_add(limits.max_gap));
                let out_of_range = || FoldError::IndexOutOfRange { path: trail(rest, pos), index, max };
                if index > max {
                    return Err(out_of_range());
                }
                let i = usize::try_from(index).map_err(|_| out_of_range())?;
                if i >= items.len() {
                    items.resize(i + 1, Node::null());
                }
                at.push(PathSegment::Index(index));
                Ok(&mut items[i])
            }
            PathSegment::Key(key) => Err(FoldError::KeyKindConflict { path: trail(rest, pos), key: key.clone() }),
        },
        Node::Map(entries) => {
            let key = match head {
                PathSegment::Key(k) => k.clone(),
                PathSegment::Index(i) => i.to_string(),
            };
            at.push(PathSegment::Key(key.clone()));
            let slot = match slots.get(at.as_slice()) {
                Some(&slot) => slot,
                None => {
                    entries.push((key, Node::null()));
                    let slot = entries.len() - 1;
                    slots.insert(at.clone(), slot);
                    slot
                }
            };
            Ok(&mut entries[slot].1)
        }
    }
}

/// Flatten a record back into `(Path, Leaf)` pairs, depth first in node order.
pub fn unfold(record: &Record) -> Vec<(Path, Leaf)> {
    let mut out = Vec::new();
    let mut path = record.key.clone();
    unfold_node(&record.root, &mut path, &mut out);
    out
}

fn unfold_node(node: &Node, path: &mut Path, out: &mut Vec<(Path, Leaf)>) {
    match node {
        Node::Scalar(v) => out.push((path.clone(), Leaf::Scalar(v.clone()))),
        Node::Array(items) if items.is_empty() => out.push((path.clone(), Leaf::EmptyArray)),
        Node::Map(entries) if entries.is_empty() => out.push((path.clone(), Leaf::EmptyMap)),
        Node::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(i as u64));
                unfold_node(item, path, out);
                path.0.pop();
            }
        }
        Node::Map(entries) => {
            for (key, child) in entries {
                path.push(PathSegment::Key(key.clone()));
                unfold_node(child, path, out);
                path.0.pop();
            }
        }
    }
}

/// Fold an in-memory pair sequence with the default limits.
pub fn fold_pairs<I>(pairs: I, fold_depth: usize) -> Result<Vec<Record>, PipelineError>
where
    I: IntoIterator<Item = (Path, Leaf)>,
{
    TreeFolder::with_fold_depth(pairs.into_iter().map(Ok), fold_depth).collect()
}
