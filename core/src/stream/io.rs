//! Transport seam: where the decode chain gets its bytes from.
//!
//! The request layer (HTTP client, file, test fixture) is outside this crate;
//! all the pipeline needs is a pull-based source with end-of-stream and a way
//! to release it early.

use std::io::{self, Read};
use std::path::PathBuf;

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::select;

use crate::stream::cancel::AbortSignal;
use crate::stream::reader::StreamError;

/// Pull-based byte source.
pub trait Transport {
    /// Return the next chunk, ideally about `size_hint` bytes, or `None` at
    /// end of stream. Chunks may be larger or smaller than the hint.
    fn read_chunk(&mut self, size_hint: usize) -> io::Result<Option<Bytes>>;

    /// Drop the underlying resource. Later reads report end of stream.
    fn release(&mut self) {}

    /// Called once by the reader that owns this transport. A transport that
    /// can block indefinitely should return from `read_chunk` with an error
    /// once `signal` fires. Plain `Read` sources cannot be interrupted and
    /// only see the abort on their next pull.
    fn watch_abort(&mut self, _signal: &AbortSignal) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_chunk(&mut self, size_hint: usize) -> io::Result<Option<Bytes>> {
        (**self).read_chunk(size_hint)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn watch_abort(&mut self, signal: &AbortSignal) {
        (**self).watch_abort(signal)
    }
}

// ================= Blocking readers =================

/// Any `std::io::Read` (file, socket, pipe, HTTP body reader).
#[derive(Debug)]
pub struct ReadTransport<R: Read> {
    inner: Option<R>,
}

impl<R: Read> ReadTransport<R> {
    pub fn new(reader: R) -> Self {
        Self { inner: Some(reader) }
    }
}

impl<R: Read> Transport for ReadTransport<R> {
    fn read_chunk(&mut self, size_hint: usize) -> io::Result<Option<Bytes>> {
        let Some(reader) = self.inner.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; size_hint.max(1)];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(Bytes::from(buf)));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn release(&mut self) {
        self.inner = None;
    }
}

// ================= In-memory =================

/// Serves a fixed buffer. With `chunked`, the chunk sizes are forced
/// (cycled) regardless of the hint, like a network delivering odd packets.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    data: Bytes,
    splits: Vec<usize>,
    next_split: usize,
}

impl MemoryTransport {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), splits: Vec::new(), next_split: 0 }
    }

    pub fn chunked(data: impl Into<Bytes>, splits: Vec<usize>) -> Self {
        Self { data: data.into(), splits, next_split: 0 }
    }
}

impl Transport for MemoryTransport {
    fn read_chunk(&mut self, size_hint: usize) -> io::Result<Option<Bytes>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let want = if self.splits.is_empty() {
            size_hint
        } else {
            let n = self.splits[self.next_split % self.splits.len()];
            self.next_split += 1;
            n
        };
        let n = want.clamp(1, self.data.len());
        Ok(Some(self.data.split_to(n)))
    }

    fn release(&mut self) {
        self.data = Bytes::new();
    }
}

// ================= Channel-fed =================

/// Producer half handed to the request layer. Send `Ok(chunk)` per body
/// chunk, `Err(e)` on transport failure, and drop it at end of body.
pub type ChunkSender = Sender<io::Result<Bytes>>;

/// Chunks pushed by another thread. Releasing drops the receiver, which the
/// producer observes as a failed `send`. A blocked receive wakes up when the
/// watched abort signal fires.
#[derive(Debug)]
pub struct ChannelTransport {
    rx: Option<Receiver<io::Result<Bytes>>>,
    abort: Option<Receiver<()>>,
}

impl ChannelTransport {
    pub fn new(rx: Receiver<io::Result<Bytes>>) -> Self {
        Self { rx: Some(rx), abort: None }
    }
}

/// Bounded chunk channel: at most `capacity` chunks buffered ahead.
pub fn channel_transport(capacity: usize) -> (ChunkSender, ChannelTransport) {
    let (tx, rx) = bounded(capacity);
    (tx, ChannelTransport::new(rx))
}

impl Transport for ChannelTransport {
    fn read_chunk(&mut self, _size_hint: usize) -> io::Result<Option<Bytes>> {
        let Some(rx) = self.rx.as_ref() else {
            return Ok(None);
        };
        loop {
            let msg = match &self.abort {
                Some(abort) => select! {
                    recv(rx) -> msg => msg,
                    recv(abort) -> _ => {
                        return Err(io::Error::new(io::ErrorKind::Interrupted, "aborted while waiting for a chunk"));
                    }
                },
                None => rx.recv(),
            };
            match msg {
                Ok(Ok(chunk)) if chunk.is_empty() => continue,
                Ok(Ok(chunk)) => return Ok(Some(chunk)),
                Ok(Err(e)) => return Err(e),
                // Producer dropped its sender: end of body.
                Err(_) => return Ok(None),
            }
        }
    }

    fn release(&mut self) {
        self.rx = None;
        self.abort = None;
    }

    fn watch_abort(&mut self, signal: &AbortSignal) {
        self.abort = Some(signal.woken().clone());
    }
}

// ================= Normalised input =================

/// Canonical input abstraction
pub enum InputSource {
    Reader(Box<dyn Read + Send>),
    File(PathBuf),
    Memory(Vec<u8>),
    Channel(Receiver<io::Result<Bytes>>),
}

/// Normalize an input source into a boxed transport
pub fn open_input(src: InputSource) -> Result<Box<dyn Transport + Send>, StreamError> {
    let transport: Box<dyn Transport + Send> = match src {
        InputSource::Reader(r) => Box::new(ReadTransport::new(r)),
        InputSource::File(p) => Box::new(ReadTransport::new(std::fs::File::open(p)?)),
        InputSource::Memory(b) => Box::new(MemoryTransport::new(b)),
        InputSource::Channel(rx) => Box::new(ChannelTransport::new(rx)),
    };
    Ok(transport)
}
