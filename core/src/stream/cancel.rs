//! Cooperative cancellation for in-flight streams.
//!
//! There is no global "current request". Whoever issues a request owns its
//! `AbortHandle`; the decode chain only sees the matching `AbortSignal`.
//!
//! Besides the flag polled before each pull, a signal carries a wake
//! channel that disconnects on abort, so a transport blocked on a channel
//! receive can `select!` on it and return early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::debug;

#[derive(Debug)]
struct AbortState {
    flag: AtomicBool,
    // Dropped on abort; never sent on.
    wake: Mutex<Option<Sender<()>>>,
}

/// Caller side: abort the stream this handle was issued for.
#[derive(Debug)]
pub struct AbortHandle {
    state: Arc<AbortState>,
}

/// Reader side: polled before every transport pull.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    state: Arc<AbortState>,
    woken: Receiver<()>,
}

/// Create a linked handle/signal pair.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (wake, woken) = bounded(0);
    let state = Arc::new(AbortState {
        flag: AtomicBool::new(false),
        wake: Mutex::new(Some(wake)),
    });
    (AbortHandle { state: state.clone() }, AbortSignal { state, woken })
}

impl AbortHandle {
    pub fn abort(&self) {
        self.state.flag.store(true, Ordering::Release);
        let mut wake = self.state.wake.lock().unwrap_or_else(PoisonError::into_inner);
        wake.take();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.flag.load(Ordering::Acquire)
    }
}

impl AbortSignal {
    /// A signal nobody can trigger.
    pub fn never() -> Self {
        abort_pair().1
    }

    pub fn is_aborted(&self) -> bool {
        self.state.flag.load(Ordering::Acquire)
    }

    /// Receiver that disconnects once the stream is aborted. Nothing is ever
    /// sent on it.
    pub fn woken(&self) -> &Receiver<()> {
        &self.woken
    }
}

/// One slot per logical purpose (e.g. "image batch for the explorer").
///
/// Beginning a new request aborts the one issued before it; aborted
/// streams are never resumed.
#[derive(Debug, Default)]
pub struct RequestSlot {
    current: Option<AbortHandle>,
    issued: u64,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the previous request (if any) and hand out a fresh signal.
    pub fn begin(&mut self) -> AbortSignal {
        self.abort();
        let (handle, signal) = abort_pair();
        self.current = Some(handle);
        self.issued += 1;
        signal
    }

    /// Abort the current request, leaving the slot empty.
    pub fn abort(&mut self) {
        if let Some(prev) = self.current.take() {
            debug!(request = self.issued, "aborting in-flight request");
            prev.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_aborted())
    }

    /// Requests issued so far through this slot.
    pub fn issued(&self) -> u64 {
        self.issued
    }
}

impl Drop for RequestSlot {
    fn drop(&mut self) {
        self.abort();
    }
}
