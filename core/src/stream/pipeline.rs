//! Pipeline wiring: reader -> frames -> path/values -> records.
//!
//! `decode_records` runs the chain on the caller's thread; the only place it
//! blocks is the transport pull. `spawn_decoder` moves the same chain onto a
//! worker thread behind a bounded channel, keeping record order and
//! backpressure.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::stream::cancel::{abort_pair, AbortHandle, AbortSignal};
use crate::stream::fold::TreeFolder;
use crate::stream::framing::FrameDecoder;
use crate::stream::io::Transport;
use crate::stream::pathval::PathValueDecoder;
use crate::stream::reader::AdjustableReader;
use crate::telemetry::{DecodeCounters, StageTelemetry, StageTimes, TelemetrySnapshot, TelemetryTimer};
use crate::types::PipelineError;
use crate::value::Record;

type Chain<T> = TreeFolder<PathValueDecoder<FrameDecoder<T>>>;

// ============================================================
// Pull-based stream
// ============================================================

/// Ordered, lazy sequence of records from one transport.
pub struct RecordStream<T: Transport> {
    chain: Chain<T>,
    timer: TelemetryTimer,
    finished: bool,
}

impl<T: Transport> RecordStream<T> {
    pub fn new(transport: T, config: PipelineConfig) -> Result<Self, PipelineError> {
        Self::with_signal(transport, config, AbortSignal::never())
    }

    pub fn with_signal(transport: T, config: PipelineConfig, signal: AbortSignal) -> Result<Self, PipelineError> {
        config.validate()?;
        debug!(?config, "[PIPELINE] start");

        let reader = AdjustableReader::with_signal(transport, signal);
        let frames = FrameDecoder::new(reader, config.clone());
        let pairs = PathValueDecoder::new(frames);
        let chain = TreeFolder::new(pairs, &config);

        Ok(Self {
            chain,
            timer: TelemetryTimer::new(),
            finished: false,
        })
    }

    pub fn counters(&self) -> DecodeCounters {
        let mut counters = DecodeCounters::default();
        let mut times = StageTimes::default();
        self.chain.report(&mut counters, &mut times);
        counters
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut counters = DecodeCounters::default();
        let mut timer = self.timer.clone();
        self.chain.report(&mut counters, &mut timer.stage_times);
        TelemetrySnapshot::from(&counters, &timer)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self, failed: Option<&PipelineError>) {
        self.finished = true;
        self.timer.finish();
        let counters = self.counters();
        match failed {
            None => info!(records = counters.records, frames = counters.frames, bytes = counters.bytes_read, "[PIPELINE] complete"),
            Some(e) if e.is_aborted() => debug!(records = counters.records, "[PIPELINE] aborted"),
            Some(e) => warn!(error = %e, records = counters.records, "[PIPELINE] failed"),
        }
    }
}

impl<T: Transport> Iterator for RecordStream<T> {
    type Item = Result<Record, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.chain.next();
        match &item {
            None => self.finish(None),
            Some(Err(e)) => self.finish(Some(e)),
            Some(Ok(_)) => {}
        }
        item
    }
}

/// Decode records from `transport` on the current thread.
pub fn decode_records<T: Transport>(transport: T, config: PipelineConfig) -> Result<RecordStream<T>, PipelineError> {
    RecordStream::new(transport, config)
}

// ============================================================
// Threaded decoder
// ============================================================

/// Receiving end of a decoder running on its own thread.
///
/// Dropping it aborts the worker. The worker's transport is released on its
/// next pull, or at once if it is blocked on a `ChannelTransport`.
pub struct RecordReceiver {
    rx: Option<Receiver<Result<Record, PipelineError>>>,
    handle: AbortHandle,
    worker: Option<JoinHandle<TelemetrySnapshot>>,
}

impl RecordReceiver {
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Stop receiving and wait for the worker, returning its telemetry.
    /// Aborts first if records are still pending.
    pub fn finish(mut self) -> Option<TelemetrySnapshot> {
        if let Some(rx) = self.rx.take() {
            if !rx.is_empty() {
                self.handle.abort();
            }
            drop(rx);
        }
        self.worker.take()?.join().ok()
    }
}

impl Iterator for RecordReceiver {
    type Item = Result<Record, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for RecordReceiver {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.handle.abort();
        }
    }
}

/// Run the decode chain on a worker thread. At most
/// `config.inflight_records` records are buffered ahead of the consumer.
pub fn spawn_decoder<T>(transport: T, config: PipelineConfig) -> Result<RecordReceiver, PipelineError>
where
    T: Transport + Send + 'static,
{
    let (handle, signal) = abort_pair();
    let (tx, rx) = bounded(config.inflight_records.max(1));
    let mut stream = RecordStream::with_signal(transport, config, signal)?;

    let worker = thread::Builder::new()
        .name("runstream-decoder".into())
        .spawn(move || {
            debug!("[WORKER] starting");
            for item in stream.by_ref() {
                let stop = item.is_err();
                if tx.send(item).is_err() {
                    debug!("[WORKER] receiver gone, stopping");
                    break;
                }
                if stop {
                    break;
                }
            }
            debug!("[WORKER] finished");
            stream.snapshot()
        })?;

    Ok(RecordReceiver {
        rx: Some(rx),
        handle,
        worker: Some(worker),
    })
}
