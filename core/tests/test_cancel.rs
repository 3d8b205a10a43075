// Request ownership: a new request in the same slot aborts the previous
// stream, and the aborted stream never yields more records.

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use runstream_core::config::PipelineConfig;
    use runstream_core::stream::pathval::encode_pairs;
    use runstream_core::stream::{
        abort_pair, channel_transport, AbortSignal, AdjustableReader, MemoryTransport, RecordStream, RequestSlot,
        StreamError,
    };
    use runstream_core::value::{Leaf, Path};

    fn data() -> Vec<u8> {
        let pairs = vec![
            (Path::parse_dotted("img1.data"), Leaf::from("aa")),
            (Path::parse_dotted("img2.data"), Leaf::from("bb")),
        ];
        encode_pairs(&pairs).unwrap()
    }

    fn stream(signal: AbortSignal) -> RecordStream<MemoryTransport> {
        RecordStream::with_signal(MemoryTransport::chunked(data(), vec![2]), PipelineConfig::default(), signal)
            .unwrap()
    }

    #[test]
    fn begin_aborts_previous_request() {
        let mut slot = RequestSlot::new();
        let first = slot.begin();
        assert!(slot.is_active());
        assert!(!first.is_aborted());

        let second = slot.begin();
        assert!(first.is_aborted());
        assert!(!second.is_aborted());
        assert_eq!(slot.issued(), 2);
    }

    #[test]
    fn superseded_stream_fails_with_aborted() {
        let mut slot = RequestSlot::new();
        let mut old = stream(slot.begin());
        let mut new = stream(slot.begin());

        let err = old.next().unwrap().unwrap_err();
        assert!(err.is_aborted());
        assert!(old.next().is_none());

        assert_eq!(new.by_ref().filter_map(Result::ok).count(), 2);
    }

    #[test]
    fn explicit_abort_empties_slot() {
        let mut slot = RequestSlot::new();
        let signal = slot.begin();
        slot.abort();
        assert!(signal.is_aborted());
        assert!(!slot.is_active());
    }

    #[test]
    fn dropping_slot_aborts_in_flight() {
        let signal = {
            let mut slot = RequestSlot::new();
            slot.begin()
        };
        assert!(signal.is_aborted());
    }

    #[test]
    fn never_signal_is_never_aborted() {
        assert!(!AbortSignal::never().is_aborted());
        let (handle, signal) = abort_pair();
        let copy = signal.clone();
        handle.abort();
        assert!(handle.is_aborted() && signal.is_aborted() && copy.is_aborted());
    }

    #[test]
    fn abort_wakes_a_blocked_channel_read() {
        let (_tx, transport) = channel_transport(1);
        let mut slot = RequestSlot::new();
        let signal = slot.begin();

        let worker = thread::spawn(move || {
            let mut reader = AdjustableReader::with_signal(transport, signal);
            let res = reader.read(16);
            (res.map(|chunk| chunk.is_some()), reader.is_released())
        });
        thread::sleep(Duration::from_millis(50));
        slot.abort();

        let (res, released) = worker.join().unwrap();
        assert!(matches!(res, Err(StreamError::Aborted)));
        assert!(released);
    }
}
