// End-to-end: bytes in, records out. Covers the single-threaded
// `decode_records` chain and the `spawn_decoder` worker.

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::thread;
    use std::time::Duration;

    use bytes::Bytes;
    use crossbeam::channel::SendTimeoutError;

    use proptest::prelude::*;
    use runstream_core::config::PipelineConfig;
    use runstream_core::stream::framing::encode_frame_into;
    use runstream_core::stream::pathval::encode_pairs;
    use runstream_core::stream::{
        abort_pair, channel_transport, decode_records, open_input, spawn_decoder, FramingError, InputSource,
        MemoryTransport, RecordStream, StreamError,
    };
    use runstream_core::types::PipelineError;
    use runstream_core::value::{Leaf, Node, Path, Record, ScalarValue};

    fn wire(items: &[(&str, Leaf)]) -> Vec<u8> {
        let pairs: Vec<(Path, Leaf)> = items.iter().map(|(k, v)| (Path::parse_dotted(k), v.clone())).collect();
        encode_pairs(&pairs).unwrap()
    }

    fn runs_wire() -> Vec<u8> {
        wire(&[
            ("runA.params.lr", Leaf::from(0.01)),
            ("runA.params.batch", Leaf::from(32i64)),
            ("runB.params.lr", Leaf::from(0.1)),
        ])
    }

    fn records(transport: MemoryTransport, config: PipelineConfig) -> Vec<Result<Record, PipelineError>> {
        decode_records(transport, config).unwrap().collect()
    }

    fn ok_records(transport: MemoryTransport) -> Vec<Record> {
        records(transport, PipelineConfig::default())
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap()
    }

// # ✅ 1. Two runs, in order

    #[test]
    fn decodes_runs_in_order() {
        let out = ok_records(MemoryTransport::new(runs_wire()));
        assert_eq!(out.len(), 2);

        let (key, root) = out[0].clone().into_parts();
        assert_eq!(key, "runA");
        assert_eq!(root.lookup(&Path::parse_dotted("params.lr")), Some(&Node::from(0.01)));
        assert_eq!(root.lookup(&Path::parse_dotted("params.batch")), Some(&Node::from(32i64)));

        assert_eq!(out[1].key_string(), "runB");
        assert_eq!(out[1].root.lookup(&Path::parse_dotted("params.lr")), Some(&Node::from(0.1)));
    }

    #[test]
    fn nan_survives_the_pipeline() {
        let out = ok_records(MemoryTransport::new(wire(&[("r.loss.0", Leaf::from(f64::NAN))])));
        let value = out[0].root.lookup(&Path::parse_dotted("loss.0")).and_then(Node::as_scalar);

        assert!(matches!(value, Some(ScalarValue::Float(f)) if f.is_nan()));
        assert_ne!(value, Some(&ScalarValue::Null));
        assert_ne!(value, Some(&ScalarValue::Float(0.0)));
    }

// # ❌ 2. Truncated final frame: error, no partial record

    #[test]
    fn truncated_final_frame_emits_no_partial_record() {
        let mut data = wire(&[("runA.params.lr", Leaf::from(0.01))]);
        encode_frame_into(&mut data, b"runA\xFEparams\xFEname", b"\x04baseline").unwrap();
        data.truncate(data.len() - 4);

        let out = records(MemoryTransport::new(data), PipelineConfig::default());
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Err(PipelineError::Framing(FramingError::Truncated { .. }))));
    }

    #[test]
    fn error_after_completed_record_keeps_it() {
        let mut data = runs_wire();
        data.extend_from_slice(&[1, 0, 0]);

        let out = records(MemoryTransport::new(data), PipelineConfig::default());
        // runA was closed by runB's first pair; runB is discarded.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().key_string(), "runA");
        assert!(out[1].is_err());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = PipelineConfig::default().with_fold_depth(0);
        assert!(matches!(
            decode_records(MemoryTransport::new(runs_wire()), config),
            Err(PipelineError::Config(_))
        ));
    }

// # ✅ 3. Transports: reader, channel, boxed input

    #[test]
    fn open_input_memory_and_reader_agree() {
        let data = runs_wire();
        let a: Vec<Record> = decode_records(open_input(InputSource::Memory(data.clone())).unwrap(), PipelineConfig::default())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        let b: Vec<Record> = decode_records(
            open_input(InputSource::Reader(Box::new(Cursor::new(data)))).unwrap(),
            PipelineConfig::default().with_read_size(5),
        )
        .unwrap()
        .map(Result::unwrap)
        .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn channel_fed_stream() {
        let data = runs_wire();
        let (tx, transport) = channel_transport(2);
        let producer = std::thread::spawn(move || {
            for chunk in data.chunks(5) {
                tx.send(Ok(bytes::Bytes::copy_from_slice(chunk))).unwrap();
            }
        });

        let out: Vec<Record> = decode_records(transport, PipelineConfig::default())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        producer.join().unwrap();
        assert_eq!(out, ok_records(MemoryTransport::new(runs_wire())));
    }

// # ❌ 4. Abort

    #[test]
    fn aborted_stream_yields_aborted_error() {
        let (handle, signal) = abort_pair();
        let mut stream =
            RecordStream::with_signal(MemoryTransport::new(runs_wire()), PipelineConfig::default(), signal).unwrap();
        handle.abort();

        let first = stream.next();
        assert!(matches!(&first, Some(Err(e)) if e.is_aborted()));
        assert!(matches!(first, Some(Err(PipelineError::Stream(StreamError::Aborted)))));
        assert!(stream.next().is_none());
        assert!(stream.is_finished());
    }

    #[test]
    fn abort_mid_stream_stops_at_next_pull() {
        let (handle, signal) = abort_pair();
        let transport = MemoryTransport::chunked(runs_wire(), vec![3]);
        let config = PipelineConfig::default().with_read_size(3);
        let mut stream = RecordStream::with_signal(transport, config, signal).unwrap();

        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.key_string(), "runA");
        handle.abort();

        let rest: Vec<_> = stream.by_ref().collect();
        assert_eq!(rest.len(), 1);
        assert!(rest[0].as_ref().is_err_and(PipelineError::is_aborted));
    }

// # ✅ 5. Threaded decoder matches the inline one

    #[test]
    fn spawned_decoder_preserves_order() {
        let items: Vec<(String, Leaf)> = (0..200).map(|i| (format!("run{i}.step"), Leaf::from(i as i64))).collect();
        let borrowed: Vec<(&str, Leaf)> = items.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let data = wire(&borrowed);

        let config = PipelineConfig { inflight_records: 4, ..PipelineConfig::default() };
        let mut rx = spawn_decoder(MemoryTransport::chunked(data.clone(), vec![17]), config).unwrap();
        let threaded: Vec<Record> = rx.by_ref().map(Result::unwrap).collect();
        let snapshot = rx.finish().unwrap();

        assert_eq!(threaded, ok_records(MemoryTransport::new(data)));
        assert_eq!(snapshot.counters.records, 200);
        assert_eq!(snapshot.counters.frames, 200);
    }

    #[test]
    fn dropping_receiver_stops_worker() {
        let items: Vec<(String, Leaf)> = (0..1000).map(|i| (format!("r{i}.v"), Leaf::from(i as i64))).collect();
        let borrowed: Vec<(&str, Leaf)> = items.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

        let config = PipelineConfig { inflight_records: 1, ..PipelineConfig::default() };
        let mut rx = spawn_decoder(MemoryTransport::chunked(wire(&borrowed), vec![64]), config).unwrap();
        assert!(rx.next().unwrap().is_ok());

        // Worker is blocked on a full channel; finish() aborts and joins.
        let snapshot = rx.finish().unwrap();
        assert!(snapshot.counters.records < 1000);
    }

    #[test]
    fn dropping_receiver_releases_a_stalled_producer() {
        let (tx, transport) = channel_transport(4);
        // Key length 1000, then nothing: the worker blocks waiting for the key.
        tx.send(Ok(Bytes::from_static(&[0xE8, 0x03, 0x00, 0x00]))).unwrap();

        let rx = spawn_decoder(transport, PipelineConfig::default()).unwrap();
        thread::sleep(Duration::from_millis(50));
        drop(rx);

        // Single key bytes never complete the frame, so only a released
        // transport makes `send` fail.
        let released = (0..200).any(|_| {
            thread::sleep(Duration::from_millis(10));
            matches!(
                tx.send_timeout(Ok(Bytes::from_static(b"k")), Duration::from_millis(10)),
                Err(SendTimeoutError::Disconnected(_))
            )
        });
        assert!(released, "transport still held after the receiver was dropped");
    }

// # ✅ 6. Property: output does not depend on chunk boundaries

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn chunking_does_not_change_records(
            splits in proptest::collection::vec(1usize..40, 1..6),
            read_size in 1usize..200,
        ) {
            let data = wire(&[
                ("runA.params.lr", Leaf::from(0.01)),
                ("runA.params.name", Leaf::from("baseline")),
                ("runA.metrics.loss.0", Leaf::from(0.9)),
                ("runA.metrics.loss.1", Leaf::from(0.7)),
                ("runA.tags", Leaf::EmptyArray),
                ("runB.params.lr", Leaf::from(0.1)),
                ("runB.blob", Leaf::Scalar(ScalarValue::Blob(bytes::Bytes::from_static(&[0xFE, 0, 0xFF])))),
            ]);

            let expected = ok_records(MemoryTransport::new(data.clone()));
            let config = PipelineConfig::default().with_read_size(read_size);
            let got: Vec<Record> = records(MemoryTransport::chunked(data, splits), config)
                .into_iter()
                .collect::<Result<_, _>>()
                .unwrap();
            prop_assert_eq!(got, expected);
        }
    }
}
