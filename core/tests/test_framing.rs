// Frame layer tests: `encode_frame`, `FrameWriter` and `FrameDecoder`
// covering reassembly across chunks, clean end, truncation and the
// frame length guard.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use runstream_core::config::PipelineConfig;
    use runstream_core::stream::framing::{encode_frame, encode_frame_into, FramePart, FrameWriter};
    use runstream_core::stream::{FrameDecoder, FramingError, MemoryTransport, RawPair};
    use runstream_core::types::PipelineError;

    fn sample_wire() -> Vec<u8> {
        let mut out = Vec::new();
        encode_frame_into(&mut out, b"runA\xFEparams\xFElr", b"\x03\x7b\x14\xaeG\xe1z\x84?").unwrap();
        encode_frame_into(&mut out, b"runA\xFEname", b"\x04baseline").unwrap();
        encode_frame_into(&mut out, b"", b"").unwrap();
        out
    }

    fn decode_all(transport: MemoryTransport, config: PipelineConfig) -> Vec<Result<RawPair, PipelineError>> {
        FrameDecoder::from_transport(transport, config).collect()
    }

// # ✅ 1. Layout is [u32 LE][key][u32 LE][value]

    #[test]
    fn encode_frame_layout() {
        let wire = encode_frame(b"ab", b"xyz").unwrap();
        assert_eq!(wire, b"\x02\x00\x00\x00ab\x03\x00\x00\x00xyz");
        assert_eq!(RawPair::new(&b"ab"[..], &b"xyz"[..]).wire_len(), wire.len());
    }

    #[test]
    fn frame_writer_matches_encode_frame() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_pair(b"runA\xFEname", b"\x04baseline").unwrap();
        writer.write_pair(b"k", b"").unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.frames_written(), 2);

        let mut expected = encode_frame(b"runA\xFEname", b"\x04baseline").unwrap();
        expected.extend(encode_frame(b"k", b"").unwrap());
        assert_eq!(writer.into_inner(), expected);
    }

// # ✅ 2. Decode yields pairs in order, zero-length parts included

    #[test]
    fn decodes_pairs_in_order() {
        let pairs: Vec<RawPair> = decode_all(MemoryTransport::new(sample_wire()), PipelineConfig::default())
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].key, Bytes::from_static(b"runA\xFEparams\xFElr"));
        assert_eq!(pairs[1].value, Bytes::from_static(b"\x04baseline"));
        assert!(pairs[2].key.is_empty() && pairs[2].value.is_empty());
    }

// # ✅ 3. Frames straddling chunk boundaries are reassembled

    #[test]
    fn one_byte_chunks_decode_identically() {
        let wire = sample_wire();
        let whole = decode_all(MemoryTransport::new(wire.clone()), PipelineConfig::default());
        let split = decode_all(MemoryTransport::chunked(wire, vec![1]), PipelineConfig::default());

        let whole: Vec<RawPair> = whole.into_iter().map(Result::unwrap).collect();
        let split: Vec<RawPair> = split.into_iter().map(Result::unwrap).collect();
        assert_eq!(whole, split);
    }

    #[test]
    fn small_read_size_decodes_identically() {
        let wire = sample_wire();
        let config = PipelineConfig::default().with_read_size(3);
        let pairs: Vec<RawPair> = decode_all(MemoryTransport::new(wire), config)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(pairs.len(), 3);
    }

// # ✅ 4. Empty stream is a clean end

    #[test]
    fn empty_stream_yields_nothing() {
        assert!(decode_all(MemoryTransport::new(Vec::new()), PipelineConfig::default()).is_empty());
    }

// # ❌ 5. Truncation anywhere in a frame is an error

    #[test]
    fn truncated_value_is_framing_error() {
        let mut wire = sample_wire();
        encode_frame_into(&mut wire, b"runB", b"\x04abcdef").unwrap();
        wire.truncate(wire.len() - 3);

        let items = decode_all(MemoryTransport::new(wire), PipelineConfig::default());
        assert_eq!(items.len(), 4);
        match items.last() {
            Some(Err(PipelineError::Framing(FramingError::Truncated { part, needed, available }))) => {
                assert_eq!(*part, FramePart::Value);
                assert_eq!(*needed, 7);
                assert_eq!(*available, 4);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn partial_length_prefix_is_truncation() {
        let mut wire = sample_wire();
        wire.extend_from_slice(&[5, 0]);

        let items = decode_all(MemoryTransport::new(wire), PipelineConfig::default());
        assert!(matches!(
            items.last(),
            Some(Err(PipelineError::Framing(FramingError::Truncated { part: FramePart::KeyLen, .. })))
        ));
    }

    #[test]
    fn missing_value_is_truncation() {
        let wire = encode_frame(b"key", b"value").unwrap();
        let cut = wire[..4 + 3].to_vec();

        let items = decode_all(MemoryTransport::new(cut), PipelineConfig::default());
        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            Err(PipelineError::Framing(FramingError::Truncated { part: FramePart::ValueLen, .. }))
        ));
    }

// # ❌ 6. Corrupt length prefix is rejected before allocating

    #[test]
    fn oversized_prefix_is_rejected() {
        let mut wire = vec![0xff, 0xff, 0xff, 0x7f];
        wire.extend_from_slice(b"junk");

        let config = PipelineConfig::default().with_max_frame_len(1024);
        let items = decode_all(MemoryTransport::new(wire), config);
        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            Err(PipelineError::Framing(FramingError::FrameTooLarge { part: FramePart::KeyLen, max: 1024, .. }))
        ));
    }

// # ✅ 7. Decoder is fused and releases the reader on error

    #[test]
    fn fused_after_error() {
        let mut wire = sample_wire();
        wire.push(1);

        let mut dec = FrameDecoder::from_transport(MemoryTransport::chunked(wire, vec![4]), PipelineConfig::default());
        let mut errors = 0;
        for item in dec.by_ref() {
            if item.is_err() {
                errors += 1;
            }
        }
        assert_eq!(errors, 1);
        assert!(dec.next().is_none());
        assert!(dec.reader().is_released());
    }

    #[test]
    fn counts_frames_and_payload_bytes() {
        use runstream_core::telemetry::{DecodeCounters, StageTelemetry, StageTimes};

        let wire = sample_wire();
        let total = wire.len() as u64;
        let mut dec = FrameDecoder::from_transport(MemoryTransport::new(wire), PipelineConfig::default());
        while dec.next().is_some() {}

        let mut counters = DecodeCounters::default();
        let mut times = StageTimes::default();
        dec.report(&mut counters, &mut times);

        assert_eq!(counters.frames, 3);
        assert_eq!(counters.bytes_read, total);
        assert_eq!(counters.bytes_key + counters.bytes_value + counters.framing_overhead_bytes(), total);
    }
}
