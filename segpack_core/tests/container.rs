/// Container round trips: every bundled payload codec through SEGP1, the JSON
/// adapter, and the corruption checks the SEGP1 reader must enforce.
use std::sync::Arc;

use segpack_codecs::{
    detect_container, DeflateCodec, JsonContainer, Lz4Codec, PassThroughCodec, Segp1Container,
    ZstdCodec,
};
use segpack_core::format::{Segp1Header, HEADER_SIZE};
use segpack_core::{
    export_segmentation, import_segmentation, ContainerIo, Mask, PayloadCodec, Reader, SegError,
    SegmentDescriptor, SegmentationDataset, SliceDescriptor, SparseSegmentList, ToolState,
};

// ── helpers ───────────────────────────────────────────────────────────────

/// A 3-segment, 6-slice 32×24 volume with a blob per segment, one hole in the
/// segment list, and two slices left undrawn.
fn sample() -> (Vec<SliceDescriptor>, SparseSegmentList, ToolState, SegmentationDataset) {
    let slices: Vec<SliceDescriptor> = (0..6)
        .map(|i| SliceDescriptor::new(format!("ct-{i:03}"), 32, 24))
        .collect();

    let mut list = SparseSegmentList::new();
    list.push(SegmentDescriptor::new("liver")).unwrap();
    list.insert(2, SegmentDescriptor::new("tumor"));
    list.insert(3, SegmentDescriptor::new("vessel"));

    let mut state = ToolState::new();
    for (z, slice) in slices.iter().enumerate().take(4) {
        for segment in [0u32, 2, 3] {
            let data = (0..32 * 24)
                .map(|p: usize| {
                    let (row, col) = (p / 32, p % 32);
                    let centre = 4 + segment as usize * 6 + z;
                    u8::from(row.abs_diff(12) < 5 && col.abs_diff(centre) < 4)
                })
                .collect();
            state.put_mask(&slice.image_id, segment, Mask::new(data));
        }
    }

    let dataset = export_segmentation(&slices, &list, &state, "2.25.4242").unwrap();
    (slices, list, state, dataset)
}

fn slice_ids(slices: &[SliceDescriptor]) -> Vec<String> {
    slices.iter().map(|s| s.image_id.clone()).collect()
}

fn codecs() -> Vec<Arc<dyn PayloadCodec>> {
    vec![
        Arc::new(PassThroughCodec),
        Arc::new(DeflateCodec::default()),
        Arc::new(ZstdCodec::default()),
        Arc::new(Lz4Codec),
    ]
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_segp1_round_trip_every_codec() {
    let (slices, _, state, dataset) = sample();
    for codec in codecs() {
        let name = codec.name();
        let container = Segp1Container::new(codec);
        let bytes = container.serialize_dataset(&dataset).unwrap();

        let restored = container.load(&bytes).unwrap();
        assert_eq!(restored, dataset, "{name}: dataset should survive SEGP1 byte-exact");

        let imported = import_segmentation(&slice_ids(&slices), restored).unwrap();
        for (slice_id, segment, mask) in state.masks() {
            assert_eq!(
                imported.tool_state.get_mask(slice_id, segment).unwrap().data,
                mask.data,
                "{name}: {slice_id} segment {segment}"
            );
        }
    }
}

#[test]
fn test_reader_opens_files_written_with_any_codec() {
    let (_, _, _, dataset) = sample();
    let bytes = Segp1Container::new(Arc::new(ZstdCodec::new(19)))
        .serialize_dataset(&dataset)
        .unwrap();

    // The reading adapter is configured with a different codec; the header wins.
    let reader = Segp1Container::new(Arc::new(PassThroughCodec));
    assert_eq!(reader.load(&bytes).unwrap(), dataset);

    let sniffed = detect_container(&bytes).unwrap();
    assert_eq!(sniffed.name(), "segp1");
    assert_eq!(sniffed.load(&bytes).unwrap(), dataset);
}

#[test]
fn test_compressible_payload_shrinks() {
    let (_, _, _, dataset) = sample();
    let bytes = Segp1Container::new(Arc::new(ZstdCodec::default()))
        .serialize_dataset(&dataset)
        .unwrap();
    let reader = Reader::new(&bytes).unwrap();
    assert_eq!(reader.header.raw_payload_len, dataset.pixel_data.len() as u64);
    assert!(
        reader.ratio() > 2.0,
        "mostly-empty masks should compress, ratio={:.2}",
        reader.ratio()
    );
}

#[test]
fn test_json_round_trip_and_detection() {
    let (slices, list, _, dataset) = sample();
    let bytes = JsonContainer::pretty().serialize_dataset(&dataset).unwrap();

    let sniffed = detect_container(&bytes).unwrap();
    assert_eq!(sniffed.name(), "json");
    let restored = sniffed.load(&bytes).unwrap();
    assert_eq!(restored, dataset);

    let imported = import_segmentation(&slice_ids(&slices), restored).unwrap();
    assert_eq!(imported.series_instance_uid, "2.25.4242");
    assert_eq!(imported.segment_list(), list);
}

#[test]
fn test_json_scalar_segment_sequence_is_accepted() {
    let slices = vec![SliceDescriptor::new("a", 2, 2), SliceDescriptor::new("b", 2, 2)];
    let mut list = SparseSegmentList::new();
    list.push(SegmentDescriptor::new("solo")).unwrap();
    let mut state = ToolState::new();
    state.put_mask("b", 0, Mask::new(vec![0, 0, 1, 1]));
    let dataset = export_segmentation(&slices, &list, &state, "uid").unwrap();

    let bytes = JsonContainer::new().serialize_dataset(&dataset).unwrap();
    let document: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(document["SegmentSequence"].is_object());

    // Rewrite the scalar as a one-element array; both must decode alike.
    let mut as_list = document.clone();
    as_list["SegmentSequence"] = serde_json::Value::Array(vec![document["SegmentSequence"].clone()]);
    let list_bytes = serde_json::to_vec(&as_list).unwrap();

    let ids = ["a", "b"];
    let from_scalar = import_segmentation(&ids, JsonContainer::new().load(&bytes).unwrap()).unwrap();
    let from_list =
        import_segmentation(&ids, JsonContainer::new().load(&list_bytes).unwrap()).unwrap();
    assert_eq!(from_scalar.tool_state, from_list.tool_state);
    assert_eq!(from_scalar.tool_state.get_mask("b", 0).unwrap().data, vec![0, 0, 1, 1]);
}

#[test]
fn test_checksum_detects_corrupt_payload() {
    let (_, _, _, dataset) = sample();
    let container = Segp1Container::new(Arc::new(PassThroughCodec));
    let mut bytes = container.serialize_dataset(&dataset).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    let err = container.load(&bytes).unwrap_err();
    assert!(matches!(err, SegError::ChecksumMismatch { .. }), "got {err:?}");
}

#[test]
fn test_unchecked_file_skips_checksum() {
    let (_, _, _, dataset) = sample();
    let container = Segp1Container::new(Arc::new(PassThroughCodec)).without_checksum();
    let bytes = container.serialize_dataset(&dataset).unwrap();
    let header = Reader::new(&bytes).unwrap().header;
    assert_eq!(header.payload_checksum, 0);
    assert_eq!(container.load(&bytes).unwrap(), dataset);
}

#[test]
fn test_truncated_and_foreign_files_rejected() {
    let (_, _, _, dataset) = sample();
    let bytes = Segp1Container::new(Arc::new(Lz4Codec))
        .serialize_dataset(&dataset)
        .unwrap();

    for cut in [10, HEADER_SIZE, bytes.len() - 1] {
        let result = Reader::new(&bytes[..cut]);
        assert!(matches!(result, Err(SegError::Format(_))), "accepted a {cut}-byte prefix");
    }

    let mut foreign = bytes.clone();
    foreign[..5].copy_from_slice(b"DICM\0");
    assert!(matches!(Reader::new(&foreign), Err(SegError::Format(_))));
    assert!(detect_container(b"\x00\x01binary").is_err());
}

fn patch_header(bytes: &mut [u8], patch: impl FnOnce(&mut Segp1Header)) {
    let mut head = [0u8; HEADER_SIZE];
    head.copy_from_slice(&bytes[..HEADER_SIZE]);
    let mut header = Segp1Header::from_bytes(&head).unwrap();
    patch(&mut header);
    bytes[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
}

#[test]
fn test_inflated_raw_length_rejected_without_checksum() {
    let (_, _, _, dataset) = sample();
    for codec in codecs() {
        let name = codec.name();
        let container = Segp1Container::new(codec).without_checksum();
        let mut bytes = container.serialize_dataset(&dataset).unwrap();
        patch_header(&mut bytes, |h| h.raw_payload_len = u64::MAX / 2);

        let err = container.load(&bytes).unwrap_err();
        assert!(matches!(err, SegError::Format(_)), "{name}: got {err:?}");
    }
}

#[test]
fn test_header_dims_must_match_raw_length() {
    let (_, _, _, dataset) = sample();
    let container = Segp1Container::new(Arc::new(DeflateCodec::default())).without_checksum();
    let mut bytes = container.serialize_dataset(&dataset).unwrap();
    patch_header(&mut bytes, |h| h.frames += 1);
    assert!(matches!(container.load(&bytes), Err(SegError::Format(_))));

    let mut bytes = container.serialize_dataset(&dataset).unwrap();
    patch_header(&mut bytes, |h| {
        h.rows = u32::MAX;
        h.columns = u32::MAX;
        h.frames = u32::MAX;
    });
    assert!(matches!(container.load(&bytes), Err(SegError::Format(_))));
}

#[test]
fn test_unaddressable_json_dims_rejected() {
    let document = r#"{
        "Rows": 2147483648,
        "Columns": 2147483648,
        "NumberOfFrames": 4,
        "SegmentSequence": { "SegmentNumber": 1, "SegmentLabel": "x" },
        "PixelData": { "InlineBinary": "" }
    }"#;
    let dataset = JsonContainer::new().load(document.as_bytes()).unwrap();
    let err = import_segmentation(&["a", "b", "c", "d"], dataset).unwrap_err();
    assert!(matches!(err, SegError::Format(_)), "got {err:?}");
}

#[test]
fn test_unknown_codec_id_rejected() {
    let (_, _, _, dataset) = sample();
    let mut bytes = Segp1Container::new(Arc::new(PassThroughCodec))
        .serialize_dataset(&dataset)
        .unwrap();
    patch_header(&mut bytes, |h| h.payload_codec = 77);

    let err = Segp1Container::new(Arc::new(PassThroughCodec))
        .load(&bytes)
        .unwrap_err();
    assert!(err.to_string().contains("unknown payload codec"), "got: {err}");
}

#[test]
fn test_codec_mismatch_error() {
    let (_, _, _, dataset) = sample();
    let bytes = Segp1Container::new(Arc::new(ZstdCodec::default()))
        .serialize_dataset(&dataset)
        .unwrap();
    let reader = Reader::new(&bytes).unwrap();
    let err = reader.payload(&Lz4Codec).unwrap_err();
    assert!(err.to_string().contains("codec mismatch"), "got: {err}");
}
