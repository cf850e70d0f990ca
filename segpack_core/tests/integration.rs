/// Integration tests for the mask store ↔ packed volume codec.
///
/// Covers the worked 2-slice example byte for byte, the round-trip property
/// over random holey segment lists, both persisted metadata shapes, and the
/// failure modes that must abort an encode or decode.
use proptest::prelude::*;

use segpack_core::{
    decode, encode, export_segmentation, import_segmentation, Mask, SegError, SegmentDescriptor,
    SegmentSequence, SegmentSlot, SliceDescriptor, SparseSegmentList, ToolState,
};

// ── helpers ───────────────────────────────────────────────────────────────

fn stack(n: usize, columns: u32, rows: u32) -> Vec<SliceDescriptor> {
    (0..n)
        .map(|i| SliceDescriptor::new(format!("wadouri:slice-{i}"), columns, rows))
        .collect()
}

fn ids(slices: &[SliceDescriptor]) -> Vec<String> {
    slices.iter().map(|s| s.image_id.clone()).collect()
}

fn segments(labels: &[&str]) -> SparseSegmentList {
    let mut list = SparseSegmentList::new();
    for label in labels {
        list.push(SegmentDescriptor::new(*label)).unwrap();
    }
    list
}

// ── tests ──────────────────────────────────────────────────────────────────

/// 2 slices of 4×4, 2 segments; segment 0 is all ones on slice 0 and nothing
/// else is drawn.
#[test]
fn test_two_slice_scenario() {
    let slices = stack(2, 4, 4);
    let list = segments(&["liver", "spleen"]);
    let mut state = ToolState::new();
    state.put_mask(&slices[0].image_id, 0, Mask::new(vec![1; 16]));

    let volume = encode(&slices, &list, &state).unwrap();
    assert_eq!(volume.bits().len(), 8, "ceil(2 * 32 / 8) bytes");
    assert_eq!(volume.bits(), &[0xff, 0xff, 0, 0, 0, 0, 0, 0]);

    let decoded = decode(&ids(&slices), &volume).unwrap();
    let tool_state = &decoded.tool_state;
    assert_eq!(tool_state.get_mask(&slices[0].image_id, 0).unwrap().data, vec![1; 16]);
    for (slice, segment) in [(0, 1), (1, 0), (1, 1)] {
        let mask = tool_state.get_mask(&slices[slice].image_id, segment).unwrap();
        assert_eq!(mask.data, vec![0; 16], "slice {slice} segment {segment}");
    }
    assert!(tool_state.masks().all(|(_, _, mask)| mask.invalidated));
    assert_eq!(tool_state.masks().count(), 4);
}

#[test]
fn test_holes_shift_dense_blocks() {
    // Slots 0 and 2 are holes: segment 3 must land in the second block.
    let list = SparseSegmentList::from_slots(vec![
        SegmentSlot::Empty,
        SegmentSlot::Present(SegmentDescriptor::new("a")),
        SegmentSlot::Empty,
        SegmentSlot::Present(SegmentDescriptor::new("b")),
    ]);
    let slices = stack(1, 8, 1);
    let mut state = ToolState::new();
    state.put_mask(&slices[0].image_id, 3, Mask::new(vec![1, 0, 0, 0, 0, 0, 0, 1]));

    let volume = encode(&slices, &list, &state).unwrap();
    assert_eq!(volume.catalog().len(), 2);
    assert_eq!(volume.bits(), &[0x00, 0b1000_0001]);

    let decoded = decode(&ids(&slices), &volume).unwrap();
    assert_eq!(
        decoded.tool_state.get_mask(&slices[0].image_id, 3).unwrap().data,
        vec![1, 0, 0, 0, 0, 0, 0, 1]
    );
    assert!(decoded.tool_state.get_mask(&slices[0].image_id, 2).is_none());
}

#[test]
fn test_only_holes_is_empty_segmentation() {
    let list = SparseSegmentList::from_slots(vec![SegmentSlot::Empty; 3]);
    let mut state = ToolState::new();
    state.put_mask("wadouri:slice-0", 0, Mask::new(vec![1; 4]));

    let result = encode(&stack(1, 2, 2), &list, &state);
    assert!(matches!(result, Err(SegError::EmptySegmentation)));
    assert!(matches!(
        export_segmentation(&stack(1, 2, 2), &list, &state, "uid"),
        Err(SegError::EmptySegmentation)
    ));
}

/// A segment erased back to nothing is encoded exactly like one that was
/// never drawn.
#[test]
fn test_erased_segment_matches_undrawn() {
    let slices = stack(2, 2, 2);
    let list = segments(&["erased", "never"]);
    let mut state = ToolState::new();
    state.put_mask(&slices[1].image_id, 0, Mask::zeroed(4));

    let volume = encode(&slices, &list, &state).unwrap();
    assert!(volume.bits().iter().all(|&b| b == 0));
    assert_eq!(volume.catalog().len(), 2);
}

#[test]
fn test_scalar_and_list_metadata_decode_alike() {
    let slices = stack(3, 3, 3);
    let list = segments(&["only"]);
    let mut state = ToolState::new();
    state.put_mask(&slices[1].image_id, 0, Mask::new(vec![0, 1, 0, 1, 1, 1, 0, 1, 0]));

    let scalar = export_segmentation(&slices, &list, &state, "2.25.7").unwrap();
    let record = match &scalar.segment_sequence {
        SegmentSequence::Single(record) => record.clone(),
        other => panic!("one segment should persist as a scalar, got {other:?}"),
    };
    let mut listed = scalar.clone();
    listed.segment_sequence = SegmentSequence::Many(vec![record]);

    let from_scalar = import_segmentation(&ids(&slices), scalar).unwrap();
    let from_list = import_segmentation(&ids(&slices), listed).unwrap();
    assert_eq!(from_scalar.tool_state, from_list.tool_state);
    assert_eq!(from_scalar.segments, from_list.segments);
}

#[test]
fn test_import_checks_slice_count() {
    let slices = stack(4, 2, 2);
    let dataset = export_segmentation(&slices, &segments(&["a", "b"]), &ToolState::new(), "uid")
        .unwrap();
    // 8 frames over 3 slices does not divide evenly.
    let err = import_segmentation(&ids(&slices)[..3], dataset.clone()).unwrap_err();
    assert!(matches!(err, SegError::DimensionMismatch(_)), "got {err:?}");
    // 8 frames over 2 slices implies 4 segments, but only 2 are declared.
    let err = import_segmentation(&ids(&slices)[..2], dataset).unwrap_err();
    assert!(matches!(err, SegError::Format(_)), "got {err:?}");
}

#[test]
fn test_decode_calls_are_independent() {
    let slices = stack(1, 2, 1);
    let list = segments(&["a"]);
    let mut first = ToolState::new();
    first.put_mask(&slices[0].image_id, 0, Mask::new(vec![1, 0]));
    let mut second = ToolState::new();
    second.put_mask(&slices[0].image_id, 0, Mask::new(vec![0, 1]));

    let a = encode(&slices, &list, &first).unwrap();
    let b = encode(&slices, &list, &second).unwrap();
    let decoded_a = decode(&ids(&slices), &a).unwrap();
    let decoded_b = decode(&ids(&slices), &b).unwrap();
    let decoded_a_again = decode(&ids(&slices), &a).unwrap();

    assert_eq!(decoded_a.tool_state, decoded_a_again.tool_state);
    assert_ne!(decoded_a.tool_state, decoded_b.tool_state);
}

// ── properties ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Case {
    columns: u32,
    rows: u32,
    slices: usize,
    /// `true` for an occupied slot.
    slots: Vec<bool>,
    /// Per (slot, slice): `None` for an absent mask.
    masks: Vec<Option<Vec<u8>>>,
}

fn case() -> impl Strategy<Value = Case> {
    (1u32..6, 1u32..6, 1usize..5, proptest::collection::vec(any::<bool>(), 1..6))
        .prop_filter("at least one occupied slot", |(_, _, _, slots)| {
            slots.iter().any(|&occupied| occupied)
        })
        .prop_flat_map(|(columns, rows, slices, slots)| {
            let xy = (columns * rows) as usize;
            let masks = proptest::collection::vec(
                proptest::option::of(proptest::collection::vec(0u8..=1, xy)),
                slots.len() * slices,
            );
            (Just(columns), Just(rows), Just(slices), Just(slots), masks)
        })
        .prop_map(|(columns, rows, slices, slots, masks)| Case {
            columns,
            rows,
            slices,
            slots,
            masks,
        })
}

proptest! {
    #[test]
    fn prop_round_trip_reproduces_every_active_mask(case in case()) {
        let slices = stack(case.slices, case.columns, case.rows);
        let xy = (case.columns * case.rows) as usize;
        let list = SparseSegmentList::from_slots(
            case.slots
                .iter()
                .enumerate()
                .map(|(i, &occupied)| {
                    if occupied {
                        SegmentSlot::Present(SegmentDescriptor::new(format!("seg-{i}")))
                    } else {
                        SegmentSlot::Empty
                    }
                })
                .collect(),
        );

        let mut state = ToolState::new();
        for (slot, _) in case.slots.iter().enumerate() {
            for (z, slice) in slices.iter().enumerate() {
                if let Some(data) = &case.masks[slot * case.slices + z] {
                    state.put_mask(&slice.image_id, slot as u32, Mask::new(data.clone()));
                }
            }
        }

        let volume = encode(&slices, &list, &state).unwrap();
        let active = case.slots.iter().filter(|&&o| o).count();
        prop_assert_eq!(volume.bits().len(), (active * xy * case.slices).div_ceil(8));

        let decoded = decode(&ids(&slices), &volume).unwrap();
        for (slot, &occupied) in case.slots.iter().enumerate() {
            for (z, slice) in slices.iter().enumerate() {
                let restored = decoded.tool_state.get_mask(&slice.image_id, slot as u32);
                if !occupied {
                    prop_assert!(restored.is_none());
                    continue;
                }
                let expected = case.masks[slot * case.slices + z]
                    .clone()
                    .unwrap_or_else(|| vec![0; xy]);
                prop_assert_eq!(&restored.unwrap().data, &expected);
            }
        }
    }
}
