#![cfg(test)]

use super::*;

fn random_weights(count: usize) -> (Vec<f32>, Vec<u8>) {
    let values: Vec<f32> = (0..count).map(|_| rand::random::<f32>() + 1.0).collect();
    let bytes = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    (values, bytes)
}

fn read_f32(bytes: &[u8], index: usize) -> f32 {
    let at = index * 4;
    f32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Destination element of source `(ofm = i, column = y)`.
fn interleaved_index(layout: &InterleaveLayout, i: usize, y: usize) -> usize {
    let fx = layout.filter_x;
    let c = layout.row_width();
    let (ir, nir) = (layout.interleaved_rows(), layout.non_interleaved_rows());
    let (group, within) = (y / fx, y % fx);
    let slot_in_group = if within < ir { within / 2 } else { ir / 2 + (within - ir) };
    let base = (group * (ir / 2 + nir) + slot_in_group) * 2 * c;
    if within < ir {
        let block = i / layout.block_width * layout.block_width;
        let width = layout.block_width.min(c - block);
        base + 2 * block + (within % 2) * width + (i - block)
    } else {
        let chunk = i / layout.row_alignment * layout.row_alignment;
        base + 2 * chunk + (i - chunk)
    }
}

fn check_interleave(ofm: usize, fx: usize, fy: usize, ifm: usize, sub_block_n: usize, block_width: usize) {
    let source = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Oiyx, fx, fy, ifm, ofm);
    let k = fx * fy * ifm;
    let layout = InterleaveLayout::new(ofm, k, fx, sub_block_n, block_width);
    let reorder = CpuReorder::new(CpuReorderKind::Interleave(layout), source, WeightsType::F32);

    let (values, src) = random_weights(ofm * k);
    let mut dst = vec![0xAAu8; reorder.new_buffer_size()];
    reorder.apply(&src, &mut dst).unwrap();

    let mut populated = vec![false; dst.len() / 4];
    for i in 0..ofm {
        for y in 0..k {
            let at = interleaved_index(&layout, i, y);
            assert_eq!(read_f32(&dst, at), values[i * k + y], "ofm {i} column {y}");
            populated[at] = true;
        }
    }
    for (idx, used) in populated.iter().enumerate() {
        if !used {
            assert_eq!(read_f32(&dst, idx), 0.0, "padding element {idx} must stay zero");
        }
    }
}

#[test]
fn interleave_round_trips_odd_filters() {
    check_interleave(96, 11, 11, 3, 32, 16);
    check_interleave(40, 3, 3, 5, 8, 8);
}

#[test]
fn interleave_round_trips_even_filters() {
    check_interleave(20, 2, 2, 3, 8, 8);
}

#[test]
fn interleave_round_trips_single_column_filters() {
    check_interleave(33, 1, 1, 7, 32, 16);
}

#[test]
fn interleave_keeps_both_rows_of_a_partial_last_block() {
    // c = 20 with blocks of 8: the last pair block is 4 wide, the last two
    // columns are OFM padding.
    check_interleave(18, 2, 2, 3, 4, 8);
    // c = 36 with blocks of 16 and 32-wide unpaired chunks: both tails are
    // partial.
    check_interleave(34, 3, 2, 5, 12, 16);
}

#[test]
fn interleave_size_accounts_for_unpaired_rows() {
    let layout = InterleaveLayout::new(96, 11 * 11 * 3, 11, 32, 16);
    assert_eq!(layout.rows(), 363);
    assert_eq!(layout.row_width(), 96);
    assert_eq!(layout.size_in_bytes(2), align_64(96 * 363 * 12 / 11 * 2));
}

fn align_64(v: usize) -> usize {
    v.div_ceil(64) * 64
}

#[test]
fn osv16_groups_output_channels_by_sixteen() {
    let (w, h, ifm, ofm) = (3, 2, 4, 20);
    let source = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Oiyx, w, h, ifm, ofm);
    let reorder = CpuReorder::new(CpuReorderKind::Osv16, source, WeightsType::F32);
    let (values, src) = random_weights(w * h * ifm * ofm);
    let mut dst = vec![0u8; reorder.new_buffer_size()];
    assert_eq!(dst.len(), w * h * ifm * 32 * 4);
    reorder.apply(&src, &mut dst).unwrap();

    let mut populated = 0;
    for o in 0..ofm {
        for i in 0..ifm {
            for y in 0..h {
                for x in 0..w {
                    let to = osv16::destination_index(x, y, i, o, w, h, ifm);
                    assert_eq!(read_f32(&dst, to), values[x + w * (y + h * (i + ifm * o))]);
                    populated += 1;
                }
            }
        }
    }
    let zeros = (0..dst.len() / 4).filter(|&idx| read_f32(&dst, idx) == 0.0).count();
    assert_eq!(zeros, dst.len() / 4 - populated);
}

#[test]
fn non_dense_sources_are_repacked_first() {
    let (w, h, ifm, ofm) = (2, 2, 3, 16);
    let yxio = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Yxio, w, h, ifm, ofm);
    let (values, src) = random_weights(w * h * ifm * ofm);
    let reorder = CpuReorder::new(CpuReorderKind::Osv16, yxio, WeightsType::F32);
    let mut dst = vec![0u8; reorder.new_buffer_size()];
    reorder.apply(&src, &mut dst).unwrap();
    // yxio keeps ofm innermost
    let src_index = |x: usize, y: usize, i: usize, o: usize| o + ofm * (i + ifm * (x + w * y));
    for o in 0..ofm {
        for i in 0..ifm {
            for y in 0..h {
                for x in 0..w {
                    let to = osv16::destination_index(x, y, i, o, w, h, ifm);
                    assert_eq!(read_f32(&dst, to), values[src_index(x, y, i, o)]);
                }
            }
        }
    }
}

#[test]
fn float_sources_convert_to_half() {
    let source = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Oiyx, 1, 1, 1, 16);
    let src: Vec<u8> = (0..16).flat_map(|v| (v as f32 * 0.5).to_ne_bytes()).collect();
    let reorder = CpuReorder::new(CpuReorderKind::Osv16, source, WeightsType::F16);
    let mut dst = vec![0u8; reorder.new_buffer_size()];
    assert_eq!(dst.len(), 32);
    reorder.apply(&src, &mut dst).unwrap();
    for o in 0..16 {
        let value = f16::from_ne_bytes([dst[o * 2], dst[o * 2 + 1]]);
        assert_eq!(value.to_f32(), o as f32 * 0.5);
    }
}

#[test]
fn wrong_destination_size_is_rejected_before_writing() {
    let source = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Oiyx, 3, 3, 2, 8);
    let reorder = CpuReorder::new(CpuReorderKind::Osv16, source, WeightsType::F32);
    let (_, src) = random_weights(3 * 3 * 2 * 8);
    let mut dst = vec![7u8; reorder.new_buffer_size() - 4];
    match reorder.apply(&src, &mut dst) {
        Err(KernelSelectorError::ReorderSizeMismatch { expected, actual }) => {
            assert_eq!(expected, 3 * 3 * 2 * 16 * 4);
            assert_eq!(actual, expected - 4);
        }
        other => panic!("expected size mismatch, got {other:?}"),
    }
    assert!(dst.iter().all(|&b| b == 7));
}

#[test]
fn short_sources_are_rejected() {
    let source = WeightsTensor::with_sizes(WeightsType::F16, WeightsLayout::Oiyx, 1, 1, 4, 4);
    let reorder = CpuReorder::new(CpuReorderKind::Osv16, source, WeightsType::F16);
    let mut dst = vec![0u8; reorder.new_buffer_size()];
    match reorder.apply(&[0u8; 8], &mut dst) {
        Err(KernelSelectorError::ReorderSourceMismatch { expected, actual }) => assert_eq!((expected, actual), (32, 8)),
        other => panic!("expected source mismatch, got {other:?}"),
    }
}
