#![cfg(test)]

use super::*;

#[test]
fn dense_bfyx_pitches_accumulate_innermost_first() {
    let t = DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 227, 227, 3, 2);
    assert_eq!(t.x(), Dim::new(227, 1));
    assert_eq!(t.y(), Dim::new(227, 227));
    assert_eq!(t.feature(), Dim::new(3, 227 * 227));
    assert_eq!(t.batch(), Dim::new(2, 227 * 227 * 3));
    assert_eq!(t.roi(), Dim::new(1, 1));
    assert_eq!(t.length(), 227 * 227 * 3 * 2);
    assert!(!t.padding_exists());
    assert_eq!(t.physical_size(), 227 * 227 * 3 * 2 * 2);
}

#[test]
fn yxfb_places_batch_innermost() {
    let t = DataTensor::with_sizes(Datatype::F32, DataLayout::Yxfb, 4, 5, 6, 8);
    assert_eq!(t.batch().pitch, 1);
    assert_eq!(t.feature().pitch, 8);
    assert_eq!(t.x().pitch, 48);
    assert_eq!(t.y().pitch, 192);
}

#[test]
fn padded_tensor_reports_padding_and_physical_size() {
    // 27x27 input stored in a 32x31 plane with a 66 element offset.
    let dims: Dims = [Dim::new(27, 1), Dim::new(27, 32), Dim::new(48, 992), Dim::new(1, 47616)].into_iter().collect();
    let t = DataTensor::new(Datatype::F16, DataLayout::Bfyx, PaddedVal::Zero, 66, dims);
    assert!(t.padding_exists());
    assert_eq!(t.length_with_padding(), 47616);
    assert_eq!(t.physical_size(), (66 + 47616) * 2);
}

#[test]
fn transform_to_2d_folds_spatials_into_features() {
    let t = DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 6, 6, 256, 4);
    let flat = t.transform(DataLayout::Bf);
    assert_eq!(flat.feature().v, 6 * 6 * 256);
    assert_eq!(flat.batch().v, 4);
    assert_eq!(flat.dims.len(), 2);
    assert_eq!(t.flatten_feature_and_spatials(), flat);

    let back = flat.transform(DataLayout::Bfyx);
    assert_eq!((back.x().v, back.y().v), (1, 1));
    assert_eq!(back.feature().v, 6 * 6 * 256);
}

#[test]
fn same_dims_ignores_pitches_and_offset() {
    let a = DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 13, 13, 256, 1);
    let mut b = a.clone();
    b.offset = 17;
    b.dims[1].pitch = 16;
    assert!(a.same_dims(&b));
    assert_ne!(a, b);

    let c = DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 13, 13, 256, 1);
    assert!(!a.same_dims(&c));
}

#[test]
fn weights_channels_and_blocked_sizes() {
    let w = WeightsTensor::with_sizes(WeightsType::F16, WeightsLayout::Oiyx, 3, 3, 256, 384);
    assert_eq!(w.ofm(), Dim::new(384, 3 * 3 * 256));
    assert_eq!(w.physical_size(), 3 * 3 * 256 * 384 * 2);

    let blocked = w.transform(WeightsLayout::OsIyxOsv16);
    assert_eq!(blocked.physical_size(), 3 * 3 * 256 * 384 * 2);

    let odd = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Oiyx, 5, 5, 3, 20);
    assert_eq!(odd.transform(WeightsLayout::OsIyxOsv16).physical_size(), 5 * 5 * 3 * 32 * 4);
    assert_eq!(odd.transform(WeightsLayout::IyXsOsXsv2Osv16Ao32).physical_size(), 3 * 5 * 6 * 32 * 4);

    let fc = odd.transform(WeightsLayout::Io);
    assert_eq!(fc.ifm().v, 75);
    assert_eq!(fc.ofm().pitch, 1);
    assert_eq!(fc.transform(WeightsLayout::OsIOsv8Ai8).physical_size(), 80 * 24 * 4);
}

#[test]
fn simple_layouts_match_the_dense_families() {
    assert!(DataLayout::Byxf.is_simple());
    assert!(!DataLayout::BsFBsv16Af8.is_simple());
    assert!(!DataLayout::Brfyx.is_simple());
    assert!(WeightsLayout::Yxio.is_simple());
    assert!(!WeightsLayout::OsIOsv16.is_simple());
    assert_eq!(DataLayout::Brfyx.channels_count(), 5);
    assert_eq!(WeightsLayout::Io.channels_count(), 2);
}
