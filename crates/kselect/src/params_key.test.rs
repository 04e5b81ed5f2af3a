#![cfg(test)]

use super::*;

fn kernel_key() -> ParamsKey {
    let mut k = ParamsKey::new();
    k.enable_input_data_type(Datatype::F16)
        .enable_input_data_type(Datatype::F32)
        .enable_output_data_type(Datatype::F16)
        .enable_output_data_type(Datatype::F32)
        .enable_input_layout(DataLayout::Bfyx)
        .enable_output_layout(DataLayout::Bfyx)
        .enable_tensor_offset()
        .enable_tensor_pitches()
        .enable_batching();
    k
}

fn request(dt: Datatype) -> ParamsKey {
    let mut r = ParamsKey::new();
    r.enable_input_data_type(dt)
        .enable_output_data_type(dt)
        .enable_input_layout(DataLayout::Bfyx)
        .enable_output_layout(DataLayout::Bfyx);
    r
}

#[test]
fn merge_is_commutative() {
    let a = kernel_key();
    let mut b = request(Datatype::Int8);
    b.enable_subgroups().enable_input_layout(DataLayout::Brfyx).enable_dilation();
    assert_eq!(a.merge(&b), b.merge(&a));
    assert_eq!(a.merge(&b).num_dims, 5);
}

#[test]
fn zero_layout_key_supports_nothing() {
    let mut unconfigured = ParamsKey::new();
    unconfigured.enable_all_input_data_types().enable_all_output_data_types().set_num_dims(8);
    assert!(!unconfigured.support(&request(Datatype::F16)));
    assert!(!kernel_key().support(&ParamsKey::new()));
}

#[test]
fn restrict_bits_must_be_a_superset() {
    let k = kernel_key();
    assert!(k.support(&request(Datatype::F16)));
    assert!(!k.support(&request(Datatype::Int8)));

    let mut needs_split = request(Datatype::F32);
    needs_split.enable_split_support();
    assert!(!k.support(&needs_split));
}

#[test]
fn num_dims_compares_greater_or_equal() {
    let k = kernel_key();
    let mut bigger = request(Datatype::F16);
    bigger.set_num_dims(5);
    assert!(!k.support(&bigger));

    let mut smaller = request(Datatype::F16);
    smaller.set_num_dims(2);
    assert!(k.support(&smaller));
}

#[test]
fn layouts_only_need_to_overlap() {
    let mut k = kernel_key();
    k.enable_input_layout(DataLayout::Yxfb);
    let mut r = request(Datatype::F16);
    r.enable_input_layout(DataLayout::Byxf);
    assert!(k.support(&r));

    let mut disjoint = ParamsKey::new();
    disjoint
        .enable_input_data_type(Datatype::F16)
        .enable_input_layout(DataLayout::Fyxb)
        .enable_output_layout(DataLayout::Bfyx);
    assert!(!k.support(&disjoint));
}

#[test]
fn kernel_machine_requirements_must_be_available() {
    let mut k = kernel_key();
    k.enable_subgroups();
    let plain = request(Datatype::F16);
    assert!(!k.support(&plain));

    let mut capable = plain;
    capable.enable_subgroups();
    assert!(k.support(&capable));
    assert!(kernel_key().support(&capable));
}

#[test]
fn weights_layout_masks_constrain_only_when_requested() {
    let mut reorder = ParamsKey::new();
    reorder
        .enable_input_weights_type(WeightsType::F32)
        .enable_output_weights_type(WeightsType::F32)
        .enable_input_weights_layout(WeightsLayout::Oiyx)
        .enable_output_weights_layout(WeightsLayout::Yxio);

    let mut r = ParamsKey::new();
    r.enable_input_weights_type(WeightsType::F32)
        .enable_output_weights_type(WeightsType::F32)
        .enable_input_weights_layout(WeightsLayout::Oiyx)
        .enable_output_weights_layout(WeightsLayout::Yxio);
    assert!(reorder.support(&r));

    let mut blocked = r;
    blocked.output_weights_layout = 0;
    blocked.enable_output_weights_layout(WeightsLayout::OsIyxOsv16);
    assert!(!reorder.support(&blocked));
}

#[test]
fn setters_are_idempotent() {
    let mut a = kernel_key();
    let before = a;
    a.enable_batching().enable_input_layout(DataLayout::Bfyx).enable_activation(ActivationFunction::Relu);
    assert_eq!(a, before);
    a.enable_activation(ActivationFunction::Prelu);
    assert_ne!(a.restrict & restrict::ACTIVATION_PRELU, 0);
}
