//! Curated requests: the AlexNet convolutions the cost model is calibrated
//! on, and one named layer per family for interactive selection.

use kselect::{
    Params, kernels::convolution::padded_input_desc, params::{ActivationParams, ConcatenationParams, ConvolutionParams, FullyConnectedParams, LrnParams, PoolingParams, SoftmaxParams}, tensor::{DataLayout, DataTensor, WeightsLayout, WeightsTensor}, types::{ActivationFunction, ConcatAxis, Datatype, LrnMode, PoolType, Size2, SoftmaxDim, WeightsType}
};

/// Input size, output size (x, y, features), filter, stride and padding.
struct ConvShape {
    input: (usize, usize, usize),
    output: (usize, usize, usize),
    filter: usize,
    stride: usize,
    padding: usize,
}

const ALEXNET_CONVOLUTIONS: [ConvShape; 5] = [
    ConvShape { input: (227, 227, 3), output: (55, 55, 96), filter: 11, stride: 4, padding: 0 },
    ConvShape { input: (27, 27, 48), output: (27, 27, 128), filter: 5, stride: 1, padding: 2 },
    ConvShape { input: (13, 13, 256), output: (13, 13, 384), filter: 3, stride: 1, padding: 1 },
    ConvShape { input: (13, 13, 192), output: (13, 13, 192), filter: 3, stride: 1, padding: 1 },
    ConvShape { input: (13, 13, 192), output: (13, 13, 128), filter: 3, stride: 1, padding: 1 },
];

fn convolution(shape: &ConvShape, dtype: Datatype, batch: usize) -> ConvolutionParams {
    let (ix, iy, ifm) = shape.input;
    let (ox, oy, ofm) = shape.output;
    let mut params = ConvolutionParams::new(
        DataTensor::with_sizes(dtype, DataLayout::Bfyx, ix, iy, ifm, batch),
        DataTensor::with_sizes(dtype, DataLayout::Bfyx, ox, oy, ofm, batch),
        WeightsTensor::with_sizes(WeightsType::from(dtype), WeightsLayout::Oiyx, shape.filter, shape.filter, ifm, ofm),
        Some(DataTensor::with_sizes(dtype, DataLayout::Bf, 1, 1, ofm, 1)),
    );
    params.stride = Size2::splat(shape.stride);
    params.padding = Size2::splat(shape.padding);
    params.base_mut().activation = ActivationFunction::Relu;
    params
}

/// F16 `bfyx` RELU AlexNet convolutions, each on a dense input and on the
/// pre-padded input the blocked kernels ask for.
pub fn alexnet_convolutions() -> Vec<ConvolutionParams> {
    let mut sets = Vec::with_capacity(ALEXNET_CONVOLUTIONS.len() * 2);
    for shape in &ALEXNET_CONVOLUTIONS {
        let dense = convolution(shape, Datatype::F16, 1);
        let mut padded = dense.clone();
        *padded.base_mut().input_mut() = padded_input_desc(&dense);
        sets.push(dense);
        sets.push(padded);
    }
    sets
}

/// A named request the CLI can select kernels for.
#[derive(Clone, Debug)]
pub struct CuratedLayer {
    pub name: &'static str,
    pub params: Params,
}

impl CuratedLayer {
    fn new(name: &'static str, params: impl Into<Params>) -> Self {
        let mut params = params.into();
        set_layer_id(&mut params, name);
        Self { name, params }
    }
}

fn set_layer_id(params: &mut Params, name: &str) {
    let base = match params {
        Params::Convolution(p) => p.base_mut(),
        Params::FullyConnected(p) => &mut p.weight_bias.base,
        Params::Pooling(p) => &mut p.base,
        Params::Softmax(p) => &mut p.base,
        Params::Lrn(p) => &mut p.base,
        Params::Activation(p) => &mut p.base,
        Params::Concatenation(p) => &mut p.base,
        Params::ReorderWeights(p) => {
            p.layer_id = name.to_string();
            return;
        }
    };
    base.layer_id = name.to_string();
}

pub fn curated_layers() -> Vec<CuratedLayer> {
    let mut layers: Vec<CuratedLayer> = ["conv1", "conv2", "conv3", "conv4", "conv5"]
        .into_iter()
        .zip(&ALEXNET_CONVOLUTIONS)
        .map(|(name, shape)| CuratedLayer::new(name, convolution(shape, Datatype::F16, 1)))
        .collect();

    let mut conv3_padded = convolution(&ALEXNET_CONVOLUTIONS[2], Datatype::F16, 1);
    *conv3_padded.base_mut().input_mut() = padded_input_desc(&conv3_padded);
    layers.push(CuratedLayer::new("conv3_padded", conv3_padded));

    let mut pool1 = PoolingParams::new(
        DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 55, 55, 96, 1),
        DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 27, 27, 96, 1),
    );
    pool1.pool_size = Size2::splat(3);
    pool1.stride = Size2::splat(2);
    layers.push(CuratedLayer::new("pool1", pool1));

    let mut pool_avg = PoolingParams::new(
        DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 56, 56, 64, 1),
        DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 56, 56, 64, 1),
    );
    pool_avg.pool_type = PoolType::Avg;
    pool_avg.pool_size = Size2::splat(3);
    pool_avg.padding = Size2::splat(1);
    layers.push(CuratedLayer::new("pool_avg", pool_avg));

    let norm = |b| DataTensor::with_sizes(Datatype::F32, DataLayout::Yxfb, 55, 55, 96, b);
    layers.push(CuratedLayer::new("norm1", LrnParams::new(norm(8), norm(8), LrnMode::AcrossChannel, 5)));

    let fc6 = FullyConnectedParams::new(
        DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 6, 6, 256, 1),
        DataTensor::with_sizes(Datatype::F16, DataLayout::Bf, 1, 1, 4096, 1),
        WeightsTensor::with_sizes(WeightsType::F16, WeightsLayout::Oiyx, 6, 6, 256, 4096),
        Some(DataTensor::with_sizes(Datatype::F16, DataLayout::Bf, 1, 1, 4096, 1)),
    );
    layers.push(CuratedLayer::new("fc6", fc6));

    let fc8 = FullyConnectedParams::new(
        DataTensor::with_sizes(Datatype::F16, DataLayout::Fb, 1, 1, 4096, 32),
        DataTensor::with_sizes(Datatype::F16, DataLayout::Fb, 1, 1, 1000, 32),
        WeightsTensor::with_sizes(WeightsType::F16, WeightsLayout::Io, 1, 1, 4096, 1000),
        Some(DataTensor::with_sizes(Datatype::F16, DataLayout::Bf, 1, 1, 1000, 1)),
    );
    layers.push(CuratedLayer::new("fc8_b32", fc8));

    let classes = DataTensor::with_sizes(Datatype::F16, DataLayout::Bf, 1, 1, 1000, 1);
    layers.push(CuratedLayer::new(
        "prob",
        SoftmaxParams::new(classes.clone(), classes, SoftmaxDim::Feature),
    ));

    let map = DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 13, 13, 384, 1);
    let mut relu = ActivationParams::new(map.clone(), map);
    relu.base.activation = ActivationFunction::Relu;
    layers.push(CuratedLayer::new("relu3", relu));

    let branch = |f| DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 28, 28, f, 1);
    if let Some(concat) = ConcatenationParams::new(
        vec![branch(64), branch(128), branch(32), branch(32)],
        branch(256),
        ConcatAxis::Feature,
    ) {
        layers.push(CuratedLayer::new("inception_3a_output", concat));
    }
    layers
}

pub fn curated_layer(name: &str) -> Option<CuratedLayer> {
    curated_layers().into_iter().find(|layer| layer.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_convolution_comes_dense_and_pre_padded() {
        let sets = alexnet_convolutions();
        assert_eq!(sets.len(), 10);
        let (dense, padded) = (&sets[4], &sets[5]);
        assert_eq!(dense.input().offset, 0);
        assert_eq!(padded.input().offset, 15 + 1);
        // Pitches and offsets do not take part in the signature.
        assert_eq!(dense.to_string(), padded.to_string());
    }

    #[test]
    fn curated_layers_are_unique_and_named() {
        let layers = curated_layers();
        for layer in &layers {
            assert_eq!(layer.params.layer_id(), layer.name);
            assert_eq!(layers.iter().filter(|other| other.name == layer.name).count(), 1);
        }
        assert!(curated_layer("conv1").is_some());
        assert!(curated_layer("conv9").is_none());
    }
}
