//! Tensor descriptors: logical sizes, pitches, offset and padding of one buffer.

pub mod layout;

use smallvec::SmallVec;

pub use layout::{DataLayout, ElementType, Layout, WeightsLayout, data_channel, weights_channel};

use crate::types::{Datatype, WeightsType, align};

/// One dimension: logical size and distance (in elements) between neighbours.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dim {
    pub v: usize,
    pub pitch: usize,
}

impl Dim {
    pub const fn new(v: usize, pitch: usize) -> Self {
        Self { v, pitch }
    }
}

/// Value the padded area of a buffer is known to hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PaddedVal {
    #[default]
    Undefined,
    Zero,
    One,
    Highest,
    Lowest,
}

pub type Dims = SmallVec<[Dim; 5]>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tensor<L: Layout> {
    pub dtype: L::Element,
    pub layout: L,
    pub padded_val: PaddedVal,
    pub offset: usize,
    /// Innermost dimension first.
    pub dims: Dims,
}

pub type DataTensor = Tensor<DataLayout>;
pub type WeightsTensor = Tensor<WeightsLayout>;

fn dense_dims(sizes: &[usize]) -> Dims {
    let mut pitch = 1;
    sizes
        .iter()
        .map(|&v| {
            let dim = Dim::new(v, pitch);
            pitch *= v;
            dim
        })
        .collect()
}

impl<L: Layout> Tensor<L> {
    pub fn new(dtype: L::Element, layout: L, padded_val: PaddedVal, offset: usize, dims: Dims) -> Self {
        Self {
            dtype,
            layout,
            padded_val,
            offset,
            dims,
        }
    }

    /// Unpadded tensor with pitches accumulated innermost-first.
    pub fn dense(dtype: L::Element, layout: L, sizes: &[usize]) -> Self {
        Self::new(dtype, layout, PaddedVal::Undefined, 0, dense_dims(sizes))
    }

    /// Dense tensor built from per-channel sizes in channel-table order.
    ///
    /// Channels the layout does not carry are dropped.
    pub fn from_channel_sizes(dtype: L::Element, layout: L, channel_sizes: &[usize]) -> Self {
        let mut sizes = vec![1; layout.channels_count()];
        for (channel, &size) in channel_sizes.iter().enumerate() {
            if let Some(idx) = layout.channel_index(channel) {
                sizes[idx] = size;
            }
        }
        Self::dense(dtype, layout, &sizes)
    }

    /// Dimension of `channel`, or `{1, 1}` when the layout lacks it.
    pub fn channel(&self, channel: usize) -> Dim {
        self.layout
            .channel_index(channel)
            .and_then(|idx| self.dims.get(idx).copied())
            .unwrap_or(Dim::new(1, 1))
    }

    pub fn element_size(&self) -> usize {
        self.dtype.size_in_bytes()
    }

    pub fn length(&self) -> usize {
        self.dims.iter().map(|d| d.v).product()
    }

    pub fn length_with_padding(&self) -> usize {
        self.dims.iter().fold(1, |acc, d| acc.max(d.pitch * d.v))
    }

    pub fn padding_exists(&self) -> bool {
        self.length() != self.length_with_padding()
    }

    pub fn simple_layout(&self) -> bool {
        self.layout.is_simple()
    }

    pub fn logical_dims(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.v).collect()
    }

    /// Same element type, layout and logical sizes; pitches and offset may differ.
    pub fn same_dims(&self, other: &Self) -> bool {
        self.dtype == other.dtype
            && self.layout == other.layout
            && self.dims.len() == other.dims.len()
            && self.dims.iter().zip(&other.dims).all(|(a, b)| a.v == b.v)
    }
}

impl DataTensor {
    pub fn x(&self) -> Dim {
        self.channel(data_channel::X)
    }

    pub fn y(&self) -> Dim {
        self.channel(data_channel::Y)
    }

    pub fn feature(&self) -> Dim {
        self.channel(data_channel::FEATURE)
    }

    pub fn roi(&self) -> Dim {
        self.channel(data_channel::ROI)
    }

    pub fn batch(&self) -> Dim {
        self.channel(data_channel::BATCH)
    }

    /// Dense tensor from logical `x`, `y`, feature and batch sizes.
    pub fn with_sizes(dtype: Datatype, layout: DataLayout, x: usize, y: usize, f: usize, b: usize) -> Self {
        Self::from_channel_sizes(dtype, layout, &[x, y, f, 1, b])
    }

    /// Bytes the buffer spans, including the leading offset.
    pub fn physical_size(&self) -> usize {
        let elements = match self.layout {
            DataLayout::BsFBsv8Af8 => align(self.batch().v, 8) * align(self.feature().v, 8),
            DataLayout::BsFBsv16Af8 => align(self.batch().v, 16) * align(self.feature().v, 8),
            _ => self.length_with_padding(),
        };
        (self.offset + elements) * self.element_size()
    }

    /// Re-pack the logical sizes into `layout` as a dense tensor.
    ///
    /// Spatial extents fold into the feature channel when `layout` has no
    /// spatial channels; they read as 1 when expanding a 2D tensor.
    pub fn transform(&self, layout: DataLayout) -> DataTensor {
        let (mut x, mut y, mut f) = (self.x().v, self.y().v, self.feature().v * self.roi().v);
        if layout.channel_index(data_channel::X).is_none() && layout.channel_index(data_channel::Y).is_none() {
            f *= x * y;
            x = 1;
            y = 1;
        }
        let mut out = Self::with_sizes(self.dtype, layout, x, y, f, self.batch().v);
        out.padded_val = self.padded_val;
        out
    }

    /// Collapse feature and spatial channels into a 2D tensor (`bf` or `fb`).
    pub fn flatten_feature_and_spatials(&self) -> DataTensor {
        let target = match self.layout {
            DataLayout::Bfyx | DataLayout::Byxf | DataLayout::Bf | DataLayout::Brfyx => DataLayout::Bf,
            DataLayout::Yxfb | DataLayout::Fyxb | DataLayout::Fb => DataLayout::Fb,
            blocked => blocked,
        };
        self.transform(target)
    }
}

impl WeightsTensor {
    pub fn x(&self) -> Dim {
        self.channel(weights_channel::X)
    }

    pub fn y(&self) -> Dim {
        self.channel(weights_channel::Y)
    }

    pub fn ifm(&self) -> Dim {
        self.channel(weights_channel::IFM)
    }

    pub fn ofm(&self) -> Dim {
        self.channel(weights_channel::OFM)
    }

    /// Dense tensor from logical filter `x`, `y`, input and output feature counts.
    pub fn with_sizes(wtype: WeightsType, layout: WeightsLayout, x: usize, y: usize, ifm: usize, ofm: usize) -> Self {
        Self::from_channel_sizes(wtype, layout, &[x, y, ifm, ofm])
    }

    /// Bytes the buffer spans. Blocked layouts use their aligned extents.
    pub fn physical_size(&self) -> usize {
        let (x, y, ifm, ofm) = (self.x().v, self.y().v, self.ifm().v, self.ofm().v);
        let elements = match self.layout {
            WeightsLayout::OsIyxOsv16 => x * y * ifm * align(ofm, 16),
            WeightsLayout::OsIOsv16 => ifm * align(ofm, 16),
            WeightsLayout::OsIOsv8Ai8 => align(ifm, 8) * align(ofm, 8),
            WeightsLayout::OsIOsv16Ai8 => align(ifm, 8) * align(ofm, 16),
            WeightsLayout::IYxsOsYxsv2Osv16 => align(x * y, 2) * ifm * align(ofm, 16),
            WeightsLayout::IyXsOsXsv2Osv16Ao32 | WeightsLayout::IyXsOsXsv2Osv8Ao32 => ifm * y * align(x, 2) * align(ofm, 32),
            _ => self.length_with_padding(),
        };
        (self.offset + elements) * self.element_size()
    }

    /// Re-pack into `layout`, keeping the element type.
    pub fn transform(&self, layout: WeightsLayout) -> WeightsTensor {
        self.transform_to(layout, self.dtype)
    }

    /// Re-pack into `layout` with element type `wtype`.
    ///
    /// Filter extents fold into the input feature channel when `layout` has
    /// no spatial channels.
    pub fn transform_to(&self, layout: WeightsLayout, wtype: WeightsType) -> WeightsTensor {
        let (mut x, mut y, mut ifm) = (self.x().v, self.y().v, self.ifm().v);
        if layout.channel_index(weights_channel::X).is_none() && layout.channel_index(weights_channel::Y).is_none() {
            ifm *= x * y;
            x = 1;
            y = 1;
        }
        let mut out = Self::with_sizes(wtype, layout, x, y, ifm, self.ofm().v);
        out.padded_val = self.padded_val;
        out
    }
}

#[path = "tensor.test.rs"]
mod tests;
