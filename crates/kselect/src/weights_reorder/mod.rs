//! Host-side weight transforms for kernels whose weights layout has no
//! generic reorder kernel.
//!
//! Both transforms start from dense `oiyx` weights of the kernel's element
//! type; sources in another simple layout, with padding or of the other
//! float type are repacked first. Destination sizes are computed up front
//! and checked against the caller's buffer before anything is written.

mod interleave;
pub mod osv16;

use half::f16;

pub use interleave::InterleaveLayout;

use crate::{
    error::{KernelSelectorError, Result}, tensor::{Layout, WeightsLayout, WeightsTensor}, types::WeightsType
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuReorderKind {
    /// Transposed, row-pair interleaved filter matrix.
    Interleave(InterleaveLayout),
    /// `os_iyx_osv16` output-channel blocking.
    Osv16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CpuReorder {
    pub kind: CpuReorderKind,
    pub source: WeightsTensor,
    pub target_type: WeightsType,
}

impl CpuReorder {
    pub fn new(kind: CpuReorderKind, source: WeightsTensor, target_type: WeightsType) -> Self {
        Self { kind, source, target_type }
    }

    /// Bytes the destination buffer must hold.
    pub fn new_buffer_size(&self) -> usize {
        let element_size = self.target_type.size_in_bytes();
        match self.kind {
            CpuReorderKind::Interleave(layout) => layout.size_in_bytes(element_size),
            CpuReorderKind::Osv16 => self
                .source
                .transform_to(WeightsLayout::OsIyxOsv16, self.target_type)
                .physical_size(),
        }
    }

    /// Transform `src` (described by `self.source`) into `dst`.
    pub fn apply(&self, src: &[u8], dst: &mut [u8]) -> Result<()> {
        let expected_src = self.source.physical_size();
        if src.len() < expected_src {
            return Err(KernelSelectorError::ReorderSourceMismatch {
                expected: expected_src,
                actual: src.len(),
            });
        }
        let expected = self.new_buffer_size();
        if dst.len() != expected {
            return Err(KernelSelectorError::ReorderSizeMismatch {
                expected,
                actual: dst.len(),
            });
        }

        let dense = dense_oiyx(&self.source, src, self.target_type)?;
        let element_size = self.target_type.size_in_bytes();
        dst.fill(0);
        match self.kind {
            CpuReorderKind::Interleave(layout) => {
                let needed = layout.ofm * layout.k * element_size;
                if dense.len() != needed {
                    return Err(KernelSelectorError::ReorderSourceMismatch {
                        expected: needed,
                        actual: dense.len(),
                    });
                }
                layout.apply(&dense, dst, element_size);
            }
            CpuReorderKind::Osv16 => {
                let s = &self.source;
                osv16::apply(&dense, dst, [s.x().v, s.y().v, s.ifm().v, s.ofm().v], element_size);
            }
        }
        Ok(())
    }
}

/// Copy `src` into dense `oiyx` order, converting to `target_type`.
fn dense_oiyx(source: &WeightsTensor, src: &[u8], target_type: WeightsType) -> Result<Vec<u8>> {
    let (x, y, ifm, ofm) = (source.x(), source.y(), source.ifm(), source.ofm());
    let (src_size, dst_size) = (source.dtype.size_in_bytes(), target_type.size_in_bytes());
    let unsupported = || KernelSelectorError::UnsupportedReorder {
        from: format!("{}:{}", source.layout, source.dtype),
        to: format!("{}:{}", WeightsLayout::Oiyx, target_type),
    };
    if !source.layout.is_simple() {
        return Err(unsupported());
    }

    let mut out = Vec::with_capacity(source.length() * dst_size);
    for o in 0..ofm.v {
        for i in 0..ifm.v {
            for yy in 0..y.v {
                for xx in 0..x.v {
                    let at = (source.offset + xx * x.pitch + yy * y.pitch + i * ifm.pitch + o * ofm.pitch) * src_size;
                    let element = &src[at..at + src_size];
                    if !convert_element(source.dtype, target_type, element, &mut out) {
                        return Err(unsupported());
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Append `element` converted from `from` to `to`. False when no
/// conversion exists.
fn convert_element(from: WeightsType, to: WeightsType, element: &[u8], out: &mut Vec<u8>) -> bool {
    match (from, to) {
        (a, b) if a == b => out.extend_from_slice(element),
        (WeightsType::F32, WeightsType::F16) => {
            let value = f32::from_ne_bytes([element[0], element[1], element[2], element[3]]);
            out.extend_from_slice(&f16::from_f32(value).to_ne_bytes());
        }
        (WeightsType::F16, WeightsType::F32) => {
            let value = f16::from_ne_bytes([element[0], element[1]]);
            out.extend_from_slice(&value.to_f32().to_ne_bytes());
        }
        _ => return false,
    }
    true
}

#[path = "weights_reorder.test.rs"]
mod tests;
