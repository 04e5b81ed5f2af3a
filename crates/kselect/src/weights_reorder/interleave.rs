//! Row-pair interleaving of a transposed filter matrix for the gemm-like
//! convolution.
//!
//! The source is the `OFM × K` matrix of dense `oiyx` weights
//! (`K = fx·fy·IFM`). Destination row `y` is source column `y`, padded to
//! `c = align(OFM, N)` elements; rows are emitted in groups of `fx`, the
//! first `fx/2·2` as side-by-side pairs in blocks of `block_width`, a
//! trailing odd row on its own in chunks of `row_alignment`. Every emitted
//! row or pair takes `2c` destination elements.

use crate::types::align;

/// Geometry of one interleave, computed before any buffer is touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterleaveLayout {
    pub ofm: usize,
    /// Source row length, `fx·fy·IFM`.
    pub k: usize,
    pub filter_x: usize,
    pub sub_block_n: usize,
    pub block_width: usize,
    pub row_alignment: usize,
}

impl InterleaveLayout {
    pub const ROW_ALIGNMENT: usize = 32;

    pub fn new(ofm: usize, k: usize, filter_x: usize, sub_block_n: usize, block_width: usize) -> Self {
        Self {
            ofm,
            k,
            filter_x: filter_x.max(1),
            sub_block_n,
            block_width: block_width.max(1),
            row_alignment: Self::ROW_ALIGNMENT,
        }
    }

    /// Destination rows: `K` aligned to the filter width.
    pub fn rows(&self) -> usize {
        align(self.k, self.filter_x)
    }

    /// Destination row width: `OFM` aligned to the sub-block width.
    pub fn row_width(&self) -> usize {
        align(self.ofm, self.sub_block_n)
    }

    pub fn interleaved_rows(&self) -> usize {
        self.filter_x / 2 * 2
    }

    pub fn non_interleaved_rows(&self) -> usize {
        self.filter_x % 2
    }

    /// Destination bytes, 64-byte aligned.
    pub fn size_in_bytes(&self, element_size: usize) -> usize {
        let (ir, nir) = (self.interleaved_rows(), self.non_interleaved_rows());
        align(self.row_width() * self.rows() * (ir + nir * 2) / (ir + nir) * element_size, 64)
    }

    /// Interleave `src` (`ofm·k` elements) into `dst`, which must already be
    /// zeroed and hold [`Self::size_in_bytes`] bytes.
    pub(super) fn apply(&self, src: &[u8], dst: &mut [u8], element_size: usize) {
        let (r, c) = (self.rows(), self.row_width());
        let es = element_size;
        let mut tmp = vec![0u8; 2 * c * es];
        let mut dst_row = 0usize;
        let mut y = 0usize;

        let gather = |tmp: &mut [u8], column: usize, half: usize| {
            for i in 0..self.ofm {
                let at = (i + half * c) * es;
                let element = &mut tmp[at..at + es];
                if column < self.k {
                    let from = (i * self.k + column) * es;
                    element.copy_from_slice(&src[from..from + es]);
                } else {
                    element.fill(0);
                }
            }
        };

        while y < r {
            for _ in (0..self.interleaved_rows()).step_by(2) {
                if y >= r {
                    break;
                }
                gather(&mut tmp, y, 0);
                gather(&mut tmp, y + 1, 1);
                let base = dst_row * 2 * c;
                let mut x = 0;
                while x < c {
                    let width = self.block_width.min(c - x);
                    let out = base + 2 * x;
                    dst[out * es..(out + width) * es].copy_from_slice(&tmp[x * es..(x + width) * es]);
                    dst[(out + width) * es..(out + 2 * width) * es].copy_from_slice(&tmp[(c + x) * es..(c + x + width) * es]);
                    x += width;
                }
                dst_row += 1;
                y += 2;
            }

            for _ in 0..self.non_interleaved_rows() {
                if y >= r {
                    break;
                }
                gather(&mut tmp, y, 0);
                let base = dst_row * 2 * c;
                let mut x = 0;
                while x < c {
                    let width = self.row_alignment.min(c - x);
                    let out = base + 2 * x;
                    dst[out * es..(out + width) * es].copy_from_slice(&tmp[x * es..(x + width) * es]);
                    x += width;
                }
                dst_row += 1;
                y += 1;
            }
        }
    }
}
