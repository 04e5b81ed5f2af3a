/// Output channels grouped per sub-group read.
pub const SLICE: usize = 16;

/// Destination element of source `(x, y, ifm, ofm)` in `os_iyx_osv16`.
pub fn destination_index(x: usize, y: usize, ifm: usize, ofm: usize, width: usize, height: usize, ifm_count: usize) -> usize {
    let (slice_id, id_in_slice) = (ofm / SLICE, ofm % SLICE);
    id_in_slice + SLICE * (x + width * (y + height * (ifm + slice_id * ifm_count)))
}

/// Scatter dense `oiyx` weights into 16-wide output-channel blocks. `dst`
/// must be zeroed so the padding lanes of a partial last block stay zero.
pub(super) fn apply(src: &[u8], dst: &mut [u8], dims: [usize; 4], element_size: usize) {
    let [width, height, ifm_count, ofm_count] = dims;
    let es = element_size;
    let mut from = 0;
    for ofm in 0..ofm_count {
        for ifm in 0..ifm_count {
            for y in 0..height {
                for x in 0..width {
                    let to = destination_index(x, y, ifm, ofm, width, height, ifm_count) * es;
                    dst[to..to + es].copy_from_slice(&src[from..from + es]);
                    from += es;
                }
            }
        }
    }
}
