//! Plane-to-pixel conversions for planar layouts (PCX, ILBM).

/// Interleave byte planes: `line` holds `planes` runs of `stride` bytes, the
/// output holds `width` pixels of `planes` bytes each.
pub(crate) fn interleave_byte_planes(
    line: &[u8],
    stride: usize,
    planes: usize,
    width: usize,
    out: &mut [u8],
) {
    for (p, plane) in line.chunks_exact(stride).take(planes).enumerate() {
        for (x, &v) in plane[..width].iter().enumerate() {
            out[x * planes + p] = v;
        }
    }
}

/// Expand sub-byte samples (1, 2 or 4 bits, MSB first) to one byte each.
pub(crate) fn expand_packed(bits: usize, input: &[u8], out: &mut [u8]) {
    let per_byte = 8 / bits;
    let mask = ((1u16 << bits) - 1) as u8;
    for (x, o) in out.iter_mut().enumerate() {
        let byte = input[x / per_byte];
        let shift = 8 - bits * (x % per_byte + 1);
        *o = (byte >> shift) & mask;
    }
}

/// OR single-bit planes into per-pixel indices: bit `p` of pixel `x` comes
/// from bit `7 - x % 8` of byte `x / 8` of plane `p`.
pub(crate) fn combine_bit_planes(line: &[u8], stride: usize, planes: usize, out: &mut [u8]) {
    out.fill(0);
    for (p, plane) in line.chunks_exact(stride).take(planes).enumerate() {
        for (x, o) in out.iter_mut().enumerate() {
            let bit = (plane[x / 8] >> (7 - x % 8)) & 1;
            *o |= bit << p;
        }
    }
}

/// Combine 24 bit-planes (8 per channel, least significant first) into RGB.
pub(crate) fn combine_rgb_planes(line: &[u8], stride: usize, width: usize, out: &mut [u8]) {
    out[..width * 3].fill(0);
    for (p, plane) in line.chunks_exact(stride).take(24).enumerate() {
        let channel = p / 8;
        let shift = p % 8;
        for x in 0..width {
            let bit = (plane[x / 8] >> (7 - x % 8)) & 1;
            out[x * 3 + channel] |= bit << shift;
        }
    }
}
