//! 4x4 block-compressed texture decoders (DXT1/BC1 and ETC1).

use alloc::vec::Vec;

use crate::error::BitmapError;
use crate::limits::try_alloc_zeroed;

const BLOCK_BYTES: usize = 8;

/// Compressed size of a `width` x `height` level with 8-byte 4x4 blocks.
pub(crate) fn compressed_len(width: u32, height: u32) -> Result<usize, BitmapError> {
    (width as usize)
        .div_ceil(4)
        .checked_mul((height as usize).div_ceil(4))
        .and_then(|blocks| blocks.checked_mul(BLOCK_BYTES))
        .ok_or(BitmapError::DimensionsTooLarge { width, height })
}

fn for_each_block<F>(
    data: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    mut decode_block: F,
) -> Result<Vec<u8>, BitmapError>
where
    F: FnMut(&[u8; BLOCK_BYTES], &mut [[u8; 4]; 16]),
{
    let needed = compressed_len(width, height)?;
    if data.len() < needed {
        return Err(BitmapError::UnexpectedEof);
    }
    let (w, h) = (width as usize, height as usize);
    let mut out = try_alloc_zeroed(w * h * channels)?;
    let blocks_x = w.div_ceil(4);
    let mut texels = [[0u8; 4]; 16];
    for (i, block) in data[..needed].chunks_exact(BLOCK_BYTES).enumerate() {
        let block: &[u8; BLOCK_BYTES] = block.try_into().map_err(|_| BitmapError::UnexpectedEof)?;
        decode_block(block, &mut texels);
        let bx = (i % blocks_x) * 4;
        let by = (i / blocks_x) * 4;
        for ty in 0..4 {
            for tx in 0..4 {
                let (x, y) = (bx + tx, by + ty);
                if x < w && y < h {
                    let o = (y * w + x) * channels;
                    out[o..o + channels].copy_from_slice(&texels[ty * 4 + tx][..channels]);
                }
            }
        }
    }
    Ok(out)
}

fn rgb565(c: u16) -> [u8; 4] {
    let r = ((c >> 11) & 0x1F) as u8;
    let g = ((c >> 5) & 0x3F) as u8;
    let b = (c & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 255]
}

fn mix(a: [u8; 4], b: [u8; 4], wa: u16, wb: u16) -> [u8; 4] {
    let d = wa + wb;
    let m = |x: u8, y: u8| ((u16::from(x) * wa + u16::from(y) * wb) / d) as u8;
    [m(a[0], b[0]), m(a[1], b[1]), m(a[2], b[2]), 255]
}

/// Decode DXT1 (BC1) blocks to RGBA8. Three-colour blocks map index 3 to
/// transparent black.
pub(crate) fn decode_dxt1(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, BitmapError> {
    for_each_block(data, width, height, 4, |block, texels| {
        let c0 = u16::from_le_bytes([block[0], block[1]]);
        let c1 = u16::from_le_bytes([block[2], block[3]]);
        let (p0, p1) = (rgb565(c0), rgb565(c1));
        let palette = if c0 > c1 {
            [p0, p1, mix(p0, p1, 2, 1), mix(p0, p1, 1, 2)]
        } else {
            [p0, p1, mix(p0, p1, 1, 1), [0, 0, 0, 0]]
        };
        let bits = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        for (i, t) in texels.iter_mut().enumerate() {
            *t = palette[((bits >> (2 * i)) & 3) as usize];
        }
    })
}

const ETC1_MODIFIERS: [[i16; 2]; 8] = [
    [2, 8],
    [5, 17],
    [9, 29],
    [13, 42],
    [18, 60],
    [24, 80],
    [33, 106],
    [47, 183],
];

/// Decode ETC1 blocks to RGB8.
pub(crate) fn decode_etc1(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, BitmapError> {
    for_each_block(data, width, height, 3, |block, texels| {
        let bits = u64::from_be_bytes(*block);
        let flip = bits & (1 << 32) != 0;
        let diff = bits & (1 << 33) != 0;
        let field = |shift: u32, width: u32| ((bits >> shift) & ((1 << width) - 1)) as u8;

        let (base1, base2) = if diff {
            let expand5 = |v: u8| (v << 3) | (v >> 2);
            let delta = |v: u8| ((v << 5) as i8 >> 5) as i16;
            let (r, g, b) = (field(59, 5), field(51, 5), field(43, 5));
            let (dr, dg, db) = (delta(field(56, 3)), delta(field(48, 3)), delta(field(40, 3)));
            let add = |c: u8, d: i16| (i16::from(c) + d).clamp(0, 31) as u8;
            (
                [expand5(r), expand5(g), expand5(b)],
                [
                    expand5(add(r, dr)),
                    expand5(add(g, dg)),
                    expand5(add(b, db)),
                ],
            )
        } else {
            let expand4 = |v: u8| v * 17;
            (
                [expand4(field(60, 4)), expand4(field(52, 4)), expand4(field(44, 4))],
                [expand4(field(56, 4)), expand4(field(48, 4)), expand4(field(40, 4))],
            )
        };
        let tables = [field(37, 3) as usize, field(34, 3) as usize];

        for y in 0..4usize {
            for x in 0..4usize {
                let second = if flip { y >= 2 } else { x >= 2 };
                let (base, table) = if second {
                    (base2, tables[1])
                } else {
                    (base1, tables[0])
                };
                let i = x * 4 + y;
                let lsb = (bits >> i) & 1;
                let msb = (bits >> (i + 16)) & 1;
                let [a, b] = ETC1_MODIFIERS[table];
                let modifier = match (msb, lsb) {
                    (0, 0) => a,
                    (0, _) => b,
                    (_, 0) => -a,
                    _ => -b,
                };
                let c = |v: u8| (i16::from(v) + modifier).clamp(0, 255) as u8;
                texels[y * 4 + x] = [c(base[0]), c(base[1]), c(base[2]), 255];
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dxt1_solid_block() {
        // c0 = pure red, c1 = black, all indices 0.
        let block = [0x00, 0xF8, 0x00, 0x00, 0, 0, 0, 0];
        let out = decode_dxt1(&block, 4, 4).unwrap();
        assert_eq!(out.len(), 64);
        assert!(out.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn dxt1_three_colour_transparency() {
        // c0 <= c1 selects the 3-colour mode; index 3 everywhere.
        let block = [0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let out = decode_dxt1(&block, 2, 2).unwrap();
        assert_eq!(out, [0u8; 16]);
    }

    #[test]
    fn etc1_individual_mode() {
        // Both sub-blocks base 0x8 (136 per channel), table 0, all indices 0 (+2).
        let block = [0x88, 0x88, 0x88, 0x00, 0, 0, 0, 0];
        let out = decode_etc1(&block, 4, 4).unwrap();
        assert!(out.chunks_exact(3).all(|p| p == [138, 138, 138]));
    }

    #[test]
    fn etc1_differential_mode_with_negative_modifier() {
        // diff bit set, base 5-bit 16 (132), delta 0, table 0; msb plane all
        // ones and lsb plane all ones selects -b = -8.
        let block = [0x80, 0x80, 0x80, 0x02, 0xFF, 0xFF, 0xFF, 0xFF];
        let out = decode_etc1(&block, 4, 4).unwrap();
        assert!(out.chunks_exact(3).all(|p| p == [124, 124, 124]));
    }

    #[test]
    fn short_data_rejected() {
        assert!(decode_etc1(&[0u8; 7], 4, 4).is_err());
        assert_eq!(compressed_len(1, 1).unwrap(), 8);
        assert_eq!(compressed_len(8, 4).unwrap(), 16);
    }
}
