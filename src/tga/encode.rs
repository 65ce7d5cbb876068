//! TGA encoder: uncompressed or RLE, with a 2.0 footer and extension area.

use alloc::vec::Vec;

use enough::Stop;

use super::{DESC_TOP, EXTENSION_LEN, FOOTER_SIGNATURE};
use crate::bitmap::Bitmap;
use crate::encode::require_plain_u8;
use crate::error::BitmapError;
use crate::pixel::{Origin, PixelLayout};
use crate::rle::pack_tga;

const SOFTWARE_ID: &[u8] = b"zenretro";

/// Image type code, bits per pixel and alpha bits for `layout`.
fn target(layout: PixelLayout) -> Result<(u8, u8, u8), BitmapError> {
    match layout {
        PixelLayout::Indexed => Ok((1, 8, 0)),
        PixelLayout::Gray => Ok((3, 8, 0)),
        PixelLayout::GrayAlpha => Ok((3, 16, 8)),
        PixelLayout::Rgb | PixelLayout::Bgr => Ok((2, 24, 0)),
        PixelLayout::Rgba | PixelLayout::Bgra => Ok((2, 32, 8)),
        other => Err(BitmapError::UnsupportedVariant(alloc::format!(
            "TGA cannot store {other:?} pixels"
        ))),
    }
}

/// One scanline in file byte order (BGR/BGRA for colour).
fn file_row(layout: PixelLayout, row: &[u8], out: &mut Vec<u8>) {
    out.clear();
    match layout {
        PixelLayout::Rgb => {
            for px in row.chunks_exact(3) {
                out.extend_from_slice(&[px[2], px[1], px[0]]);
            }
        }
        PixelLayout::Rgba => {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        _ => out.extend_from_slice(row),
    }
}

pub(crate) fn encode(bitmap: &Bitmap, rle: bool, stop: &dyn Stop) -> Result<Vec<u8>, BitmapError> {
    require_plain_u8(bitmap)?;
    let (width, height) = (bitmap.width(), bitmap.height());
    if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        return Err(BitmapError::DimensionsTooLarge { width, height });
    }
    let layout = bitmap.layout();
    let (type_code, bpp, alpha_bits) = target(layout)?;

    // Colour map in BGR(A) order.
    let mut colormap = Vec::new();
    let mut colormap_bits = 0u8;
    if let Some(palette) = bitmap.palette() {
        colormap_bits = if palette.format().has_alpha() { 32 } else { 24 };
        for i in 0..palette.len() {
            if let Some([r, g, b, a]) = palette.rgba(i) {
                colormap.extend_from_slice(&[b, g, r]);
                if colormap_bits == 32 {
                    colormap.push(a);
                }
            }
        }
    }
    let colormap_len = colormap.len() / usize::from(colormap_bits.max(8) / 8);

    let mut out = Vec::with_capacity(18 + colormap.len() + bitmap.pixels().len() + 495 + 26);
    out.push(0);
    out.push(u8::from(!colormap.is_empty()));
    out.push(if rle { type_code + 8 } else { type_code });
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(colormap_len as u16).to_le_bytes());
    out.push(colormap_bits);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(width as u16).to_le_bytes());
    out.extend_from_slice(&(height as u16).to_le_bytes());
    out.push(bpp);
    let top = if bitmap.origin == Origin::UpperLeft {
        DESC_TOP
    } else {
        0
    };
    out.push(top | alpha_bits);
    out.extend_from_slice(&colormap);

    let mut row_buf = Vec::with_capacity(bitmap.row_bytes());
    let bytes_pp = usize::from(bpp / 8);
    for (y, row) in bitmap.pixels().chunks_exact(bitmap.row_bytes()).enumerate() {
        if y % 16 == 0 {
            stop.check()?;
        }
        file_row(layout, row, &mut row_buf);
        if rle {
            pack_tga(&row_buf, bytes_pp, &mut out);
        } else {
            out.extend_from_slice(&row_buf);
        }
    }

    let extension_offset = out.len() as u32;
    write_extension(&mut out, if colormap_bits == 0 { alpha_bits } else { 0 });
    out.extend_from_slice(&extension_offset.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(FOOTER_SIGNATURE);
    Ok(out)
}

fn write_extension(out: &mut Vec<u8>, alpha_bits: u8) {
    let start = out.len();
    out.extend_from_slice(&EXTENSION_LEN.to_le_bytes());
    // author (41), comments (324), timestamp (12), job name (41), job time (6)
    out.resize(start + 2 + 41 + 324 + 12 + 41 + 6, 0);
    let software_at = out.len();
    out.resize(software_at + 41, 0);
    out[software_at..software_at + SOFTWARE_ID.len()].copy_from_slice(SOFTWARE_ID);
    // version, key colour, aspect, gamma, colour correction, stamp, scanline table
    out.resize(out.len() + 3 + 4 + 4 + 4 + 4 + 4 + 4, 0);
    // attributes type: 3 = straight alpha, 0 = none
    out.push(if alpha_bits > 0 { 3 } else { 0 });
    debug_assert_eq!(out.len() - start, usize::from(EXTENSION_LEN));
}
