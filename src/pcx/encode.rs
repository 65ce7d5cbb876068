//! PCX encoder: version 5, RLE, 8 bits per plane.

use alloc::vec;
use alloc::vec::Vec;

use enough::Stop;

use super::{MANUFACTURER, PALETTE_INFO_GRAY, PALETTE_MARKER, even_line_len};
use crate::bitmap::{Bitmap, Palette};
use crate::encode::{require_plain_u8, rows_in_order};
use crate::error::BitmapError;
use crate::pixel::{Origin, PixelLayout};
use crate::rle::pack_pcx;

/// Source channel feeding each output plane.
fn plane_channels(layout: PixelLayout) -> Result<&'static [usize], BitmapError> {
    match layout {
        PixelLayout::Indexed | PixelLayout::Gray => Ok(&[0]),
        PixelLayout::Rgb => Ok(&[0, 1, 2]),
        PixelLayout::Rgba => Ok(&[0, 1, 2, 3]),
        PixelLayout::Bgr => Ok(&[2, 1, 0]),
        PixelLayout::Bgra => Ok(&[2, 1, 0, 3]),
        other => Err(BitmapError::UnsupportedVariant(alloc::format!(
            "PCX cannot store {other:?} pixels"
        ))),
    }
}

pub(crate) fn encode(bitmap: &Bitmap, stop: &dyn Stop) -> Result<Vec<u8>, BitmapError> {
    require_plain_u8(bitmap)?;
    let width = bitmap.width();
    let height = bitmap.height();
    let w = width as usize;
    let stride = even_line_len(w, 8);
    // Bytes per line is a 16-bit field.
    let Ok(stride_field) = u16::try_from(stride) else {
        return Err(BitmapError::DimensionsTooLarge { width, height });
    };
    if height > 0x1_0000 {
        return Err(BitmapError::DimensionsTooLarge { width, height });
    }
    let layout = bitmap.layout();
    let channels = plane_channels(layout)?;
    let planes = channels.len();
    let bpp = layout.channels();

    let mut out = Vec::with_capacity(super::HEADER_LEN + w * height as usize * planes / 2 + 769);
    write_header(&mut out, bitmap, planes as u8, stride_field);

    let mut plane = vec![0u8; stride];
    for (y, row) in rows_in_order(bitmap, Origin::UpperLeft).into_iter().enumerate() {
        if y % 16 == 0 {
            stop.check()?;
        }
        for &channel in channels {
            for (x, sample) in plane[..w].iter_mut().enumerate() {
                *sample = row[x * bpp + channel];
            }
            pack_pcx(&plane, &mut out);
        }
    }

    match layout {
        PixelLayout::Indexed => {
            let palette = bitmap.palette().ok_or_else(|| {
                BitmapError::IllegalOperation("indexed bitmap without palette".into())
            })?;
            write_trailing_palette(&mut out, &palette.to_rgb24());
        }
        PixelLayout::Gray => write_trailing_palette(&mut out, &Palette::gray_ramp(256)),
        _ => {}
    }
    Ok(out)
}

fn write_header(out: &mut Vec<u8>, bitmap: &Bitmap, planes: u8, stride: u16) {
    out.extend_from_slice(&[MANUFACTURER, 5, super::ENCODING_RLE, 8]);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&((bitmap.width() - 1) as u16).to_le_bytes());
    out.extend_from_slice(&((bitmap.height() - 1) as u16).to_le_bytes());
    out.extend_from_slice(&72u16.to_le_bytes());
    out.extend_from_slice(&72u16.to_le_bytes());

    // 16-colour header map: the first entries of an indexed palette.
    let mut colormap = [0u8; 48];
    if let Some(palette) = bitmap.palette() {
        let rgb = palette.to_rgb24();
        let n = rgb.data().len().min(48);
        colormap[..n].copy_from_slice(&rgb.data()[..n]);
    }
    out.extend_from_slice(&colormap);

    out.push(0);
    out.push(planes);
    out.extend_from_slice(&stride.to_le_bytes());
    let palette_info = if bitmap.layout() == PixelLayout::Gray {
        PALETTE_INFO_GRAY
    } else {
        1
    };
    out.extend_from_slice(&palette_info.to_le_bytes());
    out.resize(out.len() + super::HEADER_LEN - 70, 0);
}

fn write_trailing_palette(out: &mut Vec<u8>, palette: &Palette) {
    out.push(PALETTE_MARKER);
    let data = palette.data();
    out.extend_from_slice(data);
    out.resize(out.len() + 768 - data.len(), 0);
}
