//! Headered raw pixel dump.
//!
//! A 14-byte little-endian header (`width`, `height`, `depth` as `u32`,
//! channel count and bytes per channel as `u8`) followed by upper-left rows,
//! slice after slice. There is no signature, so RAW is only chosen by
//! extension or an explicit format.

use alloc::vec::Vec;

use enough::Stop;

use crate::bitmap::Bitmap;
use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PixelLayout, SampleType};
use crate::source::Reader;

pub(crate) const HEADER_LEN: usize = 14;

fn layout_for(channels: u8) -> Result<PixelLayout, BitmapError> {
    match channels {
        1 => Ok(PixelLayout::Gray),
        2 => Ok(PixelLayout::GrayAlpha),
        3 => Ok(PixelLayout::Rgb),
        4 => Ok(PixelLayout::Rgba),
        n => Err(BitmapError::IllegalValue(alloc::format!(
            "RAW channel count {n}"
        ))),
    }
}

fn sample_for(bytes: u8) -> Result<SampleType, BitmapError> {
    match bytes {
        1 => Ok(SampleType::U8),
        2 => Ok(SampleType::U16),
        4 => Ok(SampleType::U32),
        n => Err(BitmapError::IllegalValue(alloc::format!(
            "RAW bytes per channel {n}"
        ))),
    }
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let width = src.read_u32_le()?;
    let height = src.read_u32_le()?;
    let depth = src.read_u32_le()?;
    let layout = layout_for(src.read_u8()?)?;
    let sample = sample_for(src.read_u8()?)?;

    let mut bitmap =
        Bitmap::new(width, height, depth, layout, sample, Origin::UpperLeft, cx.limits)?;
    let row = bitmap.row_bytes();
    for (y, dst) in bitmap.pixels_mut().chunks_exact_mut(row).enumerate() {
        if y % 16 == 0 {
            cx.stop.check()?;
        }
        dst.copy_from_slice(src.take(row)?);
    }
    Ok(DecodeOutput::single(ImageFormat::Raw, bitmap))
}

/// Write `bitmap` with the RAW header. BGR layouts are swizzled to RGB;
/// indexed bitmaps have no RAW representation.
pub(crate) fn encode(bitmap: &Bitmap, stop: &dyn Stop) -> Result<Vec<u8>, BitmapError> {
    let swap_rb = match bitmap.layout() {
        PixelLayout::Gray | PixelLayout::GrayAlpha | PixelLayout::Rgb | PixelLayout::Rgba => false,
        PixelLayout::Bgr | PixelLayout::Bgra => true,
        other => {
            return Err(BitmapError::UnsupportedVariant(alloc::format!(
                "RAW cannot store {other:?} pixels"
            )));
        }
    };
    let sample = bitmap.sample().bytes();
    if !matches!(sample, 1 | 2 | 4) {
        return Err(BitmapError::UnsupportedVariant(alloc::format!(
            "RAW cannot store {:?} samples",
            bitmap.sample()
        )));
    }

    let row = bitmap.row_bytes();
    let slice_len = row * bitmap.height() as usize;
    let mut out = Vec::with_capacity(HEADER_LEN + bitmap.pixels().len());
    out.extend_from_slice(&bitmap.width().to_le_bytes());
    out.extend_from_slice(&bitmap.height().to_le_bytes());
    out.extend_from_slice(&bitmap.depth().to_le_bytes());
    out.push(bitmap.layout().channels() as u8);
    out.push(sample as u8);

    let bpp = bitmap.bytes_per_pixel();
    for slice in bitmap.pixels().chunks_exact(slice_len) {
        let rows: Vec<&[u8]> = match bitmap.origin {
            Origin::UpperLeft => slice.chunks_exact(row).collect(),
            Origin::LowerLeft => slice.chunks_exact(row).rev().collect(),
        };
        for (y, line) in rows.into_iter().enumerate() {
            if y % 16 == 0 {
                stop.check()?;
            }
            let start = out.len();
            out.extend_from_slice(line);
            if swap_rb {
                for px in out[start..].chunks_exact_mut(bpp) {
                    let (r, rest) = px.split_at_mut(sample);
                    r.swap_with_slice(&mut rest[sample..2 * sample]);
                }
            }
        }
    }
    Ok(out)
}
