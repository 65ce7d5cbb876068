use alloc::vec;

use super::{PALETTE_INFO_GRAY, PALETTE_MARKER, PcxHeader};
use crate::bitmap::Palette;
use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PaletteFormat, PixelLayout};
use crate::planes::{combine_bit_planes, expand_packed, interleave_byte_planes};
use crate::rle::unpack_pcx;
use crate::source::{Reader, SeekFrom};

/// How scanline planes turn into pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PcxKind {
    /// 8-bit samples, one per plane (indexed, grey, RGB or RGBA).
    Bytes,
    /// 1-bit planes OR-ed into a palette index.
    BitPlanes,
    /// 2 or 4 bits per pixel packed in a single plane.
    Packed,
}

fn classify(header: &PcxHeader) -> Result<(PcxKind, PixelLayout), BitmapError> {
    match (header.bits_per_pixel, header.planes) {
        (8, 1) => Ok((PcxKind::Bytes, PixelLayout::Indexed)),
        (8, 3) => Ok((PcxKind::Bytes, PixelLayout::Rgb)),
        (8, 4) => Ok((PcxKind::Bytes, PixelLayout::Rgba)),
        (1, 1..=4) => Ok((PcxKind::BitPlanes, PixelLayout::Indexed)),
        (2 | 4, 1) => Ok((PcxKind::Packed, PixelLayout::Indexed)),
        (bpp, planes) => Err(BitmapError::UnsupportedVariant(alloc::format!(
            "PCX with {bpp} bits per pixel and {planes} planes"
        ))),
    }
}

/// The 256-colour palette appended after the image data, if present.
fn trailing_palette(src: &mut Reader<'_>) -> Result<Option<Palette>, BitmapError> {
    if src.len() < super::HEADER_LEN + 769 {
        return Ok(None);
    }
    let saved = src.tell();
    src.seek(SeekFrom::End(-769))?;
    let marker = src.read_u8()?;
    let palette = if marker == PALETTE_MARKER {
        Some(Palette::new(PaletteFormat::Rgb24, src.take(768)?.to_vec())?)
    } else {
        None
    };
    src.set_position(saved)?;
    Ok(palette)
}

/// Palette for the small depths: monochrome, or the header's 16-colour map.
fn header_palette(header: &PcxHeader, bits: u32) -> Result<Palette, BitmapError> {
    if bits == 1 {
        return Palette::new(PaletteFormat::Rgb24, vec![0, 0, 0, 255, 255, 255]);
    }
    let entries = 1usize << bits;
    Palette::new(PaletteFormat::Rgb24, header.colormap[..entries * 3].to_vec())
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let header = PcxHeader::read(src)?;
    let (kind, mut layout) = classify(&header)?;
    let (width, height) = (header.width(), header.height());
    log::debug!(
        "PCX v{} {width}x{height}, {} bpp x {} planes",
        header.version,
        header.bits_per_pixel,
        header.planes
    );

    let mut palette = None;
    if kind == PcxKind::Bytes && layout == PixelLayout::Indexed {
        palette = trailing_palette(src)?;
        if header.palette_info == PALETTE_INFO_GRAY || palette.is_none() {
            layout = PixelLayout::Gray;
            palette = None;
        }
    }

    let mut bitmap = cx.bitmap(width, height, layout, Origin::UpperLeft)?;
    let planes = usize::from(header.planes);
    let stride = usize::from(header.bytes_per_line);
    let w = width as usize;
    let row_bytes = bitmap.row_bytes();
    let mut line = vec![0u8; stride * planes];

    for (y, row) in bitmap.pixels_mut().chunks_exact_mut(row_bytes).enumerate() {
        if y % 16 == 0 {
            cx.stop.check()?;
        }
        unpack_pcx(src, &mut line)?;
        match kind {
            PcxKind::Bytes => interleave_byte_planes(&line, stride, planes, w, row),
            PcxKind::BitPlanes => combine_bit_planes(&line, stride, planes, row),
            PcxKind::Packed => expand_packed(usize::from(header.bits_per_pixel), &line, row),
        }
    }

    match kind {
        PcxKind::Bytes => {
            if let Some(palette) = palette {
                bitmap.set_palette(palette)?;
            }
        }
        PcxKind::BitPlanes => {
            bitmap.set_palette(header_palette(&header, u32::from(header.planes))?)?
        }
        PcxKind::Packed => {
            bitmap.set_palette(header_palette(&header, u32::from(header.bits_per_pixel))?)?
        }
    }
    Ok(DecodeOutput::single(ImageFormat::Pcx, bitmap))
}
