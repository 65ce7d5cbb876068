//! Apple icon family (`icns`) decoder.
//!
//! The classic RGB elements and their 8-bit masks are decoded; each icon
//! size becomes one RGBA frame, in the order its first element appears.
//! PNG and JPEG 2000 payloads are skipped.

use alloc::vec::Vec;

use crate::bitmap::Bitmap;
use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PixelLayout};
use crate::rle::{self, PackBits};
use crate::source::Reader;

const MAGIC: &[u8; 4] = b"icns";
const ELEMENT_HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Element {
    Rgb(u32),
    Mask(u32),
    Compressed,
    Other,
}

fn classify(tag: &[u8; 4]) -> Element {
    match tag {
        b"is32" => Element::Rgb(16),
        b"il32" => Element::Rgb(32),
        b"ih32" => Element::Rgb(48),
        b"it32" => Element::Rgb(128),
        b"s8mk" => Element::Mask(16),
        b"l8mk" => Element::Mask(32),
        b"h8mk" => Element::Mask(48),
        b"t8mk" => Element::Mask(128),
        b"ic07" | b"ic08" | b"ic09" | b"ic10" | b"ic11" | b"ic12" | b"ic13" | b"ic14"
        | b"icp4" | b"icp5" | b"icp6" => Element::Compressed,
        _ => Element::Other,
    }
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| r.take(4).is_ok_and(|m| m == MAGIC))
}

/// Frame for `size`, created opaque black on first use.
fn frame_for<'f>(
    frames: &'f mut Vec<(u32, Bitmap)>,
    size: u32,
    cx: &DecodeContext<'_>,
) -> Result<&'f mut Bitmap, BitmapError> {
    let index = match frames.iter().position(|(s, _)| *s == size) {
        Some(i) => i,
        None => {
            cx.check_frames(frames.len() + 1)?;
            let mut bitmap = cx.bitmap(size, size, PixelLayout::Rgba, Origin::UpperLeft)?;
            bitmap
                .pixels_mut()
                .chunks_exact_mut(4)
                .for_each(|px| px[3] = 0xFF);
            frames.push((size, bitmap));
            frames.len() - 1
        }
    };
    Ok(&mut frames[index].1)
}

fn read_rgb(data: &[u8], size: u32, is_it32: bool, out: &mut [u8]) -> Result<(), BitmapError> {
    let data = if is_it32 {
        data.get(4..).ok_or(BitmapError::UnexpectedEof)?
    } else {
        data
    };
    let count = (size * size) as usize;
    if data.len() == count * 4 {
        // Uncompressed pixels are stored ARGB; the leading byte is unused.
        for (px, argb) in out.chunks_exact_mut(4).zip(data.chunks_exact(4)) {
            px[..3].copy_from_slice(&argb[1..]);
        }
        return Ok(());
    }
    let mut reader = Reader::new(data);
    for channel in 0..3 {
        rle::unpack_strided(PackBits::Icns, &mut reader, out, channel, 4, count)?;
    }
    Ok(())
}

fn read_mask(data: &[u8], size: u32, out: &mut [u8]) -> Result<(), BitmapError> {
    let count = (size * size) as usize;
    let mask = data.get(..count).ok_or(BitmapError::UnexpectedEof)?;
    for (px, &a) in out.chunks_exact_mut(4).zip(mask) {
        px[3] = a;
    }
    Ok(())
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    if src.take(4)? != MAGIC {
        return Err(BitmapError::InvalidHeader("missing icns magic".into()));
    }
    let declared = src.read_u32_be()? as usize;
    if declared < ELEMENT_HEADER_LEN || declared > src.len() {
        return Err(BitmapError::InvalidHeader(alloc::format!(
            "icns length {declared} for a {}-byte file",
            src.len()
        )));
    }

    let mut frames: Vec<(u32, Bitmap)> = Vec::new();
    while src.tell() + ELEMENT_HEADER_LEN <= declared {
        cx.stop.check()?;
        let tag = src.read_array::<4>()?;
        let len = src.read_u32_be()? as usize;
        let body = len.checked_sub(ELEMENT_HEADER_LEN).ok_or_else(|| {
            BitmapError::IllegalValue(alloc::format!("icns element length {len}"))
        })?;
        let data = src.take(body)?;
        match classify(&tag) {
            Element::Rgb(size) => {
                let frame = frame_for(&mut frames, size, cx)?;
                read_rgb(data, size, &tag == b"it32", frame.pixels_mut())?;
            }
            Element::Mask(size) => {
                let frame = frame_for(&mut frames, size, cx)?;
                read_mask(data, size, frame.pixels_mut())?;
            }
            Element::Compressed => {
                log::warn!(
                    "icns: skipping {} element, PNG/JPEG 2000 payloads are not decoded",
                    core::str::from_utf8(&tag).unwrap_or("????")
                );
            }
            Element::Other => {
                log::debug!(
                    "icns: ignoring {} element",
                    core::str::from_utf8(&tag).unwrap_or("????")
                );
            }
        }
    }

    if frames.is_empty() {
        return Err(BitmapError::IllegalValue(
            "icns file holds no decodable icons".into(),
        ));
    }
    DecodeOutput::from_frames(
        ImageFormat::Icns,
        frames.into_iter().map(|(_, bitmap)| bitmap).collect(),
    )
}
