//! GIF87a/GIF89a decoder (internal).
//!
//! Use top-level [`crate::decode_gif`]. Every frame is a full logical-screen
//! canvas with the frame's own sub-image composed onto the previous frame
//! according to its disposal method.

mod decode;

use alloc::vec;
use alloc::vec::Vec;

use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::source::Reader;

/// Whether the stream starts with a GIF signature (case-insensitive).
pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| {
        r.take(6)
            .is_ok_and(|sig| {
                sig.eq_ignore_ascii_case(b"GIF87a") || sig.eq_ignore_ascii_case(b"GIF89a")
            })
    })
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    decode::GifDecoder::new(src, cx)?.run()
}

/// Display rows in the order an interlaced image stores them.
fn interlaced_rows(height: usize) -> impl Iterator<Item = usize> {
    [(0usize, 8usize), (4, 8), (2, 4), (1, 2)]
        .into_iter()
        .flat_map(move |(start, step)| (start..height).step_by(step))
}

/// Reorder the rows of an interlaced image into display order.
///
/// `data` holds `height` rows of `width` bytes in the four-pass storage order
/// (every 8th row from 0, every 8th from 4, every 4th from 2, every 2nd
/// from 1). The result is a new buffer; applying it twice is not the same as
/// applying it once.
pub fn deinterlace(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>, BitmapError> {
    let len = width
        .checked_mul(height)
        .ok_or(BitmapError::DimensionsTooLarge {
            width: width as u32,
            height: height as u32,
        })?;
    if data.len() < len {
        return Err(BitmapError::BufferTooSmall {
            needed: len,
            actual: data.len(),
        });
    }
    let mut out = vec![0u8; len];
    for (stored, y) in interlaced_rows(height).enumerate() {
        out[y * width..(y + 1) * width]
            .copy_from_slice(&data[stored * width..(stored + 1) * width]);
    }
    Ok(out)
}
