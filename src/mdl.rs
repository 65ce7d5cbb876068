//! Half-Life MDL texture extraction.
//!
//! Only the embedded skins are decoded. Each texture is an 8-bit indexed
//! image followed by its own 768-byte RGB palette; textures become sibling
//! frames in file order.

use alloc::vec::Vec;

use crate::bitmap::Palette;
use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PaletteFormat, PixelLayout};
use crate::source::{Reader, SeekFrom};

/// `"IDST"` read as a little-endian `u32`.
const MAGIC: u32 = 0x5453_4449;
const VERSION: i32 = 10;
const TEXTURE_COUNT_OFFSET: u64 = 180;
const TEXTURE_HEADER_LEN: u64 = 80;

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| {
        matches!(r.read_u32_le(), Ok(MAGIC)) && matches!(r.read_i32_le(), Ok(VERSION))
    })
}

fn non_negative(value: i32, what: &str) -> Result<u32, BitmapError> {
    u32::try_from(value)
        .map_err(|_| BitmapError::IllegalValue(alloc::format!("MDL {what} is {value}")))
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    if src.read_u32_le()? != MAGIC || src.read_i32_le()? != VERSION {
        return Err(BitmapError::InvalidHeader("not a version 10 MDL".into()));
    }
    src.seek(SeekFrom::Start(TEXTURE_COUNT_OFFSET))?;
    let count = non_negative(src.read_i32_le()?, "texture count")?;
    let table = u64::from(non_negative(src.read_i32_le()?, "texture offset")?);
    if count == 0 {
        return Err(BitmapError::IllegalValue(
            "MDL has no embedded textures".into(),
        ));
    }

    let mut frames = Vec::new();
    for i in 0..u64::from(count) {
        cx.stop.check()?;
        cx.check_frames(frames.len() + 1)?;
        src.seek(SeekFrom::Start(table + i * TEXTURE_HEADER_LEN))?;
        let name = src.take(64)?;
        let _flags = src.read_i32_le()?;
        let width = non_negative(src.read_i32_le()?, "texture width")?;
        let height = non_negative(src.read_i32_le()?, "texture height")?;
        let offset = non_negative(src.read_i32_le()?, "texture data offset")?;
        log::debug!(
            "MDL texture {:?} {width}x{height} at {offset}",
            core::str::from_utf8(name.split(|&b| b == 0).next().unwrap_or(&[])).unwrap_or("?")
        );

        let mut bitmap = cx.bitmap(width, height, PixelLayout::Indexed, Origin::UpperLeft)?;
        src.seek(SeekFrom::Start(u64::from(offset)))?;
        let len = bitmap.pixels().len();
        bitmap.pixels_mut().copy_from_slice(src.take(len)?);
        bitmap.set_palette(Palette::new(PaletteFormat::Rgb24, src.take(768)?.to_vec())?)?;
        frames.push(bitmap);
    }
    DecodeOutput::from_frames(ImageFormat::Mdl, frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enough::Unstoppable;

    #[test]
    fn two_textures_become_frames() {
        let mut data = alloc::vec![0u8; 244];
        data[..4].copy_from_slice(&MAGIC.to_le_bytes());
        data[4..8].copy_from_slice(&VERSION.to_le_bytes());
        data[180..184].copy_from_slice(&2i32.to_le_bytes());
        data[184..188].copy_from_slice(&244i32.to_le_bytes());
        let first_data = 244 + 160;
        let second_data = first_data + 2 + 768;
        for (w, h, off) in [(2i32, 1i32, first_data as i32), (1, 1, second_data as i32)] {
            let mut th = [0u8; 80];
            th[..4].copy_from_slice(b"skin");
            th[68..72].copy_from_slice(&w.to_le_bytes());
            th[72..76].copy_from_slice(&h.to_le_bytes());
            th[76..80].copy_from_slice(&off.to_le_bytes());
            data.extend_from_slice(&th);
        }
        data.extend_from_slice(&[3, 4]);
        data.extend_from_slice(&[7u8; 768]);
        data.push(5);
        data.extend_from_slice(&[1u8; 768]);

        let out = decode(&mut Reader::new(&data), &DecodeContext::new(&Unstoppable)).unwrap();
        assert_eq!(out.frame_count(), 2);
        assert_eq!(out.frames()[0].pixels(), &[3, 4]);
        assert_eq!(out.frames()[1].pixels(), &[5]);
        assert_eq!(out.frames()[1].palette().unwrap().rgba(0), Some([1, 1, 1, 255]));
    }
}
