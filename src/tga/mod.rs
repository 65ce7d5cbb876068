//! Truevision TGA decoder and encoder (internal).
//!
//! Use top-level [`crate::decode_tga`] and [`crate::encode_tga`]. TGA has no
//! magic number, so the validator checks header field plausibility and is
//! probed last.

mod decode;
mod encode;

pub(crate) use decode::decode;
pub(crate) use encode::encode;

use crate::error::BitmapError;
use crate::source::Reader;

const HEADER_LEN: usize = 18;
const FOOTER_SIGNATURE: &[u8; 18] = b"TRUEVISION-XFILE.\0";
const FOOTER_LEN: usize = 26;
const EXTENSION_LEN: u16 = 495;

/// Descriptor bit 5: first stored row is the top row.
const DESC_TOP: u8 = 0x20;
/// Descriptor bit 4: pixels run right to left.
const DESC_RIGHT: u8 = 0x10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ImageType {
    ColorMapped,
    TrueColor,
    Gray,
}

#[derive(Clone, Debug)]
struct TgaHeader {
    id_len: u8,
    colormap_type: u8,
    image_type: ImageType,
    rle: bool,
    colormap_first: u16,
    colormap_len: u16,
    colormap_bits: u8,
    width: u16,
    height: u16,
    bits_per_pixel: u8,
    descriptor: u8,
}

impl TgaHeader {
    fn read(src: &mut Reader<'_>) -> Result<Self, BitmapError> {
        let id_len = src.read_u8()?;
        let colormap_type = src.read_u8()?;
        let type_code = src.read_u8()?;
        let colormap_first = src.read_u16_le()?;
        let colormap_len = src.read_u16_le()?;
        let colormap_bits = src.read_u8()?;
        let _x_origin = src.read_u16_le()?;
        let _y_origin = src.read_u16_le()?;
        let width = src.read_u16_le()?;
        let height = src.read_u16_le()?;
        let bits_per_pixel = src.read_u8()?;
        let descriptor = src.read_u8()?;

        let (image_type, rle) = match type_code {
            1 => (ImageType::ColorMapped, false),
            2 => (ImageType::TrueColor, false),
            3 => (ImageType::Gray, false),
            9 => (ImageType::ColorMapped, true),
            10 => (ImageType::TrueColor, true),
            11 => (ImageType::Gray, true),
            other => {
                return Err(BitmapError::InvalidHeader(alloc::format!(
                    "TGA image type {other}"
                )));
            }
        };
        if colormap_type > 1 {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "TGA colour map type {colormap_type}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "TGA dimensions {width}x{height}"
            )));
        }
        if !matches!(bits_per_pixel, 8 | 15 | 16 | 24 | 32) {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "TGA pixel depth {bits_per_pixel}"
            )));
        }
        if image_type == ImageType::ColorMapped
            && (colormap_type != 1 || !matches!(colormap_bits, 15 | 16 | 24 | 32))
        {
            return Err(BitmapError::InvalidHeader(
                "colour-mapped TGA without a usable colour map".into(),
            ));
        }
        if descriptor & 0xC0 != 0 {
            return Err(BitmapError::InvalidHeader(
                "interleaved TGA scanlines".into(),
            ));
        }
        Ok(Self {
            id_len,
            colormap_type,
            image_type,
            rle,
            colormap_first,
            colormap_len,
            colormap_bits,
            width,
            height,
            bits_per_pixel,
            descriptor,
        })
    }

    fn pixel_bytes(&self) -> usize {
        usize::from(self.bits_per_pixel).div_ceil(8)
    }
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| TgaHeader::read(r).is_ok())
}

/// Expand a 15/16-bit `ARRRRRGG GGGBBBBB` value to B, G, R bytes.
fn bgr555(v: u16) -> [u8; 3] {
    let expand = |c: u16| ((c << 3) | (c >> 2)) as u8;
    [
        expand(v & 0x1F),
        expand((v >> 5) & 0x1F),
        expand((v >> 10) & 0x1F),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_bit_expansion() {
        assert_eq!(bgr555(0x7FFF), [255, 255, 255]);
        assert_eq!(bgr555(0x001F), [255, 0, 0]);
        assert_eq!(bgr555(0x7C00), [0, 0, 255]);
    }

    #[test]
    fn header_plausibility() {
        let mut hdr = [0u8; 18];
        hdr[2] = 2;
        hdr[12] = 4;
        hdr[14] = 4;
        hdr[16] = 24;
        assert!(is_valid(&mut Reader::new(&hdr)));
        hdr[16] = 12;
        assert!(!is_valid(&mut Reader::new(&hdr)));
        hdr[16] = 8;
        hdr[2] = 1;
        assert!(!is_valid(&mut Reader::new(&hdr)), "colour-mapped without map");
    }
}
