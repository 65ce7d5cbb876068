//! ZSoft PCX decoder and encoder (internal).
//!
//! Use top-level [`crate::decode_pcx`] and [`crate::encode_pcx`].

mod decode;
mod encode;

pub(crate) use decode::decode;
pub(crate) use encode::encode;

use crate::error::BitmapError;
use crate::source::Reader;

pub(crate) const HEADER_LEN: usize = 128;
const MANUFACTURER: u8 = 0x0A;
const ENCODING_RLE: u8 = 1;
/// Marker byte in front of the trailing 256-colour palette.
const PALETTE_MARKER: u8 = 0x0C;
const PALETTE_INFO_GRAY: u16 = 2;

/// The fixed 128-byte little-endian header.
#[derive(Clone, Debug)]
struct PcxHeader {
    version: u8,
    bits_per_pixel: u8,
    x_min: u16,
    y_min: u16,
    x_max: u16,
    y_max: u16,
    colormap: [u8; 48],
    planes: u8,
    bytes_per_line: u16,
    palette_info: u16,
}

impl PcxHeader {
    fn read(src: &mut Reader<'_>) -> Result<Self, BitmapError> {
        let manufacturer = src.read_u8()?;
        let version = src.read_u8()?;
        let encoding = src.read_u8()?;
        let bits_per_pixel = src.read_u8()?;
        let x_min = src.read_u16_le()?;
        let y_min = src.read_u16_le()?;
        let x_max = src.read_u16_le()?;
        let y_max = src.read_u16_le()?;
        let _h_dpi = src.read_u16_le()?;
        let _v_dpi = src.read_u16_le()?;
        let colormap = src.read_array::<48>()?;
        let _reserved = src.read_u8()?;
        let planes = src.read_u8()?;
        let bytes_per_line = src.read_u16_le()?;
        let palette_info = src.read_u16_le()?;
        src.skip(HEADER_LEN - 70)?;

        if manufacturer != MANUFACTURER || encoding != ENCODING_RLE {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "PCX manufacturer 0x{manufacturer:02X}, encoding {encoding}"
            )));
        }
        if !matches!(version, 0 | 2 | 3 | 4 | 5) {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "PCX version {version}"
            )));
        }
        let header = Self {
            version,
            bits_per_pixel,
            x_min,
            y_min,
            x_max,
            y_max,
            colormap,
            planes,
            bytes_per_line,
            palette_info,
        };
        if x_max < x_min || y_max < y_min {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "PCX window ({x_min},{y_min})-({x_max},{y_max}) is inverted"
            )));
        }
        let expected = header.expected_bytes_per_line();
        if usize::from(bytes_per_line) != expected {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "PCX bytes per line {bytes_per_line}, expected {expected}"
            )));
        }
        Ok(header)
    }

    fn width(&self) -> u32 {
        u32::from(self.x_max - self.x_min) + 1
    }

    fn height(&self) -> u32 {
        u32::from(self.y_max - self.y_min) + 1
    }

    /// Packed plane line length rounded up to an even byte count.
    fn expected_bytes_per_line(&self) -> usize {
        even_line_len(self.width() as usize, self.bits_per_pixel)
    }
}

/// Bytes needed for `width` samples of `bits` each, padded to even.
pub(crate) fn even_line_len(width: usize, bits: u8) -> usize {
    let bytes = (width * usize::from(bits)).div_ceil(8);
    bytes + (bytes & 1)
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| PcxHeader::read(r).is_ok())
}
