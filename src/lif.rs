//! Homeworld LIF decoder: 8-bit indexed pixels with a 256-entry RGBA palette.

use crate::bitmap::Palette;
use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PaletteFormat, PixelLayout};
use crate::source::{Reader, SeekFrom};

const ID: &[u8; 8] = b"Willy 7\0";
const VERSION: u32 = 260;
const FLAGS: u32 = 50;
const PALETTE_LEN: usize = 256 * 4;

struct LifHeader {
    width: u32,
    height: u32,
    palette_offset: u32,
}

fn read_header(src: &mut Reader<'_>) -> Result<LifHeader, BitmapError> {
    if src.take(8)? != ID {
        return Err(BitmapError::InvalidHeader("missing LIF id".into()));
    }
    let version = src.read_u32_le()?;
    let flags = src.read_u32_le()?;
    if version != VERSION || flags != FLAGS {
        return Err(BitmapError::InvalidHeader(alloc::format!(
            "LIF version {version}, flags {flags}"
        )));
    }
    let width = src.read_u32_le()?;
    let height = src.read_u32_le()?;
    let _palette_crc = src.read_u32_le()?;
    let _image_crc = src.read_u32_le()?;
    let palette_offset = src.read_u32_le()?;
    let _team_effect0 = src.read_u32_le()?;
    let _team_effect1 = src.read_u32_le()?;
    Ok(LifHeader {
        width,
        height,
        palette_offset,
    })
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| read_header(r).is_ok())
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let header = read_header(src)?;
    let mut bitmap =
        cx.bitmap(header.width, header.height, PixelLayout::Indexed, Origin::UpperLeft)?;
    cx.stop.check()?;
    let len = bitmap.pixels().len();
    bitmap.pixels_mut().copy_from_slice(src.take(len)?);

    if header.palette_offset != 0 {
        src.seek(SeekFrom::Start(u64::from(header.palette_offset)))?;
    }
    let palette = Palette::new(PaletteFormat::Rgba32, src.take(PALETTE_LEN)?.to_vec())?;
    bitmap.set_palette(palette)?;
    Ok(DecodeOutput::single(ImageFormat::Lif, bitmap))
}
