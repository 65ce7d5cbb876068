//! Amiga IFF `FORM ILBM` / `FORM PBM ` decoder.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::bitmap::Palette;
use crate::decode::{DecodeContext, DecodeOutput, Metadata};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PaletteFormat, PixelLayout};
use crate::planes;
use crate::rle::{self, PackBits};
use crate::source::Reader;

const MASK_PLANE: u8 = 1;
const MASK_TRANSPARENT_COLOR: u8 = 2;
const COMPRESSION_BYTERUN1: u8 = 1;
const CAMG_EHB: u32 = 0x80;
const CAMG_HAM: u32 = 0x800;

#[derive(Clone, Copy, Debug)]
struct Bmhd {
    width: u16,
    height: u16,
    planes: u8,
    masking: u8,
    compression: u8,
    transparent: u16,
}

impl Bmhd {
    fn read(body: &[u8]) -> Result<Self, BitmapError> {
        let mut r = Reader::new(body);
        let width = r.read_u16_be()?;
        let height = r.read_u16_be()?;
        let _x = r.read_i16_be()?;
        let _y = r.read_i16_be()?;
        let planes = r.read_u8()?;
        let masking = r.read_u8()?;
        let compression = r.read_u8()?;
        let _pad = r.read_u8()?;
        let transparent = r.read_u16_be()?;
        if compression > COMPRESSION_BYTERUN1 {
            return Err(BitmapError::UnsupportedVariant(alloc::format!(
                "ILBM compression {compression}"
            )));
        }
        Ok(Self {
            width,
            height,
            planes,
            masking,
            compression,
            transparent,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Form {
    Ilbm,
    Pbm,
}

fn form_type(src: &mut Reader<'_>) -> Option<Form> {
    if src.take(4).ok()? != b"FORM" {
        return None;
    }
    src.skip(4).ok()?;
    match src.take(4).ok()? {
        b"ILBM" => Some(Form::Ilbm),
        b"PBM " => Some(Form::Pbm),
        _ => None,
    }
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| form_type(r).is_some())
}

/// Next chunk; bodies are padded to an even length.
fn chunk_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).trim_end_matches('\0').into()
}

fn next_chunk<'a>(r: &mut Reader<'a>) -> Result<([u8; 4], &'a [u8]), BitmapError> {
    let tag = r.read_array::<4>()?;
    let size = r.read_u32_be()? as usize;
    let body = r.take(size)?;
    if size % 2 == 1 && !r.eof() {
        r.skip(1)?;
    }
    Ok((tag, body))
}

/// Build the indexed palette, extending an Extra-Half-Brite map to 64 entries.
fn build_palette(cmap: Option<&[u8]>, header: &Bmhd, camg: u32) -> Result<Palette, BitmapError> {
    let Some(cmap) = cmap else {
        log::warn!("ILBM without CMAP, using a grey ramp");
        return Ok(Palette::gray_ramp(1 << header.planes.min(8)));
    };
    let mut entries = cmap.len() / 3;
    if entries > Palette::MAX_ENTRIES {
        log::warn!("ILBM CMAP has {entries} entries, keeping 256");
        entries = Palette::MAX_ENTRIES;
    }
    let mut data = cmap[..entries * 3].to_vec();
    if camg & CAMG_EHB != 0 && entries <= 32 {
        data.resize(32 * 3, 0);
        let half: Vec<u8> = data.iter().map(|c| c / 2).collect();
        data.extend_from_slice(&half);
    }
    let palette = Palette::new(PaletteFormat::Rgb24, data)?;
    if header.masking == MASK_TRANSPARENT_COLOR && header.transparent < 256 {
        return Ok(palette.with_transparent_index(header.transparent as u8));
    }
    Ok(palette)
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let start = src.tell();
    let form = form_type(src)
        .ok_or_else(|| BitmapError::InvalidHeader("not an ILBM or PBM form".into()))?;
    src.set_position(start + 4)?;
    let form_len = (src.read_u32_be()? as usize).saturating_sub(4);
    src.skip(4)?;
    let mut chunks = Reader::new(src.take(form_len.min(src.remaining()))?);

    let mut header: Option<Bmhd> = None;
    let mut cmap: Option<&[u8]> = None;
    let mut camg = 0u32;
    let mut body: Option<&[u8]> = None;
    let mut metadata = Metadata::default();
    while chunks.remaining() >= 8 {
        let (tag, data) = next_chunk(&mut chunks)?;
        match &tag {
            b"BMHD" => header = Some(Bmhd::read(data)?),
            b"CMAP" => cmap = Some(data),
            b"CAMG" => camg = Reader::new(data).read_u32_be()?,
            b"BODY" => body = Some(data),
            b"AUTH" => metadata.author = Some(chunk_text(data)),
            b"ANNO" => metadata.comment = Some(chunk_text(data)),
            other => log::debug!("ILBM: skipping {} chunk", String::from_utf8_lossy(other)),
        }
    }
    let header = header.ok_or_else(|| BitmapError::InvalidHeader("ILBM without BMHD".into()))?;
    let body = body.ok_or_else(|| BitmapError::InvalidHeader("ILBM without BODY".into()))?;
    if camg & CAMG_HAM != 0 {
        return Err(BitmapError::UnsupportedVariant("ILBM hold-and-modify".into()));
    }

    let width = usize::from(header.width);
    let (layout, line_len, stride) = match (form, header.planes) {
        (Form::Pbm, 8) => (PixelLayout::Indexed, width + width % 2, 0),
        (Form::Ilbm, 1..=8) | (Form::Ilbm, 24) => {
            let stride = width.div_ceil(16) * 2;
            let stored = usize::from(header.planes) + usize::from(header.masking == MASK_PLANE);
            let layout = if header.planes == 24 { PixelLayout::Rgb } else { PixelLayout::Indexed };
            (layout, stride * stored, stride)
        }
        (_, planes) => {
            return Err(BitmapError::UnsupportedVariant(alloc::format!(
                "{form:?} with {planes} planes"
            )));
        }
    };

    let (width, height) = (u32::from(header.width), u32::from(header.height));
    let mut bitmap = cx.bitmap(width, height, layout, Origin::UpperLeft)?;
    if layout == PixelLayout::Indexed {
        bitmap.set_palette(build_palette(cmap, &header, camg)?)?;
    }

    let mut data = Reader::new(body);
    let mut line = vec![0u8; line_len];
    let row = bitmap.row_bytes();
    for (y, out) in bitmap.pixels_mut().chunks_exact_mut(row).enumerate() {
        if y % 16 == 0 {
            cx.stop.check()?;
        }
        if header.compression == COMPRESSION_BYTERUN1 {
            rle::unpack(PackBits::ByteRun1, &mut data, &mut line)?;
        } else {
            line.copy_from_slice(data.take(line_len)?);
        }
        match (form, layout) {
            (Form::Pbm, _) => out.copy_from_slice(&line[..width as usize]),
            (Form::Ilbm, PixelLayout::Rgb) => planes::combine_rgb_planes(&line, stride, width as usize, out),
            _ => planes::combine_bit_planes(&line, stride, usize::from(header.planes), out),
        }
    }

    let mut output = DecodeOutput::single(ImageFormat::Ilbm, bitmap);
    output.metadata = metadata;
    Ok(output)
}
