//! KTX 1.1 decoder for 2D textures: uncompressed 8/16-bit formats and ETC1.

use alloc::string::String;
use alloc::vec::Vec;

use crate::bitmap::Bitmap;
use crate::blocks::{compressed_len, decode_etc1};
use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PixelLayout, SampleType};
use crate::source::Reader;

const IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x31, 0x31, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];
const ENDIAN_NATIVE: u32 = 0x0403_0201;
const ENDIAN_SWAPPED: u32 = 0x0102_0304;

const GL_UNSIGNED_BYTE: u32 = 0x1401;
const GL_UNSIGNED_SHORT: u32 = 0x1403;
const GL_RED: u32 = 0x1903;
const GL_ALPHA: u32 = 0x1906;
const GL_RGB: u32 = 0x1907;
const GL_RGBA: u32 = 0x1908;
const GL_LUMINANCE: u32 = 0x1909;
const GL_LUMINANCE_ALPHA: u32 = 0x190A;
const GL_BGR: u32 = 0x80E0;
const GL_BGRA: u32 = 0x80E1;
const GL_ETC1_RGB8_OES: u32 = 0x8D64;

#[derive(Clone, Debug)]
struct KtxHeader {
    big_endian: bool,
    gl_type: u32,
    gl_format: u32,
    gl_internal_format: u32,
    width: u32,
    height: u32,
    depth: u32,
    array_elements: u32,
    faces: u32,
    mip_levels: u32,
    key_value_bytes: u32,
}

impl KtxHeader {
    fn read(src: &mut Reader<'_>) -> Result<Self, BitmapError> {
        if src.take(12)? != IDENTIFIER {
            return Err(BitmapError::InvalidHeader("missing KTX identifier".into()));
        }
        let big_endian = match src.read_u32_le()? {
            ENDIAN_NATIVE => false,
            ENDIAN_SWAPPED => true,
            other => {
                return Err(BitmapError::InvalidHeader(alloc::format!(
                    "KTX endianness word 0x{other:08X}"
                )));
            }
        };
        let mut field = || src.read_u32_endian(big_endian);
        let gl_type = field()?;
        let _gl_type_size = field()?;
        let gl_format = field()?;
        let gl_internal_format = field()?;
        let _gl_base_internal_format = field()?;
        Ok(Self {
            big_endian,
            gl_type,
            gl_format,
            gl_internal_format,
            width: field()?,
            height: field()?,
            depth: field()?,
            array_elements: field()?,
            faces: field()?,
            mip_levels: field()?,
            key_value_bytes: field()?,
        })
    }
}

/// How each mip level's bytes map onto a bitmap.
#[derive(Clone, Copy, Debug)]
enum Payload {
    Etc1,
    Plain { layout: PixelLayout, sample: SampleType },
}

impl Payload {
    fn from_header(header: &KtxHeader) -> Result<Self, BitmapError> {
        if header.gl_type == 0 {
            return match header.gl_internal_format {
                GL_ETC1_RGB8_OES => Ok(Self::Etc1),
                other => Err(BitmapError::UnsupportedVariant(alloc::format!(
                    "KTX compressed format 0x{other:04X}"
                ))),
            };
        }
        let sample = match header.gl_type {
            GL_UNSIGNED_BYTE => SampleType::U8,
            GL_UNSIGNED_SHORT => SampleType::U16,
            other => {
                return Err(BitmapError::UnsupportedVariant(alloc::format!(
                    "KTX pixel type 0x{other:04X}"
                )));
            }
        };
        let layout = match header.gl_format {
            GL_RED | GL_ALPHA | GL_LUMINANCE => PixelLayout::Gray,
            GL_LUMINANCE_ALPHA => PixelLayout::GrayAlpha,
            GL_RGB => PixelLayout::Rgb,
            GL_RGBA => PixelLayout::Rgba,
            GL_BGR => PixelLayout::Bgr,
            GL_BGRA => PixelLayout::Bgra,
            other => {
                return Err(BitmapError::UnsupportedVariant(alloc::format!(
                    "KTX pixel format 0x{other:04X}"
                )));
            }
        };
        Ok(Self::Plain { layout, sample })
    }
}

/// Scan the key/value block for `KTXorientation`; `T=u` means rows run upwards.
fn read_orientation(block: &[u8], big_endian: bool) -> Result<Origin, BitmapError> {
    let mut kv = Reader::new(block);
    let mut origin = Origin::UpperLeft;
    while kv.remaining() >= 4 {
        let size = kv.read_u32_endian(big_endian)? as usize;
        let pair = kv.take(size)?;
        kv.skip((4 - size % 4) % 4).ok();
        let mut parts = pair.splitn(2, |&b| b == 0);
        let key = parts.next().unwrap_or(&[]);
        let value = parts.next().unwrap_or(&[]);
        if key == b"KTXorientation" {
            let value = String::from_utf8_lossy(value);
            if value.trim_end_matches('\0').split(',').any(|p| p.trim() == "T=u") {
                origin = Origin::LowerLeft;
            }
        } else {
            log::debug!("KTX: ignoring key {}", String::from_utf8_lossy(key));
        }
    }
    Ok(origin)
}

fn read_level(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
    header: &KtxHeader,
    payload: Payload,
    level: u32,
    origin: Origin,
) -> Result<Bitmap, BitmapError> {
    let width = (header.width >> level).max(1);
    let height = (header.height >> level).max(1);
    let image_size = src.read_u32_endian(header.big_endian)? as usize;
    let data = src.take(image_size)?;
    src.skip((4 - image_size % 4) % 4).ok();

    match payload {
        Payload::Etc1 => {
            let expected = compressed_len(width, height)?;
            if image_size != expected {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "KTX ETC1 level {level} has {image_size} bytes, expected {expected}"
                )));
            }
            let mut bitmap = cx.bitmap(width, height, PixelLayout::Rgb, origin)?;
            bitmap.pixels_mut().copy_from_slice(&decode_etc1(data, width, height)?);
            Ok(bitmap)
        }
        Payload::Plain { layout, sample } => {
            let mut bitmap = Bitmap::new(width, height, 1, layout, sample, origin, cx.limits)?;
            let row = bitmap.row_bytes();
            let padded = row.div_ceil(4) * 4;
            let expected = padded * height as usize;
            if image_size != expected {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "KTX level {level} has {image_size} bytes, expected {expected}"
                )));
            }
            let swap =
                sample == SampleType::U16 && header.big_endian != cfg!(target_endian = "big");
            for (dst, src_row) in bitmap
                .pixels_mut()
                .chunks_exact_mut(row)
                .zip(data.chunks_exact(padded))
            {
                dst.copy_from_slice(&src_row[..row]);
                if swap {
                    dst.chunks_exact_mut(2).for_each(|s| s.swap(0, 1));
                }
            }
            Ok(bitmap)
        }
    }
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| r.take(12).is_ok_and(|id| id == IDENTIFIER))
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let header = KtxHeader::read(src)?;
    if header.depth > 1 || header.array_elements > 0 || header.faces > 1 {
        return Err(BitmapError::UnsupportedVariant(alloc::format!(
            "KTX depth {}, {} array elements, {} faces",
            header.depth,
            header.array_elements,
            header.faces
        )));
    }
    if header.width == 0 || header.height == 0 {
        return Err(BitmapError::InvalidHeader(alloc::format!(
            "KTX dimensions {}x{}",
            header.width,
            header.height
        )));
    }
    let payload = Payload::from_header(&header)?;
    let block = src.take(header.key_value_bytes as usize)?;
    let origin = read_orientation(block, header.big_endian)?;

    let levels = header.mip_levels.max(1);
    if levels > 32 {
        return Err(BitmapError::IllegalValue(alloc::format!(
            "KTX declares {levels} mip levels"
        )));
    }
    let mut top = read_level(src, cx, &header, payload, 0, origin)?;
    for level in 1..levels {
        cx.stop.check()?;
        let mip = read_level(src, cx, &header, payload, level, origin)?;
        top.push_mipmap(mip);
    }
    Ok(DecodeOutput::single(ImageFormat::Ktx, top))
}
