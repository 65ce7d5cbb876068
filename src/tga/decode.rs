use alloc::string::String;
use alloc::vec::Vec;

use super::{
    DESC_RIGHT, DESC_TOP, EXTENSION_LEN, FOOTER_LEN, FOOTER_SIGNATURE, HEADER_LEN, ImageType,
    TgaHeader, bgr555,
};
use crate::bitmap::Palette;
use crate::decode::{DecodeContext, DecodeOutput, Metadata};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::limits::try_alloc_zeroed;
use crate::pixel::{Origin, PaletteFormat, PixelLayout};
use crate::rle::unpack_tga;
use crate::source::{Reader, SeekFrom};

/// Text field of fixed width, NUL padded and often space padded too.
fn fixed_text(bytes: &[u8]) -> Option<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = String::from_utf8_lossy(&bytes[..end]);
    let text = text.trim_end();
    (!text.is_empty()).then(|| String::from(text))
}

fn read_colormap(src: &mut Reader<'_>, header: &TgaHeader) -> Result<Option<Palette>, BitmapError> {
    if header.colormap_type == 0 {
        return Ok(None);
    }
    let entry_bytes = usize::from(header.colormap_bits).div_ceil(8);
    let raw = src.take(usize::from(header.colormap_len) * entry_bytes)?;
    if header.image_type != ImageType::ColorMapped {
        log::debug!("TGA: skipping colour map of a {:?} image", header.image_type);
        return Ok(None);
    }

    let first = usize::from(header.colormap_first);
    let total = first + usize::from(header.colormap_len);
    if total == 0 || total > Palette::MAX_ENTRIES {
        return Err(BitmapError::IllegalValue(alloc::format!(
            "TGA colour map of {total} entries"
        )));
    }
    let (format, out_bytes) = if header.colormap_bits == 32 {
        (PaletteFormat::Bgra32, 4)
    } else {
        (PaletteFormat::Bgr24, 3)
    };
    // Entries below `first` are unused by the file; leave them black.
    let mut data = alloc::vec![0u8; total * out_bytes];
    for (i, entry) in raw.chunks_exact(entry_bytes).enumerate() {
        let dst = &mut data[(first + i) * out_bytes..(first + i + 1) * out_bytes];
        match header.colormap_bits {
            15 | 16 => dst.copy_from_slice(&bgr555(u16::from_le_bytes([entry[0], entry[1]]))),
            _ => dst.copy_from_slice(entry),
        }
    }
    Palette::new(format, data).map(Some)
}

fn output_layout(header: &TgaHeader) -> Result<PixelLayout, BitmapError> {
    match (header.image_type, header.bits_per_pixel) {
        (ImageType::ColorMapped, 8) => Ok(PixelLayout::Indexed),
        (ImageType::TrueColor, 15 | 16 | 24) => Ok(PixelLayout::Bgr),
        (ImageType::TrueColor, 32) => Ok(PixelLayout::Bgra),
        (ImageType::Gray, 8) => Ok(PixelLayout::Gray),
        (ImageType::Gray, 16) => Ok(PixelLayout::GrayAlpha),
        (kind, bpp) => Err(BitmapError::UnsupportedVariant(alloc::format!(
            "{bpp}-bit {kind:?} TGA"
        ))),
    }
}

/// Parse the 2.0 footer and extension area into `metadata`.
fn read_extension(src: &mut Reader<'_>, metadata: &mut Metadata) -> Result<(), BitmapError> {
    let data = src.data();
    if data.len() < HEADER_LEN + FOOTER_LEN || &data[data.len() - 18..] != FOOTER_SIGNATURE {
        return Ok(());
    }
    let mut footer = Reader::new(&data[data.len() - FOOTER_LEN..]);
    let extension_offset = footer.read_u32_le()? as u64;
    if extension_offset == 0 {
        return Ok(());
    }
    let mut ext = Reader::new(data);
    ext.seek(SeekFrom::Start(extension_offset))?;
    let size = ext.read_u16_le()?;
    if size < EXTENSION_LEN {
        log::warn!("TGA: extension area of {size} bytes ignored");
        return Ok(());
    }
    metadata.author = fixed_text(ext.take(41)?);
    let comments: Vec<String> = ext.take(324)?.chunks(81).filter_map(fixed_text).collect();
    if !comments.is_empty() {
        let text = comments.join("\n");
        // The image ID, when present, stays first.
        metadata.comment = Some(match metadata.comment.take() {
            Some(id) => alloc::format!("{id}\n{text}"),
            None => text,
        });
    }
    ext.skip(12 + 41 + 6)?;
    metadata.software = fixed_text(ext.take(41)?);
    Ok(())
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let header = TgaHeader::read(src)?;
    let layout = output_layout(&header)?;
    let image_id = fixed_text(src.take(usize::from(header.id_len))?);
    let palette = read_colormap(src, &header)?;

    let (width, height) = (u32::from(header.width), u32::from(header.height));
    let origin = if header.descriptor & DESC_TOP != 0 {
        Origin::UpperLeft
    } else {
        Origin::LowerLeft
    };
    let mut bitmap = cx.bitmap(width, height, layout, origin)?;
    cx.stop.check()?;

    let file_bpp = header.pixel_bytes();
    let packed_len = width as usize * height as usize * file_bpp;
    let mut packed = try_alloc_zeroed(packed_len)?;
    if header.rle {
        match unpack_tga(src, &mut packed, file_bpp) {
            Ok(0) => {}
            Ok(discarded) => {
                log::warn!("TGA: final RLE packet clipped, {discarded} bytes discarded");
            }
            Err(BitmapError::UnexpectedEof) if !cx.strict() => {
                log::warn!("TGA: RLE data ends early, missing pixels left black");
            }
            Err(e) => return Err(e),
        }
    } else {
        let available = src.remaining().min(packed_len);
        if available < packed_len {
            if cx.strict() {
                return Err(BitmapError::UnexpectedEof);
            }
            log::warn!("TGA: image data is {available} of {packed_len} bytes");
        }
        packed[..available].copy_from_slice(src.take(available)?);
    }
    cx.stop.check()?;

    if file_bpp == 2 && layout == PixelLayout::Bgr {
        for (dst, src) in bitmap
            .pixels_mut()
            .chunks_exact_mut(3)
            .zip(packed.chunks_exact(2))
        {
            dst.copy_from_slice(&bgr555(u16::from_le_bytes([src[0], src[1]])));
        }
    } else {
        bitmap.pixels_mut().copy_from_slice(&packed);
    }

    if header.descriptor & DESC_RIGHT != 0 {
        bitmap.flip_horizontal();
    }
    if let Some(palette) = palette {
        bitmap.set_palette(palette)?;
    }

    let mut metadata = Metadata {
        comment: image_id,
        ..Metadata::default()
    };
    if let Err(e) = read_extension(src, &mut metadata) {
        log::warn!("TGA: unreadable extension area: {e}");
    }
    let mut out = DecodeOutput::single(ImageFormat::Tga, bitmap);
    out.metadata = metadata;
    Ok(out)
}
