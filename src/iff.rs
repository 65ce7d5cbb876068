//! Maya IFF (`FOR4`/`CIMG`) decoder for tiled 8-bit RGB(A) images.

use alloc::string::String;
use alloc::vec;

use crate::bitmap::Bitmap;
use crate::decode::{DecodeContext, DecodeOutput, Metadata};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PixelLayout};
use crate::rle::{self, PackBits};
use crate::source::Reader;

const FLAG_RGB: u32 = 0x1;
const FLAG_ALPHA: u32 = 0x2;
const COMPRESSION_RLE: u32 = 1;

#[derive(Clone, Copy, Debug)]
struct TileHeader {
    width: u32,
    height: u32,
    channels: usize,
    tiles: u16,
    rle: bool,
}

impl TileHeader {
    fn read(body: &[u8]) -> Result<Self, BitmapError> {
        let mut r = Reader::new(body);
        let width = r.read_u32_be()?;
        let height = r.read_u32_be()?;
        let _aspect_num = r.read_u16_be()?;
        let _aspect_den = r.read_u16_be()?;
        let flags = r.read_u32_be()?;
        let bytes = r.read_u16_be()?;
        let tiles = r.read_u16_be()?;
        let compression = r.read_u32_be()?;
        if bytes != 0 {
            return Err(BitmapError::UnsupportedVariant(
                "16-bit Maya IFF channels".into(),
            ));
        }
        if flags & FLAG_RGB == 0 {
            return Err(BitmapError::UnsupportedVariant(alloc::format!(
                "Maya IFF flags 0x{flags:X} without RGB"
            )));
        }
        if compression > COMPRESSION_RLE {
            return Err(BitmapError::UnsupportedVariant(alloc::format!(
                "Maya IFF compression {compression}"
            )));
        }
        Ok(Self {
            width,
            height,
            channels: if flags & FLAG_ALPHA != 0 { 4 } else { 3 },
            tiles,
            rle: compression == COMPRESSION_RLE,
        })
    }
}

/// Next chunk: tag and body, with the cursor moved past 4-byte padding.
fn next_chunk<'a>(r: &mut Reader<'a>) -> Result<([u8; 4], &'a [u8]), BitmapError> {
    let tag = r.read_array::<4>()?;
    let size = r.read_u32_be()? as usize;
    let body = r.take(size)?;
    let pad = (4 - size % 4) % 4;
    r.skip(pad.min(r.remaining()))?;
    Ok((tag, body))
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| {
        r.take(4).is_ok_and(|t| t == b"FOR4")
            && r.skip(4).is_ok()
            && r.take(4).is_ok_and(|t| t == b"CIMG")
    })
}

/// Decode one `RGBA` tile into the lower-left canvas.
fn read_tile(body: &[u8], header: &TileHeader, bitmap: &mut Bitmap) -> Result<(), BitmapError> {
    let mut r = Reader::new(body);
    let x1 = u32::from(r.read_u16_be()?);
    let y1 = u32::from(r.read_u16_be()?);
    let x2 = u32::from(r.read_u16_be()?);
    let y2 = u32::from(r.read_u16_be()?);
    if x2 < x1 || y2 < y1 || x2 >= header.width || y2 >= header.height {
        return Err(BitmapError::IllegalValue(alloc::format!(
            "Maya IFF tile ({x1},{y1})-({x2},{y2}) outside {}x{}",
            header.width,
            header.height
        )));
    }
    let tw = (x2 - x1 + 1) as usize;
    let th = (y2 - y1 + 1) as usize;
    let ch = header.channels;
    let mut tile = vec![0u8; tw * th * ch];

    if header.rle && r.remaining() < tile.len() {
        // Planes arrive last channel first.
        for plane in 0..ch {
            rle::unpack_strided(PackBits::Maya, &mut r, &mut tile, ch - 1 - plane, ch, tw * th)?;
        }
    } else {
        let raw = r.take(tile.len())?;
        for (dst, src) in tile.chunks_exact_mut(ch).zip(raw.chunks_exact(ch)) {
            for (c, d) in dst.iter_mut().enumerate() {
                *d = src[ch - 1 - c];
            }
        }
    }

    let row = bitmap.row_bytes();
    let pixels = bitmap.pixels_mut();
    for (ty, line) in tile.chunks_exact(tw * ch).enumerate() {
        let start = (y1 as usize + ty) * row + x1 as usize * ch;
        pixels[start..start + line.len()].copy_from_slice(line);
    }
    Ok(())
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let (tag, form) = next_chunk(src)?;
    if &tag != b"FOR4" || form.get(..4) != Some(b"CIMG".as_slice()) {
        return Err(BitmapError::InvalidHeader("not a Maya CIMG form".into()));
    }
    let mut chunks = Reader::new(&form[4..]);
    let mut header: Option<TileHeader> = None;
    let mut bitmap: Option<Bitmap> = None;
    let mut metadata = Metadata::default();
    let mut decoded_tiles = 0u32;

    while chunks.remaining() >= 8 {
        let (tag, body) = next_chunk(&mut chunks)?;
        match &tag {
            b"TBHD" => {
                let h = TileHeader::read(body)?;
                let layout = if h.channels == 4 { PixelLayout::Rgba } else { PixelLayout::Rgb };
                bitmap = Some(cx.bitmap(h.width, h.height, layout, Origin::LowerLeft)?);
                header = Some(h);
            }
            b"AUTH" => {
                metadata.author = Some(String::from_utf8_lossy(body).trim_end_matches('\0').into());
            }
            b"FOR4" if body.get(..4) == Some(b"TBMP".as_slice()) => {
                let (Some(h), Some(image)) = (header.as_ref(), bitmap.as_mut()) else {
                    return Err(BitmapError::InvalidHeader(
                        "Maya IFF TBMP before TBHD".into(),
                    ));
                };
                let mut tiles = Reader::new(&body[4..]);
                while tiles.remaining() >= 8 {
                    let (tile_tag, tile) = next_chunk(&mut tiles)?;
                    if &tile_tag == b"RGBA" {
                        cx.stop.check()?;
                        read_tile(tile, h, image)?;
                        decoded_tiles += 1;
                    } else {
                        log::debug!(
                            "Maya IFF: skipping {} tile",
                            String::from_utf8_lossy(&tile_tag)
                        );
                    }
                }
            }
            other => {
                log::debug!("Maya IFF: skipping {} chunk", String::from_utf8_lossy(other));
            }
        }
    }

    let (Some(h), Some(bitmap)) = (header, bitmap) else {
        return Err(BitmapError::InvalidHeader("Maya IFF without TBHD".into()));
    };
    if decoded_tiles != u32::from(h.tiles) {
        log::warn!("Maya IFF declares {} tiles, decoded {decoded_tiles}", h.tiles);
    }
    let mut out = DecodeOutput::single(ImageFormat::Iff, bitmap);
    out.metadata = metadata;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use enough::Unstoppable;

    fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out.resize(out.len().div_ceil(4) * 4, 0);
        out
    }

    fn tbhd(w: u32, h: u32, flags: u32, tiles: u16, compression: u32) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&w.to_be_bytes());
        b.extend_from_slice(&h.to_be_bytes());
        b.extend_from_slice(&[0, 1, 0, 1]);
        b.extend_from_slice(&flags.to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&tiles.to_be_bytes());
        b.extend_from_slice(&compression.to_be_bytes());
        chunk(b"TBHD", &b)
    }

    fn cimg(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut body = b"CIMG".to_vec();
        parts.iter().for_each(|p| body.extend_from_slice(p));
        chunk(b"FOR4", &body)
    }

    fn tbmp(tiles: &[Vec<u8>]) -> Vec<u8> {
        let mut body = b"TBMP".to_vec();
        tiles.iter().for_each(|t| body.extend_from_slice(t));
        chunk(b"FOR4", &body)
    }

    fn tile(coords: [u16; 4], data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        coords.iter().for_each(|c| body.extend_from_slice(&c.to_be_bytes()));
        body.extend_from_slice(data);
        chunk(b"RGBA", &body)
    }

    #[test]
    fn raw_tile_channels_reversed() {
        let data = cimg(&[
            tbhd(2, 1, FLAG_RGB | FLAG_ALPHA, 1, 0),
            tbmp(&[tile([0, 0, 1, 0], &[4, 3, 2, 1, 8, 7, 6, 5])]),
        ]);
        assert!(is_valid(&mut Reader::new(&data)));
        let out = decode(&mut Reader::new(&data), &DecodeContext::new(&Unstoppable)).unwrap();
        assert_eq!(out.first().origin, Origin::LowerLeft);
        assert_eq!(out.pixels(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn rle_tile_planes() {
        // 2x2 RGB, planes B, G, R each a run of four.
        let planes = [0x83, 30, 0x83, 20, 0x83, 10];
        let data = cimg(&[tbhd(2, 2, FLAG_RGB, 1, 1), tbmp(&[tile([0, 0, 1, 1], &planes)])]);
        let out = decode(&mut Reader::new(&data), &DecodeContext::new(&Unstoppable)).unwrap();
        assert!(out.pixels().chunks_exact(3).all(|px| px == [10, 20, 30]));
    }

    #[test]
    fn tile_outside_image_rejected() {
        let data = cimg(&[tbhd(2, 2, FLAG_RGB, 1, 0), tbmp(&[tile([1, 1, 2, 2], &[0; 12])])]);
        let err = decode(&mut Reader::new(&data), &DecodeContext::new(&Unstoppable)).unwrap_err();
        assert!(matches!(err, BitmapError::IllegalValue(_)));
    }

    #[test]
    fn sixteen_bit_unsupported() {
        let mut header = tbhd(1, 1, FLAG_RGB, 1, 0);
        header[8 + 16..8 + 18].copy_from_slice(&1u16.to_be_bytes());
        let data = cimg(&[header]);
        let err = decode(&mut Reader::new(&data), &DecodeContext::new(&Unstoppable)).unwrap_err();
        assert!(matches!(err, BitmapError::UnsupportedVariant(_)));
    }
}
