//! Softimage PIC decoder.
//!
//! A 104-byte big-endian header is followed by a chain of channel packets,
//! each naming a subset of R, G, B, A and how those channels are compressed.
//! Every scanline then stores one run of data per packet, in packet order.

use alloc::string::String;
use alloc::vec::Vec;

use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PixelLayout};
use crate::source::Reader;

const MAGIC: u32 = 0x5380_F634;
const PICT: &[u8; 4] = b"PICT";
const MAX_PACKETS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Compression {
    Uncompressed,
    PureRun,
    MixedRun,
}

#[derive(Clone, Debug)]
struct ChannelPacket {
    compression: Compression,
    /// Byte offsets into an RGBA pixel, in storage order.
    offsets: Vec<usize>,
}

struct PicHeader {
    comment: Option<String>,
    width: u16,
    height: u16,
}

fn read_header(src: &mut Reader<'_>) -> Result<PicHeader, BitmapError> {
    if src.read_u32_be()? != MAGIC {
        return Err(BitmapError::InvalidHeader("missing Softimage PIC magic".into()));
    }
    let _version = src.read_f32_be()?;
    let comment = src.take(80)?;
    if src.take(4)? != PICT {
        return Err(BitmapError::InvalidHeader("missing PICT id".into()));
    }
    let width = src.read_u16_be()?;
    let height = src.read_u16_be()?;
    let _ratio = src.read_f32_be()?;
    let _fields = src.read_u16_be()?;
    let _pad = src.read_u16_be()?;
    if width == 0 || height == 0 {
        return Err(BitmapError::InvalidHeader(alloc::format!(
            "PIC dimensions {width}x{height}"
        )));
    }
    let end = comment.iter().position(|&b| b == 0).unwrap_or(comment.len());
    let comment: String = String::from_utf8_lossy(&comment[..end]).trim_end().into();
    Ok(PicHeader {
        comment: (!comment.is_empty()).then_some(comment),
        width,
        height,
    })
}

fn read_packets(src: &mut Reader<'_>) -> Result<Vec<ChannelPacket>, BitmapError> {
    let mut packets = Vec::new();
    loop {
        if packets.len() == MAX_PACKETS {
            return Err(BitmapError::IllegalValue(
                "PIC channel chain longer than 8 packets".into(),
            ));
        }
        let chained = src.read_u8()?;
        let size = src.read_u8()?;
        let kind = src.read_u8()?;
        let mask = src.read_u8()?;
        if size != 8 {
            return Err(BitmapError::UnsupportedVariant(alloc::format!(
                "PIC channel size {size}"
            )));
        }
        let compression = match kind {
            0 => Compression::Uncompressed,
            1 => Compression::PureRun,
            2 => Compression::MixedRun,
            other => {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "PIC compression type {other}"
                )));
            }
        };
        let offsets: Vec<usize> = [0x80u8, 0x40, 0x20, 0x10]
            .iter()
            .enumerate()
            .filter(|&(_, bit)| mask & bit != 0)
            .map(|(i, _)| i)
            .collect();
        if offsets.is_empty() {
            return Err(BitmapError::IllegalValue("PIC packet with no channels".into()));
        }
        packets.push(ChannelPacket {
            compression,
            offsets,
        });
        if chained == 0 {
            return Ok(packets);
        }
    }
}

/// Copy one pixel's worth of channel bytes into every pixel of `run`.
fn fill(row: &mut [u8], start: usize, count: usize, offsets: &[usize], value: &[u8]) {
    for x in start..start + count {
        for (&o, &v) in offsets.iter().zip(value) {
            row[x * 4 + o] = v;
        }
    }
}

fn check_run(pos: usize, count: usize, width: usize) -> Result<(), BitmapError> {
    if pos + count > width {
        return Err(BitmapError::IllegalValue(alloc::format!(
            "PIC run of {count} at {pos} overflows {width}-pixel scanline"
        )));
    }
    Ok(())
}

/// Decode one packet's channels for a whole scanline of RGBA pixels.
fn read_channels(
    src: &mut Reader<'_>,
    packet: &ChannelPacket,
    row: &mut [u8],
) -> Result<(), BitmapError> {
    let width = row.len() / 4;
    let n = packet.offsets.len();
    let offsets = &packet.offsets[..];
    let mut pos = 0usize;
    match packet.compression {
        Compression::Uncompressed => {
            for x in 0..width {
                fill(row, x, 1, offsets, src.take(n)?);
            }
        }
        Compression::PureRun => {
            while pos < width {
                let count = usize::from(src.read_u8()?);
                check_run(pos, count, width)?;
                fill(row, pos, count, offsets, src.take(n)?);
                pos += count;
            }
        }
        Compression::MixedRun => {
            while pos < width {
                let control = src.read_u8()?;
                if control < 128 {
                    let count = usize::from(control) + 1;
                    check_run(pos, count, width)?;
                    for x in pos..pos + count {
                        fill(row, x, 1, offsets, src.take(n)?);
                    }
                    pos += count;
                } else {
                    let count = if control == 128 {
                        usize::from(src.read_u16_be()?)
                    } else {
                        usize::from(control) - 127
                    };
                    check_run(pos, count, width)?;
                    fill(row, pos, count, offsets, src.take(n)?);
                    pos += count;
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| read_header(r).is_ok())
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let header = read_header(src)?;
    let packets = read_packets(src)?;
    let mut bitmap = cx.bitmap(
        u32::from(header.width),
        u32::from(header.height),
        PixelLayout::Rgba,
        Origin::UpperLeft,
    )?;
    let has_alpha = packets.iter().any(|p| p.offsets.contains(&3));
    let row_bytes = bitmap.row_bytes();
    for (y, row) in bitmap.pixels_mut().chunks_exact_mut(row_bytes).enumerate() {
        if y % 16 == 0 {
            cx.stop.check()?;
        }
        if !has_alpha {
            row.chunks_exact_mut(4).for_each(|px| px[3] = 255);
        }
        for packet in &packets {
            read_channels(src, packet, row)?;
        }
    }
    let mut out = DecodeOutput::single(ImageFormat::Pic, bitmap);
    out.metadata.comment = header.comment;
    Ok(out)
}
