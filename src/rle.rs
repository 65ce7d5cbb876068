//! Run-length primitives shared by the plane and tile based formats.
//!
//! Each format has its own escape convention but they all decode into a
//! fixed-size destination; a run that would write past it is an
//! [`BitmapError::IllegalValue`], never a silent truncation. TGA is the one
//! exception: its final packet is clipped (see [`unpack_tga`]).

use alloc::vec::Vec;

use crate::error::BitmapError;
use crate::source::{Reader, SeekFrom};

/// Byte-oriented PackBits dialects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PackBits {
    /// Apple icon RGB channels: `c >= 128` repeats `c - 125` times.
    Icns,
    /// Maya IFF tiles: `c >= 128` repeats `(c & 0x7F) + 1` times.
    Maya,
    /// Amiga ByteRun1: signed control byte, -128 is a no-op.
    ByteRun1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Packet {
    Literal(usize),
    Repeat(usize),
    Nop,
}

impl PackBits {
    fn packet(self, control: u8) -> Packet {
        match self {
            PackBits::Icns if control >= 128 => Packet::Repeat(usize::from(control) - 125),
            PackBits::Maya if control >= 128 => Packet::Repeat(usize::from(control & 0x7F) + 1),
            PackBits::Icns | PackBits::Maya => Packet::Literal(usize::from(control) + 1),
            PackBits::ByteRun1 => match control as i8 {
                -128 => Packet::Nop,
                n if n < 0 => Packet::Repeat((1 - i16::from(n)) as usize),
                n => Packet::Literal(n as usize + 1),
            },
        }
    }
}

/// Decode exactly `count` bytes into `out[offset + i * stride]`.
pub(crate) fn unpack_strided(
    scheme: PackBits,
    src: &mut Reader<'_>,
    out: &mut [u8],
    offset: usize,
    stride: usize,
    count: usize,
) -> Result<(), BitmapError> {
    let last = count
        .checked_sub(1)
        .map(|n| offset + n * stride)
        .unwrap_or(offset);
    if count > 0 && last >= out.len() {
        return Err(BitmapError::BufferTooSmall {
            needed: last + 1,
            actual: out.len(),
        });
    }
    let mut pos = 0usize;
    while pos < count {
        let (len, repeat) = match scheme.packet(src.read_u8()?) {
            Packet::Nop => continue,
            Packet::Literal(n) => (n, None),
            Packet::Repeat(n) => (n, Some(src.read_u8()?)),
        };
        if pos + len > count {
            return Err(BitmapError::IllegalValue(alloc::format!(
                "run of {len} at {pos} overflows {count}-byte plane"
            )));
        }
        match repeat {
            Some(value) => {
                for i in pos..pos + len {
                    out[offset + i * stride] = value;
                }
            }
            None => {
                let bytes = src.take(len)?;
                for (i, &b) in bytes.iter().enumerate() {
                    out[offset + (pos + i) * stride] = b;
                }
            }
        }
        pos += len;
    }
    Ok(())
}

/// Decode exactly `out.len()` contiguous bytes.
pub(crate) fn unpack(
    scheme: PackBits,
    src: &mut Reader<'_>,
    out: &mut [u8],
) -> Result<(), BitmapError> {
    let count = out.len();
    unpack_strided(scheme, src, out, 0, 1, count)
}

// ── PCX ─────────────────────────────────────────────────────────────

/// Decode one PCX scanline (all planes) into `out`.
///
/// A byte with both top bits set is a count in its low six bits followed by
/// the value; anything else is a literal.
pub(crate) fn unpack_pcx(src: &mut Reader<'_>, out: &mut [u8]) -> Result<(), BitmapError> {
    let mut pos = 0usize;
    while pos < out.len() {
        let b = src.read_u8()?;
        if b & 0xC0 == 0xC0 {
            let count = usize::from(b & 0x3F);
            let value = src.read_u8()?;
            if pos + count > out.len() {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "PCX run of {count} at {pos} overflows {}-byte scanline",
                    out.len()
                )));
            }
            out[pos..pos + count].fill(value);
            pos += count;
        } else {
            out[pos] = b;
            pos += 1;
        }
    }
    Ok(())
}

/// Encode one PCX plane line, appending to `out`. Runs never span calls.
pub(crate) fn pack_pcx(line: &[u8], out: &mut Vec<u8>) {
    let mut i = 0usize;
    while i < line.len() {
        let value = line[i];
        let mut run = 1usize;
        while run < 63 && i + run < line.len() && line[i + run] == value {
            run += 1;
        }
        if run > 1 || value & 0xC0 == 0xC0 {
            out.push(0xC0 | run as u8);
        }
        out.push(value);
        i += run;
    }
}

// ── TGA ─────────────────────────────────────────────────────────────

/// Decode TGA run-length packets of `bpp`-byte pixels until `out` is full.
///
/// The final packet is clipped to the space left in `out`; literal bytes a
/// clipped raw packet would have supplied are skipped over. Returns the
/// number of compressed pixel bytes discarded that way.
pub(crate) fn unpack_tga(
    src: &mut Reader<'_>,
    out: &mut [u8],
    bpp: usize,
) -> Result<usize, BitmapError> {
    let mut pos = 0usize;
    let mut discarded = 0usize;
    while pos < out.len() {
        let header = src.read_u8()?;
        let count = usize::from(header & 0x7F) + 1;
        let wanted = count * bpp;
        let fits = wanted.min(out.len() - pos);
        if header & 0x80 != 0 {
            let pixel = src.take(bpp)?;
            for chunk in out[pos..pos + fits].chunks_mut(bpp) {
                chunk.copy_from_slice(&pixel[..chunk.len()]);
            }
        } else {
            let bytes = src.take(fits)?;
            out[pos..pos + fits].copy_from_slice(bytes);
            if wanted > fits {
                let excess = wanted - fits;
                let available = excess.min(src.remaining());
                src.seek(SeekFrom::Current(available as i64))?;
                discarded += excess;
            }
        }
        pos += fits;
    }
    Ok(discarded)
}

/// Encode one scanline of `bpp`-byte pixels as TGA packets (≤128 pixels each).
pub(crate) fn pack_tga(row: &[u8], bpp: usize, out: &mut Vec<u8>) {
    let pixels: Vec<&[u8]> = row.chunks_exact(bpp).collect();
    let n = pixels.len();
    let mut i = 0usize;
    while i < n {
        let mut run = 1usize;
        while run < 128 && i + run < n && pixels[i + run] == pixels[i] {
            run += 1;
        }
        if run > 1 {
            out.push(0x80 | (run - 1) as u8);
            out.extend_from_slice(pixels[i]);
            i += run;
            continue;
        }
        // Literal packet: extend until two equal neighbours start a run.
        let start = i;
        let mut len = 1usize;
        while len < 128 && start + len < n {
            let j = start + len;
            if j + 1 < n && pixels[j] == pixels[j + 1] {
                break;
            }
            len += 1;
        }
        out.push((len - 1) as u8);
        for p in &pixels[start..start + len] {
            out.extend_from_slice(p);
        }
        i = start + len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icns_bias() {
        // 0x80 repeats 3 times, 0x02 copies 3 literals.
        let data = [0x80, 7, 0x02, 1, 2, 3];
        let mut out = [0u8; 6];
        unpack(PackBits::Icns, &mut Reader::new(&data), &mut out).unwrap();
        assert_eq!(out, [7, 7, 7, 1, 2, 3]);
    }

    #[test]
    fn maya_bias() {
        let data = [0x81, 9, 0x00, 4];
        let mut out = [0u8; 3];
        unpack(PackBits::Maya, &mut Reader::new(&data), &mut out).unwrap();
        assert_eq!(out, [9, 9, 4]);
    }

    #[test]
    fn byterun1_nop_and_repeat() {
        let data = [0x80, 0xFE, 5, 0x01, 1, 2];
        let mut out = [0u8; 5];
        unpack(PackBits::ByteRun1, &mut Reader::new(&data), &mut out).unwrap();
        assert_eq!(out, [5, 5, 5, 1, 2]);
    }

    #[test]
    fn overflowing_run_is_error() {
        let data = [0x85, 1];
        let mut out = [0u8; 4];
        let err = unpack(PackBits::Icns, &mut Reader::new(&data), &mut out).unwrap_err();
        assert!(matches!(err, BitmapError::IllegalValue(_)));
    }

    #[test]
    fn strided_channel_writes() {
        let data = [0x80, 0xAA];
        let mut out = [0u8; 12];
        unpack_strided(PackBits::Icns, &mut Reader::new(&data), &mut out, 1, 4, 3).unwrap();
        assert_eq!(out, [0, 0xAA, 0, 0, 0, 0xAA, 0, 0, 0, 0xAA, 0, 0]);
    }

    #[test]
    fn pcx_escapes_high_literals() {
        let line = [0xC5, 1, 1, 1, 2];
        let mut packed = Vec::new();
        pack_pcx(&line, &mut packed);
        assert_eq!(packed, [0xC1, 0xC5, 0xC3, 1, 2]);
        let mut out = [0u8; 5];
        unpack_pcx(&mut Reader::new(&packed), &mut out).unwrap();
        assert_eq!(out, line);
    }

    #[test]
    fn pcx_run_past_scanline_rejected() {
        let data = [0xC4, 9];
        let mut out = [0u8; 3];
        assert!(unpack_pcx(&mut Reader::new(&data), &mut out).is_err());
    }

    #[test]
    fn tga_final_packet_clipped() {
        // Repeat packet of 4 pixels into room for 3, then a raw packet of 2
        // into room for 1 with its excess literal skipped.
        let data = [0x83, 5, 0x01, 6, 7, 0xEE];
        let mut out = [0u8; 3];
        let discarded = unpack_tga(&mut Reader::new(&data), &mut out, 1).unwrap();
        assert_eq!(out, [5, 5, 5]);
        assert_eq!(discarded, 0);

        let mut out = [0u8; 4];
        let mut src = Reader::new(&data);
        let discarded = unpack_tga(&mut src, &mut out, 1).unwrap();
        assert_eq!(out, [5, 5, 5, 5]);
        assert_eq!(discarded, 0);
        assert_eq!(src.tell(), 2);

        let raw = [0x02, 1, 2, 3, 0xFF];
        let mut out = [0u8; 2];
        let mut src = Reader::new(&raw);
        let discarded = unpack_tga(&mut src, &mut out, 1).unwrap();
        assert_eq!(out, [1, 2]);
        assert_eq!(discarded, 1);
        assert_eq!(src.tell(), 4);
    }

    #[test]
    fn tga_packets_mix_runs_and_literals() {
        let row = [1u8, 1, 1, 2, 3, 4, 4];
        let mut packed = Vec::new();
        pack_tga(&row, 1, &mut packed);
        assert_eq!(packed, [0x82, 1, 0x01, 2, 3, 0x81, 4]);
    }
}
