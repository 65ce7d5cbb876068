//! Unreal Engine 1 texture package (UTX) decoder.
//!
//! A package holds a name table, an import table and an export table. Object
//! references are signed compact indices: negative values point into the
//! import table, positive values into the export table, zero is "none".
//! Every `Texture` export becomes one frame, with its mip levels as the
//! frame's mipmap chain.

use alloc::string::String;
use alloc::vec::Vec;

use crate::bitmap::{Bitmap, Palette};
use crate::blocks::{compressed_len, decode_dxt1};
use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, PaletteFormat, PixelLayout};
use crate::source::{Reader, SeekFrom};

const MAGIC: u32 = 0x9E2A_83C1;
const MIN_VERSION: u16 = 61;
const MAX_VERSION: u16 = 69;
const MAX_NAME_LEN: usize = 256;
/// Bound on table sizes read from the header, far above real packages.
const MAX_TABLE_ENTRIES: u32 = 1 << 20;

// ── Compact index ───────────────────────────────────────────────────

/// Decode an Unreal compact index from the front of `bytes`.
///
/// The first byte holds the sign (bit 7), a continuation flag (bit 6) and
/// six value bits. Up to three further bytes each carry a continuation flag
/// and seven value bits; a fifth byte carries the last bits. Returns the
/// value and the number of bytes consumed. Encodings whose magnitude does not
/// fit an `i32` are rejected instead of being truncated.
pub fn decode_compact_index(bytes: &[u8]) -> Result<(i32, usize), BitmapError> {
    let first = *bytes.first().ok_or(BitmapError::UnexpectedEof)?;
    let negative = first & 0x80 != 0;
    let mut magnitude = i64::from(first & 0x3F);
    let mut more = first & 0x40 != 0;
    let mut shift = 6;
    let mut used = 1;
    while more {
        let b = *bytes.get(used).ok_or(BitmapError::UnexpectedEof)?;
        used += 1;
        if used == 5 {
            if b & 0xE0 != 0 {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "compact index final byte 0x{b:02X} overflows 32 bits"
                )));
            }
            magnitude |= i64::from(b) << shift;
            break;
        }
        magnitude |= i64::from(b & 0x7F) << shift;
        more = b & 0x80 != 0;
        shift += 7;
    }
    let value = if negative { -magnitude } else { magnitude };
    let value = i32::try_from(value).map_err(|_| {
        BitmapError::IllegalValue(alloc::format!("compact index {value} does not fit i32"))
    })?;
    Ok((value, used))
}

fn compact(src: &mut Reader<'_>) -> Result<i32, BitmapError> {
    let (value, used) = decode_compact_index(src.rest())?;
    src.skip(used)?;
    Ok(value)
}

fn compact_len(src: &mut Reader<'_>, what: &str) -> Result<usize, BitmapError> {
    let value = compact(src)?;
    usize::try_from(value)
        .map_err(|_| BitmapError::IllegalValue(alloc::format!("UTX {what} is {value}")))
}

// ── Package tables ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct PackageHeader {
    version: u16,
    name_count: u32,
    name_offset: u32,
    export_count: u32,
    export_offset: u32,
    import_count: u32,
    import_offset: u32,
}

impl PackageHeader {
    fn read(src: &mut Reader<'_>) -> Result<Self, BitmapError> {
        if src.read_u32_le()? != MAGIC {
            return Err(BitmapError::InvalidHeader("missing UTX package tag".into()));
        }
        let version = src.read_u16_le()?;
        let _licensee = src.read_u16_le()?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "UTX package version {version}"
            )));
        }
        let _flags = src.read_u32_le()?;
        let header = Self {
            version,
            name_count: src.read_u32_le()?,
            name_offset: src.read_u32_le()?,
            export_count: src.read_u32_le()?,
            export_offset: src.read_u32_le()?,
            import_count: src.read_u32_le()?,
            import_offset: src.read_u32_le()?,
        };
        for count in [header.name_count, header.export_count, header.import_count] {
            if count > MAX_TABLE_ENTRIES {
                return Err(BitmapError::IllegalValue(alloc::format!(
                    "UTX table of {count} entries"
                )));
            }
        }
        Ok(header)
    }
}

#[derive(Clone, Debug)]
struct Import {
    object_name: i32,
}

#[derive(Clone, Debug)]
struct Export {
    class: i32,
    object_name: i32,
    serial_size: usize,
    serial_offset: usize,
}

struct Package {
    version: u16,
    names: Vec<String>,
    imports: Vec<Import>,
    exports: Vec<Export>,
}

fn read_name(src: &mut Reader<'_>, version: u16) -> Result<String, BitmapError> {
    let bytes = if version < 64 {
        let rest = src.rest();
        let window = &rest[..rest.len().min(MAX_NAME_LEN)];
        let Some(end) = window.iter().position(|&b| b == 0) else {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "UTX name not terminated within {MAX_NAME_LEN} bytes"
            )));
        };
        let bytes = src.take(end)?;
        src.skip(1)?;
        bytes
    } else {
        let len = compact_len(src, "name length")?;
        if len > MAX_NAME_LEN {
            return Err(BitmapError::InvalidHeader(alloc::format!(
                "UTX name of {len} bytes"
            )));
        }
        let bytes = src.take(len)?;
        bytes.strip_suffix(&[0]).unwrap_or(bytes)
    };
    let _flags = src.read_u32_le()?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

impl Package {
    fn read(src: &mut Reader<'_>) -> Result<Self, BitmapError> {
        let header = PackageHeader::read(src)?;

        src.seek(SeekFrom::Start(u64::from(header.name_offset)))?;
        let mut names = Vec::new();
        for _ in 0..header.name_count {
            names.push(read_name(src, header.version)?);
        }

        src.seek(SeekFrom::Start(u64::from(header.import_offset)))?;
        let mut imports = Vec::new();
        for _ in 0..header.import_count {
            let _class_package = compact(src)?;
            let _class_name = compact(src)?;
            let _package = src.read_i32_le()?;
            imports.push(Import {
                object_name: compact(src)?,
            });
        }

        src.seek(SeekFrom::Start(u64::from(header.export_offset)))?;
        let mut exports = Vec::new();
        for _ in 0..header.export_count {
            let class = compact(src)?;
            let _super = compact(src)?;
            let _group = src.read_i32_le()?;
            let object_name = compact(src)?;
            let _object_flags = src.read_u32_le()?;
            let serial_size = compact_len(src, "serial size")?;
            let serial_offset = if serial_size > 0 {
                compact_len(src, "serial offset")?
            } else {
                0
            };
            exports.push(Export {
                class,
                object_name,
                serial_size,
                serial_offset,
            });
        }

        Ok(Self {
            version: header.version,
            names,
            imports,
            exports,
        })
    }

    fn name(&self, index: i32) -> Result<&str, BitmapError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
            .ok_or_else(|| BitmapError::IllegalValue(alloc::format!("UTX name index {index}")))
    }

    /// Class name of an export, resolved through the import or export table.
    fn class_name(&self, export: &Export) -> Result<&str, BitmapError> {
        let object_name = match export.class {
            0 => return Ok("Class"),
            r if r < 0 => self
                .imports
                .get((-(i64::from(r)) - 1) as usize)
                .map(|i| i.object_name),
            r => self.exports.get(r as usize - 1).map(|e| e.object_name),
        }
        .ok_or_else(|| {
            BitmapError::IllegalValue(alloc::format!("UTX class reference {}", export.class))
        })?;
        self.name(object_name)
    }
}

// ── Object properties ───────────────────────────────────────────────

const PROPERTY_BOOL: u8 = 3;
const PROPERTY_STRUCT: u8 = 10;

#[derive(Clone, Debug, Default)]
struct TextureProperties {
    format: u8,
    palette: i32,
}

/// Walk a property list up to its `None` terminator.
fn read_properties(
    src: &mut Reader<'_>,
    package: &Package,
) -> Result<TextureProperties, BitmapError> {
    let mut props = TextureProperties::default();
    loop {
        let name = package.name(compact(src)?)?;
        if name.eq_ignore_ascii_case("None") {
            return Ok(props);
        }
        let info = src.read_u8()?;
        let kind = info & 0x0F;
        if kind == PROPERTY_STRUCT {
            let _struct_name = compact(src)?;
        }
        let size = match (info >> 4) & 0x07 {
            0 => 1,
            1 => 2,
            2 => 4,
            3 => 12,
            4 => 16,
            5 => usize::from(src.read_u8()?),
            6 => usize::from(src.read_u16_le()?),
            _ => usize::try_from(src.read_i32_le()?).map_err(|_| {
                BitmapError::IllegalValue(alloc::format!("UTX property {name} has negative size"))
            })?,
        };
        if info & 0x80 != 0 && kind != PROPERTY_BOOL {
            let index = src.read_u8()?;
            if index & 0x80 != 0 {
                src.skip(if index & 0x40 != 0 { 3 } else { 1 })?;
            }
        }
        let value = if kind == PROPERTY_BOOL {
            &[][..]
        } else {
            src.take(size)?
        };
        match name {
            "Format" if !value.is_empty() => props.format = value[0],
            "Palette" if !value.is_empty() => props.palette = decode_compact_index(value)?.0,
            other => log::debug!("UTX: skipping property {other} ({size} bytes)"),
        }
    }
}

// ── Textures ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextureFormat {
    P8,
    Dxt1,
    Rgba8,
}

impl TextureFormat {
    fn from_code(code: u8) -> Result<Self, BitmapError> {
        match code {
            0 => Ok(Self::P8),
            3 => Ok(Self::Dxt1),
            5 => Ok(Self::Rgba8),
            other => Err(BitmapError::UnsupportedVariant(alloc::format!(
                "UTX texture format {other}"
            ))),
        }
    }

    fn data_len(self, width: u32, height: u32) -> Result<usize, BitmapError> {
        let pixels = (width as usize).checked_mul(height as usize);
        let len = match self {
            Self::P8 => pixels,
            Self::Dxt1 => return compressed_len(width, height),
            Self::Rgba8 => pixels.and_then(|p| p.checked_mul(4)),
        };
        len.ok_or(BitmapError::DimensionsTooLarge { width, height })
    }
}

fn read_palette(
    src: &mut Reader<'_>,
    package: &Package,
    reference: i32,
) -> Result<Palette, BitmapError> {
    let export = usize::try_from(reference)
        .ok()
        .and_then(|r| r.checked_sub(1))
        .and_then(|i| package.exports.get(i))
        .ok_or_else(|| {
            BitmapError::IllegalValue(alloc::format!("UTX palette reference {reference}"))
        })?;
    src.seek(SeekFrom::Start(export.serial_offset as u64))?;
    let _ = read_properties(src, package)?;
    let count = compact_len(src, "palette size")?;
    if count == 0 || count > Palette::MAX_ENTRIES {
        return Err(BitmapError::IllegalValue(alloc::format!(
            "UTX palette of {count} entries"
        )));
    }
    let rgba = src.take(count * 4)?;
    let rgb: Vec<u8> = rgba.chunks_exact(4).flat_map(|c| [c[0], c[1], c[2]]).collect();
    Palette::new(PaletteFormat::Rgb24, rgb)
}

fn read_texture(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
    package: &Package,
    export: &Export,
) -> Result<Bitmap, BitmapError> {
    src.seek(SeekFrom::Start(export.serial_offset as u64))?;
    let props = read_properties(src, package)?;
    let format = TextureFormat::from_code(props.format)?;

    let mip_count = src.read_u8()?;
    let mut levels = Vec::with_capacity(usize::from(mip_count));
    for _ in 0..mip_count {
        if package.version >= 63 {
            let _next_offset = src.read_u32_le()?;
        }
        let size = compact_len(src, "mip size")?;
        let data = src.take(size)?;
        let width = src.read_u32_le()?;
        let height = src.read_u32_le()?;
        let _u_bits = src.read_u8()?;
        let _v_bits = src.read_u8()?;
        cx.check_dimensions(width, height)?;
        let expected = format.data_len(width, height)?;
        if size != expected {
            return Err(BitmapError::IllegalValue(alloc::format!(
                "UTX {format:?} mip {width}x{height} has {size} bytes, expected {expected}"
            )));
        }
        levels.push(mip_bitmap(cx, format, width, height, data)?);
    }

    let mut levels = levels.into_iter();
    let mut top = levels
        .next()
        .ok_or_else(|| BitmapError::IllegalValue("UTX texture without mip levels".into()))?;
    for level in levels {
        top.push_mipmap(level);
    }
    if format == TextureFormat::P8 {
        let palette = read_palette(src, package, props.palette)?;
        for mip in top.mipmaps_mut() {
            mip.set_palette(palette.clone())?;
        }
        top.set_palette(palette)?;
    }
    Ok(top)
}

fn mip_bitmap(
    cx: &DecodeContext<'_>,
    format: TextureFormat,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<Bitmap, BitmapError> {
    let layout = match format {
        TextureFormat::P8 => PixelLayout::Indexed,
        TextureFormat::Dxt1 => PixelLayout::Rgba,
        TextureFormat::Rgba8 => PixelLayout::Bgra,
    };
    let mut bitmap = cx.bitmap(width, height, layout, Origin::UpperLeft)?;
    match format {
        TextureFormat::Dxt1 => bitmap
            .pixels_mut()
            .copy_from_slice(&decode_dxt1(data, width, height)?),
        _ => bitmap.pixels_mut().copy_from_slice(data),
    }
    Ok(bitmap)
}

pub(crate) fn is_valid(src: &mut Reader<'_>) -> bool {
    src.probe(|r| PackageHeader::read(r).is_ok())
}

pub(crate) fn decode(
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    let package = Package::read(src)?;
    let mut frames = Vec::new();
    for export in &package.exports {
        if package.class_name(export)? != "Texture" || export.serial_size == 0 {
            continue;
        }
        cx.stop.check()?;
        cx.check_frames(frames.len() + 1)?;
        match read_texture(src, cx, &package, export) {
            Ok(texture) => frames.push(texture),
            Err(e @ BitmapError::UnsupportedVariant(_)) if !cx.strict() => {
                log::warn!(
                    "UTX: skipping texture {}: {e}",
                    package.name(export.object_name).unwrap_or("?")
                );
            }
            Err(e) => return Err(e),
        }
    }
    DecodeOutput::from_frames(ImageFormat::Utx, frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Permissiveness;
    use crate::limits::Limits;
    use alloc::vec;
    use enough::Unstoppable;

    const NAMES: [&str; 8] = [
        "None", "Texture", "Palette", "Format", "Floor", "FloorPal", "Sky", "Odd",
    ];
    const N_NONE: i32 = 0;
    const N_PALETTE: i32 = 2;
    const N_FORMAT: i32 = 3;
    /// Import 0 is class `Texture`, import 1 is class `Palette`.
    const TEXTURE_CLASS: i32 = -1;
    const PALETTE_CLASS: i32 = -2;

    /// Version 68 package with the fixed name and import tables above.
    struct PackageBuilder {
        exports: Vec<(i32, i32, Vec<u8>)>,
    }

    impl PackageBuilder {
        fn new() -> Self {
            Self { exports: Vec::new() }
        }

        fn export(mut self, class: i32, name: i32, body: Vec<u8>) -> Self {
            self.exports.push((class, name, body));
            self
        }

        fn finish(self) -> Vec<u8> {
            let mut out = vec![0u8; 36];
            let mut serial = Vec::new();
            for (_, _, body) in &self.exports {
                serial.push((body.len(), out.len()));
                out.extend_from_slice(body);
            }

            let name_offset = out.len();
            for name in NAMES {
                out.extend(encode_compact(name.len() as i32 + 1));
                out.extend_from_slice(name.as_bytes());
                out.push(0);
                out.extend_from_slice(&0u32.to_le_bytes());
            }

            let import_offset = out.len();
            for object_name in [1, N_PALETTE] {
                out.extend(encode_compact(0));
                out.extend(encode_compact(0));
                out.extend_from_slice(&0i32.to_le_bytes());
                out.extend(encode_compact(object_name));
            }

            let export_offset = out.len();
            for ((class, name, _), (size, offset)) in self.exports.iter().zip(&serial) {
                out.extend(encode_compact(*class));
                out.extend(encode_compact(0));
                out.extend_from_slice(&0i32.to_le_bytes());
                out.extend(encode_compact(*name));
                out.extend_from_slice(&0u32.to_le_bytes());
                out.extend(encode_compact(*size as i32));
                out.extend(encode_compact(*offset as i32));
            }

            let mut header = Vec::new();
            header.extend_from_slice(&MAGIC.to_le_bytes());
            header.extend_from_slice(&68u16.to_le_bytes());
            header.extend_from_slice(&0u16.to_le_bytes());
            header.extend_from_slice(&0u32.to_le_bytes());
            for v in [
                NAMES.len(),
                name_offset,
                self.exports.len(),
                export_offset,
                2,
                import_offset,
            ] {
                header.extend_from_slice(&(v as u32).to_le_bytes());
            }
            out[..36].copy_from_slice(&header);
            out
        }
    }

    fn format_property(code: u8) -> Vec<u8> {
        let mut out = encode_compact(N_FORMAT);
        out.extend_from_slice(&[0x01, code]);
        out
    }

    fn palette_property(export: i32) -> Vec<u8> {
        let mut out = encode_compact(N_PALETTE);
        out.push(0x05);
        out.extend(encode_compact(export));
        out
    }

    fn texture_body(properties: &[Vec<u8>], mips: &[(u32, u32, &[u8])]) -> Vec<u8> {
        let mut out: Vec<u8> = properties.concat();
        out.extend(encode_compact(N_NONE));
        out.push(mips.len() as u8);
        for (width, height, data) in mips {
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend(encode_compact(data.len() as i32));
            out.extend_from_slice(data);
            out.extend_from_slice(&width.to_le_bytes());
            out.extend_from_slice(&height.to_le_bytes());
            out.extend_from_slice(&[0, 0]);
        }
        out
    }

    fn palette_body(rgba: &[[u8; 4]]) -> Vec<u8> {
        let mut out = encode_compact(N_NONE);
        out.extend(encode_compact(rgba.len() as i32));
        out.extend(rgba.iter().flatten());
        out
    }

    fn run(data: &[u8], cx: &DecodeContext<'_>) -> Result<DecodeOutput, BitmapError> {
        decode(&mut Reader::new(data), cx)
    }

    const RED_BLOCK: [u8; 8] = [0x00, 0xF8, 0x00, 0x00, 0, 0, 0, 0];
    const CLEAR_BLOCK: [u8; 8] = [0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

    #[test]
    fn p8_texture_with_palette_and_dxt1_mip_chain() {
        let colours = [[10, 20, 30, 255], [40, 50, 60, 255], [70, 80, 90, 0], [1, 2, 3, 255]];
        let data = PackageBuilder::new()
            .export(PALETTE_CLASS, 5, palette_body(&colours))
            .export(
                TEXTURE_CLASS,
                4,
                texture_body(
                    &[format_property(0), palette_property(1)],
                    &[(2, 2, &[0, 1, 2, 3][..])],
                ),
            )
            .export(
                TEXTURE_CLASS,
                6,
                texture_body(
                    &[format_property(3)],
                    &[(4, 4, &RED_BLOCK[..]), (2, 2, &CLEAR_BLOCK[..])],
                ),
            )
            .finish();
        assert!(is_valid(&mut Reader::new(&data)));

        let out = run(&data, &DecodeContext::new(&Unstoppable)).unwrap();
        assert_eq!(out.format, ImageFormat::Utx);
        assert_eq!(out.frame_count(), 2);

        let floor = &out.frames()[0];
        assert_eq!(floor.layout(), PixelLayout::Indexed);
        assert_eq!(floor.pixels(), &[0, 1, 2, 3]);
        let palette = floor.palette().unwrap();
        assert_eq!(palette.len(), 4);
        // Palette exports keep RGB only.
        assert_eq!(palette.rgba(2), Some([70, 80, 90, 255]));

        let sky = &out.frames()[1];
        assert_eq!((sky.width(), sky.height()), (4, 4));
        assert_eq!(sky.layout(), PixelLayout::Rgba);
        assert!(sky.pixels().chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
        assert_eq!(sky.mipmaps().len(), 1);
        let mip = &sky.mipmaps()[0];
        assert_eq!((mip.width(), mip.height()), (2, 2));
        assert_eq!(mip.pixels(), &[0u8; 16]);
    }

    #[test]
    fn unsupported_texture_is_skipped_unless_strict() {
        let data = PackageBuilder::new()
            .export(TEXTURE_CLASS, 7, texture_body(&[format_property(10)], &[]))
            .export(
                TEXTURE_CLASS,
                6,
                texture_body(&[format_property(3)], &[(4, 4, &RED_BLOCK[..])]),
            )
            .finish();

        let out = run(&data, &DecodeContext::new(&Unstoppable)).unwrap();
        assert_eq!(out.frame_count(), 1);
        assert_eq!(out.width(), 4);

        let strict = DecodeContext {
            permissiveness: Permissiveness::Strict,
            ..DecodeContext::new(&Unstoppable)
        };
        assert!(matches!(run(&data, &strict), Err(BitmapError::UnsupportedVariant(_))));
    }

    #[test]
    fn huge_mip_dimensions_are_rejected() {
        let data = PackageBuilder::new()
            .export(
                TEXTURE_CLASS,
                4,
                texture_body(&[format_property(5)], &[(u32::MAX, u32::MAX, &[0u8; 0][..])]),
            )
            .finish();

        assert!(matches!(
            run(&data, &DecodeContext::new(&Unstoppable)),
            Err(BitmapError::DimensionsTooLarge { .. })
        ));

        let limits = Limits {
            max_width: Some(4096),
            ..Default::default()
        };
        let cx = DecodeContext {
            limits: Some(&limits),
            ..DecodeContext::new(&Unstoppable)
        };
        assert!(matches!(run(&data, &cx), Err(BitmapError::LimitExceeded(_))));
    }

    #[test]
    fn texture_without_palette_export_fails() {
        let data = PackageBuilder::new()
            .export(
                TEXTURE_CLASS,
                4,
                texture_body(&[palette_property(9)], &[(1, 1, &[0u8][..])]),
            )
            .finish();
        assert!(matches!(
            run(&data, &DecodeContext::new(&Unstoppable)),
            Err(BitmapError::IllegalValue(_))
        ));
    }

    /// Reference encoder used to build fixtures.
    fn encode_compact(value: i32) -> Vec<u8> {
        let mut magnitude = i64::from(value).unsigned_abs();
        let mut out = Vec::new();
        let mut first = (magnitude & 0x3F) as u8;
        if value < 0 {
            first |= 0x80;
        }
        magnitude >>= 6;
        if magnitude > 0 {
            first |= 0x40;
        }
        out.push(first);
        while magnitude > 0 {
            if out.len() == 4 {
                out.push(magnitude as u8);
                break;
            }
            let mut b = (magnitude & 0x7F) as u8;
            magnitude >>= 7;
            if magnitude > 0 {
                b |= 0x80;
            }
            out.push(b);
        }
        out
    }

    #[test]
    fn compact_index_byte_boundaries() {
        assert_eq!(decode_compact_index(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode_compact_index(&[0x3F]).unwrap(), (63, 1));
        assert_eq!(decode_compact_index(&[0xBF]).unwrap(), (-63, 1));
        assert_eq!(decode_compact_index(&[0x40, 0x01]).unwrap(), (64, 2));
        assert_eq!(decode_compact_index(&[0xC0, 0x01]).unwrap(), (-64, 2));
        assert_eq!(decode_compact_index(&[0x7F, 0x7F]).unwrap(), (8191, 2));
        assert_eq!(decode_compact_index(&[0x40, 0x80, 0x01]).unwrap(), (8192, 3));
        assert_eq!(
            decode_compact_index(&[0x7F, 0xFF, 0xFF, 0x7F]).unwrap(),
            ((1 << 27) - 1, 4)
        );
        assert_eq!(
            decode_compact_index(&[0x40, 0x80, 0x80, 0x80, 0x01]).unwrap(),
            (1 << 27, 5)
        );
        // Trailing bytes are not consumed.
        assert_eq!(decode_compact_index(&[0x05, 0xFF]).unwrap(), (5, 1));
    }

    #[test]
    fn compact_index_extremes() {
        assert_eq!(encode_compact(i32::MAX), [0x7F, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(decode_compact_index(&encode_compact(i32::MAX)).unwrap(), (i32::MAX, 5));
        assert_eq!(decode_compact_index(&encode_compact(-i32::MAX)).unwrap(), (-i32::MAX, 5));
        // -2^31 fits, +2^31 does not.
        assert_eq!(
            decode_compact_index(&[0xC0, 0x80, 0x80, 0x80, 0x10]).unwrap(),
            (i32::MIN, 5)
        );
        assert!(matches!(
            decode_compact_index(&[0x40, 0x80, 0x80, 0x80, 0x10]),
            Err(BitmapError::IllegalValue(_))
        ));
        // Bits above the 32-bit range in the fifth byte.
        assert!(matches!(
            decode_compact_index(&[0x40, 0x80, 0x80, 0x80, 0x20]),
            Err(BitmapError::IllegalValue(_))
        ));
    }

    #[test]
    fn compact_index_truncated() {
        assert!(matches!(decode_compact_index(&[]), Err(BitmapError::UnexpectedEof)));
        assert!(matches!(
            decode_compact_index(&[0x40, 0x80]),
            Err(BitmapError::UnexpectedEof)
        ));
    }

    #[test]
    fn compact_index_matches_reference_encoder() {
        for value in [
            0, 1, -1, 63, 64, -64, 8191, 8192, -8192, 1 << 20, (1 << 20) + 1, 1 << 27,
            (1 << 27) + 12345, -(1 << 30), i32::MAX, -i32::MAX,
        ] {
            let bytes = encode_compact(value);
            assert_eq!(decode_compact_index(&bytes).unwrap(), (value, bytes.len()), "{value}");
        }
    }

    #[test]
    fn old_package_names_are_nul_terminated() {
        let mut data = b"Texture\0".to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut src = Reader::new(&data);
        assert_eq!(read_name(&mut src, 62).unwrap(), "Texture");
        assert!(src.eof());

        let unterminated = vec![b'a'; 300];
        assert!(read_name(&mut Reader::new(&unterminated), 62).is_err());
    }

    #[test]
    fn new_package_names_are_length_prefixed() {
        let mut data = vec![5];
        data.extend_from_slice(b"None\0");
        data.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(read_name(&mut Reader::new(&data), 68).unwrap(), "None");
    }
}
