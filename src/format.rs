//! Format identification and dispatch.

use crate::decode::{DecodeContext, DecodeOutput};
use crate::error::BitmapError;
use crate::source::Reader;
use crate::{gif, icns, iff, ilbm, ktx, lif, mdl, pcx, pic, raw, tga, utx, xpm};

/// Image container formats known to the dispatcher.
///
/// `Png`, `Jpeg` and `Jp2` are recognised but have no built-in decoder; they
/// decode only through a handler registered on a [`crate::Registry`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// GIF87a/GIF89a, possibly animated.
    Gif,
    /// ZSoft PCX.
    Pcx,
    /// Truevision TGA.
    Tga,
    /// Softimage PIC.
    Pic,
    /// Homeworld LIF.
    Lif,
    /// Half-Life model skins.
    Mdl,
    /// Apple icon family.
    Icns,
    /// Maya IFF.
    Iff,
    /// Amiga ILBM / PBM.
    Ilbm,
    /// X PixMap.
    Xpm,
    /// Unreal texture package.
    Utx,
    /// Khronos KTX 1.1.
    Ktx,
    /// Headered raw pixels.
    Raw,
    Png,
    Jpeg,
    Jp2,
}

const EXTENSIONS: &[(&str, ImageFormat)] = &[
    ("gif", ImageFormat::Gif),
    ("pcx", ImageFormat::Pcx),
    ("tga", ImageFormat::Tga),
    ("vda", ImageFormat::Tga),
    ("icb", ImageFormat::Tga),
    ("vst", ImageFormat::Tga),
    ("pic", ImageFormat::Pic),
    ("lif", ImageFormat::Lif),
    ("mdl", ImageFormat::Mdl),
    ("icns", ImageFormat::Icns),
    ("iff", ImageFormat::Iff),
    ("lbm", ImageFormat::Ilbm),
    ("ilbm", ImageFormat::Ilbm),
    ("xpm", ImageFormat::Xpm),
    ("utx", ImageFormat::Utx),
    ("ktx", ImageFormat::Ktx),
    ("raw", ImageFormat::Raw),
    ("png", ImageFormat::Png),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("jpe", ImageFormat::Jpeg),
    ("jp2", ImageFormat::Jp2),
    ("jpx", ImageFormat::Jp2),
    ("j2k", ImageFormat::Jp2),
    ("j2c", ImageFormat::Jp2),
];

impl ImageFormat {
    /// Look up a file extension (without the dot), ignoring ASCII case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        EXTENSIONS
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|&(_, format)| format)
    }

    /// The usual lowercase extension for this format.
    pub fn extension(&self) -> &'static str {
        EXTENSIONS
            .iter()
            .find(|(_, f)| f == self)
            .map_or("", |&(ext, _)| ext)
    }

    /// Format to encode for `ext`, if there is a built-in encoder.
    pub fn for_encoding(ext: &str) -> Result<Self, BitmapError> {
        match Self::from_extension(ext) {
            Some(format) if format.can_encode() => Ok(format),
            _ => Err(BitmapError::InvalidExtension(ext.into())),
        }
    }

    /// Whether a built-in decoder exists.
    pub fn can_decode(&self) -> bool {
        !matches!(self, Self::Png | Self::Jpeg | Self::Jp2)
    }

    pub fn can_encode(&self) -> bool {
        matches!(self, Self::Pcx | Self::Tga | Self::Raw)
    }
}

// ── Signature probing ───────────────────────────────────────────────

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const JP2_SIGNATURE: &[u8] = &[
    0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];
const J2K_SIGNATURE: &[u8] = &[0xFF, 0x4F, 0xFF, 0x51];

fn starts_with(src: &mut Reader<'_>, signature: &[u8]) -> bool {
    src.probe(|r| r.take(signature.len()).is_ok_and(|s| s == signature))
}

type Probe = fn(&mut Reader<'_>) -> bool;

fn is_png(src: &mut Reader<'_>) -> bool {
    starts_with(src, PNG_SIGNATURE)
}

fn is_jpeg(src: &mut Reader<'_>) -> bool {
    starts_with(src, JPEG_SIGNATURE)
}

fn is_jp2(src: &mut Reader<'_>) -> bool {
    starts_with(src, JP2_SIGNATURE) || starts_with(src, J2K_SIGNATURE)
}

/// Content probes in priority order; first match wins. TGA has no real
/// signature so it comes last. RAW is never sniffed.
const PROBES: &[(ImageFormat, Probe)] = &[
    (ImageFormat::Png, is_png),
    (ImageFormat::Jpeg, is_jpeg),
    (ImageFormat::Jp2, is_jp2),
    (ImageFormat::Gif, gif::is_valid),
    (ImageFormat::Ktx, ktx::is_valid),
    (ImageFormat::Icns, icns::is_valid),
    (ImageFormat::Utx, utx::is_valid),
    (ImageFormat::Mdl, mdl::is_valid),
    (ImageFormat::Lif, lif::is_valid),
    (ImageFormat::Pic, pic::is_valid),
    (ImageFormat::Iff, iff::is_valid),
    (ImageFormat::Ilbm, ilbm::is_valid),
    (ImageFormat::Pcx, pcx::is_valid),
    (ImageFormat::Xpm, xpm::is_valid),
    (ImageFormat::Tga, tga::is_valid),
];

/// Identify the format from the leading bytes of `data`.
///
/// Individual probe failures are expected and never reported.
pub fn identify(data: &[u8]) -> Option<ImageFormat> {
    let mut src = Reader::new(data);
    identify_reader(&mut src)
}

pub(crate) fn identify_reader(src: &mut Reader<'_>) -> Option<ImageFormat> {
    PROBES
        .iter()
        .find(|(_, probe)| probe(src))
        .map(|&(format, _)| format)
}

/// Whether `data` passes `format`'s own validator.
pub fn is_valid(format: ImageFormat, data: &[u8]) -> bool {
    let mut src = Reader::new(data);
    match format {
        // RAW has no signature; any header-sized input qualifies.
        ImageFormat::Raw => data.len() >= raw::HEADER_LEN,
        ImageFormat::Iff => iff::is_valid(&mut src) || ilbm::is_valid(&mut src),
        _ => PROBES
            .iter()
            .find(|(f, _)| *f == format)
            .is_some_and(|(_, probe)| probe(&mut src)),
    }
}

/// Run `format`'s decoder on `src` from its current position.
pub(crate) fn decode_as(
    format: ImageFormat,
    src: &mut Reader<'_>,
    cx: &DecodeContext<'_>,
) -> Result<DecodeOutput, BitmapError> {
    log::debug!("decoding {format:?} at offset {}", src.tell());
    match format {
        ImageFormat::Gif => gif::decode(src, cx),
        ImageFormat::Pcx => pcx::decode(src, cx),
        ImageFormat::Tga => tga::decode(src, cx),
        ImageFormat::Pic => pic::decode(src, cx),
        ImageFormat::Lif => lif::decode(src, cx),
        ImageFormat::Mdl => mdl::decode(src, cx),
        ImageFormat::Icns => icns::decode(src, cx),
        // `.iff` covers both Maya and Amiga files.
        ImageFormat::Iff if ilbm::is_valid(src) => ilbm::decode(src, cx),
        ImageFormat::Iff => iff::decode(src, cx),
        ImageFormat::Ilbm => ilbm::decode(src, cx),
        ImageFormat::Xpm => xpm::decode(src, cx),
        ImageFormat::Utx => utx::decode(src, cx),
        ImageFormat::Ktx => ktx::decode(src, cx),
        ImageFormat::Raw => raw::decode(src, cx),
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Jp2 => {
            Err(BitmapError::UnsupportedFormat(format))
        }
    }
}
