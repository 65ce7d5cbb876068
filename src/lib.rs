//! # zenretro
//!
//! Decoders for legacy and game-asset image containers, with encoders for
//! PCX, TGA and headered RAW.
//!
//! ## Supported Formats
//!
//! | Format | Decode | Encode | Notes |
//! |---|---|---|---|
//! | GIF | yes | | animation frames composed on the logical screen |
//! | PCX | yes | yes | 1/2/4/8 bits per plane, 1 to 4 planes |
//! | TGA | yes | yes | types 1/2/3 and RLE 9/10/11, 2.0 footer |
//! | Softimage PIC | yes | | raw, pure-run and mixed-run channels |
//! | Homeworld LIF | yes | | |
//! | Half-Life MDL | yes | | embedded skins as frames |
//! | ICNS | yes | | classic RGB + mask elements |
//! | Maya IFF | yes | | tiled RGB(A) |
//! | Amiga ILBM/PBM | yes | | bit-planes, EHB palettes |
//! | XPM | yes | | XPM2 and XPM3 |
//! | UTX | yes | | P8, DXT1 and RGBA8 textures with mips |
//! | KTX 1.1 | yes | | uncompressed and ETC1, with mips |
//! | RAW | yes | yes | chosen by extension or explicit format only |
//!
//! PNG, JPEG and JPEG 2000 are identified but decode only through a handler
//! registered on a [`Registry`].
//!
//! ## Usage
//!
//! ```no_run
//! use zenretro::{DecodeRequest, EncodeRequest, Limits, Unstoppable};
//!
//! let data: &[u8] = &[]; // your file bytes
//!
//! let limits = Limits { max_pixels: Some(64 << 20), ..Default::default() };
//! let decoded = DecodeRequest::new(data).with_limits(&limits).decode(Unstoppable)?;
//! println!("{:?}: {} frame(s)", decoded.format, decoded.frame_count());
//!
//! let tga = EncodeRequest::tga_rle().encode(decoded.first(), Unstoppable)?;
//! # Ok::<(), zenretro::BitmapError>(())
//! ```
//!
//! ## Non-Goals
//!
//! - Colour management and gamma
//! - GPU upload of compressed textures
//! - Editing and compositing beyond what a format's own frame model needs

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod bitmap;
mod blocks;
mod decode;
mod encode;
mod error;
mod format;
mod limits;
mod lzw;
mod pixel;
mod planes;
mod registry;
mod rle;
mod source;

mod gif;
mod icns;
mod iff;
mod ilbm;
mod ktx;
mod lif;
mod mdl;
mod pcx;
mod pic;
mod raw;
mod tga;
mod utx;
mod xpm;

// Re-exports
pub use bitmap::{Bitmap, Palette};
#[cfg(feature = "std")]
pub use decode::decode_reader;
pub use decode::{DecodeOutput, DecodeRequest, Metadata, Permissiveness};
pub use encode::EncodeRequest;
pub use enough::{Stop, Unstoppable};
pub use error::{BitmapError, ErrorKind};
pub use format::{ImageFormat, identify, is_valid};
pub use gif::deinterlace;
pub use limits::Limits;
#[cfg(feature = "rgb")]
pub use pixel::DecodePixel;
pub use pixel::{Origin, PaletteFormat, PixelLayout, SampleType};
pub use registry::{DecodeHandler, Registry};
pub use source::{Reader, SeekFrom};
pub use utx::decode_compact_index;

/// Identify and decode `data`.
pub fn decode(data: &[u8], stop: impl Stop) -> Result<DecodeOutput, BitmapError> {
    DecodeRequest::new(data).decode(stop)
}

macro_rules! decode_as {
    ($($name:ident => $format:ident),* $(,)?) => {
        $(
            #[doc = concat!("Decode `data` as ", stringify!($format), " without sniffing.")]
            pub fn $name(data: &[u8], stop: impl Stop) -> Result<DecodeOutput, BitmapError> {
                DecodeRequest::new(data).with_format(ImageFormat::$format).decode(stop)
            }
        )*
    };
}

decode_as! {
    decode_gif => Gif,
    decode_pcx => Pcx,
    decode_tga => Tga,
    decode_pic => Pic,
    decode_lif => Lif,
    decode_mdl => Mdl,
    decode_icns => Icns,
    decode_iff => Iff,
    decode_ilbm => Ilbm,
    decode_xpm => Xpm,
    decode_utx => Utx,
    decode_ktx => Ktx,
    decode_raw => Raw,
}

/// Encode as run-length PCX.
pub fn encode_pcx(bitmap: &Bitmap, stop: impl Stop) -> Result<alloc::vec::Vec<u8>, BitmapError> {
    EncodeRequest::pcx().encode(bitmap, stop)
}

/// Encode as TGA, run-length compressed when `rle` is set.
pub fn encode_tga(
    bitmap: &Bitmap,
    rle: bool,
    stop: impl Stop,
) -> Result<alloc::vec::Vec<u8>, BitmapError> {
    let request = if rle { EncodeRequest::tga_rle() } else { EncodeRequest::tga() };
    request.encode(bitmap, stop)
}

/// Encode as headered RAW.
pub fn encode_raw(bitmap: &Bitmap, stop: impl Stop) -> Result<alloc::vec::Vec<u8>, BitmapError> {
    EncodeRequest::raw().encode(bitmap, stop)
}
