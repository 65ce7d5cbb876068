use alloc::vec::Vec;

use enough::Stop;

use crate::bitmap::Bitmap;
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::pixel::{Origin, SampleType};
use crate::{pcx, raw, tga};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Pcx,
    Tga { rle: bool },
    Raw,
}

/// Builder for an encode call.
///
/// ```no_run
/// use zenretro::{EncodeRequest, Unstoppable};
///
/// # let bitmap: zenretro::Bitmap = unimplemented!();
/// let tga = EncodeRequest::tga_rle().encode(&bitmap, Unstoppable)?;
/// # Ok::<(), zenretro::BitmapError>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct EncodeRequest {
    target: Target,
}

impl EncodeRequest {
    /// Version 5 run-length PCX.
    pub fn pcx() -> Self {
        Self { target: Target::Pcx }
    }

    /// Uncompressed TGA.
    pub fn tga() -> Self {
        Self {
            target: Target::Tga { rle: false },
        }
    }

    /// Run-length TGA (image types 9, 10 and 11).
    pub fn tga_rle() -> Self {
        Self {
            target: Target::Tga { rle: true },
        }
    }

    /// Headered raw pixels.
    pub fn raw() -> Self {
        Self { target: Target::Raw }
    }

    /// Encoder for `format`, if there is one.
    pub fn for_format(format: ImageFormat) -> Result<Self, BitmapError> {
        match format {
            ImageFormat::Pcx => Ok(Self::pcx()),
            ImageFormat::Tga => Ok(Self::tga()),
            ImageFormat::Raw => Ok(Self::raw()),
            other => Err(BitmapError::UnsupportedFormat(other)),
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self.target {
            Target::Pcx => ImageFormat::Pcx,
            Target::Tga { .. } => ImageFormat::Tga,
            Target::Raw => ImageFormat::Raw,
        }
    }

    pub fn encode(self, bitmap: &Bitmap, stop: impl Stop) -> Result<Vec<u8>, BitmapError> {
        log::debug!(
            "encoding {}x{} {:?} as {:?}",
            bitmap.width(),
            bitmap.height(),
            bitmap.layout(),
            self.target
        );
        match self.target {
            Target::Pcx => pcx::encode(bitmap, &stop),
            Target::Tga { rle } => tga::encode(bitmap, rle, &stop),
            Target::Raw => raw::encode(bitmap, &stop),
        }
    }
}

/// PCX and TGA store 8-bit 2D images only.
pub(crate) fn require_plain_u8(bitmap: &Bitmap) -> Result<(), BitmapError> {
    if bitmap.sample() != SampleType::U8 {
        return Err(BitmapError::UnsupportedVariant(alloc::format!(
            "{:?} samples need an 8-bit bitmap",
            bitmap.sample()
        )));
    }
    if bitmap.depth() != 1 {
        return Err(BitmapError::UnsupportedVariant(alloc::format!(
            "volume of depth {} cannot be stored as a 2D image",
            bitmap.depth()
        )));
    }
    Ok(())
}

/// Rows of a 2D bitmap, top first for `UpperLeft`, bottom first for `LowerLeft`.
pub(crate) fn rows_in_order(bitmap: &Bitmap, order: Origin) -> Vec<&[u8]> {
    let rows = bitmap.pixels().chunks_exact(bitmap.row_bytes());
    if bitmap.origin == order {
        rows.collect()
    } else {
        rows.rev().collect()
    }
}
