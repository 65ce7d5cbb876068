use alloc::string::String;
use enough::StopReason;

use crate::format::ImageFormat;
use crate::pixel::PixelLayout;

/// Errors from decoding, encoding and format dispatch.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BitmapError {
    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("invalid extension: {0:?}")]
    InvalidExtension(String),

    #[error("could not open source: {0}")]
    CouldNotOpen(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("illegal value: {0}")]
    IllegalValue(String),

    #[error("unsupported format variant: {0}")]
    UnsupportedVariant(String),

    #[error("{0:?} is recognized but has no native decoder")]
    UnsupportedFormat(ImageFormat),

    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("pixel layout mismatch: expected {expected:?}, got {actual:?}")]
    LayoutMismatch {
        expected: PixelLayout,
        actual: PixelLayout,
    },

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

/// Coarse error classes, one per failure category a caller can act on.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidExtension,
    CouldNotOpenSource,
    InvalidFileHeader,
    IllegalFileValue,
    FileReadError,
    IllegalOperation,
    FormatNotSupported,
    OutOfMemory,
    UnknownFormat,
    Cancelled,
}

impl BitmapError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnrecognizedFormat => ErrorKind::UnknownFormat,
            Self::InvalidExtension(_) => ErrorKind::InvalidExtension,
            Self::CouldNotOpen(_) => ErrorKind::CouldNotOpenSource,
            Self::InvalidHeader(_) => ErrorKind::InvalidFileHeader,
            Self::IllegalValue(_) => ErrorKind::IllegalFileValue,
            Self::UnexpectedEof => ErrorKind::FileReadError,
            Self::IllegalOperation(_)
            | Self::LayoutMismatch { .. }
            | Self::BufferTooSmall { .. } => ErrorKind::IllegalOperation,
            Self::UnsupportedVariant(_) | Self::UnsupportedFormat(_) => {
                ErrorKind::FormatNotSupported
            }
            Self::DimensionsTooLarge { .. } | Self::LimitExceeded(_) | Self::OutOfMemory(_) => {
                ErrorKind::OutOfMemory
            }
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}

impl From<StopReason> for BitmapError {
    fn from(r: StopReason) -> Self {
        BitmapError::Cancelled(r)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for BitmapError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => BitmapError::UnexpectedEof,
            _ => BitmapError::CouldNotOpen(alloc::format!("{e}")),
        }
    }
}
