use alloc::string::String;
use alloc::vec::Vec;

use enough::Stop;

use crate::bitmap::Bitmap;
use crate::error::BitmapError;
use crate::format::{self, ImageFormat};
use crate::limits::Limits;
use crate::pixel::{Origin, PixelLayout, SampleType};
use crate::source::Reader;

/// Controls how strictly decoders treat recoverable damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permissiveness {
    /// Any damage is a hard error: a broken later GIF frame fails the whole
    /// decode, a TGA shorter than its declared data is rejected.
    Strict,

    /// Default behavior. Keep whatever decoded cleanly: a GIF whose third
    /// frame is corrupt yields its first two frames.
    #[default]
    Standard,
}

/// Textual side data found while decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub comment: Option<String>,
    pub author: Option<String>,
    pub software: Option<String>,
}

/// Decoded image output: one or more sibling frames.
///
/// `frames` models the "next" chain (animation frames, icon sizes, textures
/// of one package); each frame's own [`Bitmap::mipmaps`] is its LOD chain.
/// There is always at least one frame.
#[derive(Clone, Debug)]
pub struct DecodeOutput {
    frames: Vec<Bitmap>,
    pub format: ImageFormat,
    pub metadata: Metadata,
    /// Animation repeat count from a NETSCAPE2.0 extension (0 = forever).
    pub loop_count: Option<u16>,
}

impl DecodeOutput {
    pub(crate) fn single(format: ImageFormat, frame: Bitmap) -> Self {
        Self {
            frames: alloc::vec![frame],
            format,
            metadata: Metadata::default(),
            loop_count: None,
        }
    }

    pub(crate) fn from_frames(
        format: ImageFormat,
        frames: Vec<Bitmap>,
    ) -> Result<Self, BitmapError> {
        if frames.is_empty() {
            return Err(BitmapError::IllegalValue(alloc::format!(
                "{format:?} stream contains no images"
            )));
        }
        Ok(Self {
            frames,
            format,
            metadata: Metadata::default(),
            loop_count: None,
        })
    }

    /// All frames in stream order.
    pub fn frames(&self) -> &[Bitmap] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Bitmap> {
        self.frames
    }

    /// The first frame.
    pub fn first(&self) -> &Bitmap {
        &self.frames[0]
    }

    /// Take ownership of the first frame, dropping the rest.
    pub fn into_first(self) -> Bitmap {
        let mut frames = self.frames;
        frames.swap_remove(0)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn width(&self) -> u32 {
        self.first().width()
    }

    pub fn height(&self) -> u32 {
        self.first().height()
    }

    pub fn layout(&self) -> PixelLayout {
        self.first().layout()
    }

    /// Pixel data of the first frame.
    pub fn pixels(&self) -> &[u8] {
        self.first().pixels()
    }
}

/// Everything a format decoder needs besides the bytes.
#[derive(Clone, Copy)]
pub(crate) struct DecodeContext<'a> {
    pub limits: Option<&'a Limits>,
    pub stop: &'a dyn Stop,
    pub permissiveness: Permissiveness,
}

impl<'a> DecodeContext<'a> {
    pub(crate) fn new(stop: &'a dyn Stop) -> Self {
        Self {
            limits: None,
            stop,
            permissiveness: Permissiveness::Standard,
        }
    }

    pub(crate) fn check_frames(&self, frames: usize) -> Result<(), BitmapError> {
        match self.limits {
            Some(limits) => limits.check_frames(frames),
            None => Ok(()),
        }
    }

    pub(crate) fn check_dimensions(&self, width: u32, height: u32) -> Result<(), BitmapError> {
        match self.limits {
            Some(limits) => limits.check(width, height, 1),
            None => Ok(()),
        }
    }

    pub(crate) fn strict(&self) -> bool {
        self.permissiveness == Permissiveness::Strict
    }

    /// Allocate a zeroed 8-bit 2D bitmap under the caller's limits.
    pub(crate) fn bitmap(
        &self,
        width: u32,
        height: u32,
        layout: PixelLayout,
        origin: Origin,
    ) -> Result<Bitmap, BitmapError> {
        Bitmap::new(width, height, 1, layout, SampleType::U8, origin, self.limits)
    }
}

/// Builder for a decode call.
///
/// ```no_run
/// use zenretro::{DecodeRequest, Limits, Unstoppable};
///
/// let data: &[u8] = &[];
/// let limits = Limits { max_pixels: Some(1 << 24), ..Default::default() };
/// let decoded = DecodeRequest::new(data).with_limits(&limits).decode(Unstoppable)?;
/// println!("{:?} {}x{}", decoded.format, decoded.width(), decoded.height());
/// # Ok::<(), zenretro::BitmapError>(())
/// ```
#[derive(Clone, Debug)]
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    limits: Option<&'a Limits>,
    format: Option<ImageFormat>,
    permissiveness: Permissiveness,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            limits: None,
            format: None,
            permissiveness: Permissiveness::Standard,
        }
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Skip content sniffing and decode as `format`. Required for RAW.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_permissiveness(mut self, permissiveness: Permissiveness) -> Self {
        self.permissiveness = permissiveness;
        self
    }

    pub fn decode(self, stop: impl Stop) -> Result<DecodeOutput, BitmapError> {
        self.decode_dyn(&stop)
    }

    pub(crate) fn decode_dyn(self, stop: &dyn Stop) -> Result<DecodeOutput, BitmapError> {
        let cx = DecodeContext {
            limits: self.limits,
            stop,
            permissiveness: self.permissiveness,
        };
        let format = match self.format {
            Some(format) => format,
            None => format::identify(self.data).ok_or(BitmapError::UnrecognizedFormat)?,
        };
        let mut src = Reader::new(self.data);
        format::decode_as(format, &mut src, &cx)
    }
}

/// Read the rest of `reader` and decode it by content.
///
/// On failure the reader is put back where it started.
#[cfg(feature = "std")]
pub fn decode_reader<R>(mut reader: R, stop: impl Stop) -> Result<DecodeOutput, BitmapError>
where
    R: std::io::Read + std::io::Seek,
{
    let start = reader.stream_position()?;
    let mut data = Vec::new();
    let result = reader
        .read_to_end(&mut data)
        .map_err(BitmapError::from)
        .and_then(|_| DecodeRequest::new(&data).decode(stop));
    if result.is_err() {
        reader.seek(std::io::SeekFrom::Start(start))?;
    }
    result
}
