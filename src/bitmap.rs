//! The normalized decode target: [`Bitmap`] and its [`Palette`].

use alloc::vec;
use alloc::vec::Vec;

use crate::error::BitmapError;
use crate::limits::{Limits, try_alloc_zeroed};
use crate::pixel::{Origin, PaletteFormat, PixelLayout, SampleType};

/// A colour lookup table of at most 256 packed entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    format: PaletteFormat,
    data: Vec<u8>,
}

impl Palette {
    pub const MAX_ENTRIES: usize = 256;

    /// Wrap packed entries. The buffer must hold between 1 and 256 whole entries.
    pub fn new(format: PaletteFormat, data: Vec<u8>) -> Result<Self, BitmapError> {
        let entry = format.entry_size();
        if data.is_empty() || data.len() % entry != 0 {
            return Err(BitmapError::IllegalValue(alloc::format!(
                "palette of {} bytes is not a whole number of {entry}-byte entries",
                data.len()
            )));
        }
        if data.len() / entry > Self::MAX_ENTRIES {
            return Err(BitmapError::IllegalValue(alloc::format!(
                "palette has {} entries (max {})",
                data.len() / entry,
                Self::MAX_ENTRIES
            )));
        }
        Ok(Self { format, data })
    }

    /// Evenly spaced grey ramp with `levels` entries.
    pub fn gray_ramp(levels: usize) -> Self {
        let levels = levels.clamp(2, Self::MAX_ENTRIES);
        let mut data = Vec::with_capacity(levels * 3);
        for i in 0..levels {
            let v = (i * 255 / (levels - 1)) as u8;
            data.extend_from_slice(&[v, v, v]);
        }
        Self {
            format: PaletteFormat::Rgb24,
            data,
        }
    }

    pub fn format(&self) -> PaletteFormat {
        self.format
    }

    /// Packed entry bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len() / self.format.entry_size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entry `index` as RGBA (alpha 255 for formats without alpha).
    pub fn rgba(&self, index: usize) -> Option<[u8; 4]> {
        let size = self.format.entry_size();
        let e = self.data.get(index * size..(index + 1) * size)?;
        Some(match self.format {
            PaletteFormat::Rgb24 => [e[0], e[1], e[2], 255],
            PaletteFormat::Bgr24 => [e[2], e[1], e[0], 255],
            PaletteFormat::Rgba32 => [e[0], e[1], e[2], e[3]],
            PaletteFormat::Bgra32 => [e[2], e[1], e[0], e[3]],
        })
    }

    /// Convert to packed RGB, dropping any alpha.
    pub fn to_rgb24(&self) -> Palette {
        let mut data = Vec::with_capacity(self.len() * 3);
        for i in 0..self.len() {
            if let Some([r, g, b, _]) = self.rgba(i) {
                data.extend_from_slice(&[r, g, b]);
            }
        }
        Palette {
            format: PaletteFormat::Rgb24,
            data,
        }
    }

    /// Convert to packed RGBA.
    pub fn to_rgba32(&self) -> Palette {
        let mut data = Vec::with_capacity(self.len() * 4);
        for i in 0..self.len() {
            if let Some(c) = self.rgba(i) {
                data.extend_from_slice(&c);
            }
        }
        Palette {
            format: PaletteFormat::Rgba32,
            data,
        }
    }

    /// RGBA copy with alpha 0 at `index` and 255 everywhere else.
    ///
    /// Palettes shorter than `index + 1` are padded with opaque black so the
    /// transparent entry always exists.
    pub fn with_transparent_index(&self, index: u8) -> Palette {
        let entries = self.len().max(usize::from(index) + 1);
        let mut data = Vec::with_capacity(entries * 4);
        for i in 0..entries {
            let [r, g, b, _] = self.rgba(i).unwrap_or([0, 0, 0, 255]);
            let a = if i == usize::from(index) { 0 } else { 255 };
            data.extend_from_slice(&[r, g, b, a]);
        }
        Palette {
            format: PaletteFormat::Rgba32,
            data,
        }
    }
}

/// A decoded image: one frame, icon size, texture or mip level.
///
/// The pixel buffer always holds exactly
/// `width * height * depth * channels * sample_bytes` bytes and a palette is
/// present exactly when the layout is [`PixelLayout::Indexed`].
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    depth: u32,
    layout: PixelLayout,
    sample: SampleType,
    pixels: Vec<u8>,
    palette: Option<Palette>,
    mipmaps: Vec<Bitmap>,
    /// Scanline order of `pixels`.
    pub origin: Origin,
    /// Position of this frame's own image data within the canvas (GIF).
    pub offset_x: u32,
    pub offset_y: u32,
    /// Display time of an animation frame in milliseconds.
    pub duration_ms: u32,
}

impl Bitmap {
    /// Allocate a zero-filled bitmap after checking `limits`.
    ///
    /// Indexed bitmaps start with a 256-entry black palette that the decoder
    /// replaces once the real one is known.
    pub fn new(
        width: u32,
        height: u32,
        depth: u32,
        layout: PixelLayout,
        sample: SampleType,
        origin: Origin,
        limits: Option<&Limits>,
    ) -> Result<Self, BitmapError> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(BitmapError::IllegalValue(alloc::format!(
                "empty bitmap {width}x{height}x{depth}"
            )));
        }
        if let Some(limits) = limits {
            limits.check(width, height, depth)?;
        }
        let len = buffer_len(width, height, depth, layout, sample)?;
        if let Some(limits) = limits {
            limits.check_memory(len)?;
        }
        let pixels = try_alloc_zeroed(len)?;
        let palette = (layout == PixelLayout::Indexed)
            .then(|| Palette {
                format: PaletteFormat::Rgb24,
                data: vec![0; Palette::MAX_ENTRIES * 3],
            });
        Ok(Self {
            width,
            height,
            depth,
            layout,
            sample,
            pixels,
            palette,
            mipmaps: Vec::new(),
            origin,
            offset_x: 0,
            offset_y: 0,
            duration_ms: 0,
        })
    }

    /// Wrap an existing 2D pixel buffer.
    pub fn from_pixels(
        width: u32,
        height: u32,
        layout: PixelLayout,
        sample: SampleType,
        origin: Origin,
        pixels: Vec<u8>,
        palette: Option<Palette>,
    ) -> Result<Self, BitmapError> {
        if width == 0 || height == 0 {
            return Err(BitmapError::IllegalValue(alloc::format!(
                "empty bitmap {width}x{height}"
            )));
        }
        let needed = buffer_len(width, height, 1, layout, sample)?;
        if pixels.len() != needed {
            return Err(BitmapError::BufferTooSmall {
                needed,
                actual: pixels.len(),
            });
        }
        check_palette_pairing(layout, palette.as_ref())?;
        Ok(Self {
            width,
            height,
            depth: 1,
            layout,
            sample,
            pixels,
            palette,
            mipmaps: Vec::new(),
            origin,
            offset_x: 0,
            offset_y: 0,
            duration_ms: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of slices for volumetric images, 1 otherwise.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn sample(&self) -> SampleType {
        self.sample
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.layout.channels() * self.sample.bytes()
    }

    /// Bytes in one scanline.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Replace the palette. Only indexed bitmaps carry one.
    pub fn set_palette(&mut self, palette: Palette) -> Result<(), BitmapError> {
        check_palette_pairing(self.layout, Some(&palette))?;
        self.palette = Some(palette);
        Ok(())
    }

    /// Lower-resolution versions of this image, largest first.
    pub fn mipmaps(&self) -> &[Bitmap] {
        &self.mipmaps
    }

    pub(crate) fn push_mipmap(&mut self, mip: Bitmap) {
        self.mipmaps.push(mip);
    }

    pub(crate) fn mipmaps_mut(&mut self) -> &mut [Bitmap] {
        &mut self.mipmaps
    }

    /// Bytes of row `y` (of slice 0).
    pub fn row(&self, y: u32) -> &[u8] {
        let rb = self.row_bytes();
        let start = y as usize * rb;
        &self.pixels[start..start + rb]
    }

    /// Reverse the scanline order in place and toggle `origin`.
    pub fn flip_vertical(&mut self) {
        let rb = self.row_bytes();
        let rows_per_slice = self.height as usize;
        for slice in self.pixels.chunks_exact_mut(rb * rows_per_slice) {
            let (mut top, mut bottom) = (0, rows_per_slice);
            while top + 1 < bottom {
                bottom -= 1;
                let (a, b) = slice.split_at_mut(bottom * rb);
                a[top * rb..(top + 1) * rb].swap_with_slice(&mut b[..rb]);
                top += 1;
            }
        }
        self.origin = match self.origin {
            Origin::UpperLeft => Origin::LowerLeft,
            Origin::LowerLeft => Origin::UpperLeft,
        };
    }

    /// Make the first stored scanline the visual top row.
    pub fn to_upper_left(&mut self) {
        if self.origin == Origin::LowerLeft {
            self.flip_vertical();
        }
    }

    /// Reverse each scanline's pixel order.
    pub fn flip_horizontal(&mut self) {
        let bpp = self.bytes_per_pixel();
        let rb = self.row_bytes();
        for row in self.pixels.chunks_exact_mut(rb) {
            let w = row.len() / bpp;
            for x in 0..w / 2 {
                let (a, b) = row.split_at_mut((w - 1 - x) * bpp);
                a[x * bpp..(x + 1) * bpp].swap_with_slice(&mut b[..bpp]);
            }
        }
    }

    /// Reinterpret pixel data as typed pixel slice.
    ///
    /// Returns [`BitmapError::LayoutMismatch`] if the pixel layout doesn't match `P`.
    #[cfg(feature = "rgb")]
    pub fn as_pixels<P: crate::DecodePixel>(&self) -> Result<&[P], BitmapError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        use rgb::AsPixels as _;
        if self.layout != P::layout() || self.sample != SampleType::U8 {
            return Err(BitmapError::LayoutMismatch {
                expected: P::layout(),
                actual: self.layout,
            });
        }
        Ok(self.pixels.as_pixels())
    }

    /// Zero-copy view as an [`imgref::ImgRef`] of typed pixels.
    #[cfg(feature = "imgref")]
    pub fn as_imgref<P: crate::DecodePixel>(&self) -> Result<imgref::ImgRef<'_, P>, BitmapError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        let pixels: &[P] = self.as_pixels()?;
        Ok(imgref::ImgRef::new(
            &pixels[..self.width as usize * self.height as usize],
            self.width as usize,
            self.height as usize,
        ))
    }
}

fn buffer_len(
    width: u32,
    height: u32,
    depth: u32,
    layout: PixelLayout,
    sample: SampleType,
) -> Result<usize, BitmapError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(depth as usize))
        .and_then(|n| n.checked_mul(layout.channels()))
        .and_then(|n| n.checked_mul(sample.bytes()))
        .ok_or(BitmapError::DimensionsTooLarge { width, height })
}

fn check_palette_pairing(
    layout: PixelLayout,
    palette: Option<&Palette>,
) -> Result<(), BitmapError> {
    match (layout == PixelLayout::Indexed, palette.is_some()) {
        (true, false) => Err(BitmapError::IllegalOperation(
            "indexed bitmap requires a palette".into(),
        )),
        (false, true) => Err(BitmapError::IllegalOperation(alloc::format!(
            "{layout:?} bitmap cannot carry a palette"
        ))),
        _ => Ok(()),
    }
}
