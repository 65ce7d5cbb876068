use alloc::string::String;
use alloc::vec::Vec;

use super::interlaced_rows;
use crate::bitmap::{Bitmap, Palette};
use crate::decode::{DecodeContext, DecodeOutput, Metadata};
use crate::error::BitmapError;
use crate::format::ImageFormat;
use crate::limits::try_alloc_zeroed;
use crate::lzw::{LzwDecoder, SubBlocks};
use crate::pixel::{Origin, PaletteFormat, PixelLayout};
use crate::source::Reader;

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_SEPARATOR: u8 = 0x2C;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const COMMENT_LABEL: u8 = 0xFE;
const APPLICATION_LABEL: u8 = 0xFF;

// ── Block structures ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Disposal {
    #[default]
    Unspecified,
    Keep,
    Background,
    Previous,
}

impl Disposal {
    fn from_packed(packed: u8) -> Self {
        match (packed >> 2) & 0x07 {
            1 => Self::Keep,
            2 => Self::Background,
            3 => Self::Previous,
            _ => Self::Unspecified,
        }
    }
}

/// Graphic Control Extension, consumed by the next image descriptor.
#[derive(Clone, Copy, Debug, Default)]
struct GraphicControl {
    disposal: Disposal,
    /// Hundredths of a second.
    delay: u16,
    transparent: Option<u8>,
}

struct ImageDescriptor {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    local_entries: Option<usize>,
    interlaced: bool,
}

impl ImageDescriptor {
    fn read(src: &mut Reader<'_>) -> Result<Self, BitmapError> {
        let left = src.read_u16_le()?;
        let top = src.read_u16_le()?;
        let width = src.read_u16_le()?;
        let height = src.read_u16_le()?;
        let packed = src.read_u8()?;
        Ok(Self {
            left,
            top,
            width,
            height,
            local_entries: (packed & 0x80 != 0).then(|| 2usize << (packed & 0x07)),
            interlaced: packed & 0x40 != 0,
        })
    }
}

fn read_color_table(src: &mut Reader<'_>, entries: usize) -> Result<Palette, BitmapError> {
    Palette::new(PaletteFormat::Rgb24, src.take(entries * 3)?.to_vec())
}

/// Concatenate a sub-block sequence through its zero-length terminator.
fn read_sub_blocks(src: &mut Reader<'_>) -> Result<Vec<u8>, BitmapError> {
    let mut data = Vec::new();
    loop {
        let len = usize::from(src.read_u8()?);
        if len == 0 {
            return Ok(data);
        }
        data.extend_from_slice(src.take(len)?);
    }
}

// ── Decoder ─────────────────────────────────────────────────────────

pub(super) struct GifDecoder<'r, 'a, 'c> {
    src: &'r mut Reader<'a>,
    cx: &'c DecodeContext<'c>,
    canvas: Option<(u32, u32)>,
    background: u8,
    global: Option<Palette>,
    control: Option<GraphicControl>,
    frames: Vec<Bitmap>,
    metadata: Metadata,
    loop_count: Option<u16>,
}

impl<'r, 'a, 'c> GifDecoder<'r, 'a, 'c> {
    /// Read the signature, logical screen descriptor and global colour table.
    pub(super) fn new(
        src: &'r mut Reader<'a>,
        cx: &'c DecodeContext<'c>,
    ) -> Result<Self, BitmapError> {
        let sig = src.take(6)?;
        if !sig.eq_ignore_ascii_case(b"GIF87a") && !sig.eq_ignore_ascii_case(b"GIF89a") {
            return Err(BitmapError::InvalidHeader("missing GIF signature".into()));
        }
        let width = src.read_u16_le()?;
        let height = src.read_u16_le()?;
        let packed = src.read_u8()?;
        let background = src.read_u8()?;
        let _aspect = src.read_u8()?;
        let global = if packed & 0x80 != 0 {
            Some(read_color_table(src, 2usize << (packed & 0x07))?)
        } else {
            None
        };
        let canvas = (width != 0 && height != 0).then_some((u32::from(width), u32::from(height)));
        Ok(Self {
            src,
            cx,
            canvas,
            background,
            global,
            control: None,
            frames: Vec::new(),
            metadata: Metadata::default(),
            loop_count: None,
        })
    }

    pub(super) fn run(mut self) -> Result<DecodeOutput, BitmapError> {
        loop {
            self.cx.stop.check()?;
            match self.next_block() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e @ (BitmapError::Cancelled(_) | BitmapError::LimitExceeded(_))) => {
                    return Err(e);
                }
                Err(e) if self.frames.is_empty() || self.cx.strict() => return Err(e),
                Err(e) => {
                    log::warn!(
                        "GIF: stopping after {} frame(s), next frame failed: {e}",
                        self.frames.len()
                    );
                    break;
                }
            }
        }
        let mut out = DecodeOutput::from_frames(ImageFormat::Gif, self.frames)?;
        out.metadata = self.metadata;
        out.loop_count = self.loop_count;
        Ok(out)
    }

    /// Handle one top-level block. `Ok(false)` ends the stream.
    fn next_block(&mut self) -> Result<bool, BitmapError> {
        let Ok(introducer) = self.src.read_u8() else {
            log::debug!("GIF: stream ends without trailer");
            return Ok(false);
        };
        match introducer {
            EXTENSION_INTRODUCER => {
                self.read_extension()?;
                Ok(true)
            }
            IMAGE_SEPARATOR => {
                self.cx.check_frames(self.frames.len() + 1)?;
                let frame = self.read_frame()?;
                self.frames.push(frame);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn read_extension(&mut self) -> Result<(), BitmapError> {
        let label = self.src.read_u8()?;
        let data = read_sub_blocks(self.src)?;
        match label {
            GRAPHIC_CONTROL_LABEL if data.len() >= 4 => {
                self.control = Some(GraphicControl {
                    disposal: Disposal::from_packed(data[0]),
                    delay: u16::from_le_bytes([data[1], data[2]]),
                    transparent: (data[0] & 0x01 != 0).then_some(data[3]),
                });
            }
            GRAPHIC_CONTROL_LABEL => {
                log::warn!("GIF: ignoring {}-byte graphic control extension", data.len());
            }
            COMMENT_LABEL => {
                let text = String::from_utf8_lossy(&data).into_owned();
                match &mut self.metadata.comment {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(&text);
                    }
                    None => self.metadata.comment = Some(text),
                }
            }
            APPLICATION_LABEL
                if data.len() >= 14
                    && (&data[..11] == b"NETSCAPE2.0" || &data[..11] == b"ANIMEXTS1.0")
                    && data[11] == 1 =>
            {
                self.loop_count = Some(u16::from_le_bytes([data[12], data[13]]));
            }
            other => log::debug!("GIF: skipping extension 0x{other:02X} ({} bytes)", data.len()),
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Bitmap, BitmapError> {
        let desc = ImageDescriptor::read(self.src)?;
        let control = self.control.take().unwrap_or_default();

        let palette = match desc.local_entries {
            Some(entries) => read_color_table(self.src, entries)?,
            None => match &self.global {
                Some(global) => global.clone(),
                None => {
                    log::warn!("GIF: image has no colour table, using a grey ramp");
                    Palette::gray_ramp(Palette::MAX_ENTRIES)
                }
            },
        };

        let (canvas_w, canvas_h) = *self.canvas.get_or_insert((
            (u32::from(desc.left) + u32::from(desc.width)).max(1),
            (u32::from(desc.top) + u32::from(desc.height)).max(1),
        ));
        let mut frame =
            self.cx.bitmap(canvas_w, canvas_h, PixelLayout::Indexed, Origin::UpperLeft)?;

        // Baseline: this frame's own disposal method decides what sits under it.
        match self.frames.last() {
            Some(prev) if control.disposal != Disposal::Background => {
                frame.pixels_mut().copy_from_slice(prev.pixels());
            }
            _ => frame
                .pixels_mut()
                .fill(control.transparent.unwrap_or(self.background)),
        }

        let (w, h) = (usize::from(desc.width), usize::from(desc.height));
        let mut indices = try_alloc_zeroed(w * h)?;
        let root = self.src.read_u8()?;
        let mut lzw = LzwDecoder::new(root)?;
        let mut blocks = SubBlocks::new(self.src);
        let outcome = lzw.decode(&mut blocks, &mut indices)?;
        blocks.finish()?;

        let decoded = outcome.written.min(indices.len());
        if decoded < indices.len() {
            if self.cx.strict() {
                return Err(BitmapError::UnexpectedEof);
            }
            log::warn!(
                "GIF: image data ends after {decoded} of {} pixels",
                indices.len()
            );
        }

        self.compose(&mut frame, &desc, &indices[..decoded], control.transparent)?;

        let palette = match control.transparent {
            Some(index) => palette.with_transparent_index(index),
            None => palette,
        };
        frame.set_palette(palette)?;
        frame.offset_x = u32::from(desc.left);
        frame.offset_y = u32::from(desc.top);
        frame.duration_ms = u32::from(control.delay) * 10;
        Ok(frame)
    }

    /// Write decoded indices onto the canvas at the frame offset, clipping to
    /// the canvas and leaving transparent pixels untouched.
    fn compose(
        &self,
        frame: &mut Bitmap,
        desc: &ImageDescriptor,
        indices: &[u8],
        transparent: Option<u8>,
    ) -> Result<(), BitmapError> {
        let w = usize::from(desc.width);
        if w == 0 {
            return Ok(());
        }
        let canvas_w = frame.width() as usize;
        let canvas_h = frame.height() as usize;
        let (left, top) = (usize::from(desc.left), usize::from(desc.top));
        let rows: Vec<usize> = if desc.interlaced {
            interlaced_rows(usize::from(desc.height)).collect()
        } else {
            (0..usize::from(desc.height)).collect()
        };
        let pixels = frame.pixels_mut();
        for (stored, (y, row)) in rows.iter().zip(indices.chunks(w)).enumerate() {
            if stored % 16 == 0 {
                self.cx.stop.check()?;
            }
            let dy = top + y;
            if dy >= canvas_h {
                continue;
            }
            let line = &mut pixels[dy * canvas_w..(dy + 1) * canvas_w];
            for (x, &index) in row.iter().enumerate() {
                let dx = left + x;
                if dx >= canvas_w {
                    break;
                }
                if Some(index) != transparent {
                    line[dx] = index;
                }
            }
        }
        Ok(())
    }
}
