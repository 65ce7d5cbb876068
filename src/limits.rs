use alloc::vec::Vec;

use crate::error::BitmapError;

/// Resource limits for decode/encode operations.
///
/// All fields default to `None` (no limit). Structural caps that protect
/// against corrupt headers (256 palette entries, 4096 LZW codes) apply
/// regardless of these settings.
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    /// Maximum pixel count (width * height * depth).
    pub max_pixels: Option<u64>,
    /// Maximum memory bytes for a single pixel buffer allocation.
    pub max_memory_bytes: Option<u64>,
    /// Maximum number of frames (animation frames, icon sizes, textures).
    pub max_frames: Option<u64>,
}

impl Limits {
    /// Check dimensions against limits. Returns Ok(()) or LimitExceeded error.
    pub(crate) fn check(&self, width: u32, height: u32, depth: u32) -> Result<(), BitmapError> {
        if let Some(max_w) = self.max_width {
            if u64::from(width) > max_w {
                return Err(BitmapError::LimitExceeded(alloc::format!(
                    "width {width} exceeds limit {max_w}"
                )));
            }
        }
        if let Some(max_h) = self.max_height {
            if u64::from(height) > max_h {
                return Err(BitmapError::LimitExceeded(alloc::format!(
                    "height {height} exceeds limit {max_h}"
                )));
            }
        }
        if let Some(max_px) = self.max_pixels {
            let pixels = (u64::from(width) * u64::from(height))
                .saturating_mul(u64::from(depth.max(1)));
            if pixels > max_px {
                return Err(BitmapError::LimitExceeded(alloc::format!(
                    "pixel count {pixels} exceeds limit {max_px}"
                )));
            }
        }
        Ok(())
    }

    /// Check that an allocation size is within memory limits.
    pub(crate) fn check_memory(&self, bytes: usize) -> Result<(), BitmapError> {
        if let Some(max_mem) = self.max_memory_bytes {
            if bytes as u64 > max_mem {
                return Err(BitmapError::LimitExceeded(alloc::format!(
                    "allocation {bytes} bytes exceeds memory limit {max_mem}"
                )));
            }
        }
        Ok(())
    }

    /// Check a frame count about to be reached.
    pub(crate) fn check_frames(&self, frames: usize) -> Result<(), BitmapError> {
        if let Some(max_frames) = self.max_frames {
            if frames as u64 > max_frames {
                return Err(BitmapError::LimitExceeded(alloc::format!(
                    "frame count {frames} exceeds limit {max_frames}"
                )));
            }
        }
        Ok(())
    }
}

/// Allocate a zeroed buffer, reporting allocator failure instead of aborting.
pub(crate) fn try_alloc_zeroed(len: usize) -> Result<Vec<u8>, BitmapError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| BitmapError::OutOfMemory(len))?;
    buf.resize(len, 0);
    Ok(buf)
}
