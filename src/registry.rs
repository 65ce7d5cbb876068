//! Filename-driven loading with caller-supplied override handlers.
//!
//! Resolution order for a named input: a handler registered for the
//! extension, then the built-in extension table, then content sniffing.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use enough::Stop;

use crate::decode::{DecodeOutput, DecodeRequest, Permissiveness};
use crate::error::BitmapError;
use crate::format::{self, ImageFormat};
use crate::limits::Limits;

/// A caller-supplied decoder for one extension.
pub type DecodeHandler =
    Box<dyn Fn(&[u8], &dyn Stop) -> Result<DecodeOutput, BitmapError> + Send + Sync>;

/// Decode configuration plus override handlers keyed by extension.
#[derive(Default)]
pub struct Registry {
    handlers: Vec<(String, DecodeHandler)>,
    limits: Option<Limits>,
    permissiveness: Permissiveness,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.handlers.iter().map(|(e, _)| e).collect::<Vec<_>>())
            .field("limits", &self.limits)
            .field("permissiveness", &self.permissiveness)
            .finish()
    }
}

fn extension_of(name: &str) -> Option<&str> {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = file.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_permissiveness(mut self, permissiveness: Permissiveness) -> Self {
        self.permissiveness = permissiveness;
        self
    }

    /// Route `ext` (case-insensitive, no dot) to `handler`, replacing any
    /// earlier registration for it.
    pub fn register<F>(&mut self, ext: &str, handler: F)
    where
        F: Fn(&[u8], &dyn Stop) -> Result<DecodeOutput, BitmapError> + Send + Sync + 'static,
    {
        self.unregister(ext);
        self.handlers.push((ext.to_ascii_lowercase(), Box::new(handler)));
    }

    /// Remove the handler for `ext`. Returns whether one was registered.
    pub fn unregister(&mut self, ext: &str) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(e, _)| !e.eq_ignore_ascii_case(ext));
        self.handlers.len() != before
    }

    fn handler(&self, ext: &str) -> Option<&DecodeHandler> {
        self.handlers
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, h)| h)
    }

    fn request<'a>(&'a self, data: &'a [u8]) -> DecodeRequest<'a> {
        let request = DecodeRequest::new(data).with_permissiveness(self.permissiveness);
        match &self.limits {
            Some(limits) => request.with_limits(limits),
            None => request,
        }
    }

    /// Decode `data`, identifying it by sniffing. A registered handler for
    /// the sniffed format's extension takes precedence over the built-in
    /// decoder.
    pub fn decode(&self, data: &[u8], stop: impl Stop) -> Result<DecodeOutput, BitmapError> {
        self.sniff_and_decode(data, &stop)
    }

    fn sniff_and_decode(&self, data: &[u8], stop: &dyn Stop) -> Result<DecodeOutput, BitmapError> {
        let format = format::identify(data).ok_or(BitmapError::UnrecognizedFormat)?;
        self.decode_format(format, data, stop)
    }

    fn decode_format(
        &self,
        format: ImageFormat,
        data: &[u8],
        stop: &dyn Stop,
    ) -> Result<DecodeOutput, BitmapError> {
        if let Some(handler) = self.handler(format.extension()) {
            return handler(data, stop);
        }
        self.request(data).with_format(format).decode_dyn(stop)
    }

    /// Decode `data` that was read from a file called `name`.
    pub fn decode_named(
        &self,
        name: &str,
        data: &[u8],
        stop: impl Stop,
    ) -> Result<DecodeOutput, BitmapError> {
        let ext = extension_of(name);
        if let Some(handler) = ext.and_then(|e| self.handler(e)) {
            log::debug!("{name}: using registered handler");
            return handler(data, &stop);
        }
        match ext.and_then(ImageFormat::from_extension) {
            Some(format) => self.request(data).with_format(format).decode_dyn(&stop),
            None => {
                log::debug!("{name}: unknown extension, sniffing content");
                self.sniff_and_decode(data, &stop)
            }
        }
    }

    /// Read and decode the file at `path`.
    #[cfg(feature = "std")]
    pub fn load_file(
        &self,
        path: impl AsRef<std::path::Path>,
        stop: impl Stop,
    ) -> Result<DecodeOutput, BitmapError> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| BitmapError::CouldNotOpen(alloc::format!("{}: {e}", path.display())))?;
        self.decode_named(&path.to_string_lossy(), &data, stop)
    }

    /// Encode `bitmap` in the format named by `path`'s extension and write it.
    #[cfg(feature = "std")]
    pub fn save_file(
        &self,
        path: impl AsRef<std::path::Path>,
        bitmap: &crate::Bitmap,
        stop: impl Stop,
    ) -> Result<(), BitmapError> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let format = ImageFormat::for_encoding(ext)?;
        let bytes = crate::EncodeRequest::for_format(format)?.encode(bitmap, stop)?;
        std::fs::write(path, bytes)
            .map_err(|e| BitmapError::CouldNotOpen(alloc::format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::pixel::{Origin, PixelLayout, SampleType};
    use alloc::vec;
    use enough::Unstoppable;

    fn one_pixel() -> DecodeOutput {
        let bitmap = Bitmap::from_pixels(
            1,
            1,
            PixelLayout::Gray,
            SampleType::U8,
            Origin::UpperLeft,
            vec![42],
            None,
        )
        .unwrap();
        DecodeOutput::single(ImageFormat::Png, bitmap)
    }

    #[test]
    fn extension_parsing() {
        assert_eq!(extension_of("dir.d/icon.TGA"), Some("TGA"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".hidden"), None);
    }

    #[test]
    fn override_handler_wins() {
        let mut registry = Registry::new();
        registry.register("PNG", |_, _| Ok(one_pixel()));
        let out = registry.decode_named("a.png", b"anything", Unstoppable).unwrap();
        assert_eq!(out.pixels(), &[42]);
        assert!(registry.unregister("png"));
        assert!(!registry.unregister("png"));
    }

    #[test]
    fn png_without_handler_is_unsupported() {
        let registry = Registry::new();
        let err = registry
            .decode_named("a.png", b"\x89PNG\r\n\x1a\n", Unstoppable)
            .unwrap_err();
        assert!(matches!(err, BitmapError::UnsupportedFormat(ImageFormat::Png)));
    }

    #[test]
    fn sniffed_format_uses_handler() {
        let mut registry = Registry::new();
        registry.register("png", |_, _| Ok(one_pixel()));
        let out = registry.decode(b"\x89PNG\r\n\x1a\n....", Unstoppable).unwrap();
        assert_eq!(out.width(), 1);
    }

    #[test]
    fn unknown_extension_falls_back_to_sniffing() {
        let registry = Registry::new();
        let err = registry.decode_named("a.xyz", b"nothing here", Unstoppable).unwrap_err();
        assert!(matches!(err, BitmapError::UnrecognizedFormat));
    }
}
