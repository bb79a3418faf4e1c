use std::sync::LazyLock;

use crate::info::{Format, Nature, ParseResult};
use crate::scoped::ScopedSource;

/// A format-specific header decoder.
///
/// Implementations are long-lived values registered once at startup and
/// reused across parses, so they must be stateless (or internally
/// re-entrant). `parse` either returns a fully-populated result or fails with
/// a parser-local error kind; it must leave no trace in any shared state.
pub trait FormatParser: Send + Sync {
    /// Filename-based heuristic used to bias dispatch order. A `false` here
    /// never excludes the parser; it only demotes it to the later band.
    fn likely_match(&self, filename: &str) -> bool;

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult>;
}

/// A registered parser and its dispatch metadata.
pub struct Descriptor {
    pub parser: Box<dyn FormatParser>,
    pub natures: &'static [Nature],
    pub formats: &'static [Format],
    /// Lower values are tried earlier; ties keep registration order.
    /// Priority 0 is reserved for JPEG, the most common format in the wild.
    pub priority: i32,
}

/// The table of registered parsers.
///
/// Populated once by [`Registry::with_default_parsers`] (explicit listing,
/// no module-load side effects) and immutable afterwards, so the process-wide
/// instance is safely shared by concurrent parses.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Descriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        parser: Box<dyn FormatParser>,
        natures: &'static [Nature],
        formats: &'static [Format],
        priority: i32,
    ) {
        self.entries.push(Descriptor {
            parser,
            natures,
            formats,
            priority,
        });
    }

    /// Every parser this crate ships, in registration order.
    pub fn with_default_parsers() -> Self {
        use Format::*;
        use Nature::*;

        let mut registry = Self::new();
        registry.register(Box::new(crate::jpeg::JpegParser), &[Image], &[Jpg], 0);
        registry.register(Box::new(crate::png::PngParser), &[Image], &[Png], 1);
        registry.register(Box::new(crate::gif::GifParser), &[Image], &[Gif], 2);
        registry.register(Box::new(crate::tiff::TiffParser), &[Image], &[Tif], 3);
        registry.register(Box::new(crate::bmp::BmpParser), &[Image], &[Bmp], 4);
        registry.register(Box::new(crate::psd::PsdParser), &[Image], &[Psd], 5);
        registry.register(Box::new(crate::ogg::OggParser), &[Audio], &[Ogg], 6);
        registry.register(Box::new(crate::mp3::Mp3Parser), &[Audio], &[Mp3], 7);
        registry.register(Box::new(crate::wav::WavParser), &[Audio], &[Wav], 8);
        registry.register(Box::new(crate::flac::FlacParser), &[Audio], &[Flac], 9);
        registry.register(Box::new(crate::aiff::AiffParser), &[Audio], &[Aiff], 10);
        registry.register(
            Box::new(crate::zip::ZipParser),
            &[Document],
            &[Zip, Docx, Xlsx, Pptx],
            11,
        );
        registry.register(Box::new(crate::pdf::PdfParser), &[Document], &[Pdf], 12);
        registry
    }

    pub fn entries(&self) -> &[Descriptor] {
        &self.entries
    }

    /// Candidates surviving the nature/format filters, ordered by priority
    /// with registration order breaking ties.
    pub(crate) fn candidates(
        &self,
        natures: Option<&[Nature]>,
        formats: Option<&[Format]>,
    ) -> Vec<&Descriptor> {
        let mut out: Vec<&Descriptor> = self
            .entries
            .iter()
            .filter(|d| {
                natures.map_or(true, |wanted| d.natures.iter().any(|n| wanted.contains(n)))
            })
            .filter(|d| {
                formats.map_or(true, |wanted| d.formats.iter().any(|f| wanted.contains(f)))
            })
            .collect();
        out.sort_by_key(|d| d.priority);
        out
    }
}

/// The process-wide registry used by [`crate::parse_file_at`] and
/// [`crate::parse_http`].
pub fn default_registry() -> &'static Registry {
    static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::with_default_parsers);
    &REGISTRY
}

/// Case-insensitive check of the part after the last `.` in `filename`.
pub(crate) fn matches_extension(filename: &str, extensions: &[&str]) -> bool {
    let Some((_, ext)) = filename.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    extensions.iter().any(|e| *e == ext)
}
