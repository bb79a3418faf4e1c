//! `mediaprobe` identifies the format of media files and extracts their
//! intrinsic metadata — dimensions, color mode, sample rate, duration,
//! orientation, frame counts — by reading headers only. Payloads are never
//! decoded.
//!
//! ## Supported sources
//!
//! - Local files, via [`parse_file_at`]
//! - HTTP(S) resources, via [`parse_http`] — fetched with ranged `GET`s so
//!   only the bytes the parsers actually touch are transferred, bounded by
//!   per-parse request and byte caps
//!
//! ## Supported formats
//!
//! - Image: jpg, png (including APNG), gif, tif, bmp, psd
//! - Audio: ogg (Vorbis), mp3, wav, flac, aiff
//! - Document: zip (and the docx/xlsx/pptx packages built on it), pdf
//!
//! ## Example
//!
//! ```no_run
//! use mediaprobe::{parse_file_at, ParseOptions};
//!
//! fn main() -> mediaprobe::Result<()> {
//!     let results = parse_file_at("photo.jpg", &ParseOptions::new())?;
//!     if let Some(result) = results.first() {
//!         println!("{} ({})", result.format(), result.content_type());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Restricting the candidate parsers and collecting every match:
//!
//! ```no_run
//! use mediaprobe::{parse_http, Nature, ParseOptions, ResultsMode};
//!
//! fn main() -> mediaprobe::Result<()> {
//!     let options = ParseOptions::new()
//!         .results(ResultsMode::All)
//!         .natures(vec![Nature::Image, Nature::Audio]);
//!     let results = parse_http("https://example.com/track.ogg", &options)?;
//!     println!("{} parser(s) recognized the resource", results.len());
//!     Ok(())
//! }
//! ```
//!
//! ## How dispatch works
//!
//! Parsers register in a process-wide [`Registry`] keyed by nature, format,
//! and priority. A parse opens one byte source, filters the registry by the
//! requested natures/formats, tries filename-hinted candidates first, and
//! hands each candidate a fresh bounded view of the source. A parser that
//! does not recognize the input fails parser-locally and dispatch moves on;
//! infrastructure failures (HTTP errors, resource caps) abort the parse.

pub use error::Error;
pub use http::{HttpSource, DEFAULT_BYTE_CAP, DEFAULT_REQUEST_CAP};
pub use info::{
    AudioInfo, ColorMode, DocumentInfo, Format, ImageInfo, Nature, Orientation, ParseResult,
    VideoInfo,
};
pub use probe::{parse_file_at, parse_http, ParseOptions, ResultsMode};
pub use registry::{default_registry, Descriptor, FormatParser, Registry};
pub use scoped::ScopedSource;
pub use source::{ByteSource, FileSource};

pub type Result<T> = std::result::Result<T, Error>;

mod aiff;
mod bmp;
mod error;
mod flac;
mod gif;
mod http;
mod info;
mod jpeg;
mod mp3;
mod ogg;
mod pdf;
mod png;
mod probe;
mod psd;
mod registry;
mod scoped;
mod source;
mod tiff;
mod wav;
mod zip;

pub use aiff::AiffParser;
pub use bmp::BmpParser;
pub use flac::FlacParser;
pub use gif::GifParser;
pub use jpeg::JpegParser;
pub use mp3::Mp3Parser;
pub use ogg::OggParser;
pub use pdf::PdfParser;
pub use png::PngParser;
pub use psd::PsdParser;
pub use tiff::TiffParser;
pub use wav::WavParser;
pub use zip::ZipParser;

#[cfg(test)]
mod testkit;
