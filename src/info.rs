use std::fmt::{self, Display};
use std::str::FromStr;

use serde::Serialize;

/// The high-level media kind a parser produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Nature {
    Image,
    Audio,
    Document,
    Video,
}

impl Display for Nature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Nature::Image => "image",
            Nature::Audio => "audio",
            Nature::Document => "document",
            Nature::Video => "video",
        };
        s.fmt(f)
    }
}

impl FromStr for Nature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Nature::Image),
            "audio" => Ok(Nature::Audio),
            "document" => Ok(Nature::Document),
            "video" => Ok(Nature::Video),
            other => Err(format!("unknown nature: {other}")),
        }
    }
}

/// A short symbolic tag for a file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Jpg,
    Png,
    Gif,
    Tif,
    Bmp,
    Psd,
    Ogg,
    Mp3,
    Wav,
    Flac,
    Aiff,
    Zip,
    Docx,
    Xlsx,
    Pptx,
    Pdf,
}

impl Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Format::Jpg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::Tif => "tif",
            Format::Bmp => "bmp",
            Format::Psd => "psd",
            Format::Ogg => "ogg",
            Format::Mp3 => "mp3",
            Format::Wav => "wav",
            Format::Flac => "flac",
            Format::Aiff => "aiff",
            Format::Zip => "zip",
            Format::Docx => "docx",
            Format::Xlsx => "xlsx",
            Format::Pptx => "pptx",
            Format::Pdf => "pdf",
        };
        s.fmt(f)
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Format::Jpg),
            "png" => Ok(Format::Png),
            "gif" => Ok(Format::Gif),
            "tif" | "tiff" => Ok(Format::Tif),
            "bmp" => Ok(Format::Bmp),
            "psd" => Ok(Format::Psd),
            "ogg" => Ok(Format::Ogg),
            "mp3" => Ok(Format::Mp3),
            "wav" => Ok(Format::Wav),
            "flac" => Ok(Format::Flac),
            "aiff" | "aif" => Ok(Format::Aiff),
            "zip" => Ok(Format::Zip),
            "docx" => Ok(Format::Docx),
            "xlsx" => Ok(Format::Xlsx),
            "pptx" => Ok(Format::Pptx),
            "pdf" => Ok(Format::Pdf),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Grayscale,
    Rgb,
    Rgba,
    Indexed,
    Cmyk,
}

/// EXIF orientation, named after where the 0th row and 0th column end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
    LeftTop,
    RightTop,
    RightBottom,
    LeftBottom,
}

impl Orientation {
    /// Map an EXIF orientation tag value (1..=8).
    pub(crate) fn from_exif(value: u16) -> Option<Self> {
        Some(match value {
            1 => Orientation::TopLeft,
            2 => Orientation::TopRight,
            3 => Orientation::BottomRight,
            4 => Orientation::BottomLeft,
            5 => Orientation::LeftTop,
            6 => Orientation::RightTop,
            7 => Orientation::RightBottom,
            8 => Orientation::LeftBottom,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub format: Format,
    pub width_px: u32,
    pub height_px: u32,
    pub color_mode: ColorMode,
    pub has_transparency: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_multiple_frames: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_animation_or_video_frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioInfo {
    pub format: Format,
    pub audio_sample_rate_hz: u32,
    pub num_audio_channels: u32,
    /// Absent when the source does not carry enough information, or when the
    /// computed value would not be a strictly positive finite number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_duration_seconds: Option<f64>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub format: Format,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub format: Format,
    pub width_px: u32,
    pub height_px: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_duration_seconds: Option<f64>,
    pub content_type: &'static str,
}

/// A fully-populated identification result. The nature is implied by the
/// variant and serialized alongside the fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "nature", rename_all = "lowercase")]
pub enum ParseResult {
    Image(ImageInfo),
    Audio(AudioInfo),
    Document(DocumentInfo),
    Video(VideoInfo),
}

impl ParseResult {
    pub fn nature(&self) -> Nature {
        match self {
            ParseResult::Image(_) => Nature::Image,
            ParseResult::Audio(_) => Nature::Audio,
            ParseResult::Document(_) => Nature::Document,
            ParseResult::Video(_) => Nature::Video,
        }
    }

    pub fn format(&self) -> Format {
        match self {
            ParseResult::Image(i) => i.format,
            ParseResult::Audio(a) => a.format,
            ParseResult::Document(d) => d.format,
            ParseResult::Video(v) => v.format,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ParseResult::Image(i) => i.content_type,
            ParseResult::Audio(a) => a.content_type,
            ParseResult::Document(d) => d.content_type,
            ParseResult::Video(v) => v.content_type,
        }
    }
}
