use nom::{number, sequence::tuple, IResult};

use crate::error::Error;
use crate::info::{ColorMode, Format, ImageInfo, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;
use crate::tiff;

const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOS: u8 = 0xDA;
const MARKER_APP1: u8 = 0xE1;
const MARKER_TEM: u8 = 0x01;

const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Start-of-frame markers carrying the image dimensions. C4 (DHT), C8 (JPG)
/// and CC (DAC) look similar but are not frame headers.
fn is_sof(code: u8) -> bool {
    matches!(code, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

fn sof_fields(input: &[u8]) -> IResult<&[u8], (u16, u16, u8)> {
    let (remain, (_precision, height, width, components)) = tuple((
        number::complete::u8,
        number::complete::be_u16,
        number::complete::be_u16,
        number::complete::u8,
    ))(input)?;
    Ok((remain, (height, width, components)))
}

/// JPEG: walks the segment chain up to SOS, taking dimensions and the color
/// mode from the first frame header and the orientation from an APP1 Exif
/// segment. Registered with the reserved priority 0.
pub struct JpegParser;

impl FormatParser for JpegParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["jpg", "jpeg", "jpe"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let soi = io.read_array::<2>()?;
        if soi != [0xFF, MARKER_SOI] {
            return Err(Error::FormatMismatch("SOI marker not found"));
        }

        let mut frame: Option<(u32, u32, ColorMode)> = None;
        let mut orientation = None;

        loop {
            if io.read_u8()? != 0xFF {
                return Err(Error::FormatMismatch("marker prefix expected"));
            }
            let mut code = io.read_u8()?;
            // 0xFF bytes may pad between segments.
            while code == 0xFF {
                code = io.read_u8()?;
            }
            tracing::debug!(code, "jpeg segment");

            match code {
                MARKER_SOS | MARKER_EOI => break,
                MARKER_TEM | 0xD0..=0xD7 => continue, // no payload
                _ => {}
            }

            let length = io.read_u16_be()?;
            if length < 2 {
                return Err(Error::FormatMismatch("invalid segment length"));
            }
            let payload_len = u64::from(length) - 2;

            if is_sof(code) {
                if payload_len < 6 {
                    return Err(Error::FormatMismatch("truncated frame header"));
                }
                let body = io.read_vec(6)?;
                let (_, (height, width, components)) = sof_fields(&body)?;
                if width == 0 || height == 0 {
                    return Err(Error::FormatMismatch("zero dimensions"));
                }
                let color_mode = match components {
                    1 => ColorMode::Grayscale,
                    3 => ColorMode::Rgb,
                    4 => ColorMode::Cmyk,
                    _ => return Err(Error::FormatMismatch("unsupported component count")),
                };
                frame = Some((u32::from(width), u32::from(height), color_mode));
                io.skip(payload_len - 6)?;
            } else if code == MARKER_APP1 {
                let body = io.read_vec(payload_len as usize)?;
                if body.len() >= EXIF_HEADER.len() && body[..6] == *EXIF_HEADER {
                    match tiff::summarize_tiff_buf(&body[6..]) {
                        Ok(summary) => orientation = orientation.or(summary.orientation),
                        Err(e) => tracing::debug!(err = %e, "unusable Exif payload"),
                    }
                }
            } else {
                io.skip(payload_len)?;
            }
        }

        let (width_px, height_px, color_mode) =
            frame.ok_or(Error::FormatMismatch("no frame header before SOS"))?;
        Ok(ParseResult::Image(ImageInfo {
            format: Format::Jpg,
            width_px,
            height_px,
            color_mode,
            has_transparency: false,
            has_multiple_frames: None,
            num_animation_or_video_frames: None,
            orientation,
            content_type: "image/jpeg",
        }))
    }
}
