use nom::{
    bytes::complete::{tag, take},
    number,
    sequence::{preceded, tuple},
    IResult,
};

use crate::error::Error;
use crate::info::{ColorMode, Format, ImageInfo, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

/// Photoshop document: everything we report sits in the fixed 26-byte
/// file header.
pub struct PsdParser;

#[allow(clippy::type_complexity)]
fn psd_header(input: &[u8]) -> IResult<&[u8], (u16, u16, u32, u32, u16)> {
    let (remain, (version, _reserved, channels, height, width, _depth, mode)) = preceded(
        tag("8BPS"),
        tuple((
            number::complete::be_u16,
            take(6usize),
            number::complete::be_u16,
            number::complete::be_u32,
            number::complete::be_u32,
            number::complete::be_u16,
            number::complete::be_u16,
        )),
    )(input)?;
    Ok((remain, (version, channels, height, width, mode)))
}

impl FormatParser for PsdParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["psd", "psb"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let head = io.read_vec(26)?;
        let (_, (version, channels, height, width, mode)) = psd_header(&head)?;
        if version != 1 {
            return Err(Error::FormatMismatch("unsupported psd version"));
        }
        if width == 0 || height == 0 {
            return Err(Error::FormatMismatch("zero dimensions"));
        }
        let color_mode = match mode {
            0 | 1 | 8 => ColorMode::Grayscale,
            2 => ColorMode::Indexed,
            3 => ColorMode::Rgb,
            4 => ColorMode::Cmyk,
            _ => return Err(Error::FormatMismatch("unsupported psd color mode")),
        };
        // RGB with a fourth channel carries an alpha plane.
        let has_alpha = color_mode == ColorMode::Rgb && channels >= 4;

        Ok(ParseResult::Image(ImageInfo {
            format: Format::Psd,
            width_px: width,
            height_px: height,
            color_mode: if has_alpha { ColorMode::Rgba } else { color_mode },
            has_transparency: has_alpha,
            has_multiple_frames: None,
            num_animation_or_video_frames: None,
            orientation: None,
            content_type: "image/vnd.adobe.photoshop",
        }))
    }
}
