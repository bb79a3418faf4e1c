use nom::{bytes::complete::tag, number, sequence::tuple, IResult};

use crate::error::Error;
use crate::info::{ColorMode, Format, ImageInfo, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// PNG identification: signature, IHDR, and APNG detection via an `acTL`
/// chunk immediately after IHDR. Registered with priority 1.
pub struct PngParser;

fn ihdr_chunk(input: &[u8]) -> IResult<&[u8], (u32, u32, u32, u8)> {
    let (remain, (length, _, width, height, _depth, color_type, _compression, _filter, _interlace)) =
        tuple((
            number::complete::be_u32,
            tag("IHDR"),
            number::complete::be_u32,
            number::complete::be_u32,
            number::complete::u8,
            number::complete::u8,
            number::complete::u8,
            number::complete::u8,
            number::complete::u8,
        ))(input)?;
    Ok((remain, (length, width, height, color_type)))
}

fn actl_payload(input: &[u8]) -> IResult<&[u8], (u32, u32, u32, u32)> {
    tuple((
        number::complete::be_u32,
        number::complete::be_u32,
        number::complete::be_u32,
        number::complete::be_u32,
    ))(input)
}

/// Frame count from an `acTL` chunk directly following IHDR, if any.
fn animation_frames(io: &mut ScopedSource<'_>) -> crate::Result<Option<u32>> {
    io.skip(4)?; // IHDR CRC
    let header = io.read_vec(16)?;
    let (_, (length, chunk_type, num_frames, _loop_count)) = actl_payload(&header)?;
    if length == 8 && chunk_type == u32::from_be_bytes(*b"acTL") {
        Ok(Some(num_frames))
    } else {
        Ok(None)
    }
}

impl FormatParser for PngParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["png", "apng"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let signature = io.read_array::<8>()?;
        if signature != PNG_SIGNATURE {
            return Err(Error::FormatMismatch("png signature not found"));
        }

        let header = io.read_vec(8 + 13)?;
        let (_, (length, width, height, color_type)) = ihdr_chunk(&header)?;
        if length != 13 {
            return Err(Error::FormatMismatch("IHDR length must be 13"));
        }
        if width == 0 || height == 0 {
            return Err(Error::FormatMismatch("zero dimensions"));
        }
        let (color_mode, has_transparency) = match color_type {
            0 => (ColorMode::Grayscale, true),
            2 => (ColorMode::Rgb, false),
            3 => (ColorMode::Indexed, false),
            4 => (ColorMode::Grayscale, true),
            6 => (ColorMode::Rgba, true),
            _ => return Err(Error::FormatMismatch("unknown png color type")),
        };

        // A truncated file past IHDR still identifies as a PNG.
        let frames = animation_frames(io).ok().flatten();

        Ok(ParseResult::Image(ImageInfo {
            format: Format::Png,
            width_px: width,
            height_px: height,
            color_mode,
            has_transparency,
            has_multiple_frames: frames.map(|_| true),
            num_animation_or_video_frames: frames,
            orientation: None,
            content_type: "image/png",
        }))
    }
}
