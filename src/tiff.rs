use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::verify,
    number::{self, Endianness},
    sequence::tuple,
    IResult,
};

use crate::error::Error;
use crate::info::{ColorMode, Format, ImageInfo, Orientation, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

const TAG_IMAGE_WIDTH: u16 = 0x0100;
const TAG_IMAGE_LENGTH: u16 = 0x0101;
const TAG_PHOTOMETRIC: u16 = 0x0106;
const TAG_ORIENTATION: u16 = 0x0112;

/// What IFD0 tells us about an image. Shared between the TIFF parser and the
/// JPEG parser's Exif path.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct IfdSummary {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub photometric: Option<u16>,
    pub orientation: Option<Orientation>,
}

fn tiff_header(input: &[u8]) -> IResult<&[u8], (Endianness, u32)> {
    let (input, order) = alt((tag("II"), tag("MM")))(input)?;
    let endianness = if order == b"II" {
        Endianness::Little
    } else {
        Endianness::Big
    };
    let (input, _magic) = verify(number::complete::u16(endianness), |m| *m == 42)(input)?;
    let (input, ifd_offset) = number::complete::u32(endianness)(input)?;
    Ok((input, (endianness, ifd_offset)))
}

fn ifd_entry(endianness: Endianness, input: &[u8]) -> IResult<&[u8], (u16, u16, u32)> {
    tuple((
        number::complete::u16(endianness),
        number::complete::u16(endianness),
        number::complete::u32(endianness),
    ))(input)
}

/// Inline SHORT/LONG value of a single-count entry; anything else is skipped.
fn entry_value(endianness: Endianness, field_type: u16, raw: &[u8]) -> Option<u32> {
    let parsed: IResult<&[u8], u32> = match field_type {
        3 => number::complete::u16::<&[u8], nom::error::Error<&[u8]>>(endianness)(raw)
            .map(|(rest, v)| (rest, u32::from(v))),
        4 => number::complete::u32(endianness)(raw),
        _ => return None,
    };
    parsed.ok().map(|(_, v)| v)
}

fn summarize_entries(endianness: Endianness, entries: &[u8], count: usize) -> IfdSummary {
    let mut summary = IfdSummary::default();
    for chunk in entries.chunks_exact(12).take(count) {
        let Ok((raw_value, (tag_id, field_type, value_count))) = ifd_entry(endianness, chunk)
        else {
            continue;
        };
        if value_count != 1 {
            continue;
        }
        let Some(value) = entry_value(endianness, field_type, raw_value) else {
            continue;
        };
        match tag_id {
            TAG_IMAGE_WIDTH => summary.width = Some(value),
            TAG_IMAGE_LENGTH => summary.height = Some(value),
            TAG_PHOTOMETRIC => summary.photometric = Some(value as u16),
            TAG_ORIENTATION => summary.orientation = Orientation::from_exif(value as u16),
            _ => {}
        }
    }
    summary
}

/// Walk IFD0 of a complete in-memory TIFF structure (a JPEG APP1 Exif body).
pub(crate) fn summarize_tiff_buf(buf: &[u8]) -> crate::Result<IfdSummary> {
    let (_, (endianness, ifd_offset)) = tiff_header(buf)?;
    let start = ifd_offset as usize;
    let count_raw = buf
        .get(start..start + 2)
        .ok_or(Error::InsufficientData("IFD offset beyond buffer"))?;
    let (_, count) = number::complete::u16::<&[u8], nom::error::Error<&[u8]>>(endianness)(
        count_raw,
    )
    .map_err(|_| Error::FormatMismatch("malformed IFD entry count"))?;
    let entries = buf
        .get(start + 2..)
        .ok_or(Error::InsufficientData("IFD entries beyond buffer"))?;
    Ok(summarize_entries(endianness, entries, count as usize))
}

/// Baseline TIFF: dimensions, photometric interpretation, and orientation
/// from IFD0. Inline SHORT/LONG values cover every tag we report.
pub struct TiffParser;

impl FormatParser for TiffParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["tif", "tiff"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let head = io.read_vec(8)?;
        let (_, (endianness, ifd_offset)) = tiff_header(&head)?;

        io.seek(u64::from(ifd_offset))?;
        let count_raw = io.read_vec(2)?;
        let (_, count) = number::complete::u16::<&[u8], nom::error::Error<&[u8]>>(endianness)(
            &count_raw,
        )
        .map_err(|_| Error::FormatMismatch("malformed IFD entry count"))?;
        if count == 0 || count > 4096 {
            return Err(Error::FormatMismatch("implausible IFD entry count"));
        }
        let entries = io.read_vec(usize::from(count) * 12)?;
        let summary = summarize_entries(endianness, &entries, usize::from(count));

        let (Some(width), Some(height)) = (summary.width, summary.height) else {
            return Err(Error::FormatMismatch("tiff without image dimensions"));
        };
        if width == 0 || height == 0 {
            return Err(Error::FormatMismatch("zero dimensions"));
        }
        let color_mode = match summary.photometric {
            Some(0) | Some(1) => ColorMode::Grayscale,
            Some(2) | None => ColorMode::Rgb,
            Some(3) => ColorMode::Indexed,
            Some(5) => ColorMode::Cmyk,
            Some(_) => return Err(Error::FormatMismatch("unknown photometric interpretation")),
        };

        Ok(ParseResult::Image(ImageInfo {
            format: Format::Tif,
            width_px: width,
            height_px: height,
            color_mode,
            has_transparency: false,
            has_multiple_frames: None,
            num_animation_or_video_frames: None,
            orientation: summary.orientation,
            content_type: "image/tiff",
        }))
    }
}
