use nom::{
    branch::alt,
    bytes::complete::tag,
    number,
    sequence::{preceded, tuple},
    IResult,
};

use crate::error::Error;
use crate::info::{ColorMode, Format, ImageInfo, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

const BLOCK_EXTENSION: u8 = 0x21;
const BLOCK_IMAGE: u8 = 0x2C;
const BLOCK_TRAILER: u8 = 0x3B;
const LABEL_GRAPHIC_CONTROL: u8 = 0xF9;

/// GIF: dimensions from the logical screen descriptor, then a block walk
/// counting image descriptors and picking up the graphic-control
/// transparency flag. GIF is always palette-based.
pub struct GifParser;

fn screen_descriptor(input: &[u8]) -> IResult<&[u8], (u16, u16, u8)> {
    preceded(
        alt((tag("GIF87a"), tag("GIF89a"))),
        tuple((
            number::complete::le_u16,
            number::complete::le_u16,
            number::complete::u8,
        )),
    )(input)
}

fn color_table_len(packed: u8) -> u64 {
    if packed & 0x80 != 0 {
        3 * (1u64 << ((packed & 0x07) + 1))
    } else {
        0
    }
}

fn skip_sub_blocks(io: &mut ScopedSource<'_>) -> crate::Result<()> {
    loop {
        let len = io.read_u8()?;
        if len == 0 {
            return Ok(());
        }
        io.skip(u64::from(len))?;
    }
}

/// Count image descriptors and collect the transparency flag until the
/// trailer. Fails parser-locally on truncation; the caller keeps whatever
/// was gathered up to that point.
fn walk_blocks(
    io: &mut ScopedSource<'_>,
    frames: &mut u32,
    transparency: &mut bool,
) -> crate::Result<()> {
    loop {
        match io.read_u8()? {
            BLOCK_TRAILER => return Ok(()),
            BLOCK_EXTENSION => {
                let label = io.read_u8()?;
                if label == LABEL_GRAPHIC_CONTROL {
                    let len = io.read_u8()?;
                    let data = io.read_vec(usize::from(len))?;
                    if data.first().is_some_and(|packed| packed & 0x01 != 0) {
                        *transparency = true;
                    }
                }
                skip_sub_blocks(io)?;
            }
            BLOCK_IMAGE => {
                let descriptor = io.read_vec(9)?;
                io.skip(color_table_len(descriptor[8]))?;
                io.skip(1)?; // LZW minimum code size
                skip_sub_blocks(io)?;
                *frames += 1;
            }
            _ => return Err(Error::FormatMismatch("unknown gif block introducer")),
        }
    }
}

impl FormatParser for GifParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["gif"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let head = io.read_vec(13)?;
        let (_, (width, height, packed)) = screen_descriptor(&head)?;
        if width == 0 || height == 0 {
            return Err(Error::FormatMismatch("zero dimensions"));
        }
        io.skip(color_table_len(packed))?;

        let mut frames = 0u32;
        let mut transparency = false;
        match walk_blocks(io, &mut frames, &mut transparency) {
            Ok(()) => {}
            Err(e) if e.is_parser_local() => {
                tracing::debug!(err = %e, frames, "gif block walk cut short");
            }
            Err(e) => return Err(e),
        }

        Ok(ParseResult::Image(ImageInfo {
            format: Format::Gif,
            width_px: u32::from(width),
            height_px: u32::from(height),
            color_mode: ColorMode::Indexed,
            has_transparency: transparency,
            has_multiple_frames: (frames > 0).then(|| frames > 1),
            num_animation_or_video_frames: (frames > 0).then_some(frames),
            orientation: None,
            content_type: "image/gif",
        }))
    }
}
