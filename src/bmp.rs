use nom::{bytes::complete::tag, number, sequence::{preceded, tuple}, IResult};

use crate::error::Error;
use crate::info::{ColorMode, Format, ImageInfo, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

/// Windows bitmap with a BITMAPINFOHEADER or newer. A negative height means
/// a top-down pixel order; the reported height is its magnitude.
pub struct BmpParser;

#[allow(clippy::type_complexity)]
fn bmp_headers(input: &[u8]) -> IResult<&[u8], (u32, i32, i32, u16)> {
    let (remain, (_file_size, _reserved, _data_offset, dib_size, width, height, _planes, bpp)) =
        preceded(
            tag("BM"),
            tuple((
                number::complete::le_u32,
                number::complete::le_u32,
                number::complete::le_u32,
                number::complete::le_u32,
                number::complete::le_i32,
                number::complete::le_i32,
                number::complete::le_u16,
                number::complete::le_u16,
            )),
        )(input)?;
    Ok((remain, (dib_size, width, height, bpp)))
}

impl FormatParser for BmpParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["bmp", "dib"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let head = io.read_vec(30)?;
        let (_, (dib_size, width, height, bpp)) = bmp_headers(&head)?;
        if dib_size < 40 {
            return Err(Error::FormatMismatch("unsupported DIB header"));
        }
        if width <= 0 || height == 0 {
            return Err(Error::FormatMismatch("implausible dimensions"));
        }
        let color_mode = match bpp {
            1 | 4 | 8 => ColorMode::Indexed,
            16 | 24 => ColorMode::Rgb,
            32 => ColorMode::Rgba,
            _ => return Err(Error::FormatMismatch("unsupported bit depth")),
        };

        Ok(ParseResult::Image(ImageInfo {
            format: Format::Bmp,
            width_px: width as u32,
            height_px: height.unsigned_abs(),
            color_mode,
            has_transparency: bpp == 32,
            has_multiple_frames: None,
            num_animation_or_video_frames: None,
            orientation: None,
            content_type: "image/bmp",
        }))
    }
}
