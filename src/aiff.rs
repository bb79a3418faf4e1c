use nom::{
    branch::alt,
    bytes::complete::{tag, take},
    number,
    sequence::tuple,
    IResult,
};

use crate::error::Error;
use crate::info::{AudioInfo, Format, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

/// AIFF / AIFF-C: sample parameters and frame count from the `COMM` chunk.
/// The sample rate is an 80-bit extended-precision float.
pub struct AiffParser;

fn form_header(input: &[u8]) -> IResult<&[u8], ()> {
    let (remain, _) = tuple((
        tag("FORM"),
        number::complete::be_u32,
        alt((tag("AIFF"), tag("AIFC"))),
    ))(input)?;
    Ok((remain, ()))
}

fn chunk_header(input: &[u8]) -> IResult<&[u8], (&[u8], u32)> {
    tuple((take(4usize), number::complete::be_u32))(input)
}

fn comm_fields(input: &[u8]) -> IResult<&[u8], (u16, u32, &[u8])> {
    let (remain, (channels, frames, _sample_size, extended)) = tuple((
        number::complete::be_u16,
        number::complete::be_u32,
        number::complete::be_u16,
        take(10usize),
    ))(input)?;
    Ok((remain, (channels, frames, extended)))
}

/// Decode the 80-bit extended-precision sample rate: a sign/exponent word
/// followed by a 64-bit mantissa with an explicit integer bit.
fn extended_to_f64(exponent_word: u16, mantissa: u64) -> f64 {
    let sign = if exponent_word & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = i32::from(exponent_word & 0x7FFF);
    if exponent == 0 && mantissa == 0 {
        return 0.0;
    }
    sign * mantissa as f64 * 2f64.powi(exponent - 16383 - 63)
}

impl FormatParser for AiffParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["aiff", "aif", "aifc"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let head = io.read_vec(12)?;
        form_header(&head)?;

        loop {
            let header = io.read_vec(8)?;
            let (_, (id, size)) = chunk_header(&header)?;
            if id != b"COMM" {
                io.skip(u64::from(size) + u64::from(size) % 2)?;
                continue;
            }
            if size < 18 {
                return Err(Error::FormatMismatch("COMM chunk too short"));
            }
            let body = io.read_vec(18)?;
            let (_, (channels, num_frames, extended)) = comm_fields(&body)?;
            let exponent_word = u16::from_be_bytes([extended[0], extended[1]]);
            let mantissa = u64::from_be_bytes(extended[2..10].try_into().expect("10-byte field"));
            let sample_rate = extended_to_f64(exponent_word, mantissa);

            if channels == 0 || !(sample_rate.is_finite() && sample_rate > 0.0) {
                return Err(Error::FormatMismatch("empty aiff stream parameters"));
            }
            let duration = (num_frames > 0)
                .then(|| f64::from(num_frames) / sample_rate)
                .filter(|d| d.is_finite() && *d > 0.0);

            return Ok(ParseResult::Audio(AudioInfo {
                format: Format::Aiff,
                audio_sample_rate_hz: sample_rate.round() as u32,
                num_audio_channels: u32::from(channels),
                media_duration_seconds: duration,
                content_type: "audio/x-aiff",
            }));
        }
    }
}
