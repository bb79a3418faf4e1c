use nom::{
    bytes::complete::{tag, take},
    number,
    sequence::tuple,
    IResult,
};

use crate::error::Error;
use crate::info::{AudioInfo, Format, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

#[derive(Debug, Clone, Copy)]
struct FmtChunk {
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
}

/// RIFF/WAVE: sample parameters from the `fmt ` chunk, duration from the
/// `data` chunk length and the byte rate.
pub struct WavParser;

fn riff_header(input: &[u8]) -> IResult<&[u8], ()> {
    let (remain, _) = tuple((tag("RIFF"), number::complete::le_u32, tag("WAVE")))(input)?;
    Ok((remain, ()))
}

fn chunk_header(input: &[u8]) -> IResult<&[u8], (&[u8], u32)> {
    tuple((take(4usize), number::complete::le_u32))(input)
}

fn fmt_fields(input: &[u8]) -> IResult<&[u8], FmtChunk> {
    let (remain, (_audio_format, channels, sample_rate, byte_rate)) = tuple((
        number::complete::le_u16,
        number::complete::le_u16,
        number::complete::le_u32,
        number::complete::le_u32,
    ))(input)?;
    Ok((
        remain,
        FmtChunk {
            channels,
            sample_rate,
            byte_rate,
        },
    ))
}

impl FormatParser for WavParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["wav", "wave"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let head = io.read_vec(12)?;
        riff_header(&head)?;

        let mut fmt: Option<FmtChunk> = None;
        let mut data_len: Option<u64> = None;

        while fmt.is_none() || data_len.is_none() {
            let header = match io.read_vec(8) {
                Ok(header) => header,
                // A fmt chunk alone still identifies the stream.
                Err(e) if e.is_parser_local() && fmt.is_some() => break,
                Err(e) => return Err(e),
            };
            let (_, (id, size)) = chunk_header(&header)?;
            let padded = u64::from(size) + u64::from(size) % 2;
            match id {
                b"fmt " => {
                    if size < 16 {
                        return Err(Error::FormatMismatch("fmt chunk too short"));
                    }
                    let body = io.read_vec(12)?;
                    let (_, parsed) = fmt_fields(&body)?;
                    fmt = Some(parsed);
                    io.skip(padded - 12)?;
                }
                b"data" => {
                    data_len = Some(u64::from(size));
                    if fmt.is_some() {
                        break;
                    }
                    io.skip(padded)?;
                }
                _ => io.skip(padded)?,
            }
        }

        let fmt = fmt.ok_or(Error::FormatMismatch("no fmt chunk found"))?;
        if fmt.channels == 0 || fmt.sample_rate == 0 {
            return Err(Error::FormatMismatch("empty wave stream parameters"));
        }
        let duration = data_len
            .filter(|_| fmt.byte_rate > 0)
            .map(|len| len as f64 / f64::from(fmt.byte_rate))
            .filter(|d| d.is_finite() && *d > 0.0);

        Ok(ParseResult::Audio(AudioInfo {
            format: Format::Wav,
            audio_sample_rate_hz: fmt.sample_rate,
            num_audio_channels: u32::from(fmt.channels),
            media_duration_seconds: duration,
            content_type: "audio/x-wav",
        }))
    }
}
