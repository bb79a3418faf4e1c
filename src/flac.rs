use nom::{bytes::complete::tag, number, sequence::tuple, IResult};

use crate::error::Error;
use crate::info::{AudioInfo, Format, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

/// FLAC: sample rate, channel count, and total sample count from the
/// STREAMINFO block, which the format requires to be the first metadata
/// block after the marker.
pub struct FlacParser;

fn streaminfo_header(input: &[u8]) -> IResult<&[u8], (u8, u32)> {
    let (remain, (_, block_header, length)) = tuple((
        tag("fLaC"),
        number::complete::u8,
        number::complete::be_u24,
    ))(input)?;
    Ok((remain, (block_header & 0x7F, length)))
}

impl FormatParser for FlacParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["flac"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let head = io.read_vec(8)?;
        let (_, (block_type, length)) = streaminfo_header(&head)?;
        if block_type != 0 || length != 34 {
            return Err(Error::FormatMismatch("STREAMINFO must come first"));
        }

        let body = io.read_vec(34)?;
        // After the block/frame size fields, one packed 64-bit group holds
        // the sample rate (20 bits), channels-1 (3), bits-1 (5), and the
        // total sample count (36).
        let packed = u64::from_be_bytes(body[10..18].try_into().expect("34-byte body"));
        let sample_rate = (packed >> 44) as u32;
        let channels = ((packed >> 41) & 0x7) as u32 + 1;
        let total_samples = packed & 0xF_FFFF_FFFF;

        if sample_rate == 0 {
            return Err(Error::FormatMismatch("zero sample rate"));
        }
        let duration = (total_samples > 0)
            .then(|| total_samples as f64 / f64::from(sample_rate))
            .filter(|d| d.is_finite() && *d > 0.0);

        Ok(ParseResult::Audio(AudioInfo {
            format: Format::Flac,
            audio_sample_rate_hz: sample_rate,
            num_audio_channels: channels,
            media_duration_seconds: duration,
            content_type: "audio/x-flac",
        }))
    }
}
