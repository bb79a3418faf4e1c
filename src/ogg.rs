use nom::{bytes::complete::tag, number, sequence::tuple, IResult};

use crate::error::Error;
use crate::info::{AudioInfo, Format, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

const OGG_PAGE_MARKER: [u8; 4] = *b"OggS";
const OGG_PAGE_HEADER_SIZE: usize = 27;
/// Header, maximum segment table, maximum payload: 27 + 255 + 255 * 255.
pub const OGG_PAGE_MAX_SIZE: usize = 65307;

/// The Ogg page CRC polynomial (no reflection, register initialized to 0).
const CRC_POLYNOMIAL: u32 = 0x04C1_1DB7;

const fn build_crc_lookup() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut register = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            register = if register & 0x8000_0000 != 0 {
                (register << 1) ^ CRC_POLYNOMIAL
            } else {
                register << 1
            };
            bit += 1;
        }
        table[i] = register;
        i += 1;
    }
    table
}

static CRC_LOOKUP: [u32; 256] = build_crc_lookup();

pub(crate) fn page_crc(bytes: &[u8]) -> u32 {
    let mut register = 0u32;
    for &byte in bytes {
        register =
            (register << 8) ^ CRC_LOOKUP[(((register >> 24) & 0xFF) as u8 ^ byte) as usize];
    }
    register
}

/// OGG container with a Vorbis stream: identification from the Vorbis
/// identification header on the first page, duration from the granule
/// position of the last CRC-valid page.
pub struct OggParser;

fn vorbis_ident(input: &[u8]) -> IResult<&[u8], (u8, u8, u32)> {
    let (remain, (packet_type, _, _version, channels, sample_rate)) = tuple((
        number::complete::u8,
        tag("vorbis"),
        number::complete::le_u32,
        number::complete::u8,
        number::complete::le_u32,
    ))(input)?;
    Ok((remain, (packet_type, channels, sample_rate)))
}

fn page_header(input: &[u8]) -> IResult<&[u8], (u64, u32, u8)> {
    let (remain, (_, _version, _header_type, granule, _serial, _sequence, crc, num_segments)) =
        tuple((
            tag("OggS"),
            number::complete::u8,
            number::complete::u8,
            number::complete::le_u64,
            number::complete::le_u32,
            number::complete::le_u32,
            number::complete::le_u32,
            number::complete::u8,
        ))(input)?;
    Ok((remain, (granule, crc, num_segments)))
}

/// Validate the page candidate at `offset` inside the tail buffer; returns
/// its granule position if the stored CRC matches.
fn validate_page_at(tail: &[u8], offset: usize) -> Option<u64> {
    let page = &tail[offset..];
    let (segment_table, (granule, stored_crc, num_segments)) = page_header(page).ok()?;
    if num_segments == 0 {
        return None;
    }
    let num_segments = num_segments as usize;
    if segment_table.len() < num_segments {
        return None;
    }
    let payload_size: usize = segment_table[..num_segments]
        .iter()
        .map(|&len| len as usize)
        .sum();
    let page_size = OGG_PAGE_HEADER_SIZE + num_segments + payload_size;
    if page.len() < page_size {
        return None;
    }

    // The CRC covers the whole page with the checksum field (bytes 22..26
    // of the page) taken as zero.
    let mut scratch = page[..page_size].to_vec();
    scratch[22..26].fill(0);
    (page_crc(&scratch) == stored_crc).then_some(granule)
}

/// Granule position of the last valid page, located by scanning one maximum
/// page length from the end for `OggS` capture patterns, latest match first.
fn last_page_granule(io: &mut ScopedSource<'_>) -> crate::Result<Option<u64>> {
    let Some(total) = io.byte_len() else {
        return Ok(None);
    };
    let tail_len = total.min(OGG_PAGE_MAX_SIZE as u64);
    io.seek(total - tail_len)?;
    let tail = io.read_vec(tail_len as usize)?;

    for offset in (0..tail.len().saturating_sub(3)).rev() {
        if tail[offset..offset + 4] == OGG_PAGE_MARKER {
            if let Some(granule) = validate_page_at(&tail, offset) {
                return Ok(Some(granule));
            }
            tracing::debug!(offset, "capture pattern failed page validation");
        }
    }
    Ok(None)
}

impl FormatParser for OggParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["ogg", "oga", "ogv"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let marker = io.read_array::<4>()?;
        if marker != OGG_PAGE_MARKER {
            return Err(Error::FormatMismatch("ogg capture pattern not found"));
        }

        // The Vorbis identification header is the sole packet of the first
        // page: 27 header bytes plus a one-entry segment table put it at 28.
        io.seek(28)?;
        let ident = io.read_vec(16)?;
        let (_, (packet_type, channels, sample_rate)) = vorbis_ident(&ident)?;
        if packet_type != 1 {
            return Err(Error::FormatMismatch("not a vorbis identification header"));
        }
        if channels == 0 || sample_rate == 0 {
            return Err(Error::FormatMismatch("empty vorbis stream parameters"));
        }

        let duration = last_page_granule(io)?
            .map(|granule| granule as f64 / f64::from(sample_rate))
            .filter(|d| d.is_finite() && *d > 0.0);

        Ok(ParseResult::Audio(AudioInfo {
            format: Format::Ogg,
            audio_sample_rate_hz: sample_rate,
            num_audio_channels: u32::from(channels),
            media_duration_seconds: duration,
            content_type: "audio/ogg",
        }))
    }
}
