use crate::error::Error;
use crate::info::{AudioInfo, Format, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

/// How far past the ID3 tag the frame-sync scan is allowed to look.
const MAX_SYNC_SCAN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    V1,
    V2,
    V25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    I,
    II,
    III,
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    version: Version,
    layer: Layer,
    bitrate_bps: u32,
    sample_rate: u32,
    channels: u32,
    mono: bool,
    padding: bool,
}

const BITRATES_V1_L1: [u32; 14] = [
    32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];
const BITRATES_V1_L2: [u32; 14] = [
    32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];
const BITRATES_V1_L3: [u32; 14] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const BITRATES_V2_L1: [u32; 14] = [
    32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
];
const BITRATES_V2_L23: [u32; 14] = [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATES_V2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATES_V25: [u32; 3] = [11025, 12000, 8000];

impl FrameHeader {
    fn parse(bytes: [u8; 4]) -> Option<Self> {
        if bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return None;
        }
        let version = match (bytes[1] >> 3) & 0x3 {
            0 => Version::V25,
            2 => Version::V2,
            3 => Version::V1,
            _ => return None,
        };
        let layer = match (bytes[1] >> 1) & 0x3 {
            1 => Layer::III,
            2 => Layer::II,
            3 => Layer::I,
            _ => return None,
        };
        let bitrate_index = bytes[2] >> 4;
        if bitrate_index == 0 || bitrate_index == 0xF {
            return None;
        }
        let table = match (version, layer) {
            (Version::V1, Layer::I) => &BITRATES_V1_L1,
            (Version::V1, Layer::II) => &BITRATES_V1_L2,
            (Version::V1, Layer::III) => &BITRATES_V1_L3,
            (_, Layer::I) => &BITRATES_V2_L1,
            (_, _) => &BITRATES_V2_L23,
        };
        let bitrate_bps = table[usize::from(bitrate_index) - 1] * 1000;

        let sample_rate_index = (bytes[2] >> 2) & 0x3;
        if sample_rate_index == 3 {
            return None;
        }
        let rates = match version {
            Version::V1 => &SAMPLE_RATES_V1,
            Version::V2 => &SAMPLE_RATES_V2,
            Version::V25 => &SAMPLE_RATES_V25,
        };
        let sample_rate = rates[usize::from(sample_rate_index)];
        let mono = bytes[3] >> 6 == 3;

        Some(FrameHeader {
            version,
            layer,
            bitrate_bps,
            sample_rate,
            channels: if mono { 1 } else { 2 },
            mono,
            padding: bytes[2] & 0x2 != 0,
        })
    }

    fn samples_per_frame(&self) -> u32 {
        match self.layer {
            Layer::I => 384,
            Layer::II => 1152,
            Layer::III => match self.version {
                Version::V1 => 1152,
                _ => 576,
            },
        }
    }

    fn frame_len(&self) -> usize {
        let padding = u32::from(self.padding);
        let len = match self.layer {
            Layer::I => (12 * self.bitrate_bps / self.sample_rate + padding) * 4,
            _ => {
                self.samples_per_frame() / 8 * self.bitrate_bps / self.sample_rate + padding
            }
        };
        len as usize
    }

    /// Offset of a Xing/Info tag from the frame start: the 4 header bytes
    /// plus the layer III side information.
    fn xing_offset(&self) -> usize {
        match (self.version, self.mono) {
            (Version::V1, false) => 4 + 32,
            (Version::V1, true) => 4 + 17,
            (_, false) => 4 + 17,
            (_, true) => 4 + 9,
        }
    }
}

/// ID3v2 tag size: four synchsafe bytes, 7 bits each.
fn synchsafe(bytes: [u8; 4]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 7) | u32::from(b & 0x7F))
}

/// Frame count declared by a Xing/Info tag inside the first frame, if any.
fn xing_frame_count(window: &[u8], header: &FrameHeader) -> Option<u32> {
    let at = header.xing_offset();
    let tag = window.get(at..at + 4)?;
    if tag != b"Xing" && tag != b"Info" {
        return None;
    }
    let flags = u32::from_be_bytes(window.get(at + 4..at + 8)?.try_into().ok()?);
    if flags & 0x1 == 0 {
        return None;
    }
    Some(u32::from_be_bytes(
        window.get(at + 8..at + 12)?.try_into().ok()?,
    ))
}

/// MPEG audio (MP3): optional ID3v2 skip, bounded frame-sync scan, then
/// duration from a Xing/Info frame count when present, or a constant-bitrate
/// estimate from the remaining byte length otherwise.
pub struct Mp3Parser;

impl Mp3Parser {
    fn find_frame(window: &[u8]) -> Option<(usize, FrameHeader)> {
        let mut at = 0;
        while at + 4 <= window.len() {
            let bytes = [
                window[at],
                window[at + 1],
                window[at + 2],
                window[at + 3],
            ];
            if let Some(header) = FrameHeader::parse(bytes) {
                // A lone sync pattern proves little; insist the next frame
                // starts with one too, when it is inside the window.
                let next = at + header.frame_len();
                let confirmed = match window.get(next..next + 2) {
                    Some(peek) => peek[0] == 0xFF && peek[1] & 0xE0 == 0xE0,
                    None => true,
                };
                if confirmed {
                    return Some((at, header));
                }
            }
            at += 1;
        }
        None
    }
}

impl FormatParser for Mp3Parser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["mp3"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let head = io.read_array::<3>()?;
        let audio_start = if head == *b"ID3" {
            io.seek(6)?;
            let size = synchsafe(io.read_array::<4>()?);
            u64::from(size) + 10
        } else {
            0
        };
        io.seek(audio_start)?;

        let window = io.read_up_to(MAX_SYNC_SCAN)?;
        let Some((sync_at, header)) = Self::find_frame(&window) else {
            return Err(Error::FormatMismatch("no mpeg frame sync found"));
        };
        tracing::debug!(
            sync_at,
            ?header.version,
            ?header.layer,
            header.bitrate_bps,
            "mpeg frame located"
        );

        let duration = match xing_frame_count(&window[sync_at..], &header) {
            Some(frames) => Some(
                f64::from(frames) * f64::from(header.samples_per_frame())
                    / f64::from(header.sample_rate),
            ),
            None => io.byte_len().map(|total| {
                let audio_bytes = total.saturating_sub(audio_start + sync_at as u64);
                audio_bytes as f64 * 8.0 / f64::from(header.bitrate_bps)
            }),
        }
        .filter(|d| d.is_finite() && *d > 0.0);

        Ok(ParseResult::Audio(AudioInfo {
            format: Format::Mp3,
            audio_sample_rate_hz: header.sample_rate,
            num_audio_channels: header.channels,
            media_duration_seconds: duration,
            content_type: "audio/mpeg",
        }))
    }
}
