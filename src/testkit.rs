//! Shared test helpers: an in-memory byte source, synthetic file fixtures,
//! and a minimal range-aware HTTP server for exercising the remote backend.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::source::ByteSource;

pub(crate) struct MemSource {
    data: Vec<u8>,
    pos: u64,
}

impl MemSource {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteSource for MemSource {
    fn read(&mut self, buf: &mut [u8]) -> crate::Result<usize> {
        let pos = (self.pos.min(self.data.len() as u64)) as usize;
        let n = buf.len().min(self.data.len() - pos);
        buf[..n].copy_from_slice(&self.data[pos..pos + n]);
        self.pos = (pos + n) as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> crate::Result<()> {
        self.pos = pos;
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

// ---------------------------------------------------------------- fixtures

/// Bit-at-a-time CRC with the Ogg polynomial, register initialized to 0.
/// Independent of the table-driven implementation under test.
pub(crate) fn reference_crc(data: &[u8]) -> u32 {
    let mut register = 0u32;
    for &byte in data {
        register ^= u32::from(byte) << 24;
        for _ in 0..8 {
            register = if register & 0x8000_0000 != 0 {
                (register << 1) ^ 0x04C1_1DB7
            } else {
                register << 1
            };
        }
    }
    register
}

/// A complete Ogg page with a correct checksum.
pub(crate) fn ogg_page(header_type: u8, granule: u64, sequence: u32, payload: &[u8]) -> Vec<u8> {
    let mut page = Vec::new();
    page.extend_from_slice(b"OggS");
    page.push(0); // version
    page.push(header_type);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&0x6057_1E5Au32.to_le_bytes()); // bitstream serial
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&0u32.to_le_bytes()); // checksum, patched below
    let mut segments = Vec::new();
    let mut remaining = payload.len();
    loop {
        let segment = remaining.min(255);
        segments.push(segment as u8);
        remaining -= segment;
        if segment < 255 {
            break;
        }
    }
    page.push(segments.len() as u8);
    page.extend_from_slice(&segments);
    page.extend_from_slice(payload);

    let crc = reference_crc(&page);
    page[22..26].copy_from_slice(&crc.to_le_bytes());
    page
}

/// A Vorbis identification header packet (30 bytes).
fn vorbis_ident_packet(sample_rate: u32, channels: u8) -> Vec<u8> {
    let mut packet = Vec::new();
    packet.push(1);
    packet.extend_from_slice(b"vorbis");
    packet.extend_from_slice(&0u32.to_le_bytes()); // vorbis version
    packet.push(channels);
    packet.extend_from_slice(&sample_rate.to_le_bytes());
    packet.extend_from_slice(&[0u8; 12]); // bitrate max/nominal/min
    packet.push(0xB8); // blocksizes
    packet.push(1); // framing bit
    packet
}

/// A minimal Ogg Vorbis stream: identification page plus a final page
/// carrying the given granule position.
pub(crate) fn ogg_vorbis_fixture(sample_rate: u32, channels: u8, granule: u64) -> Vec<u8> {
    let mut data = ogg_page(0x02, 0, 0, &vorbis_ident_packet(sample_rate, channels));
    data.extend_from_slice(&ogg_page(0x04, granule, 1, &[0u8; 16]));
    data
}

/// A PNG header with the given IHDR fields, optionally followed by an
/// `acTL` chunk declaring `(num_frames, loop_count)`.
pub(crate) fn png_fixture(
    width: u32,
    height: u32,
    color_type: u8,
    actl: Option<(u32, u32)>,
) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, color_type, 0, 0, 0]);
    data.extend_from_slice(&[0u8; 4]); // IHDR CRC, unchecked
    if let Some((frames, loops)) = actl {
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(b"acTL");
        data.extend_from_slice(&frames.to_be_bytes());
        data.extend_from_slice(&loops.to_be_bytes());
        data.extend_from_slice(&[0u8; 4]);
    } else {
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(b"IDAT");
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&[0u8; 4]);
    }
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"IEND");
    data.extend_from_slice(&[0u8; 4]);
    data
}

fn put_u16(out: &mut Vec<u8>, little: bool, value: u16) {
    let bytes = if little {
        value.to_le_bytes()
    } else {
        value.to_be_bytes()
    };
    out.extend_from_slice(&bytes);
}

fn put_u32(out: &mut Vec<u8>, little: bool, value: u32) {
    let bytes = if little {
        value.to_le_bytes()
    } else {
        value.to_be_bytes()
    };
    out.extend_from_slice(&bytes);
}

/// A TIFF structure holding single-count SHORT/LONG IFD0 entries:
/// `(tag, field_type, value)` with `field_type` 3 or 4.
fn tiff_blob(little: bool, entries: &[(u16, u16, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(if little { b"II" } else { b"MM" });
    put_u16(&mut out, little, 42);
    put_u32(&mut out, little, 8); // IFD0 right after the header
    put_u16(&mut out, little, entries.len() as u16);
    for &(tag, field_type, value) in entries {
        put_u16(&mut out, little, tag);
        put_u16(&mut out, little, field_type);
        put_u32(&mut out, little, 1);
        if field_type == 3 {
            put_u16(&mut out, little, value as u16);
            put_u16(&mut out, little, 0);
        } else {
            put_u32(&mut out, little, value);
        }
    }
    put_u32(&mut out, little, 0); // no next IFD
    out
}

pub(crate) fn tiff_fixture(
    little: bool,
    width: u32,
    height: u32,
    photometric: u16,
    orientation: Option<u16>,
) -> Vec<u8> {
    let mut entries = vec![
        (0x0100u16, 4u16, width),
        (0x0101, 4, height),
        (0x0106, 3, u32::from(photometric)),
    ];
    if let Some(orientation) = orientation {
        entries.push((0x0112, 3, u32::from(orientation)));
    }
    tiff_blob(little, &entries)
}

/// A JPEG header chain: SOI, optional Exif APP1 with an orientation entry,
/// a SOF0 frame header, then SOS.
pub(crate) fn jpeg_fixture(
    width: u16,
    height: u16,
    components: u8,
    orientation: Option<u16>,
) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    if let Some(orientation) = orientation {
        let blob = tiff_blob(true, &[(0x0112, 3, u32::from(orientation))]);
        let payload_len = 2 + 6 + blob.len();
        data.extend_from_slice(&[0xFF, 0xE1]);
        data.extend_from_slice(&(payload_len as u16).to_be_bytes());
        data.extend_from_slice(b"Exif\0\0");
        data.extend_from_slice(&blob);
    }
    let sof_len = 2 + 6 + 3 * usize::from(components);
    data.extend_from_slice(&[0xFF, 0xC0]);
    data.extend_from_slice(&(sof_len as u16).to_be_bytes());
    data.push(8); // precision
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.push(components);
    for id in 0..components {
        data.extend_from_slice(&[id + 1, 0x11, 0]);
    }
    data.extend_from_slice(&[0xFF, 0xDA]);
    data
}

pub(crate) fn gif_fixture(width: u16, height: u16, frames: u32, transparency: bool) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"GIF89a");
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&[0x00, 0, 0]); // no global color table
    if transparency {
        data.extend_from_slice(&[0x21, 0xF9, 0x04, 0x01, 0, 0, 0, 0x00]);
    }
    for _ in 0..frames {
        data.push(0x2C);
        data.extend_from_slice(&[0, 0, 0, 0]); // left, top
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.push(0); // no local color table
        data.push(2); // LZW minimum code size
        data.extend_from_slice(&[2, 0x4C, 0x01, 0]); // one sub-block + end
    }
    data.push(0x3B);
    data
}

pub(crate) fn bmp_fixture(width: i32, height: i32, bpp: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"BM");
    data.extend_from_slice(&0u32.to_le_bytes()); // file size, unchecked
    data.extend_from_slice(&0u32.to_le_bytes()); // reserved
    data.extend_from_slice(&54u32.to_le_bytes()); // pixel data offset
    data.extend_from_slice(&40u32.to_le_bytes()); // BITMAPINFOHEADER
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes()); // planes
    data.extend_from_slice(&bpp.to_le_bytes());
    data.extend_from_slice(&[0u8; 24]); // rest of the DIB header
    data
}

pub(crate) fn psd_fixture(width: u32, height: u32, channels: u16, mode: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"8BPS");
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&[0u8; 6]);
    data.extend_from_slice(&channels.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&8u16.to_be_bytes()); // depth
    data.extend_from_slice(&mode.to_be_bytes());
    data
}

pub(crate) fn wav_fixture(sample_rate: u32, channels: u16, bits: u16, data_len: u32) -> Vec<u8> {
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bits) / 8;
    let block_align = channels * bits / 8;
    let mut data = Vec::new();
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&(36 + data_len).to_le_bytes());
    data.extend_from_slice(b"WAVE");
    data.extend_from_slice(b"fmt ");
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes()); // PCM
    data.extend_from_slice(&channels.to_le_bytes());
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&byte_rate.to_le_bytes());
    data.extend_from_slice(&block_align.to_le_bytes());
    data.extend_from_slice(&bits.to_le_bytes());
    data.extend_from_slice(b"data");
    data.extend_from_slice(&data_len.to_le_bytes());
    // The payload itself is never read by the parser.
    data
}

/// 80-bit extended-precision encoding of an integer sample rate.
fn extended_bytes(rate: u32) -> [u8; 10] {
    let mut out = [0u8; 10];
    if rate == 0 {
        return out;
    }
    let value = u64::from(rate);
    let shift = value.leading_zeros();
    let mantissa = value << shift;
    let exponent = 16383 + 63 - shift as u16;
    out[..2].copy_from_slice(&exponent.to_be_bytes());
    out[2..].copy_from_slice(&mantissa.to_be_bytes());
    out
}

pub(crate) fn aiff_fixture(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"FORM");
    data.extend_from_slice(&(4 + 8 + 18u32).to_be_bytes());
    data.extend_from_slice(b"AIFF");
    data.extend_from_slice(b"COMM");
    data.extend_from_slice(&18u32.to_be_bytes());
    data.extend_from_slice(&channels.to_be_bytes());
    data.extend_from_slice(&frames.to_be_bytes());
    data.extend_from_slice(&16u16.to_be_bytes()); // sample size
    data.extend_from_slice(&extended_bytes(sample_rate));
    data
}

pub(crate) fn flac_fixture(sample_rate: u32, channels: u32, total_samples: u64) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"fLaC");
    data.push(0x80); // last metadata block, type 0 (STREAMINFO)
    data.extend_from_slice(&[0, 0, 34]);
    data.extend_from_slice(&[0u8; 10]); // block and frame size bounds
    let packed: u64 = (u64::from(sample_rate) << 44)
        | (u64::from(channels - 1) << 41)
        | (15u64 << 36) // 16 bits per sample
        | (total_samples & 0xF_FFFF_FFFF);
    data.extend_from_slice(&packed.to_be_bytes());
    data.extend_from_slice(&[0u8; 16]); // md5
    data
}

/// One 417-byte MPEG1 layer III frame: 128 kbit/s, 44100 Hz, joint stereo.
fn mp3_frame() -> Vec<u8> {
    let mut frame = vec![0u8; 417];
    frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x40]);
    frame
}

pub(crate) fn mp3_cbr_fixture(frames: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for _ in 0..frames {
        data.extend_from_slice(&mp3_frame());
    }
    data
}

pub(crate) fn mp3_xing_fixture(frame_count: u32) -> Vec<u8> {
    let mut first = mp3_frame();
    // Xing header after the side information of a stereo MPEG1 frame.
    first[36..40].copy_from_slice(b"Xing");
    first[40..44].copy_from_slice(&1u32.to_be_bytes()); // FRAMES flag
    first[44..48].copy_from_slice(&frame_count.to_be_bytes());
    let mut data = first;
    data.extend_from_slice(&mp3_frame());
    data
}

pub(crate) fn zip_fixture(names: &[&str]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut local_offsets = Vec::new();
    for name in names {
        local_offsets.push(data.len() as u32);
        data.extend_from_slice(b"PK\x03\x04");
        data.extend_from_slice(&20u16.to_le_bytes()); // version needed
        data.extend_from_slice(&[0u8; 2]); // flags
        data.extend_from_slice(&[0u8; 2]); // method: stored
        data.extend_from_slice(&[0u8; 4]); // time + date
        data.extend_from_slice(&[0u8; 12]); // crc + sizes (empty entry)
        data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        data.extend_from_slice(&[0u8; 2]); // extra length
        data.extend_from_slice(name.as_bytes());
    }
    let cd_offset = data.len() as u32;
    for (name, offset) in names.iter().zip(&local_offsets) {
        data.extend_from_slice(b"PK\x01\x02");
        data.extend_from_slice(&20u16.to_le_bytes()); // version made by
        data.extend_from_slice(&20u16.to_le_bytes()); // version needed
        data.extend_from_slice(&[0u8; 2]); // flags
        data.extend_from_slice(&[0u8; 2]); // method
        data.extend_from_slice(&[0u8; 4]); // time + date
        data.extend_from_slice(&[0u8; 12]); // crc + sizes
        data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        data.extend_from_slice(&[0u8; 2]); // extra length
        data.extend_from_slice(&[0u8; 2]); // comment length
        data.extend_from_slice(&[0u8; 2]); // disk number
        data.extend_from_slice(&[0u8; 2]); // internal attributes
        data.extend_from_slice(&[0u8; 4]); // external attributes
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(name.as_bytes());
    }
    let cd_size = data.len() as u32 - cd_offset;
    data.extend_from_slice(b"PK\x05\x06");
    data.extend_from_slice(&[0u8; 4]); // disk numbers
    data.extend_from_slice(&(names.len() as u16).to_le_bytes());
    data.extend_from_slice(&(names.len() as u16).to_le_bytes());
    data.extend_from_slice(&cd_size.to_le_bytes());
    data.extend_from_slice(&cd_offset.to_le_bytes());
    data.extend_from_slice(&[0u8; 2]); // comment length
    data
}

// --------------------------------------------------------- test http server

/// What the server does with every request it receives.
pub(crate) enum Behavior {
    /// Honor `Range` headers: 206 with `Content-Range`, 416 past the end.
    Ranged(Vec<u8>),
    /// Ignore `Range` and answer 200 with the whole body.
    IgnoreRange(Vec<u8>),
    /// Answer a fixed status with an empty body.
    Status(u16),
}

/// A one-thread HTTP server bound to an ephemeral localhost port.
pub(crate) struct TestServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    headers: Arc<Mutex<Vec<String>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    pub(crate) fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let shutdown = Arc::new(AtomicBool::new(false));
        let headers = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let headers = Arc::clone(&headers);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(mut stream) = stream else { continue };
                    let _ = handle_connection(&mut stream, &behavior, &headers);
                }
            })
        };

        TestServer {
            addr,
            shutdown,
            headers,
            handle: Some(handle),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    /// Headers of the most recent request.
    pub(crate) fn last_headers(&self) -> Vec<String> {
        self.headers.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_connection(
    stream: &mut TcpStream,
    behavior: &Behavior,
    seen: &Mutex<Vec<String>>,
) -> io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
        if request.len() > 64 * 1024 {
            break;
        }
    }

    let text = String::from_utf8_lossy(&request);
    let mut lines = text.split("\r\n");
    let _request_line = lines.next().unwrap_or_default();
    let header_lines: Vec<String> = lines
        .take_while(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    let range = header_lines.iter().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.eq_ignore_ascii_case("range") {
            Some(value.trim().to_owned())
        } else {
            None
        }
    });
    *seen.lock().unwrap() = header_lines;

    match behavior {
        Behavior::Status(code) => write_response(stream, *code, &[], &[]),
        Behavior::IgnoreRange(data) => write_response(stream, 200, &[], data),
        Behavior::Ranged(data) => match range.as_deref().and_then(parse_range) {
            Some((start, end)) if (start as usize) < data.len() => {
                let end = (end as usize).min(data.len() - 1);
                let body = &data[start as usize..=end];
                let content_range =
                    format!("Content-Range: bytes {start}-{end}/{}", data.len());
                write_response(stream, 206, &[content_range], body)
            }
            Some(_) => {
                let content_range = format!("Content-Range: bytes */{}", data.len());
                write_response(stream, 416, &[content_range], &[])
            }
            None => write_response(stream, 200, &[], data),
        },
    }
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    extra_headers: &[String],
    body: &[u8],
) -> io::Result<()> {
    let reason = match status {
        200 => "OK",
        206 => "Partial Content",
        403 => "Forbidden",
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let mut head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for header in extra_headers {
        head.push_str(header);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()
}
