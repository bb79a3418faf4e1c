use nom::{bytes::complete::take, number, sequence::tuple, IResult};

use crate::error::Error;
use crate::info::{DocumentInfo, Format, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

const LOCAL_FILE_MAGIC: [u8; 4] = *b"PK\x03\x04";
const CENTRAL_DIR_MAGIC: [u8; 4] = *b"PK\x01\x02";
const EOCD_MAGIC: [u8; 4] = *b"PK\x05\x06";

/// The end-of-central-directory record is 22 bytes plus a comment of at
/// most 65535 bytes, so it always sits inside this much tail.
const MAX_EOCD_SCAN: u64 = 22 + 65_535;

/// How many central directory entries get their names inspected when
/// sniffing for Office packages.
const MAX_SNIFFED_ENTRIES: usize = 32;

/// ZIP archives, including the Office package formats built on them.
/// The central directory is located through a tail scan for the EOCD
/// record; entry names decide between docx/xlsx/pptx and plain zip.
pub struct ZipParser;

fn eocd_fields(input: &[u8]) -> IResult<&[u8], (u16, u32, u32)> {
    let (remain, (_disk, _cd_disk, _disk_entries, total_entries, cd_size, cd_offset)) =
        tuple((
            number::complete::le_u16,
            number::complete::le_u16,
            number::complete::le_u16,
            number::complete::le_u16,
            number::complete::le_u32,
            number::complete::le_u32,
        ))(input)?;
    Ok((remain, (total_entries, cd_size, cd_offset)))
}

#[allow(clippy::type_complexity)]
fn central_entry_lengths(input: &[u8]) -> IResult<&[u8], (u16, u16, u16)> {
    // Fixed part of a central directory header after its magic: 42 bytes,
    // with the three variable-length field sizes at offsets 24, 26, 28.
    let (remain, (_before, name_len, extra_len, comment_len, _after)) = tuple((
        take(24usize),
        number::complete::le_u16,
        number::complete::le_u16,
        number::complete::le_u16,
        take(12usize),
    ))(input)?;
    Ok((remain, (name_len, extra_len, comment_len)))
}

fn classify(entry_names: &[String]) -> (Format, &'static str) {
    let has_content_types = entry_names
        .iter()
        .any(|name| name == "[Content_Types].xml");
    if has_content_types {
        if entry_names.iter().any(|n| n.starts_with("word/")) {
            return (
                Format::Docx,
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            );
        }
        if entry_names.iter().any(|n| n.starts_with("xl/")) {
            return (
                Format::Xlsx,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            );
        }
        if entry_names.iter().any(|n| n.starts_with("ppt/")) {
            return (
                Format::Pptx,
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            );
        }
    }
    (Format::Zip, "application/zip")
}

/// Names of the first central directory entries, best effort.
fn central_entry_names(
    io: &mut ScopedSource<'_>,
    total_entries: u16,
    cd_offset: u32,
) -> crate::Result<Vec<String>> {
    io.seek(u64::from(cd_offset))?;
    let mut names = Vec::new();
    for _ in 0..usize::from(total_entries).min(MAX_SNIFFED_ENTRIES) {
        let magic = io.read_array::<4>()?;
        if magic != CENTRAL_DIR_MAGIC {
            break;
        }
        let fixed = io.read_vec(42)?;
        let (_, (name_len, extra_len, comment_len)) = central_entry_lengths(&fixed)?;
        let name = io.read_vec(usize::from(name_len))?;
        names.push(String::from_utf8_lossy(&name).into_owned());
        io.skip(u64::from(extra_len) + u64::from(comment_len))?;
    }
    Ok(names)
}

impl FormatParser for ZipParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["zip", "docx", "xlsx", "pptx"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let magic = io.read_array::<4>()?;
        if magic != LOCAL_FILE_MAGIC && magic != EOCD_MAGIC {
            return Err(Error::FormatMismatch("zip magic not found"));
        }

        // Without a known size the archive still identifies as a zip; the
        // Office sniff needs the central directory from the tail.
        let mut names = Vec::new();
        if let Some(total) = io.byte_len() {
            let tail_len = total.min(MAX_EOCD_SCAN);
            io.seek(total - tail_len)?;
            let tail = io.read_vec(tail_len as usize)?;
            for offset in (0..tail.len().saturating_sub(21)).rev() {
                if tail[offset..offset + 4] == EOCD_MAGIC {
                    let (_, (total_entries, _cd_size, cd_offset)) =
                        eocd_fields(&tail[offset + 4..])?;
                    match central_entry_names(io, total_entries, cd_offset) {
                        Ok(found) => names = found,
                        Err(e) if e.is_parser_local() => {
                            tracing::debug!(err = %e, "unreadable central directory");
                        }
                        Err(e) => return Err(e),
                    }
                    break;
                }
            }
        }

        let (format, content_type) = classify(&names);
        Ok(ParseResult::Document(DocumentInfo {
            format,
            content_type,
        }))
    }
}
