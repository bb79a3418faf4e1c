use crate::error::Error;
use crate::info::{DocumentInfo, Format, ParseResult};
use crate::registry::{matches_extension, FormatParser};
use crate::scoped::ScopedSource;

/// PDF identification is magic-only: `%PDF-` followed by a version.
pub struct PdfParser;

impl FormatParser for PdfParser {
    fn likely_match(&self, filename: &str) -> bool {
        matches_extension(filename, &["pdf"])
    }

    fn parse(&self, io: &mut ScopedSource<'_>) -> crate::Result<ParseResult> {
        let magic = io.read_array::<5>()?;
        if magic != *b"%PDF-" {
            return Err(Error::FormatMismatch("pdf magic not found"));
        }
        Ok(ParseResult::Document(DocumentInfo {
            format: Format::Pdf,
            content_type: "application/pdf",
        }))
    }
}
