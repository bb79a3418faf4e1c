use std::io;

use thiserror::Error;

/// All failures that can surface from a parse.
///
/// Two of these kinds are *parser-local*: [`Error::InsufficientData`] and
/// [`Error::FormatMismatch`] mean "this parser does not recognize the input"
/// and are swallowed by the dispatch loop. Everything else is an
/// infrastructure failure and is surfaced to the caller unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A safe read got fewer bytes than requested.
    #[error("not enough data; {0}")]
    InsufficientData(&'static str),

    /// A parser's magic or structure checks failed.
    #[error("format mismatch; {0}")]
    FormatMismatch(&'static str),

    /// The server refused the request (4xx other than 416).
    #[error("server refused the request; status {status}")]
    HttpRefused { status: u16 },

    /// The server failed (5xx); the caller might want to retry.
    #[error("server error, might want to retry; status {status}")]
    HttpRetriable { status: u16 },

    /// A per-parse resource cap (requests or bytes) was exceeded.
    #[error("resource cap exceeded; {0}")]
    CapExceeded(&'static str),

    /// Bad path, unusable URL, or an unreachable host.
    #[error("invalid input; {0}")]
    InvalidInput(String),

    #[error("i/o failed; {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The HTTP status code, for the HTTP error kinds.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::HttpRefused { status } | Error::HttpRetriable { status } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::HttpRetriable { .. })
    }

    /// True for the kinds that mean "not this format" rather than a fault.
    pub fn is_parser_local(&self) -> bool {
        matches!(self, Error::InsufficientData(_) | Error::FormatMismatch(_))
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    #[inline]
    fn from(e: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match e {
            nom::Err::Incomplete(_) => Error::InsufficientData("truncated header"),
            nom::Err::Error(_) | nom::Err::Failure(_) => Error::FormatMismatch("malformed header"),
        }
    }
}
