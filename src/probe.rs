use std::path::Path;

use serde::Serialize;

use crate::http::HttpSource;
use crate::info::{Format, Nature, ParseResult};
use crate::registry::{default_registry, Registry};
use crate::scoped::ScopedSource;
use crate::source::{ByteSource, FileSource};

/// Whether dispatch stops at the first recognizing parser or runs them all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsMode {
    #[default]
    First,
    All,
}

/// Options accepted by [`parse_file_at`] and [`parse_http`].
///
/// `headers` only affects HTTP parses; it is accepted and ignored for local
/// files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseOptions {
    pub results: ResultsMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natures: Option<Vec<Nature>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<Format>>,
    #[serde(skip)]
    pub headers: Vec<(String, String)>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(mut self, mode: ResultsMode) -> Self {
        self.results = mode;
        self
    }

    /// Restrict candidates to parsers producing at least one of these natures.
    pub fn natures(mut self, natures: Vec<Nature>) -> Self {
        self.natures = Some(natures);
        self
    }

    /// Restrict candidates to parsers handling at least one of these formats.
    pub fn formats(mut self, formats: Vec<Format>) -> Self {
        self.formats = Some(formats);
        self
    }

    /// Extra HTTP request headers (HTTP parses only).
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }
}

/// Identify a local file.
///
/// Returns the recognizing parsers' results: at most one in
/// [`ResultsMode::First`] (the default), all of them in [`ResultsMode::All`].
/// An empty vector means no registered parser recognized the file.
pub fn parse_file_at<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> crate::Result<Vec<ParseResult>> {
    let path = path.as_ref();
    let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let mut src = FileSource::open(path)?;
    default_registry().parse_source(&mut src, filename.as_deref(), options)
}

/// Identify an HTTP(S) resource, fetching byte ranges on demand.
pub fn parse_http(url: &str, options: &ParseOptions) -> crate::Result<Vec<ParseResult>> {
    let mut src = HttpSource::open(url)?.with_headers(options.headers.clone());
    let filename = url_filename(url);
    default_registry().parse_source(&mut src, filename.as_deref(), options)
}

impl Registry {
    /// Run dispatch over an already-open byte source.
    ///
    /// Candidates whose filename hint matches are attempted first; within
    /// each band the order is priority, then registration order. Each
    /// candidate sees the source rewound to offset 0 behind a fresh
    /// [`ScopedSource`]. Parser-local failures select the next candidate;
    /// infrastructure failures abort the parse.
    #[tracing::instrument(skip(self, src, options))]
    pub fn parse_source(
        &self,
        src: &mut dyn ByteSource,
        filename: Option<&str>,
        options: &ParseOptions,
    ) -> crate::Result<Vec<ParseResult>> {
        let candidates = self.candidates(options.natures.as_deref(), options.formats.as_deref());
        let (hinted, rest): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|d| filename.is_some_and(|name| d.parser.likely_match(name)));

        let mut results = Vec::new();
        for descriptor in hinted.iter().chain(rest.iter()) {
            src.seek(0)?;
            let mut scope = ScopedSource::new(&mut *src);
            match descriptor.parser.parse(&mut scope) {
                Ok(result) => {
                    tracing::debug!(format = %result.format(), "parser recognized the input");
                    results.push(result);
                    if options.results == ResultsMode::First {
                        break;
                    }
                }
                Err(e) if e.is_parser_local() => {
                    tracing::debug!(formats = ?descriptor.formats, err = %e, "parser passed");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }
}

/// The last path segment of a URL, for the filename hint. Query strings and
/// fragments are not part of the name.
fn url_filename(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    if name.is_empty() || !name.contains('.') {
        None
    } else {
        Some(name.to_owned())
    }
}
