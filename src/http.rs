use std::collections::BTreeMap;
use std::io::Read;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::Error;
use crate::source::ByteSource;

/// Maximum ranged GETs issued during a single parse.
pub const DEFAULT_REQUEST_CAP: u32 = 10;
/// Maximum body bytes fetched during a single parse.
pub const DEFAULT_BYTE_CAP: u64 = 4 * 1024 * 1024;

/// Fetch granularity. Requests are widened to page boundaries and pages are
/// cached for the lifetime of the source, so the many small header reads the
/// parsers perform cost one GET per touched page, not one GET each.
const PAGE_SIZE: u64 = 64 * 1024;

// The full Content-Range grammar has more forms; "X-Y/Z", with or without the
// "bytes" prefix, is the only one useful for size discovery.
static CONTENT_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:bytes\s+)?(?:[0-9]+-[0-9]+|\*)/([0-9]+)\s*$").unwrap());

fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(Duration::from_secs(30))
        .redirects(8)
        .build()
}

/// Remote backend: fetches byte ranges of an HTTP(S) resource on demand.
///
/// The object size is unknown until the first successful response carries a
/// `Content-Range` header. Every fetch is a `GET` with a single
/// `Range: bytes=START-END` header; redirects are followed transparently by
/// the client. Request and byte caps bound the total effort of one parse;
/// exceeding either is fatal to that parse.
#[derive(Debug)]
pub struct HttpSource {
    agent: ureq::Agent,
    url: String,
    headers: Vec<(String, String)>,
    pos: u64,
    size: Option<u64>,
    pages: BTreeMap<u64, Vec<u8>>,
    /// Lowest offset a 416 was observed at while the size was unknown.
    /// Everything at or past it is end-of-stream; no point asking again.
    unsatisfiable_from: Option<u64>,
    max_requests: u32,
    max_bytes: u64,
    num_requests: u32,
    bytes_fetched: u64,
}

impl HttpSource {
    pub fn open(url: &str) -> crate::Result<Self> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::InvalidInput(format!("not an http(s) url: {url}")));
        }
        Ok(Self {
            agent: build_agent(),
            url: url.to_owned(),
            headers: Vec::new(),
            pos: 0,
            size: None,
            pages: BTreeMap::new(),
            unsatisfiable_from: None,
            max_requests: DEFAULT_REQUEST_CAP,
            max_bytes: DEFAULT_BYTE_CAP,
            num_requests: 0,
            bytes_fetched: 0,
        })
    }

    /// Extra request headers sent with every fetch.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_request_cap(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    pub fn with_byte_cap(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// GETs issued so far.
    pub fn num_requests(&self) -> u32 {
        self.num_requests
    }

    fn learn_size(&mut self, content_range: &str) {
        if self.size.is_some() {
            return;
        }
        if let Some(caps) = CONTENT_RANGE_RE.captures(content_range.trim()) {
            if let Ok(total) = caps[1].parse::<u64>() {
                tracing::debug!(total, "learned object size from Content-Range");
                self.size = Some(total);
            }
        }
    }

    /// Fetch one page. `Ok(None)` means 416: the range starts past the end.
    #[tracing::instrument(skip(self))]
    fn fetch_page(&mut self, page_start: u64) -> crate::Result<Option<Vec<u8>>> {
        if self.num_requests >= self.max_requests {
            return Err(Error::CapExceeded("too many requests for one parse"));
        }
        self.num_requests += 1;

        let mut end = page_start + PAGE_SIZE - 1;
        if let Some(size) = self.size {
            end = end.min(size.saturating_sub(1));
        }
        let mut req = self
            .agent
            .get(&self.url)
            .set("Range", &format!("bytes={page_start}-{end}"));
        for (name, value) in &self.headers {
            req = req.set(name, value);
        }

        match req.call() {
            Ok(resp) => {
                // 206 carries the window we asked for; 200 means the server
                // ignored the range, in which case the body is taken as the
                // requested window and truncated to its length.
                if let Some(content_range) = resp.header("Content-Range") {
                    self.learn_size(content_range);
                }
                let mut body = Vec::new();
                resp.into_reader()
                    .take(PAGE_SIZE)
                    .read_to_end(&mut body)
                    .map_err(|e| Error::InvalidInput(format!("reading response body: {e}")))?;
                self.bytes_fetched += body.len() as u64;
                if self.bytes_fetched > self.max_bytes {
                    return Err(Error::CapExceeded("too many bytes fetched for one parse"));
                }
                Ok(Some(body))
            }
            // A previously learned size is never overwritten on 416.
            Err(ureq::Error::Status(416, _)) => Ok(None),
            Err(ureq::Error::Status(status, _)) if status >= 500 => {
                Err(Error::HttpRetriable { status })
            }
            Err(ureq::Error::Status(status, _)) => Err(Error::HttpRefused { status }),
            Err(ureq::Error::Transport(t)) => Err(Error::InvalidInput(t.to_string())),
        }
    }
}

impl ByteSource for HttpSource {
    fn read(&mut self, buf: &mut [u8]) -> crate::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(size) = self.size {
            if self.pos >= size {
                return Ok(0);
            }
        }
        if let Some(floor) = self.unsatisfiable_from {
            if self.pos >= floor {
                return Ok(0);
            }
        }

        let page_start = self.pos - self.pos % PAGE_SIZE;
        if !self.pages.contains_key(&page_start) {
            match self.fetch_page(page_start)? {
                Some(body) => {
                    self.pages.insert(page_start, body);
                }
                None => {
                    let floor = self.unsatisfiable_from.unwrap_or(u64::MAX);
                    self.unsatisfiable_from = Some(floor.min(page_start));
                    return Ok(0);
                }
            }
        }

        let page = &self.pages[&page_start];
        let offset = (self.pos - page_start) as usize;
        if offset >= page.len() {
            // Short page: the object ends inside it.
            return Ok(0);
        }
        let n = buf.len().min(page.len() - offset);
        buf[..n].copy_from_slice(&page[offset..offset + n]);
        self.pos += n as u64;
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
        self.size
    }
}
