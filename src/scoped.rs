use crate::error::Error;
use crate::source::ByteSource;

/// Upper bound on a single safe read. Every header structure the parsers
/// fetch fits comfortably; anything larger indicates a runaway length field.
const MAX_SINGLE_READ: usize = 512 * 1024;

/// The constrained view of a [`ByteSource`] handed to each parser.
///
/// Each candidate parser gets a fresh `ScopedSource` positioned at offset 0,
/// so it never observes the seeks of a previous parser. All reads are
/// bounds-checked: a short read or an out-of-range seek becomes
/// [`Error::InsufficientData`], which the dispatch loop treats as "not this
/// format". Multi-field header decoding is done with `nom` over buffers
/// fetched through [`ScopedSource::read_vec`].
pub struct ScopedSource<'a> {
    src: &'a mut dyn ByteSource,
}

impl<'a> ScopedSource<'a> {
    pub fn new(src: &'a mut dyn ByteSource) -> Self {
        Self { src }
    }

    pub fn pos(&self) -> u64 {
        self.src.pos()
    }

    /// Total size, when known. Remote sources learn it from the first
    /// response carrying a `Content-Range` header.
    pub fn byte_len(&self) -> Option<u64> {
        self.src.byte_len()
    }

    /// Seek to an absolute offset, validating against the known size.
    pub fn seek(&mut self, pos: u64) -> crate::Result<()> {
        if let Some(len) = self.src.byte_len() {
            if pos > len {
                return Err(Error::InsufficientData("seek beyond end of source"));
            }
        }
        self.src.seek(pos)
    }

    /// Advance the position by `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> crate::Result<()> {
        let target = self
            .pos()
            .checked_add(n)
            .ok_or(Error::FormatMismatch("offset overflow"))?;
        self.seek(target)
    }

    /// Read exactly `N` bytes.
    pub fn read_array<const N: usize>(&mut self) -> crate::Result<[u8; N]> {
        let mut buf = [0u8; N];
        let mut filled = 0;
        while filled < N {
            let n = self.src.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::InsufficientData("short read"));
            }
            filled += n;
        }
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> crate::Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_be(&mut self) -> crate::Result<u16> {
        Ok(u16::from_be_bytes(self.read_array::<2>()?))
    }

    /// Read exactly `n` bytes into a fresh buffer.
    pub fn read_vec(&mut self, n: usize) -> crate::Result<Vec<u8>> {
        if n > MAX_SINGLE_READ {
            return Err(Error::CapExceeded("read window exceeds the per-read limit"));
        }
        let buf = self.read_up_to(n)?;
        if buf.len() < n {
            return Err(Error::InsufficientData("short read"));
        }
        Ok(buf)
    }

    /// Read up to `n` bytes; short only at end-of-stream.
    pub fn read_up_to(&mut self, n: usize) -> crate::Result<Vec<u8>> {
        let mut buf = vec![0u8; n.min(MAX_SINGLE_READ)];
        let mut filled = 0;
        while filled < buf.len() {
            let k = self.src.read(&mut buf[filled..])?;
            if k == 0 {
                break;
            }
            filled += k;
        }
        buf.truncate(filled);
        Ok(buf)
    }
}
