use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Error;

/// A random-access, size-bounded byte source.
///
/// One `ByteSource` is opened per parse and shared, sequentially, by every
/// candidate parser; the dispatch loop rewinds it to offset 0 before each
/// attempt. Offsets are absolute. `read` may return fewer bytes than
/// requested at end-of-stream; the [`crate::ScopedSource`] wrapper turns such
/// short reads into a typed failure.
pub trait ByteSource {
    /// Read into `buf` at the current position, advancing it. Returns the
    /// number of bytes delivered; 0 means end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> crate::Result<usize>;

    /// Move to an absolute offset. Seeking does not perform I/O.
    fn seek(&mut self, pos: u64) -> crate::Result<()>;

    /// The current absolute offset.
    fn pos(&self) -> u64;

    /// Total size in bytes. `None` only for a remote source that has not yet
    /// learned its size from a response.
    fn byte_len(&self) -> Option<u64>;
}

/// Local backend: a plain file. The size is queried once at open.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
    pos: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::InvalidInput(format!("cannot open {}: {e}", path.display())))?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(Error::InvalidInput(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        Ok(Self {
            file,
            len: meta.len(),
            pos: 0,
        })
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> crate::Result<usize> {
        let n = self.file.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> crate::Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.len)
    }
}
