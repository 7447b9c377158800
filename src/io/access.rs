//! Storage backends behind a [`DataHandle`](super::DataHandle).
//!
//! A backend only knows how to move bytes at absolute offsets. Cursor state,
//! byte order and typed primitives live in the handle, so adding a backend
//! means implementing five small methods.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::{Arc, RwLock};

use bytes::Bytes;

use crate::error::IoError;

/// Positioned byte access to a file, buffer or other resource.
///
/// Implementations are single-owner: every method that may move an OS-level
/// cursor takes `&mut self`.
pub trait RandomAccess: Send {
    /// Read up to `buf.len()` bytes at `offset`.
    ///
    /// Returns the number of bytes read, which is smaller than `buf.len()`
    /// only when the end of the resource is reached.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// The range is checked against [`size`](Self::size) before any buffer
    /// is allocated.
    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let length = self.size()?;
        let end_of_data = || IoError::EndOfData {
            offset,
            requested: len as u64,
            length,
        };
        let in_range = u64::try_from(len)
            .ok()
            .and_then(|len| offset.checked_add(len))
            .is_some_and(|end| end <= length);
        if !in_range {
            return Err(end_of_data());
        }

        let mut buf = vec![0u8; len];
        let read = self.read_at(offset, &mut buf)?;
        if read < len {
            return Err(end_of_data());
        }
        Ok(Bytes::from(buf))
    }

    /// Write `data` at `offset`, extending the resource if needed.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), IoError>;

    /// Current length of the resource in bytes.
    fn size(&self) -> Result<u64, IoError>;

    /// Truncate or extend the resource.
    fn set_size(&mut self, len: u64) -> Result<(), IoError>;

    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }

    /// Identifier for logging.
    fn identifier(&self) -> &str;
}

// =============================================================================
// File Backend
// =============================================================================

/// Backend over a local file.
pub struct FileAccess {
    file: File,
    identifier: String,
    writable: bool,
}

impl FileAccess {
    /// Open an existing file for reading.
    pub fn open(path: &std::path::Path) -> Result<Self, IoError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(path.display().to_string()),
            _ => IoError::Io(e),
        })?;
        Ok(Self {
            file,
            identifier: path.display().to_string(),
            writable: false,
        })
    }

    /// Create (or truncate) a file for reading and writing.
    pub fn create(path: &std::path::Path) -> Result<Self, IoError> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            identifier: path.display().to_string(),
            writable: true,
        })
    }
}

impl RandomAccess for FileAccess {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), IoError> {
        if !self.writable {
            return Err(IoError::ReadOnly(self.identifier.clone()));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn size(&self) -> Result<u64, IoError> {
        Ok(self.file.metadata()?.len())
    }

    fn set_size(&mut self, len: u64) -> Result<(), IoError> {
        if !self.writable {
            return Err(IoError::ReadOnly(self.identifier.clone()));
        }
        self.file.set_len(len)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        if self.writable {
            self.file.flush()?;
        }
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Shared Memory Backend
// =============================================================================

/// Growable in-memory buffer shared with the [`LocationService`](super::LocationService)
/// that registered it, so bytes written through one handle can be read back
/// through another.
pub struct MemoryAccess {
    buffer: Arc<RwLock<Vec<u8>>>,
    identifier: String,
}

impl MemoryAccess {
    pub fn new(buffer: Arc<RwLock<Vec<u8>>>, identifier: impl Into<String>) -> Self {
        Self {
            buffer,
            identifier: identifier.into(),
        }
    }
}

impl RandomAccess for MemoryAccess {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        let data = self.buffer.read().unwrap_or_else(|e| e.into_inner());
        let start = offset.min(data.len() as u64) as usize;
        let end = (start + buf.len()).min(data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&data[start..end]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), IoError> {
        let mut data = self.buffer.write().unwrap_or_else(|e| e.into_inner());
        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> Result<u64, IoError> {
        Ok(self.buffer.read().unwrap_or_else(|e| e.into_inner()).len() as u64)
    }

    fn set_size(&mut self, len: u64) -> Result<(), IoError> {
        self.buffer
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .resize(len as usize, 0);
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Read-only Bytes Backend
// =============================================================================

/// Read-only backend over an immutable [`Bytes`] buffer.
///
/// Ranges are returned as slices of the original allocation.
pub struct BytesAccess {
    data: Bytes,
    identifier: String,
}

impl BytesAccess {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

impl RandomAccess for BytesAccess {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        let start = offset.min(self.data.len() as u64) as usize;
        let end = (start + buf.len()).min(self.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.data[start..end]);
        Ok(n)
    }

    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(len)?))
            .filter(|range| range.end <= self.data.len());
        match range {
            Some(range) => Ok(self.data.slice(range)),
            None => Err(IoError::EndOfData {
                offset,
                requested: len as u64,
                length: self.data.len() as u64,
            }),
        }
    }

    fn write_at(&mut self, _offset: u64, _data: &[u8]) -> Result<(), IoError> {
        Err(IoError::ReadOnly(self.identifier.clone()))
    }

    fn size(&self) -> Result<u64, IoError> {
        Ok(self.data.len() as u64)
    }

    fn set_size(&mut self, _len: u64) -> Result<(), IoError> {
        Err(IoError::ReadOnly(self.identifier.clone()))
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
