//! Resource identifiers and the service that opens them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::IoError;

use super::access::{FileAccess, MemoryAccess};
use super::handle::DataHandle;

// =============================================================================
// Location
// =============================================================================

/// Identifier of a readable or writable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Location {
    /// Local file path
    File(PathBuf),
    /// Named buffer registered with a [`LocationService`]
    Memory(String),
    /// Any other URL; only `file:` URLs can be opened
    Url(#[serde(serialize_with = "serialize_url")] Url),
}

fn serialize_url<S: serde::Serializer>(url: &Url, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(url.as_str())
}

impl Location {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Location::File(path.into())
    }

    pub fn memory(name: impl Into<String>) -> Self {
        Location::Memory(name.into())
    }

    /// Parse a location string.
    ///
    /// `memory:name` names an in-memory buffer, `file:` URLs become paths and
    /// any other absolute URL is kept as-is. Everything else is a plain path.
    pub fn parse(text: &str) -> Self {
        if let Some(name) = text.strip_prefix("memory:") {
            return Location::Memory(name.to_string());
        }
        // Single-letter schemes are Windows drive letters, not URLs
        match Url::parse(text) {
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Location::File(path),
                Err(()) => Location::Url(url),
            },
            Ok(url) if url.scheme().len() > 1 => Location::Url(url),
            _ => Location::File(PathBuf::from(text)),
        }
    }

    /// Canonical identity used to decide whether two locations name the same
    /// resource.
    ///
    /// File paths are canonicalized when the file exists, so `./a.tif` and
    /// the absolute path compare equal.
    pub fn identity(&self) -> String {
        match self {
            Location::File(path) => {
                let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
                format!("file:{}", resolved.display())
            }
            Location::Memory(name) => format!("memory:{}", name),
            Location::Url(url) => url.to_string(),
        }
    }

    /// Final path component, used for dataset names and pattern inference.
    pub fn name(&self) -> String {
        match self {
            Location::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Location::Memory(name) => name.clone(),
            Location::Url(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| url.to_string()),
        }
    }

    /// Lowercased extension of the final path component, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.name();
        Path::new(&name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Location::File(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Memory(name) => write!(f, "memory:{}", name),
            Location::Url(url) => write!(f, "{}", url),
        }
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::File(path.to_path_buf())
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::File(path)
    }
}

impl From<&str> for Location {
    fn from(text: &str) -> Self {
        Location::parse(text)
    }
}

// =============================================================================
// Location Service
// =============================================================================

/// Opens [`DataHandle`]s for locations.
///
/// Shared between parsers, readers and writers through the
/// [`Context`](crate::Context). In-memory buffers live here so a writer and a
/// later parser can exchange bytes without touching the filesystem.
#[derive(Default)]
pub struct LocationService {
    memory: RwLock<HashMap<String, Arc<RwLock<Vec<u8>>>>>,
    opened: AtomicUsize,
}

impl fmt::Debug for LocationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationService")
            .field("opened", &self.open_count())
            .finish()
    }
}

impl LocationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an existing resource for reading.
    pub fn open(&self, location: &Location) -> Result<DataHandle, IoError> {
        let access: Box<dyn super::RandomAccess> = match location {
            Location::File(path) => Box::new(FileAccess::open(path)?),
            Location::Memory(name) => {
                let buffer = self
                    .memory_buffer(name)
                    .ok_or_else(|| IoError::NotFound(location.to_string()))?;
                Box::new(MemoryAccess::new(buffer, location.to_string()))
            }
            Location::Url(url) => return Err(IoError::UnsupportedScheme(url.scheme().to_string())),
        };

        let count = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(location = %location, open_count = count, "opened location");
        Ok(DataHandle::new(location.clone(), access))
    }

    /// Create (or truncate) a resource for writing.
    ///
    /// Memory locations are registered on first use.
    pub fn create(&self, location: &Location) -> Result<DataHandle, IoError> {
        let access: Box<dyn super::RandomAccess> = match location {
            Location::File(path) => Box::new(FileAccess::create(path)?),
            Location::Memory(name) => {
                let buffer = self.register_memory(name, Vec::new());
                Box::new(MemoryAccess::new(buffer, location.to_string()))
            }
            Location::Url(url) => return Err(IoError::UnsupportedScheme(url.scheme().to_string())),
        };

        let count = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(location = %location, open_count = count, "created location");
        Ok(DataHandle::new(location.clone(), access))
    }

    /// Register (or replace) a named in-memory buffer.
    pub fn register_memory(&self, name: &str, data: Vec<u8>) -> Arc<RwLock<Vec<u8>>> {
        let buffer = Arc::new(RwLock::new(data));
        self.memory
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), Arc::clone(&buffer));
        buffer
    }

    /// Snapshot of a named buffer's current contents.
    pub fn memory_contents(&self, name: &str) -> Option<Bytes> {
        self.memory_buffer(name).map(|buffer| {
            let data = buffer.read().unwrap_or_else(|e| e.into_inner());
            Bytes::copy_from_slice(&data)
        })
    }

    fn memory_buffer(&self, name: &str) -> Option<Arc<RwLock<Vec<u8>>>> {
        self.memory
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Number of handles opened or created so far.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}
