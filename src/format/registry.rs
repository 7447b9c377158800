//! Format registry and detection.
//!
//! Detection looks at content first: formats are asked, in priority order,
//! whether the leading bytes of a resource belong to them. Only when no format
//! claims the content does the file suffix matter, and then only for formats
//! that declare the suffix sufficient.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EnumError, FormatError};
use crate::io::Location;

use super::{Format, PnmFormat, TiffFormat};

/// Number of leading bytes handed to [`Format::is_format`].
pub const HEADER_BYTES: usize = 512;

/// Ordered collection of formats.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<Arc<dyn Format>>,
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.formats.iter().map(|format| format.name()))
            .finish()
    }
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every format shipped with the crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TiffFormat));
        registry.register(Arc::new(PnmFormat));
        registry
    }

    /// Add a format, keeping the list ordered by priority (descending), then name.
    pub fn register(&mut self, format: Arc<dyn Format>) {
        debug!(format = format.name(), priority = format.priority(), "registering format");
        self.formats.push(format);
        self.formats
            .sort_by(|a, b| b.priority().cmp(&a.priority()).then(a.name().cmp(b.name())));
    }

    /// Formats in detection order.
    pub fn formats(&self) -> &[Arc<dyn Format>] {
        &self.formats
    }

    /// Find the format of a resource from its leading bytes, falling back to
    /// the location's suffix for formats that allow it.
    pub fn detect(
        &self,
        header: &[u8],
        location: Option<&Location>,
    ) -> Result<Arc<dyn Format>, FormatError> {
        if let Some(format) = self.formats.iter().find(|f| f.is_format(header)) {
            debug!(format = format.name(), "detected format from content");
            return Ok(Arc::clone(format));
        }

        let extension = location.and_then(Location::extension);
        if let Some(extension) = extension.as_deref() {
            if let Some(format) = self
                .formats
                .iter()
                .find(|f| f.suffix_sufficient() && f.has_extension(extension))
            {
                debug!(format = format.name(), extension, "detected format from suffix");
                return Ok(Arc::clone(format));
            }
        }

        Err(FormatError::UnsupportedFormat {
            reason: match location {
                Some(location) => format!("no format recognizes {}", location),
                None => "no format recognizes the data".to_string(),
            },
        })
    }

    /// Look a format up by name, ignoring case.
    pub fn format_by_name(&self, name: &str) -> Result<Arc<dyn Format>, EnumError> {
        self.formats
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| EnumError::UnknownName {
                kind: "format",
                name: name.to_string(),
            })
    }

    /// Format to write `location` with, chosen by suffix.
    pub fn format_for_extension(&self, location: &Location) -> Result<Arc<dyn Format>, FormatError> {
        let extension = location.extension().ok_or_else(|| FormatError::UnsupportedFormat {
            reason: format!("{} has no file extension", location),
        })?;
        self.formats
            .iter()
            .find(|f| f.has_extension(&extension))
            .cloned()
            .ok_or_else(|| FormatError::UnsupportedFormat {
                reason: format!("no format writes .{} files", extension),
            })
    }
}
