//! Services shared by parsers, readers and writers.

use std::sync::Arc;

use tracing::debug;

use crate::codec::CodecTable;
use crate::config::ParserConfig;
use crate::error::{FormatError, Result};
use crate::format::{Format, FormatRegistry, HEADER_BYTES};
use crate::io::{Location, LocationService};
use crate::reader::Reader;
use crate::writer::Writer;

/// Bundle of the codec table, location service and format registry.
///
/// Cloning is cheap and every clone shares the same services.
#[derive(Debug, Clone)]
pub struct Context {
    codecs: Arc<CodecTable>,
    locations: Arc<LocationService>,
    formats: Arc<FormatRegistry>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Context with the standard codec table and every shipped format.
    pub fn new() -> Self {
        Self::with_services(
            CodecTable::new(),
            LocationService::new(),
            FormatRegistry::with_defaults(),
        )
    }

    pub fn with_services(
        codecs: CodecTable,
        locations: LocationService,
        formats: FormatRegistry,
    ) -> Self {
        Self {
            codecs: Arc::new(codecs),
            locations: Arc::new(locations),
            formats: Arc::new(formats),
        }
    }

    pub fn codecs(&self) -> &Arc<CodecTable> {
        &self.codecs
    }

    pub fn locations(&self) -> &Arc<LocationService> {
        &self.locations
    }

    pub fn formats(&self) -> &Arc<FormatRegistry> {
        &self.formats
    }

    /// Detect the format of an existing resource.
    pub fn detect(&self, location: &Location) -> Result<Arc<dyn Format>> {
        let mut handle = self.locations.open(location)?;
        let length = handle.length()?;
        let header = handle.read_bytes(HEADER_BYTES.min(length as usize))?;
        handle.close()?;
        Ok(self.formats.detect(&header, Some(location))?)
    }

    /// Detect, parse and hand the result to a reader in one step.
    pub fn open_reader(&self, location: &Location, config: &ParserConfig) -> Result<Box<dyn Reader>> {
        let format = self.detect(location)?;
        let mut parser = format.create_parser(self);
        parser.parse(location, config)?;
        let (handle, metadata) = parser.into_source()?;

        let mut reader = format.create_reader(self);
        reader.set_source(handle, metadata)?;
        Ok(reader)
    }

    /// Writer for `location`, chosen by its suffix.
    pub fn writer_for(&self, location: &Location) -> Result<Box<dyn Writer>> {
        let format = self.formats.format_for_extension(location)?;
        debug!(format = format.name(), location = %location, "selected writer");
        format.create_writer(self).ok_or_else(|| {
            FormatError::UnsupportedOperation {
                format: format.name(),
                message: "format cannot be written".to_string(),
            }
            .into()
        })
    }
}
