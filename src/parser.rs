//! Parser state machine.
//!
//! A [`Parser`] owns at most one open [`DataHandle`] and the [`Metadata`] of
//! the last successful parse. The format-specific work is delegated to a
//! [`FormatParser`]; the state machine around it takes care of handle reuse,
//! metadata bookkeeping and closing.
//!
//! ```text
//!  Uninitialized --parse--> Parsed --close(false)--> Closed
//!        ^                   |  ^                       |
//!        |                   +--+ parse (reuses handle  |
//!        |                        when identity matches)|
//!        +----------------------------------------------+ parse
//! ```

use tracing::{debug, info};

use crate::config::ParserConfig;
use crate::context::Context;
use crate::error::{FormatError, Result};
use crate::io::{DataHandle, Location};
use crate::metadata::Metadata;

/// Lifecycle of a [`Parser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Uninitialized,
    Parsed,
    Closed,
}

/// Format-specific parsing hooks.
pub trait FormatParser: Send {
    /// Name of the format whose metadata this parser fills.
    fn format_name(&self) -> &'static str;

    /// Read the resource and store the format's native structure in `metadata`.
    fn typed_parse(
        &mut self,
        handle: &mut DataHandle,
        metadata: &mut Metadata,
        config: &ParserConfig,
    ) -> Result<()>;

    /// Rebuild `metadata`'s images (and tables) from its native structure.
    ///
    /// Must be idempotent: calling it again produces the same images.
    fn populate_image_metadata(&self, metadata: &mut Metadata, config: &ParserConfig)
        -> Result<()>;

    /// Files beyond the source that belong to the dataset.
    fn companion_files(&self, _metadata: &Metadata) -> Vec<Location> {
        Vec::new()
    }
}

/// Turns a resource into [`Metadata`], reusing its handle across parses of
/// the same resource.
pub struct Parser {
    ctx: Context,
    hooks: Box<dyn FormatParser>,
    state: ParserState,
    handle: Option<DataHandle>,
    metadata: Option<Metadata>,
    config: ParserConfig,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("format", &self.hooks.format_name())
            .field("state", &self.state)
            .field("handle", &self.handle.as_ref().map(DataHandle::location))
            .finish()
    }
}

impl Parser {
    pub fn new(ctx: &Context, hooks: Box<dyn FormatParser>) -> Self {
        Self {
            ctx: ctx.clone(),
            hooks,
            state: ParserState::Uninitialized,
            handle: None,
            metadata: None,
            config: ParserConfig::default(),
        }
    }

    pub fn format_name(&self) -> &'static str {
        self.hooks.format_name()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Metadata of the last successful parse.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// The currently open handle, if any.
    pub fn handle(&self) -> Option<&DataHandle> {
        self.handle.as_ref()
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    /// Parse `location` into fresh metadata.
    pub fn parse(&mut self, location: &Location, config: &ParserConfig) -> Result<&Metadata> {
        let metadata = Metadata::new(self.hooks.format_name());
        self.parse_into(location, metadata, config)
    }

    /// Parse `location` into caller-supplied metadata, which must belong to
    /// this parser's format. Its previous contents are discarded.
    pub fn parse_into(
        &mut self,
        location: &Location,
        metadata: Metadata,
        config: &ParserConfig,
    ) -> Result<&Metadata> {
        self.check_format(&metadata)?;
        let handle = self.acquire_handle(location)?;
        self.parse_handle(handle, metadata, config)
    }

    /// Parse from an already open handle. Any other handle held by the parser
    /// is closed first.
    pub fn parse_handle(
        &mut self,
        mut handle: DataHandle,
        mut metadata: Metadata,
        config: &ParserConfig,
    ) -> Result<&Metadata> {
        self.check_format(&metadata)?;
        if let Some(mut previous) = self.handle.take() {
            previous.close()?;
        }
        handle.seek(0)?;

        metadata.reset();
        metadata.set_source(handle.location().clone());
        metadata.set_dataset_name(handle.location().name());
        metadata.set_filtered(config.filtered);

        self.metadata = None;
        self.state = ParserState::Uninitialized;

        let handle = self.handle.insert(handle);
        self.hooks.typed_parse(handle, &mut metadata, config)?;
        self.hooks.populate_image_metadata(&mut metadata, config)?;

        info!(
            format = self.hooks.format_name(),
            location = %handle.location(),
            images = metadata.image_count(),
            "parsed dataset"
        );
        self.config = config.clone();
        self.state = ParserState::Parsed;
        Ok(self.metadata.insert(metadata))
    }

    /// Re-derive image metadata from the native structure of the last parse.
    pub fn populate_image_metadata(&mut self) -> Result<&Metadata> {
        let metadata = self.metadata.as_mut().ok_or_else(not_parsed)?;
        self.hooks.populate_image_metadata(metadata, &self.config)?;
        Ok(metadata)
    }

    fn check_format(&self, metadata: &Metadata) -> Result<(), FormatError> {
        if metadata.format_name() != self.hooks.format_name() {
            return Err(FormatError::MetadataMismatch(format!(
                "{} parser cannot fill {} metadata",
                self.hooks.format_name(),
                metadata.format_name()
            )));
        }
        Ok(())
    }

    /// Reuse the open handle when it points at the same resource; otherwise
    /// close it and open `location`.
    fn acquire_handle(&mut self, location: &Location) -> Result<DataHandle> {
        if let Some(mut handle) = self.handle.take() {
            if !handle.is_closed() && handle.location().identity() == location.identity() {
                debug!(location = %location, "reusing open handle");
                handle.seek(0)?;
                return Ok(handle);
            }
            debug!(old = %handle.location(), new = %location, "switching handle");
            handle.close()?;
        }
        Ok(self.ctx.locations().open(location)?)
    }

    // =========================================================================
    // Files and Lifecycle
    // =========================================================================

    /// Every file of the dataset, deduplicated, source first. With
    /// `no_pixels`, only files that hold no pixel data.
    pub fn used_files(&self, no_pixels: bool) -> Result<Vec<Location>> {
        let metadata = self.metadata.as_ref().ok_or_else(not_parsed)?;
        let mut files: Vec<Location> = Vec::new();
        if !no_pixels {
            files.extend(metadata.source().cloned());
        }
        for companion in self.hooks.companion_files(metadata) {
            if !files.contains(&companion) {
                files.push(companion);
            }
        }
        Ok(files)
    }

    /// Files holding pixels of one image; empty with `no_pixels`.
    pub fn image_used_files(&self, image: usize, no_pixels: bool) -> Result<Vec<Location>> {
        let metadata = self.metadata.as_ref().ok_or_else(not_parsed)?;
        metadata.image(image)?;
        if no_pixels {
            return Ok(Vec::new());
        }
        Ok(metadata.source().cloned().into_iter().collect())
    }

    /// Release the handle. With `file_only` the metadata stays available;
    /// otherwise it is discarded and the parser is closed.
    ///
    /// A failure closing the handle is returned and leaves the metadata in place.
    pub fn close(&mut self, file_only: bool) -> Result<()> {
        if let Some(handle) = self.handle.as_mut() {
            handle.close()?;
        }
        self.handle = None;
        if !file_only {
            self.metadata = None;
            self.state = ParserState::Closed;
        }
        Ok(())
    }

    /// Hand the open handle and metadata to a reader.
    pub fn into_source(mut self) -> Result<(DataHandle, Metadata)> {
        match (self.handle.take(), self.metadata.take()) {
            (Some(handle), Some(metadata)) if self.state == ParserState::Parsed => {
                Ok((handle, metadata))
            }
            _ => Err(not_parsed().into()),
        }
    }
}

fn not_parsed() -> FormatError {
    FormatError::NotInitialized("parser has no parsed dataset".to_string())
}
