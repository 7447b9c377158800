//! Dataset-level metadata.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::FormatError;
use crate::io::Location;

use super::axis::AxisType;
use super::image::ImageMetadata;
use super::pixel::PixelType;
use super::MetaTable;

/// Everything a parser learned about one dataset.
///
/// Created empty by a [`Format`](crate::format::Format), filled by exactly
/// one parse, and read (never modified) by readers and writers. The owning
/// format is recorded by name and resolved through the
/// [`FormatRegistry`](crate::format::FormatRegistry).
///
/// Cloning shares the native structure.
#[derive(Clone, Serialize)]
pub struct Metadata {
    format: &'static str,
    source: Option<Location>,
    dataset_name: String,
    filtered: bool,
    images: Vec<ImageMetadata>,
    table: MetaTable,
    #[serde(skip)]
    native: Option<Arc<dyn Any + Send + Sync>>,
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("format", &self.format)
            .field("source", &self.source)
            .field("dataset_name", &self.dataset_name)
            .field("filtered", &self.filtered)
            .field("images", &self.images)
            .field("table", &self.table)
            .field("native", &self.native.is_some())
            .finish()
    }
}

impl Metadata {
    pub fn new(format: &'static str) -> Self {
        Self {
            format,
            source: None,
            dataset_name: String::new(),
            filtered: false,
            images: Vec::new(),
            table: MetaTable::new(),
            native: None,
        }
    }

    /// Name of the format that created this metadata.
    pub fn format_name(&self) -> &'static str {
        self.format
    }

    pub fn source(&self) -> Option<&Location> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: Location) {
        self.source = Some(source);
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    pub fn set_dataset_name(&mut self, name: impl Into<String>) {
        self.dataset_name = name.into();
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    pub fn set_filtered(&mut self, filtered: bool) {
        self.filtered = filtered;
    }

    /// Drop everything learned from a previous parse.
    pub fn reset(&mut self) {
        self.source = None;
        self.dataset_name.clear();
        self.filtered = false;
        self.images.clear();
        self.table.clear();
        self.native = None;
    }

    // =========================================================================
    // Images
    // =========================================================================

    pub fn images(&self) -> &[ImageMetadata] {
        &self.images
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: usize) -> Result<&ImageMetadata, FormatError> {
        self.images.get(index).ok_or(FormatError::InvalidIndex {
            what: "image",
            index: index as u64,
            count: self.images.len() as u64,
        })
    }

    pub fn add_image(&mut self, image: ImageMetadata) {
        self.images.push(image);
    }

    pub fn set_images(&mut self, images: Vec<ImageMetadata>) {
        self.images = images;
    }

    pub fn axis_length(&self, image: usize, axis: AxisType) -> Result<u64, FormatError> {
        Ok(self.image(image)?.axis_length(axis))
    }

    pub fn pixel_type(&self, image: usize) -> Result<PixelType, FormatError> {
        Ok(self.image(image)?.pixel_type)
    }

    pub fn is_little_endian(&self, image: usize) -> Result<bool, FormatError> {
        Ok(self.image(image)?.little_endian)
    }

    pub fn plane_count(&self, image: usize) -> Result<u64, FormatError> {
        Ok(self.image(image)?.plane_count())
    }

    // =========================================================================
    // Tables and Native State
    // =========================================================================

    pub fn table(&self) -> &MetaTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut MetaTable {
        &mut self.table
    }

    /// Format-owned structure the images were derived from.
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.as_ref().and_then(|n| n.downcast_ref::<T>())
    }

    /// Mutable access to the native structure; `None` while a clone shares it.
    pub fn native_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.native
            .as_mut()
            .and_then(Arc::get_mut)
            .and_then(|n| n.downcast_mut::<T>())
    }

    pub fn set_native<T: Any + Send + Sync>(&mut self, native: T) {
        self.native = Some(Arc::new(native));
    }
}
