//! Plane writers.
//!
//! Writing goes through three calls: [`Writer::set_metadata`] describes the
//! dataset, [`Writer::set_dest`] opens the target and validates that the
//! dataset can be written there, and [`Writer::save_plane`] encodes planes.
//! [`WriterState`] carries the bookkeeping and precondition checks shared by
//! every writer.

use std::borrow::Cow;

use tracing::{debug, info};

use crate::codec::Compression;
use crate::config::WriterConfig;
use crate::error::{FormatError, Result};
use crate::io::{ByteOrder, DataHandle, Location, LocationService};
use crate::metadata::{Bounds, ImageMetadata, Metadata, PixelType, Plane};

pub trait Writer: Send {
    fn format_name(&self) -> &'static str;

    /// Describe the dataset to write. Any open destination is closed.
    fn set_metadata(&mut self, metadata: Metadata) -> Result<()>;

    fn metadata(&self) -> Option<&Metadata>;

    /// Open `location` for writing, starting at `image_index`.
    ///
    /// Closes any previous destination. Compression and the pixel type of
    /// every image are validated before the first byte is written.
    fn set_dest(&mut self, location: &Location, image_index: usize, config: &WriterConfig)
        -> Result<()>;

    /// Encode one plane, or the region of it given by `bounds` (defaulting to
    /// the plane's own bounds).
    fn save_plane(
        &mut self,
        image: usize,
        plane: u64,
        data: &Plane,
        bounds: Option<&Bounds>,
    ) -> Result<()>;

    /// Whether more than one plane per image can be written.
    fn can_do_stacks(&self) -> bool;

    /// Whether planes must arrive in increasing order.
    fn write_sequential(&self) -> bool;

    fn compression_types(&self) -> Vec<Compression>;

    /// Pixel types writable with `compression`.
    fn pixel_types(&self, compression: Compression) -> Vec<PixelType>;

    fn is_supported_compression(&self, compression: Compression) -> bool {
        self.compression_types().contains(&compression)
    }

    fn is_supported_type(&self, pixel_type: PixelType, compression: Compression) -> bool {
        self.pixel_types(compression).contains(&pixel_type)
    }

    /// Finish and close the destination.
    fn close(&mut self) -> Result<()>;
}

// =============================================================================
// Shared State
// =============================================================================

/// An open output.
#[derive(Debug)]
pub struct Destination {
    pub handle: DataHandle,
    pub image_index: usize,
    pub config: WriterConfig,
    last_written: Option<(usize, u64)>,
}

impl Destination {
    /// Record that `plane` of `image` is fully written. Sequential writers
    /// call this only once the plane's bytes are in place, so a failed save
    /// can be retried.
    pub fn mark_written(&mut self, image: usize, plane: u64) {
        self.last_written = Some((image, plane));
    }
}

/// What a validated [`WriterState::begin_save`] hands back to the writer.
#[derive(Debug)]
pub struct SaveTarget<'a> {
    pub image: &'a ImageMetadata,
    pub dest: &'a mut Destination,
    pub bounds: Bounds,
}

/// Metadata and destination bookkeeping shared by writers.
#[derive(Debug)]
pub struct WriterState {
    format: &'static str,
    metadata: Option<Metadata>,
    dest: Option<Destination>,
}

impl WriterState {
    pub fn new(format: &'static str) -> Self {
        Self {
            format,
            metadata: None,
            dest: None,
        }
    }

    pub fn set_metadata(&mut self, metadata: Metadata) -> Result<()> {
        self.close_dest()?;
        self.metadata = Some(metadata);
        Ok(())
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// The metadata, or `NotInitialized` before [`set_metadata`](Self::set_metadata).
    pub fn require_metadata(&self) -> Result<&Metadata, FormatError> {
        self.metadata
            .as_ref()
            .ok_or_else(|| FormatError::NotInitialized("writer has no metadata".to_string()))
    }

    pub fn dest(&self) -> Option<&Destination> {
        self.dest.as_ref()
    }

    /// Open the destination. Call [`validate_dest`] first.
    pub fn open_dest(
        &mut self,
        locations: &LocationService,
        location: &Location,
        image_index: usize,
        config: &WriterConfig,
    ) -> Result<&mut Destination> {
        self.close_dest()?;
        let mut handle = locations.create(location)?;
        handle.set_byte_order(ByteOrder::from_little_endian(config.little_endian));
        info!(
            format = self.format,
            location = %location,
            compression = %config.compression,
            "opened writer destination"
        );
        Ok(self.dest.insert(Destination {
            handle,
            image_index,
            config: config.clone(),
            last_written: None,
        }))
    }

    /// Close the destination, if any.
    pub fn close_dest(&mut self) -> Result<()> {
        if let Some(mut dest) = self.dest.take() {
            debug!(format = self.format, location = %dest.handle.location(), "closing destination");
            dest.handle.close()?;
        }
        Ok(())
    }

    /// Check a `save_plane` call and resolve its bounds.
    ///
    /// # Errors
    /// - `FormatError::NotInitialized` before `set_dest`
    /// - `FormatError::InvalidIndex` for an image or plane out of range
    /// - `FormatError::MetadataMismatch` when the plane's pixel type or channel
    ///   count differ from the image
    /// - `FormatError::InvalidBounds` for bounds outside the image or not
    ///   matching the plane buffer
    /// - `FormatError::UnsupportedOperation` for an out-of-order plane when
    ///   `sequential` is set
    pub fn begin_save(
        &mut self,
        image: usize,
        plane: u64,
        data: &Plane,
        bounds: Option<&Bounds>,
        sequential: bool,
    ) -> Result<SaveTarget<'_>, FormatError> {
        let dest = self.dest.as_mut().ok_or_else(|| {
            FormatError::NotInitialized("save_plane called before set_dest".to_string())
        })?;
        let metadata = self
            .metadata
            .as_ref()
            .ok_or_else(|| FormatError::NotInitialized("writer has no metadata".to_string()))?;

        let image_meta = metadata.image(image)?;
        let count = image_meta.plane_count();
        if plane >= count {
            return Err(FormatError::InvalidIndex {
                what: "plane",
                index: plane,
                count,
            });
        }

        if data.pixel_type() != image_meta.pixel_type {
            return Err(FormatError::MetadataMismatch(format!(
                "plane holds {} samples, image {} is {}",
                data.pixel_type(),
                image,
                image_meta.pixel_type
            )));
        }
        if data.channels() != image_meta.planar_channels() {
            return Err(FormatError::MetadataMismatch(format!(
                "plane has {} channels, image {} stores {} per plane",
                data.channels(),
                image,
                image_meta.planar_channels()
            )));
        }

        let bounds = bounds.unwrap_or_else(|| data.bounds()).clone();
        let lengths = image_meta.planar_lengths();
        if bounds.rank() != lengths.len() || !bounds.fits_within(&lengths) {
            return Err(FormatError::InvalidBounds(format!(
                "bounds {:?}..{:?} do not fit planar extent {:?}",
                bounds.min(),
                bounds.max(),
                lengths
            )));
        }
        if bounds.extents() != data.bounds().extents() {
            return Err(FormatError::InvalidBounds(format!(
                "bounds extents {:?} differ from plane extents {:?}",
                bounds.extents(),
                data.bounds().extents()
            )));
        }

        if sequential {
            if let Some(last) = dest.last_written {
                if (image, plane) <= last {
                    return Err(FormatError::UnsupportedOperation {
                        format: self.format,
                        message: format!(
                            "planes must be written in order: got image {} plane {} after image {} plane {}",
                            image, plane, last.0, last.1
                        ),
                    });
                }
            }
        }
        Ok(SaveTarget {
            image: image_meta,
            dest,
            bounds,
        })
    }
}

/// Check that every image of `metadata` can be written by `writer` with
/// `config`, starting from `image_index`.
pub fn validate_dest<W: Writer + ?Sized>(
    writer: &W,
    metadata: &Metadata,
    image_index: usize,
    config: &WriterConfig,
) -> Result<(), FormatError> {
    config.validate().map_err(|message| FormatError::Invalid {
        format: "writer configuration",
        message,
    })?;
    metadata.image(image_index)?;

    if !writer.is_supported_compression(config.compression) {
        return Err(FormatError::UnsupportedOperation {
            format: writer.format_name(),
            message: format!("cannot write {} compression", config.compression),
        });
    }
    for (i, image) in metadata.images().iter().enumerate() {
        if !writer.is_supported_type(image.pixel_type, config.compression) {
            return Err(FormatError::UnsupportedPixelType {
                pixel_type: image.pixel_type.to_string(),
                context: format!(
                    "image {} in {} with {}",
                    i,
                    writer.format_name(),
                    config.compression
                ),
            });
        }
        if !writer.can_do_stacks() && image.plane_count() > 1 {
            return Err(FormatError::UnsupportedOperation {
                format: writer.format_name(),
                message: format!("image {} has {} planes", i, image.plane_count()),
            });
        }
    }
    Ok(())
}

/// Convert multi-byte samples between byte orders.
pub(crate) fn reorder_samples(
    data: &[u8],
    bytes_per_sample: usize,
    from_little_endian: bool,
    to_little_endian: bool,
) -> Cow<'_, [u8]> {
    if bytes_per_sample < 2 || from_little_endian == to_little_endian {
        return Cow::Borrowed(data);
    }
    let mut swapped = data.to_vec();
    for sample in swapped.chunks_exact_mut(bytes_per_sample) {
        sample.reverse();
    }
    Cow::Owned(swapped)
}
