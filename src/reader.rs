//! Plane readers.
//!
//! A [`Reader`] takes over the handle and metadata produced by a
//! [`Parser`](crate::parser::Parser) and decodes planes on request. Nothing
//! is cached: each call reads and decodes the bytes it needs and returns a
//! fully built [`Plane`], or an error and no plane at all.

use crate::error::{FormatError, Result};
use crate::io::DataHandle;
use crate::metadata::{Bounds, ImageMetadata, Metadata, Plane};

pub trait Reader: Send {
    fn format_name(&self) -> &'static str;

    /// Take ownership of a parsed source.
    ///
    /// # Errors
    /// `FormatError::MetadataMismatch` when the metadata came from another format.
    fn set_source(&mut self, handle: DataHandle, metadata: Metadata) -> Result<()>;

    fn metadata(&self) -> Option<&Metadata>;

    /// Decode a rectangular region of one plane.
    fn open_region(&mut self, image: usize, plane: u64, bounds: &Bounds) -> Result<Plane>;

    /// Decode one full plane.
    fn open_plane(&mut self, image: usize, plane: u64) -> Result<Plane> {
        let bounds = self
            .metadata()
            .ok_or_else(no_source)?
            .image(image)?
            .full_bounds();
        self.open_region(image, plane, &bounds)
    }

    /// Release the handle. The metadata stays available.
    fn close(&mut self) -> Result<()>;
}

/// Error for reads attempted before [`Reader::set_source`].
pub fn no_source() -> FormatError {
    FormatError::NotInitialized("reader has no source".to_string())
}

/// Check that `metadata` belongs to the format named `format`.
pub fn check_source_format(format: &'static str, metadata: &Metadata) -> Result<(), FormatError> {
    if metadata.format_name() != format {
        return Err(FormatError::MetadataMismatch(format!(
            "{} reader cannot read {} metadata",
            format,
            metadata.format_name()
        )));
    }
    Ok(())
}

/// Validate a plane request against the metadata, returning the image.
///
/// # Errors
/// - `FormatError::InvalidIndex` for an image or plane index out of range
/// - `FormatError::InvalidBounds` when the bounds have the wrong rank or leave
///   the planar extent
pub fn check_plane_request<'a>(
    metadata: &'a Metadata,
    image: usize,
    plane: u64,
    bounds: &Bounds,
) -> Result<&'a ImageMetadata, FormatError> {
    let image_meta = metadata.image(image)?;

    let count = image_meta.plane_count();
    if plane >= count {
        return Err(FormatError::InvalidIndex {
            what: "plane",
            index: plane,
            count,
        });
    }

    let lengths = image_meta.planar_lengths();
    if bounds.rank() != lengths.len() {
        return Err(FormatError::InvalidBounds(format!(
            "bounds have {} axes, image {} has {} planar axes",
            bounds.rank(),
            image,
            lengths.len()
        )));
    }
    if !bounds.fits_within(&lengths) {
        return Err(FormatError::InvalidBounds(format!(
            "bounds {:?}..{:?} exceed planar extent {:?}",
            bounds.min(),
            bounds.max(),
            lengths
        )));
    }
    Ok(image_meta)
}

/// Per-axis ranges of a region over an image's planar axes, resolved for the
/// X, Y and (planar) channel axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub x: (u64, u64),
    pub y: (u64, u64),
    /// Channel range; `(0, 1)` when channels are not planar
    pub c: (u64, u64),
}

impl Region {
    /// Resolve `bounds` against the planar axes of `image`.
    ///
    /// Only the X, Y and Channel axes may be planar; any other planar axis
    /// must be requested in full and have length 1.
    pub(crate) fn resolve(image: &ImageMetadata, bounds: &Bounds) -> Result<Self, FormatError> {
        use crate::metadata::AxisType;

        let mut region = Region {
            x: (0, 1),
            y: (0, 1),
            c: (0, 1),
        };
        for (i, axis) in image.planar_axes().iter().enumerate() {
            let range = (bounds.min()[i], bounds.max()[i]);
            match axis.axis_type {
                AxisType::X => region.x = range,
                AxisType::Y => region.y = range,
                AxisType::Channel => region.c = range,
                _ if axis.length == 1 => {}
                other => {
                    return Err(FormatError::InvalidBounds(format!(
                        "planar {} axis is not supported",
                        other
                    )))
                }
            }
        }
        Ok(region)
    }

    pub(crate) fn width(&self) -> u64 {
        self.x.1 - self.x.0
    }

    pub(crate) fn height(&self) -> u64 {
        self.y.1 - self.y.0
    }

    pub(crate) fn channels(&self) -> u64 {
        self.c.1 - self.c.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PixelType;

    fn metadata() -> Metadata {
        let mut meta = Metadata::new("TIFF");
        meta.add_image(
            ImageMetadata::with_dimensions(8, 4, 3, 5, 1, true, PixelType::Uint8).unwrap(),
        );
        meta
    }

    #[test]
    fn test_valid_request() {
        let meta = metadata();
        let bounds = Bounds::new(vec![0, 2, 1], vec![3, 6, 4]).unwrap();
        let image = check_plane_request(&meta, 0, 4, &bounds).unwrap();
        assert_eq!(image.plane_count(), 5);

        let region = Region::resolve(image, &bounds).unwrap();
        assert_eq!(region.x, (2, 6));
        assert_eq!(region.y, (1, 4));
        assert_eq!(region.channels(), 3);
        assert_eq!(region.width() * region.height(), 12);
    }

    #[test]
    fn test_invalid_requests() {
        let meta = metadata();
        let full = meta.image(0).unwrap().full_bounds();

        assert!(matches!(
            check_plane_request(&meta, 1, 0, &full),
            Err(FormatError::InvalidIndex { what: "image", .. })
        ));
        assert!(matches!(
            check_plane_request(&meta, 0, 5, &full),
            Err(FormatError::InvalidIndex {
                what: "plane",
                index: 5,
                count: 5
            })
        ));

        let wrong_rank = Bounds::new(vec![0, 0], vec![8, 4]).unwrap();
        assert!(matches!(
            check_plane_request(&meta, 0, 0, &wrong_rank),
            Err(FormatError::InvalidBounds(_))
        ));

        let too_wide = Bounds::new(vec![0, 0, 0], vec![3, 9, 4]).unwrap();
        assert!(matches!(
            check_plane_request(&meta, 0, 0, &too_wide),
            Err(FormatError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_source_format_check() {
        let meta = metadata();
        assert!(check_source_format("TIFF", &meta).is_ok());
        assert!(matches!(
            check_source_format("PNM", &meta),
            Err(FormatError::MetadataMismatch(_))
        ));
    }
}
