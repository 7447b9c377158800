//! Decoded pixel buffers.

use bytes::Bytes;
use serde::Serialize;

use crate::error::FormatError;

use super::pixel::PixelType;

/// Rectangular region over the planar axes of an image.
///
/// `min` is inclusive and `max` exclusive, one entry per planar axis, in the
/// image's axis order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Bounds {
    min: Vec<u64>,
    max: Vec<u64>,
}

impl Bounds {
    pub fn new(min: Vec<u64>, max: Vec<u64>) -> Result<Self, FormatError> {
        if min.len() != max.len() {
            return Err(FormatError::InvalidBounds(format!(
                "min has {} axes, max has {}",
                min.len(),
                max.len()
            )));
        }
        if let Some(axis) = min.iter().zip(&max).position(|(lo, hi)| lo >= hi) {
            return Err(FormatError::InvalidBounds(format!(
                "axis {} is empty: [{}, {})",
                axis, min[axis], max[axis]
            )));
        }
        Ok(Self { min, max })
    }

    /// Bounds covering `lengths` entirely.
    pub fn full(lengths: &[u64]) -> Self {
        Self {
            min: vec![0; lengths.len()],
            max: lengths.to_vec(),
        }
    }

    pub fn min(&self) -> &[u64] {
        &self.min
    }

    pub fn max(&self) -> &[u64] {
        &self.max
    }

    pub fn rank(&self) -> usize {
        self.min.len()
    }

    pub fn extents(&self) -> Vec<u64> {
        self.min.iter().zip(&self.max).map(|(lo, hi)| hi - lo).collect()
    }

    pub fn element_count(&self) -> u64 {
        self.extents().iter().product()
    }

    /// Whether the region lies inside an extent of `lengths`.
    pub fn fits_within(&self, lengths: &[u64]) -> bool {
        self.rank() == lengths.len() && self.max.iter().zip(lengths).all(|(hi, len)| hi <= len)
    }

    /// Whether the region covers all of `lengths`.
    pub fn is_full(&self, lengths: &[u64]) -> bool {
        self.rank() == lengths.len()
            && self.min.iter().all(|&lo| lo == 0)
            && self.max.as_slice() == lengths
    }
}

/// Decoded samples for one region of one plane.
///
/// Samples are laid out following the image's planar axis order with the
/// first axis varying fastest, in the recorded byte order.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    data: Bytes,
    bounds: Bounds,
    pixel_type: PixelType,
    channels: u64,
    interleaved: bool,
    little_endian: bool,
}

impl Plane {
    /// Wrap a buffer, checking its size against the bounds and pixel type.
    pub fn new(
        data: impl Into<Bytes>,
        bounds: Bounds,
        pixel_type: PixelType,
        channels: u64,
        interleaved: bool,
        little_endian: bool,
    ) -> Result<Self, FormatError> {
        let data = data.into();
        let expected = bounds.element_count() as usize * pixel_type.bytes_per_pixel();
        if data.len() != expected {
            return Err(FormatError::InvalidBounds(format!(
                "plane buffer is {} bytes, bounds {:?}..{:?} of {} need {}",
                data.len(),
                bounds.min(),
                bounds.max(),
                pixel_type,
                expected
            )));
        }
        Ok(Self {
            data,
            bounds,
            pixel_type,
            channels: channels.max(1),
            interleaved,
            little_endian,
        })
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn channels(&self) -> u64 {
        self.channels
    }

    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }
}
