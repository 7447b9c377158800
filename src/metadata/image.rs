//! Per-image metadata.

use serde::Serialize;

use crate::error::FormatError;

use super::axis::{Axis, AxisType};
use super::pixel::PixelType;
use super::plane::Bounds;
use super::MetaTable;

/// Shape and sample layout of one image in a dataset.
///
/// The first `planar_axis_count` axes describe one plane; the remaining axes
/// enumerate planes, the first of them varying fastest. Axes that are absent
/// report length 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    axes: Vec<Axis>,
    planar_axis_count: usize,
    pub pixel_type: PixelType,
    /// Significant bits per sample (may be less than the storage width)
    pub bits_per_pixel: u32,
    /// Whether the channel axis is planar and leads the X axis
    pub interleaved: bool,
    /// Whether samples index a color table
    pub indexed: bool,
    pub little_endian: bool,
    pub name: String,
    pub thumbnail: bool,
    pub table: MetaTable,
}

impl ImageMetadata {
    /// Build from an explicit axis list.
    ///
    /// # Errors
    /// `FormatError::Invalid` if X or Y is missing, if an axis type repeats, or
    /// if `planar_axis_count` exceeds the number of axes or leaves X or Y out
    /// of the planar set.
    pub fn new(
        axes: Vec<Axis>,
        planar_axis_count: usize,
        pixel_type: PixelType,
    ) -> Result<Self, FormatError> {
        let image = Self {
            axes,
            planar_axis_count,
            pixel_type,
            bits_per_pixel: pixel_type.bits(),
            interleaved: false,
            indexed: false,
            little_endian: false,
            name: String::new(),
            thumbnail: false,
            table: MetaTable::new(),
        };
        image.validate()?;
        Ok(image)
    }

    /// Common layout: X, Y, then optional channel (planar when
    /// `interleaved`), Z and T axes of length > 1.
    pub fn with_dimensions(
        width: u64,
        height: u64,
        channels: u64,
        z: u64,
        t: u64,
        interleaved: bool,
        pixel_type: PixelType,
    ) -> Result<Self, FormatError> {
        let mut axes = Vec::with_capacity(5);
        let mut planar = 2;
        if channels > 1 && interleaved {
            axes.push(Axis::new(AxisType::Channel, channels));
            planar = 3;
        }
        axes.push(Axis::new(AxisType::X, width));
        axes.push(Axis::new(AxisType::Y, height));
        if channels > 1 && !interleaved {
            axes.push(Axis::new(AxisType::Channel, channels));
        }
        if z > 1 {
            axes.push(Axis::new(AxisType::Z, z));
        }
        if t > 1 {
            axes.push(Axis::new(AxisType::Time, t));
        }

        let mut image = Self::new(axes, planar, pixel_type)?;
        image.interleaved = interleaved && channels > 1;
        Ok(image)
    }

    pub fn validate(&self) -> Result<(), FormatError> {
        let invalid = |message: String| FormatError::Invalid {
            format: "image metadata",
            message,
        };

        for required in [AxisType::X, AxisType::Y] {
            match self.axis_index(required) {
                None => return Err(invalid(format!("missing {} axis", required))),
                Some(i) if i >= self.planar_axis_count => {
                    return Err(invalid(format!("{} axis is not planar", required)))
                }
                Some(_) => {}
            }
        }
        if self.planar_axis_count > self.axes.len() {
            return Err(invalid(format!(
                "{} planar axes but only {} axes",
                self.planar_axis_count,
                self.axes.len()
            )));
        }
        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[..i].iter().any(|a| a.axis_type == axis.axis_type) {
                return Err(invalid(format!("duplicate {} axis", axis.axis_type)));
            }
            if axis.length == 0 {
                return Err(invalid(format!("{} axis has length 0", axis.axis_type)));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Axes
    // =========================================================================

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn planar_axis_count(&self) -> usize {
        self.planar_axis_count
    }

    pub fn planar_axes(&self) -> &[Axis] {
        &self.axes[..self.planar_axis_count]
    }

    pub fn non_planar_axes(&self) -> &[Axis] {
        &self.axes[self.planar_axis_count..]
    }

    pub fn axis_index(&self, axis_type: AxisType) -> Option<usize> {
        self.axes.iter().position(|a| a.axis_type == axis_type)
    }

    /// Length of an axis; 1 when the image has no such axis.
    pub fn axis_length(&self, axis_type: AxisType) -> u64 {
        self.axis_index(axis_type)
            .map(|i| self.axes[i].length)
            .unwrap_or(1)
    }

    /// Append an axis after the existing ones (non-planar).
    pub fn push_axis(&mut self, axis: Axis) -> Result<(), FormatError> {
        self.axes.push(axis);
        if let Err(e) = self.validate() {
            self.axes.pop();
            return Err(e);
        }
        Ok(())
    }

    pub fn set_axis_length(&mut self, axis_type: AxisType, length: u64) -> Result<(), FormatError> {
        match self.axis_index(axis_type) {
            Some(i) if length > 0 => {
                self.axes[i].length = length;
                Ok(())
            }
            Some(_) => Err(FormatError::Invalid {
                format: "image metadata",
                message: format!("{} axis length must be positive", axis_type),
            }),
            None => self.push_axis(Axis::new(axis_type, length)),
        }
    }

    pub fn width(&self) -> u64 {
        self.axis_length(AxisType::X)
    }

    pub fn height(&self) -> u64 {
        self.axis_length(AxisType::Y)
    }

    pub fn channels(&self) -> u64 {
        self.axis_length(AxisType::Channel)
    }

    /// Channels stored within each plane: the channel count when interleaved,
    /// otherwise 1.
    pub fn planar_channels(&self) -> u64 {
        match self.axis_index(AxisType::Channel) {
            Some(i) if i < self.planar_axis_count => self.axes[i].length,
            _ => 1,
        }
    }

    // =========================================================================
    // Planes
    // =========================================================================

    /// Number of addressable planes: the product of non-planar axis lengths.
    pub fn plane_count(&self) -> u64 {
        self.non_planar_axes().iter().map(|a| a.length).product()
    }

    pub fn planar_lengths(&self) -> Vec<u64> {
        self.planar_axes().iter().map(|a| a.length).collect()
    }

    pub fn full_bounds(&self) -> Bounds {
        Bounds::full(&self.planar_lengths())
    }

    /// Bytes in one full plane.
    pub fn plane_size(&self) -> u64 {
        self.planar_lengths()
            .iter()
            .fold(self.pixel_type.bytes_per_pixel() as u64, |acc, l| {
                acc.saturating_mul(*l)
            })
    }

    /// Positions along the non-planar axes for a plane index.
    pub fn plane_position(&self, plane_index: u64) -> Result<Vec<u64>, FormatError> {
        let count = self.plane_count();
        if plane_index >= count {
            return Err(FormatError::InvalidIndex {
                what: "plane",
                index: plane_index,
                count,
            });
        }
        let mut remaining = plane_index;
        Ok(self
            .non_planar_axes()
            .iter()
            .map(|axis| {
                let position = remaining % axis.length;
                remaining /= axis.length;
                position
            })
            .collect())
    }

    /// Plane index for positions along the non-planar axes.
    pub fn plane_index(&self, position: &[u64]) -> Result<u64, FormatError> {
        let axes = self.non_planar_axes();
        if position.len() != axes.len() {
            return Err(FormatError::InvalidBounds(format!(
                "expected {} plane coordinates, got {}",
                axes.len(),
                position.len()
            )));
        }
        let mut index = 0;
        let mut stride = 1;
        for (axis, &p) in axes.iter().zip(position) {
            if p >= axis.length {
                return Err(FormatError::InvalidIndex {
                    what: axis.axis_type.label(),
                    index: p,
                    count: axis.length,
                });
            }
            index += p * stride;
            stride *= axis.length;
        }
        Ok(index)
    }

    /// Position along one non-planar axis for a plane index; 0 for planar or
    /// absent axes.
    pub fn position_along(&self, plane_index: u64, axis_type: AxisType) -> Result<u64, FormatError> {
        let position = self.plane_position(plane_index)?;
        Ok(self
            .axis_index(axis_type)
            .filter(|&i| i >= self.planar_axis_count)
            .map(|i| position[i - self.planar_axis_count])
            .unwrap_or(0))
    }
}
