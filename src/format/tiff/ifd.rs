//! Image File Directories.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::TiffError;
use crate::io::ByteOrder;

use super::tags::{sample_format, TiffTag};
use super::values::TagValue;

/// One IFD: tag values keyed by tag id, plus the byte order they were read in.
#[derive(Debug, Clone, PartialEq)]
pub struct Ifd {
    entries: BTreeMap<u16, TagValue>,
    byte_order: ByteOrder,
    /// File offset the IFD was read from (0 for IFDs built in memory)
    offset: u64,
}

impl Ifd {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            entries: BTreeMap::new(),
            byte_order,
            offset: 0,
        }
    }

    pub(crate) fn with_offset(byte_order: ByteOrder, offset: u64) -> Self {
        Self {
            offset,
            ..Self::new(byte_order)
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn is_little_endian(&self) -> bool {
        self.byte_order.is_little_endian()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get(&self, tag: u16) -> Option<&TagValue> {
        self.entries.get(&tag)
    }

    pub fn get_tag(&self, tag: TiffTag) -> Option<&TagValue> {
        self.get(tag.as_u16())
    }

    pub fn set(&mut self, tag: u16, value: TagValue) {
        self.entries.insert(tag, value);
    }

    pub fn set_tag(&mut self, tag: TiffTag, value: TagValue) {
        self.set(tag.as_u16(), value);
    }

    /// Entries in ascending tag order.
    pub fn entries(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.entries.iter().map(|(&tag, value)| (tag, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // =========================================================================
    // Typed Accessors
    // =========================================================================

    fn required_u64(&self, tag: TiffTag) -> Result<u64, TiffError> {
        let value = self.get_tag(tag).ok_or(TiffError::MissingTag(tag.name()))?;
        value.first_u64().ok_or_else(|| TiffError::InvalidTagValue {
            tag: tag.name(),
            message: format!("expected an unsigned integer, got {:?}", value.field_type()),
        })
    }

    fn optional_u16(&self, tag: TiffTag, default: u16) -> u16 {
        self.get_tag(tag)
            .and_then(TagValue::first_u64)
            .map(|v| v as u16)
            .unwrap_or(default)
    }

    fn required_u32(&self, tag: TiffTag) -> Result<u32, TiffError> {
        let value = self.required_u64(tag)?;
        u32::try_from(value).map_err(|_| TiffError::InvalidTagValue {
            tag: tag.name(),
            message: format!("{} does not fit in 32 bits", value),
        })
    }

    pub fn image_width(&self) -> Result<u32, TiffError> {
        self.required_u32(TiffTag::ImageWidth)
    }

    pub fn image_length(&self) -> Result<u32, TiffError> {
        self.required_u32(TiffTag::ImageLength)
    }

    /// Bits per sample, one entry per sample; defaults to `[1]`.
    pub fn bits_per_sample(&self) -> Vec<u16> {
        self.get_tag(TiffTag::BitsPerSample)
            .and_then(TagValue::as_u64_vec)
            .filter(|v| !v.is_empty())
            .map(|v| v.into_iter().map(|b| b as u16).collect())
            .unwrap_or_else(|| vec![1])
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.optional_u16(TiffTag::SamplesPerPixel, 1).max(1)
    }

    /// Raw `Compression` tag value; 1 when absent.
    pub fn compression_code(&self) -> u16 {
        self.optional_u16(TiffTag::Compression, 1)
    }

    pub fn photometric(&self) -> Option<u16> {
        self.get_tag(TiffTag::PhotometricInterpretation)
            .and_then(TagValue::first_u64)
            .map(|v| v as u16)
    }

    pub fn sample_format(&self) -> u16 {
        self.optional_u16(TiffTag::SampleFormat, sample_format::UINT)
    }

    pub fn is_signed(&self) -> bool {
        self.sample_format() == sample_format::INT
    }

    pub fn is_float(&self) -> bool {
        self.sample_format() == sample_format::IEEE_FP
    }

    /// 1 = chunky (interleaved), 2 = planar (one sample per chunk set)
    pub fn planar_configuration(&self) -> u16 {
        self.optional_u16(TiffTag::PlanarConfiguration, 1)
    }

    pub fn predictor(&self) -> u16 {
        self.optional_u16(TiffTag::Predictor, 1)
    }

    pub fn is_tiled(&self) -> bool {
        self.get_tag(TiffTag::TileOffsets).is_some()
    }

    pub fn is_indexed(&self) -> bool {
        self.photometric() == Some(super::tags::photometric::PALETTE)
            && self.get_tag(TiffTag::ColorMap).is_some()
    }

    /// Width and height of one strip or tile.
    pub fn chunk_size(&self) -> Result<(u32, u32), TiffError> {
        if self.is_tiled() {
            Ok((
                self.required_u32(TiffTag::TileWidth)?,
                self.required_u32(TiffTag::TileLength)?,
            ))
        } else {
            let height = self.image_length()?;
            let rows = self
                .get_tag(TiffTag::RowsPerStrip)
                .and_then(TagValue::first_u64)
                .map(|r| r.min(height as u64) as u32)
                .unwrap_or(height);
            Ok((self.image_width()?, rows.max(1)))
        }
    }

    /// Number of chunks across and down the image.
    pub fn chunk_grid(&self) -> Result<(u32, u32), TiffError> {
        let (chunk_width, chunk_height) = self.chunk_size()?;
        let (width, height) = (self.image_width()?, self.image_length()?);
        if chunk_width == 0 || chunk_height == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: if self.is_tiled() { "TileWidth" } else { "RowsPerStrip" },
                message: "chunk dimension is zero".to_string(),
            });
        }
        Ok((width.div_ceil(chunk_width), height.div_ceil(chunk_height)))
    }

    /// Strip or tile offsets.
    pub fn chunk_offsets(&self) -> Result<Vec<u64>, TiffError> {
        let tag = if self.is_tiled() {
            TiffTag::TileOffsets
        } else {
            TiffTag::StripOffsets
        };
        self.u64_array(tag)
    }

    /// Strip or tile byte counts.
    pub fn chunk_byte_counts(&self) -> Result<Vec<u64>, TiffError> {
        let tag = if self.is_tiled() {
            TiffTag::TileByteCounts
        } else {
            TiffTag::StripByteCounts
        };
        self.u64_array(tag)
    }

    fn u64_array(&self, tag: TiffTag) -> Result<Vec<u64>, TiffError> {
        let value = self.get_tag(tag).ok_or(TiffError::MissingTag(tag.name()))?;
        value.as_u64_vec().ok_or_else(|| TiffError::InvalidTagValue {
            tag: tag.name(),
            message: format!("expected unsigned integers, got {:?}", value.field_type()),
        })
    }

    pub fn jpeg_tables(&self) -> Option<&[u8]> {
        self.get_tag(TiffTag::JpegTables).and_then(TagValue::as_bytes)
    }

    pub fn description(&self) -> Option<&str> {
        self.get_tag(TiffTag::ImageDescription).and_then(TagValue::as_str)
    }

    /// Whether two IFDs describe images of the same shape and sample layout.
    pub fn same_shape(&self, other: &Ifd) -> bool {
        self.image_width().ok() == other.image_width().ok()
            && self.image_length().ok() == other.image_length().ok()
            && self.bits_per_sample() == other.bits_per_sample()
            && self.samples_per_pixel() == other.samples_per_pixel()
            && self.sample_format() == other.sample_format()
            && self.planar_configuration() == other.planar_configuration()
    }

    /// Tag table for the dataset metadata, keyed by tag name (or id for
    /// unknown tags). Offset arrays are left out.
    pub fn to_table(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .filter(|(&tag, _)| {
                !matches!(
                    TiffTag::from_u16(tag),
                    Some(
                        TiffTag::StripOffsets
                            | TiffTag::StripByteCounts
                            | TiffTag::TileOffsets
                            | TiffTag::TileByteCounts
                            | TiffTag::JpegTables
                    )
                )
            })
            .map(|(&tag, value)| {
                let name = TiffTag::from_u16(tag)
                    .map(|t| t.name().to_string())
                    .unwrap_or_else(|| tag.to_string());
                (name, value.to_json())
            })
            .collect()
    }
}
