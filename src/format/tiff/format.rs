//! TIFF as a [`Format`]: detection, parsing and image derivation.

use std::ops::Range;

use serde_json::json;
use tracing::debug;

use crate::config::ParserConfig;
use crate::context::Context;
use crate::error::{FormatError, Result};
use crate::format::Format;
use crate::io::DataHandle;
use crate::metadata::{ImageMetadata, Metadata, PixelType};
use crate::parser::{FormatParser, Parser};
use crate::reader::Reader;
use crate::writer::Writer;

use super::ifd::Ifd;
use super::parser::{read_ifd_chain, TiffHeader};
use super::reader::TiffReader;
use super::tags::TiffTag;
use super::writer::TiffWriter;

/// Name recorded in TIFF metadata.
pub const TIFF_FORMAT_NAME: &str = "TIFF";

/// Classic and Big TIFF.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffFormat;

impl Format for TiffFormat {
    fn name(&self) -> &'static str {
        TIFF_FORMAT_NAME
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tif", "tiff", "tf2", "tf8", "btf"]
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_format(&self, header: &[u8]) -> bool {
        is_tiff_header(header)
    }

    fn create_parser(&self, ctx: &Context) -> Parser {
        Parser::new(ctx, Box::new(TiffParser))
    }

    fn create_reader(&self, ctx: &Context) -> Box<dyn Reader> {
        Box::new(TiffReader::new(ctx))
    }

    fn create_writer(&self, ctx: &Context) -> Option<Box<dyn Writer>> {
        Some(Box::new(TiffWriter::new(ctx)))
    }
}

/// Whether `header` starts with a classic or BigTIFF signature.
pub fn is_tiff_header(header: &[u8]) -> bool {
    matches!(
        header,
        [b'I', b'I', 42, 0, ..] | [b'M', b'M', 0, 42, ..] | [b'I', b'I', 43, 0, ..] | [b'M', b'M', 0, 43, ..]
    )
}

// =============================================================================
// Native Metadata
// =============================================================================

/// The structure a TIFF parse produces: the header and every IFD of the main
/// chain, in file order.
#[derive(Debug, Clone)]
pub struct TiffMetadata {
    pub header: TiffHeader,
    pub ifds: Vec<Ifd>,
}

impl TiffMetadata {
    /// IFD ranges making up each image.
    ///
    /// Consecutive IFDs of the same shape, sample layout and subfile type
    /// form one image whose planes run along Z.
    pub fn image_groups(&self) -> Vec<Range<usize>> {
        let mut groups: Vec<Range<usize>> = Vec::new();
        for (i, ifd) in self.ifds.iter().enumerate() {
            match groups.last_mut() {
                Some(group)
                    if self.ifds[group.start].same_shape(ifd)
                        && subfile_type(&self.ifds[group.start]) == subfile_type(ifd) =>
                {
                    group.end = i + 1;
                }
                _ => groups.push(i..i + 1),
            }
        }
        groups
    }
}

fn subfile_type(ifd: &Ifd) -> u64 {
    ifd.get_tag(TiffTag::NewSubfileType)
        .and_then(|v| v.first_u64())
        .unwrap_or(0)
}

/// Pixel type of an IFD's samples.
pub fn pixel_type_of(ifd: &Ifd) -> Result<PixelType, FormatError> {
    let bits = ifd.bits_per_sample();
    let first = bits[0];
    let kind = if ifd.is_float() {
        "float"
    } else if ifd.is_signed() {
        "signed"
    } else {
        "unsigned"
    };
    let unsupported = || FormatError::UnsupportedPixelType {
        pixel_type: format!("{}-bit {}", first, kind),
        context: "TIFF".to_string(),
    };

    if bits.iter().any(|&b| b != first) {
        return Err(FormatError::UnsupportedPixelType {
            pixel_type: format!("mixed {:?}-bit", bits),
            context: "TIFF".to_string(),
        });
    }
    PixelType::from_bits(first as u32, ifd.is_signed(), ifd.is_float()).ok_or_else(unsupported)
}

// =============================================================================
// Parser Hooks
// =============================================================================

/// Reads the header and IFD chain.
#[derive(Debug, Default)]
pub struct TiffParser;

impl FormatParser for TiffParser {
    fn format_name(&self) -> &'static str {
        TIFF_FORMAT_NAME
    }

    fn typed_parse(
        &mut self,
        handle: &mut DataHandle,
        metadata: &mut Metadata,
        _config: &ParserConfig,
    ) -> Result<()> {
        let header = TiffHeader::read(handle)?;
        let ifds = read_ifd_chain(handle, &header)?;
        if ifds.is_empty() {
            return Err(FormatError::Invalid {
                format: TIFF_FORMAT_NAME,
                message: "file contains no IFDs".to_string(),
            }
            .into());
        }
        debug!(
            ifds = ifds.len(),
            bigtiff = header.is_bigtiff,
            byte_order = ?header.byte_order,
            "parsed TIFF structure"
        );
        metadata.set_native(TiffMetadata { header, ifds });
        Ok(())
    }

    fn populate_image_metadata(&self, metadata: &mut Metadata, config: &ParserConfig) -> Result<()> {
        let native = metadata.native::<TiffMetadata>().ok_or_else(|| {
            FormatError::MetadataMismatch("metadata holds no TIFF structure".to_string())
        })?;

        let groups = native.image_groups();
        let multiple = groups.len() > 1;
        let mut images = Vec::with_capacity(groups.len());
        for (index, group) in groups.iter().enumerate() {
            let ifd = &native.ifds[group.start];
            let width = ifd.image_width()? as u64;
            let height = ifd.image_length()? as u64;
            let channels = ifd.samples_per_pixel() as u64;
            let interleaved = ifd.planar_configuration() != 2;

            let mut image = ImageMetadata::with_dimensions(
                width,
                height,
                channels,
                group.len() as u64,
                1,
                interleaved,
                pixel_type_of(ifd)?,
            )?;
            image.bits_per_pixel = ifd.bits_per_sample()[0] as u32;
            image.little_endian = ifd.is_little_endian();
            image.indexed = ifd.is_indexed();
            image.thumbnail = subfile_type(ifd) & 1 != 0;
            image.name = if multiple {
                format!("{} #{}", metadata.dataset_name(), index)
            } else {
                metadata.dataset_name().to_string()
            };
            if config.save_original_metadata {
                image.table = ifd.to_table();
            }
            images.push(image);
        }

        let summary = [
            ("ifd_count", json!(native.ifds.len())),
            ("bigtiff", json!(native.header.is_bigtiff)),
            ("little_endian", json!(native.header.byte_order.is_little_endian())),
        ];
        let description = native.ifds[0].description().map(str::to_string);

        metadata.set_images(images);
        let table = metadata.table_mut();
        table.clear();
        for (key, value) in summary {
            table.insert(key.to_string(), value);
        }
        if let Some(description) = description {
            table.insert("ImageDescription".to_string(), json!(description));
        }
        Ok(())
    }
}
