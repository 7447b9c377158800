//! Binary PGM (`P5`) and PPM (`P6`).
//!
//! A short text header (magic, width, height, maximum sample value separated
//! by whitespace or `#` comments) followed by raw samples, one byte each when
//! the maximum is below 256 and two big-endian bytes otherwise. The layout is
//! fixed, so the writer can place any row of any region directly.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::codec::Compression;
use crate::config::{ParserConfig, WriterConfig};
use crate::context::Context;
use crate::error::{FormatError, Result};
use crate::format::Format;
use crate::io::{ByteOrder, DataHandle, Location, LocationService};
use crate::metadata::{Bounds, ImageMetadata, Metadata, PixelType, Plane};
use crate::parser::{FormatParser, Parser};
use crate::reader::{check_plane_request, check_source_format, no_source, Reader, Region};
use crate::writer::{reorder_samples, validate_dest, Writer, WriterState};

pub const PNM_FORMAT_NAME: &str = "PNM";

/// Headers longer than this are rejected.
const MAX_HEADER_BYTES: u64 = 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct PnmFormat;

impl Format for PnmFormat {
    fn name(&self) -> &'static str {
        PNM_FORMAT_NAME
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pgm", "ppm", "pnm"]
    }

    fn is_format(&self, header: &[u8]) -> bool {
        matches!(header, [b'P', b'5' | b'6', space, ..] if space.is_ascii_whitespace())
    }

    fn create_parser(&self, ctx: &Context) -> Parser {
        Parser::new(ctx, Box::new(PnmParser))
    }

    fn create_reader(&self, _ctx: &Context) -> Box<dyn Reader> {
        Box::<PnmReader>::default()
    }

    fn create_writer(&self, ctx: &Context) -> Option<Box<dyn Writer>> {
        Some(Box::new(PnmWriter::new(ctx)))
    }
}

// =============================================================================
// Header
// =============================================================================

/// Parsed PNM header, stored as the native metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PnmHeader {
    pub width: u64,
    pub height: u64,
    /// 1 for `P5`, 3 for `P6`
    pub channels: u64,
    pub max_value: u32,
    /// Offset of the first sample
    pub data_offset: u64,
}

impl PnmHeader {
    pub fn new(width: u64, height: u64, channels: u64, pixel_type: PixelType) -> Self {
        let max_value = if pixel_type == PixelType::Uint8 { 255 } else { 65535 };
        let mut header = Self {
            width,
            height,
            channels,
            max_value,
            data_offset: 0,
        };
        header.data_offset = header.to_text().len() as u64;
        header
    }

    /// Parse a header from the start of a file.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let invalid = |message: &str| FormatError::Invalid {
            format: PNM_FORMAT_NAME,
            message: message.to_string(),
        };

        let channels = match bytes {
            [b'P', b'5', ..] => 1,
            [b'P', b'6', ..] => 3,
            _ => return Err(invalid("expected P5 or P6 magic")),
        };

        let mut pos = 2;
        let mut fields = [0u64; 3];
        for field in fields.iter_mut() {
            // Whitespace and comments before each number
            loop {
                match bytes.get(pos) {
                    Some(b) if b.is_ascii_whitespace() => pos += 1,
                    Some(b'#') => {
                        while bytes.get(pos).is_some_and(|&b| b != b'\n' && b != b'\r') {
                            pos += 1;
                        }
                    }
                    _ => break,
                }
            }
            let start = pos;
            while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
                pos += 1;
            }
            if start == pos {
                return Err(invalid("truncated or malformed header"));
            }
            *field = std::str::from_utf8(&bytes[start..pos])
                .ok()
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| invalid("header value out of range"))?;
        }
        // Exactly one whitespace byte separates the header from the samples
        if !bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            return Err(invalid("missing whitespace after maximum value"));
        }

        let [width, height, max_value] = fields;
        if width == 0 || height == 0 {
            return Err(invalid("zero image dimension"));
        }
        if !(1..=65535).contains(&max_value) {
            return Err(FormatError::Invalid {
                format: PNM_FORMAT_NAME,
                message: format!("maximum value {} outside 1..=65535", max_value),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            max_value: max_value as u32,
            data_offset: pos as u64 + 1,
        })
    }

    pub fn pixel_type(&self) -> PixelType {
        if self.max_value < 256 {
            PixelType::Uint8
        } else {
            PixelType::Uint16
        }
    }

    pub fn bytes_per_pixel(&self) -> u64 {
        self.channels * self.pixel_type().bytes_per_pixel() as u64
    }

    /// Bytes of sample data, or an error when the dimensions overflow.
    pub fn data_size(&self) -> Result<u64, FormatError> {
        self.width
            .checked_mul(self.height)
            .and_then(|pixels| pixels.checked_mul(self.bytes_per_pixel()))
            .ok_or_else(|| self.too_large())
    }

    /// Offset one past the last sample.
    pub fn data_end(&self) -> Result<u64, FormatError> {
        self.data_offset
            .checked_add(self.data_size()?)
            .ok_or_else(|| self.too_large())
    }

    fn too_large(&self) -> FormatError {
        FormatError::Invalid {
            format: PNM_FORMAT_NAME,
            message: format!("{}x{} image is too large", self.width, self.height),
        }
    }

    fn magic(&self) -> &'static str {
        if self.channels == 3 {
            "P6"
        } else {
            "P5"
        }
    }

    fn to_text(&self) -> String {
        format!("{}\n{} {}\n{}\n", self.magic(), self.width, self.height, self.max_value)
    }
}

// =============================================================================
// Parser
// =============================================================================

#[derive(Debug, Default)]
pub struct PnmParser;

impl FormatParser for PnmParser {
    fn format_name(&self) -> &'static str {
        PNM_FORMAT_NAME
    }

    fn typed_parse(
        &mut self,
        handle: &mut DataHandle,
        metadata: &mut Metadata,
        _config: &ParserConfig,
    ) -> Result<()> {
        let length = handle.length()?;
        let head = handle.read_bytes_at(0, length.min(MAX_HEADER_BYTES) as usize)?;
        let header = PnmHeader::parse(&head)?;

        let needed = header.data_end()?;
        if length < needed {
            return Err(FormatError::Invalid {
                format: PNM_FORMAT_NAME,
                message: format!("file is {} bytes, samples need {}", length, needed),
            }
            .into());
        }
        debug!(
            width = header.width,
            height = header.height,
            channels = header.channels,
            max_value = header.max_value,
            "parsed PNM header"
        );
        metadata.set_native(header);
        Ok(())
    }

    fn populate_image_metadata(&self, metadata: &mut Metadata, _config: &ParserConfig) -> Result<()> {
        let header = *metadata.native::<PnmHeader>().ok_or_else(|| {
            FormatError::MetadataMismatch("metadata holds no PNM header".to_string())
        })?;

        let mut image = ImageMetadata::with_dimensions(
            header.width,
            header.height,
            header.channels,
            1,
            1,
            true,
            header.pixel_type(),
        )?;
        image.bits_per_pixel = 32 - header.max_value.leading_zeros();
        image.little_endian = false;
        image.name = metadata.dataset_name().to_string();

        metadata.set_images(vec![image]);
        let table = metadata.table_mut();
        table.clear();
        table.insert("magic".to_string(), json!(header.magic()));
        table.insert("max_value".to_string(), json!(header.max_value));
        Ok(())
    }
}

// =============================================================================
// Reader
// =============================================================================

#[derive(Debug, Default)]
pub struct PnmReader {
    handle: Option<DataHandle>,
    metadata: Option<Metadata>,
}

impl Reader for PnmReader {
    fn format_name(&self) -> &'static str {
        PNM_FORMAT_NAME
    }

    fn set_source(&mut self, handle: DataHandle, metadata: Metadata) -> Result<()> {
        check_source_format(PNM_FORMAT_NAME, &metadata)?;
        if metadata.native::<PnmHeader>().is_none() {
            return Err(FormatError::MetadataMismatch("metadata holds no PNM header".to_string()).into());
        }
        if let Some(mut previous) = self.handle.take() {
            previous.close()?;
        }
        self.handle = Some(handle);
        self.metadata = Some(metadata);
        Ok(())
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    fn open_region(&mut self, image: usize, plane: u64, bounds: &Bounds) -> Result<Plane> {
        let metadata = self.metadata.as_ref().ok_or_else(no_source)?;
        let handle = self.handle.as_mut().ok_or_else(no_source)?;
        let image_meta = check_plane_request(metadata, image, plane, bounds)?;
        let region = Region::resolve(image_meta, bounds)?;
        let header = metadata.native::<PnmHeader>().ok_or_else(no_source)?;

        let sample_bytes = header.pixel_type().bytes_per_pixel();
        let pixel_bytes = header.bytes_per_pixel() as usize;
        let row_bytes = region.width() as usize * pixel_bytes;
        let out_pixel = region.channels() as usize * sample_bytes;
        let channel_offset = region.c.0 as usize * sample_bytes;

        let mut out = Vec::with_capacity(region.width() as usize * region.height() as usize * out_pixel);
        for y in region.y.0..region.y.1 {
            let offset = header.data_offset + (y * header.width + region.x.0) * pixel_bytes as u64;
            let row = handle.read_bytes_at(offset, row_bytes)?;
            if out_pixel == pixel_bytes {
                out.extend_from_slice(&row);
            } else {
                for pixel in row.chunks_exact(pixel_bytes) {
                    out.extend_from_slice(&pixel[channel_offset..channel_offset + out_pixel]);
                }
            }
        }

        Ok(Plane::new(
            out,
            bounds.clone(),
            image_meta.pixel_type,
            region.channels(),
            image_meta.interleaved,
            false,
        )?)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut handle) = self.handle.take() {
            handle.close()?;
        }
        Ok(())
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Random-access PNM writer. The file is sized up front; regions can then be
/// written in any order.
pub struct PnmWriter {
    locations: Arc<LocationService>,
    state: WriterState,
    header: Option<PnmHeader>,
}

impl PnmWriter {
    pub fn new(ctx: &Context) -> Self {
        Self {
            locations: Arc::clone(ctx.locations()),
            state: WriterState::new(PNM_FORMAT_NAME),
            header: None,
        }
    }
}

impl Writer for PnmWriter {
    fn format_name(&self) -> &'static str {
        PNM_FORMAT_NAME
    }

    fn set_metadata(&mut self, metadata: Metadata) -> Result<()> {
        self.header = None;
        self.state.set_metadata(metadata)
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.state.metadata()
    }

    fn set_dest(&mut self, location: &Location, image_index: usize, config: &WriterConfig) -> Result<()> {
        self.state.close_dest()?;
        self.header = None;
        let metadata = self.state.require_metadata()?;
        validate_dest(self, metadata, image_index, config)?;

        let image = metadata.image(image_index)?;
        let channels = image.channels();
        if !matches!(channels, 1 | 3) || image.planar_channels() != channels {
            return Err(FormatError::UnsupportedOperation {
                format: PNM_FORMAT_NAME,
                message: format!(
                    "needs 1 or 3 interleaved channels, image {} has {} ({} per plane)",
                    image_index,
                    channels,
                    image.planar_channels()
                ),
            }
            .into());
        }
        let header = PnmHeader::new(image.width(), image.height(), channels, image.pixel_type);
        let data_end = header.data_end()?;

        let dest = self
            .state
            .open_dest(&self.locations, location, image_index, config)?;
        dest.handle.set_byte_order(ByteOrder::BigEndian);
        dest.handle.write_bytes(header.to_text().as_bytes())?;
        dest.handle.set_length(data_end)?;
        self.header = Some(header);
        Ok(())
    }

    fn save_plane(
        &mut self,
        image: usize,
        plane: u64,
        data: &Plane,
        bounds: Option<&Bounds>,
    ) -> Result<()> {
        let header = self
            .header
            .ok_or_else(|| FormatError::NotInitialized("save_plane called before set_dest".to_string()))?;
        let mut target = self.state.begin_save(image, plane, data, bounds, false)?;
        if image != target.dest.image_index {
            return Err(FormatError::UnsupportedOperation {
                format: PNM_FORMAT_NAME,
                message: format!(
                    "destination holds image {}, not image {}",
                    target.dest.image_index, image
                ),
            }
            .into());
        }
        let region = Region::resolve(target.image, &target.bounds)?;
        if region.channels() != header.channels {
            return Err(FormatError::UnsupportedOperation {
                format: PNM_FORMAT_NAME,
                message: "regions must cover every channel".to_string(),
            }
            .into());
        }

        let samples = reorder_samples(
            data.data(),
            header.pixel_type().bytes_per_pixel(),
            data.is_little_endian(),
            false,
        );
        let pixel_bytes = header.bytes_per_pixel();
        let row_bytes = (region.width() * pixel_bytes) as usize;
        let handle = &mut target.dest.handle;
        for (row, y) in samples.chunks_exact(row_bytes).zip(region.y.0..region.y.1) {
            handle.seek(header.data_offset + (y * header.width + region.x.0) * pixel_bytes)?;
            handle.write_bytes(row)?;
        }
        target.dest.mark_written(image, plane);
        debug!(image, x = region.x.0, y = region.y.0, width = region.width(), height = region.height(), "wrote PNM region");
        Ok(())
    }

    fn can_do_stacks(&self) -> bool {
        false
    }

    fn write_sequential(&self) -> bool {
        false
    }

    fn compression_types(&self) -> Vec<Compression> {
        vec![Compression::Uncompressed]
    }

    fn pixel_types(&self, _compression: Compression) -> Vec<PixelType> {
        vec![PixelType::Uint8, PixelType::Uint16]
    }

    fn close(&mut self) -> Result<()> {
        self.header = None;
        self.state.close_dest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection() {
        let format = PnmFormat;
        assert!(format.is_format(b"P5\n2 2\n255\n"));
        assert!(format.is_format(b"P6 1 1 255 "));
        assert!(!format.is_format(b"P4\n"));
        assert!(!format.is_format(b"P5"));
        assert!(!format.is_format(b"II*\0"));
    }

    #[test]
    fn test_header_with_comments() {
        let header = PnmHeader::parse(b"P6\n# created by hand\n3 2 # size\n65535\n\x00\x01").unwrap();
        assert_eq!((header.width, header.height, header.channels), (3, 2, 3));
        assert_eq!(header.max_value, 65535);
        assert_eq!(header.pixel_type(), PixelType::Uint16);
        assert_eq!(header.data_offset, 38);
        assert_eq!(header.data_size().unwrap(), 36);
    }

    #[test]
    fn test_overflowing_dimensions_are_invalid() {
        let header = PnmHeader::parse(b"P6\n99999999999 99999999999\n65535\n").unwrap();
        assert!(matches!(header.data_size(), Err(FormatError::Invalid { .. })));
        assert!(header.data_end().is_err());
    }

    #[test]
    fn test_header_errors() {
        for bad in [
            &b"P3\n1 1\n255\n"[..],
            b"P5\n1\n",
            b"P5\n0 1\n255\n",
            b"P5\n1 1\n70000\n",
            b"P5\n1 1\n255",
        ] {
            assert!(
                matches!(PnmHeader::parse(bad), Err(FormatError::Invalid { .. })),
                "{:?}",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn test_written_header_parses() {
        let header = PnmHeader::new(640, 480, 1, PixelType::Uint8);
        let parsed = PnmHeader::parse(header.to_text().as_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_populate() {
        let mut metadata = Metadata::new(PNM_FORMAT_NAME);
        metadata.set_dataset_name("rgb.ppm");
        metadata.set_native(PnmHeader::parse(b"P6\n4 2\n1023\n").unwrap());
        PnmParser
            .populate_image_metadata(&mut metadata, &ParserConfig::default())
            .unwrap();

        let image = metadata.image(0).unwrap();
        assert_eq!(image.pixel_type, PixelType::Uint16);
        assert_eq!(image.bits_per_pixel, 10);
        assert_eq!(image.planar_lengths(), vec![3, 4, 2]);
        assert_eq!(image.plane_count(), 1);
        assert!(!image.little_endian);
        assert_eq!(metadata.table()["magic"], json!("P6"));
    }
}
