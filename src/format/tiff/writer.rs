//! TIFF output.
//!
//! Classic TIFF, one strip per plane. Each plane is appended as its strip
//! followed by its IFD; the previous IFD's next-offset (or the header's
//! first-IFD offset) is then patched in place to point at the new IFD, so the
//! file is valid after every plane.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{CodecOptions, CodecTable, Compression};
use crate::config::WriterConfig;
use crate::context::Context;
use crate::error::{FormatError, Result};
use crate::io::{DataHandle, Location, LocationService};
use crate::metadata::{Bounds, Metadata, PixelType, Plane};
use crate::writer::{reorder_samples, validate_dest, Writer, WriterState};

use super::format::TIFF_FORMAT_NAME;
use super::ifd::Ifd;
use super::parser::VERSION_TIFF;
use super::tags::{photometric, sample_format, TiffTag};
use super::values::TagValue;

const SOFTWARE: &str = concat!("scifmt ", env!("CARGO_PKG_VERSION"));

/// Offset of the first-IFD pointer in a classic TIFF header.
const FIRST_IFD_POINTER: u64 = 4;

/// Sequential TIFF writer.
pub struct TiffWriter {
    locations: Arc<LocationService>,
    codecs: Arc<CodecTable>,
    state: WriterState,
    /// Where the offset of the next IFD must be written
    next_ifd_pointer: u64,
}

impl TiffWriter {
    pub fn new(ctx: &Context) -> Self {
        Self {
            locations: Arc::clone(ctx.locations()),
            codecs: Arc::clone(ctx.codecs()),
            state: WriterState::new(TIFF_FORMAT_NAME),
            next_ifd_pointer: FIRST_IFD_POINTER,
        }
    }
}

impl Writer for TiffWriter {
    fn format_name(&self) -> &'static str {
        TIFF_FORMAT_NAME
    }

    fn set_metadata(&mut self, metadata: Metadata) -> Result<()> {
        self.state.set_metadata(metadata)
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.state.metadata()
    }

    fn set_dest(&mut self, location: &Location, image_index: usize, config: &WriterConfig) -> Result<()> {
        self.state.close_dest()?;
        let metadata = self.state.require_metadata()?;
        validate_dest(self, metadata, image_index, config)?;
        if config.compression == Compression::Jpeg {
            if let Some((i, image)) = metadata
                .images()
                .iter()
                .enumerate()
                .find(|(_, image)| !matches!(image.planar_channels(), 1 | 3))
            {
                return Err(FormatError::UnsupportedOperation {
                    format: TIFF_FORMAT_NAME,
                    message: format!(
                        "JPEG needs 1 or 3 interleaved channels, image {} has {}",
                        i,
                        image.planar_channels()
                    ),
                }
                .into());
            }
        }

        let dest = self
            .state
            .open_dest(&self.locations, location, image_index, config)?;
        let handle = &mut dest.handle;
        let magic: &[u8; 2] = if handle.is_little_endian() { b"II" } else { b"MM" };
        handle.write_bytes(magic)?;
        handle.write_u16(VERSION_TIFF)?;
        handle.write_u32(0)?;
        self.next_ifd_pointer = FIRST_IFD_POINTER;
        Ok(())
    }

    fn save_plane(
        &mut self,
        image: usize,
        plane: u64,
        data: &Plane,
        bounds: Option<&Bounds>,
    ) -> Result<()> {
        let target = self.state.begin_save(image, plane, data, bounds, true)?;
        let image_meta = target.image;
        if !target.bounds.is_full(&image_meta.planar_lengths()) {
            return Err(FormatError::UnsupportedOperation {
                format: TIFF_FORMAT_NAME,
                message: "only full planes can be written".to_string(),
            }
            .into());
        }

        let dest = target.dest;
        let compression = dest.config.compression;
        let little_endian = dest.handle.is_little_endian();
        let pixel_type = image_meta.pixel_type;
        let bytes_per_sample = pixel_type.bytes_per_pixel();
        let channels = image_meta.planar_channels() as u16;
        let (width, height) = (image_meta.width() as u32, image_meta.height() as u32);

        let samples = reorder_samples(
            data.data(),
            bytes_per_sample,
            data.is_little_endian(),
            little_endian,
        );
        let options = CodecOptions {
            width,
            height,
            bits_per_sample: (bytes_per_sample * 8) as u16,
            channels,
            little_endian,
            interleaved: true,
            signed: pixel_type.is_signed(),
            ..dest.config.codec_options.clone()
        };
        let encoded = self.codecs.encode(compression, &samples, &options)?;

        let strip_offset = append(&mut dest.handle, &encoded)?;

        let mut ifd = Ifd::new(dest.handle.byte_order());
        let subfile = if image_meta.thumbnail { 1 } else { 0 };
        ifd.set_tag(TiffTag::NewSubfileType, TagValue::Long(vec![subfile]));
        ifd.set_tag(TiffTag::ImageWidth, TagValue::Long(vec![width]));
        ifd.set_tag(TiffTag::ImageLength, TagValue::Long(vec![height]));
        ifd.set_tag(
            TiffTag::BitsPerSample,
            TagValue::Short(vec![options.bits_per_sample; channels as usize]),
        );
        ifd.set_tag(TiffTag::Compression, TagValue::Short(vec![compression.code()]));
        let (photometric, color_channels) = if channels >= 3 {
            (photometric::RGB, 3)
        } else {
            (photometric::MIN_IS_BLACK, 1)
        };
        ifd.set_tag(TiffTag::PhotometricInterpretation, TagValue::Short(vec![photometric]));
        if channels > color_channels {
            ifd.set_tag(
                TiffTag::ExtraSamples,
                TagValue::Short(vec![0; (channels - color_channels) as usize]),
            );
        }
        ifd.set_tag(TiffTag::StripOffsets, TagValue::Long(vec![to_u32(strip_offset)?]));
        ifd.set_tag(TiffTag::SamplesPerPixel, TagValue::Short(vec![channels]));
        ifd.set_tag(TiffTag::RowsPerStrip, TagValue::Long(vec![height]));
        ifd.set_tag(
            TiffTag::StripByteCounts,
            TagValue::Long(vec![to_u32(encoded.len() as u64)?]),
        );
        ifd.set_tag(TiffTag::PlanarConfiguration, TagValue::Short(vec![1]));
        ifd.set_tag(TiffTag::Software, TagValue::Ascii(SOFTWARE.to_string()));
        let format = if pixel_type.is_floating_point() {
            sample_format::IEEE_FP
        } else if pixel_type.is_signed() {
            sample_format::INT
        } else {
            sample_format::UINT
        };
        ifd.set_tag(TiffTag::SampleFormat, TagValue::Short(vec![format; channels as usize]));

        let (ifd_offset, next_pointer) = write_ifd(&mut dest.handle, &ifd)?;
        dest.handle.seek(self.next_ifd_pointer)?;
        dest.handle.write_u32(to_u32(ifd_offset)?)?;
        self.next_ifd_pointer = next_pointer;
        dest.mark_written(image, plane);

        debug!(
            image,
            plane,
            strip_offset,
            strip_bytes = encoded.len(),
            ifd_offset,
            "wrote TIFF plane"
        );
        Ok(())
    }

    fn can_do_stacks(&self) -> bool {
        true
    }

    fn write_sequential(&self) -> bool {
        true
    }

    fn compression_types(&self) -> Vec<Compression> {
        [
            Compression::Uncompressed,
            Compression::Lzw,
            Compression::Deflate,
            Compression::PackBits,
            Compression::Jpeg,
        ]
        .into_iter()
        .filter(|&c| self.codecs.can_encode(c))
        .collect()
    }

    fn pixel_types(&self, compression: Compression) -> Vec<PixelType> {
        match compression {
            Compression::Jpeg => vec![PixelType::Uint8],
            _ => PixelType::ALL.to_vec(),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.state.close_dest()
    }
}

fn to_u32(offset: u64) -> Result<u32, FormatError> {
    u32::try_from(offset).map_err(|_| FormatError::UnsupportedOperation {
        format: TIFF_FORMAT_NAME,
        message: format!("offset {} exceeds the 4 GiB classic TIFF limit", offset),
    })
}

/// Append `data` at the end of the file on a word boundary, returning its offset.
fn append(handle: &mut DataHandle, data: &[u8]) -> Result<u64> {
    let mut offset = handle.length()?;
    handle.seek(offset)?;
    if offset % 2 == 1 {
        handle.write_u8(0)?;
        offset += 1;
    }
    handle.write_bytes(data)?;
    Ok(offset)
}

/// Append a classic TIFF IFD with a zero next-offset.
///
/// Values longer than four bytes are stored right after the entry table.
/// Returns the IFD offset and the offset of its next-IFD pointer.
pub fn write_ifd(handle: &mut DataHandle, ifd: &Ifd) -> Result<(u64, u64)> {
    let order = handle.byte_order();
    let mut start = handle.length()?;
    handle.seek(start)?;
    if start % 2 == 1 {
        handle.write_u8(0)?;
        start += 1;
    }

    let count = ifd.len();
    let next_pointer = start + 2 + count as u64 * 12;
    let values_start = next_pointer + 4;

    let mut table = Vec::with_capacity(2 + count * 12 + 4);
    let mut values = Vec::new();
    table.extend_from_slice(&order.u16_bytes(count as u16));
    for (tag, value) in ifd.entries() {
        let bytes = value.encode(order);
        table.extend_from_slice(&order.u16_bytes(tag));
        table.extend_from_slice(&order.u16_bytes(value.field_type().as_u16()));
        table.extend_from_slice(&order.u32_bytes(value.count() as u32));
        if bytes.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..bytes.len()].copy_from_slice(&bytes);
            table.extend_from_slice(&inline);
        } else {
            let offset = to_u32(values_start + values.len() as u64)?;
            table.extend_from_slice(&order.u32_bytes(offset));
            values.extend_from_slice(&bytes);
            if values.len() % 2 == 1 {
                values.push(0);
            }
        }
    }
    table.extend_from_slice(&[0u8; 4]);
    to_u32(values_start + values.len() as u64)?;

    handle.write_bytes(&table)?;
    handle.write_bytes(&values)?;
    Ok((start, next_pointer))
}
