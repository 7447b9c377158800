//! Plane decoding for TIFF.
//!
//! A plane maps to one IFD (and, for planar configuration 2, one sample of
//! it). The strips or tiles intersecting the requested region are read,
//! JPEG tables merged where needed, decoded through the codec table, the
//! horizontal predictor undone and the intersection copied into the output.

use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

use crate::codec::{jpeg, CodecTable, Compression};
use crate::context::Context;
use crate::error::{CodecError, FormatError, Result, TiffError};
use crate::io::{ByteOrder, DataHandle};
use crate::metadata::{AxisType, Bounds, Metadata, Plane};
use crate::reader::{check_plane_request, check_source_format, no_source, Reader, Region};

use super::format::{TiffMetadata, TIFF_FORMAT_NAME};
use super::ifd::Ifd;

/// Reader for TIFF datasets.
pub struct TiffReader {
    codecs: Arc<CodecTable>,
    handle: Option<DataHandle>,
    metadata: Option<Metadata>,
    groups: Vec<Range<usize>>,
}

impl TiffReader {
    pub fn new(ctx: &Context) -> Self {
        Self {
            codecs: Arc::clone(ctx.codecs()),
            handle: None,
            metadata: None,
            groups: Vec::new(),
        }
    }
}

impl Reader for TiffReader {
    fn format_name(&self) -> &'static str {
        TIFF_FORMAT_NAME
    }

    fn set_source(&mut self, handle: DataHandle, metadata: Metadata) -> Result<()> {
        check_source_format(TIFF_FORMAT_NAME, &metadata)?;
        let native = metadata.native::<TiffMetadata>().ok_or_else(|| {
            FormatError::MetadataMismatch("metadata holds no TIFF structure".to_string())
        })?;
        self.groups = native.image_groups();
        if self.groups.len() != metadata.image_count() {
            return Err(FormatError::MetadataMismatch(format!(
                "{} IFD groups but {} images",
                self.groups.len(),
                metadata.image_count()
            ))
            .into());
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

        let native = metadata.native::<TiffMetadata>().ok_or_else(|| {
            FormatError::MetadataMismatch("metadata holds no TIFF structure".to_string())
        })?;
        let z = image_meta.position_along(plane, AxisType::Z)?;
        let sample = if image_meta.interleaved {
            0
        } else {
            image_meta.position_along(plane, AxisType::Channel)?
        };
        let ifd = &native.ifds[self.groups[image].start + z as usize];
        trace!(image, plane, ifd = self.groups[image].start + z as usize, sample, "opening region");

        let data = read_region(handle, &self.codecs, ifd, sample, &region)?;
        Ok(Plane::new(
            data,
            bounds.clone(),
            image_meta.pixel_type,
            region.channels(),
            image_meta.interleaved,
            ifd.is_little_endian(),
        )?)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut handle) = self.handle.take() {
            handle.close()?;
        }
        Ok(())
    }
}

fn is_jpeg(compression: Compression) -> bool {
    matches!(
        compression,
        Compression::OldJpeg | Compression::Jpeg | Compression::AltJpeg
    )
}

/// Decode the part of one IFD (one sample of it when planar) covered by
/// `region` into a buffer laid out channel-fastest, then X, then Y.
/// Product of `factors` as a buffer length, failing instead of overflowing.
fn checked_len(factors: &[u64], what: &str) -> Result<usize> {
    factors
        .iter()
        .try_fold(1u64, |acc, &f| acc.checked_mul(f))
        .and_then(|len| usize::try_from(len).ok())
        .ok_or_else(|| {
            FormatError::Invalid {
                format: TIFF_FORMAT_NAME,
                message: format!("{} size overflows: {:?}", what, factors),
            }
            .into()
        })
}

/// A zero-filled buffer, or an error when the allocation is refused.
fn zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| FormatError::Invalid {
        format: TIFF_FORMAT_NAME,
        message: format!("cannot allocate {} bytes: {}", len, e),
    })?;
    buf.resize(len, 0);
    Ok(buf)
}

fn read_region(
    handle: &mut DataHandle,
    codecs: &CodecTable,
    ifd: &Ifd,
    sample: u64,
    region: &Region,
) -> Result<Vec<u8>> {
    let compression = Compression::from_code(ifd.compression_code())?;
    let mut options = codecs.derive_options(ifd, None)?;

    let samples = ifd.samples_per_pixel() as usize;
    let planar = ifd.planar_configuration() == 2;
    let chunk_channels = if planar { 1 } else { samples };
    let bytes_per_sample = options.bytes_per_sample();
    let pixel_bytes = chunk_channels * bytes_per_sample;

    let image_height = ifd.image_length()? as u64;
    let (chunk_width, chunk_height) = ifd.chunk_size()?;
    let (chunk_width, chunk_height) = (chunk_width as u64, chunk_height as u64);
    let (across, down) = ifd.chunk_grid()?;
    let per_plane = across as u64 * down as u64;

    let offsets = ifd.chunk_offsets()?;
    let byte_counts = ifd.chunk_byte_counts()?;
    let needed = per_plane.saturating_mul(if planar { samples as u64 } else { 1 });
    if (offsets.len() as u64) < needed || (byte_counts.len() as u64) < needed {
        return Err(TiffError::InvalidTagValue {
            tag: if ifd.is_tiled() { "TileOffsets" } else { "StripOffsets" },
            message: format!(
                "{} offsets and {} byte counts for {} chunks",
                offsets.len(),
                byte_counts.len(),
                needed
            ),
        }
        .into());
    }

    let out_channels = region.channels() as usize;
    let out_pixel = out_channels * bytes_per_sample;
    let out_row = checked_len(&[region.width(), out_pixel as u64], "region row")?;
    let mut out = zeroed(checked_len(&[out_row as u64, region.height()], "region")?)?;
    let channel_offset = region.c.0 as usize * bytes_per_sample;

    let tables = ifd.jpeg_tables();
    let predictor = ifd.predictor();
    let byte_order = ifd.byte_order();

    for cy in region.y.0 / chunk_height..=(region.y.1 - 1) / chunk_height {
        let chunk_y = cy * chunk_height;
        let rows = if ifd.is_tiled() {
            chunk_height
        } else {
            chunk_height.min(image_height - chunk_y)
        };

        for cx in region.x.0 / chunk_width..=(region.x.1 - 1) / chunk_width {
            let chunk_x = cx * chunk_width;
            let index = (sample * per_plane + cy * across as u64 + cx) as usize;

            options.width = chunk_width as u32;
            options.height = rows as u32;
            options.channels = chunk_channels as u16;
            let expected = checked_len(&[chunk_width, rows, pixel_bytes as u64], "chunk")?;
            options.max_bytes = Some(expected);

            let byte_count = checked_len(&[byte_counts[index]], "chunk byte count")?;
            let raw = handle.read_bytes_at(offsets[index], byte_count)?;
            let raw = if is_jpeg(compression) {
                jpeg::prepare_stream(tables, raw)
            } else {
                raw
            };
            let mut decoded = codecs.decode(compression, &raw, &options)?;
            if decoded.len() < expected {
                return Err(CodecError::Decode {
                    codec: compression.name(),
                    message: format!(
                        "chunk {} decoded to {} bytes, expected {}",
                        index,
                        decoded.len(),
                        expected
                    ),
                }
                .into());
            }
            decoded.truncate(expected);

            match predictor {
                1 => {}
                2 => undo_horizontal_predictor(
                    &mut decoded,
                    chunk_width as usize * chunk_channels,
                    bytes_per_sample,
                    chunk_channels,
                    byte_order,
                )?,
                other => {
                    return Err(FormatError::UnsupportedOperation {
                        format: TIFF_FORMAT_NAME,
                        message: format!("predictor {}", other),
                    }
                    .into())
                }
            }

            // Intersection of this chunk with the region
            let x0 = region.x.0.max(chunk_x);
            let x1 = region.x.1.min(chunk_x + chunk_width);
            let y0 = region.y.0.max(chunk_y);
            let y1 = region.y.1.min(chunk_y + rows);
            let src_row_bytes = chunk_width as usize * pixel_bytes;

            for y in y0..y1 {
                let src_row = (y - chunk_y) as usize * src_row_bytes;
                let dst_row = (y - region.y.0) as usize * out_row;
                if out_channels == chunk_channels {
                    let src = src_row + (x0 - chunk_x) as usize * pixel_bytes;
                    let dst = dst_row + (x0 - region.x.0) as usize * out_pixel;
                    let len = (x1 - x0) as usize * pixel_bytes;
                    out[dst..dst + len].copy_from_slice(&decoded[src..src + len]);
                } else {
                    for x in x0..x1 {
                        let src = src_row + (x - chunk_x) as usize * pixel_bytes + channel_offset;
                        let dst = dst_row + (x - region.x.0) as usize * out_pixel;
                        out[dst..dst + out_pixel].copy_from_slice(&decoded[src..src + out_pixel]);
                    }
                }
            }
        }
    }

    Ok(out)
}

/// Reverse horizontal differencing (predictor 2) in place.
///
/// Each row holds `row_samples` samples of `bytes_per_sample` bytes; a sample
/// is stored as the difference from the same channel of the previous pixel.
pub(crate) fn undo_horizontal_predictor(
    data: &mut [u8],
    row_samples: usize,
    bytes_per_sample: usize,
    channels: usize,
    byte_order: ByteOrder,
) -> Result<(), FormatError> {
    let row_bytes = row_samples * bytes_per_sample;
    for row in data.chunks_exact_mut(row_bytes) {
        for i in channels..row_samples {
            let cur = i * bytes_per_sample;
            let prev = (i - channels) * bytes_per_sample;
            match bytes_per_sample {
                1 => row[cur] = row[cur].wrapping_add(row[prev]),
                2 => {
                    let value = byte_order
                        .read_u16(&row[cur..])
                        .wrapping_add(byte_order.read_u16(&row[prev..]));
                    row[cur..cur + 2].copy_from_slice(&byte_order.u16_bytes(value));
                }
                4 => {
                    let value = byte_order
                        .read_u32(&row[cur..])
                        .wrapping_add(byte_order.read_u32(&row[prev..]));
                    row[cur..cur + 4].copy_from_slice(&byte_order.u32_bytes(value));
                }
                8 => {
                    let value = byte_order
                        .read_u64(&row[cur..])
                        .wrapping_add(byte_order.read_u64(&row[prev..]));
                    row[cur..cur + 8].copy_from_slice(&byte_order.u64_bytes(value));
                }
                other => {
                    return Err(FormatError::UnsupportedOperation {
                        format: TIFF_FORMAT_NAME,
                        message: format!("horizontal predictor on {}-byte samples", other),
                    })
                }
            }
        }
    }
    Ok(())
}
