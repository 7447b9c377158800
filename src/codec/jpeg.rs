//! Baseline JPEG, including TIFF abbreviated streams.
//!
//! TIFF files with compression 7 often store each strip or tile as an
//! "abbreviated" stream: the quantization (DQT) and Huffman (DHT) tables are
//! kept once in the `JPEGTables` tag (347) and every chunk starts directly
//! with its frame and scan. Such chunks are merged with the tables before
//! decoding:
//!
//! 1. `JPEGTables` starts with SOI (FFD8) and ends with EOI (FFD9)
//! 2. the chunk also starts with SOI and ends with EOI
//! 3. strip EOI from the tables, strip SOI from the chunk, concatenate

use bytes::{Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat, RgbImage};

use crate::error::CodecError;

use super::options::CodecOptions;

// Markers the table merge looks for
pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const DHT: [u8; 2] = [0xFF, 0xC4];
pub const DQT: [u8; 2] = [0xFF, 0xDB];
pub const SOS: [u8; 2] = [0xFF, 0xDA];

// =============================================================================
// Stream Analysis
// =============================================================================

/// Whether `data` lacks its own tables: SOI is followed by SOS before any
/// DQT or DHT segment.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[0..2] != SOI {
        return false;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = [data[pos], data[pos + 1]];
        if marker == DQT || marker == DHT {
            return false;
        }
        if marker == SOS {
            return true;
        }

        // Skip the segment: marker + 2-byte length + payload
        if pos + 3 < data.len() && marker[1] != 0x00 && marker[1] != 0xD8 && marker[1] != 0xD9 {
            let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            pos += 2 + length;
        } else {
            pos += 2;
        }
    }

    false
}

/// Whether `data` is a self-contained stream with at least one DQT segment.
pub fn is_complete_stream(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..2] == SOI && data[2..].windows(2).any(|w| w == DQT)
}

/// Concatenate `tables` (minus its EOI) with `chunk` (minus its SOI).
pub fn merge_jpeg_tables(tables: &[u8], chunk: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(chunk);
    }
    if chunk.is_empty() {
        return Bytes::new();
    }

    let tables_end = if tables.ends_with(&EOI) {
        tables.len() - 2
    } else {
        tables.len()
    };
    let chunk_start = if chunk.starts_with(&SOI) { 2 } else { 0 };

    let mut merged = BytesMut::with_capacity(tables_end + chunk.len() - chunk_start);
    merged.extend_from_slice(&tables[..tables_end]);
    merged.extend_from_slice(&chunk[chunk_start..]);
    merged.freeze()
}

/// Make a chunk decodable, merging `tables` only when the chunk needs them.
pub fn prepare_stream(tables: Option<&[u8]>, chunk: Bytes) -> Bytes {
    if is_complete_stream(&chunk) {
        return chunk;
    }
    match tables {
        Some(tables) if is_abbreviated_stream(&chunk) => merge_jpeg_tables(tables, &chunk),
        _ => chunk,
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Decode to interleaved 8-bit samples: gray when one channel is expected,
/// RGB otherwise.
pub fn decode(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let image = image::load_from_memory_with_format(input, ImageFormat::Jpeg).map_err(|e| {
        CodecError::Decode {
            codec: "JPEG",
            message: e.to_string(),
        }
    })?;

    let mut out = match options.channels {
        1 => image.into_luma8().into_raw(),
        _ => image.into_rgb8().into_raw(),
    };
    if let Some(max) = options.max_bytes {
        out.truncate(max);
    }
    Ok(out)
}

/// Encode 8-bit gray or RGB interleaved samples.
pub fn encode(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    if options.bits_per_sample != 8 {
        return Err(CodecError::Encode {
            codec: "JPEG",
            message: format!("{}-bit samples are not supported", options.bits_per_sample),
        });
    }

    let (width, height) = (options.width, options.height);
    let size_error = || CodecError::Encode {
        codec: "JPEG",
        message: format!(
            "buffer of {} bytes does not hold a {}x{}x{} image",
            input.len(),
            width,
            height,
            options.channels
        ),
    };

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, options.jpeg_quality());
    let result = match options.channels {
        1 => {
            let image = GrayImage::from_raw(width, height, input.to_vec()).ok_or_else(size_error)?;
            encoder.encode_image(&image)
        }
        3 => {
            let image = RgbImage::from_raw(width, height, input.to_vec()).ok_or_else(size_error)?;
            encoder.encode_image(&image)
        }
        n => {
            return Err(CodecError::Encode {
                codec: "JPEG",
                message: format!("{} channels are not supported", n),
            })
        }
    };
    result.map_err(|e| CodecError::Encode {
        codec: "JPEG",
        message: e.to_string(),
    })?;

    Ok(out)
}
