//! Deflate with zlib framing (TIFF compression 8 and 32946).

use std::io::{Cursor, Read};

use crate::error::CodecError;

use super::options::CodecOptions;

pub fn decode(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(options.output_capacity(input.len(), 4));
    let decoder = flate2::read::ZlibDecoder::new(Cursor::new(input));
    let result = match options.max_bytes {
        Some(max) => decoder.take(max as u64).read_to_end(&mut out),
        None => {
            let mut decoder = decoder;
            decoder.read_to_end(&mut out)
        }
    };
    result.map_err(|e| CodecError::Decode {
        codec: "Deflate",
        message: e.to_string(),
    })?;
    Ok(out)
}

pub fn encode(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let level = match options.quality {
        // Map the 1-100 quality scale onto zlib levels 1-9
        Some(q) => flate2::Compression::new((q.clamp(1, 100) as u32).div_ceil(11).clamp(1, 9)),
        None => flate2::Compression::default(),
    };
    let mut encoder = flate2::read::ZlibEncoder::new(Cursor::new(input), level);
    let mut out = Vec::new();
    encoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Encode {
            codec: "Deflate",
            message: e.to_string(),
        })?;
    Ok(out)
}
