//! JPEG-2000 decoding through OpenJPEG.

use crate::error::CodecError;

use super::options::CodecOptions;

/// Decode a J2K codestream or JP2 file into interleaved samples.
///
/// Components are written pixel by pixel using the sample width from
/// `options.bits_per_sample` (8, 16 or 32) in the requested byte order.
pub fn decode(input: &[u8], options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    let image = jpeg2k::Image::from_bytes(input).map_err(|e| CodecError::Decode {
        codec: "JPEG-2000",
        message: e.to_string(),
    })?;

    let components = image.components();
    let Some(first) = components.first() else {
        return Err(CodecError::Decode {
            codec: "JPEG-2000",
            message: "codestream has no components".to_string(),
        });
    };
    let pixels = first.data().len();
    if components.iter().any(|c| c.data().len() != pixels) {
        return Err(CodecError::Decode {
            codec: "JPEG-2000",
            message: "subsampled components are not supported".to_string(),
        });
    }

    let bytes_per_sample = options.bytes_per_sample();
    let mut out = Vec::with_capacity(pixels * components.len() * bytes_per_sample);
    for i in 0..pixels {
        for component in components {
            let value = component.data()[i];
            match bytes_per_sample {
                1 => out.push(value as u8),
                2 if options.little_endian => out.extend_from_slice(&(value as u16).to_le_bytes()),
                2 => out.extend_from_slice(&(value as u16).to_be_bytes()),
                _ if options.little_endian => out.extend_from_slice(&(value as u32).to_le_bytes()),
                _ => out.extend_from_slice(&(value as u32).to_be_bytes()),
            }
        }
    }

    if let Some(max) = options.max_bytes {
        out.truncate(max);
    }
    Ok(out)
}
