//! Parameters handed to codecs.

use serde::Serialize;

/// Default JPEG encoding quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Parameters describing the pixel layout a codec decodes into or encodes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodecOptions {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    /// Samples per pixel
    pub channels: u16,
    pub little_endian: bool,
    /// Whether samples of one pixel are stored together
    pub interleaved: bool,
    pub signed: bool,
    pub lossless: bool,
    /// Expected decoded size; decoders stop producing output once reached
    pub max_bytes: Option<usize>,
    /// Encoding quality for lossy codecs (1-100)
    pub quality: Option<u8>,
    /// Extra parameters for the JPEG-2000 family
    pub wavelet: Option<WaveletOptions>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            bits_per_sample: 8,
            channels: 1,
            little_endian: false,
            interleaved: true,
            signed: false,
            lossless: true,
            max_bytes: None,
            quality: None,
            wavelet: None,
        }
    }
}

impl CodecOptions {
    /// Bytes per sample, rounding sub-byte depths up.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8).max(1)
    }

    /// Initial output capacity for a decoder: `ratio` times the input, never
    /// above `max_bytes`. Declared sizes come from the file and are not
    /// trusted for allocation.
    pub fn output_capacity(&self, input_len: usize, ratio: usize) -> usize {
        let guess = input_len.saturating_mul(ratio);
        self.max_bytes.map_or(guess, |max| max.min(guess))
    }

    /// Size of a fully decoded buffer for these options.
    pub fn decoded_size(&self) -> usize {
        let row_bits = (self.width as usize)
            .saturating_mul(self.channels as usize)
            .saturating_mul(self.bits_per_sample as usize);
        row_bits.div_ceil(8).saturating_mul(self.height as usize)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100)
    }
}

/// JPEG-2000 specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveletOptions {
    pub decomposition_levels: Option<u32>,
    /// Resolution level to decode (0 = full)
    pub resolution: Option<u32>,
    pub code_block_size: (u32, u32),
    pub quality: f64,
}

impl WaveletOptions {
    /// Defaults for a given lossless flag: 64x64 code blocks and unbounded
    /// quality when lossless, quality 10 otherwise.
    pub fn defaults(lossless: bool) -> Self {
        Self {
            decomposition_levels: None,
            resolution: None,
            code_block_size: (64, 64),
            quality: if lossless { f64::MAX } else { 10.0 },
        }
    }
}
