//! Compression identifier to codec dispatch.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::{CodecError, EnumError, Result, TiffError};
use crate::format::tiff::Ifd;

use super::compression::Compression;
use super::options::{CodecOptions, WaveletOptions};
use super::{deflate, jpeg, jpeg2000, lzw, packbits};

/// Decoder or encoder for one compression scheme.
pub type CodecFn = fn(&[u8], &CodecOptions) -> std::result::Result<Vec<u8>, CodecError>;

/// Builds codec options from an IFD, optionally seeded with caller options.
pub type DeriveFn = fn(&Ifd, Option<&CodecOptions>) -> std::result::Result<CodecOptions, TiffError>;

/// One row of the dispatch table.
#[derive(Clone, Copy)]
pub struct CodecEntry {
    pub compression: Compression,
    pub decode: Option<CodecFn>,
    pub encode: Option<CodecFn>,
    pub derive: DeriveFn,
    pub lossy: bool,
}

impl std::fmt::Debug for CodecEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecEntry")
            .field("compression", &self.compression)
            .field("decode", &self.decode.is_some())
            .field("encode", &self.encode.is_some())
            .field("lossy", &self.lossy)
            .finish()
    }
}

impl CodecEntry {
    const fn new(compression: Compression, decode: Option<CodecFn>, encode: Option<CodecFn>) -> Self {
        Self {
            compression,
            decode,
            encode,
            derive: derive_options,
            lossy: false,
        }
    }

    const fn lossy(mut self) -> Self {
        self.lossy = true;
        self
    }

    const fn with_derive(mut self, derive: DeriveFn) -> Self {
        self.derive = derive;
        self
    }

    pub fn code(&self) -> u16 {
        self.compression.code()
    }

    pub fn name(&self) -> &'static str {
        self.compression.name()
    }

    fn unsupported(&self) -> CodecError {
        CodecError::UnsupportedCompression {
            code: self.code(),
            name: self.name(),
        }
    }
}

// =============================================================================
// Option Derivation
// =============================================================================

/// Copy the seed, then take dimensions, sample layout and byte order from
/// the IFD. Output is always interleaved and unsigned.
pub fn derive_options(
    ifd: &Ifd,
    seed: Option<&CodecOptions>,
) -> std::result::Result<CodecOptions, TiffError> {
    let mut options = seed.cloned().unwrap_or_default();
    options.width = ifd.image_width()?;
    options.height = ifd.image_length()?;
    options.bits_per_sample = ifd.bits_per_sample()[0];
    options.channels = ifd.samples_per_pixel();
    options.little_endian = ifd.is_little_endian();
    options.interleaved = true;
    options.signed = false;
    Ok(options)
}

/// Derivation shared by the JPEG-2000 family, differing only in `LOSSLESS`.
///
/// Wavelet parameters start from the defaults for the lossless flag; a seed
/// carrying wavelet options contributes its decomposition levels, resolution,
/// code block size and (when positive) quality.
pub fn derive_wavelet_options<const LOSSLESS: bool>(
    ifd: &Ifd,
    seed: Option<&CodecOptions>,
) -> std::result::Result<CodecOptions, TiffError> {
    let mut options = derive_options(ifd, seed)?;
    options.lossless = LOSSLESS;

    let mut wavelet = WaveletOptions::defaults(LOSSLESS);
    if let Some(seeded) = seed.and_then(|s| s.wavelet.as_ref()) {
        wavelet.decomposition_levels = seeded.decomposition_levels;
        wavelet.resolution = seeded.resolution;
        wavelet.code_block_size = seeded.code_block_size;
        if seeded.quality > 0.0 {
            wavelet.quality = seeded.quality;
        }
    }
    options.wavelet = Some(wavelet);
    Ok(options)
}

fn passthrough_decode(
    input: &[u8],
    options: &CodecOptions,
) -> std::result::Result<Vec<u8>, CodecError> {
    let end = options.max_bytes.map_or(input.len(), |max| max.min(input.len()));
    Ok(input[..end].to_vec())
}

fn passthrough_encode(
    input: &[u8],
    _options: &CodecOptions,
) -> std::result::Result<Vec<u8>, CodecError> {
    Ok(input.to_vec())
}

// =============================================================================
// CodecTable
// =============================================================================

/// Dispatch table from compression identifier to codec.
///
/// Every declared [`Compression`] has exactly one entry. Entries without a
/// decoder or encoder report [`CodecError::UnsupportedCompression`].
#[derive(Debug, Clone)]
pub struct CodecTable {
    entries: BTreeMap<u16, CodecEntry>,
}

impl Default for CodecTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecTable {
    /// The standard table.
    pub fn new() -> Self {
        use Compression::*;

        let passthrough = (Some(passthrough_decode as CodecFn), Some(passthrough_encode as CodecFn));
        let lzw = (Some(lzw::decode as CodecFn), Some(lzw::encode as CodecFn));
        let jpeg = (Some(jpeg::decode as CodecFn), Some(jpeg::encode as CodecFn));
        let deflate = (Some(deflate::decode as CodecFn), Some(deflate::encode as CodecFn));
        let packbits = (Some(packbits::decode as CodecFn), Some(packbits::encode as CodecFn));
        let j2k = Some(jpeg2000::decode as CodecFn);

        let entries = [
            CodecEntry::new(DefaultUncompressed, passthrough.0, passthrough.1),
            CodecEntry::new(Uncompressed, passthrough.0, passthrough.1),
            CodecEntry::new(Ccitt1d, None, None),
            CodecEntry::new(Group3Fax, None, None),
            CodecEntry::new(Group4Fax, None, None),
            CodecEntry::new(Lzw, lzw.0, lzw.1),
            CodecEntry::new(OldJpeg, jpeg.0, jpeg.1).lossy(),
            CodecEntry::new(Jpeg, jpeg.0, jpeg.1).lossy(),
            CodecEntry::new(Deflate, deflate.0, deflate.1),
            CodecEntry::new(PackBits, packbits.0, packbits.1),
            CodecEntry::new(Thunderscan, None, None),
            CodecEntry::new(ProprietaryDeflate, deflate.0, deflate.1),
            CodecEntry::new(Jpeg2000, j2k, None).with_derive(derive_wavelet_options::<true>),
            CodecEntry::new(Jpeg2000Lossy, j2k, None)
                .with_derive(derive_wavelet_options::<false>)
                .lossy(),
            CodecEntry::new(AltJpeg2000, j2k, None).with_derive(derive_wavelet_options::<true>),
            CodecEntry::new(AltJpeg, jpeg.0, jpeg.1).lossy(),
            CodecEntry::new(OlympusJpeg2000, j2k, None)
                .with_derive(derive_wavelet_options::<true>),
            CodecEntry::new(Nikon, None, None),
            CodecEntry::new(LuraWave, None, None),
        ];

        Self {
            entries: entries.into_iter().map(|e| (e.code(), e)).collect(),
        }
    }

    /// Replace (or add) the entry for `entry.compression`.
    pub fn register(&mut self, entry: CodecEntry) {
        debug!(compression = %entry.compression, "registering codec");
        self.entries.insert(entry.code(), entry);
    }

    /// Entry for a raw compression code.
    pub fn entry(&self, code: u16) -> std::result::Result<&CodecEntry, EnumError> {
        self.entries.get(&code).ok_or(EnumError::UnknownCode {
            kind: "compression",
            code: code as i64,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = &CodecEntry> {
        self.entries.values()
    }

    pub fn can_decode(&self, compression: Compression) -> bool {
        self.entries
            .get(&compression.code())
            .is_some_and(|e| e.decode.is_some())
    }

    pub fn can_encode(&self, compression: Compression) -> bool {
        self.entries
            .get(&compression.code())
            .is_some_and(|e| e.encode.is_some())
    }

    /// Decode one strip or tile.
    pub fn decode(
        &self,
        compression: Compression,
        input: &[u8],
        options: &CodecOptions,
    ) -> Result<Vec<u8>> {
        let entry = self.entry(compression.code())?;
        let decode = entry.decode.ok_or_else(|| entry.unsupported())?;
        trace!(compression = %compression, bytes = input.len(), "decoding chunk");
        Ok(decode(input, options)?)
    }

    /// Encode one strip or tile.
    pub fn encode(
        &self,
        compression: Compression,
        input: &[u8],
        options: &CodecOptions,
    ) -> Result<Vec<u8>> {
        let entry = self.entry(compression.code())?;
        let encode = entry.encode.ok_or_else(|| entry.unsupported())?;
        trace!(compression = %compression, bytes = input.len(), "encoding chunk");
        Ok(encode(input, options)?)
    }

    /// Codec options for an IFD, using the derivation of its compression.
    ///
    /// # Errors
    /// `EnumError` when the IFD's compression code is undeclared, or a TIFF
    /// error when required tags are missing.
    pub fn derive_options(&self, ifd: &Ifd, seed: Option<&CodecOptions>) -> Result<CodecOptions> {
        let entry = self.entry(ifd.compression_code())?;
        Ok((entry.derive)(ifd, seed)?)
    }
}
