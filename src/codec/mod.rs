//! Compression codecs and the table that dispatches to them.
//!
//! Codecs are plain functions over byte slices. The [`CodecTable`] maps each
//! TIFF compression identifier to its decoder, encoder and the routine that
//! derives [`CodecOptions`] from an IFD.

mod compression;
pub mod deflate;
pub mod jpeg;
pub mod jpeg2000;
pub mod lzw;
mod options;
pub mod packbits;
mod table;

pub use compression::Compression;
pub use options::{CodecOptions, WaveletOptions, DEFAULT_JPEG_QUALITY};
pub use table::{derive_options, derive_wavelet_options, CodecEntry, CodecFn, CodecTable, DeriveFn};
