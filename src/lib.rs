//! # scifmt
//!
//! A pluggable engine for reading and writing scientific image formats.
//!
//! Given a path or in-memory buffer, scifmt detects the format by content,
//! parses it into uniform axis-aware [`Metadata`], decodes planes on demand,
//! and can re-encode them into another format. Multi-file datasets are
//! described by file patterns inferred from a single example name.
//!
//! ## Features
//!
//! - **Format detection**: content sniffing in priority order, suffix fallback
//!   only for formats that allow it
//! - **Lazy decoding**: planes and sub-regions are decoded per request, nothing
//!   is cached
//! - **Codec dispatch**: TIFF compression identifiers map to decoders,
//!   encoders and per-code option derivation
//! - **Formats**: TIFF/BigTIFF (strips, tiles, LZW, Deflate, PackBits, JPEG,
//!   JPEG-2000 decode) and binary PGM/PPM
//! - **File patterns**: infer `img_00<1-3>.tif` from `img_001.tif` and its siblings
//!
//! ## Architecture
//!
//! - [`io`] - Locations and byte-order-aware random-access handles
//! - [`codec`] - Compression identifiers, codec options and the dispatch table
//! - [`metadata`] - Axes, pixel types, images, datasets and planes
//! - [`mod@format`] - The [`Format`] trait, the registry and concrete formats
//! - [`parser`], [`reader`], [`writer`] - The parse/read/write pipeline
//! - [`pattern`] - File pattern parsing and inference
//! - [`config`] - Parser and writer options plus CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use scifmt::{Context, Location, ParserConfig};
//!
//! fn main() -> scifmt::Result<()> {
//!     let ctx = Context::new();
//!     let location = Location::parse("stack.tif");
//!
//!     let mut reader = ctx.open_reader(&location, &ParserConfig::default())?;
//!     let planes = reader.metadata().map_or(0, |m| m.plane_count(0).unwrap_or(0));
//!     for plane in 0..planes {
//!         let data = reader.open_plane(0, plane)?;
//!         println!("plane {}: {} bytes", plane, data.data().len());
//!     }
//!     reader.close()
//! }
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod io;
pub mod metadata;
pub mod parser;
pub mod pattern;
pub mod reader;
pub mod writer;

// Re-export commonly used types
pub use codec::{CodecOptions, CodecTable, Compression};
pub use config::{Cli, Command, ParserConfig, WriterConfig};
pub use context::Context;
pub use error::{CodecError, EnumError, Error, FormatError, IoError, PatternError, Result, TiffError};
pub use format::{Format, FormatRegistry, PnmFormat, TiffFormat};
pub use io::{ByteOrder, DataHandle, Location, LocationService};
pub use metadata::{Axis, AxisType, Bounds, ImageMetadata, Metadata, PixelType, Plane};
pub use parser::{FormatParser, Parser, ParserState};
pub use pattern::{
    find_image_patterns, find_pattern, find_pattern_for_path, find_pattern_in_list, AxisGuesser,
    FilePattern, PatternBlock,
};
pub use reader::Reader;
pub use writer::Writer;
