//! Image file formats.
//!
//! A [`Format`] ties together everything needed to handle one file type:
//! content sniffing, an empty [`Metadata`] to parse into, and constructors
//! for the [`Parser`], [`Reader`] and (optionally) [`Writer`] that work on it.
//! Formats are collected in a [`FormatRegistry`], which also performs
//! detection.
//!
//! Shipped formats:
//!
//! - **TIFF**: classic TIFF and BigTIFF, strips or tiles, any codec in the
//!   [`CodecTable`](crate::codec::CodecTable)
//! - **PNM**: binary PGM (`P5`) and PPM (`P6`)

pub mod pnm;
mod registry;
pub mod tiff;

pub use pnm::PnmFormat;
pub use registry::{FormatRegistry, HEADER_BYTES};
pub use tiff::TiffFormat;

use crate::context::Context;
use crate::metadata::Metadata;
use crate::parser::Parser;
use crate::reader::Reader;
use crate::writer::Writer;

/// One supported file format.
pub trait Format: Send + Sync {
    /// Short unique name, also recorded in every [`Metadata`] this format creates.
    fn name(&self) -> &'static str;

    /// Lowercase file suffixes, without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Detection order; higher values are tried first.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether a matching suffix alone is enough to claim a file whose
    /// content did not match.
    fn suffix_sufficient(&self) -> bool {
        false
    }

    /// Whether `header` (the first bytes of a resource) belongs to this format.
    fn is_format(&self, header: &[u8]) -> bool;

    fn has_extension(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    fn create_metadata(&self) -> Metadata {
        Metadata::new(self.name())
    }

    fn create_parser(&self, ctx: &Context) -> Parser;

    fn create_reader(&self, ctx: &Context) -> Box<dyn Reader>;

    /// `None` when the format cannot be written.
    fn create_writer(&self, ctx: &Context) -> Option<Box<dyn Writer>>;
}

impl std::fmt::Debug for dyn Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Format")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .finish()
    }
}
