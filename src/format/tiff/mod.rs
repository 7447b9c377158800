//! TIFF and BigTIFF.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values are read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. Parsing handles both; writing produces classic TIFF.
//!
//! - **IFD (Image File Directory)**: Tags describing one plane and pointers to its
//!   strips or tiles. Consecutive IFDs of the same shape form one image stacked along Z.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod format;
mod ifd;
mod parser;
mod reader;
mod tags;
mod values;
mod writer;

pub use format::{is_tiff_header, pixel_type_of, TiffFormat, TiffMetadata, TiffParser, TIFF_FORMAT_NAME};
pub use ifd::Ifd;
pub use parser::{
    read_ifd, read_ifd_chain, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE, VERSION_BIGTIFF,
    VERSION_TIFF,
};
pub use reader::TiffReader;
pub use tags::{photometric, sample_format, FieldType, TiffTag};
pub use values::TagValue;
pub use writer::{write_ifd, TiffWriter};
