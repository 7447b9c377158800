//! TIFF tag and field type definitions.
//!
//! Covers every field type of TIFF 6.0 plus the BigTIFF additions, and the
//! tags the reader and writer act on. Tags not listed in [`TiffTag`] are still
//! parsed and kept in the IFD under their numeric id.

use serde::Serialize;

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character, NUL terminated
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two Longs: numerator, denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Opaque byte
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two SLongs: numerator, denominator
    SRational = 10,
    /// IEEE single precision
    Float = 11,
    /// IEEE double precision
    Double = 12,
    /// 32-bit IFD offset
    Ifd = 13,
    /// Unsigned 64-bit integer (BigTIFF)
    Long8 = 16,
    /// Signed 64-bit integer (BigTIFF)
    SLong8 = 17,
    /// 64-bit IFD offset (BigTIFF)
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            6 => FieldType::SByte,
            7 => FieldType::Undefined,
            8 => FieldType::SShort,
            9 => FieldType::SLong,
            10 => FieldType::SRational,
            11 => FieldType::Float,
            12 => FieldType::Double,
            13 => FieldType::Ifd,
            16 => FieldType::Long8,
            17 => FieldType::SLong8,
            18 => FieldType::Ifd8,
            _ => return None,
        })
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Maximum bytes stored inline in a classic TIFF IFD entry.
    pub const INLINE_THRESHOLD_TIFF: usize = 4;

    /// Maximum bytes stored inline in a BigTIFF IFD entry.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    /// Whether `count` values of this type fit in the entry's value field.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let total_size = (self.size_in_bytes() as u64).saturating_mul(count);
        let threshold = if is_bigtiff {
            Self::INLINE_THRESHOLD_BIGTIFF as u64
        } else {
            Self::INLINE_THRESHOLD_TIFF as u64
        };
        total_size <= threshold
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs the reader and writer understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    NewSubfileType = 254,
    ImageWidth = 256,
    /// Image height in pixels
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    ImageDescription = 270,
    SamplesPerPixel = 277,
    PlanarConfiguration = 284,
    /// Differencing applied before compression (1 = none, 2 = horizontal)
    Predictor = 317,
    ColorMap = 320,
    ExtraSamples = 338,
    /// 1 = unsigned, 2 = signed, 3 = IEEE float
    SampleFormat = 339,

    // -------------------------------------------------------------------------
    // Strip Organization
    // -------------------------------------------------------------------------
    StripOffsets = 273,
    RowsPerStrip = 278,
    StripByteCounts = 279,

    // -------------------------------------------------------------------------
    // Tile Organization
    // -------------------------------------------------------------------------
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // JPEG Handling
    // -------------------------------------------------------------------------
    /// Quantization and Huffman tables shared by abbreviated JPEG chunks
    JpegTables = 347,
    YCbCrSubSampling = 530,

    // -------------------------------------------------------------------------
    // Descriptive
    // -------------------------------------------------------------------------
    XResolution = 282,
    YResolution = 283,
    ResolutionUnit = 296,
    Software = 305,
    DateTime = 306,
    Artist = 315,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            254 => TiffTag::NewSubfileType,
            256 => TiffTag::ImageWidth,
            257 => TiffTag::ImageLength,
            258 => TiffTag::BitsPerSample,
            259 => TiffTag::Compression,
            262 => TiffTag::PhotometricInterpretation,
            270 => TiffTag::ImageDescription,
            273 => TiffTag::StripOffsets,
            277 => TiffTag::SamplesPerPixel,
            278 => TiffTag::RowsPerStrip,
            279 => TiffTag::StripByteCounts,
            282 => TiffTag::XResolution,
            283 => TiffTag::YResolution,
            284 => TiffTag::PlanarConfiguration,
            296 => TiffTag::ResolutionUnit,
            305 => TiffTag::Software,
            306 => TiffTag::DateTime,
            315 => TiffTag::Artist,
            317 => TiffTag::Predictor,
            320 => TiffTag::ColorMap,
            322 => TiffTag::TileWidth,
            323 => TiffTag::TileLength,
            324 => TiffTag::TileOffsets,
            325 => TiffTag::TileByteCounts,
            338 => TiffTag::ExtraSamples,
            339 => TiffTag::SampleFormat,
            347 => TiffTag::JpegTables,
            530 => TiffTag::YCbCrSubSampling,
            _ => return None,
        })
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Name used in error messages and the metadata table.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::NewSubfileType => "NewSubfileType",
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::PlanarConfiguration => "PlanarConfiguration",
            TiffTag::Predictor => "Predictor",
            TiffTag::ColorMap => "ColorMap",
            TiffTag::ExtraSamples => "ExtraSamples",
            TiffTag::SampleFormat => "SampleFormat",
            TiffTag::StripOffsets => "StripOffsets",
            TiffTag::RowsPerStrip => "RowsPerStrip",
            TiffTag::StripByteCounts => "StripByteCounts",
            TiffTag::TileWidth => "TileWidth",
            TiffTag::TileLength => "TileLength",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
            TiffTag::JpegTables => "JPEGTables",
            TiffTag::YCbCrSubSampling => "YCbCrSubSampling",
            TiffTag::XResolution => "XResolution",
            TiffTag::YResolution => "YResolution",
            TiffTag::ResolutionUnit => "ResolutionUnit",
            TiffTag::Software => "Software",
            TiffTag::DateTime => "DateTime",
            TiffTag::Artist => "Artist",
        }
    }
}

/// Photometric interpretation values used by the writer.
pub mod photometric {
    pub const MIN_IS_BLACK: u16 = 1;
    pub const RGB: u16 = 2;
    pub const PALETTE: u16 = 3;
}

/// Sample format values.
pub mod sample_format {
    pub const UINT: u16 = 1;
    pub const INT: u16 = 2;
    pub const IEEE_FP: u16 = 3;
}
