use thiserror::Error;

/// Errors raised by the random-access layer and the resources behind it.
#[derive(Debug, Error)]
pub enum IoError {
    /// Fault reported by the underlying file or buffer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the end of the resource
    #[error("End of data: requested {requested} bytes at offset {offset}, length is {length}")]
    EndOfData {
        offset: u64,
        requested: u64,
        length: u64,
    },

    /// Operation attempted on a handle that has already been closed
    #[error("Handle is closed: {0}")]
    Closed(String),

    /// Location does not exist (or, for memory locations, was never registered)
    #[error("Location not found: {0}")]
    NotFound(String),

    /// Location uses a URL scheme no backend can open
    #[error("Unsupported location scheme: {0}")]
    UnsupportedScheme(String),

    /// Write attempted through a read-only backend
    #[error("Location is read-only: {0}")]
    ReadOnly(String),
}

/// Errors that can occur when parsing TIFF structures
#[derive(Debug, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or back into the chain)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },
}

/// Structural or precondition violations reported by parsers, readers and writers
#[derive(Debug, Error)]
pub enum FormatError {
    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// No registered format accepts the data
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// Byte stream does not match the claimed format
    #[error("Invalid {format} data: {message}")]
    Invalid {
        format: &'static str,
        message: String,
    },

    /// Index argument outside its valid range
    #[error("Invalid {what} index {index} (count is {count})")]
    InvalidIndex {
        what: &'static str,
        index: u64,
        count: u64,
    },

    /// Requested region is not inside the planar extent
    #[error("Invalid plane bounds: {0}")]
    InvalidBounds(String),

    /// Metadata belongs to another format or does not describe the data
    #[error("Metadata mismatch: {0}")]
    MetadataMismatch(String),

    /// Operation called before the component was set up
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Pixel type cannot be handled by this format or compression
    #[error("Unsupported pixel type {pixel_type} for {context}")]
    UnsupportedPixelType { pixel_type: String, context: String },

    /// Writer was asked to do something its format cannot express
    #[error("Unsupported operation for {format}: {message}")]
    UnsupportedOperation {
        format: &'static str,
        message: String,
    },
}

/// Errors raised by codec dispatch and the codecs themselves
#[derive(Debug, Error)]
pub enum CodecError {
    /// Recognized compression without an available implementation
    #[error("Unsupported compression: {name} ({code})")]
    UnsupportedCompression { code: u16, name: &'static str },

    /// Compressed data is truncated or corrupt
    #[error("{codec} decode failed: {message}")]
    Decode {
        codec: &'static str,
        message: String,
    },

    /// Input could not be encoded
    #[error("{codec} encode failed: {message}")]
    Encode {
        codec: &'static str,
        message: String,
    },
}

/// Lookup misses in fixed tables (compression codes, format names, pixel types)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnumError {
    /// Integer code with no table entry
    #[error("No {kind} with code {code}")]
    UnknownCode { kind: &'static str, code: i64 },

    /// Name with no table entry
    #[error("No {kind} named '{name}'")]
    UnknownName { kind: &'static str, name: String },
}

/// Errors raised while parsing or inferring file patterns
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Pattern text is malformed
    #[error("Invalid file pattern '{pattern}': {message}")]
    Syntax { pattern: String, message: String },

    /// Names do not share a common structure
    #[error("No common pattern: {0}")]
    NoConsensus(String),

    /// Directory could not be listed
    #[error("Cannot list {path}: {message}")]
    Listing { path: String, message: String },
}

/// Top-level error for parser, reader and writer operations
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Enumeration(#[from] EnumError),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

impl Error {
    /// Whether this error reports a known but unimplemented compression.
    pub fn is_unsupported_compression(&self) -> bool {
        matches!(
            self,
            Error::Codec(CodecError::UnsupportedCompression { .. })
        )
    }
}

impl From<TiffError> for Error {
    fn from(error: TiffError) -> Self {
        match error {
            TiffError::Io(io) => Error::Io(io),
            other => Error::Format(FormatError::Tiff(other)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(IoError::Io(error))
    }
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
