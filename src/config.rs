//! Configuration for parsers, writers and the `scifmt` binary.
//!
//! Library code takes [`ParserConfig`] and [`WriterConfig`] values directly.
//! The binary builds them from command-line arguments via clap, with
//! defaults overridable through environment variables:
//!
//! - `SCIFMT_COMPRESSION` - Compression used by `convert` (default: Uncompressed)
//! - `SCIFMT_LOG` - Log filter directive, e.g. `scifmt=debug` (falls back to `RUST_LOG`)

use clap::{Args, Parser, Subcommand};

use crate::codec::{CodecOptions, Compression};

// =============================================================================
// Library Configuration
// =============================================================================

/// Options controlling a single parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserConfig {
    /// Recorded in the resulting metadata; tells downstream consumers the
    /// dataset was opened with filtering enabled.
    pub filtered: bool,

    /// Copy format-specific structures (TIFF tag tables, PNM header fields)
    /// into the metadata tables.
    pub save_original_metadata: bool,
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_original_metadata(mut self, save: bool) -> Self {
        self.save_original_metadata = save;
        self
    }

    pub fn with_filtered(mut self, filtered: bool) -> Self {
        self.filtered = filtered;
        self
    }
}

/// Options for one writer destination.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    pub compression: Compression,

    /// Seed options for the encoder (quality, wavelet parameters). Geometry
    /// fields are overwritten per plane.
    pub codec_options: CodecOptions,

    /// Byte order of the output, for formats that let the writer choose.
    pub little_endian: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Uncompressed,
            codec_options: CodecOptions::default(),
            little_endian: cfg!(target_endian = "little"),
        }
    }
}

impl WriterConfig {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(quality) = self.codec_options.quality {
            if quality == 0 || quality > 100 {
                return Err("quality must be between 1 and 100".to_string());
            }
        }
        if let Some(wavelet) = &self.codec_options.wavelet {
            let (w, h) = wavelet.code_block_size;
            if w == 0 || h == 0 {
                return Err("wavelet code block size must be non-zero".to_string());
            }
        }
        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// scifmt - inspect, convert and group scientific image files.
#[derive(Parser, Debug, Clone)]
#[command(name = "scifmt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the metadata of a dataset.
    Info(InfoConfig),

    /// Infer the file pattern a file belongs to.
    Pattern(PatternConfig),

    /// Convert a dataset to another format.
    Convert(ConvertConfig),

    /// List registered formats in detection order.
    Formats,
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// File path or location (`memory:` and `file:` URLs are accepted).
    pub location: String,

    /// Print the metadata as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Include format-specific tag tables.
    #[arg(long, default_value_t = false)]
    pub original: bool,

    /// Mark the dataset as opened with filtering.
    #[arg(long, default_value_t = false)]
    pub filtered: bool,
}

impl InfoConfig {
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            filtered: self.filtered,
            save_original_metadata: self.original,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PatternConfig {
    /// Example file; its directory is scanned for siblings.
    pub path: std::path::PathBuf,

    /// Axis labels whose numbers are kept literal (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Also print every file the pattern expands to.
    #[arg(long, default_value_t = false)]
    pub expand: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertConfig {
    /// Input location.
    pub input: String,

    /// Output location; the format is chosen by extension.
    pub output: String,

    /// Output compression (name or TIFF code).
    #[arg(short, long, default_value = "uncompressed", env = "SCIFMT_COMPRESSION")]
    pub compression: String,

    /// Quality for lossy compression (1-100).
    #[arg(short, long)]
    pub quality: Option<u8>,

    /// Write big-endian output where the format allows a choice.
    #[arg(long, default_value_t = false)]
    pub big_endian: bool,

    /// Image of the input dataset to convert.
    #[arg(long, default_value_t = 0)]
    pub image: usize,
}

impl ConvertConfig {
    /// Resolve the compression argument and build the writer configuration.
    pub fn writer_config(&self) -> Result<WriterConfig, String> {
        let compression = match self.compression.parse::<u16>() {
            Ok(code) => Compression::from_code(code),
            Err(_) => Compression::from_name(&self.compression),
        }
        .map_err(|e| e.to_string())?;

        let config = WriterConfig {
            compression,
            codec_options: CodecOptions {
                quality: self.quality,
                ..Default::default()
            },
            little_endian: !self.big_endian,
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================
