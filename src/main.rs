//! scifmt - inspect, convert and group scientific image files.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scifmt::{
    config::{Cli, Command, ConvertConfig, InfoConfig, PatternConfig},
    find_pattern_for_path, AxisType, Context, FormatError, Location, Metadata, ParserConfig,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Info(config) => run_info(config),
        Command::Pattern(config) => run_pattern(config),
        Command::Convert(config) => run_convert(config),
        Command::Formats => run_formats(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
///
/// `SCIFMT_LOG` takes precedence over `RUST_LOG`; without either, `--verbose`
/// selects debug level.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "scifmt=debug" } else { "scifmt=info" };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("SCIFMT_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> scifmt::Result<()> {
    let ctx = Context::new();
    let location = Location::parse(&config.location);
    let format = ctx.detect(&location)?;

    let mut parser = format.create_parser(&ctx);
    let metadata = parser.parse(&location, &config.parser_config())?.clone();
    let used_files = parser.used_files(false)?;
    parser.close(false)?;

    if config.json {
        let json = serde_json::to_string_pretty(&metadata).map_err(|e| FormatError::Invalid {
            format: "JSON output",
            message: e.to_string(),
        })?;
        println!("{}", json);
    } else {
        print_metadata(&metadata, &used_files);
    }
    Ok(())
}

fn print_metadata(metadata: &Metadata, used_files: &[Location]) {
    println!("Format:  {}", metadata.format_name());
    println!("Dataset: {}", metadata.dataset_name());
    for file in used_files {
        println!("File:    {}", file);
    }
    for (key, value) in metadata.table() {
        println!("  {} = {}", key, value);
    }

    for (index, image) in metadata.images().iter().enumerate() {
        println!();
        println!("Image {}: {}", index, image.name);
        let axes: Vec<String> = image
            .axes()
            .iter()
            .map(|a| format!("{}={}", a.axis_type, a.length))
            .collect();
        println!("  Axes:        {} ({} planar)", axes.join(" "), image.planar_axis_count());
        println!(
            "  Pixel type:  {} ({} significant bits)",
            image.pixel_type, image.bits_per_pixel
        );
        println!("  Planes:      {}", image.plane_count());
        println!("  Interleaved: {}", image.interleaved);
        println!("  Byte order:  {}", if image.little_endian { "little-endian" } else { "big-endian" });
        if image.indexed {
            println!("  Indexed color");
        }
        if image.thumbnail {
            println!("  Thumbnail");
        }
        for (key, value) in &image.table {
            println!("  {} = {}", key, value);
        }
    }
}

// =============================================================================
// Pattern Command
// =============================================================================

fn run_pattern(config: PatternConfig) -> scifmt::Result<()> {
    let exclude = config
        .exclude
        .iter()
        .map(|label| AxisType::from_label(label))
        .collect::<Result<Vec<_>, _>>()?;

    let pattern = find_pattern_for_path(&config.path, &exclude)?;
    println!("{}", pattern);
    for (block, axis) in pattern.blocks().zip(pattern.axis_types()) {
        let axis = axis.map_or_else(|| "-".to_string(), |a| a.to_string());
        println!("  {} -> {} ({} values)", block.text(), axis, block.len());
    }
    if config.expand {
        for path in pattern.paths() {
            println!("{}", path.display());
        }
    }
    Ok(())
}

// =============================================================================
// Convert Command
// =============================================================================

fn run_convert(config: ConvertConfig) -> scifmt::Result<()> {
    let writer_config = config.writer_config().map_err(|message| FormatError::Invalid {
        format: "convert arguments",
        message,
    })?;

    let ctx = Context::new();
    let input = Location::parse(&config.input);
    let output = Location::parse(&config.output);

    let mut reader = ctx.open_reader(&input, &ParserConfig::default())?;
    let source = reader
        .metadata()
        .cloned()
        .ok_or_else(|| FormatError::NotInitialized("reader has no metadata".to_string()))?;
    let image = source.image(config.image)?.clone();
    let planes = image.plane_count();

    // The output holds the selected image only
    let mut target = source.clone();
    target.set_images(vec![image]);

    let mut writer = ctx.writer_for(&output)?;
    writer.set_metadata(target)?;
    writer.set_dest(&output, 0, &writer_config)?;
    for plane in 0..planes {
        let data = reader.open_plane(config.image, plane)?;
        writer.save_plane(0, plane, &data, None)?;
    }
    writer.close()?;
    reader.close()?;

    info!(
        input = %input,
        output = %output,
        format = writer.format_name(),
        planes,
        "conversion finished"
    );
    println!("Wrote {} plane(s) to {}", planes, output);
    Ok(())
}

// =============================================================================
// Formats Command
// =============================================================================

fn run_formats() -> scifmt::Result<()> {
    let ctx = Context::new();
    println!("{:<8} {:>8}  {:<8} extensions", "name", "priority", "writable");
    for format in ctx.formats().formats() {
        let writable = format.create_writer(&ctx).is_some();
        println!(
            "{:<8} {:>8}  {:<8} {}",
            format.name(),
            format.priority(),
            if writable { "yes" } else { "no" },
            format.extensions().join(", ")
        );
    }
    Ok(())
}
