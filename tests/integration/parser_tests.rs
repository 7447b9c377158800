//! Parser lifecycle and format detection tests.
//!
//! Tests verify:
//! - Content detection picks TIFF and PNM regardless of suffix
//! - Re-parsing the same resource reuses the open handle
//! - Parsing a different resource switches handles
//! - `close(true)` keeps metadata, `close(false)` discards it
//! - Metadata of another format is rejected
//! - Headers whose pixel data cannot be addressed are invalid

use scifmt::format::pnm::{PnmHeader, PNM_FORMAT_NAME};
use scifmt::{
    ByteOrder, Context, Error, Format, FormatError, Location, Metadata, ParserConfig, ParserState,
    PixelType, TiffFormat,
};

use super::test_utils::{gradient, write_tiff, ChunkedIfd};

fn tiny_tiff(ctx: &Context, name: &str) -> Location {
    let ifd = ChunkedIfd::strips(ByteOrder::LittleEndian, 2, 2, 8, 1, 2, vec![gradient(4)]);
    write_tiff(ctx, name, ByteOrder::LittleEndian, vec![ifd])
}

fn tiny_pgm(ctx: &Context, name: &str) -> Location {
    let header = PnmHeader::new(3, 2, 1, PixelType::Uint8);
    let mut bytes = b"P5\n# scanner output\n3 2\n255\n".to_vec();
    bytes.extend(gradient(header.data_size().unwrap() as usize));
    ctx.locations().register_memory(name, bytes);
    Location::memory(name)
}

// =============================================================================
// Detection
// =============================================================================

#[test]
fn test_detection_by_content() {
    let ctx = Context::new();
    // Suffixes deliberately misleading
    let tiff = tiny_tiff(&ctx, "scan.pgm");
    let pgm = tiny_pgm(&ctx, "scan.dat");

    assert_eq!(ctx.detect(&tiff).unwrap().name(), "TIFF");
    assert_eq!(ctx.detect(&pgm).unwrap().name(), PNM_FORMAT_NAME);
}

#[test]
fn test_unknown_content_is_rejected() {
    let ctx = Context::new();
    ctx.locations()
        .register_memory("notes.txt", b"plain text, no image here".to_vec());
    let err = ctx.detect(&Location::memory("notes.txt")).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_missing_resource() {
    let ctx = Context::new();
    let err = ctx.detect(&Location::memory("absent.tif")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_pgm_with_overflowing_dimensions() {
    let ctx = Context::new();
    ctx.locations()
        .register_memory("huge.pgm", b"P5\n99999999999 99999999999\n255\n\0".to_vec());
    let location = Location::memory("huge.pgm");
    assert_eq!(ctx.detect(&location).unwrap().name(), PNM_FORMAT_NAME);

    let err = ctx
        .open_reader(&location, &ParserConfig::default())
        .err()
        .unwrap();
    assert!(
        matches!(err, Error::Format(FormatError::Invalid { .. })),
        "{}",
        err
    );
}

#[test]
fn test_pgm_dimensions() {
    let ctx = Context::new();
    let location = tiny_pgm(&ctx, "frame.pgm");
    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let image = reader.metadata().unwrap().image(0).unwrap().clone();
    assert_eq!((image.width(), image.height()), (3, 2));
    assert_eq!(image.pixel_type, PixelType::Uint8);
    assert_eq!(&reader.open_plane(0, 0).unwrap().data()[..], gradient(6).as_slice());
}

// =============================================================================
// Handle Reuse
// =============================================================================

#[test]
fn test_reparse_same_resource_reuses_handle() {
    let ctx = Context::new();
    let location = tiny_tiff(&ctx, "reuse.tif");
    let before = ctx.locations().open_count();

    let mut parser = TiffFormat.create_parser(&ctx);
    assert_eq!(parser.state(), ParserState::Uninitialized);
    parser.parse(&location, &ParserConfig::default()).unwrap();
    assert_eq!(parser.state(), ParserState::Parsed);
    assert_eq!(ctx.locations().open_count(), before + 1);

    // Same identity: the handle stays open and is rewound
    parser.parse(&location, &ParserConfig::default()).unwrap();
    assert_eq!(ctx.locations().open_count(), before + 1);
    assert_eq!(parser.handle().unwrap().location(), &location);

    // Different identity: the old handle is closed and a new one opened
    let other = tiny_tiff(&ctx, "other.tif");
    let before = ctx.locations().open_count();
    parser.parse(&other, &ParserConfig::default()).unwrap();
    assert_eq!(ctx.locations().open_count(), before + 1);
    assert_eq!(parser.handle().unwrap().location(), &other);
    assert_eq!(parser.metadata().unwrap().dataset_name(), "other.tif");
}

#[test]
fn test_reparse_after_file_only_close_reopens() {
    let ctx = Context::new();
    let location = tiny_tiff(&ctx, "reopen.tif");
    let mut parser = TiffFormat.create_parser(&ctx);
    parser.parse(&location, &ParserConfig::default()).unwrap();

    parser.close(true).unwrap();
    assert!(parser.handle().is_none());
    let before = ctx.locations().open_count();
    parser.parse(&location, &ParserConfig::default()).unwrap();
    assert_eq!(ctx.locations().open_count(), before + 1);
}

// =============================================================================
// Closing and Files
// =============================================================================

#[test]
fn test_close_file_only_keeps_metadata() {
    let ctx = Context::new();
    let location = tiny_tiff(&ctx, "keep.tif");
    let mut parser = TiffFormat.create_parser(&ctx);
    parser.parse(&location, &ParserConfig::default()).unwrap();

    parser.close(true).unwrap();
    assert_eq!(parser.state(), ParserState::Parsed);
    assert_eq!(parser.metadata().unwrap().image_count(), 1);
    assert_eq!(parser.used_files(false).unwrap(), vec![location.clone()]);

    parser.close(false).unwrap();
    assert_eq!(parser.state(), ParserState::Closed);
    assert!(parser.metadata().is_none());
    assert!(matches!(
        parser.used_files(false),
        Err(Error::Format(FormatError::NotInitialized(_)))
    ));
    // Closing again is harmless
    parser.close(false).unwrap();
}

#[test]
fn test_used_files() {
    let ctx = Context::new();
    let location = tiny_tiff(&ctx, "files.tif");
    let mut parser = TiffFormat.create_parser(&ctx);
    parser.parse(&location, &ParserConfig::default()).unwrap();

    assert_eq!(parser.used_files(false).unwrap(), vec![location.clone()]);
    assert!(parser.used_files(true).unwrap().is_empty());
    assert_eq!(parser.image_used_files(0, false).unwrap(), vec![location]);
    assert!(parser.image_used_files(0, true).unwrap().is_empty());
    assert!(parser.image_used_files(1, false).is_err());
}

#[test]
fn test_populate_again_is_stable() {
    let ctx = Context::new();
    let location = tiny_tiff(&ctx, "stable.tif");
    let mut parser = TiffFormat.create_parser(&ctx);
    let first = parser
        .parse(&location, &ParserConfig::default())
        .unwrap()
        .images()
        .to_vec();
    let second = parser.populate_image_metadata().unwrap().images().to_vec();
    assert_eq!(first, second);
}

// =============================================================================
// Metadata Ownership
// =============================================================================

#[test]
fn test_parse_into_rejects_foreign_metadata() {
    let ctx = Context::new();
    let location = tiny_tiff(&ctx, "foreign.tif");
    let mut parser = TiffFormat.create_parser(&ctx);

    let err = parser
        .parse_into(&location, Metadata::new(PNM_FORMAT_NAME), &ParserConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::MetadataMismatch(_))
    ));
    assert_eq!(parser.state(), ParserState::Uninitialized);

    let metadata = parser
        .parse_into(&location, TiffFormat.create_metadata(), &ParserConfig::default())
        .unwrap();
    assert_eq!(metadata.source(), Some(&location));
}

#[test]
fn test_filtered_flag_is_recorded() {
    let ctx = Context::new();
    let location = tiny_tiff(&ctx, "filtered.tif");
    let mut parser = TiffFormat.create_parser(&ctx);
    let config = ParserConfig::default().with_filtered(true);
    assert!(parser.parse(&location, &config).unwrap().is_filtered());
}

#[test]
fn test_reader_rejects_metadata_of_other_format() {
    let ctx = Context::new();
    let pgm = tiny_pgm(&ctx, "mixed.pgm");

    let mut parser = ctx.detect(&pgm).unwrap().create_parser(&ctx);
    parser.parse(&pgm, &ParserConfig::default()).unwrap();
    let (handle, metadata) = parser.into_source().unwrap();

    let mut reader = TiffFormat.create_reader(&ctx);
    let err = reader.set_source(handle, metadata).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::MetadataMismatch(_))
    ));
}
