//! Writer integration tests.
//!
//! Tests verify:
//! - Writers refuse planes before a destination is open
//! - TIFF output reads back for every lossless compression
//! - JPEG output keeps dimensions and stays close to the input
//! - Unsupported pixel types are rejected before anything is written
//! - PNM regions can be written in any order
//! - TIFF planes must arrive in order, and a rejected plane can be retried

use scifmt::{
    Bounds, Compression, Context, Error, FormatError, ImageMetadata, Location, ParserConfig,
    PixelType, Plane, WriterConfig,
};

use super::test_utils::{full_plane, gradient, single_image, smooth, u16_samples, uint8_gray};

fn little_endian_config(compression: Compression) -> WriterConfig {
    WriterConfig {
        little_endian: true,
        ..WriterConfig::default().with_compression(compression)
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_save_before_set_dest() {
    let ctx = Context::new();
    for name in ["early.tif", "early.pgm"] {
        let image = uint8_gray(2, 2, 1);
        let plane = full_plane(&image, vec![0; 4]);
        let mut writer = ctx.writer_for(&Location::memory(name)).unwrap();
        let format = writer.format_name();
        writer.set_metadata(single_image(format, image)).unwrap();

        let err = writer.save_plane(0, 0, &plane, None).unwrap_err();
        assert!(
            matches!(err, Error::Format(FormatError::NotInitialized(_))),
            "{}: {}",
            name,
            err
        );
    }
}

#[test]
fn test_set_dest_without_metadata() {
    let ctx = Context::new();
    let mut writer = ctx.writer_for(&Location::memory("bare.tif")).unwrap();
    let err = writer
        .set_dest(&Location::memory("bare.tif"), 0, &WriterConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::NotInitialized(_))));
}

#[test]
fn test_writer_for_unknown_suffix() {
    let ctx = Context::new();
    assert!(ctx.writer_for(&Location::memory("out.xyz")).is_err());
    assert!(ctx.writer_for(&Location::memory("no_suffix")).is_err());
}

// =============================================================================
// TIFF Round Trips
// =============================================================================

#[test]
fn test_tiff_lossless_round_trips() {
    for compression in [
        Compression::Uncompressed,
        Compression::Lzw,
        Compression::Deflate,
        Compression::PackBits,
    ] {
        let ctx = Context::new();
        let image = uint8_gray(16, 8, 3);
        let planes: Vec<Vec<u8>> = (0..3)
            .map(|z| gradient(16 * 8).into_iter().map(|v| v.wrapping_add(z)).collect())
            .collect();
        let location = Location::memory("stack.tif");

        let mut writer = ctx.writer_for(&location).unwrap();
        writer.set_metadata(single_image("TIFF", image.clone())).unwrap();
        writer
            .set_dest(&location, 0, &little_endian_config(compression))
            .unwrap();
        for (z, data) in planes.iter().enumerate() {
            writer
                .save_plane(0, z as u64, &full_plane(&image, data.clone()), None)
                .unwrap();
        }
        writer.close().unwrap();

        let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
        let metadata = reader.metadata().unwrap().clone();
        assert_eq!(metadata.image_count(), 1, "{}", compression);
        assert_eq!(metadata.plane_count(0).unwrap(), 3);
        for (z, data) in planes.iter().enumerate() {
            let plane = reader.open_plane(0, z as u64).unwrap();
            assert_eq!(&plane.data()[..], data.as_slice(), "{} plane {}", compression, z);
        }
    }
}

#[test]
fn test_tiff_converts_sample_byte_order() {
    let ctx = Context::new();
    let values = [0x0102u16, 0x0304, 0xA0B0, 0xFFFE];
    let mut image =
        ImageMetadata::with_dimensions(2, 2, 1, 1, 1, false, PixelType::Uint16).unwrap();
    image.little_endian = true;
    let location = Location::memory("deep.tif");

    let mut writer = ctx.writer_for(&location).unwrap();
    writer.set_metadata(single_image("TIFF", image.clone())).unwrap();
    let config = WriterConfig {
        little_endian: false,
        ..WriterConfig::default()
    };
    writer.set_dest(&location, 0, &config).unwrap();
    writer
        .save_plane(0, 0, &full_plane(&image, u16_samples(&values)), None)
        .unwrap();
    writer.close().unwrap();

    let bytes = ctx.locations().memory_contents("deep.tif").unwrap();
    assert_eq!(&bytes[..4], b"MM\0*");

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let plane = reader.open_plane(0, 0).unwrap();
    assert!(!plane.is_little_endian());
    let expected: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    assert_eq!(&plane.data()[..], expected.as_slice());
}

#[test]
fn test_tiff_jpeg_keeps_dimensions() {
    let ctx = Context::new();
    let (width, height) = (32u64, 16u64);
    let image =
        ImageMetadata::with_dimensions(width, height, 3, 1, 1, true, PixelType::Uint8).unwrap();
    let input = smooth(width as usize, height as usize, 3);
    let location = Location::memory("photo.tif");

    let mut writer = ctx.writer_for(&location).unwrap();
    writer.set_metadata(single_image("TIFF", image.clone())).unwrap();
    let mut config = WriterConfig::default().with_compression(Compression::Jpeg);
    config.codec_options.quality = Some(95);
    writer.set_dest(&location, 0, &config).unwrap();
    writer
        .save_plane(0, 0, &full_plane(&image, input.clone()), None)
        .unwrap();
    writer.close().unwrap();

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let read = reader.metadata().unwrap().image(0).unwrap().clone();
    assert_eq!((read.width(), read.height(), read.channels()), (width, height, 3));
    assert!(read.interleaved);

    let plane = reader.open_plane(0, 0).unwrap();
    assert_eq!(plane.data().len(), input.len());
    let total: u64 = plane
        .data()
        .iter()
        .zip(&input)
        .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs() as u64)
        .sum();
    let mean = total as f64 / input.len() as f64;
    assert!(mean < 12.0, "mean absolute error {}", mean);
}

#[test]
fn test_unsupported_type_rejected_before_writing() {
    let ctx = Context::new();
    let image = ImageMetadata::with_dimensions(4, 4, 1, 1, 1, false, PixelType::Uint16).unwrap();
    let location = Location::memory("rejected.tif");

    let mut writer = ctx.writer_for(&location).unwrap();
    assert!(!writer.is_supported_type(PixelType::Uint16, Compression::Jpeg));
    assert!(writer.is_supported_type(PixelType::Uint16, Compression::Lzw));
    writer.set_metadata(single_image("TIFF", image)).unwrap();

    let config = WriterConfig::default().with_compression(Compression::Jpeg);
    let err = writer.set_dest(&location, 0, &config).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::UnsupportedPixelType { .. })
    ));
    assert!(ctx.locations().memory_contents("rejected.tif").is_none());

    let config = WriterConfig::default().with_compression(Compression::Jpeg2000);
    let err = writer.set_dest(&location, 0, &config).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::UnsupportedOperation { .. })
    ));
    assert!(ctx.locations().memory_contents("rejected.tif").is_none());
}

#[test]
fn test_tiff_planes_must_be_sequential() {
    let ctx = Context::new();
    let image = uint8_gray(2, 2, 2);
    let location = Location::memory("ordered.tif");
    let mut writer = ctx.writer_for(&location).unwrap();
    assert!(writer.write_sequential());
    assert!(writer.can_do_stacks());

    writer.set_metadata(single_image("TIFF", image.clone())).unwrap();
    writer.set_dest(&location, 0, &WriterConfig::default()).unwrap();
    let plane = full_plane(&image, vec![7; 4]);
    writer.save_plane(0, 0, &plane, None).unwrap();
    let err = writer.save_plane(0, 0, &plane, None).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::UnsupportedOperation { .. })
    ));
    writer.save_plane(0, 1, &plane, None).unwrap();
    assert!(writer.save_plane(0, 2, &plane, None).is_err());
}

#[test]
fn test_tiff_rejects_partial_planes() {
    let ctx = Context::new();
    let image = uint8_gray(4, 4, 1);
    let location = Location::memory("partial.tif");
    let mut writer = ctx.writer_for(&location).unwrap();
    writer.set_metadata(single_image("TIFF", image)).unwrap();
    writer.set_dest(&location, 0, &WriterConfig::default()).unwrap();

    let bounds = Bounds::new(vec![0, 0], vec![2, 2]).unwrap();
    let plane = Plane::new(vec![0u8; 4], bounds, PixelType::Uint8, 1, false, false).unwrap();
    assert!(writer.save_plane(0, 0, &plane, None).is_err());
}

#[test]
fn test_tiff_plane_retry_after_rejection() {
    let ctx = Context::new();
    let image = uint8_gray(4, 4, 2);
    let location = Location::memory("retry.tif");
    let mut writer = ctx.writer_for(&location).unwrap();
    writer.set_metadata(single_image("TIFF", image.clone())).unwrap();
    writer.set_dest(&location, 0, &WriterConfig::default()).unwrap();

    let bounds = Bounds::new(vec![0, 0], vec![2, 2]).unwrap();
    let partial = Plane::new(vec![0u8; 4], bounds, PixelType::Uint8, 1, false, false).unwrap();
    assert!(writer.save_plane(0, 0, &partial, None).is_err());

    // The rejected call must not count as plane 0
    let first = gradient(16);
    let second = vec![9u8; 16];
    writer
        .save_plane(0, 0, &full_plane(&image, first.clone()), None)
        .unwrap();
    writer
        .save_plane(0, 1, &full_plane(&image, second.clone()), None)
        .unwrap();
    writer.close().unwrap();

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    assert_eq!(&reader.open_plane(0, 0).unwrap().data()[..], first.as_slice());
    assert_eq!(&reader.open_plane(0, 1).unwrap().data()[..], second.as_slice());
}

// =============================================================================
// PNM
// =============================================================================

#[test]
fn test_pnm_regions_in_any_order() {
    let ctx = Context::new();
    let (width, height) = (4u64, 3u64);
    let image =
        ImageMetadata::with_dimensions(width, height, 3, 1, 1, true, PixelType::Uint8).unwrap();
    let full = gradient((width * height * 3) as usize);
    let location = Location::memory("tiles.ppm");

    let mut writer = ctx.writer_for(&location).unwrap();
    assert!(!writer.write_sequential());
    assert!(!writer.can_do_stacks());
    writer.set_metadata(single_image("PNM", image)).unwrap();
    writer.set_dest(&location, 0, &WriterConfig::default()).unwrap();

    // Right half, then left half bottom-up one row at a time
    let mut regions = vec![(2u64, 0u64, 2u64, 3u64)];
    regions.extend((0..3).rev().map(|y| (0, y, 2, 1)));
    for (x, y, w, h) in regions {
        let mut data = Vec::new();
        for row in y..y + h {
            let start = ((row * width + x) * 3) as usize;
            data.extend_from_slice(&full[start..start + (w * 3) as usize]);
        }
        let extents = vec![3, w, h];
        let plane = Plane::new(
            data,
            Bounds::full(&extents),
            PixelType::Uint8,
            3,
            true,
            false,
        )
        .unwrap();
        let target = Bounds::new(vec![0, x, y], vec![3, x + w, y + h]).unwrap();
        writer.save_plane(0, 0, &plane, Some(&target)).unwrap();
    }
    writer.close().unwrap();

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    assert_eq!(reader.metadata().unwrap().format_name(), "PNM");
    assert_eq!(&reader.open_plane(0, 0).unwrap().data()[..], full.as_slice());
}

#[test]
fn test_pnm_rejects_channel_subsets() {
    let ctx = Context::new();
    let image = ImageMetadata::with_dimensions(2, 2, 3, 1, 1, true, PixelType::Uint8).unwrap();
    let location = Location::memory("subset.ppm");
    let mut writer = ctx.writer_for(&location).unwrap();
    writer.set_metadata(single_image("PNM", image)).unwrap();
    writer.set_dest(&location, 0, &WriterConfig::default()).unwrap();

    let plane = Plane::new(
        vec![0u8; 4],
        Bounds::full(&[1, 2, 2]),
        PixelType::Uint8,
        3,
        true,
        false,
    )
    .unwrap();
    let target = Bounds::new(vec![1, 0, 0], vec![2, 2, 2]).unwrap();
    assert!(writer.save_plane(0, 0, &plane, Some(&target)).is_err());
}

#[test]
fn test_pnm_rejects_stacks_and_odd_channels() {
    let ctx = Context::new();
    let location = Location::memory("bad.pgm");
    let mut writer = ctx.writer_for(&location).unwrap();

    writer.set_metadata(single_image("PNM", uint8_gray(2, 2, 2))).unwrap();
    assert!(writer
        .set_dest(&location, 0, &WriterConfig::default())
        .is_err());

    let two = ImageMetadata::with_dimensions(2, 2, 2, 1, 1, true, PixelType::Uint8).unwrap();
    writer.set_metadata(single_image("PNM", two)).unwrap();
    assert!(writer
        .set_dest(&location, 0, &WriterConfig::default())
        .is_err());
    assert!(ctx.locations().memory_contents("bad.pgm").is_none());
}

#[test]
fn test_pnm_sixteen_bit_is_big_endian() {
    let ctx = Context::new();
    let mut image =
        ImageMetadata::with_dimensions(2, 1, 1, 1, 1, false, PixelType::Uint16).unwrap();
    image.little_endian = true;
    let location = Location::memory("deep.pgm");

    let mut writer = ctx.writer_for(&location).unwrap();
    writer.set_metadata(single_image("PNM", image.clone())).unwrap();
    writer.set_dest(&location, 0, &WriterConfig::default()).unwrap();
    writer
        .save_plane(0, 0, &full_plane(&image, u16_samples(&[1, 1000])), None)
        .unwrap();
    writer.close().unwrap();

    let bytes = ctx.locations().memory_contents("deep.pgm").unwrap();
    assert!(bytes.starts_with(b"P5\n2 1\n65535\n"));
    assert_eq!(&bytes[bytes.len() - 4..], &[0, 1, 0x03, 0xE8]);
}

// =============================================================================
// Conversion
// =============================================================================

#[test]
fn test_tiff_to_pgm_conversion() {
    let ctx = Context::new();
    let image = uint8_gray(5, 3, 1);
    let pixels = gradient(15);
    let source = Location::memory("source.tif");

    let mut writer = ctx.writer_for(&source).unwrap();
    writer.set_metadata(single_image("TIFF", image.clone())).unwrap();
    writer
        .set_dest(&source, 0, &WriterConfig::default().with_compression(Compression::Lzw))
        .unwrap();
    writer
        .save_plane(0, 0, &full_plane(&image, pixels.clone()), None)
        .unwrap();
    writer.close().unwrap();

    let mut reader = ctx.open_reader(&source, &ParserConfig::default()).unwrap();
    let metadata = reader.metadata().unwrap().clone();
    let target = Location::memory("target.pgm");
    let mut writer = ctx.writer_for(&target).unwrap();
    writer.set_metadata(metadata).unwrap();
    writer.set_dest(&target, 0, &WriterConfig::default()).unwrap();
    let plane = reader.open_plane(0, 0).unwrap();
    writer.save_plane(0, 0, &plane, None).unwrap();
    writer.close().unwrap();
    reader.close().unwrap();

    let mut converted = ctx.open_reader(&target, &ParserConfig::default()).unwrap();
    assert_eq!(&converted.open_plane(0, 0).unwrap().data()[..], pixels.as_slice());
}
