//! TIFF reading integration tests.
//!
//! Files are assembled chunk by chunk in memory locations and read back
//! through [`Context::open_reader`], covering strip and tile layouts, both
//! byte orders, planar configuration 2, predictors, BigTIFF and codecs the
//! table declares but cannot decode.

use scifmt::codec::{deflate, lzw, CodecOptions};
use scifmt::format::tiff::{TagValue, TiffTag};
use scifmt::{AxisType, Bounds, ByteOrder, Context, Error, FormatError, ParserConfig, PixelType};

use super::test_utils::{bigtiff_bytes, bigtiff_single_strip, gradient, write_tiff, ChunkedIfd};

// =============================================================================
// Strip Layout
// =============================================================================

#[test]
fn test_strips_in_both_byte_orders() {
    let pixels = gradient(16);
    for byte_order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
        let ctx = Context::new();
        // Three rows then one: the last strip is short
        let ifd = ChunkedIfd::strips(
            byte_order,
            4,
            4,
            8,
            1,
            3,
            vec![pixels[..12].to_vec(), pixels[12..].to_vec()],
        );
        let location = write_tiff(&ctx, "strips.tif", byte_order, vec![ifd]);

        let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
        let metadata = reader.metadata().unwrap();
        assert_eq!(metadata.format_name(), "TIFF");
        let image = metadata.image(0).unwrap();
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 4);
        assert_eq!(image.pixel_type, PixelType::Uint8);
        assert_eq!(image.little_endian, byte_order.is_little_endian());

        let plane = reader.open_plane(0, 0).unwrap();
        assert_eq!(&plane.data()[..], pixels.as_slice(), "{:?}", byte_order);
        reader.close().unwrap();
    }
}

#[test]
fn test_region_spanning_strips() {
    let ctx = Context::new();
    let pixels = gradient(16);
    let ifd = ChunkedIfd::strips(
        ByteOrder::LittleEndian,
        4,
        4,
        8,
        1,
        1,
        pixels.chunks(4).map(<[u8]>::to_vec).collect(),
    );
    let location = write_tiff(&ctx, "rows.tif", ByteOrder::LittleEndian, vec![ifd]);
    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();

    // Columns 1..3 of rows 1..4
    let bounds = Bounds::new(vec![1, 1], vec![3, 4]).unwrap();
    let region = reader.open_region(0, 0, &bounds).unwrap();
    let expected: Vec<u8> = (1..4)
        .flat_map(|y| pixels[y * 4 + 1..y * 4 + 3].to_vec())
        .collect();
    assert_eq!(&region.data()[..], expected.as_slice());
    assert_eq!(region.bounds(), &bounds);
}

#[test]
fn test_sixteen_bit_big_endian_samples_keep_file_order() {
    let ctx = Context::new();
    let values = [1u16, 256, 4095, 65535];
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    let ifd = ChunkedIfd::strips(ByteOrder::BigEndian, 2, 2, 16, 1, 2, vec![raw.clone()]);
    let location = write_tiff(&ctx, "deep.tif", ByteOrder::BigEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    assert_eq!(reader.metadata().unwrap().pixel_type(0).unwrap(), PixelType::Uint16);
    let plane = reader.open_plane(0, 0).unwrap();
    assert!(!plane.is_little_endian());
    assert_eq!(&plane.data()[..], raw.as_slice());
}

// =============================================================================
// Tile Layout
// =============================================================================

#[test]
fn test_tiles_with_edge_padding() {
    let ctx = Context::new();
    // 6x3 image in 4x4 tiles: two tiles across, one down, both padded
    let (width, height, tile) = (6usize, 3usize, 4usize);
    let pixels = gradient(width * height);
    let chunks: Vec<Vec<u8>> = (0..2)
        .map(|tx| {
            let mut chunk = vec![0u8; tile * tile];
            for y in 0..height {
                for x in 0..tile {
                    let source_x = tx * tile + x;
                    if source_x < width {
                        chunk[y * tile + x] = pixels[y * width + source_x];
                    }
                }
            }
            chunk
        })
        .collect();
    let ifd = ChunkedIfd::tiles(ByteOrder::LittleEndian, 6, 3, 8, 1, 4, chunks);
    let location = write_tiff(&ctx, "tiles.tif", ByteOrder::LittleEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let plane = reader.open_plane(0, 0).unwrap();
    assert_eq!(&plane.data()[..], pixels.as_slice());

    // A region inside the second tile only
    let bounds = Bounds::new(vec![4, 1], vec![6, 3]).unwrap();
    let region = reader.open_region(0, 0, &bounds).unwrap();
    assert_eq!(
        &region.data()[..],
        &[pixels[10], pixels[11], pixels[16], pixels[17]]
    );
}

// =============================================================================
// Sample Layouts
// =============================================================================

#[test]
fn test_interleaved_rgb_channel_subset() {
    let ctx = Context::new();
    let pixels = gradient(2 * 2 * 3);
    let ifd = ChunkedIfd::strips(ByteOrder::LittleEndian, 2, 2, 8, 3, 2, vec![pixels.clone()]);
    let location = write_tiff(&ctx, "rgb.tif", ByteOrder::LittleEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let image = reader.metadata().unwrap().image(0).unwrap().clone();
    assert!(image.interleaved);
    assert_eq!(image.planar_axis_count(), 3);
    assert_eq!(image.plane_count(), 1);

    // Green and blue of every pixel
    let bounds = Bounds::new(vec![1, 0, 0], vec![3, 2, 2]).unwrap();
    let region = reader.open_region(0, 0, &bounds).unwrap();
    let expected: Vec<u8> = pixels.chunks(3).flat_map(|p| [p[1], p[2]]).collect();
    assert_eq!(&region.data()[..], expected.as_slice());
    assert_eq!(region.channels(), 2);
}

#[test]
fn test_planar_configuration_separate() {
    let ctx = Context::new();
    let red = vec![1u8, 2, 3, 4];
    let green = vec![10u8, 20, 30, 40];
    let blue = vec![100u8, 110, 120, 130];
    let ifd = ChunkedIfd::strips(
        ByteOrder::LittleEndian,
        2,
        2,
        8,
        3,
        2,
        vec![red.clone(), green.clone(), blue.clone()],
    )
    .with_tag(TiffTag::PlanarConfiguration, TagValue::Short(vec![2]));
    let location = write_tiff(&ctx, "planar.tif", ByteOrder::LittleEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let image = reader.metadata().unwrap().image(0).unwrap().clone();
    assert!(!image.interleaved);
    assert_eq!(image.planar_axis_count(), 2);
    assert_eq!(image.axis_length(AxisType::Channel), 3);
    assert_eq!(image.plane_count(), 3);

    for (plane, expected) in [red, green, blue].iter().enumerate() {
        let data = reader.open_plane(0, plane as u64).unwrap();
        assert_eq!(&data.data()[..], expected.as_slice(), "plane {}", plane);
    }
}

#[test]
fn test_horizontal_predictor_with_deflate() {
    let ctx = Context::new();
    // Differences of the rows [10, 15, 20, 25] and [0, 1, 2, 3]
    let differenced = [10u8, 5, 5, 5, 0, 1, 1, 1];
    let compressed = deflate::encode(&differenced, &CodecOptions::default()).unwrap();
    let ifd = ChunkedIfd::strips(ByteOrder::LittleEndian, 4, 2, 8, 1, 2, vec![compressed])
        .with_tag(TiffTag::Compression, TagValue::Short(vec![8]))
        .with_tag(TiffTag::Predictor, TagValue::Short(vec![2]));
    let location = write_tiff(&ctx, "predicted.tif", ByteOrder::LittleEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let plane = reader.open_plane(0, 0).unwrap();
    assert_eq!(&plane.data()[..], &[10, 15, 20, 25, 0, 1, 2, 3]);
}

#[test]
fn test_lzw_strips() {
    let ctx = Context::new();
    let pixels = gradient(64);
    let chunks = pixels
        .chunks(32)
        .map(|rows| lzw::encode(rows, &CodecOptions::default()).unwrap())
        .collect();
    let ifd = ChunkedIfd::strips(ByteOrder::BigEndian, 8, 8, 8, 1, 4, chunks)
        .with_tag(TiffTag::Compression, TagValue::Short(vec![5]));
    let location = write_tiff(&ctx, "lzw.tif", ByteOrder::BigEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    assert_eq!(&reader.open_plane(0, 0).unwrap().data()[..], pixels.as_slice());
}

// =============================================================================
// IFD Grouping
// =============================================================================

#[test]
fn test_same_shape_ifds_form_a_z_stack() {
    let ctx = Context::new();
    let strip = |value: u8, width: u32| {
        ChunkedIfd::strips(
            ByteOrder::LittleEndian,
            width,
            1,
            8,
            1,
            1,
            vec![vec![value; width as usize]],
        )
    };
    let location = write_tiff(
        &ctx,
        "stack.tif",
        ByteOrder::LittleEndian,
        vec![strip(1, 2), strip(2, 2), strip(3, 2), strip(9, 3)],
    );

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let metadata = reader.metadata().unwrap().clone();
    assert_eq!(metadata.image_count(), 2);
    assert_eq!(metadata.image(0).unwrap().axis_length(AxisType::Z), 3);
    assert_eq!(metadata.image(0).unwrap().name, "stack.tif #0");
    assert_eq!(metadata.plane_count(1).unwrap(), 1);

    assert_eq!(&reader.open_plane(0, 2).unwrap().data()[..], &[3, 3]);
    assert_eq!(&reader.open_plane(1, 0).unwrap().data()[..], &[9, 9, 9]);
    assert!(matches!(
        reader.open_plane(0, 3),
        Err(Error::Format(FormatError::InvalidIndex { .. }))
    ));
}

#[test]
fn test_original_metadata_tables() {
    let ctx = Context::new();
    let ifd = ChunkedIfd::strips(ByteOrder::LittleEndian, 2, 1, 8, 1, 1, vec![vec![0, 1]])
        .with_tag(TiffTag::ImageDescription, TagValue::Ascii("calibration run".to_string()));
    let location = write_tiff(&ctx, "described.tif", ByteOrder::LittleEndian, vec![ifd]);

    let config = ParserConfig::default().with_original_metadata(true);
    let reader = ctx.open_reader(&location, &config).unwrap();
    let metadata = reader.metadata().unwrap();
    assert_eq!(metadata.table()["ImageDescription"], "calibration run");
    assert_eq!(metadata.table()["ifd_count"], 1);
    assert_eq!(metadata.image(0).unwrap().table["ImageWidth"], 2);

    let plain = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    assert!(plain.metadata().unwrap().image(0).unwrap().table.is_empty());
}

// =============================================================================
// BigTIFF and Unsupported Codecs
// =============================================================================

#[test]
fn test_bigtiff_strips() {
    let ctx = Context::new();
    let pixels: [u8; 16] = std::array::from_fn(|i| (i * 3) as u8);
    ctx.locations().register_memory("big.tif", bigtiff_bytes(&pixels));
    let location = scifmt::Location::memory("big.tif");

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    assert_eq!(reader.metadata().unwrap().table()["bigtiff"], true);
    assert_eq!(&reader.open_plane(0, 0).unwrap().data()[..], &pixels);
}

#[test]
fn test_declared_but_unimplemented_compression() {
    let ctx = Context::new();
    let ifd = ChunkedIfd::strips(ByteOrder::LittleEndian, 2, 2, 8, 1, 2, vec![vec![0; 4]])
        .with_tag(TiffTag::Compression, TagValue::Short(vec![65535]));
    let location = write_tiff(&ctx, "lurawave.tif", ByteOrder::LittleEndian, vec![ifd]);

    // Parsing succeeds; decoding reports the codec as unsupported
    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let err = reader.open_plane(0, 0).unwrap_err();
    assert!(err.is_unsupported_compression(), "{}", err);
}

#[test]
fn test_undeclared_compression_is_an_enumeration_error() {
    let ctx = Context::new();
    let ifd = ChunkedIfd::strips(ByteOrder::LittleEndian, 2, 2, 8, 1, 2, vec![vec![0; 4]])
        .with_tag(TiffTag::Compression, TagValue::Short(vec![9]));
    let location = write_tiff(&ctx, "unknown.tif", ByteOrder::LittleEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let err = reader.open_plane(0, 0).unwrap_err();
    assert!(!err.is_unsupported_compression());
    assert!(matches!(err, Error::Enumeration(_)));
}

// =============================================================================
// Corrupt Input
// =============================================================================

#[test]
fn test_byte_count_past_end_of_file() {
    let ctx = Context::new();
    let ifd = ChunkedIfd::strips(ByteOrder::LittleEndian, 2, 2, 8, 1, 2, vec![gradient(4)])
        .with_tag(TiffTag::StripByteCounts, TagValue::Long(vec![u32::MAX]));
    let location = write_tiff(&ctx, "overrun.tif", ByteOrder::LittleEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let err = reader.open_plane(0, 0).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{}", err);
}

#[test]
fn test_maximal_bigtiff_byte_count() {
    let ctx = Context::new();
    ctx.locations()
        .register_memory("maximal.tif", bigtiff_single_strip(u64::MAX));
    let location = scifmt::Location::memory("maximal.tif");

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    assert!(reader.open_plane(0, 0).is_err());

    // The same file with an honest count decodes
    ctx.locations()
        .register_memory("honest.tif", bigtiff_single_strip(16));
    let mut reader = ctx
        .open_reader(&scifmt::Location::memory("honest.tif"), &ParserConfig::default())
        .unwrap();
    assert_eq!(reader.open_plane(0, 0).unwrap().data().len(), 16);
}

#[test]
fn test_oversized_dimensions() {
    let ctx = Context::new();
    let ifd = ChunkedIfd::strips(ByteOrder::LittleEndian, 2, 2, 8, 1, u32::MAX, vec![gradient(4)])
        .with_tag(TiffTag::ImageWidth, TagValue::Long(vec![u32::MAX]))
        .with_tag(TiffTag::ImageLength, TagValue::Long(vec![u32::MAX]));
    let location = write_tiff(&ctx, "vast.tif", ByteOrder::LittleEndian, vec![ifd]);

    let mut reader = ctx.open_reader(&location, &ParserConfig::default()).unwrap();
    let image = reader.metadata().unwrap().image(0).unwrap().clone();
    assert_eq!((image.width(), image.height()), (u32::MAX as u64, u32::MAX as u64));

    // The full plane cannot be allocated
    let err = reader.open_plane(0, 0).unwrap_err();
    assert!(
        matches!(err, Error::Format(FormatError::Invalid { .. })),
        "{}",
        err
    );

    // A small region still needs the whole strip, which the file does not hold
    let corner = Bounds::new(vec![0, 0], vec![2, 2]).unwrap();
    assert!(reader.open_region(0, 0, &corner).is_err());
}
