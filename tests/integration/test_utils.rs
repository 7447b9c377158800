//! Test utilities for integration tests.
//!
//! Helpers for building TIFF files chunk by chunk in memory locations, plus
//! sample generators shared across the test modules.

use scifmt::format::tiff::{write_ifd, Ifd, TagValue, TiffTag, VERSION_TIFF};
use scifmt::{Bounds, ByteOrder, Context, ImageMetadata, Location, Metadata, PixelType, Plane};

// =============================================================================
// TIFF Construction
// =============================================================================

/// An IFD without offsets plus the encoded chunks it points at.
pub struct ChunkedIfd {
    pub ifd: Ifd,
    pub chunks: Vec<Vec<u8>>,
}

impl ChunkedIfd {
    /// Strip layout: `rows_per_strip` rows per chunk.
    pub fn strips(
        byte_order: ByteOrder,
        width: u32,
        height: u32,
        bits: u16,
        samples: u16,
        rows_per_strip: u32,
        chunks: Vec<Vec<u8>>,
    ) -> Self {
        let mut ifd = base_ifd(byte_order, width, height, bits, samples);
        ifd.set_tag(TiffTag::RowsPerStrip, TagValue::Long(vec![rows_per_strip]));
        Self { ifd, chunks }
    }

    /// Tile layout with `tile` x `tile` chunks.
    pub fn tiles(
        byte_order: ByteOrder,
        width: u32,
        height: u32,
        bits: u16,
        samples: u16,
        tile: u16,
        chunks: Vec<Vec<u8>>,
    ) -> Self {
        let mut ifd = base_ifd(byte_order, width, height, bits, samples);
        ifd.set_tag(TiffTag::TileWidth, TagValue::Short(vec![tile]));
        ifd.set_tag(TiffTag::TileLength, TagValue::Short(vec![tile]));
        Self { ifd, chunks }
    }

    pub fn with_tag(mut self, tag: TiffTag, value: TagValue) -> Self {
        self.ifd.set_tag(tag, value);
        self
    }
}

fn base_ifd(byte_order: ByteOrder, width: u32, height: u32, bits: u16, samples: u16) -> Ifd {
    let mut ifd = Ifd::new(byte_order);
    ifd.set_tag(TiffTag::ImageWidth, TagValue::Long(vec![width]));
    ifd.set_tag(TiffTag::ImageLength, TagValue::Long(vec![height]));
    ifd.set_tag(TiffTag::BitsPerSample, TagValue::Short(vec![bits; samples as usize]));
    ifd.set_tag(TiffTag::SamplesPerPixel, TagValue::Short(vec![samples]));
    ifd.set_tag(TiffTag::Compression, TagValue::Short(vec![1]));
    ifd.set_tag(
        TiffTag::PhotometricInterpretation,
        TagValue::Short(vec![if samples >= 3 { 2 } else { 1 }]),
    );
    ifd
}

/// Write a classic TIFF holding `ifds` (in chain order) to a memory location.
pub fn write_tiff(ctx: &Context, name: &str, byte_order: ByteOrder, ifds: Vec<ChunkedIfd>) -> Location {
    let location = Location::memory(name);
    let mut handle = ctx.locations().create(&location).unwrap();
    handle.set_byte_order(byte_order);
    let magic: &[u8] = if byte_order.is_little_endian() { b"II" } else { b"MM" };
    handle.write_bytes(magic).unwrap();
    handle.write_u16(VERSION_TIFF).unwrap();
    handle.write_u32(0).unwrap();

    let mut pointer = 4;
    for ChunkedIfd { mut ifd, chunks } in ifds {
        let mut offsets = Vec::with_capacity(chunks.len());
        let mut counts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let offset = handle.length().unwrap();
            handle.seek(offset).unwrap();
            handle.write_bytes(chunk).unwrap();
            offsets.push(offset as u32);
            counts.push(chunk.len() as u32);
        }
        let (offset_tag, count_tag) = if ifd.get_tag(TiffTag::TileWidth).is_some() {
            (TiffTag::TileOffsets, TiffTag::TileByteCounts)
        } else {
            (TiffTag::StripOffsets, TiffTag::StripByteCounts)
        };
        ifd.set_tag(offset_tag, TagValue::Long(offsets));
        // Counts set by the caller are kept, so fixtures can lie about sizes
        if ifd.get_tag(count_tag).is_none() {
            ifd.set_tag(count_tag, TagValue::Long(counts));
        }

        let (offset, next_pointer) = write_ifd(&mut handle, &ifd).unwrap();
        handle.seek(pointer).unwrap();
        handle.write_u32(offset as u32).unwrap();
        pointer = next_pointer;
    }
    handle.close().unwrap();
    location
}

/// A little-endian BigTIFF whose single 4x4 8-bit strip declares
/// `byte_count` bytes while only 16 follow.
pub fn bigtiff_single_strip(byte_count: u64) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend(b"II");
    data.extend(&43u16.to_le_bytes());
    data.extend(&8u16.to_le_bytes());
    data.extend(&0u16.to_le_bytes());
    data.extend(&16u64.to_le_bytes());

    let entries: [(u16, u16, u64); 7] = [
        (256, 4, 4),
        (257, 4, 4),
        (258, 3, 8),
        (259, 3, 1),
        (273, 16, 16 + 8 + 7 * 20 + 8),
        (278, 3, 4),
        (279, 16, byte_count),
    ];
    data.extend(&(entries.len() as u64).to_le_bytes());
    for (tag, typ, value) in entries {
        data.extend(&tag.to_le_bytes());
        data.extend(&typ.to_le_bytes());
        data.extend(&1u64.to_le_bytes());
        data.extend(&value.to_le_bytes());
    }
    data.extend(&0u64.to_le_bytes());
    data.extend(&[0u8; 16]);
    data
}

/// A little-endian BigTIFF with one uncompressed 8-bit IFD of two strips.
///
/// The image is 4x4; strip 0 holds rows 0-1 and strip 1 rows 2-3.
pub fn bigtiff_bytes(pixels: &[u8; 16]) -> Vec<u8> {
    let write_entry = |data: &mut Vec<u8>, tag: u16, typ: u16, count: u64, value: u64| {
        data.extend(&tag.to_le_bytes());
        data.extend(&typ.to_le_bytes());
        data.extend(&count.to_le_bytes());
        data.extend(&value.to_le_bytes());
    };

    let mut data = Vec::new();
    data.extend(b"II");
    data.extend(&43u16.to_le_bytes());
    data.extend(&8u16.to_le_bytes());
    data.extend(&0u16.to_le_bytes());
    data.extend(&16u64.to_le_bytes());

    let entry_count = 7u64;
    let ifd_end = 16 + 8 + entry_count * 20 + 8;
    let pixel_offset = ifd_end;

    data.extend(&entry_count.to_le_bytes());
    write_entry(&mut data, 256, 4, 1, 4);
    write_entry(&mut data, 257, 4, 1, 4);
    write_entry(&mut data, 258, 3, 1, 8);
    write_entry(&mut data, 259, 3, 1, 1);
    // Two LONG values fit inline in the 8-byte value field
    write_entry(&mut data, 273, 4, 2, pixel_offset | ((pixel_offset + 8) << 32));
    write_entry(&mut data, 278, 3, 1, 2);
    write_entry(&mut data, 279, 4, 2, 8 | (8 << 32));
    data.extend(&0u64.to_le_bytes());

    assert_eq!(data.len() as u64, pixel_offset);
    data.extend(pixels);
    data
}

// =============================================================================
// Samples
// =============================================================================

/// Deterministic 8-bit samples with enough structure to compress.
pub fn gradient(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + i / 13) % 251) as u8).collect()
}

/// Smooth 8-bit ramp; JPEG reproduces it closely.
pub fn smooth(width: usize, height: usize, channels: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * channels);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                data.push(((x * 4 + y * 2 + c * 16) % 256) as u8);
            }
        }
    }
    data
}

/// Dataset metadata holding one image.
pub fn single_image(format: &'static str, image: ImageMetadata) -> Metadata {
    let mut metadata = Metadata::new(format);
    metadata.add_image(image);
    metadata
}

/// A full plane of `image` wrapping `data`.
pub fn full_plane(image: &ImageMetadata, data: Vec<u8>) -> Plane {
    Plane::new(
        data,
        Bounds::full(&image.planar_lengths()),
        image.pixel_type,
        image.planar_channels(),
        image.interleaved,
        image.little_endian,
    )
    .unwrap()
}

/// Little-endian bytes of 16-bit samples.
pub fn u16_samples(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn uint8_gray(width: u64, height: u64, z: u64) -> ImageMetadata {
    ImageMetadata::with_dimensions(width, height, 1, z, 1, false, PixelType::Uint8).unwrap()
}
