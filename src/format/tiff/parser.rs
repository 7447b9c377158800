//! TIFF header and IFD chain parsing.
//!
//! A classic header is 8 bytes: the byte order mark (`II` or `MM`), version
//! 42 and a 32-bit offset to the first IFD. BigTIFF uses version 43, then
//! declares an offset width of 8 (plus two reserved bytes) and stores a 64-bit
//! first offset, 16 bytes in all.
//!
//! Each IFD is an entry count, the entries (12 bytes classic, 20 bytes
//! BigTIFF) and the offset of the next IFD, 0 terminating the chain.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::TiffError;
use crate::io::{ByteOrder, DataHandle};

use super::ifd::Ifd;
use super::tags::FieldType;
use super::values::TagValue;

// =============================================================================
// Constants
// =============================================================================

/// `II`
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// `MM`
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

pub const VERSION_TIFF: u16 = 42;

pub const VERSION_BIGTIFF: u16 = 43;

pub const TIFF_HEADER_SIZE: usize = 8;

pub const BIGTIFF_HEADER_SIZE: usize = 16;

/// Upper bound on IFDs followed in one chain
const MAX_IFDS: usize = 65_536;

// =============================================================================
// TiffHeader
// =============================================================================

/// The fixed-size header at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,

    /// 64-bit offsets and counts
    pub is_bigtiff: bool,

    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Decode the header from the first bytes of a file of `file_size` bytes.
    ///
    /// The first IFD offset must be non-zero and inside the file.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Read as little-endian: we are matching literal byte patterns
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        let (is_bigtiff, first_ifd_offset) = match version {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            _ => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset == 0 || first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Read and parse the header at the start of `handle`.
    ///
    /// Also sets the handle's byte order to the file's.
    pub fn read(handle: &mut DataHandle) -> Result<Self, TiffError> {
        let length = handle.length()?;
        let available = length.min(BIGTIFF_HEADER_SIZE as u64) as usize;
        let bytes = handle.read_bytes_at(0, available)?;
        let header = Self::parse(&bytes, length)?;
        handle.set_byte_order(header.byte_order);
        Ok(header)
    }

    /// Bytes per IFD entry: tag, type, count and value field.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the value/offset field, which is also the size of the next
    /// IFD offset.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    fn read_offset(&self, bytes: &[u8]) -> u64 {
        if self.is_bigtiff {
            self.byte_order.read_u64(bytes)
        } else {
            self.byte_order.read_u32(bytes) as u64
        }
    }
}

// =============================================================================
// IFD Chain
// =============================================================================

/// Read every IFD in the main chain, in file order.
///
/// A chain that loops back on itself is an error; an offset pointing past the
/// end of the file ends the chain with a warning, since many writers leave a
/// dangling final offset.
pub fn read_ifd_chain(handle: &mut DataHandle, header: &TiffHeader) -> Result<Vec<Ifd>, TiffError> {
    let length = handle.length()?;
    let mut ifds = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 {
        if !visited.insert(offset) || ifds.len() >= MAX_IFDS {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        if offset >= length {
            if ifds.is_empty() {
                return Err(TiffError::InvalidIfdOffset(offset));
            }
            warn!(offset, length, "IFD chain points past end of file; stopping");
            break;
        }

        let (ifd, next) = read_ifd(handle, header, offset)?;
        debug!(offset, entries = ifd.len(), next, "read IFD");
        ifds.push(ifd);
        offset = next;
    }

    Ok(ifds)
}

/// Read one IFD at `offset`, returning it with the offset of the next one.
pub fn read_ifd(
    handle: &mut DataHandle,
    header: &TiffHeader,
    offset: u64,
) -> Result<(Ifd, u64), TiffError> {
    let byte_order = header.byte_order;
    let length = handle.length()?;

    let count_bytes = handle.read_bytes_at(offset, header.ifd_count_size())?;
    let count = if header.is_bigtiff {
        byte_order.read_u64(&count_bytes)
    } else {
        byte_order.read_u16(&count_bytes) as u64
    };

    let entries_size = count
        .checked_mul(header.ifd_entry_size() as u64)
        .and_then(|n| n.checked_add(header.value_offset_size() as u64))
        .ok_or(TiffError::InvalidIfdOffset(offset))?;
    let entries_start = offset + header.ifd_count_size() as u64;
    let entries_end = entries_start.saturating_add(entries_size);
    if entries_end > length {
        return Err(TiffError::FileTooSmall {
            required: entries_end,
            actual: length,
        });
    }
    let block = handle.read_bytes_at(entries_start, entries_size as usize)?;

    let mut ifd = Ifd::with_offset(byte_order, offset);
    let value_size = header.value_offset_size();
    for raw in block.chunks_exact(header.ifd_entry_size()).take(count as usize) {
        let tag = byte_order.read_u16(&raw[0..2]);
        let type_code = byte_order.read_u16(&raw[2..4]);
        let (value_count, value_field) = if header.is_bigtiff {
            (byte_order.read_u64(&raw[4..12]), &raw[12..20])
        } else {
            (byte_order.read_u32(&raw[4..8]) as u64, &raw[8..12])
        };

        let Some(field_type) = FieldType::from_u16(type_code) else {
            warn!(tag, type_code, "skipping entry with unknown field type");
            continue;
        };

        let size = value_count
            .checked_mul(field_type.size_in_bytes() as u64)
            .ok_or(TiffError::InvalidTagValue {
                tag: "entry",
                message: format!("tag {} count {} overflows", tag, value_count),
            })?;

        let value = if size <= value_size as u64 {
            TagValue::decode(field_type, value_count as usize, value_field, byte_order)?
        } else {
            let value_offset = header.read_offset(value_field);
            if value_offset.checked_add(size).map_or(true, |end| end > length) {
                return Err(TiffError::InvalidTagValue {
                    tag: "entry",
                    message: format!(
                        "tag {} value ({} bytes at {}) extends past end of file",
                        tag, size, value_offset
                    ),
                });
            }
            let bytes = handle.read_bytes_at(value_offset, size as usize)?;
            TagValue::decode(field_type, value_count as usize, &bytes, byte_order)?
        };
        ifd.set(tag, value);
    }

    let next_start = count as usize * header.ifd_entry_size();
    let next = header.read_offset(&block[next_start..next_start + value_size]);
    Ok((ifd, next))
}

// =============================================================================
// Tests
// =============================================================================
