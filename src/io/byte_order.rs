//! Byte order handling shared by the handle layer and the format parsers.
//!
//! Scientific formats are written on both little- and big-endian machines, so
//! the order is a property of the data (a TIFF declares it in its first two
//! bytes) rather than of the host. Every multi-byte primitive read or written
//! through a [`DataHandle`](super::DataHandle) goes through these helpers.

use serde::Serialize;

/// Byte order (endianness) of multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Byte order for a `little_endian` flag.
    #[inline]
    pub const fn from_little_endian(little: bool) -> Self {
        if little {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }

    #[inline]
    pub const fn is_little_endian(self) -> bool {
        matches!(self, ByteOrder::LittleEndian)
    }

    /// Decode the first two bytes of `bytes`.
    ///
    /// The `read_*` methods panic when the slice is shorter than the value.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(leading(bytes)),
            ByteOrder::BigEndian => u16::from_be_bytes(leading(bytes)),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(leading(bytes)),
            ByteOrder::BigEndian => u32::from_be_bytes(leading(bytes)),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(leading(bytes)),
            ByteOrder::BigEndian => u64::from_be_bytes(leading(bytes)),
        }
    }

    #[inline]
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u64_bytes(self, value: u64) -> [u8; 8] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}

/// The first `N` bytes of `bytes` as an array.
#[inline]
fn leading<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
