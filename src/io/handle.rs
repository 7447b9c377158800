//! Cursor-based, byte-order-aware handle over a [`RandomAccess`] backend.
//!
//! The handle owns the cursor and the configured byte order. Every typed
//! primitive reads or writes at the cursor and advances it.
//!
//! # Semantics
//!
//! - Seeking past the end is allowed; the next write extends the resource.
//! - Reading past the end fails with [`IoError::EndOfData`] and leaves the
//!   cursor where it was.
//! - `close()` releases the backend once; later calls are no-ops, and any
//!   other operation on a closed handle fails with [`IoError::Closed`].

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::IoError;

use super::access::{BytesAccess, RandomAccess};
use super::byte_order::ByteOrder;
use super::location::Location;

/// Single-owner random-access handle.
pub struct DataHandle {
    location: Location,
    access: Option<Box<dyn RandomAccess>>,
    position: u64,
    byte_order: ByteOrder,
}

impl std::fmt::Debug for DataHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataHandle")
            .field("location", &self.location)
            .field("position", &self.position)
            .field("byte_order", &self.byte_order)
            .field("closed", &self.access.is_none())
            .finish()
    }
}

impl DataHandle {
    /// Wrap a backend. The byte order starts as big-endian.
    pub fn new(location: Location, access: Box<dyn RandomAccess>) -> Self {
        Self {
            location,
            access: Some(access),
            position: 0,
            byte_order: ByteOrder::BigEndian,
        }
    }

    /// Read-only handle over an in-memory buffer.
    pub fn from_bytes(name: &str, data: impl Into<Bytes>) -> Self {
        let location = Location::memory(name);
        let access = BytesAccess::new(data, location.to_string());
        Self::new(location, Box::new(access))
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_closed(&self) -> bool {
        self.access.is_none()
    }

    fn access(&mut self) -> Result<&mut Box<dyn RandomAccess>, IoError> {
        match self.access.as_mut() {
            Some(access) => Ok(access),
            None => Err(IoError::Closed(self.location.to_string())),
        }
    }

    // =========================================================================
    // Cursor and Length
    // =========================================================================

    pub fn seek(&mut self, position: u64) -> Result<(), IoError> {
        self.access()?;
        self.position = position;
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn skip_bytes(&mut self, count: u64) -> Result<(), IoError> {
        let position = self.position + count;
        self.seek(position)
    }

    pub fn length(&self) -> Result<u64, IoError> {
        match self.access.as_ref() {
            Some(access) => access.size(),
            None => Err(IoError::Closed(self.location.to_string())),
        }
    }

    pub fn set_length(&mut self, length: u64) -> Result<(), IoError> {
        self.access()?.set_size(length)
    }

    /// Bytes between the cursor and the end of the resource.
    pub fn remaining(&self) -> Result<u64, IoError> {
        Ok(self.length()?.saturating_sub(self.position))
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    pub fn is_little_endian(&self) -> bool {
        self.byte_order.is_little_endian()
    }

    // =========================================================================
    // Raw Bytes
    // =========================================================================

    /// Read `len` bytes at the cursor.
    ///
    /// Backends over immutable buffers return a slice of the original
    /// allocation rather than a copy.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, IoError> {
        let position = self.position;
        let bytes = self.access()?.read_exact_at(position, len)?;
        self.position += len as u64;
        Ok(bytes)
    }

    /// Fill `buf` from the cursor.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<(), IoError> {
        let position = self.position;
        let access = self.access()?;
        let read = access.read_at(position, buf)?;
        if read < buf.len() {
            return Err(IoError::EndOfData {
                offset: position,
                requested: buf.len() as u64,
                length: access.size()?,
            });
        }
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Read `len` bytes at `offset` without moving the cursor.
    pub fn read_bytes_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.access()?.read_exact_at(offset, len)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], IoError> {
        let mut buf = [0u8; N];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), IoError> {
        let position = self.position;
        self.access()?.write_at(position, data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    // =========================================================================
    // Typed Reads
    // =========================================================================

    pub fn read_bool(&mut self) -> Result<bool, IoError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8, IoError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, IoError> {
        Ok(self.read_u8()? as i8)
    }

    /// Read one UTF-16 code unit. Unpaired surrogates become U+FFFD.
    pub fn read_char(&mut self) -> Result<char, IoError> {
        let unit = self.read_u16()?;
        Ok(char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    pub fn read_u16(&mut self) -> Result<u16, IoError> {
        let bytes = self.read_array::<2>()?;
        Ok(self.byte_order.read_u16(&bytes))
    }

    pub fn read_i16(&mut self) -> Result<i16, IoError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, IoError> {
        let bytes = self.read_array::<4>()?;
        Ok(self.byte_order.read_u32(&bytes))
    }

    pub fn read_i32(&mut self) -> Result<i32, IoError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, IoError> {
        let bytes = self.read_array::<8>()?;
        Ok(self.byte_order.read_u64(&bytes))
    }

    pub fn read_i64(&mut self) -> Result<i64, IoError> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32, IoError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, IoError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read a fixed-length string, trimming at the first NUL.
    pub fn read_string(&mut self, len: usize) -> Result<String, IoError> {
        let bytes = self.read_bytes(len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read a string stored as a u16 byte length followed by UTF-8 bytes.
    pub fn read_utf(&mut self) -> Result<String, IoError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read bytes up to (not including) `delimiter`, consuming the delimiter.
    ///
    /// Stops at the end of the resource if the delimiter never appears.
    pub fn read_until(&mut self, delimiter: u8) -> Result<Vec<u8>, IoError> {
        let mut out = Vec::new();
        while self.remaining()? > 0 {
            let byte = self.read_u8()?;
            if byte == delimiter {
                break;
            }
            out.push(byte);
        }
        Ok(out)
    }

    // =========================================================================
    // Typed Writes
    // =========================================================================

    pub fn write_bool(&mut self, value: bool) -> Result<(), IoError> {
        self.write_u8(value as u8)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), IoError> {
        self.write_bytes(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<(), IoError> {
        self.write_u8(value as u8)
    }

    /// Write a char as one UTF-16 code unit; chars outside the BMP are truncated.
    pub fn write_char(&mut self, value: char) -> Result<(), IoError> {
        self.write_u16(value as u32 as u16)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), IoError> {
        let bytes = self.byte_order.u16_bytes(value);
        self.write_bytes(&bytes)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), IoError> {
        self.write_u16(value as u16)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), IoError> {
        let bytes = self.byte_order.u32_bytes(value);
        self.write_bytes(&bytes)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), IoError> {
        self.write_u32(value as u32)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), IoError> {
        let bytes = self.byte_order.u64_bytes(value);
        self.write_bytes(&bytes)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), IoError> {
        self.write_u64(value as u64)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), IoError> {
        self.write_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), IoError> {
        self.write_u64(value.to_bits())
    }

    /// Write `value` into exactly `len` bytes, truncating or NUL-padding.
    pub fn write_string(&mut self, value: &str, len: usize) -> Result<(), IoError> {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(len, 0);
        self.write_bytes(&bytes)
    }

    /// Write a u16 byte length followed by the UTF-8 bytes.
    pub fn write_utf(&mut self, value: &str) -> Result<(), IoError> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| {
            IoError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("UTF string too long: {} bytes", bytes.len()),
            ))
        })?;
        self.write_u16(len)?;
        self.write_bytes(bytes)
    }

    /// Write `value` followed by a newline.
    pub fn write_line(&mut self, value: &str) -> Result<(), IoError> {
        self.write_bytes(value.as_bytes())?;
        self.write_bytes(b"\n")
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn flush(&mut self) -> Result<(), IoError> {
        self.access()?.flush()
    }

    /// Release the backend. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), IoError> {
        if let Some(mut access) = self.access.take() {
            debug!(location = %self.location, "closing handle");
            access.flush()?;
        }
        Ok(())
    }
}

impl Drop for DataHandle {
    fn drop(&mut self) {
        if let Some(mut access) = self.access.take() {
            if let Err(e) = access.flush() {
                warn!(location = %self.location, error = %e, "flush failed while dropping handle");
            }
        }
    }
}
