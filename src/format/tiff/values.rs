//! Decoded TIFF tag values.
//!
//! A value is decoded once, when its IFD is read, into the variant matching
//! its field type. Accessors convert between the integer widths the TIFF
//! specification allows for a given tag (a `StripOffsets` may be Short, Long
//! or Long8, for example).

use serde_json::{json, Value};

use crate::error::TiffError;
use crate::io::ByteOrder;

use super::tags::FieldType;

/// Value of one IFD entry.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Ifd(Vec<u32>),
    Long8(Vec<u64>),
    SLong8(Vec<i64>),
    Ifd8(Vec<u64>),
}

impl TagValue {
    /// Decode `count` values of `field_type` from raw bytes.
    pub fn decode(
        field_type: FieldType,
        count: usize,
        bytes: &[u8],
        byte_order: ByteOrder,
    ) -> Result<Self, TiffError> {
        let needed = count.saturating_mul(field_type.size_in_bytes());
        if bytes.len() < needed {
            return Err(TiffError::InvalidTagValue {
                tag: "entry",
                message: format!(
                    "{:?} x {} needs {} bytes, got {}",
                    field_type,
                    count,
                    needed,
                    bytes.len()
                ),
            });
        }
        let bytes = &bytes[..needed];
        let bo = byte_order;

        Ok(match field_type {
            FieldType::Byte => TagValue::Byte(bytes.to_vec()),
            FieldType::Undefined => TagValue::Undefined(bytes.to_vec()),
            FieldType::SByte => TagValue::SByte(bytes.iter().map(|&b| b as i8).collect()),
            FieldType::Ascii => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                TagValue::Ascii(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            FieldType::Short => TagValue::Short(bytes.chunks_exact(2).map(|c| bo.read_u16(c)).collect()),
            FieldType::SShort => {
                TagValue::SShort(bytes.chunks_exact(2).map(|c| bo.read_u16(c) as i16).collect())
            }
            FieldType::Long => TagValue::Long(bytes.chunks_exact(4).map(|c| bo.read_u32(c)).collect()),
            FieldType::Ifd => TagValue::Ifd(bytes.chunks_exact(4).map(|c| bo.read_u32(c)).collect()),
            FieldType::SLong => {
                TagValue::SLong(bytes.chunks_exact(4).map(|c| bo.read_u32(c) as i32).collect())
            }
            FieldType::Float => TagValue::Float(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_bits(bo.read_u32(c)))
                    .collect(),
            ),
            FieldType::Rational => TagValue::Rational(
                bytes
                    .chunks_exact(8)
                    .map(|c| (bo.read_u32(&c[..4]), bo.read_u32(&c[4..])))
                    .collect(),
            ),
            FieldType::SRational => TagValue::SRational(
                bytes
                    .chunks_exact(8)
                    .map(|c| (bo.read_u32(&c[..4]) as i32, bo.read_u32(&c[4..]) as i32))
                    .collect(),
            ),
            FieldType::Double => TagValue::Double(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_bits(bo.read_u64(c)))
                    .collect(),
            ),
            FieldType::Long8 => TagValue::Long8(bytes.chunks_exact(8).map(|c| bo.read_u64(c)).collect()),
            FieldType::Ifd8 => TagValue::Ifd8(bytes.chunks_exact(8).map(|c| bo.read_u64(c)).collect()),
            FieldType::SLong8 => {
                TagValue::SLong8(bytes.chunks_exact(8).map(|c| bo.read_u64(c) as i64).collect())
            }
        })
    }

    /// Serialize the value in `byte_order`.
    ///
    /// ASCII values get their NUL terminator appended.
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let bo = byte_order;
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => v.clone(),
            TagValue::SByte(v) => v.iter().map(|&b| b as u8).collect(),
            TagValue::Ascii(s) => {
                let mut out = s.as_bytes().to_vec();
                out.push(0);
                out
            }
            TagValue::Short(v) => v.iter().flat_map(|&x| bo.u16_bytes(x)).collect(),
            TagValue::SShort(v) => v.iter().flat_map(|&x| bo.u16_bytes(x as u16)).collect(),
            TagValue::Long(v) | TagValue::Ifd(v) => v.iter().flat_map(|&x| bo.u32_bytes(x)).collect(),
            TagValue::SLong(v) => v.iter().flat_map(|&x| bo.u32_bytes(x as u32)).collect(),
            TagValue::Float(v) => v.iter().flat_map(|&x| bo.u32_bytes(x.to_bits())).collect(),
            TagValue::Rational(v) => v
                .iter()
                .flat_map(|&(n, d)| bo.u32_bytes(n).into_iter().chain(bo.u32_bytes(d)))
                .collect(),
            TagValue::SRational(v) => v
                .iter()
                .flat_map(|&(n, d)| {
                    bo.u32_bytes(n as u32)
                        .into_iter()
                        .chain(bo.u32_bytes(d as u32))
                })
                .collect(),
            TagValue::Double(v) => v.iter().flat_map(|&x| bo.u64_bytes(x.to_bits())).collect(),
            TagValue::Long8(v) | TagValue::Ifd8(v) => v.iter().flat_map(|&x| bo.u64_bytes(x)).collect(),
            TagValue::SLong8(v) => v.iter().flat_map(|&x| bo.u64_bytes(x as u64)).collect(),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            TagValue::Byte(_) => FieldType::Byte,
            TagValue::Ascii(_) => FieldType::Ascii,
            TagValue::Short(_) => FieldType::Short,
            TagValue::Long(_) => FieldType::Long,
            TagValue::Rational(_) => FieldType::Rational,
            TagValue::SByte(_) => FieldType::SByte,
            TagValue::Undefined(_) => FieldType::Undefined,
            TagValue::SShort(_) => FieldType::SShort,
            TagValue::SLong(_) => FieldType::SLong,
            TagValue::SRational(_) => FieldType::SRational,
            TagValue::Float(_) => FieldType::Float,
            TagValue::Double(_) => FieldType::Double,
            TagValue::Ifd(_) => FieldType::Ifd,
            TagValue::Long8(_) => FieldType::Long8,
            TagValue::SLong8(_) => FieldType::SLong8,
            TagValue::Ifd8(_) => FieldType::Ifd8,
        }
    }

    /// Number of values, as stored in the entry's count field.
    pub fn count(&self) -> usize {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => v.len(),
            TagValue::Ascii(s) => s.len() + 1,
            TagValue::Short(v) => v.len(),
            TagValue::Long(v) | TagValue::Ifd(v) => v.len(),
            TagValue::Rational(v) => v.len(),
            TagValue::SByte(v) => v.len(),
            TagValue::SShort(v) => v.len(),
            TagValue::SLong(v) => v.len(),
            TagValue::SRational(v) => v.len(),
            TagValue::Float(v) => v.len(),
            TagValue::Double(v) => v.len(),
            TagValue::Long8(v) | TagValue::Ifd8(v) => v.len(),
            TagValue::SLong8(v) => v.len(),
        }
    }

    /// Unsigned integer view of the value, for tags that may use any width.
    ///
    /// Returns `None` for ASCII, rational and floating point values, and for
    /// negative signed values.
    pub fn as_u64_vec(&self) -> Option<Vec<u64>> {
        Some(match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => v.iter().map(|&x| x as u64).collect(),
            TagValue::Short(v) => v.iter().map(|&x| x as u64).collect(),
            TagValue::Long(v) | TagValue::Ifd(v) => v.iter().map(|&x| x as u64).collect(),
            TagValue::Long8(v) | TagValue::Ifd8(v) => v.clone(),
            TagValue::SByte(v) => v.iter().map(|&x| u64::try_from(x).ok()).collect::<Option<_>>()?,
            TagValue::SShort(v) => v.iter().map(|&x| u64::try_from(x).ok()).collect::<Option<_>>()?,
            TagValue::SLong(v) => v.iter().map(|&x| u64::try_from(x).ok()).collect::<Option<_>>()?,
            TagValue::SLong8(v) => v.iter().map(|&x| u64::try_from(x).ok()).collect::<Option<_>>()?,
            _ => return None,
        })
    }

    /// First value as an unsigned integer.
    pub fn first_u64(&self) -> Option<u64> {
        self.as_u64_vec().and_then(|v| v.first().copied())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of Byte and Undefined values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => Some(v),
            _ => None,
        }
    }

    /// JSON rendering for the metadata table.
    ///
    /// Single values are unwrapped; rationals become floats.
    pub fn to_json(&self) -> Value {
        fn list<T: Into<Value> + Copy>(values: &[T]) -> Value {
            match values {
                [single] => (*single).into(),
                _ => Value::Array(values.iter().map(|&v| v.into()).collect()),
            }
        }

        match self {
            TagValue::Ascii(s) => json!(s),
            TagValue::Byte(v) | TagValue::Undefined(v) => list(v.as_slice()),
            TagValue::Short(v) => list(v.as_slice()),
            TagValue::Long(v) | TagValue::Ifd(v) => list(v.as_slice()),
            TagValue::Long8(v) | TagValue::Ifd8(v) => list(v.as_slice()),
            TagValue::SByte(v) => list(v.as_slice()),
            TagValue::SShort(v) => list(v.as_slice()),
            TagValue::SLong(v) => list(v.as_slice()),
            TagValue::SLong8(v) => list(v.as_slice()),
            TagValue::Float(v) => list(v.as_slice()),
            TagValue::Double(v) => list(v.as_slice()),
            TagValue::Rational(v) => {
                let floats: Vec<f64> = v
                    .iter()
                    .map(|&(n, d)| if d == 0 { 0.0 } else { n as f64 / d as f64 })
                    .collect();
                list(floats.as_slice())
            }
            TagValue::SRational(v) => {
                let floats: Vec<f64> = v
                    .iter()
                    .map(|&(n, d)| if d == 0 { 0.0 } else { n as f64 / d as f64 })
                    .collect();
                list(floats.as_slice())
            }
        }
    }
}
