use serde::Serialize;

use crate::error::EnumError;

/// Numeric type of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float,
    Double,
}

impl PixelType {
    pub const ALL: [PixelType; 8] = [
        PixelType::Int8,
        PixelType::Uint8,
        PixelType::Int16,
        PixelType::Uint16,
        PixelType::Int32,
        PixelType::Uint32,
        PixelType::Float,
        PixelType::Double,
    ];

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::Int8 | PixelType::Uint8 => 1,
            PixelType::Int16 | PixelType::Uint16 => 2,
            PixelType::Int32 | PixelType::Uint32 | PixelType::Float => 4,
            PixelType::Double => 8,
        }
    }

    pub const fn bits(self) -> u32 {
        self.bytes_per_pixel() as u32 * 8
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            PixelType::Int8 | PixelType::Int16 | PixelType::Int32 | PixelType::Float | PixelType::Double
        )
    }

    pub const fn is_floating_point(self) -> bool {
        matches!(self, PixelType::Float | PixelType::Double)
    }

    pub const fn name(self) -> &'static str {
        match self {
            PixelType::Int8 => "int8",
            PixelType::Uint8 => "uint8",
            PixelType::Int16 => "int16",
            PixelType::Uint16 => "uint16",
            PixelType::Int32 => "int32",
            PixelType::Uint32 => "uint32",
            PixelType::Float => "float",
            PixelType::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, EnumError> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
            .ok_or(EnumError::UnknownName {
                kind: "pixel type",
                name: name.to_string(),
            })
    }

    /// Pixel type for a sample width and signedness/float flags.
    pub fn from_bits(bits: u32, signed: bool, floating_point: bool) -> Option<Self> {
        Some(match (bits, signed, floating_point) {
            (32, _, true) => PixelType::Float,
            (64, _, true) => PixelType::Double,
            (1..=8, false, false) => PixelType::Uint8,
            (1..=8, true, false) => PixelType::Int8,
            (9..=16, false, false) => PixelType::Uint16,
            (9..=16, true, false) => PixelType::Int16,
            (17..=32, false, false) => PixelType::Uint32,
            (17..=32, true, false) => PixelType::Int32,
            _ => return None,
        })
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
