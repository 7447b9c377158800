//! TIFF compression identifiers.

use serde::Serialize;

use crate::error::EnumError;

/// Compression scheme as stored in the TIFF `Compression` tag (259).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u16)]
pub enum Compression {
    /// Writers that omit the tag; treated as uncompressed
    DefaultUncompressed = 0,
    Uncompressed = 1,
    Ccitt1d = 2,
    Group3Fax = 3,
    Group4Fax = 4,
    Lzw = 5,
    OldJpeg = 6,
    Jpeg = 7,
    Deflate = 8,
    PackBits = 32773,
    Thunderscan = 32809,
    ProprietaryDeflate = 32946,
    Jpeg2000 = 33003,
    Jpeg2000Lossy = 33004,
    AltJpeg2000 = 33005,
    AltJpeg = 33007,
    OlympusJpeg2000 = 34712,
    Nikon = 34713,
    LuraWave = 65535,
}

impl Compression {
    /// Every declared identifier, in code order.
    pub const ALL: [Compression; 19] = [
        Compression::DefaultUncompressed,
        Compression::Uncompressed,
        Compression::Ccitt1d,
        Compression::Group3Fax,
        Compression::Group4Fax,
        Compression::Lzw,
        Compression::OldJpeg,
        Compression::Jpeg,
        Compression::Deflate,
        Compression::PackBits,
        Compression::Thunderscan,
        Compression::ProprietaryDeflate,
        Compression::Jpeg2000,
        Compression::Jpeg2000Lossy,
        Compression::AltJpeg2000,
        Compression::AltJpeg,
        Compression::OlympusJpeg2000,
        Compression::Nikon,
        Compression::LuraWave,
    ];

    /// Look up a compression by its tag value.
    pub fn from_code(code: u16) -> Result<Self, EnumError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(EnumError::UnknownCode {
                kind: "compression",
                code: code as i64,
            })
    }

    /// Look up a compression by name, case-insensitively.
    ///
    /// Accepts the display name as well as short aliases used on the command
    /// line (`none`, `lzw`, `zlib`, `packbits`, `jpeg`, `j2k`).
    pub fn from_name(name: &str) -> Result<Self, EnumError> {
        let lower = name.trim().to_ascii_lowercase();
        let alias = match lower.as_str() {
            "none" | "raw" | "uncompressed" => Some(Compression::Uncompressed),
            "lzw" => Some(Compression::Lzw),
            "deflate" | "zlib" | "zip" => Some(Compression::Deflate),
            "packbits" => Some(Compression::PackBits),
            "jpeg" | "jpg" => Some(Compression::Jpeg),
            "j2k" | "jpeg2000" | "jpeg-2000" => Some(Compression::Jpeg2000),
            _ => None,
        };
        alias
            .or_else(|| {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|c| c.name().eq_ignore_ascii_case(&lower))
            })
            .ok_or(EnumError::UnknownName {
                kind: "compression",
                name: name.to_string(),
            })
    }

    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Human-readable codec name.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::DefaultUncompressed | Compression::Uncompressed => "Uncompressed",
            Compression::Ccitt1d => "CCITT Group 3 1-Dimensional Modified Huffman",
            Compression::Group3Fax => "CCITT T.4 bi-level encoding (Group 3 Fax)",
            Compression::Group4Fax => "CCITT T.6 bi-level encoding (Group 4 Fax)",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg | Compression::AltJpeg => "JPEG",
            Compression::Deflate | Compression::ProprietaryDeflate => "Deflate (Zlib)",
            Compression::PackBits => "PackBits",
            Compression::Thunderscan => "Thunderscan",
            Compression::Jpeg2000
            | Compression::AltJpeg2000
            | Compression::OlympusJpeg2000 => "JPEG-2000",
            Compression::Jpeg2000Lossy => "JPEG-2000 Lossy",
            Compression::Nikon => "Nikon",
            Compression::LuraWave => "LuraWave",
        }
    }

    /// Whether this is one of the JPEG-2000 (wavelet) variants.
    pub const fn is_wavelet(self) -> bool {
        matches!(
            self,
            Compression::Jpeg2000
                | Compression::Jpeg2000Lossy
                | Compression::AltJpeg2000
                | Compression::OlympusJpeg2000
        )
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl TryFrom<u16> for Compression {
    type Error = EnumError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Compression::from_code(code)
    }
}
