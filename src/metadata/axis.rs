use serde::Serialize;

use crate::error::EnumError;

/// Semantic type of one image dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AxisType {
    X,
    Y,
    Z,
    Channel,
    Time,
    Lifetime,
    Spectra,
    Series,
    Unknown,
}

impl AxisType {
    pub const ALL: [AxisType; 9] = [
        AxisType::X,
        AxisType::Y,
        AxisType::Z,
        AxisType::Channel,
        AxisType::Time,
        AxisType::Lifetime,
        AxisType::Spectra,
        AxisType::Series,
        AxisType::Unknown,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            AxisType::X => "X",
            AxisType::Y => "Y",
            AxisType::Z => "Z",
            AxisType::Channel => "Channel",
            AxisType::Time => "Time",
            AxisType::Lifetime => "Lifetime",
            AxisType::Spectra => "Spectra",
            AxisType::Series => "Series",
            AxisType::Unknown => "Unknown",
        }
    }

    /// Parse a label case-insensitively; single-letter forms (`c`, `t`) are
    /// accepted too.
    pub fn from_label(label: &str) -> Result<Self, EnumError> {
        let lower = label.trim().to_ascii_lowercase();
        let found = match lower.as_str() {
            "c" => Some(AxisType::Channel),
            "t" => Some(AxisType::Time),
            _ => Self::ALL
                .iter()
                .copied()
                .find(|a| a.label().eq_ignore_ascii_case(&lower)),
        };
        found.ok_or(EnumError::UnknownName {
            kind: "axis type",
            name: label.to_string(),
        })
    }

    /// X and Y are the spatial axes every image carries.
    pub const fn is_xy(self) -> bool {
        matches!(self, AxisType::X | AxisType::Y)
    }
}

impl std::fmt::Display for AxisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One dimension of an image: its type and extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Axis {
    #[serde(rename = "type")]
    pub axis_type: AxisType,
    pub length: u64,
}

impl Axis {
    pub const fn new(axis_type: AxisType, length: u64) -> Self {
        Self { axis_type, length }
    }
}
