//! Format-independent description of datasets, images and planes.

mod axis;
mod dataset;
mod image;
mod pixel;
mod plane;

pub use axis::{Axis, AxisType};
pub use dataset::Metadata;
pub use image::ImageMetadata;
pub use pixel::PixelType;
pub use plane::{Bounds, Plane};

/// Free-form key/value table attached to datasets and images.
pub type MetaTable = std::collections::BTreeMap<String, serde_json::Value>;
