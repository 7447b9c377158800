mod access;
mod byte_order;
mod handle;
mod location;

pub use access::{BytesAccess, FileAccess, MemoryAccess, RandomAccess};
pub use byte_order::ByteOrder;
pub use handle::DataHandle;
pub use location::{Location, LocationService};
