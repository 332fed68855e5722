pub mod bounding_box;
pub mod rtree;
mod spatial_error;

pub use bounding_box::BoundingBox;
pub use rtree::{RTree, RTreeOptions, SpatialKey};
pub use spatial_error::SpatialError;
