//! Agrindex Raster - Band tiles, GeoTIFF I/O, masking and index arithmetic
//!
//! Everything in this crate is synchronous and CPU-bound. Callers in async
//! code run it on a blocking thread.

pub mod clip;
pub mod geotiff;
pub mod geotransform;
pub mod index;
pub mod tile;

pub use clip::mask_to_polygon;
pub use geotiff::{decode_geotiff, encode_geotiff, Compression};
pub use geotransform::GeoTransform;
pub use index::{normalized_difference, IndexTile};
pub use tile::{BandTile, RasterProfile, RasterTile, Sample, SampleType};
