//! I/O for reading and writing raster data

mod native;

pub use native::{read_geotiff, read_geotiff_stack, write_geotiff};
