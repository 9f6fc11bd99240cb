//! # agrozone core
//!
//! Core types and I/O for the agrozone field-zoning toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced grid type backing spectral bands and
//!   index layers
//! - `GeoTransform`: affine mapping between grid and world coordinates
//! - `CRS`: coordinate reference system identification
//! - `Feature`/`FeatureCollection`: attribute-carrying vector records with
//!   GeoJSON serialization
//! - Native GeoTIFF reading and writing (single band and band stacks)

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{AttributeValue, Feature, FeatureCollection};
