//! # agrozone zoning
//!
//! Management-zone delineation for precision agriculture. Takes a stack of
//! spectral index layers and a field boundary, clusters the field into
//! spectrally homogeneous zones, and derives sampling points and per-zone
//! statistics.
//!
//! The pipeline runs in fixed stages:
//!
//! 1. **Validity mask**: boundary rasterization intersected with per-pixel
//!    data availability ([`mask`])
//! 2. **Feature matrix**: valid pixels extracted, imputed and standardized
//!    ([`features`])
//! 3. **Cluster-count selection**: silhouette-driven search over candidate
//!    counts, skipped when the caller fixes k ([`cluster::select`])
//! 4. **Clustering**: k-means fit and label scatter ([`cluster`])
//! 5. **Zone polygons**: pixel footprints dissolved per label ([`zones`])
//! 6. **Area filter**: small zones dropped, survivors renumbered
//!    ([`zones::filter_zones`])
//! 7. **Sampling**: farthest-point sample placement per zone ([`sampling`])
//! 8. **Statistics**: geometric and spectral summaries ([`stats`])
//!
//! [`pipeline::run`] chains all of it; the individual stages are public for
//! callers that need partial runs.
//!
//! ## Example
//!
//! ```no_run
//! use agrozone_core::{GeoTransform, Raster, CRS};
//! use agrozone_zoning::{pipeline, IndexStack, ZoningParams};
//! use geo_types::{Coord, LineString, Polygon};
//!
//! # fn main() -> agrozone_zoning::Result<()> {
//! let mut ndvi = Raster::filled(100, 100, 0.5);
//! ndvi.set_transform(GeoTransform::from_bounds(0.0, 0.0, 100.0, 100.0, 100, 100));
//!
//! let mut stack = IndexStack::new();
//! stack.insert("ndvi", ndvi)?;
//!
//! let boundary = Polygon::new(
//!     LineString::from(vec![
//!         Coord { x: 0.0, y: 0.0 },
//!         Coord { x: 100.0, y: 0.0 },
//!         Coord { x: 100.0, y: 100.0 },
//!         Coord { x: 0.0, y: 100.0 },
//!         Coord { x: 0.0, y: 0.0 },
//!     ]),
//!     vec![],
//! );
//!
//! let result = pipeline::run(
//!     &stack,
//!     &boundary,
//!     &CRS::from_epsg(32719),
//!     &ZoningParams::default(),
//! )?;
//! println!("{} zones, {} samples", result.zones.len(), result.samples.len());
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod features;
pub mod grid;
pub mod indices;
pub mod layers;
pub mod mask;
mod maybe_rayon;
pub mod output;
pub mod pipeline;
pub mod sampling;
pub mod stats;
pub mod zones;

pub use cluster::{ClusterMetrics, Clustering};
pub use config::ZoningConfig;
pub use error::{Error, Result};
pub use features::FeatureMatrix;
pub use grid::LabelGrid;
pub use indices::BandSet;
pub use layers::IndexStack;
pub use mask::ValidityMask;
pub use pipeline::{run, ZoningParams, ZoningResult};
pub use sampling::SamplePoint;
pub use stats::ZoneStats;
pub use zones::{FilteredZones, Zone};
