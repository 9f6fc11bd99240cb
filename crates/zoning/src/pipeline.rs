//! Pipeline orchestration
//!
//! Chains the stages from validity mask to zone statistics. Each stage
//! consumes the previous stage's typed output, so running them out of
//! order is a compile error rather than a runtime check.

use crate::cluster::{self, ClusterMetrics};
use crate::config::ZoningConfig;
use crate::error::{Error, Result};
use crate::features;
use crate::grid::LabelGrid;
use crate::layers::IndexStack;
use crate::mask;
use crate::sampling::{self, SamplePoint};
use crate::stats::{self, ZoneStats};
use crate::zones::{self, Zone};
use agrozone_core::CRS;
use geo_types::Polygon;
use tracing::info;

/// Caller-tunable parameters for one run
#[derive(Debug, Clone)]
pub struct ZoningParams {
    /// Lower bound on sampling points per zone
    pub points_per_zone: usize,
    /// Fixed cluster count; set to skip automatic selection entirely
    pub cluster_override: Option<usize>,
    /// Minimum zone area in hectares
    pub min_zone_area_ha: f64,
    /// Upper bound for automatic cluster-count selection
    pub max_zones: usize,
    /// Seed for clustering and sampling streams
    pub seed: u64,
}

impl ZoningParams {
    pub fn from_config(config: &ZoningConfig) -> Self {
        Self {
            points_per_zone: config.min_points_per_zone,
            cluster_override: None,
            min_zone_area_ha: config.min_zone_area_ha,
            max_zones: config.max_zones,
            seed: config.seed,
        }
    }
}

impl Default for ZoningParams {
    fn default() -> Self {
        Self::from_config(&ZoningConfig::default())
    }
}

/// Everything one run produces
#[derive(Debug, Clone)]
pub struct ZoningResult {
    /// Surviving zones with contiguous ids from 0
    pub zones: Vec<Zone>,
    pub samples: Vec<SamplePoint>,
    pub metrics: ClusterMetrics,
    pub statistics: Vec<ZoneStats>,
    /// Final label grid; ids match `zones`, filtered-out pixels unlabeled
    pub labels: LabelGrid,
    /// Index names in stack order (column order of sample values and stats)
    pub index_names: Vec<String>,
    pub crs: CRS,
}

/// Run the full zoning pipeline on an index stack and field boundary.
///
/// Stages: validity mask, feature matrix, cluster-count selection (skipped
/// when `cluster_override` is set), clustering, polygonization, area
/// filtering, sampling, statistics.
pub fn run(
    stack: &IndexStack,
    boundary: &Polygon<f64>,
    crs: &CRS,
    params: &ZoningParams,
) -> Result<ZoningResult> {
    if let Some(k) = params.cluster_override {
        if k < 2 {
            return Err(Error::Validation(format!(
                "cluster count override must be at least 2, got {k}"
            )));
        }
    }

    let mask = mask::build_validity_mask(stack, boundary)?;
    let feature_matrix = features::build_feature_matrix(stack, &mask)?;

    let k = match params.cluster_override {
        Some(k) => {
            info!("using fixed cluster count k = {}", k);
            k
        }
        None => cluster::select_cluster_count(&feature_matrix, params.max_zones, params.seed)?.0,
    };

    let transform = stack
        .transform()
        .ok_or_else(|| Error::Processing("no indices initialized: the index stack is empty".to_string()))?;

    let clustering = cluster::cluster_pixels(&feature_matrix, mask.shape(), k, params.seed)?;
    let zone_polygons = zones::polygonize(&clustering.labels, transform)?;
    let filtered = zones::filter_zones(zone_polygons, &clustering.labels, params.min_zone_area_ha);
    if filtered.zones.is_empty() {
        return Err(Error::Processing(format!(
            "no zones remain after filtering at {} ha; lower the minimum zone area",
            params.min_zone_area_ha
        )));
    }
    let samples = sampling::generate_sample_points(&filtered, stack, params.points_per_zone, params.seed)?;
    let statistics = stats::compute_zone_statistics(&filtered, stack);

    info!(
        "pipeline complete: {} zones, {} samples",
        filtered.zones.len(),
        samples.len()
    );

    Ok(ZoningResult {
        zones: filtered.zones,
        samples,
        metrics: clustering.metrics,
        statistics,
        labels: filtered.labels,
        index_names: stack.names().map(str::to_string).collect(),
        crs: crs.clone(),
    })
}
