//! Clustering engine
//!
//! Fits the final k-means model, scatters labels back onto the
//! full-resolution grid, and records run-level quality metrics.

pub mod kmeans;
pub mod quality;
pub mod select;

pub use kmeans::{KmeansFit, KmeansParams};
pub use select::{select_cluster_count, CandidateScore};

use crate::error::{Error, Result};
use crate::features::FeatureMatrix;
use crate::grid::LabelGrid;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Quality record for the final clustering, serialized into the run's
/// metrics file.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterMetrics {
    pub cluster_count: usize,
    /// Silhouette of the final partition; -1 when degenerate
    pub silhouette: f64,
    /// Calinski-Harabasz of the final partition; 0 when degenerate
    pub calinski_harabasz: f64,
    /// Total within-cluster squared distance
    pub inertia: f64,
    /// Pixel count per cluster, indexed by label
    pub cluster_sizes: Vec<usize>,
    /// UTC timestamp of the fit, RFC 3339
    pub timestamp: String,
}

/// Final clustering output: the label grid plus its quality metrics
#[derive(Debug, Clone)]
pub struct Clustering {
    pub labels: LabelGrid,
    pub metrics: ClusterMetrics,
}

/// Fit a fresh model with exactly `k` clusters and scatter the labels back
/// onto the full-resolution grid.
///
/// Pixels outside the feature matrix stay unlabeled; a warning is raised if
/// any valid pixel somehow ends up without a label.
pub fn cluster_pixels(
    features: &FeatureMatrix,
    shape: (usize, usize),
    k: usize,
    seed: u64,
) -> Result<Clustering> {
    if features.n_samples() == 0 {
        return Err(Error::Processing(
            "feature matrix is empty: no valid pixels to cluster".to_string(),
        ));
    }

    let data = features.data();
    let fit = kmeans::fit(data, &KmeansParams::with_k(k, seed))?;

    let mut labels = LabelGrid::unlabeled(shape.0, shape.1);
    for (&(row, col), &label) in features.coords().iter().zip(fit.labels.iter()) {
        labels.set(row, col, Some(label));
    }

    let labeled = labels.labeled_count();
    debug!(
        "label scatter: {} grid cells, {} valid pixels, {} labeled",
        shape.0 * shape.1,
        features.n_samples(),
        labeled
    );
    if labeled < features.n_samples() {
        warn!(
            "{} valid pixels ended up unlabeled",
            features.n_samples() - labeled
        );
    }

    let mut cluster_sizes = vec![0usize; k];
    for &label in &fit.labels {
        if let Some(slot) = cluster_sizes.get_mut(label as usize) {
            *slot += 1;
        }
    }

    let silhouette = quality::silhouette_score(data, &fit.labels, seed).unwrap_or(-1.0);
    let calinski = quality::calinski_harabasz(data, &fit.labels).unwrap_or(0.0);
    info!(
        "clustered {} pixels into {} clusters (silhouette {:.4})",
        features.n_samples(),
        k,
        silhouette
    );

    Ok(Clustering {
        labels,
        metrics: ClusterMetrics {
            cluster_count: k,
            silhouette,
            calinski_harabasz: calinski,
            inertia: fit.inertia,
            cluster_sizes,
            timestamp: Utc::now().to_rfc3339(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::build_feature_matrix;
    use crate::layers::IndexStack;
    use crate::mask::build_validity_mask;
    use agrozone_core::{GeoTransform, Raster};
    use geo_types::{Coord, LineString, Polygon};

    fn plateau_features() -> (FeatureMatrix, (usize, usize)) {
        let mut values = Vec::new();
        for row in 0..4 {
            for _col in 0..4 {
                values.push(if row < 2 { 10.0 } else { 100.0 });
            }
        }
        let mut layer = Raster::from_vec(values, 4, 4).unwrap();
        layer.set_transform(GeoTransform::from_bounds(0.0, 0.0, 4.0, 4.0, 4, 4));
        let mut stack = IndexStack::new();
        stack.insert("ndvi", layer).unwrap();

        let boundary = Polygon::new(
            LineString::from(vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 4.0, y: 0.0 },
                Coord { x: 4.0, y: 4.0 },
                Coord { x: 0.0, y: 4.0 },
                Coord { x: 0.0, y: 0.0 },
            ]),
            vec![],
        );
        let mask = build_validity_mask(&stack, &boundary).unwrap();
        let features = build_feature_matrix(&stack, &mask).unwrap();
        (features, mask.shape())
    }

    #[test]
    fn test_cluster_pixels_labels_whole_grid() {
        let (features, shape) = plateau_features();
        let clustering = cluster_pixels(&features, shape, 2, 42).unwrap();

        assert_eq!(clustering.labels.labeled_count(), 16);
        assert_eq!(clustering.metrics.cluster_count, 2);
        assert_eq!(clustering.metrics.cluster_sizes.iter().sum::<usize>(), 16);
        assert!(clustering.metrics.silhouette >= -1.0);
        assert!(clustering.metrics.silhouette <= 1.0);
        assert!(!clustering.metrics.timestamp.is_empty());
    }

    #[test]
    fn test_plateaus_get_distinct_labels() {
        let (features, shape) = plateau_features();
        let clustering = cluster_pixels(&features, shape, 2, 42).unwrap();

        let top = clustering.labels.get(0, 0);
        let bottom = clustering.labels.get(3, 0);
        assert!(top.is_some() && bottom.is_some());
        assert_ne!(top, bottom, "different plateaus should get different labels");
        assert_eq!(top, clustering.labels.get(1, 3));
        assert_eq!(bottom, clustering.labels.get(2, 2));
    }
}
