//! Automatic cluster-count selection
//!
//! Evaluates every candidate k with a fresh fit and picks the silhouette
//! winner. The Calinski-Harabasz score is computed alongside for reporting
//! but never drives the choice.

use crate::cluster::kmeans::{self, KmeansParams};
use crate::cluster::quality::{calinski_harabasz, silhouette_score};
use crate::error::{Error, Result};
use crate::features::FeatureMatrix;
use crate::maybe_rayon::*;
use tracing::{debug, info};

/// Scores recorded for one candidate cluster count
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub k: usize,
    /// Silhouette, with degenerate partitions folded to -1
    pub silhouette: f64,
    /// Calinski-Harabasz, with degenerate partitions folded to 0
    pub calinski_harabasz: f64,
}

/// Pick the cluster count in `2..=max_k` with the best silhouette.
///
/// Ties go to the smallest k. Candidates needing more clusters than there
/// are pixels are skipped outright. With the `parallel` feature the
/// candidates are evaluated concurrently; results are collected in k order
/// either way, so the winner never depends on scheduling.
pub fn select_cluster_count(
    features: &FeatureMatrix,
    max_k: usize,
    seed: u64,
) -> Result<(usize, Vec<CandidateScore>)> {
    if max_k < 2 {
        return Err(Error::Validation(format!(
            "max cluster count must be at least 2, got {max_k}"
        )));
    }
    let n = features.n_samples();
    let upper = max_k.min(n);
    if upper < 2 {
        return Err(Error::Processing(format!(
            "not enough valid pixels ({n}) to form 2 clusters"
        )));
    }
    if upper < max_k {
        debug!("capping candidate k at {} ({} valid pixels)", upper, n);
    }

    let data = features.data();
    let scores: Vec<CandidateScore> = (2..upper + 1)
        .into_par_iter()
        .map(|k| {
            let fit = kmeans::fit(data, &KmeansParams::with_k(k, seed))?;
            let silhouette = silhouette_score(data, &fit.labels, seed).unwrap_or(-1.0);
            let ch = calinski_harabasz(data, &fit.labels).unwrap_or(0.0);
            Ok(CandidateScore {
                k,
                silhouette,
                calinski_harabasz: ch,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut best: Option<&CandidateScore> = None;
    for score in &scores {
        debug!(
            "candidate k={}: silhouette {:.4}, calinski-harabasz {:.1}",
            score.k, score.silhouette, score.calinski_harabasz
        );
        let better = match best {
            None => true,
            Some(current) => score.silhouette > current.silhouette,
        };
        if better {
            best = Some(score);
        }
    }

    let best = best.ok_or_else(|| {
        Error::Processing("no cluster count candidates could be evaluated".to_string())
    })?;
    info!("selected k = {} (silhouette {:.4})", best.k, best.silhouette);

    Ok((best.k, scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::build_feature_matrix;
    use crate::layers::IndexStack;
    use crate::mask::build_validity_mask;
    use agrozone_core::{GeoTransform, Raster};
    use geo_types::{Coord, LineString, Polygon};

    /// 4x4 field split into two value plateaus
    fn two_plateau_features() -> FeatureMatrix {
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
        build_feature_matrix(&stack, &mask).unwrap()
    }

    #[test]
    fn test_selects_two_for_two_plateaus() {
        let features = two_plateau_features();
        let (k, scores) = select_cluster_count(&features, 5, 42).unwrap();
        assert_eq!(k, 2, "two plateaus should select k=2");
        assert_eq!(scores.len(), 4); // k = 2..=5
        assert!(scores[0].silhouette > 0.9);
    }

    #[test]
    fn test_candidates_capped_by_sample_count() {
        let features = two_plateau_features(); // 16 pixels
        let (_, scores) = select_cluster_count(&features, 50, 42).unwrap();
        assert_eq!(scores.last().map(|s| s.k), Some(16));
    }

    #[test]
    fn test_max_k_below_two_rejected() {
        let features = two_plateau_features();
        assert!(select_cluster_count(&features, 1, 42).is_err());
    }

    #[test]
    fn test_scores_in_ascending_k_order() {
        let features = two_plateau_features();
        let (_, scores) = select_cluster_count(&features, 6, 42).unwrap();
        let ks: Vec<usize> = scores.iter().map(|s| s.k).collect();
        assert_eq!(ks, vec![2, 3, 4, 5, 6]);
    }
}
