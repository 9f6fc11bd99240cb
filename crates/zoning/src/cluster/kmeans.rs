//! K-means clustering on the feature matrix
//!
//! Multivariate k-means with k-means++ seeding and Lloyd iterations.
//! Every fit is fresh; nothing is warm-started from a previous run.

use crate::error::{Error, Result};
use crate::maybe_rayon::*;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Parameters for a k-means fit
#[derive(Debug, Clone)]
pub struct KmeansParams {
    /// Number of clusters
    pub k: usize,
    /// Maximum Lloyd iterations (default: 100)
    pub max_iterations: usize,
    /// Stop once no centroid moves farther than this (default: 0.001)
    pub convergence: f64,
    /// Seed for centroid initialization
    pub seed: u64,
}

impl KmeansParams {
    /// Default parameters with an explicit cluster count and seed
    pub fn with_k(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            ..Default::default()
        }
    }
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: 5,
            max_iterations: 100,
            convergence: 0.001,
            seed: 42,
        }
    }
}

/// A fitted partition of the feature matrix
#[derive(Debug, Clone)]
pub struct KmeansFit {
    /// One label per input row, in `0..k`
    pub labels: Vec<u32>,
    /// Cluster centers, (k x n_features)
    pub centroids: Array2<f64>,
    /// Total within-cluster squared distance
    pub inertia: f64,
}

/// Fit k-means on a (samples x features) matrix.
///
/// Deterministic for a fixed seed: initialization draws from a ChaCha
/// stream, and the assignment/update steps have no randomness.
pub fn fit(data: ArrayView2<'_, f64>, params: &KmeansParams) -> Result<KmeansFit> {
    if params.k < 2 {
        return Err(Error::Validation("k-means requires k >= 2".to_string()));
    }
    let n = data.nrows();
    if n < params.k {
        return Err(Error::Processing(format!(
            "not enough valid pixels ({}) for {} clusters",
            n, params.k
        )));
    }

    let d = data.ncols();
    let mut centroids = initialize_centroids(data, params.k, params.seed);
    let mut labels: Vec<u32> = vec![0; n];

    for _iter in 0..params.max_iterations {
        // Assignment step: nearest centroid per row
        labels = (0..n)
            .into_par_iter()
            .map(|i| nearest_centroid(data.row(i), &centroids).0 as u32)
            .collect();

        // Update step: recompute centroids from their members
        let mut sums = Array2::<f64>::zeros((params.k, d));
        let mut counts = vec![0usize; params.k];
        for (i, &label) in labels.iter().enumerate() {
            let row = data.row(i);
            let mut sum = sums.row_mut(label as usize);
            for j in 0..d {
                sum[j] += row[j];
            }
            counts[label as usize] += 1;
        }

        let mut max_shift = 0.0_f64;
        for c in 0..params.k {
            if counts[c] == 0 {
                continue; // Keep empty cluster centroid
            }
            for j in 0..d {
                sums[(c, j)] /= counts[c] as f64;
            }
            let shift = sq_dist(sums.row(c), centroids.row(c)).sqrt();
            max_shift = max_shift.max(shift);
            centroids.row_mut(c).assign(&sums.row(c));
        }

        if max_shift < params.convergence {
            break;
        }
    }

    // Final assignment against the converged centroids
    labels = (0..n)
        .into_par_iter()
        .map(|i| nearest_centroid(data.row(i), &centroids).0 as u32)
        .collect();

    let inertia = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| sq_dist(data.row(i), centroids.row(label as usize)))
        .sum();

    Ok(KmeansFit {
        labels,
        centroids,
        inertia,
    })
}

/// k-means++ initialization: first centroid uniform, then each next one
/// drawn with probability proportional to the squared distance from the
/// nearest centroid chosen so far.
fn initialize_centroids(data: ArrayView2<'_, f64>, k: usize, seed: u64) -> Array2<f64> {
    let n = data.nrows();
    let d = data.ncols();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids = Array2::<f64>::zeros((k, d));

    let first = rng.random_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    // Squared distance from each row to its nearest chosen centroid
    let mut min_sq = vec![f64::INFINITY; n];
    for c in 1..k {
        let previous = centroids.row(c - 1);
        for i in 0..n {
            let dist = sq_dist(data.row(i), previous);
            if dist < min_sq[i] {
                min_sq[i] = dist;
            }
        }

        let total: f64 = min_sq.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = n - 1;
            for (i, &weight) in min_sq.iter().enumerate() {
                acc += weight;
                if acc >= target {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // All rows coincide with a centroid already
            rng.random_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(next));
    }

    centroids
}

fn nearest_centroid(point: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let dist = sq_dist(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    (best, best_dist)
}

fn sq_dist(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Two tight groups around (0, 0) and (10, 10)
    fn two_blobs() -> Array2<f64> {
        Array2::from_shape_vec(
            (6, 2),
            vec![
                0.0, 0.1, //
                0.1, 0.0, //
                0.0, 0.0, //
                10.0, 10.1, //
                10.1, 10.0, //
                10.0, 10.0, //
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let data = two_blobs();
        let fit = fit(data.view(), &KmeansParams::with_k(2, 42)).unwrap();

        assert_eq!(fit.labels.len(), 6);
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[1], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_eq!(fit.labels[4], fit.labels[5]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert!(fit.inertia < 0.1, "tight blobs should have tiny inertia");
    }

    #[test]
    fn test_kmeans_deterministic_for_seed() {
        let data = two_blobs();
        let a = fit(data.view(), &KmeansParams::with_k(2, 7)).unwrap();
        let b = fit(data.view(), &KmeansParams::with_k(2, 7)).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_kmeans_k_one_rejected() {
        let data = two_blobs();
        let result = fit(data.view(), &KmeansParams::with_k(1, 42));
        assert!(result.is_err(), "k=1 should error");
    }

    #[test]
    fn test_kmeans_k_larger_than_samples_rejected() {
        let data = two_blobs();
        let result = fit(data.view(), &KmeansParams::with_k(10, 42));
        assert!(matches!(result, Err(Error::Processing(_))));
    }

    #[test]
    fn test_labels_within_range() {
        let data = two_blobs();
        let fit = fit(data.view(), &KmeansParams::with_k(3, 42)).unwrap();
        assert!(fit.labels.iter().all(|&l| l < 3));
        assert_eq!(fit.centroids.nrows(), 3);
    }
}
