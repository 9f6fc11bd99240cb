//! Internal clustering quality metrics
//!
//! Silhouette and Calinski-Harabasz scores for a labeled partition. Both
//! return `None` for degenerate partitions instead of guessing a value;
//! callers decide how to fold that into reports.

use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Above this many samples the silhouette runs on a seeded subsample
const SILHOUETTE_SAMPLE_CAP: usize = 10_000;

/// Mean silhouette coefficient over all samples.
///
/// `None` when the partition is degenerate: fewer than 2 distinct labels,
/// or as many labels as samples. Samples in singleton clusters contribute 0.
/// The full computation is quadratic, so partitions larger than
/// [`SILHOUETTE_SAMPLE_CAP`] are scored on a seeded subsample.
pub fn silhouette_score(data: ArrayView2<'_, f64>, labels: &[u32], seed: u64) -> Option<f64> {
    let n = data.nrows();
    if n == 0 || labels.len() != n {
        return None;
    }

    if n > SILHOUETTE_SAMPLE_CAP {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let picked: Vec<usize> = rand::seq::index::sample(&mut rng, n, SILHOUETTE_SAMPLE_CAP).into_vec();
        let subset = data.select(Axis(0), &picked);
        let sub_labels: Vec<u32> = picked.iter().map(|&i| labels[i]).collect();
        return silhouette_full(subset.view(), &sub_labels);
    }

    silhouette_full(data, labels)
}

fn silhouette_full(data: ArrayView2<'_, f64>, labels: &[u32]) -> Option<f64> {
    let n = data.nrows();
    let groups = group_by_label(labels);
    if groups.len() < 2 || groups.len() > n - 1 {
        return None;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        let own_members = &groups[&own];
        if own_members.len() <= 1 {
            continue; // Singleton cluster: s = 0
        }

        // Mean distance to own cluster (excluding self)
        let a = own_members
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| euclid(data.row(i), data.row(j)))
            .sum::<f64>()
            / (own_members.len() - 1) as f64;

        // Smallest mean distance to any other cluster
        let mut b = f64::INFINITY;
        for (other, members) in &groups {
            if *other == own {
                continue;
            }
            let mean = members
                .iter()
                .map(|&j| euclid(data.row(i), data.row(j)))
                .sum::<f64>()
                / members.len() as f64;
            if mean < b {
                b = mean;
            }
        }

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Some(total / n as f64)
}

/// Calinski-Harabasz index: between-cluster dispersion over within-cluster
/// dispersion, scaled by their degrees of freedom.
///
/// `None` when there are fewer than 2 distinct labels or as many labels as
/// samples. When every cluster is internally identical (zero within-cluster
/// dispersion) the score is 1.0.
pub fn calinski_harabasz(data: ArrayView2<'_, f64>, labels: &[u32]) -> Option<f64> {
    let n = data.nrows();
    if n == 0 || labels.len() != n {
        return None;
    }
    let groups = group_by_label(labels);
    let k = groups.len();
    if k < 2 || k >= n {
        return None;
    }

    let d = data.ncols();
    let mut overall = vec![0.0; d];
    for i in 0..n {
        for j in 0..d {
            overall[j] += data[(i, j)];
        }
    }
    for value in overall.iter_mut() {
        *value /= n as f64;
    }

    let mut between = 0.0;
    let mut within = 0.0;
    for members in groups.values() {
        let m = members.len() as f64;
        let mut center = vec![0.0; d];
        for &i in members {
            for j in 0..d {
                center[j] += data[(i, j)];
            }
        }
        for value in center.iter_mut() {
            *value /= m;
        }

        between += m * center
            .iter()
            .zip(&overall)
            .map(|(c, o)| (c - o).powi(2))
            .sum::<f64>();
        for &i in members {
            within += (0..d).map(|j| (data[(i, j)] - center[j]).powi(2)).sum::<f64>();
        }
    }

    if within <= f64::EPSILON {
        return Some(1.0);
    }
    Some((between / (k as f64 - 1.0)) / (within / (n as f64 - k as f64)))
}

fn group_by_label(labels: &[u32]) -> BTreeMap<u32, Vec<usize>> {
    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    groups
}

fn euclid(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
