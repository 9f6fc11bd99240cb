//! Sampling point placement
//!
//! Places soil-sampling locations at pixel centers inside each zone using
//! greedy farthest-point selection, so points spread across the zone
//! instead of bunching up.

use crate::error::{Error, Result};
use crate::layers::IndexStack;
use crate::zones::FilteredZones;
use geo_types::Point;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

/// A recommended sampling location inside one zone
#[derive(Debug, Clone)]
pub struct SamplePoint {
    pub zone_id: u32,
    /// Pixel-center world coordinates
    pub point: Point<f64>,
    /// One value per index layer, in stack order
    pub values: Vec<f64>,
}

/// Number of samples targeted for a zone of `pixel_count` pixels: at least
/// `min_points`, growing with the square root of the zone size.
pub fn target_sample_count(min_points: usize, pixel_count: usize) -> usize {
    min_points.max((pixel_count as f64).sqrt().floor() as usize)
}

/// Generate sampling points for every zone, in zone id order.
///
/// Deterministic for a fixed seed: each zone seeds its own ChaCha stream
/// with `seed` plus the zone id, draws the first pixel uniformly, then
/// repeatedly adds the pixel farthest (max-min world distance) from the
/// points already chosen, ties to the lowest row-major index. Zones smaller
/// than their target count contribute every pixel.
pub fn generate_sample_points(
    filtered: &FilteredZones,
    stack: &IndexStack,
    min_points: usize,
    seed: u64,
) -> Result<Vec<SamplePoint>> {
    let transform = stack
        .transform()
        .ok_or_else(|| Error::Processing("no indices initialized: the index stack is empty".to_string()))?;

    let mut samples = Vec::new();
    for zone in &filtered.zones {
        let pixels = filtered.labels.pixels_of(zone.id);
        if pixels.is_empty() {
            warn!("zone {} has no labeled pixels, skipping sampling", zone.id);
            continue;
        }

        let centers: Vec<(f64, f64)> = pixels
            .iter()
            .map(|&(row, col)| transform.pixel_to_geo(col, row))
            .collect();
        let target = target_sample_count(min_points, pixels.len());

        let selected: Vec<usize> = if target >= pixels.len() {
            (0..pixels.len()).collect()
        } else {
            farthest_point_selection(&centers, target, seed.wrapping_add(u64::from(zone.id)))
        };

        debug!(
            "zone {}: {} of {} pixels selected",
            zone.id,
            selected.len(),
            pixels.len()
        );

        for idx in selected {
            let (row, col) = pixels[idx];
            let (x, y) = centers[idx];
            samples.push(SamplePoint {
                zone_id: zone.id,
                point: Point::new(x, y),
                values: stack.values_at(row, col),
            });
        }
    }

    if samples.is_empty() {
        return Err(Error::Processing(
            "no sampling points could be generated: no zone has labeled pixels".to_string(),
        ));
    }

    info!(
        "generated {} sampling points across {} zones",
        samples.len(),
        filtered.zones.len()
    );
    Ok(samples)
}

/// Greedy max-min dispersion: seed with a random point, then repeatedly add
/// the point whose minimum distance to the selection is largest.
///
/// A deterministic heuristic, not an optimal max-min solution.
fn farthest_point_selection(centers: &[(f64, f64)], n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let first = rng.random_range(0..centers.len());

    let mut selected = Vec::with_capacity(n);
    let mut chosen = vec![false; centers.len()];
    selected.push(first);
    chosen[first] = true;

    // Squared distances order the same as distances
    let mut min_sq: Vec<f64> = centers
        .iter()
        .map(|&c| sq_dist(c, centers[first]))
        .collect();

    while selected.len() < n {
        let mut best: Option<usize> = None;
        let mut best_dist = f64::NEG_INFINITY;
        for (i, &dist) in min_sq.iter().enumerate() {
            if chosen[i] {
                continue;
            }
            if dist > best_dist {
                best_dist = dist;
                best = Some(i);
            }
        }
        let Some(next) = best else { break };
        selected.push(next);
        chosen[next] = true;
        for (i, &center) in centers.iter().enumerate() {
            let dist = sq_dist(center, centers[next]);
            if dist < min_sq[i] {
                min_sq[i] = dist;
            }
        }
    }

    selected
}

fn sq_dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}
