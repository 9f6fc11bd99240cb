//! Per-zone statistics
//!
//! Geometric measures from the zone polygons and spectral summaries from
//! the index layers.

use crate::layers::IndexStack;
use crate::zones::FilteredZones;
use serde::Serialize;
use tracing::debug;

/// Geometric and spectral summary of one zone
#[derive(Debug, Clone, Serialize)]
pub struct ZoneStats {
    pub zone_id: u32,
    pub area_ha: f64,
    pub perimeter_m: f64,
    /// Shape compactness `4*pi*area / perimeter^2`: 1 for a circle,
    /// lower for ragged shapes, 0 when the perimeter is 0
    pub compactness: f64,
    /// Mean per index layer, in stack order; NaN when the zone has no
    /// finite pixels for that index
    pub index_means: Vec<f64>,
    /// Population standard deviation per index layer, in stack order
    pub index_stds: Vec<f64>,
}

/// Compute statistics for every zone, ordered as the zones are.
///
/// Geometry comes from the dissolved polygons; spectral values come from
/// the raw index layers (not the standardized features), masked to each
/// zone's pixels.
pub fn compute_zone_statistics(filtered: &FilteredZones, stack: &IndexStack) -> Vec<ZoneStats> {
    let mut stats = Vec::with_capacity(filtered.zones.len());

    for zone in &filtered.zones {
        let compactness = if zone.perimeter_m > 0.0 {
            4.0 * std::f64::consts::PI * zone.area_m2 / (zone.perimeter_m * zone.perimeter_m)
        } else {
            0.0
        };

        let pixels = filtered.labels.pixels_of(zone.id);
        let mut index_means = Vec::with_capacity(stack.len());
        let mut index_stds = Vec::with_capacity(stack.len());
        for (_, layer) in stack.iter() {
            let grid = layer.data();
            let values: Vec<f64> = pixels
                .iter()
                .map(|&(row, col)| grid[(row, col)])
                .filter(|v| v.is_finite())
                .collect();
            let (mean, std) = mean_std(&values);
            index_means.push(mean);
            index_stds.push(std);
        }

        debug!(
            "zone {}: {:.4} ha, perimeter {:.1} m, compactness {:.3}",
            zone.id,
            zone.area_ha(),
            zone.perimeter_m,
            compactness
        );

        stats.push(ZoneStats {
            zone_id: zone.id,
            area_ha: zone.area_ha(),
            perimeter_m: zone.perimeter_m,
            compactness,
            index_means,
            index_stds,
        });
    }

    stats
}

/// Population mean and standard deviation; NaN for an empty slice
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::LabelGrid;
    use crate::zones::polygonize;
    use agrozone_core::{GeoTransform, Raster};
    use approx::assert_relative_eq;
    use geo_types::MultiPolygon;

    #[test]
    fn test_square_zone_compactness() {
        // A 2x2 m square: area 4, perimeter 8, compactness pi/4
        let mut grid = LabelGrid::unlabeled(4, 4);
        grid.set(0, 0, Some(0));
        grid.set(0, 1, Some(0));
        grid.set(1, 0, Some(0));
        grid.set(1, 1, Some(0));
        let transform = GeoTransform::from_bounds(0.0, 0.0, 4.0, 4.0, 4, 4);
        let zones = polygonize(&grid, &transform).unwrap();
        let filtered = FilteredZones {
            zones,
            labels: grid,
        };

        let mut layer = Raster::filled(4, 4, 0.5);
        layer.set_transform(transform);
        let mut stack = IndexStack::new();
        stack.insert("ndvi", layer).unwrap();

        let stats = compute_zone_statistics(&filtered, &stack);
        assert_eq!(stats.len(), 1);
        assert_relative_eq!(
            stats[0].compactness,
            std::f64::consts::PI / 4.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(stats[0].area_ha, 4.0 / 10_000.0, epsilon = 1e-12);
        assert_relative_eq!(stats[0].index_means[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(stats[0].index_stds[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_perimeter_zone_gets_zero_compactness() {
        use crate::zones::Zone;
        let filtered = FilteredZones {
            zones: vec![Zone {
                id: 0,
                geometry: MultiPolygon::new(vec![]),
                area_m2: 0.0,
                perimeter_m: 0.0,
            }],
            labels: LabelGrid::unlabeled(2, 2),
        };
        let mut layer = Raster::filled(2, 2, 1.0);
        layer.set_transform(GeoTransform::from_bounds(0.0, 0.0, 2.0, 2.0, 2, 2));
        let mut stack = IndexStack::new();
        stack.insert("ndvi", layer).unwrap();

        let stats = compute_zone_statistics(&filtered, &stack);
        assert_eq!(stats[0].compactness, 0.0);
        // No pixels carry this zone's label, so the spectral summary is NaN
        assert!(stats[0].index_means[0].is_nan());
        assert!(stats[0].index_stds[0].is_nan());
    }

    #[test]
    fn test_mean_std_known_values() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(mean, 5.0);
        assert_relative_eq!(std, 2.0);
    }

    #[test]
    fn test_spectral_summary_ignores_nan() {
        let mut grid = LabelGrid::unlabeled(1, 3);
        for c in 0..3 {
            grid.set(0, c, Some(0));
        }
        let transform = GeoTransform::from_bounds(0.0, 0.0, 3.0, 1.0, 3, 1);
        let zones = polygonize(&grid, &transform).unwrap();
        let filtered = FilteredZones {
            zones,
            labels: grid,
        };

        let mut layer = Raster::from_vec(vec![1.0, f64::NAN, 3.0], 1, 3).unwrap();
        layer.set_transform(transform);
        let mut stack = IndexStack::new();
        stack.insert("ndvi", layer).unwrap();

        let stats = compute_zone_statistics(&filtered, &stack);
        assert_relative_eq!(stats[0].index_means[0], 2.0);
        assert_relative_eq!(stats[0].index_stds[0], 1.0);
    }
}
