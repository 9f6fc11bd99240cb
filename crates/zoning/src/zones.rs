//! Zone polygon reconstruction and area filtering
//!
//! Turns the label grid into dissolved world-space polygons, one multi-part
//! geometry per cluster, then drops zones below the minimum area and
//! renumbers the survivors.

use crate::error::{Error, Result};
use crate::grid::LabelGrid;
use agrozone_core::GeoTransform;
use geo::{Area, BooleanOps, Euclidean, Length};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// A management zone: dissolved footprint plus derived measures
#[derive(Debug, Clone)]
pub struct Zone {
    /// Zone id; contiguous from 0 after filtering
    pub id: u32,
    /// Dissolved footprint; may have multiple parts and holes
    pub geometry: MultiPolygon<f64>,
    /// Area in square CRS units (square meters for projected fields)
    pub area_m2: f64,
    /// Total ring length, interior rings included
    pub perimeter_m: f64,
}

impl Zone {
    pub fn area_ha(&self) -> f64 {
        self.area_m2 / SQUARE_METERS_PER_HECTARE
    }
}

/// Zones surviving the area filter, with the label grid rewritten to their
/// new ids.
#[derive(Debug, Clone)]
pub struct FilteredZones {
    pub zones: Vec<Zone>,
    pub labels: LabelGrid,
}

/// Convert a label grid into one dissolved multi-polygon per cluster label,
/// ordered by label.
///
/// Requires a north-up transform; pixel footprints of a rotated grid would
/// not be axis-aligned rectangles.
pub fn polygonize(labels: &LabelGrid, transform: &GeoTransform) -> Result<Vec<Zone>> {
    if !transform.is_north_up() {
        return Err(Error::Validation(
            "rotated grids are not supported for zone extraction".to_string(),
        ));
    }

    let mut rects: BTreeMap<u32, Vec<Polygon<f64>>> = BTreeMap::new();
    for ((row, col), label) in labels.iter() {
        if let Some(label) = label {
            rects
                .entry(label)
                .or_default()
                .push(pixel_rect(transform, col, row));
        }
    }

    if rects.is_empty() {
        return Err(Error::Processing(
            "no labeled pixels: cannot build zone polygons".to_string(),
        ));
    }

    let mut zones = Vec::with_capacity(rects.len());
    for (label, group) in rects {
        let pixel_count = group.len();
        let geometry = dissolve(group);
        let area_m2 = geometry.unsigned_area();
        let perimeter_m = multipolygon_perimeter(&geometry);
        debug!(
            "label {}: {} pixels -> {} polygon part(s), {:.1} m2",
            label,
            pixel_count,
            geometry.0.len(),
            area_m2
        );
        zones.push(Zone {
            id: label,
            geometry,
            area_m2,
            perimeter_m,
        });
    }

    info!("polygonized {} zones", zones.len());
    Ok(zones)
}

/// Drop zones below `min_area_ha` and renumber the survivors from 0 in
/// their existing order.
///
/// The label grid is rewritten through the new ids; pixels of removed zones
/// become unlabeled and are counted in a warning. An empty result is not an
/// error here, callers decide whether downstream stages can proceed.
pub fn filter_zones(zones: Vec<Zone>, labels: &LabelGrid, min_area_ha: f64) -> FilteredZones {
    let before = zones.len();

    let mut mapping = BTreeMap::new();
    let mut kept = Vec::new();
    for zone in zones {
        if zone.area_ha() >= min_area_ha {
            let new_id = kept.len() as u32;
            mapping.insert(zone.id, new_id);
            kept.push(Zone { id: new_id, ..zone });
        } else {
            debug!(
                "zone {} dropped: {:.4} ha below threshold {:.4} ha",
                zone.id,
                zone.area_ha(),
                min_area_ha
            );
        }
    }

    let (relabeled, orphaned) = labels.relabel(&mapping);
    if orphaned > 0 {
        warn!(
            "{} pixels belong to filtered-out zones and are no longer assigned",
            orphaned
        );
    }
    info!(
        "zone filter: {} -> {} zones (min area {} ha)",
        before,
        kept.len(),
        min_area_ha
    );

    FilteredZones {
        zones: kept,
        labels: relabeled,
    }
}

/// World-space rectangular footprint of one pixel
fn pixel_rect(transform: &GeoTransform, col: usize, row: usize) -> Polygon<f64> {
    let (x0, y0) = transform.pixel_to_geo_corner(col, row);
    let (x1, y1) = transform.pixel_to_geo_corner(col + 1, row + 1);
    let (min_x, max_x) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
    let (min_y, max_y) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
    Polygon::new(
        LineString::from(vec![
            Coord { x: min_x, y: min_y },
            Coord { x: max_x, y: min_y },
            Coord { x: max_x, y: max_y },
            Coord { x: min_x, y: max_y },
            Coord { x: min_x, y: min_y },
        ]),
        vec![],
    )
}

/// Union a group of pixel rectangles into one multi-polygon.
///
/// Balanced pairwise merging keeps the intermediate geometries small
/// compared to folding rectangles in one at a time.
fn dissolve(group: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut parts: Vec<MultiPolygon<f64>> = group
        .into_iter()
        .map(|p| MultiPolygon::new(vec![p]))
        .collect();

    while parts.len() > 1 {
        let mut merged = Vec::with_capacity(parts.len() / 2 + 1);
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => merged.push(a.union(&b)),
                None => merged.push(a),
            }
        }
        parts = merged;
    }

    parts
        .into_iter()
        .next()
        .unwrap_or_else(|| MultiPolygon::new(vec![]))
}

fn multipolygon_perimeter(mp: &MultiPolygon<f64>) -> f64 {
    mp.0.iter().map(polygon_perimeter).sum()
}

fn polygon_perimeter(p: &Polygon<f64>) -> f64 {
    let ext = Euclidean.length(p.exterior());
    let int: f64 = p.interiors().iter().map(|r| Euclidean.length(r)).sum();
    ext + int
}
