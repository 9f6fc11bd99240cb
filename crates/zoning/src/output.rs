//! Result persistence
//!
//! Writes the result bundle under a run directory with fixed file names,
//! so downstream tooling can always find the same four files.

use crate::error::Result;
use crate::pipeline::ZoningResult;
use agrozone_core::{AttributeValue, Feature, FeatureCollection, CRS};
use geo_types::Geometry;
use std::fs;
use std::path::Path;
use tracing::info;

pub const ZONES_FILE: &str = "zones.geojson";
pub const SAMPLES_FILE: &str = "samples.geojson";
pub const STATISTICS_FILE: &str = "zone_statistics.csv";
pub const METRICS_FILE: &str = "metrics.json";

/// Write the full result bundle into `dir`, creating it if needed.
pub fn write_results(result: &ZoningResult, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    write_zones(result, &dir.join(ZONES_FILE))?;
    write_samples(result, &dir.join(SAMPLES_FILE))?;
    write_statistics(result, &dir.join(STATISTICS_FILE))?;
    write_metrics(result, &dir.join(METRICS_FILE))?;

    info!("results written to {}", dir.display());
    Ok(())
}

fn write_zones(result: &ZoningResult, path: &Path) -> Result<()> {
    let mut collection = FeatureCollection::new();
    for zone in &result.zones {
        let mut feature = Feature::new(Geometry::MultiPolygon(zone.geometry.clone()));
        feature.set_property("zone_id", AttributeValue::Int(i64::from(zone.id)));
        feature.set_property("area_ha", AttributeValue::Float(zone.area_ha()));
        feature.set_property("perimeter_m", AttributeValue::Float(zone.perimeter_m));
        collection.push(feature);
    }
    write_geojson(&collection, &result.crs, path)
}

fn write_samples(result: &ZoningResult, path: &Path) -> Result<()> {
    let mut collection = FeatureCollection::new();
    for sample in &result.samples {
        let mut feature = Feature::new(Geometry::Point(sample.point));
        feature.set_property("zone_id", AttributeValue::Int(i64::from(sample.zone_id)));
        for (name, value) in result.index_names.iter().zip(&sample.values) {
            feature.set_property(name.clone(), AttributeValue::Float(*value));
        }
        collection.push(feature);
    }
    write_geojson(&collection, &result.crs, path)
}

fn write_geojson(collection: &FeatureCollection, crs: &CRS, path: &Path) -> Result<()> {
    let mut value = collection.to_geojson()?;
    // RFC 7946 dropped the crs member; keep it as a foreign member so
    // downstream tooling knows the projection
    if let serde_json::Value::Object(map) = &mut value {
        map.insert(
            "crs".to_string(),
            serde_json::json!({
                "type": "name",
                "properties": { "name": crs.identifier() }
            }),
        );
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &value)?;
    Ok(())
}

fn write_statistics(result: &ZoningResult, path: &Path) -> Result<()> {
    let mut out = String::new();
    out.push_str("zone_id,area_ha,perimeter_m,compactness");
    for name in &result.index_names {
        out.push_str(&format!(",{name}_mean,{name}_std"));
    }
    out.push('\n');

    for stats in &result.statistics {
        out.push_str(&format!(
            "{},{:.4},{:.2},{:.4}",
            stats.zone_id, stats.area_ha, stats.perimeter_m, stats.compactness
        ));
        for (mean, std) in stats.index_means.iter().zip(&stats.index_stds) {
            out.push_str(&format!(",{mean:.6},{std:.6}"));
        }
        out.push('\n');
    }

    fs::write(path, out)?;
    Ok(())
}

fn write_metrics(result: &ZoningResult, path: &Path) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &result.metrics)?;
    Ok(())
}
