//! Vector features with attributes and GeoJSON serialization

use crate::error::{Error, Result};
use geo_types::{Geometry, LineString, Polygon};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Convert to a JSON value. Non-finite floats become `null` since JSON
    /// has no representation for them.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => json!(b),
            AttributeValue::Int(i) => json!(i),
            AttributeValue::Float(f) => {
                if f.is_finite() {
                    json!(f)
                } else {
                    Value::Null
                }
            }
            AttributeValue::String(s) => json!(s),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Serialize as a GeoJSON Feature object
    pub fn to_geojson(&self) -> Result<Value> {
        let geometry = match &self.geometry {
            Some(g) => geometry_to_geojson(g)?,
            None => Value::Null,
        };
        let properties: serde_json::Map<String, Value> = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        Ok(json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": properties,
        }))
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Serialize as a GeoJSON FeatureCollection object
    pub fn to_geojson(&self) -> Result<Value> {
        let features: Result<Vec<Value>> = self.features.iter().map(|f| f.to_geojson()).collect();
        Ok(json!({
            "type": "FeatureCollection",
            "features": features?,
        }))
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Serialize a geometry as a GeoJSON geometry object.
///
/// Supports the geometry types the zoning outputs use: points, polygons and
/// multi-polygons.
pub fn geometry_to_geojson(geom: &Geometry<f64>) -> Result<Value> {
    match geom {
        Geometry::Point(p) => Ok(json!({
            "type": "Point",
            "coordinates": [p.x(), p.y()],
        })),
        Geometry::Polygon(p) => Ok(json!({
            "type": "Polygon",
            "coordinates": polygon_rings(p),
        })),
        Geometry::MultiPolygon(mp) => {
            let polys: Vec<Value> = mp.0.iter().map(|p| json!(polygon_rings(p))).collect();
            Ok(json!({
                "type": "MultiPolygon",
                "coordinates": polys,
            }))
        }
        other => Err(Error::UnsupportedDataType(format!(
            "geometry type not supported for GeoJSON output: {}",
            geometry_name(other)
        ))),
    }
}

fn geometry_name(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn ring_coords(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    let mut coords: Vec<[f64; 2]> = ring.0.iter().map(|c| [c.x, c.y]).collect();
    // GeoJSON rings must be closed
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last()) {
        if first != *last {
            coords.push(first);
        }
    }
    coords
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    let mut rings = vec![ring_coords(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring_coords));
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, polygon};

    #[test]
    fn test_point_feature_geojson() {
        let mut f = Feature::new(Geometry::Point(point! { x: 10.0, y: 20.0 }));
        f.set_property("zone_id", AttributeValue::Int(3));
        assert_eq!(f.get_property("zone_id"), Some(&AttributeValue::Int(3)));

        let v = f.to_geojson().unwrap();
        assert_eq!(v["type"], "Feature");
        assert_eq!(v["geometry"]["type"], "Point");
        assert_eq!(v["geometry"]["coordinates"][0], 10.0);
        assert_eq!(v["properties"]["zone_id"], 3);
    }

    #[test]
    fn test_polygon_rings_closed() {
        let p = polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 4.0),
        ];
        let v = geometry_to_geojson(&Geometry::Polygon(p)).unwrap();
        let ring = v["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_nan_property_is_null() {
        let av = AttributeValue::Float(f64::NAN);
        assert_eq!(av.to_json(), Value::Null);
    }

    #[test]
    fn test_collection_geojson() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(Geometry::Point(point! { x: 1.0, y: 2.0 })));
        fc.push(Feature::new(Geometry::Point(point! { x: 3.0, y: 4.0 })));

        let v = fc.to_geojson().unwrap();
        assert_eq!(v["type"], "FeatureCollection");
        assert_eq!(v["features"].as_array().unwrap().len(), 2);
    }
}
