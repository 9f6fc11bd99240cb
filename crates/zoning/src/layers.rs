//! Named spectral-index layer stack

use crate::error::{Error, Result};
use agrozone_core::{GeoTransform, Raster, CRS};
use indexmap::IndexMap;

/// Insertion-ordered collection of named index layers.
///
/// All layers share one grid shape and georeferencing. The insertion order
/// is load-bearing: it fixes the feature-matrix column order, and with it
/// the statistics columns and sample attribute order for the whole run.
#[derive(Debug, Clone, Default)]
pub struct IndexStack {
    layers: IndexMap<String, Raster<f64>>,
}

impl IndexStack {
    pub fn new() -> Self {
        Self {
            layers: IndexMap::new(),
        }
    }

    /// Add a named layer.
    ///
    /// The first layer fixes the stack's shape, geotransform and CRS; later
    /// layers must match it. Duplicate names are rejected.
    pub fn insert(&mut self, name: impl Into<String>, layer: Raster<f64>) -> Result<()> {
        let name = name.into();
        if self.layers.contains_key(&name) {
            return Err(Error::Validation(format!("duplicate index layer '{name}'")));
        }
        if let Some((_, first)) = self.layers.first() {
            if layer.shape() != first.shape() {
                return Err(Error::Validation(format!(
                    "index layer '{}' has shape {:?}, expected {:?}",
                    name,
                    layer.shape(),
                    first.shape()
                )));
            }
            if layer.transform() != first.transform() {
                return Err(Error::Validation(format!(
                    "index layer '{name}' does not share the stack's geotransform"
                )));
            }
            if let (Some(a), Some(b)) = (layer.crs(), first.crs()) {
                if !a.is_equivalent(b) {
                    return Err(Error::Validation(format!(
                        "index layer '{name}' has CRS {a}, expected {b}"
                    )));
                }
            }
        }
        self.layers.insert(name, layer);
        Ok(())
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Raster<f64>> {
        self.layers.get(name)
    }

    /// Iterate (name, layer) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Raster<f64>)> {
        self.layers.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    /// Grid shape shared by all layers; `None` for an empty stack
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.layers.first().map(|(_, layer)| layer.shape())
    }

    /// Geotransform shared by all layers; `None` for an empty stack
    pub fn transform(&self) -> Option<&GeoTransform> {
        self.layers.first().map(|(_, layer)| layer.transform())
    }

    /// CRS of the stack, if the first layer declares one
    pub fn crs(&self) -> Option<&CRS> {
        self.layers.first().and_then(|(_, layer)| layer.crs())
    }

    /// One value per layer at (row, col), in insertion order
    pub fn values_at(&self, row: usize, col: usize) -> Vec<f64> {
        self.layers
            .values()
            .map(|layer| layer.get(row, col).unwrap_or(f64::NAN))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_layer(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut stack = IndexStack::new();
        stack.insert("ndvi", make_layer(2, 2, 0.5)).unwrap();
        stack.insert("ndwi", make_layer(2, 2, -0.1)).unwrap();
        stack.insert("ndre", make_layer(2, 2, 0.3)).unwrap();

        let names: Vec<&str> = stack.names().collect();
        assert_eq!(names, vec!["ndvi", "ndwi", "ndre"]);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut stack = IndexStack::new();
        stack.insert("ndvi", make_layer(2, 2, 0.5)).unwrap();
        let result = stack.insert("ndwi", make_layer(3, 2, 0.1));
        assert!(result.is_err());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_transform_mismatch_rejected() {
        let mut stack = IndexStack::new();
        stack.insert("ndvi", make_layer(2, 2, 0.5)).unwrap();

        let mut other = Raster::filled(2, 2, 0.1);
        other.set_transform(GeoTransform::new(100.0, 2.0, 1.0, -1.0));
        assert!(stack.insert("ndwi", other).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut stack = IndexStack::new();
        stack.insert("ndvi", make_layer(2, 2, 0.5)).unwrap();
        assert!(stack.insert("ndvi", make_layer(2, 2, 0.7)).is_err());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_values_at_follows_insertion_order() {
        let mut stack = IndexStack::new();
        stack.insert("a", make_layer(2, 2, 1.0)).unwrap();
        stack.insert("b", make_layer(2, 2, 2.0)).unwrap();
        assert_eq!(stack.values_at(0, 0), vec![1.0, 2.0]);
    }
}
