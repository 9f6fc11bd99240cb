//! Validity mask construction
//!
//! Combines the field boundary with per-pixel data availability to decide
//! which pixels take part in clustering.

use crate::error::{Error, Result};
use crate::layers::IndexStack;
use agrozone_core::GeoTransform;
use geo::Intersects;
use geo_types::{Point, Polygon};
use ndarray::Array2;
use tracing::{debug, info, warn};

/// Boolean grid marking the pixels eligible for clustering.
///
/// A pixel is valid when its center lies inside the field boundary (the
/// boundary itself counts as inside) and every index layer holds a finite
/// value there.
#[derive(Debug, Clone)]
pub struct ValidityMask {
    mask: Array2<bool>,
    valid_count: usize,
}

impl ValidityMask {
    pub fn rows(&self) -> usize {
        self.mask.nrows()
    }

    pub fn cols(&self) -> usize {
        self.mask.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mask.dim()
    }

    /// Number of valid pixels
    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.mask.get((row, col)).copied().unwrap_or(false)
    }

    /// Coordinates of valid pixels in row-major order
    pub fn iter_valid(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mask
            .indexed_iter()
            .filter_map(|(idx, valid)| valid.then_some(idx))
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.mask
    }
}

/// Rasterize a polygon onto the stack's grid.
///
/// A cell is inside when its center intersects the polygon, so cells whose
/// center falls exactly on the boundary are kept.
pub fn rasterize_boundary(
    boundary: &Polygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> Array2<bool> {
    Array2::from_shape_fn((rows, cols), |(row, col)| {
        let (x, y) = transform.pixel_to_geo(col, row);
        boundary.intersects(&Point::new(x, y))
    })
}

/// Build the validity mask for a stack and field boundary.
///
/// Fails when the stack is empty, the boundary is degenerate, or not a
/// single pixel survives the combined test. Pixels inside the boundary that
/// are dropped for missing data are reported as a warning.
pub fn build_validity_mask(stack: &IndexStack, boundary: &Polygon<f64>) -> Result<ValidityMask> {
    let (rows, cols) = stack
        .shape()
        .ok_or_else(|| Error::Processing("no indices initialized: the index stack is empty".to_string()))?;
    let transform = stack
        .transform()
        .ok_or_else(|| Error::Processing("no indices initialized: the index stack is empty".to_string()))?;

    // A closed ring needs at least 4 coordinates
    if boundary.exterior().0.len() < 4 {
        return Err(Error::Processing(
            "field boundary has no valid geometric representation".to_string(),
        ));
    }

    let inside = rasterize_boundary(boundary, transform, rows, cols);
    let inside_count = inside.iter().filter(|v| **v).count();

    let mut finite = Array2::from_elem((rows, cols), true);
    for (_, layer) in stack.iter() {
        finite.zip_mut_with(layer.data(), |flag, value| {
            *flag = *flag && value.is_finite();
        });
    }
    let finite_count = finite.iter().filter(|v| **v).count();

    let mut valid_count = 0usize;
    let mask = Array2::from_shape_fn((rows, cols), |idx| {
        let valid = inside[idx] && finite[idx];
        if valid {
            valid_count += 1;
        }
        valid
    });

    debug!(
        "mask components: {} inside boundary, {} with complete data, {} valid",
        inside_count, finite_count, valid_count
    );

    if valid_count == 0 {
        return Err(Error::Processing(
            "no valid pixels inside the field boundary; check that the boundary overlaps the imagery".to_string(),
        ));
    }
    if valid_count < inside_count {
        warn!(
            "{} pixels inside the boundary discarded for missing index values",
            inside_count - valid_count
        );
    }
    info!("validity mask: {} of {} pixels valid", valid_count, rows * cols);

    Ok(ValidityMask { mask, valid_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrozone_core::Raster;
    use geo_types::{Coord, LineString};

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
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

    fn make_stack(rows: usize, cols: usize, value: f64) -> IndexStack {
        let mut layer = Raster::filled(rows, cols, value);
        layer.set_transform(GeoTransform::from_bounds(
            0.0, 0.0, cols as f64, rows as f64, cols, rows,
        ));
        let mut stack = IndexStack::new();
        stack.insert("ndvi", layer).unwrap();
        stack
    }

    #[test]
    fn test_full_coverage() {
        let stack = make_stack(2, 2, 0.5);
        let mask = build_validity_mask(&stack, &square(0.0, 0.0, 2.0, 2.0)).unwrap();
        assert_eq!(mask.valid_count(), 4);
        assert!(mask.is_valid(0, 0));
        assert!(mask.is_valid(1, 1));
    }

    #[test]
    fn test_half_coverage() {
        // Boundary covers only the left column of a 2x2 grid
        let stack = make_stack(2, 2, 0.5);
        let mask = build_validity_mask(&stack, &square(0.0, 0.0, 1.0, 2.0)).unwrap();
        assert_eq!(mask.valid_count(), 2);
        assert!(mask.is_valid(0, 0));
        assert!(mask.is_valid(1, 0));
        assert!(!mask.is_valid(0, 1));
    }

    #[test]
    fn test_nan_pixels_excluded() {
        let mut layer = Raster::filled(2, 2, 0.5);
        layer.set_transform(GeoTransform::from_bounds(0.0, 0.0, 2.0, 2.0, 2, 2));
        layer.set(0, 0, f64::NAN).unwrap();
        let mut stack = IndexStack::new();
        stack.insert("ndvi", layer).unwrap();

        let mask = build_validity_mask(&stack, &square(0.0, 0.0, 2.0, 2.0)).unwrap();
        assert_eq!(mask.valid_count(), 3);
        assert!(!mask.is_valid(0, 0));
    }

    #[test]
    fn test_empty_stack_fails() {
        let stack = IndexStack::new();
        let err = build_validity_mask(&stack, &square(0.0, 0.0, 2.0, 2.0)).unwrap_err();
        assert!(err.to_string().contains("no indices initialized"));
    }

    #[test]
    fn test_disjoint_boundary_fails() {
        let stack = make_stack(2, 2, 0.5);
        let result = build_validity_mask(&stack, &square(100.0, 100.0, 101.0, 101.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_degenerate_boundary_fails() {
        let stack = make_stack(2, 2, 0.5);
        let empty = Polygon::new(LineString::new(vec![]), vec![]);
        assert!(build_validity_mask(&stack, &empty).is_err());
    }

    #[test]
    fn test_iter_valid_row_major() {
        let stack = make_stack(2, 2, 0.5);
        let mask = build_validity_mask(&stack, &square(0.0, 0.0, 2.0, 2.0)).unwrap();
        let coords: Vec<(usize, usize)> = mask.iter_valid().collect();
        assert_eq!(coords, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }
}
