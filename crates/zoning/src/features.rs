//! Feature matrix construction
//!
//! Extracts valid pixels from the index stack into a (pixel x index)
//! matrix, fills gaps, and standardizes each column for clustering.

use crate::error::{Error, Result};
use crate::layers::IndexStack;
use crate::mask::ValidityMask;
use ndarray::{Array2, ArrayView2};
use tracing::debug;

/// Standardized feature matrix backing model fitting.
///
/// Rows follow the row-major enumeration of valid pixels; columns follow
/// the stack's insertion order. Values are imputed (column median) and then
/// standardized (zero mean, unit variance) from this matrix's own
/// statistics, never from an earlier run.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    data: Array2<f64>,
    coords: Vec<(usize, usize)>,
    names: Vec<String>,
}

impl FeatureMatrix {
    /// Number of pixels (matrix rows)
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of index layers (matrix columns)
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Grid coordinates of each matrix row, in row order
    pub fn coords(&self) -> &[(usize, usize)] {
        &self.coords
    }

    /// Column names, in column order
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Build the feature matrix for the masked pixels of a stack.
pub fn build_feature_matrix(stack: &IndexStack, mask: &ValidityMask) -> Result<FeatureMatrix> {
    let (rows, cols) = stack
        .shape()
        .ok_or_else(|| Error::Processing("no indices initialized: the index stack is empty".to_string()))?;
    if (rows, cols) != mask.shape() {
        return Err(Error::Validation(format!(
            "validity mask shape {:?} does not match index layers {:?}",
            mask.shape(),
            (rows, cols)
        )));
    }

    let coords: Vec<(usize, usize)> = mask.iter_valid().collect();
    let n = coords.len();
    let d = stack.len();

    let mut data = Array2::<f64>::zeros((n, d));
    for (j, (_, layer)) in stack.iter().enumerate() {
        let grid = layer.data();
        for (i, &(row, col)) in coords.iter().enumerate() {
            data[(i, j)] = grid[(row, col)];
        }
    }

    impute_columns(&mut data);
    standardize_columns(&mut data);

    debug!("feature matrix: {} pixels x {} indices", n, d);

    Ok(FeatureMatrix {
        data,
        coords,
        names: stack.names().map(str::to_string).collect(),
    })
}

/// Replace non-finite entries with their column median; a column with no
/// finite entries at all is filled with 0.
fn impute_columns(data: &mut Array2<f64>) {
    for mut column in data.columns_mut() {
        let mut finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.len() == column.len() {
            continue;
        }
        let fill = median(&mut finite).unwrap_or(0.0);
        for value in column.iter_mut() {
            if !value.is_finite() {
                *value = fill;
            }
        }
    }
}

/// Shift and scale each column to zero mean and unit variance.
///
/// Uses the population variance. A constant column is centered only, so it
/// becomes all zeros instead of dividing by a zero spread.
fn standardize_columns(data: &mut Array2<f64>) {
    let n = data.nrows();
    if n == 0 {
        return;
    }
    for mut column in data.columns_mut() {
        let mean = column.iter().sum::<f64>() / n as f64;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let std = if variance > 0.0 { variance.sqrt() } else { 1.0 };
        for value in column.iter_mut() {
            *value = (*value - mean) / std;
        }
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::build_validity_mask;
    use agrozone_core::{GeoTransform, Raster};
    use approx::assert_relative_eq;
    use geo_types::{Coord, LineString, Polygon};

    fn square(max_x: f64, max_y: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: max_x, y: 0.0 },
                Coord { x: max_x, y: max_y },
                Coord { x: 0.0, y: max_y },
                Coord { x: 0.0, y: 0.0 },
            ]),
            vec![],
        )
    }

    fn layer_from(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::from_bounds(
            0.0, 0.0, cols as f64, rows as f64, cols, rows,
        ));
        r
    }

    #[test]
    fn test_rows_follow_row_major_mask_order() {
        let mut stack = IndexStack::new();
        stack
            .insert("a", layer_from(vec![1.0, 2.0, 3.0, 4.0], 2, 2))
            .unwrap();
        let mask = build_validity_mask(&stack, &square(2.0, 2.0)).unwrap();

        let matrix = build_feature_matrix(&stack, &mask).unwrap();
        assert_eq!(matrix.n_samples(), 4);
        assert_eq!(matrix.n_features(), 1);
        assert_eq!(matrix.coords(), &[(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(matrix.names(), &["a".to_string()]);
    }

    #[test]
    fn test_columns_standardized() {
        let mut stack = IndexStack::new();
        stack
            .insert("a", layer_from(vec![1.0, 2.0, 3.0, 4.0], 2, 2))
            .unwrap();
        stack
            .insert("b", layer_from(vec![10.0, 10.0, 10.0, 10.0], 2, 2))
            .unwrap();
        let mask = build_validity_mask(&stack, &square(2.0, 2.0)).unwrap();
        let matrix = build_feature_matrix(&stack, &mask).unwrap();

        let data = matrix.data();
        for j in 0..2 {
            let mean: f64 = (0..4).map(|i| data[(i, j)]).sum::<f64>() / 4.0;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        }
        // Varying column has unit variance
        let var: f64 = (0..4).map(|i| data[(i, 0)].powi(2)).sum::<f64>() / 4.0;
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
        // Constant column collapses to zeros rather than NaN
        for i in 0..4 {
            assert_eq!(data[(i, 1)], 0.0);
        }
    }

    #[test]
    fn test_median_imputation() {
        let mut data = Array2::from_shape_vec(
            (4, 1),
            vec![1.0, f64::NAN, 3.0, 5.0],
        )
        .unwrap();
        impute_columns(&mut data);
        // Median of {1, 3, 5} = 3
        assert_eq!(data[(1, 0)], 3.0);
    }

    #[test]
    fn test_all_nan_column_imputed_with_zero() {
        let mut data =
            Array2::from_shape_vec((2, 1), vec![f64::NAN, f64::NAN]).unwrap();
        impute_columns(&mut data);
        assert_eq!(data[(0, 0)], 0.0);
        assert_eq!(data[(1, 0)], 0.0);
    }

    #[test]
    fn test_median_even_count() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut values), Some(2.5));
    }
}
