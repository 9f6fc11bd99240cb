//! Spectral index construction
//!
//! Builds the normalized-difference index layers the pipeline clusters on.
//! Each index uses two spectral bands; which indices are available depends
//! on which bands the caller supplies.

use crate::error::{Error, Result};
use crate::layers::IndexStack;
use crate::maybe_rayon::*;
use agrozone_core::Raster;
use ndarray::Array2;
use tracing::{info, warn};

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in the range [-1, 1]. A zero denominator yields 0 rather than
/// an infinity, so pixels where both bands read zero stay usable. NaN in
/// either band propagates to the output.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    check_dimensions(band_a, band_b)?;

    let (rows, cols) = band_a.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if a.is_nan() || b.is_nan() {
                    continue;
                }

                let sum = a + b;
                row_data[col] = if sum.abs() < 1e-12 {
                    0.0
                } else {
                    (a - b) / sum
                };
            }
            row_data
        })
        .collect();

    build_output(band_a, rows, cols, data)
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// The workhorse vigor index: dense canopy reads 0.6 to 0.9, bare soil
/// around 0.1 to 0.2.
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// Normalized Difference Water Index (McFeeters, 1996)
///
/// `NDWI = (Green - NIR) / (Green + NIR)`
pub fn ndwi(green: &Raster<f64>, nir: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(green, nir)
}

/// Normalized Difference Red Edge Index
///
/// `NDRE = (NIR - RedEdge) / (NIR + RedEdge)`
///
/// More sensitive than NDVI over dense canopy, where NDVI saturates.
pub fn ndre(nir: &Raster<f64>, red_edge: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red_edge)
}

/// Salinity Index
///
/// `SI = (Red - SWIR) / (Red + SWIR)`
pub fn si(red: &Raster<f64>, swir: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(red, swir)
}

/// Fraction of finite cells in a layer
pub fn finite_ratio(layer: &Raster<f64>) -> f64 {
    let total = layer.len();
    if total == 0 {
        return 0.0;
    }
    let finite = layer.data().iter().filter(|v| v.is_finite()).count();
    finite as f64 / total as f64
}

/// The spectral bands a capture may provide
#[derive(Debug, Clone, Default)]
pub struct BandSet {
    pub blue: Option<Raster<f64>>,
    pub green: Option<Raster<f64>>,
    pub red: Option<Raster<f64>>,
    pub nir: Option<Raster<f64>>,
    pub red_edge: Option<Raster<f64>>,
    pub swir: Option<Raster<f64>>,
}

/// Build every index the supplied bands allow, in a fixed order:
/// NDVI, NDWI, NDRE, SI.
///
/// Each computed layer is checked against `quality_threshold` (minimum
/// fraction of finite pixels) and logged with a warning when it falls
/// short; the layer is kept either way. Fails when no index can be
/// computed at all.
pub fn build_index_stack(bands: &BandSet, quality_threshold: f64) -> Result<IndexStack> {
    let mut stack = IndexStack::new();

    let candidates: [(&str, Option<Raster<f64>>); 4] = [
        (
            "ndvi",
            match (&bands.nir, &bands.red) {
                (Some(nir), Some(red)) => Some(ndvi(nir, red)?),
                _ => None,
            },
        ),
        (
            "ndwi",
            match (&bands.green, &bands.nir) {
                (Some(green), Some(nir)) => Some(ndwi(green, nir)?),
                _ => None,
            },
        ),
        (
            "ndre",
            match (&bands.nir, &bands.red_edge) {
                (Some(nir), Some(red_edge)) => Some(ndre(nir, red_edge)?),
                _ => None,
            },
        ),
        (
            "si",
            match (&bands.red, &bands.swir) {
                (Some(red), Some(swir)) => Some(si(red, swir)?),
                _ => None,
            },
        ),
    ];

    for (name, layer) in candidates {
        let Some(layer) = layer else { continue };
        let ratio = finite_ratio(&layer);
        if ratio < quality_threshold {
            warn!(
                "index {}: only {:.1}% of pixels usable (threshold {:.0}%)",
                name,
                ratio * 100.0,
                quality_threshold * 100.0
            );
        }
        stack.insert(name, layer)?;
    }

    if stack.is_empty() {
        return Err(Error::Validation(
            "no spectral indices could be computed from the supplied bands".to_string(),
        ));
    }

    info!(
        "initialized {} spectral indices: {}",
        stack.len(),
        stack.names().collect::<Vec<_>>().join(", ")
    );
    Ok(stack)
}

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::Validation(format!(
            "band shapes do not match: {:?} vs {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(())
}

fn build_output(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Processing(e.to_string()))?;
    Ok(output)
}
