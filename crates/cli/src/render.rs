//! Categorical overview rendering
//!
//! Turns the label grid into an RGBA buffer with one color per zone,
//! transparent where no zone was assigned, stamps the sampling points in
//! black, and encodes the result as a PNG.

use agrozone_core::GeoTransform;
use agrozone_zoning::{LabelGrid, SamplePoint, ZoningResult};
use anyhow::{Context, Result};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::fs::File;
use std::path::Path;

/// Categorical palette cycled over zone ids.
const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

/// Target length in pixels for the longer output edge.
const TARGET_EDGE: usize = 512;

/// Color assigned to a zone id
pub fn zone_color(label: u32) -> [u8; 3] {
    PALETTE[label as usize % PALETTE.len()]
}

/// Integer upscale factor that brings the longer grid edge near
/// [`TARGET_EDGE`] without exceeding it
fn scale_for(rows: usize, cols: usize) -> usize {
    let edge = rows.max(cols).max(1);
    (TARGET_EDGE / edge).clamp(1, 64)
}

/// Render the label grid as a row-major RGBA buffer, `scale` output pixels
/// per grid cell. Unlabeled cells stay fully transparent.
fn labels_to_rgba(labels: &LabelGrid, scale: usize) -> Vec<u8> {
    let (rows, cols) = labels.shape();
    let width = cols * scale;
    let mut rgba = vec![0u8; width * rows * scale * 4];

    for ((row, col), label) in labels.iter() {
        let Some(label) = label else { continue };
        let [r, g, b] = zone_color(label);
        for dy in 0..scale {
            let y = row * scale + dy;
            for dx in 0..scale {
                let x = col * scale + dx;
                let offset = (y * width + x) * 4;
                rgba[offset] = r;
                rgba[offset + 1] = g;
                rgba[offset + 2] = b;
                rgba[offset + 3] = 255;
            }
        }
    }
    rgba
}

/// Stamp each sampling point as a black square marker
fn stamp_samples(
    rgba: &mut [u8],
    width: usize,
    height: usize,
    samples: &[SamplePoint],
    transform: &GeoTransform,
    scale: usize,
) {
    let radius = (scale as i64 / 2).max(1);
    for sample in samples {
        let (col, row) = transform.geo_to_pixel(sample.point.x(), sample.point.y());
        if !col.is_finite() || !row.is_finite() {
            continue;
        }
        let cx = (col * scale as f64) as i64;
        let cy = (row * scale as f64) as i64;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let x = cx + dx;
                let y = cy + dy;
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    continue;
                }
                let offset = (y as usize * width + x as usize) * 4;
                rgba[offset] = 0;
                rgba[offset + 1] = 0;
                rgba[offset + 2] = 0;
                rgba[offset + 3] = 255;
            }
        }
    }
}

/// Render the zoning result and write it as `path` in PNG format
pub fn write_overview(result: &ZoningResult, transform: &GeoTransform, path: &Path) -> Result<()> {
    let (rows, cols) = result.labels.shape();
    if rows == 0 || cols == 0 {
        anyhow::bail!("Label grid is empty; nothing to render");
    }

    let scale = scale_for(rows, cols);
    let width = cols * scale;
    let height = rows * scale;

    let mut rgba = labels_to_rgba(&result.labels, scale);
    stamp_samples(&mut rgba, width, height, &result.samples, transform, scale);

    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    PngEncoder::new(file)
        .write_image(&rgba, width as u32, height as u32, ExtendedColorType::Rgba8)
        .context("PNG encoding failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Point;

    #[test]
    fn test_labels_to_rgba_colors_and_transparency() {
        let mut labels = LabelGrid::unlabeled(1, 3);
        labels.set(0, 0, Some(0));
        labels.set(0, 1, Some(1));

        let rgba = labels_to_rgba(&labels, 1);
        assert_eq!(rgba.len(), 12);
        assert_eq!(&rgba[0..4], &[31, 119, 180, 255]);
        assert_eq!(&rgba[4..8], &[255, 127, 14, 255]);
        assert_eq!(rgba[11], 0, "unlabeled cell must stay transparent");
    }

    #[test]
    fn test_palette_cycles_past_ten_zones() {
        assert_eq!(zone_color(0), zone_color(10));
        assert_eq!(zone_color(3), zone_color(13));
    }

    #[test]
    fn test_scale_targets_longer_edge() {
        assert_eq!(scale_for(2, 2), 64);
        assert_eq!(scale_for(256, 64), 2);
        assert_eq!(scale_for(4000, 4000), 1);
    }

    #[test]
    fn test_upscale_fills_cell_blocks() {
        let mut labels = LabelGrid::unlabeled(1, 2);
        labels.set(0, 1, Some(2));

        let scale = 2;
        let rgba = labels_to_rgba(&labels, scale);
        let width = 2 * scale;
        assert_eq!(rgba.len(), width * scale * 4);

        // all four output pixels of cell (0, 1) carry the zone color
        for (y, x) in [(0, 2), (0, 3), (1, 2), (1, 3)] {
            let offset = (y * width + x) * 4;
            assert_eq!(&rgba[offset..offset + 4], &[44, 160, 44, 255]);
        }
        // cell (0, 0) stays transparent
        assert_eq!(rgba[3], 0);
    }

    #[test]
    fn test_stamp_marks_sample_location() {
        let transform = GeoTransform::new(0.0, 2.0, 1.0, -1.0);
        let labels = LabelGrid::unlabeled(2, 2);
        let scale = 4;
        let width = 2 * scale;
        let height = 2 * scale;
        let mut rgba = labels_to_rgba(&labels, scale);

        // center of cell (row 0, col 1)
        let samples = vec![SamplePoint {
            zone_id: 0,
            point: Point::new(1.5, 1.5),
            values: vec![],
        }];
        stamp_samples(&mut rgba, width, height, &samples, &transform, scale);

        let offset = (2 * width + 6) * 4;
        assert_eq!(&rgba[offset..offset + 4], &[0, 0, 0, 255]);
        // far corner untouched
        assert_eq!(rgba[3], 0);
    }
}
