//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Reads the georeferencing tags common in
//! satellite-imagery exports (ModelPixelScaleTag, ModelTiepointTag and the
//! EPSG code from the GeoKey directory); projection metadata beyond that is
//! left to the caller.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// Read the first image of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoder =
        Decoder::new(file).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let transform = read_geotransform(&mut decoder).ok();
    let crs = read_crs(&mut decoder);
    let mut raster = decode_image(&mut decoder)?;
    if let Some(t) = transform {
        raster.set_transform(t);
    }
    raster.set_crs(crs);

    Ok(raster)
}

/// Read every image of a multi-page GeoTIFF into a band stack.
///
/// All bands must share the first image's dimensions; the georeferencing of
/// the first image is applied to every band.
pub fn read_geotiff_stack<T, P>(path: P) -> Result<Vec<Raster<T>>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoder =
        Decoder::new(file).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let transform = read_geotransform(&mut decoder).ok();
    let crs = read_crs(&mut decoder);

    let mut bands: Vec<Raster<T>> = Vec::new();
    loop {
        let mut band = decode_image(&mut decoder)?;

        if let Some(first) = bands.first() {
            if band.shape() != first.shape() {
                return Err(Error::Other(format!(
                    "band {} shape {:?} does not match first band {:?}",
                    bands.len(),
                    band.shape(),
                    first.shape()
                )));
            }
        }
        if let Some(t) = transform {
            band.set_transform(t);
        }
        band.set_crs(crs.clone());
        bands.push(band);

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| Error::Other(format!("Cannot advance to next band: {}", e)))?;
    }

    Ok(bands)
}

/// Decode the current image of an open TIFF decoder
fn decode_image<T, R>(decoder: &mut Decoder<R>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I8(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    Raster::from_vec(data, rows, cols)
}

fn cast_buffer<T, S>(buf: &[S]) -> Vec<T>
where
    T: RasterElement,
    S: Copy + num_traits::NumCast,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

/// Attempt to read a GeoTransform from TIFF tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    // ModelPixelScaleTag = 33550
    // ModelTiepointTag = 33922
    let scale_tag = Tag::ModelPixelScaleTag;
    let tiepoint_tag = Tag::ModelTiepointTag;

    let scale = decoder
        .get_tag_f64_vec(scale_tag)
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(tiepoint_tag)
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]
        // scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        let pixel_width = scale[0];
        let pixel_height = -scale[1]; // Negative for north-up

        return Ok(GeoTransform::new(
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        ));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// Attempt to read a CRS from the GeoKey directory.
///
/// Only the EPSG code keys are interpreted; key values 0 and 32767 mean
/// undefined and user-defined in the GeoTIFF key space and carry no code.
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    // GeoKeyDirectoryTag = 34735; entries are (key, location, count, value)
    // quads after a 4-short header
    let directory = decoder.get_tag_u32_vec(Tag::GeoKeyDirectoryTag).ok()?;

    for entry in directory.get(4..)?.chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // ProjectedCSTypeGeoKey = 3072, GeographicTypeGeoKey = 2048
        if (key == 3072 || key == 2048) && location == 0 && value != 0 && value != 32767 {
            return Some(CRS::from_epsg(value));
        }
    }
    None
}

/// Write a Raster to a GeoTIFF file
///
/// Values are written as 32-bit float with the transform encoded in
/// ModelPixelScaleTag/ModelTiepointTag and the EPSG code, when the raster
/// carries one, in the GeoKey directory.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    // ModelPixelScaleTag
    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(33550), scale.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    // ModelTiepointTag
    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(33922), tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    // GeoKeyDirectoryTag (34735): projected/pixel-is-area entries so
    // downstream GIS tools recognize the file as a GeoTIFF, plus the EPSG
    // code when one is known.
    let mut geokeys: Vec<u16> = vec![
        1, 1, 0, 0, // Version 1.1.0, key count patched below
        1024, 0, 1, 1, // GTModelTypeGeoKey = ModelTypeProjected
        1025, 0, 1, 1, // GTRasterTypeGeoKey = RasterPixelIsArea
    ];
    if let Some(code) = raster.crs().and_then(|c| c.epsg()) {
        if let Ok(short) = u16::try_from(code) {
            geokeys.extend_from_slice(&[3072, 0, 1, short]); // ProjectedCSTypeGeoKey
        }
    }
    geokeys[3] = (geokeys.len() / 4 - 1) as u16;
    image
        .encoder()
        .write_tag(Tag::Unknown(34735), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("agrozone_io_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_write_read_roundtrip() {
        let path = temp_path("roundtrip.tif");

        let mut raster = Raster::<f64>::from_vec(vec![0.1, 0.2, 0.3, 0.4], 2, 2).unwrap();
        raster.set_transform(GeoTransform::new(300.0, 6300.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::from_epsg(32719)));

        write_geotiff(&raster, &path).unwrap();
        let back: Raster<f64> = read_geotiff(&path).unwrap();

        assert_eq!(back.shape(), (2, 2));
        assert_relative_eq!(back.get(0, 1).unwrap(), 0.2, epsilon = 1e-6);
        assert_relative_eq!(back.transform().origin_x, 300.0, epsilon = 1e-9);
        assert_relative_eq!(back.transform().pixel_height, -10.0, epsilon = 1e-9);
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32719));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_stack_reads_single_image_as_one_band() {
        let path = temp_path("single.tif");

        let raster = Raster::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        write_geotiff(&raster, &path).unwrap();

        let bands: Vec<Raster<f64>> = read_geotiff_stack(&path).unwrap();
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].shape(), (2, 2));
        // No EPSG code was attached, so none comes back
        assert!(bands[0].crs().is_none());

        let _ = std::fs::remove_file(&path);
    }
}
