//! GeoTIFF DEM loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::{DemGrid, GeoError, GeoTransformer, RasterTransform};

fn to_f64(result: DecodingResult) -> Result<Vec<f64>, String> {
    let v = match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => return Err("unsupported sample format".into()),
    };
    Ok(v)
}

/// Geotransform from `ModelPixelScale` + `ModelTiepoint` (raster point i, j ↔ model x, y).
fn geotransform_from_tags(scale: &[f64], tiepoint: &[f64]) -> Result<RasterTransform, String> {
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(format!(
            "malformed georeferencing tags (scale {} values, tiepoint {} values)",
            scale.len(),
            tiepoint.len()
        ));
    }
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    Ok(RasterTransform {
        origin_x: x - i * scale[0],
        origin_y: y + j * scale[1],
        pixel_width: scale[0],
        pixel_height: -scale[1],
    })
}

impl DemGrid {
    /// Load a single-band, north-up GeoTIFF in geodetic coordinates.
    pub fn load(path: impl AsRef<Path>, geo: &GeoTransformer) -> Result<Self, GeoError> {
        let path = path.as_ref();
        let fail = |reason: String| GeoError::DemLoad {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| fail(e.to_string()))?;
        let (width, height) = decoder.dimensions().map_err(|e| fail(e.to_string()))?;

        let scale = decoder
            .get_tag_f64_vec(Tag::ModelPixelScaleTag)
            .map_err(|e| fail(format!("missing ModelPixelScale: {e}")))?;
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::ModelTiepointTag)
            .map_err(|e| fail(format!("missing ModelTiepoint: {e}")))?;
        let transform = geotransform_from_tags(&scale, &tiepoint).map_err(fail)?;
        let nodata = decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok());

        let image = decoder.read_image().map_err(|e| fail(e.to_string()))?;
        let samples = to_f64(image).map_err(fail)?;
        let (rows, cols) = (height as usize, width as usize);
        if samples.len() != rows * cols {
            return Err(fail(format!(
                "expected a single band of {} samples, got {}",
                rows * cols,
                samples.len()
            )));
        }

        let dem = DemGrid::from_samples(rows, cols, samples, transform, nodata, geo)?;
        info!("loaded DEM {} ({rows}x{cols})", path.display());
        Ok(dem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UtmZone;

    #[test]
    fn tiepoint_at_origin() {
        let t = geotransform_from_tags(&[0.001, 0.002, 0.0], &[0.0, 0.0, 0.0, 119.0, 26.5, 0.0])
            .unwrap();
        assert_eq!(t.origin_x, 119.0);
        assert_eq!(t.origin_y, 26.5);
        assert_eq!(t.pixel_height, -0.002);
    }

    #[test]
    fn tiepoint_off_origin_is_shifted_back() {
        let t = geotransform_from_tags(&[0.5, 0.5], &[2.0, 4.0, 0.0, 10.0, 20.0, 0.0]).unwrap();
        assert_eq!(t.pixel_to_geo(2.0, 4.0), (10.0, 20.0));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let geo = GeoTransformer::new(UtmZone::default()).unwrap();
        let err = DemGrid::load("/definitely/not/here.tif", &geo).unwrap_err();
        assert!(matches!(err, GeoError::DemLoad { .. }));
    }
}
