//! Raster digital elevation model with bilinear lookup.
//!
//! Samples sit on the raster's pixel-corner lattice:
//! `lon = origin_x + col * pixel_width`, `lat = origin_y + row * pixel_height`,
//! with `pixel_height < 0` so row 0 is the northernmost row. Lookups outside
//! the lattice (or touching a no-data sample) fail with
//! [`GeoError::OutOfBounds`] instead of extrapolating.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{Frame, GeoError, GeoPoint, GeoTransformer};

// Slack (in pixels) for queries landing on the outermost sample row/column.
const EDGE_EPS_PX: f64 = 1e-9;

/// North-up affine mapping from raster `(col, row)` to `(lon, lat)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
}

impl RasterTransform {
    /// Build from a GDAL-style six-term geotransform.
    ///
    /// Rotation terms (`gt[2]`, `gt[4]`) must be zero.
    pub fn from_gdal(gt: [f64; 6]) -> Result<Self, GeoError> {
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(GeoError::InvalidRaster(format!(
                "rotated geotransforms are not supported (terms {}, {})",
                gt[2], gt[4]
            )));
        }
        let t = Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            origin_y: gt[3],
            pixel_height: gt[5],
        };
        t.validate()?;
        Ok(t)
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            0.0,
            self.origin_y,
            0.0,
            self.pixel_height,
        ]
    }

    fn validate(&self) -> Result<(), GeoError> {
        let ok = [
            self.origin_x,
            self.origin_y,
            self.pixel_width,
            self.pixel_height,
        ]
        .iter()
        .all(|v| v.is_finite())
            && self.pixel_width > 0.0
            && self.pixel_height < 0.0;
        if ok {
            Ok(())
        } else {
            Err(GeoError::InvalidRaster(format!(
                "geotransform must be finite and north-up, got {self:?}"
            )))
        }
    }

    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    pub fn geo_to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            (lon - self.origin_x) / self.pixel_width,
            (lat - self.origin_y) / self.pixel_height,
        )
    }
}

/// Axis-aligned bounding box in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        points.into_iter().fold(None, |acc, (x, y)| {
            Some(match acc {
                None => Extent {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(e) => Extent {
                    min_x: e.min_x.min(x),
                    min_y: e.min_y.min(y),
                    max_x: e.max_x.max(x),
                    max_y: e.max_y.max(y),
                },
            })
        })
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Immutable elevation raster. Safe to share across threads for reads.
#[derive(Debug, Clone)]
pub struct DemGrid {
    rows: usize,
    cols: usize,
    samples: Vec<f64>,
    transform: RasterTransform,
    nodata: Option<f64>,
    geodetic_extent: Extent,
    metric_extent: Option<Extent>,
    elevation_range: (f64, f64),
}

impl DemGrid {
    /// Build a grid from row-major samples (row 0 = north).
    ///
    /// The metric extent is computed once from the four corner samples; a
    /// corner that fails to convert is logged and left out.
    pub fn from_samples(
        rows: usize,
        cols: usize,
        samples: Vec<f64>,
        transform: RasterTransform,
        nodata: Option<f64>,
        geo: &GeoTransformer,
    ) -> Result<Self, GeoError> {
        if rows < 2 || cols < 2 {
            return Err(GeoError::InvalidRaster(format!(
                "need at least 2x2 samples, got {rows}x{cols}"
            )));
        }
        if samples.len() != rows * cols {
            return Err(GeoError::InvalidRaster(format!(
                "expected {} samples for {rows}x{cols}, got {}",
                rows * cols,
                samples.len()
            )));
        }
        transform.validate()?;

        let is_valid = |v: f64| v.is_finite() && nodata.map_or(true, |nd| v != nd);
        let elevation_range = samples
            .iter()
            .copied()
            .filter(|&v| is_valid(v))
            .fold(None, |acc: Option<(f64, f64)>, v| {
                Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
            })
            .ok_or_else(|| GeoError::InvalidRaster("raster has no valid samples".into()))?;

        let last_col = (cols - 1) as f64;
        let last_row = (rows - 1) as f64;
        let corners = [
            transform.pixel_to_geo(0.0, 0.0),
            transform.pixel_to_geo(last_col, 0.0),
            transform.pixel_to_geo(0.0, last_row),
            transform.pixel_to_geo(last_col, last_row),
        ];
        let geodetic_extent = Extent::from_points(corners)
            .ok_or_else(|| GeoError::InvalidRaster("empty raster".into()))?;
        let metric_corners: Vec<(f64, f64)> = corners
            .iter()
            .filter_map(|&(lon, lat)| match geo.to_metric(lon, lat) {
                Ok(en) => Some(en),
                Err(e) => {
                    warn!("DEM corner ({lon}, {lat}) has no metric image: {e}");
                    None
                }
            })
            .collect();
        let metric_extent = Extent::from_points(metric_corners);

        debug!(
            "DEM {rows}x{cols}, lon [{:.6}, {:.6}], lat [{:.6}, {:.6}], elevation [{:.1}, {:.1}]",
            geodetic_extent.min_x,
            geodetic_extent.max_x,
            geodetic_extent.min_y,
            geodetic_extent.max_y,
            elevation_range.0,
            elevation_range.1
        );

        Ok(Self {
            rows,
            cols,
            samples,
            transform,
            nodata,
            geodetic_extent,
            metric_extent,
            elevation_range,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn transform(&self) -> &RasterTransform {
        &self.transform
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Longitude/latitude bounds of the sample lattice.
    pub fn geodetic_extent(&self) -> Extent {
        self.geodetic_extent
    }

    /// Easting/northing bounds from the four corners, if they converted.
    pub fn metric_extent(&self) -> Option<Extent> {
        self.metric_extent
    }

    /// `(min, max)` over valid samples.
    pub fn elevation_range(&self) -> (f64, f64) {
        self.elevation_range
    }

    pub fn contains_geodetic(&self, lon: f64, lat: f64) -> bool {
        let (col, row) = self.transform.geo_to_pixel(lon, lat);
        self.lattice_cell(row, col).is_some()
    }

    /// Elevation at `point`, converting metric input to geodetic first.
    ///
    /// This is the single elevation entry point for the rest of the workspace.
    pub fn elevation_at(&self, point: &GeoPoint, geo: &GeoTransformer) -> Result<f64, GeoError> {
        let (lon, lat) = match point.frame {
            Frame::Geodetic => (point.x, point.y),
            Frame::Metric => geo.to_geodetic(point.x, point.y)?,
        };
        self.interpolate(lat, lon)
    }

    /// Bilinear elevation at a geodetic position.
    pub fn elevation_at_geodetic(&self, lon: f64, lat: f64) -> Result<f64, GeoError> {
        self.interpolate(lat, lon)
    }

    fn sample(&self, row: usize, col: usize) -> f64 {
        self.samples[row * self.cols + col]
    }

    fn is_nodata(&self, v: f64) -> bool {
        !v.is_finite() || self.nodata.is_some_and(|nd| v == nd)
    }

    /// Cell origin and fractional offsets for fractional lattice coordinates.
    fn lattice_cell(&self, row_f: f64, col_f: f64) -> Option<(usize, usize, f64, f64)> {
        let max_row = (self.rows - 1) as f64;
        let max_col = (self.cols - 1) as f64;
        let inside = |v: f64, max: f64| v >= -EDGE_EPS_PX && v <= max + EDGE_EPS_PX;
        if !inside(row_f, max_row) || !inside(col_f, max_col) {
            return None;
        }
        let row_f = row_f.clamp(0.0, max_row);
        let col_f = col_f.clamp(0.0, max_col);
        let r0 = (row_f.floor() as usize).min(self.rows - 2);
        let c0 = (col_f.floor() as usize).min(self.cols - 2);
        Some((r0, c0, row_f - r0 as f64, col_f - c0 as f64))
    }

    fn interpolate(&self, lat: f64, lon: f64) -> Result<f64, GeoError> {
        let out = GeoError::OutOfBounds { lon, lat };
        if !lat.is_finite() || !lon.is_finite() {
            return Err(out);
        }
        let (col_f, row_f) = self.transform.geo_to_pixel(lon, lat);
        let Some((r0, c0, fr, fc)) = self.lattice_cell(row_f, col_f) else {
            return Err(out);
        };

        let taps = [
            (r0, c0, (1.0 - fr) * (1.0 - fc)),
            (r0, c0 + 1, (1.0 - fr) * fc),
            (r0 + 1, c0, fr * (1.0 - fc)),
            (r0 + 1, c0 + 1, fr * fc),
        ];
        let mut z = 0.0;
        for (r, c, w) in taps {
            if w == 0.0 {
                continue;
            }
            let v = self.sample(r, c);
            if self.is_nodata(v) {
                return Err(out);
            }
            z += w * v;
        }
        // Guard against rounding past the sample range.
        Ok(z.clamp(self.elevation_range.0, self.elevation_range.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UtmZone;

    fn geo() -> GeoTransformer {
        GeoTransformer::new(UtmZone::default()).unwrap()
    }

    // 3x3 lattice over lon [119.0, 119.02], lat [26.0, 26.02], z = 10*row + col.
    fn ramp() -> DemGrid {
        let transform = RasterTransform {
            origin_x: 119.0,
            origin_y: 26.02,
            pixel_width: 0.01,
            pixel_height: -0.01,
        };
        let samples = (0..3)
            .flat_map(|r| (0..3).map(move |c| (10 * r + c) as f64))
            .collect();
        DemGrid::from_samples(3, 3, samples, transform, Some(-9999.0), &geo()).unwrap()
    }

    #[test]
    fn exact_at_samples_and_bilinear_between() {
        let dem = ramp();
        let z = dem.elevation_at_geodetic(119.01, 26.02).unwrap();
        assert!((z - 1.0).abs() < 1e-9, "z={z}");
        let z = dem.elevation_at_geodetic(119.0, 26.0).unwrap();
        assert!((z - 20.0).abs() < 1e-9, "row 2 is the southern row, z={z}");
        let z = dem.elevation_at_geodetic(119.005, 26.015).unwrap();
        assert!((z - 5.5).abs() < 1e-9, "z={z}");
    }

    #[test]
    fn outside_lattice_is_out_of_bounds() {
        let dem = ramp();
        assert!(matches!(
            dem.elevation_at_geodetic(119.03, 26.01),
            Err(GeoError::OutOfBounds { .. })
        ));
        assert!(!dem.contains_geodetic(118.99, 26.01));
        assert!(dem.contains_geodetic(119.02, 26.0));
    }

    #[test]
    fn lookups_stay_within_sample_range() {
        let dem = ramp();
        let (lo, hi) = dem.elevation_range();
        for i in 0..=20 {
            for j in 0..=20 {
                let lon = 119.0 + 0.001 * i as f64;
                let lat = 26.0 + 0.001 * j as f64;
                let z = dem.elevation_at_geodetic(lon, lat).unwrap();
                assert!(z >= lo && z <= hi);
            }
        }
    }

    #[test]
    fn metric_query_matches_geodetic_query() {
        let geo = geo();
        let dem = ramp();
        let (e, n) = geo.to_metric(119.013, 26.007).unwrap();
        let a = dem.elevation_at(&GeoPoint::metric(e, n), &geo).unwrap();
        let b = dem.elevation_at_geodetic(119.013, 26.007).unwrap();
        assert!((a - b).abs() < 1e-6);
        let ext = dem.metric_extent().unwrap();
        assert!(ext.contains(e, n));
    }

    #[test]
    fn nodata_cells_are_not_interpolated() {
        let transform = RasterTransform::from_gdal([119.0, 0.01, 0.0, 26.01, 0.0, -0.01]).unwrap();
        let dem = DemGrid::from_samples(
            2,
            2,
            vec![5.0, -9999.0, 5.0, 5.0],
            transform,
            Some(-9999.0),
            &geo(),
        )
        .unwrap();
        assert_eq!(dem.elevation_range(), (5.0, 5.0));
        assert!(dem.elevation_at_geodetic(119.005, 26.005).is_err());
        assert!((dem.elevation_at_geodetic(119.0, 26.0).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_rasters_are_rejected() {
        let t = RasterTransform::from_gdal([0.0, 1.0, 0.0, 1.0, 0.0, -1.0]).unwrap();
        assert!(DemGrid::from_samples(2, 2, vec![0.0; 3], t, None, &geo()).is_err());
        assert!(DemGrid::from_samples(1, 4, vec![0.0; 4], t, None, &geo()).is_err());
        assert!(RasterTransform::from_gdal([0.0, 1.0, 0.2, 1.0, 0.0, -1.0]).is_err());
        assert!(RasterTransform::from_gdal([0.0, 1.0, 0.0, 1.0, 0.0, 1.0]).is_err());
    }
}
