//! Pixel ↔ ground control points.

use log::warn;
use serde::{Deserialize, Serialize};
use vantage_core::{Correspondence, Pt2, Pt3};

use crate::{GeoError, GeoPoint, Site};

/// One labelled feature as delivered by the feature source.
///
/// A pixel of exactly `(0, 0)` means "not observed in this photograph".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: i64,
    pub pixel_x: f64,
    pub pixel_y: f64,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
}

impl FeatureRecord {
    pub fn has_pixel(&self) -> bool {
        !(self.pixel_x == 0.0 && self.pixel_y == 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPointOptions {
    /// Feature pixels are divided by this factor (labels placed on a resized copy).
    pub pixel_scale: f64,
    /// Use a record's own elevation instead of the DEM when present.
    pub prefer_supplied_elevation: bool,
}

impl Default for ControlPointOptions {
    fn default() -> Self {
        Self {
            pixel_scale: 1.0,
            prefer_supplied_elevation: false,
        }
    }
}

/// A catalog point with its metric ground position and optional pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    /// `None` when the feature was not observed in the photograph.
    pub pixel: Option<Pt2>,
    /// Easting, northing, elevation (meters).
    pub position: Pt3,
    pub longitude: f64,
    pub latitude: f64,
}

impl ControlPoint {
    /// Resolve one feature row against the site's DEM.
    pub fn from_feature(
        f: &FeatureRecord,
        site: &Site,
        opts: &ControlPointOptions,
    ) -> Result<Self, GeoError> {
        let invalid = |reason: String| GeoError::InvalidFeature { id: f.id, reason };
        if !(opts.pixel_scale.is_finite() && opts.pixel_scale > 0.0) {
            return Err(invalid(format!("invalid pixel scale {}", opts.pixel_scale)));
        }
        let pixel = if f.has_pixel() {
            if !(f.pixel_x.is_finite() && f.pixel_y.is_finite()) {
                return Err(invalid("non-finite pixel".into()));
            }
            Some(Pt2::new(f.pixel_x, f.pixel_y) / opts.pixel_scale)
        } else {
            None
        };

        let supplied = f
            .elevation
            .filter(|z| opts.prefer_supplied_elevation && z.is_finite());
        let mut point = GeoPoint::geodetic(f.longitude, f.latitude);
        if let Some(z) = supplied {
            point = point.with_elevation(z);
        }
        let position = site.metric_point(&point)?;

        Ok(Self {
            id: f.id,
            symbol: f.symbol.clone(),
            name: f.name.clone(),
            pixel,
            position,
            longitude: f.longitude,
            latitude: f.latitude,
        })
    }

    pub fn correspondence(&self) -> Option<Correspondence> {
        self.pixel.map(|px| Correspondence::new(px, self.position))
    }
}

/// Every buildable control point of a photograph, observed or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPointSet {
    points: Vec<ControlPoint>,
}

impl ControlPointSet {
    /// Resolve elevations and metric positions for `features`.
    ///
    /// Rows that cannot be resolved are logged and skipped.
    pub fn build(features: &[FeatureRecord], site: &Site, opts: &ControlPointOptions) -> Self {
        let points = features
            .iter()
            .filter_map(|f| match ControlPoint::from_feature(f, site, opts) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("skipping feature {} ({}): {e}", f.id, f.symbol);
                    None
                }
            })
            .collect();
        Self { points }
    }

    pub fn from_points(points: Vec<ControlPoint>) -> Self {
        Self { points }
    }

    pub fn all(&self) -> &[ControlPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with a pixel observation, in catalog order.
    pub fn observed(&self) -> impl Iterator<Item = &ControlPoint> {
        self.points.iter().filter(|p| p.pixel.is_some())
    }

    /// Fitting-eligible pixel ↔ ground pairs.
    pub fn correspondences(&self) -> Vec<Correspondence> {
        self.points
            .iter()
            .filter_map(ControlPoint::correspondence)
            .collect()
    }
}
