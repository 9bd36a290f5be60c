//! Geodetic ↔ UTM conversion.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use serde::{Deserialize, Serialize};

use crate::GeoError;

const WGS84_LONGLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Coordinate frame tag of a [`GeoPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    /// Longitude/latitude in degrees (WGS84).
    Geodetic,
    /// Easting/northing in meters (UTM).
    Metric,
}

/// A horizontal position tagged with its frame, plus optional elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub frame: Frame,
    /// Longitude or easting.
    pub x: f64,
    /// Latitude or northing.
    pub y: f64,
    /// Meters above the vertical datum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl GeoPoint {
    pub fn geodetic(lon: f64, lat: f64) -> Self {
        Self {
            frame: Frame::Geodetic,
            x: lon,
            y: lat,
            elevation: None,
        }
    }

    pub fn metric(easting: f64, northing: f64) -> Self {
        Self {
            frame: Frame::Metric,
            x: easting,
            y: northing,
            elevation: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }
}

/// UTM zone selection (WGS84 datum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtmZone {
    pub number: u8,
    #[serde(default)]
    pub south: bool,
}

impl Default for UtmZone {
    /// Zone 50 north (EPSG:32650).
    fn default() -> Self {
        Self {
            number: 50,
            south: false,
        }
    }
}

impl UtmZone {
    pub fn proj_string(&self) -> String {
        let hemisphere = if self.south { " +south" } else { "" };
        format!(
            "+proj=utm +zone={}{} +datum=WGS84 +units=m +no_defs",
            self.number, hemisphere
        )
    }

    /// EPSG code of the zone (`326xx` north, `327xx` south).
    pub fn epsg(&self) -> u16 {
        let base = if self.south { 32700 } else { 32600 };
        base + self.number as u16
    }
}

/// Bidirectional geodetic ↔ metric transformer for one UTM zone.
///
/// Built once and shared by reference; holds no mutable state.
pub struct GeoTransformer {
    zone: UtmZone,
    geodetic: Proj,
    metric: Proj,
}

impl std::fmt::Debug for GeoTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTransformer")
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

fn build_proj(definition: &str) -> Result<Proj, GeoError> {
    Proj::from_proj_string(definition).map_err(|e| GeoError::ProjectionSetup {
        definition: definition.to_owned(),
        reason: e.to_string(),
    })
}

impl GeoTransformer {
    pub fn new(zone: UtmZone) -> Result<Self, GeoError> {
        if zone.number == 0 || zone.number > 60 {
            return Err(GeoError::ProjectionSetup {
                definition: zone.proj_string(),
                reason: format!("UTM zone must be in 1..=60, got {}", zone.number),
            });
        }
        Ok(Self {
            zone,
            geodetic: build_proj(WGS84_LONGLAT)?,
            metric: build_proj(&zone.proj_string())?,
        })
    }

    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    /// `(lon, lat)` degrees → `(easting, northing)` meters.
    pub fn to_metric(&self, lon: f64, lat: f64) -> Result<(f64, f64), GeoError> {
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
            return Err(GeoError::CoordinateTransform {
                x: lon,
                y: lat,
                reason: "longitude/latitude out of domain".into(),
            });
        }
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(&self.geodetic, &self.metric, &mut point).map_err(|e| {
            GeoError::CoordinateTransform {
                x: lon,
                y: lat,
                reason: e.to_string(),
            }
        })?;
        finite_pair(lon, lat, point.0, point.1)
    }

    /// `(easting, northing)` meters → `(lon, lat)` degrees.
    pub fn to_geodetic(&self, easting: f64, northing: f64) -> Result<(f64, f64), GeoError> {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(GeoError::CoordinateTransform {
                x: easting,
                y: northing,
                reason: "non-finite input".into(),
            });
        }
        let mut point = (easting, northing, 0.0);
        transform(&self.metric, &self.geodetic, &mut point).map_err(|e| {
            GeoError::CoordinateTransform {
                x: easting,
                y: northing,
                reason: e.to_string(),
            }
        })?;
        finite_pair(easting, northing, point.0.to_degrees(), point.1.to_degrees())
    }

    /// Re-express `point` in `frame`, keeping its elevation.
    pub fn convert(&self, point: &GeoPoint, frame: Frame) -> Result<GeoPoint, GeoError> {
        let (x, y) = match (point.frame, frame) {
            (Frame::Geodetic, Frame::Metric) => self.to_metric(point.x, point.y)?,
            (Frame::Metric, Frame::Geodetic) => self.to_geodetic(point.x, point.y)?,
            _ => (point.x, point.y),
        };
        Ok(GeoPoint {
            frame,
            x,
            y,
            elevation: point.elevation,
        })
    }
}

fn finite_pair(x: f64, y: f64, a: f64, b: f64) -> Result<(f64, f64), GeoError> {
    if a.is_finite() && b.is_finite() {
        Ok((a, b))
    } else {
        Err(GeoError::CoordinateTransform {
            x,
            y,
            reason: format!("non-finite result ({a}, {b})"),
        })
    }
}
