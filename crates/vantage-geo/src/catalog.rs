//! Candidate camera stations for discrete search.

use log::warn;
use serde::{Deserialize, Serialize};
use vantage_core::Pt3;

use crate::Site;

/// Height of the camera above the ground at a catalogued station (meters).
pub const DEFAULT_EYE_HEIGHT: f64 = 1.5;

/// One row of the camera-location catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraLocationRecord {
    pub grid_code: i32,
    pub longitude: f64,
    pub latitude: f64,
}

/// A catalogued station placed on the terrain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateCameraLocation {
    /// Row index in the source catalog.
    pub index: usize,
    /// Plausibility tier; low codes are pruned before fitting.
    pub grid_code: i32,
    /// Easting, northing, elevation of the lens (meters).
    pub position: Pt3,
}

impl CandidateCameraLocation {
    pub fn new(index: usize, grid_code: i32, position: Pt3) -> Self {
        Self {
            index,
            grid_code,
            position,
        }
    }
}

/// Place catalog rows on the DEM, `eye_height` above ground.
///
/// Rows outside DEM coverage or failing conversion are logged and skipped.
pub fn place_candidates(
    records: &[CameraLocationRecord],
    site: &Site,
    eye_height: f64,
) -> Vec<CandidateCameraLocation> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, r)| match site.ground_point(r.longitude, r.latitude) {
            Ok(ground) => Some(CandidateCameraLocation::new(
                index,
                r.grid_code,
                Pt3::new(ground.x, ground.y, ground.z + eye_height),
            )),
            Err(e) => {
                warn!("skipping camera location {index}: {e}");
                None
            }
        })
        .collect()
}
