//! Resolved camera poses and their search traces.
//!
//! Homography-mode poses carry only a position and the bearing homography
//! that scored it; perspective-mode poses carry a full `T_C_W`, intrinsics
//! and distortion. [`CameraPose`] keeps the two apart.

use nalgebra::{Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use vantage_core::{
    BrownConrady5, Camera, FxFyCxCySkew, Iso3, Mat3, Pinhole, PinholeCamera, Pt3, Real, Vec3,
};
use vantage_geo::{GeoError, Site};
use vantage_linear::BearingHomography;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub longitude: Real,
    pub latitude: Real,
    /// Meters above the vertical datum.
    pub height: Real,
}

impl GeodeticPosition {
    pub fn of(site: &Site, position: &Pt3) -> Result<Self, GeoError> {
        let g = site.geodetic_of(position)?;
        Ok(Self {
            longitude: g.x,
            latitude: g.y,
            height: position.z,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Scored,
    BelowMinGridCode,
    FitFailed,
}

/// One row of the grid-search score table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub index: usize,
    pub grid_code: i32,
    pub position: Pt3,
    pub pixel_error: Real,
    pub bearing_error: Real,
    pub inliers: usize,
    pub status: CandidateStatus,
}

/// Result of one continuous-search start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedOutcome {
    pub start: Pt3,
    /// Best position of this start, `None` when it failed.
    pub position: Option<Pt3>,
    pub objective: Option<Real>,
    /// The local stage improved on the global result.
    pub refined: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "search", rename_all = "snake_case")]
pub enum SearchTrace {
    Grid {
        /// Catalog index of the chosen candidate.
        best_candidate: usize,
        scores: Vec<CandidateScore>,
    },
    Continuous {
        seeds: Vec<SeedOutcome>,
    },
}

/// Position-only pose from a bearing homography search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomographyPose {
    pub position: Pt3,
    pub geodetic: GeodeticPosition,
    pub fit: BearingHomography,
    pub trace: SearchTrace,
}

/// One `(focal length, plate size)` trial of the perspective search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicsTrial {
    pub focal_mm: Real,
    pub sensor_mm: (Real, Real),
    /// Mean reprojection error in pixels over the inliers, `None` when the
    /// trial failed.
    pub mean_error: Option<Real>,
    #[serde(default)]
    pub inlier_count: usize,
}

/// Full 6-DoF pose with the intrinsics that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectivePose {
    pub position: Pt3,
    pub geodetic: GeodeticPosition,
    /// Axis-angle rotation of `T_C_W`.
    pub rvec: Vec3,
    /// Translation of `T_C_W`.
    pub tvec: Vec3,
    /// `R_C_W`.
    pub rotation: Mat3,
    pub k_matrix: Mat3,
    pub intrinsics: FxFyCxCySkew<Real>,
    pub distortion: BrownConrady5<Real>,
    pub focal_mm: Real,
    pub sensor_mm: (Real, Real),
    pub image_size: (Real, Real),
    pub mean_error: Real,
    /// Inlier flag per observed control point.
    #[serde(default)]
    pub inliers: Vec<bool>,
    pub trials: Vec<IntrinsicsTrial>,
}

impl PerspectivePose {
    /// `T_C_W` rebuilt from `rvec` and `tvec`.
    pub fn pose(&self) -> Iso3 {
        Iso3::from_parts(
            Translation3::from(self.tvec),
            UnitQuaternion::from_scaled_axis(self.rvec),
        )
    }

    pub fn camera(&self) -> PinholeCamera {
        Camera::new(Pinhole, self.distortion, self.intrinsics)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseMode {
    Homography,
    Perspective,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CameraPose {
    Homography(HomographyPose),
    Perspective(PerspectivePose),
}

impl CameraPose {
    pub fn mode(&self) -> PoseMode {
        match self {
            CameraPose::Homography(_) => PoseMode::Homography,
            CameraPose::Perspective(_) => PoseMode::Perspective,
        }
    }

    pub fn position(&self) -> Pt3 {
        match self {
            CameraPose::Homography(p) => p.position,
            CameraPose::Perspective(p) => p.position,
        }
    }

    pub fn geodetic(&self) -> GeodeticPosition {
        match self {
            CameraPose::Homography(p) => p.geodetic,
            CameraPose::Perspective(p) => p.geodetic,
        }
    }
}
