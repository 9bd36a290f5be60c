//! Camera pose recovery for historical photographs.
//!
//! [`estimate_pose`] runs one of three strategies over the observed control
//! points of a photograph:
//!
//! - grid search over a catalog of camera stations ([`grid`]),
//! - multi-start continuous search around an initial position ([`continuous`]),
//! - EPnP over a grid of plate-camera intrinsics ([`perspective`]).
//!
//! The first two yield a position-only [`HomographyPose`]; the third a full
//! [`PerspectivePose`]. [`raycast::pixel_to_geo`] and [`reproject`] then map
//! between pixels and ground points under a resolved pose.

pub mod config;
pub mod continuous;
mod error;
pub mod grid;
pub mod perspective;
pub mod pose;
pub mod raycast;
pub mod reproject;

pub use config::*;
pub use error::PoseError;
pub use pose::*;
pub use raycast::{pixel_to_geo, RayCamera, RayCastOptions, RayHit};
pub use reproject::{overlay, project_points, project_with, OverlayPoint};

use log::info;
use nalgebra::Matrix3;
use vantage_core::{Pt2, Pt3, Real};
use vantage_geo::{
    place_candidates, CameraLocationRecord, CandidateCameraLocation, ControlPointSet,
    FeatureRecord, Site,
};

/// Inputs of one pose estimate.
#[derive(Debug, Clone, Default)]
pub struct PoseRequest {
    pub control: ControlPointSet,
    /// Stations for grid search.
    pub candidates: Vec<CandidateCameraLocation>,
    /// Centre of the continuous-search box.
    pub initial_position: Option<Pt3>,
    /// `(width, height)` of the photograph in pixels.
    pub image_size: Option<(Real, Real)>,
}

impl PoseRequest {
    /// Build control points and candidate stations from raw records.
    pub fn from_records(
        features: &[FeatureRecord],
        locations: &[CameraLocationRecord],
        site: &Site,
        config: &PoseConfig,
    ) -> Self {
        Self {
            control: ControlPointSet::build(features, site, &config.control),
            candidates: place_candidates(locations, site, config.eye_height),
            initial_position: None,
            image_size: None,
        }
    }

    /// Explicit image size or the largest observed pixel coordinates.
    pub fn image_size_or_inferred(&self) -> (Real, Real) {
        self.image_size.unwrap_or_else(|| {
            vantage_linear::inferred_image_size(&self.control.correspondences())
        })
    }

    /// Continuous-search centre: the explicit initial position, else the
    /// centroid of the candidate stations.
    fn search_center(&self) -> Option<Pt3> {
        self.initial_position.or_else(|| {
            if self.candidates.is_empty() {
                return None;
            }
            let sum = self
                .candidates
                .iter()
                .fold(nalgebra::Vector3::zeros(), |acc, c| acc + c.position.coords);
            Some(Pt3::from(sum / self.candidates.len() as Real))
        })
    }
}

/// Estimate the camera pose of one photograph.
pub fn estimate_pose(
    request: &PoseRequest,
    site: &Site,
    config: &PoseConfig,
) -> Result<CameraPose, PoseError> {
    let correspondences = request.control.correspondences();
    info!(
        "estimating pose from {} observed of {} control points",
        correspondences.len(),
        request.control.len()
    );
    let mut fit_opts = config.fit.clone();
    if fit_opts.image_size.is_none() {
        fit_opts.image_size = request.image_size;
    }

    match &config.strategy {
        SearchStrategy::Grid(opts) => {
            if request.candidates.is_empty() {
                return Err(PoseError::InvalidConfig(
                    "grid search needs a camera-location catalog".into(),
                ));
            }
            let out = grid::grid_search(&correspondences, &request.candidates, &fit_opts, opts)?;
            Ok(CameraPose::Homography(HomographyPose {
                position: out.fit.camera,
                geodetic: GeodeticPosition::of(site, &out.fit.camera)?,
                fit: out.fit,
                trace: SearchTrace::Grid {
                    best_candidate: out.best_candidate,
                    scores: out.scores,
                },
            }))
        }
        SearchStrategy::Continuous(opts) => {
            let center = request.search_center().ok_or_else(|| {
                PoseError::InvalidConfig(
                    "continuous search needs an initial position or a camera-location catalog"
                        .into(),
                )
            })?;
            let out = continuous::continuous_search(&correspondences, &center, &fit_opts, opts)?;
            Ok(CameraPose::Homography(HomographyPose {
                position: out.position,
                geodetic: GeodeticPosition::of(site, &out.position)?,
                fit: out.fit,
                trace: SearchTrace::Continuous { seeds: out.seeds },
            }))
        }
        SearchStrategy::Perspective(opts) => {
            let out = perspective::perspective_search(&correspondences, request.image_size, opts)?;
            let rotation: Matrix3<Real> = out.pose.rotation.to_rotation_matrix().into_inner();
            Ok(CameraPose::Perspective(PerspectivePose {
                position: out.position,
                geodetic: GeodeticPosition::of(site, &out.position)?,
                rvec: out.pose.rotation.scaled_axis(),
                tvec: out.pose.translation.vector,
                rotation,
                k_matrix: out.camera.k.k_matrix(),
                intrinsics: out.camera.k,
                distortion: out.camera.dist,
                focal_mm: out.focal_mm,
                sensor_mm: out.sensor_mm,
                image_size: out.image_size,
                mean_error: out.mean_error,
                inliers: out.inliers,
                trials: out.trials,
            }))
        }
    }
}

/// Ground point of `pixel` under a perspective pose.
///
/// Homography poses carry no orientation and cannot be ray cast.
pub fn locate_pixel(
    pose: &CameraPose,
    pixel: &Pt2,
    site: &Site,
    control: &ControlPointSet,
    opts: &RayCastOptions,
) -> Result<RayHit, PoseError> {
    let CameraPose::Perspective(p) = pose else {
        return Err(PoseError::InvalidConfig(
            "ray casting needs a perspective pose".into(),
        ));
    };
    let camera = RayCamera {
        intrinsics: &p.intrinsics,
        rotation: &p.rotation,
        origin: &p.position,
    };
    pixel_to_geo(pixel, &camera, site, &control.correspondences(), opts)
}
