//! Perspective-n-Point pose estimation.
//!
//! Estimates a pose `T_C_W` (world into camera frame) from ground points and
//! their pixels under known intrinsics. World coordinates in a projected
//! CRS are large; callers should center them first (see
//! [`PnpSolver::epnp_centered`]).

use thiserror::Error;
use vantage_core::{FxFyCxCySkew, Iso3, Pt2, Pt3, Real, Vec3};

mod epnp;
mod pose_utils;
mod ransac;

pub use ransac::{epnp_ransac, EPNP_RANSAC_SAMPLES};

#[derive(Debug, Error)]
pub enum PnpError {
    #[error("need at least {required} point correspondences, got {found}")]
    NotEnoughPoints { required: usize, found: usize },
    #[error("intrinsics matrix is not invertible")]
    SingularIntrinsics,
    #[error("svd failed")]
    SvdFailed,
    #[error("degenerate point configuration")]
    DegeneratePoints,
    #[error("no consensus pose within the reprojection threshold")]
    NoConsensus,
}

#[derive(Debug, Clone, Copy)]
pub struct PnpSolver;

impl PnpSolver {
    /// EPnP pose estimation for 4+ points (pixels must be undistorted).
    pub fn epnp(world: &[Pt3], image: &[Pt2], k: &FxFyCxCySkew<Real>) -> Result<Iso3, PnpError> {
        epnp::epnp(world, image, k)
    }

    /// EPnP on world points shifted by their centroid.
    ///
    /// The returned pose still maps the original (uncentered) world frame
    /// into the camera frame.
    pub fn epnp_centered(
        world: &[Pt3],
        image: &[Pt2],
        k: &FxFyCxCySkew<Real>,
    ) -> Result<Iso3, PnpError> {
        let origin = centroid(world).ok_or(PnpError::NotEnoughPoints {
            required: 4,
            found: 0,
        })?;
        let shifted: Vec<Pt3> = world.iter().map(|p| p - origin).collect();
        let pose = epnp::epnp(&shifted, image, k)?;
        Ok(uncenter(&pose, &origin))
    }
}

fn centroid(points: &[Pt3]) -> Option<Vec3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords);
    Some(sum / points.len() as Real)
}

/// Undo a world-frame shift: `T' = T · translate(-origin)`.
pub fn uncenter(pose: &Iso3, origin: &Vec3) -> Iso3 {
    let mut out = *pose;
    out.translation.vector -= pose.rotation * origin;
    out
}

/// Camera centre in world coordinates, `-Rᵀ t`.
pub fn camera_center(pose: &Iso3) -> Pt3 {
    Pt3::from(-(pose.rotation.inverse() * pose.translation.vector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncenter_is_consistent_with_shifted_points() {
        let pose = vantage_core::synthetic::terrain::pose_from_center(
            &Pt3::new(5.0, -3.0, 2.0),
            &vantage_core::synthetic::terrain::east_facing_rotation(0.2, 0.1, 0.0),
        );
        let origin = Vec3::new(100.0, 200.0, 300.0);
        let p = Pt3::new(150.0, 220.0, 310.0);
        let shifted_pose = {
            let mut t = pose;
            t.translation.vector += pose.rotation * origin;
            t
        };
        let back = uncenter(&shifted_pose, &origin);
        assert!((back.transform_point(&p) - pose.transform_point(&p)).norm() < 1e-9);
        assert!((camera_center(&pose) - Pt3::new(5.0, -3.0, 2.0)).norm() < 1e-9);
    }
}
