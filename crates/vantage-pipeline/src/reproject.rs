//! Forward projection of ground points through a resolved pose.

use nalgebra::{Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use vantage_core::{
    BrownConrady5, Camera, FxFyCxCySkew, Iso3, Pinhole, PinholeCamera, Pt2, Pt3, Real, Vec3,
};
use vantage_geo::ControlPoint;

use crate::pose::CameraPose;

/// Project world points through `T_C_W = (rvec, tvec)`.
///
/// Points on or behind the camera plane give `None`.
pub fn project_points(
    points: &[Pt3],
    intrinsics: &FxFyCxCySkew<Real>,
    distortion: &BrownConrady5<Real>,
    rvec: &Vec3,
    tvec: &Vec3,
) -> Vec<Option<Pt2>> {
    let pose = Iso3::from_parts(
        Translation3::from(*tvec),
        UnitQuaternion::from_scaled_axis(*rvec),
    );
    let camera: PinholeCamera = Camera::new(Pinhole, *distortion, *intrinsics);
    points
        .iter()
        .map(|p| camera.project_point(&pose.transform_point(p)))
        .collect()
}

/// A catalog point drawn over the photograph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    /// Predicted pixel.
    pub pixel: Pt2,
    /// Labelled pixel, when the point was observed.
    pub observed: Option<Pt2>,
}

/// Pixel of one world point under `pose`.
pub fn project_with(pose: &CameraPose, world: &Pt3) -> Option<Pt2> {
    match pose {
        CameraPose::Homography(h) => h.fit.project(world),
        CameraPose::Perspective(p) => project_points(
            std::slice::from_ref(world),
            &p.intrinsics,
            &p.distortion,
            &p.rvec,
            &p.tvec,
        )
        .pop()
        .flatten(),
    }
}

/// Project every catalog point, observed or not, and keep those landing
/// inside a `(width, height)` image.
pub fn overlay(
    pose: &CameraPose,
    points: &[ControlPoint],
    image_size: (Real, Real),
) -> Vec<OverlayPoint> {
    let (w, h) = image_size;
    points
        .iter()
        .filter_map(|cp| {
            let px = project_with(pose, &cp.position)?;
            let inside = (0.0..=w).contains(&px.x) && (0.0..=h).contains(&px.y);
            inside.then(|| OverlayPoint {
                id: cp.id,
                symbol: cp.symbol.clone(),
                name: cp.name.clone(),
                pixel: px,
                observed: cp.pixel,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_behind_camera_is_none() {
        let k = FxFyCxCySkew::from_physical(100.0, (100.0, 100.0), (1000.0, 1000.0));
        let px = project_points(
            &[Pt3::new(0.0, 0.0, 10.0), Pt3::new(0.0, 0.0, -10.0)],
            &k,
            &BrownConrady5::default(),
            &Vec3::zeros(),
            &Vec3::zeros(),
        );
        let centre = px[0].unwrap();
        assert!((centre - Pt2::new(500.0, 500.0)).norm() < 1e-9);
        assert!(px[1].is_none());
    }
}
