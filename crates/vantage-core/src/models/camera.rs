use nalgebra::{Point2, Point3, RealField, Vector3};
use serde::{Deserialize, Serialize};

use super::{DistortionModel, IntrinsicsModel, ProjectionModel};

/// A camera ray represented by its intersection with the z = 1 plane.
#[derive(Clone, Copy, Debug)]
pub struct Ray<S: RealField + Copy> {
    /// Point on the z = 1 plane in camera coordinates.
    pub point: Vector3<S>,
}

/// A composable camera model: projection -> distortion -> intrinsics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Camera<S, P, D, K>
where
    S: RealField + Copy,
    P: ProjectionModel<S>,
    D: DistortionModel<S>,
    K: IntrinsicsModel<S>,
{
    /// Projection model (e.g. pinhole).
    pub proj: P,
    /// Distortion model (e.g. Brown-Conrady).
    pub dist: D,
    /// Intrinsics model (K).
    pub k: K,
    #[serde(skip)]
    _phantom: core::marker::PhantomData<S>,
}

impl<S, P, D, K> Camera<S, P, D, K>
where
    S: RealField + Copy,
    P: ProjectionModel<S>,
    D: DistortionModel<S>,
    K: IntrinsicsModel<S>,
{
    /// Build a camera from its component models.
    pub fn new(proj: P, dist: D, k: K) -> Self {
        Self {
            proj,
            dist,
            k,
            _phantom: core::marker::PhantomData,
        }
    }

    /// Project a 3D point in camera coordinates into pixel coordinates.
    ///
    /// Returns `None` if the point is behind the camera or not projectable.
    pub fn project_point_c(&self, p_c: &Vector3<S>) -> Option<Point2<S>> {
        let n_u = self.proj.project_dir(p_c)?;
        let n_d = self.dist.distort(&n_u);
        Some(self.k.normalized_to_pixel(&Point2::from(n_d)))
    }

    /// Convenience wrapper around [`Camera::project_point_c`].
    pub fn project_point(&self, p_c: &Point3<S>) -> Option<Point2<S>> {
        self.project_point_c(&p_c.coords)
    }

    /// Backproject a pixel to a point on the z = 1 plane in camera coordinates.
    pub fn backproject_pixel(&self, px: &Point2<S>) -> Ray<S> {
        let n_d = self.k.pixel_to_normalized(px);
        let n_u = self.dist.undistort(&n_d.coords);
        let dir = self.proj.unproject_dir(&n_u);
        debug_assert!(dir.z != S::zero());
        Ray {
            point: dir / dir.z,
        }
    }
}
