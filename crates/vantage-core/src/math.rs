//! Type aliases and small geometric helpers.
//!
//! Every crate in the workspace works in `f64`; metric positions are UTM
//! easting/northing/elevation in meters.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point2, Point3, Rotation3, Vector2, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;
/// 3D rotation matrix using [`Real`].
pub type Rot3 = Rotation3<Real>;

/// Convert a 2D point in Euclidean coordinates into homogeneous coordinates.
pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Convert a 3D homogeneous vector back to a 2D point.
///
/// Returns `None` when the homogeneous scale is (numerically) zero, i.e. the
/// point maps to infinity.
pub fn from_homogeneous(v: &Vec3) -> Option<Pt2> {
    if v.z.abs() <= Real::EPSILON * v.xy().norm().max(1.0) {
        return None;
    }
    Some(Pt2::new(v.x / v.z, v.y / v.z))
}

/// Apply a 3×3 projective transform to a 2D point.
pub fn apply_homography(h: &Mat3, p: &Pt2) -> Option<Pt2> {
    from_homogeneous(&(h * to_homogeneous(p)))
}

/// Geodesic angle (radians) between two rotations.
pub fn rotation_angle(a: &Rot3, b: &Rot3) -> Real {
    let diff = a.transpose() * b;
    let cos_theta = ((diff.matrix().trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
    cos_theta.acos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homogeneous_roundtrip() {
        let p = Pt2::new(3.5, -2.0);
        let back = from_homogeneous(&(to_homogeneous(&p) * 4.0)).unwrap();
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn point_at_infinity_is_rejected() {
        assert!(from_homogeneous(&Vec3::new(1.0, 2.0, 0.0)).is_none());
    }

    #[test]
    fn rotation_angle_of_known_yaw() {
        let a = Rot3::identity();
        let b = Rot3::from_euler_angles(0.0, 0.0, 0.25);
        assert!((rotation_angle(&a, &b) - 0.25).abs() < 1e-12);
    }
}
