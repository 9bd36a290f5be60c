//! EPnP (Lepetit et al.) with a single null-space vector.
//!
//! Four control points come from the centroid and principal axes of the
//! world points; their camera-frame positions are read off the smallest
//! right singular vector of the `2n × 12` measurement matrix and rescaled to
//! the world inter-control distances.

use super::{pose_utils::pose_from_points, PnpError};
use nalgebra::{linalg::SymmetricEigen, DMatrix};
use vantage_core::{FxFyCxCySkew, Iso3, Mat3, Pt2, Pt3, Real, Vec3};

pub(super) fn epnp(world: &[Pt3], image: &[Pt2], k: &FxFyCxCySkew<Real>) -> Result<Iso3, PnpError> {
    let n = world.len();
    if n < 4 || image.len() != n {
        return Err(PnpError::NotEnoughPoints {
            required: 4,
            found: n.min(image.len()),
        });
    }

    let k_inv = k.k_matrix().try_inverse().ok_or(PnpError::SingularIntrinsics)?;
    let img_norm: Vec<Pt2> = image
        .iter()
        .map(|pi| {
            let v = k_inv * Vec3::new(pi.x, pi.y, 1.0);
            Pt2::new(v.x / v.z, v.y / v.z)
        })
        .collect();

    let centroid = world.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / n as Real;
    let mut cov = Mat3::zeros();
    for p in world {
        let d = p.coords - centroid;
        cov += d * d.transpose();
    }
    cov /= n as Real;

    let eig = SymmetricEigen::new(cov);
    let mut control_w = [centroid; 4];
    for i in 0..3 {
        let scale = eig.eigenvalues[i].abs().sqrt();
        control_w[i + 1] = centroid + eig.eigenvectors.column(i).into_owned() * scale;
    }

    let basis = Mat3::from_columns(&[
        control_w[1] - control_w[0],
        control_w[2] - control_w[0],
        control_w[3] - control_w[0],
    ]);
    let basis_inv = basis.try_inverse().ok_or(PnpError::DegeneratePoints)?;

    let alphas: Vec<[Real; 4]> = world
        .iter()
        .map(|p| {
            let c = basis_inv * (p.coords - control_w[0]);
            [1.0 - c.x - c.y - c.z, c.x, c.y, c.z]
        })
        .collect();

    // Zero rows keep the SVD square enough to expose the null space.
    let rows = (2 * n).max(12);
    let mut m = DMatrix::<Real>::zeros(rows, 12);
    for (i, (a, uv)) in alphas.iter().zip(&img_norm).enumerate() {
        let (r0, r1) = (2 * i, 2 * i + 1);
        for (j, &alpha) in a.iter().enumerate() {
            let c = 3 * j;
            m[(r0, c)] = alpha;
            m[(r0, c + 2)] = -uv.x * alpha;
            m[(r1, c + 1)] = alpha;
            m[(r1, c + 2)] = -uv.y * alpha;
        }
    }

    let svd = m.svd(false, true);
    let v_t = svd.v_t.ok_or(PnpError::SvdFailed)?;
    let (min_idx, _) = svd.singular_values.argmin();
    let sol = v_t.row(min_idx);

    let mut control_c = [Vec3::zeros(); 4];
    for (j, cc) in control_c.iter_mut().enumerate() {
        *cc = Vec3::new(sol[3 * j], sol[3 * j + 1], sol[3 * j + 2]);
    }

    let (mut sum_w, mut sum_c) = (0.0, 0.0);
    for i in 0..4 {
        for j in (i + 1)..4 {
            sum_w += (control_w[i] - control_w[j]).norm_squared();
            sum_c += (control_c[i] - control_c[j]).norm_squared();
        }
    }
    if sum_c <= Real::EPSILON {
        return Err(PnpError::DegeneratePoints);
    }
    let scale = (sum_w / sum_c).sqrt();

    let mut camera_pts: Vec<Vec3> = alphas
        .iter()
        .map(|a| {
            a.iter()
                .zip(&control_c)
                .fold(Vec3::zeros(), |acc, (&alpha, cc)| acc + cc * alpha)
                * scale
        })
        .collect();

    // The null vector has no sign; points must lie in front of the camera.
    let mean_depth = camera_pts.iter().map(|p| p.z).sum::<Real>() / n as Real;
    if mean_depth < 0.0 {
        for p in &mut camera_pts {
            *p = -*p;
        }
    }

    pose_from_points(world, &camera_pts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_core::{Camera, NoDistortion, Pinhole};
    use nalgebra::{Isometry3, Rotation3, Translation3};

    #[test]
    fn epnp_recovers_pose_synthetic() {
        let k = FxFyCxCySkew {
            fx: 800.0,
            fy: 780.0,
            cx: 640.0,
            cy: 360.0,
            skew: 0.0,
        };
        let cam = Camera::new(Pinhole, NoDistortion, k);

        let rot = Rotation3::from_euler_angles(-0.1, 0.05, 0.2);
        let iso_gt = Isometry3::from_parts(Translation3::new(0.1, -0.05, 1.2), rot.into());

        let mut world = Vec::new();
        let mut image = Vec::new();
        for z in 0..2 {
            for y in 0..3 {
                for x in 0..4 {
                    let pw = Pt3::new(x as Real * 0.1, y as Real * 0.1, 0.6 + z as Real * 0.1);
                    let uv = cam.project_point(&iso_gt.transform_point(&pw)).unwrap();
                    world.push(pw);
                    image.push(uv);
                }
            }
        }

        let est = epnp(&world, &image, &k).unwrap();
        let dt = (est.translation.vector - iso_gt.translation.vector).norm();
        let ang = vantage_core::rotation_angle(
            &est.rotation.to_rotation_matrix(),
            &iso_gt.rotation.to_rotation_matrix(),
        );
        assert!(dt < 1e-3, "translation error too large: {dt}");
        assert!(ang < 1e-3, "rotation error too large: {ang}");
    }

    #[test]
    fn three_points_are_rejected() {
        let k = FxFyCxCySkew {
            fx: 800.0,
            fy: 800.0,
            cx: 0.0,
            cy: 0.0,
            skew: 0.0,
        };
        let world = [Pt3::origin(); 3];
        let image = [Pt2::origin(); 3];
        assert!(matches!(
            epnp(&world, &image, &k),
            Err(PnpError::NotEnoughPoints { found: 3, .. })
        ));
    }
}
