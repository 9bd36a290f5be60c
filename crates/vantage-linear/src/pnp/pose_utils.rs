use super::PnpError;
use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion};
use vantage_core::{Iso3, Mat3, Pt3, Real, Vec3};

/// Rigid transform aligning `world` onto `camera` (Kabsch), as `T_C_W`.
pub(super) fn pose_from_points(world: &[Pt3], camera: &[Vec3]) -> Result<Iso3, PnpError> {
    if world.len() != camera.len() || world.len() < 3 {
        return Err(PnpError::DegeneratePoints);
    }

    let n = world.len() as Real;
    let (c_w, c_c) = world
        .iter()
        .zip(camera)
        .fold((Vec3::zeros(), Vec3::zeros()), |(aw, ac), (pw, pc)| {
            (aw + pw.coords, ac + pc)
        });
    let (c_w, c_c) = (c_w / n, c_c / n);

    let mut h = Mat3::zeros();
    for (pw, pc) in world.iter().zip(camera) {
        h += (pc - c_c) * (pw.coords - c_w).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u.ok_or(PnpError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(PnpError::SvdFailed)?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fix = u;
        u_fix.column_mut(2).neg_mut();
        r = u_fix * v_t;
    }

    let t = c_c - r * c_w;
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    Ok(Isometry3::from_parts(Translation3::from(t), rot))
}
