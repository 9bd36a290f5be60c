//! Reprojection-error refinement of a camera pose.
//!
//! Parameters are an axis-angle rotation and a translation (`T_C_W`). World
//! points are shifted to their centroid while solving so the Jacobian stays
//! well conditioned for projected (UTM) coordinates. The residual is generic
//! over [`RealField`] and the Jacobian comes from `num-dual` forward-mode
//! autodiff over the six pose parameters.

use log::debug;
use nalgebra::{DMatrix, DVector, RealField, SVector, Translation3, UnitQuaternion, Vector3};
use num_dual::{jacobian, DualSVec64};
use vantage_core::{Iso3, PinholeCamera, Pt2, Pt3, Real, ReprojectionStats, Vec3};

use crate::{LmBackend, NllsProblem, NllsSolverBackend, OptimError, SolveOptions};

// Points closer than this to the camera plane are projected as if at it.
const MIN_DEPTH: Real = 1e-6;

// Below this squared angle the rotation is linearized.
const SMALL_ANGLE_SQ: Real = 1e-12;

const POSE_DIM: usize = 6;

#[derive(Debug, Clone)]
pub struct PoseRefineReport {
    /// Refined `T_C_W` in the caller's world frame.
    pub pose: Iso3,
    pub stats: ReprojectionStats,
    pub converged: bool,
    pub evaluations: usize,
}

struct PoseProblem<'a> {
    world: Vec<Pt3>,
    pixels: &'a [Pt2],
    camera: &'a PinholeCamera,
}

fn pose_from_params(x: &DVector<Real>) -> Iso3 {
    let rot = UnitQuaternion::from_scaled_axis(Vec3::new(x[0], x[1], x[2]));
    Iso3::from_parts(Translation3::new(x[3], x[4], x[5]), rot)
}

fn params_from_pose(pose: &Iso3) -> DVector<Real> {
    let r = pose.rotation.scaled_axis();
    let t = pose.translation.vector;
    DVector::from_vec(vec![r.x, r.y, r.z, t.x, t.y, t.z])
}

fn real<T: RealField>(v: Real) -> T {
    nalgebra::convert(v)
}

/// Rodrigues rotation of `p` by the axis-angle vector `r`.
fn rotate<T: RealField>(r: &Vector3<T>, p: &Vector3<T>) -> Vector3<T> {
    let theta2 = r.norm_squared();
    if theta2 < real(SMALL_ANGLE_SQ) {
        return p + r.cross(p);
    }
    let theta = theta2.sqrt();
    let k = r / theta.clone();
    let (sin, cos) = theta.sin_cos();
    let kp = k.dot(p);
    p * cos.clone() + k.cross(p) * sin + k * (kp * (T::one() - cos))
}

/// Pixel of a camera-frame point, clamping depth to stay differentiable.
fn project_generic<T: RealField>(camera: &PinholeCamera, pc: &Vector3<T>) -> (T, T) {
    let min_depth: T = real(MIN_DEPTH);
    let z = if pc.z < min_depth { min_depth } else { pc.z.clone() };
    let x = pc.x.clone() / z.clone();
    let y = pc.y.clone() / z;

    let d = &camera.dist;
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();
    let radial = T::one() + r2.clone() * real(d.k1) + r4 * real(d.k2) + r6 * real(d.k3);
    let two: T = real(2.0);
    let xy = x.clone() * y.clone();
    let xd = x.clone() * radial.clone()
        + two.clone() * xy.clone() * real(d.p1)
        + (r2.clone() + two.clone() * x.clone() * x) * real(d.p2);
    let yd = y.clone() * radial
        + (r2 + two.clone() * y.clone() * y) * real(d.p1)
        + two * xy * real(d.p2);

    let k = &camera.k;
    let u = xd * real(k.fx) + yd.clone() * real(k.skew) + real(k.cx);
    let v = yd * real(k.fy) + real(k.cy);
    (u, v)
}

impl PoseProblem<'_> {
    fn residuals_generic<T: RealField>(&self, x: &[T]) -> DVector<T> {
        let r = Vector3::new(x[0].clone(), x[1].clone(), x[2].clone());
        let t = Vector3::new(x[3].clone(), x[4].clone(), x[5].clone());
        let mut out = DVector::from_element(2 * self.world.len(), T::zero());
        for (i, (pw, px)) in self.world.iter().zip(self.pixels).enumerate() {
            let p = Vector3::new(real(pw.x), real(pw.y), real(pw.z));
            let (u, v) = project_generic(self.camera, &(rotate(&r, &p) + t.clone()));
            out[2 * i] = u - real(px.x);
            out[2 * i + 1] = v - real(px.y);
        }
        out
    }
}

impl NllsProblem for PoseProblem<'_> {
    fn num_params(&self) -> usize {
        POSE_DIM
    }

    fn num_residuals(&self) -> usize {
        2 * self.world.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        self.residuals_generic(x.as_slice())
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let p0 = SVector::<Real, POSE_DIM>::from_column_slice(x.as_slice());
        let (_, j) = jacobian(
            |p: SVector<DualSVec64<POSE_DIM>, POSE_DIM>| self.residuals_generic(p.as_slice()),
            p0,
        );
        DMatrix::from_iterator(j.nrows(), POSE_DIM, j.iter().copied())
    }
}

/// Per-point reprojection errors of `pose`; points behind the camera are
/// measured at the clamped depth.
pub fn reprojection_errors(
    world: &[Pt3],
    pixels: &[Pt2],
    camera: &PinholeCamera,
    pose: &Iso3,
) -> Vec<Real> {
    world
        .iter()
        .zip(pixels)
        .map(|(pw, px)| {
            let pc = pose.transform_point(pw);
            let (u, v) = project_generic(camera, &pc.coords);
            (Pt2::new(u, v) - px).norm()
        })
        .collect()
}

/// Refine `initial` (`T_C_W`) by minimizing pixel reprojection error.
pub fn refine_pose(
    world: &[Pt3],
    pixels: &[Pt2],
    camera: &PinholeCamera,
    initial: &Iso3,
    opts: &SolveOptions,
) -> Result<PoseRefineReport, OptimError> {
    let n = world.len().min(pixels.len());
    if n < 3 {
        return Err(OptimError::NotEnoughResiduals {
            required: 6,
            found: 2 * n,
        });
    }

    let origin = world[..n].iter().fold(Vec3::zeros(), |a, p| a + p.coords) / n as Real;
    let problem = PoseProblem {
        world: world[..n].iter().map(|p| p - origin).collect(),
        pixels: &pixels[..n],
        camera,
    };

    // Express the initial pose in the centred frame.
    let mut centred = *initial;
    centred.translation.vector += initial.rotation * origin;

    let (x, report) = LmBackend.solve(&problem, params_from_pose(&centred), opts);
    if !x.iter().all(|v| v.is_finite()) {
        return Err(OptimError::NonConvergence(report.termination));
    }
    let mut pose = pose_from_params(&x);
    pose.translation.vector -= pose.rotation * origin;

    let errors = reprojection_errors(world, pixels, camera, &pose);
    let stats = ReprojectionStats::from_errors(&errors)
        .ok_or_else(|| OptimError::NonConvergence("no reprojection errors".into()))?;
    debug!(
        "pose refinement: mean {:.3} px after {} evaluations ({})",
        stats.mean, report.iterations, report.termination
    );
    Ok(PoseRefineReport {
        pose,
        stats,
        converged: report.converged,
        evaluations: report.iterations,
    })
}
