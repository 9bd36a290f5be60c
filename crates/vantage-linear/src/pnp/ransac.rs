//! EPnP inside a RANSAC loop, scored by pixel reprojection error.

use vantage_core::{
    ransac_fit, BrownConrady5, Camera, Estimator, FxFyCxCySkew, Iso3, Pinhole, Pt2, Pt3,
    RansacOptions, Real,
};

use super::{PnpError, PnpSolver};

/// Sample size per hypothesis; EPnP is poorly conditioned at its minimum of four.
pub const EPNP_RANSAC_SAMPLES: usize = 6;

#[derive(Clone)]
struct PnpDatum {
    pw: Pt3,
    pi: Pt2,
    k: FxFyCxCySkew<Real>,
}

struct EpnpEst;

impl EpnpEst {
    fn solve(data: &[PnpDatum], indices: &[usize]) -> Option<Iso3> {
        let world: Vec<Pt3> = indices.iter().map(|&i| data[i].pw).collect();
        let image: Vec<Pt2> = indices.iter().map(|&i| data[i].pi).collect();
        PnpSolver::epnp_centered(&world, &image, &data[indices[0]].k).ok()
    }
}

impl Estimator for EpnpEst {
    type Datum = PnpDatum;
    type Model = Iso3;

    const MIN_SAMPLES: usize = EPNP_RANSAC_SAMPLES;

    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
        Self::solve(data, sample_indices)
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        let cam = Camera::new(Pinhole, BrownConrady5::default(), datum.k);
        let pc = model.transform_point(&datum.pw);
        match cam.project_point(&pc) {
            Some(proj) => (proj - datum.pi).norm(),
            None => f64::INFINITY,
        }
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        Self::solve(data, inliers)
    }
}

/// Robust EPnP; pixels must be undistorted.
///
/// Returns the consensus pose and an inlier mask over the inputs.
pub fn epnp_ransac(
    world: &[Pt3],
    image: &[Pt2],
    k: &FxFyCxCySkew<Real>,
    opts: &RansacOptions,
) -> Result<(Iso3, Vec<bool>), PnpError> {
    let n = world.len().min(image.len());
    if n < EPNP_RANSAC_SAMPLES {
        return Err(PnpError::NotEnoughPoints {
            required: EPNP_RANSAC_SAMPLES,
            found: n,
        });
    }
    let data: Vec<PnpDatum> = world[..n]
        .iter()
        .zip(&image[..n])
        .map(|(pw, pi)| PnpDatum {
            pw: *pw,
            pi: *pi,
            k: *k,
        })
        .collect();

    let res = ransac_fit::<EpnpEst>(&data, opts);
    let mask = res.inlier_mask(n);
    match res.model {
        Some(pose) if res.success => Ok((pose, mask)),
        _ => Err(PnpError::NoConsensus),
    }
}
