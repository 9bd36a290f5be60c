//! Homography estimation.
//!
//! Normalized Direct Linear Transform and a RANSAC wrapper. The homography
//! `H` maps **source points** to **target points**: `x' ~ H x`. Pose search
//! uses bearing coordinates as the source and photograph pixels as the
//! target.

use nalgebra::DMatrix;
use thiserror::Error;
use vantage_core::{apply_homography, ransac_fit, Estimator, Mat3, Pt2, RansacOptions};

use crate::math::normalize_points_2d;

#[derive(Debug, Error)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("source and target point counts differ ({0} vs {1})")]
    LengthMismatch(usize, usize),
    #[error("degenerate point configuration")]
    Degenerate,
    #[error("svd failed")]
    SvdFailed,
    #[error("ransac failed to find a consensus homography")]
    RansacFailed,
}

/// Namespace for homography estimators.
#[derive(Debug, Clone, Copy)]
pub struct HomographySolver;

fn check_inputs(src: &[Pt2], dst: &[Pt2]) -> Result<(), HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch(src.len(), dst.len()));
    }
    if src.len() < 4 {
        return Err(HomographyError::NotEnoughPoints(src.len()));
    }
    Ok(())
}

/// Euclidean transfer error `|dst - H src|`; infinite if `src` maps to infinity.
pub fn transfer_error(h: &Mat3, src: &Pt2, dst: &Pt2) -> f64 {
    apply_homography(h, src).map_or(f64::INFINITY, |p| (p - dst).norm())
}

impl HomographySolver {
    /// Estimate `H` with `dst ~ H src` by normalized DLT.
    ///
    /// Solves `A h = 0` via SVD on Hartley-normalized points. The result is
    /// scaled so that `H[2,2] == 1` when that entry is not ~0.
    pub fn dlt(src: &[Pt2], dst: &[Pt2]) -> Result<Mat3, HomographyError> {
        check_inputs(src, dst)?;
        let n = src.len();

        let (src_n, t_src) = normalize_points_2d(src).ok_or(HomographyError::Degenerate)?;
        let (dst_n, t_dst) = normalize_points_2d(dst).ok_or(HomographyError::Degenerate)?;

        // Pad to 9 rows so the SVD always exposes a full V^T.
        let rows = (2 * n).max(9);
        let mut a = DMatrix::<f64>::zeros(rows, 9);
        for (i, (ps, pd)) in src_n.iter().zip(&dst_n).enumerate() {
            let (x, y) = (ps.x, ps.y);
            let (u, v) = (pd.x, pd.y);
            let r0 = 2 * i;
            let r1 = r0 + 1;

            a[(r0, 0)] = -x;
            a[(r0, 1)] = -y;
            a[(r0, 2)] = -1.0;
            a[(r0, 6)] = u * x;
            a[(r0, 7)] = u * y;
            a[(r0, 8)] = u;

            a[(r1, 3)] = -x;
            a[(r1, 4)] = -y;
            a[(r1, 5)] = -1.0;
            a[(r1, 6)] = v * x;
            a[(r1, 7)] = v * y;
            a[(r1, 8)] = v;
        }

        let svd = a.svd(false, true);
        let v_t = svd.v_t.ok_or(HomographyError::SvdFailed)?;
        let (min_idx, _) = svd.singular_values.argmin();
        let h_vec = v_t.row(min_idx);

        let h_norm = Mat3::from_fn(|r, c| h_vec[3 * r + c]);
        let t_dst_inv = t_dst.try_inverse().ok_or(HomographyError::Degenerate)?;
        let mut h = t_dst_inv * h_norm * t_src;

        let scale = h[(2, 2)];
        if scale.abs() > f64::EPSILON {
            h /= scale;
        }
        if h.iter().any(|v| !v.is_finite()) {
            return Err(HomographyError::Degenerate);
        }
        Ok(h)
    }

    /// Estimate a homography with DLT inside a RANSAC loop.
    ///
    /// The residual is the transfer error in target units (pixels for pose
    /// search). Returns the model refit on its inliers and the ascending
    /// inlier indices.
    pub fn dlt_ransac(
        src: &[Pt2],
        dst: &[Pt2],
        opts: &RansacOptions,
    ) -> Result<(Mat3, Vec<usize>), HomographyError> {
        check_inputs(src, dst)?;

        let data: Vec<(Pt2, Pt2)> = src.iter().copied().zip(dst.iter().copied()).collect();
        let res = ransac_fit::<HomographyEstimator>(&data, opts);
        match res.model {
            Some(h) if res.success => Ok((h, res.inliers)),
            _ => Err(HomographyError::RansacFailed),
        }
    }
}

struct HomographyEstimator;

impl HomographyEstimator {
    fn fit_subset(data: &[(Pt2, Pt2)], indices: &[usize]) -> Option<Mat3> {
        let (src, dst): (Vec<Pt2>, Vec<Pt2>) = indices.iter().map(|&i| data[i]).unzip();
        HomographySolver::dlt(&src, &dst).ok()
    }
}

impl Estimator for HomographyEstimator {
    type Datum = (Pt2, Pt2);
    type Model = Mat3;

    const MIN_SAMPLES: usize = 4;

    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
        Self::fit_subset(data, sample_indices)
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        transfer_error(model, &datum.0, &datum.1)
    }

    /// Any three collinear source points make the minimal sample degenerate.
    fn is_degenerate(data: &[Self::Datum], sample_indices: &[usize]) -> bool {
        let pts: Vec<Pt2> = sample_indices.iter().map(|&i| data[i].0).collect();
        let scale = pts
            .iter()
            .flat_map(|p| [p.x.abs(), p.y.abs()])
            .fold(0.0_f64, f64::max)
            .max(1e-12);
        for i in 0..pts.len() {
            for j in (i + 1)..pts.len() {
                for k in (j + 1)..pts.len() {
                    let (a, b, c) = (pts[i], pts[j], pts[k]);
                    let area = (b - a).perp(&(c - a));
                    if area.abs() < 1e-9 * scale * scale {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        Self::fit_subset(data, inliers)
    }
}
