//! Bearing homography of a candidate camera position.
//!
//! For a camera at `C` and a ground point `P`, let `d = P - C` in
//! (easting, northing, elevation). The *relative bearing* of `P` is
//! `(d.z / d.x, d.y / d.x)`: the direction reordered to (elevation,
//! northing, easting) and divided by its easting component. For a pinhole
//! camera at `C`, bearings and pixels are related by a homography whatever
//! the camera orientation, so a small fit residual means `C` is a plausible
//! station for the photograph.
//!
//! [`fit_bearing_homography`] fits that homography robustly and scores it
//! twice: in pixel space (bearing pushed through `H`) and in bearing space
//! (pixel pulled back through `H⁻¹`).

use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vantage_core::{
    apply_homography, Correspondence, Mat3, Pt2, Pt3, RansacOptions, Real, RobustKernel,
};

use crate::homography::{transfer_error, HomographyError, HomographySolver};

/// Minimum number of usable correspondences for a homography.
pub const MIN_CORRESPONDENCES: usize = 4;

// Easting offsets below this (meters) have no usable bearing.
const MIN_DEPTH: Real = 1e-6;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("need at least {required} usable correspondences, got {found}")]
    InsufficientCorrespondences { required: usize, found: usize },
    #[error("degenerate bearing configuration: {0}")]
    Degenerate(String),
    #[error("no consensus homography within the reprojection threshold")]
    NoConsensus,
}

impl From<HomographyError> for FitError {
    fn from(e: HomographyError) -> Self {
        match e {
            HomographyError::NotEnoughPoints(found) => FitError::InsufficientCorrespondences {
                required: MIN_CORRESPONDENCES,
                found,
            },
            HomographyError::RansacFailed => FitError::NoConsensus,
            other => FitError::Degenerate(other.to_string()),
        }
    }
}

/// Error space that receives the per-outlier penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltySpace {
    /// Added to the bearing-space sum, the metric grid search ranks by.
    Bearing,
    /// Added to the pixel-space sum.
    Pixel,
}

/// How per-point errors are turned into the two scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorModel {
    /// Raw Euclidean errors summed over inliers; every outlier adds the
    /// RANSAC threshold to `penalty_space`.
    Baseline { penalty_space: PenaltySpace },
    /// Huber loss on errors normalized by the extent diagonal of each space
    /// (image for pixels, bearing bounding box for bearings), summed over
    /// every usable point. The Huber threshold is `fraction` of the diagonal.
    Huber { fraction: Real },
}

impl Default for ErrorModel {
    fn default() -> Self {
        ErrorModel::Baseline {
            penalty_space: PenaltySpace::Bearing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BearingFitOptions {
    /// RANSAC settings; `thresh` is the pixel reprojection threshold.
    pub ransac: RansacOptions,
    pub error_model: ErrorModel,
    /// `(width, height)` of the photograph. Inferred from the largest
    /// observed pixel coordinates when absent.
    pub image_size: Option<(Real, Real)>,
}

impl Default for BearingFitOptions {
    fn default() -> Self {
        Self {
            ransac: RansacOptions::default(),
            error_model: ErrorModel::default(),
            image_size: None,
        }
    }
}

impl BearingFitOptions {
    pub fn ransac_threshold(&self) -> Real {
        self.ransac.thresh
    }
}

/// Relative bearing of `world` seen from `camera`, `None` when the point has
/// (almost) no easting offset from the camera.
pub fn relative_bearing(camera: &Pt3, world: &Pt3) -> Option<Pt2> {
    let d = world - camera;
    if d.x.abs() < MIN_DEPTH || !d.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(Pt2::new(d.z / d.x, d.y / d.x))
}

/// A fitted bearing → pixel homography and its scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearingHomography {
    /// Camera position the bearings were taken from.
    pub camera: Pt3,
    /// Bearing → pixel.
    pub h: Mat3,
    /// Pixel → bearing.
    pub h_inv: Mat3,
    /// Inlier flag per input correspondence.
    pub inliers: Vec<bool>,
    /// Pixel-space score.
    pub pixel_error: Real,
    /// Bearing-space score.
    pub bearing_error: Real,
}

impl BearingHomography {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }

    /// Weighted sum of both scores.
    pub fn objective(&self, pixel_weight: Real, bearing_weight: Real) -> Real {
        pixel_weight * self.pixel_error + bearing_weight * self.bearing_error
    }

    /// Pixel of a ground point under this homography.
    pub fn project(&self, world: &Pt3) -> Option<Pt2> {
        let b = relative_bearing(&self.camera, world)?;
        apply_homography(&self.h, &b).filter(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Bearing of a pixel under the inverse homography.
    pub fn unproject(&self, pixel: &Pt2) -> Option<Pt2> {
        apply_homography(&self.h_inv, pixel)
    }

    /// Pixel- and bearing-space errors of one correspondence.
    pub fn point_errors(&self, c: &Correspondence) -> Option<(Real, Real)> {
        let b = relative_bearing(&self.camera, &c.world)?;
        Some(pair_errors(&self.h, &self.h_inv, &b, &c.pixel))
    }
}

fn pair_errors(h: &Mat3, h_inv: &Mat3, bearing: &Pt2, pixel: &Pt2) -> (Real, Real) {
    (
        transfer_error(h, bearing, pixel),
        transfer_error(h_inv, pixel, bearing),
    )
}

fn invert(h: &Mat3) -> Result<Mat3, FitError> {
    h.try_inverse()
        .filter(|m| m.iter().all(|v| v.is_finite()))
        .ok_or_else(|| FitError::Degenerate("homography is not invertible".into()))
}

struct Usable {
    /// Index into the caller's correspondence slice.
    index: Vec<usize>,
    bearings: Vec<Pt2>,
    pixels: Vec<Pt2>,
}

fn usable(correspondences: &[Correspondence], camera: &Pt3, mask: Option<&[bool]>) -> Usable {
    let mut out = Usable {
        index: Vec::with_capacity(correspondences.len()),
        bearings: Vec::with_capacity(correspondences.len()),
        pixels: Vec::with_capacity(correspondences.len()),
    };
    for (i, c) in correspondences.iter().enumerate() {
        if mask.is_some_and(|m| !m.get(i).copied().unwrap_or(false)) {
            continue;
        }
        if let Some(b) = relative_bearing(camera, &c.world) {
            out.index.push(i);
            out.bearings.push(b);
            out.pixels.push(c.pixel);
        }
    }
    out
}

fn diagonal(points: impl Iterator<Item = Pt2>) -> Real {
    let (mut lo, mut hi) = (Pt2::new(Real::MAX, Real::MAX), Pt2::new(Real::MIN, Real::MIN));
    for p in points {
        lo = Pt2::new(lo.x.min(p.x), lo.y.min(p.y));
        hi = Pt2::new(hi.x.max(p.x), hi.y.max(p.y));
    }
    let d = (hi - lo).norm();
    if d.is_finite() && d > Real::EPSILON {
        d
    } else {
        1.0
    }
}

/// Largest observed pixel coordinates, used when the image size is unknown.
pub fn inferred_image_size(correspondences: &[Correspondence]) -> (Real, Real) {
    correspondences.iter().fold((0.0, 0.0), |(w, h), c| {
        (Real::max(w, c.pixel.x), Real::max(h, c.pixel.y))
    })
}

/// Fit the bearing homography for a camera at `camera` and score it.
///
/// Fails with [`FitError::InsufficientCorrespondences`] when fewer than four
/// correspondences have a usable bearing.
pub fn fit_bearing_homography(
    correspondences: &[Correspondence],
    camera: &Pt3,
    opts: &BearingFitOptions,
) -> Result<BearingHomography, FitError> {
    let pts = usable(correspondences, camera, None);
    if pts.bearings.len() < MIN_CORRESPONDENCES {
        return Err(FitError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            found: pts.bearings.len(),
        });
    }

    let (h, local_inliers) =
        HomographySolver::dlt_ransac(&pts.bearings, &pts.pixels, &opts.ransac)?;
    let h_inv = invert(&h)?;

    let mut inliers = vec![false; correspondences.len()];
    for &k in &local_inliers {
        inliers[pts.index[k]] = true;
    }

    let (pixel_error, bearing_error) = match opts.error_model {
        ErrorModel::Baseline { penalty_space } => {
            let (mut px_sum, mut b_sum) = (0.0, 0.0);
            for &k in &local_inliers {
                let (e_px, e_b) = pair_errors(&h, &h_inv, &pts.bearings[k], &pts.pixels[k]);
                px_sum += e_px;
                b_sum += e_b;
            }
            // Unusable bearings count as outliers too.
            let outliers = correspondences.len() - local_inliers.len();
            let penalty = outliers as Real * opts.ransac.thresh;
            match penalty_space {
                PenaltySpace::Bearing => (px_sum, b_sum + penalty),
                PenaltySpace::Pixel => (px_sum + penalty, b_sum),
            }
        }
        ErrorModel::Huber { fraction } => {
            let (w, hgt) = opts
                .image_size
                .unwrap_or_else(|| inferred_image_size(correspondences));
            let image_diag = (w * w + hgt * hgt).sqrt().max(1.0);
            let bearing_diag = diagonal(pts.bearings.iter().copied());
            let kernel = RobustKernel::Huber { delta: fraction };
            let unusable = (correspondences.len() - pts.bearings.len()) as Real;
            let (mut px_sum, mut b_sum) = (kernel.rho(1.0) * unusable, kernel.rho(1.0) * unusable);
            for (b, p) in pts.bearings.iter().zip(&pts.pixels) {
                let (e_px, e_b) = pair_errors(&h, &h_inv, b, p);
                px_sum += kernel.rho(e_px / image_diag);
                b_sum += kernel.rho(e_b / bearing_diag);
            }
            (px_sum, b_sum)
        }
    };

    trace!(
        "camera ({:.1}, {:.1}, {:.1}): {} inliers, pixel {:.3}, bearing {:.5}",
        camera.x,
        camera.y,
        camera.z,
        local_inliers.len(),
        pixel_error,
        bearing_error
    );

    Ok(BearingHomography {
        camera: *camera,
        h,
        h_inv,
        inliers,
        pixel_error,
        bearing_error,
    })
}

/// Plain DLT refit over a fixed inlier set, without RANSAC or penalties.
///
/// Scores are raw error sums over the masked points. Used by local
/// refinement, where the inlier set is frozen while the camera moves.
pub fn fit_frozen(
    correspondences: &[Correspondence],
    camera: &Pt3,
    inliers: &[bool],
) -> Result<BearingHomography, FitError> {
    let pts = usable(correspondences, camera, Some(inliers));
    if pts.bearings.len() < MIN_CORRESPONDENCES {
        return Err(FitError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            found: pts.bearings.len(),
        });
    }
    let h = HomographySolver::dlt(&pts.bearings, &pts.pixels)?;
    let h_inv = invert(&h)?;

    let mut mask = vec![false; correspondences.len()];
    let (mut pixel_error, mut bearing_error) = (0.0, 0.0);
    for (k, &i) in pts.index.iter().enumerate() {
        mask[i] = true;
        let (e_px, e_b) = pair_errors(&h, &h_inv, &pts.bearings[k], &pts.pixels[k]);
        pixel_error += e_px;
        bearing_error += e_b;
    }
    Ok(BearingHomography {
        camera: *camera,
        h,
        h_inv,
        inliers: mask,
        pixel_error,
        bearing_error,
    })
}
