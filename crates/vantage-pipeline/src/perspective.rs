//! Full 6-DoF pose over a grid of plausible plate cameras.
//!
//! For each focal length and plate format the intrinsics follow from the
//! image size; EPnP inside RANSAC gives an initial pose and an inlier set,
//! Levenberg-Marquardt refines the pose on the inliers, and the trial with
//! the most inliers and then the lowest mean reprojection error wins.

use std::cmp::Ordering;

use log::{debug, info, warn};
use vantage_core::{
    BrownConrady5, Camera, Correspondence, DistortionModel, FxFyCxCySkew, IntrinsicsModel, Iso3,
    Pinhole, PinholeCamera, Pt2, Pt3, Real, ReprojectionStats,
};
use vantage_linear::{camera_center, epnp_ransac, PnpSolver, EPNP_RANSAC_SAMPLES};
use vantage_optim::{refine_pose, reprojection_errors};

use crate::config::PerspectiveSearchOptions;
use crate::pose::IntrinsicsTrial;
use crate::PoseError;

#[derive(Debug, Clone)]
pub struct PerspectiveOutcome {
    /// `T_C_W`.
    pub pose: Iso3,
    pub position: Pt3,
    pub camera: PinholeCamera,
    pub focal_mm: Real,
    pub sensor_mm: (Real, Real),
    pub image_size: (Real, Real),
    /// Mean reprojection error over the inliers.
    pub mean_error: Real,
    /// Control points that support `pose`.
    pub inliers: Vec<bool>,
    pub trials: Vec<IntrinsicsTrial>,
}

fn undistort_pixels(camera: &PinholeCamera, pixels: &[Pt2]) -> Vec<Pt2> {
    if camera.dist.is_zero() {
        return pixels.to_vec();
    }
    pixels
        .iter()
        .map(|px| {
            let n = camera.k.pixel_to_normalized(px);
            let u = camera.dist.undistort(&n.coords);
            camera.k.normalized_to_pixel(&Pt2::from(u))
        })
        .collect()
}

struct TrialFit {
    pose: Iso3,
    mean: Real,
    inliers: Vec<bool>,
}

impl TrialFit {
    fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&m| m).count()
    }

    /// More inliers first, then lower mean error.
    fn beats(&self, other: &TrialFit) -> bool {
        match self.inlier_count().cmp(&other.inlier_count()) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.mean < other.mean,
        }
    }
}

fn select<T: Copy>(items: &[T], mask: &[bool]) -> Vec<T> {
    items
        .iter()
        .zip(mask)
        .filter(|(_, &m)| m)
        .map(|(x, _)| *x)
        .collect()
}

fn solve_trial(
    world: &[Pt3],
    pixels: &[Pt2],
    camera: &PinholeCamera,
    opts: &PerspectiveSearchOptions,
) -> Result<TrialFit, String> {
    let undistorted = undistort_pixels(camera, pixels);
    let (initial, inliers) = if world.len() >= EPNP_RANSAC_SAMPLES {
        epnp_ransac(world, &undistorted, &camera.k, &opts.ransac)
            .map_err(|e| format!("robust EPnP failed: {e}"))?
    } else {
        let pose = PnpSolver::epnp_centered(world, &undistorted, &camera.k)
            .map_err(|e| format!("EPnP failed: {e}"))?;
        (pose, vec![true; world.len()])
    };
    let (world_in, pixels_in) = (select(world, &inliers), select(pixels, &inliers));

    match refine_pose(&world_in, &pixels_in, camera, &initial, &opts.refine) {
        Ok(report) => {
            if !report.converged {
                debug!("pose refinement stopped early ({} evaluations)", report.evaluations);
            }
            Ok(TrialFit {
                pose: report.pose,
                mean: report.stats.mean,
                inliers,
            })
        }
        Err(e) => {
            warn!("pose refinement failed, keeping EPnP pose: {e}");
            let errors = reprojection_errors(&world_in, &pixels_in, camera, &initial);
            let stats = ReprojectionStats::from_errors(&errors)
                .ok_or_else(|| "no reprojection errors".to_string())?;
            Ok(TrialFit {
                pose: initial,
                mean: stats.mean,
                inliers,
            })
        }
    }
}

/// Try every intrinsics combination and keep the best-supported pose.
///
/// Trials are ranked by inlier count, then by mean reprojection error over
/// their inliers. `image_size` defaults to the largest observed pixel
/// coordinates.
pub fn perspective_search(
    correspondences: &[Correspondence],
    image_size: Option<(Real, Real)>,
    opts: &PerspectiveSearchOptions,
) -> Result<PerspectiveOutcome, PoseError> {
    PoseError::require_correspondences(correspondences.len())?;
    if opts.focal_lengths_mm.is_empty() || opts.sensor_sizes_mm.is_empty() {
        return Err(PoseError::InvalidConfig(
            "perspective search needs at least one focal length and plate size".into(),
        ));
    }

    let image_size =
        image_size.unwrap_or_else(|| vantage_linear::inferred_image_size(correspondences));
    let world: Vec<Pt3> = correspondences.iter().map(|c| c.world).collect();
    let pixels: Vec<Pt2> = correspondences.iter().map(|c| c.pixel).collect();
    let distortion = BrownConrady5::from_coefficients(opts.distortion);

    let mut trials = Vec::new();
    let mut best: Option<(TrialFit, PinholeCamera, Real, (Real, Real))> = None;
    for &focal_mm in &opts.focal_lengths_mm {
        for &sensor_mm in &opts.sensor_sizes_mm {
            let k = FxFyCxCySkew::from_physical(focal_mm, sensor_mm, image_size);
            let mut trial = IntrinsicsTrial {
                focal_mm,
                sensor_mm,
                mean_error: None,
                inlier_count: 0,
            };
            if !k.is_valid() {
                warn!(
                    "skipping {focal_mm} mm on {sensor_mm:?} mm: invalid intrinsics for image {:?}",
                    image_size
                );
                trials.push(trial);
                continue;
            }
            let camera: PinholeCamera = Camera::new(Pinhole, distortion, k);
            match solve_trial(&world, &pixels, &camera, opts) {
                Ok(fit) if fit.mean.is_finite() => {
                    debug!(
                        "{focal_mm} mm on {sensor_mm:?} mm: {} inliers, mean error {:.3} px",
                        fit.inlier_count(),
                        fit.mean
                    );
                    trial.mean_error = Some(fit.mean);
                    trial.inlier_count = fit.inlier_count();
                    if best.as_ref().map_or(true, |(b, ..)| fit.beats(b)) {
                        best = Some((fit, camera, focal_mm, sensor_mm));
                    }
                }
                Ok(_) => warn!("{focal_mm} mm on {sensor_mm:?} mm: non-finite error"),
                Err(e) => warn!("{focal_mm} mm on {sensor_mm:?} mm: {e}"),
            }
            trials.push(trial);
        }
    }

    let (fit, camera, focal_mm, sensor_mm) = best.ok_or_else(|| {
        PoseError::NoViablePose(format!("all {} intrinsics trials failed", trials.len()))
    })?;
    let position = camera_center(&fit.pose);
    info!(
        "perspective search: {focal_mm} mm on {sensor_mm:?} mm, {} of {} inliers, \
         mean error {:.3} px, origin ({:.2}, {:.2}, {:.2})",
        fit.inlier_count(),
        world.len(),
        fit.mean,
        position.x,
        position.y,
        position.z
    );
    Ok(PerspectiveOutcome {
        pose: fit.pose,
        position,
        camera,
        focal_mm,
        sensor_mm,
        image_size,
        mean_error: fit.mean,
        inliers: fit.inliers,
        trials,
    })
}
