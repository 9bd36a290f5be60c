//! Discrete search over catalogued camera stations.

use log::{debug, info};
use vantage_core::{Correspondence, Real};
use vantage_geo::CandidateCameraLocation;
use vantage_linear::{fit_bearing_homography, BearingFitOptions, BearingHomography};

use crate::config::GridSearchOptions;
use crate::pose::{CandidateScore, CandidateStatus};
use crate::PoseError;

#[derive(Debug, Clone)]
pub struct GridSearchOutcome {
    /// Catalog index of the chosen candidate.
    pub best_candidate: usize,
    pub fit: BearingHomography,
    /// One row per candidate, in catalog order.
    pub scores: Vec<CandidateScore>,
}

/// Fit every eligible candidate and pick the lowest bearing-space error.
///
/// Ties keep the first candidate. Skipped and failed candidates stay in the
/// score table with the sentinel error.
pub fn grid_search(
    correspondences: &[Correspondence],
    candidates: &[CandidateCameraLocation],
    fit_opts: &BearingFitOptions,
    opts: &GridSearchOptions,
) -> Result<GridSearchOutcome, PoseError> {
    PoseError::require_correspondences(correspondences.len())?;

    let sentinel = |c: &CandidateCameraLocation, status| CandidateScore {
        index: c.index,
        grid_code: c.grid_code,
        position: c.position,
        pixel_error: opts.sentinel_error,
        bearing_error: opts.sentinel_error,
        inliers: 0,
        status,
    };

    let mut scores = Vec::with_capacity(candidates.len());
    let mut best: Option<(usize, Real, BearingHomography)> = None;
    for c in candidates {
        if c.grid_code < opts.min_grid_code {
            scores.push(sentinel(c, CandidateStatus::BelowMinGridCode));
            continue;
        }
        let fit = match fit_bearing_homography(correspondences, &c.position, fit_opts) {
            Ok(fit) => fit,
            Err(e) => {
                debug!("candidate {} skipped: {e}", c.index);
                scores.push(sentinel(c, CandidateStatus::FitFailed));
                continue;
            }
        };
        scores.push(CandidateScore {
            index: c.index,
            grid_code: c.grid_code,
            position: c.position,
            pixel_error: fit.pixel_error,
            bearing_error: fit.bearing_error,
            inliers: fit.inlier_count(),
            status: CandidateStatus::Scored,
        });
        if best.as_ref().map_or(true, |(_, e, _)| fit.bearing_error < *e) {
            best = Some((c.index, fit.bearing_error, fit));
        }
    }

    let (best_candidate, error, fit) = best.ok_or_else(|| {
        PoseError::NoViablePose(format!(
            "none of {} candidates produced a homography",
            candidates.len()
        ))
    })?;
    info!(
        "grid search: candidate {best_candidate} wins with bearing error {error:.6} ({} inliers)",
        fit.inlier_count()
    );
    Ok(GridSearchOutcome {
        best_candidate,
        fit,
        scores,
    })
}
