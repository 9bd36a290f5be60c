//! Multi-start continuous search for the camera position.
//!
//! Starts are the initial position plus a Latin hypercube sample of the
//! search box. Each start runs differential evolution over the whole box
//! (the start injected into the population), then Levenberg-Marquardt on
//! the component residuals of the inlier set found by the global stage.

use log::{debug, info, warn};
use nalgebra::DVector;
use rand::{rngs::StdRng, SeedableRng};
use vantage_core::{apply_homography, Correspondence, Pt3, Real};
use vantage_linear::{
    fit_bearing_homography, fit_frozen, relative_bearing, BearingFitOptions, BearingHomography,
};
use vantage_optim::{
    differential_evolution, latin_hypercube, refine_position, sampling::scale_to_bounds, DeOptions,
};

use crate::config::{ContinuousSearchOptions, ObjectiveWeights};
use crate::pose::SeedOutcome;
use crate::PoseError;

#[derive(Debug, Clone)]
pub struct ContinuousOutcome {
    pub position: Pt3,
    pub fit: BearingHomography,
    /// Weighted objective at `position`.
    pub objective: Real,
    pub seeds: Vec<SeedOutcome>,
}

fn search_box(center: &Pt3, opts: &ContinuousSearchOptions) -> [(Real, Real); 3] {
    let (h, v) = (opts.horizontal_radius, opts.vertical_radius);
    [
        (center.x - h, center.x + h),
        (center.y - h, center.y + h),
        (center.z - v, center.z + v),
    ]
}

/// The initial position followed by `seeds - 1` Latin hypercube starts.
pub fn starting_points(center: &Pt3, opts: &ContinuousSearchOptions) -> Vec<Pt3> {
    let bounds = search_box(center, opts);
    let mut rng = StdRng::seed_from_u64(opts.sampling_seed);
    let extra = opts.seeds.saturating_sub(1);
    std::iter::once(*center)
        .chain(latin_hypercube(extra, 3, &mut rng).into_iter().map(|u| {
            let x = scale_to_bounds(&u, &bounds);
            Pt3::new(x[0], x[1], x[2])
        }))
        .collect()
}

fn objective_at(
    correspondences: &[Correspondence],
    position: &Pt3,
    fit_opts: &BearingFitOptions,
    w: &ObjectiveWeights,
) -> Option<(Real, BearingHomography)> {
    let fit = fit_bearing_homography(correspondences, position, fit_opts).ok()?;
    let f = fit.objective(w.pixel, w.bearing);
    f.is_finite().then_some((f, fit))
}

/// Pixel and bearing residual components of the frozen inlier set.
fn frozen_residuals(
    correspondences: &[Correspondence],
    inliers: &[bool],
    position: &Pt3,
    w: &ObjectiveWeights,
) -> Option<DVector<Real>> {
    let h = fit_frozen(correspondences, position, inliers).ok()?;
    let (s_px, s_b) = (w.pixel.sqrt(), w.bearing.sqrt());
    let mut r = Vec::with_capacity(4 * h.inlier_count());
    for (c, _) in correspondences.iter().zip(inliers).filter(|(_, &m)| m) {
        let b = relative_bearing(position, &c.world)?;
        let px = apply_homography(&h.h, &b)?;
        let back = apply_homography(&h.h_inv, &c.pixel)?;
        r.extend_from_slice(&[
            s_px * (px.x - c.pixel.x),
            s_px * (px.y - c.pixel.y),
            s_b * (back.x - b.x),
            s_b * (back.y - b.y),
        ]);
    }
    Some(DVector::from_vec(r))
}

/// Local refinement from a global result; `None` keeps the global result.
fn refine_locally(
    correspondences: &[Correspondence],
    global: &BearingHomography,
    global_objective: Real,
    fit_opts: &BearingFitOptions,
    opts: &ContinuousSearchOptions,
) -> Option<(Real, BearingHomography)> {
    let w = &opts.weights;
    let inliers = global.inliers.clone();
    let residuals = |p: &Pt3| frozen_residuals(correspondences, &inliers, p, w);
    let report = match refine_position(residuals, &global.camera, opts.local_step, &opts.local) {
        Ok(r) => r,
        Err(e) => {
            warn!("local refinement failed, keeping global result: {e}");
            return None;
        }
    };
    if !report.converged {
        warn!(
            "local refinement did not converge after {} evaluations, keeping global result",
            report.evaluations
        );
        return None;
    }
    let (f, fit) = objective_at(correspondences, &report.position, fit_opts, w)?;
    (f < global_objective).then_some((f, fit))
}

/// Search the box around `initial` for the position with the lowest
/// weighted bearing-homography objective.
pub fn continuous_search(
    correspondences: &[Correspondence],
    initial: &Pt3,
    fit_opts: &BearingFitOptions,
    opts: &ContinuousSearchOptions,
) -> Result<ContinuousOutcome, PoseError> {
    PoseError::require_correspondences(correspondences.len())?;
    if opts.seeds == 0 {
        return Err(PoseError::InvalidConfig("continuous search needs at least one seed".into()));
    }
    if !(opts.horizontal_radius > 0.0 && opts.vertical_radius > 0.0) {
        return Err(PoseError::InvalidConfig(format!(
            "search radii must be positive, got {} and {}",
            opts.horizontal_radius, opts.vertical_radius
        )));
    }

    let bounds = search_box(initial, opts);
    let w = opts.weights;
    let objective = |x: &[Real]| {
        objective_at(correspondences, &Pt3::new(x[0], x[1], x[2]), fit_opts, &w)
            .map_or(Real::INFINITY, |(f, _)| f)
    };

    let mut best: Option<(Real, BearingHomography)> = None;
    let mut seeds = Vec::with_capacity(opts.seeds);
    let mut solver_failures = Vec::new();
    for (k, start) in starting_points(initial, opts).into_iter().enumerate() {
        let de_opts = DeOptions {
            seed: opts.de.seed.wrapping_add(k as u64),
            ..opts.de.clone()
        };
        let mut outcome = SeedOutcome {
            start,
            position: None,
            objective: None,
            refined: false,
        };

        let x0 = [start.x, start.y, start.z];
        let global = match differential_evolution(&objective, &bounds, Some(&x0), &de_opts) {
            Ok(res) => {
                let at = Pt3::new(res.x[0], res.x[1], res.x[2]);
                objective_at(correspondences, &at, fit_opts, &w)
            }
            Err(e) => {
                warn!("seed {k} at ({:.1}, {:.1}, {:.1}) failed: {e}", start.x, start.y, start.z);
                solver_failures.push(e);
                seeds.push(outcome);
                continue;
            }
        };
        let Some((mut f, mut fit)) = global else {
            warn!("seed {k}: no homography at the global optimum");
            seeds.push(outcome);
            continue;
        };
        debug!("seed {k}: global objective {f:.6}");

        if opts.refine {
            if let Some((f_local, fit_local)) =
                refine_locally(correspondences, &fit, f, fit_opts, opts)
            {
                debug!("seed {k}: local stage improved {f:.6} -> {f_local:.6}");
                f = f_local;
                fit = fit_local;
                outcome.refined = true;
            }
        }

        outcome.position = Some(fit.camera);
        outcome.objective = Some(f);
        seeds.push(outcome);
        if best.as_ref().map_or(true, |(bf, _)| f < *bf) {
            best = Some((f, fit));
        }
    }

    let Some((objective, fit)) = best else {
        // Every seed stopped inside the global optimiser.
        if solver_failures.len() == seeds.len() {
            if let Some(e) = solver_failures.pop() {
                return Err(PoseError::SolverNonConvergence(e));
            }
        }
        return Err(PoseError::NoViablePose(format!(
            "all {} continuous-search seeds failed",
            seeds.len()
        )));
    };
    info!(
        "continuous search: ({:.2}, {:.2}, {:.2}) with objective {objective:.6}",
        fit.camera.x, fit.camera.y, fit.camera.z
    );
    Ok(ContinuousOutcome {
        position: fit.camera,
        fit,
        objective,
        seeds,
    })
}
