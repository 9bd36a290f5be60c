//! Generic, model-agnostic RANSAC implementation.
//!
//! Implement [`Estimator`] for a model and call [`ransac_fit`] with the data
//! and [`RansacOptions`]. The engine never panics on failure: when no
//! consensus is found, the returned [`RansacResult`] has `success == false`
//! and `model == None`.
//!
//! Sampling is driven by a seeded `StdRng`, so identical inputs and options
//! always produce identical models and inlier sets.

use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration parameters for the generic RANSAC engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    /// Maximum number of RANSAC iterations.
    pub max_iters: usize,
    /// Inlier residual threshold.
    pub thresh: f64,
    /// Minimum number of inliers required to accept a model.
    pub min_inliers: usize,
    /// Desired confidence level in `[0, 1]` for finding a good model.
    pub confidence: f64,
    /// Random-number generator seed (for reproducibility).
    pub seed: u64,
    /// If `true`, refit the model on all inliers before scoring.
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            thresh: 70.0,
            min_inliers: 4,
            confidence: 0.995,
            seed: 1_234_567,
            refit_on_inliers: true,
        }
    }
}

/// Output of a RANSAC run.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    /// Whether a consensus set satisfying the options was found.
    pub success: bool,
    /// Best model found (if any).
    pub model: Option<M>,
    /// Indices of inlier data points, ascending.
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over inliers.
    pub inlier_rms: f64,
    /// Number of iterations actually performed.
    pub iters: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            success: false,
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            iters: 0,
        }
    }
}

impl<M> RansacResult<M> {
    /// Boolean inlier mask over `n` data points.
    pub fn inlier_mask(&self, n: usize) -> Vec<bool> {
        let mut mask = vec![false; n];
        for &i in &self.inliers {
            if i < n {
                mask[i] = true;
            }
        }
        mask
    }
}

/// Generic estimator for RANSAC-like methods.
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal number of samples needed to estimate a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from a subset of data indices.
    ///
    /// Return `None` if the subset is degenerate or fitting fails.
    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual for one datum, in the units of `opts.thresh`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Optional degeneracy check on the sample subset.
    fn is_degenerate(_data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        false
    }

    /// Optional refit on the full inlier set. Default: keep the sample model.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

struct Consensus {
    inliers: Vec<usize>,
    rms: f64,
}

fn consensus<E: Estimator>(model: &E::Model, data: &[E::Datum], thresh: f64) -> Consensus {
    let mut inliers = Vec::with_capacity(data.len());
    let mut ss = 0.0;
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        // NaN residuals never count as inliers.
        if r <= thresh {
            inliers.push(i);
            ss += r * r;
        }
    }
    let rms = if inliers.is_empty() {
        f64::INFINITY
    } else {
        (ss / inliers.len() as f64).sqrt()
    };
    Consensus { inliers, rms }
}

/// Adaptive iteration bound from the current inlier ratio.
fn required_iterations(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n = ((1.0 - confidence.min(1.0 - 1e-12)).ln() / denom).ceil() as usize;
    n.clamp(iters_so_far, max_iters)
}

fn improves(best: &RansacResult<impl Sized>, candidate: &Consensus) -> bool {
    !best.success
        || candidate.inliers.len() > best.inliers.len()
        || (candidate.inliers.len() == best.inliers.len() && candidate.rms < best.inlier_rms)
}

/// Run a RANSAC loop for a given [`Estimator`] implementation.
///
/// Models are ranked by inlier count, then by inlier RMS.
pub fn ransac_fit<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best: RansacResult<E::Model> = RansacResult::default();
    if data.len() < E::MIN_SAMPLES || opts.max_iters == 0 {
        return best;
    }

    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let min_inliers = opts.min_inliers.max(E::MIN_SAMPLES);

    let mut budget = opts.max_iters;
    let mut iters = 0;
    while iters < budget {
        iters += 1;
        for (slot, &idx) in sample
            .iter_mut()
            .zip(all_indices.choose_multiple(&mut rng, E::MIN_SAMPLES))
        {
            *slot = idx;
        }

        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(model) = E::fit(data, &sample) else {
            continue;
        };

        let mut scored = consensus::<E>(&model, data, opts.thresh);
        if scored.inliers.len() < min_inliers {
            continue;
        }

        let mut model = model;
        if opts.refit_on_inliers {
            if let Some(refit) = E::refit(data, &scored.inliers) {
                let rescored = consensus::<E>(&refit, data, opts.thresh);
                if rescored.inliers.len() >= scored.inliers.len() {
                    model = refit;
                    scored = rescored;
                }
            }
        }

        let ratio = scored.inliers.len() as f64 / data.len() as f64;
        if improves(&best, &scored) {
            best = RansacResult {
                success: true,
                model: Some(model),
                inliers: scored.inliers,
                inlier_rms: scored.rms,
                iters,
            };
        }
        budget = required_iterations(
            opts.confidence,
            ratio.max(best.inliers.len() as f64 / data.len() as f64),
            E::MIN_SAMPLES,
            iters,
            opts.max_iters,
        );
    }

    best.iters = iters;
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct LineModel {
        slope: f64,
        intercept: f64,
    }

    struct LineEstimator;

    impl Estimator for LineEstimator {
        type Datum = (f64, f64);
        type Model = LineModel;

        const MIN_SAMPLES: usize = 2;

        fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
            let p0 = data[sample_indices[0]];
            let p1 = data[sample_indices[1]];
            let dx = p1.0 - p0.0;
            if dx.abs() < 1e-9 {
                return None;
            }
            let slope = (p1.1 - p0.1) / dx;
            Some(LineModel {
                slope,
                intercept: p0.1 - slope * p0.0,
            })
        }

        fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
            let (x, y) = *datum;
            (model.slope * x - y + model.intercept).abs() / (model.slope.powi(2) + 1.0).sqrt()
        }

        fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
            let n = inliers.len() as f64;
            let (mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0);
            for &idx in inliers {
                let (x, y) = data[idx];
                sx += x;
                sy += y;
                sxx += x * x;
                sxy += x * y;
            }
            let denom = n * sxx - sx * sx;
            if denom.abs() < 1e-12 {
                return None;
            }
            let slope = (n * sxy - sx * sy) / denom;
            Some(LineModel {
                slope,
                intercept: (sy - slope * sx) / n,
            })
        }
    }

    fn opts() -> RansacOptions {
        RansacOptions {
            max_iters: 500,
            thresh: 0.05,
            min_inliers: 6,
            confidence: 0.99,
            seed: 42,
            refit_on_inliers: true,
        }
    }

    fn noisy_line() -> Vec<(f64, f64)> {
        let mut data: Vec<(f64, f64)> = (0..10)
            .map(|i| {
                let x = i as f64 * 0.5;
                (x, 2.0 * x + 1.0 + if i % 2 == 0 { 0.01 } else { -0.01 })
            })
            .collect();
        data.extend([(5.0, -3.0), (6.0, 10.0), (7.0, -8.0)]);
        data
    }

    #[test]
    fn insufficient_data_is_not_a_panic() {
        let res = ransac_fit::<LineEstimator>(&[(0.0, 0.0)], &opts());
        assert!(!res.success);
        assert!(res.model.is_none());
        assert!(res.inliers.is_empty());
    }

    #[test]
    fn recovers_line_and_masks_outliers() {
        let data = noisy_line();
        let res = ransac_fit::<LineEstimator>(&data, &opts());

        assert!(res.success);
        let model = res.model.clone().unwrap();
        assert!((model.slope - 2.0).abs() < 0.05);
        assert!((model.intercept - 1.0).abs() < 0.05);

        let mask = res.inlier_mask(data.len());
        assert!(mask[..10].iter().all(|&m| m));
        assert!(mask[10..].iter().all(|&m| !m));
    }

    #[test]
    fn same_seed_same_result() {
        let data = noisy_line();
        let a = ransac_fit::<LineEstimator>(&data, &opts());
        let b = ransac_fit::<LineEstimator>(&data, &opts());
        assert_eq!(a.inliers, b.inliers);
        assert_eq!(a.iters, b.iters);
    }
}
