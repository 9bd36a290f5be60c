//! Differential evolution (`best1bin`) over a box.
//!
//! The population lives in the unit cube and is mapped into the bounds for
//! evaluation. Trial vectors for a whole generation are drawn from one
//! seeded RNG before any of them is evaluated, so results are identical for
//! every worker count.

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use vantage_core::Real;

use crate::sampling::{latin_hypercube, scale_to_bounds, scale_to_unit};
use crate::OptimError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeOptions {
    /// Population size is `popsize * dim`.
    pub popsize: usize,
    /// Differential weight is drawn uniformly from this range every
    /// generation (dithering).
    pub mutation: (Real, Real),
    /// Crossover probability.
    pub recombination: Real,
    /// Relative convergence tolerance on the population energy spread.
    pub tol: Real,
    /// Absolute convergence tolerance on the population energy spread.
    pub atol: Real,
    pub max_generations: usize,
    pub seed: u64,
    /// `1` evaluates serially, `0` uses the global rayon pool, any other
    /// value a dedicated pool of that many threads.
    pub workers: usize,
}

impl Default for DeOptions {
    fn default() -> Self {
        Self {
            popsize: 15,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            max_generations: 100,
            seed: 0x5EED,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeResult {
    /// Best point found, in bound coordinates.
    pub x: Vec<Real>,
    /// Objective at `x`.
    pub fun: Real,
    pub generations: usize,
    pub evaluations: usize,
    /// The energy spread fell under the tolerance before the generation cap.
    pub converged: bool,
}

fn validate(bounds: &[(Real, Real)]) -> Result<(), OptimError> {
    for (dim, &(lo, hi)) in bounds.iter().enumerate() {
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(OptimError::InvalidBounds { dim, lo, hi });
        }
    }
    if bounds.is_empty() {
        return Err(OptimError::InvalidBounds {
            dim: 0,
            lo: Real::NAN,
            hi: Real::NAN,
        });
    }
    Ok(())
}

fn evaluate<F>(
    objective: &F,
    pop: &[Vec<Real>],
    bounds: &[(Real, Real)],
    parallel: bool,
) -> Vec<Real>
where
    F: Fn(&[Real]) -> Real + Sync,
{
    let energy = |u: &Vec<Real>| {
        let e = objective(&scale_to_bounds(u, bounds));
        if e.is_finite() {
            e
        } else {
            Real::INFINITY
        }
    };
    if parallel {
        pop.par_iter().map(energy).collect()
    } else {
        pop.iter().map(energy).collect()
    }
}

fn argmin(values: &[Real]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, Real::INFINITY), |(bi, bv), (i, &v)| if v < bv { (i, v) } else { (bi, bv) })
        .0
}

fn spread_converged(energies: &[Real], tol: Real, atol: Real) -> bool {
    if energies.iter().any(|e| !e.is_finite()) {
        return false;
    }
    let n = energies.len() as Real;
    let mean = energies.iter().sum::<Real>() / n;
    let var = energies.iter().map(|e| (e - mean).powi(2)).sum::<Real>() / n;
    var.sqrt() <= atol + tol * mean.abs()
}

/// Pick `k` distinct indices from `0..n`, all different from `exclude`.
fn distinct_indices<R: Rng>(rng: &mut R, n: usize, exclude: usize, k: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(k);
    while out.len() < k {
        let c = rng.random_range(0..n);
        if c != exclude && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// Minimize `objective` over `bounds` with `best1bin` differential evolution.
///
/// `x0`, when given, replaces the first member of the initial Latin
/// hypercube population (clamped into the bounds). Non-finite objective
/// values rank as `+∞`.
pub fn differential_evolution<F>(
    objective: F,
    bounds: &[(Real, Real)],
    x0: Option<&[Real]>,
    opts: &DeOptions,
) -> Result<DeResult, OptimError>
where
    F: Fn(&[Real]) -> Real + Sync,
{
    validate(bounds)?;
    match opts.workers {
        0 | 1 => run(&objective, bounds, x0, opts, opts.workers == 0),
        n => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| OptimError::WorkerPool(e.to_string()))?;
            pool.install(|| run(&objective, bounds, x0, opts, true))
        }
    }
}

fn run<F>(
    objective: &F,
    bounds: &[(Real, Real)],
    x0: Option<&[Real]>,
    opts: &DeOptions,
    parallel: bool,
) -> Result<DeResult, OptimError>
where
    F: Fn(&[Real]) -> Real + Sync,
{
    let dim = bounds.len();
    let np = (opts.popsize * dim).max(5);
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut pop = latin_hypercube(np, dim, &mut rng);
    if let Some(x0) = x0.filter(|x| x.len() == dim) {
        pop[0] = scale_to_unit(x0, bounds);
    }
    let mut energies = evaluate(objective, &pop, bounds, parallel);
    let mut evaluations = np;
    let mut best = argmin(&energies);

    let (f_lo, f_hi) = opts.mutation;
    let mut generations = 0;
    let mut converged = false;
    while generations < opts.max_generations {
        generations += 1;
        let f = if f_hi > f_lo {
            rng.random_range(f_lo..f_hi)
        } else {
            f_lo
        };

        let trials: Vec<Vec<Real>> = (0..np)
            .map(|i| {
                let r = distinct_indices(&mut rng, np, i, 2);
                let fill = rng.random_range(0..dim);
                (0..dim)
                    .map(|j| {
                        if j == fill || rng.random::<Real>() < opts.recombination {
                            let v = pop[best][j] + f * (pop[r[0]][j] - pop[r[1]][j]);
                            if (0.0..=1.0).contains(&v) {
                                v
                            } else {
                                rng.random::<Real>()
                            }
                        } else {
                            pop[i][j]
                        }
                    })
                    .collect()
            })
            .collect();

        let trial_energies = evaluate(objective, &trials, bounds, parallel);
        evaluations += np;
        for (i, (trial, e)) in trials.into_iter().zip(trial_energies).enumerate() {
            if e <= energies[i] {
                pop[i] = trial;
                energies[i] = e;
            }
        }
        best = argmin(&energies);

        if spread_converged(&energies, opts.tol, opts.atol) {
            converged = true;
            break;
        }
    }

    if !energies[best].is_finite() {
        return Err(OptimError::NoFiniteEvaluation { evaluations });
    }
    debug!(
        "differential evolution: f={:.6} after {} generations ({} evaluations, converged={})",
        energies[best], generations, evaluations, converged
    );
    Ok(DeResult {
        x: scale_to_bounds(&pop[best], bounds),
        fun: energies[best],
        generations,
        evaluations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: &[Real]) -> Real {
        x.iter().map(|v| (v - 1.0).powi(2)).sum()
    }

    #[test]
    fn finds_sphere_minimum() {
        let bounds = [(-5.0, 5.0), (-5.0, 5.0), (-5.0, 5.0)];
        let opts = DeOptions {
            tol: 1e-8,
            max_generations: 300,
            ..Default::default()
        };
        let res = differential_evolution(sphere, &bounds, None, &opts).unwrap();
        assert!(res.fun < 1e-4, "f = {}", res.fun);
        for v in &res.x {
            assert!((v - 1.0).abs() < 1e-2);
        }
    }

    #[test]
    fn parallel_matches_serial() {
        let bounds = [(-3.0, 3.0), (-3.0, 3.0)];
        let opts = DeOptions {
            max_generations: 20,
            ..Default::default()
        };
        let serial = differential_evolution(sphere, &bounds, None, &opts).unwrap();
        let parallel = differential_evolution(
            sphere,
            &bounds,
            None,
            &DeOptions {
                workers: 2,
                ..opts.clone()
            },
        )
        .unwrap();
        assert_eq!(serial.x, parallel.x);
        assert_eq!(serial.evaluations, parallel.evaluations);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = differential_evolution(sphere, &[(1.0, -1.0)], None, &DeOptions::default())
            .unwrap_err();
        assert!(matches!(err, OptimError::InvalidBounds { dim: 0, .. }));
    }

    #[test]
    fn never_finite_objective_is_an_error() {
        let opts = DeOptions {
            max_generations: 3,
            ..Default::default()
        };
        let err = differential_evolution(|_: &[Real]| Real::NAN, &[(0.0, 1.0)], None, &opts)
            .unwrap_err();
        assert!(matches!(err, OptimError::NoFiniteEvaluation { .. }));
    }

    #[test]
    fn seed_point_is_kept_when_optimal() {
        let bounds = [(-5.0, 5.0), (-5.0, 5.0)];
        let opts = DeOptions {
            max_generations: 1,
            ..Default::default()
        };
        let res = differential_evolution(sphere, &bounds, Some(&[1.0, 1.0]), &opts).unwrap();
        assert!(res.fun < 1e-12);
    }
}
