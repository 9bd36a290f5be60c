use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use vantage_core::Real;

/// Generic non-linear least squares problem with dense parameter/residual vectors.
pub trait NllsProblem {
    fn num_params(&self) -> usize;
    fn num_residuals(&self) -> usize;

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Iteration cap; the LM backend follows the MINPACK convention of
    /// `max_iters * (n + 1)` function evaluations.
    pub max_iters: usize,
    /// Relative tolerance on the cost reduction.
    pub ftol: Real,
    /// Orthogonality tolerance.
    pub gtol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-10,
            gtol: 1e-10,
            xtol: 1e-10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Function evaluations used.
    pub iterations: usize,
    /// Half the squared norm of the final residual vector.
    pub final_cost: Real,
    pub converged: bool,
    /// Termination reason, for logs.
    pub termination: String,
}

pub trait NllsSolverBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}
