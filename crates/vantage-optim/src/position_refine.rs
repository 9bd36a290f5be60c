//! Least-squares refinement of a 3D camera position.
//!
//! The residual function is supplied by the caller and must keep a fixed
//! length; returning `None` marks a position where the model is undefined,
//! which the LM backend treats as a failed step.

use log::debug;
use nalgebra::{DMatrix, DVector};
use vantage_core::{Pt3, Real, Vec3};

use crate::{
    central_difference_jacobian, LmBackend, NllsProblem, NllsSolverBackend, OptimError,
    SolveOptions,
};

#[derive(Debug, Clone)]
pub struct PositionRefineReport {
    pub position: Pt3,
    /// Half the squared residual norm at `position`.
    pub cost: Real,
    pub converged: bool,
    pub evaluations: usize,
}

struct PositionProblem<'a, F> {
    residuals: &'a F,
    start: Pt3,
    len: usize,
    step: Real,
}

impl<F> PositionProblem<'_, F>
where
    F: Fn(&Pt3) -> Option<DVector<Real>>,
{
    fn eval(&self, x: &DVector<Real>) -> DVector<Real> {
        let p = self.start + Vec3::new(x[0], x[1], x[2]);
        match (self.residuals)(&p) {
            Some(r) if r.len() == self.len => r,
            _ => DVector::from_element(self.len, Real::NAN),
        }
    }
}

impl<F> NllsProblem for PositionProblem<'_, F>
where
    F: Fn(&Pt3) -> Option<DVector<Real>>,
{
    fn num_params(&self) -> usize {
        3
    }

    fn num_residuals(&self) -> usize {
        self.len
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        self.eval(x)
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        central_difference_jacobian(|p| self.eval(p), x, &[self.step; 3])
    }
}

/// Minimize `|residuals(p)|²` over positions `p` starting at `start`.
///
/// `step` is the central-difference step in meters. Parameters are offsets
/// from `start`, so large projected coordinates do not swamp the update.
pub fn refine_position<F>(
    residuals: F,
    start: &Pt3,
    step: Real,
    opts: &SolveOptions,
) -> Result<PositionRefineReport, OptimError>
where
    F: Fn(&Pt3) -> Option<DVector<Real>>,
{
    let r0 = residuals(start)
        .ok_or_else(|| OptimError::NonConvergence("residuals undefined at the start".into()))?;
    if r0.len() < 3 {
        return Err(OptimError::NotEnoughResiduals {
            required: 3,
            found: r0.len(),
        });
    }

    let problem = PositionProblem {
        residuals: &residuals,
        start: *start,
        len: r0.len(),
        step,
    };
    let (x, report) = LmBackend.solve(&problem, DVector::zeros(3), opts);
    if !x.iter().all(|v| v.is_finite()) {
        return Err(OptimError::NonConvergence(report.termination));
    }
    let position = start + Vec3::new(x[0], x[1], x[2]);
    debug!(
        "position refinement moved {:.3} m, cost {:.6} ({})",
        (position - start).norm(),
        report.final_cost,
        report.termination
    );
    Ok(PositionRefineReport {
        position,
        cost: report.final_cost,
        converged: report.converged,
        evaluations: report.iterations,
    })
}
