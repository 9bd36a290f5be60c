use nalgebra::{DMatrix, DVector};
use vantage_core::Real;

/// Central-difference Jacobian of `f` at `x` with per-parameter step `h`.
pub fn central_difference_jacobian<F>(f: F, x: &DVector<Real>, h: &[Real]) -> DMatrix<Real>
where
    F: Fn(&DVector<Real>) -> DVector<Real>,
{
    debug_assert_eq!(h.len(), x.len());
    let mut cols = Vec::with_capacity(x.len());
    let mut xp = x.clone();
    for (j, &step) in h.iter().enumerate() {
        xp[j] = x[j] + step;
        let fp = f(&xp);
        xp[j] = x[j] - step;
        let fm = f(&xp);
        xp[j] = x[j];
        cols.push((fp - fm) / (2.0 * step));
    }
    if cols.is_empty() {
        return DMatrix::zeros(f(x).len(), 0);
    }
    DMatrix::from_columns(&cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_analytic_derivative() {
        let f = |x: &DVector<Real>| DVector::from_vec(vec![x[0] * x[0], x[0] * x[1].sin()]);
        let x = DVector::from_vec(vec![1.5, 0.3]);
        let j = central_difference_jacobian(f, &x, &[1e-5, 1e-5]);
        assert!((j[(0, 0)] - 3.0).abs() < 1e-6);
        assert!(j[(0, 1)].abs() < 1e-9);
        assert!((j[(1, 0)] - 0.3f64.sin()).abs() < 1e-6);
        assert!((j[(1, 1)] - 1.5 * 0.3f64.cos()).abs() < 1e-6);
    }
}
