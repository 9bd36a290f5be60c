use crate::Real;
use serde::{Deserialize, Serialize};

/// Robust loss kernels.
///
/// `rho` follows the squared-residual convention: for small residuals every
/// kernel reduces to `r^2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RobustKernel {
    /// No robustness, pure L2 (quadratic).
    #[default]
    None,
    /// Huber loss with a given threshold.
    Huber { delta: Real },
}

impl RobustKernel {
    /// Robust loss of an unsquared, non-negative residual.
    pub fn rho(self, r: Real) -> Real {
        match self {
            RobustKernel::None => r * r,
            RobustKernel::Huber { delta } if r <= delta => r * r,
            RobustKernel::Huber { delta } => 2.0 * delta * r - delta * delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huber_matches_l2_for_small_residuals() {
        let rho = RobustKernel::Huber { delta: 1.0 }.rho(0.5);
        assert!((rho - 0.25).abs() < 1e-12);
        assert_eq!(rho, RobustKernel::None.rho(0.5));
    }

    #[test]
    fn huber_is_linear_for_large_residuals() {
        let kernel = RobustKernel::Huber { delta: 0.1 };
        let a = kernel.rho(1.0);
        let b = kernel.rho(2.0);
        assert!((a - (0.2 - 0.01)).abs() < 1e-12);
        assert!(((b - a) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn huber_is_continuous_at_the_threshold() {
        let kernel = RobustKernel::Huber { delta: 0.3 };
        let below = kernel.rho(0.3 - 1e-9);
        let above = kernel.rho(0.3 + 1e-9);
        assert!((below - above).abs() < 1e-8);
    }
}
