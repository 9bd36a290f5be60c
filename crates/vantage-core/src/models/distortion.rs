use nalgebra::{RealField, Vector2};
use serde::{Deserialize, Serialize};

pub trait DistortionModel<S: RealField + Copy> {
    fn distort(&self, n_undist: &Vector2<S>) -> Vector2<S>;
    fn undistort(&self, n_dist: &Vector2<S>) -> Vector2<S>;
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct NoDistortion;

impl<S: RealField + Copy> DistortionModel<S> for NoDistortion {
    fn distort(&self, n_undist: &Vector2<S>) -> Vector2<S> {
        *n_undist
    }

    fn undistort(&self, n_dist: &Vector2<S>) -> Vector2<S> {
        *n_dist
    }
}

/// Brown-Conrady radial (k1, k2, k3) + tangential (p1, p2) distortion.
///
/// Coefficient order in [`BrownConrady5::coefficients`] follows the common
/// `[k1, k2, p1, p2, k3]` layout so values can be exchanged with other tools.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5<S: RealField> {
    pub k1: S,
    pub k2: S,
    pub k3: S,
    pub p1: S,
    pub p2: S,
    /// Fixed-point iterations used by `undistort` (0 selects 8).
    #[serde(default)]
    pub iters: u32,
}

impl<S: RealField + Copy> BrownConrady5<S> {
    pub fn from_coefficients(c: [S; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
            iters: 8,
        }
    }

    pub fn coefficients(&self) -> [S; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients().iter().all(|c| *c == S::zero())
    }

    fn distort_impl(&self, x: S, y: S) -> (S, S) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = S::one() + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let two = S::one() + S::one();
        let x_tan = two * self.p1 * x * y + self.p2 * (r2 + two * x * x);
        let y_tan = self.p1 * (r2 + two * y * y) + two * self.p2 * x * y;

        (x * radial + x_tan, y * radial + y_tan)
    }
}

impl<S: RealField + Copy> DistortionModel<S> for BrownConrady5<S> {
    fn distort(&self, n_undist: &Vector2<S>) -> Vector2<S> {
        let (xd, yd) = self.distort_impl(n_undist.x, n_undist.y);
        Vector2::new(xd, yd)
    }

    fn undistort(&self, n_dist: &Vector2<S>) -> Vector2<S> {
        if self.is_zero() {
            return *n_dist;
        }
        let mut x = n_dist.x;
        let mut y = n_dist.y;

        let iters = if self.iters == 0 { 8 } else { self.iters };
        for _ in 0..iters {
            let (xd, yd) = self.distort_impl(x, y);
            x -= xd - n_dist.x;
            y -= yd - n_dist.y;
        }
        Vector2::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_layout_roundtrips() {
        let d = BrownConrady5::from_coefficients([0.1, -0.02, 0.003, 0.004, 0.5]);
        assert_eq!(d.k1, 0.1);
        assert_eq!(d.p1, 0.003);
        assert_eq!(d.k3, 0.5);
        assert_eq!(d.coefficients(), [0.1, -0.02, 0.003, 0.004, 0.5]);
    }

    #[test]
    fn zero_model_is_identity() {
        let d = BrownConrady5::<f64>::default();
        let n = Vector2::new(0.3, -0.2);
        assert_eq!(d.distort(&n), n);
        assert_eq!(d.undistort(&n), n);
    }
}
