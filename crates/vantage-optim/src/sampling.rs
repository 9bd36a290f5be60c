use rand::seq::SliceRandom;
use rand::Rng;
use vantage_core::Real;

/// Latin hypercube sample of `n` points in the unit cube `[0, 1)^dim`.
///
/// Each axis is cut into `n` equal strata and every stratum holds exactly
/// one point.
pub fn latin_hypercube<R: Rng + ?Sized>(n: usize, dim: usize, rng: &mut R) -> Vec<Vec<Real>> {
    let mut points = vec![vec![0.0; dim]; n];
    if n == 0 {
        return points;
    }
    let width = 1.0 / n as Real;
    let mut strata: Vec<usize> = (0..n).collect();
    for d in 0..dim {
        strata.shuffle(rng);
        for (p, &s) in points.iter_mut().zip(&strata) {
            p[d] = (s as Real + rng.random::<Real>()) * width;
        }
    }
    points
}

/// Map a unit-cube point into `bounds`.
pub fn scale_to_bounds(unit: &[Real], bounds: &[(Real, Real)]) -> Vec<Real> {
    unit.iter()
        .zip(bounds)
        .map(|(u, (lo, hi))| lo + u * (hi - lo))
        .collect()
}

/// Map a point in `bounds` into the unit cube, clamping to its faces.
pub fn scale_to_unit(x: &[Real], bounds: &[(Real, Real)]) -> Vec<Real> {
    x.iter()
        .zip(bounds)
        .map(|(v, (lo, hi))| ((v - lo) / (hi - lo)).clamp(0.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn every_stratum_is_hit_once() {
        let mut rng = StdRng::seed_from_u64(9);
        let pts = latin_hypercube(8, 3, &mut rng);
        assert_eq!(pts.len(), 8);
        for d in 0..3 {
            let mut hit = [false; 8];
            for p in &pts {
                assert!((0.0..1.0).contains(&p[d]));
                hit[(p[d] * 8.0) as usize] = true;
            }
            assert!(hit.iter().all(|&h| h));
        }
    }

    #[test]
    fn bounds_scaling_inverts() {
        let bounds = [(-10.0, 10.0), (100.0, 300.0)];
        let x = scale_to_bounds(&[0.25, 0.5], &bounds);
        assert!((x[0] + 5.0).abs() < 1e-12);
        assert!((x[1] - 200.0).abs() < 1e-12);
        let u = scale_to_unit(&x, &bounds);
        assert!((u[0] - 0.25).abs() < 1e-12);
    }
}
