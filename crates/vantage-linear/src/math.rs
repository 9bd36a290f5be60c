//! Hartley normalization for DLT-style estimation.

use vantage_core::{Mat3, Pt2, Vec2};

/// Hartley normalization for 2D points.
///
/// Centers points at the origin and scales so that the mean distance from
/// the origin is `√2`. Returns the normalized points and `T` with
/// `p_norm = T * p_homogeneous`, or `None` if the input is empty or all
/// points coincide.
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let centroid = points.iter().fold(Vec2::zeros(), |acc, p| acc + p.coords) / n;
    let mean_dist = points
        .iter()
        .map(|p| (p.coords - centroid).norm())
        .sum::<f64>()
        / n;

    if !mean_dist.is_finite() || mean_dist <= f64::EPSILON {
        return None;
    }

    let scale = std::f64::consts::SQRT_2 / mean_dist;
    #[rustfmt::skip]
    let t = Mat3::new(
        scale, 0.0, -scale * centroid.x,
        0.0, scale, -scale * centroid.y,
        0.0, 0.0, 1.0,
    );
    let norm = points
        .iter()
        .map(|p| Pt2::from((p.coords - centroid) * scale))
        .collect();

    Some((norm, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_points_are_centred_at_sqrt2() {
        let points = vec![
            Pt2::new(100.0, 200.0),
            Pt2::new(200.0, 300.0),
            Pt2::new(150.0, 250.0),
            Pt2::new(90.0, 310.0),
        ];
        let (norm, t) = normalize_points_2d(&points).unwrap();

        let c = norm.iter().fold(Vec2::zeros(), |a, p| a + p.coords) / 4.0;
        assert!(c.norm() < 1e-10);
        let mean: f64 = norm.iter().map(|p| p.coords.norm()).sum::<f64>() / 4.0;
        assert!((mean - 2.0_f64.sqrt()).abs() < 1e-10);

        let mapped = t * nalgebra::Vector3::new(100.0, 200.0, 1.0);
        assert!((mapped.x - norm[0].x).abs() < 1e-10);
        assert!((mapped.y - norm[0].y).abs() < 1e-10);
    }

    #[test]
    fn coincident_points_cannot_be_normalized() {
        assert!(normalize_points_2d(&[Pt2::new(1.0, 1.0); 4]).is_none());
        assert!(normalize_points_2d(&[]).is_none());
    }
}
