//! Pixel → ground intersection by marching a corrected ray over the DEM.
//!
//! The viewing ray of a pixel is corrected per axis by the ratio between
//! measured and modelled directions at the control points, weighted by
//! inverse pixel distance with the nearest control point boosted. This is
//! an empirical local calibration, not a bundle adjustment.

use log::debug;
use serde::{Deserialize, Serialize};
use vantage_core::{Correspondence, FxFyCxCySkew, Mat3, Pt2, Pt3, Real, Vec3};
use vantage_geo::Site;

use crate::pose::GeodeticPosition;
use crate::PoseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RayCastOptions {
    /// March step (meters).
    pub step: Real,
    pub max_distance: Real,
    /// A hit needs the ray within this height above the terrain (meters).
    pub hit_tolerance: Real,
    /// Steps before a hit may be accepted.
    pub min_steps: usize,
    /// Weight multiplier of the control point nearest the query pixel.
    pub nearest_boost: Real,
    /// Cap of the inverse-distance weight.
    pub max_weight: Real,
    /// Axes whose modelled direction component is below this get factor 1.
    pub axis_epsilon: Real,
}

impl Default for RayCastOptions {
    fn default() -> Self {
        Self {
            step: 1.0,
            max_distance: 5000.0,
            hit_tolerance: 0.5,
            min_steps: 50,
            nearest_boost: 30.0,
            max_weight: 1.0,
            axis_epsilon: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// Ground point (easting, northing, DEM elevation), `None` on a miss.
    pub position: Option<Pt3>,
    pub geodetic: Option<GeodeticPosition>,
    /// Steps marched before the hit or the miss.
    pub steps: usize,
}

/// A solved camera as seen by the ray caster.
#[derive(Debug, Clone, Copy)]
pub struct RayCamera<'a> {
    pub intrinsics: &'a FxFyCxCySkew<Real>,
    /// `R_C_W`.
    pub rotation: &'a Mat3,
    pub origin: &'a Pt3,
}

impl RayCamera<'_> {
    /// Unit viewing direction of `pixel` in the world frame.
    fn world_ray(&self, k_inv: &Mat3, pixel: &Pt2) -> Vec3 {
        let d = k_inv * Vec3::new(pixel.x, pixel.y, 1.0);
        (self.rotation.transpose() * d.normalize()).normalize()
    }
}

/// Per-axis factors `measured / modelled` for one control point.
fn axis_factors(measured: &Vec3, modelled: &Vec3, eps: Real) -> Vec3 {
    Vec3::from_fn(|i, _| {
        if modelled[i].abs() < eps {
            1.0
        } else {
            measured[i] / modelled[i]
        }
    })
}

/// Weighted correction of a world ray; identity without control points.
fn correction(
    camera: &RayCamera<'_>,
    k_inv: &Mat3,
    pixel: &Pt2,
    control: &[Correspondence],
    opts: &RayCastOptions,
) -> Vec3 {
    let mut factors = Vec::with_capacity(control.len());
    let mut weights = Vec::with_capacity(control.len());
    let mut nearest: Option<(usize, Real)> = None;
    for c in control {
        let measured = c.world - camera.origin;
        let norm = measured.norm();
        if !(norm > 0.0 && norm.is_finite()) {
            continue;
        }
        let modelled = camera.world_ray(k_inv, &c.pixel);
        factors.push(axis_factors(&(measured / norm), &modelled, opts.axis_epsilon));

        let d = (c.pixel - pixel).norm();
        let w = if d == 0.0 { 1.0 } else { (1.0 / d).min(opts.max_weight) };
        if nearest.map_or(true, |(_, nd)| d < nd) {
            nearest = Some((weights.len(), d));
        }
        weights.push(w);
    }
    let Some((nearest, _)) = nearest else {
        return Vec3::repeat(1.0);
    };
    weights[nearest] *= opts.nearest_boost;
    let total: Real = weights.iter().sum();
    factors
        .iter()
        .zip(&weights)
        .fold(Vec3::zeros(), |acc, (f, w)| acc + f * (w / total))
}

/// Intersect the viewing ray of `pixel` with the terrain.
///
/// `control` are the pose's observed correspondences, used for the
/// per-axis correction. A ray that leaves DEM coverage or exhausts
/// `max_distance` yields a miss with the steps taken so far.
pub fn pixel_to_geo(
    pixel: &Pt2,
    camera: &RayCamera<'_>,
    site: &Site,
    control: &[Correspondence],
    opts: &RayCastOptions,
) -> Result<RayHit, PoseError> {
    if !(opts.step > 0.0 && opts.max_distance > 0.0) {
        return Err(PoseError::InvalidConfig(format!(
            "ray step and distance must be positive, got {} and {}",
            opts.step, opts.max_distance
        )));
    }
    let k_inv = camera
        .intrinsics
        .k_matrix()
        .try_inverse()
        .ok_or_else(|| PoseError::InvalidConfig("intrinsics matrix is not invertible".into()))?;

    let ray = camera.world_ray(&k_inv, pixel);
    let corrected = ray.component_mul(&correction(camera, &k_inv, pixel, control, opts));
    let dir = if corrected.norm() > 0.0 {
        corrected.normalize()
    } else {
        ray
    };

    let max_steps = (opts.max_distance / opts.step).floor() as usize;
    let miss = |steps| RayHit {
        position: None,
        geodetic: None,
        steps,
    };
    for steps in 1..=max_steps {
        let p = camera.origin + dir * (opts.step * steps as Real);
        let Ok((lon, lat)) = site.geo().to_geodetic(p.x, p.y) else {
            return Ok(miss(steps));
        };
        if !site.dem().contains_geodetic(lon, lat) {
            debug!("ray left DEM coverage after {steps} steps");
            return Ok(miss(steps));
        }
        let ground = match site.dem().elevation_at_geodetic(lon, lat) {
            Ok(z) => z,
            Err(_) => return Ok(miss(steps)),
        };
        if steps >= opts.min_steps && p.z <= ground + opts.hit_tolerance {
            let position = Pt3::new(p.x, p.y, ground);
            return Ok(RayHit {
                position: Some(position),
                geodetic: Some(GeodeticPosition {
                    longitude: lon,
                    latitude: lat,
                    height: ground,
                }),
                steps,
            });
        }
    }
    Ok(miss(max_steps))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factors_guard_small_components() {
        let f = axis_factors(&Vec3::new(0.5, 0.2, 0.8), &Vec3::new(0.25, 1e-5, 0.8), 1e-3);
        assert_eq!(f, Vec3::new(2.0, 1.0, 1.0));
    }
}
