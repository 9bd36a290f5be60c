use nalgebra::{Matrix3, Point2, RealField};
use serde::{Deserialize, Serialize};

/// Intrinsics that map normalized image coordinates to pixel coordinates.
pub trait IntrinsicsModel<S: RealField + Copy> {
    fn normalized_to_pixel(&self, n: &Point2<S>) -> Point2<S>;
    fn pixel_to_normalized(&self, pixel: &Point2<S>) -> Point2<S>;
}

/// Standard pinhole intrinsics with optional skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FxFyCxCySkew<S: RealField + Copy> {
    /// Focal length in pixels along X.
    pub fx: S,
    /// Focal length in pixels along Y.
    pub fy: S,
    /// Principal point X coordinate in pixels.
    pub cx: S,
    /// Principal point Y coordinate in pixels.
    pub cy: S,
    /// Skew term (typically 0).
    pub skew: S,
}

impl<S: RealField + Copy> FxFyCxCySkew<S> {
    /// Return the 3x3 camera intrinsics matrix K.
    pub fn k_matrix(&self) -> Matrix3<S> {
        Matrix3::new(
            self.fx,
            self.skew,
            self.cx,
            S::zero(),
            self.fy,
            self.cy,
            S::zero(),
            S::zero(),
            S::one(),
        )
    }
}

impl FxFyCxCySkew<f64> {
    /// Intrinsics of a plate camera from its physical lens and film format.
    ///
    /// `sensor_mm` and `image_px` are `(width, height)`. Pixel pitch is taken
    /// independently per axis, so a scan whose aspect ratio differs from the
    /// plate yields `fx != fy`. The principal point sits at the image centre.
    pub fn from_physical(focal_mm: f64, sensor_mm: (f64, f64), image_px: (f64, f64)) -> Self {
        let (sw, sh) = sensor_mm;
        let (w, h) = image_px;
        Self {
            fx: focal_mm / (sw / w),
            fy: focal_mm / (sh / h),
            cx: w / 2.0,
            cy: h / 2.0,
            skew: 0.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.fx.abs() > f64::EPSILON
            && self.fy.abs() > f64::EPSILON
            && self.cx.is_finite()
            && self.cy.is_finite()
    }
}

impl<S: RealField + Copy> IntrinsicsModel<S> for FxFyCxCySkew<S> {
    fn normalized_to_pixel(&self, n: &Point2<S>) -> Point2<S> {
        let u = self.fx * n.x + self.skew * n.y + self.cx;
        let v = self.fy * n.y + self.cy;
        Point2::new(u, v)
    }

    fn pixel_to_normalized(&self, pixel: &Point2<S>) -> Point2<S> {
        let ny = (pixel.y - self.cy) / self.fy;
        let nx = (pixel.x - self.cx - self.skew * ny) / self.fx;
        Point2::new(nx, ny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_focal_to_pixels() {
        let k = FxFyCxCySkew::from_physical(90.0, (203.0, 254.0), (2030.0, 2540.0));
        assert!((k.fx - 900.0).abs() < 1e-9);
        assert!((k.fy - 900.0).abs() < 1e-9);
        assert_eq!(k.cx, 1015.0);
        assert_eq!(k.cy, 1270.0);
        assert!(k.is_valid());
    }

    #[test]
    fn k_matrix_matches_pixel_mapping() {
        let k = FxFyCxCySkew {
            fx: 800.0,
            fy: 780.0,
            cx: 640.0,
            cy: 360.0,
            skew: 0.5,
        };
        let n: Point2<f64> = Point2::new(0.1, -0.05);
        let px = k.normalized_to_pixel(&n);
        let hom = k.k_matrix() * nalgebra::Vector3::new(n.x, n.y, 1.0);
        assert!((px.x - hom.x).abs() < 1e-12);
        assert!((px.y - hom.y).abs() < 1e-12);
        let back = k.pixel_to_normalized(&px);
        assert!((back - n).norm() < 1e-12);
    }
}
