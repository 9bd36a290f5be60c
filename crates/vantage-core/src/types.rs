use serde::{Deserialize, Serialize};

use crate::{Pt2, Pt3, Real};

/// One pixel ↔ ground correspondence used for pose fitting.
///
/// `world` is a metric position (easting, northing, elevation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub pixel: Pt2,
    pub world: Pt3,
}

impl Correspondence {
    pub fn new(pixel: Pt2, world: Pt3) -> Self {
        Self { pixel, world }
    }
}

/// Summary statistics of per-point reprojection errors (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionStats {
    pub mean: Real,
    pub rms: Real,
    pub max: Real,
    pub count: usize,
}

impl ReprojectionStats {
    /// Aggregate a slice of non-negative errors. Returns `None` for an empty slice.
    pub fn from_errors(errors: &[Real]) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let n = errors.len() as Real;
        let sum: Real = errors.iter().sum();
        let ss: Real = errors.iter().map(|e| e * e).sum();
        let max = errors.iter().copied().fold(0.0, Real::max);
        Some(Self {
            mean: sum / n,
            rms: (ss / n).sqrt(),
            max,
            count: errors.len(),
        })
    }
}
