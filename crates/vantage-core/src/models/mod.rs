//! Camera model building blocks.
//!
//! The camera pipeline has three stages:
//!
//! 1. `ProjectionModel`: map a 3D ray to normalized coordinates (pinhole).
//! 2. `DistortionModel`: apply radial/tangential distortion in normalized space.
//! 3. `IntrinsicsModel`: map normalized coordinates to pixels (K matrix).
//!
//! The combined mapping is:
//! `pixel = intrinsics(distortion(projection(dir)))`
//!
//! Historical plates carry no calibration data, so distortion is either zero
//! or supplied from outside; nothing in the workspace estimates it.

mod camera;
mod distortion;
mod intrinsics;
mod projection;

pub use camera::*;
pub use distortion::*;
pub use intrinsics::*;
pub use projection::*;

/// Pinhole camera with Brown-Conrady distortion and `FxFyCxCySkew` intrinsics.
pub type PinholeCamera = Camera<f64, Pinhole, BrownConrady5<f64>, FxFyCxCySkew<f64>>;
