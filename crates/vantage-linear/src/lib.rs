//! Closed-form solvers used by pose search.
//!
//! - [`HomographySolver`]: normalized DLT homography with a RANSAC wrapper.
//! - [`fit_bearing_homography`]: the bearing → pixel homography of a
//!   candidate camera position and its two error scores.
//! - [`PnpSolver`]: EPnP camera pose from 3D-2D correspondences.
//!
//! All solvers are pure functions of their inputs; none keeps state between
//! calls, so pose search can evaluate them from several threads at once.

pub mod bearing;
pub mod homography;
pub mod math;
pub mod pnp;

pub use bearing::*;
pub use homography::*;
pub use pnp::{
    camera_center, epnp_ransac, uncenter, PnpError, PnpSolver, EPNP_RANSAC_SAMPLES,
};
