//! Core math and geometry primitives for `vantage-rs`.
//!
//! This crate provides the foundational building blocks used by all other
//! crates in the workspace:
//!
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, and friends),
//! - composable camera models (projection + distortion + intrinsics),
//! - a deterministic, model-agnostic RANSAC engine,
//! - robust loss kernels,
//! - the pixel/ground [`Correspondence`] type shared by every solver.
//!
//! Camera pipeline (conceptually):
//! `pixel = intrinsics(distortion(projection(dir)))`
//!
//! # Modules
//!
//! - [`math`]: basic type aliases and homogeneous helpers.
//! - [`models`]: camera model traits and parameter structs.
//! - [`ransac`]: generic robust estimation helpers.
//! - [`robust`]: Huber loss for scoring fits.
//! - [`synthetic`]: deterministic terrain scenes for tests and benchmarks.
//!
//! # Example
//!
//! ```no_run
//! use vantage_core::{BrownConrady5, Camera, FxFyCxCySkew, Pinhole, Pt3};
//!
//! // 150 mm lens on a 127x178 mm plate scanned at 1600x2240 px.
//! let k = FxFyCxCySkew::from_physical(150.0, (127.0, 178.0), (1600.0, 2240.0));
//! let cam = Camera::new(Pinhole, BrownConrady5::default(), k);
//!
//! let px = cam.project_point(&Pt3::new(0.1, -0.2, 4.0)).unwrap();
//! assert!(px.x > 0.0);
//! ```

pub mod math;
pub mod models;
pub mod ransac;
pub mod robust;
pub mod synthetic;
mod types;

pub use math::*;
pub use models::*;
pub use ransac::*;
pub use robust::*;
pub use types::*;
