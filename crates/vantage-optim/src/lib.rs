//! Numerical optimization used by pose search.
//!
//! - [`NllsProblem`] / [`LmBackend`]: dense Levenberg-Marquardt least squares.
//! - [`differential_evolution`]: bounded global minimization of a scalar
//!   objective, with optional parallel population evaluation.
//! - [`latin_hypercube`]: space-filling seeds for multi-start search.
//! - [`refine_pose`]: reprojection-error refinement of a camera pose.
//! - [`refine_position`]: least-squares refinement of a camera position.

pub mod backend_lm;
pub mod de;
pub mod error;
pub mod jacobian;
pub mod pose_refine;
pub mod position_refine;
pub mod sampling;
pub mod traits;

pub use backend_lm::LmBackend;
pub use de::{differential_evolution, DeOptions, DeResult};
pub use error::OptimError;
pub use jacobian::central_difference_jacobian;
pub use pose_refine::{refine_pose, reprojection_errors, PoseRefineReport};
pub use position_refine::{refine_position, PositionRefineReport};
pub use sampling::latin_hypercube;
pub use traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
