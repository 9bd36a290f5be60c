use thiserror::Error;
use vantage_geo::GeoError;
use vantage_linear::{FitError, MIN_CORRESPONDENCES};
use vantage_optim::OptimError;

/// Failures surfaced to callers of pose estimation.
#[derive(Debug, Error)]
pub enum PoseError {
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error("need at least {required} observed control points, got {found}")]
    InsufficientCorrespondences { required: usize, found: usize },
    #[error("no viable pose: {0}")]
    NoViablePose(String),
    #[error(transparent)]
    SolverNonConvergence(#[from] OptimError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PoseError {
    pub(crate) fn require_correspondences(found: usize) -> Result<(), PoseError> {
        if found < MIN_CORRESPONDENCES {
            return Err(PoseError::InsufficientCorrespondences {
                required: MIN_CORRESPONDENCES,
                found,
            });
        }
        Ok(())
    }
}

impl From<FitError> for PoseError {
    fn from(e: FitError) -> Self {
        match e {
            FitError::InsufficientCorrespondences { required, found } => {
                PoseError::InsufficientCorrespondences { required, found }
            }
            other => PoseError::NoViablePose(other.to_string()),
        }
    }
}
