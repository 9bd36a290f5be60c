use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimError {
    #[error("invalid bounds for dimension {dim}: [{lo}, {hi}]")]
    InvalidBounds { dim: usize, lo: f64, hi: f64 },
    #[error("objective was never finite over {evaluations} evaluations")]
    NoFiniteEvaluation { evaluations: usize },
    #[error("need at least {required} residuals, got {found}")]
    NotEnoughResiduals { required: usize, found: usize },
    #[error("solver did not converge: {0}")]
    NonConvergence(String),
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}
