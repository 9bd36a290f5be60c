use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by coordinate conversion and elevation lookup.
#[derive(Debug, Error)]
pub enum GeoError {
    /// A projection definition could not be constructed.
    #[error("invalid projection definition `{definition}`: {reason}")]
    ProjectionSetup { definition: String, reason: String },
    /// A transform produced a non-finite result or was rejected by the projection.
    #[error("coordinate transform failed for ({x}, {y}): {reason}")]
    CoordinateTransform { x: f64, y: f64, reason: String },
    /// The raster could not be opened or decoded.
    #[error("failed to load DEM {}: {reason}", path.display())]
    DemLoad { path: PathBuf, reason: String },
    /// Raster dimensions, samples or geotransform are inconsistent.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),
    /// A feature row carries an unusable pixel or scale.
    #[error("feature {id}: {reason}")]
    InvalidFeature { id: i64, reason: String },
    /// Query coordinate lies outside DEM coverage (or on a no-data cell).
    #[error("({lon:.7}, {lat:.7}) is outside DEM coverage")]
    OutOfBounds { lon: f64, lat: f64 },
}
