//! Pose-search configuration. Every struct deserializes from partial JSON;
//! missing fields take the defaults below.

use serde::{Deserialize, Serialize};
use vantage_core::{RansacOptions, Real};
use vantage_geo::{ControlPointOptions, UtmZone, DEFAULT_EYE_HEIGHT};
use vantage_linear::BearingFitOptions;
use vantage_optim::{DeOptions, SolveOptions};

use crate::raycast::RayCastOptions;

/// Weights of the pixel-space and bearing-space scores in a scalar objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    pub pixel: Real,
    pub bearing: Real,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            pixel: 1.0,
            bearing: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchOptions {
    /// Candidates with a lower grid code are not fitted.
    pub min_grid_code: i32,
    /// Score recorded for skipped or failed candidates.
    pub sentinel_error: Real,
}

impl Default for GridSearchOptions {
    fn default() -> Self {
        Self {
            min_grid_code: 0,
            sentinel_error: 1e6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousSearchOptions {
    /// Number of starts, including the initial position.
    pub seeds: usize,
    /// Half-width of the search box in easting and northing (meters).
    pub horizontal_radius: Real,
    /// Half-height of the search box (meters).
    pub vertical_radius: Real,
    pub weights: ObjectiveWeights,
    pub de: DeOptions,
    /// Run local least-squares refinement after each global search.
    pub refine: bool,
    pub local: SolveOptions,
    /// Central-difference step of the local stage (meters).
    pub local_step: Real,
    /// Seed of the Latin hypercube start sampler.
    pub sampling_seed: u64,
}

impl Default for ContinuousSearchOptions {
    fn default() -> Self {
        Self {
            seeds: 8,
            horizontal_radius: 10_000.0,
            vertical_radius: 1_000.0,
            weights: ObjectiveWeights::default(),
            de: DeOptions::default(),
            refine: true,
            local: SolveOptions::default(),
            local_step: 0.01,
            sampling_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveSearchOptions {
    pub focal_lengths_mm: Vec<Real>,
    /// Plate formats as `(width, height)` in millimeters.
    pub sensor_sizes_mm: Vec<(Real, Real)>,
    /// Brown-Conrady coefficients `[k1, k2, p1, p2, k3]` assumed for every trial.
    pub distortion: [Real; 5],
    /// Outlier rejection around EPnP; `thresh` is in pixels. Sets smaller
    /// than the RANSAC sample are solved on every point.
    pub ransac: RansacOptions,
    pub refine: SolveOptions,
}

impl Default for PerspectiveSearchOptions {
    fn default() -> Self {
        Self {
            focal_lengths_mm: vec![90.0, 100.0, 120.0, 150.0, 180.0, 210.0, 240.0, 300.0, 360.0],
            sensor_sizes_mm: vec![(102.0, 127.0), (127.0, 178.0), (203.0, 254.0)],
            distortion: [0.0; 5],
            ransac: RansacOptions::default(),
            refine: SolveOptions::default(),
        }
    }
}

/// Search strategy and its options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchStrategy {
    Grid(GridSearchOptions),
    Continuous(ContinuousSearchOptions),
    Perspective(PerspectiveSearchOptions),
}

impl Default for SearchStrategy {
    fn default() -> Self {
        SearchStrategy::Grid(GridSearchOptions::default())
    }
}

/// Everything a pose estimate depends on besides its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub zone: UtmZone,
    pub control: ControlPointOptions,
    /// Camera height above ground at catalogued stations (meters).
    pub eye_height: Real,
    pub fit: BearingFitOptions,
    pub strategy: SearchStrategy,
    pub ray: RayCastOptions,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            zone: UtmZone::default(),
            control: ControlPointOptions::default(),
            eye_height: DEFAULT_EYE_HEIGHT,
            fit: BearingFitOptions::default(),
            strategy: SearchStrategy::default(),
            ray: RayCastOptions::default(),
        }
    }
}
