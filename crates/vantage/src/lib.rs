//! High-level entry crate for `vantage-rs`.
//!
//! Recovers where a historical photograph was taken from, given labelled
//! landmarks, a DEM and optionally a catalog of candidate camera stations.
//!
//! ```no_run
//! use vantage::prelude::*;
//!
//! # fn main() -> Result<(), PoseError> {
//! let sites = SiteCache::new();
//! let features: Vec<FeatureRecord> = /* load labelled landmarks */
//! # vec![];
//! let stations: Vec<CameraLocationRecord> = /* load station catalog */
//! # vec![];
//!
//! let config = PoseConfig::default();
//! let report = vantage::locate(&sites, "dem.tif", &features, &stations, None, &config)?;
//! println!("{:?}", report.pose.geodetic());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

/// Math types, camera models, RANSAC and synthetic scenes.
pub mod core {
    pub use vantage_core::*;
}

/// Coordinate transforms, DEM sampling, control points and station catalogs.
pub mod geo {
    pub use vantage_geo::*;
}

/// Bearing homography and EPnP solvers.
pub mod linear {
    pub use vantage_linear::*;
}

/// Levenberg-Marquardt, differential evolution and sampling.
pub mod optim {
    pub use vantage_optim::*;
}

/// Pose search strategies, ray casting and reprojection.
pub mod pipeline {
    pub use vantage_pipeline::*;
}

/// `use vantage::prelude::*;` for the common types.
pub mod prelude {
    pub use crate::core::{Correspondence, FxFyCxCySkew, Pt2, Pt3, Vec3};
    pub use crate::geo::{
        CameraLocationRecord, ControlPointSet, FeatureRecord, GeoPoint, GeoTransformer, Site,
        SiteCache, UtmZone,
    };
    pub use crate::pipeline::{
        estimate_pose, locate_pixel, overlay, project_points, CameraPose, OverlayPoint,
        PoseConfig, PoseError, PoseRequest, RayCastOptions, RayHit, SearchStrategy,
    };
    pub use crate::{locate, LocateReport};
}

use vantage_core::{Pt3, Real};
use vantage_geo::{CameraLocationRecord, FeatureRecord, SiteCache};
use vantage_pipeline::{
    estimate_pose, overlay, CameraPose, OverlayPoint, PoseConfig, PoseError, PoseRequest,
};

/// Pose of one photograph and the catalog drawn over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateReport {
    pub pose: CameraPose,
    pub image_size: (Real, Real),
    pub overlay: Vec<OverlayPoint>,
}

/// Load (or reuse) the site for `dem`, build the request from raw records
/// and estimate the pose.
///
/// DEM failures surface as [`PoseError::Geo`].
pub fn locate(
    sites: &SiteCache,
    dem: impl AsRef<Path>,
    features: &[FeatureRecord],
    stations: &[CameraLocationRecord],
    initial_position: Option<Pt3>,
    config: &PoseConfig,
) -> Result<LocateReport, PoseError> {
    let site = sites.get_or_load(dem.as_ref(), config.zone)?;

    let mut request = PoseRequest::from_records(features, stations, &site, config);
    request.initial_position = initial_position;
    request.image_size = config.fit.image_size;
    info!(
        "{} control points ({} observed), {} stations",
        request.control.len(),
        request.control.observed().count(),
        request.candidates.len()
    );

    let pose = estimate_pose(&request, &site, config)?;
    let image_size = match &pose {
        CameraPose::Perspective(p) => p.image_size,
        CameraPose::Homography(_) => request.image_size_or_inferred(),
    };
    let overlay = overlay(&pose, request.control.all(), image_size);
    Ok(LocateReport {
        pose,
        image_size,
        overlay,
    })
}
