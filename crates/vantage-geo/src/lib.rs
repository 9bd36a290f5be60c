//! Site geometry for `vantage-rs`: where things are on the ground.
//!
//! - [`GeoTransformer`]: geodetic (WGS84 lon/lat) ↔ metric (UTM) conversion.
//! - [`DemGrid`]: raster elevation model with bilinear lookup and extents.
//! - [`ControlPointSet`]: pixel ↔ ground correspondences built from feature records.
//! - [`CandidateCameraLocation`]: catalog of plausible camera stations.
//! - [`Site`] / [`SiteCache`]: a transformer + DEM pair shared by reference.
//!
//! Metric positions use (easting, northing, elevation) in meters; geodetic
//! positions use (longitude, latitude) in degrees. The two are never mixed
//! implicitly: [`GeoPoint`] carries its [`Frame`].

mod catalog;
mod control;
mod dem;
mod error;
mod geotiff;
mod site;
mod transform;

pub use catalog::*;
pub use control::*;
pub use dem::*;
pub use error::*;
pub use site::*;
pub use transform::*;
