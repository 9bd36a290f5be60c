use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::debug;
use vantage_core::Pt3;

use crate::{DemGrid, Frame, GeoError, GeoPoint, GeoTransformer, UtmZone};

/// A coordinate transformer and DEM, shared read-only by every component.
#[derive(Debug, Clone)]
pub struct Site {
    geo: Arc<GeoTransformer>,
    dem: Arc<DemGrid>,
}

impl Site {
    pub fn new(geo: Arc<GeoTransformer>, dem: Arc<DemGrid>) -> Self {
        Self { geo, dem }
    }

    /// Build the transformer for `zone` and load the GeoTIFF at `path`.
    pub fn load(path: impl AsRef<Path>, zone: UtmZone) -> Result<Self, GeoError> {
        let geo = GeoTransformer::new(zone)?;
        let dem = DemGrid::load(path, &geo)?;
        Ok(Self::new(Arc::new(geo), Arc::new(dem)))
    }

    pub fn geo(&self) -> &GeoTransformer {
        &self.geo
    }

    pub fn dem(&self) -> &DemGrid {
        &self.dem
    }

    pub fn elevation_at(&self, point: &GeoPoint) -> Result<f64, GeoError> {
        self.dem.elevation_at(point, &self.geo)
    }

    /// Metric ground position `(easting, northing, DEM elevation)` of a geodetic point.
    pub fn ground_point(&self, lon: f64, lat: f64) -> Result<Pt3, GeoError> {
        let elevation = self.dem.elevation_at_geodetic(lon, lat)?;
        let (e, n) = self.geo.to_metric(lon, lat)?;
        Ok(Pt3::new(e, n, elevation))
    }

    /// Geodetic position of a metric point, elevation carried over from `z`.
    pub fn geodetic_of(&self, p: &Pt3) -> Result<GeoPoint, GeoError> {
        let (lon, lat) = self.geo.to_geodetic(p.x, p.y)?;
        Ok(GeoPoint::geodetic(lon, lat).with_elevation(p.z))
    }

    /// Metric position of a tagged point with elevation filled from the DEM when absent.
    pub fn metric_point(&self, point: &GeoPoint) -> Result<Pt3, GeoError> {
        let m = self.geo.convert(point, Frame::Metric)?;
        let z = match point.elevation {
            Some(z) => z,
            None => self.elevation_at(point)?,
        };
        Ok(Pt3::new(m.x, m.y, z))
    }
}

/// Process-scope memo of loaded sites keyed by DEM path and UTM zone.
#[derive(Debug, Default)]
pub struct SiteCache {
    sites: Mutex<HashMap<(PathBuf, UtmZone), Site>>,
}

impl SiteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached site or load it. The lock is not held during the load.
    pub fn get_or_load(&self, path: impl AsRef<Path>, zone: UtmZone) -> Result<Site, GeoError> {
        let key = (path.as_ref().to_path_buf(), zone);
        if let Some(site) = self.lock().get(&key) {
            debug!("site cache hit for {}", key.0.display());
            return Ok(site.clone());
        }
        let site = Site::load(&key.0, zone)?;
        Ok(self.lock().entry(key).or_insert(site).clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(PathBuf, UtmZone), Site>> {
        // A poisoned map still holds fully built sites.
        self.sites.lock().unwrap_or_else(|e| e.into_inner())
    }
}
