use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use serde::{Deserialize, Serialize};
use vantage::core::{Pt2, Pt3};
use vantage::geo::{
    CameraLocationRecord, ControlPointSet, FeatureRecord, GeoPoint, Site, SiteCache,
};
use vantage::pipeline::{locate_pixel, project_with, PoseConfig, RayHit};
use vantage::LocateReport;

/// Camera pose recovery for historical photographs.
#[derive(Debug, Parser)]
#[command(author, version, about = "Locate where a historical photograph was taken")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Estimate the camera pose from labelled landmarks.
    Locate {
        /// JSON array of feature records.
        #[arg(long)]
        features: String,
        /// GeoTIFF DEM covering the site.
        #[arg(long)]
        dem: String,
        /// Optional JSON array of candidate camera locations.
        #[arg(long)]
        locations: Option<String>,
        /// Optional JSON PoseConfig. Defaults are used if omitted.
        #[arg(long)]
        config: Option<String>,
        /// Continuous-search centre as `lon,lat`; placed at eye height above the DEM.
        #[arg(long, value_parser = parse_pair)]
        initial: Option<(f64, f64)>,
        /// Photograph size as `width,height` in pixels.
        #[arg(long, value_parser = parse_pair)]
        image_size: Option<(f64, f64)>,
    },
    /// Cast pixels onto the terrain under a perspective pose.
    PixelToGeo {
        /// Report written by `locate`.
        #[arg(long)]
        report: String,
        #[arg(long)]
        dem: String,
        /// Feature records used as ground control for the ray correction.
        #[arg(long)]
        features: String,
        #[arg(long)]
        config: Option<String>,
        /// Pixel as `x,y`; repeatable.
        #[arg(long = "pixel", value_parser = parse_pair, required = true)]
        pixels: Vec<(f64, f64)>,
    },
    /// Project geodetic points into the photograph.
    Project {
        #[arg(long)]
        report: String,
        #[arg(long)]
        dem: String,
        /// JSON array of points (`frame`, `x`, `y`, optional `elevation`).
        #[arg(long)]
        points: String,
        #[arg(long)]
        config: Option<String>,
    },
}

/// One cast pixel.
#[derive(Debug, Serialize, Deserialize)]
struct PixelHit {
    pixel: Pt2,
    hit: RayHit,
}

/// One projected point; `pixel` is `None` behind the camera.
#[derive(Debug, Serialize, Deserialize)]
struct ProjectedPoint {
    point: GeoPoint,
    pixel: Option<Pt2>,
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `a,b`, got `{s}`"))?;
    let a = a.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let b = b.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok((a, b))
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn load_config(path: Option<&str>) -> Result<PoseConfig> {
    match path {
        Some(p) => load_json_file(Path::new(p)),
        None => Ok(PoseConfig::default()),
    }
}

fn eye_level_position(site: &Site, lon: f64, lat: f64, eye_height: f64) -> Result<Pt3> {
    let ground = site.ground_point(lon, lat)?;
    Ok(Pt3::new(ground.x, ground.y, ground.z + eye_height))
}

fn run_locate_from_files(
    sites: &SiteCache,
    features_path: &str,
    dem_path: &str,
    locations_path: Option<&str>,
    config_path: Option<&str>,
    initial: Option<(f64, f64)>,
    image_size: Option<(f64, f64)>,
) -> Result<String> {
    let features: Vec<FeatureRecord> = load_json_file(Path::new(features_path))?;
    let locations: Vec<CameraLocationRecord> = match locations_path {
        Some(p) => load_json_file(Path::new(p))?,
        None => Vec::new(),
    };
    let mut config = load_config(config_path)?;
    if image_size.is_some() {
        config.fit.image_size = image_size;
    }

    let initial_position = match initial {
        Some((lon, lat)) => {
            let site = sites.get_or_load(dem_path, config.zone)?;
            Some(eye_level_position(&site, lon, lat, config.eye_height)?)
        }
        None => None,
    };

    let report = vantage::locate(
        sites,
        dem_path,
        &features,
        &locations,
        initial_position,
        &config,
    )?;
    Ok(serde_json::to_string_pretty(&report)?)
}

fn run_pixel_to_geo_from_files(
    sites: &SiteCache,
    report_path: &str,
    dem_path: &str,
    features_path: &str,
    config_path: Option<&str>,
    pixels: &[(f64, f64)],
) -> Result<String> {
    let report: LocateReport = load_json_file(Path::new(report_path))?;
    let features: Vec<FeatureRecord> = load_json_file(Path::new(features_path))?;
    let config = load_config(config_path)?;
    let site = sites.get_or_load(dem_path, config.zone)?;
    let control = ControlPointSet::build(&features, &site, &config.control);

    let mut hits = Vec::with_capacity(pixels.len());
    for &(x, y) in pixels {
        let pixel = Pt2::new(x, y);
        let hit = locate_pixel(&report.pose, &pixel, &site, &control, &config.ray)?;
        debug!("pixel ({x}, {y}) -> {:?} after {} steps", hit.position, hit.steps);
        hits.push(PixelHit { pixel, hit });
    }
    Ok(serde_json::to_string_pretty(&hits)?)
}

fn run_project_from_files(
    sites: &SiteCache,
    report_path: &str,
    dem_path: &str,
    points_path: &str,
    config_path: Option<&str>,
) -> Result<String> {
    let report: LocateReport = load_json_file(Path::new(report_path))?;
    let points: Vec<GeoPoint> = load_json_file(Path::new(points_path))?;
    if points.is_empty() {
        bail!("no points to project in {points_path}");
    }
    let config = load_config(config_path)?;
    let site = sites.get_or_load(dem_path, config.zone)?;

    let mut projected = Vec::with_capacity(points.len());
    for point in points {
        let world = site.metric_point(&point)?;
        projected.push(ProjectedPoint {
            point,
            pixel: project_with(&report.pose, &world),
        });
    }
    Ok(serde_json::to_string_pretty(&projected)?)
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();
    let sites = SiteCache::new();
    let json = match &args.command {
        Command::Locate {
            features,
            dem,
            locations,
            config,
            initial,
            image_size,
        } => run_locate_from_files(
            &sites,
            features,
            dem,
            locations.as_deref(),
            config.as_deref(),
            *initial,
            *image_size,
        )?,
        Command::PixelToGeo {
            report,
            dem,
            features,
            config,
            pixels,
        } => run_pixel_to_geo_from_files(
            &sites,
            report,
            dem,
            features,
            config.as_deref(),
            pixels,
        )?,
        Command::Project {
            report,
            dem,
            points,
            config,
        } => run_project_from_files(&sites, report, dem, points, config.as_deref())?,
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::{tempdir, NamedTempFile};
    use tiff::encoder::{colortype, TiffEncoder};
    use tiff::tags::Tag;
    use vantage::core::synthetic::{
        noise::UniformPixelNoise,
        terrain::{east_facing_rotation, landmark_field, TerrainScene},
    };
    use vantage::core::{FxFyCxCySkew, Vec3};
    use vantage::geo::{GeoTransformer, UtmZone};
    use vantage::pipeline::{
        CameraPose, PerspectiveSearchOptions, PoseMode, SearchStrategy, SearchTrace,
    };

    const EAST: f64 = 400_000.0;
    const NORTH: f64 = 2_900_000.0;
    const GROUND: f32 = 10.0;

    fn write_json<T: serde::Serialize>(value: &T, path: &Path) {
        serde_json::to_writer_pretty(fs::File::create(path).unwrap(), value).unwrap();
    }

    fn geo() -> GeoTransformer {
        GeoTransformer::new(UtmZone::default()).unwrap()
    }

    // Flat 41x41 DEM at 10 m, 0.001 deg spacing, centred on the camera.
    fn write_flat_dem(path: &Path) {
        let (lon, lat) = geo().to_geodetic(EAST, NORTH).unwrap();
        let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
        let mut image = encoder.new_image::<colortype::Gray32Float>(41, 41).unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[0.001_f64, 0.001, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(
                Tag::ModelTiepointTag,
                &[0.0_f64, 0.0, 0.0, lon - 0.02, lat + 0.02, 0.0][..],
            )
            .unwrap();
        image.write_data(&vec![GROUND; 41 * 41]).unwrap();
    }

    // Camera at eye height over the flat ground, looking east.
    fn scene() -> TerrainScene {
        let center = Pt3::new(EAST, NORTH, GROUND as f64 + 1.5);
        let k = FxFyCxCySkew::from_physical(90.0, (203.0, 254.0), (2030.0, 2540.0));
        TerrainScene::new(
            center,
            east_facing_rotation(0.06, -0.04, 0.01),
            k,
            landmark_field(&center, 12, 17),
            UniformPixelNoise::default(),
        )
        .unwrap()
    }

    fn features(scene: &TerrainScene) -> Vec<FeatureRecord> {
        let geo = geo();
        scene
            .world
            .iter()
            .zip(&scene.pixels)
            .enumerate()
            .map(|(i, (w, px))| {
                let (lon, lat) = geo.to_geodetic(w.x, w.y).unwrap();
                FeatureRecord {
                    id: i as i64,
                    pixel_x: px.x,
                    pixel_y: px.y,
                    symbol: format!("S{i}"),
                    name: format!("summit {i}"),
                    longitude: lon,
                    latitude: lat,
                    elevation: Some(w.z),
                }
            })
            .collect()
    }

    fn locations() -> Vec<CameraLocationRecord> {
        let geo = geo();
        [Vec3::new(-300.0, 0.0, 0.0), Vec3::zeros(), Vec3::new(0.0, 250.0, 0.0)]
            .iter()
            .map(|d| {
                let (lon, lat) = geo.to_geodetic(EAST + d.x, NORTH + d.y).unwrap();
                CameraLocationRecord {
                    grid_code: 1,
                    longitude: lon,
                    latitude: lat,
                }
            })
            .collect()
    }

    fn config(strategy: SearchStrategy) -> PoseConfig {
        let mut config = PoseConfig {
            strategy,
            ..Default::default()
        };
        config.control.prefer_supplied_elevation = true;
        config
    }

    #[test]
    fn parse_pair_accepts_spaces_and_rejects_garbage() {
        assert_eq!(parse_pair("12.5, -3").unwrap(), (12.5, -3.0));
        assert!(parse_pair("12.5").is_err());
        assert!(parse_pair("a,b").is_err());
    }

    #[test]
    fn locate_helper_picks_true_station() {
        let dir = tempdir().unwrap();
        let dem = dir.path().join("flat.tif");
        write_flat_dem(&dem);
        let features_file = NamedTempFile::new().unwrap();
        let locations_file = NamedTempFile::new().unwrap();
        let config_file = NamedTempFile::new().unwrap();
        write_json(&features(&scene()), features_file.path());
        write_json(&locations(), locations_file.path());
        write_json(&config(SearchStrategy::default()), config_file.path());

        let sites = SiteCache::new();
        let json = run_locate_from_files(
            &sites,
            features_file.path().to_str().unwrap(),
            dem.to_str().unwrap(),
            Some(locations_file.path().to_str().unwrap()),
            Some(config_file.path().to_str().unwrap()),
            None,
            Some((2030.0, 2540.0)),
        )
        .expect("cli helper should succeed");

        let report: LocateReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.pose.mode(), PoseMode::Homography);
        let CameraPose::Homography(h) = &report.pose else {
            unreachable!()
        };
        let SearchTrace::Grid { best_candidate, .. } = &h.trace else {
            panic!("expected a grid trace");
        };
        assert_eq!(*best_candidate, 1);
        let p = report.pose.position();
        assert!((p.x - EAST).abs() < 1e-3 && (p.y - NORTH).abs() < 1e-3);
        assert!((p.z - 11.5).abs() < 1e-6);
        assert_eq!(report.overlay.len(), 12);
    }

    #[test]
    fn perspective_report_feeds_project_and_pixel_to_geo() {
        let dir = tempdir().unwrap();
        let dem = dir.path().join("flat.tif");
        write_flat_dem(&dem);
        let s = scene();
        let features_file = NamedTempFile::new().unwrap();
        let config_file = NamedTempFile::new().unwrap();
        write_json(&features(&s), features_file.path());
        let strategy = SearchStrategy::Perspective(PerspectiveSearchOptions {
            focal_lengths_mm: vec![90.0],
            sensor_sizes_mm: vec![(203.0, 254.0)],
            ..Default::default()
        });
        write_json(&config(strategy), config_file.path());

        let sites = SiteCache::new();
        let json = run_locate_from_files(
            &sites,
            features_file.path().to_str().unwrap(),
            dem.to_str().unwrap(),
            None,
            Some(config_file.path().to_str().unwrap()),
            None,
            Some((2030.0, 2540.0)),
        )
        .unwrap();
        let report_file = NamedTempFile::new().unwrap();
        fs::write(report_file.path(), &json).unwrap();
        let report: LocateReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.pose.mode(), PoseMode::Perspective);
        assert!((report.pose.position() - s.camera_center).norm() < 1.0);

        // Landmark 0 projects back onto its labelled pixel.
        let (lon, lat) = geo().to_geodetic(s.world[0].x, s.world[0].y).unwrap();
        let points = vec![GeoPoint::geodetic(lon, lat).with_elevation(s.world[0].z)];
        let points_file = NamedTempFile::new().unwrap();
        write_json(&points, points_file.path());
        let json = run_project_from_files(
            &sites,
            report_file.path().to_str().unwrap(),
            dem.to_str().unwrap(),
            points_file.path().to_str().unwrap(),
            Some(config_file.path().to_str().unwrap()),
        )
        .unwrap();
        let projected: Vec<ProjectedPoint> = serde_json::from_str(&json).unwrap();
        let px = projected[0].pixel.unwrap();
        assert!((px - s.pixels[0]).norm() < 1.0);

        // A pixel below the horizon lands on the terrain.
        let json = run_pixel_to_geo_from_files(
            &sites,
            report_file.path().to_str().unwrap(),
            dem.to_str().unwrap(),
            features_file.path().to_str().unwrap(),
            Some(config_file.path().to_str().unwrap()),
            &[(1015.0, 2400.0)],
        )
        .unwrap();
        let hits: Vec<PixelHit> = serde_json::from_str(&json).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].hit.position.is_some());
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn missing_features_file_is_an_error() {
        let sites = SiteCache::new();
        let err = run_locate_from_files(
            &sites,
            "/nonexistent/features.json",
            "/nonexistent/dem.tif",
            None,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("features.json"));
    }
}
