use std::fs::File;
use std::sync::Arc;

use anyhow::Result;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use vantage_geo::{
    place_candidates, CameraLocationRecord, ControlPoint, ControlPointOptions, ControlPointSet,
    DemGrid, FeatureRecord, GeoError, GeoTransformer, RasterTransform, Site, SiteCache, UtmZone,
};

// 21x21 lattice over lon [119.0, 119.02], lat [26.0, 26.02]; z rises 1 m per column.
fn ramp_samples() -> Vec<f64> {
    (0..21)
        .flat_map(|_| (0..21).map(|c| 100.0 + c as f64))
        .collect()
}

fn ramp_transform() -> RasterTransform {
    RasterTransform {
        origin_x: 119.0,
        origin_y: 26.02,
        pixel_width: 0.001,
        pixel_height: -0.001,
    }
}

fn ramp_site() -> Site {
    let geo = GeoTransformer::new(UtmZone::default()).unwrap();
    let dem =
        DemGrid::from_samples(21, 21, ramp_samples(), ramp_transform(), None, &geo).unwrap();
    Site::new(Arc::new(geo), Arc::new(dem))
}

fn feature(id: i64, px: (f64, f64), lon: f64, lat: f64, elevation: Option<f64>) -> FeatureRecord {
    FeatureRecord {
        id,
        pixel_x: px.0,
        pixel_y: px.1,
        symbol: format!("P{id}"),
        name: format!("point {id}"),
        longitude: lon,
        latitude: lat,
        elevation,
    }
}

#[test]
fn unobserved_points_stay_in_catalog_but_not_in_fit_set() {
    let site = ramp_site();
    let features = vec![
        feature(1, (120.0, 340.0), 119.005, 26.01, None),
        feature(2, (0.0, 0.0), 119.010, 26.01, None),
        feature(3, (410.0, 95.0), 119.015, 26.005, None),
    ];
    let set = ControlPointSet::build(&features, &site, &ControlPointOptions::default());

    assert_eq!(set.len(), 3);
    assert_eq!(set.observed().count(), 2);
    let corr = set.correspondences();
    assert_eq!(corr.len(), 2);
    assert!(set.all()[1].pixel.is_none());
    // Elevation resolved from the DEM (column 5 -> 105 m).
    assert!((set.all()[0].position.z - 105.0).abs() < 1e-6);
}

#[test]
fn rows_outside_dem_are_skipped_not_fatal() {
    let site = ramp_site();
    let features = vec![
        feature(1, (10.0, 10.0), 119.005, 26.01, None),
        feature(2, (20.0, 20.0), 121.0, 26.01, None),
        feature(3, (30.0, 30.0), f64::NAN, 26.01, None),
    ];
    let set = ControlPointSet::build(&features, &site, &ControlPointOptions::default());
    assert_eq!(set.len(), 1);
    assert_eq!(set.all()[0].id, 1);
}

#[test]
fn unresolvable_rows_report_typed_errors() {
    let site = ramp_site();
    let opts = ControlPointOptions::default();

    let bad_pixel = feature(4, (f64::INFINITY, 12.0), 119.005, 26.01, None);
    let err = ControlPoint::from_feature(&bad_pixel, &site, &opts).unwrap_err();
    assert!(matches!(err, GeoError::InvalidFeature { id: 4, .. }));

    let outside = feature(5, (10.0, 10.0), 121.0, 26.01, None);
    let err = ControlPoint::from_feature(&outside, &site, &opts).unwrap_err();
    assert!(matches!(err, GeoError::OutOfBounds { .. }));

    let zero_scale = ControlPointOptions {
        pixel_scale: 0.0,
        ..Default::default()
    };
    let ok_row = feature(6, (10.0, 10.0), 119.005, 26.01, None);
    let err = ControlPoint::from_feature(&ok_row, &site, &zero_scale).unwrap_err();
    assert!(matches!(err, GeoError::InvalidFeature { id: 6, .. }));
}

#[test]
fn pixel_scale_and_supplied_elevation() {
    let site = ramp_site();
    let features = vec![feature(7, (200.0, 100.0), 119.01, 26.01, Some(250.0))];

    let dem_first = ControlPointSet::build(&features, &site, &ControlPointOptions::default());
    assert!((dem_first.all()[0].position.z - 110.0).abs() < 1e-6);

    let opts = ControlPointOptions {
        pixel_scale: 2.0,
        prefer_supplied_elevation: true,
    };
    let supplied = ControlPointSet::build(&features, &site, &opts);
    let p = &supplied.all()[0];
    assert_eq!(p.position.z, 250.0);
    let px = p.pixel.unwrap();
    assert_eq!((px.x, px.y), (100.0, 50.0));
}

#[test]
fn candidates_stand_at_eye_height() {
    let site = ramp_site();
    let records = vec![
        CameraLocationRecord {
            grid_code: 3,
            longitude: 119.002,
            latitude: 26.01,
        },
        CameraLocationRecord {
            grid_code: 1,
            longitude: 130.0,
            latitude: 26.01,
        },
        CameraLocationRecord {
            grid_code: 2,
            longitude: 119.02,
            latitude: 26.0,
        },
    ];
    let cands = place_candidates(&records, &site, 1.5);
    assert_eq!(cands.len(), 2);
    assert_eq!(cands[0].index, 0);
    assert_eq!(cands[1].index, 2);
    assert!((cands[0].position.z - 103.5).abs() < 1e-6);
    assert!((cands[1].position.z - 121.5).abs() < 1e-6);
}

fn write_ramp_geotiff(path: &std::path::Path) -> Result<()> {
    let mut encoder = TiffEncoder::new(File::create(path)?)?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(21, 21)?;
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[0.001_f64, 0.001, 0.0][..])?;
    image.encoder().write_tag(
        Tag::ModelTiepointTag,
        &[0.0_f64, 0.0, 0.0, 119.0, 26.02, 0.0][..],
    )?;
    image.encoder().write_tag(Tag::GdalNodata, "-9999")?;
    let data: Vec<f32> = ramp_samples().into_iter().map(|v| v as f32).collect();
    image.write_data(&data)?;
    Ok(())
}

#[test]
fn geotiff_roundtrip_through_site_cache() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ramp.tif");
    write_ramp_geotiff(&path)?;

    let cache = SiteCache::new();
    let site = cache.get_or_load(&path, UtmZone::default())?;
    let again = cache.get_or_load(&path, UtmZone::default())?;
    assert_eq!(cache.len(), 1);
    assert_eq!(site.dem().rows(), 21);
    assert_eq!(site.dem().nodata(), Some(-9999.0));
    assert_eq!(site.dem().elevation_range(), (100.0, 120.0));

    let z = site.dem().elevation_at_geodetic(119.0105, 26.01)?;
    assert!((z - 110.5).abs() < 1e-4, "z={z}");
    let z2 = again.dem().elevation_at_geodetic(119.0105, 26.01)?;
    assert_eq!(z, z2);
    Ok(())
}
