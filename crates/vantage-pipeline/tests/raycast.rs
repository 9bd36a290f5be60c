use std::sync::Arc;

use vantage_core::synthetic::terrain::east_facing_rotation;
use vantage_core::{Correspondence, FxFyCxCySkew, Mat3, Pt2, Pt3};
use vantage_geo::{DemGrid, GeoTransformer, RasterTransform, Site, UtmZone};
use vantage_pipeline::{pixel_to_geo, RayCamera, RayCastOptions};

const Z0: f64 = 10.0;

fn flat_site(e: f64, n: f64) -> Site {
    let geo = GeoTransformer::new(UtmZone::default()).unwrap();
    let (lon, lat) = geo.to_geodetic(e, n).unwrap();
    let t = RasterTransform {
        origin_x: lon - 0.02,
        origin_y: lat + 0.02,
        pixel_width: 0.001,
        pixel_height: -0.001,
    };
    let dem = DemGrid::from_samples(41, 41, vec![Z0; 41 * 41], t, None, &geo).unwrap();
    Site::new(Arc::new(geo), Arc::new(dem))
}

fn intrinsics() -> FxFyCxCySkew<f64> {
    FxFyCxCySkew::from_physical(150.0, (127.0, 178.0), (1270.0, 1780.0))
}

// Camera z axis points down.
fn nadir() -> Mat3 {
    Mat3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0)
}

fn project(k: &FxFyCxCySkew<f64>, r: &Mat3, origin: &Pt3, p: &Pt3) -> Pt2 {
    let pc = r * (p - origin);
    let v = k.k_matrix() * (pc / pc.z);
    Pt2::new(v.x, v.y)
}

#[test]
fn nadir_ray_hits_flat_ground_after_expected_steps() {
    let origin = Pt3::new(400_000.0, 2_900_000.0, 110.0);
    let site = flat_site(origin.x, origin.y);
    let k = intrinsics();
    let r = nadir();
    let camera = RayCamera {
        intrinsics: &k,
        rotation: &r,
        origin: &origin,
    };

    let principal = Pt2::new(k.cx, k.cy);
    let hit = pixel_to_geo(&principal, &camera, &site, &[], &RayCastOptions::default()).unwrap();
    assert_eq!(hit.steps, 100);
    let p = hit.position.unwrap();
    assert!((p.z - Z0).abs() < 1e-9);
    assert!((p.x - origin.x).abs() < 1e-6 && (p.y - origin.y).abs() < 1e-6);
    assert!(hit.geodetic.is_some());
}

#[test]
fn consistent_control_points_leave_the_ray_unchanged() {
    let origin = Pt3::new(400_000.0, 2_900_000.0, 110.0);
    let site = flat_site(origin.x, origin.y);
    let k = intrinsics();
    let r = nadir();
    let camera = RayCamera {
        intrinsics: &k,
        rotation: &r,
        origin: &origin,
    };
    let control: Vec<Correspondence> = [(30.0, 20.0), (-25.0, 15.0), (10.0, -35.0), (-40.0, -30.0)]
        .iter()
        .map(|&(de, dn)| {
            let w = Pt3::new(origin.x + de, origin.y + dn, Z0);
            Correspondence::new(project(&k, &r, &origin, &w), w)
        })
        .collect();

    let target = Pt3::new(origin.x + 12.0, origin.y - 8.0, Z0);
    let pixel = project(&k, &r, &origin, &target);
    let hit = pixel_to_geo(&pixel, &camera, &site, &control, &RayCastOptions::default()).unwrap();
    let p = hit.position.unwrap();
    assert!((p.x - target.x).abs() < 1.0 && (p.y - target.y).abs() < 1.0);
    assert!((p.z - Z0).abs() < 1e-9);
}

#[test]
fn horizontal_ray_leaves_dem_without_hit() {
    let origin = Pt3::new(400_000.0, 2_900_000.0, 500.0);
    let site = flat_site(origin.x, origin.y);
    let k = intrinsics();
    let r = *east_facing_rotation(0.0, 0.0, 0.0).matrix();
    let camera = RayCamera {
        intrinsics: &k,
        rotation: &r,
        origin: &origin,
    };
    let opts = RayCastOptions::default();
    let hit = pixel_to_geo(&Pt2::new(k.cx, k.cy), &camera, &site, &[], &opts).unwrap();
    assert!(hit.position.is_none());
    assert!(hit.steps > opts.min_steps && hit.steps < 5000);
}

#[test]
fn non_positive_step_is_rejected() {
    let origin = Pt3::new(400_000.0, 2_900_000.0, 110.0);
    let site = flat_site(origin.x, origin.y);
    let k = intrinsics();
    let r = nadir();
    let camera = RayCamera {
        intrinsics: &k,
        rotation: &r,
        origin: &origin,
    };
    let opts = RayCastOptions {
        step: 0.0,
        ..Default::default()
    };
    assert!(pixel_to_geo(&Pt2::new(k.cx, k.cy), &camera, &site, &[], &opts).is_err());
}
