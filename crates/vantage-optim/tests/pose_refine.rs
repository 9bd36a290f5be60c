use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use vantage_core::synthetic::{
    noise::UniformPixelNoise,
    terrain::{east_facing_rotation, landmark_field, TerrainScene},
};
use vantage_core::{FxFyCxCySkew, Pt3};
use vantage_optim::{refine_pose, SolveOptions};

fn scene() -> TerrainScene {
    let center = Pt3::new(400_000.0, 2_900_000.0, 120.0);
    let k = FxFyCxCySkew::from_physical(150.0, (127.0, 178.0), (1600.0, 2240.0));
    TerrainScene::new(
        center,
        east_facing_rotation(-0.05, 0.04, 0.0),
        k,
        landmark_field(&center, 10, 21),
        UniformPixelNoise::default(),
    )
    .unwrap()
}

#[test]
fn refinement_recovers_perturbed_pose() {
    let s = scene();
    let gt = s.cam_se3_world;

    // Perturb in the camera frame so the centre moves a few meters, not kilometers.
    let init = Isometry3::from_parts(
        Translation3::new(3.0, -2.0, 4.0),
        UnitQuaternion::from_scaled_axis(Vector3::new(0.01, -0.015, 0.005)),
    ) * gt;
    let center = |p: &vantage_core::Iso3| p.inverse().translation.vector;
    let start_offset = (center(&init) - center(&gt)).norm();
    assert!(start_offset > 1.0 && start_offset < 100.0);

    let report =
        refine_pose(&s.world, &s.pixels, &s.camera, &init, &SolveOptions::default()).unwrap();
    assert!(report.converged);
    assert!(report.stats.mean < 1e-3, "mean error {}", report.stats.mean);
    assert_eq!(report.stats.count, 10);

    let dc = (center(&report.pose) - center(&gt)).norm();
    assert!(dc < 0.05, "camera centre off by {dc} m");
}

#[test]
fn too_few_points_is_an_error() {
    let s = scene();
    assert!(refine_pose(
        &s.world[..2],
        &s.pixels[..2],
        &s.camera,
        &s.cam_se3_world,
        &SolveOptions::default()
    )
    .is_err());
}
