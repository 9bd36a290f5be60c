//! Synthetic camera-on-terrain scenes.
//!
//! World frame: x = easting, y = northing, z = elevation (meters). The
//! camera looks roughly east, so every landmark has a positive easting
//! offset from the camera centre.

use anyhow::Result;
use nalgebra::Translation3;

use super::noise::{uniform, UniformPixelNoise};
use crate::{
    BrownConrady5, Camera, Correspondence, FxFyCxCySkew, Iso3, Pinhole, PinholeCamera, Pt2, Pt3,
    Real, Rot3,
};

/// Rotation `R_C_W` of a camera looking along +easting.
///
/// Camera axes: x right (south), y down, z forward (east). `yaw`, `pitch`
/// and `roll` perturb that base orientation (radians).
pub fn east_facing_rotation(yaw: Real, pitch: Real, roll: Real) -> Rot3 {
    let base = Rot3::from_matrix_unchecked(crate::Mat3::new(
        0.0, -1.0, 0.0, //
        0.0, 0.0, -1.0, //
        1.0, 0.0, 0.0,
    ));
    Rot3::from_euler_angles(pitch, yaw, roll) * base
}

/// Landmarks in front of an east-facing camera.
///
/// Offsets from `center`: east in `[200, 600)`, north in `[-150, 150)`,
/// height in `[-20, 60)`.
pub fn landmark_field(center: &Pt3, count: usize, seed: u64) -> Vec<Pt3> {
    (0..count)
        .map(|i| {
            Pt3::new(
                center.x + uniform(seed, 0, i, 200.0, 600.0),
                center.y + uniform(seed, 1, i, -150.0, 150.0),
                center.z + uniform(seed, 2, i, -20.0, 60.0),
            )
        })
        .collect()
}

/// Camera pose `T_C_W` from a world-frame centre and rotation `R_C_W`.
pub fn pose_from_center(center: &Pt3, rot_c_w: &Rot3) -> Iso3 {
    let t = -(rot_c_w * center.coords);
    Iso3::from_parts(Translation3::from(t), (*rot_c_w).into())
}

/// A synthetic single-photo scene with exact correspondences.
#[derive(Debug, Clone)]
pub struct TerrainScene {
    pub camera_center: Pt3,
    pub cam_se3_world: Iso3,
    pub camera: PinholeCamera,
    pub world: Vec<Pt3>,
    pub pixels: Vec<Pt2>,
}

impl TerrainScene {
    /// Project `world` through a distortion-free pinhole camera at `center`.
    pub fn new(
        center: Pt3,
        rot_c_w: Rot3,
        k: FxFyCxCySkew<Real>,
        world: Vec<Pt3>,
        noise: UniformPixelNoise,
    ) -> Result<Self> {
        let cam_se3_world = pose_from_center(&center, &rot_c_w);
        let camera = Camera::new(Pinhole, BrownConrady5::default(), k);
        let mut pixels = Vec::with_capacity(world.len());
        for (idx, pw) in world.iter().enumerate() {
            let pc = cam_se3_world.transform_point(pw);
            let Some(uv) = camera.project_point(&pc) else {
                anyhow::bail!("landmark {idx} not projectable (z={:.3})", pc.z);
            };
            pixels.push(uv + noise.sample(idx));
        }
        Ok(Self {
            camera_center: center,
            cam_se3_world,
            camera,
            world,
            pixels,
        })
    }

    pub fn correspondences(&self) -> Vec<Correspondence> {
        self.pixels
            .iter()
            .zip(&self.world)
            .map(|(px, pw)| Correspondence::new(*px, *pw))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn east_facing_camera_sees_the_field() {
        let center = Pt3::new(400_000.0, 2_900_000.0, 120.0);
        let k = FxFyCxCySkew::from_physical(90.0, (203.0, 254.0), (2030.0, 2540.0));
        let world = landmark_field(&center, 12, 5);
        let scene = TerrainScene::new(
            center,
            east_facing_rotation(0.05, -0.02, 0.01),
            k,
            world,
            UniformPixelNoise::default(),
        )
        .unwrap();
        assert_eq!(scene.pixels.len(), 12);
        for (pw, px) in scene.world.iter().zip(&scene.pixels) {
            let pc = scene.cam_se3_world.transform_point(pw);
            assert!(pc.z > 150.0);
            assert!(px.x.is_finite() && px.y.is_finite());
        }
    }

    #[test]
    fn pose_maps_center_to_origin() {
        let center = Pt3::new(10.0, 20.0, 30.0);
        let pose = pose_from_center(&center, &east_facing_rotation(0.3, 0.1, -0.2));
        assert!(pose.transform_point(&center).coords.norm() < 1e-9);
    }
}
