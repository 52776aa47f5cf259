//! Every constant the room scene is built from.

use std::f32::consts::PI;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use crate::controls::OrbitLimits;
use crate::loading::LoadingDelays;
use crate::poi::PointOfInterest;
use crate::{Vec3, vec3};

/// Slider bounds for one camera axis in the debug panel.
#[derive(Clone, Debug, PartialEq)]
pub struct SliderRange {
    pub label: &'static str,
    pub range: RangeInclusive<f32>,
    pub step: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    pub look_at: Vec3,
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControlsConfig {
    pub target: Vec3,
    pub damping_factor: Option<f32>,
    pub limits: OrbitLimits,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    /// Base directory the asset paths below are resolved against.
    pub assets_dir: PathBuf,
    pub baked_texture: PathBuf,
    pub model: PathBuf,
    /// Both must be present for the model to be shown.
    pub animation_clips: [String; 2],
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub points: Vec<PointOfInterest>,
    /// x / y / z sliders, in that order.
    pub camera_sliders: [SliderRange; 3],
    pub loading: LoadingDelays,
    pub debug_panel_width: f32,
}

impl SceneConfig {
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    pub fn baked_texture_path(&self) -> PathBuf {
        self.assets_dir.join(&self.baked_texture)
    }

    pub fn model_path(&self) -> PathBuf {
        self.assets_dir.join(&self.model)
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("static"),
            baked_texture: PathBuf::from("textures/Baked.jpg"),
            model: PathBuf::from("models/room_margot.glb"),
            animation_clips: ["head.002Action.002".to_owned(), "bladeAction".to_owned()],
            camera: CameraConfig {
                position: vec3(15.0, 20.0, 12.0),
                look_at: vec3(0.0, 1.0, 0.0),
                fov_y_deg: 45.0,
                z_near: 0.1,
                z_far: 100.0,
            },
            controls: ControlsConfig {
                target: Vec3::ZERO,
                damping_factor: Some(0.05),
                limits: OrbitLimits {
                    min_distance: 14.0,
                    max_distance: 25.0,
                    min_polar_angle: 0.0,
                    max_polar_angle: PI / 2.7,
                    min_azimuth_angle: 0.0,
                    max_azimuth_angle: PI / 2.0,
                },
            },
            points: vec![
                PointOfInterest::new(vec3(-4.5, 6.0, 1.0), "1"),
                PointOfInterest::new(vec3(2.0, 2.0, 3.0), "2"),
                PointOfInterest::new(vec3(-4.0, 3.0, -3.0), "3"),
            ],
            camera_sliders: [
                SliderRange {
                    label: "Camera Width",
                    range: 10.0..=20.0,
                    step: 1.0,
                },
                SliderRange {
                    label: "Camera Height",
                    range: 0.0..=25.0,
                    step: 1.0,
                },
                SliderRange {
                    label: "Camera Depth",
                    range: 10.0..=20.0,
                    step: 1.0,
                },
            ],
            loading: LoadingDelays::default(),
            debug_panel_width: 400.0,
        }
    }
}
