//! Per-frame glue for the room scene: loading state, animation, controls
//! and point-of-interest markers. Renderer- and window-agnostic.

use std::sync::Arc;

use crate::animation::{AnimationClip, AnimationMixer, find_clips};
use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::controls::OrbitControls;
use crate::error::CoreResult;
use crate::loading::{LoadingEvent, LoadingManager, LoadingScreen};
use crate::poi::{PointMarker, Sizes};
use crate::ray::Raycaster;
use crate::scene::Scene;
use crate::{Vec3, vec3};

/// A decoded model: its own scene graph plus the clips that animate it.
/// Clip channels target node ids of `scene`.
#[derive(Clone, Debug, Default)]
pub struct LoadedModel {
    pub scene: Scene,
    pub clips: Vec<AnimationClip>,
}

pub struct Viewer {
    config: SceneConfig,
    scene: Scene,
    camera: Camera,
    controls: OrbitControls,
    mixer: Option<AnimationMixer>,
    raycaster: Raycaster,
    markers: Vec<PointMarker>,
    loading: LoadingManager,
    screen: LoadingScreen,
    points_enabled: bool,
    sizes: Sizes,
    elapsed: f64,
    previous_time: f64,
}

impl Viewer {
    pub fn new(config: SceneConfig, sizes: Sizes) -> Self {
        let cam = &config.camera;
        let camera = Camera::new_perspective(
            cam.position,
            cam.look_at,
            Vec3::Y,
            cam.fov_y_deg.to_radians(),
            cam.z_near,
            cam.z_far,
            sizes.aspect(),
        );
        let mut controls = OrbitControls::new(config.controls.target, config.controls.limits);
        if let Some(factor) = config.controls.damping_factor {
            controls = controls.with_damping(factor);
        }
        let markers = config.points.iter().cloned().map(PointMarker::new).collect();
        let screen = LoadingScreen::new(config.loading);

        Self {
            config,
            scene: Scene::new(),
            camera,
            controls,
            mixer: None,
            raycaster: Raycaster::default(),
            markers,
            loading: LoadingManager::new(),
            screen,
            points_enabled: true,
            sizes,
            elapsed: 0.0,
            previous_time: 0.0,
        }
    }

    #[inline]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Direct camera edits are re-clamped by the controls on the next tick.
    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[inline]
    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    #[inline]
    pub fn markers(&self) -> &[PointMarker] {
        &self.markers
    }

    #[inline]
    pub fn loading_screen(&self) -> &LoadingScreen {
        &self.screen
    }

    #[inline]
    pub fn loading_manager_mut(&mut self) -> &mut LoadingManager {
        &mut self.loading
    }

    #[inline]
    pub fn sizes(&self) -> Sizes {
        self.sizes
    }

    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    #[inline]
    pub fn is_scene_ready(&self) -> bool {
        self.screen.scene_ready
    }

    #[inline]
    pub fn points_enabled(&self) -> bool {
        self.points_enabled
    }

    pub fn has_animations(&self) -> bool {
        self.mixer.is_some()
    }

    /// Debug toggle: applies to every marker at once.
    pub fn set_points_enabled(&mut self, enabled: bool) {
        self.points_enabled = enabled;
        for marker in &mut self.markers {
            marker.visible = enabled;
        }
    }

    pub fn resize(&mut self, sizes: Sizes) {
        self.sizes = sizes;
        self.camera.set_aspect(sizes.aspect());
    }

    pub fn on_item_loaded(&mut self, url: &str) {
        let (progress, complete) = self.loading.item_end(url);
        self.after_item(&progress, complete);
    }

    pub fn on_item_failed(&mut self, url: &str, err: &dyn std::fmt::Display) {
        let (progress, complete) = self.loading.item_error(url, err);
        self.after_item(&progress, complete);
    }

    fn after_item(&mut self, progress: &crate::loading::Progress, complete: bool) {
        self.screen.on_progress(progress);
        if complete {
            self.screen.on_complete(self.elapsed);
        }
    }

    /// Add the model to the scene and start both configured clips.
    /// If either clip is missing nothing is added and the error is returned.
    pub fn attach_model(&mut self, model: LoadedModel) -> CoreResult<()> {
        let [first, second] = &self.config.animation_clips;
        let found = find_clips(&model.clips, &[first.as_str(), second.as_str()])?;
        let mut clips: Vec<AnimationClip> = found.into_iter().cloned().collect();

        let offset = self.scene.merge(model.scene);
        let mixer = self.mixer.get_or_insert_with(AnimationMixer::new);
        for clip in &mut clips {
            clip.rebase(offset);
            let id = mixer.clip_action(Arc::new(clip.clone()));
            mixer.play(id);
        }
        log::info!(
            "Model attached: {} nodes, {} meshes, playing {:?}",
            self.scene.nodes().len(),
            self.scene.meshes().len(),
            clips.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
        Ok(())
    }

    /// Advance one frame. `elapsed` is seconds since start on a monotonic clock.
    pub fn tick(&mut self, elapsed: f64) -> Vec<LoadingEvent> {
        let delta = (elapsed - self.previous_time).max(0.0) as f32;
        self.previous_time = elapsed;
        self.elapsed = elapsed;

        let events = self.screen.advance(elapsed);

        if let Some(mixer) = self.mixer.as_mut() {
            mixer.update(delta, &mut self.scene);
        }

        self.controls.update(&mut self.camera);

        if self.screen.scene_ready {
            for marker in &mut self.markers {
                marker.update(
                    &self.camera,
                    &self.scene,
                    &mut self.raycaster,
                    self.sizes,
                    self.points_enabled,
                );
            }
        }
        events
    }

    /// Camera eye as edited by the debug sliders (x, y, z).
    pub fn camera_position(&self) -> [f32; 3] {
        self.camera.eye.to_array()
    }

    pub fn set_camera_position(&mut self, p: [f32; 3]) {
        self.camera.eye = vec3(p[0], p[1], p[2]);
    }
}
