//! Points of interest: fixed world positions shown as screen-space markers,
//! hidden while scene geometry sits between them and the camera.

use crate::camera::Camera;
use crate::ray::Raycaster;
use crate::scene::Scene;
use crate::{Vec2, Vec3};

#[derive(Clone, Debug, PartialEq)]
pub struct PointOfInterest {
    pub position: Vec3,
    pub label: String,
}

impl PointOfInterest {
    pub fn new(position: Vec3, label: impl Into<String>) -> Self {
        Self {
            position,
            label: label.into(),
        }
    }
}

/// Viewport size in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sizes {
    pub width: f32,
    pub height: f32,
}

impl Sizes {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.width / self.height.max(1.0)
    }
}

/// Offset from the viewport centre, in logical pixels, +y down.
#[inline]
pub fn screen_offset(ndc: Vec2, sizes: Sizes) -> Vec2 {
    Vec2::new(ndc.x * sizes.width * 0.5, -ndc.y * sizes.height * 0.5)
}

/// Occlusion decision for one marker.
///
/// `nearest_hit` is the distance to the closest scene intersection along the
/// camera-to-point ray. Markers only become visible while `enabled`; when
/// nothing decides otherwise the previous state is kept.
pub fn decide_visibility(
    previous: bool,
    nearest_hit: Option<f32>,
    point_distance: f32,
    enabled: bool,
) -> bool {
    match nearest_hit {
        None => enabled || previous,
        Some(hit) if hit < point_distance => false,
        Some(hit) if hit > point_distance && enabled => true,
        Some(_) => previous,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointMarker {
    pub point: PointOfInterest,
    pub visible: bool,
    pub screen_offset: Vec2,
}

impl PointMarker {
    pub fn new(point: PointOfInterest) -> Self {
        Self {
            point,
            visible: false,
            screen_offset: Vec2::ZERO,
        }
    }

    /// Project, raycast and update visibility and screen offset.
    pub fn update(
        &mut self,
        camera: &Camera,
        scene: &Scene,
        raycaster: &mut Raycaster,
        sizes: Sizes,
        enabled: bool,
    ) {
        let ndc = camera.project(self.point.position).truncate();
        raycaster.set_from_camera(ndc, camera);
        let nearest = raycaster.nearest(scene).map(|hit| hit.distance);
        let point_distance = self.point.position.distance(camera.eye);

        self.visible = decide_visibility(self.visible, nearest, point_distance, enabled);
        self.screen_offset = screen_offset(ndc, sizes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshData, MeshVertex};
    use crate::scene::Node;
    use crate::transform::Transform;
    use crate::vec3;

    #[test]
    fn visibility_rules() {
        // nothing in the way
        assert!(decide_visibility(false, None, 5.0, true));
        assert!(!decide_visibility(false, None, 5.0, false));
        assert!(decide_visibility(true, None, 5.0, false));
        // occluded
        assert!(!decide_visibility(true, Some(3.0), 5.0, true));
        assert!(!decide_visibility(true, Some(3.0), 5.0, false));
        // geometry behind the point
        assert!(decide_visibility(false, Some(8.0), 5.0, true));
        assert!(!decide_visibility(false, Some(8.0), 5.0, false));
        assert!(decide_visibility(true, Some(8.0), 5.0, false));
        // tie keeps the last state
        assert!(decide_visibility(true, Some(5.0), 5.0, true));
        assert!(!decide_visibility(false, Some(5.0), 5.0, true));
    }

    #[test]
    fn screen_offset_is_centre_relative() {
        let sizes = Sizes::new(800.0, 600.0);
        assert_eq!(screen_offset(Vec2::ZERO, sizes), Vec2::ZERO);
        assert_eq!(screen_offset(Vec2::new(1.0, 1.0), sizes), Vec2::new(400.0, -300.0));
        assert_eq!(screen_offset(Vec2::new(-0.5, -0.5), sizes), Vec2::new(-200.0, 150.0));
    }

    fn camera() -> Camera {
        Camera::new_perspective(
            vec3(0.0, 0.0, 10.0),
            Vec3::ZERO,
            Vec3::Y,
            45f32.to_radians(),
            0.1,
            100.0,
            1.0,
        )
    }

    fn wall_at(z: f32) -> Scene {
        let n = [0.0, 0.0, 1.0];
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(MeshData::new(
            vec![
                MeshVertex::new([-5.0, -5.0, 0.0], n, [0.0, 0.0]),
                MeshVertex::new([5.0, -5.0, 0.0], n, [1.0, 0.0]),
                MeshVertex::new([5.0, 5.0, 0.0], n, [1.0, 1.0]),
                MeshVertex::new([-5.0, 5.0, 0.0], n, [0.0, 1.0]),
            ],
            vec![0, 1, 2, 0, 2, 3],
        ));
        scene
            .add_node(
                Node::new(
                    "wall",
                    Transform::from_trs(vec3(0.0, 0.0, z), crate::Quat::IDENTITY, Vec3::ONE),
                )
                .with_mesh(mesh),
            )
            .unwrap();
        scene
    }

    #[test]
    fn marker_behind_wall_is_hidden() {
        let mut marker = PointMarker::new(PointOfInterest::new(vec3(0.5, 0.5, -2.0), "1"));
        marker.visible = true;
        let mut raycaster = Raycaster::default();
        marker.update(&camera(), &wall_at(0.0), &mut raycaster, Sizes::new(100.0, 100.0), true);
        assert!(!marker.visible);
    }

    #[test]
    fn marker_in_front_of_wall_is_shown() {
        let mut marker = PointMarker::new(PointOfInterest::new(vec3(0.5, 0.5, 2.0), "1"));
        let mut raycaster = Raycaster::default();
        let sizes = Sizes::new(100.0, 100.0);
        marker.update(&camera(), &wall_at(0.0), &mut raycaster, sizes, true);
        assert!(marker.visible);
        assert!(marker.screen_offset.x > 0.0);
        assert!(marker.screen_offset.y < 0.0);
    }

    #[test]
    fn empty_scene_follows_toggle() {
        let mut marker = PointMarker::new(PointOfInterest::new(Vec3::ZERO, "1"));
        let mut raycaster = Raycaster::default();
        let sizes = Sizes::new(100.0, 100.0);
        marker.update(&camera(), &Scene::new(), &mut raycaster, sizes, false);
        assert!(!marker.visible);
        marker.update(&camera(), &Scene::new(), &mut raycaster, sizes, true);
        assert!(marker.visible);
    }
}
