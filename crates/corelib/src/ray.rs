//! Rays and scene raycasting.

use crate::camera::Camera;
use crate::mesh::Aabb;
use crate::scene::{MeshId, NodeId, Scene};
use crate::{Vec2, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Ray from the camera eye through a point given in NDC.
    pub fn from_camera(ndc: Vec2, camera: &Camera) -> Self {
        let through = camera.unproject(ndc.extend(0.5));
        Self::new(camera.eye, through - camera.eye)
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test. Returns the entry distance (0 when starting inside).
    pub fn intersect_aabb(&self, aabb: &Aabb) -> Option<f32> {
        if aabb.is_empty() {
            return None;
        }
        let inv = self.direction.recip();
        let t0 = (aabb.min - self.origin) * inv;
        let t1 = (aabb.max - self.origin) * inv;
        let t_near = t0.min(t1).max_element();
        let t_far = t0.max(t1).min_element();
        if t_far < 0.0 || t_near > t_far || t_near.is_nan() || t_far.is_nan() {
            return None;
        }
        Some(t_near.max(0.0))
    }

    /// Möller–Trumbore. Triangles wind counter-clockwise when seen from the
    /// front; with `cull_back_faces` hits on the back are ignored.
    pub fn intersect_triangle(&self, tri: [Vec3; 3], cull_back_faces: bool) -> Option<f32> {
        const EPS: f32 = 1e-7;
        let [a, b, c] = tri;
        let e1 = b - a;
        let e2 = c - a;
        let p = self.direction.cross(e2);
        let det = e1.dot(p);
        if cull_back_faces {
            if det < EPS {
                return None;
            }
        } else if det.abs() < EPS {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intersection {
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub point: Vec3,
    pub node: NodeId,
    pub mesh: MeshId,
    pub face_index: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct Raycaster {
    pub ray: Ray,
    pub near: f32,
    pub far: f32,
    pub cull_back_faces: bool,
}

impl Default for Raycaster {
    fn default() -> Self {
        Self {
            ray: Ray::new(Vec3::ZERO, Vec3::NEG_Z),
            near: 0.0,
            far: f32::INFINITY,
            cull_back_faces: true,
        }
    }
}

impl Raycaster {
    pub fn set_from_camera(&mut self, ndc: Vec2, camera: &Camera) {
        self.ray = Ray::from_camera(ndc, camera);
    }

    /// All hits against every mesh node in the scene, nearest first.
    pub fn intersect_scene(&self, scene: &Scene) -> Vec<Intersection> {
        let mut hits = Vec::new();
        for (node, mesh_id, world) in scene.mesh_nodes() {
            let (Some(mesh), Some(bounds)) =
                (scene.meshes().get(mesh_id), scene.mesh_bounds(mesh_id))
            else {
                continue;
            };
            if world.determinant().abs() < f32::EPSILON {
                continue;
            }
            let inv = world.inverse();
            // Not normalized: t in local space stays comparable per mesh,
            // distances are recomputed in world space below.
            let local = Ray {
                origin: inv.transform_point3(self.ray.origin),
                direction: inv.transform_vector3(self.ray.direction),
            };
            if local.intersect_aabb(bounds).is_none() {
                continue;
            }
            // Faces are culled by their object-space winding, so a mirrored
            // node keeps the same visible side it is drawn with.
            for (face_index, tri) in mesh.triangles().enumerate() {
                let Some(t) = local.intersect_triangle(tri, self.cull_back_faces) else {
                    continue;
                };
                let point = world.transform_point3(local.at(t));
                let distance = point.distance(self.ray.origin);
                if distance < self.near || distance > self.far {
                    continue;
                }
                hits.push(Intersection {
                    distance,
                    point,
                    node,
                    mesh: mesh_id,
                    face_index,
                });
            }
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Nearest hit, if any.
    pub fn nearest(&self, scene: &Scene) -> Option<Intersection> {
        self.intersect_scene(scene).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshData, MeshVertex};
    use crate::scene::Node;
    use crate::transform::Transform;
    use crate::{Quat, vec3};

    /// Unit quad in the XY plane facing +Z.
    fn quad() -> MeshData {
        let n = [0.0, 0.0, 1.0];
        MeshData::new(
            vec![
                MeshVertex::new([-1.0, -1.0, 0.0], n, [0.0, 0.0]),
                MeshVertex::new([1.0, -1.0, 0.0], n, [1.0, 0.0]),
                MeshVertex::new([1.0, 1.0, 0.0], n, [1.0, 1.0]),
                MeshVertex::new([-1.0, 1.0, 0.0], n, [0.0, 1.0]),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    fn scene_with_quad_at(z: f32) -> Scene {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad());
        scene
            .add_node(
                Node::new(
                    "wall",
                    Transform::from_trs(vec3(0.0, 0.0, z), Quat::IDENTITY, Vec3::ONE),
                )
                .with_mesh(mesh),
            )
            .unwrap();
        scene
    }

    #[test]
    fn triangle_hit_distance() {
        let ray = Ray::new(vec3(0.2, 0.2, 5.0), Vec3::NEG_Z);
        let tri = [vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0)];
        let t = ray.intersect_triangle(tri, true).unwrap();
        assert!((t - 5.0).abs() < 1e-5);
    }

    #[test]
    fn back_faces_are_culled_on_request() {
        let ray = Ray::new(vec3(0.2, 0.2, -5.0), Vec3::Z);
        let tri = [vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0)];
        assert!(ray.intersect_triangle(tri, true).is_none());
        assert!(ray.intersect_triangle(tri, false).is_some());
    }

    #[test]
    fn aabb_miss_and_hit() {
        let aabb = Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        let hit = Ray::new(vec3(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert_eq!(hit.intersect_aabb(&aabb), Some(4.0));
        let miss = Ray::new(vec3(3.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(miss.intersect_aabb(&aabb).is_none());
        let behind = Ray::new(vec3(0.0, 0.0, 5.0), Vec3::Z);
        assert!(behind.intersect_aabb(&aabb).is_none());
    }

    #[test]
    fn scene_hits_are_world_space_and_sorted() {
        let mut scene = scene_with_quad_at(0.0);
        scene.merge(scene_with_quad_at(2.0));
        let caster = Raycaster {
            ray: Ray::new(vec3(0.0, 0.1, 10.0), Vec3::NEG_Z),
            ..Raycaster::default()
        };
        let hits = caster.intersect_scene(&scene);
        assert_eq!(hits.len(), 2);
        assert!((hits[0].distance - 8.0).abs() < 1e-4);
        assert!((hits[1].distance - 10.0).abs() < 1e-4);
    }

    #[test]
    fn scaled_node_reports_world_distance() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad());
        scene
            .add_node(
                Node::new(
                    "wall",
                    Transform::from_trs(vec3(0.0, 0.0, 1.0), Quat::IDENTITY, Vec3::splat(3.0)),
                )
                .with_mesh(mesh),
            )
            .unwrap();
        let caster = Raycaster {
            ray: Ray::new(vec3(2.5, 0.0, 6.0), Vec3::NEG_Z),
            ..Raycaster::default()
        };
        let hit = caster.nearest(&scene).unwrap();
        assert!((hit.distance - 5.0).abs() < 1e-4);
        assert!((hit.point - vec3(2.5, 0.0, 1.0)).length() < 1e-4);
    }

    fn quad_node(name: &str, transform: Transform) -> Scene {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad());
        scene
            .add_node(Node::new(name, transform).with_mesh(mesh))
            .unwrap();
        scene
    }

    #[test]
    fn mirrored_node_keeps_its_front_side() {
        let scene = quad_node(
            "mirror",
            Transform::from_trs(Vec3::ZERO, Quat::IDENTITY, vec3(-1.0, 1.0, 1.0)),
        );
        let from_front = Raycaster {
            ray: Ray::new(vec3(0.2, 0.1, 5.0), Vec3::NEG_Z),
            ..Raycaster::default()
        };
        let hit = from_front.nearest(&scene).unwrap();
        assert!((hit.distance - 5.0).abs() < 1e-4);
        assert!((hit.point - vec3(0.2, 0.1, 0.0)).length() < 1e-4);

        let from_back = Raycaster {
            ray: Ray::new(vec3(0.2, 0.1, -5.0), Vec3::Z),
            ..Raycaster::default()
        };
        assert!(from_back.nearest(&scene).is_none());
    }

    #[test]
    fn hits_outside_near_far_are_dropped() {
        let mut scene = scene_with_quad_at(0.0);
        scene.merge(scene_with_quad_at(2.0));
        let ray = Ray::new(vec3(0.0, 0.1, 10.0), Vec3::NEG_Z);

        let near_only = Raycaster {
            ray,
            far: 9.0,
            ..Raycaster::default()
        };
        let hits = near_only.intersect_scene(&scene);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 8.0).abs() < 1e-4);

        let far_only = Raycaster {
            ray,
            near: 9.0,
            ..Raycaster::default()
        };
        let hits = far_only.intersect_scene(&scene);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 10.0).abs() < 1e-4);
    }

    #[test]
    fn child_mesh_uses_parent_transform() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad());
        let parent = scene
            .add_node(Node::new(
                "shelf",
                Transform::from_trs(
                    vec3(4.0, 0.0, 0.0),
                    Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
                    Vec3::ONE,
                ),
            ))
            .unwrap();
        let child = scene
            .add_child(
                parent,
                Node::new(
                    "book",
                    Transform::from_trs(vec3(0.0, 0.0, 1.0), Quat::IDENTITY, Vec3::ONE),
                )
                .with_mesh(mesh),
            )
            .unwrap();

        // The child quad now sits at x = 5 facing +X.
        let caster = Raycaster {
            ray: Ray::new(vec3(9.0, 0.2, 0.0), Vec3::NEG_X),
            ..Raycaster::default()
        };
        let hit = caster.nearest(&scene).unwrap();
        assert_eq!(hit.node, child);
        assert!((hit.distance - 4.0).abs() < 1e-4);
        assert!((hit.point - vec3(5.0, 0.2, 0.0)).length() < 1e-4);

        let untransformed = Raycaster {
            ray: Ray::new(vec3(0.0, 0.2, 5.0), Vec3::NEG_Z),
            ..Raycaster::default()
        };
        assert!(untransformed.nearest(&scene).is_none());
    }

    #[test]
    fn camera_ray_points_at_projected_target() {
        let cam = Camera::new_perspective(
            vec3(4.0, 3.0, 8.0),
            Vec3::ZERO,
            Vec3::Y,
            45f32.to_radians(),
            0.1,
            100.0,
            1.5,
        );
        let target = vec3(-1.0, 0.5, 0.25);
        let ndc = cam.project(target);
        let ray = Ray::from_camera(ndc.truncate(), &cam);
        let expected = (target - cam.eye).normalize();
        assert!(ray.direction.dot(expected) > 0.9999);
    }
}
