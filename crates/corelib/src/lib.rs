//! Core types: math re-exports, scene graph, camera and controls, animation,
//! raycasting, points of interest and the per-frame viewer state.

pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, vec3};

pub mod animation;
pub mod camera;
pub mod config;
pub mod controls;
pub mod error;
pub mod loading;
pub mod mesh;
pub mod poi;
pub mod ray;
pub mod scene;
pub mod transform;
pub mod viewer;

pub use error::{CoreError, CoreResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let t = transform::Transform::identity();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn translate_then_scale_matrix() {
        let t = transform::Transform::from_euler(
            vec3(1.0, 2.0, 3.0),
            vec3(0.0, 0.0, 0.0),
            vec3(2.0, 2.0, 2.0),
        );
        // Last column is the translation, the diagonal is the scale
        // (no rotation).
        let m = t.matrix().to_cols_array();
        assert!((m[12] - 1.0).abs() < 1e-6);
        assert!((m[13] - 2.0).abs() < 1e-6);
        assert!((m[14] - 3.0).abs() < 1e-6);
        assert!((m[0] - 2.0).abs() < 1e-6);
        assert!((m[5] - 2.0).abs() < 1e-6);
        assert!((m[10] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn euler_and_quat_transforms_agree() {
        let e = transform::Transform::from_euler(Vec3::ZERO, vec3(0.0, 0.5, 0.0), Vec3::ONE);
        let q = transform::Transform::from_trs(Vec3::ZERO, Quat::from_rotation_y(0.5), Vec3::ONE);
        assert!(e.matrix().abs_diff_eq(q.matrix(), 1e-6));
    }

    #[test]
    fn camera_pv_is_finite() {
        let cam = camera::Camera::new_perspective(
            vec3(15.0, 20.0, 12.0),
            vec3(0.0, 1.0, 0.0),
            Vec3::Y,
            45f32.to_radians(),
            0.1,
            100.0,
            16.0 / 9.0,
        );
        let pv = cam.proj_view();
        let a = pv.to_cols_array();
        assert!(a.iter().all(|f| f.is_finite()));
    }
}
