use crate::{Mat4, Vec3};

/// Simple perspective camera (right-handed).
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new_perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y_rad: f32,
        z_near: f32,
        z_far: f32,
        aspect: f32,
    ) -> Self {
        Self {
            eye,
            target,
            up,
            fov_y_rad,
            z_near,
            z_far,
            aspect,
        }
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Projection with depth in [0,1], which is what wgpu expects.
    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }

    #[inline]
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    #[inline]
    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// World position -> normalized device coordinates.
    /// x/y are in [-1,1] when the point is inside the frustum.
    #[inline]
    pub fn project(&self, world: Vec3) -> Vec3 {
        self.proj_view().project_point3(world)
    }

    /// Normalized device coordinates -> world position.
    #[inline]
    pub fn unproject(&self, ndc: Vec3) -> Vec3 {
        self.proj_view().inverse().project_point3(ndc)
    }
}
