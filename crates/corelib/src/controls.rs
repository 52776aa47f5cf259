//! Orbit controls: spherical orbit around a target with damping and limits.
//!
//! Each `update` re-derives the spherical coordinates from the camera's
//! current eye, so anything that moves the camera between frames (for example
//! the debug sliders) is picked up and then re-clamped.

use std::f32::consts::{PI, TAU};

use crate::camera::Camera;
use crate::{Vec2, Vec3};

const EPS: f32 = 1e-6;

/// Clamp ranges for the orbit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitLimits {
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub min_azimuth_angle: f32,
    pub max_azimuth_angle: f32,
}

impl Default for OrbitLimits {
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            min_azimuth_angle: f32::NEG_INFINITY,
            max_azimuth_angle: f32::INFINITY,
        }
    }
}

/// Radius, polar angle (from +Y) and azimuth (around +Y, from +Z).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(v: Vec3) -> Self {
        let radius = v.length();
        if radius < EPS {
            return Self::default();
        }
        Self {
            radius,
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
            theta: v.x.atan2(v.z),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi_r = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_r * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_r * self.theta.cos(),
        )
    }

    /// Keep phi away from the poles where the basis degenerates.
    fn make_safe(mut self) -> Self {
        self.phi = self.phi.clamp(EPS, PI - EPS);
        self
    }
}

#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Vec3,
    pub limits: OrbitLimits,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,

    spherical_delta: Spherical,
    pan_offset: Vec3,
    scale: f32,
}

impl OrbitControls {
    pub fn new(target: Vec3, limits: OrbitLimits) -> Self {
        Self {
            target,
            limits,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            spherical_delta: Spherical::default(),
            pan_offset: Vec3::ZERO,
            scale: 1.0,
        }
    }

    pub fn with_damping(mut self, factor: f32) -> Self {
        self.enable_damping = true;
        self.damping_factor = factor;
        self
    }

    #[inline]
    pub fn rotate_left(&mut self, angle: f32) {
        self.spherical_delta.theta -= angle;
    }

    #[inline]
    pub fn rotate_up(&mut self, angle: f32) {
        self.spherical_delta.phi -= angle;
    }

    /// Multiply the orbit radius by `scale` on the next update (<1 zooms in).
    #[inline]
    pub fn dolly(&mut self, scale: f32) {
        self.scale *= scale;
    }

    /// Move the target in world space on the next update.
    #[inline]
    pub fn pan(&mut self, delta: Vec3) {
        self.pan_offset += delta;
    }

    /// Pointer drag with the rotate button, in logical pixels.
    pub fn on_pointer_drag(&mut self, delta: Vec2, viewport_height: f32) {
        let h = viewport_height.max(1.0);
        self.rotate_left(TAU * delta.x / h * self.rotate_speed);
        self.rotate_up(TAU * delta.y / h * self.rotate_speed);
    }

    /// Pointer drag with the pan button; screen-space panning.
    pub fn on_pointer_pan(&mut self, delta: Vec2, viewport_height: f32, camera: &Camera) {
        let h = viewport_height.max(1.0);
        let target_distance = (camera.eye - self.target).length() * (camera.fov_y_rad * 0.5).tan();
        let forward = (camera.target - camera.eye).normalize_or_zero();
        let right = forward.cross(camera.up).normalize_or_zero();
        let up = right.cross(forward);
        let dx = 2.0 * delta.x * target_distance / h * self.pan_speed;
        let dy = 2.0 * delta.y * target_distance / h * self.pan_speed;
        self.pan(-right * dx + up * dy);
    }

    /// Pointer drag with the dolly button: dragging down zooms out,
    /// 100 px to a wheel step.
    pub fn on_pointer_dolly(&mut self, delta: Vec2) {
        self.on_wheel(delta.y * 0.01);
    }

    /// Wheel steps: positive scrolls away from the scene (zoom out).
    /// Fractional steps zoom proportionally.
    pub fn on_wheel(&mut self, steps: f32) {
        if steps == 0.0 {
            return;
        }
        let zoom = 0.95f32.powf(self.zoom_speed * steps.abs());
        if steps < 0.0 {
            self.dolly(zoom);
        } else {
            self.dolly(1.0 / zoom);
        }
    }

    /// Apply pending input and limits to `camera`. Returns true if the eye moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let previous_eye = camera.eye;
        let mut s = Spherical::from_offset(camera.eye - self.target);

        if self.enable_damping {
            s.theta += self.spherical_delta.theta * self.damping_factor;
            s.phi += self.spherical_delta.phi * self.damping_factor;
        } else {
            s.theta += self.spherical_delta.theta;
            s.phi += self.spherical_delta.phi;
        }

        s.theta = clamp_azimuth(
            s.theta,
            self.limits.min_azimuth_angle,
            self.limits.max_azimuth_angle,
        );
        s.phi = s
            .phi
            .clamp(self.limits.min_polar_angle, self.limits.max_polar_angle);
        s = s.make_safe();

        s.radius = (s.radius * self.scale)
            .clamp(self.limits.min_distance, self.limits.max_distance);

        if self.enable_damping {
            self.target += self.pan_offset * self.damping_factor;
        } else {
            self.target += self.pan_offset;
        }

        camera.eye = self.target + s.to_offset();
        camera.look_at(self.target);

        if self.enable_damping {
            let keep = 1.0 - self.damping_factor;
            self.spherical_delta.theta *= keep;
            self.spherical_delta.phi *= keep;
            self.pan_offset *= keep;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        previous_eye.distance_squared(camera.eye) > EPS
    }
}

/// Wrap finite azimuth limits into [-PI, PI] and clamp, handling ranges
/// that straddle the seam.
fn clamp_azimuth(theta: f32, min: f32, max: f32) -> f32 {
    if !min.is_finite() || !max.is_finite() {
        return theta;
    }
    let wrap = |a: f32| {
        if a < -PI {
            a + TAU
        } else if a > PI {
            a - TAU
        } else {
            a
        }
    };
    let (min, max) = (wrap(min), wrap(max));
    if min <= max {
        theta.clamp(min, max)
    } else if theta > (min + max) / 2.0 {
        theta.max(min)
    } else {
        theta.min(max)
    }
}
