//! Mouse input mapped onto the orbit controls.

use corelib::Vec2;
use corelib::camera::Camera;
use corelib::controls::OrbitControls;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};

/// Pixels of touchpad scroll per wheel step.
const PIXELS_PER_STEP: f32 = 100.0;

/// Wheel delta as zoom steps: positive zooms out. Touchpad pixel deltas
/// give fractional steps.
pub fn wheel_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y,
        MouseScrollDelta::PixelDelta(p) => -(p.y as f32) / PIXELS_PER_STEP,
    }
}

#[derive(Debug, Default)]
pub struct PointerState {
    /// Last cursor position in logical pixels.
    position: Option<Vec2>,
    rotating: bool,
    dollying: bool,
    panning: bool,
}

impl PointerState {
    pub fn on_button(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.rotating = pressed,
            MouseButton::Middle => self.dollying = pressed,
            MouseButton::Right => self.panning = pressed,
            _ => {}
        }
    }

    /// Feed a cursor position (logical pixels); drags move the controls.
    pub fn on_move(
        &mut self,
        position: Vec2,
        viewport_height: f32,
        controls: &mut OrbitControls,
        camera: &Camera,
    ) {
        if let Some(last) = self.position {
            let delta = position - last;
            if self.rotating {
                controls.on_pointer_drag(delta, viewport_height);
            } else if self.dollying {
                controls.on_pointer_dolly(delta);
            } else if self.panning {
                controls.on_pointer_pan(delta, viewport_height, camera);
            }
        }
        self.position = Some(position);
    }

    pub fn on_leave(&mut self) {
        self.position = None;
        self.rotating = false;
        self.dollying = false;
        self.panning = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::controls::OrbitLimits;
    use corelib::{Vec3, vec3};
    use winit::dpi::PhysicalPosition;

    fn camera() -> Camera {
        Camera::new_perspective(
            vec3(10.0, 10.0, 10.0),
            Vec3::ZERO,
            Vec3::Y,
            45f32.to_radians(),
            0.1,
            100.0,
            1.0,
        )
    }

    #[test]
    fn wheel_up_zooms_in() {
        assert_eq!(wheel_steps(MouseScrollDelta::LineDelta(0.0, 1.0)), -1.0);
        assert_eq!(wheel_steps(MouseScrollDelta::LineDelta(0.0, -3.0)), 3.0);
        assert_eq!(wheel_steps(MouseScrollDelta::LineDelta(2.0, 0.0)), 0.0);
    }

    #[test]
    fn touchpad_scroll_is_proportional() {
        let small = wheel_steps(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -4.0)));
        assert!((small - 0.04).abs() < 1e-6);

        // A burst of small touchpad events zooms like one wheel notch.
        let mut cam = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, OrbitLimits::default());
        for _ in 0..25 {
            controls.on_wheel(small);
        }
        let before = cam.eye.length();
        controls.update(&mut cam);
        let ratio = cam.eye.length() / before;
        assert!((ratio - 1.0 / 0.95).abs() < 1e-3);
    }

    #[test]
    fn middle_drag_dollies_and_right_drag_pans() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, OrbitLimits::default());
        let mut pointer = PointerState::default();
        pointer.on_move(Vec2::new(100.0, 100.0), 600.0, &mut controls, &cam);
        pointer.on_button(MouseButton::Middle, ElementState::Pressed);
        pointer.on_move(Vec2::new(100.0, 200.0), 600.0, &mut controls, &cam);
        let before = cam.eye;
        assert!(controls.update(&mut cam));
        // same direction, further out
        assert!(cam.eye.length() > before.length());
        assert!(cam.eye.normalize().dot(before.normalize()) > 0.9999);

        pointer.on_button(MouseButton::Middle, ElementState::Released);
        pointer.on_button(MouseButton::Right, ElementState::Pressed);
        let mut controls = OrbitControls::new(Vec3::ZERO, OrbitLimits::default());
        pointer.on_move(Vec2::new(160.0, 200.0), 600.0, &mut controls, &cam);
        let radius = cam.eye.distance(cam.target);
        assert!(controls.update(&mut cam));
        assert_ne!(cam.target, Vec3::ZERO);
        assert!((cam.eye.distance(cam.target) - radius).abs() < 1e-3);
    }

    #[test]
    fn left_drag_rotates_camera() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, OrbitLimits::default());
        let mut pointer = PointerState::default();
        pointer.on_move(Vec2::new(100.0, 100.0), 600.0, &mut controls, &cam);
        pointer.on_button(MouseButton::Left, ElementState::Pressed);
        pointer.on_move(Vec2::new(160.0, 100.0), 600.0, &mut controls, &cam);
        let before = cam.eye;
        assert!(controls.update(&mut cam));
        assert!((cam.eye.length() - before.length()).abs() < 1e-3);
        assert!((cam.eye.y - before.y).abs() < 1e-3);
    }

    #[test]
    fn hover_without_button_does_nothing() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, OrbitLimits::default());
        let mut pointer = PointerState::default();
        pointer.on_move(Vec2::new(0.0, 0.0), 600.0, &mut controls, &cam);
        pointer.on_move(Vec2::new(50.0, 50.0), 600.0, &mut controls, &cam);
        assert!(!controls.update(&mut cam));
    }
}
