//! Screen-space overlay drawn with egui: loading screen, point-of-interest
//! markers and the debug tweak panel.

use corelib::poi::PointMarker;
use corelib::viewer::Viewer;
use egui::{Align2, Color32, FontId, Id, LayerId, Order, Pos2, Rect, Stroke, pos2, vec2};

/// Seconds the bar takes to collapse after loading ends.
const BAR_EXIT_SECS: f64 = 1.5;
/// Seconds the dark background takes to fade out.
const BACKGROUND_FADE_SECS: f64 = 3.0;
/// Seconds a marker takes to scale fully in or out.
const MARKER_SCALE_SECS: f32 = 0.3;
const MARKER_RADIUS: f32 = 20.0;

fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Progress of an exit transition that started at `ended_at`.
fn exit_progress(ended_at: Option<f64>, now: f64, duration: f64) -> f32 {
    match ended_at {
        Some(start) => ease_in_out(((now - start) / duration) as f32),
        None => 0.0,
    }
}

/// Move `current` toward `target` by at most `dt / MARKER_SCALE_SECS`.
fn approach(current: f32, target: f32, dt: f32) -> f32 {
    let step = dt / MARKER_SCALE_SECS;
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

#[derive(Debug, Default)]
pub struct OverlayState {
    marker_scales: Vec<f32>,
    last_time: Option<f64>,
}

pub struct OverlayOptions {
    pub debug: bool,
    pub fps: Option<f32>,
}

impl OverlayState {
    pub fn draw(&mut self, ctx: &egui::Context, viewer: &mut Viewer, options: &OverlayOptions) {
        let now = viewer.elapsed();
        let dt = self
            .last_time
            .map(|t| (now - t).max(0.0) as f32)
            .unwrap_or(0.0);
        self.last_time = Some(now);

        self.draw_markers(ctx, viewer.markers(), viewer.is_scene_ready(), dt);
        draw_loading(ctx, viewer, now);
        if options.debug {
            draw_debug_panel(ctx, viewer, options.fps);
        }
    }

    fn draw_markers(&mut self, ctx: &egui::Context, markers: &[PointMarker], ready: bool, dt: f32) {
        self.marker_scales.resize(markers.len(), 0.0);
        if !ready {
            return;
        }
        let painter = ctx.layer_painter(LayerId::new(Order::Middle, Id::new("poi-markers")));
        let centre = ctx.screen_rect().center();
        for (marker, scale) in markers.iter().zip(self.marker_scales.iter_mut()) {
            *scale = approach(*scale, if marker.visible { 1.0 } else { 0.0 }, dt);
            if *scale <= 0.0 {
                continue;
            }
            let s = ease_in_out(*scale);
            let at = centre + vec2(marker.screen_offset.x, marker.screen_offset.y);
            let radius = MARKER_RADIUS * s;
            painter.circle_filled(at, radius, Color32::from_black_alpha(120));
            painter.circle_stroke(at, radius, Stroke::new(1.0, Color32::from_white_alpha(200)));
            painter.text(
                at,
                Align2::CENTER_CENTER,
                &marker.point.label,
                FontId::proportional(14.0 * s),
                Color32::WHITE,
            );
        }
    }
}

fn draw_loading(ctx: &egui::Context, viewer: &Viewer, now: f64) {
    let screen = viewer.loading_screen();
    if screen.removed {
        return;
    }
    let painter = ctx.layer_painter(LayerId::new(Order::Foreground, Id::new("loading")));
    let rect = ctx.screen_rect();

    let fade = exit_progress(screen.ended_at, now, BACKGROUND_FADE_SECS);
    let alpha = ((1.0 - fade) * 255.0).round() as u8;
    painter.rect_filled(rect, 0.0, Color32::from_black_alpha(alpha));

    // Bar grows from the left while loading, then collapses toward the right.
    let exit = exit_progress(screen.ended_at, now, BAR_EXIT_SECS);
    let y = rect.center().y - 1.0;
    let bar = if screen.ended {
        let width = rect.width() * (1.0 - exit);
        Rect::from_min_size(pos2(rect.right() - width, y), vec2(width, 2.0))
    } else {
        Rect::from_min_size(pos2(rect.left(), y), vec2(rect.width() * screen.bar_scale, 2.0))
    };
    if bar.width() > 0.0 {
        painter.rect_filled(bar, 0.0, Color32::WHITE);
    }

    if !screen.percentage.is_empty() {
        let text_alpha = ((1.0 - exit) * 255.0).round() as u8;
        painter.text(
            Pos2::new(rect.center().x, rect.center().y + 24.0),
            Align2::CENTER_TOP,
            &screen.percentage,
            FontId::proportional(20.0),
            Color32::from_white_alpha(text_alpha),
        );
    }
}

/// The tweak panel: points-of-interest toggle and camera position sliders.
fn draw_debug_panel(ctx: &egui::Context, viewer: &mut Viewer, fps: Option<f32>) {
    let width = viewer.config().debug_panel_width;
    let sliders = viewer.config().camera_sliders.clone();
    egui::Window::new("Debug")
        .default_width(width)
        .default_open(false)
        .resizable(false)
        .anchor(Align2::RIGHT_TOP, vec2(-8.0, 8.0))
        .show(ctx, |ui| {
            let mut poi = viewer.points_enabled();
            if ui.checkbox(&mut poi, "Points of Interest").changed() {
                viewer.set_points_enabled(poi);
            }

            egui::CollapsingHeader::new("Camera")
                .default_open(false)
                .show(ui, |ui| {
                    let mut p = viewer.camera_position();
                    let mut changed = false;
                    // height first, as in the panel layout
                    for axis in [1usize, 0, 2] {
                        let s = &sliders[axis];
                        changed |= ui
                            .add(
                                egui::Slider::new(&mut p[axis], s.range.clone())
                                    .step_by(s.step as f64)
                                    .text(s.label),
                            )
                            .changed();
                    }
                    if changed {
                        viewer.set_camera_position(p);
                    }
                });

            if let Some(fps) = fps {
                ui.separator();
                ui.label(format!("{fps:.0} fps"));
            }
        });
}
