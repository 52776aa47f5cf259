//! Loading progress and the loading-screen sequence that follows it.

use std::collections::HashSet;

/// Snapshot reported each time an item finishes.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub url: String,
    pub items_loaded: usize,
    pub items_total: usize,
}

impl Progress {
    #[inline]
    pub fn ratio(&self) -> f32 {
        if self.items_total == 0 {
            0.0
        } else {
            self.items_loaded as f32 / self.items_total as f32
        }
    }

    /// Horizontal scale of the loading bar.
    #[inline]
    pub fn bar_scale(&self) -> f32 {
        self.ratio()
    }

    /// e.g. `"50 %"`.
    pub fn percentage_text(&self) -> String {
        format!("{:.0} %", self.ratio() * 100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.items_total > 0 && self.items_loaded == self.items_total
    }
}

/// Counts started and finished items. Failed items still count as finished
/// so the loading screen never waits forever.
#[derive(Debug, Default)]
pub struct LoadingManager {
    started: HashSet<String>,
    items_total: usize,
    items_loaded: usize,
    failed: Vec<String>,
    completed: bool,
}

impl LoadingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_start(&mut self, url: impl Into<String>) {
        let url = url.into();
        log::debug!("Loading started: {url}");
        self.started.insert(url);
        self.items_total += 1;
    }

    /// Mark an item done. Returns the progress and whether this call
    /// completed the whole batch (true at most once).
    pub fn item_end(&mut self, url: impl Into<String>) -> (Progress, bool) {
        let url = url.into();
        if !self.started.remove(&url) {
            log::warn!("Loading finished for an item that was never started: {url}");
        }
        self.items_loaded = (self.items_loaded + 1).min(self.items_total.max(1));
        let progress = Progress {
            url,
            items_loaded: self.items_loaded,
            items_total: self.items_total,
        };
        log::info!(
            "Loaded {} ({}/{})",
            progress.url,
            progress.items_loaded,
            progress.items_total
        );
        let just_completed = progress.is_complete() && !self.completed;
        if just_completed {
            self.completed = true;
        }
        (progress, just_completed)
    }

    /// Log the failure, then treat the item as finished.
    pub fn item_error(
        &mut self,
        url: impl Into<String>,
        err: &dyn std::fmt::Display,
    ) -> (Progress, bool) {
        let url = url.into();
        log::error!("There was an error loading {url}: {err}");
        self.failed.push(url.clone());
        self.item_end(url)
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }
}

/// Delays (seconds, from completion) of the loading-screen steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadingDelays {
    pub end_overlay: f64,
    pub remove_overlay_after_end: f64,
    pub scene_ready: f64,
}

impl Default for LoadingDelays {
    fn default() -> Self {
        Self {
            end_overlay: 0.5,
            remove_overlay_after_end: 5.0,
            scene_ready: 3.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadingEvent {
    /// Bar, background and percentage enter their "ended" state.
    OverlayEnded,
    /// Loading elements are gone.
    OverlayRemoved,
    SceneReady,
}

/// What the overlay should show this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadingScreen {
    pub bar_scale: f32,
    pub percentage: String,
    pub ended: bool,
    /// Seconds on the frame clock when `ended` was set.
    pub ended_at: Option<f64>,
    pub removed: bool,
    pub scene_ready: bool,

    delays: LoadingDelays,
    schedule: Vec<(f64, LoadingEvent)>,
}

impl LoadingScreen {
    pub fn new(delays: LoadingDelays) -> Self {
        Self {
            bar_scale: 0.0,
            percentage: String::new(),
            ended: false,
            ended_at: None,
            removed: false,
            scene_ready: false,
            delays,
            schedule: Vec::new(),
        }
    }

    pub fn on_progress(&mut self, progress: &Progress) {
        if self.ended {
            return;
        }
        self.bar_scale = progress.bar_scale();
        self.percentage = progress.percentage_text();
    }

    /// Arm the post-load timers relative to `now`.
    pub fn on_complete(&mut self, now: f64) {
        let d = self.delays;
        self.schedule = vec![
            (now + d.end_overlay, LoadingEvent::OverlayEnded),
            (now + d.scene_ready, LoadingEvent::SceneReady),
            (
                now + d.end_overlay + d.remove_overlay_after_end,
                LoadingEvent::OverlayRemoved,
            ),
        ];
        self.schedule.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    /// Fire every event due at `now`, in time order. Returns what fired.
    pub fn advance(&mut self, now: f64) -> Vec<LoadingEvent> {
        let due = self.schedule.partition_point(|(at, _)| *at <= now);
        let fired: Vec<(f64, LoadingEvent)> = self.schedule.drain(..due).collect();
        for &(at, event) in &fired {
            match event {
                LoadingEvent::OverlayEnded => {
                    self.ended = true;
                    self.ended_at = Some(at);
                    // transforms are reset when the overlay ends
                    self.bar_scale = 1.0;
                }
                LoadingEvent::OverlayRemoved => self.removed = true,
                LoadingEvent::SceneReady => {
                    log::info!("Scene ready");
                    self.scene_ready = true;
                }
            }
        }
        fired.into_iter().map(|(_, e)| e).collect()
    }
}

impl Default for LoadingScreen {
    fn default() -> Self {
        Self::new(LoadingDelays::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_text_and_scale() {
        let mut manager = LoadingManager::new();
        manager.item_start("textures/Baked.jpg");
        manager.item_start("models/room_margot.glb");
        let (p, done) = manager.item_end("textures/Baked.jpg");
        assert_eq!(p.percentage_text(), "50 %");
        assert_eq!(p.bar_scale(), 0.5);
        assert!(!done);
        let (p, done) = manager.item_end("models/room_margot.glb");
        assert_eq!(p.percentage_text(), "100 %");
        assert!(done);
        assert!(manager.is_complete());
    }

    #[test]
    fn thirds_round_to_whole_percent() {
        let p = Progress {
            url: String::new(),
            items_loaded: 1,
            items_total: 3,
        };
        assert_eq!(p.percentage_text(), "33 %");
        let p = Progress {
            items_loaded: 2,
            ..p
        };
        assert_eq!(p.percentage_text(), "67 %");
    }

    #[test]
    fn failed_item_still_completes() {
        let mut manager = LoadingManager::new();
        manager.item_start("a");
        let (p, done) = manager.item_error("a", &"boom");
        assert!(done);
        assert!(p.is_complete());
        assert_eq!(manager.failed(), &["a".to_string()]);
    }

    #[test]
    fn completion_fires_once() {
        let mut manager = LoadingManager::new();
        manager.item_start("a");
        assert!(manager.item_end("a").1);
        assert!(!manager.item_end("a").1);
    }

    #[test]
    fn timeline_fires_in_order() {
        let mut screen = LoadingScreen::default();
        screen.on_complete(10.0);
        assert!(screen.advance(10.4).is_empty());
        assert_eq!(screen.advance(10.5), vec![LoadingEvent::OverlayEnded]);
        assert!(screen.ended);
        assert_eq!(screen.ended_at, Some(10.5));
        assert!(!screen.scene_ready);
        assert_eq!(screen.advance(13.5), vec![LoadingEvent::SceneReady]);
        assert!(screen.scene_ready);
        assert!(!screen.removed);
        assert!(screen.advance(15.0).is_empty());
        assert_eq!(screen.advance(15.5), vec![LoadingEvent::OverlayRemoved]);
        assert!(screen.removed);
        assert!(screen.advance(100.0).is_empty());
    }

    #[test]
    fn late_frame_fires_everything_due() {
        let mut screen = LoadingScreen::default();
        screen.on_complete(0.0);
        assert_eq!(
            screen.advance(60.0),
            vec![
                LoadingEvent::OverlayEnded,
                LoadingEvent::SceneReady,
                LoadingEvent::OverlayRemoved
            ]
        );
    }

    #[test]
    fn progress_is_frozen_after_end() {
        let mut screen = LoadingScreen::default();
        screen.on_complete(0.0);
        screen.advance(1.0);
        screen.on_progress(&Progress {
            url: "x".into(),
            items_loaded: 0,
            items_total: 2,
        });
        assert_eq!(screen.bar_scale, 1.0);
    }
}
