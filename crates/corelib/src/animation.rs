//! Keyframe animation clips and a mixer that plays them onto scene nodes.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::scene::{NodeId, Scene};
use crate::{Quat, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    /// Keys are stored as (in-tangent, value, out-tangent) triplets.
    CubicSpline,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Keyframes {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub node: NodeId,
    pub interpolation: Interpolation,
    /// Key times in seconds, ascending.
    pub times: Vec<f32>,
    pub values: Keyframes,
}

/// Where `t` falls between two keys: indices and blend factor.
fn locate(times: &[f32], t: f32) -> Option<(usize, usize, f32)> {
    let last = times.len().checked_sub(1)?;
    if t <= times[0] {
        return Some((0, 0, 0.0));
    }
    if t >= times[last] {
        return Some((last, last, 0.0));
    }
    let hi = times.partition_point(|&k| k <= t);
    let lo = hi - 1;
    let span = times[hi] - times[lo];
    let f = if span > 0.0 { (t - times[lo]) / span } else { 0.0 };
    Some((lo, hi, f))
}

impl Channel {
    /// Value key `i`, skipping tangents for cubic-spline channels.
    fn key_index(&self, i: usize) -> usize {
        match self.interpolation {
            Interpolation::CubicSpline => i * 3 + 1,
            _ => i,
        }
    }

    fn factor(&self, f: f32) -> f32 {
        match self.interpolation {
            Interpolation::Step => 0.0,
            _ => f,
        }
    }

    fn sample_vec3(&self, keys: &[Vec3], t: f32) -> Option<Vec3> {
        let (lo, hi, f) = locate(&self.times, t)?;
        let a = *keys.get(self.key_index(lo))?;
        let b = *keys.get(self.key_index(hi))?;
        Some(a.lerp(b, self.factor(f)))
    }

    fn sample_quat(&self, keys: &[Quat], t: f32) -> Option<Quat> {
        let (lo, hi, f) = locate(&self.times, t)?;
        let a = keys.get(self.key_index(lo))?.normalize();
        let b = keys.get(self.key_index(hi))?.normalize();
        Some(a.slerp(b, self.factor(f)).normalize())
    }

    /// Sample this channel at `t` and write the result into the target node.
    pub fn apply(&self, t: f32, scene: &mut Scene) {
        let Some(transform) = scene.transform_mut(self.node) else {
            return;
        };
        match &self.values {
            Keyframes::Translation(keys) => {
                if let Some(v) = self.sample_vec3(keys, t) {
                    transform.translation = v;
                }
            }
            Keyframes::Rotation(keys) => {
                if let Some(q) = self.sample_quat(keys, t) {
                    transform.rotation = q;
                }
            }
            Keyframes::Scale(keys) => {
                if let Some(v) = self.sample_vec3(keys, t) {
                    transform.scale = v;
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    /// Duration is taken from the last key of the longest channel.
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    pub fn apply(&self, t: f32, scene: &mut Scene) {
        for channel in &self.channels {
            channel.apply(t, scene);
        }
    }

    /// Offset node targets after the owning scene was merged into another.
    pub fn rebase(&mut self, node_offset: NodeId) {
        for channel in &mut self.channels {
            channel.node += node_offset;
        }
    }
}

/// Look up clips by exact name, in the order given.
pub fn find_clips<'a>(clips: &'a [AnimationClip], names: &[&str]) -> CoreResult<Vec<&'a AnimationClip>> {
    names
        .iter()
        .map(|&name| {
            clips
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| CoreError::MissingClip(name.to_owned()))
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(pub usize);

/// One clip being played: looping forever at `time_scale`.
#[derive(Clone, Debug)]
pub struct AnimationAction {
    pub clip: Arc<AnimationClip>,
    pub time: f32,
    pub time_scale: f32,
    pub playing: bool,
}

impl AnimationAction {
    fn advance(&mut self, dt: f32) {
        self.time += dt * self.time_scale;
        let d = self.clip.duration;
        if d > 0.0 {
            self.time = self.time.rem_euclid(d);
        } else {
            self.time = 0.0;
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
    time: f32,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing action if this clip already has one.
    pub fn clip_action(&mut self, clip: Arc<AnimationClip>) -> ActionId {
        if let Some(i) = self.actions.iter().position(|a| Arc::ptr_eq(&a.clip, &clip)) {
            return ActionId(i);
        }
        self.actions.push(AnimationAction {
            clip,
            time: 0.0,
            time_scale: 1.0,
            playing: false,
        });
        ActionId(self.actions.len() - 1)
    }

    pub fn play(&mut self, id: ActionId) {
        if let Some(action) = self.actions.get_mut(id.0) {
            action.playing = true;
        }
    }

    pub fn stop(&mut self, id: ActionId) {
        if let Some(action) = self.actions.get_mut(id.0) {
            action.playing = false;
            action.time = 0.0;
        }
    }

    pub fn action(&self, id: ActionId) -> Option<&AnimationAction> {
        self.actions.get(id.0)
    }

    /// Global mixer time in seconds.
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Advance every playing action by `dt` seconds and write the sampled
    /// values into the scene. Later actions overwrite earlier ones.
    pub fn update(&mut self, dt: f32, scene: &mut Scene) {
        self.time += dt;
        for action in self.actions.iter_mut().filter(|a| a.playing) {
            action.advance(dt);
            action.clip.apply(action.time, scene);
        }
    }
}
