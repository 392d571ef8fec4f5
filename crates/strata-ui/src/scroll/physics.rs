//! The scroll offset model.
//!
//! `ScrollModel` owns the unrounded content offset and the motion state
//! (dragging, throwing, bouncing or a programmatic animation). It never
//! looks at a clock: input carries timestamps and `tick` takes the elapsed
//! time, so every trajectory is reproducible.

use strata_core::{EdgeInsets, Easing, ScrollPhysics, Size, Tween, Vec2};
use web_time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Vertical, Axis::Horizontal];

    pub fn of(self, v: Vec2) -> f32 {
        match self {
            Axis::Vertical => v.y,
            Axis::Horizontal => v.x,
        }
    }

    pub fn extent(self, s: Size) -> f32 {
        match self {
            Axis::Vertical => s.height,
            Axis::Horizontal => s.width,
        }
    }

    fn set(self, v: &mut Vec2, value: f32) {
        match self {
            Axis::Vertical => v.y = value,
            Axis::Horizontal => v.x = value,
        }
    }
}

/// Displacement shown for `overpull` points of raw pull past the edge of a
/// container `dimension` points long.
///
/// `c1 * (1 - 1 / (x * c2 / d + 1)) * d`: monotonic, and always less than
/// the raw pull, approaching `c1 * d` asymptotically.
pub fn rubber_band(overpull: f32, dimension: f32, c1: f32, c2: f32) -> f32 {
    if dimension <= 0.0 {
        return 0.0;
    }
    let x = overpull.abs();
    let y = c1 * (1.0 - 1.0 / (x * c2 / dimension + 1.0)) * dimension;
    y.copysign(overpull)
}

/// Raw pull that `rubber_band` maps to `displacement`.
pub fn rubber_band_inverse(displacement: f32, dimension: f32, c1: f32, c2: f32) -> f32 {
    if dimension <= 0.0 || c2 <= 0.0 {
        return 0.0;
    }
    let y = displacement.abs();
    let limit = c1 * dimension;
    // past the asymptote; keep it finite
    let frac = (y / limit).min(0.999);
    let x = (1.0 / (1.0 - frac) - 1.0) * dimension / c2;
    x.copysign(displacement)
}

/// Observable scroll state. Only one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollState {
    Idle,
    Dragging,
    /// Dragging while past the content edge (rubber band engaged).
    Pulling,
    Throwing,
    Bouncing,
    /// `set_content_offset(.., animated: true)` in flight.
    Animating,
}

#[derive(Clone, Debug)]
struct Drag {
    raw: Vec2,
    velocity: Vec2,
    last_sample: Option<Instant>,
}

#[derive(Clone, Debug)]
enum Motion {
    Idle,
    Dragging(Drag),
    Throwing { velocity: Vec2 },
    Bouncing { target: Vec2, velocity: Vec2 },
    Animating(Tween<Vec2>),
}

/// Samples older than this do not count toward the release velocity.
const VELOCITY_WINDOW: f32 = 0.1;

#[derive(Clone, Debug)]
pub struct ScrollModel {
    offset: Vec2,
    content_size: Size,
    viewport: Size,
    insets: EdgeInsets,
    physics: ScrollPhysics,
    motion: Motion,
    scroll_enabled: bool,
    always_bounce_vertical: bool,
    always_bounce_horizontal: bool,
}

impl ScrollModel {
    pub fn new(physics: ScrollPhysics) -> Self {
        Self {
            offset: Vec2::ZERO,
            content_size: Size::ZERO,
            viewport: Size::ZERO,
            insets: EdgeInsets::ZERO,
            physics,
            motion: Motion::Idle,
            scroll_enabled: true,
            always_bounce_vertical: true,
            always_bounce_horizontal: false,
        }
    }

    pub fn physics(&self) -> &ScrollPhysics {
        &self.physics
    }

    pub fn set_physics(&mut self, physics: ScrollPhysics) {
        self.physics = physics;
    }

    // ----- geometry -----

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn content_size(&self) -> Size {
        self.content_size
    }

    pub fn set_content_size(&mut self, size: Size) {
        self.content_size = size;
        self.settle_into_bounds();
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, size: Size) {
        self.viewport = size;
        self.settle_into_bounds();
    }

    pub fn content_insets(&self) -> EdgeInsets {
        self.insets
    }

    pub fn set_content_insets(&mut self, insets: EdgeInsets) {
        self.insets = insets;
        self.settle_into_bounds();
    }

    pub fn min_offset(&self) -> Vec2 {
        Vec2::new(-self.insets.left, -self.insets.top)
    }

    pub fn max_offset(&self) -> Vec2 {
        let min = self.min_offset();
        Vec2::new(
            (self.content_size.width + self.insets.right - self.viewport.width).max(min.x),
            (self.content_size.height + self.insets.bottom - self.viewport.height).max(min.y),
        )
    }

    pub fn clamp_offset(&self, p: Vec2) -> Vec2 {
        let (min, max) = (self.min_offset(), self.max_offset());
        Vec2::new(p.x.clamp(min.x, max.x), p.y.clamp(min.y, max.y))
    }

    pub fn is_out_of_bounds(&self) -> bool {
        self.clamp_offset(self.offset) != self.offset
    }

    pub fn is_scrollable(&self, axis: Axis) -> bool {
        axis.of(self.max_offset()) > axis.of(self.min_offset())
    }

    fn can_pull(&self, axis: Axis) -> bool {
        let always = match axis {
            Axis::Vertical => self.always_bounce_vertical,
            Axis::Horizontal => self.always_bounce_horizontal,
        };
        self.physics.bounce_enabled && (always || self.is_scrollable(axis))
    }

    fn can_move(&self, axis: Axis) -> bool {
        self.is_scrollable(axis) || self.can_pull(axis)
    }

    /// While idle, shrinking content or viewport pulls the offset back in.
    fn settle_into_bounds(&mut self) {
        if matches!(self.motion, Motion::Idle) {
            self.offset = self.clamp_offset(self.offset);
        }
    }

    // ----- flags -----

    pub fn is_scroll_enabled(&self) -> bool {
        self.scroll_enabled
    }

    pub fn set_scroll_enabled(&mut self, enabled: bool) {
        self.scroll_enabled = enabled;
        if !enabled {
            self.stop();
        }
    }

    pub fn set_bounce_enabled(&mut self, enabled: bool) {
        self.physics.bounce_enabled = enabled;
    }

    pub fn set_always_bounce(&mut self, vertical: bool, horizontal: bool) {
        self.always_bounce_vertical = vertical;
        self.always_bounce_horizontal = horizontal;
    }

    // ----- state -----

    pub fn state(&self) -> ScrollState {
        match &self.motion {
            Motion::Idle => ScrollState::Idle,
            Motion::Dragging(_) if self.is_out_of_bounds() => ScrollState::Pulling,
            Motion::Dragging(_) => ScrollState::Dragging,
            Motion::Throwing { .. } => ScrollState::Throwing,
            Motion::Bouncing { .. } => ScrollState::Bouncing,
            Motion::Animating(_) => ScrollState::Animating,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.motion, Motion::Dragging(_))
    }

    /// Something will move without further input.
    pub fn is_animating(&self) -> bool {
        matches!(
            self.motion,
            Motion::Throwing { .. } | Motion::Bouncing { .. } | Motion::Animating(_)
        )
    }

    pub fn velocity(&self) -> Vec2 {
        match &self.motion {
            Motion::Dragging(d) => d.velocity,
            Motion::Throwing { velocity } | Motion::Bouncing { velocity, .. } => *velocity,
            _ => Vec2::ZERO,
        }
    }

    /// How far past the content edge the user is pulling.
    pub fn pull_offset(&self) -> Vec2 {
        match self.motion {
            Motion::Dragging(_) => self.offset - self.clamp_offset(self.offset),
            _ => Vec2::ZERO,
        }
    }

    /// Remaining distance of a bounce-back.
    pub fn bounce_offset(&self) -> Vec2 {
        match self.motion {
            Motion::Bouncing { target, .. } => self.offset - target,
            _ => Vec2::ZERO,
        }
    }

    /// Target of the programmatic animation in flight.
    pub fn animation_target(&self) -> Option<Vec2> {
        match &self.motion {
            Motion::Animating(t) => Some(*t.target()),
            _ => None,
        }
    }

    /// Cancels any motion, leaving the offset clamped.
    pub fn stop(&mut self) {
        self.motion = Motion::Idle;
        self.offset = self.clamp_offset(self.offset);
    }

    // ----- programmatic -----

    /// Moves to `p`. Clamped unless the user is pulling the rubber band.
    pub fn set_offset(&mut self, p: Vec2) {
        if self.is_dragging() {
            let raw = self.raw_for_offset(p);
            if let Motion::Dragging(d) = &mut self.motion {
                d.raw = raw;
            }
            self.offset = p;
            return;
        }
        self.motion = Motion::Idle;
        self.offset = self.clamp_offset(p);
    }

    /// Starts an eased animation to `target` (clamped).
    pub fn animate_to(&mut self, target: Vec2) {
        let target = self.clamp_offset(target);
        if target == self.offset || self.physics.animation_duration.is_zero() {
            self.set_offset(target);
            return;
        }
        self.motion = Motion::Animating(Tween::new(
            self.offset,
            target,
            self.physics.animation_duration,
            Easing::EaseInOut,
        ));
    }

    /// Phase-less wheel scrolling: clamped, no rubber band.
    pub fn scroll_by(&mut self, delta: Vec2) -> bool {
        if !self.scroll_enabled {
            return false;
        }
        let before = self.offset;
        let mut delta = delta;
        for axis in Axis::ALL {
            if !self.is_scrollable(axis) {
                axis.set(&mut delta, 0.0);
            }
        }
        self.motion = Motion::Idle;
        self.offset = self.clamp_offset(self.clamp_offset(before) + delta);
        self.offset != before
    }

    // ----- dragging -----

    /// Starts a drag, cancelling any throw, bounce or animation in flight.
    pub fn begin_drag(&mut self, now: Instant) {
        let raw = self.raw_for_offset(self.offset);
        self.motion = Motion::Dragging(Drag {
            raw,
            velocity: Vec2::ZERO,
            last_sample: Some(now),
        });
    }

    /// Unconstrained drag position that displays as `offset`.
    fn raw_for_offset(&self, offset: Vec2) -> Vec2 {
        let clamped = self.clamp_offset(offset);
        let over = offset - clamped;
        let (c1, c2) = (self.physics.rubber_band_c1, self.physics.rubber_band_c2);
        Vec2::new(
            clamped.x + rubber_band_inverse(over.x, self.viewport.width, c1, c2),
            clamped.y + rubber_band_inverse(over.y, self.viewport.height, c1, c2),
        )
    }

    fn offset_for_raw(&self, raw: Vec2) -> Vec2 {
        let (c1, c2) = (self.physics.rubber_band_c1, self.physics.rubber_band_c2);
        let min = self.min_offset();
        let clamped = self.clamp_offset(raw);
        let mut out = clamped;
        for axis in Axis::ALL {
            if !self.can_move(axis) {
                axis.set(&mut out, axis.of(min));
                continue;
            }
            let over = axis.of(raw) - axis.of(clamped);
            if over != 0.0 && self.can_pull(axis) {
                let d = axis.extent(self.viewport);
                axis.set(&mut out, axis.of(clamped) + rubber_band(over, d, c1, c2));
            }
        }
        out
    }

    /// Moves the content by `delta` (content coordinates). Returns whether the offset changed.
    pub fn drag_by(&mut self, delta: Vec2, now: Instant) -> bool {
        if !self.scroll_enabled {
            return false;
        }
        if !self.is_dragging() {
            self.begin_drag(now);
        }
        let Motion::Dragging(mut d) = std::mem::replace(&mut self.motion, Motion::Idle) else {
            return false;
        };
        d.raw = d.raw + delta;
        let dt = d
            .last_sample
            .map(|t| now.saturating_duration_since(t).as_secs_f32())
            .unwrap_or(0.0);
        if dt > 0.0 {
            let inst = delta * (1.0 / dt);
            d.velocity = if dt > VELOCITY_WINDOW {
                inst
            } else {
                inst * 0.8 + d.velocity * 0.2
            };
        }
        d.last_sample = Some(now);
        let before = self.offset;
        self.offset = self.offset_for_raw(d.raw);
        self.motion = Motion::Dragging(d);
        self.offset != before
    }

    /// Ends the drag using the tracked velocity.
    pub fn end_drag(&mut self, now: Instant) {
        let v = match &self.motion {
            Motion::Dragging(d) => match d.last_sample {
                Some(t) if now.saturating_duration_since(t).as_secs_f32() > VELOCITY_WINDOW => Vec2::ZERO,
                _ => d.velocity,
            },
            _ => return,
        };
        self.release(v);
    }

    /// Ends the drag with an explicit release velocity (pt/s): bounce back
    /// when past an edge, throw when fast enough, otherwise settle.
    pub fn release(&mut self, velocity: Vec2) {
        let mut velocity = velocity;
        for axis in Axis::ALL {
            if !self.is_scrollable(axis) {
                axis.set(&mut velocity, 0.0);
            }
        }
        self.motion = if self.is_out_of_bounds() {
            Motion::Bouncing {
                target: self.clamp_offset(self.offset),
                velocity: Vec2::ZERO,
            }
        } else if velocity.length() > self.physics.release_velocity_threshold {
            Motion::Throwing { velocity }
        } else {
            Motion::Idle
        };
    }

    // ----- stepping -----

    /// Advances the motion by `dt`. Returns whether it is still moving.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let dt = dt.as_secs_f32().min(0.25);
        match std::mem::replace(&mut self.motion, Motion::Idle) {
            Motion::Idle => false,
            m @ Motion::Dragging(_) => {
                self.motion = m;
                false
            }
            Motion::Throwing { velocity } => self.step_throw(velocity, dt),
            Motion::Bouncing { target, velocity } => self.step_bounce(target, velocity, dt),
            Motion::Animating(mut tw) => {
                let (v, running) = tw.advance(Duration::from_secs_f32(dt));
                self.offset = v;
                if running {
                    self.motion = Motion::Animating(tw);
                }
                running
            }
        }
    }

    fn step_throw(&mut self, velocity: Vec2, dt: f32) -> bool {
        let decay = self.physics.deceleration_rate.powf(dt * 60.0);
        let mut v = velocity;
        self.offset = self.offset + v * dt;
        v = v * decay;

        let clamped = self.clamp_offset(self.offset);
        let mut hit_edge = false;
        for axis in Axis::ALL {
            if axis.of(self.offset) != axis.of(clamped) {
                if self.can_pull(axis) {
                    hit_edge = true;
                } else {
                    axis.set(&mut self.offset, axis.of(clamped));
                    axis.set(&mut v, 0.0);
                }
            }
        }
        if hit_edge {
            self.motion = Motion::Bouncing {
                target: self.clamp_offset(self.offset),
                velocity: v,
            };
            return true;
        }
        // per-60Hz-tick displacement
        if v.length() / 60.0 < self.physics.stop_epsilon {
            return false;
        }
        self.motion = Motion::Throwing { velocity: v };
        true
    }

    /// Critically damped spring toward `target`, solved in closed form.
    fn step_bounce(&mut self, target: Vec2, velocity: Vec2, dt: f32) -> bool {
        let w = self.physics.bounce_omega;
        let e = (-w * dt).exp();
        let mut x = self.offset - target;
        let mut v = velocity;
        for axis in Axis::ALL {
            let x0 = axis.of(x);
            let v0 = axis.of(v);
            let b = v0 + w * x0;
            axis.set(&mut x, (x0 + b * dt) * e);
            axis.set(&mut v, (v0 - w * b * dt) * e);
        }
        let eps = self.physics.bounce_epsilon;
        if x.x.abs() < eps && x.y.abs() < eps && v.x.abs() < eps && v.y.abs() < eps {
            self.offset = target;
            return false;
        }
        self.offset = target + x;
        self.motion = Motion::Bouncing { target, velocity: v };
        true
    }
}
