use std::cell::Cell;

use web_time::{Duration, Instant};

use crate::{Color, Vec2, ViewTree};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
}

impl Easing {
    pub fn interpolate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

pub trait Interpolate {
    fn interpolate(&self, other: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for Vec2 {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        Vec2::new(
            self.x.interpolate(&other.x, t),
            self.y.interpolate(&other.y, t),
        )
    }
}

impl Interpolate for Color {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        let ch = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color(
            ch(self.0, other.0),
            ch(self.1, other.1),
            ch(self.2, other.2),
            ch(self.3, other.3),
        )
    }
}

/// Time source for hosts driving the display cycle.
pub trait Clock {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock tests can drive deterministically.
pub struct TestClock {
    t: Cell<Instant>,
}

impl TestClock {
    pub fn new(start: Instant) -> Self {
        Self {
            t: Cell::new(start),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.t.set(self.t.get() + d);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.t.get()
    }
}

/// Fixed-duration interpolation advanced by explicit time steps.
#[derive(Clone, Debug)]
pub struct Tween<T: Interpolate + Clone> {
    from: T,
    to: T,
    elapsed: Duration,
    duration: Duration,
    easing: Easing,
}

impl<T: Interpolate + Clone> Tween<T> {
    pub fn new(from: T, to: T, duration: Duration, easing: Easing) -> Self {
        Self {
            from,
            to,
            elapsed: Duration::ZERO,
            duration,
            easing,
        }
    }

    /// Advances by `dt`; returns the new value and whether the tween is still running.
    pub fn advance(&mut self, dt: Duration) -> (T, bool) {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        let done = self.is_finished();
        (self.value(), !done)
    }

    pub fn value(&self) -> T {
        if self.duration.is_zero() || self.is_finished() {
            return self.to.clone();
        }
        let t = self.elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.from.interpolate(&self.to, self.easing.interpolate(t))
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn target(&self) -> &T {
        &self.to
    }
}

/// Something advanced once per display-cycle tick (scroll physics, fades).
pub trait Animator {
    /// Returns `false` once the animation has settled; it is then dropped.
    fn tick(&self, tree: &mut ViewTree, now: Instant) -> bool;
}
