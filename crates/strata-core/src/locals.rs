//! # Configuration locals
//!
//! Strata keeps its tunables in thread‑local "locals": a stack of frames,
//! each able to override a typed value for the duration of a closure.
//!
//! - `Theme`: colors for scroll knobs, selection and marked text.
//! - `Density`: backing-store scale for layer surfaces.
//! - `ScrollPhysics`: deceleration, rubber-band and bounce constants.
//! - `TableMetrics`: virtualization lookahead.
//!
//! Widgets snapshot these when they are created, so overriding a local only
//! affects widgets built inside the closure:
//!
//! ```rust
//! use strata_core::*;
//!
//! let stiff = ScrollPhysics {
//!     deceleration_rate: 0.9,
//!     ..ScrollPhysics::default()
//! };
//!
//! with_scroll_physics(stiff, || {
//!     assert_eq!(scroll_physics().deceleration_rate, 0.9);
//! });
//! assert_eq!(scroll_physics().deceleration_rate, 0.95);
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

use web_time::Duration;

use crate::Color;

thread_local! {
    static LOCALS_STACK: RefCell<Vec<HashMap<TypeId, Box<dyn Any>>>> = RefCell::new(Vec::new());
}

fn with_locals_frame<R>(f: impl FnOnce() -> R) -> R {
    // Non-panicking frame guard (ensures pop on unwind)
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            LOCALS_STACK.with(|st| {
                st.borrow_mut().pop();
            });
        }
    }
    LOCALS_STACK.with(|st| st.borrow_mut().push(HashMap::new()));
    let _guard = Guard;
    f()
}

fn set_local_boxed(t: TypeId, v: Box<dyn Any>) {
    LOCALS_STACK.with(|st| {
        let mut st = st.borrow_mut();
        if let Some(top) = st.last_mut() {
            top.insert(t, v);
        } else {
            let mut m = HashMap::new();
            m.insert(t, v);
            st.push(m);
        }
    });
}

fn with_local<T: Any + Clone, R>(value: T, f: impl FnOnce() -> R) -> R {
    with_locals_frame(|| {
        set_local_boxed(TypeId::of::<T>(), Box::new(value));
        f()
    })
}

fn local_or_default<T: Any + Clone + Default>() -> T {
    LOCALS_STACK.with(|st| {
        for frame in st.borrow().iter().rev() {
            if let Some(v) = frame.get(&TypeId::of::<T>())
                && let Some(t) = v.downcast_ref::<T>()
            {
                return t.clone();
            }
        }
        T::default()
    })
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Theme {
    pub background: Color,
    /// Scroll indicator knob.
    pub scroll_knob: Color,
    /// Selection highlight behind selected text.
    pub selection: Color,
    /// Underline/background for input-method marked text.
    pub marked_text: Color,
    /// Default text color.
    pub text: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
            scroll_knob: Color(0, 0, 0, 128),
            selection: Color::from_hex("#B4D7FF"),
            marked_text: Color::from_hex("#FFE58A"),
            text: Color::BLACK,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Density {
    /// Backing-store pixels per point.
    pub scale: f32,
}

impl Default for Density {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// Tunables for the scroll engine.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollPhysics {
    /// Velocity multiplier per 60 Hz tick while throwing.
    pub deceleration_rate: f32,
    /// Minimum release speed (pt/s) that starts a throw.
    pub release_velocity_threshold: f32,
    /// Throw ends once the per-tick displacement (pt) drops below this.
    pub stop_epsilon: f32,
    /// Rubber-band scale `c1` in `c1 * (1 - 1/(x*c2/d + 1)) * d`.
    pub rubber_band_c1: f32,
    /// Rubber-band stiffness `c2`.
    pub rubber_band_c2: f32,
    /// Natural frequency (rad/s) of the critically damped bounce spring.
    pub bounce_omega: f32,
    /// Bounce ends when |position| and |velocity| are both below this.
    pub bounce_epsilon: f32,
    /// Duration of `set_content_offset(.., animated: true)`.
    #[cfg_attr(feature = "serde", serde(with = "duration_secs"))]
    pub animation_duration: Duration,
    /// Idle time before indicators start fading out.
    #[cfg_attr(feature = "serde", serde(with = "duration_secs"))]
    pub indicator_idle_delay: Duration,
    #[cfg_attr(feature = "serde", serde(with = "duration_secs"))]
    pub indicator_fade_duration: Duration,
    /// Points scrolled per line for wheel events without gesture phases.
    pub wheel_line_height: f32,
    pub bounce_enabled: bool,
}

impl Default for ScrollPhysics {
    fn default() -> Self {
        Self {
            deceleration_rate: 0.95,
            release_velocity_threshold: 50.0,
            stop_epsilon: 0.1,
            rubber_band_c1: 1.0,
            rubber_band_c2: 0.55,
            bounce_omega: 12.0,
            bounce_epsilon: 0.5,
            animation_duration: Duration::from_millis(200),
            indicator_idle_delay: Duration::from_millis(500),
            indicator_fade_duration: Duration::from_millis(250),
            wheel_line_height: 10.0,
            bounce_enabled: true,
        }
    }
}

#[cfg(feature = "serde")]
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use web_time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableMetrics {
    /// Extra points above and below the viewport in which cells are kept alive.
    pub lookahead: f32,
}

impl Default for TableMetrics {
    fn default() -> Self {
        Self { lookahead: 20.0 }
    }
}

pub fn with_theme<R>(theme: Theme, f: impl FnOnce() -> R) -> R {
    with_local(theme, f)
}

pub fn with_density<R>(density: Density, f: impl FnOnce() -> R) -> R {
    with_local(density, f)
}

pub fn with_scroll_physics<R>(physics: ScrollPhysics, f: impl FnOnce() -> R) -> R {
    with_local(physics, f)
}

pub fn with_table_metrics<R>(metrics: TableMetrics, f: impl FnOnce() -> R) -> R {
    with_local(metrics, f)
}

pub fn theme() -> Theme {
    local_or_default()
}

pub fn density() -> Density {
    local_or_default()
}

pub fn scroll_physics() -> ScrollPhysics {
    local_or_default()
}

pub fn table_metrics() -> TableMetrics {
    local_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_frames_restore() {
        with_density(Density { scale: 2.0 }, || {
            assert_eq!(density().scale, 2.0);
            with_density(Density { scale: 3.0 }, || assert_eq!(density().scale, 3.0));
            assert_eq!(density().scale, 2.0);
        });
        assert_eq!(density().scale, 1.0);
    }
}
