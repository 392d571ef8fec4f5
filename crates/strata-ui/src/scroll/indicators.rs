//! Scroll indicator visibility and knob geometry.

use smallvec::SmallVec;
use strata_core::{Rect, ScrollPhysics, Size};
use web_time::Instant;

use super::physics::{Axis, ScrollModel};

pub const KNOB_THICKNESS: f32 = 7.0;
pub const KNOB_MARGIN: f32 = 2.0;
pub const MIN_KNOB_LENGTH: f32 = 16.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndicatorVisibility {
    Never,
    #[default]
    WhileScrolling,
    WhileMouseInside,
    Always,
}

#[derive(Clone, Copy, Debug, Default)]
struct AxisIndicator {
    alpha: f32,
    /// When the indicator stopped being wanted; the fade runs from here.
    fade_start: Option<Instant>,
}

/// Fade state for the two indicators. Visible edges are reported from
/// `update` so the scroll view can tell its delegate.
#[derive(Clone, Debug, Default)]
pub struct Indicators {
    policy: IndicatorVisibility,
    last_activity: Option<Instant>,
    mouse_inside: bool,
    axes: [AxisIndicator; 2],
}

fn slot(axis: Axis) -> usize {
    match axis {
        Axis::Vertical => 0,
        Axis::Horizontal => 1,
    }
}

impl Indicators {
    pub fn new(policy: IndicatorVisibility) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> IndicatorVisibility {
        self.policy
    }

    pub fn set_policy(&mut self, policy: IndicatorVisibility) {
        self.policy = policy;
    }

    pub fn note_activity(&mut self, now: Instant) {
        self.last_activity = Some(now);
    }

    pub fn set_mouse_inside(&mut self, inside: bool) {
        self.mouse_inside = inside;
    }

    pub fn is_mouse_inside(&self) -> bool {
        self.mouse_inside
    }

    pub fn alpha(&self, axis: Axis) -> f32 {
        self.axes[slot(axis)].alpha
    }

    fn wanted(&self, scrolling: bool, now: Instant, physics: &ScrollPhysics) -> bool {
        let recent = scrolling
            || self
                .last_activity
                .is_some_and(|t| now.saturating_duration_since(t) < physics.indicator_idle_delay);
        match self.policy {
            IndicatorVisibility::Never => false,
            IndicatorVisibility::Always => true,
            IndicatorVisibility::WhileScrolling => recent,
            IndicatorVisibility::WhileMouseInside => self.mouse_inside || recent,
        }
    }

    /// Recomputes both alphas. Returns the axes whose visibility flipped.
    pub fn update(
        &mut self,
        now: Instant,
        scrolling: bool,
        model: &ScrollModel,
    ) -> SmallVec<[(Axis, bool); 2]> {
        let physics = *model.physics();
        let wanted = self.wanted(scrolling, now, &physics);
        let mut changes = SmallVec::new();
        for axis in Axis::ALL {
            let show = wanted && model.is_scrollable(axis);
            let ind = &mut self.axes[slot(axis)];
            let was_visible = ind.alpha > 0.0;
            if show {
                ind.alpha = 1.0;
                ind.fade_start = None;
            } else if ind.alpha > 0.0 {
                let start = *ind.fade_start.get_or_insert(now);
                let d = physics.indicator_fade_duration.as_secs_f32();
                let t = now.saturating_duration_since(start).as_secs_f32();
                ind.alpha = if d <= 0.0 { 0.0 } else { (1.0 - t / d).max(0.0) };
                if ind.alpha == 0.0 {
                    ind.fade_start = None;
                }
            }
            let visible = ind.alpha > 0.0;
            if visible != was_visible {
                changes.push((axis, visible));
            }
        }
        changes
    }

    /// Whether an indicator will still change without further input.
    pub fn needs_ticks(&self) -> bool {
        let pinned = match self.policy {
            IndicatorVisibility::Always => true,
            IndicatorVisibility::WhileMouseInside => self.mouse_inside,
            _ => false,
        };
        !pinned && self.axes.iter().any(|a| a.alpha > 0.0)
    }
}

/// Knob rect for `axis` in viewport coordinates (top-left of the visible
/// area is the origin), or `None` when the axis cannot scroll.
///
/// The knob shrinks by the amount of rubber-band pull. `reserved` is a
/// corner kept free at the bottom right, e.g. for a resize grip.
pub fn knob_rect(model: &ScrollModel, axis: Axis, reserved: Option<Size>) -> Option<Rect> {
    if !model.is_scrollable(axis) {
        return None;
    }
    let viewport = model.viewport();
    let insets = model.content_insets();
    let content = model.content_size();
    let other_visible = match axis {
        Axis::Vertical => model.is_scrollable(Axis::Horizontal),
        Axis::Horizontal => model.is_scrollable(Axis::Vertical),
    };
    let corner = if other_visible {
        KNOB_THICKNESS + KNOB_MARGIN
    } else {
        0.0
    };
    let reserved = reserved.map(|s| axis.extent(s)).unwrap_or(0.0);

    let (extent, content_extent) = match axis {
        Axis::Vertical => (viewport.height, content.height + insets.vertical()),
        Axis::Horizontal => (viewport.width, content.width + insets.horizontal()),
    };
    let track = (extent - 2.0 * KNOB_MARGIN - corner.max(reserved)).max(0.0);
    let min_len = MIN_KNOB_LENGTH.min(track);

    let fraction = if content_extent > 0.0 {
        (extent / content_extent).min(1.0)
    } else {
        1.0
    };
    let pull = axis.of(model.offset() - model.clamp_offset(model.offset())).abs();
    let len = ((track * fraction).max(min_len) - pull).max(min_len);

    let (min, max) = (axis.of(model.min_offset()), axis.of(model.max_offset()));
    let progress = if max > min {
        ((axis.of(model.offset()) - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let along = KNOB_MARGIN + (track - len) * progress;
    Some(match axis {
        Axis::Vertical => Rect::new(viewport.width - KNOB_THICKNESS - KNOB_MARGIN, along, KNOB_THICKNESS, len),
        Axis::Horizontal => Rect::new(along, viewport.height - KNOB_THICKNESS - KNOB_MARGIN, len, KNOB_THICKNESS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Vec2;
    use web_time::Duration;

    fn model() -> ScrollModel {
        let mut m = ScrollModel::new(ScrollPhysics::default());
        m.set_viewport(Size::new(100.0, 100.0));
        m.set_content_size(Size::new(100.0, 400.0));
        m
    }

    #[test]
    fn test_while_scrolling_fades_after_idle_delay() {
        let m = model();
        let mut ind = Indicators::new(IndicatorVisibility::WhileScrolling);
        let t0 = Instant::now();
        ind.note_activity(t0);
        let changes = ind.update(t0, false, &m);
        assert_eq!(changes.as_slice(), &[(Axis::Vertical, true)]);
        assert_eq!(ind.alpha(Axis::Horizontal), 0.0);

        // still within the idle delay
        assert!(ind.update(t0 + Duration::from_millis(400), false, &m).is_empty());
        assert_eq!(ind.alpha(Axis::Vertical), 1.0);

        // fade starts, then completes
        let t1 = t0 + Duration::from_millis(600);
        assert!(ind.update(t1, false, &m).is_empty());
        let mid = ind.update(t1 + Duration::from_millis(125), false, &m);
        assert!(mid.is_empty());
        assert!((ind.alpha(Axis::Vertical) - 0.5).abs() < 0.01);
        let done = ind.update(t1 + Duration::from_millis(300), false, &m);
        assert_eq!(done.as_slice(), &[(Axis::Vertical, false)]);
        assert!(!ind.needs_ticks());
    }

    #[test]
    fn test_policies() {
        let m = model();
        let t0 = Instant::now();
        let mut never = Indicators::new(IndicatorVisibility::Never);
        never.note_activity(t0);
        assert!(never.update(t0, true, &m).is_empty());

        let mut always = Indicators::new(IndicatorVisibility::Always);
        always.update(t0, false, &m);
        assert_eq!(always.alpha(Axis::Vertical), 1.0);
        assert!(!always.needs_ticks());

        let mut hover = Indicators::new(IndicatorVisibility::WhileMouseInside);
        hover.set_mouse_inside(true);
        hover.update(t0, false, &m);
        assert_eq!(hover.alpha(Axis::Vertical), 1.0);
    }

    #[test]
    fn test_knob_tracks_offset() {
        let mut m = model();
        let top = knob_rect(&m, Axis::Vertical, None).unwrap();
        // track 96, visible fraction 1/4
        assert_eq!(top, Rect::new(91.0, 2.0, 7.0, 24.0));
        m.set_offset(Vec2::new(0.0, 300.0));
        let bottom = knob_rect(&m, Axis::Vertical, None).unwrap();
        assert_eq!(bottom.max_y(), 98.0);
        assert!(knob_rect(&m, Axis::Horizontal, None).is_none());
    }

    #[test]
    fn test_knob_shrinks_under_pull_and_reserves_corner() {
        let mut m = model();
        m.begin_drag(Instant::now());
        m.set_offset(Vec2::new(0.0, -5.0));
        let k = knob_rect(&m, Axis::Vertical, None).unwrap();
        assert_eq!(k.h, 19.0);
        assert_eq!(k.y, 2.0);

        let mut m = model();
        m.set_offset(Vec2::new(0.0, 300.0));
        let k = knob_rect(&m, Axis::Vertical, Some(Size::new(15.0, 15.0))).unwrap();
        assert_eq!(k.max_y(), 83.0);
    }
}
