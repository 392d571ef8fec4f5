//! # Scroll views
//!
//! A scroll view is an ordinary view whose bounds origin is the content
//! offset: children are laid out in content coordinates and the tree shifts
//! them when the origin moves. The offset itself lives in a [`ScrollModel`],
//! which keeps it unrounded; only the bounds origin is snapped to device
//! pixels.
//!
//! Motion (throws, bounces, animated offsets, indicator fades) is driven by
//! an [`Animator`] registered with the tree while something is moving, so a
//! host only needs to call `ViewTree::run_frame` once per refresh.
//!
//! ```rust
//! use strata_core::*;
//! use strata_ui::scroll::ScrollView;
//!
//! let mut tree = ViewTree::new();
//! let scroll = ScrollView::new(&mut tree, Rect::new(0.0, 0.0, 200.0, 100.0));
//! scroll.set_content_size(&mut tree, Size::new(200.0, 1000.0));
//! scroll.set_content_offset(&mut tree, Vec2::new(0.0, 250.0), false);
//! assert_eq!(tree.bounds(scroll.view()).y, 250.0);
//! ```

pub mod indicators;
pub mod physics;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use strata_core::{
    Animator, Clock, EdgeInsets, EventResult, LayoutFn, PointerEvent, PointerEventKind, Rect, Responder, ScrollPhase,
    ScrollWheelEvent, Size, SystemClock, Vec2, ViewId, ViewTree, density, scroll_physics, theme,
};
use web_time::{Duration, Instant};

pub use indicators::{IndicatorVisibility, Indicators, knob_rect};
pub use physics::{Axis, ScrollModel, ScrollState, rubber_band};

/// Scroll notifications. Called synchronously, after the view has been
/// updated; implementations may mutate the tree.
#[allow(unused_variables)]
pub trait ScrollDelegate {
    fn did_scroll(&self, tree: &mut ViewTree, scroll: &ScrollView) {}
    fn will_begin_dragging(&self, tree: &mut ViewTree, scroll: &ScrollView) {}
    fn did_end_dragging(&self, tree: &mut ViewTree, scroll: &ScrollView) {}
    fn indicator_visibility_changed(&self, tree: &mut ViewTree, scroll: &ScrollView, axis: Axis, visible: bool) {}
}

struct Inner {
    view: ViewId,
    knobs: [ViewId; 2],
    model: RefCell<ScrollModel>,
    indicators: RefCell<Indicators>,
    delegate: RefCell<Option<Weak<dyn ScrollDelegate>>>,
    content_layout: RefCell<Option<LayoutFn>>,
    resize_knob_size: Cell<Option<Size>>,
    pointer_dragging: Cell<bool>,
    last_pointer: Cell<Option<Vec2>>,
    ticking: Cell<bool>,
    last_tick: Cell<Option<Instant>>,
}

/// Handle to a scroll view. Cheap to clone; the view's responder, layout
/// callback and animator hold weak references back to it.
#[derive(Clone)]
pub struct ScrollView {
    inner: Rc<Inner>,
}

impl PartialEq for ScrollView {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ScrollView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollView")
            .field("view", &self.inner.view)
            .field("offset", &self.content_offset())
            .field("state", &self.state())
            .finish()
    }
}

impl ScrollView {
    pub fn new(tree: &mut ViewTree, frame: Rect) -> Self {
        let view = tree.create_view(frame);
        tree.set_clips_to_bounds(view, true);
        let knob_color = theme().scroll_knob;
        let knobs = [(); 2].map(|_| {
            let k = tree.create_view(Rect::ZERO);
            tree.set_user_interaction_enabled(k, false);
            tree.set_opaque(k, false);
            tree.set_z_position(k, 1000.0);
            tree.set_alpha(k, 0.0);
            tree.set_hidden(k, true);
            tree.set_draw(k, move |_, _, cx| {
                let b = cx.bounds();
                cx.fill_rounded_rect(b, knob_color, indicators::KNOB_THICKNESS / 2.0);
            });
            tree.add_child(view, k);
            k
        });

        let mut model = ScrollModel::new(scroll_physics());
        model.set_viewport(frame.size());
        let inner = Rc::new(Inner {
            view,
            knobs,
            model: RefCell::new(model),
            indicators: RefCell::new(Indicators::new(IndicatorVisibility::default())),
            delegate: RefCell::new(None),
            content_layout: RefCell::new(None),
            resize_knob_size: Cell::new(None),
            pointer_dragging: Cell::new(false),
            last_pointer: Cell::new(None),
            ticking: Cell::new(false),
            last_tick: Cell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        tree.set_layout(view, move |tree, _| {
            if let Some(inner) = weak.upgrade() {
                ScrollView { inner }.layout(tree);
            }
        });
        tree.set_responder(
            view,
            Rc::new(ScrollResponder {
                scroll: Rc::downgrade(&inner),
            }),
        );
        log::trace!("scroll view {view:?} created");
        ScrollView { inner }
    }

    /// Recovers the handle from a weak reference held by a callback.
    pub fn upgrade(weak: &WeakScrollView) -> Option<ScrollView> {
        weak.0.upgrade().map(|inner| ScrollView { inner })
    }

    pub fn downgrade(&self) -> WeakScrollView {
        WeakScrollView(Rc::downgrade(&self.inner))
    }

    pub fn view(&self) -> ViewId {
        self.inner.view
    }

    pub fn knob_view(&self, axis: Axis) -> ViewId {
        match axis {
            Axis::Vertical => self.inner.knobs[0],
            Axis::Horizontal => self.inner.knobs[1],
        }
    }

    pub fn is_knob(&self, id: ViewId) -> bool {
        self.inner.knobs.contains(&id)
    }

    pub fn set_delegate<D: ScrollDelegate + 'static>(&self, delegate: &Rc<D>) {
        let weak: Weak<dyn ScrollDelegate> = Rc::downgrade(delegate) as Weak<dyn ScrollDelegate>;
        *self.inner.delegate.borrow_mut() = Some(weak);
    }

    pub fn clear_delegate(&self) {
        *self.inner.delegate.borrow_mut() = None;
    }

    fn delegate(&self) -> Option<Rc<dyn ScrollDelegate>> {
        self.inner.delegate.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Runs after the scroll view's own layout (viewport sync) on every pass.
    pub fn set_content_layout(&self, f: impl Fn(&mut ViewTree, ViewId) + 'static) {
        *self.inner.content_layout.borrow_mut() = Some(Rc::new(f));
    }

    // ----- model access -----

    pub fn with_model<R>(&self, f: impl FnOnce(&ScrollModel) -> R) -> R {
        f(&self.inner.model.borrow())
    }

    pub fn content_offset(&self) -> Vec2 {
        self.inner.model.borrow().offset()
    }

    pub fn content_size(&self) -> Size {
        self.inner.model.borrow().content_size()
    }

    pub fn content_insets(&self) -> EdgeInsets {
        self.inner.model.borrow().content_insets()
    }

    pub fn state(&self) -> ScrollState {
        self.inner.model.borrow().state()
    }

    pub fn is_dragging(&self) -> bool {
        self.inner.model.borrow().is_dragging()
    }

    pub fn pull_offset(&self) -> Vec2 {
        self.inner.model.borrow().pull_offset()
    }

    pub fn bounce_offset(&self) -> Vec2 {
        self.inner.model.borrow().bounce_offset()
    }

    pub fn is_scroll_enabled(&self) -> bool {
        self.inner.model.borrow().is_scroll_enabled()
    }

    pub fn set_scroll_enabled(&self, tree: &mut ViewTree, enabled: bool) {
        self.inner.model.borrow_mut().set_scroll_enabled(enabled);
        self.apply(tree, None);
    }

    pub fn is_bounce_enabled(&self) -> bool {
        self.inner.model.borrow().physics().bounce_enabled
    }

    pub fn set_bounce_enabled(&self, enabled: bool) {
        self.inner.model.borrow_mut().set_bounce_enabled(enabled);
    }

    pub fn set_always_bounce(&self, vertical: bool, horizontal: bool) {
        self.inner.model.borrow_mut().set_always_bounce(vertical, horizontal);
    }

    pub fn set_physics(&self, physics: strata_core::ScrollPhysics) {
        self.inner.model.borrow_mut().set_physics(physics);
    }

    pub fn indicator_visibility(&self) -> IndicatorVisibility {
        self.inner.indicators.borrow().policy()
    }

    pub fn set_indicator_visibility(&self, tree: &mut ViewTree, policy: IndicatorVisibility) {
        self.inner.indicators.borrow_mut().set_policy(policy);
        self.refresh_indicators(tree, self.now(tree));
    }

    /// Keeps the bottom-right corner free of knobs (e.g. a window resize grip).
    pub fn set_resize_knob_size(&self, tree: &mut ViewTree, size: Option<Size>) {
        self.inner.resize_knob_size.set(size);
        self.layout_knobs(tree);
    }

    pub fn indicator_alpha(&self, axis: Axis) -> f32 {
        self.inner.indicators.borrow().alpha(axis)
    }

    /// Knob rect in the scroll view's bounds coordinates.
    pub fn knob_rect(&self, axis: Axis) -> Option<Rect> {
        let m = self.inner.model.borrow();
        knob_rect(&m, axis, self.inner.resize_knob_size.get()).map(|r| r.offset(m.offset()))
    }

    /// The part of the content currently on screen.
    pub fn visible_rect(&self) -> Rect {
        let m = self.inner.model.borrow();
        Rect::from_origin_size(m.offset(), m.viewport())
    }

    pub fn set_content_size(&self, tree: &mut ViewTree, size: Size) {
        let changed = {
            let mut m = self.inner.model.borrow_mut();
            let before = m.offset();
            m.set_content_size(size);
            m.offset() != before
        };
        if changed {
            self.apply(tree, None);
        } else {
            self.layout_knobs(tree);
        }
    }

    pub fn set_content_insets(&self, tree: &mut ViewTree, insets: EdgeInsets) {
        self.inner.model.borrow_mut().set_content_insets(insets);
        self.apply(tree, None);
    }

    fn now(&self, tree: &ViewTree) -> Instant {
        tree.last_tick().unwrap_or_else(|| SystemClock.now())
    }

    // ----- programmatic scrolling -----

    /// Snaps to or animates toward `offset`. Clamped unless a rubber-band
    /// pull is in progress.
    pub fn set_content_offset(&self, tree: &mut ViewTree, offset: Vec2, animated: bool) {
        let now = self.now(tree);
        if animated {
            self.inner.model.borrow_mut().animate_to(offset);
            self.inner.indicators.borrow_mut().note_activity(now);
            self.ensure_ticking(tree, now);
        } else {
            self.inner.model.borrow_mut().set_offset(offset);
            self.apply(tree, Some(now));
        }
    }

    /// Scrolls the minimum distance that brings `rect` (content coordinates) on screen.
    pub fn scroll_rect_to_visible(&self, tree: &mut ViewTree, rect: Rect, animated: bool) {
        let visible = self.visible_rect();
        let mut target = visible.origin();
        if rect.h >= visible.h || rect.y < visible.y {
            target.y = rect.y;
        } else if rect.max_y() > visible.max_y() {
            target.y = rect.max_y() - visible.h;
        }
        if rect.w >= visible.w || rect.x < visible.x {
            target.x = rect.x;
        } else if rect.max_x() > visible.max_x() {
            target.x = rect.max_x() - visible.w;
        }
        if target != visible.origin() {
            self.set_content_offset(tree, target, animated);
        }
    }

    pub fn scroll_to_top(&self, tree: &mut ViewTree, animated: bool) {
        let min = self.inner.model.borrow().min_offset();
        let x = self.content_offset().x;
        self.set_content_offset(tree, Vec2::new(x, min.y), animated);
    }

    pub fn scroll_to_bottom(&self, tree: &mut ViewTree, animated: bool) {
        let max = self.inner.model.borrow().max_offset();
        let x = self.content_offset().x;
        self.set_content_offset(tree, Vec2::new(x, max.y), animated);
    }

    pub fn is_scrolling_to_top(&self) -> bool {
        let m = self.inner.model.borrow();
        m.animation_target().is_some_and(|t| t.y == m.min_offset().y)
    }

    /// Shows the indicators briefly.
    pub fn flash_scroll_indicators(&self, tree: &mut ViewTree) {
        let now = self.now(tree);
        self.inner.indicators.borrow_mut().note_activity(now);
        self.refresh_indicators(tree, now);
        self.ensure_ticking(tree, now);
    }

    /// Cancels any throw, bounce or animation.
    pub fn stop(&self, tree: &mut ViewTree) {
        self.inner.model.borrow_mut().stop();
        self.apply(tree, None);
    }

    // ----- input -----

    pub fn begin_drag(&self, tree: &mut ViewTree, now: Instant) {
        if !self.is_scroll_enabled() {
            return;
        }
        self.inner.model.borrow_mut().begin_drag(now);
        self.inner.indicators.borrow_mut().note_activity(now);
        self.apply(tree, Some(now));
        if let Some(d) = self.delegate() {
            d.will_begin_dragging(tree, self);
        }
    }

    /// Moves the content by `delta` (content coordinates).
    pub fn drag_by(&self, tree: &mut ViewTree, delta: Vec2, now: Instant) {
        let changed = self.inner.model.borrow_mut().drag_by(delta, now);
        if changed {
            self.apply(tree, Some(now));
        }
    }

    pub fn end_drag(&self, tree: &mut ViewTree, now: Instant) {
        if !self.is_dragging() {
            return;
        }
        self.inner.model.borrow_mut().end_drag(now);
        self.finish_drag(tree, now);
    }

    /// Ends the drag with an explicit release velocity (pt/s).
    pub fn release(&self, tree: &mut ViewTree, velocity: Vec2, now: Instant) {
        if !self.is_dragging() {
            return;
        }
        self.inner.model.borrow_mut().release(velocity);
        self.finish_drag(tree, now);
    }

    fn finish_drag(&self, tree: &mut ViewTree, now: Instant) {
        self.inner.indicators.borrow_mut().note_activity(now);
        self.ensure_ticking(tree, now);
        self.apply(tree, Some(now));
        if let Some(d) = self.delegate() {
            d.did_end_dragging(tree, self);
        }
    }

    /// Pointer tracking: drag the content with the pointer.
    pub fn handle_pointer(&self, tree: &mut ViewTree, event: &PointerEvent) -> EventResult {
        match event.kind {
            PointerEventKind::Down(_) => {
                if !self.is_scroll_enabled() {
                    return EventResult::Ignored;
                }
                self.inner.pointer_dragging.set(true);
                self.inner.last_pointer.set(Some(event.location));
                self.begin_drag(tree, event.timestamp);
                EventResult::Handled
            }
            PointerEventKind::Dragged if self.inner.pointer_dragging.get() => {
                // host coordinates: local ones move with the content
                if let Some(last) = self.inner.last_pointer.replace(Some(event.location)) {
                    self.drag_by(tree, last - event.location, event.timestamp);
                }
                EventResult::Handled
            }
            PointerEventKind::Up(_) if self.inner.pointer_dragging.get() => {
                self.inner.pointer_dragging.set(false);
                self.inner.last_pointer.set(None);
                self.end_drag(tree, event.timestamp);
                EventResult::Handled
            }
            PointerEventKind::Moved | PointerEventKind::Entered => {
                self.set_mouse_inside(tree, true);
                EventResult::Ignored
            }
            PointerEventKind::Exited => {
                self.set_mouse_inside(tree, false);
                EventResult::Ignored
            }
            _ => EventResult::Ignored,
        }
    }

    pub fn set_mouse_inside(&self, tree: &mut ViewTree, inside: bool) {
        if self.inner.indicators.borrow().is_mouse_inside() == inside {
            return;
        }
        self.inner.indicators.borrow_mut().set_mouse_inside(inside);
        let now = self.now(tree);
        self.refresh_indicators(tree, now);
        self.ensure_ticking(tree, now);
    }

    /// Trackpad phases drive a drag; the engine produces its own throw, so
    /// host momentum events are swallowed. Phase-less wheels scroll by lines.
    pub fn handle_wheel(&self, tree: &mut ViewTree, event: &ScrollWheelEvent) -> EventResult {
        if !self.is_scroll_enabled() {
            return EventResult::Ignored;
        }
        let now = event.timestamp;
        let line = self.inner.model.borrow().physics().wheel_line_height;
        let delta = if event.line_based {
            event.delta * line
        } else {
            event.delta
        };
        match event.phase {
            Some(ScrollPhase::Began) => {
                self.begin_drag(tree, now);
                self.drag_by(tree, delta, now);
            }
            Some(ScrollPhase::Changed) => {
                if !self.is_dragging() {
                    self.begin_drag(tree, now);
                }
                self.drag_by(tree, delta, now);
            }
            Some(ScrollPhase::Ended) => self.end_drag(tree, now),
            Some(ScrollPhase::Cancelled) => self.release(tree, Vec2::ZERO, now),
            Some(ScrollPhase::Momentum) => {}
            None => {
                let moved = self.inner.model.borrow_mut().scroll_by(delta);
                self.inner.indicators.borrow_mut().note_activity(now);
                if moved {
                    self.apply(tree, Some(now));
                } else {
                    self.refresh_indicators(tree, now);
                }
                self.ensure_ticking(tree, now);
                if !moved {
                    return EventResult::Ignored;
                }
            }
        }
        EventResult::Handled
    }

    // ----- applying state to the tree -----

    /// Pushes the model offset into the view: bounds origin, knobs, layout
    /// request and `did_scroll`.
    fn apply(&self, tree: &mut ViewTree, now: Option<Instant>) {
        let view = self.inner.view;
        let offset = self.content_offset();
        let scale = density().scale.max(1.0);
        let snapped = Vec2::new((offset.x * scale).round() / scale, (offset.y * scale).round() / scale);
        let moved = tree.bounds(view).origin() != snapped;
        tree.set_bounds_origin(view, snapped);
        if let Some(now) = now {
            self.inner.indicators.borrow_mut().note_activity(now);
            self.refresh_indicators(tree, now);
        }
        self.layout_knobs(tree);
        if moved {
            tree.set_needs_layout(view);
            if let Some(d) = self.delegate() {
                d.did_scroll(tree, self);
            }
        }
    }

    fn refresh_indicators(&self, tree: &mut ViewTree, now: Instant) {
        let changes = {
            let m = self.inner.model.borrow();
            let scrolling = m.state() != ScrollState::Idle;
            self.inner.indicators.borrow_mut().update(now, scrolling, &m)
        };
        self.layout_knobs(tree);
        if changes.is_empty() {
            return;
        }
        if let Some(d) = self.delegate() {
            for (axis, visible) in changes {
                d.indicator_visibility_changed(tree, self, axis, visible);
            }
        }
    }

    fn layout_knobs(&self, tree: &mut ViewTree) {
        for axis in Axis::ALL {
            let k = self.knob_view(axis);
            let alpha = self.indicator_alpha(axis);
            match self.knob_rect(axis) {
                Some(r) if alpha > 0.0 => {
                    tree.set_frame(k, r);
                    tree.set_alpha(k, alpha);
                    tree.set_hidden(k, false);
                }
                _ => tree.set_hidden(k, true),
            }
        }
    }

    fn layout(&self, tree: &mut ViewTree) {
        let view = self.inner.view;
        let size = tree.bounds(view).size();
        let changed = {
            let mut m = self.inner.model.borrow_mut();
            let before = m.offset();
            m.set_viewport(size);
            m.offset() != before
        };
        let content = self.inner.content_layout.borrow().clone();
        if let Some(f) = content {
            f(tree, view);
        }
        if changed {
            self.apply(tree, None);
        } else {
            self.layout_knobs(tree);
        }
    }

    // ----- animation -----

    fn ensure_ticking(&self, tree: &mut ViewTree, now: Instant) {
        let needed = self.inner.model.borrow().is_animating() || self.inner.indicators.borrow().needs_ticks();
        if !needed || self.inner.ticking.get() {
            return;
        }
        self.inner.ticking.set(true);
        self.inner.last_tick.set(Some(now));
        tree.add_animator(Rc::new(ScrollAnimator {
            scroll: Rc::downgrade(&self.inner),
        }));
    }

    /// One animation step. Returns whether more steps are needed.
    pub fn step(&self, tree: &mut ViewTree, now: Instant) -> bool {
        let dt = self
            .inner
            .last_tick
            .replace(Some(now))
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::from_micros(16_667));
        let (moving, moved) = {
            let mut m = self.inner.model.borrow_mut();
            let before = m.offset();
            let moving = m.tick(dt);
            (moving, m.offset() != before)
        };
        if moved {
            self.apply(tree, Some(now));
        } else {
            self.refresh_indicators(tree, now);
        }
        let keep = moving || self.inner.indicators.borrow().needs_ticks();
        if !keep {
            self.inner.ticking.set(false);
            self.inner.last_tick.set(None);
        }
        keep
    }
}

/// Non-owning reference to a [`ScrollView`].
#[derive(Clone)]
pub struct WeakScrollView(Weak<Inner>);

struct ScrollAnimator {
    scroll: Weak<Inner>,
}

impl Animator for ScrollAnimator {
    fn tick(&self, tree: &mut ViewTree, now: Instant) -> bool {
        match self.scroll.upgrade() {
            Some(inner) => ScrollView { inner }.step(tree, now),
            None => false,
        }
    }
}

struct ScrollResponder {
    scroll: Weak<Inner>,
}

impl ScrollResponder {
    fn scroll(&self) -> Option<ScrollView> {
        self.scroll.upgrade().map(|inner| ScrollView { inner })
    }
}

impl Responder for ScrollResponder {
    fn pointer_event(&self, tree: &mut ViewTree, _this: ViewId, event: &PointerEvent, _local: Vec2) -> EventResult {
        match self.scroll() {
            Some(s) => s.handle_pointer(tree, event),
            None => EventResult::Ignored,
        }
    }

    fn scroll_wheel(&self, tree: &mut ViewTree, _this: ViewId, event: &ScrollWheelEvent) -> EventResult {
        match self.scroll() {
            Some(s) => s.handle_wheel(tree, event),
            None => EventResult::Ignored,
        }
    }
}
