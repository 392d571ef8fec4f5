//! Controls: views with highlight/selection state and target-action dispatch.
//!
//! A control component is attached to a view with `ViewTree::make_control`.
//! Actions are registered per event mask, optionally tied to a weakly held
//! target; once the target is dropped its actions are skipped and pruned.

use std::any::Any;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::input::{PointerEvent, PointerEventKind};
use crate::responder::EventResult;
use crate::{Vec2, ViewId, ViewTree};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ControlState: u32 {
        const NORMAL = 0;
        const HIGHLIGHTED = 1 << 0;
        const DISABLED = 1 << 1;
        const SELECTED = 1 << 2;
        /// The hosting window is not key.
        const NOT_KEY = 1 << 11;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ControlEvents: u32 {
        const TOUCH_DOWN = 1 << 0;
        const TOUCH_DOWN_REPEAT = 1 << 1;
        const TOUCH_UP_INSIDE = 1 << 6;
        const TOUCH_UP_OUTSIDE = 1 << 7;
        const VALUE_CHANGED = 1 << 12;
        const EDITING_DID_END_ON_EXIT = 1 << 19;
        const ALL_TOUCH_EVENTS = 0x0000_0FFF;
        const ALL_EDITING_EVENTS = 0x000F_0000;
        const APPLICATION_RESERVED = 0x0F00_0000;
        const SYSTEM_RESERVED = 0xF000_0000;
        const ALL_EVENTS = 0xFFFF_FFFF;
    }
}

pub type ActionFn = Rc<dyn Fn(&mut ViewTree, ViewId, ControlEvents)>;
pub type StateChangeFn = Rc<dyn Fn(&mut ViewTree, ViewId, ControlState)>;

struct TargetAction {
    target: Option<Weak<dyn Any>>,
    events: ControlEvents,
    action: ActionFn,
}

impl TargetAction {
    fn is_dead(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.strong_count() == 0)
    }
}

#[derive(Default)]
pub struct Control {
    state: ControlState,
    tracking: bool,
    accepts_first_mouse: bool,
    actions: Vec<TargetAction>,
    on_state_change: Option<StateChangeFn>,
}

impl ViewTree {
    pub fn make_control(&mut self, id: ViewId) {
        if let Ok(n) = self.node_mut(id)
            && n.control.is_none()
        {
            n.control = Some(Control::default());
        }
    }

    pub fn is_control(&self, id: ViewId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.control.is_some())
    }

    /// Stored state plus `NOT_KEY` derived from the host.
    pub fn control_state(&self, id: ViewId) -> ControlState {
        let Some(c) = self.nodes.get(id).and_then(|n| n.control.as_ref()) else {
            return ControlState::NORMAL;
        };
        let mut s = c.state;
        let key = self.host_of(id).is_some_and(|h| self.is_host_key(h));
        s.set(ControlState::NOT_KEY, !key);
        s
    }

    fn update_control_state(&mut self, id: ViewId, f: impl FnOnce(&mut ControlState)) {
        let Some(c) = self.nodes.get_mut(id).and_then(|n| n.control.as_mut()) else {
            return;
        };
        let before = c.state;
        f(&mut c.state);
        if c.state == before {
            return;
        }
        let cb = c.on_state_change.clone();
        self.set_needs_display(id);
        if let Some(cb) = cb {
            let s = self.control_state(id);
            cb(self, id, s);
        }
    }

    pub fn set_on_control_state_change(&mut self, id: ViewId, f: impl Fn(&mut ViewTree, ViewId, ControlState) + 'static) {
        if let Some(c) = self.nodes.get_mut(id).and_then(|n| n.control.as_mut()) {
            c.on_state_change = Some(Rc::new(f));
        }
    }

    pub fn is_enabled(&self, id: ViewId) -> bool {
        !self.control_state(id).contains(ControlState::DISABLED)
    }

    pub fn set_enabled(&mut self, id: ViewId, enabled: bool) {
        self.update_control_state(id, |s| s.set(ControlState::DISABLED, !enabled));
    }

    pub fn is_selected(&self, id: ViewId) -> bool {
        self.control_state(id).contains(ControlState::SELECTED)
    }

    pub fn set_selected(&mut self, id: ViewId, selected: bool) {
        self.update_control_state(id, |s| s.set(ControlState::SELECTED, selected));
    }

    pub fn is_highlighted(&self, id: ViewId) -> bool {
        self.control_state(id).contains(ControlState::HIGHLIGHTED)
    }

    pub fn set_highlighted(&mut self, id: ViewId, highlighted: bool) {
        self.update_control_state(id, |s| s.set(ControlState::HIGHLIGHTED, highlighted));
    }

    pub fn is_tracking(&self, id: ViewId) -> bool {
        self.nodes
            .get(id)
            .and_then(|n| n.control.as_ref())
            .is_some_and(|c| c.tracking)
    }

    pub fn accepts_first_mouse(&self, id: ViewId) -> bool {
        self.nodes
            .get(id)
            .and_then(|n| n.control.as_ref())
            .is_some_and(|c| c.accepts_first_mouse)
    }

    pub fn set_accepts_first_mouse(&mut self, id: ViewId, accepts: bool) {
        if let Some(c) = self.nodes.get_mut(id).and_then(|n| n.control.as_mut()) {
            c.accepts_first_mouse = accepts;
        }
    }

    /// Registers an action not tied to any target.
    pub fn add_action(&mut self, id: ViewId, events: ControlEvents, action: impl Fn(&mut ViewTree, ViewId, ControlEvents) + 'static) {
        self.push_action(id, None, events, Rc::new(action));
    }

    /// Registers an action that lives only as long as `target`.
    pub fn add_target<T: Any>(
        &mut self,
        id: ViewId,
        target: &Rc<T>,
        events: ControlEvents,
        action: impl Fn(&mut ViewTree, ViewId, ControlEvents) + 'static,
    ) {
        let t: Rc<dyn Any> = target.clone();
        self.push_action(id, Some(Rc::downgrade(&t)), events, Rc::new(action));
    }

    fn push_action(&mut self, id: ViewId, target: Option<Weak<dyn Any>>, events: ControlEvents, action: ActionFn) {
        match self.nodes.get_mut(id).and_then(|n| n.control.as_mut()) {
            Some(c) => c.actions.push(TargetAction {
                target,
                events,
                action,
            }),
            None => log::warn!("add_action on {id:?}, which is not a control"),
        }
    }

    /// Removes `events` from every action registered for `target`.
    pub fn remove_target<T: Any>(&mut self, id: ViewId, target: &Rc<T>, events: ControlEvents) {
        let t: Rc<dyn Any> = target.clone();
        let weak = Rc::downgrade(&t);
        if let Some(c) = self.nodes.get_mut(id).and_then(|n| n.control.as_mut()) {
            for a in c.actions.iter_mut() {
                if a.target.as_ref().is_some_and(|w| w.ptr_eq(&weak)) {
                    a.events.remove(events);
                }
            }
            c.actions.retain(|a| !a.events.is_empty());
        }
    }

    /// Union of all registered event masks (dead targets excluded).
    pub fn all_control_events(&self, id: ViewId) -> ControlEvents {
        self.nodes
            .get(id)
            .and_then(|n| n.control.as_ref())
            .map(|c| {
                c.actions
                    .iter()
                    .filter(|a| !a.is_dead())
                    .fold(ControlEvents::empty(), |acc, a| acc | a.events)
            })
            .unwrap_or_default()
    }

    /// Targets still alive, in registration order (duplicates collapsed).
    pub fn all_targets(&self, id: ViewId) -> Vec<Rc<dyn Any>> {
        let mut out: Vec<Rc<dyn Any>> = Vec::new();
        if let Some(c) = self.nodes.get(id).and_then(|n| n.control.as_ref()) {
            for t in c.actions.iter().filter_map(|a| a.target.as_ref()?.upgrade()) {
                if !out.iter().any(|o| Rc::ptr_eq(o, &t)) {
                    out.push(t);
                }
            }
        }
        out
    }

    pub fn action_count(&self, id: ViewId) -> usize {
        self.nodes
            .get(id)
            .and_then(|n| n.control.as_ref())
            .map(|c| c.actions.len())
            .unwrap_or(0)
    }

    /// Invokes every action whose mask intersects `events`.
    ///
    /// The registration list is snapshotted first, so actions may add or
    /// remove actions, drop their own target, or even destroy the control.
    pub fn send_actions(&mut self, id: ViewId, events: ControlEvents) {
        let snapshot: SmallVec<[(Option<Weak<dyn Any>>, ActionFn); 4]> = match self
            .nodes
            .get(id)
            .and_then(|n| n.control.as_ref())
        {
            Some(c) => c
                .actions
                .iter()
                .filter(|a| a.events.intersects(events))
                .map(|a| (a.target.clone(), a.action.clone()))
                .collect(),
            None => return,
        };

        for (target, action) in snapshot {
            let _alive = match &target {
                Some(w) => match w.upgrade() {
                    Some(strong) => Some(strong),
                    None => continue,
                },
                None => None,
            };
            action(self, id, events);
        }

        if let Some(c) = self.nodes.get_mut(id).and_then(|n| n.control.as_mut()) {
            c.actions.retain(|a| !a.is_dead());
        }
    }

    /// Default tracking: highlight while pressed, touch-up inside/outside on release.
    pub(crate) fn control_pointer_event(&mut self, id: ViewId, p: &PointerEvent, local: Vec2) -> EventResult {
        if !self.is_enabled(id) {
            return EventResult::Ignored;
        }
        let inside = self.point_inside(id, local);
        match p.kind {
            PointerEventKind::Down(_) => {
                if let Some(c) = self.nodes.get_mut(id).and_then(|n| n.control.as_mut()) {
                    c.tracking = true;
                }
                self.set_highlighted(id, true);
                let mut ev = ControlEvents::TOUCH_DOWN;
                if p.click_count > 1 {
                    ev |= ControlEvents::TOUCH_DOWN_REPEAT;
                }
                self.send_actions(id, ev);
                EventResult::Handled
            }
            PointerEventKind::Dragged => {
                if self.is_tracking(id) {
                    self.set_highlighted(id, inside);
                    EventResult::Handled
                } else {
                    EventResult::Ignored
                }
            }
            PointerEventKind::Up(_) => {
                if !self.is_tracking(id) {
                    return EventResult::Ignored;
                }
                if let Some(c) = self.nodes.get_mut(id).and_then(|n| n.control.as_mut()) {
                    c.tracking = false;
                }
                self.set_highlighted(id, false);
                let ev = if inside {
                    ControlEvents::TOUCH_UP_INSIDE
                } else {
                    ControlEvents::TOUCH_UP_OUTSIDE
                };
                self.send_actions(id, ev);
                EventResult::Handled
            }
            _ => EventResult::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rect;
    use std::cell::{Cell, RefCell};

    fn control() -> (ViewTree, ViewId) {
        let mut t = ViewTree::new();
        let v = t.create_view(Rect::new(0.0, 0.0, 40.0, 20.0));
        t.make_control(v);
        (t, v)
    }

    #[test]
    fn actions_filtered_by_mask() {
        let (mut t, v) = control();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        t.add_action(v, ControlEvents::TOUCH_UP_INSIDE, move |_, _, _| h.set(h.get() + 1));
        t.send_actions(v, ControlEvents::TOUCH_DOWN);
        assert_eq!(hits.get(), 0);
        t.send_actions(v, ControlEvents::TOUCH_UP_INSIDE | ControlEvents::TOUCH_DOWN);
        assert_eq!(hits.get(), 1);
        assert_eq!(t.all_control_events(v), ControlEvents::TOUCH_UP_INSIDE);
    }

    #[test]
    fn target_dropped_mid_dispatch_is_skipped_and_pruned() {
        let (mut t, v) = control();
        let order = Rc::new(RefCell::new(Vec::new()));
        let doomed: Rc<RefCell<Option<Rc<String>>>> = Rc::new(RefCell::new(Some(Rc::new("b".to_string()))));

        let o = order.clone();
        let d = doomed.clone();
        t.add_action(v, ControlEvents::VALUE_CHANGED, move |_, _, _| {
            o.borrow_mut().push("a");
            d.borrow_mut().take();
        });
        let target = doomed.borrow().clone().unwrap();
        let o = order.clone();
        t.add_target(v, &target, ControlEvents::VALUE_CHANGED, move |_, _, _| o.borrow_mut().push("b"));
        drop(target);
        let o = order.clone();
        t.add_action(v, ControlEvents::VALUE_CHANGED, move |_, _, _| o.borrow_mut().push("c"));

        t.send_actions(v, ControlEvents::VALUE_CHANGED);
        assert_eq!(*order.borrow(), vec!["a", "c"]);
        assert_eq!(t.action_count(v), 2);
    }

    #[test]
    fn action_may_destroy_control() {
        let (mut t, v) = control();
        t.add_action(v, ControlEvents::TOUCH_DOWN, |t, id, _| t.destroy(id));
        t.send_actions(v, ControlEvents::TOUCH_DOWN);
        assert!(!t.contains(v));
    }

    #[test]
    fn remove_target_clears_its_events() {
        let (mut t, v) = control();
        let target = Rc::new(5u32);
        t.add_target(v, &target, ControlEvents::TOUCH_DOWN | ControlEvents::TOUCH_UP_INSIDE, |_, _, _| {});
        t.remove_target(v, &target, ControlEvents::TOUCH_DOWN);
        assert_eq!(t.all_control_events(v), ControlEvents::TOUCH_UP_INSIDE);
        assert_eq!(t.all_targets(v).len(), 1);
        t.remove_target(v, &target, ControlEvents::ALL_EVENTS);
        assert_eq!(t.action_count(v), 0);
    }

    #[test]
    fn state_reports_not_key_without_key_host() {
        let (mut t, v) = control();
        assert!(t.control_state(v).contains(ControlState::NOT_KEY));
        let host = t.create_host(crate::Size::new(40.0, 20.0));
        t.set_host_root(host, Some(v));
        t.set_host_key(host, true);
        assert!(!t.control_state(v).contains(ControlState::NOT_KEY));
        t.set_enabled(v, false);
        assert!(t.control_state(v).contains(ControlState::DISABLED));
    }
}
