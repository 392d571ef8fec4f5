//! Event routing.
//!
//! Pointer and scroll-wheel events go to the deepest interactive view under
//! the pointer and bubble up the responder chain (`next_responder`, by
//! default the superview) until someone handles them. Once a view handles a
//! pointer-down it captures the pointer until the matching pointer-up.
//! Keyboard, text and IME events start at the first responder.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::input::{Event, ImeEvent, KeyEvent, PointerEvent, PointerEventKind, ScrollWheelEvent};
use crate::{HostId, Vec2, ViewId, ViewTree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventResult {
    Handled,
    Ignored,
}

impl EventResult {
    pub fn is_handled(self) -> bool {
        self == EventResult::Handled
    }
}

/// Per-view event behaviour. Every method has a pass-through default.
#[allow(unused_variables)]
pub trait Responder {
    fn accepts_first_responder(&self, tree: &ViewTree, this: ViewId) -> bool {
        false
    }

    /// Returning `false` refuses focus.
    fn become_first_responder(&self, tree: &mut ViewTree, this: ViewId) -> bool {
        true
    }

    /// Returning `false` keeps focus where it is.
    fn resign_first_responder(&self, tree: &mut ViewTree, this: ViewId) -> bool {
        true
    }

    fn next_responder(&self, tree: &ViewTree, this: ViewId) -> Option<ViewId> {
        tree.parent(this)
    }

    fn point_inside(&self, tree: &ViewTree, this: ViewId, point: Vec2) -> bool {
        tree.bounds(this).contains(point)
    }

    /// `local` is the event location converted into this view's space.
    fn pointer_event(&self, tree: &mut ViewTree, this: ViewId, event: &PointerEvent, local: Vec2) -> EventResult {
        EventResult::Ignored
    }

    fn scroll_wheel(&self, tree: &mut ViewTree, this: ViewId, event: &ScrollWheelEvent) -> EventResult {
        EventResult::Ignored
    }

    fn key_down(&self, tree: &mut ViewTree, this: ViewId, event: &KeyEvent) -> EventResult {
        EventResult::Ignored
    }

    /// Second chance for unhandled keys; travels the chain the same way.
    fn perform_key_action(&self, tree: &mut ViewTree, this: ViewId, event: &KeyEvent) -> EventResult {
        EventResult::Ignored
    }

    fn text_input(&self, tree: &mut ViewTree, this: ViewId, text: &str) -> EventResult {
        EventResult::Ignored
    }

    fn ime_event(&self, tree: &mut ViewTree, this: ViewId, event: &ImeEvent) -> EventResult {
        EventResult::Ignored
    }
}

impl ViewTree {
    /// The chain starting at `start`, snapshotted so handlers may mutate the tree.
    pub fn responder_chain(&self, start: ViewId) -> SmallVec<[ViewId; 16]> {
        let mut chain = SmallVec::new();
        let mut cur = Some(start);
        while let Some(v) = cur {
            if !self.contains(v) || chain.contains(&v) {
                break;
            }
            chain.push(v);
            cur = match self.responder(v) {
                Some(r) => r.next_responder(self, v),
                None => self.parent(v),
            };
        }
        chain
    }

    pub fn first_responder(&self) -> Option<ViewId> {
        self.first_responder
    }

    /// Incremented every time the first responder changes.
    pub fn focus_generation(&self) -> u64 {
        self.focus_generation
    }

    pub fn is_first_responder(&self, id: ViewId) -> bool {
        self.first_responder == Some(id)
    }

    pub fn accepts_first_responder(&self, id: ViewId) -> bool {
        self.responder(id)
            .is_some_and(|r| r.accepts_first_responder(self, id))
    }

    /// Moves focus to `id` (or clears it with `None`). The current responder
    /// may refuse to resign and the new one may refuse to become; returns
    /// whether the requested state was reached.
    pub fn make_first_responder(&mut self, id: Option<ViewId>) -> bool {
        if self.first_responder == id {
            return true;
        }
        if let Some(new) = id
            && !self.accepts_first_responder(new)
        {
            log::debug!("{new:?} does not accept first responder");
            return false;
        }
        if let Some(old) = self.first_responder {
            if let Some(r) = self.responder(old)
                && !r.resign_first_responder(self, old)
            {
                return false;
            }
            // resign may itself have moved focus
            if self.first_responder == Some(old) {
                self.first_responder = None;
                self.focus_generation += 1;
            }
        }
        let Some(new) = id else {
            return true;
        };
        if !self.contains(new) {
            return false;
        }
        self.first_responder = Some(new);
        self.focus_generation += 1;
        let accepted = match self.responder(new) {
            Some(r) => r.become_first_responder(self, new),
            None => true,
        };
        if !accepted && self.first_responder == Some(new) {
            self.first_responder = None;
            self.focus_generation += 1;
        }
        accepted
    }

    pub fn resign_first_responder(&mut self) -> bool {
        self.make_first_responder(None)
    }

    /// Routes `event` from `host`. Returns the view that handled it.
    pub fn dispatch_event(&mut self, host: HostId, event: Event) -> Option<ViewId> {
        match event {
            Event::Pointer(p) => self.dispatch_pointer(host, &p),
            Event::ScrollWheel(s) => {
                let target = self.hit_test_host(host, s.location)?;
                self.bubble(target, |r, t, v| r.scroll_wheel(t, v, &s))
            }
            Event::Key(k) => {
                let start = self.key_target(host)?;
                self.bubble(start, |r, t, v| r.key_down(t, v, &k))
                    .or_else(|| self.bubble(start, |r, t, v| r.perform_key_action(t, v, &k)))
            }
            Event::Text(text) => {
                let start = self.key_target(host)?;
                self.bubble(start, |r, t, v| r.text_input(t, v, &text))
            }
            Event::Ime(ime) => {
                let start = self.key_target(host)?;
                self.bubble(start, |r, t, v| r.ime_event(t, v, &ime))
            }
        }
    }

    /// Sends a key action up the chain from the first responder.
    pub fn perform_key_action(&mut self, host: HostId, event: &KeyEvent) -> Option<ViewId> {
        let start = self.key_target(host)?;
        self.bubble(start, |r, t, v| r.perform_key_action(t, v, event))
    }

    fn key_target(&self, host: HostId) -> Option<ViewId> {
        match self.first_responder {
            Some(fr) if self.host_of(fr) == Some(host) => Some(fr),
            _ => self.host_root(host),
        }
    }

    fn bubble(
        &mut self,
        start: ViewId,
        f: impl Fn(&dyn Responder, &mut ViewTree, ViewId) -> EventResult,
    ) -> Option<ViewId> {
        for v in self.responder_chain(start) {
            if !self.contains(v) {
                continue;
            }
            if let Some(r) = self.responder(v)
                && f(r.as_ref(), self, v).is_handled()
            {
                return Some(v);
            }
        }
        None
    }

    fn dispatch_pointer(&mut self, host: HostId, p: &PointerEvent) -> Option<ViewId> {
        match p.kind {
            PointerEventKind::Down(_) => {
                let target = self.hit_test_host(host, p.location)?;
                let handler = self.deliver_pointer_chain(target, p);
                self.tracking = handler;
                handler
            }
            PointerEventKind::Dragged | PointerEventKind::Up(_) => {
                let handler = match self.tracking {
                    Some(t) if self.contains(t) => self.deliver_pointer(t, p).then_some(t),
                    _ => {
                        let target = self.hit_test_host(host, p.location)?;
                        self.deliver_pointer_chain(target, p)
                    }
                };
                if p.is_up() {
                    self.tracking = None;
                }
                handler
            }
            PointerEventKind::Moved | PointerEventKind::Entered | PointerEventKind::Exited => {
                let target = self.hit_test_host(host, p.location);
                if target != self.hover {
                    let old = std::mem::replace(&mut self.hover, target);
                    let at = |kind| PointerEvent {
                        kind,
                        ..p.clone()
                    };
                    if let Some(o) = old.filter(|o| self.contains(*o)) {
                        self.deliver_pointer(o, &at(PointerEventKind::Exited));
                    }
                    if let Some(n) = target {
                        self.deliver_pointer(n, &at(PointerEventKind::Entered));
                    }
                }
                let target = target?;
                self.deliver_pointer_chain(target, p)
            }
        }
    }

    fn deliver_pointer_chain(&mut self, target: ViewId, p: &PointerEvent) -> Option<ViewId> {
        self.responder_chain(target)
            .into_iter()
            .find(|v| self.contains(*v) && self.deliver_pointer(*v, p))
    }

    /// Controls handle tracking themselves; other views go through their responder.
    fn deliver_pointer(&mut self, v: ViewId, p: &PointerEvent) -> bool {
        let local = self.convert_point_from_host(p.location, v);
        if self.is_control(v) && self.control_pointer_event(v, p, local).is_handled() {
            return true;
        }
        let r: Option<Rc<dyn Responder>> = self.responder(v);
        r.is_some_and(|r| r.pointer_event(self, v, p, local).is_handled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Key, Modifiers, PointerButton};
    use crate::{Rect, Size};
    use std::cell::{Cell, RefCell};
    use web_time::Instant;

    #[derive(Default)]
    struct Probe {
        handles: bool,
        focusable: bool,
        refuse_resign: Cell<bool>,
        seen: RefCell<Vec<String>>,
    }

    impl Responder for Probe {
        fn accepts_first_responder(&self, _: &ViewTree, _: ViewId) -> bool {
            self.focusable
        }
        fn resign_first_responder(&self, _: &mut ViewTree, _: ViewId) -> bool {
            !self.refuse_resign.get()
        }
        fn pointer_event(&self, _: &mut ViewTree, _: ViewId, e: &PointerEvent, local: Vec2) -> EventResult {
            self.seen.borrow_mut().push(format!("{:?}@{},{}", e.kind, local.x, local.y));
            if self.handles { EventResult::Handled } else { EventResult::Ignored }
        }
        fn key_down(&self, _: &mut ViewTree, _: ViewId, e: &KeyEvent) -> EventResult {
            self.seen.borrow_mut().push(format!("key {:?}", e.key));
            if self.handles { EventResult::Handled } else { EventResult::Ignored }
        }
    }

    fn pointer(kind: PointerEventKind, x: f32, y: f32) -> Event {
        Event::Pointer(PointerEvent::new(kind, Vec2::new(x, y), Instant::now()))
    }

    fn setup() -> (ViewTree, HostId, ViewId, ViewId, Rc<Probe>, Rc<Probe>) {
        let mut t = ViewTree::new();
        let host = t.create_host(Size::new(100.0, 100.0));
        let root = t.create_view(Rect::new(0.0, 0.0, 100.0, 100.0));
        let child = t.create_view(Rect::new(10.0, 10.0, 20.0, 20.0));
        t.add_child(root, child);
        t.set_host_root(host, Some(root));
        let rp = Rc::new(Probe {
            handles: true,
            focusable: true,
            ..Default::default()
        });
        let cp = Rc::new(Probe {
            focusable: true,
            ..Default::default()
        });
        t.set_responder(root, rp.clone());
        t.set_responder(child, cp.clone());
        (t, host, root, child, rp, cp)
    }

    #[test]
    fn pointer_bubbles_and_captures() {
        let (mut t, host, root, _child, rp, cp) = setup();
        let down = PointerEventKind::Down(PointerButton::Primary);
        assert_eq!(t.dispatch_event(host, pointer(down, 15.0, 15.0)), Some(root));
        assert_eq!(cp.seen.borrow().len(), 1);
        assert_eq!(rp.seen.borrow()[0], "Down(Primary)@15,15");

        // captured: the drag outside still goes to root and skips the child
        t.dispatch_event(host, pointer(PointerEventKind::Dragged, 150.0, 15.0));
        assert_eq!(cp.seen.borrow().len(), 1);
        assert_eq!(rp.seen.borrow().len(), 2);
        t.dispatch_event(host, pointer(PointerEventKind::Up(PointerButton::Primary), 150.0, 15.0));
        assert_eq!(rp.seen.borrow().len(), 3);
        assert_eq!(t.tracking, None);
    }

    #[test]
    fn key_events_start_at_first_responder() {
        let (mut t, host, root, child, rp, cp) = setup();
        assert!(t.make_first_responder(Some(child)));
        let ev = Event::Key(KeyEvent {
            key: Key::Enter,
            modifiers: Modifiers::default(),
            is_repeat: false,
            timestamp: Instant::now(),
        });
        assert_eq!(t.dispatch_event(host, ev), Some(root));
        assert_eq!(cp.seen.borrow()[0], "key Enter");
        assert_eq!(rp.seen.borrow()[0], "key Enter");
    }

    #[test]
    fn focus_changes_bump_generation_and_resign_can_refuse() {
        let (mut t, _host, root, child, _rp, cp) = setup();
        let g0 = t.focus_generation();
        assert!(t.make_first_responder(Some(child)));
        assert!(t.focus_generation() > g0);
        cp.refuse_resign.set(true);
        let g1 = t.focus_generation();
        assert!(!t.make_first_responder(Some(root)));
        assert_eq!(t.first_responder(), Some(child));
        assert_eq!(t.focus_generation(), g1);
        cp.refuse_resign.set(false);
        assert!(t.make_first_responder(Some(root)));
        assert_eq!(t.first_responder(), Some(root));
    }

    #[test]
    fn detaching_focused_view_clears_focus() {
        let (mut t, _host, _root, child, _rp, _cp) = setup();
        t.make_first_responder(Some(child));
        let g = t.focus_generation();
        t.remove_from_parent(child);
        assert_eq!(t.first_responder(), None);
        assert!(t.focus_generation() > g);
    }
}
