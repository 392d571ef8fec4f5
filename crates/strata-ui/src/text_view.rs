//! Editable text bound to a view.
//!
//! The view becomes first responder on click and then takes key, text and
//! input-method events. Double and triple clicks select by word and line;
//! shift-click extends the selection.

use std::cell::{Cell, RefCell};
use std::ops::Range;
use std::rc::{Rc, Weak};

use strata_core::{
    EventResult, ImeEvent, Key, KeyEvent, PointerEvent, PointerEventKind, Rect, Responder, Size, Vec2, ViewId,
    ViewTree,
};
use strata_text::{AttributedString, Attributes, SelectionAffinity, TextEditor, TextShaper, default_shaper};

pub type ChangeFn = Rc<dyn Fn(&mut ViewTree, &TextView)>;

struct TextViewInner {
    view: ViewId,
    editor: RefCell<TextEditor>,
    editable: Cell<bool>,
    on_change: RefCell<Option<ChangeFn>>,
}

#[derive(Clone)]
pub struct TextView {
    inner: Rc<TextViewInner>,
}

impl TextView {
    pub fn new(tree: &mut ViewTree, frame: Rect) -> Self {
        Self::with_shaper(tree, frame, default_shaper())
    }

    pub fn with_shaper(tree: &mut ViewTree, frame: Rect, shaper: Rc<dyn TextShaper>) -> Self {
        let view = tree.create_view(frame);
        let mut editor = TextEditor::new(shaper);
        editor.set_frame(Rect::from_origin_size(Vec2::ZERO, frame.size()));
        let inner = Rc::new(TextViewInner {
            view,
            editor: RefCell::new(editor),
            editable: Cell::new(true),
            on_change: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        tree.set_layout(view, move |tree, id| {
            if let Some(inner) = weak.upgrade() {
                inner.editor.borrow_mut().set_frame(tree.bounds(id));
            }
        });
        let weak = Rc::downgrade(&inner);
        tree.set_draw(view, move |tree, id, cx| {
            if let Some(inner) = weak.upgrade() {
                let mut e = inner.editor.borrow_mut();
                e.set_frame(cx.bounds());
                e.draw(cx, tree.is_first_responder(id));
            }
        });
        let weak = Rc::downgrade(&inner);
        tree.set_size_that_fits(view, move |_, _, size| match weak.upgrade() {
            Some(inner) => inner.editor.borrow().size_constrained_to_width(size.width),
            None => size,
        });
        tree.set_responder(
            view,
            Rc::new(TextViewResponder {
                text_view: Rc::downgrade(&inner),
            }),
        );
        TextView { inner }
    }

    pub fn view(&self) -> ViewId {
        self.inner.view
    }

    pub fn text(&self) -> String {
        self.inner.editor.borrow().text().to_owned()
    }

    pub fn set_text(&self, tree: &mut ViewTree, text: &str) {
        self.inner.editor.borrow_mut().set_text(text);
        tree.set_needs_display(self.inner.view);
    }

    pub fn attributed_string(&self) -> AttributedString {
        self.inner.editor.borrow().attributed_string().clone()
    }

    pub fn set_attributed_string(&self, tree: &mut ViewTree, s: AttributedString) {
        self.inner.editor.borrow_mut().set_attributed_string(s);
        tree.set_needs_display(self.inner.view);
    }

    pub fn set_typing_attributes(&self, attributes: Attributes) {
        self.inner.editor.borrow_mut().set_typing_attributes(attributes);
    }

    pub fn set_marked_attributes(&self, attributes: Attributes) {
        self.inner.editor.borrow_mut().set_marked_attributes(attributes);
    }

    pub fn is_editable(&self) -> bool {
        self.inner.editable.get()
    }

    /// A read-only text view still allows selection but refuses focus.
    pub fn set_editable(&self, tree: &mut ViewTree, editable: bool) {
        self.inner.editable.set(editable);
        if !editable && tree.is_first_responder(self.inner.view) {
            tree.resign_first_responder();
        }
    }

    pub fn selected_range(&self) -> Range<usize> {
        self.inner.editor.borrow().selected_range()
    }

    pub fn set_selected_range(&self, tree: &mut ViewTree, range: Range<usize>) {
        self.inner.editor.borrow_mut().set_selected_range(range);
        tree.set_needs_display(self.inner.view);
    }

    pub fn marked_range(&self) -> Option<Range<usize>> {
        self.inner.editor.borrow().marked_range()
    }

    pub fn size_constrained_to_width(&self, width: f32) -> Size {
        self.inner.editor.borrow().size_constrained_to_width(width)
    }

    /// Called after every edit made through input events.
    pub fn set_on_change(&self, f: impl Fn(&mut ViewTree, &TextView) + 'static) {
        *self.inner.on_change.borrow_mut() = Some(Rc::new(f));
    }

    pub fn with_editor<R>(&self, f: impl FnOnce(&TextEditor) -> R) -> R {
        f(&self.inner.editor.borrow())
    }

    /// Runs `f` against the editor, redraws, and reports a change if the
    /// text differs afterwards.
    fn edit(&self, tree: &mut ViewTree, f: impl FnOnce(&mut TextEditor)) {
        let changed = {
            let mut e = self.inner.editor.borrow_mut();
            let before = e.attributed_string().clone();
            f(&mut *e);
            *e.attributed_string() != before
        };
        tree.set_needs_display(self.inner.view);
        if changed {
            let cb = self.inner.on_change.borrow().clone();
            if let Some(cb) = cb {
                cb(tree, self);
            }
        }
    }

    fn handle_pointer(&self, tree: &mut ViewTree, event: &PointerEvent, local: Vec2) -> EventResult {
        let view = self.inner.view;
        match event.kind {
            PointerEventKind::Down(_) => {
                if self.is_editable() {
                    tree.make_first_responder(Some(view));
                }
                let mut e = self.inner.editor.borrow_mut();
                match event.click_count {
                    0 | 1 => e.begin_drag(local, event.modifiers.shift),
                    2 => e.select_at(local, SelectionAffinity::Word),
                    _ => e.select_at(local, SelectionAffinity::Line),
                }
                drop(e);
                tree.set_needs_display(view);
                EventResult::Handled
            }
            PointerEventKind::Dragged => {
                let mut e = self.inner.editor.borrow_mut();
                if !e.is_dragging() {
                    return EventResult::Ignored;
                }
                e.drag_to(local);
                drop(e);
                tree.set_needs_display(view);
                EventResult::Handled
            }
            PointerEventKind::Up(_) => {
                self.inner.editor.borrow_mut().end_drag();
                EventResult::Handled
            }
            _ => EventResult::Ignored,
        }
    }

    fn handle_key(&self, tree: &mut ViewTree, event: &KeyEvent) -> EventResult {
        if !self.is_editable() {
            return EventResult::Ignored;
        }
        let m = event.modifiers;
        let shortcut = m.meta || m.ctrl;
        match &event.key {
            Key::Backspace => self.edit(tree, TextEditor::delete_backward),
            Key::Delete => self.edit(tree, TextEditor::delete_forward),
            Key::ArrowLeft if shortcut => self.edit(tree, |e| e.move_to_start(m.shift)),
            Key::ArrowRight if shortcut => self.edit(tree, |e| e.move_to_end(m.shift)),
            Key::ArrowLeft => self.edit(tree, |e| e.move_caret(-1, m.shift)),
            Key::ArrowRight => self.edit(tree, |e| e.move_caret(1, m.shift)),
            Key::Home | Key::ArrowUp => self.edit(tree, |e| e.move_to_start(m.shift)),
            Key::End | Key::ArrowDown => self.edit(tree, |e| e.move_to_end(m.shift)),
            Key::Enter => self.edit(tree, |e| e.insert_text("\n")),
            Key::Escape => {
                if !self.inner.editor.borrow().has_marked_text() {
                    return EventResult::Ignored;
                }
                self.edit(tree, TextEditor::cancel_marked_text);
            }
            Key::Character('a') if shortcut => self.edit(tree, TextEditor::select_all),
            // printable input arrives as text events
            _ => return EventResult::Ignored,
        }
        EventResult::Handled
    }
}

struct TextViewResponder {
    text_view: Weak<TextViewInner>,
}

impl TextViewResponder {
    fn text_view(&self) -> Option<TextView> {
        self.text_view.upgrade().map(|inner| TextView { inner })
    }
}

impl Responder for TextViewResponder {
    fn accepts_first_responder(&self, _tree: &ViewTree, _this: ViewId) -> bool {
        self.text_view().is_some_and(|t| t.is_editable())
    }

    fn become_first_responder(&self, tree: &mut ViewTree, this: ViewId) -> bool {
        tree.set_needs_display(this);
        true
    }

    fn resign_first_responder(&self, tree: &mut ViewTree, this: ViewId) -> bool {
        if let Some(t) = self.text_view() {
            t.inner.editor.borrow_mut().unmark_text();
        }
        tree.set_needs_display(this);
        true
    }

    fn pointer_event(&self, tree: &mut ViewTree, _this: ViewId, event: &PointerEvent, local: Vec2) -> EventResult {
        match self.text_view() {
            Some(t) => t.handle_pointer(tree, event, local),
            None => EventResult::Ignored,
        }
    }

    fn key_down(&self, tree: &mut ViewTree, _this: ViewId, event: &KeyEvent) -> EventResult {
        match self.text_view() {
            Some(t) => t.handle_key(tree, event),
            None => EventResult::Ignored,
        }
    }

    fn text_input(&self, tree: &mut ViewTree, _this: ViewId, text: &str) -> EventResult {
        match self.text_view() {
            Some(t) if t.is_editable() => {
                t.edit(tree, |e| e.insert_text(text));
                EventResult::Handled
            }
            _ => EventResult::Ignored,
        }
    }

    fn ime_event(&self, tree: &mut ViewTree, _this: ViewId, event: &ImeEvent) -> EventResult {
        match self.text_view() {
            Some(t) if t.is_editable() => {
                t.edit(tree, |e| e.handle_ime(event));
                EventResult::Handled
            }
            _ => EventResult::Ignored,
        }
    }
}
