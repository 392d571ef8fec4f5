//! Editable text: a mutable backing store plus an input-method marked range
//! on top of [`TextRenderer`].
//!
//! All offsets are byte offsets into the backing text and always sit on char
//! boundaries. Caret movement and single-step deletion work in grapheme
//! clusters. Edits never lay out eagerly; the next draw or size query does.

use std::ops::Range;
use std::rc::Rc;

use unicode_segmentation::UnicodeSegmentation;

use strata_core::{DrawContext, ImeEvent, Rect, Size, Vec2, theme};

use crate::attributed::{AttributedString, Attributes};
use crate::renderer::{SelectionAffinity, TextRenderer};
use crate::shaping::TextShaper;

fn prev_grapheme_boundary(text: &str, byte: usize) -> usize {
    let mut last = 0usize;
    for (i, _) in text.grapheme_indices(true) {
        if i >= byte {
            break;
        }
        last = i;
    }
    last
}

fn next_grapheme_boundary(text: &str, byte: usize) -> usize {
    for (i, _) in text.grapheme_indices(true) {
        if i > byte {
            return i;
        }
    }
    text.len()
}

fn char_to_byte(s: &str, ci: usize) -> usize {
    s.char_indices().nth(ci).map(|(i, _)| i).unwrap_or(s.len())
}

pub struct TextEditor {
    renderer: TextRenderer,
    typing: Attributes,
    marked_attributes: Attributes,
    marked: Option<Range<usize>>,
    /// Attributes the marked text reverts to when it is committed.
    marked_base: Attributes,
    anchor: usize,
    focus: usize,
    drag_anchor: Option<usize>,
}

impl TextEditor {
    pub fn new(shaper: Rc<dyn TextShaper>) -> Self {
        Self {
            renderer: TextRenderer::new(shaper),
            typing: Attributes::default(),
            marked_attributes: Attributes::new().background(theme().marked_text, Default::default()),
            marked: None,
            marked_base: Attributes::default(),
            anchor: 0,
            focus: 0,
            drag_anchor: None,
        }
    }

    pub fn renderer(&self) -> &TextRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut TextRenderer {
        &mut self.renderer
    }

    pub fn text(&self) -> &str {
        self.renderer.attributed_string().text()
    }

    pub fn attributed_string(&self) -> &AttributedString {
        self.renderer.attributed_string()
    }

    /// Replaces the whole text using the typing attributes; the caret goes to the end.
    pub fn set_text(&mut self, text: &str) {
        let s = AttributedString::with_attributes(text, self.typing.clone());
        self.set_attributed_string(s);
    }

    pub fn set_attributed_string(&mut self, s: AttributedString) {
        let end = s.len();
        self.renderer.set_attributed_string(s);
        self.marked = None;
        self.drag_anchor = None;
        self.select(end, end);
    }

    /// Attributes given to text typed into an empty editor.
    pub fn typing_attributes(&self) -> &Attributes {
        &self.typing
    }

    pub fn set_typing_attributes(&mut self, a: Attributes) {
        self.typing = a;
    }

    pub fn marked_attributes(&self) -> &Attributes {
        &self.marked_attributes
    }

    pub fn set_marked_attributes(&mut self, a: Attributes) {
        self.marked_attributes = a;
    }

    pub fn set_frame(&mut self, frame: Rect) {
        self.renderer.set_frame(frame);
    }

    pub fn size(&self) -> Size {
        self.renderer.size()
    }

    pub fn size_constrained_to_width(&self, width: f32) -> Size {
        self.renderer.size_constrained_to_width(width)
    }

    // ----- selection -----

    fn select(&mut self, anchor: usize, focus: usize) {
        let len = self.text().len();
        self.anchor = anchor.min(len);
        self.focus = focus.min(len);
        self.renderer
            .set_selection(self.anchor.min(self.focus)..self.anchor.max(self.focus));
        let r = self.renderer.selected_range();
        // clamping may have moved the ends to char boundaries
        if self.anchor <= self.focus {
            (self.anchor, self.focus) = (r.start, r.end);
        } else {
            (self.anchor, self.focus) = (r.end, r.start);
        }
    }

    pub fn selected_range(&self) -> Range<usize> {
        self.renderer.selected_range()
    }

    pub fn set_selected_range(&mut self, range: Range<usize>) {
        self.select(range.start, range.end);
    }

    pub fn caret_index(&self) -> usize {
        self.focus
    }

    pub fn selected_string(&self) -> &str {
        self.renderer.selected_string()
    }

    // ----- editing -----

    /// `None` lets the insertion inherit from the preceding character.
    fn attributes_for_insert(&self) -> Option<Attributes> {
        self.text().is_empty().then(|| self.typing.clone())
    }

    fn replace(&mut self, range: Range<usize>, text: &str, attributes: Option<Attributes>) -> usize {
        let range = self.renderer.attributed_string().clamp_range(range);
        let start = range.start;
        self.renderer.edit(|s| s.replace_range(range, text, attributes));
        start + text.len()
    }

    /// Replaces the marked text if any, else the selection, then places the caret after it.
    pub fn insert_text(&mut self, text: &str) {
        let range = match self.marked.take() {
            Some(m) => {
                let base = self.marked_base.clone();
                let m2 = m.clone();
                self.renderer.edit(|s| s.set_attributes(m2, base));
                m
            }
            None => self.selected_range(),
        };
        self.insert_text_replacing(range, text);
    }

    pub fn insert_text_replacing(&mut self, range: Range<usize>, text: &str) {
        let attrs = self.attributes_for_insert();
        let caret = self.replace(range, text, attrs);
        self.marked = None;
        self.select(caret, caret);
    }

    pub fn delete_characters(&mut self, range: Range<usize>) {
        let range = self.renderer.attributed_string().clamp_range(range);
        if range.is_empty() {
            return;
        }
        let caret = self.replace(range, "", None);
        self.marked = None;
        self.select(caret, caret);
    }

    pub fn delete_backward(&mut self) {
        let sel = self.selected_range();
        if sel.is_empty() {
            let pos = sel.start;
            if pos > 0 {
                let prev = prev_grapheme_boundary(self.text(), pos);
                self.delete_characters(prev..pos);
            }
        } else {
            self.delete_characters(sel);
        }
    }

    pub fn delete_forward(&mut self) {
        let sel = self.selected_range();
        if sel.is_empty() {
            let pos = sel.start;
            if pos < self.text().len() {
                let next = next_grapheme_boundary(self.text(), pos);
                self.delete_characters(pos..next);
            }
        } else {
            self.delete_characters(sel);
        }
    }

    /// Moves the caret by `delta` graphemes. Without `extend`, a non-empty
    /// selection collapses toward the direction of travel first.
    pub fn move_caret(&mut self, delta: isize, extend: bool) {
        let sel = self.selected_range();
        if !extend && !sel.is_empty() && delta != 0 {
            let p = if delta < 0 { sel.start } else { sel.end };
            self.select(p, p);
            return;
        }
        let mut pos = self.focus;
        let text = self.text();
        if delta < 0 {
            for _ in 0..delta.unsigned_abs() {
                pos = prev_grapheme_boundary(text, pos);
            }
        } else {
            for _ in 0..delta as usize {
                pos = next_grapheme_boundary(text, pos);
            }
        }
        if extend {
            self.select(self.anchor, pos);
        } else {
            self.select(pos, pos);
        }
    }

    pub fn move_to_start(&mut self, extend: bool) {
        let a = if extend { self.anchor } else { 0 };
        self.select(a, 0);
    }

    pub fn move_to_end(&mut self, extend: bool) {
        let end = self.text().len();
        let a = if extend { self.anchor } else { end };
        self.select(a, end);
    }

    pub fn select_all(&mut self) {
        let end = self.text().len();
        self.select(0, end);
    }

    // ----- marked text -----

    /// Replaces the marked text (or the selection when nothing is marked)
    /// with `text` and marks it. `selected_within` is a byte range inside
    /// `text`; `None` puts the caret at its end. Empty `text` removes the
    /// marked text.
    pub fn set_marked_text(&mut self, text: &str, selected_within: Option<Range<usize>>) {
        if text.is_empty() {
            self.cancel_marked_text();
            return;
        }
        let range = match self.marked.take() {
            Some(m) => m,
            None => {
                let sel = self.selected_range();
                let s = self.renderer.attributed_string();
                self.marked_base = s
                    .attributes_at(sel.start.saturating_sub(1))
                    .or_else(|| s.attributes_at(sel.start))
                    .cloned()
                    .unwrap_or_else(|| self.typing.clone());
                sel
            }
        };
        let attrs = self.marked_base.merged(&self.marked_attributes);
        let start = self.renderer.attributed_string().clamp_range(range.clone()).start;
        let end = self.replace(range, text, Some(attrs));
        self.marked = Some(start..end);
        match selected_within {
            Some(r) => {
                let a = start + r.start.min(text.len());
                let b = start + r.end.min(text.len());
                self.select(a, b);
            }
            None => self.select(end, end),
        }
    }

    /// Commits the marked text as ordinary text.
    pub fn unmark_text(&mut self) {
        if let Some(m) = self.marked.take() {
            let base = self.marked_base.clone();
            self.renderer.edit(|s| s.set_attributes(m, base));
        }
    }

    /// Removes the marked text.
    pub fn cancel_marked_text(&mut self) {
        if let Some(m) = self.marked.take() {
            let caret = self.replace(m, "", None);
            self.select(caret, caret);
        }
    }

    pub fn marked_range(&self) -> Option<Range<usize>> {
        self.marked.clone()
    }

    pub fn has_marked_text(&self) -> bool {
        self.marked.is_some()
    }

    /// Applies an input-method event. Preedit selections arrive as char indices.
    pub fn handle_ime(&mut self, event: &ImeEvent) {
        match event {
            ImeEvent::Preedit { text, selection } => {
                let within = selection.map(|(a, b)| char_to_byte(text, a)..char_to_byte(text, b));
                self.set_marked_text(text, within);
            }
            ImeEvent::Commit(text) => self.insert_text(text),
            ImeEvent::Cancel => self.cancel_marked_text(),
        }
    }

    // ----- pointer selection -----

    /// Starts a selection at `p` (view coordinates). `extend` keeps the current anchor.
    pub fn begin_drag(&mut self, p: Vec2, extend: bool) {
        self.unmark_text();
        let idx = self.renderer.index_for_point(p);
        if extend {
            let a = self.anchor;
            self.select(a, idx);
            self.drag_anchor = Some(a);
        } else {
            self.select(idx, idx);
            self.drag_anchor = Some(idx);
        }
    }

    /// Selects a whole unit around `p`, as for a double or triple click.
    pub fn select_at(&mut self, p: Vec2, affinity: SelectionAffinity) {
        let idx = self.renderer.index_for_point(p);
        let r = self.renderer.range_for_affinity(idx, affinity);
        self.select(r.start, r.end);
        self.drag_anchor = None;
    }

    pub fn drag_to(&mut self, p: Vec2) {
        if let Some(anchor) = self.drag_anchor {
            let idx = self.renderer.index_for_point(p);
            self.select(anchor, idx);
        }
    }

    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn caret_rect(&self) -> Rect {
        self.renderer.caret_rect(self.focus)
    }

    /// Draws the text, an underline under marked text and, when the
    /// selection is empty and `caret_visible`, the caret.
    pub fn draw(&self, ctx: &mut DrawContext, caret_visible: bool) {
        self.renderer.draw(ctx);
        let t = theme();
        if let Some(m) = &self.marked {
            for r in self.renderer.rects_for_range(m.clone()) {
                ctx.fill_rect(Rect::new(r.x, r.max_y() - 1.0, r.w, 1.0), t.text);
            }
        }
        if caret_visible && self.selected_range().is_empty() {
            let c = self.caret_rect();
            ctx.fill_rect(Rect::new(c.x, c.y, 1.0, c.h), t.text);
        }
    }
}
