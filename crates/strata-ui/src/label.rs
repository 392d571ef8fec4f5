//! Read-only text bound to a view.

use std::cell::RefCell;
use std::rc::Rc;

use strata_core::{Rect, Shadow, Size, ViewId, ViewTree};
use strata_text::{AttributedString, Attributes, TextRenderer, TextShaper, VerticalAlignment, default_shaper};

struct LabelInner {
    view: ViewId,
    renderer: RefCell<TextRenderer>,
    attributes: RefCell<Attributes>,
}

/// A view that draws an attributed string. The text is laid out lazily at
/// the view's bounds width and sized to fit on `size_to_fit`.
#[derive(Clone)]
pub struct Label {
    inner: Rc<LabelInner>,
}

impl Label {
    pub fn new(tree: &mut ViewTree, frame: Rect) -> Self {
        Self::with_shaper(tree, frame, default_shaper())
    }

    pub fn with_shaper(tree: &mut ViewTree, frame: Rect, shaper: Rc<dyn TextShaper>) -> Self {
        let view = tree.create_view(frame);
        tree.set_opaque(view, false);
        let mut renderer = TextRenderer::new(shaper);
        renderer.set_frame(Rect::from_origin_size(Default::default(), frame.size()));
        let inner = Rc::new(LabelInner {
            view,
            renderer: RefCell::new(renderer),
            attributes: RefCell::new(Attributes::default()),
        });

        let weak = Rc::downgrade(&inner);
        tree.set_layout(view, move |tree, id| {
            if let Some(inner) = weak.upgrade() {
                inner.renderer.borrow_mut().set_frame(tree.bounds(id));
            }
        });
        let weak = Rc::downgrade(&inner);
        tree.set_draw(view, move |_, _, cx| {
            if let Some(inner) = weak.upgrade() {
                let mut r = inner.renderer.borrow_mut();
                r.set_frame(cx.bounds());
                r.draw(cx);
            }
        });
        let weak = Rc::downgrade(&inner);
        tree.set_size_that_fits(view, move |_, _, size| match weak.upgrade() {
            Some(inner) => inner.renderer.borrow().size_constrained_to_width(size.width),
            None => size,
        });
        Label { inner }
    }

    pub fn view(&self) -> ViewId {
        self.inner.view
    }

    pub fn text(&self) -> String {
        self.inner.renderer.borrow().attributed_string().text().to_owned()
    }

    /// Replaces the text, styled with the label's default attributes.
    pub fn set_text(&self, tree: &mut ViewTree, text: &str) {
        let s = AttributedString::with_attributes(text, self.inner.attributes.borrow().clone());
        self.set_attributed_string(tree, s);
    }

    pub fn attributed_string(&self) -> AttributedString {
        self.inner.renderer.borrow().attributed_string().clone()
    }

    pub fn set_attributed_string(&self, tree: &mut ViewTree, s: AttributedString) {
        self.inner.renderer.borrow_mut().set_attributed_string(s);
        tree.set_needs_display(self.inner.view);
    }

    /// Attributes used by `set_text`; also applied to the current text.
    pub fn set_attributes(&self, tree: &mut ViewTree, attributes: Attributes) {
        *self.inner.attributes.borrow_mut() = attributes.clone();
        self.inner.renderer.borrow_mut().edit(|s| {
            let all = 0..s.len();
            s.add_attributes(all, &attributes);
        });
        tree.set_needs_display(self.inner.view);
    }

    pub fn set_vertical_alignment(&self, tree: &mut ViewTree, alignment: VerticalAlignment) {
        self.inner.renderer.borrow_mut().set_vertical_alignment(alignment);
        tree.set_needs_display(self.inner.view);
    }

    pub fn set_shadow(&self, tree: &mut ViewTree, shadow: Option<Shadow>) {
        self.inner.renderer.borrow_mut().set_shadow(shadow);
        tree.set_needs_display(self.inner.view);
    }

    pub fn is_truncated(&self) -> bool {
        self.inner.renderer.borrow().is_truncated()
    }

    /// Size of the text when wrapped at `width`.
    pub fn size_constrained_to_width(&self, width: f32) -> Size {
        self.inner.renderer.borrow().size_constrained_to_width(width)
    }

    pub fn with_renderer<R>(&self, f: impl FnOnce(&TextRenderer) -> R) -> R {
        f(&self.inner.renderer.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{DrawCommand, RecordingProvider};
    use strata_text::{FixedAdvanceShaper, Font, LineBreakMode};

    fn label(tree: &mut ViewTree, frame: Rect) -> Label {
        let l = Label::with_shaper(tree, frame, Rc::new(FixedAdvanceShaper::default()));
        l.set_attributes(tree, Attributes::new().font(Font::system(10.0)));
        l
    }

    #[test]
    fn test_size_to_fit_measures_text() {
        let mut tree = ViewTree::new();
        let l = label(&mut tree, Rect::new(5.0, 5.0, 0.0, 0.0));
        l.set_text(&mut tree, "hello");
        tree.size_to_fit(l.view());
        assert_eq!(tree.frame(l.view()), Rect::new(5.0, 5.0, 25.0, 12.0));
    }

    #[test]
    fn test_draws_glyphs_into_its_surface() {
        let mut tree = ViewTree::new();
        let l = label(&mut tree, Rect::new(0.0, 0.0, 100.0, 20.0));
        l.set_text(&mut tree, "hi there");
        let mut provider = RecordingProvider::new();
        let report = tree.flush(&mut provider);
        assert!(report.draws.iter().any(|(v, _)| *v == l.view()));
        let glyphs: Vec<&str> = provider
            .lists
            .iter()
            .flat_map(|(_, list)| list.iter())
            .filter_map(|c| match c {
                DrawCommand::GlyphRun { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(glyphs.concat(), "hi there");
    }

    #[test]
    fn test_tail_truncation_follows_bounds() {
        let mut tree = ViewTree::new();
        let l = label(&mut tree, Rect::new(0.0, 0.0, 30.0, 12.0));
        l.set_attributes(
            &mut tree,
            Attributes::new()
                .font(Font::system(10.0))
                .line_break(LineBreakMode::TailTruncation),
        );
        l.set_text(&mut tree, "abcdefghij");
        assert!(l.is_truncated());
        tree.set_frame(l.view(), Rect::new(0.0, 0.0, 60.0, 12.0));
        tree.layout_if_needed(l.view());
        assert!(!l.is_truncated());
    }
}
