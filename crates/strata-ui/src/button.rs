//! Push button: a control whose title, title color and background can vary
//! with its state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;
use strata_core::{Brush, Color, ControlEvents, ControlState, Rect, Size, Vec2, ViewId, ViewTree, theme};
use strata_text::{
    AttributedString, Attributes, Font, TextAlignment, TextRenderer, TextShaper, VerticalAlignment, default_shaper,
};

/// Room around the title when sizing to fit.
const TITLE_PADDING: (f32, f32) = (8.0, 4.0);

/// Fallback order when no value is set for the exact state.
const FALLBACK: [ControlState; 3] = [ControlState::DISABLED, ControlState::HIGHLIGHTED, ControlState::SELECTED];

#[derive(Clone, Debug)]
struct PerState<T> {
    entries: SmallVec<[(ControlState, T); 4]>,
}

impl<T> Default for PerState<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<T: Clone> PerState<T> {
    fn set(&mut self, state: ControlState, value: Option<T>) {
        let state = state - ControlState::NOT_KEY;
        self.entries.retain(|(s, _)| *s != state);
        if let Some(v) = value {
            self.entries.push((state, v));
        }
    }

    fn exact(&self, state: ControlState) -> Option<&T> {
        self.entries.iter().find(|(s, _)| *s == state).map(|(_, v)| v)
    }

    fn resolve(&self, state: ControlState) -> Option<&T> {
        let state = state - ControlState::NOT_KEY;
        self.exact(state)
            .or_else(|| {
                FALLBACK
                    .iter()
                    .filter(|f| state.contains(**f))
                    .find_map(|f| self.exact(*f))
            })
            .or_else(|| self.exact(ControlState::NORMAL))
    }
}

struct ButtonInner {
    view: ViewId,
    titles: RefCell<PerState<String>>,
    title_colors: RefCell<PerState<Color>>,
    backgrounds: RefCell<PerState<Brush>>,
    font: RefCell<Font>,
    corner_radius: Cell<f32>,
    renderer: RefCell<TextRenderer>,
}

#[derive(Clone)]
pub struct Button {
    inner: Rc<ButtonInner>,
}

impl Button {
    pub fn new(tree: &mut ViewTree, frame: Rect) -> Self {
        Self::with_shaper(tree, frame, default_shaper())
    }

    pub fn with_shaper(tree: &mut ViewTree, frame: Rect, shaper: Rc<dyn TextShaper>) -> Self {
        let view = tree.create_view(frame);
        tree.set_opaque(view, false);
        tree.make_control(view);
        let mut renderer = TextRenderer::new(shaper);
        renderer.set_vertical_alignment(VerticalAlignment::Middle);
        let inner = Rc::new(ButtonInner {
            view,
            titles: RefCell::default(),
            title_colors: RefCell::default(),
            backgrounds: RefCell::default(),
            font: RefCell::new(Font::system(13.0)),
            corner_radius: Cell::new(4.0),
            renderer: RefCell::new(renderer),
        });

        tree.set_on_control_state_change(view, |tree, id, _| tree.set_needs_display(id));
        tree.set_needs_display_when_host_key_changes(view, true);
        let weak = Rc::downgrade(&inner);
        tree.set_draw(view, move |tree, id, cx| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let b = Button { inner };
            let state = tree.control_state(id);
            let bounds = cx.bounds();
            if let Some(bg) = b.inner.backgrounds.borrow().resolve(state) {
                cx.fill_rounded_rect(bounds, *bg, b.inner.corner_radius.get());
            }
            b.sync_renderer(state);
            let mut r = b.inner.renderer.borrow_mut();
            r.set_frame(bounds);
            r.draw(cx);
        });
        let weak = Rc::downgrade(&inner);
        tree.set_size_that_fits(view, move |tree, id, size| match weak.upgrade() {
            Some(inner) => {
                let b = Button { inner };
                b.sync_renderer(tree.control_state(id));
                let text = b.inner.renderer.borrow().size_constrained_to_width(0.0);
                Size::new(text.width + TITLE_PADDING.0 * 2.0, text.height + TITLE_PADDING.1 * 2.0)
            }
            None => size,
        });
        Button { inner }
    }

    pub fn view(&self) -> ViewId {
        self.inner.view
    }

    /// `None` clears the title for `state`, so it falls back again.
    pub fn set_title(&self, tree: &mut ViewTree, title: Option<&str>, state: ControlState) {
        self.inner.titles.borrow_mut().set(state, title.map(str::to_owned));
        tree.set_needs_display(self.inner.view);
    }

    /// The title shown in `state`: an exact match, then disabled,
    /// highlighted and selected in that order, then normal.
    pub fn title_for_state(&self, state: ControlState) -> Option<String> {
        self.inner.titles.borrow().resolve(state).cloned()
    }

    pub fn current_title(&self, tree: &ViewTree) -> Option<String> {
        self.title_for_state(tree.control_state(self.inner.view))
    }

    pub fn set_title_color(&self, tree: &mut ViewTree, color: Option<Color>, state: ControlState) {
        self.inner.title_colors.borrow_mut().set(state, color);
        tree.set_needs_display(self.inner.view);
    }

    pub fn title_color_for_state(&self, state: ControlState) -> Color {
        self.inner
            .title_colors
            .borrow()
            .resolve(state)
            .copied()
            .unwrap_or_else(|| theme().text)
    }

    pub fn set_background(&self, tree: &mut ViewTree, brush: Option<Brush>, state: ControlState) {
        self.inner.backgrounds.borrow_mut().set(state, brush);
        tree.set_needs_display(self.inner.view);
    }

    pub fn set_font(&self, tree: &mut ViewTree, font: Font) {
        *self.inner.font.borrow_mut() = font;
        tree.set_needs_display(self.inner.view);
    }

    pub fn set_corner_radius(&self, tree: &mut ViewTree, radius: f32) {
        self.inner.corner_radius.set(radius);
        tree.set_needs_display(self.inner.view);
    }

    pub fn add_action(&self, tree: &mut ViewTree, events: ControlEvents, f: impl Fn(&mut ViewTree, ViewId, ControlEvents) + 'static) {
        tree.add_action(self.inner.view, events, f);
    }

    /// Rebuilds the title string only when the shown title or its style changed.
    fn sync_renderer(&self, state: ControlState) {
        let title = self.title_for_state(state).unwrap_or_default();
        let attrs = Attributes::new()
            .font(self.inner.font.borrow().clone())
            .color(self.title_color_for_state(state))
            .alignment(TextAlignment::Center);
        let next = AttributedString::with_attributes(title, attrs);
        let mut r = self.inner.renderer.borrow_mut();
        if *r.attributed_string() != next {
            r.set_attributed_string(next);
        }
    }

    /// Origin of the title's first line in the button's bounds.
    pub fn title_origin(&self, tree: &ViewTree) -> Vec2 {
        self.sync_renderer(tree.control_state(self.inner.view));
        let mut r = self.inner.renderer.borrow_mut();
        r.set_frame(tree.bounds(self.inner.view));
        r.layout_origin()
    }
}
