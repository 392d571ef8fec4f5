//! # Table views
//!
//! A table view is a [`ScrollView`] whose content is a vertical list of rows
//! grouped into sections. Only rows intersecting the visible rect (plus a
//! lookahead margin from `table_metrics()`) have a cell; rows leaving that
//! range hand their cell back to a reuse pool keyed by identifier, and the
//! data source pulls from the pool before building a new one.
//!
//! Row geometry is queried from the delegate once per row on
//! [`TableView::reload_data`] and cached as prefix sums, so the per-frame
//! windowing is a pair of binary searches.
//!
//! ```rust
//! use std::rc::Rc;
//! use strata_core::*;
//! use strata_ui::table::*;
//! use strata_ui::scroll::ScrollDelegate;
//!
//! struct Rows;
//!
//! impl TableDataSource for Rows {
//!     fn number_of_rows(&self, _: &TableView, _: usize) -> usize {
//!         100
//!     }
//!     fn cell_for_row(&self, tree: &mut ViewTree, table: &TableView, _: IndexPath) -> ViewId {
//!         table.reusable_cell(tree, "row", |_, _| {})
//!     }
//! }
//!
//! impl ScrollDelegate for Rows {}
//! impl TableDelegate for Rows {
//!     fn height_for_row(&self, _: &TableView, _: IndexPath) -> f32 {
//!         30.0
//!     }
//! }
//!
//! let mut tree = ViewTree::new();
//! let table = TableView::new(&mut tree, Rect::new(0.0, 0.0, 200.0, 90.0));
//! let rows = Rc::new(Rows);
//! table.set_data_source(&rows);
//! table.set_delegate(&rows);
//! table.reload_data(&mut tree);
//!
//! assert_eq!(table.scroll().content_size().height, 3000.0);
//! // three rows on screen plus one in the lookahead margin
//! assert_eq!(table.visible_cells().len(), 4);
//! ```

pub mod cell;
pub mod index_path;
pub mod pool;
pub mod sections;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use slotmap::SecondaryMap;
use strata_core::{
    EventResult, Key, KeyEvent, PointerEvent, PointerEventKind, Rect, Responder, ScrollWheelEvent, Size,
    StrataError, Vec2, ViewId, ViewTree, report_once, table_metrics,
};

use crate::scroll::{ScrollDelegate, ScrollView};

pub use cell::{CellBehavior, CellState};
pub use index_path::IndexPath;
pub use pool::ReusePool;
pub use sections::{SectionInfo, SectionTable};

/// Row height used when no delegate is set.
pub const DEFAULT_ROW_HEIGHT: f32 = 44.0;

const HEADER_Z: f32 = 10.0;
const PULL_DOWN_Z: f32 = -1.0;

/// Where `scroll_to_row` leaves the row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrollPosition {
    /// Do not scroll.
    #[default]
    None,
    Top,
    Middle,
    Bottom,
    /// Minimum movement that makes the row fully visible.
    ToVisible,
}

#[allow(unused_variables)]
pub trait TableDataSource {
    fn number_of_sections(&self, table: &TableView) -> usize {
        1
    }

    fn number_of_rows(&self, table: &TableView, section: usize) -> usize;

    /// Returns the cell for `path`, normally via [`TableView::reusable_cell`]
    /// or [`TableView::dequeue_reusable_cell`].
    fn cell_for_row(&self, tree: &mut ViewTree, table: &TableView, path: IndexPath) -> ViewId;

    /// Only asked for sections with a non-zero header height.
    fn header_view_for_section(&self, tree: &mut ViewTree, table: &TableView, section: usize) -> Option<ViewId> {
        None
    }
}

/// Table notifications. Scroll callbacks arrive through [`ScrollDelegate`].
#[allow(unused_variables)]
pub trait TableDelegate: ScrollDelegate {
    fn height_for_row(&self, table: &TableView, path: IndexPath) -> f32;

    fn header_height_for_section(&self, table: &TableView, section: usize) -> f32 {
        0.0
    }

    fn will_display_cell(&self, tree: &mut ViewTree, table: &TableView, cell: ViewId, path: IndexPath) {}

    /// Pointer down on a row, or keyboard navigation.
    fn did_select_row(&self, tree: &mut ViewTree, table: &TableView, path: IndexPath) {}

    /// Pointer up on the row that received the down.
    fn did_click_row(&self, tree: &mut ViewTree, table: &TableView, path: IndexPath, click_count: u32) {}

    fn header_will_become_pinned(&self, tree: &mut ViewTree, table: &TableView, section: usize) {}

    fn header_will_become_unpinned(&self, tree: &mut ViewTree, table: &TableView, section: usize) {}
}

/// Focus to hand back to a row once its new cell appears.
#[derive(Clone, Copy, Debug)]
struct FocusRequest {
    path: IndexPath,
    /// Focus generation when the request was recorded; any later focus
    /// change drops the request.
    generation: u64,
}

#[derive(Default)]
struct TableState {
    sections: SectionTable,
    cells: SecondaryMap<ViewId, CellState>,
    visible: BTreeMap<IndexPath, ViewId>,
    pool: ReusePool,
    headers: Vec<Option<ViewId>>,
    pinned: Option<usize>,
    selected: Option<IndexPath>,
    pressed: Option<IndexPath>,
    future_focus: Option<FocusRequest>,
    keep_visible: Option<(IndexPath, f32)>,
    width: f32,
    last_width: Option<f32>,
    pull_down: Option<ViewId>,
    row_height: f32,
    lookahead: f32,
}

struct TableInner {
    scroll: ScrollView,
    state: RefCell<TableState>,
    data_source: RefCell<Option<Weak<dyn TableDataSource>>>,
    delegate: RefCell<Option<Weak<dyn TableDelegate>>>,
    in_layout: Cell<bool>,
}

/// Handle to a table view. Clones share the same table.
#[derive(Clone)]
pub struct TableView {
    inner: Rc<TableInner>,
}

impl PartialEq for TableView {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for TableView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state.borrow();
        f.debug_struct("TableView")
            .field("view", &self.view())
            .field("sections", &st.sections.number_of_sections())
            .field("visible", &st.visible.len())
            .field("pooled", &st.pool.len())
            .field("selected", &st.selected)
            .finish()
    }
}

impl TableView {
    pub fn new(tree: &mut ViewTree, frame: Rect) -> Self {
        let scroll = ScrollView::new(tree, frame);
        let view = scroll.view();
        let inner = Rc::new(TableInner {
            scroll,
            state: RefCell::new(TableState {
                width: frame.w,
                row_height: DEFAULT_ROW_HEIGHT,
                lookahead: table_metrics().lookahead,
                ..Default::default()
            }),
            data_source: RefCell::new(None),
            delegate: RefCell::new(None),
            in_layout: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner);
        inner.scroll.set_content_layout(move |tree, _| {
            if let Some(inner) = weak.upgrade() {
                TableView { inner }.layout_cells(tree);
            }
        });
        tree.set_responder(
            view,
            Rc::new(TableResponder {
                table: Rc::downgrade(&inner),
            }),
        );
        TableView { inner }
    }

    pub fn view(&self) -> ViewId {
        self.inner.scroll.view()
    }

    pub fn scroll(&self) -> &ScrollView {
        &self.inner.scroll
    }

    pub fn set_data_source<D: TableDataSource + 'static>(&self, data_source: &Rc<D>) {
        let weak: Weak<dyn TableDataSource> = Rc::downgrade(data_source) as Weak<dyn TableDataSource>;
        *self.inner.data_source.borrow_mut() = Some(weak);
    }

    /// Also becomes the scroll view's delegate.
    pub fn set_delegate<D: TableDelegate + 'static>(&self, delegate: &Rc<D>) {
        let weak: Weak<dyn TableDelegate> = Rc::downgrade(delegate) as Weak<dyn TableDelegate>;
        *self.inner.delegate.borrow_mut() = Some(weak);
        self.inner.scroll.set_delegate(delegate);
    }

    fn data_source(&self) -> Option<Rc<dyn TableDataSource>> {
        self.inner.data_source.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn delegate(&self) -> Option<Rc<dyn TableDelegate>> {
        self.inner.delegate.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_row_height(&self, height: f32) {
        self.inner.state.borrow_mut().row_height = height;
    }

    pub fn lookahead(&self) -> f32 {
        self.inner.state.borrow().lookahead
    }

    pub fn set_lookahead(&self, tree: &mut ViewTree, lookahead: f32) {
        self.inner.state.borrow_mut().lookahead = lookahead.max(0.0);
        tree.set_needs_layout(self.view());
    }

    // ----- cells -----

    /// Creates a cell view registered with this table.
    pub fn make_cell(&self, tree: &mut ViewTree, reuse_identifier: &str) -> ViewId {
        let cell = tree.create_view(Rect::ZERO);
        self.register_cell(cell, reuse_identifier);
        cell
    }

    /// Adopts an existing view as a cell.
    pub fn register_cell(&self, cell: ViewId, reuse_identifier: &str) {
        self.inner
            .state
            .borrow_mut()
            .cells
            .insert(cell, CellState::new(reuse_identifier));
    }

    pub fn set_cell_behavior(&self, cell: ViewId, behavior: Rc<dyn CellBehavior>) {
        if let Some(c) = self.inner.state.borrow_mut().cells.get_mut(cell) {
            c.behavior = Some(behavior);
        }
    }

    /// A pooled cell for `reuse_identifier`, already reset.
    pub fn dequeue_reusable_cell(&self, tree: &ViewTree, reuse_identifier: &str) -> Option<ViewId> {
        let mut st = self.inner.state.borrow_mut();
        while let Some(cell) = st.pool.pop(reuse_identifier) {
            if tree.contains(cell) {
                return Some(cell);
            }
            st.cells.remove(cell);
        }
        None
    }

    /// Dequeues a cell, or makes one and runs `init` on it.
    pub fn reusable_cell(
        &self,
        tree: &mut ViewTree,
        reuse_identifier: &str,
        init: impl FnOnce(&mut ViewTree, ViewId),
    ) -> ViewId {
        if let Some(cell) = self.dequeue_reusable_cell(tree, reuse_identifier) {
            return cell;
        }
        let cell = self.make_cell(tree, reuse_identifier);
        init(tree, cell);
        cell
    }

    pub fn cell_state(&self, cell: ViewId) -> Option<CellState> {
        self.inner.state.borrow().cells.get(cell).cloned()
    }

    pub fn is_cell_selected(&self, cell: ViewId) -> bool {
        self.inner.state.borrow().cells.get(cell).is_some_and(|c| c.selected)
    }

    pub fn is_cell_highlighted(&self, cell: ViewId) -> bool {
        self.inner.state.borrow().cells.get(cell).is_some_and(|c| c.highlighted)
    }

    pub fn pooled_cell_count(&self, reuse_identifier: &str) -> usize {
        self.inner.state.borrow().pool.count(reuse_identifier)
    }

    fn set_cell_selected(&self, tree: &mut ViewTree, cell: ViewId, selected: bool, animated: bool) {
        let behavior = {
            let mut st = self.inner.state.borrow_mut();
            let Some(c) = st.cells.get_mut(cell) else {
                return;
            };
            c.selected = selected;
            c.behavior.clone()
        };
        tree.set_needs_display(cell);
        if let Some(b) = behavior {
            b.set_selected(tree, cell, selected, animated);
        }
    }

    fn set_cell_highlighted(&self, tree: &mut ViewTree, cell: ViewId, highlighted: bool) {
        let behavior = {
            let mut st = self.inner.state.borrow_mut();
            let Some(c) = st.cells.get_mut(cell) else {
                return;
            };
            if c.highlighted == highlighted {
                return;
            }
            c.highlighted = highlighted;
            c.behavior.clone()
        };
        tree.set_needs_display(cell);
        if let Some(b) = behavior {
            b.set_highlighted(tree, cell, highlighted);
        }
    }

    /// Detaches `cell`, resets it and pools it (or destroys it when it has
    /// no reuse identifier).
    fn enqueue(&self, tree: &mut ViewTree, cell: ViewId) {
        let taken = {
            let mut st = self.inner.state.borrow_mut();
            st.cells.get_mut(cell).map(|c| {
                c.reset();
                (c.is_reusable(), c.reuse_identifier.clone(), c.behavior.clone())
            })
        };
        if tree.parent(cell).is_some() {
            tree.remove_from_parent(cell);
        }
        match taken {
            Some((true, identifier, behavior)) => {
                tree.set_needs_display(cell);
                if let Some(b) = behavior {
                    b.prepare_for_reuse(tree, cell);
                }
                self.inner.state.borrow_mut().pool.push(&identifier, cell);
            }
            _ => {
                self.inner.state.borrow_mut().cells.remove(cell);
                if tree.contains(cell) {
                    tree.destroy(cell);
                }
            }
        }
    }

    // ----- reloading -----

    /// Rebuilds row geometry from the data source and redisplays the
    /// visible rows. Calling it twice with unchanged data is a no-op the
    /// second time: every row gets its old cell back.
    pub fn reload_data(&self, tree: &mut ViewTree) {
        self.reload(tree, None);
        self.layout_cells(tree);
    }

    /// Reloads, then scrolls so the top of the visible area sits
    /// `relative_offset` points below the top of `path`'s row.
    pub fn reload_data_maintaining_visible_index_path(
        &self,
        tree: &mut ViewTree,
        path: IndexPath,
        relative_offset: f32,
    ) {
        self.reload(tree, Some((path, relative_offset)));
        self.layout_cells(tree);
    }

    fn build_sections(&self) -> SectionTable {
        let Some(ds) = self.data_source() else {
            return SectionTable::default();
        };
        let delegate = self.delegate();
        let fallback = self.inner.state.borrow().row_height;
        let count = ds.number_of_sections(self);
        SectionTable::build(
            count,
            |s| delegate.as_ref().map_or(0.0, |d| d.header_height_for_section(self, s)),
            |s| ds.number_of_rows(self, s),
            |p| delegate.as_ref().map_or(fallback, |d| d.height_for_row(self, p)),
        )
    }

    fn reload(&self, tree: &mut ViewTree, keep: Option<(IndexPath, f32)>) {
        let view = self.view();
        let focused = tree.first_responder().and_then(|fr| self.path_for_descendant(tree, fr));

        let visible = std::mem::take(&mut self.inner.state.borrow_mut().visible);
        for cell in visible.into_values() {
            self.enqueue(tree, cell);
        }
        let (headers, pinned) = {
            let mut st = self.inner.state.borrow_mut();
            (std::mem::take(&mut st.headers), st.pinned.take())
        };
        if let (Some(s), Some(d)) = (pinned, self.delegate()) {
            d.header_will_become_unpinned(tree, self, s);
        }
        for h in headers.into_iter().flatten() {
            if tree.parent(h) == Some(view) {
                tree.remove_from_parent(h);
            }
        }

        let sections = self.build_sections();
        let header_sections: Vec<usize> = sections
            .sections()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.header_height > 0.0)
            .map(|(i, _)| i)
            .collect();
        let width = tree.bounds(view).w;
        {
            let mut st = self.inner.state.borrow_mut();
            log::debug!(
                "table {view:?} reloaded: {} sections, height {}",
                sections.number_of_sections(),
                sections.content_height()
            );
            st.headers = vec![None; sections.number_of_sections()];
            st.sections = sections;
            st.width = width;
            st.last_width = Some(width);
            if st.selected.is_some_and(|p| !st.sections.contains(p)) {
                st.selected = None;
            }
            // removing the focused cell above bumped the generation
            let generation = tree.focus_generation();
            match focused {
                Some(path) => st.future_focus = Some(FocusRequest { path, generation }),
                None => {
                    if let Some(req) = &mut st.future_focus {
                        req.generation = generation;
                    }
                }
            }
            if st.future_focus.is_some_and(|r| !st.sections.contains(r.path)) {
                st.future_focus = None;
            }
            if keep.is_some() {
                st.keep_visible = keep;
            }
        }

        if let Some(ds) = self.data_source() {
            for s in header_sections {
                if let Some(h) = ds.header_view_for_section(tree, self, s) {
                    tree.set_z_position(h, HEADER_Z);
                    tree.add_child(view, h);
                    if let Some(slot) = self.inner.state.borrow_mut().headers.get_mut(s) {
                        *slot = Some(h);
                    }
                }
            }
        }

        let height = self.inner.state.borrow().sections.content_height();
        self.inner.scroll.set_content_size(tree, Size::new(width, height));
    }

    /// The row whose visible cell contains `view`.
    fn path_for_descendant(&self, tree: &ViewTree, view: ViewId) -> Option<IndexPath> {
        let st = self.inner.state.borrow();
        tree.ancestors(view)
            .into_iter()
            .chain(std::iter::once(view))
            .find_map(|v| st.cells.get(v).and_then(|c| c.index_path))
    }

    /// Row pending focus restoration, if any.
    pub fn future_first_responder(&self) -> Option<IndexPath> {
        self.inner.state.borrow().future_focus.map(|r| r.path)
    }

    // ----- layout -----

    fn layout_cells(&self, tree: &mut ViewTree) {
        if self.inner.in_layout.replace(true) {
            return;
        }
        self.layout_pass(tree);
        self.inner.in_layout.set(false);
    }

    fn layout_pass(&self, tree: &mut ViewTree) {
        let view = self.view();
        let width = tree.bounds(view).w;

        let last = self.inner.state.borrow_mut().last_width.replace(width);
        if last.is_some_and(|w| w != width) {
            // keep the first visible row in place across the resize
            let anchor = self.first_visible_anchor();
            log::debug!("table {view:?} width changed to {width}; anchoring {anchor:?}");
            self.reload(tree, anchor);
        }

        let keep = self.inner.state.borrow_mut().keep_visible.take();
        if let Some((path, rel)) = keep
            && let Some(r) = self.rect_for_row(path)
        {
            let x = self.inner.scroll.content_offset().x;
            self.inner.scroll.set_content_offset(tree, Vec2::new(x, r.y + rel), false);
        }

        self.update_visible_cells(tree, width);
        self.layout_headers(tree, width);
        self.layout_pull_down(tree, width);
        self.restore_focus(tree);
    }

    fn first_visible_anchor(&self) -> Option<(IndexPath, f32)> {
        let visible = self.inner.scroll.visible_rect();
        let st = self.inner.state.borrow();
        let path = *st.sections.paths_in(visible.y, visible.max_y()).first()?;
        let (y, _) = st.sections.row_span(path)?;
        Some((path, visible.y - y))
    }

    fn update_visible_cells(&self, tree: &mut ViewTree, width: f32) {
        let view = self.view();
        let visible = self.inner.scroll.visible_rect();
        let (wanted, gone) = {
            let mut st = self.inner.state.borrow_mut();
            st.width = width;
            let la = st.lookahead;
            let wanted = st.sections.paths_in(visible.y - la, visible.max_y() + la);
            let keep: BTreeSet<IndexPath> = wanted.iter().copied().collect();
            let gone: Vec<ViewId> = st
                .visible
                .iter()
                .filter(|(p, _)| !keep.contains(p))
                .map(|(_, c)| *c)
                .collect();
            st.visible.retain(|p, _| keep.contains(p));
            (wanted, gone)
        };
        for cell in gone {
            self.enqueue(tree, cell);
        }

        let ds = self.data_source();
        let delegate = self.delegate();
        for path in wanted {
            let Some(frame) = self.rect_for_row(path) else {
                continue;
            };
            let existing = self.inner.state.borrow().visible.get(&path).copied();
            if let Some(cell) = existing {
                tree.set_frame(cell, frame);
                continue;
            }
            let Some(ds) = &ds else {
                break;
            };
            let cell = ds.cell_for_row(tree, self, path);
            if !tree.contains(cell) {
                report_once(&StrataError::UnknownView(cell));
                continue;
            }
            let (selected, behavior) = {
                let mut st = self.inner.state.borrow_mut();
                let is_selected = st.selected == Some(path);
                if !st.cells.contains_key(cell) {
                    st.cells.insert(cell, CellState::new(""));
                }
                let behavior = st.cells.get_mut(cell).and_then(|c| {
                    c.index_path = Some(path);
                    c.selected = is_selected;
                    c.behavior.clone()
                });
                st.visible.insert(path, cell);
                (is_selected, behavior)
            };
            tree.set_frame(cell, frame);
            if tree.parent(cell) != Some(view) {
                tree.add_child(view, cell);
            }
            if let Some(b) = &behavior {
                if selected {
                    b.set_selected(tree, cell, true, false);
                }
                b.prepare_for_display(tree, cell, path);
            }
            if let Some(d) = &delegate {
                d.will_display_cell(tree, self, cell, path);
            }
        }
    }

    fn layout_headers(&self, tree: &mut ViewTree, width: f32) {
        let visible = self.inner.scroll.visible_rect();
        let (frames, pinned, was) = {
            let mut st = self.inner.state.borrow_mut();
            let la = st.lookahead;
            let range = Rect::new(visible.x, visible.y - la, visible.w, visible.h + 2.0 * la);
            let pinned = st.sections.section_at(visible.y).filter(|&s| {
                let info = &st.sections.sections()[s];
                st.headers.get(s).copied().flatten().is_some() && visible.y > info.y
            });
            let frames: Vec<(ViewId, Rect, bool)> = st
                .headers
                .iter()
                .enumerate()
                .filter_map(|(s, h)| {
                    let h = (*h)?;
                    let info = &st.sections.sections()[s];
                    let y = if pinned == Some(s) {
                        visible.y.min(info.max_y() - info.header_height)
                    } else {
                        info.y
                    };
                    let r = Rect::new(0.0, y, width, info.header_height);
                    Some((h, r, r.intersects(&range)))
                })
                .collect();
            let was = std::mem::replace(&mut st.pinned, pinned);
            (frames, pinned, was)
        };
        for (h, r, on_screen) in frames {
            tree.set_frame(h, r);
            tree.set_hidden(h, !on_screen);
        }
        if pinned != was
            && let Some(d) = self.delegate()
        {
            if let Some(s) = was {
                d.header_will_become_unpinned(tree, self, s);
            }
            if let Some(s) = pinned {
                d.header_will_become_pinned(tree, self, s);
            }
        }
    }

    fn restore_focus(&self, tree: &mut ViewTree) {
        let Some(req) = self.inner.state.borrow().future_focus else {
            return;
        };
        if tree.focus_generation() != req.generation {
            log::debug!("dropping focus request for {} (focus moved)", req.path);
            self.inner.state.borrow_mut().future_focus = None;
            return;
        }
        let Some(cell) = self.cell_for_row(req.path) else {
            return;
        };
        self.inner.state.borrow_mut().future_focus = None;
        if !tree.make_first_responder(Some(cell)) {
            log::debug!("cell for {} refused focus", req.path);
        }
    }

    /// Number of the header currently pinned to the top of the viewport.
    pub fn pinned_header_section(&self) -> Option<usize> {
        self.inner.state.borrow().pinned
    }

    pub fn header_view_for_section(&self, section: usize) -> Option<ViewId> {
        self.inner.state.borrow().headers.get(section).copied().flatten()
    }

    // ----- pull-down view -----

    /// A view above the first row, revealed only by pulling the content down.
    pub fn set_pull_down_view(&self, tree: &mut ViewTree, pull_down: Option<ViewId>) {
        let view = self.view();
        let old = std::mem::replace(&mut self.inner.state.borrow_mut().pull_down, pull_down);
        if let Some(old) = old
            && tree.parent(old) == Some(view)
        {
            tree.remove_from_parent(old);
        }
        if let Some(v) = pull_down {
            tree.set_z_position(v, PULL_DOWN_Z);
            tree.add_child(view, v);
            let width = tree.bounds(view).w;
            self.layout_pull_down(tree, width);
        }
    }

    pub fn pull_down_view(&self) -> Option<ViewId> {
        self.inner.state.borrow().pull_down
    }

    fn pull_down_frame(&self, tree: &ViewTree, width: f32) -> Option<Rect> {
        let v = self.pull_down_view()?;
        let h = tree.bounds(v).h;
        Some(Rect::new(0.0, -h, width, h))
    }

    pub fn pull_down_view_is_visible(&self, tree: &ViewTree) -> bool {
        let width = tree.bounds(self.view()).w;
        self.pull_down_frame(tree, width)
            .is_some_and(|r| r.intersects(&self.inner.scroll.visible_rect()))
    }

    fn layout_pull_down(&self, tree: &mut ViewTree, width: f32) {
        let (Some(v), Some(frame)) = (self.pull_down_view(), self.pull_down_frame(tree, width)) else {
            return;
        };
        let visible = self.pull_down_view_is_visible(tree);
        tree.set_frame(v, frame);
        tree.set_hidden(v, !visible);
    }

    // ----- queries -----

    pub fn number_of_sections(&self) -> usize {
        self.inner.state.borrow().sections.number_of_sections()
    }

    pub fn number_of_rows_in_section(&self, section: usize) -> usize {
        self.inner.state.borrow().sections.number_of_rows(section)
    }

    /// Row rect in content coordinates, or `None` if out of range.
    pub fn rect_for_row(&self, path: IndexPath) -> Option<Rect> {
        let st = self.inner.state.borrow();
        let (y, h) = st.sections.row_span(path)?;
        Some(Rect::new(0.0, y, st.width, h))
    }

    /// Header plus rows.
    pub fn rect_for_section(&self, section: usize) -> Option<Rect> {
        let st = self.inner.state.borrow();
        let (y, h) = st.sections.section_span(section)?;
        Some(Rect::new(0.0, y, st.width, h))
    }

    /// `None` unless the cell is on screen.
    pub fn index_path_for_cell(&self, cell: ViewId) -> Option<IndexPath> {
        self.inner.state.borrow().cells.get(cell).and_then(|c| c.index_path)
    }

    pub fn index_paths_for_rows_in_rect(&self, rect: Rect) -> Vec<IndexPath> {
        self.inner.state.borrow().sections.paths_in(rect.y, rect.max_y())
    }

    /// `None` unless the row is on screen.
    pub fn cell_for_row(&self, path: IndexPath) -> Option<ViewId> {
        self.inner.state.borrow().visible.get(&path).copied()
    }

    pub fn visible_cells(&self) -> Vec<ViewId> {
        self.inner.state.borrow().visible.values().copied().collect()
    }

    /// Top to bottom.
    pub fn sorted_visible_cells(&self) -> Vec<ViewId> {
        // the map is ordered by index path, which is top to bottom
        self.visible_cells()
    }

    pub fn index_paths_for_visible_rows(&self) -> Vec<IndexPath> {
        self.inner.state.borrow().visible.keys().copied().collect()
    }

    pub fn index_path_for_selected_row(&self) -> Option<IndexPath> {
        self.inner.state.borrow().selected
    }

    pub fn index_path_for_first_row(&self) -> Option<IndexPath> {
        self.inner.state.borrow().sections.first_path()
    }

    pub fn index_path_for_last_row(&self) -> Option<IndexPath> {
        self.inner.state.borrow().sections.last_path()
    }

    /// `point` is in content coordinates (the table view's bounds space).
    pub fn index_path_for_row_at_point(&self, point: Vec2) -> Option<IndexPath> {
        let st = self.inner.state.borrow();
        if point.x < 0.0 || point.x >= st.width {
            return None;
        }
        st.sections.path_at(point.y)
    }

    fn check_path(&self, path: IndexPath) -> bool {
        let st = self.inner.state.borrow();
        if st.sections.contains(path) {
            return true;
        }
        report_once(&StrataError::IndexOutOfRange {
            what: "table row",
            index: path.row,
            len: st.sections.number_of_rows(path.section),
        });
        false
    }

    // ----- scrolling and selection -----

    pub fn scroll_to_row(&self, tree: &mut ViewTree, path: IndexPath, position: ScrollPosition, animated: bool) {
        if !self.check_path(path) {
            return;
        }
        let Some(r) = self.rect_for_row(path) else {
            return;
        };
        let scroll = &self.inner.scroll;
        let visible = scroll.visible_rect();
        let y = match position {
            ScrollPosition::None => return,
            ScrollPosition::ToVisible => {
                scroll.scroll_rect_to_visible(tree, r, animated);
                return;
            }
            ScrollPosition::Top => r.y,
            ScrollPosition::Middle => r.y + r.h / 2.0 - visible.h / 2.0,
            ScrollPosition::Bottom => r.max_y() - visible.h,
        };
        scroll.set_content_offset(tree, Vec2::new(visible.x, y), animated);
    }

    /// Selects `path`, first clearing the previous selection.
    pub fn select_row(&self, tree: &mut ViewTree, path: IndexPath, animated: bool, position: ScrollPosition) {
        if !self.check_path(path) {
            return;
        }
        let old = self.index_path_for_selected_row();
        if let Some(old) = old.filter(|&o| o != path) {
            self.deselect_row(tree, old, animated);
        }
        self.inner.state.borrow_mut().selected = Some(path);
        if let Some(cell) = self.cell_for_row(path) {
            self.set_cell_selected(tree, cell, true, animated);
        }
        self.scroll_to_row(tree, path, position, animated);
    }

    pub fn deselect_row(&self, tree: &mut ViewTree, path: IndexPath, animated: bool) {
        {
            let mut st = self.inner.state.borrow_mut();
            if st.selected != Some(path) {
                return;
            }
            st.selected = None;
        }
        if let Some(cell) = self.cell_for_row(path) {
            self.set_cell_selected(tree, cell, false, animated);
        }
    }

    // ----- input -----

    fn handle_pointer(&self, tree: &mut ViewTree, event: &PointerEvent, local: Vec2) -> EventResult {
        match event.kind {
            PointerEventKind::Down(_) => {
                let path = self.index_path_for_row_at_point(local);
                self.inner.state.borrow_mut().pressed = path;
                if let Some(path) = path {
                    if let Some(cell) = self.cell_for_row(path) {
                        self.set_cell_highlighted(tree, cell, true);
                    }
                    self.select_row(tree, path, false, ScrollPosition::None);
                    if let Some(d) = self.delegate() {
                        d.did_select_row(tree, self, path);
                    }
                }
                self.inner.scroll.handle_pointer(tree, event);
                EventResult::Handled
            }
            PointerEventKind::Up(_) => {
                let pressed = self.inner.state.borrow_mut().pressed.take();
                self.inner.scroll.handle_pointer(tree, event);
                if let Some(path) = pressed {
                    if let Some(cell) = self.cell_for_row(path) {
                        self.set_cell_highlighted(tree, cell, false);
                    }
                    if self.index_path_for_row_at_point(local) == Some(path)
                        && let Some(d) = self.delegate()
                    {
                        d.did_click_row(tree, self, path, event.click_count);
                    }
                }
                EventResult::Handled
            }
            PointerEventKind::Dragged => {
                let before = self.inner.scroll.content_offset();
                let result = self.inner.scroll.handle_pointer(tree, event);
                // once the press turns into a scroll it is no longer a click
                if self.inner.scroll.content_offset() != before {
                    let pressed = self.inner.state.borrow_mut().pressed.take();
                    if let Some(cell) = pressed.and_then(|p| self.cell_for_row(p)) {
                        self.set_cell_highlighted(tree, cell, false);
                    }
                }
                result
            }
            _ => self.inner.scroll.handle_pointer(tree, event),
        }
    }

    /// Arrow up/down move the selection and keep it on screen.
    fn handle_key(&self, tree: &mut ViewTree, event: &KeyEvent) -> EventResult {
        let down = match event.key {
            Key::ArrowDown => true,
            Key::ArrowUp => false,
            _ => return EventResult::Ignored,
        };
        let (selected, next) = {
            let st = self.inner.state.borrow();
            let next = match (st.selected, down) {
                (Some(p), true) => st.sections.next_path(p),
                (Some(p), false) => st.sections.previous_path(p),
                (None, true) => st.sections.first_path(),
                (None, false) => st.sections.last_path(),
            };
            (st.selected, next)
        };
        match next {
            Some(path) => {
                self.select_row(tree, path, false, ScrollPosition::ToVisible);
                if let Some(d) = self.delegate() {
                    d.did_select_row(tree, self, path);
                }
                EventResult::Handled
            }
            // at the first or last row
            None if selected.is_some() => EventResult::Handled,
            None => EventResult::Ignored,
        }
    }
}

struct TableResponder {
    table: Weak<TableInner>,
}

impl TableResponder {
    fn table(&self) -> Option<TableView> {
        self.table.upgrade().map(|inner| TableView { inner })
    }
}

impl Responder for TableResponder {
    fn accepts_first_responder(&self, _tree: &ViewTree, _this: ViewId) -> bool {
        true
    }

    fn pointer_event(&self, tree: &mut ViewTree, _this: ViewId, event: &PointerEvent, local: Vec2) -> EventResult {
        match self.table() {
            Some(t) => t.handle_pointer(tree, event, local),
            None => EventResult::Ignored,
        }
    }

    fn scroll_wheel(&self, tree: &mut ViewTree, _this: ViewId, event: &ScrollWheelEvent) -> EventResult {
        match self.table() {
            Some(t) => t.scroll().handle_wheel(tree, event),
            None => EventResult::Ignored,
        }
    }

    fn key_down(&self, tree: &mut ViewTree, _this: ViewId, event: &KeyEvent) -> EventResult {
        match self.table() {
            Some(t) => t.handle_key(tree, event),
            None => EventResult::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Event, Modifiers, PointerButton};
    use web_time::Instant;

    struct Source {
        rows: RefCell<Vec<usize>>,
        header: f32,
        log: RefCell<Vec<String>>,
    }

    impl Source {
        fn new(rows: &[usize]) -> Rc<Self> {
            Rc::new(Self {
                rows: RefCell::new(rows.to_vec()),
                header: 0.0,
                log: RefCell::new(Vec::new()),
            })
        }
    }

    impl TableDataSource for Source {
        fn number_of_sections(&self, _: &TableView) -> usize {
            self.rows.borrow().len()
        }
        fn number_of_rows(&self, _: &TableView, section: usize) -> usize {
            self.rows.borrow()[section]
        }
        fn cell_for_row(&self, tree: &mut ViewTree, table: &TableView, _: IndexPath) -> ViewId {
            table.reusable_cell(tree, "row", |_, _| {})
        }
        fn header_view_for_section(&self, tree: &mut ViewTree, _: &TableView, _: usize) -> Option<ViewId> {
            Some(tree.create_view(Rect::ZERO))
        }
    }

    impl ScrollDelegate for Source {}
    impl TableDelegate for Source {
        fn height_for_row(&self, _: &TableView, _: IndexPath) -> f32 {
            20.0
        }
        fn header_height_for_section(&self, _: &TableView, _: usize) -> f32 {
            self.header
        }
        fn did_select_row(&self, _: &mut ViewTree, _: &TableView, path: IndexPath) {
            self.log.borrow_mut().push(format!("select {path}"));
        }
        fn did_click_row(&self, _: &mut ViewTree, _: &TableView, path: IndexPath, clicks: u32) {
            self.log.borrow_mut().push(format!("click {path} x{clicks}"));
        }
        fn header_will_become_pinned(&self, _: &mut ViewTree, _: &TableView, s: usize) {
            self.log.borrow_mut().push(format!("pin {s}"));
        }
        fn header_will_become_unpinned(&self, _: &mut ViewTree, _: &TableView, s: usize) {
            self.log.borrow_mut().push(format!("unpin {s}"));
        }
    }

    fn table(height: f32, source: &Rc<Source>) -> (ViewTree, TableView) {
        let mut tree = ViewTree::new();
        let t = TableView::new(&mut tree, Rect::new(0.0, 0.0, 100.0, height));
        t.set_data_source(source);
        t.set_delegate(source);
        t.reload_data(&mut tree);
        (tree, t)
    }

    #[test]
    fn test_scrolling_recycles_cells_through_the_pool() {
        let src = Source::new(&[50]);
        let (mut tree, t) = table(100.0, &src);
        // 0..100 plus 20 lookahead: rows 0..=5
        assert_eq!(t.visible_cells().len(), 6);
        let first = t.cell_for_row(IndexPath::new(0, 0));

        t.scroll().set_content_offset(&mut tree, Vec2::new(0.0, 200.0), false);
        tree.layout_if_needed(t.view());
        let paths = t.index_paths_for_visible_rows();
        assert_eq!(paths.first(), Some(&IndexPath::new(0, 9)));
        assert_eq!(paths.last(), Some(&IndexPath::new(0, 15)));
        // no cell was built for rows that came from the pool
        assert_eq!(t.pooled_cell_count("row"), 0);
        let c = first.and_then(|c| t.cell_state(c));
        assert!(c.is_some_and(|c| c.index_path.is_some_and(|p| p.row >= 9)));
    }

    #[test]
    fn test_frames_follow_rows() {
        let src = Source::new(&[2, 2]);
        let (_tree, t) = table(200.0, &src);
        assert_eq!(t.rect_for_row(IndexPath::new(1, 1)), Some(Rect::new(0.0, 60.0, 100.0, 20.0)));
        assert_eq!(t.rect_for_section(1), Some(Rect::new(0.0, 40.0, 100.0, 40.0)));
        assert_eq!(t.index_path_for_row_at_point(Vec2::new(5.0, 45.0)), Some(IndexPath::new(1, 0)));
        assert_eq!(t.index_path_for_row_at_point(Vec2::new(500.0, 45.0)), None);
        assert_eq!(
            t.index_paths_for_rows_in_rect(Rect::new(0.0, 30.0, 10.0, 20.0)),
            vec![IndexPath::new(0, 1), IndexPath::new(1, 0)]
        );
        assert_eq!(t.index_path_for_last_row(), Some(IndexPath::new(1, 1)));
    }

    #[test]
    fn test_click_selects_then_clicks() {
        let src = Source::new(&[5]);
        let (mut tree, t) = table(100.0, &src);
        let host = tree.create_host(Size::new(100.0, 100.0));
        tree.set_host_root(host, Some(t.view()));
        let now = Instant::now();
        let down = PointerEvent::new(PointerEventKind::Down(PointerButton::Primary), Vec2::new(10.0, 25.0), now);
        tree.dispatch_event(host, Event::Pointer(down));
        let cell = t.cell_for_row(IndexPath::new(0, 1));
        assert!(cell.is_some_and(|c| t.is_cell_highlighted(c) && t.is_cell_selected(c)));

        let mut up = PointerEvent::new(PointerEventKind::Up(PointerButton::Primary), Vec2::new(10.0, 25.0), now);
        up.click_count = 2;
        tree.dispatch_event(host, Event::Pointer(up));
        assert!(cell.is_some_and(|c| !t.is_cell_highlighted(c)));
        assert_eq!(*src.log.borrow(), vec!["select (0, 1)", "click (0, 1) x2"]);
    }

    #[test]
    fn test_dragging_into_a_scroll_clears_highlight_and_click() {
        let src = Source::new(&[50]);
        let (mut tree, t) = table(100.0, &src);
        let host = tree.create_host(Size::new(100.0, 100.0));
        tree.set_host_root(host, Some(t.view()));
        let now = Instant::now();
        let at = |kind, y: f32| Event::Pointer(PointerEvent::new(kind, Vec2::new(10.0, y), now));

        tree.dispatch_event(host, at(PointerEventKind::Down(PointerButton::Primary), 25.0));
        let cell = t.cell_for_row(IndexPath::new(0, 1));
        assert!(cell.is_some_and(|c| t.is_cell_highlighted(c)));

        tree.dispatch_event(host, at(PointerEventKind::Dragged, 5.0));
        assert_eq!(t.scroll().content_offset().y, 20.0);
        assert!(cell.is_some_and(|c| !t.is_cell_highlighted(c) && t.is_cell_selected(c)));

        tree.dispatch_event(host, at(PointerEventKind::Up(PointerButton::Primary), 5.0));
        assert_eq!(*src.log.borrow(), vec!["select (0, 1)"]);
    }

    #[test]
    fn test_arrow_keys_walk_selection_across_sections() {
        let src = Source::new(&[1, 0, 2]);
        let (mut tree, t) = table(100.0, &src);
        let host = tree.create_host(Size::new(100.0, 100.0));
        tree.set_host_root(host, Some(t.view()));
        let key = |k| {
            Event::Key(KeyEvent {
                key: k,
                modifiers: Modifiers::default(),
                is_repeat: false,
                timestamp: Instant::now(),
            })
        };
        tree.dispatch_event(host, key(Key::ArrowDown));
        assert_eq!(t.index_path_for_selected_row(), Some(IndexPath::new(0, 0)));
        tree.dispatch_event(host, key(Key::ArrowDown));
        assert_eq!(t.index_path_for_selected_row(), Some(IndexPath::new(2, 0)));
        tree.dispatch_event(host, key(Key::ArrowUp));
        assert_eq!(t.index_path_for_selected_row(), Some(IndexPath::new(0, 0)));
        assert_eq!(tree.dispatch_event(host, key(Key::ArrowUp)), Some(t.view()));
        assert_eq!(t.index_path_for_selected_row(), Some(IndexPath::new(0, 0)));
    }

    #[test]
    fn test_scroll_to_row_positions() {
        let src = Source::new(&[50]);
        let (mut tree, t) = table(100.0, &src);
        let p = IndexPath::new(0, 20);
        t.scroll_to_row(&mut tree, p, ScrollPosition::Top, false);
        assert_eq!(t.scroll().content_offset().y, 400.0);
        t.scroll_to_row(&mut tree, p, ScrollPosition::Middle, false);
        assert_eq!(t.scroll().content_offset().y, 360.0);
        t.scroll_to_row(&mut tree, p, ScrollPosition::Bottom, false);
        assert_eq!(t.scroll().content_offset().y, 320.0);
        t.scroll_to_row(&mut tree, IndexPath::new(0, 0), ScrollPosition::None, false);
        assert_eq!(t.scroll().content_offset().y, 320.0);
        t.scroll_to_row(&mut tree, IndexPath::new(0, 30), ScrollPosition::ToVisible, false);
        assert_eq!(t.scroll().content_offset().y, 520.0);
        // out of range is a no-op
        t.scroll_to_row(&mut tree, IndexPath::new(3, 0), ScrollPosition::Top, false);
        assert_eq!(t.scroll().content_offset().y, 520.0);
    }

    #[test]
    fn test_header_pins_and_is_pushed_by_next_section() {
        let src = Rc::new(Source {
            header: 10.0,
            ..Rc::into_inner(Source::new(&[5, 5])).unwrap()
        });
        let (mut tree, t) = table(50.0, &src);
        let h0 = t.header_view_for_section(0).unwrap();
        assert_eq!(tree.frame(h0).y, 0.0);
        assert_eq!(t.pinned_header_section(), None);

        t.scroll().set_content_offset(&mut tree, Vec2::new(0.0, 30.0), false);
        tree.layout_if_needed(t.view());
        assert_eq!(t.pinned_header_section(), Some(0));
        assert_eq!(tree.frame(h0).y, 30.0);

        // section 0 spans 0..110; its header stops at 100
        t.scroll().set_content_offset(&mut tree, Vec2::new(0.0, 105.0), false);
        tree.layout_if_needed(t.view());
        assert_eq!(tree.frame(h0).y, 100.0);

        t.scroll().set_content_offset(&mut tree, Vec2::new(0.0, 120.0), false);
        tree.layout_if_needed(t.view());
        assert_eq!(t.pinned_header_section(), Some(1));
        assert_eq!(*src.log.borrow(), vec!["pin 0", "unpin 0", "pin 1"]);
    }

    #[test]
    fn test_pull_down_view_only_shows_when_pulled() {
        let src = Source::new(&[10]);
        let (mut tree, t) = table(100.0, &src);
        let pd = tree.create_view(Rect::new(0.0, 0.0, 100.0, 30.0));
        t.set_pull_down_view(&mut tree, Some(pd));
        assert!(!t.pull_down_view_is_visible(&tree));
        assert!(tree.is_hidden(pd));

        let now = Instant::now();
        t.scroll().begin_drag(&mut tree, now);
        t.scroll().drag_by(&mut tree, Vec2::new(0.0, -40.0), now);
        tree.layout_if_needed(t.view());
        assert!(t.pull_down_view_is_visible(&tree));
        assert!(!tree.is_hidden(pd));
        assert_eq!(tree.frame(pd), Rect::new(0.0, -30.0, 100.0, 30.0));
    }

    #[test]
    fn test_empty_identifier_cells_are_destroyed() {
        struct Fresh;
        impl TableDataSource for Fresh {
            fn number_of_rows(&self, _: &TableView, _: usize) -> usize {
                20
            }
            fn cell_for_row(&self, tree: &mut ViewTree, _: &TableView, _: IndexPath) -> ViewId {
                tree.create_view(Rect::ZERO)
            }
        }
        let mut tree = ViewTree::new();
        let t = TableView::new(&mut tree, Rect::new(0.0, 0.0, 100.0, 100.0));
        let src = Rc::new(Fresh);
        t.set_data_source(&src);
        t.reload_data(&mut tree);
        let first = t.cell_for_row(IndexPath::new(0, 0)).unwrap();
        // default row height 44: rows 0..=2 plus lookahead
        assert_eq!(t.visible_cells().len(), 3);
        t.scroll().set_content_offset(&mut tree, Vec2::new(0.0, 400.0), false);
        tree.layout_if_needed(t.view());
        assert!(!tree.contains(first));
        assert_eq!(t.pooled_cell_count(""), 0);
    }
}
