use std::cell::{Cell, RefCell};
use std::rc::Rc;

use strata_core::{Rect, Responder, Size, Vec2, ViewId, ViewTree};
use strata_ui::scroll::ScrollDelegate;
use strata_ui::table::*;

type Log = Rc<RefCell<Vec<String>>>;

struct Recorder {
    log: Log,
}

impl CellBehavior for Recorder {
    fn prepare_for_reuse(&self, _: &mut ViewTree, cell: ViewId) {
        self.log.borrow_mut().push(format!("reuse {cell:?}"));
    }

    fn set_selected(&self, _: &mut ViewTree, cell: ViewId, selected: bool, _: bool) {
        self.log.borrow_mut().push(format!("selected {cell:?} {selected}"));
    }
}

struct Focusable;

impl Responder for Focusable {
    fn accepts_first_responder(&self, _: &ViewTree, _: ViewId) -> bool {
        true
    }
}

struct Rows {
    sections: Vec<usize>,
    height: Cell<f32>,
    log: Log,
}

impl Rows {
    fn new(sections: &[usize], height: f32) -> Rc<Self> {
        Rc::new(Self {
            sections: sections.to_vec(),
            height: Cell::new(height),
            log: Rc::default(),
        })
    }
}

impl TableDataSource for Rows {
    fn number_of_sections(&self, _: &TableView) -> usize {
        self.sections.len()
    }

    fn number_of_rows(&self, _: &TableView, section: usize) -> usize {
        self.sections[section]
    }

    fn cell_for_row(&self, tree: &mut ViewTree, table: &TableView, _: IndexPath) -> ViewId {
        let log = self.log.clone();
        table.reusable_cell(tree, "row", |tree, cell| {
            tree.set_responder(cell, Rc::new(Focusable));
            table.set_cell_behavior(cell, Rc::new(Recorder { log }));
        })
    }
}

impl ScrollDelegate for Rows {}

impl TableDelegate for Rows {
    fn height_for_row(&self, _: &TableView, _: IndexPath) -> f32 {
        self.height.get()
    }
}

fn table(tree: &mut ViewTree, rows: &Rc<Rows>, size: Size) -> TableView {
    let _ = env_logger::builder().is_test(true).try_init();
    let table = TableView::new(tree, Rect::from_origin_size(Vec2::ZERO, size));
    table.set_data_source(rows);
    table.set_delegate(rows);
    table.reload_data(tree);
    table
}

fn scroll_to(tree: &mut ViewTree, table: &TableView, y: f32) {
    table.scroll().set_content_offset(tree, Vec2::new(0.0, y), false);
    tree.layout_if_needed(table.view());
}

#[test]
fn visible_rows_include_the_lookahead_margin() {
    let mut tree = ViewTree::new();
    let rows = Rows::new(&[3, 3], 20.0);
    let table = table(&mut tree, &rows, Size::new(100.0, 45.0));
    assert_eq!(table.lookahead(), 20.0);
    assert_eq!(
        table.index_paths_for_visible_rows(),
        vec![
            IndexPath::new(0, 0),
            IndexPath::new(0, 1),
            IndexPath::new(0, 2),
            IndexPath::new(1, 0)
        ]
    );
    for path in table.index_paths_for_visible_rows() {
        let cell = table.cell_for_row(path);
        assert_eq!(cell.and_then(|c| table.index_path_for_cell(c)), Some(path));
        assert_eq!(cell.and_then(|c| tree.parent(c)), Some(table.view()));
    }
}

#[test]
fn selecting_a_row_deselects_the_previous_one_first() {
    let mut tree = ViewTree::new();
    let rows = Rows::new(&[3, 3], 20.0);
    let table = table(&mut tree, &rows, Size::new(100.0, 400.0));
    let first = table.cell_for_row(IndexPath::new(0, 0));
    let last = table.cell_for_row(IndexPath::new(1, 2));

    table.select_row(&mut tree, IndexPath::new(0, 0), false, ScrollPosition::None);
    rows.log.borrow_mut().clear();
    table.select_row(&mut tree, IndexPath::new(1, 2), false, ScrollPosition::None);

    let (Some(first), Some(last)) = (first, last) else {
        panic!("rows should be on screen");
    };
    assert_eq!(
        *rows.log.borrow(),
        vec![format!("selected {first:?} false"), format!("selected {last:?} true")]
    );
    assert!(!table.is_cell_selected(first));
    assert!(table.is_cell_selected(last));
    assert_eq!(table.index_path_for_selected_row(), Some(IndexPath::new(1, 2)));
}

#[test]
fn reloading_unchanged_data_keeps_every_cell() {
    let mut tree = ViewTree::new();
    let rows = Rows::new(&[10], 30.0);
    let table = table(&mut tree, &rows, Size::new(100.0, 90.0));
    scroll_to(&mut tree, &table, 75.0);
    let paths = table.index_paths_for_visible_rows();
    let cells = table.visible_cells();

    table.reload_data(&mut tree);
    assert_eq!(table.index_paths_for_visible_rows(), paths);
    assert_eq!(table.visible_cells(), cells);
    assert_eq!(table.pooled_cell_count("row"), 0);
}

#[test]
fn cells_leaving_the_screen_are_reset_before_reuse() {
    let mut tree = ViewTree::new();
    let rows = Rows::new(&[20], 30.0);
    let table = table(&mut tree, &rows, Size::new(100.0, 90.0));
    table.select_row(&mut tree, IndexPath::new(0, 0), false, ScrollPosition::None);
    let Some(cell) = table.cell_for_row(IndexPath::new(0, 0)) else {
        panic!("row 0 should be on screen");
    };
    assert!(table.is_cell_selected(cell));

    rows.log.borrow_mut().clear();
    scroll_to(&mut tree, &table, 300.0);
    assert!(rows.log.borrow().contains(&format!("reuse {cell:?}")));
    let state = table.cell_state(cell);
    let recycled_into = table.index_path_for_cell(cell);
    match recycled_into {
        // handed straight to a row coming on screen
        Some(path) => {
            assert_ne!(path, IndexPath::new(0, 0));
            assert!(!table.is_cell_selected(cell));
        }
        None => {
            assert!(state.is_some_and(|s| !s.selected && !s.highlighted));
            assert_eq!(tree.parent(cell), None);
        }
    }

    // the selection belongs to the row, not the cell
    scroll_to(&mut tree, &table, 0.0);
    let back = table.cell_for_row(IndexPath::new(0, 0));
    assert!(back.is_some_and(|c| table.is_cell_selected(c)));
}

#[test]
fn focused_row_regains_focus_after_reload() {
    let mut tree = ViewTree::new();
    let rows = Rows::new(&[10], 30.0);
    let table = table(&mut tree, &rows, Size::new(100.0, 90.0));
    let path = IndexPath::new(0, 1);
    let cell = table.cell_for_row(path);
    assert!(tree.make_first_responder(cell));

    table.reload_data(&mut tree);
    assert_eq!(tree.first_responder(), table.cell_for_row(path));
    assert_eq!(table.future_first_responder(), None);
}

#[test]
fn focus_waits_for_an_offscreen_row() {
    let mut tree = ViewTree::new();
    let rows = Rows::new(&[20], 30.0);
    let table = table(&mut tree, &rows, Size::new(100.0, 90.0));
    let path = IndexPath::new(0, 1);
    assert!(tree.make_first_responder(table.cell_for_row(path)));

    table.reload_data_maintaining_visible_index_path(&mut tree, IndexPath::new(0, 10), 0.0);
    assert_eq!(table.scroll().content_offset().y, 300.0);
    assert_eq!(tree.first_responder(), None);
    assert_eq!(table.future_first_responder(), Some(path));

    scroll_to(&mut tree, &table, 0.0);
    assert_eq!(tree.first_responder(), table.cell_for_row(path));
}

#[test]
fn pending_focus_is_dropped_once_focus_moves_elsewhere() {
    let mut tree = ViewTree::new();
    let rows = Rows::new(&[20], 30.0);
    let table = table(&mut tree, &rows, Size::new(100.0, 90.0));
    let field = tree.create_view(Rect::new(0.0, 0.0, 10.0, 10.0));
    tree.set_responder(field, Rc::new(Focusable));
    assert!(tree.make_first_responder(table.cell_for_row(IndexPath::new(0, 1))));

    table.reload_data_maintaining_visible_index_path(&mut tree, IndexPath::new(0, 10), 0.0);
    assert!(table.future_first_responder().is_some());
    assert!(tree.make_first_responder(Some(field)));

    scroll_to(&mut tree, &table, 0.0);
    assert_eq!(tree.first_responder(), Some(field));
    assert_eq!(table.future_first_responder(), None);
}

#[test]
fn resizing_keeps_the_first_visible_row_in_place() {
    let mut tree = ViewTree::new();
    let rows = Rows::new(&[20], 30.0);
    let table = table(&mut tree, &rows, Size::new(100.0, 90.0));
    scroll_to(&mut tree, &table, 100.0);
    assert_eq!(table.index_paths_for_visible_rows().first(), Some(&IndexPath::new(0, 2)));

    // narrower rows wrap, so every row doubles in height
    rows.height.set(60.0);
    tree.set_frame(table.view(), Rect::new(0.0, 0.0, 50.0, 90.0));
    tree.layout_if_needed(table.view());

    // row 3 started 10pt above the top edge and still does
    assert_eq!(table.scroll().content_size().height, 1200.0);
    assert_eq!(table.scroll().content_offset().y, 190.0);
    let frame = table.cell_for_row(IndexPath::new(0, 3)).map(|c| tree.frame(c));
    assert_eq!(frame, Some(Rect::new(0.0, 180.0, 50.0, 60.0)));
}
