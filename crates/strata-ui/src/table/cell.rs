//! Per-cell bookkeeping and the behaviour hooks a cell can supply.

use std::rc::Rc;

use strata_core::{ViewId, ViewTree};

use super::IndexPath;

/// Optional cell behaviour. The table has already updated its own state
/// (and requested a redraw) when these run.
#[allow(unused_variables)]
pub trait CellBehavior {
    /// The cell left the screen and was reset; drop any row-specific state.
    fn prepare_for_reuse(&self, tree: &mut ViewTree, cell: ViewId) {}

    /// Frame is set; the cell is about to appear.
    fn prepare_for_display(&self, tree: &mut ViewTree, cell: ViewId, path: IndexPath) {}

    fn set_selected(&self, tree: &mut ViewTree, cell: ViewId, selected: bool, animated: bool) {}

    fn set_highlighted(&self, tree: &mut ViewTree, cell: ViewId, highlighted: bool) {}
}

#[derive(Clone, Default)]
pub struct CellState {
    pub reuse_identifier: String,
    pub highlighted: bool,
    pub selected: bool,
    /// `None` while pooled.
    pub index_path: Option<IndexPath>,
    pub behavior: Option<Rc<dyn CellBehavior>>,
}

impl CellState {
    pub fn new(reuse_identifier: &str) -> Self {
        Self {
            reuse_identifier: reuse_identifier.to_owned(),
            ..Default::default()
        }
    }

    /// Cells without an identifier are destroyed rather than pooled.
    pub fn is_reusable(&self) -> bool {
        !self.reuse_identifier.is_empty()
    }

    /// Clears everything tied to the row the cell last showed.
    pub fn reset(&mut self) {
        self.highlighted = false;
        self.selected = false;
        self.index_path = None;
    }
}

impl std::fmt::Debug for CellState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellState")
            .field("reuse_identifier", &self.reuse_identifier)
            .field("highlighted", &self.highlighted)
            .field("selected", &self.selected)
            .field("index_path", &self.index_path)
            .field("behavior", &self.behavior.is_some())
            .finish()
    }
}
