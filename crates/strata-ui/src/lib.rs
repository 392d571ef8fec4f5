//! Scrolling, tables and text widgets on top of the Strata view tree.
//!
//! Every widget here is a cheap `Clone` handle around a [`ViewId`] plus the
//! state the tree itself does not track. The view owns the behaviour through
//! its draw, layout and responder callbacks, which hold the handle weakly, so
//! dropping every handle leaves a plain view behind.
//!
//! ```rust
//! use strata_core::*;
//! use strata_ui::ScrollView;
//!
//! let mut tree = ViewTree::new();
//! let scroll = ScrollView::new(&mut tree, Rect::new(0.0, 0.0, 100.0, 100.0));
//! scroll.set_content_size(&mut tree, Size::new(100.0, 1000.0));
//! scroll.scroll_to_bottom(&mut tree, false);
//! assert_eq!(scroll.content_offset().y, 900.0);
//! ```
//!
//! [`ViewId`]: strata_core::ViewId

pub mod button;
pub mod label;
pub mod scroll;
pub mod table;
pub mod tests;
pub mod text_view;

pub use button::Button;
pub use label::Label;
pub use scroll::{Axis, IndicatorVisibility, ScrollDelegate, ScrollState, ScrollView, WeakScrollView};
pub use table::{CellBehavior, IndexPath, ScrollPosition, TableDataSource, TableDelegate, TableView};
pub use text_view::TextView;
