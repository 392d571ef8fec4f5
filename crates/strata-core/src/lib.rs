//! # Views, layers and the display cycle
//!
//! Strata is a retained view tree backed by compositor surfaces. Every view
//! owns (lazily) one surface; drawing is recorded into a `DrawContext` and
//! rasterized by a `RenderProvider` only for the region that was invalidated.
//!
//! ```rust
//! use strata_core::*;
//!
//! let mut tree = ViewTree::new();
//! let root = tree.create_view(Rect::new(0.0, 0.0, 320.0, 240.0));
//! let badge = tree.create_view(Rect::new(10.0, 10.0, 40.0, 20.0));
//! tree.add_child(root, badge);
//! tree.set_draw(badge, |_, _, cx| {
//!     let b = cx.bounds();
//!     cx.fill_rounded_rect(b, Color::from_hex("#FF3B30"), 4.0);
//! });
//!
//! let mut provider = RecordingProvider::new();
//! let report = tree.flush(&mut provider);
//! assert_eq!(report.draws.len(), 1);
//!
//! // nothing changed: the next cycle is empty
//! assert!(tree.flush(&mut provider).draws.is_empty());
//! ```
//!
//! ## Invalidation
//!
//! - `set_needs_display` / `set_needs_display_in_rect` merge into one dirty
//!   region per view; many calls before a cycle produce one redraw.
//! - `set_needs_layout` is coalesced the same way; `layout_if_needed` forces
//!   a pass immediately.
//!
//! ## Events
//!
//! Hosts feed `Event`s to `ViewTree::dispatch_event`. Pointer events are hit
//! tested; keyboard and text events go to the first responder. Both bubble
//! up the responder chain.

pub mod animation;
pub mod color;
pub mod control;
pub mod display;
pub mod error;
pub mod geometry;
pub mod input;
pub mod locals;
pub mod render_api;
pub mod responder;
pub mod tests;
pub mod view;

pub use animation::{Animator, Clock, Easing, Interpolate, SystemClock, TestClock, Tween};
pub use color::*;
pub use control::{ActionFn, ControlEvents, ControlState};
pub use display::CycleReport;
pub use error::{Result, StrataError, recover, report_once};
pub use geometry::*;
pub use input::*;
pub use locals::*;
pub use render_api::*;
pub use responder::{EventResult, Responder};
pub use view::*;
