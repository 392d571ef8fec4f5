//! Attributed text: storage, layout, rendering and editing.
//!
//! Shaping is delegated to a [`TextShaper`]. [`CosmicShaper`] uses
//! cosmic-text with the system fonts; [`FixedAdvanceShaper`] gives every
//! grapheme the same advance and is what headless hosts and tests use.
//!
//! ```rust
//! use std::rc::Rc;
//! use strata_core::Rect;
//! use strata_text::*;
//!
//! let mut r = TextRenderer::new(Rc::new(FixedAdvanceShaper::default()));
//! r.set_attributed_string(AttributedString::with_attributes(
//!     "hello",
//!     Attributes::new().font(Font::system(10.0)),
//! ));
//! r.set_frame(Rect::new(0.0, 0.0, 100.0, 20.0));
//! assert_eq!(r.size().width, 25.0);
//! ```

use std::rc::Rc;

pub mod attributed;
pub mod cosmic;
pub mod editor;
pub mod layout;
pub mod renderer;
pub mod shaping;

pub use attributed::{
    AttributedString, Attributes, BackgroundFill, Font, LineBreakMode, PreDrawHook, Run, TextAlignment,
};
pub use cosmic::CosmicShaper;
pub use editor::TextEditor;
pub use layout::{Cluster, LayoutLine, TextLayout};
pub use renderer::{SelectionAffinity, TextRenderer, VerticalAlignment};
pub use shaping::{FixedAdvanceShaper, TextShaper};

/// The cosmic-text shaper, shared behind an `Rc` the way renderers hold it.
pub fn default_shaper() -> Rc<dyn TextShaper> {
    Rc::new(CosmicShaper)
}
