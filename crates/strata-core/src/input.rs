//! Input events as delivered by the host's event source.
//!
//! Locations are in host (root view) coordinates; the tree converts them to
//! local coordinates before handing them to responders.

use web_time::Instant;

use crate::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Tertiary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEventKind {
    Down(PointerButton),
    Dragged,
    Up(PointerButton),
    Moved,
    Entered,
    Exited,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool, // Cmd on Mac
}

#[derive(Clone, Debug)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub location: Vec2,
    pub modifiers: Modifiers,
    pub click_count: u32,
    pub timestamp: Instant,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, location: Vec2, timestamp: Instant) -> Self {
        Self {
            kind,
            location,
            modifiers: Modifiers::default(),
            click_count: 1,
            timestamp,
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self.kind, PointerEventKind::Down(_))
    }

    pub fn is_up(&self) -> bool {
        matches!(self.kind, PointerEventKind::Up(_))
    }
}

/// Trackpad gesture phase; `None` for classic wheel mice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollPhase {
    Began,
    Changed,
    Ended,
    Cancelled,
    /// Host-generated momentum; the engine produces its own throw and ignores these.
    Momentum,
}

#[derive(Clone, Debug)]
pub struct ScrollWheelEvent {
    pub location: Vec2,
    /// Content delta in points (positive y scrolls content up, revealing lower rows).
    pub delta: Vec2,
    pub phase: Option<ScrollPhase>,
    /// True for line-based wheels where `delta` counts lines.
    pub line_based: bool,
    pub modifiers: Modifiers,
    pub timestamp: Instant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Character(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Escape,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    PageUp,
    PageDown,
    Space,
}

#[derive(Clone, Debug)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    pub is_repeat: bool,
    pub timestamp: Instant,
}

#[derive(Clone, Debug)]
pub enum ImeEvent {
    /// Marked (composing) text updated; `selection` is a char range within `text`.
    Preedit {
        text: String,
        selection: Option<(usize, usize)>,
    },
    Commit(String),
    Cancel,
}

#[derive(Clone, Debug)]
pub enum Event {
    Pointer(PointerEvent),
    ScrollWheel(ScrollWheelEvent),
    Key(KeyEvent),
    Text(String),
    Ime(ImeEvent),
}

impl Event {
    pub fn location(&self) -> Option<Vec2> {
        match self {
            Event::Pointer(p) => Some(p.location),
            Event::ScrollWheel(s) => Some(s.location),
            _ => None,
        }
    }
}
