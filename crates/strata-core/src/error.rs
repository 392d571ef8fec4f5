//! Precondition violations.
//!
//! Tree operations come in two flavours: `try_*` returns a `StrataError`, and
//! the plain form reports the error once per kind (via `log`) and degrades to
//! a no-op or identity result. Nothing here ever panics the host.

use std::cell::RefCell;
use std::collections::HashSet;

use thiserror::Error;

use crate::ViewId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrataError {
    #[error("view {0:?} is not part of this tree")]
    UnknownView(ViewId),
    #[error("view {0:?} has no superview")]
    NotInHierarchy(ViewId),
    #[error("views {0:?} and {1:?} share no common ancestor")]
    NoCommonAncestor(ViewId, ViewId),
    #[error("adding {child:?} to {parent:?} would create a cycle")]
    HierarchyCycle { parent: ViewId, child: ViewId },
    #[error("{0} was already detached")]
    AlreadyDetached(String),
    #[error("{sibling:?} is not a subview of {parent:?}")]
    SiblingNotFound { parent: ViewId, sibling: ViewId },
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("frame set on {0:?} while it has a non-identity transform; use bounds and center")]
    FrameWithTransform(ViewId),
}

impl StrataError {
    /// Stable name used to de-duplicate reports.
    pub fn kind(&self) -> &'static str {
        match self {
            StrataError::UnknownView(_) => "unknown-view",
            StrataError::NotInHierarchy(_) => "not-in-hierarchy",
            StrataError::NoCommonAncestor(..) => "no-common-ancestor",
            StrataError::HierarchyCycle { .. } => "hierarchy-cycle",
            StrataError::AlreadyDetached(_) => "already-detached",
            StrataError::SiblingNotFound { .. } => "sibling-not-found",
            StrataError::IndexOutOfRange { .. } => "index-out-of-range",
            StrataError::FrameWithTransform(_) => "frame-with-transform",
        }
    }
}

thread_local! {
    static REPORTED: RefCell<HashSet<&'static str>> = RefCell::new(HashSet::new());
}

/// Logs `err` the first time its kind is seen on this thread. Returns whether it was logged.
pub fn report_once(err: &StrataError) -> bool {
    let first = REPORTED.with(|r| r.borrow_mut().insert(err.kind()));
    if first {
        log::warn!("strata precondition violated: {err}");
    } else {
        log::trace!("strata precondition violated again: {err}");
    }
    first
}

pub type Result<T, E = StrataError> = std::result::Result<T, E>;

/// Unwraps `res`, reporting the error once and falling back to `fallback`.
pub fn recover<T>(res: Result<T>, fallback: impl FnOnce() -> T) -> T {
    match res {
        Ok(v) => v,
        Err(e) => {
            report_once(&e);
            fallback()
        }
    }
}
