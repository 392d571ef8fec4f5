//! # View tree
//!
//! Views live in a `ViewTree` arena and are addressed by `ViewId`. A parent
//! owns the ordering of its children; the child's `parent` field is only a
//! lookup relation. Detaching a view (`remove_from_parent`) keeps it alive in
//! the arena so it can be re-added later (table cells rely on this); `destroy`
//! frees a detached subtree.
//!
//! Geometry follows the layer model: `bounds` (origin shifts the coordinate
//! space of the children, size is the view's size), `center` (in the parent's
//! coordinate space) and `transform` (applied about the center). `frame` is
//! derived from these.
//!
//! Nothing is drawn or laid out synchronously. `set_needs_display` and
//! `set_needs_layout` only queue work; the display cycle (`ViewTree::flush`)
//! performs it once per frame.

use std::rc::Rc;
use std::sync::Arc;

use bitflags::bitflags;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::animation::Animator;
use crate::control::Control;
use crate::display::BackgroundDrawer;
use crate::error::{Result, StrataError, recover, report_once};
use crate::render_api::{DrawContext, SurfaceId};
use crate::responder::Responder;
use crate::{Brush, Rect, Size, Transform, Vec2, density};

slotmap::new_key_type! {
    pub struct ViewId;
    pub struct HostId;
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ViewFlags: u32 {
        const USER_INTERACTION_DISABLED = 1 << 0;
        const HIDDEN = 1 << 1;
        const CLIPS_TO_BOUNDS = 1 << 2;
        const OPAQUE = 1 << 3;
        const CLEARS_CONTEXT_BEFORE_DRAWING = 1 << 4;
        const DRAW_IN_BACKGROUND = 1 << 5;
        const NEEDS_DISPLAY_WHEN_HOST_KEY_CHANGES = 1 << 6;
        const NEEDS_LAYOUT = 1 << 7;
        const QUEUED_LAYOUT = 1 << 8;
        const QUEUED_DISPLAY = 1 << 9;
        const QUEUED_COMPOSITE = 1 << 10;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Autoresizing: u8 {
        const FLEXIBLE_LEFT_MARGIN = 1 << 0;
        const FLEXIBLE_WIDTH = 1 << 1;
        const FLEXIBLE_RIGHT_MARGIN = 1 << 2;
        const FLEXIBLE_BOTTOM_MARGIN = 1 << 3;
        const FLEXIBLE_HEIGHT = 1 << 4;
        const FLEXIBLE_TOP_MARGIN = 1 << 5;
        const FLEXIBLE_SIZE = Self::FLEXIBLE_WIDTH.bits() | Self::FLEXIBLE_HEIGHT.bits();
    }
}

/// Lays out the children of a view; runs during the layout phase.
pub type LayoutFn = Rc<dyn Fn(&mut ViewTree, ViewId)>;
/// Computes a view's own frame; evaluated while its superview lays out.
pub type FrameFn = Rc<dyn Fn(&ViewTree, ViewId) -> Rect>;
pub type SizeFn = Rc<dyn Fn(&ViewTree, ViewId, Size) -> Size>;
pub type DrawFn = Rc<dyn Fn(&ViewTree, ViewId, &mut DrawContext)>;
/// Draw callback that may run on the drawing worker; it cannot see the tree.
pub type BackgroundDrawFn = Arc<dyn Fn(&mut DrawContext) + Send + Sync>;

#[derive(Clone)]
pub enum Drawing {
    Main(DrawFn),
    Background(BackgroundDrawFn),
}

/// Hierarchy notifications. All methods default to no-ops.
///
/// `will_*` hooks run before the structural change, `did_*` after. Hooks may
/// mutate the tree; the pending operation is re-validated afterwards and
/// dropped if it no longer makes sense.
#[allow(unused_variables)]
pub trait ViewHooks {
    fn will_move_to_superview(&self, tree: &mut ViewTree, this: ViewId, new_superview: Option<ViewId>) {}
    fn did_move_to_superview(&self, tree: &mut ViewTree, this: ViewId) {}
    fn did_add_subview(&self, tree: &mut ViewTree, this: ViewId, subview: ViewId) {}
    fn will_remove_subview(&self, tree: &mut ViewTree, this: ViewId, subview: ViewId) {}
    fn will_move_to_host(&self, tree: &mut ViewTree, this: ViewId, host: Option<HostId>) {}
    fn did_move_to_host(&self, tree: &mut ViewTree, this: ViewId) {}
    fn host_did_become_key(&self, tree: &mut ViewTree, this: ViewId) {}
    fn host_did_resign_key(&self, tree: &mut ViewTree, this: ViewId) {}
    /// Called on the main thread right before the view's content is produced.
    fn will_display_layer(&self, tree: &mut ViewTree, this: ViewId) {}
}

/// Backing-layer binding of a view.
#[derive(Clone, Debug)]
pub struct Layer {
    pub(crate) surface: Option<SurfaceId>,
    pub(crate) surface_size: Size,
    pub(crate) surface_scale: f32,
    pub(crate) background: Option<Brush>,
    pub(crate) alpha: f32,
    pub(crate) z_position: f32,
    /// Bumped on every content request; stale off-thread results are discarded.
    pub(crate) generation: u64,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            surface: None,
            surface_size: Size::ZERO,
            surface_scale: density().scale,
            background: None,
            alpha: 1.0,
            z_position: 0.0,
            generation: 0,
        }
    }
}

impl Layer {
    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }
}

pub(crate) struct Node {
    pub(crate) parent: Option<ViewId>,
    pub(crate) children: Vec<ViewId>,
    pub(crate) host: Option<HostId>,
    pub(crate) bounds: Rect,
    pub(crate) center: Vec2,
    pub(crate) transform: Transform,
    pub(crate) tag: i64,
    pub(crate) flags: ViewFlags,
    pub(crate) autoresizing: Autoresizing,
    pub(crate) layer: Layer,
    pub(crate) dirty: Option<Rect>,
    pub(crate) layout: Option<LayoutFn>,
    pub(crate) layout_frame: Option<FrameFn>,
    pub(crate) size_that_fits: Option<SizeFn>,
    pub(crate) drawing: Option<Drawing>,
    pub(crate) hooks: Option<Rc<dyn ViewHooks>>,
    pub(crate) responder: Option<Rc<dyn Responder>>,
    pub(crate) control: Option<Control>,
}

impl Node {
    fn new(frame: Rect) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            host: None,
            bounds: Rect::new(0.0, 0.0, frame.w, frame.h),
            center: frame.center(),
            transform: Transform::identity(),
            tag: 0,
            flags: ViewFlags::OPAQUE | ViewFlags::CLEARS_CONTEXT_BEFORE_DRAWING,
            autoresizing: Autoresizing::empty(),
            layer: Layer::default(),
            dirty: None,
            layout: None,
            layout_frame: None,
            size_that_fits: None,
            drawing: None,
            hooks: None,
            responder: None,
            control: None,
        }
    }

    pub(crate) fn has_content(&self) -> bool {
        self.drawing.is_some() || self.layer.background.is_some()
    }
}

/// A hosting surface (window) a root view is attached to.
#[derive(Clone, Debug)]
pub struct Host {
    pub root: Option<ViewId>,
    pub size: Size,
    pub key: bool,
}

pub struct ViewTree {
    pub(crate) nodes: SlotMap<ViewId, Node>,
    pub(crate) hosts: SlotMap<HostId, Host>,
    pub(crate) pending_layout: Vec<ViewId>,
    pub(crate) pending_display: Vec<ViewId>,
    pub(crate) pending_composite: Vec<ViewId>,
    pub(crate) released_surfaces: Vec<SurfaceId>,
    pub(crate) first_responder: Option<ViewId>,
    pub(crate) focus_generation: u64,
    pub(crate) tracking: Option<ViewId>,
    pub(crate) hover: Option<ViewId>,
    pub(crate) animators: Vec<Rc<dyn Animator>>,
    pub(crate) last_tick: Option<web_time::Instant>,
    pub(crate) background: Option<BackgroundDrawer>,
    pub(crate) cycles: u64,
}

impl Default for ViewTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewTree {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            hosts: SlotMap::with_key(),
            pending_layout: Vec::new(),
            pending_display: Vec::new(),
            pending_composite: Vec::new(),
            released_surfaces: Vec::new(),
            first_responder: None,
            focus_generation: 0,
            tracking: None,
            hover: None,
            animators: Vec::new(),
            last_tick: None,
            background: None,
            cycles: 0,
        }
    }

    pub fn create_view(&mut self, frame: Rect) -> ViewId {
        self.nodes.insert(Node::new(frame))
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn node(&self, id: ViewId) -> Result<&Node> {
        self.nodes.get(id).ok_or(StrataError::UnknownView(id))
    }

    pub(crate) fn node_mut(&mut self, id: ViewId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(StrataError::UnknownView(id))
    }

    /// Runs `f` against the node, reporting unknown ids once.
    fn with_node(&mut self, id: ViewId, f: impl FnOnce(&mut Node)) {
        match self.nodes.get_mut(id) {
            Some(n) => f(n),
            None => {
                report_once(&StrataError::UnknownView(id));
            }
        }
    }

    /// Frees a view and its whole subtree. The view is detached first.
    pub fn destroy(&mut self, id: ViewId) {
        if !self.contains(id) {
            report_once(&StrataError::UnknownView(id));
            return;
        }
        if self.parent(id).is_some() {
            self.remove_from_parent(id);
        }
        let mut stack = vec![id];
        while let Some(v) = stack.pop() {
            if let Some(node) = self.nodes.remove(v) {
                stack.extend(node.children);
                if let Some(s) = node.layer.surface {
                    self.released_surfaces.push(s);
                }
            }
        }
        log::trace!("destroyed view {id:?}");
    }

    // ----- hierarchy -----

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: ViewId) -> &[ViewId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Children in paint order (back to front): stable-sorted by z position.
    pub fn sorted_subviews(&self, id: ViewId) -> SmallVec<[ViewId; 8]> {
        let mut v: SmallVec<[ViewId; 8]> = self.children(id).iter().copied().collect();
        v.sort_by(|a, b| {
            let za = self.nodes.get(*a).map(|n| n.layer.z_position).unwrap_or(0.0);
            let zb = self.nodes.get(*b).map(|n| n.layer.z_position).unwrap_or(0.0);
            za.total_cmp(&zb)
        });
        v
    }

    /// Ancestors starting with `id` itself, ending at the root.
    pub fn ancestors(&self, id: ViewId) -> SmallVec<[ViewId; 16]> {
        let mut out = SmallVec::new();
        let mut cur = Some(id);
        while let Some(v) = cur {
            if !self.contains(v) || out.len() > self.nodes.len() {
                break;
            }
            out.push(v);
            cur = self.parent(v);
        }
        out
    }

    pub fn root_of(&self, id: ViewId) -> ViewId {
        self.ancestors(id).last().copied().unwrap_or(id)
    }

    /// True when `ancestor` is `id` or one of its superviews.
    pub fn is_descendant_of(&self, id: ViewId, ancestor: ViewId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// First view (including `id`) walking up that satisfies `pred`.
    pub fn ancestor_where(&self, id: ViewId, pred: impl Fn(&ViewTree, ViewId) -> bool) -> Option<ViewId> {
        self.ancestors(id).into_iter().find(|v| pred(self, *v))
    }

    pub fn depth(&self, id: ViewId) -> usize {
        self.ancestors(id).len().saturating_sub(1)
    }

    /// Depth-first search including `id`.
    pub fn view_with_tag(&self, id: ViewId, tag: i64) -> Option<ViewId> {
        let mut stack = vec![id];
        while let Some(v) = stack.pop() {
            let node = self.nodes.get(v)?;
            if node.tag == tag {
                return Some(v);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    pub fn deep_number_of_subviews(&self, id: ViewId) -> usize {
        self.children(id)
            .iter()
            .map(|c| 1 + self.deep_number_of_subviews(*c))
            .sum()
    }

    pub fn add_child(&mut self, parent: ViewId, child: ViewId) {
        let len = self.children(parent).len();
        recover(self.try_insert_child_at(parent, child, len), || ());
    }

    pub fn insert_child_at(&mut self, parent: ViewId, child: ViewId, index: usize) {
        recover(self.try_insert_child_at(parent, child, index), || ());
    }

    pub fn insert_child_below(&mut self, parent: ViewId, child: ViewId, sibling: ViewId) {
        let res = self
            .sibling_index(parent, sibling)
            .and_then(|i| self.try_insert_child_at(parent, child, i));
        recover(res, || ());
    }

    pub fn insert_child_above(&mut self, parent: ViewId, child: ViewId, sibling: ViewId) {
        let res = self
            .sibling_index(parent, sibling)
            .and_then(|i| self.try_insert_child_at(parent, child, i + 1));
        recover(res, || ());
    }

    fn sibling_index(&self, parent: ViewId, sibling: ViewId) -> Result<usize> {
        self.node(parent)?
            .children
            .iter()
            .position(|c| *c == sibling)
            .ok_or(StrataError::SiblingNotFound { parent, sibling })
    }

    pub fn bring_to_front(&mut self, parent: ViewId, child: ViewId) {
        let len = self.children(parent).len();
        recover(self.try_insert_child_at(parent, child, len), || ());
    }

    pub fn send_to_back(&mut self, parent: ViewId, child: ViewId) {
        recover(self.try_insert_child_at(parent, child, 0), || ());
    }

    fn validate_insert(&self, parent: ViewId, child: ViewId) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        if self.is_descendant_of(parent, child) {
            return Err(StrataError::HierarchyCycle { parent, child });
        }
        Ok(())
    }

    /// Inserts `child` at `index` (clamped) under `parent`, moving it from any
    /// previous superview. Re-inserting under the same parent only reorders.
    pub fn try_insert_child_at(&mut self, parent: ViewId, child: ViewId, index: usize) -> Result<()> {
        self.validate_insert(parent, child)?;

        if self.parent(child) == Some(parent) {
            let node = self.node_mut(parent)?;
            let Some(pos) = node.children.iter().position(|c| *c == child) else {
                return Ok(());
            };
            node.children.remove(pos);
            let index = if index > pos { index - 1 } else { index };
            node.children.insert(index.min(node.children.len()), child);
            self.queue_composite(child);
            return Ok(());
        }

        let old_parent = self.parent(child);
        let new_host = self.nodes.get(parent).and_then(|n| n.host);
        let old_host = self.nodes.get(child).and_then(|n| n.host);

        self.call_hooks(child, |h, t| h.will_move_to_superview(t, child, Some(parent)));
        if let Some(old) = old_parent {
            self.call_hooks(old, |h, t| h.will_remove_subview(t, old, child));
        }
        if old_host != new_host {
            self.notify_subtree(child, |h, t, v| h.will_move_to_host(t, v, new_host));
        }

        // hooks may have rearranged things
        self.validate_insert(parent, child)?;

        if let Some(old) = self.parent(child) {
            if let Some(n) = self.nodes.get_mut(old) {
                n.children.retain(|c| *c != child);
            }
            self.set_needs_display(old);
        }
        {
            let node = self.node_mut(parent)?;
            let index = index.min(node.children.len());
            node.children.insert(index, child);
        }
        self.node_mut(child)?.parent = Some(parent);
        self.set_subtree_host(child, new_host);

        log::trace!("inserted {child:?} into {parent:?} at {index}");

        self.call_hooks(child, |h, t| h.did_move_to_superview(t, child));
        self.call_hooks(parent, |h, t| h.did_add_subview(t, parent, child));
        if old_host != new_host {
            self.notify_subtree(child, |h, t, v| h.did_move_to_host(t, v));
        }

        self.set_needs_layout(parent);
        self.set_everything_needs_display(child);
        self.queue_composite(child);
        Ok(())
    }

    pub fn remove_from_parent(&mut self, child: ViewId) {
        recover(self.try_remove_from_parent(child), || ());
    }

    pub fn try_remove_from_parent(&mut self, child: ViewId) -> Result<()> {
        let parent = self
            .node(child)?
            .parent
            .ok_or(StrataError::NotInHierarchy(child))?;
        let had_host = self.nodes.get(child).and_then(|n| n.host).is_some();

        self.call_hooks(child, |h, t| h.will_move_to_superview(t, child, None));
        self.call_hooks(parent, |h, t| h.will_remove_subview(t, parent, child));
        if had_host {
            self.notify_subtree(child, |h, t, v| h.will_move_to_host(t, v, None));
        }

        // a hook may already have detached it
        let Some(parent) = self.parent(child) else {
            return Ok(());
        };

        if let Some(n) = self.nodes.get_mut(parent) {
            n.children.retain(|c| *c != child);
        }
        self.node_mut(child)?.parent = None;
        self.set_subtree_host(child, None);

        if let Some(fr) = self.first_responder
            && self.is_descendant_of(fr, child)
        {
            self.first_responder = None;
            self.focus_generation += 1;
        }
        if self.tracking.is_some_and(|t| self.is_descendant_of(t, child)) {
            self.tracking = None;
        }
        if self.hover.is_some_and(|t| self.is_descendant_of(t, child)) {
            self.hover = None;
        }

        log::trace!("removed {child:?} from {parent:?}");

        self.call_hooks(child, |h, t| h.did_move_to_superview(t, child));
        if had_host {
            self.notify_subtree(child, |h, t, v| h.did_move_to_host(t, v));
        }
        self.set_needs_display(parent);
        Ok(())
    }

    fn set_subtree_host(&mut self, id: ViewId, host: Option<HostId>) {
        let mut stack = vec![id];
        while let Some(v) = stack.pop() {
            if let Some(n) = self.nodes.get_mut(v) {
                n.host = host;
                stack.extend(n.children.iter().copied());
            }
        }
    }

    pub(crate) fn call_hooks(&mut self, id: ViewId, f: impl FnOnce(&dyn ViewHooks, &mut ViewTree)) {
        let hooks = self.nodes.get(id).and_then(|n| n.hooks.clone());
        if let Some(h) = hooks {
            f(h.as_ref(), self);
        }
    }

    /// Calls `f` for every view of the subtree, parents before children.
    pub(crate) fn notify_subtree(&mut self, id: ViewId, f: impl Fn(&dyn ViewHooks, &mut ViewTree, ViewId)) {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(v) = stack.pop() {
            order.push(v);
            stack.extend(self.children(v).iter().rev().copied());
        }
        for v in order {
            let hooks = self.nodes.get(v).and_then(|n| n.hooks.clone());
            if let Some(h) = hooks {
                f(h.as_ref(), self, v);
            }
        }
    }

    // ----- hosts -----

    pub fn create_host(&mut self, size: Size) -> HostId {
        self.hosts.insert(Host {
            root: None,
            size,
            key: false,
        })
    }

    pub fn host(&self, host: HostId) -> Option<&Host> {
        self.hosts.get(host)
    }

    pub fn host_of(&self, id: ViewId) -> Option<HostId> {
        self.nodes.get(id).and_then(|n| n.host)
    }

    /// Attaches a detached view as the host's root, replacing any previous root.
    pub fn set_host_root(&mut self, host: HostId, root: Option<ViewId>) {
        let Some(h) = self.hosts.get(host) else {
            log::warn!("set_host_root: unknown host {host:?}");
            return;
        };
        if let Some(r) = root
            && self.parent(r).is_some()
        {
            report_once(&StrataError::AlreadyDetached(format!(
                "host root {r:?} must not have a superview"
            )));
            return;
        }
        if let Some(old) = h.root {
            self.notify_subtree(old, |hk, t, v| hk.will_move_to_host(t, v, None));
            self.set_subtree_host(old, None);
            self.notify_subtree(old, |hk, t, v| hk.did_move_to_host(t, v));
        }
        if let Some(r) = root {
            self.notify_subtree(r, |hk, t, v| hk.will_move_to_host(t, v, Some(host)));
            self.set_subtree_host(r, Some(host));
            self.notify_subtree(r, |hk, t, v| hk.did_move_to_host(t, v));
            self.set_needs_layout(r);
            self.set_everything_needs_display(r);
        }
        if let Some(h) = self.hosts.get_mut(host) {
            h.root = root;
        }
    }

    pub fn host_root(&self, host: HostId) -> Option<ViewId> {
        self.hosts.get(host).and_then(|h| h.root)
    }

    pub fn is_host_key(&self, host: HostId) -> bool {
        self.hosts.get(host).is_some_and(|h| h.key)
    }

    pub fn set_host_key(&mut self, host: HostId, key: bool) {
        let Some(h) = self.hosts.get_mut(host) else {
            return;
        };
        if h.key == key {
            return;
        }
        h.key = key;
        let Some(root) = h.root else {
            return;
        };
        self.notify_subtree(root, |hk, t, v| {
            if key {
                hk.host_did_become_key(t, v)
            } else {
                hk.host_did_resign_key(t, v)
            }
        });
        let mut stack = vec![root];
        while let Some(v) = stack.pop() {
            let (flag, is_control) = match self.nodes.get(v) {
                Some(n) => (
                    n.flags.contains(ViewFlags::NEEDS_DISPLAY_WHEN_HOST_KEY_CHANGES),
                    n.control.is_some(),
                ),
                None => continue,
            };
            if flag || is_control {
                self.set_needs_display(v);
            }
            stack.extend(self.children(v).iter().copied());
        }
    }

    // ----- geometry -----

    pub fn bounds(&self, id: ViewId) -> Rect {
        self.nodes.get(id).map(|n| n.bounds).unwrap_or_default()
    }

    pub fn center(&self, id: ViewId) -> Vec2 {
        self.nodes.get(id).map(|n| n.center).unwrap_or_default()
    }

    pub fn transform(&self, id: ViewId) -> Transform {
        self.nodes.get(id).map(|n| n.transform).unwrap_or_default()
    }

    /// Frame in the superview's coordinate space (bounding box when transformed).
    pub fn frame(&self, id: ViewId) -> Rect {
        let Some(n) = self.nodes.get(id) else {
            return Rect::ZERO;
        };
        let local = Rect::new(-n.bounds.w / 2.0, -n.bounds.h / 2.0, n.bounds.w, n.bounds.h);
        n.transform.apply_to_rect(local).offset(n.center)
    }

    pub fn set_frame(&mut self, id: ViewId, frame: Rect) {
        let Some(n) = self.nodes.get(id) else {
            report_once(&StrataError::UnknownView(id));
            return;
        };
        if !n.transform.is_identity() {
            report_once(&StrataError::FrameWithTransform(id));
        }
        let old = n.bounds.size();
        if let Some(n) = self.nodes.get_mut(id) {
            n.center = frame.center();
            n.bounds.w = frame.w;
            n.bounds.h = frame.h;
        }
        self.queue_composite(id);
        self.size_changed(id, old);
    }

    pub fn set_bounds(&mut self, id: ViewId, bounds: Rect) {
        let Some(n) = self.nodes.get_mut(id) else {
            report_once(&StrataError::UnknownView(id));
            return;
        };
        let old = n.bounds;
        n.bounds = bounds;
        if old.origin() != bounds.origin() {
            self.bounds_origin_changed(id);
        }
        self.queue_composite(id);
        self.size_changed(id, old.size());
    }

    /// Shifts the coordinate space of the children (scroll offset).
    pub fn set_bounds_origin(&mut self, id: ViewId, origin: Vec2) {
        let b = self.bounds(id);
        if b.origin() != origin {
            self.set_bounds(id, Rect::from_origin_size(origin, b.size()));
        }
    }

    pub fn set_center(&mut self, id: ViewId, center: Vec2) {
        self.with_node(id, |n| n.center = center);
        self.queue_composite(id);
    }

    pub fn set_transform(&mut self, id: ViewId, transform: Transform) {
        self.with_node(id, |n| n.transform = transform);
        self.queue_composite(id);
    }

    fn bounds_origin_changed(&mut self, id: ViewId) {
        for c in self.children(id).to_vec() {
            self.queue_composite(c);
        }
    }

    fn size_changed(&mut self, id: ViewId, old: Size) {
        let new = self.bounds(id).size();
        if new == old {
            return;
        }
        for c in self.children(id).to_vec() {
            self.autoresize(c, old, new);
        }
        self.set_needs_layout(id);
        if self.nodes.get(id).is_some_and(|n| n.has_content()) {
            self.set_needs_display(id);
        }
    }

    /// Distributes the superview's size delta equally among the flexible parts.
    fn autoresize(&mut self, id: ViewId, old_parent: Size, new_parent: Size) {
        let Some(n) = self.nodes.get(id) else {
            return;
        };
        let mask = n.autoresizing;
        if mask.is_empty() {
            return;
        }
        let mut f = self.frame(id);

        let dw = new_parent.width - old_parent.width;
        let parts = [
            mask.contains(Autoresizing::FLEXIBLE_LEFT_MARGIN),
            mask.contains(Autoresizing::FLEXIBLE_WIDTH),
            mask.contains(Autoresizing::FLEXIBLE_RIGHT_MARGIN),
        ];
        let n_flex = parts.iter().filter(|p| **p).count();
        if n_flex > 0 && dw != 0.0 {
            let share = dw / n_flex as f32;
            if parts[0] {
                f.x += share;
            }
            if parts[1] {
                f.w = (f.w + share).max(0.0);
            }
        }

        let dh = new_parent.height - old_parent.height;
        let parts = [
            mask.contains(Autoresizing::FLEXIBLE_TOP_MARGIN),
            mask.contains(Autoresizing::FLEXIBLE_HEIGHT),
            mask.contains(Autoresizing::FLEXIBLE_BOTTOM_MARGIN),
        ];
        let n_flex = parts.iter().filter(|p| **p).count();
        if n_flex > 0 && dh != 0.0 {
            let share = dh / n_flex as f32;
            if parts[0] {
                f.y += share;
            }
            if parts[1] {
                f.h = (f.h + share).max(0.0);
            }
        }
        self.set_frame(id, f);
    }

    pub fn set_autoresizing(&mut self, id: ViewId, mask: Autoresizing) {
        self.with_node(id, |n| n.autoresizing = mask);
    }

    pub fn size_that_fits(&self, id: ViewId, size: Size) -> Size {
        match self.nodes.get(id).and_then(|n| n.size_that_fits.clone()) {
            Some(f) => f(self, id, size),
            None => self.bounds(id).size(),
        }
    }

    pub fn size_to_fit(&mut self, id: ViewId) {
        let b = self.bounds(id);
        let s = self.size_that_fits(id, b.size());
        let f = self.frame(id);
        self.set_frame(id, Rect::new(f.x, f.y, s.width, s.height));
    }

    pub fn set_size_that_fits(&mut self, id: ViewId, f: impl Fn(&ViewTree, ViewId, Size) -> Size + 'static) {
        self.with_node(id, |n| n.size_that_fits = Some(Rc::new(f)));
    }

    // ----- coordinate conversion -----

    /// Local point of `id` → its superview's coordinate space.
    pub fn to_superview(&self, id: ViewId, p: Vec2) -> Vec2 {
        let Some(n) = self.nodes.get(id) else {
            return p;
        };
        let b = n.bounds;
        let rel = Vec2::new(p.x - b.x - b.w / 2.0, p.y - b.y - b.h / 2.0);
        n.transform.apply_to_point(rel) + n.center
    }

    /// Superview point → local coordinates of `id`.
    pub fn from_superview(&self, id: ViewId, p: Vec2) -> Vec2 {
        let Some(n) = self.nodes.get(id) else {
            return p;
        };
        let b = n.bounds;
        let inv = n.transform.invert().unwrap_or_default();
        let rel = inv.apply_to_point(p - n.center);
        Vec2::new(rel.x + b.x + b.w / 2.0, rel.y + b.y + b.h / 2.0)
    }

    /// Converts `p` from `from`'s space into `to`'s space. `to == None` means
    /// host coordinates (the root's superview space).
    pub fn try_convert_point(&self, p: Vec2, from: ViewId, to: Option<ViewId>) -> Result<Vec2> {
        self.node(from)?;
        let up = self.ancestors(from);
        let Some(to) = to else {
            return Ok(up.iter().fold(p, |acc, v| self.to_superview(*v, acc)));
        };
        self.node(to)?;
        let down = self.ancestors(to);
        let common = up
            .iter()
            .position(|v| down.contains(v))
            .ok_or(StrataError::NoCommonAncestor(from, to))?;
        let common_id = up[common];
        let mut q = up[..common]
            .iter()
            .fold(p, |acc, v| self.to_superview(*v, acc));
        let split = down.iter().position(|v| *v == common_id).unwrap_or(down.len());
        for v in down[..split].iter().rev() {
            q = self.from_superview(*v, q);
        }
        Ok(q)
    }

    /// Like `try_convert_point`, but unrelated views log once and return `p` unchanged.
    pub fn convert_point(&self, p: Vec2, from: ViewId, to: Option<ViewId>) -> Vec2 {
        recover(self.try_convert_point(p, from, to), || p)
    }

    /// Converts host coordinates into `to`'s local space.
    pub fn convert_point_from_host(&self, p: Vec2, to: ViewId) -> Vec2 {
        self.ancestors(to)
            .iter()
            .rev()
            .fold(p, |acc, v| self.from_superview(*v, acc))
    }

    pub fn try_convert_rect(&self, r: Rect, from: ViewId, to: Option<ViewId>) -> Result<Rect> {
        let corners = [
            Vec2::new(r.x, r.y),
            Vec2::new(r.max_x(), r.y),
            Vec2::new(r.x, r.max_y()),
            Vec2::new(r.max_x(), r.max_y()),
        ];
        let mut out: Option<Rect> = None;
        for c in corners {
            let q = self.try_convert_point(c, from, to)?;
            let pt = Rect::new(q.x, q.y, 0.0, 0.0);
            out = Some(match out {
                None => pt,
                Some(acc) => {
                    let x = acc.x.min(pt.x);
                    let y = acc.y.min(pt.y);
                    Rect::new(x, y, acc.max_x().max(pt.x) - x, acc.max_y().max(pt.y) - y)
                }
            });
        }
        Ok(out.unwrap_or(r))
    }

    pub fn convert_rect(&self, r: Rect, from: ViewId, to: Option<ViewId>) -> Rect {
        recover(self.try_convert_rect(r, from, to), || r)
    }

    // ----- hit testing -----

    pub fn point_inside(&self, id: ViewId, p: Vec2) -> bool {
        match self.nodes.get(id).and_then(|n| n.responder.clone()) {
            Some(r) => r.point_inside(self, id, p),
            None => self.bounds(id).contains(p),
        }
    }

    fn accepts_hits(&self, id: ViewId) -> bool {
        self.nodes.get(id).is_some_and(|n| {
            !n.flags
                .intersects(ViewFlags::HIDDEN | ViewFlags::USER_INTERACTION_DISABLED)
                && n.layer.alpha > 0.01
        })
    }

    /// Deepest interactive view under `p` (in `id`'s local space), testing
    /// children front to back.
    pub fn hit_test(&self, id: ViewId, p: Vec2) -> Option<ViewId> {
        if !self.accepts_hits(id) || !self.point_inside(id, p) {
            return None;
        }
        for child in self.sorted_subviews(id).iter().rev() {
            let cp = self.from_superview(*child, p);
            if let Some(hit) = self.hit_test(*child, cp) {
                return Some(hit);
            }
        }
        Some(id)
    }

    /// Hit test from host coordinates.
    pub fn hit_test_host(&self, host: HostId, p: Vec2) -> Option<ViewId> {
        let root = self.host_root(host)?;
        let local = self.from_superview(root, p);
        self.hit_test(root, local)
    }

    // ----- flags & attributes -----

    pub fn flags(&self, id: ViewId) -> ViewFlags {
        self.nodes.get(id).map(|n| n.flags).unwrap_or_default()
    }

    fn set_flag(&mut self, id: ViewId, flag: ViewFlags, on: bool) {
        self.with_node(id, |n| n.flags.set(flag, on));
    }

    pub fn is_user_interaction_enabled(&self, id: ViewId) -> bool {
        !self.flags(id).contains(ViewFlags::USER_INTERACTION_DISABLED)
    }

    pub fn set_user_interaction_enabled(&mut self, id: ViewId, enabled: bool) {
        self.set_flag(id, ViewFlags::USER_INTERACTION_DISABLED, !enabled);
    }

    pub fn is_hidden(&self, id: ViewId) -> bool {
        self.flags(id).contains(ViewFlags::HIDDEN)
    }

    pub fn set_hidden(&mut self, id: ViewId, hidden: bool) {
        if self.is_hidden(id) == hidden {
            return;
        }
        self.set_flag(id, ViewFlags::HIDDEN, hidden);
        self.queue_composite(id);
        if !hidden {
            self.set_needs_display(id);
        }
    }

    pub fn clips_to_bounds(&self, id: ViewId) -> bool {
        self.flags(id).contains(ViewFlags::CLIPS_TO_BOUNDS)
    }

    pub fn set_clips_to_bounds(&mut self, id: ViewId, clips: bool) {
        self.set_flag(id, ViewFlags::CLIPS_TO_BOUNDS, clips);
        self.queue_composite(id);
    }

    pub fn is_opaque(&self, id: ViewId) -> bool {
        self.flags(id).contains(ViewFlags::OPAQUE)
    }

    pub fn set_opaque(&mut self, id: ViewId, opaque: bool) {
        self.set_flag(id, ViewFlags::OPAQUE, opaque);
    }

    pub fn set_clears_context_before_drawing(&mut self, id: ViewId, clears: bool) {
        self.set_flag(id, ViewFlags::CLEARS_CONTEXT_BEFORE_DRAWING, clears);
    }

    pub fn set_needs_display_when_host_key_changes(&mut self, id: ViewId, on: bool) {
        self.set_flag(id, ViewFlags::NEEDS_DISPLAY_WHEN_HOST_KEY_CHANGES, on);
    }

    pub fn draws_in_background(&self, id: ViewId) -> bool {
        self.flags(id).contains(ViewFlags::DRAW_IN_BACKGROUND)
    }

    pub fn set_draws_in_background(&mut self, id: ViewId, on: bool) {
        self.set_flag(id, ViewFlags::DRAW_IN_BACKGROUND, on);
    }

    pub fn tag(&self, id: ViewId) -> i64 {
        self.nodes.get(id).map(|n| n.tag).unwrap_or(0)
    }

    pub fn set_tag(&mut self, id: ViewId, tag: i64) {
        self.with_node(id, |n| n.tag = tag);
    }

    pub fn alpha(&self, id: ViewId) -> f32 {
        self.nodes.get(id).map(|n| n.layer.alpha).unwrap_or(1.0)
    }

    pub fn set_alpha(&mut self, id: ViewId, alpha: f32) {
        self.with_node(id, |n| n.layer.alpha = alpha.clamp(0.0, 1.0));
        self.queue_composite(id);
    }

    pub fn set_z_position(&mut self, id: ViewId, z: f32) {
        self.with_node(id, |n| n.layer.z_position = z);
        self.queue_composite(id);
    }

    pub fn background(&self, id: ViewId) -> Option<Brush> {
        self.nodes.get(id).and_then(|n| n.layer.background)
    }

    /// A translucent background also clears the opaque flag.
    pub fn set_background(&mut self, id: ViewId, brush: Option<Brush>) {
        self.with_node(id, |n| {
            n.layer.background = brush;
            if let Some(b) = brush
                && !b.is_opaque()
            {
                n.flags.remove(ViewFlags::OPAQUE);
            }
        });
        self.set_needs_display(id);
    }

    pub fn layer(&self, id: ViewId) -> Option<&Layer> {
        self.nodes.get(id).map(|n| &n.layer)
    }

    // ----- callbacks -----

    pub fn set_hooks(&mut self, id: ViewId, hooks: Rc<dyn ViewHooks>) {
        self.with_node(id, |n| n.hooks = Some(hooks));
    }

    pub fn set_responder(&mut self, id: ViewId, responder: Rc<dyn Responder>) {
        self.with_node(id, |n| n.responder = Some(responder));
    }

    pub fn responder(&self, id: ViewId) -> Option<Rc<dyn Responder>> {
        self.nodes.get(id).and_then(|n| n.responder.clone())
    }

    pub fn set_layout(&mut self, id: ViewId, f: impl Fn(&mut ViewTree, ViewId) + 'static) {
        self.with_node(id, |n| n.layout = Some(Rc::new(f)));
        self.set_needs_layout(id);
    }

    /// The view computes its own frame whenever its superview lays out.
    pub fn set_layout_frame(&mut self, id: ViewId, f: impl Fn(&ViewTree, ViewId) -> Rect + 'static) {
        self.with_node(id, |n| n.layout_frame = Some(Rc::new(f)));
        if let Some(p) = self.parent(id) {
            self.set_needs_layout(p);
        }
    }

    pub fn set_draw(&mut self, id: ViewId, f: impl Fn(&ViewTree, ViewId, &mut DrawContext) + 'static) {
        self.with_node(id, |n| n.drawing = Some(Drawing::Main(Rc::new(f))));
        self.set_needs_display(id);
    }

    /// Draw callback eligible for the drawing worker (see `set_draws_in_background`).
    pub fn set_background_draw(&mut self, id: ViewId, f: impl Fn(&mut DrawContext) + Send + Sync + 'static) {
        self.with_node(id, |n| n.drawing = Some(Drawing::Background(Arc::new(f))));
        self.set_needs_display(id);
    }

    // ----- invalidation -----

    pub fn set_needs_display(&mut self, id: ViewId) {
        let b = self.bounds(id);
        self.set_needs_display_in_rect(id, b);
    }

    /// Merges `rect` (bounds space) into the pending dirty region.
    pub fn set_needs_display_in_rect(&mut self, id: ViewId, rect: Rect) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        n.dirty = Some(match n.dirty {
            Some(d) => d.union(&rect),
            None => rect,
        });
        n.layer.generation += 1;
        if !n.flags.contains(ViewFlags::QUEUED_DISPLAY) {
            n.flags.insert(ViewFlags::QUEUED_DISPLAY);
            self.pending_display.push(id);
        }
    }

    pub fn set_everything_needs_display(&mut self, id: ViewId) {
        let mut stack = vec![id];
        while let Some(v) = stack.pop() {
            self.set_needs_display(v);
            stack.extend(self.children(v).iter().copied());
        }
    }

    pub fn needs_display(&self, id: ViewId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.dirty.is_some())
    }

    pub fn dirty_rect(&self, id: ViewId) -> Option<Rect> {
        self.nodes.get(id).and_then(|n| n.dirty)
    }

    pub(crate) fn queue_composite(&mut self, id: ViewId) {
        if let Some(n) = self.nodes.get_mut(id)
            && !n.flags.contains(ViewFlags::QUEUED_COMPOSITE)
        {
            n.flags.insert(ViewFlags::QUEUED_COMPOSITE);
            self.pending_composite.push(id);
        }
    }

    /// Requests a layout pass at the next cycle; calls coalesce.
    pub fn set_needs_layout(&mut self, id: ViewId) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        n.flags.insert(ViewFlags::NEEDS_LAYOUT);
        if !n.flags.contains(ViewFlags::QUEUED_LAYOUT) {
            n.flags.insert(ViewFlags::QUEUED_LAYOUT);
            self.pending_layout.push(id);
        }
    }

    pub fn needs_layout(&self, id: ViewId) -> bool {
        self.flags(id).contains(ViewFlags::NEEDS_LAYOUT)
    }

    /// Immediately lays out `id` (if it needs it) and then every descendant that needs it.
    pub fn layout_if_needed(&mut self, id: ViewId) {
        let mut stack = vec![id];
        while let Some(v) = stack.pop() {
            if self.needs_layout(v) {
                self.perform_layout(v);
            }
            stack.extend(self.children(v).iter().rev().copied());
        }
    }

    /// Runs the child frame callbacks, then the view's own layout callback.
    pub(crate) fn perform_layout(&mut self, id: ViewId) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        n.flags.remove(ViewFlags::NEEDS_LAYOUT);
        let layout = n.layout.clone();

        for c in self.children(id).to_vec() {
            let frame_fn = self.nodes.get(c).and_then(|n| n.layout_frame.clone());
            if let Some(f) = frame_fn {
                let frame = f(self, c);
                if frame != self.frame(c) {
                    self.set_frame(c, frame);
                }
            }
        }
        if let Some(f) = layout {
            f(self, id);
        }
        log::trace!("laid out {id:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn tree_with(frames: &[Rect]) -> (ViewTree, Vec<ViewId>) {
        let mut t = ViewTree::new();
        let ids = frames.iter().map(|f| t.create_view(*f)).collect();
        (t, ids)
    }

    #[test]
    fn insert_orders_children() {
        let (mut t, v) = tree_with(&[Rect::new(0.0, 0.0, 100.0, 100.0); 5]);
        let (root, a, b, c, d) = (v[0], v[1], v[2], v[3], v[4]);
        t.add_child(root, a);
        t.add_child(root, b);
        t.insert_child_at(root, c, 0);
        t.insert_child_above(root, d, a);
        assert_eq!(t.children(root), &[c, a, d, b]);
        t.bring_to_front(root, c);
        assert_eq!(t.children(root), &[a, d, b, c]);
        t.send_to_back(root, b);
        assert_eq!(t.children(root), &[b, a, d, c]);
    }

    #[test]
    fn moving_between_parents_unlinks_old() {
        let (mut t, v) = tree_with(&[Rect::new(0.0, 0.0, 10.0, 10.0); 3]);
        t.add_child(v[0], v[2]);
        t.add_child(v[1], v[2]);
        assert!(t.children(v[0]).is_empty());
        assert_eq!(t.parent(v[2]), Some(v[1]));
    }

    #[test]
    fn cycle_rejected() {
        let (mut t, v) = tree_with(&[Rect::new(0.0, 0.0, 10.0, 10.0); 2]);
        t.add_child(v[0], v[1]);
        assert!(matches!(
            t.try_insert_child_at(v[1], v[0], 0),
            Err(StrataError::HierarchyCycle { .. })
        ));
        assert!(matches!(
            t.try_insert_child_at(v[0], v[0], 0),
            Err(StrataError::HierarchyCycle { .. })
        ));
    }

    #[test]
    fn double_remove_is_reported_not_fatal() {
        let (mut t, v) = tree_with(&[Rect::new(0.0, 0.0, 10.0, 10.0); 2]);
        t.add_child(v[0], v[1]);
        t.remove_from_parent(v[1]);
        assert_eq!(
            t.try_remove_from_parent(v[1]),
            Err(StrataError::NotInHierarchy(v[1]))
        );
        t.remove_from_parent(v[1]);
        assert!(t.contains(v[1]));
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl ViewHooks for Recorder {
        fn will_move_to_superview(&self, t: &mut ViewTree, this: ViewId, new: Option<ViewId>) {
            self.0.borrow_mut().push(format!(
                "will_move:{}->{}",
                t.tag(this),
                new.map(|p| t.tag(p)).unwrap_or(-1)
            ));
        }
        fn did_move_to_superview(&self, t: &mut ViewTree, this: ViewId) {
            let p = t.parent(this).map(|p| t.tag(p)).unwrap_or(-1);
            self.0.borrow_mut().push(format!("did_move:{}->{}", t.tag(this), p));
        }
        fn did_add_subview(&self, t: &mut ViewTree, this: ViewId, sub: ViewId) {
            self.0
                .borrow_mut()
                .push(format!("did_add:{}+{}", t.tag(this), t.tag(sub)));
        }
        fn will_remove_subview(&self, t: &mut ViewTree, this: ViewId, sub: ViewId) {
            assert!(t.children(this).contains(&sub));
            self.0
                .borrow_mut()
                .push(format!("will_remove:{}-{}", t.tag(this), t.tag(sub)));
        }
    }

    #[test]
    fn hooks_fire_around_mutation() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (mut t, v) = tree_with(&[Rect::new(0.0, 0.0, 10.0, 10.0); 3]);
        for (i, id) in v.iter().enumerate() {
            t.set_tag(*id, i as i64);
            t.set_hooks(*id, Rc::new(Recorder(log.clone())));
        }
        t.add_child(v[0], v[2]);
        t.add_child(v[1], v[2]);
        assert_eq!(
            *log.borrow(),
            vec![
                "will_move:2->0",
                "did_move:2->0",
                "did_add:0+2",
                "will_move:2->1",
                "will_remove:0-2",
                "did_move:2->1",
                "did_add:1+2",
            ]
        );
    }

    #[test]
    fn hit_test_front_to_back_and_skips_disabled() {
        let mut t = ViewTree::new();
        let root = t.create_view(Rect::new(0.0, 0.0, 100.0, 100.0));
        let back = t.create_view(Rect::new(0.0, 0.0, 50.0, 50.0));
        let front = t.create_view(Rect::new(25.0, 25.0, 50.0, 50.0));
        let inner = t.create_view(Rect::new(0.0, 0.0, 10.0, 10.0));
        t.add_child(root, back);
        t.add_child(root, front);
        t.add_child(front, inner);

        assert_eq!(t.hit_test(root, Vec2::new(30.0, 30.0)), Some(inner));
        assert_eq!(t.hit_test(root, Vec2::new(40.0, 40.0)), Some(front));
        assert_eq!(t.hit_test(root, Vec2::new(10.0, 10.0)), Some(back));
        assert_eq!(t.hit_test(root, Vec2::new(90.0, 10.0)), Some(root));
        assert_eq!(t.hit_test(root, Vec2::new(200.0, 10.0)), None);

        t.set_user_interaction_enabled(front, false);
        assert_eq!(t.hit_test(root, Vec2::new(30.0, 30.0)), Some(back));
        assert_eq!(t.hit_test(root, Vec2::new(60.0, 60.0)), Some(root));
    }

    #[test]
    fn conversion_through_bounds_origin_and_transform() {
        let mut t = ViewTree::new();
        let root = t.create_view(Rect::new(0.0, 0.0, 200.0, 200.0));
        let scroller = t.create_view(Rect::new(10.0, 10.0, 100.0, 100.0));
        let child = t.create_view(Rect::new(0.0, 50.0, 20.0, 20.0));
        t.add_child(root, scroller);
        t.add_child(scroller, child);
        t.set_bounds_origin(scroller, Vec2::new(0.0, 40.0));

        let p = t.convert_point(Vec2::new(0.0, 0.0), child, Some(root));
        assert_eq!(p, Vec2::new(10.0, 20.0));
        let back = t.convert_point(p, root, Some(child));
        assert_eq!(back, Vec2::ZERO);

        let scaled = t.create_view(Rect::new(100.0, 100.0, 20.0, 20.0));
        t.add_child(root, scaled);
        t.set_transform(scaled, Transform::scale(2.0, 2.0));
        assert_eq!(t.frame(scaled), Rect::new(90.0, 90.0, 40.0, 40.0));
        let q = t.convert_point(Vec2::new(0.0, 0.0), scaled, Some(root));
        assert_eq!(q, Vec2::new(90.0, 90.0));
    }

    #[test]
    fn unrelated_conversion_is_identity() {
        let (t, v) = tree_with(&[Rect::new(5.0, 5.0, 10.0, 10.0); 2]);
        let p = Vec2::new(3.0, 4.0);
        assert!(matches!(
            t.try_convert_point(p, v[0], Some(v[1])),
            Err(StrataError::NoCommonAncestor(..))
        ));
        assert_eq!(t.convert_point(p, v[0], Some(v[1])), p);
    }

    #[test]
    fn autoresizing_flexible_width() {
        let mut t = ViewTree::new();
        let root = t.create_view(Rect::new(0.0, 0.0, 100.0, 100.0));
        let bar = t.create_view(Rect::new(10.0, 0.0, 80.0, 20.0));
        t.add_child(root, bar);
        t.set_autoresizing(bar, Autoresizing::FLEXIBLE_WIDTH);
        t.set_frame(root, Rect::new(0.0, 0.0, 150.0, 100.0));
        assert_eq!(t.frame(bar), Rect::new(10.0, 0.0, 130.0, 20.0));
    }

    #[test]
    fn tag_search_and_counts() {
        let (mut t, v) = tree_with(&[Rect::new(0.0, 0.0, 10.0, 10.0); 4]);
        t.add_child(v[0], v[1]);
        t.add_child(v[1], v[2]);
        t.add_child(v[0], v[3]);
        t.set_tag(v[2], 7);
        assert_eq!(t.view_with_tag(v[0], 7), Some(v[2]));
        assert_eq!(t.view_with_tag(v[3], 7), None);
        assert_eq!(t.deep_number_of_subviews(v[0]), 3);
        assert!(t.is_descendant_of(v[2], v[0]));
        assert!(t.is_descendant_of(v[2], v[2]));
        assert!(!t.is_descendant_of(v[0], v[2]));
    }

    #[test]
    fn layout_if_needed_runs_frame_callbacks_then_layout() {
        let mut t = ViewTree::new();
        let root = t.create_view(Rect::new(0.0, 0.0, 100.0, 100.0));
        let child = t.create_view(Rect::ZERO);
        t.add_child(root, child);
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        t.set_layout_frame(child, move |t, c| {
            o.borrow_mut().push("frame");
            let b = t.bounds(t.parent(c).unwrap());
            Rect::new(0.0, 0.0, b.w / 2.0, b.h)
        });
        let o = order.clone();
        t.set_layout(root, move |t, v| {
            o.borrow_mut().push("layout");
            assert_eq!(t.frame(t.children(v)[0]).w, 50.0);
        });
        t.layout_if_needed(root);
        assert_eq!(*order.borrow(), vec!["frame", "layout"]);
        assert!(!t.needs_layout(root));
        t.layout_if_needed(root);
        assert_eq!(order.borrow().len(), 2);
    }

    #[test]
    fn destroy_frees_subtree() {
        let (mut t, v) = tree_with(&[Rect::new(0.0, 0.0, 10.0, 10.0); 3]);
        t.add_child(v[0], v[1]);
        t.add_child(v[1], v[2]);
        t.destroy(v[1]);
        assert!(!t.contains(v[1]) && !t.contains(v[2]));
        assert!(t.children(v[0]).is_empty());
    }
}
