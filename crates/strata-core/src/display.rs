//! # Display cycle
//!
//! One `flush` per frame, in this order:
//!
//! 1. commit off-thread drawings that finished since the last cycle;
//! 2. pending layouts, shallowest views first;
//! 3. content for views with a dirty region (surface allocated or resized on
//!    demand, only the dirty rect is rasterized);
//! 4. composite: place every changed surface in its nearest ancestor surface.
//!
//! Views flagged `DRAW_IN_BACKGROUND` with a `Send` draw callback are drawn on
//! a worker thread; the result is committed by a later cycle, and dropped if
//! the view was invalidated again in the meantime.

use std::rc::Rc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use web_time::{Duration, Instant};

use crate::animation::Animator;
use crate::render_api::{DisplayList, DrawContext, LayerPlacement, RenderProvider};
use crate::view::{BackgroundDrawFn, Drawing, ViewFlags};
use crate::{Rect, Size, Vec2, ViewId, ViewTree};

const MAX_LAYOUT_PASSES: usize = 8;

/// What a cycle did; mostly useful for tests and tracing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    pub layouts: Vec<ViewId>,
    /// Views drawn on the main thread, with the rect that was redrawn.
    pub draws: Vec<(ViewId, Rect)>,
    pub background_submitted: Vec<ViewId>,
    pub background_committed: Vec<ViewId>,
    pub composited: Vec<ViewId>,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
            && self.draws.is_empty()
            && self.background_submitted.is_empty()
            && self.background_committed.is_empty()
            && self.composited.is_empty()
    }
}

struct DrawJob {
    view: ViewId,
    generation: u64,
    bounds: Rect,
    dirty: Rect,
    draw: BackgroundDrawFn,
    prelude: DisplayList,
}

struct DrawResult {
    view: ViewId,
    generation: u64,
    dirty: Rect,
    list: DisplayList,
}

pub(crate) struct BackgroundDrawer {
    jobs: Sender<DrawJob>,
    results: Receiver<DrawResult>,
    in_flight: usize,
}

impl BackgroundDrawer {
    fn spawn() -> Option<Self> {
        let (job_tx, job_rx) = unbounded::<DrawJob>();
        let (res_tx, res_rx) = unbounded::<DrawResult>();
        let spawned = thread::Builder::new()
            .name("strata-draw".into())
            .spawn(move || {
                for job in job_rx.iter() {
                    let mut ctx = DrawContext::new(job.bounds, job.dirty);
                    for cmd in job.prelude {
                        ctx.push(cmd);
                    }
                    (job.draw)(&mut ctx);
                    let res = DrawResult {
                        view: job.view,
                        generation: job.generation,
                        dirty: job.dirty,
                        list: ctx.finish(),
                    };
                    if res_tx.send(res).is_err() {
                        break;
                    }
                }
            });
        match spawned {
            Ok(_) => Some(Self {
                jobs: job_tx,
                results: res_rx,
                in_flight: 0,
            }),
            Err(e) => {
                log::warn!("could not start drawing worker, drawing inline: {e}");
                None
            }
        }
    }
}

impl ViewTree {
    pub fn needs_flush(&self) -> bool {
        !self.pending_layout.is_empty()
            || !self.pending_display.is_empty()
            || !self.pending_composite.is_empty()
            || !self.released_surfaces.is_empty()
            || self.background.as_ref().is_some_and(|b| b.in_flight > 0)
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    /// Runs one display cycle against `provider`.
    pub fn flush(&mut self, provider: &mut dyn RenderProvider) -> CycleReport {
        let mut report = CycleReport::default();
        self.cycles += 1;

        for s in self.released_surfaces.drain(..) {
            provider.release_surface(s);
        }

        self.commit_background(provider, &mut report, None);
        self.layout_phase(&mut report);
        self.display_phase(provider, &mut report);
        self.composite_phase(provider, &mut report);

        if !report.is_empty() {
            log::trace!(
                "cycle {}: {} layouts, {} draws, {} composites",
                self.cycles,
                report.layouts.len(),
                report.draws.len(),
                report.composited.len()
            );
        }
        report
    }

    /// Blocks until every off-thread drawing has come back (or `timeout`
    /// passed), committing the results.
    pub fn finish_background_draws(&mut self, provider: &mut dyn RenderProvider, timeout: Duration) -> CycleReport {
        let mut report = CycleReport::default();
        self.commit_background(provider, &mut report, Some(timeout));
        self.composite_phase(provider, &mut report);
        report
    }

    /// Draws `id` right away if it has a pending dirty region, bypassing the
    /// cycle for that one view. Layout is not run.
    pub fn redraw(&mut self, id: ViewId, provider: &mut dyn RenderProvider) -> CycleReport {
        let mut report = CycleReport::default();
        if !self.needs_display(id) {
            return report;
        }
        let Some(pos) = self.pending_display.iter().position(|v| *v == id) else {
            return report;
        };
        self.pending_display.swap_remove(pos);
        let rest = std::mem::replace(&mut self.pending_display, vec![id]);
        self.display_phase(provider, &mut report);
        self.pending_display.extend(rest);
        report
    }

    fn layout_phase(&mut self, report: &mut CycleReport) {
        for pass in 0.. {
            if self.pending_layout.is_empty() {
                break;
            }
            if pass == MAX_LAYOUT_PASSES {
                log::warn!(
                    "layout did not settle after {MAX_LAYOUT_PASSES} passes; {} views deferred",
                    self.pending_layout.len()
                );
                break;
            }
            let mut batch = std::mem::take(&mut self.pending_layout);
            batch.retain(|v| self.contains(*v));
            for v in &batch {
                if let Some(n) = self.nodes.get_mut(*v) {
                    n.flags.remove(ViewFlags::QUEUED_LAYOUT);
                }
            }
            batch.sort_by_key(|v| self.depth(*v));
            for v in batch {
                if self.needs_layout(v) {
                    self.perform_layout(v);
                    report.layouts.push(v);
                }
            }
        }
    }

    fn display_phase(&mut self, provider: &mut dyn RenderProvider, report: &mut CycleReport) {
        let batch = std::mem::take(&mut self.pending_display);
        for v in batch {
            let Some(n) = self.nodes.get_mut(v) else {
                continue;
            };
            n.flags.remove(ViewFlags::QUEUED_DISPLAY);
            if !n.has_content() {
                n.dirty = None;
                continue;
            }
            // hidden views keep their dirty region until shown
            if n.flags.contains(ViewFlags::HIDDEN) {
                continue;
            }
            let Some(dirty) = n.dirty.take() else {
                continue;
            };
            let bounds = n.bounds;
            let Some(dirty) = dirty.intersection(&bounds) else {
                continue;
            };

            self.call_hooks(v, |h, t| h.will_display_layer(t, v));
            if !self.contains(v) {
                continue;
            }
            self.ensure_surface(v, provider);

            let prelude = self.content_prelude(v, bounds, dirty);
            let drawing = self.nodes.get(v).and_then(|n| n.drawing.clone());
            let generation = self.nodes.get(v).map(|n| n.layer.generation).unwrap_or(0);

            if let Some(Drawing::Background(f)) = &drawing
                && self.draws_in_background(v)
                && self.submit_background(v, generation, bounds, dirty, f.clone(), prelude.clone())
            {
                report.background_submitted.push(v);
                continue;
            }

            let mut ctx = DrawContext::new(bounds, dirty);
            for cmd in prelude {
                ctx.push(cmd);
            }
            match drawing {
                Some(Drawing::Main(f)) => f(self, v, &mut ctx),
                Some(Drawing::Background(f)) => f(&mut ctx),
                None => {}
            }
            let list = ctx.finish();
            if let Some(surface) = self.nodes.get(v).and_then(|n| n.layer.surface) {
                provider.rasterize(surface, self.surface_rect(v, dirty), &list);
            }
            report.draws.push((v, dirty));
            self.queue_composite(v);
        }
    }

    /// Commands emitted before the view's own drawing: clear and background fill.
    fn content_prelude(&self, v: ViewId, bounds: Rect, dirty: Rect) -> DisplayList {
        let mut ctx = DrawContext::new(bounds, dirty);
        if let Some(bg) = self.background(v) {
            ctx.fill_rect(bounds, bg);
        }
        ctx.finish()
    }

    /// Dirty rect in surface coordinates (bounds origin removed).
    fn surface_rect(&self, v: ViewId, r: Rect) -> Rect {
        let b = self.bounds(v);
        r.offset(Vec2::new(-b.x, -b.y))
    }

    fn ensure_surface(&mut self, v: ViewId, provider: &mut dyn RenderProvider) {
        let opaque = self.is_opaque(v);
        let Some(n) = self.nodes.get_mut(v) else {
            return;
        };
        let size = Size::new(n.bounds.w.max(1.0), n.bounds.h.max(1.0));
        match n.layer.surface {
            None => {
                n.layer.surface = Some(provider.allocate_surface(size, n.layer.surface_scale, opaque));
                n.layer.surface_size = size;
            }
            Some(s) if n.layer.surface_size != size => {
                provider.resize_surface(s, size, n.layer.surface_scale);
                n.layer.surface_size = size;
            }
            Some(_) => {}
        }
    }

    fn submit_background(
        &mut self,
        view: ViewId,
        generation: u64,
        bounds: Rect,
        dirty: Rect,
        draw: BackgroundDrawFn,
        prelude: DisplayList,
    ) -> bool {
        if self.background.is_none() {
            self.background = BackgroundDrawer::spawn();
        }
        let Some(bg) = self.background.as_mut() else {
            return false;
        };
        let job = DrawJob {
            view,
            generation,
            bounds,
            dirty,
            draw,
            prelude,
        };
        if bg.jobs.send(job).is_err() {
            log::warn!("drawing worker is gone, drawing inline");
            self.background = None;
            return false;
        }
        bg.in_flight += 1;
        true
    }

    fn commit_background(&mut self, provider: &mut dyn RenderProvider, report: &mut CycleReport, wait: Option<Duration>) {
        let Some(bg) = self.background.as_mut() else {
            return;
        };
        let deadline = wait.map(|w| Instant::now() + w);
        let mut results = Vec::new();
        while bg.in_flight > 0 {
            let res = match deadline {
                None => bg.results.try_recv().ok(),
                Some(d) => {
                    let left = d.saturating_duration_since(Instant::now());
                    bg.results.recv_timeout(left).ok()
                }
            };
            let Some(res) = res else {
                break;
            };
            bg.in_flight -= 1;
            results.push(res);
        }
        for res in results {
            let current = self.nodes.get(res.view).map(|n| (n.layer.generation, n.layer.surface));
            match current {
                Some((generation, Some(surface))) if generation == res.generation => {
                    provider.rasterize(surface, self.surface_rect(res.view, res.dirty), &res.list);
                    report.background_committed.push(res.view);
                    self.queue_composite(res.view);
                }
                _ => log::trace!("discarding stale background drawing for {:?}", res.view),
            }
        }
    }

    fn composite_phase(&mut self, provider: &mut dyn RenderProvider, report: &mut CycleReport) {
        let mut batch = std::mem::take(&mut self.pending_composite);
        batch.retain(|v| self.contains(*v));
        batch.sort_by_key(|v| self.depth(*v));
        for v in batch {
            if let Some(n) = self.nodes.get_mut(v) {
                n.flags.remove(ViewFlags::QUEUED_COMPOSITE);
            }
            // a moved view without content still moves the surfaces beneath it
            let targets = self.surfaces_at_or_below(v);
            for t in targets {
                if report.composited.contains(&t) {
                    continue;
                }
                let Some(surface) = self.nodes.get(t).and_then(|n| n.layer.surface) else {
                    continue;
                };
                let parent = self.surface_ancestor(t);
                let placement = self.placement(t, parent);
                let parent_surface = parent.and_then(|p| self.nodes.get(p)).and_then(|n| n.layer.surface);
                provider.composite(surface, parent_surface, &placement);
                report.composited.push(t);
            }
        }
    }

    /// `v` itself if it has a surface, otherwise the nearest surfaced descendants.
    fn surfaces_at_or_below(&self, v: ViewId) -> Vec<ViewId> {
        let mut out = Vec::new();
        let mut stack = vec![v];
        while let Some(x) = stack.pop() {
            match self.nodes.get(x) {
                Some(n) if n.layer.surface.is_some() => out.push(x),
                Some(n) => stack.extend(n.children.iter().copied()),
                None => {}
            }
        }
        out
    }

    fn surface_ancestor(&self, v: ViewId) -> Option<ViewId> {
        self.ancestors(v)
            .into_iter()
            .skip(1)
            .find(|a| self.nodes.get(*a).is_some_and(|n| n.layer.surface.is_some()))
    }

    fn placement(&self, v: ViewId, parent: Option<ViewId>) -> LayerPlacement {
        let b = self.bounds(v);
        let center = self.convert_point(b.center(), v, parent);
        let hidden = self.ancestors(v).iter().any(|a| self.is_hidden(*a));
        let opacity = self
            .ancestors(v)
            .iter()
            .take_while(|a| Some(**a) != parent)
            .map(|a| self.alpha(*a))
            .product::<f32>();
        let parent_offset = parent
            .map(|p| self.bounds(p).origin())
            .unwrap_or(Vec2::ZERO);
        LayerPlacement {
            frame: Rect::new(center.x - b.w / 2.0, center.y - b.h / 2.0, b.w, b.h)
                .offset(-parent_offset),
            transform: self.transform(v),
            opacity,
            clips_to_bounds: self.clips_to_bounds(v),
            hidden,
        }
    }

    // ----- animators -----

    pub fn add_animator(&mut self, animator: Rc<dyn Animator>) {
        self.animators.push(animator);
    }

    pub fn has_animators(&self) -> bool {
        !self.animators.is_empty()
    }

    /// Timestamp of the most recent animator tick.
    pub fn last_tick(&self) -> Option<Instant> {
        self.last_tick
    }

    /// Advances every running animator; settled ones are dropped. Returns
    /// whether any animator is still running.
    pub fn tick_animators(&mut self, now: Instant) -> bool {
        self.last_tick = Some(now);
        let running = std::mem::take(&mut self.animators);
        let mut keep: Vec<Rc<dyn Animator>> = running
            .into_iter()
            .filter(|a| a.tick(self, now))
            .collect();
        // animators started during the tick
        keep.append(&mut self.animators);
        self.animators = keep;
        !self.animators.is_empty()
    }

    /// Tick, then flush: what a host calls once per vsync.
    pub fn run_frame(&mut self, now: Instant, provider: &mut dyn RenderProvider) -> CycleReport {
        self.tick_animators(now);
        self.flush(provider)
    }
}
