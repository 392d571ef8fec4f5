#[cfg(test)]
mod tests {
    use crate::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use web_time::{Duration, Instant};

    fn root_with_child() -> (ViewTree, ViewId, ViewId) {
        let mut t = ViewTree::new();
        let root = t.create_view(Rect::new(0.0, 0.0, 200.0, 200.0));
        let child = t.create_view(Rect::new(20.0, 20.0, 100.0, 50.0));
        t.add_child(root, child);
        (t, root, child)
    }

    #[test]
    fn test_dirty_rects_coalesce_into_one_draw() {
        let (mut t, _root, child) = root_with_child();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        t.set_draw(child, move |_, _, cx| {
            c.set(c.get() + 1);
            cx.fill_rect(cx.dirty_rect(), Color::BLACK);
        });
        let mut p = RecordingProvider::new();
        t.flush(&mut p);
        assert_eq!(calls.get(), 1);
        p.clear();

        t.set_needs_display_in_rect(child, Rect::new(0.0, 0.0, 10.0, 10.0));
        t.set_needs_display_in_rect(child, Rect::new(30.0, 5.0, 10.0, 10.0));
        let report = t.flush(&mut p);
        assert_eq!(calls.get(), 2);
        assert_eq!(report.draws, vec![(child, Rect::new(0.0, 0.0, 40.0, 15.0))]);
        let rasters: Vec<_> = p.rasterized().collect();
        assert_eq!(rasters.len(), 1);
        assert_eq!(rasters[0].1, Rect::new(0.0, 0.0, 40.0, 15.0));
    }

    #[test]
    fn test_path_with_gradient_reaches_the_provider() {
        let (mut t, _root, child) = root_with_child();
        let shape = Path::ellipse(Rect::new(0.0, 0.0, 100.0, 50.0));
        let gradient = Brush::Linear {
            start: Vec2::ZERO,
            end: Vec2::new(0.0, 1.0),
            start_color: Color::BLACK,
            end_color: Color::WHITE,
        };
        let s = shape.clone();
        t.set_draw(child, move |_, _, cx| cx.fill_path(&s, gradient));
        let mut p = RecordingProvider::new();
        t.flush(&mut p);
        let paths: Vec<_> = p
            .commands()
            .filter_map(|c| match c {
                DrawCommand::Path { path, brush, style } => Some((path.clone(), *brush, *style)),
                _ => None,
            })
            .collect();
        assert_eq!(paths, vec![(shape, gradient, PathStyle::Fill)]);
    }

    #[test]
    fn test_redraw_draws_one_view_now() {
        let (mut t, root, child) = root_with_child();
        t.set_background(root, Some(Color::WHITE.into()));
        t.set_draw(child, |_, _, _| {});
        let mut p = RecordingProvider::new();
        let report = t.redraw(child, &mut p);
        assert_eq!(report.draws.len(), 1);
        assert!(t.needs_display(root));
        assert!(!t.needs_display(child));
        let report = t.flush(&mut p);
        assert_eq!(report.draws.iter().map(|d| d.0).collect::<Vec<_>>(), vec![root]);
    }

    #[test]
    fn test_views_without_content_get_no_surface() {
        let (mut t, root, child) = root_with_child();
        t.set_background(child, Some(Color::WHITE.into()));
        let mut p = RecordingProvider::new();
        t.flush(&mut p);
        assert!(t.layer(root).and_then(|l| l.surface()).is_none());
        assert!(t.layer(child).and_then(|l| l.surface()).is_some());
    }

    #[test]
    fn test_resize_reallocates_surface_and_redraws() {
        let (mut t, _root, child) = root_with_child();
        t.set_draw(child, |_, _, _| {});
        let mut p = RecordingProvider::new();
        t.flush(&mut p);
        p.clear();
        t.set_frame(child, Rect::new(20.0, 20.0, 120.0, 50.0));
        let report = t.flush(&mut p);
        assert!(p
            .calls
            .iter()
            .any(|c| matches!(c, ProviderCall::Resize { size, .. } if size.width == 120.0)));
        assert_eq!(report.draws.len(), 1);
    }

    #[test]
    fn test_layout_runs_parents_first() {
        let (mut t, root, child) = root_with_child();
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        t.set_layout(child, move |_, v| o.borrow_mut().push(v));
        let o = order.clone();
        t.set_layout(root, move |_, v| o.borrow_mut().push(v));
        let mut p = RecordingProvider::new();
        let report = t.flush(&mut p);
        assert_eq!(*order.borrow(), vec![root, child]);
        assert_eq!(report.layouts, vec![root, child]);

        t.set_needs_layout(root);
        t.set_needs_layout(root);
        t.flush(&mut p);
        assert_eq!(order.borrow().len(), 3);
    }

    #[test]
    fn test_composite_places_child_in_parent_surface() {
        let (mut t, root, child) = root_with_child();
        t.set_background(root, Some(Color::WHITE.into()));
        t.set_background(child, Some(Color::BLACK.into()));
        let mut p = RecordingProvider::new();
        t.flush(&mut p);
        let root_surface = t.layer(root).and_then(|l| l.surface());
        let placed = p.calls.iter().find_map(|c| match c {
            ProviderCall::Composite { surface, parent, placement }
                if Some(*surface) == t.layer(child).and_then(|l| l.surface()) =>
            {
                Some((*parent, placement.frame))
            }
            _ => None,
        });
        assert_eq!(placed, Some((root_surface, Rect::new(20.0, 20.0, 100.0, 50.0))));
    }

    #[test]
    fn test_background_drawing_commits_on_main_cycle() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut t, _root, child) = root_with_child();
        t.set_draws_in_background(child, true);
        t.set_background_draw(child, |cx| {
            let b = cx.bounds();
            cx.fill_rect(b, Color::BLACK);
        });
        let mut p = RecordingProvider::new();
        let report = t.flush(&mut p);
        assert_eq!(report.background_submitted, vec![child]);
        assert!(report.draws.is_empty());

        let report = t.finish_background_draws(&mut p, Duration::from_secs(5));
        assert_eq!(report.background_committed, vec![child]);
        assert_eq!(p.lists.last().map(|(_, l)| l.len()), Some(1));
    }

    #[test]
    fn test_stale_background_result_is_discarded() {
        let (mut t, _root, child) = root_with_child();
        t.set_draws_in_background(child, true);
        t.set_background_draw(child, |_| {});
        let mut p = RecordingProvider::new();
        t.flush(&mut p);
        t.set_needs_display(child);
        let report = t.finish_background_draws(&mut p, Duration::from_secs(5));
        assert!(report.background_committed.is_empty());
    }

    struct Countdown(Cell<u32>);

    impl Animator for Countdown {
        fn tick(&self, _: &mut ViewTree, _: Instant) -> bool {
            self.0.set(self.0.get().saturating_sub(1));
            self.0.get() > 0
        }
    }

    #[test]
    fn test_animators_dropped_when_settled() {
        let mut t = ViewTree::new();
        let a = Rc::new(Countdown(Cell::new(2)));
        t.add_animator(a.clone());
        let now = Instant::now();
        assert!(t.tick_animators(now));
        assert!(!t.tick_animators(now + Duration::from_millis(16)));
        assert!(!t.has_animators());
    }

    #[test]
    fn test_host_key_change_redraws_flagged_views() {
        let (mut t, root, child) = root_with_child();
        t.set_draw(child, |_, _, _| {});
        t.set_needs_display_when_host_key_changes(child, true);
        let host = t.create_host(Size::new(200.0, 200.0));
        t.set_host_root(host, Some(root));
        let mut p = RecordingProvider::new();
        t.flush(&mut p);
        t.set_host_key(host, true);
        assert!(t.needs_display(child));
        assert!(!t.needs_display(root));
    }

    #[test]
    fn test_control_tracks_pointer_through_dispatch() {
        let (mut t, root, child) = root_with_child();
        let host = t.create_host(Size::new(200.0, 200.0));
        t.set_host_root(host, Some(root));
        t.make_control(child);
        let fired = Rc::new(RefCell::new(Vec::new()));
        let f = fired.clone();
        t.add_action(child, ControlEvents::ALL_TOUCH_EVENTS, move |_, _, ev| f.borrow_mut().push(ev));

        let now = Instant::now();
        let ev = |kind, x, y| Event::Pointer(PointerEvent::new(kind, Vec2::new(x, y), now));
        assert_eq!(
            t.dispatch_event(host, ev(PointerEventKind::Down(PointerButton::Primary), 30.0, 30.0)),
            Some(child)
        );
        assert!(t.is_highlighted(child));
        t.dispatch_event(host, ev(PointerEventKind::Dragged, 190.0, 190.0));
        assert!(!t.is_highlighted(child));
        t.dispatch_event(host, ev(PointerEventKind::Up(PointerButton::Primary), 190.0, 190.0));
        assert_eq!(
            *fired.borrow(),
            vec![ControlEvents::TOUCH_DOWN, ControlEvents::TOUCH_UP_OUTSIDE]
        );
    }
}
