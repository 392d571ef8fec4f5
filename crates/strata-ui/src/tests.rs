#[cfg(test)]
mod tests {
    use crate::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use strata_core::*;
    use strata_text::{Attributes, FixedAdvanceShaper, Font};
    use web_time::Instant;

    fn scroll_in_host(tree: &mut ViewTree) -> (HostId, ScrollView) {
        let host = tree.create_host(Size::new(200.0, 100.0));
        let scroll = ScrollView::new(tree, Rect::new(0.0, 0.0, 200.0, 100.0));
        scroll.set_content_size(tree, Size::new(200.0, 1000.0));
        tree.set_host_root(host, Some(scroll.view()));
        (host, scroll)
    }

    fn wheel(location: Vec2, dy: f32) -> Event {
        Event::ScrollWheel(ScrollWheelEvent {
            location,
            delta: Vec2::new(0.0, dy),
            phase: None,
            line_based: false,
            modifiers: Modifiers::default(),
            timestamp: Instant::now(),
        })
    }

    #[test]
    fn test_wheel_over_label_scrolls_enclosing_view() {
        let mut tree = ViewTree::new();
        let (host, scroll) = scroll_in_host(&mut tree);
        let label = Label::with_shaper(
            &mut tree,
            Rect::new(0.0, 0.0, 200.0, 20.0),
            Rc::new(FixedAdvanceShaper::default()),
        );
        label.set_text(&mut tree, "row");
        tree.add_child(scroll.view(), label.view());

        let handler = tree.dispatch_event(host, wheel(Vec2::new(10.0, 10.0), 50.0));
        assert_eq!(handler, Some(scroll.view()));
        assert_eq!(scroll.content_offset().y, 50.0);
    }

    #[test]
    fn test_button_in_scrolled_content_hit_tests_through_offset() {
        let mut tree = ViewTree::new();
        let (host, scroll) = scroll_in_host(&mut tree);
        let button = Button::with_shaper(
            &mut tree,
            Rect::new(0.0, 120.0, 80.0, 30.0),
            Rc::new(FixedAdvanceShaper::default()),
        );
        tree.add_child(scroll.view(), button.view());
        let taps = Rc::new(Cell::new(0));
        let t = taps.clone();
        button.add_action(&mut tree, ControlEvents::TOUCH_UP_INSIDE, move |_, _, _| t.set(t.get() + 1));

        scroll.set_content_offset(&mut tree, Vec2::new(0.0, 100.0), false);
        let at = |kind| Event::Pointer(PointerEvent::new(kind, Vec2::new(10.0, 25.0), Instant::now()));
        assert_eq!(
            tree.dispatch_event(host, at(PointerEventKind::Down(PointerButton::Primary))),
            Some(button.view())
        );
        tree.dispatch_event(host, at(PointerEventKind::Up(PointerButton::Primary)));
        assert_eq!(taps.get(), 1);
        // the button consumed the press, so nothing scrolled
        assert_eq!(scroll.content_offset().y, 100.0);
    }

    struct OneEditor {
        editor: std::cell::RefCell<Option<TextView>>,
    }

    impl TableDataSource for OneEditor {
        fn number_of_rows(&self, _: &TableView, _: usize) -> usize {
            3
        }

        fn cell_for_row(&self, tree: &mut ViewTree, table: &TableView, path: IndexPath) -> ViewId {
            if path.row != 1 {
                return table.reusable_cell(tree, "plain", |_, _| {});
            }
            let tv = TextView::with_shaper(tree, Rect::ZERO, Rc::new(FixedAdvanceShaper::default()));
            tv.set_typing_attributes(Attributes::new().font(Font::system(10.0)));
            tv.set_text(tree, "abc");
            *self.editor.borrow_mut() = Some(tv.clone());
            tv.view()
        }
    }

    impl ScrollDelegate for OneEditor {}
    impl TableDelegate for OneEditor {
        fn height_for_row(&self, _: &TableView, _: IndexPath) -> f32 {
            30.0
        }
    }

    #[test]
    fn test_keys_reach_a_focused_editor_before_the_table() {
        let mut tree = ViewTree::new();
        let host = tree.create_host(Size::new(200.0, 100.0));
        let table = TableView::new(&mut tree, Rect::new(0.0, 0.0, 200.0, 100.0));
        tree.set_host_root(host, Some(table.view()));
        let source = Rc::new(OneEditor {
            editor: Default::default(),
        });
        table.set_data_source(&source);
        table.set_delegate(&source);
        table.reload_data(&mut tree);

        let tv = source.editor.borrow().clone();
        let Some(tv) = tv else {
            panic!("row 1 was never built");
        };
        assert_eq!(table.index_path_for_cell(tv.view()), Some(IndexPath::new(0, 1)));
        assert!(tree.make_first_responder(Some(tv.view())));
        tv.set_selected_range(&mut tree, 3..3);

        let key = |k| {
            Event::Key(KeyEvent {
                key: k,
                modifiers: Modifiers::default(),
                is_repeat: false,
                timestamp: Instant::now(),
            })
        };
        assert_eq!(tree.dispatch_event(host, key(Key::ArrowUp)), Some(tv.view()));
        assert_eq!(tv.selected_range(), 0..0);
        assert_eq!(table.index_path_for_selected_row(), None);

        // once the editor lets go, the table takes the arrows
        tree.make_first_responder(Some(table.view()));
        tree.dispatch_event(host, key(Key::ArrowDown));
        assert_eq!(table.index_path_for_selected_row(), Some(IndexPath::new(0, 0)));
    }
}
