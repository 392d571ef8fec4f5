use std::cell::RefCell;
use std::rc::Rc;

use strata_core::{Clock, Rect, ScrollPhysics, Size, TestClock, Vec2, ViewTree};
use strata_ui::scroll::{ScrollDelegate, ScrollModel, ScrollState, ScrollView, rubber_band};
use web_time::{Duration, Instant};

const FRAME: Duration = Duration::from_micros(16_667);

fn model(content: f32) -> ScrollModel {
    let mut m = ScrollModel::new(ScrollPhysics::default());
    m.set_viewport(Size::new(100.0, 100.0));
    m.set_content_size(Size::new(100.0, content));
    m
}

#[test]
fn a_throw_inside_the_content_decelerates_to_rest() {
    let mut m = model(2000.0);
    let t0 = Instant::now();
    m.begin_drag(t0);
    m.drag_by(Vec2::new(0.0, 500.0), t0 + FRAME);
    m.release(Vec2::new(0.0, 800.0));
    assert_eq!(m.state(), ScrollState::Throwing);

    let mut states = vec![];
    let mut last = m.offset().y;
    for _ in 0..1000 {
        let moving = m.tick(FRAME);
        states.push(m.state());
        assert!(m.offset().y >= last, "a throw never reverses");
        last = m.offset().y;
        if !moving {
            break;
        }
    }
    assert_eq!(m.state(), ScrollState::Idle);
    assert!(!states.contains(&ScrollState::Bouncing));
    // 800pt/s decaying by 5% per frame travels a little under 270pt
    let travelled = m.offset().y - 500.0;
    assert!((200.0..270.0).contains(&travelled), "travelled {travelled}");
}

#[test]
fn a_throw_past_the_end_turns_into_a_bounce() {
    let mut m = model(300.0);
    let t0 = Instant::now();
    m.begin_drag(t0);
    m.drag_by(Vec2::new(0.0, 150.0), t0 + FRAME);
    m.release(Vec2::new(0.0, 2000.0));

    let mut saw_bounce = false;
    for _ in 0..1000 {
        let moving = m.tick(FRAME);
        saw_bounce |= m.state() == ScrollState::Bouncing;
        if !moving {
            break;
        }
    }
    assert!(saw_bounce);
    assert_eq!(m.state(), ScrollState::Idle);
    assert_eq!(m.offset().y, 200.0);
}

#[test]
fn rubber_band_is_monotonic_and_bounded() {
    let d = 100.0;
    let mut prev = 0.0;
    for i in 1..=200 {
        let x = i as f32 * 5.0;
        let y = rubber_band(x, d, 1.0, 0.55);
        assert!(y > prev, "not increasing at {x}");
        assert!(y < x);
        assert!(y < d);
        assert_eq!(rubber_band(-x, d, 1.0, 0.55), -y);
        prev = y;
    }
    assert_eq!(rubber_band(0.0, d, 1.0, 0.55), 0.0);
}

#[derive(Default)]
struct Trace {
    events: RefCell<Vec<String>>,
}

impl ScrollDelegate for Trace {
    fn will_begin_dragging(&self, _: &mut ViewTree, _: &ScrollView) {
        self.events.borrow_mut().push("begin".into());
    }

    fn did_end_dragging(&self, _: &mut ViewTree, _: &ScrollView) {
        self.events.borrow_mut().push("end".into());
    }
}

#[test]
fn pulling_past_the_top_springs_back_through_the_tree_clock() {
    let mut tree = ViewTree::new();
    let scroll = ScrollView::new(&mut tree, Rect::new(0.0, 0.0, 100.0, 100.0));
    scroll.set_content_size(&mut tree, Size::new(100.0, 500.0));
    let trace = Rc::new(Trace::default());
    scroll.set_delegate(&trace);

    let clock = TestClock::new(Instant::now());
    scroll.begin_drag(&mut tree, clock.now());
    clock.advance(FRAME);
    scroll.drag_by(&mut tree, Vec2::new(0.0, -80.0), clock.now());
    assert_eq!(scroll.state(), ScrollState::Pulling);
    let pulled = scroll.content_offset().y;
    assert!(pulled < 0.0 && pulled > -80.0);
    assert_eq!(tree.bounds(scroll.view()).y, pulled.round());

    clock.advance(FRAME);
    scroll.end_drag(&mut tree, clock.now());
    assert_eq!(scroll.state(), ScrollState::Bouncing);
    assert!(tree.has_animators());

    for _ in 0..600 {
        clock.advance(FRAME);
        tree.tick_animators(clock.now());
        if !tree.has_animators() {
            break;
        }
    }
    assert_eq!(scroll.state(), ScrollState::Idle);
    assert_eq!(scroll.content_offset().y, 0.0);
    assert_eq!(*trace.events.borrow(), vec!["begin", "end"]);
}
