//! Host discovery tests over an in-memory frame tree.

use std::cell::Cell;
use std::rc::Rc;

use rte_kernel::dialect::Dialect;
use rte_kernel::discovery::{locate, locate_default, ExecutionContext, DEFAULT_MAX_DEPTH};

struct FrameData {
    exposed: Vec<(&'static str, u32)>,
    parent: Option<Frame>,
    opener: Option<Frame>,
    visits: Rc<Cell<usize>>,
}

#[derive(Clone)]
struct Frame(Rc<FrameData>);

impl Frame {
    fn new(
        exposed: Vec<(&'static str, u32)>,
        parent: Option<Frame>,
        opener: Option<Frame>,
        visits: &Rc<Cell<usize>>,
    ) -> Frame {
        Frame(Rc::new(FrameData {
            exposed,
            parent,
            opener,
            visits: Rc::clone(visits),
        }))
    }
}

impl ExecutionContext for Frame {
    type Surface = u32;

    fn lookup(&self, name: &str) -> Option<u32> {
        // First preference is asked exactly once per visited frame.
        if name == "API_1484_11" {
            self.0.visits.set(self.0.visits.get() + 1);
        }
        self.0
            .exposed
            .iter()
            .find(|(exposed, _)| *exposed == name)
            .map(|(_, id)| *id)
    }

    fn parent(&self) -> Option<Frame> {
        self.0.parent.clone()
    }

    fn opener(&self) -> Option<Frame> {
        self.0.opener.clone()
    }
}

/// A start frame `depth` hops below a top frame exposing `exposed`.
fn chain(depth: usize, exposed: Vec<(&'static str, u32)>, visits: &Rc<Cell<usize>>) -> Frame {
    let mut frame = Frame::new(exposed, None, None, visits);
    for _ in 0..depth {
        frame = Frame::new(Vec::new(), Some(frame), None, visits);
    }
    frame
}

#[test]
fn finds_surface_on_the_starting_frame() {
    let visits = Rc::new(Cell::new(0));
    let start = chain(0, vec![("API", 1)], &visits);
    let found = locate_default(start).unwrap();
    assert_eq!(found.surface, 1);
    assert_eq!(found.dialect, Dialect::Legacy);
    assert_eq!(found.depth, 0);
}

#[test]
fn finds_nearest_surface_up_the_parent_chain() {
    let visits = Rc::new(Cell::new(0));
    let start = chain(3, vec![("API_1484_11", 9)], &visits);
    let found = locate_default(start).unwrap();
    assert_eq!(found.surface, 9);
    assert_eq!(found.dialect, Dialect::Current);
    assert_eq!(found.depth, 3);
    assert_eq!(visits.get(), 4);
}

#[test]
fn preference_order_decides_between_dialects() {
    let visits = Rc::new(Cell::new(0));
    let start = chain(1, vec![("API", 1), ("API_1484_11", 2)], &visits);
    let found = locate(start.clone(), DEFAULT_MAX_DEPTH, &[Dialect::Legacy, Dialect::Current])
        .unwrap();
    assert_eq!(found.surface, 1);

    let found = locate_default(start).unwrap();
    assert_eq!(found.surface, 2);
}

#[test]
fn surface_within_budget_is_found() {
    let visits = Rc::new(Cell::new(0));
    let start = chain(DEFAULT_MAX_DEPTH - 1, vec![("API", 5)], &visits);
    let found = locate_default(start).unwrap();
    assert_eq!(found.depth, DEFAULT_MAX_DEPTH - 1);
    assert_eq!(visits.get(), DEFAULT_MAX_DEPTH);
}

#[test]
fn deep_chain_stops_at_the_probe_budget() {
    let visits = Rc::new(Cell::new(0));
    let start = chain(501, vec![("API", 5)], &visits);
    assert!(locate_default(start).is_none());
    assert!(visits.get() <= DEFAULT_MAX_DEPTH);
}

#[test]
fn missing_surface_returns_none() {
    let visits = Rc::new(Cell::new(0));
    let start = chain(4, Vec::new(), &visits);
    assert!(locate_default(start).is_none());
    assert_eq!(visits.get(), 5);
}

#[test]
fn walk_continues_through_the_opener() {
    let visits = Rc::new(Cell::new(0));
    let lms_window = Frame::new(vec![("API", 7)], None, None, &visits);
    let popup_top = Frame::new(Vec::new(), None, Some(lms_window), &visits);
    let start = Frame::new(Vec::new(), Some(popup_top), None, &visits);

    let found = locate_default(start).unwrap();
    assert_eq!(found.surface, 7);
    assert_eq!(found.depth, 2);
}

#[test]
fn opener_walk_shares_the_budget() {
    let visits = Rc::new(Cell::new(0));
    let lms_window = Frame::new(vec![("API", 7)], None, None, &visits);
    let popup_top = Frame::new(Vec::new(), None, Some(lms_window), &visits);
    let start = Frame::new(Vec::new(), Some(popup_top), None, &visits);

    assert!(locate(start, 2, &[Dialect::Legacy]).is_none());
}
