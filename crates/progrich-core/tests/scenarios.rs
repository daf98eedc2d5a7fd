//! Scenario tests for progrich-core.

use progrich_core::{
    CaptureDisplay, CompositeOrder, DisplayEvent, Managed, Manager, Outcome, ProgressError,
    Renderable, Widget, WidgetCore, WidgetState,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Minimal counted widget: completes only when it reached its total.
struct Counter {
    core: WidgetCore,
    total: u64,
    current: AtomicU64,
    renderable: Renderable,
}

impl Counter {
    fn new(name: &'static str, total: u64) -> Self {
        Self {
            core: WidgetCore::new("Counter", false),
            total,
            current: AtomicU64::new(0),
            renderable: Renderable::text(name),
        }
    }

    fn advance(&self, n: u64) -> Result<(), ProgressError> {
        let lifecycle = self.lifecycle();
        if !lifecycle.is_running() {
            return Err(lifecycle.not_running("advance"));
        }
        self.current.fetch_add(n, Ordering::SeqCst);
        Ok(())
    }
}

impl Widget for Counter {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn render(&self) -> Renderable {
        self.renderable.clone()
    }

    fn on_start(&self, reset: bool) {
        if reset {
            self.current.store(0, Ordering::SeqCst);
        }
    }

    fn outcome(&self) -> Outcome {
        if self.current.load(Ordering::SeqCst) >= self.total {
            Outcome::Completed
        } else {
            Outcome::Aborted
        }
    }
}

fn grouped_manager() -> (Arc<Manager>, CaptureDisplay) {
    let display = CaptureDisplay::new();
    let manager = Manager::builder()
        .completed_on_top(true)
        .display(display.clone())
        .build();
    (Arc::new(manager), display)
}

fn composite_names(manager: &Manager) -> Vec<String> {
    manager
        .composite()
        .iter()
        .flat_map(|r| r.lines(80))
        .collect()
}

#[test]
fn test_finished_widget_is_grouped_first() {
    let (manager, _display) = grouped_manager();
    let p = Managed::new(Counter::new("P", 10), Some(manager.clone())).unwrap();
    p.start(false).unwrap();
    p.advance(4).unwrap();

    let q = Managed::new(Counter::new("Q", 5), Some(manager.clone())).unwrap();
    q.start(false).unwrap();
    q.advance(5).unwrap();

    // keep Q on screen once it is done so the grouping is observable
    q.core().lock().set_persist(true);
    q.stop().unwrap();

    assert_eq!(q.lifecycle().state(), WidgetState::Completed);
    assert_eq!(composite_names(&manager), ["Q", "P"]);
    assert!(manager.is_attached());
}

#[test]
fn test_stop_short_of_total_aborts() {
    let (manager, _display) = grouped_manager();
    let p = Managed::new(Counter::new("P", 10), Some(manager)).unwrap();
    p.start(false).unwrap();
    p.advance(3).unwrap();
    p.stop().unwrap();
    assert_eq!(p.lifecycle().state(), WidgetState::Aborted);
    assert!(matches!(
        p.advance(1),
        Err(ProgressError::NotRunning { operation: "advance", .. })
    ));
}

#[test]
fn test_reset_rewinds_counter() {
    let (manager, _display) = grouped_manager();
    let p = Managed::new(Counter::new("P", 10), Some(manager)).unwrap();
    p.start(false).unwrap();
    p.advance(7).unwrap();
    p.start(true).unwrap();
    assert_eq!(p.current.load(Ordering::SeqCst), 0);
}

#[test]
fn test_manual_enable_with_no_widgets() {
    let (manager, display) = grouped_manager();
    manager.enable(None).unwrap();
    assert!(manager.is_attached());
    {
        let log = display.log();
        assert_eq!(log.events()[0], DisplayEvent::Attach);
        assert_eq!(log.events()[1], DisplayEvent::Push(Vec::new()));
    }
    manager.disable(None).unwrap();
    assert!(!manager.is_attached());
}

#[test]
fn test_outer_scope_spans_inner_widgets() {
    let (manager, display) = grouped_manager();
    let outer = manager.scope().unwrap();
    for name in ["a", "b", "c"] {
        let w = Managed::new(Counter::new(name, 1), Some(manager.clone())).unwrap();
        w.start(false).unwrap();
        w.advance(1).unwrap();
        w.stop().unwrap();
        assert!(manager.is_attached(), "scope keeps the display attached");
    }
    outer.exit().unwrap();
    assert!(!manager.is_attached());
    let attaches = display
        .log()
        .events()
        .iter()
        .filter(|e| **e == DisplayEvent::Attach)
        .count();
    assert_eq!(attaches, 1);
}

#[test]
fn test_concurrent_widgets_leave_manager_balanced() {
    let (manager, _display) = grouped_manager();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            thread::spawn(move || {
                manager.enter_context().unwrap();
                let w = Managed::new(Counter::new("w", 3), Some(manager.clone())).unwrap();
                w.start(false).unwrap();
                for _ in 0..3 {
                    w.advance(1).unwrap();
                    manager.update().unwrap();
                }
                if i % 2 == 0 {
                    w.pause().unwrap();
                }
                w.stop().unwrap();
                manager.exit_context().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(manager.scope_depth(), 0);
    assert!(!manager.is_enabled());
    assert!(!manager.is_attached());
    assert!(manager.is_empty());
    assert!(matches!(
        manager.exit_context(),
        Err(ProgressError::UnbalancedScope { .. })
    ));
}

#[test]
fn test_order_policy_is_configurable() {
    let display = CaptureDisplay::new();
    let manager = Manager::builder().display(display).build();
    assert_eq!(manager.order(), CompositeOrder::Insertion);
}
