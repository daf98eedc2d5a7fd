//! Manager - the single owner of a live display region
//!
//! Widgets register with a manager and notify it on every state change. The
//! manager recomputes the composite (the ordered, deduplicated list of
//! renderables) and pushes it to its display.
//!
//! # Implementation Note: One Lock
//!
//! Registry, enablement and display live behind one mutex. Every public
//! operation holds it for the whole "mutate → compose → push" sequence, so two
//! threads can never interleave a mutation with a composition pass and pushes
//! reach the display in the order the mutations happened.
//!
//! Widgets are rendered while the lock is held. Widget code therefore must
//! not call back into the manager while holding one of its own locks.

use crate::display::Display;
use crate::enablement::{EnablementTracker, Manual};
use crate::error::{ProgressError, Result};
use crate::render::Renderable;
use crate::terminal::{TerminalDisplay, TerminalOptions, install_panic_hook};
use crate::widget::{Lifecycle, Widget, WidgetId};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Process-wide default manager, created on first use.
static GLOBAL: Mutex<Option<Arc<Manager>>> = Mutex::new(None);

/// How visible widgets are ordered in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeOrder {
    /// Registration order.
    #[default]
    Insertion,
    /// Finished widgets first, then the rest; registration order within each group.
    CompletedFirst,
}

struct State {
    registry: Vec<(WidgetId, Arc<dyn Widget>)>,
    enablement: EnablementTracker,
    display: Box<dyn Display>,
}

impl State {
    fn position(&self, id: WidgetId) -> Option<usize> {
        self.registry.iter().position(|(key, _)| *key == id)
    }

    fn compose(&self, order: CompositeOrder) -> Vec<Renderable> {
        let visible: Vec<(&Arc<dyn Widget>, Lifecycle)> = self
            .registry
            .iter()
            .map(|(_, widget)| (widget, widget.lifecycle()))
            .filter(|(_, lifecycle)| lifecycle.is_visible())
            .collect();

        let ordered = match order {
            CompositeOrder::Insertion => visible,
            CompositeOrder::CompletedFirst => {
                let (done, rest): (Vec<_>, Vec<_>) = visible
                    .into_iter()
                    .partition(|(_, lifecycle)| lifecycle.is_done());
                done.into_iter().chain(rest).collect()
            }
        };

        // A disabled manager still shows sticky output, never transient indicators.
        let enabled = self.enablement.is_enabled();
        let mut composite: Vec<Renderable> = Vec::with_capacity(ordered.len());
        for (widget, lifecycle) in ordered {
            if !enabled && !lifecycle.persists() {
                continue;
            }
            let renderable = widget.render();
            if !composite.contains(&renderable) {
                composite.push(renderable);
            }
        }
        composite
    }

    fn update(&mut self, order: CompositeOrder) -> Result<()> {
        if !self.display.is_attached() {
            return Ok(());
        }
        let composite = self.compose(order);
        tracing::trace!(entries = composite.len(), "pushing composite");
        self.display.push(&composite)?;
        Ok(())
    }

    fn attach(&mut self) -> Result<()> {
        if !self.display.is_attached() {
            tracing::debug!("attaching display");
            self.display.attach()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.display.is_attached() {
            tracing::debug!("detaching display");
            self.display.detach()?;
        }
        Ok(())
    }

    /// Push the final frame and detach once nothing keeps the display enabled.
    fn settle(&mut self, order: CompositeOrder) -> Result<()> {
        self.update(order)?;
        if !self.enablement.is_enabled() {
            self.close()?;
        }
        Ok(())
    }
}

/// Coordinates every widget drawn into one display.
pub struct Manager {
    order: CompositeOrder,
    state: Mutex<State>,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Manager")
            .field("order", &self.order)
            .field("widgets", &state.registry.len())
            .field("enablement", &state.enablement)
            .field("attached", &state.display.is_attached())
            .finish()
    }
}

impl Manager {
    /// Manager over the given display with insertion ordering.
    pub fn new(display: impl Display + 'static) -> Self {
        Self::builder().display(display).build()
    }

    /// Start configuring a manager.
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The configured composite ordering.
    pub fn order(&self) -> CompositeOrder {
        self.order
    }

    /// Register a widget. Registering the same identity again replaces the
    /// entry in place.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if the refreshed composite cannot be pushed.
    pub fn add(&self, widget: Arc<dyn Widget>) -> Result<()> {
        let mut state = self.lock();
        let id = widget.id();
        match state.position(id) {
            Some(index) => state.registry[index].1 = widget,
            None => {
                tracing::debug!(widget = %id, "registering widget");
                state.registry.push((id, widget));
            }
        }
        state.update(self.order)
    }

    /// Unregister a widget.
    ///
    /// # Errors
    ///
    /// [`ProgressError::NotRegistered`] if the identity is unknown.
    pub fn remove(&self, id: WidgetId) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .position(id)
            .ok_or(ProgressError::NotRegistered {
                operation: "remove",
                id,
            })?;
        state.registry.remove(index);
        tracing::debug!(widget = %id, "removed widget");
        state.update(self.order)
    }

    /// Enable the display on behalf of a widget, or force it on when `widget`
    /// is `None`. Attaches the display if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if attaching or pushing fails.
    pub fn enable(&self, widget: Option<WidgetId>) -> Result<()> {
        let mut state = self.lock();
        match widget {
            Some(id) => state.enablement.activate(id),
            None => state.enablement.set_manual(Manual::ForcedOn),
        }
        state.attach()?;
        state.update(self.order)
    }

    /// Withdraw a widget's enablement, or force the display off when `widget`
    /// is `None`. Once nothing keeps the manager enabled, the persisted
    /// widgets are pushed as the final frame and the display is detached.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if pushing or detaching fails.
    pub fn disable(&self, widget: Option<WidgetId>) -> Result<()> {
        let mut state = self.lock();
        match widget {
            Some(id) => state.enablement.deactivate(id),
            None => state.enablement.set_manual(Manual::ForcedOff),
        }
        state.settle(self.order)
    }

    /// Open a scoped acquisition that keeps the display attached.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if attaching or pushing fails.
    pub fn enter_context(&self) -> Result<()> {
        let mut state = self.lock();
        state.enablement.enter_scope();
        state.attach()?;
        state.update(self.order)
    }

    /// Close a scoped acquisition.
    ///
    /// # Errors
    ///
    /// [`ProgressError::UnbalancedScope`] if no scope is open.
    pub fn exit_context(&self) -> Result<()> {
        let mut state = self.lock();
        state
            .enablement
            .exit_scope()
            .map_err(|_| ProgressError::UnbalancedScope {
                operation: "exit_context",
            })?;
        state.settle(self.order)
    }

    /// Open a scope that is closed when the returned guard drops.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if attaching or pushing fails.
    pub fn scope(&self) -> Result<ContextGuard<'_>> {
        self.enter_context()?;
        Ok(ContextGuard {
            manager: self,
            open: true,
        })
    }

    /// Disable fully, forget every widget and reset the manual override and
    /// active set. Open scopes are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if the final frame cannot be written.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        state.enablement.set_manual(Manual::ForcedOff);
        state.settle(self.order)?;
        state.registry.clear();
        state.enablement.reset();
        tracing::debug!("cleared manager");
        state.update(self.order)
    }

    /// Push the current composite, if the display is attached.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if pushing fails.
    pub fn update(&self) -> Result<()> {
        self.lock().update(self.order)
    }

    /// Detach the display, keeping every registration for a later `enable`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if detaching fails.
    pub fn close(&self) -> Result<()> {
        self.lock().close()
    }

    /// Deterministic teardown. Idempotent; the manager stays usable and a
    /// later `enable` attaches again.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Display`] if detaching fails.
    pub fn shutdown(&self) -> Result<()> {
        self.close()
    }

    /// The composite `update` would push right now.
    pub fn composite(&self) -> Vec<Renderable> {
        self.lock().compose(self.order)
    }

    /// Whether any source currently enables the display.
    pub fn is_enabled(&self) -> bool {
        self.lock().enablement.is_enabled()
    }

    /// Whether the display is attached.
    pub fn is_attached(&self) -> bool {
        self.lock().display.is_attached()
    }

    /// Whether the identity is registered.
    pub fn contains(&self, id: WidgetId) -> bool {
        self.lock().position(id).is_some()
    }

    /// Number of registered widgets.
    pub fn len(&self) -> usize {
        self.lock().registry.len()
    }

    /// `true` when no widget is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current scope depth.
    pub fn scope_depth(&self) -> usize {
        self.lock().enablement.scope_depth()
    }

    /// Teardown path of a dropped widget handle: withdraw its enablement,
    /// forget it unless it persists, and refresh.
    pub(crate) fn release(&self, id: WidgetId, persist: bool) -> Result<()> {
        let mut state = self.lock();
        state.enablement.deactivate(id);
        if !persist {
            if let Some(index) = state.position(id) {
                state.registry.remove(index);
            }
        }
        state.settle(self.order)
    }

    /// The process-wide default manager, built on first use over a terminal
    /// display configured from the environment.
    ///
    /// The first call also installs the terminal-restoring panic hook. Keep a
    /// [`Manager::global_guard`] alive in `main` so the default is shut down
    /// at process end.
    pub fn global() -> Arc<Manager> {
        let mut slot = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert_with(|| {
            tracing::debug!("creating default manager");
            let options = TerminalOptions::from_env();
            install_panic_hook(&options);
            Arc::new(ManagerBuilder::with_terminal(options).build())
        })
        .clone()
    }

    /// Replace the process-wide default, returning the previous one.
    pub fn set_global(manager: Arc<Manager>) -> Option<Arc<Manager>> {
        install_panic_hook(&TerminalOptions::from_env());
        GLOBAL
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(manager)
    }

    /// Shut down and forget the process-wide default. The next
    /// [`Manager::global`] call builds a fresh one.
    pub fn reset_global() {
        let previous = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(manager) = previous {
            if let Err(err) = manager.shutdown() {
                tracing::warn!(%err, "failed to shut down default manager");
            }
        }
    }

    /// Guard that calls [`Manager::reset_global`] when dropped.
    ///
    /// Statics are never dropped, so this is the process-end hook of the
    /// default manager. `std::process::exit` skips destructors: drop the
    /// guard (or call `reset_global`) before exiting that way.
    ///
    /// ```no_run
    /// let _progress = progrich_core::Manager::global_guard();
    /// // widgets built without an explicit manager draw on the default
    /// ```
    pub fn global_guard() -> GlobalGuard {
        GlobalGuard { _private: () }
    }
}

/// Shuts the process-wide default manager down on drop. See
/// [`Manager::global_guard`].
#[must_use = "the default manager is shut down when the guard drops"]
#[derive(Debug)]
pub struct GlobalGuard {
    _private: (),
}

impl Drop for GlobalGuard {
    fn drop(&mut self) {
        Manager::reset_global();
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        // Safety net only: the output stream may already be half torn down, so
        // nothing here may panic or report.
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.display.is_attached() {
            let _ = state.display.restore();
        }
    }
}

/// Scoped acquisition from [`Manager::scope`].
#[derive(Debug)]
pub struct ContextGuard<'a> {
    manager: &'a Manager,
    open: bool,
}

impl ContextGuard<'_> {
    /// Close the scope now and observe the result.
    ///
    /// # Errors
    ///
    /// Propagates [`Manager::exit_context`] errors.
    pub fn exit(mut self) -> Result<()> {
        self.open = false;
        self.manager.exit_context()
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.manager.exit_context() {
                tracing::warn!(%err, "failed to close manager scope");
            }
        }
    }
}

/// Configures a [`Manager`].
#[derive(Default)]
pub struct ManagerBuilder {
    order: CompositeOrder,
    display: Option<Box<dyn Display>>,
}

impl fmt::Debug for ManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerBuilder")
            .field("order", &self.order)
            .field("display", &self.display.is_some())
            .finish()
    }
}

impl ManagerBuilder {
    /// Terminal display and ordering from `PROGRICH_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_terminal(TerminalOptions::from_env())
    }

    fn with_terminal(options: TerminalOptions) -> Self {
        let completed_on_top = std::env::var("PROGRICH_COMPLETED_ON_TOP")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self::default()
            .completed_on_top(completed_on_top)
            .display(TerminalDisplay::new(options))
    }

    /// Set the composite ordering.
    pub fn order(mut self, order: CompositeOrder) -> Self {
        self.order = order;
        self
    }

    /// Group finished widgets before running ones.
    pub fn completed_on_top(self, enabled: bool) -> Self {
        self.order(if enabled {
            CompositeOrder::CompletedFirst
        } else {
            CompositeOrder::Insertion
        })
    }

    /// Use the given display. Defaults to a terminal display on stdout.
    pub fn display(mut self, display: impl Display + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    /// Build the manager.
    pub fn build(self) -> Manager {
        let display = self
            .display
            .unwrap_or_else(|| Box::new(TerminalDisplay::new(TerminalOptions::default())));
        Manager {
            order: self.order,
            state: Mutex::new(State {
                registry: Vec::new(),
                enablement: EnablementTracker::new(),
                display,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{CaptureDisplay, DisplayEvent};
    use crate::widget::WidgetCore;

    struct Dummy {
        core: WidgetCore,
        renderable: Renderable,
    }

    impl Dummy {
        fn new(name: &str, persist: bool) -> Arc<Self> {
            Arc::new(Self {
                core: WidgetCore::new("Dummy", persist),
                renderable: Renderable::text(name),
            })
        }

        fn sharing(other: &Dummy) -> Arc<Self> {
            Arc::new(Self {
                core: WidgetCore::new("Dummy", false),
                renderable: other.renderable.clone(),
            })
        }
    }

    impl Widget for Dummy {
        fn core(&self) -> &WidgetCore {
            &self.core
        }

        fn render(&self) -> Renderable {
            self.renderable.clone()
        }
    }

    fn manager(order: CompositeOrder) -> (Manager, CaptureDisplay) {
        let display = CaptureDisplay::new();
        let manager = Manager::builder()
            .order(order)
            .display(display.clone())
            .build();
        (manager, display)
    }

    fn lines(manager: &Manager) -> Vec<String> {
        crate::render::compose_lines(&manager.composite(), 80)
    }

    #[test]
    fn test_update_is_noop_while_detached() {
        let (manager, display) = manager(CompositeOrder::Insertion);
        let a = Dummy::new("a", false);
        manager.add(a).unwrap();
        manager.update().unwrap();
        assert_eq!(display.log().push_count(), 0);
    }

    #[test]
    fn test_manual_enable_disable_attaches_and_detaches() {
        let (manager, display) = manager(CompositeOrder::Insertion);
        manager.enable(None).unwrap();
        assert!(manager.is_attached());
        assert_eq!(display.log().last_lines().unwrap(), Vec::<String>::new());

        manager.disable(None).unwrap();
        assert!(!manager.is_attached());
        assert_eq!(
            display.log().events().last(),
            Some(&DisplayEvent::Detach)
        );
    }

    #[test]
    fn test_duplicate_add_keeps_position() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        let a = Dummy::new("a", false);
        let b = Dummy::new("b", false);
        manager.add(a.clone()).unwrap();
        manager.add(b.clone()).unwrap();
        manager.add(a.clone()).unwrap();
        assert_eq!(manager.len(), 2);

        manager.enable(None).unwrap();
        a.start(false).unwrap();
        b.start(false).unwrap();
        assert_eq!(lines(&manager), ["a", "b"]);
    }

    #[test]
    fn test_remove_unknown_fails() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        let err = manager.remove(WidgetId::next()).unwrap_err();
        assert!(matches!(err, ProgressError::NotRegistered { operation: "remove", .. }));
    }

    #[test]
    fn test_completed_first_grouping() {
        let (manager, _display) = manager(CompositeOrder::CompletedFirst);
        let a = Dummy::new("a", true);
        let b = Dummy::new("b", true);
        let c = Dummy::new("c", true);
        for w in [&a, &b, &c] {
            manager.add(w.clone()).unwrap();
            w.start(false).unwrap();
        }
        manager.enable(None).unwrap();
        b.stop().unwrap();
        assert_eq!(lines(&manager), ["b", "a", "c"]);
    }

    #[test]
    fn test_insertion_order_ignores_done_state() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        let a = Dummy::new("a", true);
        let b = Dummy::new("b", true);
        let c = Dummy::new("c", true);
        for w in [&a, &b, &c] {
            manager.add(w.clone()).unwrap();
            w.start(false).unwrap();
        }
        manager.enable(None).unwrap();
        b.stop().unwrap();
        assert_eq!(lines(&manager), ["a", "b", "c"]);
    }

    #[test]
    fn test_shared_renderable_appears_once() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        let a = Dummy::new("group", false);
        let other = Dummy::new("other", false);
        let b = Dummy::sharing(&a);
        for w in [&a, &other] {
            manager.add(w.clone()).unwrap();
            w.start(false).unwrap();
        }
        manager.add(b.clone()).unwrap();
        b.start(false).unwrap();
        manager.enable(None).unwrap();
        assert_eq!(lines(&manager), ["group", "other"]);
    }

    #[test]
    fn test_disabled_manager_shows_only_persisted() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        let sticky = Dummy::new("sticky", true);
        let transient = Dummy::new("transient", false);
        for w in [&sticky, &transient] {
            manager.add(w.clone()).unwrap();
            w.start(false).unwrap();
        }
        assert!(!manager.is_enabled());
        assert_eq!(lines(&manager), ["sticky"]);
    }

    #[test]
    fn test_balanced_contexts_end_disabled() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        for depth in 1..=4 {
            manager.enter_context().unwrap();
            assert_eq!(manager.scope_depth(), depth);
        }
        for _ in 0..4 {
            assert!(manager.is_attached());
            manager.exit_context().unwrap();
        }
        assert!(!manager.is_enabled());
        assert!(!manager.is_attached());
    }

    #[test]
    fn test_exit_context_underflow() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        assert!(matches!(
            manager.exit_context(),
            Err(ProgressError::UnbalancedScope { operation: "exit_context" })
        ));
    }

    #[test]
    fn test_scope_guard_exits_on_drop() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        {
            let _guard = manager.scope().unwrap();
            assert!(manager.is_attached());
        }
        assert_eq!(manager.scope_depth(), 0);
        assert!(!manager.is_attached());
    }

    #[test]
    fn test_clear_keeps_scope() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        manager.add(Dummy::new("a", false)).unwrap();
        manager.enter_context().unwrap();
        manager.clear().unwrap();
        assert!(manager.is_empty());
        assert_eq!(manager.scope_depth(), 1);
        assert!(!manager.is_attached());
        manager.exit_context().unwrap();
    }

    #[test]
    fn test_close_keeps_registrations() {
        let (manager, _display) = manager(CompositeOrder::Insertion);
        let a = Dummy::new("a", false);
        manager.add(a.clone()).unwrap();
        manager.enable(Some(a.id())).unwrap();
        manager.close().unwrap();
        assert!(!manager.is_attached());
        assert!(manager.contains(a.id()));
    }

    #[test]
    fn test_drop_restores_attached_display() {
        let (manager, display) = manager(CompositeOrder::Insertion);
        manager.enable(None).unwrap();
        drop(manager);
        assert_eq!(
            display.log().events().last(),
            Some(&DisplayEvent::Restore)
        );
    }

    #[test]
    fn test_drop_after_shutdown_leaves_terminal_alone() {
        let (manager, display) = manager(CompositeOrder::Insertion);
        manager.enable(None).unwrap();
        manager.shutdown().unwrap();
        manager.shutdown().unwrap();
        drop(manager);
        assert_eq!(display.log().events().last(), Some(&DisplayEvent::Detach));
    }
}
