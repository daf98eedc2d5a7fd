//! Decides whether the shared display should be attached.
//!
//! Three independent sources feed the decision: a manual override, the depth
//! of nested scoped acquisitions, and the set of individually active widgets.
//! The override wins whenever it is set.

use crate::error::{ProgressError, Result};
use crate::widget::WidgetId;
use std::collections::BTreeSet;

/// Explicit force-on/force-off instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Manual {
    /// No override; the other sources decide.
    #[default]
    Unset,
    /// Enabled regardless of the other sources.
    ForcedOn,
    /// Disabled regardless of the other sources.
    ForcedOff,
}

/// Enablement state of one manager.
#[derive(Debug, Default, Clone)]
pub struct EnablementTracker {
    manual: Manual,
    scoped: usize,
    active: BTreeSet<WidgetId>,
}

impl EnablementTracker {
    /// All sources off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scoped acquisition.
    pub fn enter_scope(&mut self) {
        self.scoped += 1;
    }

    /// Close a scoped acquisition.
    ///
    /// # Errors
    ///
    /// [`ProgressError::UnbalancedScope`] when no scope is open. The depth is
    /// left at zero.
    pub fn exit_scope(&mut self) -> Result<()> {
        self.scoped = self
            .scoped
            .checked_sub(1)
            .ok_or(ProgressError::UnbalancedScope {
                operation: "exit_scope",
            })?;
        Ok(())
    }

    /// Set or clear the manual override.
    pub fn set_manual(&mut self, manual: Manual) {
        self.manual = manual;
    }

    /// Mark a widget as holding the display.
    pub fn activate(&mut self, id: WidgetId) {
        self.active.insert(id);
    }

    /// Drop a widget from the active set. Unknown ids are ignored.
    pub fn deactivate(&mut self, id: WidgetId) {
        self.active.remove(&id);
    }

    /// Current manual override.
    pub fn manual(&self) -> Manual {
        self.manual
    }

    /// Current scope depth.
    pub fn scope_depth(&self) -> usize {
        self.scoped
    }

    /// Whether the widget is in the active set.
    pub fn is_active(&self, id: WidgetId) -> bool {
        self.active.contains(&id)
    }

    /// Number of active widgets.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// The override if set, otherwise "any scope open or any widget active".
    pub fn is_enabled(&self) -> bool {
        match self.manual {
            Manual::ForcedOn => true,
            Manual::ForcedOff => false,
            Manual::Unset => self.scoped > 0 || !self.active.is_empty(),
        }
    }

    /// Clear the override and the active set. Open scopes belong to their
    /// callers and are left alone.
    pub fn reset(&mut self) {
        self.manual = Manual::Unset;
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        assert!(!EnablementTracker::new().is_enabled());
    }

    #[test]
    fn test_nested_scopes_balance() {
        let mut tracker = EnablementTracker::new();
        for _ in 0..3 {
            tracker.enter_scope();
        }
        for _ in 0..2 {
            tracker.exit_scope().unwrap();
            assert!(tracker.is_enabled());
        }
        tracker.exit_scope().unwrap();
        assert!(!tracker.is_enabled());
    }

    #[test]
    fn test_exit_without_enter_fails() {
        let mut tracker = EnablementTracker::new();
        assert!(matches!(
            tracker.exit_scope(),
            Err(ProgressError::UnbalancedScope { .. })
        ));
        assert_eq!(tracker.scope_depth(), 0);
    }

    #[test]
    fn test_manual_override_wins() {
        let mut tracker = EnablementTracker::new();
        let id = WidgetId::next();
        tracker.activate(id);
        tracker.enter_scope();
        tracker.set_manual(Manual::ForcedOff);
        assert!(!tracker.is_enabled());

        tracker.set_manual(Manual::Unset);
        assert!(tracker.is_enabled());

        tracker.deactivate(id);
        tracker.exit_scope().unwrap();
        tracker.set_manual(Manual::ForcedOn);
        assert!(tracker.is_enabled());
    }

    #[test]
    fn test_deactivate_unknown_is_noop() {
        let mut tracker = EnablementTracker::new();
        tracker.deactivate(WidgetId::next());
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_reset_keeps_scopes() {
        let mut tracker = EnablementTracker::new();
        tracker.enter_scope();
        tracker.activate(WidgetId::next());
        tracker.set_manual(Manual::ForcedOff);

        tracker.reset();
        assert_eq!(tracker.manual(), Manual::Unset);
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(tracker.scope_depth(), 1);
        assert!(tracker.is_enabled());
    }
}
