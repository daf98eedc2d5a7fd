//! Binding between one widget and its manager.
//!
//! [`Managed`] registers the widget on construction, forwards every
//! lifecycle transition to the manager, and withdraws the widget when the
//! handle is dropped.

use crate::error::Result;
use crate::manager::Manager;
use crate::widget::{Widget, WidgetId};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Owning handle of a widget registered with a [`Manager`].
pub struct Managed<W: Widget + 'static> {
    widget: Arc<W>,
    manager: Arc<Manager>,
}

impl<W: Widget + 'static> fmt::Debug for Managed<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("id", &self.widget.id())
            .field("lifecycle", &self.widget.lifecycle())
            .finish_non_exhaustive()
    }
}

impl<W: Widget + 'static> Managed<W> {
    /// Register `widget` with `manager`, or with [`Manager::global`] when none
    /// is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager cannot push the refreshed composite.
    pub fn new(widget: W, manager: Option<Arc<Manager>>) -> Result<Self> {
        let manager = manager.unwrap_or_else(Manager::global);
        let widget = Arc::new(widget);
        manager.add(widget.clone())?;
        Ok(Self { widget, manager })
    }

    /// The widget's identity.
    pub fn id(&self) -> WidgetId {
        self.widget.id()
    }

    /// The shared widget.
    pub fn widget(&self) -> &Arc<W> {
        &self.widget
    }

    /// The manager this widget draws into.
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Start the widget and enable the display on its behalf.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`](crate::ProgressError::AlreadyDone) if
    /// the widget already finished, or a display error.
    pub fn start(&self, reset: bool) -> Result<()> {
        self.widget.start(reset)?;
        self.manager.enable(Some(self.id()))
    }

    /// Finish the widget.
    ///
    /// The composite is refreshed before the widget's enablement is
    /// withdrawn, so the last frame drawn never shows a stale row.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`](crate::ProgressError::AlreadyDone) if
    /// the widget already finished, or a display error.
    pub fn stop(&self) -> Result<()> {
        self.widget.stop()?;
        self.manager.update()?;
        self.manager.disable(Some(self.id()))
    }

    /// Pause the widget and refresh its row.
    ///
    /// # Errors
    ///
    /// Returns a display error if the refresh fails.
    pub fn pause(&self) -> Result<()> {
        self.widget.pause();
        self.manager.update()
    }

    /// Push the current composite, e.g. after the widget changed its content.
    ///
    /// # Errors
    ///
    /// Returns a display error if the refresh fails.
    pub fn refresh(&self) -> Result<()> {
        self.manager.update()
    }

    /// Enter a usage region: opens a manager scope and starts the widget.
    /// Leaving the region stops the widget (if still running) and closes the
    /// scope.
    ///
    /// # Errors
    ///
    /// Propagates errors from opening the scope or starting the widget; the
    /// scope is closed again if the start fails.
    pub fn scope(&self) -> Result<ManagedScope<'_, W>> {
        self.manager.enter_context()?;
        if let Err(err) = self.start(false) {
            if let Err(rollback) = self.manager.exit_context() {
                tracing::warn!(
                    widget = %self.id(),
                    err = %rollback,
                    "failed to close scope after failed start"
                );
            }
            return Err(err);
        }
        Ok(ManagedScope {
            managed: self,
            open: true,
        })
    }
}

impl<W: Widget + 'static> Deref for Managed<W> {
    type Target = W;

    fn deref(&self) -> &W {
        &self.widget
    }
}

impl<W: Widget + 'static> Drop for Managed<W> {
    fn drop(&mut self) {
        let persist = self.widget.lifecycle().persists();
        if let Err(err) = self.manager.release(self.widget.id(), persist) {
            tracing::warn!(widget = %self.widget.id(), %err, "failed to release widget");
        }
    }
}

/// Usage region opened by [`Managed::scope`].
pub struct ManagedScope<'a, W: Widget + 'static> {
    managed: &'a Managed<W>,
    open: bool,
}

impl<W: Widget + 'static> fmt::Debug for ManagedScope<'_, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedScope")
            .field("widget", &self.managed.id())
            .field("open", &self.open)
            .finish()
    }
}

impl<W: Widget + 'static> ManagedScope<'_, W> {
    /// Leave the region now and observe any error.
    ///
    /// # Errors
    ///
    /// Propagates errors from stopping the widget or closing the scope.
    pub fn finish(mut self) -> Result<()> {
        self.open = false;
        self.leave()
    }

    fn leave(&self) -> Result<()> {
        let stopped = if self.managed.widget.is_done() {
            Ok(())
        } else {
            self.managed.stop()
        };
        let exited = self.managed.manager.exit_context();
        stopped.and(exited)
    }
}

impl<W: Widget + 'static> Deref for ManagedScope<'_, W> {
    type Target = Managed<W>;

    fn deref(&self) -> &Managed<W> {
        self.managed
    }
}

impl<W: Widget + 'static> Drop for ManagedScope<'_, W> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.leave() {
                tracing::warn!(widget = %self.managed.id(), %err, "failed to leave widget scope");
            }
        }
    }
}
