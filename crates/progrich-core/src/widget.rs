//! Widget contract and the lifecycle state machine shared by every indicator.
//!
//! ```text
//!            start            stop
//!   Idle ───────────▶ Running ─────▶ Completed | Aborted
//!     ▲                  │
//!     └──────────────────┘
//!            pause
//! ```
//!
//! The finished states are terminal. Concrete widgets embed a [`WidgetCore`]
//! and implement [`Widget`]; the provided `start`/`stop`/`pause` methods run
//! the transition first and only then call the widget's hooks, so hooks never
//! observe a half-applied transition.

use crate::error::{ProgressError, Result};
use crate::render::Renderable;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque per-instance identity. Minted once per widget, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

impl WidgetId {
    /// Mint a fresh identity.
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidgetState {
    /// Created or paused.
    #[default]
    Idle,
    /// Started and not yet stopped.
    Running,
    /// Stopped after meeting its completion criterion.
    Completed,
    /// Stopped short of its completion criterion.
    Aborted,
}

impl WidgetState {
    /// `true` for the two terminal states.
    pub fn is_done(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for WidgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        })
    }
}

/// How a widget finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Completion criterion met.
    Completed,
    /// Stopped early.
    Aborted,
}

impl From<Outcome> for WidgetState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => Self::Completed,
            Outcome::Aborted => Self::Aborted,
        }
    }
}

/// The state machine every widget obeys.
///
/// Invariants: `active` implies `Running`; once done, no transition leaves
/// the done state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    kind: &'static str,
    id: WidgetId,
    state: WidgetState,
    active: bool,
    visible: bool,
    persist: bool,
}

impl Lifecycle {
    /// A fresh, idle and hidden lifecycle.
    pub fn new(kind: &'static str, id: WidgetId, persist: bool) -> Self {
        Self {
            kind,
            id,
            state: WidgetState::Idle,
            active: false,
            visible: false,
            persist,
        }
    }

    /// Widget kind used in error messages.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> WidgetState {
        self.state
    }

    /// Whether the widget currently holds the display enabled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the widget should appear in the composite.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the widget stays on screen after it finishes.
    pub fn persists(&self) -> bool {
        self.persist
    }

    /// Change the persist flag.
    pub fn set_persist(&mut self, persist: bool) {
        self.persist = persist;
    }

    /// `true` once completed or aborted.
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// `true` while running.
    pub fn is_running(&self) -> bool {
        self.state == WidgetState::Running
    }

    /// Move to `Running`.
    ///
    /// Returns `Ok(false)` when already running and `reset` is not set.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`] if the widget already finished.
    pub fn start(&mut self, reset: bool) -> Result<bool> {
        if self.is_done() {
            return Err(self.already_done("start"));
        }
        if self.is_running() && !reset {
            return Ok(false);
        }
        self.active = true;
        self.visible = true;
        self.state = WidgetState::Running;
        Ok(true)
    }

    /// Finish with [`Outcome::Completed`].
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`] if the widget already finished.
    pub fn stop(&mut self) -> Result<()> {
        self.stop_as(Outcome::Completed)
    }

    /// Finish with the given outcome. Hides the widget unless it persists.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`] if the widget already finished.
    pub fn stop_as(&mut self, outcome: Outcome) -> Result<()> {
        if self.is_done() {
            return Err(self.already_done("stop"));
        }
        self.state = outcome.into();
        self.active = false;
        if !self.persist {
            self.visible = false;
        }
        Ok(())
    }

    /// Back to `Idle`. Pausing an idle widget is harmless; a finished widget
    /// stays finished.
    pub fn pause(&mut self) {
        if self.is_done() {
            return;
        }
        self.state = WidgetState::Idle;
        self.active = false;
    }

    /// Error for operations that require a running widget.
    pub fn not_running(&self, operation: &'static str) -> ProgressError {
        ProgressError::NotRunning {
            operation,
            kind: self.kind,
            id: self.id,
            state: self.state,
        }
    }

    fn already_done(&self, operation: &'static str) -> ProgressError {
        ProgressError::AlreadyDone {
            operation,
            kind: self.kind,
            id: self.id,
            state: self.state,
        }
    }
}

/// Identity plus the guarded lifecycle. Embedded by every concrete widget.
#[derive(Debug)]
pub struct WidgetCore {
    id: WidgetId,
    lifecycle: Mutex<Lifecycle>,
}

impl WidgetCore {
    /// Mint a new identity with an idle lifecycle.
    pub fn new(kind: &'static str, persist: bool) -> Self {
        let id = WidgetId::next();
        Self {
            id,
            lifecycle: Mutex::new(Lifecycle::new(kind, id, persist)),
        }
    }

    /// The widget's identity.
    pub fn id(&self) -> WidgetId {
        self.id
    }

    /// Lock the lifecycle. A poisoned lock is recovered: every transition
    /// leaves the lifecycle structurally valid.
    pub fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current lifecycle.
    pub fn snapshot(&self) -> Lifecycle {
        *self.lock()
    }
}

/// Capability contract for anything the manager can display.
///
/// Hooks are called after the lifecycle transition, outside the lifecycle
/// lock. They may be called while the manager holds its own lock, so they
/// must not call back into a [`Manager`](crate::Manager).
pub trait Widget: Send + Sync {
    /// Embedded identity and lifecycle.
    fn core(&self) -> &WidgetCore;

    /// Current visual representation.
    fn render(&self) -> Renderable;

    /// Called after a successful `start`. `reset` asks the widget to rewind
    /// its own counters.
    fn on_start(&self, _reset: bool) {}

    /// Completion criterion consulted by `stop`.
    fn outcome(&self) -> Outcome {
        Outcome::Completed
    }

    /// Called after a successful `stop`.
    fn on_stop(&self) {}

    /// Called after `pause`.
    fn on_pause(&self) {}

    /// The widget's identity.
    fn id(&self) -> WidgetId {
        self.core().id()
    }

    /// Copy of the lifecycle.
    fn lifecycle(&self) -> Lifecycle {
        self.core().snapshot()
    }

    /// `true` once completed or aborted.
    fn is_done(&self) -> bool {
        self.core().lock().is_done()
    }

    /// `true` while running.
    fn is_running(&self) -> bool {
        self.core().lock().is_running()
    }

    /// Start (or restart with `reset`) the widget.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`] if the widget already finished.
    fn start(&self, reset: bool) -> Result<()> {
        let started = self.core().lock().start(reset)?;
        if started {
            self.on_start(reset);
        }
        Ok(())
    }

    /// Finish the widget with the outcome its completion criterion reports.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`] if the widget already finished.
    fn stop(&self) -> Result<()> {
        let outcome = self.outcome();
        self.core().lock().stop_as(outcome)?;
        self.on_stop();
        Ok(())
    }

    /// Pause the widget.
    fn pause(&self) {
        self.core().lock().pause();
        self.on_pause();
    }
}
