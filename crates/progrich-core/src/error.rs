//! Errors raised by the coordination core.
//!
//! Every variant except [`ProgressError::Display`] is a broken usage contract:
//! the caller asked for a transition the state machine does not allow. None of
//! them are retryable and the core leaves its state untouched when raising them.

use crate::widget::{WidgetId, WidgetState};
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = ProgressError> = std::result::Result<T, E>;

/// Errors returned by widgets and the manager.
#[derive(Error, Debug)]
pub enum ProgressError {
    /// A lifecycle operation was attempted on a widget that already finished.
    #[error("cannot {operation} {kind} {id}: it has already finished ({state})")]
    AlreadyDone {
        /// The attempted operation (`start`, `stop`, ...).
        operation: &'static str,
        /// Widget kind, e.g. `ProgressBar`.
        kind: &'static str,
        /// Identity of the widget.
        id: WidgetId,
        /// State the widget was in.
        state: WidgetState,
    },

    /// An operation that requires a running widget was called on an idle or
    /// finished one.
    #[error("cannot {operation} {kind} {id} as it is not running ({state})")]
    NotRunning {
        /// The attempted operation.
        operation: &'static str,
        /// Widget kind.
        kind: &'static str,
        /// Identity of the widget.
        id: WidgetId,
        /// State the widget was in.
        state: WidgetState,
    },

    /// A counted widget was advanced after reaching its target.
    #[error("{kind} {id} already reached its total ({total}), cannot advance any further")]
    TargetReached {
        /// Widget kind.
        kind: &'static str,
        /// Identity of the widget.
        id: WidgetId,
        /// The target that was reached.
        total: u64,
    },

    /// The manager has no registration for the given identity.
    #[error("cannot {operation} widget {id}: it was never added to this manager")]
    NotRegistered {
        /// The attempted operation.
        operation: &'static str,
        /// The unknown identity.
        id: WidgetId,
    },

    /// A scope was exited more often than it was entered.
    #[error("{operation} was called more often than the matching enter (scope depth is 0)")]
    UnbalancedScope {
        /// The operation that underflowed.
        operation: &'static str,
    },

    /// The display primitive failed to write to its output stream.
    #[error("display error: {0}")]
    Display(#[from] std::io::Error),
}

impl ProgressError {
    /// Whether this error is a usage-contract violation rather than an I/O failure.
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Self::Display(_))
    }
}
