//! Display primitive contract.
//!
//! A display owns the single live region of an output stream. The manager
//! attaches it when something needs to be shown, pushes the composite after
//! every change, and detaches it when nothing is enabled any more.

use crate::render::{Renderable, compose_lines};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The single live region the manager draws into.
pub trait Display: Send {
    /// Take over the output stream. Attaching twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the output stream cannot be prepared.
    fn attach(&mut self) -> io::Result<()>;

    /// Release the output stream, leaving the last composite on screen.
    /// Detaching a detached display is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final frame cannot be written.
    fn detach(&mut self) -> io::Result<()>;

    /// Replace the composite. Displays hold only the latest composite.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    fn push(&mut self, composite: &[Renderable]) -> io::Result<()>;

    /// Whether the display currently owns the output stream.
    fn is_attached(&self) -> bool;

    /// Emergency teardown: leave the alternate screen, clear the live region
    /// and show the cursor. Must be safe to call in any state.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal could not be written; callers on the
    /// teardown path ignore it.
    fn restore(&mut self) -> io::Result<()>;
}

/// One observable side effect recorded by [`CaptureDisplay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// The display was attached.
    Attach,
    /// The display was detached.
    Detach,
    /// A composite was pushed, captured as rendered lines.
    Push(Vec<String>),
    /// The emergency restore path ran.
    Restore,
}

/// Everything a [`CaptureDisplay`] has seen.
#[derive(Debug, Default)]
pub struct CaptureLog {
    events: Vec<DisplayEvent>,
    last: Vec<Renderable>,
    attached: bool,
}

impl CaptureLog {
    /// All events in order.
    pub fn events(&self) -> &[DisplayEvent] {
        &self.events
    }

    /// The most recently pushed composite.
    pub fn last_composite(&self) -> &[Renderable] {
        &self.last
    }

    /// Lines of the most recent push, if any.
    pub fn last_lines(&self) -> Option<&[String]> {
        self.events.iter().rev().find_map(|e| match e {
            DisplayEvent::Push(lines) => Some(lines.as_slice()),
            _ => None,
        })
    }

    /// Number of pushes seen.
    pub fn push_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DisplayEvent::Push(_)))
            .count()
    }

    /// Whether the display is attached right now.
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// In-memory display for tests and headless runs.
///
/// Clones share one [`CaptureLog`], so a test can keep a clone after handing
/// the display to a manager.
#[derive(Debug, Clone)]
pub struct CaptureDisplay {
    log: Arc<Mutex<CaptureLog>>,
    width: u16,
}

impl CaptureDisplay {
    /// New capture display rendering at 80 columns.
    pub fn new() -> Self {
        Self::with_width(80)
    }

    /// New capture display rendering at the given width.
    pub fn with_width(width: u16) -> Self {
        Self {
            log: Arc::new(Mutex::new(CaptureLog::default())),
            width,
        }
    }

    /// Lock the shared log.
    pub fn log(&self) -> MutexGuard<'_, CaptureLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CaptureDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CaptureDisplay {
    fn attach(&mut self) -> io::Result<()> {
        let mut log = self.log();
        if !log.attached {
            log.attached = true;
            log.events.push(DisplayEvent::Attach);
        }
        Ok(())
    }

    fn detach(&mut self) -> io::Result<()> {
        let mut log = self.log();
        if log.attached {
            log.attached = false;
            log.events.push(DisplayEvent::Detach);
        }
        Ok(())
    }

    fn push(&mut self, composite: &[Renderable]) -> io::Result<()> {
        let lines = compose_lines(composite, self.width);
        let mut log = self.log();
        log.last = composite.to_vec();
        log.events.push(DisplayEvent::Push(lines));
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.log().attached
    }

    fn restore(&mut self) -> io::Result<()> {
        let mut log = self.log();
        log.attached = false;
        log.events.push(DisplayEvent::Restore);
        Ok(())
    }
}
