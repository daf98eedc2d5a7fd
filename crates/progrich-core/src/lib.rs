//! progrich-core - coordination of concurrent terminal indicators
//!
//! A terminal has one live redraw region. When several progress bars and
//! spinners are active at once, they must be drawn as one composite or they
//! tear each other's output. This crate owns that composite.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Managed    │  Handle owned by the caller (bar, spinner, ...)
//! └──────┬───────┘
//!        │ start / stop / pause
//!        ▼
//! ┌──────────────┐
//! │   Manager    │  Registry + EnablementTracker, one lock
//! └──────┬───────┘
//!        │ ordered, deduplicated composite
//!        ▼
//! ┌──────────────┐
//! │   Display    │  Live region (TerminalDisplay, CaptureDisplay)
//! └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`widget`] - Widget contract and lifecycle state machine
//! - [`enablement`] - Whether the display should be attached
//! - [`manager`] - Registry, composition and the process-wide default
//! - [`managed`] - Binding of one widget to its manager
//! - [`render`] - Renderable handles with identity equality
//! - [`display`] - Display contract and the in-memory capture display
//! - [`terminal`] - crossterm live region and terminal restoration
//!
//! # Example
//!
//! ```
//! use progrich_core::{CaptureDisplay, Manager, Managed, Renderable, Widget, WidgetCore};
//! use std::sync::Arc;
//!
//! struct Label {
//!     core: WidgetCore,
//!     text: Renderable,
//! }
//!
//! impl Widget for Label {
//!     fn core(&self) -> &WidgetCore {
//!         &self.core
//!     }
//!     fn render(&self) -> Renderable {
//!         self.text.clone()
//!     }
//! }
//!
//! let display = CaptureDisplay::new();
//! let manager = Arc::new(Manager::new(display.clone()));
//! let label = Managed::new(
//!     Label { core: WidgetCore::new("Label", false), text: Renderable::text("hello") },
//!     Some(manager.clone()),
//! )?;
//!
//! label.start(false)?;
//! assert_eq!(display.log().last_lines().unwrap(), ["hello"]);
//! label.stop()?;
//! assert!(!manager.is_attached());
//! # Ok::<(), progrich_core::ProgressError>(())
//! ```
//!
//! Widgets built without a manager use [`Manager::global`]. Statics are never
//! dropped, so a binary relying on the default keeps a
//! [`Manager::global_guard`] alive in `main` to release the terminal at exit.

pub mod display;
pub mod enablement;
pub mod error;
pub mod managed;
pub mod manager;
pub mod render;
pub mod terminal;
pub mod widget;

pub use display::{CaptureDisplay, CaptureLog, Display, DisplayEvent};
pub use enablement::{EnablementTracker, Manual};
pub use error::{ProgressError, Result};
pub use managed::{Managed, ManagedScope};
pub use manager::{CompositeOrder, ContextGuard, GlobalGuard, Manager, ManagerBuilder};
pub use render::{Render, Renderable};
pub use terminal::{Target, TerminalDisplay, TerminalOptions, restore_live_regions};
pub use widget::{Lifecycle, Outcome, Widget, WidgetCore, WidgetId, WidgetState};
