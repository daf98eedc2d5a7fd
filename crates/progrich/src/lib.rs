//! progrich - progress bars and spinners that share one live terminal region
//!
//! Every widget registers with a [`Manager`](progrich_core::Manager), which
//! draws all running widgets as one composite. Bars and spinners can be
//! created from any thread; the first one started attaches the display and the
//! last one stopped detaches it.
//!
//! ```
//! use progrich::{ProgressBar, Spinner};
//! use progrich_core::{CaptureDisplay, Manager};
//! use std::sync::Arc;
//!
//! let display = CaptureDisplay::new();
//! let manager = Arc::new(Manager::new(display.clone()));
//!
//! let bar = ProgressBar::builder("Train", 3).manager(manager.clone()).build()?;
//! let spinner = Spinner::builder("Loading data").manager(manager.clone()).build()?;
//!
//! bar.start(false)?;
//! spinner.start()?;
//! for _ in 0..3 {
//!     bar.advance(1)?;
//! }
//! spinner.success(Some("Data loaded"))?;
//! bar.stop()?;
//! assert!(!manager.is_attached());
//! # Ok::<(), progrich_core::ProgressError>(())
//! ```
//!
//! # Modules
//!
//! - [`bar`] - Counted progress bars and bar groups
//! - [`spinner`] - Animated spinners with a final status line
//! - [`theme`] - Colors, glyphs and spinner animations
//! - [`format`] - Column formatting (percent, counts, ETA)
//! - [`config`] - TOML and environment configuration
//! - [`cli`] - Arguments and scenarios of the `progrich-demo` binary

pub mod bar;
pub mod cli;
pub mod config;
pub mod format;
pub mod spinner;
pub mod theme;

pub use bar::{BarGroup, BarTask, ProgressBar, ProgressBarBuilder};
pub use config::{ConfigError, ProgressConfig};
pub use spinner::{Spinner, SpinnerBuilder, SpinnerTask};
pub use theme::{SpinnerStyle, Theme};
