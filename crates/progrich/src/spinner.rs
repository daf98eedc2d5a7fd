//! Spinners
//!
//! ```text
//! ⠦ Saving new best model to: log/example/best
//! ```
//!
//! A spinner ends either silently (`stop`) or with a sticky final line
//! (`success` / `fail`) that stays on screen after the live region is gone.

use crate::theme::{SpinnerStyle, Theme};
use crossterm::style::Stylize;
use progrich_core::{
    Managed, ManagedScope, Manager, Outcome, Render, Renderable, Result, Widget, WidgetCore,
    WidgetId, WidgetState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const KIND: &str = "Spinner";

/// Time each animation frame stays on screen.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(80);

struct SpinnerRender {
    text: Mutex<String>,
    style: SpinnerStyle,
    theme: Theme,
    started: Instant,
}

impl SpinnerRender {
    fn text(&self) -> MutexGuard<'_, String> {
        self.text.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn frame(&self) -> &'static str {
        let frames = self.style.frames();
        let tick = self.started.elapsed().as_millis() / FRAME_INTERVAL.as_millis();
        frames[(tick % frames.len() as u128) as usize]
    }
}

impl Render for SpinnerRender {
    fn lines(&self, _width: u16) -> Vec<String> {
        let frame = self.frame().with(self.theme.colors.spinner);
        vec![format!("{frame} {}", self.text())]
    }
}

/// The widget behind a [`Spinner`].
pub struct SpinnerTask {
    core: WidgetCore,
    render: Arc<SpinnerRender>,
    renderable: Renderable,
    final_line: Mutex<Option<Renderable>>,
    failed: AtomicBool,
}

impl std::fmt::Debug for SpinnerTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinnerTask")
            .field("core", &self.core)
            .field("text", &*self.render.text())
            .finish_non_exhaustive()
    }
}

impl SpinnerTask {
    fn final_line(&self) -> MutexGuard<'_, Option<Renderable>> {
        self.final_line.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Widget for SpinnerTask {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn render(&self) -> Renderable {
        if self.core.snapshot().is_done() {
            if let Some(line) = self.final_line().as_ref() {
                return line.clone();
            }
        }
        self.renderable.clone()
    }

    fn outcome(&self) -> Outcome {
        if self.failed.load(Ordering::SeqCst) {
            Outcome::Aborted
        } else {
            Outcome::Completed
        }
    }
}

/// Configures a [`Spinner`].
#[derive(Debug)]
pub struct SpinnerBuilder {
    text: String,
    style: Option<SpinnerStyle>,
    persist: bool,
    theme: Theme,
    manager: Option<Arc<Manager>>,
}

impl SpinnerBuilder {
    /// Animation frames. Defaults to the theme's spinner.
    pub fn style(mut self, style: SpinnerStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Keep the spinner line on screen after it stops.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Colors and glyphs.
    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Register with this manager instead of the process-wide default.
    pub fn manager(mut self, manager: Arc<Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Create the spinner and register it.
    ///
    /// # Errors
    ///
    /// Returns a display error if the manager cannot refresh.
    pub fn build(self) -> Result<Spinner> {
        let render = Arc::new(SpinnerRender {
            text: Mutex::new(self.text),
            style: self.style.unwrap_or(self.theme.spinner),
            theme: self.theme,
            started: Instant::now(),
        });
        let task = SpinnerTask {
            core: WidgetCore::new(KIND, self.persist),
            renderable: Renderable::from_arc(render.clone()),
            render,
            final_line: Mutex::new(None),
            failed: AtomicBool::new(false),
        };
        let managed = Managed::new(task, self.manager)?;
        Ok(Spinner { managed })
    }
}

/// An animated spinner with a line of text.
#[derive(Debug)]
pub struct Spinner {
    managed: Managed<SpinnerTask>,
}

impl Spinner {
    /// A spinner on the process-wide default manager.
    ///
    /// # Errors
    ///
    /// Returns a display error if the manager cannot refresh.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        Self::builder(text).build()
    }

    /// Start configuring a spinner.
    pub fn builder(text: impl Into<String>) -> SpinnerBuilder {
        SpinnerBuilder {
            text: text.into(),
            style: None,
            persist: false,
            theme: Theme::default(),
            manager: None,
        }
    }

    /// The spinner's identity.
    pub fn id(&self) -> WidgetId {
        self.managed.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WidgetState {
        self.managed.lifecycle().state()
    }

    /// `true` once stopped.
    pub fn is_done(&self) -> bool {
        self.managed.is_done()
    }

    /// Current text.
    pub fn text(&self) -> String {
        self.managed.render.text().clone()
    }

    /// Start spinning.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`](progrich_core::ProgressError::AlreadyDone)
    /// if the spinner already stopped.
    pub fn start(&self) -> Result<()> {
        self.managed.start(false)
    }

    /// Stop without a final line.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`](progrich_core::ProgressError::AlreadyDone)
    /// if the spinner already stopped.
    pub fn stop(&self) -> Result<()> {
        self.managed.stop()
    }

    /// Mark the spinner idle. Spinning continues visually; only the state changes.
    ///
    /// # Errors
    ///
    /// Returns a display error if the refresh fails.
    pub fn pause(&self) -> Result<()> {
        self.managed.pause()
    }

    /// Replace the text and refresh the composite.
    ///
    /// # Errors
    ///
    /// Returns a display error if the refresh fails.
    pub fn set_text(&self, text: impl Into<String>) -> Result<()> {
        *self.managed.render.text() = text.into();
        self.managed.refresh()
    }

    /// Stop and leave `✔ text` on screen. Uses the current text when `text`
    /// is `None`.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`](progrich_core::ProgressError::AlreadyDone)
    /// if the spinner already stopped.
    pub fn success(&self, text: Option<&str>) -> Result<()> {
        let theme = &self.managed.render.theme;
        let icon = theme.icons.success.with(theme.colors.success);
        self.finish(icon.to_string(), text, false)
    }

    /// Stop as aborted and leave `✖ text` on screen.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`](progrich_core::ProgressError::AlreadyDone)
    /// if the spinner already stopped.
    pub fn fail(&self, text: Option<&str>) -> Result<()> {
        let theme = &self.managed.render.theme;
        let icon = theme.icons.error.with(theme.colors.error);
        self.finish(icon.to_string(), text, true)
    }

    fn finish(&self, icon: String, text: Option<&str>, failed: bool) -> Result<()> {
        if self.managed.is_done() {
            // surface the usual error without touching the final line
            return self.managed.stop();
        }
        let text = text.map_or_else(|| self.text(), str::to_string);
        self.managed.core().lock().set_persist(true);
        *self.managed.final_line() = Some(Renderable::text(format!("{icon} {text}")));
        self.managed.failed.store(failed, Ordering::SeqCst);
        self.managed.stop()
    }

    /// Spin for the duration of the returned scope.
    ///
    /// # Errors
    ///
    /// Propagates errors from opening the scope or starting the spinner.
    pub fn scope(&self) -> Result<ManagedScope<'_, SpinnerTask>> {
        self.managed.scope()
    }
}
