//! Progress bars
//!
//! Bars are rows of a [`BarGroup`]. A group renders all of its visible rows
//! as one block, and every bar of a group hands the manager the same
//! renderable, so a group shows up once in the composite no matter how many
//! of its bars are registered.
//!
//! ```text
//! Epoch 1 - Train   4% ━╸━━━━━━━━━━━━━━━━━━━━━━━━━━━━  36/800 • 0:01:09 • ETA 0:18:08
//! ```

use crate::format::{bar_segments, format_count, format_elapsed, format_eta, format_percent, fraction};
use crate::theme::Theme;
use crossterm::style::Stylize;
use progrich_core::{
    Managed, ManagedScope, Manager, Outcome, ProgressError, Render, Renderable, Result, Widget,
    WidgetCore, WidgetId, WidgetState,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const KIND: &str = "ProgressBar";

/// Elapsed time that only advances while the bar runs.
#[derive(Debug, Clone, Default)]
struct Clock {
    running_since: Option<Instant>,
    accumulated: Duration,
}

impl Clock {
    fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    fn reset(&mut self) {
        self.running_since = None;
        self.accumulated = Duration::ZERO;
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.running_since.map_or(Duration::ZERO, |since| since.elapsed())
    }
}

#[derive(Debug, Clone)]
struct Row {
    id: WidgetId,
    prefix: String,
    description: String,
    total: u64,
    current: u64,
    visible: bool,
    clock: Clock,
}

struct GroupRender {
    rows: Mutex<Vec<Row>>,
    theme: Theme,
}

impl GroupRender {
    fn rows(&self) -> MutexGuard<'_, Vec<Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn format_row(&self, row: &Row, desc_width: usize, width: u16) -> String {
        let colors = &self.theme.colors;
        let sep = self.theme.icons.separator;
        let label = if row.prefix.is_empty() {
            format!("{:>desc_width$}", row.description)
        } else {
            format!("{} {:>desc_width$}", row.prefix, row.description)
        };
        let percent = format_percent(row.current, row.total);
        let count = format_count(row.current, row.total);
        let elapsed = row.clock.elapsed();
        let timing = format!(
            "{sep} {} {sep} ETA {}",
            format_elapsed(elapsed),
            format_eta(row.current, row.total, elapsed)
        );

        // Shrink the bar before anything else when the terminal is narrow.
        let fixed = label.chars().count() + percent.len() + count.len() + timing.chars().count() + 4;
        let mut layout = self.theme.layout.clone();
        layout.bar_width = layout.bar_width.min(usize::from(width).saturating_sub(fixed));

        let done = row.current >= row.total;
        let (filled, remaining) = bar_segments(fraction(row.current, row.total), &layout);
        let filled_color = if done {
            colors.bar_complete
        } else {
            colors.bar_active
        };
        format!(
            "{} {} {}{} {} {}",
            label.with(colors.description),
            percent.with(colors.secondary),
            filled.with(filled_color),
            remaining.with(colors.bar_remaining),
            count.with(colors.secondary),
            timing.with(colors.secondary),
        )
    }
}

impl Render for GroupRender {
    fn lines(&self, width: u16) -> Vec<String> {
        let rows = self.rows();
        let visible: Vec<&Row> = rows.iter().filter(|row| row.visible).collect();
        let desc_width = visible
            .iter()
            .map(|row| row.description.chars().count())
            .max()
            .unwrap_or(0);
        visible
            .into_iter()
            .map(|row| self.format_row(row, desc_width, width))
            .collect()
    }
}

/// A block of bars rendered together.
#[derive(Clone)]
pub struct BarGroup {
    render: Arc<GroupRender>,
    renderable: Renderable,
}

impl std::fmt::Debug for BarGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarGroup")
            .field("rows", &self.render.rows().len())
            .finish_non_exhaustive()
    }
}

impl Default for BarGroup {
    fn default() -> Self {
        Self::new(Theme::default())
    }
}

impl BarGroup {
    /// An empty group styled with `theme`.
    pub fn new(theme: Theme) -> Self {
        let render = Arc::new(GroupRender {
            rows: Mutex::new(Vec::new()),
            theme,
        });
        let renderable = Renderable::from_arc(render.clone());
        Self { render, renderable }
    }

    /// Number of rows still in the group (visible or not).
    pub fn len(&self) -> usize {
        self.render.rows().len()
    }

    /// `true` when every row has been removed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The shared renderable of the whole group.
    pub fn renderable(&self) -> Renderable {
        self.renderable.clone()
    }

    fn with_row<T>(&self, id: WidgetId, f: impl FnOnce(&mut Row) -> T) -> Option<T> {
        self.render.rows().iter_mut().find(|row| row.id == id).map(f)
    }

    fn push_row(&self, row: Row) {
        self.render.rows().push(row);
    }

    fn remove_row(&self, id: WidgetId) {
        self.render.rows().retain(|row| row.id != id);
    }
}

/// The widget behind a [`ProgressBar`].
#[derive(Debug)]
pub struct BarTask {
    core: WidgetCore,
    group: BarGroup,
}

impl BarTask {
    fn progress(&self) -> (u64, u64) {
        self.group
            .with_row(self.core.id(), |row| (row.current, row.total))
            .unwrap_or((0, 0))
    }
}

impl Widget for BarTask {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn render(&self) -> Renderable {
        self.group.renderable()
    }

    fn on_start(&self, reset: bool) {
        self.group.with_row(self.core.id(), |row| {
            if reset {
                row.current = 0;
                row.clock.reset();
            }
            row.visible = true;
            row.clock.resume();
        });
    }

    fn outcome(&self) -> Outcome {
        let (current, total) = self.progress();
        if current >= total {
            Outcome::Completed
        } else {
            Outcome::Aborted
        }
    }

    fn on_stop(&self) {
        if self.core.snapshot().persists() {
            self.group.with_row(self.core.id(), |row| row.clock.pause());
        } else {
            self.group.remove_row(self.core.id());
        }
    }

    fn on_pause(&self) {
        self.group.with_row(self.core.id(), |row| row.clock.pause());
    }
}

impl Drop for BarTask {
    fn drop(&mut self) {
        // other bars of the group must not keep drawing this row
        self.group.remove_row(self.core.id());
    }
}

/// Configures a [`ProgressBar`].
#[derive(Debug)]
pub struct ProgressBarBuilder {
    description: String,
    total: u64,
    current: u64,
    prefix: String,
    persist: bool,
    group: Option<BarGroup>,
    theme: Option<Theme>,
    manager: Option<Arc<Manager>>,
}

impl ProgressBarBuilder {
    /// Initial position.
    pub fn current(mut self, current: u64) -> Self {
        self.current = current;
        self
    }

    /// Text shown before the description, e.g. `[ 1/10]`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Keep the row on screen after the bar stops.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Render in the same block as `other`.
    pub fn group(self, other: &ProgressBar) -> Self {
        self.in_group(other.group().clone())
    }

    /// Render in the given group.
    pub fn in_group(mut self, group: BarGroup) -> Self {
        self.group = Some(group);
        self
    }

    /// Theme of a newly created group. Ignored when joining a group.
    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Register with this manager instead of the process-wide default.
    pub fn manager(mut self, manager: Arc<Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Create the bar and register it.
    ///
    /// # Errors
    ///
    /// Returns a display error if the manager cannot refresh.
    pub fn build(self) -> Result<ProgressBar> {
        let group = self
            .group
            .unwrap_or_else(|| BarGroup::new(self.theme.unwrap_or_default()));
        let core = WidgetCore::new(KIND, self.persist);
        group.push_row(Row {
            id: core.id(),
            prefix: self.prefix,
            description: self.description,
            total: self.total,
            current: self.current.min(self.total),
            visible: false,
            clock: Clock::default(),
        });
        let managed = Managed::new(BarTask { core, group }, self.manager)?;
        Ok(ProgressBar { managed })
    }
}

/// A counted progress bar.
#[derive(Debug)]
pub struct ProgressBar {
    managed: Managed<BarTask>,
}

impl ProgressBar {
    /// A bar on the process-wide default manager, in its own group.
    ///
    /// # Errors
    ///
    /// Returns a display error if the manager cannot refresh.
    pub fn new(description: impl Into<String>, total: u64) -> Result<Self> {
        Self::builder(description, total).build()
    }

    /// Start configuring a bar.
    pub fn builder(description: impl Into<String>, total: u64) -> ProgressBarBuilder {
        ProgressBarBuilder {
            description: description.into(),
            total,
            current: 0,
            prefix: String::new(),
            persist: false,
            group: None,
            theme: None,
            manager: None,
        }
    }

    /// The bar's identity.
    pub fn id(&self) -> WidgetId {
        self.managed.id()
    }

    /// The group this bar renders in.
    pub fn group(&self) -> &BarGroup {
        &self.managed.group
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WidgetState {
        self.managed.lifecycle().state()
    }

    /// `true` once completed or aborted.
    pub fn is_done(&self) -> bool {
        self.managed.is_done()
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.managed.progress().0
    }

    /// Target position.
    pub fn total(&self) -> u64 {
        self.managed.progress().1
    }

    /// Elapsed running time.
    pub fn elapsed(&self) -> Duration {
        self.managed
            .group
            .with_row(self.id(), |row| row.clock.elapsed())
            .unwrap_or_default()
    }

    /// Show the row and start the clock. `reset` rewinds position and clock.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`] if the bar already stopped.
    pub fn start(&self, reset: bool) -> Result<()> {
        self.managed.start(reset)
    }

    /// Stop the bar: completed if it reached its total, aborted otherwise.
    ///
    /// # Errors
    ///
    /// [`ProgressError::AlreadyDone`] if the bar already stopped.
    pub fn stop(&self) -> Result<()> {
        self.managed.stop()
    }

    /// Freeze the clock and mark the bar idle.
    ///
    /// # Errors
    ///
    /// Returns a display error if the refresh fails.
    pub fn pause(&self) -> Result<()> {
        self.managed.pause()
    }

    /// Move forward by `n`, clamped at the total.
    ///
    /// # Errors
    ///
    /// [`ProgressError::NotRunning`] unless the bar is running,
    /// [`ProgressError::TargetReached`] if it already reached its total.
    pub fn advance(&self, n: u64) -> Result<()> {
        let lifecycle = self.managed.lifecycle();
        if !lifecycle.is_running() {
            return Err(lifecycle.not_running("advance"));
        }
        let id = self.id();
        self.managed
            .group
            .with_row(id, |row| {
                if row.current >= row.total {
                    return Err(ProgressError::TargetReached {
                        kind: KIND,
                        id,
                        total: row.total,
                    });
                }
                row.current = row.current.saturating_add(n).min(row.total);
                Ok(())
            })
            .unwrap_or(Ok(()))
    }

    /// Replace the description.
    pub fn set_description(&self, description: impl Into<String>) {
        let description = description.into();
        self.managed
            .group
            .with_row(self.id(), |row| row.description = description);
    }

    /// Run the bar for the duration of the returned scope.
    ///
    /// # Errors
    ///
    /// Propagates errors from opening the scope or starting the bar.
    pub fn scope(&self) -> Result<ManagedScope<'_, BarTask>> {
        self.managed.scope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progrich_core::CaptureDisplay;

    fn manager() -> (Arc<Manager>, CaptureDisplay) {
        let display = CaptureDisplay::with_width(120);
        (Arc::new(Manager::new(display.clone())), display)
    }

    fn bar(manager: &Arc<Manager>, desc: &str, total: u64) -> ProgressBar {
        ProgressBar::builder(desc, total)
            .manager(manager.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_hidden_until_started() {
        let (manager, display) = manager();
        let pbar = bar(&manager, "Train", 10);
        manager.enable(None).unwrap();
        assert!(display.log().last_lines().unwrap().is_empty());

        pbar.start(false).unwrap();
        let log = display.log();
        let lines = log.last_lines().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Train"));
        assert!(lines[0].contains(" 0/10"));
    }

    #[test]
    fn test_advance_requires_running() {
        let (manager, _display) = manager();
        let pbar = bar(&manager, "Train", 10);
        assert!(matches!(
            pbar.advance(1),
            Err(ProgressError::NotRunning { operation: "advance", .. })
        ));
    }

    #[test]
    fn test_advance_past_total_fails() {
        let (manager, _display) = manager();
        let pbar = bar(&manager, "Train", 3);
        pbar.start(false).unwrap();
        pbar.advance(5).unwrap();
        assert_eq!(pbar.position(), 3);
        assert!(matches!(
            pbar.advance(1),
            Err(ProgressError::TargetReached { total: 3, .. })
        ));
    }

    #[test]
    fn test_stop_outcome_follows_progress() {
        let (manager, _display) = manager();
        let full = bar(&manager, "full", 2);
        full.start(false).unwrap();
        full.advance(2).unwrap();
        full.stop().unwrap();
        assert_eq!(full.state(), WidgetState::Completed);

        let short = bar(&manager, "short", 2);
        short.start(false).unwrap();
        short.advance(1).unwrap();
        short.stop().unwrap();
        assert_eq!(short.state(), WidgetState::Aborted);
    }

    #[test]
    fn test_transient_stop_removes_row() {
        let (manager, _display) = manager();
        let pbar = bar(&manager, "Train", 2);
        pbar.start(false).unwrap();
        pbar.stop().unwrap();
        assert!(pbar.group().is_empty());
    }

    #[test]
    fn test_reset_rewinds_position() {
        let (manager, _display) = manager();
        let pbar = bar(&manager, "Train", 10);
        pbar.start(false).unwrap();
        pbar.advance(6).unwrap();
        pbar.start(true).unwrap();
        assert_eq!(pbar.position(), 0);
    }

    #[test]
    fn test_grouped_bars_render_as_one_block() {
        let (manager, display) = manager();
        let total = ProgressBar::builder("Total", 10)
            .prefix("[ 1/10]")
            .manager(manager.clone())
            .build()
            .unwrap();
        let epoch = ProgressBar::builder("Epoch 1 - Train", 800)
            .group(&total)
            .manager(manager.clone())
            .build()
            .unwrap();
        total.start(false).unwrap();
        epoch.start(false).unwrap();
        epoch.advance(36).unwrap();
        manager.update().unwrap();

        let log = display.log();
        assert_eq!(log.last_composite().len(), 1);
        let lines = log.last_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[ 1/10]"));
        assert!(lines[1].contains(" 36/800"));
        assert!(lines[1].contains("  4%"));
    }

    #[test]
    fn test_pause_freezes_clock() {
        let (manager, _display) = manager();
        let pbar = bar(&manager, "Train", 10);
        pbar.start(false).unwrap();
        pbar.pause().unwrap();
        assert_eq!(pbar.state(), WidgetState::Idle);
        let frozen = pbar.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(pbar.elapsed(), frozen);
    }
}
