//! Terminal display - a live region redrawn in place
//!
//! The region is owned by a dedicated render thread. The display handle only
//! sends it events, so the manager never blocks on terminal I/O while holding
//! its lock, and the thread keeps animating the latest composite between
//! pushes.
//!
//! # Implementation Note: Relative Redraw
//!
//! We never ask the terminal where the cursor is. After drawing N rows the
//! cursor sits on the line below the region; the next frame moves up N rows,
//! rewrites every row and clears whatever is left below. Line wrapping is
//! disabled while attached so one logical row is always one screen row.

use crate::display::Display;
use crate::render::{Renderable, compose_lines};
use crossterm::{
    QueueableCommand,
    cursor::{Hide, MoveToColumn, MoveUp, Show},
    style::Print,
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, Once, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

/// Default repaint cadence.
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(100);

/// Width used when the terminal size cannot be queried.
const FALLBACK_WIDTH: u16 = 80;

/// How long teardown waits for the render thread.
const TEARDOWN_TIMEOUT: Duration = Duration::from_millis(500);

const RENDER_THREAD: &str = "progrich-render";

/// Render threads currently owning a live region, reachable from the panic
/// hook.
static LIVE_REGIONS: Mutex<Vec<(u64, mpsc::Sender<Event>)>> = Mutex::new(Vec::new());

static NEXT_REGION: AtomicU64 = AtomicU64::new(1);
static PANIC_HOOK: Once = Once::new();

fn live_regions() -> MutexGuard<'static, Vec<(u64, mpsc::Sender<Event>)>> {
    LIVE_REGIONS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Output stream the live region is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

impl Target {
    fn writer(self) -> Box<dyn Write + Send> {
        match self {
            Self::Stdout => Box::new(io::stdout()),
            Self::Stderr => Box::new(io::stderr()),
        }
    }

    fn is_terminal(self) -> bool {
        match self {
            Self::Stdout => io::stdout().is_terminal(),
            Self::Stderr => io::stderr().is_terminal(),
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            other => Err(format!("unknown output target '{other}' (expected stdout or stderr)")),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        })
    }
}

/// Terminal display settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalOptions {
    /// Stream to draw on.
    pub target: Target,
    /// Repaint cadence between pushes.
    pub refresh: Duration,
    /// Draw on the alternate screen while attached.
    pub alternate_screen: bool,
    /// Hide the cursor while attached.
    pub hide_cursor: bool,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            target: Target::Stdout,
            refresh: DEFAULT_REFRESH,
            alternate_screen: false,
            hide_cursor: true,
        }
    }
}

impl TerminalOptions {
    /// Defaults overridden by `PROGRICH_TARGET`, `PROGRICH_REFRESH_MS`,
    /// `PROGRICH_ALT_SCREEN` and `PROGRICH_HIDE_CURSOR`. Invalid values are
    /// logged and ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(raw) = std::env::var("PROGRICH_TARGET") {
            match raw.parse() {
                Ok(target) => options.target = target,
                Err(err) => tracing::warn!(%err, "ignoring PROGRICH_TARGET"),
            }
        }
        if let Ok(raw) = std::env::var("PROGRICH_REFRESH_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => options.refresh = Duration::from_millis(ms),
                _ => tracing::warn!(value = %raw, "ignoring PROGRICH_REFRESH_MS"),
            }
        }
        if let Some(flag) = env_flag("PROGRICH_ALT_SCREEN") {
            options.alternate_screen = flag;
        }
        if let Some(flag) = env_flag("PROGRICH_HIDE_CURSOR") {
            options.hide_cursor = flag;
        }
        options
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Leave the alternate screen (if used), wipe `live_rows` rows above the
/// cursor, re-enable wrapping and show the cursor.
///
/// Plain function so both the normal teardown and a panic hook can use it.
///
/// # Errors
///
/// Returns the first write error; callers on the teardown path ignore it.
pub fn restore_terminal(
    out: &mut dyn Write,
    alternate_screen: bool,
    live_rows: u16,
) -> io::Result<()> {
    if alternate_screen {
        out.queue(LeaveAlternateScreen)?;
    } else if live_rows > 0 {
        out.queue(MoveUp(live_rows))?;
        out.queue(MoveToColumn(0))?;
        out.queue(Clear(ClearType::FromCursorDown))?;
    }
    out.queue(EnableLineWrap)?;
    out.queue(Show)?;
    out.flush()
}

/// Stop every live render thread: each one clears its rows, leaves the
/// alternate screen, shows the cursor and draws nothing afterwards.
///
/// Waits for each thread to acknowledge. Returns how many regions were
/// restored. Called from the panic hook; safe to call at any time.
pub fn restore_live_regions() -> usize {
    let regions = std::mem::take(&mut *live_regions());
    let on_render_thread = thread::current().name() == Some(RENDER_THREAD);
    let mut restored = 0;
    for (_, sender) in regions {
        let (ack, done) = mpsc::channel();
        if sender.send(Event::Restore(ack)).is_err() {
            continue;
        }
        // a panicking render thread cannot answer itself
        if on_render_thread {
            continue;
        }
        if matches!(done.recv_timeout(TEARDOWN_TIMEOUT), Ok(Ok(()))) {
            restored += 1;
        }
    }
    restored
}

/// Chain a panic hook that restores the terminal before the previous hook
/// prints the panic message.
///
/// Live regions are handed back by their render threads (rows cleared, no
/// further frames). When none is live, the escape sequences are written to
/// the target stream directly. Only the first call installs a hook; later
/// calls are no-ops.
pub fn install_panic_hook(options: &TerminalOptions) {
    let target = options.target;
    let alternate_screen = options.alternate_screen;
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if restore_live_regions() == 0 && target.is_terminal() {
                let _ = restore_terminal(&mut target.writer(), alternate_screen, 0);
            }
            previous(info);
        }));
    });
}

/// The rows currently owned on screen.
struct LiveRegion {
    out: Box<dyn Write + Send>,
    interactive: bool,
    alternate_screen: bool,
    hide_cursor: bool,
    rows: u16,
}

impl LiveRegion {
    fn width(&self) -> u16 {
        if !self.interactive {
            return FALLBACK_WIDTH;
        }
        terminal::size().map_or(FALLBACK_WIDTH, |(cols, _)| cols.max(1))
    }

    fn begin(&mut self) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        if self.alternate_screen {
            self.out.queue(EnterAlternateScreen)?;
        }
        if self.hide_cursor {
            self.out.queue(Hide)?;
        }
        self.out.queue(DisableLineWrap)?;
        self.out.flush()
    }

    /// Redraw the region in place.
    fn draw(&mut self, composite: &[Renderable]) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        let lines = compose_lines(composite, self.width());

        // MoveUp(0) still moves one row on some terminals.
        if self.rows > 0 {
            self.out.queue(MoveUp(self.rows))?;
        }
        self.out.queue(MoveToColumn(0))?;
        for line in &lines {
            self.out.queue(Print(line))?;
            self.out.queue(Clear(ClearType::UntilNewLine))?;
            self.out.queue(Print("\r\n"))?;
        }
        self.out.queue(Clear(ClearType::FromCursorDown))?;
        self.out.flush()?;
        self.rows = lines.len() as u16;
        Ok(())
    }

    /// Leave the final frame on the normal screen and release the terminal.
    fn finish(&mut self, composite: &[Renderable]) -> io::Result<()> {
        if !self.interactive {
            for line in compose_lines(composite, FALLBACK_WIDTH) {
                writeln!(self.out, "{line}")?;
            }
            return self.out.flush();
        }
        if self.alternate_screen {
            self.out.queue(LeaveAlternateScreen)?;
            self.rows = 0;
        }
        self.draw(composite)?;
        self.rows = 0;
        self.out.queue(EnableLineWrap)?;
        self.out.queue(Show)?;
        self.out.flush()
    }

    fn restore(&mut self) -> io::Result<()> {
        if !self.interactive {
            return self.out.flush();
        }
        let rows = std::mem::take(&mut self.rows);
        restore_terminal(&mut self.out, self.alternate_screen, rows)
    }
}

enum Event {
    Push(Vec<Renderable>),
    Detach(mpsc::Sender<io::Result<()>>),
    Restore(mpsc::Sender<io::Result<()>>),
}

/// Render thread. Owns the region; processes events strictly in order and
/// repaints the latest composite on every refresh tick.
fn run_render_loop(mut region: LiveRegion, receiver: mpsc::Receiver<Event>, refresh: Duration) {
    let mut composite: Vec<Renderable> = Vec::new();
    loop {
        match receiver.recv_timeout(refresh) {
            Ok(Event::Push(next)) => {
                composite = next;
                if let Err(err) = region.draw(&composite) {
                    tracing::warn!(%err, "failed to draw live region");
                }
            }
            Ok(Event::Detach(ack)) => {
                let _ = ack.send(region.finish(&composite));
                break;
            }
            Ok(Event::Restore(ack)) => {
                let _ = ack.send(region.restore());
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if let Err(err) = region.draw(&composite) {
                    tracing::warn!(%err, "failed to repaint live region");
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = region.restore();
                break;
            }
        }
    }
}

struct Worker {
    region: u64,
    sender: mpsc::Sender<Event>,
    handle: thread::JoinHandle<()>,
}

impl Worker {
    /// Send a teardown event and wait for the thread to acknowledge it.
    fn stop(self, make: fn(mpsc::Sender<io::Result<()>>) -> Event) -> io::Result<()> {
        live_regions().retain(|(id, _)| *id != self.region);
        let (ack, done) = mpsc::channel();
        if self.sender.send(make(ack)).is_err() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "render thread is gone",
            ));
        }
        let result = done.recv_timeout(TEARDOWN_TIMEOUT).unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "render thread did not acknowledge teardown",
            ))
        });
        if result.is_ok() {
            let _ = self.handle.join();
        }
        result
    }
}

type WriterFactory = Box<dyn Fn() -> Box<dyn Write + Send> + Send>;

/// [`Display`] that draws the composite as a live region on a terminal.
pub struct TerminalDisplay {
    options: TerminalOptions,
    writer: WriterFactory,
    interactive: bool,
    worker: Option<Worker>,
}

impl fmt::Debug for TerminalDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalDisplay")
            .field("options", &self.options)
            .field("interactive", &self.interactive)
            .field("attached", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl TerminalDisplay {
    /// Display on the configured standard stream. Live frames are only drawn
    /// when the stream is a terminal; otherwise the final frame is printed
    /// once on detach.
    pub fn new(options: TerminalOptions) -> Self {
        let target = options.target;
        Self {
            interactive: target.is_terminal(),
            writer: Box::new(move || target.writer()),
            options,
            worker: None,
        }
    }

    /// Display on an arbitrary writer. `interactive` selects live redraws.
    pub fn with_writer<W, F>(options: TerminalOptions, interactive: bool, writer: F) -> Self
    where
        W: Write + Send + 'static,
        F: Fn() -> W + Send + 'static,
    {
        Self {
            options,
            writer: Box::new(move || -> Box<dyn Write + Send> { Box::new(writer()) }),
            interactive,
            worker: None,
        }
    }

    /// The settings this display was built with.
    pub fn options(&self) -> &TerminalOptions {
        &self.options
    }
}

impl Display for TerminalDisplay {
    fn attach(&mut self) -> io::Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let mut region = LiveRegion {
            out: (self.writer)(),
            interactive: self.interactive,
            alternate_screen: self.options.alternate_screen,
            hide_cursor: self.options.hide_cursor,
            rows: 0,
        };
        region.begin()?;

        let (sender, receiver) = mpsc::channel();
        let refresh = self.options.refresh;
        let handle = thread::Builder::new()
            .name(RENDER_THREAD.to_string())
            .spawn(move || run_render_loop(region, receiver, refresh))?;
        let id = NEXT_REGION.fetch_add(1, Ordering::Relaxed);
        live_regions().push((id, sender.clone()));
        self.worker = Some(Worker {
            region: id,
            sender,
            handle,
        });
        Ok(())
    }

    fn detach(&mut self) -> io::Result<()> {
        match self.worker.take() {
            Some(worker) => worker.stop(Event::Detach),
            None => Ok(()),
        }
    }

    fn push(&mut self, composite: &[Renderable]) -> io::Result<()> {
        let Some(worker) = self.worker.as_ref() else {
            return Ok(());
        };
        worker
            .sender
            .send(Event::Push(composite.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "render thread is gone"))
    }

    fn is_attached(&self) -> bool {
        self.worker.is_some()
    }

    fn restore(&mut self) -> io::Result<()> {
        match self.worker.take() {
            Some(worker) => worker.stop(Event::Restore),
            None => Ok(()),
        }
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // live regions are process-wide; tests that attach must not overlap
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn display(interactive: bool) -> (TerminalDisplay, SharedBuf) {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let options = TerminalOptions {
            refresh: Duration::from_secs(60),
            ..TerminalOptions::default()
        };
        let display = TerminalDisplay::with_writer(options, interactive, move || writer.clone());
        (display, buf)
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("stderr".parse::<Target>().unwrap(), Target::Stderr);
        assert_eq!("STDOUT".parse::<Target>().unwrap(), Target::Stdout);
        assert!("tty".parse::<Target>().is_err());
    }

    #[test]
    fn test_headless_prints_final_frame_once() {
        let _serial = serial();
        let (mut display, buf) = display(false);
        display.attach().unwrap();
        display.push(&[Renderable::text("working")]).unwrap();
        display.push(&[Renderable::text("done")]).unwrap();
        display.detach().unwrap();
        assert_eq!(buf.contents(), "done\n");
        assert!(!display.is_attached());
    }

    #[test]
    fn test_interactive_redraws_and_shows_cursor() {
        let _serial = serial();
        let (mut display, buf) = display(true);
        display.attach().unwrap();
        display.push(&[Renderable::text("first")]).unwrap();
        display.push(&[Renderable::text("second")]).unwrap();
        display.detach().unwrap();

        let out = buf.contents();
        assert!(out.contains("first"));
        assert!(out.contains("second"));
        // cursor up one row before repainting
        assert!(out.contains("\x1b[1A"));
        assert!(out.ends_with("\x1b[?25h"));
    }

    #[test]
    fn test_restore_clears_region() {
        let _serial = serial();
        let (mut display, buf) = display(true);
        display.attach().unwrap();
        display.push(&[Renderable::text("a\nb")]).unwrap();
        display.restore().unwrap();
        assert!(!display.is_attached());
        let out = buf.contents();
        assert!(out.contains("\x1b[2A"));
        assert!(out.ends_with("\x1b[?25h"));
    }

    #[test]
    fn test_restore_terminal_leaves_alternate_screen() {
        let mut out = Vec::new();
        restore_terminal(&mut out, true, 3).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("\x1b[?1049l"));
        assert!(out.ends_with("\x1b[?25h"));
    }

    #[test]
    fn test_detached_display_ignores_push() {
        let _serial = serial();
        let (mut display, buf) = display(true);
        display.push(&[Renderable::text("ignored")]).unwrap();
        display.detach().unwrap();
        display.restore().unwrap();
        assert!(buf.contents().is_empty());
    }

    #[test]
    fn test_restore_live_regions_stops_render_thread() {
        let _serial = serial();
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let options = TerminalOptions {
            refresh: Duration::from_millis(5),
            ..TerminalOptions::default()
        };
        let mut display = TerminalDisplay::with_writer(options, true, move || writer.clone());
        display.attach().unwrap();
        display.push(&[Renderable::text("a\nb")]).unwrap();

        assert_eq!(restore_live_regions(), 1);
        let out = buf.contents();
        // rows cleared, wrap back on, cursor shown
        assert!(out.ends_with("\x1b[2A\x1b[1G\x1b[J\x1b[?7h\x1b[?25h"));

        // no frame is drawn after the restore
        thread::sleep(Duration::from_millis(30));
        assert_eq!(buf.contents().len(), out.len());
        assert_eq!(restore_live_regions(), 0);
    }

    #[test]
    fn test_detach_unregisters_live_region() {
        let _serial = serial();
        let (mut display, _buf) = display(true);
        display.attach().unwrap();
        display.detach().unwrap();
        assert_eq!(restore_live_regions(), 0);
    }
}
