//! Terminal output.
//!
//! `log!` and `debug!` print one line under a colored `[module]` tag. While a
//! [`ProgressLine`] is on screen, log lines are printed above it and the
//! counters are redrawn underneath. Watch mode reports through the
//! `status_*` functions, which replace the previous status block in place.
//!
//! ```ignore
//! log!("build"; "{} assets", count);
//! debug!("bundle"; "{}: {} modules", name, modules.len());
//! ```

use std::io::{Write, stdout};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime};

use crossterm::{
    cursor, queue,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// When set, only `error` lines are printed.
static SILENT: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

pub fn set_silent(s: bool) {
    SILENT.store(s, Ordering::SeqCst);
}

pub fn is_silent() -> bool {
    SILENT.load(Ordering::SeqCst)
}

/// Print a line tagged `[module]`.
///
/// ```ignore
/// log!("watch"; "watching {} assets", n);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like `log!`, printed only with `--verbose`.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

/// Last rendered progress line, redrawn after every log line.
static PROGRESS: Mutex<Option<String>> = Mutex::new(None);

pub fn log(module: &str, message: &str) {
    let lower = module.to_ascii_lowercase();
    if is_silent() && lower != "error" {
        return;
    }
    let tag = tag(module, &lower);

    let progress = PROGRESS.lock();
    let mut out = stdout().lock();
    queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
    writeln!(out, "{tag} {message}").ok();
    if let Some(line) = progress.as_deref() {
        write!(out, "{line}").ok();
    }
    out.flush().ok();
}

fn tag(module: &str, lower: &str) -> String {
    let tag = format!("[{module}]");
    match lower {
        "build" | "bootstrap" => tag.bright_blue().bold().to_string(),
        "watch" => tag.bright_green().bold().to_string(),
        "error" => tag.bright_red().bold().to_string(),
        "warning" => tag.bright_magenta().bold().to_string(),
        _ => tag.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Watch status
// ============================================================================

/// Outcome shown in the watch status block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Success,
    Error,
    Warning,
}

impl Status {
    fn symbol(self) -> Option<String> {
        match self {
            Self::Pending => None,
            Self::Success => Some("✓".green().to_string()),
            Self::Error => Some("✗".red().to_string()),
            Self::Warning => Some("⚠".yellow().to_string()),
        }
    }
}

/// The block of lines written by the last status call.
#[derive(Debug, Default)]
struct StatusBlock {
    height: usize,
}

static STATUS: Mutex<StatusBlock> = Mutex::new(StatusBlock { height: 0 });

impl StatusBlock {
    /// `[HH:MM:SS] <symbol> <message>` in place of the previous block.
    fn show(&mut self, status: Status, message: &str) {
        let stamp = format!("[{}]", clock(SystemTime::now())).dimmed().to_string();
        let line = match status.symbol() {
            Some(symbol) => format!("{stamp} {symbol} {message}"),
            None => format!("{stamp} {}", message.dimmed()),
        };

        let mut out = stdout().lock();
        if let Ok(up) = u16::try_from(self.height)
            && up > 0
        {
            queue!(out, cursor::MoveUp(up), Clear(ClearType::FromCursorDown)).ok();
        }
        writeln!(out, "{line}").ok();
        out.flush().ok();
        self.height = block_height(message);
    }
}

fn block_height(message: &str) -> usize {
    message.lines().count().max(1)
}

/// UTC wall-clock time as `HH:MM:SS`.
fn clock(at: SystemTime) -> String {
    let secs = at
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("{:02}:{:02}:{:02}", secs / 3600 % 24, secs / 60 % 60, secs % 60)
}

pub fn status_pending(message: &str) {
    STATUS.lock().show(Status::Pending, message);
}

pub fn status_success(message: &str) {
    STATUS.lock().show(Status::Success, message);
}

/// `summary` on the first line, `detail` (if any) below it.
pub fn status_error(summary: &str, detail: &str) {
    let message = match detail {
        "" => summary.to_string(),
        detail => format!("{summary}\n{detail}"),
    };
    STATUS.lock().show(Status::Error, &message);
}

pub fn status_warning(message: &str) {
    STATUS.lock().show(Status::Warning, message);
}

// ============================================================================
// Build progress
// ============================================================================

/// Per-kind build counters on one line: `[build] file 3/4  bundle 0/2`.
///
/// Kinds with nothing to build are left out. Updates from worker threads
/// that find the line busy are dropped; the next update or [`finish`]
/// shows the latest counts.
///
/// [`finish`]: ProgressLine::finish
pub struct ProgressLine {
    counters: Vec<(&'static str, usize, AtomicUsize)>,
    started: Instant,
}

impl ProgressLine {
    pub fn new(totals: &[(&'static str, usize)]) -> Self {
        let progress = Self {
            counters: totals
                .iter()
                .filter(|(_, total)| *total > 0)
                .map(|&(kind, total)| (kind, total, AtomicUsize::new(0)))
                .collect(),
            started: Instant::now(),
        };
        progress.redraw();
        progress
    }

    pub fn inc(&self, kind: &str) {
        if let Some((_, _, done)) = self.counters.iter().find(|(name, ..)| *name == kind) {
            done.fetch_add(1, Ordering::Relaxed);
            self.redraw();
        }
    }

    fn render(&self) -> String {
        let counts: Vec<_> = self
            .counters
            .iter()
            .map(|(kind, total, done)| format!("{kind} {}/{total}", done.load(Ordering::Relaxed)))
            .collect();
        format!("{} {}", tag("build", "build"), counts.join("  "))
    }

    fn redraw(&self) {
        if is_silent() {
            return;
        }
        let Some(mut slot) = PROGRESS.try_lock() else {
            return;
        };
        let line = self.render();
        let mut out = stdout().lock();
        queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        write!(out, "{line}").ok();
        out.flush().ok();
        *slot = Some(line);
    }

    /// Leave the final counts on screen with the elapsed time.
    pub fn finish(self) {
        let mut slot = PROGRESS.lock();
        *slot = None;
        if is_silent() {
            return;
        }
        let elapsed = format!("({})", elapsed(self.started.elapsed())).dimmed().to_string();
        let mut out = stdout().lock();
        queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        writeln!(out, "{} {elapsed}", self.render()).ok();
        out.flush().ok();
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        let mut slot = PROGRESS.lock();
        if slot.take().is_some() {
            let mut out = stdout().lock();
            queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
            out.flush().ok();
        }
    }
}

fn elapsed(duration: Duration) -> String {
    match duration.as_millis() {
        ms if ms < 1000 => format!("{ms}ms"),
        ms => format!("{:.1}s", ms as f64 / 1000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_skips_empty_kinds() {
        let progress = ProgressLine::new(&[("file", 2), ("url", 0)]);
        assert_eq!(progress.counters.len(), 1);
        progress.inc("file");
        progress.inc("url");
        assert!(progress.render().ends_with("file 1/2"));
    }

    #[test]
    fn test_status_block_height() {
        assert_eq!(block_height("rebuilt app.js"), 1);
        assert_eq!(block_height("failed: app.js\ncannot find module"), 2);
        assert_eq!(block_height(""), 1);
    }

    #[test]
    fn test_clock_format() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400 + 3 * 3600 + 4 * 60 + 5);
        assert_eq!(clock(at), "03:04:05");
    }

    #[test]
    fn test_elapsed_units() {
        assert_eq!(elapsed(Duration::from_millis(42)), "42ms");
        assert_eq!(elapsed(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn test_tag_keeps_module_name() {
        assert!(tag("bundle", "bundle").contains("[bundle]"));
    }
}
