//! Raw tick-log parsing.
//!
//! Two source layouts exist in the recorded data:
//!
//! - **Format A** — a directory with one `.txt` file per window (optionally
//!   nested one level deep), window id = file stem.
//! - **Format B** — a single file holding many windows, each introduced by a
//!   `Window: <id>` header line.
//!
//! Tick lines look like `07:23:450 - UP 88C | DOWN 13C` (minutes, seconds,
//! optional milliseconds field). Parsing is per-line and forgiving: a line that
//! does not match is skipped and counted, a price outside [0, 100] marks that
//! side invalid, and a line with both sides invalid is dropped and counted.
//! No single bad line or bad window ever aborts a load.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use window_backtest_core::Tick;

static TICK_RE_FRAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2}):(\d{2}):(\d+)\s*-\s*UP\s+(-?\d+)C?\s*\|\s*DOWN\s+(-?\d+)C?\s*$")
        .expect("tick regex is valid")
});

static TICK_RE_PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2}):(\d{2})\s*-\s*UP\s+(-?\d+)C?\s*\|\s*DOWN\s+(-?\d+)C?\s*$")
        .expect("tick regex is valid")
});

static WINDOW_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*window\s*:\s*(.+?)\s*$").expect("header regex is valid"));

/// One window's raw tick sequence, in arrival order, plus load diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWindow {
    /// Window identifier (file stem or header text), typically encoding the
    /// start/end timestamps of the market instance.
    pub id: String,
    /// Ticks in file order. Not sorted, not deduplicated; segmentation
    /// depends on arrival order.
    pub ticks: Vec<Tick>,
    /// Lines that matched neither tick pattern.
    pub skipped_lines: u32,
    /// Lines that parsed but carried no valid side (both out of range).
    pub dropped_ticks: u32,
}

impl RawWindow {
    fn new(id: String) -> Self {
        Self {
            id,
            ticks: Vec::new(),
            skipped_lines: 0,
            dropped_ticks: 0,
        }
    }

    fn push_line(&mut self, line: &str) {
        match parse_tick_line(line) {
            ParsedLine::Tick(tick) => self.ticks.push(tick),
            ParsedLine::Dropped => self.dropped_ticks += 1,
            ParsedLine::NoMatch => self.skipped_lines += 1,
        }
    }
}

/// Outcome of parsing one raw line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedLine {
    /// A valid observation.
    Tick(Tick),
    /// Matched the tick pattern but both sides were out of range.
    Dropped,
    /// Did not match any known pattern (or was blank).
    NoMatch,
}

fn classify_line(line: &str) -> ParsedLine {
    let (t_rel, up, down) = if let Some(caps) = TICK_RE_FRAC.captures(line) {
        let minutes: f64 = caps[1].parse().unwrap_or(0.0);
        let seconds: f64 = caps[2].parse().unwrap_or(0.0);
        // Third field is milliseconds, regardless of how many digits the
        // logger wrote.
        let millis: f64 = caps[3].parse().unwrap_or(0.0);
        let t_rel = minutes * 60.0 + seconds + millis / 1000.0;
        let up: i64 = caps[4].parse().unwrap_or(i64::MIN);
        let down: i64 = caps[5].parse().unwrap_or(i64::MIN);
        (t_rel, up, down)
    } else if let Some(caps) = TICK_RE_PLAIN.captures(line) {
        let minutes: f64 = caps[1].parse().unwrap_or(0.0);
        let seconds: f64 = caps[2].parse().unwrap_or(0.0);
        let up: i64 = caps[3].parse().unwrap_or(i64::MIN);
        let down: i64 = caps[4].parse().unwrap_or(i64::MIN);
        (minutes * 60.0 + seconds, up, down)
    } else {
        return ParsedLine::NoMatch;
    };

    match Tick::from_raw(t_rel, up, down) {
        Some(tick) => ParsedLine::Tick(tick),
        None => ParsedLine::Dropped,
    }
}

/// Parses a single tick line.
#[must_use]
pub fn parse_tick_line(line: &str) -> ParsedLine {
    if line.trim().is_empty() {
        return ParsedLine::NoMatch;
    }
    classify_line(line)
}

/// Parses a Format A per-window file. The window id is the file stem.
///
/// # Errors
///
/// Returns an error only when the file itself cannot be read; malformed
/// content is counted, never fatal.
pub fn parse_window_file(path: &Path) -> Result<RawWindow> {
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read window file {}", path.display()))?;

    let mut window = RawWindow::new(id);
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        window.push_line(line);
    }

    if window.skipped_lines > 0 || window.dropped_ticks > 0 {
        tracing::warn!(
            window_id = %window.id,
            skipped = window.skipped_lines,
            dropped = window.dropped_ticks,
            "malformed lines in window file"
        );
    }

    Ok(window)
}

/// Parses a Format B combined file: `Window: <id>` headers delimiting tick
/// blocks. Tick lines before the first header are ignored.
///
/// # Errors
///
/// Returns an error only when the file cannot be read.
pub fn parse_combined_file(path: &Path) -> Result<Vec<RawWindow>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read combined file {}", path.display()))?;

    let mut windows: Vec<RawWindow> = Vec::new();
    let mut current: Option<RawWindow> = None;

    for line in content.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }

        if let Some(caps) = WINDOW_HEADER_RE.captures(stripped) {
            if let Some(done) = current.take() {
                windows.push(done);
            }
            current = Some(RawWindow::new(caps[1].to_string()));
            continue;
        }

        if let Some(window) = current.as_mut() {
            window.push_line(stripped);
        }
    }
    if let Some(done) = current.take() {
        windows.push(done);
    }

    for window in &windows {
        if window.skipped_lines > 0 || window.dropped_ticks > 0 {
            tracing::warn!(
                window_id = %window.id,
                skipped = window.skipped_lines,
                dropped = window.dropped_ticks,
                "malformed lines in combined file window"
            );
        }
    }

    Ok(windows)
}

/// Loads all windows from a path, auto-detecting the layout: a directory is
/// Format A (with one level of subdirectory nesting allowed), a file is
/// Format B. Windows are returned sorted by id for reproducible runs.
///
/// # Errors
///
/// Returns an error when the path cannot be read at all. Individual
/// unreadable files inside a directory are logged and skipped so one bad
/// window never sinks the batch.
pub fn load_windows(path: &Path) -> Result<Vec<RawWindow>> {
    if !path.is_dir() {
        let mut windows = parse_combined_file(path)?;
        windows.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::info!(count = windows.len(), source = %path.display(), "loaded windows");
        return Ok(windows);
    }

    let mut windows = Vec::new();
    let mut files = txt_files_in(path)?;
    if files.is_empty() {
        // One level of nesting: a directory per window.
        let entries = fs::read_dir(path)
            .with_context(|| format!("failed to read directory {}", path.display()))?;
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                files.extend(txt_files_in(&entry.path())?);
            }
        }
    }
    files.sort();

    for file in files {
        match parse_window_file(&file) {
            Ok(window) => windows.push(window),
            Err(err) => {
                tracing::warn!(file = %file.display(), error = %err, "skipping unreadable window file");
            }
        }
    }

    windows.sort_by(|a, b| a.id.cmp(&b.id));
    tracing::info!(count = windows.len(), source = %path.display(), "loaded windows");
    Ok(windows)
}

fn txt_files_in(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }
    Ok(files)
}
