//! The per-window pipeline and batch driver.
//!
//! `BacktestEngine::run` processes every loaded window through segmentation,
//! selection, resolution, and both side machines, then aggregates and
//! validates. A degenerate window (empty, unresolvable) produces a
//! diagnostic-only report; it never panics and never aborts the batch.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use window_backtest_core::{EngineConfig, Side, Winner};
use window_backtest_data::RawWindow;

use crate::metrics::{validate, InvariantViolation, SummaryStats};
use crate::report::{SelectionConfidence, Trade, WindowReport};
use crate::resolve::{max_price, resolve_window, Resolution};
use crate::segment::{segment_by_reset, select_segment};
use crate::strategy::{simulate_side, SideOutcome};

/// Output of one full run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// One report per input window, diagnostics included.
    pub windows: Vec<WindowReport>,
    /// Every completed round trip, in window order.
    pub trades: Vec<Trade>,
    /// Aggregates over the counted windows (incomplete ones may be
    /// excluded by configuration; they always appear in `windows`).
    pub summary: SummaryStats,
    /// Broken identities found by post-run validation. Empty on a healthy
    /// run.
    pub violations: Vec<InvariantViolation>,
}

/// Drives the whole backtest from parsed windows to a validated report.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: EngineConfig,
}

impl BacktestEngine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Runs the full pipeline over a batch of windows.
    #[must_use]
    pub fn run(&self, windows: &[RawWindow]) -> BacktestReport {
        info!(windows = windows.len(), "backtest starting");

        let mut reports = Vec::with_capacity(windows.len());
        let mut trades = Vec::new();
        for window in windows {
            let (report, mut window_trades) = self.process_window(window);
            reports.push(report);
            trades.append(&mut window_trades);
        }

        // Incomplete windows can be excluded from aggregates; their reports
        // and trades remain visible either way.
        let (counted_reports, counted_trades) = if self.config.exclude_incomplete {
            let kept: Vec<WindowReport> = reports
                .iter()
                .filter(|r| r.confidence == SelectionConfidence::Complete)
                .cloned()
                .collect();
            let kept_ids: Vec<&str> = kept.iter().map(|r| r.id.as_str()).collect();
            let kept_trades: Vec<Trade> = trades
                .iter()
                .filter(|t| kept_ids.contains(&t.window_id.as_str()))
                .cloned()
                .collect();
            (kept, kept_trades)
        } else {
            (reports.clone(), trades.clone())
        };

        let summary = SummaryStats::from_run(&counted_reports, &counted_trades);
        let violations = validate(
            &summary,
            &counted_reports,
            &counted_trades,
            &self.config.strategy,
        );
        if !violations.is_empty() {
            warn!(count = violations.len(), "run failed invariant validation");
        }
        info!(
            trades = summary.total_trades,
            unresolved = summary.unresolved_windows,
            "backtest finished"
        );

        BacktestReport {
            windows: reports,
            trades,
            summary,
            violations,
        }
    }

    /// Segments, resolves, and simulates one window.
    fn process_window(&self, window: &RawWindow) -> (WindowReport, Vec<Trade>) {
        let mut issues = Vec::new();

        let segments = segment_by_reset(&window.ticks, &self.config.segmenter);
        let Some(selection) = select_segment(
            &segments,
            self.config.window_duration_secs,
            &self.config.segmenter,
        ) else {
            warn!(id = %window.id, "window has no usable ticks");
            issues.push("no usable ticks".to_string());
            return (self.degenerate_report(window, issues), Vec::new());
        };

        let segment = &segments[selection.index];
        let ticks = &window.ticks[segment.start..=segment.end];
        debug!(
            id = %window.id,
            segments = segments.len(),
            selected = selection.index,
            ticks = ticks.len(),
            "segment selected"
        );
        if selection.confidence == SelectionConfidence::Incomplete {
            issues.push(format!(
                "no segment reached nominal expiry; best ran to {:.1}s",
                segment.max_t
            ));
        }

        let resolution = resolve_window(ticks, &self.config.resolver);
        if resolution.winner == Winner::Unresolved {
            warn!(id = %window.id, "window unresolved; excluded from win/loss counts");
            issues.push("unresolved outcome".to_string());
        }

        let mut trades = Vec::new();
        for side in [Side::Up, Side::Down] {
            match simulate_side(
                &window.id,
                side,
                ticks,
                segment.start,
                &resolution,
                &self.config.strategy,
                self.config.window_duration_secs,
            ) {
                SideOutcome::Trade(trade) => trades.push(trade),
                SideOutcome::DiscardedUnresolved { entry_tick } => {
                    issues.push(format!(
                        "{side} position from tick {entry_tick} discarded: window unresolved"
                    ));
                }
                SideOutcome::NoEntry => {}
            }
        }

        let report = self.build_report(window, &segments, &selection, &resolution, ticks, issues);
        (report, trades)
    }

    fn build_report(
        &self,
        window: &RawWindow,
        segments: &[crate::segment::Segment],
        selection: &crate::segment::Selection,
        resolution: &Resolution,
        ticks: &[window_backtest_core::Tick],
        issues: Vec<String>,
    ) -> WindowReport {
        let threshold = self.config.strategy.entry_threshold_cents;
        let segment = &segments[selection.index];
        let up_max = max_price(ticks, Side::Up);
        let down_max = max_price(ticks, Side::Down);

        // Pre-resolve touches look at ticks up to and including the
        // resolving one.
        let pre = resolution
            .resolving_tick
            .map_or(ticks.len(), |i| (i + 1).min(ticks.len()));
        let touched_pre = |side: Side| {
            ticks[..pre]
                .iter()
                .filter_map(|t| t.price(side))
                .any(|p| p >= threshold)
        };

        WindowReport {
            id: window.id.clone(),
            total_ticks: window.ticks.len() as u32,
            dropped_ticks: window.dropped_ticks,
            skipped_lines: window.skipped_lines,
            segment_count: segments.len() as u32,
            selected_segment: selection.index,
            confidence: selection.confidence,
            winner: resolution.winner,
            resolving_tick: resolution.resolving_tick.map(|i| segment.start + i),
            resolve_time_secs: resolution.resolve_time_secs,
            trailing_invalid: resolution.trailing_invalid,
            up_max_cents: up_max,
            down_max_cents: down_max,
            up_touched: up_max.is_some_and(|p| p >= threshold),
            down_touched: down_max.is_some_and(|p| p >= threshold),
            up_touched_pre_resolve: touched_pre(Side::Up),
            down_touched_pre_resolve: touched_pre(Side::Down),
            issues,
        }
    }

    fn degenerate_report(&self, window: &RawWindow, issues: Vec<String>) -> WindowReport {
        WindowReport {
            id: window.id.clone(),
            total_ticks: window.ticks.len() as u32,
            dropped_ticks: window.dropped_ticks,
            skipped_lines: window.skipped_lines,
            segment_count: 0,
            selected_segment: 0,
            confidence: SelectionConfidence::Incomplete,
            winner: Winner::Unresolved,
            resolving_tick: None,
            resolve_time_secs: None,
            trailing_invalid: 0,
            up_max_cents: None,
            down_max_cents: None,
            up_touched: false,
            down_touched: false,
            up_touched_pre_resolve: false,
            down_touched_pre_resolve: false,
            issues,
        }
    }
}
