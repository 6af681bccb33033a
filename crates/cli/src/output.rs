//! Report writers.
//!
//! Three artifacts per run: `summary.json` (aggregates, configuration echo,
//! violations), `windows.csv` (one diagnostic row per window), and
//! `trades.csv` (one row per round trip). CSVs use flat stringly columns so
//! they load cleanly into spreadsheets and pandas alike.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use csv::Writer;
use serde::Serialize;
use window_backtest_core::EngineConfig;
use window_backtest_engine::BacktestReport;

#[derive(Serialize)]
struct SummaryDocument<'a> {
    generated_at: String,
    config: &'a EngineConfig,
    summary: &'a window_backtest_engine::SummaryStats,
    violations: Vec<String>,
}

/// Writes all three report files into `outdir`, creating it if needed.
///
/// # Errors
///
/// Returns an error when the directory or any file cannot be written.
pub fn write_reports(outdir: &Path, report: &BacktestReport, config: &EngineConfig) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("failed to create output directory {}", outdir.display()))?;

    write_summary_json(outdir, report, config)?;
    write_windows_csv(outdir, report)?;
    write_trades_csv(outdir, report)?;
    Ok(())
}

fn write_summary_json(outdir: &Path, report: &BacktestReport, config: &EngineConfig) -> Result<()> {
    let path = outdir.join("summary.json");
    let document = SummaryDocument {
        generated_at: Utc::now().to_rfc3339(),
        config,
        summary: &report.summary,
        violations: report.violations.iter().map(ToString::to_string).collect(),
    };
    let file = File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &document)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn write_windows_csv(outdir: &Path, report: &BacktestReport) -> Result<()> {
    let path = outdir.join("windows.csv");
    let file = File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = Writer::from_writer(file);

    writer.write_record([
        "window_id",
        "total_ticks",
        "dropped_ticks",
        "skipped_lines",
        "segments",
        "selected_segment",
        "complete",
        "winner",
        "resolve_time",
        "trailing_invalid",
        "max_up_cents",
        "max_down_cents",
        "up_touch",
        "down_touch",
        "up_touch_pre_resolve",
        "down_touch_pre_resolve",
        "has_issues",
    ])?;

    for window in &report.windows {
        writer.write_record(&[
            window.id.clone(),
            window.total_ticks.to_string(),
            window.dropped_ticks.to_string(),
            window.skipped_lines.to_string(),
            window.segment_count.to_string(),
            window.selected_segment.to_string(),
            flag(window.confidence == window_backtest_engine::SelectionConfidence::Complete),
            window.winner.to_string(),
            window
                .resolve_time_secs
                .map(|t| format!("{t:.3}"))
                .unwrap_or_default(),
            window.trailing_invalid.to_string(),
            window.up_max_cents.map(|p| p.to_string()).unwrap_or_default(),
            window
                .down_max_cents
                .map(|p| p.to_string())
                .unwrap_or_default(),
            flag(window.up_touched),
            flag(window.down_touched),
            flag(window.up_touched_pre_resolve),
            flag(window.down_touched_pre_resolve),
            flag(!window.issues.is_empty()),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_trades_csv(outdir: &Path, report: &BacktestReport) -> Result<()> {
    let path = outdir.join("trades.csv");
    let file = File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = Writer::from_writer(file);

    writer.write_record([
        "window_id",
        "side",
        "entry_tick",
        "entry_time",
        "entry_cents",
        "exit_tick",
        "exit_time",
        "exit_cents",
        "exit_reason",
        "pnl",
    ])?;

    for trade in &report.trades {
        writer.write_record(&[
            trade.window_id.clone(),
            trade.side.to_string(),
            trade.entry_tick.to_string(),
            format!("{:.3}", trade.entry_time_secs),
            trade.entry_price_cents.to_string(),
            trade.exit_tick.to_string(),
            format!("{:.3}", trade.exit_time_secs),
            trade.exit_price_cents.to_string(),
            trade.exit_reason.to_string(),
            trade.pnl.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}
