use std::path::Path;

use anyhow::bail;
use clap::Parser;
use tracing::info;
use window_backtest_core::ConfigLoader;
use window_backtest_data::load_windows;
use window_backtest_engine::BacktestEngine;

mod output;

#[derive(Parser)]
#[command(name = "window-backtest")]
#[command(about = "Backtests UP/DOWN strategies over 15-minute market tick logs", long_about = None)]
struct Cli {
    /// Input path: directory of per-window files, or one combined file
    #[arg(short, long)]
    input: String,

    /// Output directory for summary.json, windows.csv, trades.csv
    #[arg(short, long, default_value = "out")]
    outdir: String,

    /// Config file path (TOML); WB_-prefixed env vars override it
    #[arg(short, long)]
    config: Option<String>,

    /// Touch/entry threshold in cents (overrides config)
    #[arg(long)]
    touch: Option<u8>,

    /// Resolve-spike threshold in cents (overrides config)
    #[arg(long)]
    resolve_min: Option<u8>,

    /// Drop windows that never reached nominal expiry from aggregates
    #[arg(long)]
    exclude_incomplete: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(touch) = cli.touch {
        config.strategy.entry_threshold_cents = touch;
    }
    if let Some(resolve_min) = cli.resolve_min {
        config.resolver.resolve_min_cents = resolve_min;
    }
    if cli.exclude_incomplete {
        config.exclude_incomplete = true;
    }

    let input = Path::new(&cli.input);
    if !input.exists() {
        bail!("input path does not exist: {}", input.display());
    }
    let windows = load_windows(input)?;
    if windows.is_empty() {
        bail!("no windows found under {}", input.display());
    }
    info!(windows = windows.len(), input = %input.display(), "windows loaded");

    let report = BacktestEngine::new(config.clone()).run(&windows);
    output::write_reports(Path::new(&cli.outdir), &report, &config)?;

    println!(
        "{} windows ({} clear, {} unresolved, {} incomplete)",
        report.summary.windows,
        report.summary.clear_windows,
        report.summary.unresolved_windows,
        report.summary.incomplete_windows
    );
    println!(
        "{} trades, win rate {:.1}%, total pnl {}, max drawdown {}",
        report.summary.total_trades,
        report.summary.win_rate * 100.0,
        report.summary.total_pnl,
        report.summary.max_drawdown
    );
    println!(
        "reversal rate {:.1}% ({} UP-touch losses, {} DOWN-touch losses)",
        report.summary.reversal_rate * 100.0,
        report.summary.up_touch_and_down_win,
        report.summary.down_touch_and_up_win
    );
    println!("reports written to {}", cli.outdir);

    if !report.violations.is_empty() {
        for violation in &report.violations {
            eprintln!("INVARIANT VIOLATION: {violation}");
        }
        bail!("{} invariant violation(s) found", report.violations.len());
    }
    Ok(())
}
