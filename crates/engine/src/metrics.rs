//! Run-level statistics and invariant validation.
//!
//! `SummaryStats` is derived fresh from the window reports and trades on
//! every call; nothing is accumulated incrementally, so re-running the
//! aggregation is always safe. `validate` re-checks the partition
//! identities and per-trade arithmetic after the fact and returns every
//! violation it finds rather than stopping at the first.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use window_backtest_core::{Side, StrategyConfig, Winner};

use crate::report::{ExitReason, SelectionConfidence, Trade, WindowReport};
use crate::strategy::{settlement_price, trade_pnl};

/// Exit counts by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReasonCounts {
    pub take_profit: u32,
    pub stop_loss: u32,
    pub time_stop: u32,
    pub opp_kill: u32,
    pub settlement: u32,
}

impl ExitReasonCounts {
    fn record(&mut self, reason: ExitReason) {
        match reason {
            ExitReason::TakeProfit => self.take_profit += 1,
            ExitReason::StopLoss => self.stop_loss += 1,
            ExitReason::TimeStop => self.time_stop += 1,
            ExitReason::OppKill => self.opp_kill += 1,
            ExitReason::Settlement => self.settlement += 1,
        }
    }

    /// Sum over all reasons.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.take_profit + self.stop_loss + self.time_stop + self.opp_kill + self.settlement
    }
}

/// Aggregate statistics over one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    // Window counts
    /// Windows aggregated.
    pub windows: u32,
    /// Windows with a clear UP or DOWN winner.
    pub clear_windows: u32,
    /// Windows left unresolved.
    pub unresolved_windows: u32,
    /// Windows whose selected segment never reached nominal expiry.
    pub incomplete_windows: u32,
    /// Windows whose log split into more than one segment.
    pub multi_segment_windows: u32,

    // Trade performance
    /// Completed round trips.
    pub total_trades: u32,
    /// Trades with positive PnL.
    pub wins: u32,
    /// Trades with negative PnL.
    pub losses: u32,
    /// wins / (wins + losses), zero when no decided trades exist.
    pub win_rate: f64,
    /// Sum of trade PnL in dollars.
    pub total_pnl: Decimal,
    /// total_pnl / total_trades.
    pub ev_per_trade: Decimal,
    /// Most negative single-trade PnL (zero when nothing lost).
    pub worst_loss: Decimal,
    /// Largest peak-to-trough equity drop, folding trades in order.
    pub max_drawdown: Decimal,
    /// Longest run of consecutive losing trades.
    pub max_consecutive_losses: u32,
    /// Exit counts by reason.
    pub exit_reasons: ExitReasonCounts,

    // Touch/outcome categories (the reversal analysis)
    /// Windows where UP touched the threshold, over all windows.
    pub up_touch_windows: u32,
    /// Windows where DOWN touched the threshold, over all windows.
    pub down_touch_windows: u32,
    /// UP-touch windows among those with a clear winner.
    pub up_touch_clear: u32,
    /// DOWN-touch windows among those with a clear winner.
    pub down_touch_clear: u32,
    /// UP touched and UP won.
    pub up_touch_and_up_win: u32,
    /// UP touched and DOWN won (a reversal).
    pub up_touch_and_down_win: u32,
    /// DOWN touched and DOWN won.
    pub down_touch_and_down_win: u32,
    /// DOWN touched and UP won (a reversal).
    pub down_touch_and_up_win: u32,
    /// Reversals over all clear-winner touches.
    pub reversal_rate: f64,
}

impl SummaryStats {
    /// Aggregates one run. Pass the reports and trades that should count;
    /// the caller decides whether incomplete windows are included.
    #[must_use]
    pub fn from_run(reports: &[WindowReport], trades: &[Trade]) -> Self {
        let windows = reports.len() as u32;
        let clear_windows = reports.iter().filter(|r| r.winner.is_clear()).count() as u32;
        let unresolved_windows = windows - clear_windows;
        let incomplete_windows = reports
            .iter()
            .filter(|r| r.confidence == SelectionConfidence::Incomplete)
            .count() as u32;
        let multi_segment_windows = reports.iter().filter(|r| r.segment_count > 1).count() as u32;

        let total_trades = trades.len() as u32;
        let wins = trades.iter().filter(|t| t.is_win()).count() as u32;
        let losses = trades.iter().filter(|t| t.is_loss()).count() as u32;
        let decided = wins + losses;
        let win_rate = if decided > 0 {
            f64::from(wins) / f64::from(decided)
        } else {
            0.0
        };

        let total_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
        let ev_per_trade = if total_trades > 0 {
            total_pnl / Decimal::from(total_trades)
        } else {
            Decimal::ZERO
        };
        let worst_loss = trades
            .iter()
            .map(|t| t.pnl)
            .min()
            .unwrap_or(Decimal::ZERO)
            .min(Decimal::ZERO);

        let mut exit_reasons = ExitReasonCounts::default();
        for trade in trades {
            exit_reasons.record(trade.exit_reason);
        }

        let up_touch_windows = reports.iter().filter(|r| r.up_touched).count() as u32;
        let down_touch_windows = reports.iter().filter(|r| r.down_touched).count() as u32;

        let mut up_touch_clear = 0;
        let mut down_touch_clear = 0;
        let mut up_touch_and_up_win = 0;
        let mut up_touch_and_down_win = 0;
        let mut down_touch_and_down_win = 0;
        let mut down_touch_and_up_win = 0;
        for report in reports.iter().filter(|r| r.winner.is_clear()) {
            if report.up_touched {
                up_touch_clear += 1;
                match report.winner {
                    Winner::Up => up_touch_and_up_win += 1,
                    Winner::Down => up_touch_and_down_win += 1,
                    Winner::Unresolved => {}
                }
            }
            if report.down_touched {
                down_touch_clear += 1;
                match report.winner {
                    Winner::Down => down_touch_and_down_win += 1,
                    Winner::Up => down_touch_and_up_win += 1,
                    Winner::Unresolved => {}
                }
            }
        }
        let touches = up_touch_clear + down_touch_clear;
        let reversals = up_touch_and_down_win + down_touch_and_up_win;
        let reversal_rate = if touches > 0 {
            f64::from(reversals) / f64::from(touches)
        } else {
            0.0
        };

        Self {
            windows,
            clear_windows,
            unresolved_windows,
            incomplete_windows,
            multi_segment_windows,
            total_trades,
            wins,
            losses,
            win_rate,
            total_pnl,
            ev_per_trade,
            worst_loss,
            max_drawdown: calculate_max_drawdown(trades),
            max_consecutive_losses: calculate_max_consecutive_losses(trades),
            exit_reasons,
            up_touch_windows,
            down_touch_windows,
            up_touch_clear,
            down_touch_clear,
            up_touch_and_up_win,
            up_touch_and_down_win,
            down_touch_and_down_win,
            down_touch_and_up_win,
            reversal_rate,
        }
    }
}

/// Largest peak-to-trough drop of the equity curve, trades folded in order.
fn calculate_max_drawdown(trades: &[Trade]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut equity = Decimal::ZERO;
    let mut max_dd = Decimal::ZERO;

    for trade in trades {
        equity += trade.pnl;
        if equity > peak {
            peak = equity;
        }
        let drawdown = peak - equity;
        if drawdown > max_dd {
            max_dd = drawdown;
        }
    }

    max_dd
}

fn calculate_max_consecutive_losses(trades: &[Trade]) -> u32 {
    let mut current = 0u32;
    let mut max_streak = 0u32;

    for trade in trades {
        if trade.is_loss() {
            current += 1;
            if current > max_streak {
                max_streak = current;
            }
        } else {
            current = 0;
        }
    }

    max_streak
}

/// A broken accounting identity found after aggregation.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum InvariantViolation {
    #[error("{side} touch partition broken: {wins} wins + {reversals} reversals != {touches} clear touches")]
    TouchPartition {
        side: Side,
        wins: u32,
        reversals: u32,
        touches: u32,
    },
    #[error("{side} clear touches ({clear}) exceed total touches ({total})")]
    TouchExceedsTotal { side: Side, clear: u32, total: u32 },
    #[error("window partition broken: {clear} clear + {unresolved} unresolved != {windows} windows")]
    WindowPartition {
        clear: u32,
        unresolved: u32,
        windows: u32,
    },
    #[error("trade {window_id}/{side}: pnl {recorded} != {expected} from recorded prices")]
    PnlMismatch {
        window_id: String,
        side: Side,
        recorded: Decimal,
        expected: Decimal,
    },
    #[error("trade {window_id}/{side}: settlement price {price} contradicts winner {winner}")]
    SettlementMismatch {
        window_id: String,
        side: Side,
        price: u8,
        winner: Winner,
    },
    #[error("trade {window_id}/{side}: exit tick {exit} precedes entry tick {entry}")]
    ExitBeforeEntry {
        window_id: String,
        side: Side,
        entry: usize,
        exit: usize,
    },
    #[error("window {window_id} holds {count} {side} trades; at most one is allowed")]
    DuplicateTrade {
        window_id: String,
        side: Side,
        count: u32,
    },
    #[error("equity fold ends at {folded} but total pnl is {total}")]
    BalanceMismatch { folded: Decimal, total: Decimal },
}

/// Re-derives every identity the aggregation relies on and returns all
/// violations. An empty vector means the run is internally consistent.
#[must_use]
pub fn validate(
    summary: &SummaryStats,
    reports: &[WindowReport],
    trades: &[Trade],
    config: &StrategyConfig,
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    // Window partition.
    if summary.clear_windows + summary.unresolved_windows != summary.windows {
        violations.push(InvariantViolation::WindowPartition {
            clear: summary.clear_windows,
            unresolved: summary.unresolved_windows,
            windows: summary.windows,
        });
    }

    // Touch partitions: clear touches split exactly into wins and reversals,
    // and never exceed the all-window touch totals.
    if summary.up_touch_and_up_win + summary.up_touch_and_down_win != summary.up_touch_clear {
        violations.push(InvariantViolation::TouchPartition {
            side: Side::Up,
            wins: summary.up_touch_and_up_win,
            reversals: summary.up_touch_and_down_win,
            touches: summary.up_touch_clear,
        });
    }
    if summary.down_touch_and_down_win + summary.down_touch_and_up_win != summary.down_touch_clear {
        violations.push(InvariantViolation::TouchPartition {
            side: Side::Down,
            wins: summary.down_touch_and_down_win,
            reversals: summary.down_touch_and_up_win,
            touches: summary.down_touch_clear,
        });
    }
    if summary.up_touch_clear > summary.up_touch_windows {
        violations.push(InvariantViolation::TouchExceedsTotal {
            side: Side::Up,
            clear: summary.up_touch_clear,
            total: summary.up_touch_windows,
        });
    }
    if summary.down_touch_clear > summary.down_touch_windows {
        violations.push(InvariantViolation::TouchExceedsTotal {
            side: Side::Down,
            clear: summary.down_touch_clear,
            total: summary.down_touch_windows,
        });
    }

    // Per-trade checks.
    for trade in trades {
        let expected = trade_pnl(trade.entry_price_cents, trade.exit_price_cents, config);
        if trade.pnl != expected {
            violations.push(InvariantViolation::PnlMismatch {
                window_id: trade.window_id.clone(),
                side: trade.side,
                recorded: trade.pnl,
                expected,
            });
        }
        if trade.exit_tick < trade.entry_tick {
            violations.push(InvariantViolation::ExitBeforeEntry {
                window_id: trade.window_id.clone(),
                side: trade.side,
                entry: trade.entry_tick,
                exit: trade.exit_tick,
            });
        }
        if trade.exit_reason == ExitReason::Settlement {
            if let Some(report) = reports.iter().find(|r| r.id == trade.window_id) {
                let expected_price = settlement_price(report.winner, trade.side);
                if !report.winner.is_clear() || trade.exit_price_cents != expected_price {
                    violations.push(InvariantViolation::SettlementMismatch {
                        window_id: trade.window_id.clone(),
                        side: trade.side,
                        price: trade.exit_price_cents,
                        winner: report.winner,
                    });
                }
            }
        }
    }

    // At most one trade per (window, side).
    for (i, trade) in trades.iter().enumerate() {
        let count = trades[i..]
            .iter()
            .filter(|t| t.window_id == trade.window_id && t.side == trade.side)
            .count() as u32;
        let seen_before = trades[..i]
            .iter()
            .any(|t| t.window_id == trade.window_id && t.side == trade.side);
        if count > 1 && !seen_before {
            violations.push(InvariantViolation::DuplicateTrade {
                window_id: trade.window_id.clone(),
                side: trade.side,
                count,
            });
        }
    }

    // The equity fold must land exactly on the PnL sum.
    let folded: Decimal = trades.iter().map(|t| t.pnl).sum();
    if folded != summary.total_pnl {
        violations.push(InvariantViolation::BalanceMismatch {
            folded,
            total: summary.total_pnl,
        });
    }

    violations
}
