//! Per-window and per-trade result records.
//!
//! These are the rows the CSV/JSON writers serialize and the aggregator
//! consumes. Nothing downstream mutates them; the engine emits each record
//! exactly once per window.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use window_backtest_core::{Side, Winner};

/// Whether the selected segment actually covered the nominal window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionConfidence {
    /// The segment's last tick reached within tolerance of nominal expiry.
    Complete,
    /// No segment reached nominal expiry; the longest-running one was used.
    Incomplete,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Our side traded at or above the take-profit level.
    TakeProfit,
    /// Our side traded at or below the stop-loss level.
    StopLoss,
    /// The holding-time limit elapsed.
    TimeStop,
    /// The opposite side spiked within the kill budget after entry.
    OppKill,
    /// Held to expiry; settled at 100c or 0c by the resolved winner.
    Settlement,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TakeProfit => write!(f, "TAKE_PROFIT"),
            Self::StopLoss => write!(f, "STOP_LOSS"),
            Self::TimeStop => write!(f, "TIME_STOP"),
            Self::OppKill => write!(f, "OPP_KILL"),
            Self::Settlement => write!(f, "SETTLEMENT"),
        }
    }
}

/// One simulated round trip. At most one exists per (window, side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Window the trade belongs to.
    pub window_id: String,
    /// Which side's token was bought.
    pub side: Side,
    /// Index of the entry tick within the window's tick sequence.
    pub entry_tick: usize,
    /// Seconds into the window at entry.
    pub entry_time_secs: f64,
    /// Fill price in cents, slippage included.
    pub entry_price_cents: u8,
    /// Index of the exit tick within the window's tick sequence.
    pub exit_tick: usize,
    /// Seconds into the window at exit.
    pub exit_time_secs: f64,
    /// Exit price in cents (100 or 0 for settlement).
    pub exit_price_cents: u8,
    /// What closed the position.
    pub exit_reason: ExitReason,
    /// Realized profit in dollars: (exit − entry − fee) / 100 × stake.
    pub pnl: Decimal,
}

impl Trade {
    /// True when the trade realized a profit.
    #[must_use]
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    /// True when the trade realized a loss.
    #[must_use]
    pub fn is_loss(&self) -> bool {
        self.pnl < Decimal::ZERO
    }
}

/// Everything the engine learned about one window.
///
/// Produced even for degenerate windows (empty, unresolvable); the `issues`
/// list carries human-readable diagnostics for those.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowReport {
    /// Window identifier (file stem or `Window:` header).
    pub id: String,
    /// Ticks that survived parsing.
    pub total_ticks: u32,
    /// Lines that matched the tick pattern but carried no valid side.
    pub dropped_ticks: u32,
    /// Lines that matched nothing.
    pub skipped_lines: u32,
    /// Contiguous runs found by reset detection.
    pub segment_count: u32,
    /// Which segment was analyzed (index into the segment list).
    pub selected_segment: usize,
    /// Whether the selected segment covered the nominal window.
    pub confidence: SelectionConfidence,
    /// Ground-truth outcome.
    pub winner: Winner,
    /// Index of the resolving tick within the window's tick sequence.
    pub resolving_tick: Option<usize>,
    /// Seconds into the window at the resolving tick.
    pub resolve_time_secs: Option<f64>,
    /// Invalid ticks skipped walking back from the segment's end.
    pub trailing_invalid: u32,
    /// Highest valid UP price seen in the selected segment.
    pub up_max_cents: Option<u8>,
    /// Highest valid DOWN price seen in the selected segment.
    pub down_max_cents: Option<u8>,
    /// UP reached the touch threshold anywhere in the selected segment.
    pub up_touched: bool,
    /// DOWN reached the touch threshold anywhere in the selected segment.
    pub down_touched: bool,
    /// UP reached the threshold strictly before the resolving tick.
    pub up_touched_pre_resolve: bool,
    /// DOWN reached the threshold strictly before the resolving tick.
    pub down_touched_pre_resolve: bool,
    /// Diagnostics accumulated while processing this window.
    pub issues: Vec<String>,
}

impl WindowReport {
    /// True when a side touched the threshold and then lost the window.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        match self.winner {
            Winner::Up => self.down_touched,
            Winner::Down => self.up_touched,
            Winner::Unresolved => false,
        }
    }

    /// Touch flag for one side.
    #[must_use]
    pub fn touched(&self, side: Side) -> bool {
        match side {
            Side::Up => self.up_touched,
            Side::Down => self.down_touched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn report(winner: Winner, up_touched: bool, down_touched: bool) -> WindowReport {
        WindowReport {
            id: "w1".to_string(),
            total_ticks: 10,
            dropped_ticks: 0,
            skipped_lines: 0,
            segment_count: 1,
            selected_segment: 0,
            confidence: SelectionConfidence::Complete,
            winner,
            resolving_tick: Some(9),
            resolve_time_secs: Some(899.0),
            trailing_invalid: 0,
            up_max_cents: Some(95),
            down_max_cents: Some(40),
            up_touched,
            down_touched,
            up_touched_pre_resolve: up_touched,
            down_touched_pre_resolve: down_touched,
            issues: Vec::new(),
        }
    }

    // ============================================================
    // WindowReport Tests
    // ============================================================

    #[test]
    fn reversal_means_the_touching_side_lost() {
        assert!(report(Winner::Down, true, false).is_reversal());
        assert!(report(Winner::Up, false, true).is_reversal());
        assert!(!report(Winner::Up, true, false).is_reversal());
        assert!(!report(Winner::Unresolved, true, true).is_reversal());
    }

    // ============================================================
    // Trade Tests
    // ============================================================

    #[test]
    fn trade_win_loss_classification_follows_pnl_sign() {
        let mut trade = Trade {
            window_id: "w1".to_string(),
            side: Side::Up,
            entry_tick: 3,
            entry_time_secs: 700.0,
            entry_price_cents: 91,
            exit_tick: 9,
            exit_time_secs: 899.0,
            exit_price_cents: 100,
            exit_reason: ExitReason::Settlement,
            pnl: dec!(0.09),
        };
        assert!(trade.is_win());
        assert!(!trade.is_loss());

        trade.pnl = dec!(-0.91);
        assert!(trade.is_loss());

        trade.pnl = Decimal::ZERO;
        assert!(!trade.is_win());
        assert!(!trade.is_loss());
    }

    #[test]
    fn exit_reason_display_matches_report_vocabulary() {
        assert_eq!(ExitReason::TakeProfit.to_string(), "TAKE_PROFIT");
        assert_eq!(ExitReason::OppKill.to_string(), "OPP_KILL");
        assert_eq!(ExitReason::Settlement.to_string(), "SETTLEMENT");
    }
}
