//! Engine configuration.
//!
//! Every empirically tuned threshold in the pipeline lives here as an
//! explicit field with the historically used value as its default. Nothing
//! in the engine reads ambient state, so the same binary can run several
//! parameter sweeps side by side without interference. The defaults are
//! what worked on the recorded logs, not claims of optimality.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-level configuration passed into the backtest engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nominal window duration in seconds (15-minute markets by default).
    pub window_duration_secs: f64,
    /// Drop windows whose segment selection never reached nominal duration
    /// from win/loss aggregates (they always stay in diagnostics).
    pub exclude_incomplete: bool,
    pub segmenter: SegmenterConfig,
    pub resolver: ResolverConfig,
    pub strategy: StrategyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_duration_secs: 900.0,
            exclude_incomplete: false,
            segmenter: SegmenterConfig::default(),
            resolver: ResolverConfig::default(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Sets the nominal window duration.
    #[must_use]
    pub fn with_window_duration_secs(mut self, secs: f64) -> Self {
        self.window_duration_secs = secs;
        self
    }

    /// Sets whether incomplete windows are excluded from aggregates.
    #[must_use]
    pub fn with_exclude_incomplete(mut self, exclude: bool) -> Self {
        self.exclude_incomplete = exclude;
        self
    }

    /// Replaces the strategy section.
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Timer-reset segmentation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// A backward jump in `t_rel` larger than this starts a new segment.
    /// Small backward wiggles below it are sampling jitter, not resets.
    pub reset_tolerance_secs: f64,
    /// A forward gap between consecutive ticks larger than this also starts
    /// a new segment (stale or resumed logging).
    pub large_gap_secs: f64,
    /// A segment counts as covering the window when its last tick reaches
    /// within this many seconds of the nominal duration.
    pub completion_tolerance_secs: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            reset_tolerance_secs: 30.0,
            large_gap_secs: 180.0,
            completion_tolerance_secs: 30.0,
        }
    }
}

/// Winner-determination thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// A tick is terminally resolved when one side is at or above this and
    /// the other at or below its complement. Set above 100 to disable the
    /// spike scan and resolve purely from the last valid tick.
    pub resolve_min_cents: u8,
    /// Fallback guard: a last-tick spread narrower than this, combined with
    /// `unclear_dominance_cents`, yields Unresolved instead of a guess.
    pub unclear_margin_cents: u8,
    /// Fallback guard: the dominant side must be below this for the near-tie
    /// guard to fire.
    pub unclear_dominance_cents: u8,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolve_min_cents: 97,
            unclear_margin_cents: 5,
            unclear_dominance_cents: 60,
        }
    }
}

/// Entry/exit policy for the per-side state machine.
///
/// All prices are integer cents. `None` disables the corresponding filter or
/// exit rule; the default configuration is the bare first-touch strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Arm when the side's price first reaches this (cents).
    pub entry_threshold_cents: u8,
    /// Enter only after the price has held at/above the threshold this long.
    /// Zero enters on the touch tick itself.
    pub persistence_secs: f64,
    /// Only arm within the final N seconds before nominal expiry.
    pub entry_window_secs: Option<f64>,
    /// Skip entry if the opposite side is above this at the arming tick.
    pub opposite_max_cents: Option<u8>,
    /// Require the side to have gained at least this many cents over the
    /// momentum lookback before arming.
    pub momentum_min_gain_cents: Option<i16>,
    /// Lookback horizon for the momentum filter.
    pub momentum_lookback_secs: f64,
    /// Skip the trade entirely if the fill would exceed this price.
    pub max_entry_price_cents: Option<u8>,
    /// Added to the trigger price to model crossing the spread.
    pub slippage_cents: u8,
    /// Flat per-trade fee in cents per share.
    pub fee_cents: u8,
    /// Exit when our side trades at or below this.
    pub stop_loss_cents: Option<u8>,
    /// Exit when our side trades at or above this.
    pub take_profit_cents: Option<u8>,
    /// Exit when this many seconds have elapsed since entry.
    pub time_stop_secs: Option<f64>,
    /// Exit when the opposite side reaches this within the kill budget.
    pub opp_kill_cents: Option<u8>,
    /// Seconds after entry during which the opposite-kill rule is live.
    pub opp_kill_budget_secs: f64,
    /// Dollars committed per trade; PnL scales linearly with it.
    pub stake: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            entry_threshold_cents: 90,
            persistence_secs: 0.0,
            entry_window_secs: None,
            opposite_max_cents: None,
            momentum_min_gain_cents: None,
            momentum_lookback_secs: 20.0,
            max_entry_price_cents: None,
            slippage_cents: 0,
            fee_cents: 0,
            stop_loss_cents: None,
            take_profit_cents: None,
            time_stop_secs: None,
            opp_kill_cents: None,
            opp_kill_budget_secs: 20.0,
            stake: Decimal::ONE,
        }
    }
}

impl StrategyConfig {
    /// Sets the entry threshold.
    #[must_use]
    pub fn with_entry_threshold(mut self, cents: u8) -> Self {
        self.entry_threshold_cents = cents;
        self
    }

    /// Sets the persistence confirmation requirement.
    #[must_use]
    pub fn with_persistence_secs(mut self, secs: f64) -> Self {
        self.persistence_secs = secs;
        self
    }

    /// Restricts arming to the final N seconds of the window.
    #[must_use]
    pub fn with_entry_window_secs(mut self, secs: f64) -> Self {
        self.entry_window_secs = Some(secs);
        self
    }

    /// Sets the stop-loss exit level.
    #[must_use]
    pub fn with_stop_loss(mut self, cents: u8) -> Self {
        self.stop_loss_cents = Some(cents);
        self
    }

    /// Sets the take-profit exit level.
    #[must_use]
    pub fn with_take_profit(mut self, cents: u8) -> Self {
        self.take_profit_cents = Some(cents);
        self
    }

    /// Sets the time-stop.
    #[must_use]
    pub fn with_time_stop_secs(mut self, secs: f64) -> Self {
        self.time_stop_secs = Some(secs);
        self
    }

    /// Sets the opposite-kill trigger and budget.
    #[must_use]
    pub fn with_opp_kill(mut self, cents: u8, budget_secs: f64) -> Self {
        self.opp_kill_cents = Some(cents);
        self.opp_kill_budget_secs = budget_secs;
        self
    }

    /// Sets the stake per trade.
    #[must_use]
    pub fn with_stake(mut self, stake: Decimal) -> Self {
        self.stake = stake;
        self
    }
}
