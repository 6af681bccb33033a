//! Per-side strategy simulation.
//!
//! One machine per side, UP and DOWN simulated independently over the same
//! segment; both may hold at once. The machine walks ticks strictly in
//! arrival order and never reads ahead: every filter is evaluated from the
//! current tick and the ticks already seen. States run
//! `Idle → Armed → Entered → Done`, where `Armed` is the persistence
//! confirmation phase between the threshold touch and the fill. `Done` is
//! terminal; there is no re-entry and no pyramiding.

use rust_decimal::Decimal;
use tracing::debug;
use window_backtest_core::{Side, StrategyConfig, Tick, Winner};

use crate::report::{ExitReason, Trade};
use crate::resolve::Resolution;

/// What one side's machine produced over a window.
#[derive(Debug, Clone, PartialEq)]
pub enum SideOutcome {
    /// The entry conditions never fired.
    NoEntry,
    /// A completed round trip.
    Trade(Trade),
    /// A position was held to expiry of an unresolved window. No settlement
    /// price exists, so the position is discarded and reported upstream.
    DiscardedUnresolved {
        /// Entry tick index, relative to the window's tick sequence.
        entry_tick: usize,
    },
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Armed { since: f64 },
    Entered(Position),
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Position {
    tick: usize,
    time: f64,
    fill: u8,
}

/// Runs one side's machine over a segment.
///
/// `ticks` is the selected segment's slice of the window tick sequence and
/// `base_index` the slice's offset within it; tick indices in the returned
/// trade are window-relative. `resolution` must come from the same slice.
#[must_use]
pub fn simulate_side(
    window_id: &str,
    side: Side,
    ticks: &[Tick],
    base_index: usize,
    resolution: &Resolution,
    config: &StrategyConfig,
    window_duration_secs: f64,
) -> SideOutcome {
    let mut state = State::Idle;

    for (i, tick) in ticks.iter().enumerate() {
        state = match state {
            State::Idle => try_arm(i, tick, ticks, side, config, window_duration_secs),
            State::Armed { since } => {
                advance_armed(since, i, tick, ticks, side, config, window_duration_secs)
            }
            State::Entered(position) => {
                match check_exits(&position, i, tick, side, config) {
                    Some((reason, exit_price)) => {
                        let trade = close(
                            window_id, side, &position, base_index, i, tick.t_rel, exit_price,
                            reason, config,
                        );
                        return SideOutcome::Trade(trade);
                    }
                    None => State::Entered(position),
                }
            }
            State::Done => return SideOutcome::NoEntry,
        };
    }

    // End of data with a live position: settle against the resolved winner.
    let State::Entered(position) = state else {
        return SideOutcome::NoEntry;
    };

    if !resolution.winner.is_clear() {
        debug!(window_id, %side, "position held into unresolved expiry; discarded");
        return SideOutcome::DiscardedUnresolved {
            entry_tick: base_index + position.tick,
        };
    }

    let exit_price = if resolution.winner.is_side(side) { 100 } else { 0 };
    let last = ticks.len() - 1;
    let trade = close(
        window_id,
        side,
        &position,
        base_index,
        last,
        ticks[last].t_rel,
        exit_price,
        ExitReason::Settlement,
        config,
    );
    SideOutcome::Trade(trade)
}

/// Attempts the Idle → Armed transition (and the immediate fill when no
/// persistence is required).
fn try_arm(
    i: usize,
    tick: &Tick,
    ticks: &[Tick],
    side: Side,
    config: &StrategyConfig,
    window_duration_secs: f64,
) -> State {
    let Some(price) = tick.price(side) else {
        return State::Idle;
    };
    if price < config.entry_threshold_cents {
        return State::Idle;
    }
    if !passes_entry_filters(i, tick, ticks, side, config, window_duration_secs) {
        return State::Idle;
    }
    if config.persistence_secs <= 0.0 {
        return fill_or_skip(i, tick.t_rel, price, side, config);
    }
    State::Armed { since: tick.t_rel }
}

/// Advances the persistence clock, entering once the price has held at or
/// above threshold long enough. Any dip (or a lost quote) disarms back to
/// Idle; the machine may re-arm on a later touch.
fn advance_armed(
    since: f64,
    i: usize,
    tick: &Tick,
    ticks: &[Tick],
    side: Side,
    config: &StrategyConfig,
    window_duration_secs: f64,
) -> State {
    let Some(price) = tick.price(side) else {
        return State::Idle;
    };
    if price < config.entry_threshold_cents {
        // Re-arming goes through the full filter set again.
        return try_arm(i, tick, ticks, side, config, window_duration_secs);
    }
    if tick.t_rel - since >= config.persistence_secs {
        return fill_or_skip(i, tick.t_rel, price, side, config);
    }
    State::Armed { since }
}

fn fill_or_skip(i: usize, time: f64, trigger: u8, side: Side, config: &StrategyConfig) -> State {
    let fill = trigger.saturating_add(config.slippage_cents).min(100);
    if let Some(cap) = config.max_entry_price_cents {
        if fill > cap {
            debug!(%side, fill, cap, "fill above price cap; trade skipped");
            return State::Done;
        }
    }
    State::Entered(Position {
        tick: i,
        time,
        fill,
    })
}

fn passes_entry_filters(
    i: usize,
    tick: &Tick,
    ticks: &[Tick],
    side: Side,
    config: &StrategyConfig,
    window_duration_secs: f64,
) -> bool {
    if let Some(window) = config.entry_window_secs {
        if tick.t_rel < window_duration_secs - window {
            return false;
        }
    }
    if let Some(cap) = config.opposite_max_cents {
        if let Some(opp) = tick.price(side.opposite()) {
            if opp > cap {
                return false;
            }
        }
    }
    if let Some(min_gain) = config.momentum_min_gain_cents {
        let Some(gain) = momentum_gain(i, tick, ticks, side, config.momentum_lookback_secs)
        else {
            return false;
        };
        if gain < min_gain {
            return false;
        }
    }
    true
}

/// Price gain over the lookback horizon, measured against the oldest
/// already-seen tick inside it. `None` when the side has no valid quote in
/// the lookback (besides the current tick).
fn momentum_gain(
    i: usize,
    tick: &Tick,
    ticks: &[Tick],
    side: Side,
    lookback_secs: f64,
) -> Option<i16> {
    let horizon = tick.t_rel - lookback_secs;
    let reference = ticks[..i]
        .iter()
        .filter(|t| t.t_rel >= horizon)
        .find_map(|t| t.price(side))?;
    let current = tick.price(side)?;
    Some(i16::from(current) - i16::from(reference))
}

/// Checks the exit rules on one tick, first hit wins. Evaluation order:
/// take-profit, stop-loss, opposite-kill, time-stop.
fn check_exits(
    position: &Position,
    i: usize,
    tick: &Tick,
    side: Side,
    config: &StrategyConfig,
) -> Option<(ExitReason, u8)> {
    if i <= position.tick {
        return None;
    }
    let price = tick.price(side);
    let opp = tick.price(side.opposite());
    let held = tick.t_rel - position.time;

    if let (Some(tp), Some(p)) = (config.take_profit_cents, price) {
        if p >= tp {
            return Some((ExitReason::TakeProfit, p));
        }
    }
    if let (Some(sl), Some(p)) = (config.stop_loss_cents, price) {
        if p <= sl {
            return Some((ExitReason::StopLoss, p));
        }
    }
    if let (Some(kill), Some(o)) = (config.opp_kill_cents, opp) {
        if o >= kill && held <= config.opp_kill_budget_secs {
            // Our own quote may be gone on the kill tick; mark against the
            // opposite book.
            let exit = price.unwrap_or(100u8.saturating_sub(o));
            return Some((ExitReason::OppKill, exit));
        }
    }
    if let Some(limit) = config.time_stop_secs {
        if held > limit {
            // Needs a price to mark the exit at; an all-invalid tick defers
            // to the next one.
            if let Some(exit) = price.or_else(|| opp.map(|o| 100u8.saturating_sub(o))) {
                return Some((ExitReason::TimeStop, exit));
            }
        }
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn close(
    window_id: &str,
    side: Side,
    position: &Position,
    base_index: usize,
    exit_tick: usize,
    exit_time: f64,
    exit_price: u8,
    reason: ExitReason,
    config: &StrategyConfig,
) -> Trade {
    Trade {
        window_id: window_id.to_string(),
        side,
        entry_tick: base_index + position.tick,
        entry_time_secs: position.time,
        entry_price_cents: position.fill,
        exit_tick: base_index + exit_tick,
        exit_time_secs: exit_time,
        exit_price_cents: exit_price,
        exit_reason: reason,
        pnl: trade_pnl(position.fill, exit_price, config),
    }
}

/// Dollars realized: (exit − entry − fee) cents, scaled by the stake.
#[must_use]
pub fn trade_pnl(entry_cents: u8, exit_cents: u8, config: &StrategyConfig) -> Decimal {
    let net = i32::from(exit_cents) - i32::from(entry_cents) - i32::from(config.fee_cents);
    Decimal::from(net) / Decimal::from(100) * config.stake
}

/// Settlement price for one side given a clear winner.
#[must_use]
pub fn settlement_price(winner: Winner, side: Side) -> u8 {
    if winner.is_side(side) {
        100
    } else {
        0
    }
}
