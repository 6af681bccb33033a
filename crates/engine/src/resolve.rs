//! Ground-truth winner determination.
//!
//! The winner is decided only by the terminal state of the selected segment.
//! A mid-window spike to 90c+ means nothing if the book later reverses; the
//! touch-then-lose windows are exactly the ones the strategy analysis cares
//! about, so resolution must never leak information from earlier ticks.
//!
//! Two passes, both walking backward from the segment's end:
//! 1. spike scan: the last tick where one side sits at or above
//!    `resolve_min_cents` with the other at or below its complement is a
//!    terminally resolved book and supplies the winner directly;
//! 2. fallback: the last tick with both sides valid decides by comparison,
//!    unless it is a tie or a near-tie with no dominant side, in which case
//!    the window stays unresolved rather than guessed.

use tracing::warn;
use window_backtest_core::{ResolverConfig, Side, Tick, Winner};

/// Outcome of resolving one segment.
///
/// Tick indices are relative to the slice passed to [`resolve_window`];
/// callers offset them back into the window's tick sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// The winning side, or `Unresolved` when the log cannot say.
    pub winner: Winner,
    /// Index of the tick that decided the outcome.
    pub resolving_tick: Option<usize>,
    /// `t_rel` of the resolving tick.
    pub resolve_time_secs: Option<f64>,
    /// Invalid ticks skipped walking back from the end (fallback pass only).
    pub trailing_invalid: u32,
}

impl Resolution {
    fn unresolved(trailing_invalid: u32) -> Self {
        Self {
            winner: Winner::Unresolved,
            resolving_tick: None,
            resolve_time_secs: None,
            trailing_invalid,
        }
    }
}

/// Resolves the winner from a segment's ticks.
///
/// Pure and idempotent: resolving the same slice twice yields identical
/// results, and nothing before the resolving tick influences the outcome.
#[must_use]
pub fn resolve_window(ticks: &[Tick], config: &ResolverConfig) -> Resolution {
    // Spike scan. A 97/3 book cannot un-resolve in practice, so the last
    // such tick is authoritative even if later ticks lost a side to
    // parsing. Disabled when resolve_min_cents > 100.
    if config.resolve_min_cents <= 100 {
        for (i, tick) in ticks.iter().enumerate().rev() {
            if tick.is_resolved(config.resolve_min_cents) {
                return resolve_from(tick, i, config, 0);
            }
        }
    }

    // Fallback: last tick with both sides valid.
    let mut trailing_invalid = 0u32;
    for (i, tick) in ticks.iter().enumerate().rev() {
        if tick.both_valid() {
            return resolve_from(tick, i, config, trailing_invalid);
        }
        trailing_invalid += 1;
    }

    warn!(
        ticks = ticks.len(),
        "no tick with both sides valid; window unresolved"
    );
    Resolution::unresolved(trailing_invalid)
}

fn resolve_from(tick: &Tick, index: usize, config: &ResolverConfig, trailing: u32) -> Resolution {
    let (Some(up), Some(down)) = (tick.up, tick.down) else {
        return Resolution::unresolved(trailing);
    };

    if up == down {
        return Resolution::unresolved(trailing);
    }

    // Near-tie guard: a 52/48 close with neither side dominant is noise,
    // not an outcome.
    let spread = up.abs_diff(down);
    let dominant = up.max(down);
    if spread < config.unclear_margin_cents && dominant < config.unclear_dominance_cents {
        return Resolution::unresolved(trailing);
    }

    let winner = if up > down {
        Winner::Up
    } else {
        Winner::Down
    };
    Resolution {
        winner,
        resolving_tick: Some(index),
        resolve_time_secs: Some(tick.t_rel),
        trailing_invalid: trailing,
    }
}

/// Highest valid price either side reached in the slice.
#[must_use]
pub fn max_price(ticks: &[Tick], side: Side) -> Option<u8> {
    ticks.iter().filter_map(|t| t.price(side)).max()
}
