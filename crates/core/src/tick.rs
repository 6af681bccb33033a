//! Tick model for paired UP/DOWN prediction-market price logs.
//!
//! A tick is one observation sampled every 1-2 seconds: relative seconds into
//! the window and one price per side in integer cents. A side whose price
//! fell outside [0, 100] in the raw log is stored as invalid (`None`); a line
//! with both sides invalid never becomes a `Tick` at all.

use serde::{Deserialize, Serialize};

/// One side of a binary UP/DOWN market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The "price goes up" outcome token.
    Up,
    /// The "price goes down" outcome token.
    Down,
}

impl Side {
    /// Returns the opposing side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// The authoritative outcome of a window at expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// UP held the higher price on the resolving tick.
    Up,
    /// DOWN held the higher price on the resolving tick.
    Down,
    /// No valid terminal tick, or a terminal tie. Never guessed.
    Unresolved,
}

impl Winner {
    /// Returns true if this outcome names the given side.
    #[must_use]
    pub fn is_side(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::Up, Side::Up) | (Self::Down, Side::Down)
        )
    }

    /// Returns true for a clear UP or DOWN outcome.
    #[must_use]
    pub fn is_clear(self) -> bool {
        self != Self::Unresolved
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Unresolved => write!(f, "UNRESOLVED"),
        }
    }
}

/// A single validated price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Seconds into the window. Fractional when the log carried a third
    /// `:FF` field. May exceed the nominal duration due to log noise.
    pub t_rel: f64,
    /// UP price in cents, `None` if the logged value was out of [0, 100].
    pub up: Option<u8>,
    /// DOWN price in cents, `None` if the logged value was out of [0, 100].
    pub down: Option<u8>,
}

impl Tick {
    /// Builds a tick from raw parsed integers, validating each side
    /// independently. Returns `None` when both sides are invalid; such an
    /// observation carries no information and must not enter a segment.
    #[must_use]
    pub fn from_raw(t_rel: f64, up: i64, down: i64) -> Option<Self> {
        let up = u8::try_from(up).ok().filter(|c| *c <= 100);
        let down = u8::try_from(down).ok().filter(|c| *c <= 100);
        if up.is_none() && down.is_none() {
            return None;
        }
        Some(Self { t_rel, up, down })
    }

    /// Convenience constructor for a fully valid tick.
    #[must_use]
    pub fn new(t_rel: f64, up: u8, down: u8) -> Self {
        Self {
            t_rel,
            up: Some(up),
            down: Some(down),
        }
    }

    /// Price of the given side in cents, if that side is valid.
    #[must_use]
    pub fn price(&self, side: Side) -> Option<u8> {
        match side {
            Side::Up => self.up,
            Side::Down => self.down,
        }
    }

    /// True when both sides carry a valid price.
    #[must_use]
    pub fn both_valid(&self) -> bool {
        self.up.is_some() && self.down.is_some()
    }

    /// True when the tick shows a terminally resolved book: one side at or
    /// above `resolve_min` cents and the other at or below its complement
    /// (e.g. 97c / 3c for `resolve_min = 97`).
    #[must_use]
    pub fn is_resolved(&self, resolve_min: u8) -> bool {
        match (self.up, self.down) {
            (Some(up), Some(down)) => {
                let hi = up.max(down);
                let lo = up.min(down);
                hi >= resolve_min && lo <= 100 - resolve_min.min(100)
            }
            _ => false,
        }
    }

    /// Sanity probe: UP + DOWN should sum to roughly one dollar. Out-of-band
    /// sums are logged upstream but never discarded.
    #[must_use]
    pub fn sum_is_sane(&self) -> bool {
        match (self.up, self.down) {
            (Some(up), Some(down)) => {
                let total = u16::from(up) + u16::from(down);
                (85..=115).contains(&total)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================
    // Side / Winner Tests
    // ============================================================

    #[test]
    fn side_opposite_flips() {
        assert_eq!(Side::Up.opposite(), Side::Down);
        assert_eq!(Side::Down.opposite(), Side::Up);
    }

    #[test]
    fn winner_is_side_matches_only_same_direction() {
        assert!(Winner::Up.is_side(Side::Up));
        assert!(Winner::Down.is_side(Side::Down));
        assert!(!Winner::Up.is_side(Side::Down));
        assert!(!Winner::Unresolved.is_side(Side::Up));
        assert!(!Winner::Unresolved.is_side(Side::Down));
    }

    #[test]
    fn winner_unresolved_is_not_clear() {
        assert!(Winner::Up.is_clear());
        assert!(Winner::Down.is_clear());
        assert!(!Winner::Unresolved.is_clear());
    }

    #[test]
    fn side_serializes_as_plain_variant() {
        assert_eq!(serde_json::to_string(&Side::Up).unwrap(), r#""Up""#);
        assert_eq!(serde_json::to_string(&Side::Down).unwrap(), r#""Down""#);
    }

    // ============================================================
    // Tick Validity Tests
    // ============================================================

    #[test]
    fn from_raw_accepts_in_range_prices() {
        let tick = Tick::from_raw(10.0, 55, 45).unwrap();
        assert_eq!(tick.up, Some(55));
        assert_eq!(tick.down, Some(45));
        assert!(tick.both_valid());
    }

    #[test]
    fn from_raw_marks_out_of_range_side_invalid() {
        let tick = Tick::from_raw(10.0, 120, 45).unwrap();
        assert_eq!(tick.up, None);
        assert_eq!(tick.down, Some(45));
        assert!(!tick.both_valid());

        let tick = Tick::from_raw(10.0, 55, -3).unwrap();
        assert_eq!(tick.up, Some(55));
        assert_eq!(tick.down, None);
    }

    #[test]
    fn from_raw_rejects_tick_with_both_sides_invalid() {
        assert!(Tick::from_raw(10.0, -1, 101).is_none());
        assert!(Tick::from_raw(10.0, 999, -999).is_none());
    }

    #[test]
    fn from_raw_accepts_boundary_prices() {
        let tick = Tick::from_raw(0.0, 0, 100).unwrap();
        assert_eq!(tick.up, Some(0));
        assert_eq!(tick.down, Some(100));
    }

    #[test]
    fn price_selects_requested_side() {
        let tick = Tick::new(5.0, 80, 20);
        assert_eq!(tick.price(Side::Up), Some(80));
        assert_eq!(tick.price(Side::Down), Some(20));
    }

    // ============================================================
    // Resolution Probe Tests
    // ============================================================

    #[test]
    fn is_resolved_requires_spike_and_collapse() {
        assert!(Tick::new(895.0, 98, 2).is_resolved(97));
        assert!(Tick::new(895.0, 1, 99).is_resolved(97));
        // Spike without the other side collapsing is not settled.
        assert!(!Tick::new(895.0, 98, 10).is_resolved(97));
        // Neither side near the boundary.
        assert!(!Tick::new(895.0, 60, 40).is_resolved(97));
    }

    #[test]
    fn is_resolved_false_when_a_side_is_invalid() {
        let tick = Tick::from_raw(895.0, 98, -1).unwrap();
        assert!(!tick.is_resolved(97));
    }

    #[test]
    fn is_resolved_exact_boundary() {
        assert!(Tick::new(900.0, 97, 3).is_resolved(97));
        assert!(!Tick::new(900.0, 96, 3).is_resolved(97));
        assert!(!Tick::new(900.0, 97, 4).is_resolved(97));
    }

    // ============================================================
    // Sum Sanity Tests
    // ============================================================

    #[test]
    fn sum_is_sane_accepts_near_par_books() {
        assert!(Tick::new(1.0, 55, 45).sum_is_sane());
        assert!(Tick::new(1.0, 50, 35).sum_is_sane()); // 85, lower bound
        assert!(Tick::new(1.0, 60, 55).sum_is_sane()); // 115, upper bound
    }

    #[test]
    fn sum_is_sane_rejects_broken_books() {
        assert!(!Tick::new(1.0, 20, 20).sum_is_sane());
        assert!(!Tick::new(1.0, 90, 90).sum_is_sane());
        assert!(!Tick::from_raw(1.0, 55, -1).unwrap().sum_is_sane());
    }
}
