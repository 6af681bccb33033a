//! Deterministic backtest engine for 15-minute UP/DOWN windows.
//!
//! The pipeline runs per window, strictly in tick arrival order:
//! segmentation (timer resets split the log), segment selection (which
//! contiguous run actually covers the window), resolution (the ground-truth
//! winner from the terminal tick), strategy simulation (one independent
//! state machine per side), and finally aggregation with invariant
//! validation over the whole batch.
//!
//! Everything here is synchronous, single-threaded, and free of I/O; the
//! same inputs always produce the same report.

pub mod engine;
pub mod metrics;
pub mod report;
pub mod resolve;
pub mod segment;
pub mod strategy;

pub use engine::{BacktestEngine, BacktestReport};
pub use metrics::{validate, ExitReasonCounts, InvariantViolation, SummaryStats};
pub use report::{ExitReason, SelectionConfidence, Trade, WindowReport};
pub use resolve::{resolve_window, Resolution};
pub use segment::{segment_by_reset, select_segment, Segment, Selection};
pub use strategy::{simulate_side, SideOutcome};
