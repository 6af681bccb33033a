//! Tick-log loading for the UP/DOWN window backtester.
//!
//! This crate is the strict parse-or-reject boundary: raw textual tick logs
//! come in, validated [`window_backtest_core::Tick`] sequences come out.
//! Everything downstream operates on fully typed data.

pub mod loader;

pub use loader::{
    load_windows, parse_combined_file, parse_tick_line, parse_window_file, ParsedLine, RawWindow,
};
