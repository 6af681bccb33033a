//! Core types and configuration for the UP/DOWN window backtester.
//!
//! This crate defines the validated tick model shared by the loader and the
//! simulation engine, plus the explicit configuration structures that make
//! every empirical threshold a parameter rather than ambient state.

pub mod config;
pub mod config_loader;
pub mod tick;

pub use config::{EngineConfig, ResolverConfig, SegmenterConfig, StrategyConfig};
pub use config_loader::ConfigLoader;
pub use tick::{Side, Tick, Winner};
