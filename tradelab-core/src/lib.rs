//! TradeLab Core — the deterministic backtesting engine.
//!
//! This crate contains everything needed to run a backtest in-process:
//! - Domain types (bars, orders, fills, positions, portfolio, trades)
//! - Execution models (slippage, fees, order-to-fill resolution)
//! - Brokers (simulated, paper with bar delay)
//! - Portfolio accounting with trade lifecycle and equity curve
//! - Clocks (historical, scheduled, multi-symbol interleaving)
//! - Recorders (full audit trail, streaming, minimal)
//! - Strategy contract, reference strategies, and registry
//! - The simulator driving the per-bar event loop

pub mod domain;
pub mod engine;
pub mod strategy;
