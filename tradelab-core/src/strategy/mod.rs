//! Strategy contract, reference strategies, and the registry.
//!
//! Strategies see each bar after that bar's fills have been applied, and
//! communicate with the engine only through returned orders. They never
//! mutate the portfolio and never consult wall-clock time: the bar
//! sequence alone determines the orders they emit.

pub mod buy_and_hold;
pub mod registry;
pub mod sma_cross;

pub use buy_and_hold::BuyAndHold;
pub use registry::{RegistryError, StrategyInfo, StrategyRegistry, StrategyRegistryBuilder};
pub use sma_cross::SmaCross;

use crate::domain::{Bar, Order, OrderId, OrderIdGen, Portfolio, Symbol};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Fatal strategy failure raised from `on_bar`.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StrategyError(String);

impl StrategyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for StrategyError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for StrategyError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Read-only view of the run handed to a strategy on every bar.
///
/// Order ids come from the run's monotonic generator, so the emitted order
/// sequence is reproducible.
pub struct StrategyContext<'a> {
    portfolio: &'a Portfolio,
    current_prices: &'a HashMap<Symbol, f64>,
    bar_count: usize,
    ids: &'a mut OrderIdGen,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        portfolio: &'a Portfolio,
        current_prices: &'a HashMap<Symbol, f64>,
        bar_count: usize,
        ids: &'a mut OrderIdGen,
    ) -> Self {
        Self {
            portfolio,
            current_prices,
            bar_count,
            ids,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio
    }

    /// Latest close seen for a symbol.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.current_prices.get(symbol).copied()
    }

    pub fn current_prices(&self) -> &HashMap<Symbol, f64> {
        self.current_prices
    }

    /// Bars processed so far, including the current one.
    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    /// Signed quantity held in a symbol (0 when flat).
    pub fn position_qty(&self, symbol: &str) -> f64 {
        self.portfolio.position_qty(symbol)
    }

    /// Next deterministic order id.
    pub fn next_order_id(&mut self) -> OrderId {
        self.ids.next_id()
    }
}

/// The strategy contract: `on_start`, `on_bar`, `on_end`.
pub trait Strategy: Send {
    /// Unique strategy identifier.
    fn name(&self) -> &str;

    /// Called once before the loop. `params` carries the raw run
    /// parameters for strategies that want them.
    fn on_start(&mut self, _universe: &[String], _params: &Value) {}

    /// Called once per bar, after that bar's fills. Errors abort the run.
    fn on_bar(
        &mut self,
        bar: &Bar,
        ctx: &mut StrategyContext,
    ) -> Result<Vec<Order>, StrategyError>;

    /// Called once after the feed is exhausted. Errors are logged and
    /// swallowed by the simulator.
    fn on_end(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name()).finish()
    }
}
