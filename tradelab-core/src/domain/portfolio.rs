//! Portfolio — aggregate cash + positions, and the equity curve point type.

use super::fill::Fill;
use super::position::Position;
use super::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate portfolio state.
///
/// The equity identity holds at every mark-to-market:
/// `equity == cash + sum(position.qty * current_price)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub equity: f64,
    pub positions: HashMap<Symbol, Position>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            equity: initial_cash,
            positions: HashMap::new(),
        }
    }

    /// Apply a fill: update cash, update the position, drop it when flat.
    pub fn apply_fill(&mut self, fill: &Fill) {
        self.cash += fill.net_cash_flow();

        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone()));
        position.apply(fill);

        if position.is_flat() {
            self.positions.remove(&fill.symbol);
        }
    }

    /// Recompute equity from current prices.
    ///
    /// Symbols missing from `prices` are valued at their average entry price.
    pub fn mark_to_market(&mut self, prices: &HashMap<Symbol, f64>) {
        let positions_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.avg_price);
                pos.market_value(price)
            })
            .sum();
        self.equity = self.cash + positions_value;
    }

    /// Gross exposure as a fraction of equity. Zero when equity is zero.
    pub fn exposure(&self) -> f64 {
        if self.equity == 0.0 {
            return 0.0;
        }
        let gross: f64 = self
            .positions
            .values()
            .map(|pos| (pos.qty * pos.avg_price).abs())
            .sum();
        gross / self.equity
    }

    /// Position for a symbol, if open.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Signed quantity held in a symbol (0 when flat).
    pub fn position_qty(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.qty)
    }
}

/// One point on the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: DateTime<Utc>,
    pub equity: f64,
    pub cash: f64,
    pub positions_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderId, Side};
    use chrono::TimeZone;

    fn fill(side: Side, qty: f64, price: f64, fee: f64) -> Fill {
        Fill::new(
            OrderId(1),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            "BTCUSDT",
            side,
            qty,
            price,
            fee,
        )
        .unwrap()
    }

    #[test]
    fn buy_reduces_cash_by_notional_plus_fee() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(&fill(Side::Buy, 2.0, 50.0, 0.10));
        assert!((portfolio.cash - 9_899.90).abs() < 1e-10);
        assert_eq!(portfolio.position_qty("BTCUSDT"), 2.0);
    }

    #[test]
    fn flat_position_is_removed() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(&fill(Side::Buy, 1.0, 100.0, 0.0));
        portfolio.apply_fill(&fill(Side::Sell, 1.0, 110.0, 0.0));
        assert!(portfolio.positions.is_empty());
        assert!((portfolio.cash - 10_010.0).abs() < 1e-10);
    }

    #[test]
    fn mark_to_market_uses_current_prices() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(&fill(Side::Buy, 1.0, 100.0, 0.0));
        let mut prices = HashMap::new();
        prices.insert("BTCUSDT".to_string(), 120.0);
        portfolio.mark_to_market(&prices);
        assert!((portfolio.equity - 10_020.0).abs() < 1e-10);
    }

    #[test]
    fn mark_to_market_falls_back_to_avg_price() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(&fill(Side::Buy, 1.0, 100.0, 0.0));
        portfolio.mark_to_market(&HashMap::new());
        assert!((portfolio.equity - 10_000.0).abs() < 1e-10);
    }

    #[test]
    fn exposure_is_gross_over_equity() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(&fill(Side::Buy, 1.0, 100.0, 0.0));
        let mut prices = HashMap::new();
        prices.insert("BTCUSDT".to_string(), 100.0);
        portfolio.mark_to_market(&prices);
        assert!((portfolio.exposure() - 100.0 / 10_000.0).abs() < 1e-10);
    }
}
