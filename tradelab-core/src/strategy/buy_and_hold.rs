//! Buy-and-hold baseline strategy.

use super::{Strategy, StrategyContext, StrategyError};
use crate::domain::{Bar, DomainError, Order, Side, Symbol};
use serde_json::Value;
use std::collections::HashMap;

/// Buys each universe symbol once, on its first bar, and holds.
pub struct BuyAndHold {
    position_size: f64,
    entered: HashMap<Symbol, bool>,
}

impl BuyAndHold {
    pub fn new(position_size: f64) -> Result<Self, DomainError> {
        if !(position_size > 0.0) {
            return Err(DomainError::InvalidParameter(format!(
                "position size must be positive: {position_size}"
            )));
        }
        Ok(Self {
            position_size,
            entered: HashMap::new(),
        })
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn on_start(&mut self, universe: &[String], _params: &Value) {
        for symbol in universe {
            self.entered.insert(symbol.clone(), false);
        }
    }

    fn on_bar(
        &mut self,
        bar: &Bar,
        ctx: &mut StrategyContext,
    ) -> Result<Vec<Order>, StrategyError> {
        match self.entered.get_mut(&bar.symbol) {
            Some(entered) if !*entered => *entered = true,
            _ => return Ok(Vec::new()),
        }

        let order = Order::market(
            ctx.next_order_id(),
            bar.ts,
            &bar.symbol,
            Side::Buy,
            self.position_size,
        )
        .map_err(|e| StrategyError::new(e.to_string()))?;
        Ok(vec![order])
    }

    fn on_end(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        self.entered.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderIdGen, Portfolio};
    use chrono::{TimeZone, Utc};

    fn bar(symbol: &str, day: u32, close: f64) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            symbol,
            close,
            close + 1.0,
            close - 1.0,
            close,
            1_000.0,
        )
        .unwrap()
    }

    #[test]
    fn position_size_must_be_positive() {
        assert!(BuyAndHold::new(0.0).is_err());
        assert!(BuyAndHold::new(-1.0).is_err());
        assert!(BuyAndHold::new(2.5).is_ok());
    }

    #[test]
    fn buys_once_per_symbol() {
        let mut strategy = BuyAndHold::new(1.0).unwrap();
        strategy.on_start(
            &["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            &Value::Null,
        );

        let portfolio = Portfolio::new(10_000.0);
        let prices = HashMap::new();
        let mut ids = OrderIdGen::default();

        let mut total = 0;
        for (day, symbol) in [
            (2, "BTCUSDT"),
            (3, "BTCUSDT"),
            (3, "ETHUSDT"),
            (4, "ETHUSDT"),
        ] {
            let mut ctx = StrategyContext::new(&portfolio, &prices, 1, &mut ids);
            let orders = strategy
                .on_bar(&bar(symbol, day, 100.0), &mut ctx)
                .unwrap();
            total += orders.len();
            for order in &orders {
                assert_eq!(order.side, Side::Buy);
                assert_eq!(order.symbol, symbol);
            }
        }
        assert_eq!(total, 2);
    }

    #[test]
    fn ignores_unknown_symbols() {
        let mut strategy = BuyAndHold::new(1.0).unwrap();
        strategy.on_start(&["BTCUSDT".to_string()], &Value::Null);

        let portfolio = Portfolio::new(10_000.0);
        let prices = HashMap::new();
        let mut ids = OrderIdGen::default();
        let mut ctx = StrategyContext::new(&portfolio, &prices, 1, &mut ids);
        assert!(strategy
            .on_bar(&bar("ETHUSDT", 2, 100.0), &mut ctx)
            .unwrap()
            .is_empty());
    }
}
