//! Simple moving-average crossover strategy.

use super::{Strategy, StrategyContext, StrategyError};
use crate::domain::{Bar, DomainError, Order, Side, Symbol};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// Buys when the fast SMA crosses above the slow SMA, exits a long when it
/// crosses back below.
///
/// Per-symbol close buffers; no signal is emitted until both buffers are
/// full, and an order only on a sign change of `fast - slow`. A bullish
/// cross buys `|current short| + position_size`; a bearish cross from a
/// long sells the long quantity.
pub struct SmaCross {
    fast: usize,
    slow: usize,
    position_size: f64,
    buffers: HashMap<Symbol, (VecDeque<f64>, VecDeque<f64>)>,
    prev_signal: HashMap<Symbol, i8>,
}

impl SmaCross {
    /// Requires `2 <= fast < slow` and a positive position size.
    pub fn new(fast: usize, slow: usize, position_size: f64) -> Result<Self, DomainError> {
        if fast >= slow {
            return Err(DomainError::InvalidParameter(format!(
                "fast period ({fast}) must be < slow period ({slow})"
            )));
        }
        if fast < 2 {
            return Err(DomainError::InvalidParameter(
                "MA periods must be >= 2".into(),
            ));
        }
        if !(position_size > 0.0) {
            return Err(DomainError::InvalidParameter(format!(
                "position size must be positive: {position_size}"
            )));
        }
        Ok(Self {
            fast,
            slow,
            position_size,
            buffers: HashMap::new(),
            prev_signal: HashMap::new(),
        })
    }
}

fn mean(values: &VecDeque<f64>) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn push_capped(buffer: &mut VecDeque<f64>, cap: usize, value: f64) {
    if buffer.len() == cap {
        buffer.pop_front();
    }
    buffer.push_back(value);
}

impl Strategy for SmaCross {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn on_start(&mut self, universe: &[String], _params: &Value) {
        for symbol in universe {
            self.buffers.insert(
                symbol.clone(),
                (
                    VecDeque::with_capacity(self.fast),
                    VecDeque::with_capacity(self.slow),
                ),
            );
            self.prev_signal.insert(symbol.clone(), 0);
        }
    }

    fn on_bar(
        &mut self,
        bar: &Bar,
        ctx: &mut StrategyContext,
    ) -> Result<Vec<Order>, StrategyError> {
        let Some((fast_buf, slow_buf)) = self.buffers.get_mut(&bar.symbol) else {
            return Ok(Vec::new());
        };

        push_capped(fast_buf, self.fast, bar.close);
        push_capped(slow_buf, self.slow, bar.close);

        if fast_buf.len() < self.fast || slow_buf.len() < self.slow {
            return Ok(Vec::new());
        }

        let fast_ma = mean(fast_buf);
        let slow_ma = mean(slow_buf);
        let current: i8 = if fast_ma > slow_ma { 1 } else { -1 };

        let prev = self
            .prev_signal
            .insert(bar.symbol.clone(), current)
            .unwrap_or(0);
        if prev == current {
            return Ok(Vec::new());
        }

        let held = ctx.position_qty(&bar.symbol);
        let mut orders = Vec::new();

        if current == 1 && held <= 0.0 {
            // Bullish cross: cover any short and go long.
            let qty = held.abs() + self.position_size;
            let order = Order::market(ctx.next_order_id(), bar.ts, &bar.symbol, Side::Buy, qty)
                .map_err(|e| StrategyError::new(e.to_string()))?;
            orders.push(order);
        } else if current == -1 && held > 0.0 {
            // Bearish cross: exit the long.
            let order = Order::market(ctx.next_order_id(), bar.ts, &bar.symbol, Side::Sell, held)
                .map_err(|e| StrategyError::new(e.to_string()))?;
            orders.push(order);
        }

        Ok(orders)
    }

    fn on_end(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        self.buffers.clear();
        self.prev_signal.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderIdGen, Portfolio};
    use chrono::{TimeZone, Utc};

    fn bar(day: u32, close: f64) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            "BTCUSDT",
            close,
            close + 1.0,
            close - 1.0,
            close,
            1_000.0,
        )
        .unwrap()
    }

    fn run_closes(strategy: &mut SmaCross, closes: &[f64]) -> Vec<(usize, Side, f64)> {
        let portfolio = Portfolio::new(10_000.0);
        let prices = HashMap::new();
        let mut ids = OrderIdGen::default();
        let mut emitted = Vec::new();

        strategy.on_start(&["BTCUSDT".to_string()], &Value::Null);
        for (i, &close) in closes.iter().enumerate() {
            let mut ctx = StrategyContext::new(&portfolio, &prices, i + 1, &mut ids);
            let orders = strategy.on_bar(&bar(1 + i as u32, close), &mut ctx).unwrap();
            for order in orders {
                emitted.push((i + 1, order.side, order.qty));
            }
        }
        emitted
    }

    #[test]
    fn parameter_validation() {
        assert!(SmaCross::new(10, 10, 1.0).is_err());
        assert!(SmaCross::new(20, 10, 1.0).is_err());
        assert!(SmaCross::new(1, 3, 1.0).is_err());
        assert!(SmaCross::new(2, 3, 0.0).is_err());
        assert!(SmaCross::new(2, 3, 1.0).is_ok());
    }

    #[test]
    fn silent_until_buffers_full() {
        let mut strategy = SmaCross::new(2, 3, 1.0).unwrap();
        let emitted = run_closes(&mut strategy, &[10.0, 10.5]);
        assert!(emitted.is_empty());
    }

    #[test]
    fn bullish_cross_buys_once() {
        let mut strategy = SmaCross::new(2, 3, 1.0).unwrap();
        // Rising closes: first full-buffer signal is bullish.
        let emitted = run_closes(&mut strategy, &[10.0, 10.5, 11.0, 11.5]);
        assert_eq!(emitted.len(), 1);
        let (bar_no, side, qty) = emitted[0];
        assert_eq!(bar_no, 3);
        assert_eq!(side, Side::Buy);
        assert_eq!(qty, 1.0);
    }

    #[test]
    fn no_order_without_sign_change() {
        let mut strategy = SmaCross::new(2, 3, 1.0).unwrap();
        // Monotonically falling: signal stays -1 after warmup, no flat
        // position to sell.
        let emitted = run_closes(&mut strategy, &[12.0, 11.0, 10.0, 9.0, 8.0]);
        assert!(emitted.is_empty());
    }

    #[test]
    fn bearish_cross_without_long_is_silent() {
        let mut strategy = SmaCross::new(2, 3, 1.0).unwrap();
        // Up then down, but the portfolio never held anything (context has
        // an empty portfolio), so the bearish cross emits nothing.
        let emitted = run_closes(&mut strategy, &[10.0, 10.5, 11.0, 10.0, 9.0]);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].1, Side::Buy);
    }

    #[test]
    fn ignores_symbols_outside_universe() {
        let mut strategy = SmaCross::new(2, 3, 1.0).unwrap();
        strategy.on_start(&["BTCUSDT".to_string()], &Value::Null);

        let portfolio = Portfolio::new(10_000.0);
        let prices = HashMap::new();
        let mut ids = OrderIdGen::default();
        let mut ctx = StrategyContext::new(&portfolio, &prices, 1, &mut ids);
        let other = Bar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            "ETHUSDT",
            10.0,
            11.0,
            9.0,
            10.0,
            1.0,
        )
        .unwrap();
        assert!(strategy.on_bar(&other, &mut ctx).unwrap().is_empty());
    }
}
