//! Fill — an execution event converting (part of) an order into cash and position changes.

use super::ids::OrderId;
use super::order::Side;
use super::{DomainError, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of an order execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub ts: DateTime<Utc>,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: f64,
    pub price: f64,
    pub fee: f64,
}

impl Fill {
    /// Build a validated fill: `qty > 0`, `price > 0`, `fee >= 0`.
    pub fn new(
        order_id: OrderId,
        ts: DateTime<Utc>,
        symbol: impl Into<Symbol>,
        side: Side,
        qty: f64,
        price: f64,
        fee: f64,
    ) -> Result<Self, DomainError> {
        if !(qty > 0.0) {
            return Err(DomainError::InvalidFill(format!(
                "fill quantity must be positive: {qty}"
            )));
        }
        if !(price > 0.0) {
            return Err(DomainError::InvalidFill(format!(
                "fill price must be positive: {price}"
            )));
        }
        if !(fee >= 0.0) {
            return Err(DomainError::InvalidFill(format!(
                "fee cannot be negative: {fee}"
            )));
        }
        Ok(Self {
            order_id,
            ts,
            symbol: symbol.into(),
            side,
            qty,
            price,
            fee,
        })
    }

    /// Gross notional value (fees excluded).
    pub fn notional(&self) -> f64 {
        self.qty * self.price
    }

    /// Net cash flow: negative for buys, positive for sells.
    pub fn net_cash_flow(&self) -> f64 {
        match self.side {
            Side::Buy => -(self.notional() + self.fee),
            Side::Sell => self.notional() - self.fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()
    }

    #[test]
    fn buy_cash_flow_is_negative() {
        let fill = Fill::new(OrderId(1), ts(), "BTCUSDT", Side::Buy, 2.0, 100.0, 0.5).unwrap();
        assert_eq!(fill.notional(), 200.0);
        assert_eq!(fill.net_cash_flow(), -200.5);
    }

    #[test]
    fn sell_cash_flow_is_positive() {
        let fill = Fill::new(OrderId(2), ts(), "BTCUSDT", Side::Sell, 2.0, 110.0, 0.5).unwrap();
        assert_eq!(fill.net_cash_flow(), 219.5);
    }

    #[test]
    fn zero_quantity_rejected() {
        assert!(Fill::new(OrderId(1), ts(), "BTCUSDT", Side::Buy, 0.0, 100.0, 0.0).is_err());
    }

    #[test]
    fn zero_price_rejected() {
        assert!(Fill::new(OrderId(1), ts(), "BTCUSDT", Side::Buy, 1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn negative_fee_rejected() {
        assert!(Fill::new(OrderId(1), ts(), "BTCUSDT", Side::Buy, 1.0, 100.0, -0.1).is_err());
    }

    #[test]
    fn serialization_roundtrip() {
        let fill = Fill::new(OrderId(3), ts(), "ETHUSDT", Side::Sell, 1.5, 2500.0, 1.0).unwrap();
        let json = serde_json::to_string(&fill).unwrap();
        let deser: Fill = serde_json::from_str(&json).unwrap();
        assert_eq!(fill, deser);
    }
}
