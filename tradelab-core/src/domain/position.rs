//! Position — a signed holding in a single symbol.

use super::fill::Fill;
use super::order::Side;
use super::Symbol;
use serde::{Deserialize, Serialize};

/// An open position: positive quantity is long, negative is short.
///
/// Average entry price follows the sign of the quantity: crossing or
/// touching zero resets it to the crossing fill's price (or 0 when flat),
/// otherwise it is the quantity-weighted mean of the existing cost and the
/// new leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub qty: f64,
    pub avg_price: f64,
}

impl Position {
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            qty: 0.0,
            avg_price: 0.0,
        }
    }

    /// Apply a fill for this position's symbol.
    pub fn apply(&mut self, fill: &Fill) {
        let signed_qty = fill.qty * fill.side.sign();
        let new_qty = self.qty + signed_qty;

        if self.qty * new_qty <= 0.0 {
            // Opening, closing, or reversing through zero.
            self.qty = new_qty;
            self.avg_price = if new_qty != 0.0 { fill.price } else { 0.0 };
        } else {
            let total_cost = self.qty * self.avg_price + signed_qty * fill.price;
            self.qty = new_qty;
            self.avg_price = (total_cost / new_qty).abs();
        }
    }

    pub fn is_flat(&self) -> bool {
        self.qty == 0.0
    }

    /// Market value at the given price (signed).
    pub fn market_value(&self, price: f64) -> f64 {
        self.qty * price
    }

    /// Unrealized P&L at the given price.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        if self.qty == 0.0 {
            return 0.0;
        }
        (price - self.avg_price) * self.qty
    }

    /// Which side the position is on, if any.
    pub fn side(&self) -> Option<Side> {
        if self.qty > 0.0 {
            Some(Side::Buy)
        } else if self.qty < 0.0 {
            Some(Side::Sell)
        } else {
            None
        }
    }
}
