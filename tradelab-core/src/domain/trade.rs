//! Trade — a round-trip position from opening fill(s) to closing fill.

use super::order::Side;
use super::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trade, mutable while open and frozen once closed.
///
/// Same-direction fills extend the entry (weighted-average price); an
/// opposite fill closes it. P&L is direction-aware:
/// buys earn `(exit - entry) * qty - fees`, sells the negation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_ts: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_qty: f64,
    pub exit_ts: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_qty: Option<f64>,
    pub pnl: f64,
    pub return_pct: f64,
    pub fees: f64,
}

impl Trade {
    /// Open a trade from its first fill.
    pub fn open(
        symbol: impl Into<Symbol>,
        side: Side,
        entry_ts: DateTime<Utc>,
        entry_price: f64,
        entry_qty: f64,
        entry_fee: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            entry_ts,
            entry_price,
            entry_qty,
            exit_ts: None,
            exit_price: None,
            exit_qty: None,
            pnl: 0.0,
            return_pct: 0.0,
            fees: entry_fee,
        }
    }

    /// Extend with a same-direction fill: weighted-average entry price.
    pub fn extend(&mut self, price: f64, qty: f64, fee: f64) {
        let total_qty = self.entry_qty + qty;
        self.entry_price = (self.entry_price * self.entry_qty + price * qty) / total_qty;
        self.entry_qty = total_qty;
        self.fees += fee;
    }

    /// Reduce the open quantity after a partial opposite fill.
    pub fn reduce(&mut self, qty: f64) {
        self.entry_qty -= qty;
    }

    /// Close the trade.
    pub fn close(&mut self, exit_ts: DateTime<Utc>, exit_price: f64, exit_qty: f64, exit_fee: f64) {
        self.exit_ts = Some(exit_ts);
        self.exit_price = Some(exit_price);
        self.exit_qty = Some(exit_qty);
        self.fees += exit_fee;

        self.pnl = match self.side {
            Side::Buy => (exit_price - self.entry_price) * self.entry_qty - self.fees,
            Side::Sell => (self.entry_price - exit_price) * self.entry_qty - self.fees,
        };

        let entry_value = self.entry_price * self.entry_qty;
        self.return_pct = if entry_value != 0.0 {
            self.pnl / entry_value * 100.0
        } else {
            0.0
        };
    }

    pub fn is_open(&self) -> bool {
        self.exit_ts.is_none()
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    /// Seconds between entry and exit, `None` while open.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.exit_ts
            .map(|exit| (exit - self.entry_ts).num_milliseconds() as f64 / 1_000.0)
    }
}
