//! Bar — one OHLCV sample for a symbol at a timestamp.

use super::{DomainError, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol at a point in time (UTC).
///
/// Constructed through [`Bar::new`], which rejects inconsistent prices and
/// negative volume. Bars are never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub symbol: Symbol,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Build a validated bar.
    ///
    /// Invariants: `high >= max(open, close)`, `low <= min(open, close)`,
    /// `high >= low`, `volume >= 0`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ts: DateTime<Utc>,
        symbol: impl Into<Symbol>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, DomainError> {
        if high < low {
            return Err(DomainError::InvalidBar(format!(
                "high {high} cannot be less than low {low}"
            )));
        }
        if high < open.max(close) {
            return Err(DomainError::InvalidBar(format!(
                "high {high} must be >= open/close"
            )));
        }
        if low > open.min(close) {
            return Err(DomainError::InvalidBar(format!(
                "low {low} must be <= open/close"
            )));
        }
        if volume < 0.0 {
            return Err(DomainError::InvalidBar(format!(
                "volume cannot be negative: {volume}"
            )));
        }
        Ok(Self {
            ts,
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
        })
    }
}
