//! Order types, lifecycle states, and validated constructors.

use super::ids::OrderId;
use super::{DomainError, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells: the sign a fill applies to position quantity.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

/// What kind of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Fill at the matching bar's close price.
    Market,
    /// Fill at the limit price once the bar's range reaches it.
    Limit,
}

/// Order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Accepted, waiting to be matched.
    Pending,
    /// Completely filled.
    Filled,
    /// Filled below the requested quantity (volume cap); still complete for the run.
    Partial,
    /// Refused at admission.
    Rejected,
    /// Cancelled while pending.
    Cancelled,
}

/// A single order. Owned by the broker once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub ts: DateTime<Utc>,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: f64,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub limit_price: Option<f64>,
    pub status: OrderStatus,
}

impl Order {
    /// A market order. Quantity must be positive.
    pub fn market(
        id: OrderId,
        ts: DateTime<Utc>,
        symbol: impl Into<Symbol>,
        side: Side,
        qty: f64,
    ) -> Result<Self, DomainError> {
        Self::build(id, ts, symbol.into(), side, qty, OrderType::Market, None)
    }

    /// A limit order. Quantity and limit price must be positive.
    pub fn limit(
        id: OrderId,
        ts: DateTime<Utc>,
        symbol: impl Into<Symbol>,
        side: Side,
        qty: f64,
        limit_price: f64,
    ) -> Result<Self, DomainError> {
        Self::build(
            id,
            ts,
            symbol.into(),
            side,
            qty,
            OrderType::Limit,
            Some(limit_price),
        )
    }

    fn build(
        id: OrderId,
        ts: DateTime<Utc>,
        symbol: Symbol,
        side: Side,
        qty: f64,
        order_type: OrderType,
        limit_price: Option<f64>,
    ) -> Result<Self, DomainError> {
        if !(qty > 0.0) {
            return Err(DomainError::InvalidOrder(format!(
                "order quantity must be positive: {qty}"
            )));
        }
        if order_type == OrderType::Limit && limit_price.is_none() {
            return Err(DomainError::InvalidOrder(
                "limit orders require limit_price".into(),
            ));
        }
        if let Some(price) = limit_price {
            if !(price > 0.0) {
                return Err(DomainError::InvalidOrder(format!(
                    "limit price must be positive: {price}"
                )));
            }
        }
        Ok(Self {
            id,
            ts,
            symbol,
            side,
            qty,
            order_type,
            limit_price,
            status: OrderStatus::Pending,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}
