//! Domain types for TradeLab.

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use fill::Fill;
pub use ids::{OrderId, OrderIdGen, RunId};
pub use order::{Order, OrderStatus, OrderType, Side};
pub use portfolio::{EquityPoint, Portfolio};
pub use position::Position;
pub use trade::Trade;

use thiserror::Error;

/// Symbol type alias
pub type Symbol = String;

/// Validation failure when constructing a domain value.
///
/// Construction is the only place invalid values can enter the engine;
/// everything downstream assumes validated inputs.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("invalid bar: {0}")]
    InvalidBar(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("invalid fill: {0}")]
    InvalidFill(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
