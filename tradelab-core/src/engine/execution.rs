//! Execution models: slippage, fees, and order-to-fill resolution.
//!
//! - Market orders price at the matching bar's close.
//! - Limit buys fill at the limit when `bar.low <= limit`; limit sells when
//!   `bar.high >= limit`.
//! - Slippage adjusts the base price adversely, fees are computed on the
//!   executed notional.

use crate::domain::{Bar, Fill, Order, OrderType, Side};
use thiserror::Error;

/// Invalid execution-model parameters, rejected at construction.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("slippage bps must be non-negative: {0}")]
    NegativeBps(f64),

    #[error("fee percentage must be non-negative: {0}")]
    NegativePercentage(f64),

    #[error("tiered fee model requires at least one tier")]
    EmptyTiers,

    #[error("spread bps must be non-negative: {0}")]
    NegativeSpread(f64),
}

// ─── Slippage models ─────────────────────────────────────────────────

/// Adjusts a base price adversely: buys execute higher, sells lower.
pub trait SlippageModel: Send + Sync {
    /// Execution price after slippage. Never negative.
    fn apply(&self, bar: &Bar, order: &Order, base_price: f64) -> f64;

    fn name(&self) -> &'static str;
}

/// Constant slippage in basis points.
#[derive(Debug, Clone, Copy)]
pub struct FixedBpsSlippage {
    pub bps: f64,
}

impl FixedBpsSlippage {
    pub fn new(bps: f64) -> Result<Self, ExecutionError> {
        if !(bps >= 0.0) {
            return Err(ExecutionError::NegativeBps(bps));
        }
        Ok(Self { bps })
    }
}

impl SlippageModel for FixedBpsSlippage {
    fn apply(&self, _bar: &Bar, order: &Order, base_price: f64) -> f64 {
        let factor = self.bps / 10_000.0;
        let price = match order.side {
            Side::Buy => base_price * (1.0 + factor),
            Side::Sell => base_price * (1.0 - factor),
        };
        price.max(0.0)
    }

    fn name(&self) -> &'static str {
        "fixed_bps"
    }
}

/// Slippage growing with order size relative to bar volume.
///
/// Total bps = `base_bps + volume_fraction * 100 * volume_impact`, where
/// `volume_fraction = order.qty / bar.volume` (0 on zero-volume bars).
#[derive(Debug, Clone, Copy)]
pub struct VolumeBasedSlippage {
    pub base_bps: f64,
    pub volume_impact: f64,
}

impl VolumeBasedSlippage {
    pub fn new(base_bps: f64, volume_impact: f64) -> Result<Self, ExecutionError> {
        if !(base_bps >= 0.0) {
            return Err(ExecutionError::NegativeBps(base_bps));
        }
        if !(volume_impact >= 0.0) {
            return Err(ExecutionError::NegativeBps(volume_impact));
        }
        Ok(Self {
            base_bps,
            volume_impact,
        })
    }
}

impl SlippageModel for VolumeBasedSlippage {
    fn apply(&self, bar: &Bar, order: &Order, base_price: f64) -> f64 {
        let volume_fraction = if bar.volume == 0.0 {
            0.0
        } else {
            order.qty / bar.volume
        };
        let total_bps = self.base_bps + volume_fraction * 100.0 * self.volume_impact;
        let factor = total_bps / 10_000.0;
        let price = match order.side {
            Side::Buy => base_price * (1.0 + factor),
            Side::Sell => base_price * (1.0 - factor),
        };
        price.max(0.0)
    }

    fn name(&self) -> &'static str {
        "volume_based"
    }
}

/// Identity slippage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSlippage;

impl SlippageModel for NoSlippage {
    fn apply(&self, _bar: &Bar, _order: &Order, base_price: f64) -> f64 {
        base_price
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

// ─── Fee models ──────────────────────────────────────────────────────

/// Computes the transaction fee for an execution.
pub trait FeeModel: Send + Sync {
    /// Fee in quote currency. Never negative.
    fn compute(&self, symbol: &str, qty: f64, price: f64, side: Side) -> f64;

    fn name(&self) -> &'static str;
}

/// Fixed percentage of notional (e.g. 0.1 = 0.1%).
#[derive(Debug, Clone, Copy)]
pub struct PercentageFee {
    pub percentage: f64,
}

impl PercentageFee {
    pub fn new(percentage: f64) -> Result<Self, ExecutionError> {
        if !(percentage >= 0.0) {
            return Err(ExecutionError::NegativePercentage(percentage));
        }
        Ok(Self { percentage })
    }
}

impl FeeModel for PercentageFee {
    fn compute(&self, _symbol: &str, qty: f64, price: f64, _side: Side) -> f64 {
        qty * price * (self.percentage / 100.0)
    }

    fn name(&self) -> &'static str {
        "percentage"
    }
}

/// Notional-tiered fees: the applied rate is the greatest tier whose
/// threshold does not exceed the fill notional.
#[derive(Debug, Clone)]
pub struct TieredFee {
    tiers: Vec<(f64, f64)>,
}

impl TieredFee {
    /// `tiers` is a list of `(notional_threshold, fee_percentage)` pairs;
    /// they are sorted ascending by threshold here.
    pub fn new(mut tiers: Vec<(f64, f64)>) -> Result<Self, ExecutionError> {
        if tiers.is_empty() {
            return Err(ExecutionError::EmptyTiers);
        }
        tiers.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(Self { tiers })
    }
}

impl FeeModel for TieredFee {
    fn compute(&self, _symbol: &str, qty: f64, price: f64, _side: Side) -> f64 {
        let notional = qty * price;
        let mut fee_pct = self.tiers[0].1;
        for &(threshold, pct) in &self.tiers {
            if notional >= threshold {
                fee_pct = pct;
            } else {
                break;
            }
        }
        notional * (fee_pct / 100.0)
    }

    fn name(&self) -> &'static str {
        "tiered"
    }
}

/// Zero fees.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFees;

impl FeeModel for NoFees {
    fn compute(&self, _symbol: &str, _qty: f64, _price: f64, _side: Side) -> f64 {
        0.0
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

// ─── Order-to-fill resolution ────────────────────────────────────────

/// Resolves an order against a bar into a fill, or nothing when unfillable.
pub trait ExecutionModel: Send + Sync {
    fn execute(&self, bar: &Bar, order: &Order) -> Option<Fill>;
}

/// Base price before slippage, `None` when the order cannot fill on this bar.
fn base_price(bar: &Bar, order: &Order) -> Option<f64> {
    match order.order_type {
        OrderType::Market => Some(bar.close),
        OrderType::Limit => {
            let limit = order.limit_price?;
            match order.side {
                Side::Buy if bar.low <= limit => Some(limit),
                Side::Sell if bar.high >= limit => Some(limit),
                _ => None,
            }
        }
    }
}

/// Plain execution: full quantity, slippage then fee.
pub struct StandardExecution {
    slippage: Box<dyn SlippageModel>,
    fees: Box<dyn FeeModel>,
}

impl StandardExecution {
    pub fn new(slippage: Box<dyn SlippageModel>, fees: Box<dyn FeeModel>) -> Self {
        Self { slippage, fees }
    }

    /// Frictionless variant used widely in tests.
    pub fn frictionless() -> Self {
        Self::new(Box::new(NoSlippage), Box::new(NoFees))
    }
}

impl ExecutionModel for StandardExecution {
    fn execute(&self, bar: &Bar, order: &Order) -> Option<Fill> {
        if order.symbol != bar.symbol {
            return None;
        }
        let base = base_price(bar, order)?;
        let price = self.slippage.apply(bar, order, base);
        let fee = self.fees.compute(&order.symbol, order.qty, price, order.side);
        Fill::new(
            order.id,
            bar.ts,
            order.symbol.clone(),
            order.side,
            order.qty,
            price,
            fee,
        )
        .ok()
    }
}

/// Execution with market-microstructure effects: a half-spread paid in the
/// adverse direction and a per-bar volume cap on fill quantity.
///
/// A capped fill completes the order for that bar; the remainder is dropped,
/// not retried on later bars.
pub struct RealisticExecution {
    slippage: Box<dyn SlippageModel>,
    fees: Box<dyn FeeModel>,
    spread_bps: f64,
    max_fill_pct: f64,
}

impl RealisticExecution {
    pub fn new(
        slippage: Box<dyn SlippageModel>,
        fees: Box<dyn FeeModel>,
        spread_bps: f64,
        max_fill_pct: f64,
    ) -> Result<Self, ExecutionError> {
        if !(spread_bps >= 0.0) {
            return Err(ExecutionError::NegativeSpread(spread_bps));
        }
        Ok(Self {
            slippage,
            fees,
            spread_bps,
            max_fill_pct,
        })
    }
}

impl ExecutionModel for RealisticExecution {
    fn execute(&self, bar: &Bar, order: &Order) -> Option<Fill> {
        if order.symbol != bar.symbol {
            return None;
        }

        let max_qty = bar.volume * self.max_fill_pct;
        let fill_qty = order.qty.min(max_qty);
        if fill_qty <= 0.0 {
            return None;
        }

        let mut base = base_price(bar, order)?;
        let half_spread = base * (self.spread_bps / 10_000.0);
        base = match order.side {
            Side::Buy => base + half_spread,
            Side::Sell => base - half_spread,
        };

        let price = self.slippage.apply(bar, order, base);
        let fee = self.fees.compute(&order.symbol, fill_qty, price, order.side);
        Fill::new(
            order.id,
            bar.ts,
            order.symbol.clone(),
            order.side,
            fill_qty,
            price,
            fee,
        )
        .ok()
    }
}
