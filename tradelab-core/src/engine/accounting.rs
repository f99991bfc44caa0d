//! Portfolio accounting: fills in, trades and equity curve out.

use crate::domain::{DomainError, EquityPoint, Fill, Portfolio, Symbol, Trade};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Owns the portfolio and tracks the trade lifecycle and equity curve.
///
/// At most one trade is open per symbol. Same-direction fills extend it,
/// opposite fills close it (spawning a reverse trade from any residual
/// quantity), and `close_all` finalizes whatever remains at end of run.
pub struct PortfolioManager {
    portfolio: Portfolio,
    initial_cash: f64,
    equity_curve: Vec<EquityPoint>,
    trades: Vec<Trade>,
    open_trades: HashMap<Symbol, Trade>,
}

impl PortfolioManager {
    pub fn new(initial_cash: f64) -> Result<Self, DomainError> {
        if !(initial_cash > 0.0) {
            return Err(DomainError::InvalidParameter(format!(
                "initial cash must be positive: {initial_cash}"
            )));
        }
        Ok(Self {
            portfolio: Portfolio::new(initial_cash),
            initial_cash,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            open_trades: HashMap::new(),
        })
    }

    /// Apply a fill: portfolio update, trade lifecycle, mark-to-market, and
    /// an equity point at the fill's timestamp (returned for recording).
    pub fn apply_fill(
        &mut self,
        fill: &Fill,
        current_prices: &HashMap<Symbol, f64>,
    ) -> EquityPoint {
        self.portfolio.apply_fill(fill);
        self.track_trade(fill);
        self.record_equity(fill.ts, current_prices)
    }

    /// Mark the portfolio to market and append an equity point.
    pub fn mark_to_market(
        &mut self,
        ts: DateTime<Utc>,
        current_prices: &HashMap<Symbol, f64>,
    ) -> EquityPoint {
        self.record_equity(ts, current_prices)
    }

    fn record_equity(
        &mut self,
        ts: DateTime<Utc>,
        current_prices: &HashMap<Symbol, f64>,
    ) -> EquityPoint {
        self.portfolio.mark_to_market(current_prices);
        let point = EquityPoint {
            ts,
            equity: self.portfolio.equity,
            cash: self.portfolio.cash,
            positions_value: self.portfolio.equity - self.portfolio.cash,
        };
        self.equity_curve.push(point.clone());
        point
    }

    fn track_trade(&mut self, fill: &Fill) {
        match self.open_trades.remove(&fill.symbol) {
            None => {
                self.open_trades.insert(
                    fill.symbol.clone(),
                    Trade::open(
                        fill.symbol.clone(),
                        fill.side,
                        fill.ts,
                        fill.price,
                        fill.qty,
                        fill.fee,
                    ),
                );
            }
            Some(mut trade) if trade.side == fill.side => {
                trade.extend(fill.price, fill.qty, fill.fee);
                self.open_trades.insert(fill.symbol.clone(), trade);
            }
            Some(mut trade) => {
                if fill.qty >= trade.entry_qty {
                    let residual = fill.qty - trade.entry_qty;
                    let exit_qty = trade.entry_qty;
                    trade.close(fill.ts, fill.price, exit_qty, fill.fee);
                    self.trades.push(trade);

                    if residual > 0.0 {
                        // Fee already charged on the closing fill.
                        self.open_trades.insert(
                            fill.symbol.clone(),
                            Trade::open(
                                fill.symbol.clone(),
                                fill.side,
                                fill.ts,
                                fill.price,
                                residual,
                                0.0,
                            ),
                        );
                    }
                } else {
                    trade.reduce(fill.qty);
                    self.open_trades.insert(fill.symbol.clone(), trade);
                }
            }
        }
    }

    /// Forcibly close every open trade at the supplied prices (zero exit
    /// fee), in symbol order. Returns the trades closed here.
    pub fn close_all(
        &mut self,
        ts: DateTime<Utc>,
        prices: &HashMap<Symbol, f64>,
    ) -> Vec<Trade> {
        let mut symbols: Vec<Symbol> = self.open_trades.keys().cloned().collect();
        symbols.sort();

        let mut closed = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(mut trade) = self.open_trades.remove(&symbol) {
                let price = prices.get(&symbol).copied().unwrap_or(trade.entry_price);
                let exit_qty = trade.entry_qty;
                trade.close(ts, price, exit_qty, 0.0);
                debug!(symbol = %symbol, pnl = trade.pnl, "trade force-closed at end of run");
                self.trades.push(trade.clone());
                closed.push(trade);
            }
        }
        closed
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn open_trades(&self) -> &HashMap<Symbol, Trade> {
        &self.open_trades
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    pub fn equity(&self) -> f64 {
        self.portfolio.equity
    }

    /// Realized P&L over all closed trades.
    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn exposure(&self) -> f64 {
        self.portfolio.exposure()
    }
}
