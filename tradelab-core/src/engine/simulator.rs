//! Simulator — the per-bar event loop tying clock, broker, portfolio,
//! strategy, and recorder together.
//!
//! Per-bar ordering is fixed: record the bar, match pending orders, apply
//! each fill (with an equity point), ask the strategy for new orders,
//! submit them, and mark to market every `MARK_INTERVAL_BARS` bars. The
//! same inputs always produce the same outputs.

use crate::domain::{Bar, DomainError, EquityPoint, OrderIdGen, Symbol, Trade};
use crate::engine::accounting::PortfolioManager;
use crate::engine::broker::Broker;
use crate::engine::clock::Clock;
use crate::engine::recorder::{EventRecorder, FinalState, Recorder, RecorderSummary, RunMeta};
use crate::strategy::{Strategy, StrategyContext, StrategyError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extra mark-to-market cadence, in bars, on top of per-fill marks.
pub const MARK_INTERVAL_BARS: usize = 100;

/// Fatal simulation failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("strategy {name} failed on bar at {ts}: {source}")]
    Strategy {
        name: String,
        ts: DateTime<Utc>,
        #[source]
        source: StrategyError,
    },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The feed was exhausted.
    Completed,
    /// A cooperative stop was requested between bars.
    Stopped,
}

/// Final portfolio figures for a run.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub initial_cash: f64,
    pub final_equity: f64,
    pub final_cash: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,
}

/// Order/fill/trade counts for a run.
#[derive(Debug, Clone, Serialize)]
pub struct TradingCounts {
    pub orders_submitted: usize,
    pub fills_executed: usize,
    pub trades_completed: usize,
}

/// Everything a finished run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub strategy: String,
    pub universe: Vec<String>,
    pub bars_processed: usize,
    pub portfolio: PortfolioSummary,
    pub trading: TradingCounts,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub recorder: RecorderSummary,
}

/// Shared flag for requesting early termination between bars.
///
/// In-flight per-bar work always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Orchestrates one backtest run.
pub struct Simulator {
    strategy: Box<dyn Strategy>,
    broker: Box<dyn Broker>,
    feed: Box<dyn Clock>,
    portfolio: PortfolioManager,
    recorder: Box<dyn Recorder>,
    ids: OrderIdGen,
    current_prices: HashMap<Symbol, f64>,
    bar_count: usize,
    last_ts: Option<DateTime<Utc>>,
    orders_submitted: usize,
    stop: StopHandle,
}

impl Simulator {
    pub fn new(
        strategy: Box<dyn Strategy>,
        broker: Box<dyn Broker>,
        feed: Box<dyn Clock>,
        initial_cash: f64,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            strategy,
            broker,
            feed,
            portfolio: PortfolioManager::new(initial_cash)?,
            recorder: Box::new(EventRecorder::default()),
            ids: OrderIdGen::default(),
            current_prices: HashMap::new(),
            bar_count: 0,
            last_ts: None,
            orders_submitted: 0,
            stop: StopHandle::default(),
        })
    }

    /// Replace the default recorder.
    pub fn with_recorder(mut self, recorder: Box<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Handle for requesting cooperative termination from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Execute the backtest to completion (or cooperative stop).
    pub fn run(
        &mut self,
        universe: Vec<String>,
        params: Value,
        run_id: impl Into<String>,
    ) -> Result<RunOutcome, EngineError> {
        let run_id = run_id.into();
        info!(run_id = %run_id, strategy = self.strategy.name(), "starting backtest");

        let meta = RunMeta {
            run_id: run_id.clone(),
            strategy: self.strategy.name().to_string(),
            params: params.clone(),
            universe: universe.clone(),
            initial_cash: self.portfolio.initial_cash(),
        };
        self.recorder.on_start(&meta);

        self.strategy.on_start(&universe, &params);

        while !self.stop.is_stop_requested() {
            let Some(bar) = self.feed.tick() else {
                break;
            };
            self.process_bar(&bar)?;
        }

        let status = if self.stop.is_stop_requested() {
            RunStatus::Stopped
        } else {
            RunStatus::Completed
        };
        info!(
            run_id = %run_id,
            bars = self.bar_count,
            status = ?status,
            "backtest loop finished"
        );

        Ok(self.finalize(run_id, universe, status))
    }

    fn process_bar(&mut self, bar: &Bar) -> Result<(), EngineError> {
        self.bar_count += 1;
        self.current_prices.insert(bar.symbol.clone(), bar.close);
        self.last_ts = Some(bar.ts);

        self.recorder.on_bar(bar);

        // Match pending orders first: fills land before the strategy sees
        // this bar.
        for fill in self.broker.process_bar(bar) {
            self.recorder.on_fill(&fill);
            let point = self.portfolio.apply_fill(&fill, &self.current_prices);
            self.recorder.on_equity_update(&point);
            debug!(
                symbol = %fill.symbol,
                side = ?fill.side,
                qty = fill.qty,
                price = fill.price,
                "fill applied"
            );
        }

        let result = {
            let mut ctx = StrategyContext::new(
                self.portfolio.portfolio(),
                &self.current_prices,
                self.bar_count,
                &mut self.ids,
            );
            self.strategy.on_bar(bar, &mut ctx)
        };
        let orders = match result {
            Ok(orders) => orders,
            Err(source) => {
                return Err(EngineError::Strategy {
                    name: self.strategy.name().to_string(),
                    ts: bar.ts,
                    source,
                });
            }
        };

        for order in orders {
            let id = order.id;
            if self.broker.submit(order) {
                self.orders_submitted += 1;
                if let Some(accepted) = self.broker.order(id) {
                    self.recorder.on_order(accepted);
                }
            } else {
                warn!(order_id = %id, "order rejected; run continues");
            }
        }

        if self.bar_count % MARK_INTERVAL_BARS == 0 {
            let point = self.portfolio.mark_to_market(bar.ts, &self.current_prices);
            self.recorder.on_equity_update(&point);
        }

        Ok(())
    }

    fn finalize(
        &mut self,
        run_id: String,
        universe: Vec<String>,
        status: RunStatus,
    ) -> RunOutcome {
        if let Some(ts) = self.last_ts {
            if !self.portfolio.open_trades().is_empty() {
                let closed = self.portfolio.close_all(ts, &self.current_prices);
                info!(count = closed.len(), "closed residual trades at last prices");
            }
            let point = self.portfolio.mark_to_market(ts, &self.current_prices);
            self.recorder.on_equity_update(&point);
        }

        {
            let ctx = StrategyContext::new(
                self.portfolio.portfolio(),
                &self.current_prices,
                self.bar_count,
                &mut self.ids,
            );
            if let Err(err) = self.strategy.on_end(&ctx) {
                warn!(error = %err, "strategy on_end failed; ignored");
            }
        }

        let final_state = FinalState {
            equity: self.portfolio.equity(),
            cash: self.portfolio.cash(),
            total_pnl: self.portfolio.total_pnl(),
            trades: self.portfolio.trades().len(),
        };
        self.recorder.on_end(&final_state);

        let initial_cash = self.portfolio.initial_cash();
        let final_equity = self.portfolio.equity();
        let total_return_pct = if initial_cash != 0.0 {
            (final_equity - initial_cash) / initial_cash * 100.0
        } else {
            0.0
        };

        RunOutcome {
            run_id,
            status,
            strategy: self.strategy.name().to_string(),
            universe,
            bars_processed: self.bar_count,
            portfolio: PortfolioSummary {
                initial_cash,
                final_equity,
                final_cash: self.portfolio.cash(),
                total_pnl: self.portfolio.total_pnl(),
                total_return_pct,
            },
            trading: TradingCounts {
                orders_submitted: self.orders_submitted,
                fills_executed: self.broker.fills().len(),
                trades_completed: self.portfolio.trades().len(),
            },
            equity_curve: self.portfolio.equity_curve().to_vec(),
            trades: self.portfolio.trades().to_vec(),
            recorder: self.recorder.summary(),
        }
    }

    pub fn portfolio_manager(&self) -> &PortfolioManager {
        &self.portfolio
    }

    pub fn broker(&self) -> &dyn Broker {
        self.broker.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Order, Side};
    use crate::engine::broker::SimulatedBroker;
    use crate::engine::clock::HistoricalClock;
    use crate::engine::execution::StandardExecution;
    use chrono::TimeZone;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Bar::new(
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                        + chrono::Duration::days(i as i64),
                    "BTCUSDT",
                    close,
                    close + 1.0,
                    close - 1.0,
                    close,
                    1_000.0,
                )
                .unwrap()
            })
            .collect()
    }

    /// Emits nothing; the portfolio must stay untouched.
    struct NoOp;

    impl Strategy for NoOp {
        fn name(&self) -> &str {
            "noop"
        }

        fn on_bar(
            &mut self,
            _bar: &Bar,
            _ctx: &mut StrategyContext,
        ) -> Result<Vec<Order>, StrategyError> {
            Ok(Vec::new())
        }
    }

    /// Buys once, on the first bar.
    struct BuyOnce {
        done: bool,
        qty: f64,
    }

    impl Strategy for BuyOnce {
        fn name(&self) -> &str {
            "buy_once"
        }

        fn on_bar(
            &mut self,
            bar: &Bar,
            ctx: &mut StrategyContext,
        ) -> Result<Vec<Order>, StrategyError> {
            if self.done {
                return Ok(Vec::new());
            }
            self.done = true;
            let order = Order::market(ctx.next_order_id(), bar.ts, &bar.symbol, Side::Buy, self.qty)
                .map_err(|e| StrategyError::new(e.to_string()))?;
            Ok(vec![order])
        }
    }

    /// Always fails.
    struct Faulty;

    impl Strategy for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn on_bar(
            &mut self,
            _bar: &Bar,
            _ctx: &mut StrategyContext,
        ) -> Result<Vec<Order>, StrategyError> {
            Err(StrategyError::new("boom"))
        }
    }

    fn simulator(strategy: Box<dyn Strategy>, closes: &[f64]) -> Simulator {
        Simulator::new(
            strategy,
            Box::new(SimulatedBroker::new(Box::new(StandardExecution::frictionless()))),
            Box::new(HistoricalClock::new(bars(closes))),
            10_000.0,
        )
        .unwrap()
    }

    #[test]
    fn noop_strategy_preserves_cash() {
        let mut sim = simulator(Box::new(NoOp), &[100.0, 101.0, 102.0]);
        let outcome = sim
            .run(vec!["BTCUSDT".into()], Value::Null, "run-noop")
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.bars_processed, 3);
        assert_eq!(outcome.trading.fills_executed, 0);
        assert_eq!(outcome.portfolio.final_cash, 10_000.0);
        assert_eq!(outcome.portfolio.final_equity, 10_000.0);
    }

    #[test]
    fn empty_feed_yields_initial_cash() {
        let mut sim = simulator(Box::new(NoOp), &[]);
        let outcome = sim
            .run(vec!["BTCUSDT".into()], Value::Null, "run-empty")
            .unwrap();

        assert_eq!(outcome.bars_processed, 0);
        assert!(outcome.equity_curve.is_empty());
        assert_eq!(outcome.portfolio.final_equity, 10_000.0);
    }

    #[test]
    fn buy_once_fills_on_next_bar_and_force_closes() {
        let mut sim = simulator(Box::new(BuyOnce { done: false, qty: 1.0 }), &[95.0, 100.0, 110.0]);
        let outcome = sim
            .run(vec!["BTCUSDT".into()], Value::Null, "run-buy")
            .unwrap();

        // Order from bar 1 fills at bar 2's close.
        assert_eq!(outcome.trading.fills_executed, 1);
        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.entry_price, 100.0);
        assert_eq!(trade.exit_price, Some(110.0));
        assert!((trade.pnl - 10.0).abs() < 1e-10);

        // Position still held; equity marks it at the last close.
        assert!((outcome.portfolio.final_equity - 10_010.0).abs() < 1e-9);
    }

    #[test]
    fn strategy_failure_aborts_run() {
        let mut sim = simulator(Box::new(Faulty), &[100.0]);
        let err = sim
            .run(vec!["BTCUSDT".into()], Value::Null, "run-faulty")
            .unwrap_err();
        assert!(matches!(err, EngineError::Strategy { .. }));
    }

    #[test]
    fn stop_handle_terminates_between_bars() {
        let mut sim = simulator(Box::new(NoOp), &[100.0, 101.0, 102.0]);
        sim.stop_handle().request_stop();
        let outcome = sim
            .run(vec!["BTCUSDT".into()], Value::Null, "run-stopped")
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Stopped);
        assert_eq!(outcome.bars_processed, 0);
    }

    #[test]
    fn periodic_mark_appends_equity_points() {
        let closes: Vec<f64> = (0..250).map(|i| 100.0 + i as f64 * 0.1).collect();
        let mut sim = simulator(Box::new(NoOp), &closes);
        let outcome = sim
            .run(vec!["BTCUSDT".into()], Value::Null, "run-mark")
            .unwrap();

        // Bars 100 and 200, plus the final mark.
        assert_eq!(outcome.equity_curve.len(), 3);
        assert_eq!(outcome.recorder.equity_snapshots, 3);
    }
}
