//! Orchestration: assemble engine components from a config and run.

use crate::config::{ExecutionConfig, FeeConfig, RunConfig, SlippageConfig};
use crate::report::{build_report, BacktestReport};
use rayon::prelude::*;
use thiserror::Error;
use tradelab_core::domain::{Bar, DomainError};
use tradelab_core::engine::{
    Broker, EventRecorder, ExecutionError, ExecutionModel, FeeModel, FixedBpsSlippage,
    HistoricalClock, NoFees, NoSlippage, PaperBroker, PercentageFee, RealisticExecution,
    SimulatedBroker, Simulator, SlippageModel, StandardExecution, TieredFee,
    VolumeBasedSlippage,
};
use tradelab_core::engine::{EngineError, RunOutcome};
use tradelab_core::strategy::{RegistryError, StrategyRegistry};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid execution config: {0}")]
    Execution(#[from] ExecutionError),

    #[error("invalid config: {0}")]
    Config(#[from] DomainError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn build_slippage(config: &SlippageConfig) -> Result<Box<dyn SlippageModel>, ExecutionError> {
    Ok(match config {
        SlippageConfig::None => Box::new(NoSlippage),
        SlippageConfig::FixedBps { bps } => Box::new(FixedBpsSlippage::new(*bps)?),
        SlippageConfig::VolumeBased {
            base_bps,
            volume_impact,
        } => Box::new(VolumeBasedSlippage::new(*base_bps, *volume_impact)?),
    })
}

fn build_fees(config: &FeeConfig) -> Result<Box<dyn FeeModel>, ExecutionError> {
    Ok(match config {
        FeeConfig::None => Box::new(NoFees),
        FeeConfig::Percentage { pct } => Box::new(PercentageFee::new(*pct)?),
        FeeConfig::Tiered { tiers } => Box::new(TieredFee::new(tiers.clone())?),
    })
}

fn build_broker(config: &ExecutionConfig) -> Result<Box<dyn Broker>, ExecutionError> {
    let slippage = build_slippage(&config.slippage)?;
    let fees = build_fees(&config.fees)?;

    let execution: Box<dyn ExecutionModel> = match &config.realistic {
        Some(realistic) => Box::new(RealisticExecution::new(
            slippage,
            fees,
            realistic.spread_bps,
            realistic.max_fill_pct,
        )?),
        None => Box::new(StandardExecution::new(slippage, fees)),
    };

    Ok(match config.paper_delay_bars {
        Some(delay) => Box::new(PaperBroker::new(execution, delay)),
        None => Box::new(SimulatedBroker::new(execution)),
    })
}

/// Runs configured backtests against in-memory bar feeds.
pub struct Runner {
    registry: StrategyRegistry,
}

impl Runner {
    /// Runner with the built-in strategies.
    pub fn new() -> Self {
        Self {
            registry: StrategyRegistry::with_builtins(),
        }
    }

    /// Runner with a caller-provided registry.
    pub fn with_registry(registry: StrategyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Execute one backtest and return the full report.
    pub fn run(&self, config: &RunConfig, bars: Vec<Bar>) -> Result<BacktestReport, RunnerError> {
        let outcome = self.run_outcome(config, bars)?;
        Ok(build_report(
            outcome.run_id.clone(),
            outcome.strategy.clone(),
            config.strategy.params.clone(),
            config.dataset.clone(),
            &outcome.equity_curve,
            &outcome.trades,
            config.initial_cash,
            config.risk_free_rate,
        ))
    }

    /// Execute one backtest and return the raw engine outcome.
    pub fn run_outcome(
        &self,
        config: &RunConfig,
        bars: Vec<Bar>,
    ) -> Result<RunOutcome, RunnerError> {
        let strategy = self
            .registry
            .create(&config.strategy.name, &config.strategy.params)?;
        let broker = build_broker(&config.execution)?;
        let feed = Box::new(HistoricalClock::new(bars));

        let mut simulator = Simulator::new(strategy, broker, feed, config.initial_cash)?
            .with_recorder(Box::new(EventRecorder::new(config.record_bars)));

        let outcome = simulator.run(
            config.universe.clone(),
            config.strategy.params.clone(),
            config.run_id(),
        )?;
        Ok(outcome)
    }

    /// Execute independent runs in parallel.
    ///
    /// Each run owns its own strategy, broker, clock, and recorder; only
    /// the read-only registry is shared.
    pub fn run_batch(
        &self,
        jobs: Vec<(RunConfig, Vec<Bar>)>,
    ) -> Vec<Result<BacktestReport, RunnerError>> {
        jobs.into_par_iter()
            .map(|(config, bars)| self.run(&config, bars))
            .collect()
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}
