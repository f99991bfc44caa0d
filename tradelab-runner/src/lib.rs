//! TradeLab Runner — run configuration, performance metrics, report
//! assembly, and batch orchestration on top of `tradelab-core`.

pub mod config;
pub mod export;
pub mod metrics;
pub mod report;
pub mod runner;

pub use config::{
    ExecutionConfig, FeeConfig, RealisticConfig, RunConfig, SlippageConfig, StrategyConfig,
};
pub use metrics::{drawdown_curve, DrawdownPoint, EquityMetrics, TradeMetrics};
pub use report::{build_report, compare, BacktestReport, ReportSummary, StrategyComparison};
pub use runner::{Runner, RunnerError};
