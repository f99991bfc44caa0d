//! Report assembly: metrics, curves, trades, and a human-readable summary.

use crate::metrics::{drawdown_curve, DrawdownPoint, EquityMetrics, TradeMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tradelab_core::domain::{EquityPoint, Side, Trade};

/// One trade row in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub symbol: String,
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
    pub duration_seconds: Option<f64>,
}

impl From<&Trade> for TradeRow {
    fn from(trade: &Trade) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            side: trade.side,
            entry_ts: trade.entry_ts,
            entry_price: trade.entry_price,
            entry_qty: trade.entry_qty,
            exit_ts: trade.exit_ts,
            exit_price: trade.exit_price,
            exit_qty: trade.exit_qty,
            pnl: trade.pnl,
            return_pct: trade.return_pct,
            fees: trade.fees,
            duration_seconds: trade.duration_seconds(),
        }
    }
}

/// Headline figures plus both metric blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub equity: EquityMetrics,
    pub trades: TradeMetrics,
}

/// Complete backtest report for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub run_id: String,
    pub strategy: String,
    pub params: Value,
    /// Opaque caller metadata about the dataset.
    pub dataset: Value,
    pub summary: ReportSummary,
    pub equity_curve: Vec<EquityPoint>,
    pub drawdown_curve: Vec<DrawdownPoint>,
    pub trades: Vec<TradeRow>,
}

/// Assemble a report from a finalized equity curve and trade list.
#[allow(clippy::too_many_arguments)]
pub fn build_report(
    run_id: impl Into<String>,
    strategy: impl Into<String>,
    params: Value,
    dataset: Value,
    equity_curve: &[EquityPoint],
    trades: &[Trade],
    initial_capital: f64,
    risk_free_rate: f64,
) -> BacktestReport {
    let equity = EquityMetrics::compute(equity_curve, initial_capital, risk_free_rate);
    let trade_metrics = TradeMetrics::compute(trades);
    let final_equity = equity_curve
        .last()
        .map_or(initial_capital, |point| point.equity);

    BacktestReport {
        run_id: run_id.into(),
        strategy: strategy.into(),
        params,
        dataset,
        summary: ReportSummary {
            initial_capital,
            final_equity,
            equity,
            trades: trade_metrics,
        },
        equity_curve: equity_curve.to_vec(),
        drawdown_curve: drawdown_curve(equity_curve),
        trades: trades.iter().map(TradeRow::from).collect(),
    }
}

impl BacktestReport {
    /// Render the human-readable summary block.
    pub fn summary_text(&self) -> String {
        let s = &self.summary;
        let e = &s.equity;
        let t = &s.trades;
        let period = match (e.start_ts, e.end_ts) {
            (Some(start), Some(end)) => format!(
                "Period: {} to {}\nDuration: {} days ({:.2} years)",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d"),
                e.days,
                e.years
            ),
            _ => "Period: n/a".to_string(),
        };

        format!(
            "\
Backtest Report: {run_id}
{rule}

Strategy: {strategy}
Parameters: {params}

Performance Summary
-------------------
Initial Capital:        ${initial:>14.2}
Final Equity:           ${final_eq:>14.2}
Total Return:           {total_return:>10.2}%
Annualized Return:      {annualized:>10.2}%

Risk Metrics
------------
Annualized Volatility:  {vol:>10.2}%
Sharpe Ratio:           {sharpe:>10.2}
Sortino Ratio:          {sortino:>10.2}
Calmar Ratio:           {calmar:>10.2}
Max Drawdown:           {max_dd:>10.2}%
Max DD Duration:        {dd_days} days

Trading Statistics
------------------
Total Trades:           {total_trades}
Winning Trades:         {wins}
Losing Trades:          {losses}
Win Rate:               {win_rate:>10.2}%
Avg Win:                ${avg_win:>10.2}
Avg Loss:               ${avg_loss:>10.2}
Profit Factor:          {pf:>10.2}
Avg Trade P&L:          ${avg_pnl:>10.2}

{period}
",
            run_id = self.run_id,
            rule = "=".repeat(60),
            strategy = self.strategy,
            params = self.params,
            initial = s.initial_capital,
            final_eq = s.final_equity,
            total_return = e.total_return * 100.0,
            annualized = e.annualized_return * 100.0,
            vol = e.annualized_volatility * 100.0,
            sharpe = e.sharpe_ratio,
            sortino = e.sortino_ratio,
            calmar = e.calmar_ratio,
            max_dd = e.max_drawdown * 100.0,
            dd_days = e.max_drawdown_duration_days,
            total_trades = t.total_trades,
            wins = t.winning_trades,
            losses = t.losing_trades,
            win_rate = t.win_rate * 100.0,
            avg_win = t.avg_win,
            avg_loss = t.avg_loss,
            pf = t.profit_factor,
            avg_pnl = t.avg_trade_pnl,
            period = period,
        )
    }
}

/// Key metrics of one strategy in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub strategy: String,
    pub params: Value,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub trade_win_rate: f64,
    pub total_trades: usize,
}

/// Cross-strategy ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub strategies: Vec<ComparisonRow>,
    pub best_return: Option<String>,
    pub best_sharpe: Option<String>,
    /// Largest (least negative) max drawdown.
    pub lowest_drawdown: Option<String>,
}

fn f64_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Rank strategies by total return, Sharpe, and shallowest drawdown.
pub fn compare(reports: &[BacktestReport]) -> StrategyComparison {
    if reports.is_empty() {
        return StrategyComparison::default();
    }

    let strategies: Vec<ComparisonRow> = reports
        .iter()
        .map(|report| ComparisonRow {
            strategy: report.strategy.clone(),
            params: report.params.clone(),
            total_return: report.summary.equity.total_return,
            sharpe_ratio: report.summary.equity.sharpe_ratio,
            max_drawdown: report.summary.equity.max_drawdown,
            trade_win_rate: report.summary.trades.win_rate,
            total_trades: report.summary.trades.total_trades,
        })
        .collect();

    let best_return = strategies
        .iter()
        .max_by(|a, b| f64_cmp(a.total_return, b.total_return))
        .map(|row| row.strategy.clone());
    let best_sharpe = strategies
        .iter()
        .max_by(|a, b| f64_cmp(a.sharpe_ratio, b.sharpe_ratio))
        .map(|row| row.strategy.clone());
    let lowest_drawdown = strategies
        .iter()
        .max_by(|a, b| f64_cmp(a.max_drawdown, b.max_drawdown))
        .map(|row| row.strategy.clone());

    StrategyComparison {
        strategies,
        best_return,
        best_sharpe,
        lowest_drawdown,
    }
}
