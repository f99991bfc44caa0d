//! Performance metrics — pure functions over the finalized equity curve
//! and closed trades.
//!
//! Edge cases never panic: zero equity, empty returns, an empty downside
//! set, or a zero-length period all yield the documented sentinels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradelab_core::domain::{EquityPoint, Trade};

/// Trading periods per year used when annualizing step returns.
const PERIODS_PER_YEAR: f64 = 252.0;

/// Risk/return metrics computed from the equity curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityMetrics {
    /// Fractional total return over the run.
    pub total_return: f64,
    /// `(1 + total_return)^(1/years) - 1`; zero when the period is empty.
    pub annualized_return: f64,
    /// Population std of step returns, annualized by sqrt(252).
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// Always <= 0.
    pub max_drawdown: f64,
    /// Longest below-peak stretch, in days.
    pub max_drawdown_duration_days: i64,
    /// Share of positive step returns.
    pub win_rate: f64,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    pub days: i64,
    pub years: f64,
}

impl EquityMetrics {
    /// Compute all equity-curve metrics.
    ///
    /// Needs at least two points; anything less returns the zeroed default.
    pub fn compute(
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        if equity_curve.len() < 2 || initial_capital <= 0.0 {
            return Self::default();
        }

        let values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let stamps: Vec<DateTime<Utc>> = equity_curve.iter().map(|p| p.ts).collect();
        let returns = step_returns(&values);

        let start_ts = stamps[0];
        let end_ts = stamps[stamps.len() - 1];
        let days = (end_ts - start_ts).num_days();
        let years = days as f64 / 365.25;

        let final_equity = values[values.len() - 1];
        let total_return = (final_equity - initial_capital) / initial_capital;

        let annualized_return = if years > 0.0 && 1.0 + total_return > 0.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let annualized_volatility = if returns.len() > 1 {
            population_std(&returns) * PERIODS_PER_YEAR.sqrt()
        } else {
            0.0
        };

        let sharpe_ratio = if annualized_volatility > 0.0 {
            (annualized_return - risk_free_rate) / annualized_volatility
        } else {
            0.0
        };

        // Sortino over the downside set; Sharpe substitutes when there is
        // no downside at all.
        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let sortino_ratio = if downside.is_empty() {
            sharpe_ratio
        } else {
            let downside_ms =
                downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64;
            let downside_vol = downside_ms.sqrt() * PERIODS_PER_YEAR.sqrt();
            if downside_vol > 0.0 {
                (annualized_return - risk_free_rate) / downside_vol
            } else {
                0.0
            }
        };

        let (max_drawdown, max_drawdown_duration_days) = max_drawdown_scan(&values, &stamps);

        let calmar_ratio = if max_drawdown < 0.0 {
            annualized_return / max_drawdown.abs()
        } else {
            0.0
        };

        let win_rate = if returns.is_empty() {
            0.0
        } else {
            returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
        };

        Self {
            total_return,
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown,
            max_drawdown_duration_days,
            win_rate,
            start_ts: Some(start_ts),
            end_ts: Some(end_ts),
            days,
            years,
        }
    }
}

/// Trade-level statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    /// Share of winners among all trades.
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub gross_profit: f64,
    /// Absolute value of summed losses.
    pub gross_loss: f64,
    /// `gross_profit / gross_loss`; zero when there are no losing trades.
    pub profit_factor: f64,
    pub avg_trade_pnl: f64,
    pub total_pnl: f64,
    pub avg_duration_hours: f64,
}

impl TradeMetrics {
    pub fn compute(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let winners: Vec<&Trade> = trades.iter().filter(|t| t.pnl > 0.0).collect();
        let losers: Vec<&Trade> = trades.iter().filter(|t| t.pnl < 0.0).collect();
        let breakeven = trades.len() - winners.len() - losers.len();

        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let gross_profit: f64 = winners.iter().map(|t| t.pnl).sum();
        let gross_loss: f64 = losers.iter().map(|t| t.pnl).sum::<f64>().abs();

        let (avg_win, largest_win) = if winners.is_empty() {
            (0.0, 0.0)
        } else {
            (
                gross_profit / winners.len() as f64,
                winners.iter().map(|t| t.pnl).fold(f64::MIN, f64::max),
            )
        };
        let (avg_loss, largest_loss) = if losers.is_empty() {
            (0.0, 0.0)
        } else {
            (
                -gross_loss / losers.len() as f64,
                losers.iter().map(|t| t.pnl).fold(f64::MAX, f64::min),
            )
        };

        let durations: Vec<f64> = trades.iter().filter_map(|t| t.duration_seconds()).collect();
        let avg_duration_hours = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64 / 3_600.0
        };

        Self {
            total_trades: trades.len(),
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            breakeven_trades: breakeven,
            win_rate: winners.len() as f64 / trades.len() as f64,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            gross_profit,
            gross_loss,
            profit_factor: if gross_loss > 0.0 {
                gross_profit / gross_loss
            } else {
                0.0
            },
            avg_trade_pnl: total_pnl / trades.len() as f64,
            total_pnl,
            avg_duration_hours,
        }
    }
}

/// One point of the drawdown curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub ts: DateTime<Utc>,
    pub drawdown: f64,
    pub drawdown_pct: f64,
}

/// Drawdown at every equity point: `(E - running_max) / running_max`.
pub fn drawdown_curve(equity_curve: &[EquityPoint]) -> Vec<DrawdownPoint> {
    let mut peak = f64::MIN;
    equity_curve
        .iter()
        .map(|point| {
            if point.equity > peak {
                peak = point.equity;
            }
            let drawdown = if peak > 0.0 {
                (point.equity - peak) / peak
            } else {
                0.0
            };
            DrawdownPoint {
                ts: point.ts,
                drawdown,
                drawdown_pct: drawdown * 100.0,
            }
        })
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-step returns, skipping steps whose prior equity is zero or negative.
fn step_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Population (biased) standard deviation.
fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Running-maximum scan: minimum drawdown (<= 0) and the longest
/// below-peak stretch in days.
fn max_drawdown_scan(values: &[f64], stamps: &[DateTime<Utc>]) -> (f64, i64) {
    let mut peak = values[0];
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0_i64;
    let mut below_since: Option<DateTime<Utc>> = None;

    for (value, ts) in values.iter().zip(stamps) {
        if *value >= peak {
            if *value > peak {
                peak = *value;
            }
            below_since = None;
            continue;
        }

        if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }

        let since = *below_since.get_or_insert(*ts);
        let duration = (*ts - since).num_days();
        if duration > max_duration {
            max_duration = duration;
        }
    }

    (max_dd, max_duration)
}
