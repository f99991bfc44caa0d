//! Artifact export: report JSON, equity/trade/drawdown CSVs, audit trail.

use crate::report::BacktestReport;
use anyhow::Context;
use std::fs;
use std::path::Path;
use tradelab_core::engine::AuditTrail;

/// Write a report and its CSV artifacts into `dir`.
///
/// Produces `report.json`, `summary.txt`, `equity_curve.csv`,
/// `drawdown_curve.csv`, and `trades.csv`.
pub fn export_report(dir: &Path, report: &BacktestReport) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating export directory {}", dir.display()))?;

    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    fs::write(dir.join("report.json"), json).context("writing report.json")?;

    fs::write(dir.join("summary.txt"), report.summary_text()).context("writing summary.txt")?;

    write_csv(&dir.join("equity_curve.csv"), &report.equity_curve)?;
    write_csv(&dir.join("drawdown_curve.csv"), &report.drawdown_curve)?;
    write_csv(&dir.join("trades.csv"), &report.trades)?;

    Ok(())
}

/// Write a recorder audit trail as `audit_trail.json`.
pub fn export_audit_trail(dir: &Path, trail: &AuditTrail) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating export directory {}", dir.display()))?;
    let json = serde_json::to_string_pretty(trail).context("serializing audit trail")?;
    fs::write(dir.join("audit_trail.json"), json).context("writing audit_trail.json")?;
    Ok(())
}

fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
