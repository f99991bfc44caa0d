//! Serializable backtest run configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tradelab_core::domain::RunId;

/// Complete, serializable description of a single backtest run.
///
/// Two runs with identical configs share the same [`RunConfig::run_id`],
/// which is exactly the determinism contract: same config + same bars =>
/// same results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Strategy name and parameters.
    pub strategy: StrategyConfig,

    /// Universe of symbols to trade.
    pub universe: Vec<String>,

    /// Starting cash balance.
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,

    /// Execution model settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Whether the recorder keeps every bar.
    #[serde(default)]
    pub record_bars: bool,

    /// Annual risk-free rate used by Sharpe/Sortino.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    /// Opaque dataset metadata, echoed into the report.
    #[serde(default)]
    pub dataset: Value,
}

fn default_initial_cash() -> f64 {
    10_000.0
}

fn default_risk_free_rate() -> f64 {
    0.02
}

impl RunConfig {
    /// Deterministic content-addressed run identifier.
    pub fn run_id(&self) -> String {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        RunId::from_bytes(json.as_bytes()).as_hex()
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Strategy selection for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

/// Slippage model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlippageConfig {
    None,
    FixedBps { bps: f64 },
    VolumeBased { base_bps: f64, volume_impact: f64 },
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self::FixedBps { bps: 5.0 }
    }
}

/// Fee model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeConfig {
    None,
    Percentage { pct: f64 },
    Tiered { tiers: Vec<(f64, f64)> },
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self::Percentage { pct: 0.1 }
    }
}

/// Microstructure settings for the realistic executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealisticConfig {
    pub spread_bps: f64,
    pub max_fill_pct: f64,
}

/// Execution model settings for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub slippage: SlippageConfig,

    #[serde(default)]
    pub fees: FeeConfig,

    /// When set, use the realistic executor (spread + volume cap).
    #[serde(default)]
    pub realistic: Option<RealisticConfig>,

    /// When set, use the paper broker with this many bars of delay.
    #[serde(default)]
    pub paper_delay_bars: Option<u32>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage: SlippageConfig::default(),
            fees: FeeConfig::default(),
            realistic: None,
            paper_delay_bars: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> RunConfig {
        RunConfig {
            strategy: StrategyConfig {
                name: "sma_cross".into(),
                params: json!({"fast": 2, "slow": 3}),
            },
            universe: vec!["BTCUSDT".into()],
            initial_cash: 10_000.0,
            execution: ExecutionConfig::default(),
            record_bars: false,
            risk_free_rate: 0.02,
            dataset: Value::Null,
        }
    }

    #[test]
    fn identical_configs_share_a_run_id() {
        assert_eq!(config().run_id(), config().run_id());
    }

    #[test]
    fn different_params_change_the_run_id() {
        let mut other = config();
        other.strategy.params = json!({"fast": 3, "slow": 5});
        assert_ne!(config().run_id(), other.run_id());
    }

    #[test]
    fn run_id_is_hex_64() {
        let id = config().run_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parses_from_toml() {
        let text = r#"
            universe = ["BTCUSDT", "ETHUSDT"]
            initial_cash = 50000.0

            [strategy]
            name = "buy_and_hold"

            [execution.slippage]
            type = "FIXED_BPS"
            bps = 2.0

            [execution.fees]
            type = "NONE"
        "#;
        let config = RunConfig::from_toml_str(text).unwrap();
        assert_eq!(config.strategy.name, "buy_and_hold");
        assert_eq!(config.universe.len(), 2);
        assert_eq!(config.initial_cash, 50_000.0);
        assert_eq!(config.execution.slippage, SlippageConfig::FixedBps { bps: 2.0 });
        assert_eq!(config.execution.fees, FeeConfig::None);
        // Defaults fill the rest.
        assert_eq!(config.risk_free_rate, 0.02);
        assert!(!config.record_bars);
    }

    #[test]
    fn defaults_apply() {
        let text = r#"
            universe = ["BTCUSDT"]

            [strategy]
            name = "sma_cross"
        "#;
        let config = RunConfig::from_toml_str(text).unwrap();
        assert_eq!(config.initial_cash, 10_000.0);
        assert_eq!(config.execution.slippage, SlippageConfig::FixedBps { bps: 5.0 });
        assert_eq!(config.execution.fees, FeeConfig::Percentage { pct: 0.1 });
    }

    #[test]
    fn json_roundtrip() {
        let config = config();
        let json = serde_json::to_string(&config).unwrap();
        let deser: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deser);
    }
}
