//! Strategy registry: the engine's extension point.
//!
//! Registrations happen once, through the builder, at startup; afterwards
//! the registry is read-only and can be shared across concurrent runs.

use super::{BuyAndHold, SmaCross, Strategy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("unknown strategy {name:?}; available: {available:?}")]
    UnknownStrategy { name: String, available: Vec<String> },

    #[error("invalid parameters for {name}: {reason}")]
    InvalidParams { name: String, reason: String },
}

/// Human-facing strategy metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Parameter schema: name -> {type, default, min, max}.
    pub parameters: Value,
}

type StrategyFactory = Box<dyn Fn(&Value) -> Result<Box<dyn Strategy>, RegistryError> + Send + Sync>;

/// One-shot builder; `build()` freezes the registration set.
#[derive(Default)]
pub struct StrategyRegistryBuilder {
    entries: BTreeMap<String, (StrategyInfo, StrategyFactory)>,
}

impl StrategyRegistryBuilder {
    pub fn register(
        mut self,
        info: StrategyInfo,
        factory: impl Fn(&Value) -> Result<Box<dyn Strategy>, RegistryError> + Send + Sync + 'static,
    ) -> Self {
        self.entries
            .insert(info.name.clone(), (info, Box::new(factory)));
        self
    }

    pub fn build(self) -> StrategyRegistry {
        StrategyRegistry {
            entries: self.entries,
        }
    }
}

/// Read-only map from strategy name to factory + metadata.
pub struct StrategyRegistry {
    entries: BTreeMap<String, (StrategyInfo, StrategyFactory)>,
}

fn param_field<T: serde::de::DeserializeOwned>(
    params: &Value,
    key: &str,
    default: T,
) -> Result<T, String> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| format!("parameter {key:?}: {e}")),
    }
}

impl StrategyRegistry {
    pub fn builder() -> StrategyRegistryBuilder {
        StrategyRegistryBuilder::default()
    }

    /// Registry preloaded with the reference strategies.
    pub fn with_builtins() -> Self {
        Self::builder()
            .register(
                StrategyInfo {
                    name: "sma_cross".into(),
                    display_name: "SMA Crossover".into(),
                    description: "Simple moving average crossover strategy".into(),
                    parameters: json!({
                        "fast": {"type": "int", "default": 10, "min": 2, "max": 500},
                        "slow": {"type": "int", "default": 20, "min": 2, "max": 1000},
                        "position_size": {"type": "float", "default": 1.0, "min": 0.001},
                    }),
                },
                |params| {
                    let build = || -> Result<SmaCross, String> {
                        let fast = param_field(params, "fast", 10usize)?;
                        let slow = param_field(params, "slow", 20usize)?;
                        let position_size = param_field(params, "position_size", 1.0f64)?;
                        SmaCross::new(fast, slow, position_size).map_err(|e| e.to_string())
                    };
                    build()
                        .map(|s| Box::new(s) as Box<dyn Strategy>)
                        .map_err(|reason| RegistryError::InvalidParams {
                            name: "sma_cross".into(),
                            reason,
                        })
                },
            )
            .register(
                StrategyInfo {
                    name: "buy_and_hold".into(),
                    display_name: "Buy and Hold".into(),
                    description: "Buy once at start and hold until end".into(),
                    parameters: json!({
                        "position_size": {"type": "float", "default": 1.0, "min": 0.001},
                    }),
                },
                |params| {
                    let build = || -> Result<BuyAndHold, String> {
                        let position_size = param_field(params, "position_size", 1.0f64)?;
                        BuyAndHold::new(position_size).map_err(|e| e.to_string())
                    };
                    build()
                        .map(|s| Box::new(s) as Box<dyn Strategy>)
                        .map_err(|reason| RegistryError::InvalidParams {
                            name: "buy_and_hold".into(),
                            reason,
                        })
                },
            )
            .build()
    }

    /// Instantiate a strategy by name.
    pub fn create(&self, name: &str, params: &Value) -> Result<Box<dyn Strategy>, RegistryError> {
        let (_, factory) =
            self.entries
                .get(name)
                .ok_or_else(|| RegistryError::UnknownStrategy {
                    name: name.to_string(),
                    available: self.names(),
                })?;
        factory(params)
    }

    /// Metadata for every registered strategy, in name order.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.entries.values().map(|(info, _)| info).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = StrategyRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["buy_and_hold", "sma_cross"]);
        assert!(registry.contains("sma_cross"));
        assert!(!registry.contains("nonsense"));
    }

    #[test]
    fn create_with_defaults() {
        let registry = StrategyRegistry::with_builtins();
        let strategy = registry.create("sma_cross", &json!({})).unwrap();
        assert_eq!(strategy.name(), "sma_cross");
    }

    #[test]
    fn create_with_explicit_params() {
        let registry = StrategyRegistry::with_builtins();
        let strategy = registry
            .create("sma_cross", &json!({"fast": 2, "slow": 3, "position_size": 0.5}))
            .unwrap();
        assert_eq!(strategy.name(), "sma_cross");
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry.create("momentum", &json!({})).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownStrategy { .. }));
    }

    #[test]
    fn invalid_params_are_an_error() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .create("sma_cross", &json!({"fast": 30, "slow": 10}))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidParams { .. }));
    }

    #[test]
    fn malformed_param_type_is_an_error() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .create("sma_cross", &json!({"fast": "ten"}))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidParams { .. }));
    }

    #[test]
    fn list_exposes_parameter_schemas() {
        let registry = StrategyRegistry::with_builtins();
        let infos = registry.list();
        assert_eq!(infos.len(), 2);
        let sma = infos.iter().find(|i| i.name == "sma_cross").unwrap();
        assert!(sma.parameters.get("fast").is_some());
    }

    #[test]
    fn custom_registration_through_builder() {
        use crate::domain::{Bar, Order};
        use crate::strategy::{Strategy, StrategyContext, StrategyError};

        struct Idle;
        impl Strategy for Idle {
            fn name(&self) -> &str {
                "idle"
            }
            fn on_bar(
                &mut self,
                _bar: &Bar,
                _ctx: &mut StrategyContext,
            ) -> Result<Vec<Order>, StrategyError> {
                Ok(Vec::new())
            }
        }

        let registry = StrategyRegistry::builder()
            .register(
                StrategyInfo {
                    name: "idle".into(),
                    display_name: "Idle".into(),
                    description: "Emits nothing".into(),
                    parameters: json!({}),
                },
                |_params| Ok(Box::new(Idle) as Box<dyn Strategy>),
            )
            .build();

        assert!(registry.create("idle", &json!({})).is_ok());
        assert!(registry.create("sma_cross", &json!({})).is_err());
    }
}
