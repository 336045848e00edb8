//! Engine configuration.
//!
//! Loaded with figment: serde defaults, then an optional TOML file, then
//! `LARDER_`-prefixed environment variables (`LARDER_LOG__LEVEL=debug`).

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use larder_core::{CodeList, DomainError};
use larder_observability::LogConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid config: {0}")]
    Invalid(#[from] DomainError),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load(Box::new(e))
    }
}

/// Unit price applied to FIFO shortfall when the caller supplies none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Unit cost of the ingredient's most recent purchase.
    #[default]
    LatestPurchase,
    Zero,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostingConfig {
    pub fallback_policy: FallbackPolicy,
}

/// Allowed reason and category codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    pub depletion_reasons: Vec<String>,
    pub loss_categories: Vec<String>,
    pub other_code: String,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            depletion_reasons: ["spoilage", "gift", "correction", "ad_hoc_usage", "other"]
                .map(String::from)
                .to_vec(),
            loss_categories: ["burnt", "broken", "contaminated", "dropped", "wrong_ingredients", "other"]
                .map(String::from)
                .to_vec(),
            other_code: "other".to_string(),
        }
    }
}

impl CodeConfig {
    pub fn depletion_reasons(&self) -> Result<CodeList, ConfigError> {
        Ok(CodeList::new(
            "depletion reason",
            self.depletion_reasons.iter().cloned(),
            self.other_code.clone(),
        )?)
    }

    pub fn loss_categories(&self) -> Result<CodeList, ConfigError> {
        Ok(CodeList::new(
            "loss category",
            self.loss_categories.iter().cloned(),
            self.other_code.clone(),
        )?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub log: LogConfig,
    pub codes: CodeConfig,
    pub costing: CostingConfig,
}

impl EngineConfig {
    pub const ENV_PREFIX: &'static str = "LARDER_";

    /// Defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(Self::ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        // Surface bad code lists at startup rather than on first use.
        config.codes.depletion_reasons()?;
        config.codes.loss_categories()?;
        Ok(config)
    }
}
