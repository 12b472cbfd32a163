use anyhow::Context;
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use implicit::Hyperparameters;

/// Everything a run of the retail pipeline needs besides the data. Missing fields take their
/// default values, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Fraction of the purchases hidden from training, for evaluation.
    pub pct_test: f64,
    /// Seed of the train/test split. The factors have their own seed in `hyperparameters`.
    pub seed: u64,
    pub hyperparameters: Hyperparameters,
    pub num_recommendations: usize,
}

impl Default for RunConfig {
    fn default() -> RunConfig {
        RunConfig {
            pct_test: 0.2,
            seed: 0,
            hyperparameters: Hyperparameters::default(),
            num_recommendations: 10,
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> anyhow::Result<RunConfig> {
        let value: serde_json::Value =
            serde_json::from_str(json).context("invalid run configuration")?;
        anyhow::ensure!(value.is_object(), "a run configuration must be a JSON object");
        let config: RunConfig =
            serde_json::from_value(value).context("invalid run configuration")?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<RunConfig> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("could not read configuration {}", path.display()))?;
        RunConfig::from_json(&json).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.pct_test > 0.0 && self.pct_test < 1.0,
            "pct_test must lie strictly between 0 and 1, got {}",
            self.pct_test
        );
        self.hyperparameters.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use implicit::SingularPolicy;

    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(RunConfig::from_json("{}").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = RunConfig::from_json(
            r#"{
                "pct_test": 0.25,
                "hyperparameters": { "alpha": 15.0, "iterations": 15, "singular_policy": "fail" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.pct_test, 0.25);
        assert_eq!(config.seed, 0);
        assert_eq!(config.num_recommendations, 10);
        assert_eq!(config.hyperparameters.alpha(), 15.0);
        assert_eq!(config.hyperparameters.iterations(), 15);
        assert_eq!(config.hyperparameters.lambda(), 0.1);
        assert_eq!(config.hyperparameters.rank_size(), 20);
        assert_eq!(
            config.hyperparameters.singular_policy(),
            SingularPolicy::Fail
        );
    }

    #[test]
    fn test_invalid_configs() {
        assert!(RunConfig::from_json(r#"{ "pct_test": 1.5 }"#).is_err());
        assert!(RunConfig::from_json(r#"{ "hyperparameters": { "lambda": -1.0 } }"#).is_err());
        assert!(RunConfig::from_json(r#"{ "pct_tset": 0.2 }"#).is_err());
    }

    #[test]
    fn test_config_must_be_an_object() {
        assert!(RunConfig::from_json("[]").is_err());
        assert!(RunConfig::from_json("[0.3, 1]").is_err());
        assert!(RunConfig::from_json("0.2").is_err());
        assert!(RunConfig::from_json("null").is_err());
    }

    #[test]
    fn test_shipped_retail_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/retail.json");
        let config = RunConfig::from_path(&path).unwrap();

        assert_eq!(config.hyperparameters.alpha(), 15.0);
        assert_eq!(config.hyperparameters.iterations(), 15);
    }
}
