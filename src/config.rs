//! Typed, validated startup configuration for the kernel.
//!
//! Loaded from YAML or JSON via `serde`. `${ENV_VAR}` tokens inside string
//! values are substituted from the process environment before parsing,
//! the way secrets (database credentials, token-signing keys) are kept out
//! of the committed document in the authentication collaborator — those
//! secrets do not live in this struct at all, only the knobs the core
//! kernel needs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env::VarError;

/// Maintenance-margin fraction for each leverage tier (see [`crate::liquidation::tiers`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaintenanceMarginConfig {
    /// Tier for leverage <= 10.
    pub conservative: Decimal,
    /// Tier for leverage <= 50.
    pub moderate: Decimal,
    /// Tier for leverage <= 100.
    pub aggressive: Decimal,
    /// Tier for leverage > 100.
    pub degen: Decimal,
}

/// Top-level kernel configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// The single instrument this kernel instance serves, e.g. `"R.index"`.
    pub instrument: String,
    /// Mark price used before any trade has occurred.
    pub starting_mark_price: Decimal,
    /// Minimum price increment for limit orders.
    pub tick_size: Decimal,
    /// Minimum order size accepted by `submit`.
    pub min_order_size: Decimal,
    /// Maximum leverage a trader may request.
    pub max_leverage: u32,
    /// Liquidation monitor scan interval, in milliseconds.
    pub liquidation_check_interval_ms: u64,
    /// Insurance fund starting balance.
    pub insurance_fund_initial_balance: Decimal,
    /// Maintenance margin by leverage tier.
    pub maintenance_margin: MaintenanceMarginConfig,
    /// Balance assigned to newly registered traders.
    pub starting_trader_balance: Decimal,
    /// Capacity of the in-memory recent-trades ring (at least 1000).
    #[serde(default = "default_recent_trades_capacity")]
    pub recent_trades_capacity: usize,
}

fn default_recent_trades_capacity() -> usize {
    1000
}

/// Errors produced while loading or validating a [`KernelConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `${VAR}` referenced an environment variable that is not set (or is
    /// not valid unicode).
    #[error("environment variable substitution failed for `{0}`: {1}")]
    EnvSubstitution(String, VarError),

    /// The document failed to parse as YAML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The parsed document failed a semantic validation rule.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl KernelConfig {
    /// Parse a YAML document, substituting `${ENV_VAR}` tokens in string
    /// scalars first, then validate the result.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let substituted = substitute_env_vars(raw)?;
        let config: KernelConfig = serde_yaml::from_str(&substituted)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the semantic invariants the loader doesn't get for free from
    /// `serde`: positivity of monetary/size fields and monotonic margin
    /// tiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.trim().is_empty() {
            return Err(ConfigError::Invalid("instrument must not be empty".into()));
        }
        if self.starting_mark_price <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "starting_mark_price must be positive".into(),
            ));
        }
        if self.tick_size <= Decimal::ZERO {
            return Err(ConfigError::Invalid("tick_size must be positive".into()));
        }
        if self.min_order_size <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "min_order_size must be positive".into(),
            ));
        }
        if self.max_leverage == 0 {
            return Err(ConfigError::Invalid("max_leverage must be >= 1".into()));
        }
        if self.insurance_fund_initial_balance < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "insurance_fund_initial_balance must be >= 0".into(),
            ));
        }
        let m = &self.maintenance_margin;
        if !(Decimal::ZERO < m.conservative
            && m.conservative < m.moderate
            && m.moderate < m.aggressive
            && m.aggressive < m.degen
            && m.degen < Decimal::ONE)
        {
            return Err(ConfigError::Invalid(
                "maintenance_margin tiers must satisfy 0 < conservative < moderate < aggressive < degen < 1"
                    .into(),
            ));
        }
        if self.recent_trades_capacity < 1000 {
            return Err(ConfigError::Invalid(
                "recent_trades_capacity must be at least 1000".into(),
            ));
        }
        Ok(())
    }
}

/// Replace every `${NAME}` occurrence in `raw` with the value of the `NAME`
/// environment variable. Scoped to the whole document text (config values
/// here are simple scalars, not free-form code), matching the
/// pre-processing-pass idiom used for secrets substitution across the
/// corpus's config layers.
fn substitute_env_vars(raw: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start..].find('}') else {
            out.push_str(rest);
            rest = "";
            break;
        };
        let end = start + end_rel;
        out.push_str(&rest[..start]);
        let var_name = &rest[start + 2..end];
        let value = std::env::var(var_name)
            .map_err(|e| ConfigError::EnvSubstitution(var_name.to_string(), e))?;
        out.push_str(&value);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> String {
        r#"
instrument: "R.index"
starting_mark_price: "1000"
tick_size: "0.01"
min_order_size: "0.001"
max_leverage: 100
liquidation_check_interval_ms: 100
insurance_fund_initial_balance: "10000"
maintenance_margin:
  conservative: "0.005"
  moderate: "0.01"
  aggressive: "0.02"
  degen: "0.05"
starting_trader_balance: "10000"
"#
        .to_string()
    }

    #[test]
    fn parses_valid_config() {
        let cfg = KernelConfig::from_yaml(&sample_yaml()).unwrap();
        assert_eq!(cfg.instrument, "R.index");
        assert_eq!(cfg.recent_trades_capacity, 1000);
    }

    #[test]
    fn substitutes_env_vars() {
        // SAFETY: test-only, single-threaded access to this variable.
        unsafe { std::env::set_var("RINDEX_TEST_LEVERAGE", "50") };
        let yaml = sample_yaml().replace("max_leverage: 100", "max_leverage: ${RINDEX_TEST_LEVERAGE}");
        let cfg = KernelConfig::from_yaml(&yaml).unwrap();
        assert_eq!(cfg.max_leverage, 50);
    }

    #[test]
    fn rejects_non_monotonic_tiers() {
        let yaml = sample_yaml().replace("aggressive: \"0.02\"", "aggressive: \"0.005\"");
        assert!(KernelConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn rejects_zero_mark_price() {
        let yaml = sample_yaml().replace("starting_mark_price: \"1000\"", "starting_mark_price: \"0\"");
        assert!(KernelConfig::from_yaml(&yaml).is_err());
    }
}
