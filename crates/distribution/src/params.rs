//! Module parameters.
//!
//! Stored under a single key, exported in genesis and loadable from TOML.
//! Decimal fields are written as strings:
//!
//! ```toml
//! community_tax = "0.02"
//! base_proposer_reward = "0.01"
//! bonus_proposer_reward = "0.04"
//! withdraw_addr_enabled = true
//! strict_commission_withdrawal = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use stakeflow_types::Dec;
use tracing::info;

use crate::errors::{DistributionError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionParams {
    /// Share of every block's fees routed to the community pool.
    pub community_tax: Dec,
    /// Fixed share of fees paid to the block proposer.
    pub base_proposer_reward: Dec,
    /// Extra proposer share, scaled by the fraction of power that signed.
    pub bonus_proposer_reward: Dec,
    /// Whether delegators may redirect payouts to another account.
    pub withdraw_addr_enabled: bool,
    /// Fail commission withdrawals on an empty accumulator instead of paying zero.
    pub strict_commission_withdrawal: bool,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            community_tax: Dec::with_prec(2, 2),
            base_proposer_reward: Dec::with_prec(1, 2),
            bonus_proposer_reward: Dec::with_prec(4, 2),
            withdraw_addr_enabled: true,
            strict_commission_withdrawal: false,
        }
    }
}

impl DistributionParams {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("community_tax", &self.community_tax),
            ("base_proposer_reward", &self.base_proposer_reward),
            ("bonus_proposer_reward", &self.bonus_proposer_reward),
        ];
        for (name, value) in fields {
            if !value.is_unit_interval() {
                return Err(DistributionError::InvalidParams(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let total = &(&self.base_proposer_reward + &self.bonus_proposer_reward) + &self.community_tax;
        if total > Dec::one() {
            return Err(DistributionError::InvalidParams(format!(
                "community tax plus proposer rewards exceed one: {total}"
            )));
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let params: Self = toml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let params = Self::from_toml_str(&content)?;
        info!(
            target: "distribution",
            path = %path.as_ref().display(),
            "loaded distribution params"
        );
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        let params = DistributionParams::default();
        assert!(params.validate().is_ok());
        assert!(params.withdraw_addr_enabled);
        assert!(!params.strict_commission_withdrawal);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let params = DistributionParams {
            community_tax: Dec::with_prec(11, 1),
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(DistributionError::InvalidParams(_))
        ));

        let params = DistributionParams {
            community_tax: Dec::with_prec(5, 1),
            base_proposer_reward: Dec::with_prec(3, 1),
            bonus_proposer_reward: Dec::with_prec(3, 1),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_toml_partial_overrides_defaults() {
        let params = DistributionParams::from_toml_str(
            r#"
            community_tax = "0.1"
            strict_commission_withdrawal = true
            "#,
        )
        .unwrap();
        assert_eq!(params.community_tax, Dec::with_prec(1, 1));
        assert!(params.strict_commission_withdrawal);
        assert_eq!(params.base_proposer_reward, Dec::with_prec(1, 2));
    }

    #[test]
    fn test_toml_invalid_value_is_rejected() {
        let err = DistributionParams::from_toml_str(r#"community_tax = "2""#).unwrap_err();
        assert!(matches!(err, DistributionError::InvalidParams(_)));

        let err = DistributionParams::from_toml_str(r#"community_tax = "abc""#).unwrap_err();
        assert!(matches!(err, DistributionError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distribution.toml");
        std::fs::write(&path, "withdraw_addr_enabled = false\n").unwrap();

        let params = DistributionParams::load_from_file(&path).unwrap();
        assert!(!params.withdraw_addr_enabled);

        let missing = DistributionParams::load_from_file(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(DistributionError::Io(_))));
    }
}
