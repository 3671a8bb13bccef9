//! Engine parameters
//!
//! Params are plain serde data. They can be built in code, or loaded from a
//! YAML or JSON file; either way they are validated before the keeper
//! accepts them.
//!
//! ```yaml
//! base_currency: uusdc
//! liquidation_threshold: "1.0"
//! safe_threshold: "1.1"
//! pool_open_threshold: "0.65"
//! epoch_length: 1
//! max_open_positions: 9999
//! interest_policy: stacked
//! ```

use crate::error::{MarginError, Result};
use crate::types::Denom;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How interest that free collateral cannot cover is carried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestPolicy {
    /// Unpaid interest is added to liabilities and compounds
    #[default]
    Stacked,
    /// Unpaid interest waits in its own bucket and is retried each epoch
    Separate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Common valuation unit for health and consolidation
    pub base_currency: Denom,

    /// Positions at or below this health are force closed
    pub liquidation_threshold: Decimal,

    /// Minimum health a position must have right after opening
    pub safe_threshold: Decimal,

    /// Minimum pool health after registering new exposure
    pub pool_open_threshold: Decimal,

    /// Blocks per interest epoch
    pub epoch_length: u64,

    pub max_open_positions: u64,

    pub interest_policy: InterestPolicy,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            base_currency: Denom::from_static("uusdc"),
            liquidation_threshold: dec!(1.0),
            safe_threshold: dec!(1.1),
            pool_open_threshold: dec!(0.65),
            epoch_length: 1,
            max_open_positions: 9999,
            interest_policy: InterestPolicy::Stacked,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.liquidation_threshold <= Decimal::ZERO {
            return Err(MarginError::InvalidParams(
                "liquidation_threshold must be positive".into(),
            ));
        }
        if self.safe_threshold < self.liquidation_threshold {
            return Err(MarginError::InvalidParams(format!(
                "safe_threshold {} below liquidation_threshold {}",
                self.safe_threshold, self.liquidation_threshold
            )));
        }
        if self.pool_open_threshold < Decimal::ZERO || self.pool_open_threshold > Decimal::ONE {
            return Err(MarginError::InvalidParams(
                "pool_open_threshold must be within [0, 1]".into(),
            ));
        }
        if self.epoch_length == 0 {
            return Err(MarginError::InvalidParams("epoch_length must be > 0".into()));
        }
        Ok(())
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let params: Params = serde_yaml::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let params: Params = serde_json::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    /// Load from a `.json` file, anything else is parsed as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Epoch index a block height falls in
    pub fn epoch_of(&self, height: u64) -> u64 {
        height / self.epoch_length.max(1)
    }

    /// Whether `height` starts a new interest epoch
    pub fn is_epoch_boundary(&self, height: u64) -> bool {
        height % self.epoch_length.max(1) == 0
    }
}
