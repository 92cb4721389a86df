//! Genesis configuration for the auction module.
//!
//! This module defines the initial configuration of an engine instance:
//! auction parameter bounds, the sealing seed of the confidential backend and
//! the starting timestamp used by hosts that drive a manual clock.

use serde::{Deserialize, Serialize};

use auction_crypto::MIN_SEED_LEN;

use crate::confidential::SealedBackend;

/// Genesis configuration for the auction module.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionGenesisConfig {
    /// Default auction parameters
    #[serde(default)]
    pub default_params: DefaultAuctionParams,

    /// Hex seed for the sealing key. A random key is generated when absent.
    #[serde(default)]
    pub sealing_seed: Option<String>,

    /// Starting time for hosts that use a manual clock
    #[serde(default)]
    pub initial_timestamp: u64,
}

/// Bounds applied to every new auction and bid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAuctionParams {
    /// Minimum duration from start to end (seconds)
    pub min_duration: u64,
    /// Maximum duration, unbounded when absent
    #[serde(default)]
    pub max_duration: Option<u64>,
    /// Smallest collateral accepted with a bid
    pub min_collateral: u64,
}

impl Default for DefaultAuctionParams {
    fn default() -> Self {
        Self {
            min_duration: 60,                    // 1 minute
            max_duration: Some(30 * 24 * 3600), // 30 days
            min_collateral: 1,
        }
    }
}

impl Default for AuctionGenesisConfig {
    fn default() -> Self {
        Self {
            default_params: DefaultAuctionParams::default(),
            sealing_seed: None,
            initial_timestamp: 0,
        }
    }
}

impl AuctionGenesisConfig {
    /// Create a genesis config with a fixed sealing seed.
    pub fn with_seed(seed: &[u8]) -> Self {
        Self {
            sealing_seed: Some(hex::encode(seed)),
            ..Default::default()
        }
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        let params = &self.default_params;

        if params.min_duration == 0 {
            return Err(GenesisValidationError::InvalidDefaultParams(
                "Minimum duration cannot be zero".into(),
            ));
        }
        if matches!(params.max_duration, Some(max) if max < params.min_duration) {
            return Err(GenesisValidationError::InvalidDefaultParams(
                "Maximum duration below minimum duration".into(),
            ));
        }
        if params.min_collateral == 0 {
            return Err(GenesisValidationError::InvalidDefaultParams(
                "Minimum collateral cannot be zero".into(),
            ));
        }

        self.seed_bytes()?;
        Ok(())
    }

    /// Decoded sealing seed, if one is configured.
    pub fn seed_bytes(&self) -> Result<Option<Vec<u8>>, GenesisValidationError> {
        let Some(seed) = &self.sealing_seed else {
            return Ok(None);
        };
        let bytes = hex::decode(seed.trim_start_matches("0x"))
            .map_err(|e| GenesisValidationError::InvalidSealingSeed(e.to_string()))?;
        if bytes.len() < MIN_SEED_LEN {
            return Err(GenesisValidationError::InvalidSealingSeed(format!(
                "seed must be at least {MIN_SEED_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Some(bytes))
    }

    /// Construct the confidential backend described by this config.
    pub fn sealed_backend(&self) -> Result<SealedBackend, GenesisValidationError> {
        let backend = match self.seed_bytes()? {
            Some(seed) => SealedBackend::from_seed(&seed),
            None => SealedBackend::generate(),
        };
        backend.map_err(|e| GenesisValidationError::InvalidSealingSeed(e.to_string()))
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Invalid default parameters: {0}")]
    InvalidDefaultParams(String),

    #[error("Invalid sealing seed: {0}")]
    InvalidSealingSeed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuctionGenesisConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.seed_bytes().unwrap().is_none());
    }

    #[test]
    fn test_invalid_min_duration() {
        let mut config = AuctionGenesisConfig::default();
        config.default_params.min_duration = 0;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidDefaultParams(_))
        ));
    }

    #[test]
    fn test_max_below_min() {
        let mut config = AuctionGenesisConfig::default();
        config.default_params.min_duration = 600;
        config.default_params.max_duration = Some(300);
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidDefaultParams(_))
        ));

        config.default_params.max_duration = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_min_collateral() {
        let mut config = AuctionGenesisConfig::default();
        config.default_params.min_collateral = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sealing_seed() {
        let config = AuctionGenesisConfig::with_seed(&[7u8; 32]);
        assert_eq!(config.seed_bytes().unwrap(), Some(vec![7u8; 32]));
        assert!(config.sealed_backend().is_ok());

        let short = AuctionGenesisConfig::with_seed(&[7u8; 8]);
        assert!(matches!(
            short.validate(),
            Err(GenesisValidationError::InvalidSealingSeed(_))
        ));

        let config = AuctionGenesisConfig {
            sealing_seed: Some("not hex".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "default_params": { "min_duration": 120, "min_collateral": 5 },
            "initial_timestamp": 1000
        }"#;
        let config: AuctionGenesisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.default_params.min_duration, 120);
        assert_eq!(config.default_params.max_duration, None);
        assert_eq!(config.initial_timestamp, 1000);
        assert!(config.validate().is_ok());
    }
}
