//! Configuration for the auction module.
//!
//! Loaded once when the ledger starts and fixed for its lifetime.

use serde::{Deserialize, Serialize};

/// What happens when a bidder bids again on the same auction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateBidPolicy {
    /// A second bid fails with `AlreadyBid`.
    #[default]
    Reject,
    /// A second bid adds to the existing encrypted amount.
    TopUp,
}

/// Auction module configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub duplicate_bid_policy: DuplicateBidPolicy,

    /// Minimum distance from start to end (seconds)
    pub min_duration_secs: u64,

    /// Maximum accepted bids per auction
    pub max_bids_per_auction: u32,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            duplicate_bid_policy: DuplicateBidPolicy::Reject,
            min_duration_secs: 1,
            max_bids_per_auction: 10_000,
        }
    }
}

impl ModuleConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_duration_secs == 0 {
            return Err(ConfigError::InvalidParams(
                "Minimum duration cannot be zero".into(),
            ));
        }
        if self.max_bids_per_auction == 0 {
            return Err(ConfigError::InvalidParams(
                "Bid limit cannot be zero".into(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur during config validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid module parameters: {0}")]
    InvalidParams(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModuleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.duplicate_bid_policy, DuplicateBidPolicy::Reject);
    }

    #[test]
    fn test_zero_duration_rejected() {
        let config = ModuleConfig {
            min_duration_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ModuleConfig =
            serde_json::from_str(r#"{ "duplicate_bid_policy": "top_up" }"#).unwrap();
        assert_eq!(config.duplicate_bid_policy, DuplicateBidPolicy::TopUp);
        assert_eq!(config.max_bids_per_auction, 10_000);
    }
}
