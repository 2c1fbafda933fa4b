//! Configuration sections consumed by the rewarding engine.
//!
//! Both sections deserialize from TOML with per-field defaults, so a partial
//! `[chain]` or `[rewarding]` table is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::RewardingContext;
use crate::dispatcher::DispatchSettings;
use crate::scheduler::SchedulerSettings;
use crate::{Result, RewardError};

/// Chain account and contract settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Address signing the reward transactions.
    #[serde(default)]
    pub sender_address: String,
    /// Mixnet contract receiving the reward messages.
    #[serde(default)]
    pub mixnet_contract_address: String,
    #[serde(default = "default_denom")]
    pub denom: String,
}

/// Batching, concurrency and epoch timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardingConfig {
    /// Maximum participants per reward transaction.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Maximum batches awaiting confirmation at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Seconds to wait for a transaction's confirmation.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_epoch_length_secs")]
    pub epoch_length_secs: u64,
}

fn default_denom() -> String {
    "unym".to_string()
}

fn default_max_batch_size() -> usize {
    10
}

fn default_max_in_flight() -> usize {
    4
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_epoch_length_secs() -> u64 {
    60 * 60
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            sender_address: String::new(),
            mixnet_contract_address: String::new(),
            denom: default_denom(),
        }
    }
}

impl Default for RewardingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_in_flight: default_max_in_flight(),
            call_timeout_secs: default_call_timeout_secs(),
            epoch_length_secs: default_epoch_length_secs(),
        }
    }
}

impl ChainConfig {
    pub fn context(&self) -> Result<RewardingContext> {
        RewardingContext::new(&self.sender_address, &self.mixnet_contract_address)
    }
}

impl RewardingConfig {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.max_batch_size, "max_batch_size"),
            (self.max_in_flight, "max_in_flight"),
            (self.call_timeout_secs as usize, "call_timeout_secs"),
            (self.epoch_length_secs as usize, "epoch_length_secs"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(RewardError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            max_in_flight: self.max_in_flight,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            max_batch_size: self.max_batch_size,
            epoch_length: Duration::from_secs(self.epoch_length_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RewardingConfig::default();
        config.validate().expect("valid");
        assert_eq!(config.dispatch_settings().call_timeout, Duration::from_secs(60));
        assert_eq!(config.scheduler_settings().max_batch_size, 10);
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = RewardingConfig {
            max_in_flight: 0,
            ..RewardingConfig::default()
        };
        assert!(matches!(config.validate(), Err(RewardError::InvalidConfig(_))));

        let config = RewardingConfig {
            call_timeout_secs: 0,
            ..RewardingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_section() {
        let config: RewardingConfig =
            serde_json::from_value(serde_json::json!({"max_batch_size": 3})).expect("parse");
        assert_eq!(config.max_batch_size, 3);
        assert_eq!(config.max_in_flight, 4);
    }

    #[test]
    fn test_default_chain_has_no_context() {
        assert!(ChainConfig::default().context().is_err());
    }
}
