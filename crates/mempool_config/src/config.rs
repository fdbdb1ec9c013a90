//! This module contains the configuration for the mempool, including the `MempoolConfig` struct
//! and its implementation of the `SerializeConfig` trait.

use std::collections::BTreeMap;
use std::time::Duration;

use dpos_config::converters::deserialize_milliseconds_to_duration;
use dpos_config::dumping::{ser_param, SerializeConfig};
use dpos_config::{ParamPath, ParamPrivacyInput, SerializedParam};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Configuration for the transaction mempool.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Validate)]
pub struct MempoolConfig {
    /// Global cap on the number of resident transactions. Triggers eviction.
    pub max_transactions: usize,
    /// Per-sender cap on the number of resident transactions.
    pub max_transactions_per_account: usize,
    /// Admission floor on a transaction's `fee_priority`.
    pub min_entrance_fee_priority: u64,
    /// Minimum fee delta a replacement must offer over the incumbent at the same nonce.
    pub min_replacement_fee_difference: u64,
    /// Maximum age of a resident transaction before it is expired.
    #[serde(deserialize_with = "deserialize_milliseconds_to_duration")]
    pub transaction_expiry_time: Duration,
    /// Period between reorganize runs.
    #[serde(deserialize_with = "deserialize_milliseconds_to_duration")]
    pub transaction_reorganization_interval: Duration,
    /// Period between expire runs.
    #[serde(deserialize_with = "deserialize_milliseconds_to_duration")]
    pub transaction_expiry_check_interval: Duration,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 4096,
            max_transactions_per_account: 64,
            min_entrance_fee_priority: 0,
            min_replacement_fee_difference: 10,
            transaction_expiry_time: Duration::from_millis(3 * 3600 * 1000),
            transaction_reorganization_interval: Duration::from_millis(500),
            transaction_expiry_check_interval: Duration::from_millis(60_000),
        }
    }
}

impl SerializeConfig for MempoolConfig {
    fn dump(&self) -> BTreeMap<ParamPath, SerializedParam> {
        BTreeMap::from_iter([
            ser_param(
                "max_transactions",
                &self.max_transactions,
                "Global cap on the number of resident transactions; triggers eviction.",
                ParamPrivacyInput::Public,
            ),
            ser_param(
                "max_transactions_per_account",
                &self.max_transactions_per_account,
                "Per-sender cap on the number of resident transactions.",
                ParamPrivacyInput::Public,
            ),
            ser_param(
                "min_entrance_fee_priority",
                &self.min_entrance_fee_priority,
                "Admission floor on a transaction's fee_priority.",
                ParamPrivacyInput::Public,
            ),
            ser_param(
                "min_replacement_fee_difference",
                &self.min_replacement_fee_difference,
                "Minimum fee delta a replacement must offer over the incumbent at the same \
                 nonce.",
                ParamPrivacyInput::Public,
            ),
            ser_param(
                "transaction_expiry_time",
                &self.transaction_expiry_time.as_millis(),
                "Maximum age (ms) of a resident transaction before it is expired.",
                ParamPrivacyInput::Public,
            ),
            ser_param(
                "transaction_reorganization_interval",
                &self.transaction_reorganization_interval.as_millis(),
                "Period (ms) between reorganize runs.",
                ParamPrivacyInput::Public,
            ),
            ser_param(
                "transaction_expiry_check_interval",
                &self.transaction_expiry_check_interval.as_millis(),
                "Period (ms) between expire runs.",
                ParamPrivacyInput::Public,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use dpos_config::dumping::SerializeConfig;

    use super::MempoolConfig;

    #[test]
    fn test_default_values() {
        let config = MempoolConfig::default();
        assert_eq!(config.max_transactions, 4096);
        assert_eq!(config.max_transactions_per_account, 64);
        assert_eq!(config.min_entrance_fee_priority, 0);
        assert_eq!(config.min_replacement_fee_difference, 10);
        assert_eq!(config.transaction_expiry_time.as_millis(), 3 * 3600 * 1000);
    }

    #[test]
    fn test_dump_round_trips_through_load() {
        let config = MempoolConfig::default();
        let dump = config.dump();
        let values_map = dump
            .into_iter()
            .map(|(path, param)| {
                let value = match param.content {
                    dpos_config::SerializedContent::DefaultValue(v) => v,
                    _ => panic!("unexpected pointer or required param in a concrete config dump"),
                };
                (path, value)
            })
            .collect();
        let loaded: MempoolConfig = dpos_config::loading::load(&values_map).unwrap();
        assert_eq!(loaded, config);
    }
}
