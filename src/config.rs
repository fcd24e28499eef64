//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{CODEC_VERSION, DEFAULT_BATCH_TIMEOUT_MS};
use crate::types::{ChainId, NetworkId};

/// Replay scope the engine is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub network_id: NetworkId,
    pub chain_id: ChainId,
}

impl Context {
    pub fn new(network_id: NetworkId, chain_id: ChainId) -> Self {
        Self { network_id, chain_id }
    }
}

/// Tunables for the ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmConfig {
    /// How long issued transactions are buffered before being exposed.
    /// Zero exposes them immediately.
    pub batch_timeout_ms: u64,
    pub codec_version: u16,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            batch_timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
            codec_version: CODEC_VERSION,
        }
    }
}

impl VmConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Configuration with immediate visibility of issued transactions
    pub fn immediate() -> Self {
        Self {
            batch_timeout_ms: 0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.batch_timeout(), Duration::from_secs(1));
        assert_eq!(config.codec_version, 0);
    }

    #[test]
    fn test_partial_json() {
        let config = VmConfig::from_json(r#"{"batchTimeoutMs": 0}"#).unwrap();
        assert_eq!(config, VmConfig::immediate());
        assert!(VmConfig::from_json("{").is_err());
    }

    #[test]
    fn test_context_json() {
        let json = format!(r#"{{"networkId": 43110, "chainId": "{}"}}"#, "00".repeat(32));
        let ctx: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(ctx, Context::new(43110, ChainId::default()));
    }
}
