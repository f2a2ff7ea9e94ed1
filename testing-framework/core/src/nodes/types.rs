use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const HASH_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CryptoHashError {
    #[error("invalid base58 hash: {0}")]
    Base58(#[from] bs58::decode::Error),
    #[error("hash must be {HASH_LEN} bytes, got {0}")]
    Length(usize),
}

/// 32-byte block hash, base58 encoded on the wire.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CryptoHash(pub [u8; HASH_LEN]);

impl FromStr for CryptoHash {
    type Err = CryptoHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s).into_vec()?;
        let len = bytes.len();
        <[u8; HASH_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| CryptoHashError::Length(len))
    }
}

impl fmt::Display for CryptoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for CryptoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoHash({self})")
    }
}

impl Serialize for CryptoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CryptoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Subset of the `status` RPC result the harness reads.
#[derive(Clone, Debug, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub chain_id: String,
    pub sync_info: SyncInfo,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SyncInfo {
    pub latest_block_height: u64,
    pub latest_block_hash: CryptoHash,
    #[serde(default)]
    pub syncing: bool,
}

/// Result of `EXPERIMENTAL_split_storage_info`. Every field is absent on
/// nodes that run without a cold store.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SplitStorageInfo {
    pub head_height: Option<u64>,
    pub final_head_height: Option<u64>,
    pub cold_head_height: Option<u64>,
    pub hot_db_kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const GENESIS_HASH: &str = "11111111111111111111111111111111";

    #[test]
    fn parses_status_payload() {
        let hash = bs58::encode([7u8; 32]).into_string();
        let payload = json!({
            "chain_id": "localnet",
            "protocol_version": 70,
            "sync_info": {
                "latest_block_height": 42,
                "latest_block_hash": hash,
                "latest_state_root": "ignored",
                "syncing": false
            },
            "validators": []
        });

        let status: StatusResponse = serde_json::from_value(payload).expect("decode status");
        assert_eq!(status.chain_id, "localnet");
        assert_eq!(status.sync_info.latest_block_height, 42);
        assert_eq!(status.sync_info.latest_block_hash, CryptoHash([7; 32]));
        assert_eq!(status.sync_info.latest_block_hash.to_string(), hash);
    }

    #[test]
    fn all_zero_hash_is_ones_in_base58() {
        let hash: CryptoHash = GENESIS_HASH.parse().expect("decode hash");
        assert_eq!(hash, CryptoHash::default());
    }

    #[test]
    fn rejects_short_hash() {
        let short = bs58::encode([1u8; 16]).into_string();
        let err = short.parse::<CryptoHash>().unwrap_err();
        assert!(matches!(err, CryptoHashError::Length(16)));
    }

    #[test]
    fn rejects_non_base58_hash() {
        let err = "0OIl".parse::<CryptoHash>().unwrap_err();
        assert!(matches!(err, CryptoHashError::Base58(_)));
    }

    #[test]
    fn split_storage_fields_are_optional() {
        let info: SplitStorageInfo = serde_json::from_value(json!({
            "head_height": 30,
            "final_head_height": 28,
            "cold_head_height": 28,
            "hot_db_kind": "Hot"
        }))
        .expect("decode split storage");
        assert_eq!(info.cold_head_height, Some(28));
        assert_eq!(info.hot_db_kind.as_deref(), Some("Hot"));

        let empty: SplitStorageInfo =
            serde_json::from_value(json!({})).expect("decode empty split storage");
        assert_eq!(empty, SplitStorageInfo::default());
    }
}
