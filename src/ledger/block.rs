use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Data label carried by the first block of every chain.
pub const GENESIS_DATA: &str = "Genesis Block";

/// One record of the ledger. Field names are the wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub data: String,
    pub previous_hash: String,
    pub hash: String,
}

impl Block {
    /// Build a block and seal it with its digest.
    pub fn new(index: u64, timestamp: String, data: String, previous_hash: String) -> Self {
        let hash = calculate_hash(index, &timestamp, &data, &previous_hash);
        Self { index, timestamp, data, previous_hash, hash }
    }

    /// The fixed first block. The stored timestamp is the one that was hashed.
    pub fn genesis(timestamp: impl Into<String>) -> Self {
        Self::new(0, timestamp.into(), GENESIS_DATA.to_string(), String::new())
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash.is_empty()
    }

    /// Recompute the digest from the block's own fields.
    pub fn computed_hash(&self) -> String {
        calculate_hash(self.index, &self.timestamp, &self.data, &self.previous_hash)
    }

    /// Compact JSON, no embedded newlines.
    pub fn to_json(&self) -> String {
        // Serializing plain strings and integers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// SHA-256 over `index || timestamp || data || previous_hash`, lowercase hex.
pub fn calculate_hash(index: u64, timestamp: &str, data: &str, previous_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string().as_bytes());
    hasher.update(timestamp.as_bytes());
    hasher.update(data.as_bytes());
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current UTC time as RFC 3339 text.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
