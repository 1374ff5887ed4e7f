//! Run manifest — content hashes that let two runs be compared for parity.
//!
//! Every artifact stage is hashed over its canonical serialized bytes. Two
//! runs over the same inputs must produce byte-identical artifacts, so equal
//! manifests mean equal runs.

use serde::{Deserialize, Serialize};

/// Bumped whenever an artifact's column set or encoding changes.
pub const SCHEMA_VERSION: u32 = 1;

/// BLAKE3 hex digest of a byte stream.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: String,
    pub bars_hash: String,
    pub intent_hash: String,
    pub fills_hash: String,
    pub trades_hash: String,
    pub equity_hash: String,
}

impl RunManifest {
    /// Exact parity: every stage hash matches.
    pub fn matches(&self, other: &RunManifest) -> bool {
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }

    #[test]
    fn manifest_parity() {
        let m = RunManifest {
            schema_version: SCHEMA_VERSION,
            run_id: "r1".into(),
            bars_hash: content_hash(b"bars"),
            intent_hash: content_hash(b"intents"),
            fills_hash: content_hash(b"fills"),
            trades_hash: content_hash(b"trades"),
            equity_hash: content_hash(b"equity"),
        };
        let same = m.clone();
        assert!(m.matches(&same));

        let mut diverged = m.clone();
        diverged.fills_hash = content_hash(b"other fills");
        assert!(!m.matches(&diverged));
    }
}
