//! Artifact manifest format and metadata.
//!
//! The manifest is stored as the first entry in every artifact, describing
//! whose snapshot it holds and how to verify the payload that follows.

use crate::document::SnapshotDocument;
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the artifact format.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Name of the manifest entry in the artifact.
pub const MANIFEST_FILENAME: &str = ".backup-manifest.json";

/// Name of the snapshot payload entry in the artifact.
pub const SNAPSHOT_FILENAME: &str = "snapshot.json";

/// Complete artifact manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Manifest format version
    pub version: String,

    /// Whose rows the snapshot holds
    pub user_id: UserId,

    /// When the snapshot was written
    pub created_at: DateTime<Utc>,

    /// What created this artifact (e.g., "keepsake v0.3.0")
    pub created_by: String,

    /// Compression algorithm used
    pub compression: String,

    /// Checksum of the snapshot payload
    pub checksum: ChecksumInfo,

    /// Snapshot statistics
    pub statistics: SnapshotStatistics,
}

/// Checksum information for integrity verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumInfo {
    /// Hash algorithm (sha256)
    pub algorithm: String,

    /// Hex-encoded checksum value
    pub value: String,
}

impl ChecksumInfo {
    pub fn sha256(value: impl Into<String>) -> Self {
        Self {
            algorithm: "sha256".to_string(),
            value: value.into(),
        }
    }
}

/// Statistics about the snapshot payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStatistics {
    /// Row count per table
    pub tables: BTreeMap<String, usize>,

    /// Rows across all tables
    pub total_rows: usize,

    /// Uncompressed payload size in bytes
    pub payload_size_bytes: u64,
}

impl ArtifactManifest {
    /// Creates a manifest for a serialized snapshot.
    pub fn new(
        user_id: UserId,
        created_at: DateTime<Utc>,
        document: &SnapshotDocument,
        payload_size_bytes: u64,
        checksum: ChecksumInfo,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            user_id,
            created_at,
            created_by: format!("keepsake v{}", env!("CARGO_PKG_VERSION")),
            compression: "gzip".to_string(),
            checksum,
            statistics: SnapshotStatistics {
                tables: document.row_counts(),
                total_rows: document.total_rows(),
                payload_size_bytes,
            },
        }
    }

    /// Serializes the manifest to JSON.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize manifest: {}", e))
    }

    /// Deserializes a manifest from JSON.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("Failed to deserialize manifest: {}", e))
    }

    /// Validates that the manifest is readable by this version.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version != MANIFEST_VERSION {
            return Err(anyhow::anyhow!(
                "Incompatible manifest version: {} (expected {})",
                self.version,
                MANIFEST_VERSION
            ));
        }

        if self.checksum.algorithm != "sha256" {
            return Err(anyhow::anyhow!(
                "Unsupported checksum algorithm: {}",
                self.checksum.algorithm
            ));
        }

        if self.compression != "gzip" {
            return Err(anyhow::anyhow!(
                "Unsupported compression: {}",
                self.compression
            ));
        }

        Ok(())
    }

    /// Confirms the payload matches the recorded checksum and statistics.
    pub fn verify_payload(&self, payload: &[u8], document: &SnapshotDocument) -> anyhow::Result<()> {
        let actual = crate::compression::checksum_bytes(payload);
        if actual != self.checksum.value {
            return Err(anyhow::anyhow!(
                "Checksum mismatch: expected {}, got {}",
                self.checksum.value,
                actual
            ));
        }

        if document.row_counts() != self.statistics.tables {
            return Err(anyhow::anyhow!(
                "Snapshot tables do not match the manifest statistics"
            ));
        }

        Ok(())
    }
}
