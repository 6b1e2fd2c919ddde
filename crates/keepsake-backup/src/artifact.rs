//! Durable artifact storage for snapshots.
//!
//! Each artifact is a gzip-compressed tar holding the manifest followed by
//! the JSON snapshot. Artifacts live under `<root>/<user>/` and are written
//! to a temporary file first, then renamed into place, so a failed write
//! never leaves a partial artifact behind.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use tar::{Archive, Builder as TarBuilder, Header};
use tracing::{debug, info};
use uuid::Uuid;

use crate::compression::{checksum_bytes, gzip_level, ChecksumWriter, CompressionStats};
use crate::document::SnapshotDocument;
use crate::error::{BackupError, Result};
use crate::manifest::{
    ArtifactManifest, ChecksumInfo, MANIFEST_FILENAME, SNAPSHOT_FILENAME,
};
use crate::user::UserId;

pub use crate::compression::DEFAULT_COMPRESSION_LEVEL;

const ARTIFACT_PREFIX: &str = "backup-";
const ARTIFACT_SUFFIX: &str = ".tar.gz";

/// Opaque, validated reference to a stored artifact: `<user>/<file name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    user: UserId,
    file_name: String,
}

impl ArtifactHandle {
    /// Parse a handle, rejecting anything that could escape the store root.
    pub fn parse(handle: &str) -> Result<Self> {
        let invalid = || BackupError::InvalidHandle(handle.to_string());

        let (user, file_name) = handle.split_once('/').ok_or_else(invalid)?;
        let user = UserId::new(user).map_err(|_| invalid())?;

        let valid_name = file_name.starts_with(ARTIFACT_PREFIX)
            && file_name.ends_with(ARTIFACT_SUFFIX)
            && !file_name.contains(['/', '\\'])
            && !file_name.contains("..");
        if !valid_name {
            return Err(invalid());
        }

        Ok(Self {
            user,
            file_name: file_name.to_string(),
        })
    }

    fn generate(user: &UserId, created_at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}{}-{}-{}{}",
            ARTIFACT_PREFIX,
            user,
            created_at.format("%Y%m%dT%H%M%S%.3fZ"),
            &suffix[..8],
            ARTIFACT_SUFFIX
        );
        Self {
            user: user.clone(),
            file_name,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.file_name)
    }
}

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub handle: ArtifactHandle,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub stats: CompressionStats,
}

/// An artifact found on disk.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub handle: ArtifactHandle,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Filesystem-backed artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: Utf8PathBuf,
    compression_level: u32,
}

impl ArtifactStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Sets the gzip level (clamped to 1-9).
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.clamp(1, 9);
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where a handle lives on disk.
    pub fn path_of(&self, handle: &ArtifactHandle) -> Utf8PathBuf {
        self.root.join(handle.user.as_str()).join(&handle.file_name)
    }

    /// Serialize and persist a snapshot. Returns the handle and byte size.
    pub fn write(&self, user: &UserId, document: &SnapshotDocument) -> Result<WrittenArtifact> {
        let created_at = Utc::now();
        let handle = ArtifactHandle::generate(user, created_at);
        let dir = self.root.join(user.as_str());
        let final_path = self.path_of(&handle);

        let write_failed = |path: &Utf8Path, source: io::Error| BackupError::ArtifactWriteFailed {
            path: path.to_string(),
            source,
        };

        let payload = serde_json::to_vec(document).map_err(|e| write_failed(&final_path, e.into()))?;
        let manifest = ArtifactManifest::new(
            user.clone(),
            created_at,
            document,
            payload.len() as u64,
            ChecksumInfo::sha256(checksum_bytes(&payload)),
        );
        let manifest_json = manifest
            .to_json()
            .map_err(|e| write_failed(&final_path, io::Error::other(e.to_string())))?;

        fs::create_dir_all(&dir).map_err(|e| write_failed(&dir, e))?;

        let temp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| write_failed(&dir, e))?;

        let (size_bytes, digest) = self
            .write_archive(temp.as_file(), &manifest_json, &payload, created_at)
            .map_err(|e| write_failed(&final_path, e))?;

        // Dropping `temp` on the error path removes the partial file
        temp.persist(&final_path)
            .map_err(|e| write_failed(&final_path, e.error))?;

        info!("Wrote artifact {} ({} bytes)", handle, size_bytes);

        let original_size = (manifest_json.len() + payload.len()) as u64;
        Ok(WrittenArtifact {
            handle,
            size_bytes,
            created_at,
            stats: CompressionStats::new(original_size, size_bytes, digest),
        })
    }

    fn write_archive(
        &self,
        file: &File,
        manifest_json: &str,
        payload: &[u8],
        created_at: DateTime<Utc>,
    ) -> io::Result<(u64, String)> {
        let encoder = GzEncoder::new(ChecksumWriter::new(file), gzip_level(self.compression_level));
        let mut tar = TarBuilder::new(encoder);
        let mtime = created_at.timestamp().max(0) as u64;

        // Manifest first so readers can reject an artifact early
        append_entry(&mut tar, MANIFEST_FILENAME, manifest_json.as_bytes(), mtime)?;
        append_entry(&mut tar, SNAPSHOT_FILENAME, payload, mtime)?;

        let encoder = tar.into_inner()?;
        let checksum_writer = encoder.finish()?;
        let (file, size_bytes, digest) = checksum_writer.finish()?;
        file.sync_all()?;

        Ok((size_bytes, digest))
    }

    /// Load the snapshot an artifact holds.
    pub fn read(&self, handle: &ArtifactHandle) -> Result<SnapshotDocument> {
        self.read_with_manifest(handle).map(|(_, document)| document)
    }

    /// Load and verify an artifact, returning its manifest and snapshot.
    pub fn read_with_manifest(
        &self,
        handle: &ArtifactHandle,
    ) -> Result<(ArtifactManifest, SnapshotDocument)> {
        let path = self.path_of(handle);
        let corrupt = |reason: String| BackupError::artifact_corrupt(handle.to_string(), reason);

        let file = File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BackupError::ArtifactNotFound {
                    handle: handle.to_string(),
                }
            } else {
                corrupt(format!("unreadable: {}", e))
            }
        })?;

        let (manifest_json, payload) =
            read_entries(file).map_err(|e| corrupt(format!("invalid archive: {}", e)))?;

        let manifest_json =
            manifest_json.ok_or_else(|| corrupt(format!("missing {}", MANIFEST_FILENAME)))?;
        let payload = payload.ok_or_else(|| corrupt(format!("missing {}", SNAPSHOT_FILENAME)))?;

        let manifest =
            ArtifactManifest::from_json(&manifest_json).map_err(|e| corrupt(e.to_string()))?;
        manifest.validate().map_err(|e| corrupt(e.to_string()))?;

        if &manifest.user_id != handle.user() {
            return Err(corrupt(format!(
                "artifact belongs to user {}, handle names {}",
                manifest.user_id,
                handle.user()
            )));
        }

        let document: SnapshotDocument = serde_json::from_slice(&payload)
            .map_err(|e| corrupt(format!("invalid snapshot: {}", e)))?;
        manifest
            .verify_payload(&payload, &document)
            .map_err(|e| corrupt(e.to_string()))?;

        debug!(
            "Read artifact {}: {} row(s)",
            handle, manifest.statistics.total_rows
        );
        Ok((manifest, document))
    }

    /// All artifacts for a user, newest first.
    pub fn list(&self, user: &UserId) -> Result<Vec<ArtifactInfo>> {
        let dir = self.root.join(user.as_str());
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for entry in dir.read_dir_utf8()? {
            let entry = entry?;
            let name = entry.file_name();
            let Ok(handle) = ArtifactHandle::parse(&format!("{}/{}", user, name)) else {
                continue;
            };

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            artifacts.push(ArtifactInfo {
                handle,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        // File names embed the creation timestamp
        artifacts.sort_by(|a, b| b.handle.file_name.cmp(&a.handle.file_name));
        Ok(artifacts)
    }

    /// Remove an artifact from storage.
    pub fn delete(&self, handle: &ArtifactHandle) -> Result<()> {
        let path = self.path_of(handle);
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BackupError::ArtifactNotFound {
                    handle: handle.to_string(),
                }
            } else {
                BackupError::Storage(e)
            }
        })?;
        info!("Deleted artifact {}", handle);
        Ok(())
    }
}

fn append_entry<W: io::Write>(
    tar: &mut TarBuilder<W>,
    name: &str,
    data: &[u8],
    mtime: u64,
) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    header.set_cksum();
    tar.append_data(&mut header, name, data)
}

type Entries = (Option<String>, Option<Vec<u8>>);

fn read_entries(file: File) -> io::Result<Entries> {
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut manifest = None;
    let mut payload = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();

        match path.as_str() {
            MANIFEST_FILENAME => {
                let mut content = String::new();
                entry.read_to_string(&mut content)?;
                manifest = Some(content);
            }
            SNAPSHOT_FILENAME => {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                payload = Some(content);
            }
            other => debug!("Ignoring unexpected artifact entry {}", other),
        }
    }

    Ok((manifest, payload))
}
