// Corpus snapshots: one gzip-compressed bincode file per store
use anyhow::{anyhow, bail, Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use skinmatch_core::{
    ConditionLabel, DemographicProfile, RecordId, Severity, SkinProfileRecord, StoreConfig,
    StoredRecord, Vector, VectorStore,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Bumped whenever the on-disk layout changes
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Snapshot metadata, readable without decoding the records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub format_version: u32,
    pub dimension: u64,
    /// Records in the file, tombstoned ones included
    pub record_count: u64,
    pub tombstoned: u64,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the encoded records
    pub checksum: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    header: SnapshotHeader,
    payload: Vec<u8>,
}

// bincode cannot decode untagged enums, so ids get an explicit tag here
#[derive(Debug, Serialize, Deserialize)]
enum SnapshotId {
    Integer(u64),
    Uuid(u128),
    String(String),
}

impl From<&RecordId> for SnapshotId {
    fn from(id: &RecordId) -> Self {
        match id {
            RecordId::Integer(i) => SnapshotId::Integer(*i),
            RecordId::Uuid(u) => SnapshotId::Uuid(u.as_u128()),
            RecordId::String(s) => SnapshotId::String(s.clone()),
        }
    }
}

impl From<SnapshotId> for RecordId {
    fn from(id: SnapshotId) -> Self {
        match id {
            SnapshotId::Integer(i) => RecordId::Integer(i),
            SnapshotId::Uuid(u) => RecordId::Uuid(Uuid::from_u128(u)),
            SnapshotId::String(s) => RecordId::String(s),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    id: SnapshotId,
    vector: Vec<f32>,
    condition: ConditionLabel,
    severity: Severity,
    demographics: DemographicProfile,
    source_image_ref: Option<String>,
    tombstoned: bool,
}

impl From<StoredRecord> for SnapshotRecord {
    fn from(stored: StoredRecord) -> Self {
        let record = stored.record;
        Self {
            id: SnapshotId::from(&record.id),
            vector: record.vector.into_inner(),
            condition: record.condition,
            severity: record.severity,
            demographics: record.demographics,
            source_image_ref: record.source_image_ref,
            tombstoned: stored.tombstoned,
        }
    }
}

impl From<SnapshotRecord> for StoredRecord {
    fn from(snap: SnapshotRecord) -> Self {
        let mut record = SkinProfileRecord::new(
            RecordId::from(snap.id),
            Vector::new(snap.vector),
            snap.condition,
            snap.severity,
        )
        .with_demographics(snap.demographics);
        record.source_image_ref = snap.source_image_ref;
        StoredRecord {
            record,
            tombstoned: snap.tombstoned,
        }
    }
}

/// Save and load whole corpora.
///
/// Vectors are written exactly as the store holds them (already unit
/// length) and restored without renormalization, so floats survive a
/// round trip bit-for-bit.
pub struct CorpusSnapshot;

impl CorpusSnapshot {
    /// Write `store` to `path`, replacing any existing file atomically
    pub fn save<P: AsRef<Path>>(store: &VectorStore, path: P) -> Result<SnapshotHeader> {
        let path = path.as_ref();
        let records: Vec<SnapshotRecord> = store.export().into_iter().map(SnapshotRecord::from).collect();
        let tombstoned = records.iter().filter(|r| r.tombstoned).count();

        let payload = bincode::serialize(&records)
            .map_err(|e| anyhow!("Serialization error: {}", e))?;
        let header = SnapshotHeader {
            format_version: SNAPSHOT_FORMAT_VERSION,
            dimension: store.dimension() as u64,
            record_count: records.len() as u64,
            tombstoned: tombstoned as u64,
            created_at: Utc::now(),
            checksum: checksum(&payload),
        };
        let file = SnapshotFile {
            header: header.clone(),
            payload,
        };
        write_file(path, &file)?;

        info!(
            path = %path.display(),
            records = header.record_count,
            tombstoned = header.tombstoned,
            dimension = header.dimension,
            "corpus snapshot saved"
        );
        Ok(header)
    }

    /// Load a snapshot into a new store sized from the file header
    pub fn load<P: AsRef<Path>>(path: P) -> Result<VectorStore> {
        let path = path.as_ref();
        let file = read_file(path)?;
        let config = StoreConfig::with_dimension(file.header.dimension as usize);
        Self::restore(path, file, config)
    }

    /// Load a snapshot into a store with `config`; the dimensions must agree
    pub fn load_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<VectorStore> {
        let path = path.as_ref();
        let file = read_file(path)?;
        if file.header.dimension != config.dimension as u64 {
            bail!(
                "Snapshot {} has dimension {}, expected {}",
                path.display(),
                file.header.dimension,
                config.dimension
            );
        }
        Self::restore(path, file, config)
    }

    /// Read only the header
    pub fn describe<P: AsRef<Path>>(path: P) -> Result<SnapshotHeader> {
        Ok(read_file(path.as_ref())?.header)
    }

    fn restore(path: &Path, file: SnapshotFile, config: StoreConfig) -> Result<VectorStore> {
        let SnapshotFile { header, payload } = file;
        let actual = checksum(&payload);
        if actual != header.checksum {
            bail!(
                "Snapshot {} is corrupted: checksum {} does not match {}",
                path.display(),
                actual,
                header.checksum
            );
        }

        let records: Vec<SnapshotRecord> = bincode::deserialize(&payload)
            .map_err(|e| anyhow!("Deserialization error: {}", e))?;
        if records.len() as u64 != header.record_count {
            bail!(
                "Snapshot {} lists {} records but holds {}",
                path.display(),
                header.record_count,
                records.len()
            );
        }

        let stored: Vec<StoredRecord> = records.into_iter().map(StoredRecord::from).collect();
        let store = VectorStore::restore(config, stored)
            .with_context(|| format!("Failed to restore corpus from {}", path.display()))?;

        info!(
            path = %path.display(),
            records = store.total_slots(),
            live = store.len(),
            created_at = %header.created_at,
            "corpus snapshot loaded"
        );
        Ok(store)
    }
}

fn checksum(payload: &[u8]) -> String {
    format!("{:x}", Sha256::digest(payload))
}

fn write_file(path: &Path, file: &SnapshotFile) -> Result<()> {
    let encoded = bincode::serialize(file).map_err(|e| anyhow!("Serialization error: {}", e))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&encoded)?;
    let compressed = encoder.finish()?;

    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            let mut writer = BufWriter::new(f);
            writer.write_all(&compressed)?;
            writer.flush()
        })
        .map_err(|e| anyhow!("Failed to write snapshot {}: {}", path.display(), e))
}

fn read_file(path: &Path) -> Result<SnapshotFile> {
    let file = File::open(path).with_context(|| format!("Snapshot '{}' not found", path.display()))?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut encoded = Vec::new();
    decoder
        .read_to_end(&mut encoded)
        .with_context(|| format!("Snapshot {} is not a gzip stream", path.display()))?;

    let file: SnapshotFile = bincode::deserialize(&encoded)
        .map_err(|e| anyhow!("Deserialization error in {}: {}", path.display(), e))?;
    if file.header.format_version != SNAPSHOT_FORMAT_VERSION {
        bail!(
            "Unsupported snapshot format version {} (expected {})",
            file.header.format_version,
            SNAPSHOT_FORMAT_VERSION
        );
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skinmatch_core::{AgeBand, SkinTone};
    use tempfile::tempdir;

    fn populated_store() -> VectorStore {
        let store = VectorStore::with_dimension(3).unwrap();
        store
            .insert_batch(vec![
                SkinProfileRecord::new("a", Vector::new(vec![0.3, 0.7, 0.1]), ConditionLabel::Acne, Severity::Mild)
                    .with_demographics(
                        DemographicProfile::new()
                            .with_ethnicity("East Asian")
                            .with_skin_type(SkinTone::Monk(4))
                            .with_age_band(AgeBand::From25To34),
                    )
                    .with_source_image("img/a.png"),
                SkinProfileRecord::new(7u64, Vector::new(vec![1.0, 2.0, 3.0]), ConditionLabel::from("melasma"), Severity::Severe),
                SkinProfileRecord::new(Uuid::new_v4(), Vector::new(vec![-1.0, 0.5, 0.0]), ConditionLabel::Dryness, Severity::Moderate),
            ])
            .unwrap();
        store.tombstone(&RecordId::from(7u64)).unwrap();
        store
    }

    #[test]
    fn test_save_load_preserves_records_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.snapshot");
        let store = populated_store();

        let header = CorpusSnapshot::save(&store, &path).unwrap();
        assert_eq!(header.record_count, 3);
        assert_eq!(header.tombstoned, 1);
        assert_eq!(header.dimension, 3);

        let loaded = CorpusSnapshot::load(&path).unwrap();
        assert_eq!(loaded.export(), store.export());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.total_slots(), 3);
        // tombstoned ids stay reserved
        assert!(loaded.get(&RecordId::from(7u64)).is_none());

        for stored in loaded.export() {
            assert!(stored.record.vector.is_unit());
        }
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.snapshot");
        CorpusSnapshot::save(&VectorStore::with_dimension(3).unwrap(), &path).unwrap();
        CorpusSnapshot::save(&populated_store(), &path).unwrap();
        assert_eq!(CorpusSnapshot::describe(&path).unwrap().record_count, 3);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.snapshot");
        CorpusSnapshot::save(&populated_store(), &path).unwrap();
        assert!(CorpusSnapshot::load_with_config(&path, StoreConfig::with_dimension(4)).is_err());
        assert!(CorpusSnapshot::load_with_config(&path, StoreConfig::with_dimension(3)).is_ok());
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.snapshot");
        CorpusSnapshot::save(&populated_store(), &path).unwrap();

        let mut file = read_file(&path).unwrap();
        if let Some(byte) = file.payload.last_mut() {
            *byte ^= 0xff;
        }
        write_file(&path, &file).unwrap();

        let err = CorpusSnapshot::load(&path).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_garbage_and_missing_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.snapshot");
        std::fs::write(&path, b"definitely not a snapshot").unwrap();
        assert!(CorpusSnapshot::load(&path).is_err());
        assert!(CorpusSnapshot::load(dir.path().join("missing.snapshot")).is_err());
    }
}
