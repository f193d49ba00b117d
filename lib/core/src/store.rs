use crate::filter::RecordFilter;
use crate::order::{top_k_with_ties, ScoreOrder};
use crate::record::{RecordId, RecordMeta, SkinProfileRecord};
use crate::{Error, Result, Vector};
use ahash::{AHashMap, AHashSet};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Embedding dimension produced by the reference feature extractor
pub const DEFAULT_DIMENSION: usize = 2048;

/// Rows per arena segment. Every segment except the last one is full.
const SEGMENT_ROWS: usize = 1024;

/// Configuration for a vector store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub dimension: usize,
    /// Similarities closer than this are ties, broken by insertion order
    pub tie_epsilon: f32,
    /// Live record count from which searches are scored on the rayon pool
    pub parallel_threshold: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            tie_epsilon: 1e-6,
            parallel_threshold: 8192,
        }
    }
}

impl StoreConfig {
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidConfig("dimension must be positive".into()));
        }
        if !self.tie_epsilon.is_finite() || self.tie_epsilon < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tie_epsilon must be a non-negative number, got {}",
                self.tie_epsilon
            )));
        }
        Ok(())
    }
}

/// A record as exported from (or restored into) a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub record: SkinProfileRecord,
    pub tombstoned: bool,
}

/// One nearest-neighbour candidate
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Cosine similarity in [-1, 1]
    pub similarity: f32,
    pub meta: Arc<RecordMeta>,
}

impl SearchHit {
    #[inline]
    pub fn id(&self) -> &RecordId {
        &self.meta.id
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    /// Cosine distance in [0, 2]
    #[inline]
    pub fn distance(&self) -> f32 {
        1.0 - self.similarity
    }
}

/// Contiguous block of normalized vectors plus the metadata side table
struct Segment {
    vectors: Vec<f32>,
    meta: Vec<Arc<RecordMeta>>,
}

impl Segment {
    fn empty() -> Self {
        Self {
            vectors: Vec::new(),
            meta: Vec::new(),
        }
    }

    #[inline]
    fn rows(&self) -> usize {
        self.meta.len()
    }

    #[inline]
    fn row(&self, row: usize, dim: usize) -> &[f32] {
        &self.vectors[row * dim..(row + 1) * dim]
    }
}

/// Immutable published view of the store. Readers hold an `Arc` to one of
/// these for the duration of a query and never see later writes.
#[derive(Default)]
struct Snapshot {
    version: u64,
    segments: Vec<Arc<Segment>>,
    tombstones: Arc<AHashSet<u64>>,
    slots: usize,
    live: usize,
}

impl Snapshot {
    fn locate(&self, sequence: u64) -> Option<(&Segment, usize)> {
        let sequence = usize::try_from(sequence).ok()?;
        let segment = self.segments.get(sequence / SEGMENT_ROWS)?;
        let row = sequence % SEGMENT_ROWS;
        (row < segment.rows()).then_some((segment.as_ref(), row))
    }

    /// Copy-on-write append: full segments are shared with `self`, only the
    /// partially filled tail is copied.
    fn appended(&self, rows: Vec<(RecordMeta, Vector)>, dim: usize) -> Snapshot {
        let added = rows.len();
        let mut segments = self.segments.clone();

        let mut tail = match segments.last() {
            Some(last) if last.rows() < SEGMENT_ROWS => {
                let copy = Segment {
                    vectors: last.vectors.clone(),
                    meta: last.meta.clone(),
                };
                segments.pop();
                copy
            }
            _ => Segment::empty(),
        };

        for (meta, vector) in rows {
            if tail.rows() == SEGMENT_ROWS {
                segments.push(Arc::new(std::mem::replace(&mut tail, Segment::empty())));
            }
            debug_assert_eq!(vector.dim(), dim);
            tail.vectors.extend_from_slice(vector.as_slice());
            tail.meta.push(Arc::new(meta));
        }
        if tail.rows() > 0 {
            segments.push(Arc::new(tail));
        }

        Snapshot {
            version: self.version + 1,
            segments,
            tombstones: Arc::clone(&self.tombstones),
            slots: self.slots + added,
            live: self.live + added,
        }
    }
}

/// In-memory corpus of skin-profile embeddings with exact cosine search.
///
/// Readers load the current snapshot without locking and never block each
/// other. Writers are serialized by `writer` and publish a whole new snapshot
/// in one atomic swap, so a record is either fully visible or not at all.
pub struct VectorStore {
    config: StoreConfig,
    snapshot: ArcSwap<Snapshot>,
    /// id -> sequence; updated after the snapshot that contains the row
    ids: RwLock<AHashMap<RecordId, u64>>,
    writer: Mutex<()>,
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("VectorStore")
            .field("dimension", &self.config.dimension)
            .field("len", &snapshot.live)
            .field("slots", &snapshot.slots)
            .field("version", &snapshot.version)
            .finish()
    }
}

impl VectorStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            ids: RwLock::new(AHashMap::new()),
            writer: Mutex::new(()),
        })
    }

    pub fn with_dimension(dimension: usize) -> Result<Self> {
        Self::new(StoreConfig::with_dimension(dimension))
    }

    /// Rebuild a store from exported records without renormalizing, so the
    /// stored floats come back bit-for-bit.
    pub fn restore(config: StoreConfig, records: Vec<StoredRecord>) -> Result<Self> {
        let store = Self::new(config)?;
        let dim = store.config.dimension;

        let mut ids = AHashMap::with_capacity(records.len());
        let mut tombstones = AHashSet::new();
        let mut rows = Vec::with_capacity(records.len());
        for (sequence, stored) in (0u64..).zip(records) {
            let vector = &stored.record.vector;
            store.check_dimension(vector.dim())?;
            if !vector.is_unit() {
                return Err(Error::NotNormalized(vector.norm()));
            }
            if ids.insert(stored.record.id.clone(), sequence).is_some() {
                return Err(Error::DuplicateId(stored.record.id.to_string()));
            }
            if stored.tombstoned {
                tombstones.insert(sequence);
            }
            rows.push(RecordMeta::from_record(stored.record, sequence));
        }

        let mut snapshot = Snapshot::default().appended(rows, dim);
        snapshot.live -= tombstones.len();
        snapshot.tombstones = Arc::new(tombstones);

        store.snapshot.store(Arc::new(snapshot));
        *store.ids.write() = ids;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Number of live (not tombstoned) records
    pub fn len(&self) -> usize {
        self.snapshot.load().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever allocated, tombstones included
    pub fn total_slots(&self) -> usize {
        self.snapshot.load().slots
    }

    /// Publish counter, bumped by every successful write
    pub fn version(&self) -> u64 {
        self.snapshot.load().version
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual,
            });
        }
        Ok(())
    }

    /// Insert a single record. The vector is normalized before storage.
    pub fn insert(&self, record: SkinProfileRecord) -> Result<()> {
        self.insert_batch(vec![record]).map(|_| ())
    }

    /// Insert many records in one publish.
    ///
    /// Every record is validated before anything is published: one bad record
    /// rejects the whole batch and leaves the store untouched.
    pub fn insert_batch(&self, records: Vec<SkinProfileRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut prepared = Vec::with_capacity(records.len());
        for mut record in records {
            self.check_dimension(record.vector.dim())?;
            record.vector.normalize()?;
            prepared.push(record);
        }

        let _writer = self.writer.lock();

        {
            let ids = self.ids.read();
            let mut seen = AHashSet::with_capacity(prepared.len());
            for record in &prepared {
                if ids.contains_key(&record.id) || !seen.insert(&record.id) {
                    return Err(Error::DuplicateId(record.id.to_string()));
                }
            }
        }

        let current = self.snapshot.load_full();
        let base = current.slots as u64;
        let mut new_ids = Vec::with_capacity(prepared.len());
        let rows: Vec<(RecordMeta, Vector)> = (base..)
            .zip(prepared)
            .map(|(sequence, record)| {
                new_ids.push((record.id.clone(), sequence));
                RecordMeta::from_record(record, sequence)
            })
            .collect();
        let count = rows.len();

        let next = current.appended(rows, self.config.dimension);
        let version = next.version;
        self.snapshot.store(Arc::new(next));
        self.ids.write().extend(new_ids);

        debug!(count, version, "published skin profiles");
        Ok(count)
    }

    /// Soft-delete a record. Its slot stays allocated; it simply stops
    /// appearing in searches and lookups. Returns false if already deleted.
    pub fn tombstone(&self, id: &RecordId) -> Result<bool> {
        let _writer = self.writer.lock();

        let sequence = self
            .ids
            .read()
            .get(id)
            .copied()
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;

        let current = self.snapshot.load_full();
        if current.tombstones.contains(&sequence) {
            return Ok(false);
        }

        let mut tombstones = (*current.tombstones).clone();
        tombstones.insert(sequence);
        self.snapshot.store(Arc::new(Snapshot {
            version: current.version + 1,
            segments: current.segments.clone(),
            tombstones: Arc::new(tombstones),
            slots: current.slots,
            live: current.live - 1,
        }));

        debug!(%id, "tombstoned skin profile");
        Ok(true)
    }

    /// Live record by id, with its stored (normalized) vector
    pub fn get(&self, id: &RecordId) -> Option<SkinProfileRecord> {
        let snapshot = self.snapshot.load_full();
        let sequence = *self.ids.read().get(id)?;
        if snapshot.tombstones.contains(&sequence) {
            return None;
        }
        let (segment, row) = snapshot.locate(sequence)?;
        let vector = Vector::from_slice(segment.row(row, self.config.dimension));
        Some(segment.meta[row].to_record(vector))
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    /// Up to `k` records ordered by descending cosine similarity
    pub fn search(&self, query: &Vector, k: usize) -> Result<Vec<(RecordId, f32)>> {
        Ok(self
            .search_hits(query, k, None)?
            .into_iter()
            .map(|hit| (hit.meta.id.clone(), hit.similarity))
            .collect())
    }

    pub fn search_filtered(
        &self,
        query: &Vector,
        k: usize,
        filter: &dyn RecordFilter,
    ) -> Result<Vec<(RecordId, f32)>> {
        Ok(self
            .search_hits(query, k, Some(filter))?
            .into_iter()
            .map(|hit| (hit.meta.id.clone(), hit.similarity))
            .collect())
    }

    /// Nearest neighbours with their metadata attached.
    ///
    /// Similarity is the inner product of two unit vectors, i.e. exact cosine
    /// similarity. Ties within `tie_epsilon` are ordered by insertion.
    pub fn search_hits(
        &self,
        query: &Vector,
        k: usize,
        filter: Option<&dyn RecordFilter>,
    ) -> Result<Vec<SearchHit>> {
        self.check_dimension(query.dim())?;
        let query = query.normalized()?;

        let snapshot = self.snapshot.load_full();
        if snapshot.live == 0 {
            return Err(Error::EmptyIndex);
        }

        let dim = self.config.dimension;
        let score_segment = |segment: &Arc<Segment>| -> Vec<SearchHit> {
            segment
                .meta
                .iter()
                .enumerate()
                .filter(|(_, meta)| !snapshot.tombstones.contains(&meta.sequence))
                .filter(|(_, meta)| filter.map_or(true, |f| f.matches(meta)))
                .map(|(row, meta)| {
                    let similarity =
                        crate::simd::dot_product_simd(query.as_slice(), segment.row(row, dim));
                    SearchHit {
                        similarity: similarity.clamp(-1.0, 1.0),
                        meta: Arc::clone(meta),
                    }
                })
                .collect()
        };

        let hits: Vec<SearchHit> = if snapshot.live >= self.config.parallel_threshold {
            snapshot
                .segments
                .par_iter()
                .flat_map_iter(&score_segment)
                .collect()
        } else {
            snapshot.segments.iter().flat_map(&score_segment).collect()
        };

        let scanned = hits.len();
        let top = top_k_with_ties(
            hits,
            k,
            ScoreOrder::Descending,
            self.config.tie_epsilon,
            |hit| hit.similarity,
            |hit| hit.meta.sequence,
        );

        debug!(
            k,
            scanned,
            returned = top.len(),
            version = snapshot.version,
            "vector search"
        );
        Ok(top)
    }

    /// All records in insertion order, tombstoned ones flagged
    pub fn export(&self) -> Vec<StoredRecord> {
        let snapshot = self.snapshot.load_full();
        let dim = self.config.dimension;
        snapshot
            .segments
            .iter()
            .flat_map(|segment| {
                let tombstones = &snapshot.tombstones;
                segment.meta.iter().enumerate().map(move |(row, meta)| StoredRecord {
                    record: meta.to_record(Vector::from_slice(segment.row(row, dim))),
                    tombstoned: tombstones.contains(&meta.sequence),
                })
            })
            .collect()
    }
}
