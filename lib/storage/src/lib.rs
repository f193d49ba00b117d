pub mod snapshot;

pub use snapshot::{CorpusSnapshot, SnapshotHeader, SNAPSHOT_FORMAT_VERSION};
