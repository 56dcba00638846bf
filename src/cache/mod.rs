pub mod snapshot;

pub use snapshot::{FileSnapshotStore, SnapshotEntry, SnapshotStore};
