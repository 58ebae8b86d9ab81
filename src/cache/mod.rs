pub(crate) mod collection_snapshot;

pub use collection_snapshot::{load_snapshot, save_snapshot, CollectionSnapshot};
