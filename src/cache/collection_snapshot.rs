use crate::entities::EntityKind;
use crate::storage::{load_json, save_json, Storage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Last base collection the server returned for a kind, used when the server can't be reached.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CollectionSnapshot {
    pub saved_ms: i64,
    pub kind: EntityKind,
    #[serde(default)]
    pub items: Vec<Value>,
}

pub fn save_snapshot<S: Storage>(storage: &S, kind: EntityKind, items: &[Value], saved_ms: i64) {
    let snap = CollectionSnapshot {
        saved_ms,
        kind,
        items: items.to_vec(),
    };
    if let Err(e) = save_json(storage, &kind.snapshot_key(), &snap) {
        log::warn!("snapshot for {kind} not persisted: {e}");
    }
}

/// The stored snapshot, if any. A snapshot stored under the wrong kind is ignored.
pub fn load_snapshot<S: Storage>(storage: &S, kind: EntityKind) -> Option<CollectionSnapshot> {
    load_json::<S, CollectionSnapshot>(storage, &kind.snapshot_key()).filter(|s| s.kind == kind)
}
