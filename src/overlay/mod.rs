//! Pending local mutations for one entity kind.
//!
//! An [`Overlay`] is plain data (it is exactly what gets persisted); [`OverlayStore`] owns the
//! read-modify-write cycle against a [`Storage`](crate::storage::Storage) backend and publishes
//! every write on the [`OverlayBus`](crate::notify::OverlayBus).

mod store;

pub use store::OverlayStore;

use crate::entities::EntityKind;
use crate::keys::{entity_key, normalize_key};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    /// Full records not yet confirmed by the remote side, in display priority order.
    #[serde(default)]
    pub created: Vec<Value>,

    /// key -> partial patch. Only fields the user changed are present.
    #[serde(default)]
    pub updated_by_id: BTreeMap<String, Value>,

    /// Keys suppressed everywhere. Serialized as an array; kept free of duplicates.
    #[serde(default)]
    pub deleted_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_ids: Option<Vec<String>>,
}

impl Overlay {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated_by_id.is_empty()
            && self.deleted_ids.is_empty()
            && self.order_ids.is_none()
    }

    pub fn is_deleted(&self, key: &str) -> bool {
        self.deleted_ids.iter().any(|k| k == key)
    }

    fn created_position(&self, kind: EntityKind, key: &str) -> Option<usize> {
        self.created
            .iter()
            .position(|e| entity_key(kind, e).as_deref() == Some(key))
    }

    /// Insert a locally created record. Re-creating a deleted key revives it.
    ///
    /// Returns `false` when nothing changed (no derivable key, or already pending).
    pub fn add_created(&mut self, kind: EntityKind, entity: Value) -> bool {
        let Some(key) = entity_key(kind, &entity) else {
            log::warn!("ignoring created {kind} record without a key");
            return false;
        };

        let before = self.deleted_ids.len();
        self.deleted_ids.retain(|k| k != &key);
        let revived = self.deleted_ids.len() != before;

        if self.created_position(kind, &key).is_some() {
            return revived;
        }

        if kind.newest_first() {
            self.created.insert(0, entity);
        } else {
            self.created.push(entity);
        }
        true
    }

    /// Shallow-merge `patch` into the pending patch for `key`. No-op for deleted keys.
    pub fn upsert_patch(&mut self, kind: EntityKind, key: &str, patch: Map<String, Value>) -> bool {
        let Some(key) = normalize_key(kind, key) else {
            return false;
        };
        if patch.is_empty() || self.is_deleted(&key) {
            return false;
        }

        let entry = self
            .updated_by_id
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }

        let mut changed = false;
        if let Some(existing) = entry.as_object_mut() {
            for (field, value) in patch {
                if existing.get(&field) != Some(&value) {
                    existing.insert(field, value);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Delete is absolute: the key is suppressed and every other pending mutation for it dropped.
    pub fn mark_deleted(&mut self, kind: EntityKind, key: &str) -> bool {
        let Some(key) = normalize_key(kind, key) else {
            return false;
        };

        let mut changed = false;
        if !self.is_deleted(&key) {
            self.deleted_ids.push(key.clone());
            changed = true;
        }
        changed |= self.remove_created(kind, &key);
        changed |= self.updated_by_id.remove(&key).is_some();
        changed
    }

    pub fn set_order(&mut self, kind: EntityKind, keys: &[String]) -> bool {
        let mut seen = HashSet::new();
        let order: Vec<String> = keys
            .iter()
            .filter_map(|k| normalize_key(kind, k))
            .filter(|k| seen.insert(k.clone()))
            .collect();

        if self.order_ids.as_ref() == Some(&order) {
            return false;
        }
        self.order_ids = Some(order);
        true
    }

    pub fn remove_created(&mut self, kind: EntityKind, key: &str) -> bool {
        let Some(key) = normalize_key(kind, key) else {
            return false;
        };
        let before = self.created.len();
        self.created
            .retain(|e| entity_key(kind, e).as_deref() != Some(key.as_str()));
        self.created.len() != before
    }

    pub fn clear_patch(&mut self, kind: EntityKind, key: &str) -> bool {
        match normalize_key(kind, key) {
            Some(key) => self.updated_by_id.remove(&key).is_some(),
            None => false,
        }
    }

    /// Replace the pending record `local_key` with the copy the server acknowledged, keeping its
    /// display position. Everything pending under the local key moves to the server key: the
    /// order slot, a patch made while the create was in flight, and a deletion. A deleted local
    /// record stays deleted under its new key and is not re-added.
    pub fn swap_created(&mut self, kind: EntityKind, local_key: &str, confirmed: Value) -> bool {
        let (Some(local), Some(remote)) = (normalize_key(kind, local_key), entity_key(kind, &confirmed))
        else {
            return false;
        };

        if self.is_deleted(&local) {
            self.deleted_ids.retain(|k| k != &local);
            self.mark_deleted(kind, &remote);
            return true;
        }

        let mut changed = false;
        if local != remote {
            if let Some(Value::Object(late)) = self.updated_by_id.remove(&local) {
                let entry = self
                    .updated_by_id
                    .entry(remote.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                if let Some(target) = entry.as_object_mut() {
                    target.extend(late);
                }
                changed = true;
            }
        }

        let Some(pos) = self.created_position(kind, &local) else {
            return self.add_created(kind, confirmed) || changed;
        };

        self.created.remove(pos);
        if self.created_position(kind, &remote).is_none() {
            self.created.insert(pos, confirmed);
        }
        if let Some(order) = self.order_ids.as_mut() {
            for k in order.iter_mut() {
                if *k == local {
                    *k = remote.clone();
                }
            }
            let mut seen = HashSet::new();
            order.retain(|k| seen.insert(k.clone()));
        }
        true
    }

    /// Drop the patched fields for `key` that `echoed` already carries with the same value.
    /// Fields the server stored differently stay pending.
    pub fn settle_patch(&mut self, kind: EntityKind, key: &str, echoed: &Value) -> bool {
        let Some(key) = normalize_key(kind, key) else {
            return false;
        };
        let Some(patch) = self.updated_by_id.get_mut(&key).and_then(Value::as_object_mut) else {
            return false;
        };

        let before = patch.len();
        patch.retain(|field, value| echoed.get(field) != Some(value));
        let changed = patch.len() != before;
        if patch.is_empty() {
            self.updated_by_id.remove(&key);
            return true;
        }
        changed
    }

    /// Drop created records the base collection now contains.
    pub fn prune_confirmed(&mut self, kind: EntityKind, base: &[Value]) -> bool {
        let confirmed: HashSet<String> = base.iter().filter_map(|e| entity_key(kind, e)).collect();
        let before = self.created.len();
        self.created.retain(|e| match entity_key(kind, e) {
            Some(key) => !confirmed.contains(&key),
            None => false,
        });
        self.created.len() != before
    }
}
