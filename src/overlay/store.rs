use super::Overlay;
use crate::entities::EntityKind;
use crate::notify::OverlayBus;
use crate::reconcile::reconcile;
use crate::storage::{load_json, save_json, Storage};
use serde_json::{Map, Value};

/// Persisted overlays, one storage key per entity kind.
///
/// Every operation is a read-modify-write of the whole overlay. Two tabs writing the same kind
/// race with last-writer-wins semantics; the merge is idempotent so both converge once the
/// `storage` signal has propagated.
#[derive(Clone)]
pub struct OverlayStore<S: Storage> {
    storage: S,
    bus: OverlayBus,
}

impl<S: Storage> OverlayStore<S> {
    pub fn new(storage: S, bus: OverlayBus) -> Self {
        Self { storage, bus }
    }

    pub fn bus(&self) -> &OverlayBus {
        &self.bus
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The persisted overlay, or the empty default when nothing (or garbage) is stored.
    pub fn read(&self, kind: EntityKind) -> Overlay {
        load_json::<S, Overlay>(&self.storage, &kind.storage_key()).unwrap_or_default()
    }

    /// Persist and notify. Persistence is best-effort: a failed write is logged and dropped.
    pub fn write(&self, kind: EntityKind, overlay: &Overlay) {
        if let Err(e) = save_json(&self.storage, &kind.storage_key(), overlay) {
            log::warn!("overlay for {kind} not persisted: {e}");
        }
        self.bus.publish(kind);
    }

    /// Apply `f` to the current overlay and write it back if `f` reports a change.
    pub fn update(&self, kind: EntityKind, f: impl FnOnce(&mut Overlay) -> bool) -> bool {
        let mut overlay = self.read(kind);
        let changed = f(&mut overlay);
        if changed {
            self.write(kind, &overlay);
        }
        changed
    }

    pub fn add_created(&self, kind: EntityKind, entity: Value) -> bool {
        self.update(kind, |o| o.add_created(kind, entity))
    }

    pub fn upsert_patch(&self, kind: EntityKind, key: &str, patch: Map<String, Value>) -> bool {
        self.update(kind, |o| o.upsert_patch(kind, key, patch))
    }

    pub fn mark_deleted(&self, kind: EntityKind, key: &str) -> bool {
        self.update(kind, |o| o.mark_deleted(kind, key))
    }

    pub fn set_order(&self, kind: EntityKind, ordered_keys: &[String]) -> bool {
        self.update(kind, |o| o.set_order(kind, ordered_keys))
    }

    pub fn remove_created(&self, kind: EntityKind, key: &str) -> bool {
        self.update(kind, |o| o.remove_created(kind, key))
    }

    pub fn clear_patch(&self, kind: EntityKind, key: &str) -> bool {
        self.update(kind, |o| o.clear_patch(kind, key))
    }

    pub fn swap_created(&self, kind: EntityKind, local_key: &str, confirmed: Value) -> bool {
        self.update(kind, |o| o.swap_created(kind, local_key, confirmed))
    }

    pub fn settle_patch(&self, kind: EntityKind, key: &str, echoed: &Value) -> bool {
        self.update(kind, |o| o.settle_patch(kind, key, echoed))
    }

    pub fn prune_confirmed(&self, kind: EntityKind, base: &[Value]) -> bool {
        self.update(kind, |o| o.prune_confirmed(kind, base))
    }

    /// `base` merged with the current overlay for `kind`.
    pub fn merged(&self, kind: EntityKind, base: Option<&[Value]>) -> Vec<Value> {
        reconcile(kind, base, &self.read(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn store() -> OverlayStore<MemoryStorage> {
        OverlayStore::new(MemoryStorage::new(), OverlayBus::new())
    }

    #[test]
    fn test_read_defaults_when_absent() {
        assert_eq!(store().read(EntityKind::News), Overlay::default());
    }

    #[test]
    fn test_read_defaults_on_corrupt_json() {
        let s = store();
        s.storage()
            .set_item(&EntityKind::News.storage_key(), "{\"created\": [")
            .unwrap();
        assert_eq!(s.read(EntityKind::News), Overlay::default());

        s.storage()
            .set_item(&EntityKind::News.storage_key(), "{\"deletedIds\": 5}")
            .unwrap();
        assert_eq!(s.read(EntityKind::News), Overlay::default());
    }

    #[test]
    fn test_write_persists_under_kind_key() {
        let s = store();
        s.mark_deleted(EntityKind::Deputies, "4");

        let raw = s
            .storage()
            .get_item("gov_site_overlay::deputies")
            .unwrap()
            .expect("overlay persisted");
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v, json!({"created": [], "updatedById": {}, "deletedIds": ["4"]}));

        // Other kinds are untouched.
        assert_eq!(s.read(EntityKind::Committees), Overlay::default());
    }

    #[test]
    fn test_writes_survive_a_new_store_instance() {
        let storage = MemoryStorage::new();
        let s1 = OverlayStore::new(storage.clone(), OverlayBus::new());
        s1.add_created(EntityKind::Documents, json!({"id": "42", "title": "Регламент"}));

        let s2 = OverlayStore::new(storage, OverlayBus::new());
        assert_eq!(s2.read(EntityKind::Documents).created.len(), 1);
    }

    #[test]
    fn test_every_change_notifies_and_noops_do_not() {
        let s = store();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = s.bus().subscribe(EntityKind::Events, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        s.add_created(EntityKind::Events, json!({"id": "1"}));
        s.add_created(EntityKind::Events, json!({"id": "1"}));
        s.upsert_patch(
            EntityKind::Events,
            "1",
            json!({"title": "x"}).as_object().cloned().unwrap(),
        );
        s.mark_deleted(EntityKind::Events, "1");

        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_quota_failure_is_swallowed_and_still_notifies() {
        let s = OverlayStore::new(MemoryStorage::with_quota(8), OverlayBus::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = s.bus().subscribe(EntityKind::Pages, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(s.add_created(EntityKind::Pages, json!({"id": "p", "title": "Большая страница"})));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(s.read(EntityKind::Pages), Overlay::default());
    }

    #[test]
    fn test_merged_uses_current_overlay() {
        let s = store();
        s.mark_deleted(EntityKind::Committees, "1");
        let base = vec![json!({"id": "1"}), json!({"id": "2"})];
        assert_eq!(s.merged(EntityKind::Committees, Some(&base)), vec![json!({"id": "2"})]);
        assert_eq!(s.merged(EntityKind::Committees, None), Vec::<Value>::new());
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::storage::LocalStorage;
    use serde_json::json;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_overlay_roundtrip_through_local_storage() {
        let s = OverlayStore::new(LocalStorage, OverlayBus::new());
        let kind = EntityKind::SliderItems;
        let _ = s.storage().remove_item(&kind.storage_key());

        s.add_created(kind, json!({"id": "s1", "title": "Баннер"}));
        s.set_order(kind, &["s1".to_string()]);

        let o = s.read(kind);
        assert_eq!(o.created.len(), 1);
        assert_eq!(o.order_ids, Some(vec!["s1".to_string()]));

        let _ = s.storage().remove_item(&kind.storage_key());
    }
}
