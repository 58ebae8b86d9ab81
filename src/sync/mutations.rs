//! Optimistic writes. Each `*_local` call lands in the overlay immediately; the `confirm_*` calls
//! fold the server's answer back in once a request succeeds.

use crate::entities::{EntityKind, Identity};
use crate::keys::{entity_key, normalize_key};
use crate::overlay::OverlayStore;
use crate::storage::Storage;
use crate::util::new_local_id;
use serde_json::{Map, Value};

/// Record a locally created entity and return its key.
///
/// By-id records without an id get a temporary `tmp-` id. Returns `None` when no key can be
/// derived (e.g. a convocation without a label).
pub fn create_local<S: Storage>(
    store: &OverlayStore<S>,
    kind: EntityKind,
    mut record: Value,
) -> Option<String> {
    if kind.identity() == Identity::ById {
        if let Some(obj) = record.as_object_mut() {
            let has_id = obj
                .get("id")
                .is_some_and(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty()));
            if !has_id {
                obj.insert("id".to_string(), Value::String(new_local_id()));
            }
        }
    }

    let key = entity_key(kind, &record)?;
    store.add_created(kind, record);
    Some(key)
}

pub fn patch_local<S: Storage>(
    store: &OverlayStore<S>,
    kind: EntityKind,
    key: &str,
    patch: Map<String, Value>,
) -> bool {
    store.upsert_patch(kind, key, patch)
}

pub fn delete_local<S: Storage>(store: &OverlayStore<S>, kind: EntityKind, key: &str) -> bool {
    store.mark_deleted(kind, key)
}

/// What still has to reach the server after a create was acknowledged.
#[derive(Clone, Debug, PartialEq)]
pub enum CreateFollowup {
    Nothing,
    /// Edited while the create was in flight; the edit is pending under the server key.
    Patch { key: String, patch: Map<String, Value> },
    /// Deleted while the create was in flight; the server copy has to go too.
    Remove { key: String },
}

/// The server stored a locally created record. The pending copy is swapped for the server's one
/// until a refresh of the base collection contains it; pending edits and deletions move with it.
pub fn confirm_created<S: Storage>(
    store: &OverlayStore<S>,
    kind: EntityKind,
    local_key: &str,
    server_record: Value,
) -> CreateFollowup {
    let Some(remote) = entity_key(kind, &server_record) else {
        log::warn!("{kind} create acknowledged without a usable key");
        return CreateFollowup::Nothing;
    };
    let was_deleted = normalize_key(kind, local_key)
        .is_some_and(|local| store.read(kind).is_deleted(&local));

    store.swap_created(kind, local_key, server_record);

    if was_deleted {
        return CreateFollowup::Remove { key: remote };
    }
    let pending = store
        .read(kind)
        .updated_by_id
        .get(&remote)
        .and_then(Value::as_object)
        .filter(|p| !p.is_empty())
        .cloned();
    match pending {
        Some(patch) => CreateFollowup::Patch { key: remote, patch },
        None => CreateFollowup::Nothing,
    }
}

pub fn confirm_patched<S: Storage>(
    store: &OverlayStore<S>,
    kind: EntityKind,
    key: &str,
    server_record: &Value,
) -> bool {
    store.settle_patch(kind, key, server_record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::OverlayBus;
    use crate::storage::MemoryStorage;
    use crate::util::is_local_id;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> OverlayStore<MemoryStorage> {
        OverlayStore::new(MemoryStorage::new(), OverlayBus::new())
    }

    #[test]
    fn test_create_local_assigns_temporary_id() {
        let s = store();
        let key = create_local(&s, EntityKind::Documents, json!({"title": "Решение"}))
            .expect("document gets a key");
        assert!(is_local_id(&key));
        assert_eq!(s.merged(EntityKind::Documents, None).len(), 1);
    }

    #[test]
    fn test_create_local_keeps_given_id_and_label() {
        let s = store();
        assert_eq!(
            create_local(&s, EntityKind::Documents, json!({"id": 42, "title": "A"})),
            Some("42".to_string())
        );
        assert_eq!(
            create_local(&s, EntityKind::Convocations, json!({"name": "IX созыв"})),
            Some("IX".to_string())
        );
        assert_eq!(create_local(&s, EntityKind::Convocations, json!({"name": " "})), None);
    }

    #[test]
    fn test_create_then_confirm() {
        let s = store();
        let key = create_local(&s, EntityKind::News, json!({"title": "Сессия"})).unwrap_or_default();

        assert_eq!(
            confirm_created(&s, EntityKind::News, &key, json!({"id": "301", "title": "Сессия"})),
            CreateFollowup::Nothing
        );
        assert_eq!(
            s.merged(EntityKind::News, Some(&[json!({"id": "300", "title": "old"})])),
            vec![
                json!({"id": "300", "title": "old"}),
                json!({"id": "301", "title": "Сессия"}),
            ]
        );
    }

    #[test]
    fn test_rename_during_create_survives_confirmation() {
        let s = store();
        let key = create_local(&s, EntityKind::News, json!({"title": "draft"})).unwrap_or_default();
        let mut rename = Map::new();
        rename.insert("title".to_string(), json!("final"));
        assert!(patch_local(&s, EntityKind::News, &key, rename.clone()));

        let followup =
            confirm_created(&s, EntityKind::News, &key, json!({"id": "301", "title": "draft"}));
        assert_eq!(
            followup,
            CreateFollowup::Patch {
                key: "301".to_string(),
                patch: rename
            }
        );

        // The next refresh brings the server copy without the rename.
        let base = [json!({"id": "301", "title": "draft"})];
        assert_eq!(
            s.merged(EntityKind::News, Some(&base)),
            vec![json!({"id": "301", "title": "final"})]
        );
        assert!(!s.read(EntityKind::News).updated_by_id.contains_key(&key));
    }

    #[test]
    fn test_delete_during_create_wins() {
        let s = store();
        let key = create_local(&s, EntityKind::Events, json!({"title": "x"})).unwrap_or_default();
        assert!(delete_local(&s, EntityKind::Events, &key));

        assert_eq!(
            confirm_created(&s, EntityKind::Events, &key, json!({"id": "8", "title": "x"})),
            CreateFollowup::Remove {
                key: "8".to_string()
            }
        );
        assert!(s.merged(EntityKind::Events, None).is_empty());
        assert!(s
            .merged(EntityKind::Events, Some(&[json!({"id": "8", "title": "x"})]))
            .is_empty());
    }

    #[test]
    fn test_patch_then_confirm() {
        let s = store();
        let mut patch = Map::new();
        patch.insert("title".to_string(), json!("Новый"));
        assert!(patch_local(&s, EntityKind::Pages, "about", patch));

        assert!(confirm_patched(
            &s,
            EntityKind::Pages,
            "about",
            &json!({"id": "about", "title": "Новый"})
        ));
        assert!(s.read(EntityKind::Pages).is_empty());
    }
}
