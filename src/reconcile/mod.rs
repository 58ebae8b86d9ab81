//! Deterministic merge of an authoritative base collection with an [`Overlay`].
//!
//! All functions here are pure: same inputs, byte-identical output. Absent collections read as
//! empty and records without a usable key are dropped.

use crate::entities::{EntityKind, Identity};
use crate::keys::{entity_key, normalize_convocation_key, record_id};
use crate::overlay::Overlay;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// `{...record, ...patch}`. Fields the patch doesn't mention are kept. Non-object records and
/// non-object patches are returned unchanged.
pub fn shallow_merge(record: &Value, patch: &Value) -> Value {
    match (record, patch) {
        (Value::Object(r), Value::Object(p)) => {
            let mut out = r.clone();
            for (k, v) in p {
                out.insert(k.clone(), v.clone());
            }
            Value::Object(out)
        }
        _ => record.clone(),
    }
}

/// Merge for kinds with a durable server id.
pub fn merge_by_id(base: Option<&[Value]>, overlay: &Overlay) -> Vec<Value> {
    merge_with(base, overlay, record_id, |k| {
        let k = k.trim();
        (!k.is_empty()).then(|| k.to_string())
    })
}

/// Merge for kinds identified by a normalized key.
///
/// `key_of` derives the normalized key of a record; overlay keys are re-normalized with the
/// convocation normalizer, so overlays persisted with raw labels still line up. Of several
/// records normalizing to the same key only the first survives, base before created.
pub fn merge_by_key(
    base: Option<&[Value]>,
    overlay: &Overlay,
    key_of: impl Fn(&Value) -> Option<String>,
) -> Vec<Value> {
    merge_with(base, overlay, key_of, |k| {
        let k = normalize_convocation_key(k);
        (!k.is_empty()).then_some(k)
    })
}

/// Merge under the addressing mode of `kind`.
pub fn reconcile(kind: EntityKind, base: Option<&[Value]>, overlay: &Overlay) -> Vec<Value> {
    match kind.identity() {
        Identity::ById => merge_by_id(base, overlay),
        Identity::ByKey => merge_by_key(base, overlay, |v| entity_key(kind, v)),
    }
}

fn merge_with(
    base: Option<&[Value]>,
    overlay: &Overlay,
    key_of: impl Fn(&Value) -> Option<String>,
    normalize: impl Fn(&str) -> Option<String>,
) -> Vec<Value> {
    let deleted: HashSet<String> = overlay
        .deleted_ids
        .iter()
        .filter_map(|k| normalize(k.as_str()))
        .collect();

    // Two raw keys may normalize to one; their patches are folded in key order.
    let mut patches: HashMap<String, Value> = HashMap::new();
    for (raw, patch) in &overlay.updated_by_id {
        if !patch.is_object() {
            continue;
        }
        let Some(key) = normalize(raw.as_str()) else {
            continue;
        };
        let merged = match patches.get(&key) {
            Some(prev) => shallow_merge(prev, patch),
            None => patch.clone(),
        };
        patches.insert(key, merged);
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<(String, Value)> = Vec::new();

    let base = base.unwrap_or_default();
    for item in base.iter().chain(overlay.created.iter()) {
        let Some(key) = key_of(item) else {
            continue;
        };
        if deleted.contains(&key) || seen.contains(&key) {
            continue;
        }
        let merged = match patches.get(&key) {
            Some(patch) => shallow_merge(item, patch),
            None => item.clone(),
        };
        seen.insert(key.clone());
        out.push((key, merged));
    }

    if let Some(order) = &overlay.order_ids {
        let order: Vec<String> = order.iter().filter_map(|k| normalize(k.as_str())).collect();
        apply_order(&mut out, &order);
    }

    out.into_iter().map(|(_, v)| v).collect()
}

/// Stable re-sort by position in `order`; keys missing from `order` keep their natural order at
/// the end.
fn apply_order(items: &mut [(String, Value)], order: &[String]) {
    let mut position: HashMap<&str, usize> = HashMap::new();
    for (i, key) in order.iter().enumerate() {
        position.entry(key.as_str()).or_insert(i);
    }
    items.sort_by_key(|(key, _)| position.get(key.as_str()).copied().unwrap_or(usize::MAX));
}

/// Reconcile a fresh server list with a cached/fallback list.
///
/// The server is more current, the cache may be more complete: for ids on both sides server
/// fields win wherever the server defines them (a `null` doesn't count), cache-only fields are
/// kept. Cache items the server doesn't return are kept in place; server-only items are appended
/// in server order.
pub fn prefer_server(cache: Option<&[Value]>, server: Option<&[Value]>) -> Vec<Value> {
    let cache = cache.unwrap_or_default();
    let server = server.unwrap_or_default();

    let mut by_id: HashMap<String, &Value> = HashMap::new();
    let mut server_order: Vec<String> = Vec::new();
    for item in server {
        if let Some(id) = record_id(item) {
            if !by_id.contains_key(&id) {
                server_order.push(id.clone());
                by_id.insert(id, item);
            }
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<Value> = Vec::new();

    for item in cache {
        let Some(id) = record_id(item) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        match by_id.get(&id) {
            Some(fresh) => out.push(fill_gaps(item, fresh)),
            None => out.push(item.clone()),
        }
    }

    for id in server_order {
        if seen.insert(id.clone()) {
            if let Some(item) = by_id.get(&id) {
                out.push((*item).clone());
            }
        }
    }

    out
}

fn fill_gaps(cached: &Value, fresh: &Value) -> Value {
    match (cached, fresh) {
        (Value::Object(c), Value::Object(f)) => {
            let mut out: Map<String, Value> = c.clone();
            for (k, v) in f {
                if !v.is_null() {
                    out.insert(k.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
        _ => fresh.clone(),
    }
}


#[cfg(all(test, not(target_arch = "wasm32")))]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn records() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec((0u8..8, "[a-z]{0,3}"), 0..10)
            .prop_map(|items| {
                items
                    .into_iter()
                    .map(|(id, name)| json!({"id": id.to_string(), "name": name, "extra": id}))
                    .collect()
            })
    }

    fn overlays() -> impl Strategy<Value = Overlay> {
        (
            records(),
            prop::collection::vec((0u8..8, "[a-z]{0,3}"), 0..6),
            prop::collection::vec(0u8..8, 0..4),
            prop::option::of(prop::collection::vec(0u8..8, 0..8)),
        )
            .prop_map(|(created, patches, deleted, order)| Overlay {
                created,
                updated_by_id: patches
                    .into_iter()
                    .map(|(id, name)| (id.to_string(), json!({"name": name})))
                    .collect(),
                deleted_ids: deleted.into_iter().map(|d| d.to_string()).collect(),
                order_ids: order.map(|o| o.into_iter().map(|d| d.to_string()).collect()),
            })
    }

    proptest! {
        #[test]
        fn deleted_keys_never_survive(base in records(), o in overlays()) {
            let merged = merge_by_id(Some(&base), &o);
            for item in &merged {
                let id = record_id(item).unwrap();
                prop_assert!(!o.deleted_ids.contains(&id));
            }
        }

        #[test]
        fn merge_is_deterministic(base in records(), o in overlays()) {
            let a = serde_json::to_string(&merge_by_id(Some(&base), &o)).unwrap();
            let b = serde_json::to_string(&merge_by_id(Some(&base), &o)).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn patches_keep_unmentioned_fields(base in records(), o in overlays()) {
            for item in merge_by_id(Some(&base), &o) {
                prop_assert!(item.get("extra").is_some());
                prop_assert!(item.get("id").is_some());
            }
        }
    }
}
