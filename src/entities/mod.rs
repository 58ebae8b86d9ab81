//! Catalogue of the entity kinds the site manages.
//!
//! Everything kind-specific (storage keys, event names, identity mode) is a static property of
//! [`EntityKind`] so the overlay engine itself stays generic.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

pub const OVERLAY_KEY_PREFIX: &str = "gov_site_overlay::";
pub const SNAPSHOT_KEY_PREFIX: &str = "gov_site_snapshot::";
pub const EVENT_PREFIX: &str = "gov-site:overlay:";

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    IntoStaticStr,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Committees,
    Convocations,
    Deputies,
    News,
    Events,
    Documents,
    SliderItems,
    Pages,
    Portals,
}

/// How records of a kind are identified across base data and the overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity {
    /// The server assigns a durable `id`.
    ById,
    /// No durable id; identity is the normalized human-readable key.
    ByKey,
}

impl EntityKind {
    pub fn all() -> impl Iterator<Item = EntityKind> {
        EntityKind::iter()
    }

    /// snake_case name used in storage keys, event names and URLs.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Convocations come from the source as text ("VIII созыв", "8", ...) and have no stable id.
    pub fn identity(self) -> Identity {
        match self {
            EntityKind::Convocations => Identity::ByKey,
            _ => Identity::ById,
        }
    }

    /// Kinds whose display order the admin can change by hand.
    pub fn reorderable(self) -> bool {
        matches!(
            self,
            EntityKind::SliderItems | EntityKind::Portals | EntityKind::Committees
        )
    }

    /// Feed-like kinds keep pending created records newest first. The merge still places all
    /// created records after the base collection.
    pub fn newest_first(self) -> bool {
        matches!(self, EntityKind::News | EntityKind::Events)
    }

    pub fn storage_key(self) -> String {
        format!("{OVERLAY_KEY_PREFIX}{}", self.name())
    }

    pub fn snapshot_key(self) -> String {
        format!("{SNAPSHOT_KEY_PREFIX}{}", self.name())
    }

    pub fn event_name(self) -> String {
        format!("{EVENT_PREFIX}{}", self.name())
    }

    /// Path segment of the remote collection, e.g. `/api/slider-items`.
    pub fn api_path(self) -> String {
        format!("/api/{}", self.name().replace('_', "-"))
    }

    /// Field used as the human-readable title in lists.
    pub fn title_field(self) -> &'static str {
        match self {
            EntityKind::Deputies => "full_name",
            EntityKind::Convocations => "name",
            EntityKind::Committees | EntityKind::Portals => "name",
            _ => "title",
        }
    }

    /// Reverse lookup used by the cross-tab listener.
    pub fn from_storage_key(key: &str) -> Option<EntityKind> {
        let name = key.strip_prefix(OVERLAY_KEY_PREFIX)?;
        name.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn test_storage_keys_do_not_collide() {
        let keys: HashSet<String> = EntityKind::all().map(|k| k.storage_key()).collect();
        assert_eq!(keys.len(), EntityKind::all().count());

        let snapshots: HashSet<String> = EntityKind::all().map(|k| k.snapshot_key()).collect();
        assert!(keys.is_disjoint(&snapshots));
    }

    #[test]
    fn test_storage_key_roundtrip() {
        for kind in EntityKind::all() {
            assert_eq!(EntityKind::from_storage_key(&kind.storage_key()), Some(kind));
        }
        assert_eq!(EntityKind::from_storage_key("gov_site_token"), None);
        assert_eq!(EntityKind::from_storage_key("gov_site_overlay::unknown"), None);
    }

    #[test]
    fn test_only_convocations_are_key_addressed() {
        let by_key: Vec<EntityKind> = EntityKind::all()
            .filter(|k| k.identity() == Identity::ByKey)
            .collect();
        assert_eq!(by_key, vec![EntityKind::Convocations]);
    }

    #[test]
    fn test_names() {
        assert_eq!(EntityKind::SliderItems.storage_key(), "gov_site_overlay::slider_items");
        assert_eq!(EntityKind::SliderItems.event_name(), "gov-site:overlay:slider_items");
        assert_eq!(EntityKind::SliderItems.api_path(), "/api/slider-items");
    }
}
