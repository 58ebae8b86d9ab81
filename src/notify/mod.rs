//! Publish/subscribe channel for overlay changes.
//!
//! The overlay store publishes a kind after every write. Same-tab subscribers are called
//! directly; the optional relay forwards the signal to the platform (an in-page `CustomEvent`,
//! see [`browser`]). Other tabs learn about the change from the `storage` event, which
//! [`browser::install_storage_listener`] feeds back into [`OverlayBus::deliver`].

pub mod browser;

use crate::entities::EntityKind;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub type Listener = Arc<dyn Fn(EntityKind) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: BTreeMap<EntityKind, Vec<(u64, Listener)>>,
    relay: Option<Listener>,
}

#[derive(Clone, Default)]
pub struct OverlayBus {
    inner: Arc<Mutex<BusInner>>,
}

impl OverlayBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every published kind to `relay` after local delivery.
    pub fn set_relay(&self, relay: impl Fn(EntityKind) + Send + Sync + 'static) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.relay = Some(Arc::new(relay));
        }
    }

    /// Register `listener` for `kind`. The listener stays registered until the returned
    /// [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        kind: EntityKind,
        listener: impl Fn(EntityKind) + Send + Sync + 'static,
    ) -> Subscription {
        let id = match self.inner.lock() {
            Ok(mut inner) => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner
                    .listeners
                    .entry(kind)
                    .or_default()
                    .push((id, Arc::new(listener)));
                id
            }
            Err(_) => 0,
        };
        Subscription {
            bus: self.clone(),
            kind,
            id,
        }
    }

    /// Local delivery plus relay. Used by the writer of a change.
    pub fn publish(&self, kind: EntityKind) {
        self.deliver(kind);
        let relay = self.inner.lock().ok().and_then(|inner| inner.relay.clone());
        if let Some(relay) = relay {
            relay(kind);
        }
    }

    /// Local delivery only. Used for changes observed from another tab.
    pub fn deliver(&self, kind: EntityKind) {
        // Snapshot under the lock, call outside it: listeners may publish or (un)subscribe.
        let listeners: Vec<Listener> = match self.inner.lock() {
            Ok(inner) => inner
                .listeners
                .get(&kind)
                .map(|ls| ls.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default(),
            Err(_) => return,
        };
        log::debug!("overlay change for {kind}: {} listener(s)", listeners.len());
        for listener in listeners {
            listener(kind);
        }
    }

    pub fn listener_count(&self, kind: EntityKind) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.listeners.get(&kind).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn unsubscribe(&self, kind: EntityKind, id: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(ls) = inner.listeners.get_mut(&kind) {
                ls.retain(|(lid, _)| *lid != id);
                if ls.is_empty() {
                    inner.listeners.remove(&kind);
                }
            }
        }
    }
}

pub struct Subscription {
    bus: OverlayBus,
    kind: EntityKind,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.kind, self.id);
    }
}
