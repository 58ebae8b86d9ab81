//! Browser side of the overlay signal: `CustomEvent` for the same tab, `storage` for the others.

use super::OverlayBus;
use crate::entities::EntityKind;
use leptos::ev;
use leptos_dom::helpers::{window_event_listener, WindowListenerHandle};

/// Raise `gov-site:overlay:<kind>` on `window` for same-tab code that doesn't hold the bus.
pub fn dispatch_overlay_event(kind: EntityKind) {
    let Some(win) = web_sys::window() else {
        return;
    };
    match web_sys::CustomEvent::new(&kind.event_name()) {
        Ok(ev) => {
            if win.dispatch_event(&ev).is_err() {
                log::warn!("could not dispatch overlay event for {kind}");
            }
        }
        Err(_) => log::debug!("could not create overlay event for {kind}"),
    }
}

/// Wire a bus to the browser: relay publishes as custom events and feed `storage` events from
/// other tabs back into local delivery.
pub fn connect(bus: &OverlayBus) {
    bus.set_relay(dispatch_overlay_event);
    // Stays installed for the app lifetime.
    let _storage = install_storage_listener(bus.clone());
}

/// `storage` fires in every *other* tab that shares the origin. A `null` key means the whole
/// storage was cleared.
///
/// Dropping the handle keeps the listener; call `remove` on it to uninstall.
pub fn install_storage_listener(bus: OverlayBus) -> WindowListenerHandle {
    window_event_listener(ev::storage, move |ev: web_sys::StorageEvent| match ev.key() {
        Some(key) => {
            if let Some(kind) = EntityKind::from_storage_key(&key) {
                bus.deliver(kind);
            }
        }
        None => {
            for kind in EntityKind::all() {
                bus.deliver(kind);
            }
        }
    })
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use leptos_dom::helpers::window_event_listener_untyped;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn counter() -> (Arc<AtomicUsize>, impl Fn(EntityKind) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, move |_: EntityKind| {
            h.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn storage_event(key: Option<&str>) -> web_sys::StorageEvent {
        let init = web_sys::StorageEventInit::new();
        init.set_key(key);
        web_sys::StorageEvent::new_with_event_init_dict("storage", &init).expect("storage event")
    }

    fn dispatch(ev: &web_sys::Event) {
        web_sys::window()
            .expect("window")
            .dispatch_event(ev)
            .expect("dispatch");
    }

    #[wasm_bindgen_test]
    fn test_storage_event_from_another_tab_reaches_subscribers() {
        let bus = OverlayBus::new();
        let (news_hits, on_news) = counter();
        let (docs_hits, on_docs) = counter();
        let _news = bus.subscribe(EntityKind::News, on_news);
        let _docs = bus.subscribe(EntityKind::Documents, on_docs);
        let handle = install_storage_listener(bus.clone());

        dispatch(&storage_event(Some(&EntityKind::News.storage_key())));
        assert_eq!(news_hits.load(Ordering::SeqCst), 1);
        assert_eq!(docs_hits.load(Ordering::SeqCst), 0);

        // Unrelated keys are ignored.
        dispatch(&storage_event(Some("gov_site_token")));
        assert_eq!(news_hits.load(Ordering::SeqCst), 1);

        // A cleared storage touches every kind.
        dispatch(&storage_event(None));
        assert_eq!(news_hits.load(Ordering::SeqCst), 2);
        assert_eq!(docs_hits.load(Ordering::SeqCst), 1);

        handle.remove();
    }

    #[wasm_bindgen_test]
    fn test_publish_raises_custom_event() {
        let bus = OverlayBus::new();
        bus.set_relay(dispatch_overlay_event);

        let raised = Arc::new(AtomicUsize::new(0));
        let seen = raised.clone();
        let handle = window_event_listener_untyped(
            &EntityKind::Portals.event_name(),
            move |_ev: web_sys::Event| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(EntityKind::Portals);
        bus.publish(EntityKind::News);
        assert_eq!(raised.load(Ordering::SeqCst), 1);

        handle.remove();
    }
}
