pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod entities;
pub mod keys;
pub mod logging;
pub mod models;
pub mod notify;
pub mod overlay;
pub mod reconcile;
pub mod router;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

use crate::app::{routes, App};
use crate::config::EnvConfig;
use crate::router::PathRouter;
use crate::state::AppState;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();

    let config = EnvConfig::new();
    logging::init(config.log_level_filter());
    log::info!("starting with api {}", config.api_url);

    let state = AppState::new(config, PathRouter::new(routes()));
    notify::browser::connect(state.overlays.bus());
    state.router.start();

    mount_to_body(move || view! { <App state=state /> });
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use crate::entities::EntityKind;
    use crate::notify::OverlayBus;
    use crate::overlay::OverlayStore;
    use crate::storage::LocalStorage;
    use crate::sync::{create_local, delete_local};
    use serde_json::json;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_local_mutations_survive_a_new_store() {
        let kind = EntityKind::Events;
        let _ = web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .map(|s| s.remove_item(&kind.storage_key()));

        let first = OverlayStore::new(LocalStorage, OverlayBus::new());
        let key = create_local(&first, kind, json!({"title": "Приём граждан"}))
            .expect("event gets a local key");
        delete_local(&first, kind, "55");

        let second = OverlayStore::new(LocalStorage, OverlayBus::new());
        let merged = second.merged(kind, Some(&[json!({"id": "55", "title": "old"})]));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["id"], json!(key));
    }
}
