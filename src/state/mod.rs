use crate::api::ApiClient;
use crate::config::EnvConfig;
use crate::entities::EntityKind;
use crate::notify::OverlayBus;
use crate::overlay::OverlayStore;
use crate::router::{PathRouter, RouteParams};
use crate::storage::LocalStorage;
use crate::sync::{
    confirm_created, confirm_patched, create_local, delete_local, patch_local, CreateFollowup,
};
use crate::util::is_local_id;
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde_json::{Map, Value};

/// Route handler: builds the page for the matched params.
pub type PageHandler = fn(RouteParams) -> AnyView;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvConfig,
    pub api_client: RwSignal<ApiClient>,

    /// Pending local mutations, persisted in localStorage and shared with other tabs.
    pub overlays: OverlayStore<LocalStorage>,

    pub router: PathRouter<PageHandler>,
}

impl AppState {
    pub fn new(config: EnvConfig, router: PathRouter<PageHandler>) -> Self {
        let api_client = ApiClient::from_config(&config, &LocalStorage);
        Self {
            config,
            api_client: RwSignal::new(api_client),
            overlays: OverlayStore::new(LocalStorage, OverlayBus::new()),
            router,
        }
    }

    pub fn can_edit(&self) -> bool {
        self.api_client.with_untracked(|c| c.is_authenticated())
    }

    /// Show `record` right away and ask the backend to store it. A failed request leaves the
    /// record pending locally.
    pub fn create_entity(&self, kind: EntityKind, record: Value) -> Option<String> {
        let local_key = create_local(&self.overlays, kind, record.clone())?;

        let client = self.api_client.get_untracked();
        let overlays = self.overlays.clone();
        let key = local_key.clone();
        spawn_local(async move {
            let saved = match client.create(kind, &record).await {
                Ok(saved) => saved,
                Err(e) => {
                    log::warn!("create {kind} {key} kept local: {e}");
                    return;
                }
            };
            match confirm_created(&overlays, kind, &key, saved) {
                CreateFollowup::Nothing => {}
                CreateFollowup::Patch { key, patch } => {
                    push_patch(&client, &overlays, kind, &key, patch).await;
                }
                CreateFollowup::Remove { key } => push_remove(&client, kind, &key).await,
            }
        });

        Some(local_key)
    }

    pub fn patch_entity(&self, kind: EntityKind, key: &str, patch: Map<String, Value>) {
        if !patch_local(&self.overlays, kind, key, patch.clone()) {
            return;
        }
        // Not on the server yet; the patch is sent once the create is acknowledged.
        if is_local_id(key) {
            return;
        }

        let client = self.api_client.get_untracked();
        let overlays = self.overlays.clone();
        let key = key.to_string();
        spawn_local(async move {
            push_patch(&client, &overlays, kind, &key, patch).await;
        });
    }

    /// A `tmp-` record is only tombstoned here; if its create is still in flight, the server copy
    /// is removed once the create is acknowledged.
    pub fn delete_entity(&self, kind: EntityKind, key: &str) {
        if !delete_local(&self.overlays, kind, key) || is_local_id(key) {
            return;
        }

        let client = self.api_client.get_untracked();
        let key = key.to_string();
        spawn_local(async move {
            push_remove(&client, kind, &key).await;
        });
    }

    pub fn reorder(&self, kind: EntityKind, ordered_keys: &[String]) {
        if kind.reorderable() {
            self.overlays.set_order(kind, ordered_keys);
        }
    }
}

async fn push_patch(
    client: &ApiClient,
    overlays: &OverlayStore<LocalStorage>,
    kind: EntityKind,
    key: &str,
    patch: Map<String, Value>,
) {
    match client.patch(kind, key, &Value::Object(patch)).await {
        Ok(saved) => {
            confirm_patched(overlays, kind, key, &saved);
        }
        Err(e) => log::warn!("patch {kind} {key} kept local: {e}"),
    }
}

async fn push_remove(client: &ApiClient, kind: EntityKind, key: &str) {
    if let Err(e) = client.remove(kind, key).await {
        log::warn!("delete {kind} {key} kept local: {e}");
    }
}

#[derive(Clone)]
pub struct AppContext(pub AppState);
