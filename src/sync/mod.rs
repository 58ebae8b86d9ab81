//! Base data lifecycle for one entity kind: last-known-good snapshot, request liveness guard and
//! fallback on API failure.

mod mutations;

pub use mutations::{
    confirm_created, confirm_patched, create_local, delete_local, patch_local, CreateFollowup,
};

use crate::api::{ApiError, ApiResult};
use crate::cache::{load_snapshot, save_snapshot};
use crate::entities::EntityKind;
use crate::overlay::OverlayStore;
use crate::reconcile::prefer_server;
use crate::storage::Storage;
use crate::util::now_ms;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseSource {
    /// Nothing loaded yet and no fallback content.
    Empty,
    /// Bundled fallback content only.
    Fallback,
    /// Restored from the persisted snapshot of an earlier session.
    Snapshot,
    /// Fresh from the server in this session.
    Server,
}

#[derive(Clone, Debug)]
pub enum FeedOutcome {
    Applied,
    /// A newer request was started after this one; its response was dropped.
    Stale,
    /// The request failed; the previous base stays in effect.
    Degraded(ApiError),
}

pub struct CollectionFeed<S: Storage> {
    kind: EntityKind,
    store: OverlayStore<S>,
    fallback: Vec<Value>,
    base: Vec<Value>,
    source: BaseSource,
    request_id: u64,
    last_error: Option<ApiError>,
}

impl<S: Storage> CollectionFeed<S> {
    /// Start from the persisted snapshot if there is one.
    pub fn new(kind: EntityKind, store: OverlayStore<S>) -> Self {
        let (base, source) = match load_snapshot(store.storage(), kind) {
            Some(snap) => (snap.items, BaseSource::Snapshot),
            None => (vec![], BaseSource::Empty),
        };
        Self {
            kind,
            store,
            fallback: vec![],
            base,
            source,
            request_id: 0,
            last_error: None,
        }
    }

    /// Bundled content shown before (and merged under) server data.
    pub fn with_fallback(mut self, fallback: Vec<Value>) -> Self {
        if self.source == BaseSource::Empty && !fallback.is_empty() {
            self.base = fallback.clone();
            self.source = BaseSource::Fallback;
        }
        self.fallback = fallback;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn base(&self) -> &[Value] {
        &self.base
    }

    pub fn source(&self) -> BaseSource {
        self.source
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    /// Start a fetch. Only the response carrying the latest id will be applied.
    pub fn begin_request(&mut self) -> u64 {
        self.request_id += 1;
        self.request_id
    }

    pub fn complete(&mut self, request_id: u64, result: ApiResult<Vec<Value>>) -> FeedOutcome {
        if request_id != self.request_id {
            log::debug!(
                "dropping stale {} response #{request_id} (latest #{})",
                self.kind,
                self.request_id
            );
            return FeedOutcome::Stale;
        }

        match result {
            Ok(items) => {
                self.base = if self.fallback.is_empty() {
                    items
                } else {
                    prefer_server(Some(&self.fallback), Some(&items))
                };
                self.source = BaseSource::Server;
                self.last_error = None;
                save_snapshot(self.store.storage(), self.kind, &self.base, now_ms());
                self.store.prune_confirmed(self.kind, &self.base);
                FeedOutcome::Applied
            }
            Err(e) => {
                log::warn!(
                    "{} refresh failed, keeping {:?} data: {e}",
                    self.kind,
                    self.source
                );
                self.last_error = Some(e.clone());
                FeedOutcome::Degraded(e)
            }
        }
    }

    /// What the UI shows: the current base merged with the current overlay.
    pub fn view(&self) -> Vec<Value> {
        self.store.merged(self.kind, Some(&self.base))
    }
}
