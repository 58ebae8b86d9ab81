use crate::config::EnvConfig;
use crate::entities::EntityKind;
use crate::models::normalize_record;
use crate::storage::{load_token, save_token, Storage};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Query parameters for list calls (`?convocation=VIII&page=2`).
pub type ListFilter = BTreeMap<String, String>;

/// Client for the site's REST backend.
///
/// The backend is an external collaborator; every call may fail and callers are expected to
/// fall back to overlay-merged cached data (see [`crate::sync::CollectionFeed`]).
#[derive(Clone, Debug)]
pub struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn from_config(cfg: &EnvConfig, storage: &impl Storage) -> Self {
        let mut client = Self::new(cfg.api_url.clone());
        client.token = load_token(storage);
        client
    }

    pub fn set_token(&mut self, token: String, storage: &impl Storage) {
        save_token(storage, Some(&token));
        self.token = Some(token);
    }

    pub fn clear_token(&mut self, storage: &impl Storage) {
        save_token(storage, None);
        self.token = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn get_auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    pub(crate) fn collection_url(&self, kind: EntityKind, filter: Option<&ListFilter>) -> String {
        let mut url = format!("{}{}", self.base_url, kind.api_path());
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            let query: Vec<String> = filter
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    pub(crate) fn item_url(&self, kind: EntityKind, id: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            kind.api_path(),
            urlencoding::encode(id.trim())
        )
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<&Value>,
        ctx: &str,
    ) -> ApiResult<reqwest::Response> {
        let client = reqwest::Client::new();
        let mut req = client.request(method, url);
        if let Some(header) = self.get_auth_header() {
            req = req.header("Authorization", header);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            Ok(res)
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, ctx))
        }
    }

    async fn send_json(
        &self,
        method: Method,
        url: String,
        body: Option<&Value>,
        ctx: &str,
    ) -> ApiResult<Value> {
        let res = self.send(method, url, body, ctx).await?;
        res.json().await.map_err(ApiError::parse)
    }

    pub async fn list(&self, kind: EntityKind, filter: Option<&ListFilter>) -> ApiResult<Vec<Value>> {
        let data = self
            .send_json(Method::GET, self.collection_url(kind, filter), None, "List failed")
            .await?;
        Ok(Self::parse_list_response(kind, data))
    }

    pub async fn get_by_id(&self, kind: EntityKind, id: &str) -> ApiResult<Value> {
        let data = self
            .send_json(Method::GET, self.item_url(kind, id), None, "Fetch failed")
            .await?;
        Self::parse_item_response(data)
    }

    pub async fn create(&self, kind: EntityKind, body: &Value) -> ApiResult<Value> {
        let data = self
            .send_json(Method::POST, self.collection_url(kind, None), Some(body), "Create failed")
            .await?;
        Self::parse_item_response(data)
    }

    pub async fn patch(&self, kind: EntityKind, id: &str, body: &Value) -> ApiResult<Value> {
        let data = self
            .send_json(Method::PATCH, self.item_url(kind, id), Some(body), "Update failed")
            .await?;
        Self::parse_item_response(data)
    }

    pub async fn remove(&self, kind: EntityKind, id: &str) -> ApiResult<()> {
        self.send(Method::DELETE, self.item_url(kind, id), None, "Delete failed")
            .await
            .map(|_| ())
    }

    /// Lists have been observed both bare and wrapped (`items`, `data`, `results`, or the kind
    /// name). Anything else reads as an empty list.
    pub(crate) fn parse_list_response(kind: EntityKind, data: Value) -> Vec<Value> {
        let list = match data {
            Value::Array(items) => items,
            Value::Object(mut map) => ["items", "data", "results", kind.name()]
                .iter()
                .find_map(|k| match map.remove(*k) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .unwrap_or_default(),
            _ => vec![],
        };

        list.into_iter()
            .filter(|item| !item.is_null())
            .map(normalize_record)
            .collect()
    }

    /// Single records are either bare or wrapped in `data`.
    pub(crate) fn parse_item_response(data: Value) -> ApiResult<Value> {
        let item = match data {
            Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        if item.is_object() {
            Ok(normalize_record(item))
        } else {
            Err(ApiError::parse(format!("expected an object, got {item}")))
        }
    }
}
