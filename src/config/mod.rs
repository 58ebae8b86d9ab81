use serde::{Deserialize, Serialize};

const DEFAULT_API_URL: &str = "http://localhost:6689";

/// Runtime configuration injected by the hosting page through `window.ENV`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    pub api_url: String,
    pub log_level: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let mut cfg = Self::defaults();

        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    // README style first (API_URL), then the legacy lower-case key.
                    if let Some(url) = read_env_string(&env, "API_URL")
                        .or_else(|| read_env_string(&env, "api_url"))
                    {
                        cfg.api_url = url;
                    }
                    if let Some(level) = read_env_string(&env, "LOG_LEVEL") {
                        cfg.log_level = level;
                    }
                }
            }
        }

        cfg
    }

    pub fn defaults() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            log_level: "info".to_string(),
        }
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level
            .trim()
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn read_env_string(env: &wasm_bindgen::JsValue, key: &str) -> Option<String> {
    js_sys::Reflect::get(env, &key.into())
        .ok()
        .and_then(|v| v.as_string())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
