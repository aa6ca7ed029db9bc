//! Configuration loader and validator for the sale feed client.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::observer::{ObserverOptions, RootMargin};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub feed: Feed,
    pub search: Search,
    pub subscriptions: Subscriptions,
    pub toast: Toast,
    #[serde(default)]
    pub store_manager: StoreManager,
    #[serde(default)]
    pub messages: Messages,
}

/// Site-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub base_url: String,
    /// Raw `Cookie` header value; the anti-forgery token is read from it.
    #[serde(default)]
    pub csrf_cookie: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Deals feed pagination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feed {
    pub slug: String,
    pub start_page: u32,
    pub root_margin: String,
    pub threshold: f64,
    pub observe_once: bool,
    pub infinite_scroll_max_width: u32,
}

/// Store search panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Search {
    pub endpoint: String,
    pub debounce_ms: u64,
    pub root_margin: String,
    pub threshold: f64,
}

/// Subscribe / unsubscribe routes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscriptions {
    pub subscribe_endpoint: String,
    pub unsubscribe_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Toast {
    pub success_dismiss_ms: u64,
}

/// Admin store list routes; `{base_path}edit/{id}/` and `{base_path}delete/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreManager {
    pub base_path: String,
}

impl Default for StoreManager {
    fn default() -> Self {
        Self {
            base_path: "deals/stores-manager/".into(),
        }
    }
}

/// User-facing texts. Defaults match the live site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Messages {
    pub fetch_failed: String,
    pub no_more_sales: String,
    pub no_stores_found: String,
    pub no_stores_found_hint: String,
    pub payload_invalid: String,
    pub payload_missing: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            fetch_failed: "Er ging iets mis.".into(),
            no_more_sales: "Geen sales meer.".into(),
            no_stores_found: "Geen winkels gevonden.".into(),
            no_stores_found_hint: "Stuur deze winkel in om toe te voegen aan de alerts. Wij proberen binnen 2 dagen de winkel toe te voegen.".into(),
            payload_invalid: "Kon de sale niet laden. Bekijk de console voor meer.".into(),
            payload_missing: "Geen gegevens gevonden.".into(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Config {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.app.base_url).map_err(|_| ConfigError::Invalid("app.base_url must be an absolute URL"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.app.request_timeout_ms)
    }
}

impl Feed {
    pub fn observer_options(&self) -> Result<ObserverOptions, ConfigError> {
        let root_margin = RootMargin::parse(&self.root_margin)
            .map_err(|_| ConfigError::Invalid("feed.root_margin must be a CSS margin (px or %)"))?;
        Ok(ObserverOptions {
            root_margin,
            threshold: self.threshold,
            observe_once: self.observe_once,
        })
    }
}

impl Search {
    /// The search observer keeps watching across fires; re-arming replaces the target.
    pub fn observer_options(&self) -> Result<ObserverOptions, ConfigError> {
        let root_margin = RootMargin::parse(&self.root_margin)
            .map_err(|_| ConfigError::Invalid("search.root_margin must be a CSS margin (px or %)"))?;
        Ok(ObserverOptions {
            root_margin,
            threshold: self.threshold,
            observe_once: false,
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Toast {
    pub fn success_dismiss(&self) -> Duration {
        Duration::from_millis(self.success_dismiss_ms)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    cfg.base_url()?;
    if cfg.app.request_timeout_ms == 0 {
        return Err(ConfigError::Invalid("app.request_timeout_ms must be > 0"));
    }

    if cfg.feed.slug.trim().is_empty() {
        return Err(ConfigError::Invalid("feed.slug must be non-empty"));
    }
    if cfg.feed.start_page == 0 {
        return Err(ConfigError::Invalid("feed.start_page must be >= 1"));
    }
    if !(0.0..=1.0).contains(&cfg.feed.threshold) {
        return Err(ConfigError::Invalid("feed.threshold must be within [0, 1]"));
    }
    cfg.feed.observer_options()?;

    if cfg.search.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("search.endpoint must be non-empty"));
    }
    if cfg.search.debounce_ms == 0 {
        return Err(ConfigError::Invalid("search.debounce_ms must be > 0"));
    }
    if !(0.0..=1.0).contains(&cfg.search.threshold) {
        return Err(ConfigError::Invalid("search.threshold must be within [0, 1]"));
    }
    cfg.search.observer_options()?;

    if cfg.subscriptions.subscribe_endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("subscriptions.subscribe_endpoint must be non-empty"));
    }
    if cfg.subscriptions.unsubscribe_endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("subscriptions.unsubscribe_endpoint must be non-empty"));
    }

    if cfg.toast.success_dismiss_ms == 0 {
        return Err(ConfigError::Invalid("toast.success_dismiss_ms must be > 0"));
    }

    if cfg.store_manager.base_path.trim_matches('/').trim().is_empty() {
        return Err(ConfigError::Invalid("store_manager.base_path must be non-empty"));
    }

    Ok(())
}

/// Returns the example YAML shipped with the crate.
pub fn example() -> &'static str {
    r#"app:
  base_url: "http://localhost:8000/"
  csrf_cookie: "csrftoken=YOUR_CSRF_TOKEN"
  request_timeout_ms: 15000

feed:
  slug: "public"
  start_page: 1  # first page fetched into an empty container
  root_margin: "0px"
  threshold: 0.1
  observe_once: true
  infinite_scroll_max_width: 900

search:
  endpoint: "api/search-stores/"
  debounce_ms: 300
  root_margin: "100px"
  threshold: 0.0

subscriptions:
  subscribe_endpoint: "api/subscribe-to-store/"
  unsubscribe_endpoint: "api/un-subscribe-to-store/"

toast:
  success_dismiss_ms: 5000

store_manager:
  base_path: "deals/stores-manager/"
"#
}
