use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, ConfigError};
use crate::model::{Deal, ItemBatch, Store};
use crate::api::model::{DealsPageResp, StoreChangeResp, StoreSearchResp, SubscriptionResp};

pub mod model;

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid endpoint '{0}'")]
    Endpoint(String),
    #[error("server error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Api(String),
}

/// POST transport used by every pipeline. Replies are always JSON.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, FetchError>;

    /// Sends `fields` as `application/x-www-form-urlencoded`.
    async fn post_form(&self, path: &str, fields: &[(String, String)]) -> Result<Value, FetchError>;
}

#[derive(Clone)]
pub struct HttpPageSource {
    http: Client,
    base_url: Url,
    csrf_token: Option<String>,
}

impl fmt::Debug for HttpPageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPageSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpPageSource {
    pub fn new(base_url: Url, csrf_token: Option<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("salefeed/0.1")
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            csrf_token,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let token = csrf_token(&cfg.app.csrf_cookie, CSRF_COOKIE);
        if token.is_none() {
            warn!("no {} cookie configured; POSTs will likely be rejected", CSRF_COOKIE);
        }
        Ok(Self::new(cfg.base_url()?, token, cfg.request_timeout()))
    }

    fn post(&self, path: &str) -> Result<reqwest::RequestBuilder, FetchError> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|_| FetchError::Endpoint(path.to_string()))?;
        let mut req = self.http.post(endpoint);
        if let Some(token) = &self.csrf_token {
            req = req.header(CSRF_HEADER, token);
        }
        Ok(req)
    }

    pub fn build_request(&self, path: &str, body: &Value) -> Result<reqwest::Request, FetchError> {
        let req = self
            .post(path)?
            .header("Content-Type", "application/json")
            .json(body);
        Ok(req.build()?)
    }

    pub fn build_form_request(
        &self,
        path: &str,
        fields: &[(String, String)],
    ) -> Result<reqwest::Request, FetchError> {
        Ok(self.post(path)?.form(fields).build()?)
    }

    async fn execute(&self, request: reqwest::Request) -> Result<Value, FetchError> {
        let res = self.http.execute(request).await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            warn!(%status, body = %text, "request rejected");
            // Django views report failures as {"error": "..."}.
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                if let Some(msg) = value.get("error").and_then(Value::as_str) {
                    return Err(FetchError::Api(msg.to_string()));
                }
            }
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, FetchError> {
        let request = self.build_request(path, &body)?;
        debug!(url = %request.url(), %body, "POST");
        self.execute(request).await
    }

    async fn post_form(&self, path: &str, fields: &[(String, String)]) -> Result<Value, FetchError> {
        let request = self.build_form_request(path, fields)?;
        debug!(url = %request.url(), fields = fields.len(), "POST form");
        self.execute(request).await
    }
}

/// Extracts a cookie value from a `Cookie` header, percent-decoded.
pub fn csrf_token(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
        .map(percent_decode)
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(b) = raw.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub fn deals_path(slug: &str) -> String {
    format!("deals/{}/", slug.trim_matches('/'))
}

fn reject_api_error(value: &Value) -> Result<(), FetchError> {
    match value.get("error").and_then(Value::as_str) {
        Some(msg) => Err(FetchError::Api(msg.to_string())),
        None => Ok(()),
    }
}

pub async fn fetch_deals(
    source: &dyn PageSource,
    slug: &str,
    page: u32,
) -> Result<ItemBatch<Deal>, FetchError> {
    let value = source.post_json(&deals_path(slug), json!({ "page": page })).await?;
    reject_api_error(&value)?;
    let resp: DealsPageResp = serde_json::from_value(value)?;
    Ok(ItemBatch {
        items: resp.deals,
        has_next_page: resp.has_next_page,
        total_found: None,
    })
}

pub async fn search_stores(
    source: &dyn PageSource,
    endpoint: &str,
    query: &str,
    page: u32,
) -> Result<ItemBatch<Store>, FetchError> {
    let value = source
        .post_json(endpoint, json!({ "query": query, "page": page }))
        .await?;
    reject_api_error(&value)?;
    let resp: StoreSearchResp = serde_json::from_value(value)?;
    Ok(ItemBatch {
        items: resp.stores,
        has_next_page: resp.has_next_page,
        total_found: resp.total_found,
    })
}

/// Subscribe and unsubscribe share one body shape; an `error` field is data here.
pub async fn post_subscription(
    source: &dyn PageSource,
    endpoint: &str,
    store_id: i64,
) -> Result<SubscriptionResp, FetchError> {
    let value = source.post_json(endpoint, json!({ "store_id": store_id })).await?;
    Ok(serde_json::from_value(value)?)
}

pub fn store_manager_path(base_path: &str, verb: &str, store_id: i64) -> String {
    format!("{}/{verb}/{store_id}/", base_path.trim_end_matches('/'))
}

/// Posts the edit form. A reply without `success` is data, not an error.
pub async fn edit_store(
    source: &dyn PageSource,
    base_path: &str,
    store_id: i64,
    fields: &[(String, String)],
) -> Result<StoreChangeResp, FetchError> {
    let value = source
        .post_form(&store_manager_path(base_path, "edit", store_id), fields)
        .await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn delete_store(
    source: &dyn PageSource,
    base_path: &str,
    store_id: i64,
) -> Result<StoreChangeResp, FetchError> {
    let value = source
        .post_form(&store_manager_path(base_path, "delete", store_id), &[])
        .await?;
    Ok(serde_json::from_value(value)?)
}
