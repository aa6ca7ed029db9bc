#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use salefeed::api::{FetchError, PageSource};
use salefeed::toast::ToastCenter;

/// Parks the first request until `release` is notified.
#[derive(Default)]
pub struct Hold {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Clone, Default)]
pub struct RecordingSource {
    responses: Arc<Mutex<VecDeque<Result<Value, FetchError>>>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    form_calls: Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>,
    hold: Arc<Mutex<Option<Arc<Hold>>>>,
}

impl RecordingSource {
    pub fn with_responses(responses: Vec<Result<Value, FetchError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    /// Same as `with_responses`, but the first call blocks on the returned hold.
    pub fn held(responses: Vec<Result<Value, FetchError>>) -> (Self, Arc<Hold>) {
        let hold = Arc::new(Hold::default());
        let source = Self::with_responses(responses);
        source.hold.try_lock().unwrap().replace(hold.clone());
        (source, hold)
    }

    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }

    pub async fn form_calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.form_calls.lock().await.clone()
    }

    async fn wait_if_held(&self) {
        let hold = self.hold.lock().await.take();
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }
    }

    async fn pop_response(&self) -> Result<Value, FetchError> {
        let mut guard = self.responses.lock().await;
        guard
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Api("no scripted response".into())))
    }
}

#[async_trait::async_trait]
impl PageSource for RecordingSource {
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, FetchError> {
        self.calls.lock().await.push((path.to_string(), body));
        self.wait_if_held().await;
        self.pop_response().await
    }

    async fn post_form(&self, path: &str, fields: &[(String, String)]) -> Result<Value, FetchError> {
        self.form_calls.lock().await.push((path.to_string(), fields.to_vec()));
        self.wait_if_held().await;
        self.pop_response().await
    }
}

pub fn toasts() -> Arc<ToastCenter> {
    Arc::new(ToastCenter::new(Duration::from_secs(5)))
}

pub fn deal(title: &str) -> Value {
    json!({
        "title": title,
        "grabber": format!("{title} grabber"),
        "store": { "name": "Zalando", "image_url": "https://img.example/zalando.png" },
        "parsed_date_received": "01-06-2024 10:00",
        "main_link": "https://example.com/sale",
    })
}

pub fn deals_page(titles: &[&str], has_next_page: bool) -> Value {
    let deals: Vec<Value> = titles.iter().map(|t| deal(t)).collect();
    json!({ "deals": deals, "has_next_page": has_next_page })
}

pub fn store(id: i64, name: &str) -> Value {
    json!({ "id": id, "name": name, "image_url": format!("https://img.example/{id}.png"), "is_subscribed": false })
}

pub fn stores_page(stores: &[(i64, &str)], has_next_page: bool, total_found: u64) -> Value {
    let stores: Vec<Value> = stores.iter().map(|(id, name)| store(*id, name)).collect();
    json!({ "stores": stores, "hasNextPage": has_next_page, "totalFound": total_found })
}
