//! Store subscriptions: the subscribe buttons on search results and the
//! list of subscribed stores.
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

use crate::api::{self, PageSource};
use crate::cards;
use crate::config::Config;
use crate::dom::{Action, Container};
use crate::model::{Store, SubscriptionOutcome};
use crate::pipeline::{lock, SearchPipeline};
use crate::toast::{ToastKind, Toaster};

pub const SUBSCRIBED_CONTAINER_ID: &str = "subscribedStoresContainer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEndpoints {
    pub subscribe: String,
    pub unsubscribe: String,
}

impl SubscriptionEndpoints {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            subscribe: cfg.subscriptions.subscribe_endpoint.clone(),
            unsubscribe: cfg.subscriptions.unsubscribe_endpoint.clone(),
        }
    }
}

pub struct SubscriptionManager {
    source: Arc<dyn PageSource>,
    toaster: Arc<dyn Toaster>,
    endpoints: SubscriptionEndpoints,
    subscribed: Mutex<Container>,
}

/// Hides the button and shows the card spinner while a request runs.
fn set_busy(results: Option<&SearchPipeline>, store_id: i64, busy: bool) {
    let Some(results) = results else { return };
    results.with_container_mut(|c| {
        if let Some(button) = c.find_by_id_mut(&cards::subscribe_button_id(store_id)) {
            button.set_hidden(busy);
        }
        if let Some(loader) = c.find_by_id_mut(&cards::store_loader_id(store_id)) {
            loader.set_hidden(!busy);
        }
    });
}

fn set_button(results: Option<&SearchPipeline>, store_id: i64, subscribed: bool) {
    let Some(results) = results else { return };
    results.with_container_mut(|c| {
        if let Some(button) = c.find_by_id_mut(&cards::subscribe_button_id(store_id)) {
            cards::set_subscribe_button(button, store_id, subscribed);
        }
    });
}

impl SubscriptionManager {
    pub fn new(
        source: Arc<dyn PageSource>,
        toaster: Arc<dyn Toaster>,
        endpoints: SubscriptionEndpoints,
        existing: &[Store],
    ) -> Self {
        let mut subscribed = Container::new(SUBSCRIBED_CONTAINER_ID);
        for store in existing {
            subscribed.append(cards::subscribed_store_card(store.id, &store.name, &store.image_url));
        }
        Self {
            source,
            toaster,
            endpoints,
            subscribed: Mutex::new(subscribed),
        }
    }

    pub fn with_subscribed<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        f(&lock(&self.subscribed))
    }

    pub fn is_listed(&self, store_id: i64) -> bool {
        lock(&self.subscribed)
            .find_by_id(&cards::subscribed_card_id(store_id))
            .is_some()
    }

    /// Dispatches a click on a subscription-related element.
    pub async fn handle(&self, results: Option<&SearchPipeline>, action: Action) -> Option<SubscriptionOutcome> {
        match action {
            Action::Subscribe(id) => Some(self.subscribe(results, id).await),
            Action::Unsubscribe(id) => Some(self.unsubscribe(results, id).await),
            Action::OpenMenu(id) => {
                self.open_menu(id);
                None
            }
            Action::CloseMenu => {
                self.close_all_menus();
                None
            }
            _ => None,
        }
    }

    #[instrument(skip(self, results))]
    pub async fn subscribe(&self, results: Option<&SearchPipeline>, store_id: i64) -> SubscriptionOutcome {
        set_busy(results, store_id, true);
        let reply = api::post_subscription(self.source.as_ref(), &self.endpoints.subscribe, store_id).await;
        set_busy(results, store_id, false);

        let outcome = match reply {
            Ok(resp) => match resp.error {
                Some(error) => SubscriptionOutcome::Rejected { store_id, error },
                None => SubscriptionOutcome::Subscribed {
                    store_id,
                    store_name: resp.store_name.unwrap_or_default(),
                    image_url: resp.image_url.unwrap_or_default(),
                    message: resp.message.unwrap_or_default(),
                },
            },
            Err(err) => SubscriptionOutcome::Failed { store_id, error: err.to_string() },
        };

        if let SubscriptionOutcome::Subscribed { store_name, image_url, .. } = &outcome {
            set_button(results, store_id, true);
            let mut list = lock(&self.subscribed);
            if list.find_by_id(&cards::subscribed_card_id(store_id)).is_none() {
                list.prepend(cards::subscribed_store_card(store_id, store_name, image_url));
            }
        }
        self.report(&outcome);
        outcome
    }

    #[instrument(skip(self, results))]
    pub async fn unsubscribe(&self, results: Option<&SearchPipeline>, store_id: i64) -> SubscriptionOutcome {
        set_busy(results, store_id, true);
        let reply = api::post_subscription(self.source.as_ref(), &self.endpoints.unsubscribe, store_id).await;
        set_busy(results, store_id, false);

        let outcome = match reply {
            Ok(resp) => match resp.error {
                Some(error) => SubscriptionOutcome::Rejected { store_id, error },
                None => SubscriptionOutcome::Unsubscribed {
                    store_id,
                    message: resp.message.unwrap_or_default(),
                },
            },
            Err(err) => SubscriptionOutcome::Failed { store_id, error: err.to_string() },
        };

        if let SubscriptionOutcome::Unsubscribed { .. } = &outcome {
            set_button(results, store_id, false);
            let mut list = lock(&self.subscribed);
            if let Some(key) = list.key_of_id(&cards::subscribed_card_id(store_id)) {
                list.remove(key);
            }
        }
        self.report(&outcome);
        outcome
    }

    fn report(&self, outcome: &SubscriptionOutcome) {
        match outcome {
            SubscriptionOutcome::Subscribed { store_id, message, .. }
            | SubscriptionOutcome::Unsubscribed { store_id, message } => {
                info!(store_id, "subscription updated");
                self.toaster.display(ToastKind::Success, message);
            }
            SubscriptionOutcome::Rejected { store_id, error } | SubscriptionOutcome::Failed { store_id, error } => {
                warn!(store_id, error = %error, "subscription change failed");
                self.toaster.display(ToastKind::Error, error);
            }
        }
    }

    /// Shows one store's action menu, closing every other one.
    pub fn open_menu(&self, store_id: i64) {
        self.close_all_menus();
        let mut list = lock(&self.subscribed);
        if let Some(menu) = list.find_by_id_mut(&cards::menu_id(store_id)) {
            menu.remove_class("fade-out");
            menu.add_class("pop-in");
            menu.set_hidden(false);
        }
    }

    pub fn close_all_menus(&self) {
        let mut list = lock(&self.subscribed);
        let keys: Vec<_> = list.iter().map(|(k, _)| k).collect();
        for key in keys {
            if let Some(menu) = list.get_mut(key).and_then(|card| card.find_by_class_mut("actions-container")) {
                menu.remove_class("pop-in");
                menu.set_hidden(true);
            }
        }
    }

    pub fn menu_open(&self, store_id: i64) -> bool {
        lock(&self.subscribed)
            .find_by_id(&cards::menu_id(store_id))
            .is_some_and(|m| !m.is_hidden())
    }
}
