//! Admin store list: the edit-store modal and its save and delete requests.
//!
//! Each manager card carries the store as `data-store-*` attributes; the
//! modal is filled from those, never from a second request.
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{self, model::StoreChangeResp, FetchError, PageSource};
use crate::config::Config;
use crate::dom::{Action, Container, Element};
use crate::fetcher::{LoadingIndicator, PageFetcher};
use crate::pipeline::lock;
use crate::toast::{ToastKind, Toaster};

pub const STORES_CONTAINER_ID: &str = "storesManagerList";
pub const MODAL_ID: &str = "editStoreModal";
pub const EMAIL_INPUT_NAME: &str = "edit_email_addresses";
pub const EMAIL_WRAPPER_CLASS: &str = "modal-email-input-wrapper";
pub const EDIT_LABEL: &str = "Bewerken";
pub const DELETE_LABEL: &str = "Verwijderen";
pub const ADD_EMAIL_LABEL: &str = "E-mail toevoegen";
pub const DELETE_CONFIRMATION: &str =
    "Weet je zeker dat je deze winkel wilt verwijderen? Dit kan niet ongedaan gemaakt worden.";
pub const SAVED_FALLBACK: &str = "Store updated successfully!";
pub const SAVE_FAILED_FALLBACK: &str = "Failed to update store.";
pub const DELETED_FALLBACK: &str = "Winkel succesvol verwijderd!";
pub const DELETE_FAILED_FALLBACK: &str = "Verwijderen mislukt.";

pub fn manager_card_id(store_id: i64) -> String {
    format!("manager-store-{store_id}")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("store {0} is not listed")]
    NotListed(i64),
    #[error("store card has no data-store-id")]
    MissingId,
    #[error("invalid store id '{0}'")]
    InvalidId(String),
}

/// A store as the manager page lists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    pub id: i64,
    pub name: String,
    pub home_url: String,
    pub sale_url: Option<String>,
    pub image_url: String,
    pub emails: Vec<String>,
}

/// Templates print a missing sale URL as `None`.
fn sale_url_attr(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|url| !url.is_empty() && *url != "None")
        .map(str::to_string)
}

fn split_emails(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|email| email.trim().to_string()).collect()
}

impl StoreRecord {
    pub fn from_card(card: &Element) -> Result<Self, CardError> {
        let raw_id = card.attr("data-store-id").ok_or(CardError::MissingId)?;
        let id = raw_id
            .trim()
            .parse()
            .map_err(|_| CardError::InvalidId(raw_id.to_string()))?;
        let text = |name: &str| card.attr(name).unwrap_or_default().to_string();
        Ok(Self {
            id,
            name: text("data-store-name"),
            home_url: text("data-store-home-url"),
            sale_url: sale_url_attr(card.attr("data-store-sale-url")),
            image_url: text("data-store-image-url"),
            emails: split_emails(card.attr("data-store-emails").unwrap_or_default()),
        })
    }

    pub fn card(&self) -> Element {
        Element::new("div")
            .with_id(manager_card_id(self.id))
            .with_class("store-card")
            .with_attr("data-store-id", self.id.to_string())
            .with_attr("data-store-name", self.name.as_str())
            .with_attr("data-store-home-url", self.home_url.as_str())
            .with_attr("data-store-sale-url", self.sale_url.as_deref().unwrap_or("None"))
            .with_attr("data-store-image-url", self.image_url.as_str())
            .with_attr("data-store-emails", self.emails.join(","))
            .with_child(
                Element::new("img")
                    .with_class("store-logo")
                    .with_attr("src", self.image_url.as_str())
                    .with_attr("alt", self.name.as_str()),
            )
            .with_child(Element::new("h3").with_class("store-name").with_text(self.name.as_str()))
            .with_child(
                Element::new("button")
                    .with_class("edit-store-btn")
                    .with_text(EDIT_LABEL)
                    .on_click(Action::EditStore(self.id)),
            )
    }
}

/// Contents of the edit form while the modal is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub store_id: i64,
    pub name: String,
    pub home_url: String,
    pub sale_url: String,
    pub image_url: String,
    email_inputs: Vec<String>,
}

impl EditForm {
    pub fn from_record(record: &StoreRecord) -> Self {
        let mut email_inputs = record.emails.clone();
        if email_inputs.is_empty() {
            email_inputs.push(String::new());
        }
        Self {
            store_id: record.id,
            name: record.name.clone(),
            home_url: record.home_url.clone(),
            sale_url: record.sale_url.clone().unwrap_or_default(),
            image_url: record.image_url.clone(),
            email_inputs,
        }
    }

    pub fn email_inputs(&self) -> &[String] {
        &self.email_inputs
    }

    pub fn add_email_input(&mut self) {
        self.email_inputs.push(String::new());
    }

    /// Returns false when there is no input at `index`.
    pub fn set_email(&mut self, index: usize, value: impl Into<String>) -> bool {
        match self.email_inputs.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// Trimmed, non-empty addresses, comma separated.
    pub fn email_addresses(&self) -> String {
        self.email_inputs
            .iter()
            .map(|email| email.trim())
            .filter(|email| !email.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Fields posted to the edit view.
    pub fn fields(&self) -> Vec<(String, String)> {
        vec![
            ("store_id".into(), self.store_id.to_string()),
            ("name".into(), self.name.clone()),
            ("home_url".into(), self.home_url.clone()),
            ("sale_url".into(), self.sale_url.clone()),
            ("email_addresses".into(), self.email_addresses()),
        ]
    }

    /// The store as it will look once the server accepts the form.
    pub fn record(&self) -> StoreRecord {
        StoreRecord {
            id: self.store_id,
            name: self.name.clone(),
            home_url: self.home_url.clone(),
            sale_url: sale_url_attr(Some(&self.sale_url)),
            image_url: self.image_url.clone(),
            emails: split_emails(&self.email_addresses()),
        }
    }
}

fn text_input(id: &str, name: &str, value: &str) -> Element {
    Element::new("input")
        .with_id(id)
        .with_attr("type", "text")
        .with_attr("name", name)
        .with_attr("value", value)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditStoreModal {
    form: Option<EditForm>,
}

impl EditStoreModal {
    pub fn is_active(&self) -> bool {
        self.form.is_some()
    }

    pub fn form(&self) -> Option<&EditForm> {
        self.form.as_ref()
    }

    pub fn element(&self) -> Element {
        let mut modal = Element::new("div").with_id(MODAL_ID).with_class("modal");
        let Some(form) = &self.form else { return modal };
        modal.add_class("active");

        let mut emails = Element::new("div").with_id("edit-email-inputs-container");
        for email in &form.email_inputs {
            emails.push_child(
                Element::new("div").with_class(EMAIL_WRAPPER_CLASS).with_child(
                    Element::new("input")
                        .with_attr("type", "email")
                        .with_attr("name", EMAIL_INPUT_NAME)
                        .with_attr("value", email.as_str()),
                ),
            );
        }
        emails.push_child(
            Element::new("button")
                .with_id("add-edit-email-btn")
                .with_text(ADD_EMAIL_LABEL)
                .on_click(Action::AddEmailInput),
        );

        modal.push_child(
            Element::new("form")
                .with_id("editStoreForm")
                .with_child(
                    Element::new("input")
                        .with_id("edit_store_id")
                        .with_attr("type", "hidden")
                        .with_attr("name", "store_id")
                        .with_attr("value", form.store_id.to_string()),
                )
                .with_child(text_input("edit_name", "name", &form.name))
                .with_child(text_input("edit_home_url", "home_url", &form.home_url))
                .with_child(text_input("edit_sale_url", "sale_url", &form.sale_url))
                .with_child(emails)
                .with_child(
                    Element::new("button")
                        .with_id("deleteStoreBtn")
                        .with_text(DELETE_LABEL)
                        .on_click(Action::DeleteStore),
                )
                .with_child(
                    Element::new("button")
                        .with_id("closeModalBtn")
                        .with_text("×")
                        .on_click(Action::CloseStoreModal),
                ),
        );
        modal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChangeOutcome {
    Saved { store_id: i64, message: String },
    Deleted { store_id: i64, message: String },
    Rejected { store_id: i64, error: String },
    Failed { store_id: i64, error: String },
}

/// Manager page state: the card list and the edit modal.
pub struct StoreManager {
    source: Arc<dyn PageSource>,
    toaster: Arc<dyn Toaster>,
    base_path: String,
    fetcher: PageFetcher,
    stores: Mutex<Container>,
    modal: Mutex<EditStoreModal>,
}

impl StoreManager {
    pub fn new(
        source: Arc<dyn PageSource>,
        toaster: Arc<dyn Toaster>,
        base_path: impl Into<String>,
        stores: &[StoreRecord],
    ) -> Self {
        let mut list = Container::new(STORES_CONTAINER_ID);
        for store in stores {
            list.append(store.card());
        }
        Self {
            source,
            toaster,
            base_path: base_path.into(),
            fetcher: PageFetcher::new(LoadingIndicator::new("storeManagerLoader")),
            stores: Mutex::new(list),
            modal: Mutex::new(EditStoreModal::default()),
        }
    }

    pub fn from_config(
        source: Arc<dyn PageSource>,
        toaster: Arc<dyn Toaster>,
        cfg: &Config,
        stores: &[StoreRecord],
    ) -> Self {
        Self::new(source, toaster, cfg.store_manager.base_path.clone(), stores)
    }

    pub fn with_stores<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        f(&lock(&self.stores))
    }

    pub fn modal(&self) -> EditStoreModal {
        lock(&self.modal).clone()
    }

    pub fn is_busy(&self) -> bool {
        self.fetcher.is_loading()
    }

    /// Edits the open form; returns None when the modal is closed.
    pub fn edit_form<R>(&self, f: impl FnOnce(&mut EditForm) -> R) -> Option<R> {
        lock(&self.modal).form.as_mut().map(f)
    }

    /// Dispatches a click inside the manager page. `confirm` answers the
    /// delete prompt and is only asked for [`Action::DeleteStore`].
    pub async fn handle(&self, action: Action, confirm: impl FnOnce(&str) -> bool) -> Option<StoreChangeOutcome> {
        match action {
            Action::EditStore(id) => {
                if let Err(err) = self.open(id) {
                    warn!(store_id = id, error = %err, "cannot open store editor");
                }
                None
            }
            Action::AddEmailInput => {
                self.edit_form(EditForm::add_email_input);
                None
            }
            Action::CloseStoreModal => {
                self.close();
                None
            }
            Action::DeleteStore => self.delete(confirm).await,
            _ => None,
        }
    }

    /// Fills the modal from the store's card and shows it.
    pub fn open(&self, store_id: i64) -> Result<(), CardError> {
        let record = {
            let list = lock(&self.stores);
            let card = list
                .find_by_id(&manager_card_id(store_id))
                .ok_or(CardError::NotListed(store_id))?;
            StoreRecord::from_card(card)?
        };
        lock(&self.modal).form = Some(EditForm::from_record(&record));
        Ok(())
    }

    pub fn close(&self) {
        lock(&self.modal).form = None;
    }

    /// Submits the open form. None when the modal is closed or a request runs.
    #[instrument(skip_all)]
    pub async fn save(&self) -> Option<StoreChangeOutcome> {
        let in_flight = self.fetcher.begin()?;
        let form = lock(&self.modal).form.clone()?;
        let store_id = form.store_id;
        info!(store_id, request_id = %in_flight.request_id(), "saving store");

        let reply = api::edit_store(self.source.as_ref(), &self.base_path, store_id, &form.fields()).await;
        drop(in_flight);
        let outcome = settle(store_id, reply, SAVED_FALLBACK, SAVE_FAILED_FALLBACK, |store_id, message| {
            StoreChangeOutcome::Saved { store_id, message }
        });

        if let StoreChangeOutcome::Saved { .. } = &outcome {
            let mut list = lock(&self.stores);
            if let Some(key) = list.key_of_id(&manager_card_id(store_id)) {
                if let Some(card) = list.get_mut(key) {
                    *card = form.record().card();
                }
            }
            self.close();
        }
        self.report(&outcome);
        Some(outcome)
    }

    /// Deletes the store shown in the modal once `confirm` agrees.
    #[instrument(skip_all)]
    pub async fn delete(&self, confirm: impl FnOnce(&str) -> bool) -> Option<StoreChangeOutcome> {
        let store_id = lock(&self.modal).form.as_ref()?.store_id;
        if !confirm(DELETE_CONFIRMATION) {
            info!(store_id, "delete cancelled");
            return None;
        }
        let in_flight = self.fetcher.begin()?;
        info!(store_id, request_id = %in_flight.request_id(), "deleting store");

        let reply = api::delete_store(self.source.as_ref(), &self.base_path, store_id).await;
        drop(in_flight);
        let outcome = settle(store_id, reply, DELETED_FALLBACK, DELETE_FAILED_FALLBACK, |store_id, message| {
            StoreChangeOutcome::Deleted { store_id, message }
        });

        if let StoreChangeOutcome::Deleted { .. } = &outcome {
            let mut list = lock(&self.stores);
            if let Some(key) = list.key_of_id(&manager_card_id(store_id)) {
                list.remove(key);
            }
            self.close();
        }
        self.report(&outcome);
        Some(outcome)
    }

    fn report(&self, outcome: &StoreChangeOutcome) {
        match outcome {
            StoreChangeOutcome::Saved { store_id, message } | StoreChangeOutcome::Deleted { store_id, message } => {
                info!(store_id, "store updated");
                self.toaster.display(ToastKind::Success, message);
            }
            StoreChangeOutcome::Rejected { store_id, error } | StoreChangeOutcome::Failed { store_id, error } => {
                warn!(store_id, error = %error, "store change failed");
                self.toaster.display(ToastKind::Error, error);
            }
        }
    }
}

fn settle(
    store_id: i64,
    reply: Result<StoreChangeResp, FetchError>,
    success_fallback: &str,
    failure_fallback: &str,
    accepted: impl FnOnce(i64, String) -> StoreChangeOutcome,
) -> StoreChangeOutcome {
    match reply {
        Ok(resp) if resp.success => {
            accepted(store_id, resp.message.unwrap_or_else(|| success_fallback.to_string()))
        }
        Ok(resp) => StoreChangeOutcome::Rejected {
            store_id,
            error: resp.error.unwrap_or_else(|| failure_fallback.to_string()),
        },
        Err(err) => StoreChangeOutcome::Failed {
            store_id,
            error: err.to_string(),
        },
    }
}
