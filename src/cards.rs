//! Card builders, one per item kind.
use serde_json::Value;

use crate::config::Messages;
use crate::dom::{Action, Element};
use crate::model::{Deal, Store};

pub const VIEW_DETAILS_LABEL: &str = "Bekijk";
pub const NEW_BADGE_LABEL: &str = "NIEUW";
pub const SUBSCRIBE_LABEL: &str = "Abonneer";
pub const SUBSCRIBED_LABEL: &str = "Geabboneerd";
pub const UNSUBSCRIBE_LABEL: &str = "Afmelden";
pub const CLOSE_LABEL: &str = "Sluiten";
pub const SUGGEST_LABEL: &str = "Insturen";

/// Delay between the reveal animations of consecutive store cards.
pub const REVEAL_STAGGER_MS: usize = 50;

pub fn subscribe_button_id(store_id: i64) -> String {
    format!("subscribe-btn-{store_id}")
}

pub fn store_loader_id(store_id: i64) -> String {
    format!("newStoresLoader-{store_id}")
}

pub fn subscribed_card_id(store_id: i64) -> String {
    format!("subscribed-store-{store_id}")
}

pub fn menu_id(store_id: i64) -> String {
    format!("actions-container-{store_id}")
}

pub fn deal_card(deal: &Deal) -> Element {
    let mut grabber = Element::new("p").with_class("sale-grabber").with_text(deal.grabber.as_str());
    if deal.is_new_deal_better {
        grabber.push_child(Element::new("span").with_class("new-badge").with_text(NEW_BADGE_LABEL));
    }

    let payload = serde_json::to_string(&deal.payload()).unwrap_or_else(|_| "null".into());

    let mut card = Element::new("div")
        .with_class("sales-item")
        .with_child(Element::new("h3").with_class("sale-title").with_text(deal.title.as_str()))
        .with_child(grabber)
        .with_child(
            Element::new("p")
                .with_class("store-name")
                .with_class("accent-color")
                .with_text(deal.store.name.as_str()),
        )
        .with_child(
            Element::new("button")
                .with_class("primary-btn")
                .with_class("view-details-btn")
                .with_text(VIEW_DETAILS_LABEL)
                .on_click(Action::ViewDetails),
        )
        .with_child(Element::new("p").with_class("sale-date-received").with_text(deal.display_date()))
        .with_child(
            Element::new("script")
                .with_class("sale-data")
                .with_attr("type", "application/json")
                .with_text(payload),
        );

    if let (Some(probability), Some(variant)) = (&deal.deal_probability, &deal.no_display) {
        let label = match probability {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        card.push_child(
            Element::new("span")
                .with_class("probanility-badge")
                .with_class(variant)
                .with_text(label),
        );
    }

    if deal.personal {
        card.add_class("personal-sale");
    }
    card
}

/// Flips a subscribe button between its two states.
pub fn set_subscribe_button(button: &mut Element, store_id: i64, subscribed: bool) {
    if subscribed {
        button.remove_class("primary-btn");
        button.remove_class("subscribe-btn");
        button.add_class("action-btn");
        button.add_class("is-subscribed-btn");
        button.set_text(SUBSCRIBED_LABEL);
        button.set_action(Some(Action::Unsubscribe(store_id)));
    } else {
        button.remove_class("action-btn");
        button.remove_class("is-subscribed-btn");
        button.add_class("primary-btn");
        button.add_class("subscribe-btn");
        button.set_text(SUBSCRIBE_LABEL);
        button.set_action(Some(Action::Subscribe(store_id)));
    }
}

pub fn store_card(store: &Store, index: usize) -> Element {
    let mut button = Element::new("button").with_id(subscribe_button_id(store.id));
    set_subscribe_button(&mut button, store.id, store.is_subscribed);

    Element::new("div")
        .with_id(format!("store-card-{}", store.id))
        .with_class("store-card")
        .with_attr("data-reveal-delay-ms", (index * REVEAL_STAGGER_MS).to_string())
        .with_child(
            Element::new("img")
                .with_class("store-logo-img")
                .with_attr("src", store.image_url.as_str())
                .with_attr("alt", "Store Logo"),
        )
        .with_child(Element::new("h3").with_class("store-name").with_text(store.name.as_str()))
        .with_child(button)
        .with_child(
            Element::new("div")
                .with_id(store_loader_id(store.id))
                .with_class("loader-spinner")
                .with_attr("aria-label", "Loading...")
                .hidden(),
        )
}

pub fn no_stores_found(messages: &Messages) -> Element {
    Element::new("div")
        .with_class("no-store-found-container")
        .with_child(Element::new("h5").with_text(messages.no_stores_found.as_str()))
        .with_child(Element::new("p").with_text(messages.no_stores_found_hint.as_str()))
        .with_child(
            Element::new("button")
                .with_class("action-btn")
                .with_class("suggest-btn")
                .with_text(SUGGEST_LABEL)
                .on_click(Action::SuggestStore),
        )
}

pub fn subscribed_store_card(store_id: i64, name: &str, image_url: &str) -> Element {
    Element::new("div")
        .with_id(subscribed_card_id(store_id))
        .with_class("subscribed-store-card")
        .with_child(
            Element::new("img")
                .with_class("store-logo-img-small")
                .with_attr("src", image_url)
                .with_attr("alt", "Store Logo"),
        )
        .with_child(Element::new("span").with_class("subscribed-name").with_text(name))
        .with_child(
            Element::new("span")
                .with_id(format!("subscribed-menu-{store_id}"))
                .with_class("subscribed-menu")
                .with_text("⋮")
                .on_click(Action::OpenMenu(store_id)),
        )
        .with_child(
            Element::new("div")
                .with_id(menu_id(store_id))
                .with_class("actions-container")
                .hidden()
                .with_child(
                    Element::new("div")
                        .with_class("action-list")
                        .with_child(
                            Element::new("button")
                                .with_class("primary-btn")
                                .with_text(UNSUBSCRIBE_LABEL)
                                .on_click(Action::Unsubscribe(store_id)),
                        )
                        .with_child(
                            Element::new("button")
                                .with_class("action-btn")
                                .with_class("last-action-btn")
                                .with_text(CLOSE_LABEL)
                                .on_click(Action::CloseMenu),
                        ),
                ),
        )
}

pub fn final_message(text: &str) -> Element {
    Element::new("p").with_attr("style", "text-align: center;").with_text(text)
}
