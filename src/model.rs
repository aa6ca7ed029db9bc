use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::dom::Container;

pub const ATTR_CURRENT_PAGE: &str = "data-currentPage";
pub const ATTR_HAS_NEXT_PAGE: &str = "data-hasNextPage";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemKind {
    Deal,
    Store,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Deal => "deal",
            ItemKind::Store => "store",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreRef {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HighlightedProduct {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub product_image_url: Option<String>,
    #[serde(default)]
    pub old_price: Option<Value>,
    #[serde(default)]
    pub new_price: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub title: String,
    #[serde(default)]
    pub grabber: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub main_link: Option<String>,
    pub store: StoreRef,
    #[serde(default)]
    pub parsed_date_received: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_received: Option<DateTime<FixedOffset>>,
    /// Detail payload, either an embedded JSON string or an object.
    #[serde(default)]
    pub deal_json: Option<Value>,
    #[serde(default)]
    pub personal: bool,
    #[serde(default)]
    pub is_new_deal_better: bool,
    #[serde(default)]
    pub deal_probability: Option<Value>,
    #[serde(default, rename = "noDisplay")]
    pub no_display: Option<String>,
}

impl Deal {
    /// JSON carried inline on the rendered card for the detail view.
    pub fn payload(&self) -> Value {
        match &self.deal_json {
            Some(Value::String(raw)) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            Some(other) => other.clone(),
            None => {
                let mut own = self.clone();
                own.deal_json = None;
                serde_json::to_value(own).unwrap_or(Value::Null)
            }
        }
    }

    /// Date shown on the card: the server-formatted text, or the raw timestamp.
    pub fn display_date(&self) -> String {
        if !self.parsed_date_received.trim().is_empty() {
            return self.parsed_date_received.clone();
        }
        self.date_received
            .map(|d| d.format("%d-%m-%Y %H:%M").to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub is_subscribed: bool,
}

/// One page worth of records.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemBatch<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    /// Only reported by search endpoints.
    pub total_found: Option<u64>,
}

/// Pagination position for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub current_page: u32,
    pub has_next_page: bool,
}

impl PageCursor {
    pub fn new(current_page: u32) -> Self {
        Self {
            current_page,
            has_next_page: true,
        }
    }

    pub fn next_page(&self) -> u32 {
        self.current_page + 1
    }

    pub fn advance(&mut self, has_next_page: bool) {
        self.current_page += 1;
        self.has_next_page = has_next_page;
    }

    /// Reads the cursor persisted on a feed container.
    pub fn from_attrs(container: &Container) -> Option<Self> {
        let current_page = container.attr(ATTR_CURRENT_PAGE)?.trim().parse().ok()?;
        let has_next_page = container.attr(ATTR_HAS_NEXT_PAGE)? == "True";
        Some(Self {
            current_page,
            has_next_page,
        })
    }

    pub fn write_attrs(&self, container: &mut Container) {
        container.set_attr(ATTR_CURRENT_PAGE, self.current_page.to_string());
        container.set_attr(
            ATTR_HAS_NEXT_PAGE,
            if self.has_next_page { "True" } else { "False" },
        );
    }
}

/// Outcome of a subscribe or unsubscribe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    Subscribed {
        store_id: i64,
        store_name: String,
        image_url: String,
        message: String,
    },
    Unsubscribed {
        store_id: i64,
        message: String,
    },
    Rejected {
        store_id: i64,
        error: String,
    },
    Failed {
        store_id: i64,
        error: String,
    },
}

fn lenient_datetime<'de, D>(de: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deal_tolerates_missing_optional_fields() {
        let deal: Deal = serde_json::from_value(json!({
            "title": "Zomer sale",
            "store": {"name": "Nike"}
        }))
        .unwrap();
        assert_eq!(deal.grabber, "");
        assert!(!deal.personal);
        assert!(deal.date_received.is_none());
    }

    #[test]
    fn payload_unwraps_embedded_json_string() {
        let deal: Deal = serde_json::from_value(json!({
            "title": "t",
            "store": {"name": "s"},
            "deal_json": "{\"title\": \"t\", \"main_link\": \"/deals/visit/1/2/\"}"
        }))
        .unwrap();
        assert_eq!(deal.payload()["main_link"], "/deals/visit/1/2/");
    }

    #[test]
    fn payload_falls_back_to_deal_fields() {
        let deal = Deal {
            title: "Sale".into(),
            store: StoreRef { name: "Zara".into(), image_url: None },
            ..Default::default()
        };
        let payload = deal.payload();
        assert_eq!(payload["title"], "Sale");
        assert_eq!(payload["store"]["name"], "Zara");
    }

    #[test]
    fn display_date_prefers_server_text() {
        let deal: Deal = serde_json::from_value(json!({
            "title": "t",
            "store": {"name": "s"},
            "date_received": "2024-05-01T10:30:00+00:00"
        }))
        .unwrap();
        assert_eq!(deal.display_date(), "01-05-2024 10:30");

        let deal = Deal { parsed_date_received: "2 uur geleden".into(), ..deal };
        assert_eq!(deal.display_date(), "2 uur geleden");
    }

    #[test]
    fn cursor_round_trips_through_container_attrs() {
        let mut c = Container::new("sales-container");
        c.set_attr(ATTR_CURRENT_PAGE, "1");
        c.set_attr(ATTR_HAS_NEXT_PAGE, "True");
        let mut cursor = PageCursor::from_attrs(&c).unwrap();
        assert_eq!(cursor, PageCursor { current_page: 1, has_next_page: true });

        cursor.advance(false);
        cursor.write_attrs(&mut c);
        assert_eq!(c.attr(ATTR_CURRENT_PAGE), Some("2"));
        assert_eq!(c.attr(ATTR_HAS_NEXT_PAGE), Some("False"));
    }

    #[test]
    fn cursor_missing_attrs_is_none() {
        let c = Container::new("sales-container");
        assert!(PageCursor::from_attrs(&c).is_none());
    }
}
