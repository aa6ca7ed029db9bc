//! Product detail view: payload parsing, presentation and swipe-to-dismiss.
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::dom::Element;
use crate::model::{HighlightedProduct, StoreRef};

pub const STORE_PLACEHOLDER_LOGO: &str = "https://placehold.co/50x50/F5F5F7/86868B?text=Store";
pub const PRODUCT_PLACEHOLDER_IMAGE: &str = "https://placehold.co/100x100/F5F5F7/86868B?text=Product";
pub const NO_PRODUCTS_MESSAGE: &str = "Geen uitgelichte producten gevonden.";
/// Widest viewport that gets the slide-up overlay instead of the modal.
pub const OVERLAY_MAX_WIDTH: u32 = 767;
/// Pixels a downward drag must exceed to dismiss the overlay.
pub const SWIPE_DISMISS_THRESHOLD: f64 = 10.0;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("card not found")]
    MissingCard,
    #[error("no JSON data found for this sale item")]
    Missing,
    #[error("invalid sale payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parses the JSON embedded in a deal card.
pub fn read_payload(card: &Element) -> Result<Value, PayloadError> {
    let script = card
        .find_by_class("sale-data")
        .filter(|s| s.attr("type") == Some("application/json"))
        .ok_or(PayloadError::Missing)?;
    let value: Value = serde_json::from_str(script.text_content().trim())?;
    // Some views embed the payload as an already-encoded JSON string.
    match value {
        Value::String(inner) => Ok(serde_json::from_str(&inner)?),
        other => Ok(other),
    }
}

#[derive(Deserialize, Debug, Default)]
struct GmailData {
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct DealPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    grabber: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    main_link: Option<String>,
    #[serde(default)]
    store: Option<StoreRef>,
    #[serde(default)]
    gmail_data: Option<GmailData>,
    #[serde(default)]
    highlighted_products: Option<Vec<HighlightedProduct>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightedView {
    pub name: String,
    pub image_url: String,
    pub alt: String,
    pub price: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetails {
    pub title: String,
    pub grabber: String,
    pub description: String,
    pub store_name: String,
    pub store_logo: String,
    pub store_logo_alt: String,
    pub main_link: Option<String>,
    pub highlighted: Vec<HighlightedView>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn truthy(v: &Option<Value>) -> bool {
    match v {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}

fn format_price(v: &Option<Value>) -> Option<String> {
    let amount = match v.as_ref()? {
        Value::String(s) if s == "N/A" => return None,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    Some(format!("€{amount:.2}"))
}

impl HighlightedView {
    fn from_product(p: &HighlightedProduct) -> Self {
        let name = non_empty(p.title.clone());
        // Prices show only when both are known; the new price wins.
        let price = if truthy(&p.old_price) && truthy(&p.new_price) {
            format_price(&p.new_price).or_else(|| format_price(&p.old_price))
        } else {
            None
        };
        Self {
            alt: format!("{} Image", name.as_deref().unwrap_or("Product")),
            name: name.unwrap_or_else(|| "Onbekend".into()),
            image_url: non_empty(p.product_image_url.clone())
                .unwrap_or_else(|| PRODUCT_PLACEHOLDER_IMAGE.into()),
            price,
        }
    }
}

impl ProductDetails {
    pub fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let p: DealPayload = serde_json::from_value(payload.clone())?;

        let store = p.store.or_else(|| {
            let domain = non_empty(p.gmail_data.and_then(|g| g.domain))?;
            let initial = domain.chars().next().map(|c| c.to_uppercase().to_string()).unwrap_or_default();
            Some(StoreRef {
                image_url: Some(format!("https://placehold.co/50x50/F5F5F7/86868B?text={initial}")),
                name: domain,
            })
        });
        let store_name = store.as_ref().map(|s| s.name.clone()).filter(|n| !n.is_empty());

        Ok(Self {
            title: non_empty(p.title).unwrap_or_else(|| "No Title".into()),
            grabber: non_empty(p.grabber).unwrap_or_else(|| "No Grabber".into()),
            description: non_empty(p.description).unwrap_or_else(|| "No Description".into()),
            store_logo: store
                .as_ref()
                .and_then(|s| non_empty(s.image_url.clone()))
                .unwrap_or_else(|| STORE_PLACEHOLDER_LOGO.into()),
            store_logo_alt: store_name
                .as_ref()
                .map(|n| format!("{n} Logo"))
                .unwrap_or_else(|| "Store Logo".into()),
            store_name: store_name.unwrap_or_else(|| "Unknown Store".into()),
            main_link: non_empty(p.main_link),
            highlighted: p
                .highlighted_products
                .unwrap_or_default()
                .iter()
                .map(HighlightedView::from_product)
                .collect(),
        })
    }

    /// Content of the highlighted-products slider.
    pub fn slider(&self) -> Element {
        let mut slider = Element::new("div").with_class("highlighted-products-slider");
        if self.highlighted.is_empty() {
            slider.push_child(Element::new("p").with_class("no-products-message").with_text(NO_PRODUCTS_MESSAGE));
            return slider;
        }
        for item in &self.highlighted {
            let mut el = Element::new("div")
                .with_class("highlighted-product-item")
                .with_child(
                    Element::new("img")
                        .with_attr("src", item.image_url.as_str())
                        .with_attr("alt", item.alt.as_str()),
                )
                .with_child(Element::new("p").with_class("product-item-name").with_text(item.name.as_str()));
            if let Some(price) = &item.price {
                el.push_child(Element::new("p").with_class("product-item-price").with_text(price.as_str()));
            }
            slider.push_child(el);
        }
        slider
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Slide-up panel on narrow screens; supports swipe-to-dismiss.
    Overlay,
    Modal,
}

impl Presentation {
    pub fn for_width(viewport_width: u32) -> Self {
        if viewport_width <= OVERLAY_MAX_WIDTH {
            Presentation::Overlay
        } else {
            Presentation::Modal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeEnd {
    Dismissed,
    SnappedBack,
    Ignored,
}

#[derive(Debug, Default, Clone, Copy)]
struct Swipe {
    start_y: f64,
    diff_y: f64,
    swiping_down: bool,
}

#[derive(Debug, Clone)]
struct Open {
    details: ProductDetails,
    presentation: Presentation,
    panel_offset: f64,
}

/// The overlay/modal pair. One deal is shown at a time.
#[derive(Debug, Clone, Default)]
pub struct DetailView {
    open: Option<Open>,
    swipe: Swipe,
}

impl DetailView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, details: ProductDetails, viewport_width: u32) -> Presentation {
        let presentation = Presentation::for_width(viewport_width);
        debug!(title = %details.title, ?presentation, "showing sale details");
        self.open = Some(Open {
            details,
            presentation,
            panel_offset: 0.0,
        });
        self.swipe = Swipe::default();
        presentation
    }

    pub fn hide(&mut self) {
        self.open = None;
        self.swipe = Swipe::default();
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Page scrolling is locked while either view is up.
    pub fn body_scroll_locked(&self) -> bool {
        self.is_open()
    }

    pub fn details(&self) -> Option<&ProductDetails> {
        self.open.as_ref().map(|o| &o.details)
    }

    pub fn presentation(&self) -> Option<Presentation> {
        self.open.as_ref().map(|o| o.presentation)
    }

    /// Vertical translation of the overlay panel in pixels.
    pub fn panel_offset(&self) -> f64 {
        self.open.as_ref().map(|o| o.panel_offset).unwrap_or(0.0)
    }

    /// Target of the "go to sale" action button.
    pub fn action_link(&self) -> Option<&str> {
        self.details()?.main_link.as_deref()
    }

    fn overlay(&mut self) -> Option<&mut Open> {
        self.open.as_mut().filter(|o| o.presentation == Presentation::Overlay)
    }

    pub fn touch_start(&mut self, y: f64) {
        if self.overlay().is_some() {
            self.swipe = Swipe { start_y: y, ..Swipe::default() };
        }
    }

    /// Returns `true` when the move is consumed (native scroll suppressed).
    pub fn touch_move(&mut self, y: f64, scroll_top: f64) -> bool {
        let start_y = self.swipe.start_y;
        let Some(open) = self.overlay() else {
            return false;
        };
        let diff = y - start_y;
        let at_top = scroll_top <= 0.0;
        let (consumed, swiping) = if at_top && diff > 0.0 {
            open.panel_offset = diff;
            (true, true)
        } else if at_top && diff < 0.0 {
            open.panel_offset = 0.0;
            (true, false)
        } else {
            (false, false)
        };
        self.swipe.diff_y = diff;
        self.swipe.swiping_down = swiping;
        consumed
    }

    pub fn touch_end(&mut self) -> SwipeEnd {
        let swipe = std::mem::take(&mut self.swipe);
        let Some(open) = self.overlay() else {
            return SwipeEnd::Ignored;
        };
        if swipe.swiping_down && swipe.diff_y > SWIPE_DISMISS_THRESHOLD {
            self.hide();
            SwipeEnd::Dismissed
        } else {
            open.panel_offset = 0.0;
            SwipeEnd::SnappedBack
        }
    }
}
