use std::sync::{Arc, Mutex};
use tracing::{info, info_span, instrument, warn, Instrument};

use super::{lock, LoadOutcome, PipelineState, SkipReason};
use crate::api::{self, PageSource};
use crate::cards;
use crate::config::{Config, ConfigError, Messages};
use crate::details::{self, PayloadError, ProductDetails};
use crate::dom::{Container, Element, NodeKey};
use crate::fetcher::{LoadingIndicator, PageFetcher};
use crate::model::{ItemKind, PageCursor};
use crate::observer::{IntersectionEntry, ObserverOptions, Rect, SentinelObserver};
use crate::toast::{ToastKind, Toaster};

pub const SALES_CONTAINER_ID: &str = "sales-container";
pub const SALES_LOADER_ID: &str = "newSalesLoader";
pub const FINAL_MESSAGE_ID: &str = "finalMessage";
pub const PAGINATION_CLASS: &str = "pagination-logic";
pub const PAGINATION_ACTIVE_CLASS: &str = "pagination-logic-active";

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub slug: String,
    /// First page requested when the container carries no pagination attributes.
    pub start_page: u32,
    pub observer: ObserverOptions,
    /// Wider viewports page through server-rendered links instead.
    pub infinite_scroll_max_width: u32,
}

impl FeedSettings {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            slug: cfg.feed.slug.clone(),
            start_page: cfg.feed.start_page,
            observer: cfg.feed.observer_options()?,
            infinite_scroll_max_width: cfg.feed.infinite_scroll_max_width,
        })
    }
}

#[derive(Debug)]
struct FeedView {
    container: Container,
    observer: SentinelObserver,
    final_message: Element,
    pagination: Element,
    infinite_scroll: bool,
}

impl FeedView {
    fn show_final_message(&mut self, text: &str) {
        self.final_message.clear_children();
        self.final_message.push_child(cards::final_message(text));
        self.final_message.set_hidden(false);
        self.pagination.remove_class(PAGINATION_ACTIVE_CLASS);
        self.pagination.set_hidden(true);
    }
}

/// Infinite scroll over the deals feed.
pub struct FeedPipeline {
    source: Arc<dyn PageSource>,
    toaster: Arc<dyn Toaster>,
    settings: FeedSettings,
    messages: Messages,
    fetcher: PageFetcher,
    view: Mutex<FeedView>,
}

impl FeedPipeline {
    pub fn new(
        source: Arc<dyn PageSource>,
        toaster: Arc<dyn Toaster>,
        settings: FeedSettings,
        messages: Messages,
    ) -> Self {
        let container = Container::new(SALES_CONTAINER_ID);
        Self::from_container(source, toaster, settings, messages, container)
    }

    /// Adopts an already rendered container. Its `data-currentPage` /
    /// `data-hasNextPage` attributes win over `settings.start_page`.
    pub fn from_container(
        source: Arc<dyn PageSource>,
        toaster: Arc<dyn Toaster>,
        settings: FeedSettings,
        messages: Messages,
        mut container: Container,
    ) -> Self {
        if PageCursor::from_attrs(&container).is_none() {
            PageCursor::new(settings.start_page.saturating_sub(1)).write_attrs(&mut container);
        }
        let view = FeedView {
            container,
            observer: SentinelObserver::new(settings.observer),
            final_message: Element::new("div").with_id(FINAL_MESSAGE_ID).hidden(),
            pagination: Element::new("div").with_class(PAGINATION_CLASS),
            infinite_scroll: false,
        };
        Self {
            source,
            toaster,
            settings,
            messages,
            fetcher: PageFetcher::new(LoadingIndicator::new(SALES_LOADER_ID)),
            view: Mutex::new(view),
        }
    }

    /// Picks infinite scroll or classic pagination for the viewport width
    /// and arms the sentinel in the former case.
    pub fn start(&self, viewport_width: u32) -> Option<NodeKey> {
        let mut view = lock(&self.view);
        if viewport_width <= self.settings.infinite_scroll_max_width {
            view.infinite_scroll = true;
            view.pagination.remove_class(PAGINATION_ACTIVE_CLASS);
            let FeedView { container, observer, .. } = &mut *view;
            observer.disarm();
            observer.arm(Some(container))
        } else {
            view.infinite_scroll = false;
            view.pagination.add_class(PAGINATION_ACTIVE_CLASS);
            view.observer.disarm();
            None
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.fetcher.is_loading() {
            return PipelineState::Loading;
        }
        match self.cursor() {
            Some(c) if !c.has_next_page => PipelineState::Exhausted,
            _ => PipelineState::Idle,
        }
    }

    pub fn cursor(&self) -> Option<PageCursor> {
        PageCursor::from_attrs(&lock(&self.view).container)
    }

    pub fn sentinel(&self) -> Option<NodeKey> {
        lock(&self.view).observer.target()
    }

    pub fn is_loading(&self) -> bool {
        self.fetcher.is_loading()
    }

    pub fn loader_visible(&self) -> bool {
        self.fetcher.indicator().is_visible()
    }

    pub fn final_message_visible(&self) -> bool {
        !lock(&self.view).final_message.is_hidden()
    }

    pub fn pagination_active(&self) -> bool {
        let view = lock(&self.view);
        !view.pagination.is_hidden() && view.pagination.has_class(PAGINATION_ACTIVE_CLASS)
    }

    pub fn with_container<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        f(&lock(&self.view).container)
    }

    /// Entry for the current sentinel, if one is armed.
    pub fn measure(&self, target_rect: Rect, viewport: Rect) -> Option<IntersectionEntry> {
        let view = lock(&self.view);
        let target = view.observer.target()?;
        Some(view.observer.measure(target, target_rect, viewport))
    }

    #[instrument(skip_all, fields(slug = %self.settings.slug))]
    pub async fn on_intersection(&self, entry: IntersectionEntry) -> LoadOutcome {
        // A busy gate leaves the sentinel armed for the next crossing.
        if self.fetcher.is_loading() {
            return LoadOutcome::Skipped(SkipReason::Loading);
        }
        let fired = lock(&self.view).observer.notify(entry);
        if !fired {
            return LoadOutcome::Skipped(SkipReason::NotTriggered);
        }
        self.load_more_and_rearm().await
    }

    /// Loads the next page and, once rendered, watches the new last card.
    pub async fn load_more_and_rearm(&self) -> LoadOutcome {
        let outcome = self.load_more().await;
        if let LoadOutcome::Rendered { items, .. } = outcome {
            if items > 0 {
                // Let the appended cards settle before observing the tail.
                tokio::task::yield_now().await;
                self.rearm();
            }
        }
        outcome
    }

    fn rearm(&self) -> Option<NodeKey> {
        let mut view = lock(&self.view);
        if !view.infinite_scroll {
            return None;
        }
        let FeedView { container, observer, .. } = &mut *view;
        observer.disarm();
        observer.arm(Some(container))
    }

    /// One round trip for the next page. Does not touch the sentinel.
    pub async fn load_more(&self) -> LoadOutcome {
        // The cursor is read only while holding the gate.
        let Some(in_flight) = self.fetcher.begin() else {
            return LoadOutcome::Skipped(SkipReason::Loading);
        };
        let cursor = PageCursor::from_attrs(&lock(&self.view).container);
        let Some(cursor) = cursor else {
            warn!(container = SALES_CONTAINER_ID, "feed container has no pagination attributes");
            return LoadOutcome::Skipped(SkipReason::MissingCursor);
        };
        if !cursor.has_next_page {
            return LoadOutcome::Skipped(SkipReason::Exhausted);
        }

        let page = cursor.next_page();
        let span = info_span!("feed_page", page, request_id = %in_flight.request_id());
        let result = api::fetch_deals(self.source.as_ref(), &self.settings.slug, page)
            .instrument(span)
            .await;

        match result {
            Ok(batch) => {
                let mut view = lock(&self.view);
                for deal in &batch.items {
                    view.container.append(cards::deal_card(deal));
                }
                let mut cursor = cursor;
                cursor.advance(batch.has_next_page);
                cursor.write_attrs(&mut view.container);
                if !batch.has_next_page {
                    view.show_final_message(&self.messages.no_more_sales);
                }
                info!(
                    kind = ItemKind::Deal.as_str(),
                    page,
                    items = batch.items.len(),
                    has_next_page = batch.has_next_page,
                    "page rendered"
                );
                LoadOutcome::Rendered {
                    page,
                    items: batch.items.len(),
                    exhausted: !batch.has_next_page,
                }
            }
            Err(err) => {
                warn!(?err, page, "feed page failed");
                self.toaster.display(ToastKind::Error, &self.messages.fetch_failed);
                LoadOutcome::Failed(err)
            }
        }
    }

    /// Reads the payload embedded in a deal card for the detail view.
    /// Failures are reported through an error toast.
    pub fn details(&self, card: NodeKey) -> Result<ProductDetails, PayloadError> {
        let parsed = {
            let view = lock(&self.view);
            match view.container.get(card) {
                Some(el) => details::read_payload(el).and_then(|v| ProductDetails::from_payload(&v)),
                None => Err(PayloadError::MissingCard),
            }
        };
        if let Err(err) = &parsed {
            warn!(?err, ?card, "cannot open sale details");
            let message = match err {
                PayloadError::Malformed(_) => &self.messages.payload_invalid,
                _ => &self.messages.payload_missing,
            };
            self.toaster.display(ToastKind::Error, message);
        }
        parsed
    }

    pub fn to_html(&self) -> String {
        let view = lock(&self.view);
        let mut out = view.container.to_html();
        out.push_str(&self.fetcher.indicator().element().to_html());
        out.push_str(&view.final_message.to_html());
        out.push_str(&view.pagination.to_html());
        out
    }
}
