use futures::future::{select, Either};
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use super::{lock, LoadOutcome, PipelineState, SkipReason};
use crate::api::{self, PageSource};
use crate::cards;
use crate::config::{Config, ConfigError, Messages};
use crate::dom::{Container, NodeKey};
use crate::fetcher::{LoadingIndicator, PageFetcher};
use crate::model::{ItemKind, PageCursor};
use crate::observer::{IntersectionEntry, ObserverOptions, Rect, SentinelObserver};
use crate::toast::{ToastKind, Toaster};

pub const SEARCH_RESULTS_ID: &str = "searchResults";
pub const STORES_LOADER_ID: &str = "newStoresLoader";

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub endpoint: String,
    pub debounce: Duration,
    pub observer: ObserverOptions,
}

impl SearchSettings {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: cfg.search.endpoint.clone(),
            debounce: cfg.search.debounce(),
            observer: cfg.search.observer_options()?,
        })
    }
}

#[derive(Debug)]
struct SearchView {
    container: Container,
    observer: SentinelObserver,
    cursor: PageCursor,
    query: String,
    /// Bumped on every query reset; responses from older generations are dropped.
    generation: u64,
}

/// Paginated store search driven by query input and scrolling.
pub struct SearchPipeline {
    source: Arc<dyn PageSource>,
    toaster: Arc<dyn Toaster>,
    settings: SearchSettings,
    messages: Messages,
    fetcher: PageFetcher,
    view: Mutex<SearchView>,
    generation: watch::Sender<u64>,
    input_seq: AtomicU64,
}

impl SearchPipeline {
    pub fn new(
        source: Arc<dyn PageSource>,
        toaster: Arc<dyn Toaster>,
        settings: SearchSettings,
        messages: Messages,
    ) -> Self {
        let view = SearchView {
            container: Container::new(SEARCH_RESULTS_ID),
            observer: SentinelObserver::new(settings.observer),
            cursor: PageCursor::new(0),
            query: String::new(),
            generation: 0,
        };
        let (generation, _) = watch::channel(0);
        Self {
            source,
            toaster,
            settings,
            messages,
            fetcher: PageFetcher::new(LoadingIndicator::new(STORES_LOADER_ID)),
            view: Mutex::new(view),
            generation,
            input_seq: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.fetcher.is_loading() {
            return PipelineState::Loading;
        }
        if lock(&self.view).cursor.has_next_page {
            PipelineState::Idle
        } else {
            PipelineState::Exhausted
        }
    }

    pub fn cursor(&self) -> PageCursor {
        lock(&self.view).cursor
    }

    pub fn query(&self) -> String {
        lock(&self.view).query.clone()
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

    pub fn with_container<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        f(&lock(&self.view).container)
    }

    /// Mutable access for per-card updates such as subscribe buttons.
    pub fn with_container_mut<R>(&self, f: impl FnOnce(&mut Container) -> R) -> R {
        f(&mut lock(&self.view).container)
    }

    pub fn measure(&self, target_rect: Rect, viewport: Rect) -> Option<IntersectionEntry> {
        let view = lock(&self.view);
        let target = view.observer.target()?;
        Some(view.observer.measure(target, target_rect, viewport))
    }

    /// Keystroke handler. Only the last input within the debounce window searches.
    pub async fn input(&self, raw: &str) -> LoadOutcome {
        let seq = self.input_seq.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.settings.debounce).await;
        if self.input_seq.load(Ordering::SeqCst) != seq {
            debug!(query = raw.trim(), "input superseded within debounce window");
            return LoadOutcome::Skipped(SkipReason::Superseded);
        }
        self.submit(raw).await
    }

    /// Search button handler: resets immediately and fetches page 1.
    #[instrument(skip_all)]
    pub async fn submit(&self, raw: &str) -> LoadOutcome {
        let query = raw.trim().to_string();
        let generation = self.reset(&query);
        if query.is_empty() {
            return LoadOutcome::Skipped(SkipReason::EmptyQuery);
        }
        // A request for the previous query may still hold the gate; it
        // observes the new generation and lets go.
        self.fetch_page(generation, true).await
    }

    fn reset(&self, query: &str) -> u64 {
        let generation = {
            let mut view = lock(&self.view);
            view.container.clear();
            view.cursor = PageCursor::new(0);
            view.observer.disarm();
            view.query = query.to_string();
            view.generation += 1;
            view.generation
        };
        self.generation.send_replace(generation);
        info!(query, generation, "search reset");
        generation
    }

    #[instrument(skip_all)]
    pub async fn on_intersection(&self, entry: IntersectionEntry) -> LoadOutcome {
        if self.fetcher.is_loading() {
            return LoadOutcome::Skipped(SkipReason::Loading);
        }
        let (fired, generation, query_empty) = {
            let mut view = lock(&self.view);
            let fired = view.observer.notify(entry);
            (fired, view.generation, view.query.is_empty())
        };
        if !fired {
            return LoadOutcome::Skipped(SkipReason::NotTriggered);
        }
        if query_empty {
            return LoadOutcome::Skipped(SkipReason::EmptyQuery);
        }
        self.fetch_page(generation, false).await
    }

    /// Next page of the current query, without waiting for the sentinel.
    pub async fn fetch_next(&self) -> LoadOutcome {
        let (generation, query_empty) = {
            let view = lock(&self.view);
            (view.generation, view.query.is_empty())
        };
        if query_empty {
            return LoadOutcome::Skipped(SkipReason::EmptyQuery);
        }
        self.fetch_page(generation, false).await
    }

    /// Fetches the page after the cursor. Query and page are read only
    /// once the gate is held.
    async fn fetch_page(&self, generation: u64, wait_for_gate: bool) -> LoadOutcome {
        let in_flight = if wait_for_gate {
            self.fetcher.begin_when_idle().await
        } else {
            self.fetcher.begin()
        };
        let Some(in_flight) = in_flight else {
            return LoadOutcome::Skipped(SkipReason::Loading);
        };

        let mut changes = self.generation.subscribe();
        let (query, page) = {
            let view = lock(&self.view);
            if view.generation != generation || *changes.borrow_and_update() != generation {
                return LoadOutcome::Skipped(SkipReason::Superseded);
            }
            if !view.cursor.has_next_page {
                return LoadOutcome::Skipped(SkipReason::Exhausted);
            }
            (view.query.clone(), view.cursor.next_page())
        };

        let span = info_span!("store_search", %query, page, request_id = %in_flight.request_id());
        let request = pin!(
            api::search_stores(self.source.as_ref(), &self.settings.endpoint, &query, page).instrument(span)
        );
        let superseded = pin!(changes.changed());
        let result = match select(request, superseded).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => {
                info!(%query, page, "query changed; dropping in-flight search");
                return LoadOutcome::Skipped(SkipReason::Superseded);
            }
        };

        let outcome = match result {
            Ok(batch) => {
                let mut view = lock(&self.view);
                if view.generation != generation {
                    return LoadOutcome::Skipped(SkipReason::Superseded);
                }
                view.cursor = PageCursor {
                    current_page: page,
                    has_next_page: batch.has_next_page,
                };
                // An empty later page only ends the results.
                let nothing_found =
                    batch.total_found == Some(0) || (batch.items.is_empty() && page == 1);
                if nothing_found {
                    view.container.clear();
                    view.container.append(cards::no_stores_found(&self.messages));
                    view.observer.disarm();
                    view.cursor.has_next_page = false;
                    info!(%query, "no stores found");
                    return LoadOutcome::Rendered {
                        page,
                        items: 0,
                        exhausted: true,
                    };
                }
                for (index, store) in batch.items.iter().enumerate() {
                    view.container.append(cards::store_card(store, index));
                }
                info!(
                    kind = ItemKind::Store.as_str(),
                    %query,
                    page,
                    items = batch.items.len(),
                    total_found = ?batch.total_found,
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
                warn!(?err, %query, page, "store search failed");
                self.toaster.display(ToastKind::Error, &self.messages.fetch_failed);
                return LoadOutcome::Failed(err);
            }
        };
        drop(in_flight);

        if let LoadOutcome::Rendered { items, .. } = outcome {
            if items > 0 {
                tokio::task::yield_now().await;
                self.rearm(generation);
            }
        }
        outcome
    }

    fn rearm(&self, generation: u64) -> Option<NodeKey> {
        let mut view = lock(&self.view);
        if view.generation != generation {
            return None;
        }
        let SearchView { container, observer, .. } = &mut *view;
        observer.disarm();
        observer.arm(Some(container))
    }

    pub fn to_html(&self) -> String {
        let mut out = lock(&self.view).container.to_html();
        out.push_str(&self.fetcher.indicator().element().to_html());
        out
    }
}
