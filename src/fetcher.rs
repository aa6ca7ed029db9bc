//! In-flight bookkeeping shared by both pipelines.
//!
//! [`PageFetcher::begin`] hands out an [`InFlight`] guard that holds the
//! loading gate and keeps the loading indicator visible. Dropping the guard
//! releases both, whichever way the fetch ends.
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;
use uuid::Uuid;

use crate::dom::Element;

/// Spinner shown while a page request is outstanding.
#[derive(Debug)]
pub struct LoadingIndicator {
    element_id: String,
    visible: AtomicBool,
}

impl LoadingIndicator {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            visible: AtomicBool::new(false),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn element(&self) -> Element {
        let mut el = Element::new("div").with_id(self.element_id.as_str()).with_class("loader-spinner");
        if self.is_visible() {
            el.add_class("active-loader");
        } else {
            el.set_hidden(true);
        }
        el
    }
}

/// Guard for one outstanding request.
#[derive(Debug)]
pub struct InFlight<'a> {
    _permit: SemaphorePermit<'a>,
    indicator: &'a LoadingIndicator,
    request_id: Uuid,
}

impl InFlight<'_> {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.indicator.set_visible(false);
        debug!(request_id = %self.request_id, "loading gate released");
    }
}

/// Loading gate plus indicator for one pipeline.
#[derive(Debug)]
pub struct PageFetcher {
    gate: Semaphore,
    indicator: LoadingIndicator,
}

impl PageFetcher {
    pub fn new(indicator: LoadingIndicator) -> Self {
        Self {
            gate: Semaphore::new(1),
            indicator,
        }
    }

    pub fn indicator(&self) -> &LoadingIndicator {
        &self.indicator
    }

    pub fn is_loading(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// Enters the gate, or returns `None` if a request is already in flight.
    pub fn begin(&self) -> Option<InFlight<'_>> {
        let permit = self.gate.try_acquire().ok()?;
        Some(self.enter(permit))
    }

    /// Waits for the current request (if any) to settle, then enters.
    pub async fn begin_when_idle(&self) -> Option<InFlight<'_>> {
        let permit = self.gate.acquire().await.ok()?;
        Some(self.enter(permit))
    }

    fn enter<'a>(&'a self, permit: SemaphorePermit<'a>) -> InFlight<'a> {
        self.indicator.set_visible(true);
        let request_id = Uuid::new_v4();
        debug!(%request_id, "loading gate acquired");
        InFlight {
            _permit: permit,
            indicator: &self.indicator,
            request_id,
        }
    }
}
