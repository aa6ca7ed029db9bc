//! Pipeline controllers: sentinel observer, page fetcher and renderer
//! composed per feed.
//!
//! Each pipeline owns its state (cursor, gate, container, observer), so
//! any number of independent instances can live side by side. DOM state
//! sits behind a short-lived `std::sync::Mutex` that is never held across
//! an `.await`; the only suspension point is the page request itself.
use std::sync::{Mutex, MutexGuard};

use crate::api::FetchError;

pub mod feed;
pub mod search;

pub use feed::{FeedPipeline, FeedSettings};
pub use search::{SearchPipeline, SearchSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Loading,
    Exhausted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Loading => "loading",
            PipelineState::Exhausted => "exhausted",
        }
    }
}

/// Why a trigger did not result in a request. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The sentinel entry did not cross into view.
    NotTriggered,
    Loading,
    Exhausted,
    EmptyQuery,
    /// A newer query replaced the one this request belonged to.
    Superseded,
    /// The container carries no pagination attributes.
    MissingCursor,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Skipped(SkipReason),
    Rendered {
        page: u32,
        items: usize,
        exhausted: bool,
    },
    Failed(FetchError),
}

impl LoadOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, LoadOutcome::Rendered { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            LoadOutcome::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
