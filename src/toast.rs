//! Transient user notifications.
//!
//! Pipelines only depend on the [`Toaster`] call contract. [`ToastCenter`]
//! is the stock implementation: one slot per kind, showing one kind hides
//! the other, success toasts expire on their own, error toasts stay until
//! closed.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

impl ToastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToastKind::Success => "success",
            ToastKind::Error => "error",
        }
    }

    fn other(&self) -> ToastKind {
        match self {
            ToastKind::Success => ToastKind::Error,
            ToastKind::Error => ToastKind::Success,
        }
    }
}

pub trait Toaster: Send + Sync {
    fn display(&self, kind: ToastKind, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    shown_at: Instant,
}

#[derive(Debug, Default)]
struct Slots {
    success: Option<Toast>,
    error: Option<Toast>,
    history: VecDeque<(ToastKind, String)>,
}

/// Number of past toasts kept for [`ToastCenter::history`].
pub const HISTORY_LIMIT: usize = 32;

impl Slots {
    fn slot(&mut self, kind: ToastKind) -> &mut Option<Toast> {
        match kind {
            ToastKind::Success => &mut self.success,
            ToastKind::Error => &mut self.error,
        }
    }
}

#[derive(Debug)]
pub struct ToastCenter {
    success_dismiss: Duration,
    slots: Mutex<Slots>,
}

impl ToastCenter {
    pub fn new(success_dismiss: Duration) -> Self {
        Self {
            success_dismiss,
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn from_config(cfg: &crate::config::Toast) -> Self {
        Self::new(cfg.success_dismiss())
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Message currently on screen for `kind`, if any.
    pub fn current(&self, kind: ToastKind) -> Option<String> {
        let mut slots = self.lock();
        let expired = slots
            .success
            .as_ref()
            .is_some_and(|t| t.shown_at.elapsed() >= self.success_dismiss);
        if expired {
            slots.success = None;
        }
        slots.slot(kind).as_ref().map(|t| t.message.clone())
    }

    /// Close button; only error toasts carry one but closing either is allowed.
    pub fn close(&self, kind: ToastKind) {
        self.lock().slot(kind).take();
    }

    /// The most recent toasts (at most [`HISTORY_LIMIT`]), oldest first.
    pub fn history(&self) -> Vec<(ToastKind, String)> {
        self.lock().history.iter().cloned().collect()
    }
}

impl Toaster for ToastCenter {
    fn display(&self, kind: ToastKind, message: &str) {
        match kind {
            ToastKind::Success => info!(kind = kind.as_str(), text = message, "toast"),
            ToastKind::Error => warn!(kind = kind.as_str(), text = message, "toast"),
        }
        let mut slots = self.lock();
        slots.slot(kind.other()).take();
        *slots.slot(kind) = Some(Toast {
            kind,
            message: message.to_string(),
            shown_at: Instant::now(),
        });
        if slots.history.len() == HISTORY_LIMIT {
            slots.history.pop_front();
        }
        slots.history.push_back((kind, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn success_expires_after_dismiss_delay() {
        let center = ToastCenter::new(Duration::from_secs(5));
        center.display(ToastKind::Success, "Geabonneerd op Nike");
        assert_eq!(center.current(ToastKind::Success).as_deref(), Some("Geabonneerd op Nike"));

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(center.current(ToastKind::Success).is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(center.current(ToastKind::Success).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn error_stays_until_closed() {
        let center = ToastCenter::new(Duration::from_secs(5));
        center.display(ToastKind::Error, "Er ging iets mis.");
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(center.current(ToastKind::Error).as_deref(), Some("Er ging iets mis."));
        center.close(ToastKind::Error);
        assert!(center.current(ToastKind::Error).is_none());
    }

    #[test]
    fn showing_one_kind_hides_the_other() {
        let center = ToastCenter::new(Duration::from_secs(5));
        center.display(ToastKind::Error, "boom");
        center.display(ToastKind::Success, "ok");
        assert!(center.current(ToastKind::Error).is_none());
        assert_eq!(center.current(ToastKind::Success).as_deref(), Some("ok"));
        assert_eq!(
            center.history(),
            vec![(ToastKind::Error, "boom".to_string()), (ToastKind::Success, "ok".to_string())]
        );
    }

    #[test]
    fn history_keeps_only_recent_toasts() {
        let center = ToastCenter::new(Duration::from_secs(5));
        for i in 0..HISTORY_LIMIT + 8 {
            center.display(ToastKind::Error, &format!("fout {i}"));
        }
        let history = center.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].1, "fout 8");
        assert_eq!(history[HISTORY_LIMIT - 1].1, format!("fout {}", HISTORY_LIMIT + 7));
    }

    #[test]
    fn kind_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&ToastKind::Success).unwrap(), "\"success\"");
        assert_eq!(serde_json::from_str::<ToastKind>("\"error\"").unwrap(), ToastKind::Error);
        assert!(serde_json::from_str::<ToastKind>("\"info\"").is_err());
    }
}
