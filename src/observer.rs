//! Sentinel observer: watches the last child of a container and reports
//! when it scrolls into (near) view.
//!
//! The host owns layout. It measures the watched node against the viewport
//! with [`SentinelObserver::measure`] and feeds the resulting entry back in
//! through [`SentinelObserver::notify`]; a `true` return is the single
//! callback invocation for the current arming cycle.
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dom::{Container, NodeKey};

static LENGTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-?\d+(?:\.\d+)?)(px|%)?$").expect("valid length regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarginError {
    #[error("root margin must have 1 to 4 components, got {0}")]
    Arity(usize),
    #[error("invalid root margin component '{0}'")]
    Component(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f64),
    Percent(f64),
}

impl Length {
    fn parse(token: &str) -> Result<Self, MarginError> {
        let caps = LENGTH_RE
            .captures(token)
            .ok_or_else(|| MarginError::Component(token.to_string()))?;
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| MarginError::Component(token.to_string()))?;
        match caps.get(2).map(|m| m.as_str()) {
            Some("%") => Ok(Length::Percent(value)),
            Some(_) => Ok(Length::Px(value)),
            // Unitless lengths are only valid for zero.
            None if value == 0.0 => Ok(Length::Px(0.0)),
            None => Err(MarginError::Component(token.to_string())),
        }
    }

    fn resolve(&self, basis: f64) -> f64 {
        match self {
            Length::Px(px) => *px,
            Length::Percent(pct) => basis * pct / 100.0,
        }
    }
}

/// CSS-style margin grown around the viewport before intersecting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Default for RootMargin {
    fn default() -> Self {
        Self {
            top: Length::Px(0.0),
            right: Length::Px(0.0),
            bottom: Length::Px(0.0),
            left: Length::Px(0.0),
        }
    }
}

impl RootMargin {
    /// Parses the 1 to 4 value shorthand (`"100px"`, `"0px 10%"`, ...).
    pub fn parse(input: &str) -> Result<Self, MarginError> {
        let parts = input
            .split_whitespace()
            .map(Length::parse)
            .collect::<Result<Vec<_>, _>>()?;
        let (top, right, bottom, left) = match parts.as_slice() {
            [all] => (*all, *all, *all, *all),
            [v, h] => (*v, *h, *v, *h),
            [t, h, b] => (*t, *h, *b, *h),
            [t, r, b, l] => (*t, *r, *b, *l),
            other => return Err(MarginError::Arity(other.len())),
        };
        Ok(Self { top, right, bottom, left })
    }

    pub fn expand(&self, root: Rect) -> Rect {
        let top = self.top.resolve(root.height);
        let bottom = self.bottom.resolve(root.height);
        let left = self.left.resolve(root.width);
        let right = self.right.resolve(root.width);
        Rect {
            x: root.x - left,
            y: root.y - top,
            width: (root.width + left + right).max(0.0),
            height: (root.height + top + bottom).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Edge-inclusive intersection; touching rectangles yield a zero-area rect.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    pub root_margin: RootMargin,
    pub threshold: f64,
    pub observe_once: bool,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root_margin: RootMargin::default(),
            threshold: 0.1,
            observe_once: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: NodeKey,
    pub is_intersecting: bool,
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy)]
struct Watch {
    target: NodeKey,
    visible: bool,
}

#[derive(Debug, Clone)]
pub struct SentinelObserver {
    options: ObserverOptions,
    watch: Option<Watch>,
}

impl SentinelObserver {
    pub fn new(options: ObserverOptions) -> Self {
        Self { options, watch: None }
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    /// Starts watching the container's last child, replacing any previous target.
    pub fn arm(&mut self, container: Option<&Container>) -> Option<NodeKey> {
        let Some(container) = container else {
            warn!("sentinel container not found");
            return None;
        };
        let Some(target) = container.last_child() else {
            warn!(container = container.id(), "sentinel container has no children to observe");
            return None;
        };
        debug!(container = container.id(), ?target, "sentinel armed");
        self.watch = Some(Watch { target, visible: false });
        Some(target)
    }

    pub fn disarm(&mut self) -> Option<NodeKey> {
        self.watch.take().map(|w| w.target)
    }

    pub fn target(&self) -> Option<NodeKey> {
        self.watch.map(|w| w.target)
    }

    pub fn is_armed(&self) -> bool {
        self.watch.is_some()
    }

    /// Measures `target` against `viewport` grown by the root margin.
    pub fn measure(&self, target: NodeKey, target_rect: Rect, viewport: Rect) -> IntersectionEntry {
        let root = self.options.root_margin.expand(viewport);
        match target_rect.intersection(&root) {
            Some(hit) => {
                let area = target_rect.area();
                let ratio = if area > 0.0 { (hit.area() / area).min(1.0) } else { 1.0 };
                IntersectionEntry { target, is_intersecting: true, ratio }
            }
            None => IntersectionEntry { target, is_intersecting: false, ratio: 0.0 },
        }
    }

    /// Returns `true` when the watched target crosses into view.
    ///
    /// Entries for anything but the current target are ignored, so events
    /// that arrive after un-watching are harmless.
    pub fn notify(&mut self, entry: IntersectionEntry) -> bool {
        let observe_once = self.options.observe_once;
        let threshold = self.options.threshold;
        let Some(watch) = self.watch.as_mut() else {
            return false;
        };
        if watch.target != entry.target {
            return false;
        }
        let visible = entry.is_intersecting && entry.ratio >= threshold;
        let fired = visible && !watch.visible;
        watch.visible = visible;
        if fired && observe_once {
            self.watch = None;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;

    fn filled(n: usize) -> Container {
        let mut c = Container::new("list");
        for i in 0..n {
            c.append(Element::new("div").with_id(format!("item-{i}")));
        }
        c
    }

    const VIEWPORT: Rect = Rect { x: 0.0, y: 0.0, width: 400.0, height: 800.0 };

    #[test]
    fn parses_margin_shorthand() {
        assert_eq!(RootMargin::parse("0px").unwrap(), RootMargin::default());
        let m = RootMargin::parse("100px").unwrap();
        assert_eq!(m.bottom, Length::Px(100.0));
        let m = RootMargin::parse("10px 5%").unwrap();
        assert_eq!(m.top, Length::Px(10.0));
        assert_eq!(m.left, Length::Percent(5.0));
        assert_eq!(m.bottom, Length::Px(10.0));
        let m = RootMargin::parse("1px 2px 3px 4px").unwrap();
        assert_eq!(m.left, Length::Px(4.0));
        assert_eq!(RootMargin::parse("0").unwrap(), RootMargin::default());
    }

    #[test]
    fn rejects_bad_margins() {
        assert!(matches!(RootMargin::parse(""), Err(MarginError::Arity(0))));
        assert!(matches!(RootMargin::parse("1px 2px 3px 4px 5px"), Err(MarginError::Arity(5))));
        assert!(matches!(RootMargin::parse("10em"), Err(MarginError::Component(_))));
        assert!(matches!(RootMargin::parse("10"), Err(MarginError::Component(_))));
    }

    #[test]
    fn arm_watches_last_child() {
        let c = filled(3);
        let mut obs = SentinelObserver::new(ObserverOptions::default());
        let target = obs.arm(Some(&c));
        assert_eq!(target, c.last_child());
        assert_eq!(obs.target(), c.last_child());
    }

    #[test]
    fn arm_on_missing_or_empty_container_is_noop() {
        let mut obs = SentinelObserver::new(ObserverOptions::default());
        assert!(obs.arm(None).is_none());
        assert!(obs.arm(Some(&Container::new("empty"))).is_none());
        assert!(!obs.is_armed());
    }

    #[test]
    fn fires_once_then_unwatches() {
        let c = filled(2);
        let mut obs = SentinelObserver::new(ObserverOptions::default());
        let target = obs.arm(Some(&c)).unwrap();

        let below = obs.measure(target, Rect::new(0.0, 900.0, 400.0, 200.0), VIEWPORT);
        assert!(!below.is_intersecting);
        assert!(!obs.notify(below));

        let visible = obs.measure(target, Rect::new(0.0, 700.0, 400.0, 200.0), VIEWPORT);
        assert!((visible.ratio - 0.5).abs() < 1e-9);
        assert!(obs.notify(visible));
        assert!(!obs.is_armed());
        assert!(!obs.notify(visible));
    }

    #[test]
    fn threshold_must_be_reached() {
        let c = filled(1);
        let mut obs = SentinelObserver::new(ObserverOptions::default());
        let target = obs.arm(Some(&c)).unwrap();
        // 5% visible, threshold is 10%.
        let sliver = obs.measure(target, Rect::new(0.0, 790.0, 400.0, 200.0), VIEWPORT);
        assert!(sliver.is_intersecting);
        assert!(!obs.notify(sliver));
        assert!(obs.is_armed());
    }

    #[test]
    fn root_margin_triggers_early() {
        let c = filled(1);
        let opts = ObserverOptions {
            root_margin: RootMargin::parse("100px").unwrap(),
            threshold: 0.0,
            observe_once: false,
        };
        let mut obs = SentinelObserver::new(opts);
        let target = obs.arm(Some(&c)).unwrap();
        let near = obs.measure(target, Rect::new(0.0, 850.0, 400.0, 200.0), VIEWPORT);
        assert!(near.is_intersecting);
        assert!(obs.notify(near));
    }

    #[test]
    fn repeat_mode_fires_on_each_crossing() {
        let c = filled(1);
        let opts = ObserverOptions { observe_once: false, ..Default::default() };
        let mut obs = SentinelObserver::new(opts);
        let target = obs.arm(Some(&c)).unwrap();
        let inside = obs.measure(target, Rect::new(0.0, 100.0, 400.0, 200.0), VIEWPORT);
        let outside = obs.measure(target, Rect::new(0.0, 1000.0, 400.0, 200.0), VIEWPORT);

        assert!(obs.notify(inside));
        assert!(!obs.notify(inside));
        assert!(!obs.notify(outside));
        assert!(obs.notify(inside));
        assert!(obs.is_armed());
    }

    #[test]
    fn stale_targets_are_ignored() {
        let mut c = filled(1);
        let mut obs = SentinelObserver::new(ObserverOptions::default());
        let old = obs.arm(Some(&c)).unwrap();
        c.append(Element::new("div"));
        obs.disarm();
        let new = obs.arm(Some(&c)).unwrap();
        assert_ne!(old, new);

        let entry = obs.measure(old, Rect::new(0.0, 0.0, 10.0, 10.0), VIEWPORT);
        assert!(!obs.notify(entry));
        assert_eq!(obs.target(), Some(new));
    }
}
