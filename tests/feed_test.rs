mod common;

use serde_json::json;
use std::sync::Arc;

use common::{deals_page, toasts, RecordingSource};
use salefeed::api::FetchError;
use salefeed::cards;
use salefeed::config::{self, Messages};
use salefeed::dom::{Container, Element};
use salefeed::model::{Deal, PageCursor, StoreRef};
use salefeed::observer::{IntersectionEntry, ObserverOptions, Rect};
use salefeed::pipeline::feed::SALES_CONTAINER_ID;
use salefeed::pipeline::{FeedPipeline, FeedSettings, LoadOutcome, PipelineState, SkipReason};
use salefeed::toast::ToastKind;

const VIEWPORT: Rect = Rect { x: 0.0, y: 0.0, width: 390.0, height: 844.0 };

fn settings() -> FeedSettings {
    FeedSettings {
        slug: "public".into(),
        start_page: 1,
        observer: ObserverOptions::default(),
        infinite_scroll_max_width: 900,
    }
}

/// Server-rendered first page with one card.
fn first_page() -> Container {
    let mut container = Container::new(SALES_CONTAINER_ID);
    container.append(cards::deal_card(&Deal {
        title: "a".into(),
        store: StoreRef { name: "Zalando".into(), image_url: None },
        ..Default::default()
    }));
    PageCursor::new(1).write_attrs(&mut container);
    container
}

fn pipeline(source: &RecordingSource) -> (FeedPipeline, Arc<salefeed::toast::ToastCenter>) {
    let toasts = toasts();
    let feed = FeedPipeline::from_container(
        Arc::new(source.clone()),
        toasts.clone(),
        settings(),
        Messages::default(),
        first_page(),
    );
    (feed, toasts)
}

fn titles(feed: &FeedPipeline) -> Vec<String> {
    feed.with_container(|c| {
        c.iter()
            .filter_map(|(_, card)| card.find_by_class("sale-title").map(|t| t.text_content()))
            .collect()
    })
}

async fn scroll_to_sentinel(feed: &FeedPipeline) -> LoadOutcome {
    let entry = feed.measure(VIEWPORT, VIEWPORT).expect("sentinel armed");
    feed.on_intersection(entry).await
}

#[tokio::test]
async fn scrolling_appends_next_page_and_watches_new_last_card() {
    let source = RecordingSource::with_responses(vec![Ok(deals_page(&["d1", "d2"], true))]);
    let (feed, toasts) = pipeline(&source);

    let first = feed.start(390).unwrap();
    assert_eq!(feed.with_container(|c| c.last_child()), Some(first));

    let outcome = scroll_to_sentinel(&feed).await;
    assert!(matches!(outcome, LoadOutcome::Rendered { page: 2, items: 2, exhausted: false }));

    assert_eq!(titles(&feed), vec!["a", "d1", "d2"]);
    let last = feed.with_container(|c| c.last_child());
    assert_eq!(feed.sentinel(), last);
    assert_ne!(feed.sentinel(), Some(first));
    assert_eq!(feed.cursor(), Some(PageCursor { current_page: 2, has_next_page: true }));
    feed.with_container(|c| {
        assert_eq!(c.attr("data-currentPage"), Some("2"));
        assert_eq!(c.attr("data-hasNextPage"), Some("True"));
    });
    assert_eq!(feed.state(), PipelineState::Idle);
    assert!(!feed.loader_visible());
    assert!(toasts.history().is_empty());

    let calls = source.calls().await;
    assert_eq!(calls, vec![("deals/public/".to_string(), json!({ "page": 2 }))]);
}

#[tokio::test]
async fn empty_final_page_shows_end_message_and_stops() {
    let source = RecordingSource::with_responses(vec![Ok(deals_page(&[], false))]);
    let (feed, _toasts) = pipeline(&source);
    feed.start(390);

    let outcome = scroll_to_sentinel(&feed).await;
    assert!(matches!(outcome, LoadOutcome::Rendered { page: 2, items: 0, exhausted: true }));
    assert_eq!(feed.state(), PipelineState::Exhausted);
    assert!(feed.final_message_visible());
    assert!(!feed.pagination_active());
    assert!(feed.sentinel().is_none());
    assert!(feed.to_html().contains("Geen sales meer."));
    assert_eq!(titles(&feed), vec!["a"]);

    let again = feed.load_more_and_rearm().await;
    assert_eq!(again.skip_reason(), Some(SkipReason::Exhausted));
    assert_eq!(source.calls().await.len(), 1);
}

#[tokio::test]
async fn last_page_with_items_still_rearms_then_skips() {
    let source = RecordingSource::with_responses(vec![Ok(deals_page(&["z"], false))]);
    let (feed, _toasts) = pipeline(&source);
    feed.start(390);

    let outcome = scroll_to_sentinel(&feed).await;
    assert!(matches!(outcome, LoadOutcome::Rendered { items: 1, exhausted: true, .. }));
    assert!(feed.final_message_visible());

    let outcome = scroll_to_sentinel(&feed).await;
    assert_eq!(outcome.skip_reason(), Some(SkipReason::Exhausted));
    assert_eq!(source.calls().await.len(), 1);
}

#[tokio::test]
async fn failed_request_releases_gate_and_reports_once() {
    let source = RecordingSource::with_responses(vec![
        Err(FetchError::Status { status: 500, body: "boom".into() }),
        Ok(deals_page(&["b"], true)),
    ]);
    let (feed, toasts) = pipeline(&source);
    feed.start(390);

    let outcome = scroll_to_sentinel(&feed).await;
    assert!(matches!(outcome, LoadOutcome::Failed(FetchError::Status { status: 500, .. })));
    assert!(!feed.is_loading());
    assert!(!feed.loader_visible());
    assert_eq!(feed.cursor(), Some(PageCursor::new(1)));
    assert_eq!(titles(&feed), vec!["a"]);
    assert!(feed.sentinel().is_none());
    assert_eq!(
        toasts.history(),
        vec![(ToastKind::Error, "Er ging iets mis.".to_string())]
    );

    // The gate is free again, so a retry goes through.
    let retry = feed.load_more_and_rearm().await;
    assert!(retry.is_rendered());
    assert_eq!(feed.cursor().map(|c| c.current_page), Some(2));
    assert_eq!(source.calls().await.len(), 2);
}

#[tokio::test]
async fn overlapping_triggers_issue_a_single_request() {
    let (source, hold) = RecordingSource::held(vec![Ok(deals_page(&["d1"], true))]);
    let (feed, _toasts) = pipeline(&source);
    feed.start(390);

    let first = feed.load_more();
    let second = async {
        hold.entered.notified().await;
        assert!(feed.is_loading());
        assert!(feed.loader_visible());
        assert_eq!(feed.state(), PipelineState::Loading);
        let skipped = feed.load_more().await;
        hold.release.notify_one();
        skipped
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_rendered());
    assert_eq!(second.skip_reason(), Some(SkipReason::Loading));
    assert_eq!(source.calls().await.len(), 1);
    assert!(!feed.loader_visible());
}

#[tokio::test]
async fn current_page_strictly_increases() {
    let source = RecordingSource::with_responses(vec![
        Ok(deals_page(&["p2"], true)),
        Ok(deals_page(&["p3"], true)),
        Ok(deals_page(&["p4"], false)),
    ]);
    let (feed, _toasts) = pipeline(&source);
    feed.start(390);

    let mut seen = vec![feed.cursor().unwrap().current_page];
    while let Some(entry) = feed.measure(VIEWPORT, VIEWPORT) {
        if !feed.on_intersection(entry).await.is_rendered() {
            break;
        }
        seen.push(feed.cursor().unwrap().current_page);
    }
    assert_eq!(seen, vec![1, 2, 3, 4]);
    let pages: Vec<_> = source.calls().await.into_iter().map(|(_, body)| body["page"].clone()).collect();
    assert_eq!(pages, vec![json!(2), json!(3), json!(4)]);
}

#[tokio::test]
async fn wide_viewport_keeps_classic_pagination() {
    let source = RecordingSource::with_responses(vec![Ok(deals_page(&["d1"], true))]);
    let (feed, _toasts) = pipeline(&source);

    assert!(feed.start(1280).is_none());
    assert!(feed.pagination_active());

    let outcome = feed.load_more_and_rearm().await;
    assert!(outcome.is_rendered());
    assert!(feed.sentinel().is_none());
}

#[tokio::test]
async fn fresh_container_requests_first_page() {
    let source = RecordingSource::with_responses(vec![Ok(deals_page(&["d1"], true))]);
    let feed = FeedPipeline::new(Arc::new(source.clone()), toasts(), settings(), Messages::default());

    // Nothing rendered yet, nothing to observe.
    assert!(feed.start(390).is_none());
    let outcome = feed.load_more_and_rearm().await;
    assert!(matches!(outcome, LoadOutcome::Rendered { page: 1, .. }));
    assert!(feed.sentinel().is_some());
    assert_eq!(feed.cursor(), Some(PageCursor { current_page: 1, has_next_page: true }));
}

#[tokio::test]
async fn example_config_walks_feed_from_page_one() {
    let cfg: config::Config = serde_yaml::from_str(config::example()).unwrap();
    config::validate(&cfg).unwrap();
    let source = RecordingSource::with_responses(vec![
        Ok(deals_page(&["p1a", "p1b"], true)),
        Ok(deals_page(&["p2"], false)),
    ]);
    let feed = FeedPipeline::new(
        Arc::new(source.clone()),
        toasts(),
        FeedSettings::from_config(&cfg).unwrap(),
        cfg.messages.clone(),
    );

    // Same startup as the `salefeed` binary: nothing to arm, so load once.
    assert!(feed.start(390).is_none());
    assert!(feed.load_more_and_rearm().await.is_rendered());
    while let Some(entry) = feed.measure(VIEWPORT, VIEWPORT) {
        if !feed.on_intersection(entry).await.is_rendered() {
            break;
        }
    }

    let pages: Vec<_> = source.calls().await.into_iter().map(|(_, body)| body["page"].clone()).collect();
    assert_eq!(pages, vec![json!(1), json!(2)]);
    assert_eq!(titles(&feed), vec!["p1a", "p1b", "p2"]);
    assert_eq!(feed.state(), PipelineState::Exhausted);
}

#[tokio::test]
async fn empty_feed_ending_on_empty_page_does_not_arm() {
    let source = RecordingSource::with_responses(vec![Ok(deals_page(&[], false))]);
    let feed = FeedPipeline::new(Arc::new(source.clone()), toasts(), settings(), Messages::default());
    assert!(feed.start(390).is_none());

    let outcome = feed.load_more_and_rearm().await;
    assert!(matches!(outcome, LoadOutcome::Rendered { page: 1, items: 0, exhausted: true }));
    assert!(feed.sentinel().is_none());
    assert!(feed.final_message_visible());
    assert!(!feed.pagination_active());
    assert!(feed.with_container(|c| c.is_empty()));
    assert_eq!(feed.state(), PipelineState::Exhausted);

    // No card exists to observe, so a stray visibility entry cannot trigger anything.
    let target = Container::new("elsewhere").append(Element::new("div"));
    let stray = IntersectionEntry { target, is_intersecting: true, ratio: 1.0 };
    assert_eq!(feed.on_intersection(stray).await.skip_reason(), Some(SkipReason::NotTriggered));
    assert_eq!(source.calls().await.len(), 1);
}

#[tokio::test]
async fn exhausted_feed_skips_without_holding_the_gate() {
    let source = RecordingSource::with_responses(vec![Ok(deals_page(&["z"], false))]);
    let (feed, _toasts) = pipeline(&source);
    feed.start(390);
    scroll_to_sentinel(&feed).await;

    assert_eq!(feed.load_more().await.skip_reason(), Some(SkipReason::Exhausted));
    assert!(!feed.is_loading());
    assert!(!feed.loader_visible());
}

#[tokio::test]
async fn details_open_from_embedded_payload() {
    let mut page = deals_page(&["d1"], true);
    page["deals"][0]["deal_json"] = json!({
        "title": "Summer sale",
        "store": { "name": "Zara", "image_url": "" },
        "highlighted_products": [
            { "title": "Jurk", "old_price": 49.95, "new_price": 19.5 }
        ]
    });
    let source = RecordingSource::with_responses(vec![Ok(page)]);
    let (feed, toasts) = pipeline(&source);
    feed.start(390);
    scroll_to_sentinel(&feed).await;

    let card = feed.sentinel().unwrap();
    let details = feed.details(card).unwrap();
    assert_eq!(details.title, "Summer sale");
    assert_eq!(details.store_name, "Zara");
    assert_eq!(details.highlighted.len(), 1);
    assert!(toasts.history().is_empty());
}

#[tokio::test]
async fn broken_payload_reports_error_toast() {
    let mut page = deals_page(&["d1"], true);
    page["deals"][0]["deal_json"] = json!("{not json");
    let source = RecordingSource::with_responses(vec![Ok(page)]);
    let (feed, toasts) = pipeline(&source);
    feed.start(390);
    scroll_to_sentinel(&feed).await;

    let card = feed.sentinel().unwrap();
    assert!(feed.details(card).is_err());
    assert_eq!(
        toasts.current(ToastKind::Error).as_deref(),
        Some("Kon de sale niet laden. Bekijk de console voor meer.")
    );
}
