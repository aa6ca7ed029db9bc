use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use salefeed::api::HttpPageSource;
use salefeed::config;
use salefeed::observer::Rect;
use salefeed::pipeline::{FeedPipeline, FeedSettings, LoadOutcome};
use salefeed::toast::{ToastCenter, ToastKind};

#[derive(Debug, Parser)]
#[command(author, version, about = "Scroll through the deals feed and print what gets rendered")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Viewport width in CSS pixels; wide viewports use classic pagination
    #[arg(long, default_value = "390")]
    width: u32,

    /// Viewport height in CSS pixels
    #[arg(long, default_value = "844")]
    height: u32,

    /// Stop after this many pages (0 = until the feed is exhausted)
    #[arg(long, default_value = "0")]
    max_pages: u32,

    /// Print the rendered HTML instead of one line per deal
    #[arg(long)]
    html: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load config: {}", args.config.display()))?;

    let source = Arc::new(HttpPageSource::from_config(&cfg)?);
    let toasts = Arc::new(ToastCenter::from_config(&cfg.toast));
    let feed = FeedPipeline::new(
        source,
        toasts.clone(),
        FeedSettings::from_config(&cfg)?,
        cfg.messages.clone(),
    );

    if feed.start(args.width).is_none() {
        // Pagination mode or an empty first page: fetch once so there is something to show.
        info!(width = args.width, "sentinel not armed; loading a single page");
        feed.load_more_and_rearm().await;
    }

    let viewport = Rect::new(0.0, 0.0, f64::from(args.width), f64::from(args.height));
    let mut pages = 0u32;
    // Each pass scrolls the current sentinel fully into view.
    while let Some(entry) = feed.measure(viewport, viewport) {
        if args.max_pages > 0 && pages >= args.max_pages {
            break;
        }
        match feed.on_intersection(entry).await {
            LoadOutcome::Rendered { .. } => pages += 1,
            LoadOutcome::Skipped(reason) => {
                info!(?reason, "scroll did not load a page");
                break;
            }
            LoadOutcome::Failed(err) => {
                warn!(?err, "stopping after failed page");
                break;
            }
        }
    }

    if args.html {
        println!("{}", feed.to_html());
    } else {
        feed.with_container(|c| {
            for (_, card) in c.iter() {
                let title = card.find_by_class("sale-title").map(|t| t.text_content()).unwrap_or_default();
                let store = card.find_by_class("store-name").map(|t| t.text_content()).unwrap_or_default();
                println!("{store}\t{title}");
            }
        });
    }

    info!(pages, state = feed.state().as_str(), cursor = ?feed.cursor(), "done");
    if let Some(message) = toasts.current(ToastKind::Error) {
        bail!("feed reported an error: {message}");
    }
    Ok(())
}
