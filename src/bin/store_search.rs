use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use salefeed::api::HttpPageSource;
use salefeed::config;
use salefeed::observer::Rect;
use salefeed::pipeline::{LoadOutcome, SearchPipeline, SearchSettings};
use salefeed::subscriptions::{SubscriptionEndpoints, SubscriptionManager};
use salefeed::toast::{ToastCenter, ToastKind};

#[derive(Debug, Parser)]
#[command(author, version, about = "Search stores and page through the results")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Store name to search for
    #[arg(long)]
    query: String,

    /// Stop after this many pages (0 = all)
    #[arg(long, default_value = "0")]
    max_pages: u32,

    /// Subscribe to this store id once the results are in
    #[arg(long)]
    subscribe: Option<i64>,

    /// Unsubscribe from this store id once the results are in
    #[arg(long)]
    unsubscribe: Option<i64>,
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
    let search = SearchPipeline::new(
        source.clone(),
        toasts.clone(),
        SearchSettings::from_config(&cfg)?,
        cfg.messages.clone(),
    );

    let mut pages = 0u32;
    match search.submit(&args.query).await {
        LoadOutcome::Rendered { .. } => pages += 1,
        LoadOutcome::Skipped(reason) => bail!("nothing to search: {reason:?}"),
        LoadOutcome::Failed(err) => return Err(err.into()),
    }

    let viewport = Rect::new(0.0, 0.0, 390.0, 844.0);
    while let Some(entry) = search.measure(viewport, viewport) {
        if args.max_pages > 0 && pages >= args.max_pages {
            break;
        }
        match search.on_intersection(entry).await {
            LoadOutcome::Rendered { .. } => pages += 1,
            LoadOutcome::Skipped(reason) => {
                info!(?reason, "no further page");
                break;
            }
            LoadOutcome::Failed(err) => {
                warn!(?err, "stopping after failed page");
                break;
            }
        }
    }

    search.with_container(|c| {
        for (_, card) in c.iter() {
            println!("{}", card.text_content().trim());
        }
    });
    info!(pages, query = %search.query(), state = search.state().as_str(), "search done");

    if args.subscribe.is_some() || args.unsubscribe.is_some() {
        let manager = SubscriptionManager::new(
            source,
            toasts.clone(),
            SubscriptionEndpoints::from_config(&cfg),
            &[],
        );
        if let Some(id) = args.subscribe {
            let outcome = manager.subscribe(Some(&search), id).await;
            info!(?outcome, "subscribe");
        }
        if let Some(id) = args.unsubscribe {
            let outcome = manager.unsubscribe(Some(&search), id).await;
            info!(?outcome, "unsubscribe");
        }
    }

    if let Some(message) = toasts.current(ToastKind::Error) {
        bail!("search reported an error: {message}");
    }
    Ok(())
}
