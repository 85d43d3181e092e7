use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use clap::Parser;
use log::{error, info, warn};
use tokio::sync::watch;

use nowplaying::client::{run_client, Enricher, FileFeed, HttpFeed, LogRenderer, OverlayClient, OverlayConfig, SnapshotFeed};
use nowplaying::constants::{user_agent, API_PREFIX, RELAY_NAME, RELAY_UPSTREAM};
use nowplaying::helpers::{AttributeCache, HttpClient, ReqwestHttpClient};
use nowplaying::logging::initialize_logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Follows a now playing snapshot the way the overlay page does", long_about = None)]
struct Args {
    /// Gateway URL (http://host:port) or output directory
    source: String,

    /// Overlay settings as a query string, e.g. "animation=fly&settle-delay=1s"
    #[clap(long)]
    query: Option<String>,

    /// Stylesheet whose --np-* custom properties provide settings
    #[clap(long)]
    css: Option<PathBuf>,

    /// Durable enrichment cache (SQLite file)
    #[clap(long)]
    cache: Option<PathBuf>,

    #[clap(long, help = "Do not look up release year and genres")]
    no_enrichment: bool,

    #[clap(long, help = "Enable debug logging")]
    debug: bool,
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = initialize_logging(None, args.debug, false) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let css = args.css.as_ref().and_then(|path| match fs::read_to_string(path) {
        Ok(css) => Some(css),
        Err(e) => {
            warn!("Could not read stylesheet {:?}: {}", path, e);
            None
        }
    });
    let config = OverlayConfig::resolve(css.as_deref(), args.query.as_deref());
    info!("Overlay settings: {:?}", config);

    let http: Arc<dyn HttpClient> = match ReqwestHttpClient::new(Duration::from_secs(10), &user_agent()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let (feed, relay_base): (Arc<dyn SnapshotFeed>, Option<String>) = if is_url(&args.source) {
        let base = args.source.trim_end_matches('/');
        let relay = format!("{}{}/{}/", base, API_PREFIX, RELAY_NAME);
        (Arc::new(HttpFeed::new(http.clone(), base)), Some(relay))
    } else {
        (Arc::new(FileFeed::new(&args.source)), None)
    };

    let enricher = if args.no_enrichment {
        None
    } else {
        let durable = args.cache.as_ref().and_then(|path| match AttributeCache::open(path) {
            Ok(cache) => {
                if let Err(e) = cache.purge_expired() {
                    warn!("Could not purge expired enrichment entries: {}", e);
                }
                Some(Arc::new(cache))
            }
            Err(e) => {
                warn!("Enrichment cache unavailable, using memory only: {}", e);
                None
            }
        });
        Some(Arc::new(Enricher::new(http.clone(), relay_base.as_deref(), RELAY_UPSTREAM, durable)))
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let renderer = LogRenderer::new(&config.title);
    let cover_feed = feed.clone();
    let client = OverlayClient::new(config, renderer, Instant::now())
        .with_cover_location(move |path| cover_feed.cover_location(path));

    let client = run_client(client, feed, enricher, shutdown_rx).await;
    info!("Stopped in state {:?}", client.state());
}
