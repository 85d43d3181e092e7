use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use clap::Parser;
use log::{debug, error, info, warn};

use nowplaying::api::{start_rocket_server, MetadataRelay};
use nowplaying::config::{AppConfig, ConfigOverrides, OutputMode};
use nowplaying::constants::LOCK_FILE;
use nowplaying::filter::FilterEngine;
use nowplaying::helpers::InstanceLock;
use nowplaying::logging::initialize_logging;
use nowplaying::publisher::{AssetStore, FileSink, MemorySink, SnapshotSink};
use nowplaying::service::NowPlayingService;
use nowplaying::session::MediaSessionSource;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Publishes the currently playing track for stream overlays")]
struct Args {
    /// JSON configuration file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Output directory for the snapshot, cover and overlay assets
    #[clap(long)]
    output: Option<PathBuf>,

    /// Serve the snapshot over HTTP instead of writing files
    #[clap(long)]
    serve: bool,

    #[clap(long, help = "Address to listen on in serving mode")]
    host: Option<String>,

    #[clap(long, help = "Port to listen on in serving mode")]
    port: Option<u16>,

    /// Inline stylesheet and script into overlay.html
    #[clap(long)]
    single_file: bool,

    /// Filter rule file (default: filter.txt in the output directory)
    #[clap(long)]
    filter: Option<PathBuf>,

    #[clap(long, help = "Enable debug logging")]
    debug: bool,

    #[clap(short, long, help = "Enable verbose logging")]
    verbose: bool,

    /// Read session events as JSON lines from standard input
    #[clap(long)]
    stdin_events: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            output: self.output.clone(),
            serve: self.serve,
            host: self.host.clone(),
            port: self.port,
            single_file: self.single_file,
            filter: self.filter.clone(),
        }
    }
}

fn session_source(args: &Args) -> Result<Arc<dyn MediaSessionSource>, String> {
    #[cfg(windows)]
    {
        if !args.stdin_events {
            return nowplaying::session::GsmtcSessionSource::new()
                .map(|source| Arc::new(source) as Arc<dyn MediaSessionSource>)
                .map_err(|e| format!("Media session manager unavailable: {}", e));
        }
    }

    let source = nowplaying::session::ManualSessionSource::new();
    if args.stdin_events || cfg!(not(windows)) {
        source
            .spawn_stdin_reader()
            .map_err(|e| format!("Failed to read session events: {}", e))?;
        info!("Reading session events from standard input");
    }
    Ok(source as Arc<dyn MediaSessionSource>)
}

fn wait_for_ctrlc() {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    info!("Press Ctrl+C to exit");
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }
    debug!("Shutdown requested");
}

fn run_serve(config: &AppConfig, sink: Arc<MemorySink>, assets: AssetStore) -> Result<(), String> {
    let relay = MetadataRelay::from_config(&config.relay).map_err(|e| format!("Failed to create relay client: {}", e))?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start async runtime: {}", e))?;
    runtime
        .block_on(start_rocket_server(&config.webserver, sink, assets, relay))
        .map_err(|e| format!("Webserver failed: {}", e))
}

fn run(args: Args) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path).map_err(|e| e.to_string())?,
        None => AppConfig::default(),
    };
    config.apply_overrides(&args.overrides());

    let directory = config.output.directory.clone();
    std::fs::create_dir_all(&directory)
        .map_err(|e| format!("Failed to create output directory {:?}: {}", directory, e))?;

    // A second instance for the same output location exits quietly
    let lock = match InstanceLock::try_acquire(directory.join(LOCK_FILE)).map_err(|e| e.to_string())? {
        Some(lock) => lock,
        None => process::exit(0),
    };

    if let Err(e) = initialize_logging(config.logging.clone(), args.debug, args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let assets = AssetStore::new(Some(directory.clone()), config.output.single_file);
    match assets.write_defaults(&directory) {
        Ok(written) => {
            for path in written {
                debug!("Wrote default {:?}", path);
            }
        }
        Err(e) => warn!("Failed to write default assets: {}", e),
    }

    let filter = Arc::new(FilterEngine::from_file(config.rules_path()));
    let source = session_source(&args)?;

    let memory_sink = Arc::new(MemorySink::new());
    let sink: Arc<dyn SnapshotSink> = match config.output.mode {
        OutputMode::Files => Arc::new(FileSink::new(&directory)),
        OutputMode::Serve => memory_sink.clone(),
    };

    let service = NowPlayingService::new(source, sink, filter).with_filter_reload(config.filter.hot_reload);
    service.start().map_err(|e| format!("Failed to attach to media sessions: {}", e))?;

    let outcome = match config.output.mode {
        OutputMode::Files => {
            info!("Writing now playing data to {:?}", directory);
            wait_for_ctrlc();
            Ok(())
        }
        OutputMode::Serve => run_serve(&config, memory_sink, assets),
    };

    if let Err(e) = service.stop() {
        warn!("Failed to publish shutdown snapshot: {}", e);
    }
    lock.release();
    outcome
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}
