// Overlay client: polls the published snapshot and reconciles what is shown

pub mod config;
pub mod driver;
pub mod enrichment;
pub mod feed;
pub mod progress;
pub mod qr;
pub mod renderer;
pub mod state_machine;
pub mod timers;

pub use config::{Animation, OverlayConfig, TitleAlign};
pub use driver::run_client;
pub use enrichment::{Enricher, EnrichmentKey};
pub use feed::{FileFeed, HttpFeed, SnapshotFeed};
pub use renderer::{LogRenderer, Renderer, TrackView};
pub use state_machine::{ClientState, OverlayClient};
