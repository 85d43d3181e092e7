use std::sync::Arc;
use log::info;
use rocket::config::Config;
use rocket::{routes, Build, Rocket};

use crate::api::cors::{self, Cors};
use crate::api::overlay::{self, GatewayState};
use crate::api::relay::{self, MetadataRelay};
use crate::config::WebserverConfig;
use crate::constants::{API_PREFIX, RELAY_NAME};
use crate::publisher::{AssetStore, MemorySink};

/// Assemble the gateway. `figment` carries address and port; tests pass Rocket's defaults.
pub fn build_rocket(
    figment: rocket::figment::Figment,
    sink: Arc<MemorySink>,
    assets: AssetStore,
    relay: MetadataRelay,
) -> Rocket<Build> {
    let overlay_routes = routes![
        overlay::index,
        overlay::overlay_html,
        overlay::overlay_css,
        overlay::overlay_js,
        overlay::usage,
        overlay::snapshot,
        overlay::cover,
        cors::preflight,
    ];

    let relay_routes = routes![relay::probe, relay::relay];

    rocket::custom(figment)
        .mount("/", overlay_routes)
        .mount(API_PREFIX, routes![overlay::version])
        .mount(format!("{}/{}", API_PREFIX, RELAY_NAME), relay_routes)
        .attach(Cors)
        .manage(GatewayState { sink, assets })
        .manage(relay)
}

/// Serve until Rocket's shutdown (Ctrl-C by default) completes, letting in-flight requests drain
pub async fn start_rocket_server(
    config: &WebserverConfig,
    sink: Arc<MemorySink>,
    assets: AssetStore,
    relay: MetadataRelay,
) -> Result<(), rocket::Error> {
    info!("Starting webserver on {}:{}", config.host, config.port);

    let figment = Config::figment()
        .merge(("port", config.port))
        .merge(("address", config.host.clone()));

    let _rocket = build_rocket(figment, sink, assets, relay).launch().await?;
    info!("Webserver stopped");
    Ok(())
}
