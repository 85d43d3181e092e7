use std::sync::Arc;
use rocket::http::{ContentType, Header};
use rocket::serde::json::Json;
use rocket::{get, Responder, State};

use crate::publisher::{Asset, AssetStore, MemorySink};

/// Shared by all overlay routes: the latest publication and the asset store
pub struct GatewayState {
    pub sink: Arc<MemorySink>,
    pub assets: AssetStore,
}

#[derive(serde::Serialize)]
pub struct VersionResponse {
    version: String,
}

#[derive(Responder)]
#[response(content_type = "json")]
pub struct SnapshotResponse {
    body: String,
    cache_control: Header<'static>,
}

fn asset(state: &GatewayState, asset: Asset) -> Option<(ContentType, String)> {
    let content = state.assets.get(asset)?;
    let content_type = ContentType::parse_flexible(asset.content_type()).unwrap_or(ContentType::Plain);
    Some((content_type, content.into_owned()))
}

#[get("/")]
pub fn index(state: &State<GatewayState>) -> Option<(ContentType, String)> {
    asset(state, Asset::OverlayHtml)
}

#[get("/overlay.html")]
pub fn overlay_html(state: &State<GatewayState>) -> Option<(ContentType, String)> {
    asset(state, Asset::OverlayHtml)
}

#[get("/overlay.css")]
pub fn overlay_css(state: &State<GatewayState>) -> Option<(ContentType, String)> {
    asset(state, Asset::OverlayCss)
}

#[get("/overlay.js")]
pub fn overlay_js(state: &State<GatewayState>) -> Option<(ContentType, String)> {
    asset(state, Asset::OverlayJs)
}

#[get("/usage.md")]
pub fn usage(state: &State<GatewayState>) -> Option<(ContentType, String)> {
    asset(state, Asset::UsageMd)
}

#[get("/nowplaying.json")]
pub fn snapshot(state: &State<GatewayState>) -> SnapshotResponse {
    SnapshotResponse {
        body: state.sink.load().json.clone(),
        cache_control: Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"),
    }
}

#[get("/cover.jpg")]
pub fn cover(state: &State<GatewayState>) -> Option<(ContentType, Vec<u8>)> {
    let published = state.sink.load();
    let cover = published.cover.as_ref()?;
    let content_type = ContentType::parse_flexible(cover.content_type()).unwrap_or(ContentType::JPEG);
    Some((content_type, cover.bytes().to_vec()))
}

#[get("/version")]
pub fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
