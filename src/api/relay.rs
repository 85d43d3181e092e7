use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, warn};
use rocket::http::uri::Origin;
use rocket::http::{ContentType, Status};
use rocket::response::status::Custom;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::{json, Json, Value};
use rocket::{get, Request, State};

use crate::config::RelayConfig;
use crate::constants::RELAY_NAME;
use crate::helpers::http_client::{HttpClient, HttpClientError, HttpResponse, ReqwestHttpClient};

/// Forwards lookups to the fixed metadata host. No caching happens here.
#[derive(Debug, Clone)]
pub struct MetadataRelay {
    client: Arc<dyn HttpClient>,
    upstream: String,
}

impl MetadataRelay {
    pub fn new(client: Arc<dyn HttpClient>, upstream: &str) -> Self {
        let mut upstream = upstream.trim().to_string();
        if !upstream.ends_with('/') {
            upstream.push('/');
        }
        Self { client, upstream }
    }

    /// Relay using reqwest, identifying itself with the configured user agent
    pub fn from_config(config: &RelayConfig) -> Result<Self, HttpClientError> {
        let client = ReqwestHttpClient::new(Duration::from_secs(config.timeout_secs), &config.user_agent())?;
        Ok(Self::new(Arc::new(client), &config.upstream))
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}{}", self.upstream, path.trim_start_matches('/'));
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Forward a lookup. Upstream server errors count as failures like transport errors do.
    pub async fn forward(&self, path: &str, query: Option<&str>) -> Result<HttpResponse, HttpClientError> {
        let url = self.upstream_url(path, query);
        let response = self.client.get(&url).await?;
        if response.status >= 500 {
            return Err(HttpClientError::ServerError(format!("HTTP {}", response.status)));
        }
        Ok(response)
    }
}

/// An upstream response passed through unchanged
pub struct Relayed(pub HttpResponse);

impl<'r> Responder<'r, 'static> for Relayed {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let HttpResponse { status, content_type, body } = self.0;
        let mut builder = Response::build();
        builder.status(Status::new(status));
        if let Some(content_type) = content_type.as_deref().and_then(ContentType::parse_flexible) {
            builder.header(content_type);
        }
        builder.sized_body(body.len(), Cursor::new(body));
        builder.ok()
    }
}

fn failure() -> Custom<Json<Value>> {
    Custom(Status::BadGateway, Json(json!({ "error": "metadata lookup failed" })))
}

/// Static probe so the client can tell whether a relay is present
#[get("/test")]
pub fn probe() -> Json<Value> {
    Json(json!({ "ok": true, "relay": RELAY_NAME }))
}

#[get("/<path..>", rank = 2)]
pub async fn relay(
    path: PathBuf,
    origin: &Origin<'_>,
    relay: &State<MetadataRelay>,
) -> Result<Relayed, Custom<Json<Value>>> {
    let path = path
        .iter()
        .map(|segment| segment.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    let query = origin.query().map(|q| q.as_str().to_string());

    match relay.forward(&path, query.as_deref()).await {
        Ok(response) => {
            debug!("Relayed {} -> {}", path, response.status);
            Ok(Relayed(response))
        }
        Err(e) => {
            warn!("Metadata relay for '{}' failed: {}", path, e);
            Err(failure())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;

    #[derive(Debug)]
    struct Status503;

    #[async_trait]
    impl HttpClient for Status503 {
        async fn get(&self, _url: &str) -> Result<HttpResponse, HttpClientError> {
            Ok(HttpResponse { status: 503, content_type: None, body: Bytes::new() })
        }
    }

    #[test]
    fn test_upstream_url() {
        let relay = MetadataRelay::new(Arc::new(Status503), "https://musicbrainz.org/ws/2");
        assert_eq!(relay.upstream(), "https://musicbrainz.org/ws/2/");
        assert_eq!(
            relay.upstream_url("release-group", Some("query=abc&fmt=json")),
            "https://musicbrainz.org/ws/2/release-group?query=abc&fmt=json"
        );
        assert_eq!(relay.upstream_url("/recording", Some("")), "https://musicbrainz.org/ws/2/recording");
    }

    #[tokio::test]
    async fn test_upstream_server_error_is_failure() {
        let relay = MetadataRelay::new(Arc::new(Status503), "http://upstream/");
        assert!(matches!(relay.forward("recording", None).await, Err(HttpClientError::ServerError(_))));
    }
}
