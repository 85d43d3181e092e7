use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use log::debug;

use crate::constants::SNAPSHOT_FILE;
use crate::data::NowPlayingSnapshot;
use crate::helpers::atomic_file::read_if_exists;
use crate::helpers::http_client::HttpClient;

/// Where the client reads snapshots from. `None` means "no data this poll".
#[async_trait]
pub trait SnapshotFeed: Send + Sync {
    async fn fetch(&self) -> Option<NowPlayingSnapshot>;

    /// Location a renderer can load the cover from
    fn cover_location(&self, cover_path: &str) -> String;
}

/// Polls the gateway over HTTP
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl HttpFeed {
    /// `base_url` is the gateway root, e.g. `http://127.0.0.1:9863/`
    pub fn new(client: Arc<dyn HttpClient>, base_url: &str) -> Self {
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn snapshot_url(&self) -> String {
        format!("{}{}", self.base_url, SNAPSHOT_FILE)
    }
}

#[async_trait]
impl SnapshotFeed for HttpFeed {
    async fn fetch(&self) -> Option<NowPlayingSnapshot> {
        let url = self.snapshot_url();
        let value = match self.client.get_json(&url).await {
            Ok(value) => value,
            Err(e) => {
                debug!("No snapshot from {}: {}", url, e);
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!("Unreadable snapshot from {}: {}", url, e);
                None
            }
        }
    }

    fn cover_location(&self, cover_path: &str) -> String {
        format!("{}{}", self.base_url, cover_path.trim_start_matches('/'))
    }
}

/// Reads the snapshot file written by the durable-file sink
#[derive(Debug, Clone)]
pub struct FileFeed {
    directory: PathBuf,
}

impl FileFeed {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.directory.join(SNAPSHOT_FILE)
    }
}

#[async_trait]
impl SnapshotFeed for FileFeed {
    async fn fetch(&self) -> Option<NowPlayingSnapshot> {
        let path = self.snapshot_path();
        let data = match tokio::task::spawn_blocking(move || read_if_exists(&path)).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                debug!("Could not read snapshot file: {}", e);
                return None;
            }
            Err(e) => {
                debug!("Snapshot read task failed: {}", e);
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!("Ignoring unreadable snapshot file: {}", e);
                None
            }
        }
    }

    fn cover_location(&self, cover_path: &str) -> String {
        self.directory.join(cover_path).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PlaybackStatus;
    use crate::helpers::http_client::{HttpClientError, HttpResponse};
    use bytes::Bytes;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Canned(Result<&'static str, ()>);

    #[async_trait]
    impl HttpClient for Canned {
        async fn get(&self, _url: &str) -> Result<HttpResponse, HttpClientError> {
            match self.0 {
                Ok(body) => Ok(HttpResponse {
                    status: 200,
                    content_type: Some("application/json".into()),
                    body: Bytes::from_static(body.as_bytes()),
                }),
                Err(()) => Err(HttpClientError::RequestError("connection refused".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_http_feed() {
        let feed = HttpFeed::new(Arc::new(Canned(Ok(r#"{"status":"Stopped"}"#))), "http://127.0.0.1:9863");
        assert_eq!(feed.snapshot_url(), "http://127.0.0.1:9863/nowplaying.json");
        assert_eq!(feed.cover_location("cover.jpg"), "http://127.0.0.1:9863/cover.jpg");
        assert_eq!(feed.fetch().await.unwrap().status(), PlaybackStatus::Stopped);

        let down = HttpFeed::new(Arc::new(Canned(Err(()))), "http://127.0.0.1:9863/");
        assert!(down.fetch().await.is_none());
    }

    #[tokio::test]
    async fn test_file_feed_missing_and_partial() {
        let dir = TempDir::new().unwrap();
        let feed = FileFeed::new(dir.path());
        assert!(feed.fetch().await.is_none());

        fs::write(feed.snapshot_path(), r#"{"status":"Play"#).unwrap();
        assert!(feed.fetch().await.is_none());

        fs::write(feed.snapshot_path(), r#"{"status":"Starting"}"#).unwrap();
        assert_eq!(feed.fetch().await.unwrap().status(), PlaybackStatus::Starting);
    }
}
