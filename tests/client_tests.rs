//! The overlay client driven end to end against files written by the durable sink

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::watch;

use nowplaying::client::config::Animation;
use nowplaying::client::{run_client, Enricher, FileFeed, OverlayClient, OverlayConfig, Renderer, TrackView};
use nowplaying::data::{NowPlayingSnapshot, PlaybackStatus, TrackIdentity, TrackSnapshot};
use nowplaying::helpers::musicbrainz::TrackMetadata;
use nowplaying::helpers::{HttpClient, HttpClientError, HttpResponse};
use nowplaying::publisher::{FileSink, SnapshotSink};

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Vec<String>>>);

impl Shared {
    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }
}

struct Recorder(Shared);

impl Renderer for Recorder {
    fn enter(&mut self, view: &TrackView, _animation: Animation) {
        self.0.push(format!("enter {} {}", view.title, view.cover.clone().unwrap_or_default()));
    }
    fn exit(&mut self, _animation: Animation) {
        self.0.push("exit".into());
    }
    fn update_in_place(&mut self, view: &TrackView) {
        self.0.push(format!("in-place {}", view.is_playing));
    }
    fn progress(&mut self, _progress_ms: u64, _duration_ms: u64) {}
    fn apply_enrichment(&mut self, metadata: &TrackMetadata) {
        self.0.push(format!("enriched {:?}", metadata.year));
    }
    fn show_qr(&mut self, _url: &str, _text: &str) {
        self.0.push("qr".into());
    }
    fn show_music(&mut self) {
        self.0.push("music".into());
    }
}

#[derive(Debug)]
struct ReleaseGroups;

#[async_trait]
impl HttpClient for ReleaseGroups {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpClientError> {
        let body = if url.contains("release-group?") {
            r#"{"release-groups":[{"title":"Album Z","first-release-date":"2001-03-12","genres":[{"name":"house","count":3}]}]}"#
        } else {
            r#"{"recordings":[]}"#
        };
        Ok(HttpResponse {
            status: 200,
            content_type: Some("application/json".into()),
            body: Bytes::from_static(body.as_bytes()),
        })
    }
}

fn playing(title: &str, status: PlaybackStatus) -> NowPlayingSnapshot {
    NowPlayingSnapshot::with_track(
        status,
        TrackSnapshot {
            is_playing: status.is_playing(),
            title: title.into(),
            artist: "Artist Y".into(),
            album: "Album Z".into(),
            duration_ms: 200_000,
            progress_ms: 1_000,
            app_id: "Spotify.exe".into(),
            cover_path: None,
            updated_at: Utc::now(),
        },
    )
}

async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test]
async fn test_client_follows_published_files() {
    let dir = TempDir::new().unwrap();
    let sink = FileSink::new(dir.path());
    sink.publish(&playing("Song X", PlaybackStatus::Playing), None).unwrap();

    let config = OverlayConfig::resolve(None, Some("animation=none&settle-delay=0&poll-interval=50ms"));
    let log = Shared::default();
    let client = OverlayClient::new(config, Recorder(log.clone()), Instant::now());
    let enricher = Arc::new(Enricher::new(Arc::new(ReleaseGroups), None, "http://direct/", None));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = run_client(client, Arc::new(FileFeed::new(dir.path())), Some(enricher), shutdown_rx);
    let scenario = async {
        assert!(eventually(|| log.lines().contains(&"enter Song X ".to_string())).await);
        assert!(eventually(|| log.lines().contains(&"enriched Some(2001)".to_string())).await);

        sink.publish(&playing("Song X", PlaybackStatus::Paused), None).unwrap();
        assert!(eventually(|| log.lines().contains(&"in-place false".to_string())).await);

        sink.publish(&playing("Song Y", PlaybackStatus::Playing), None).unwrap();
        assert!(eventually(|| log.lines().contains(&"enter Song Y ".to_string())).await);

        // Partially written or missing files are ignored
        std::fs::write(dir.path().join("nowplaying.json"), "{\"status\":").unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let _ = shutdown_tx.send(true);
    };

    let (client, ()) = tokio::join!(driver, scenario);
    assert_eq!(client.displayed(), Some(TrackIdentity::new("Song Y", "Artist Y", "Album Z")));
    assert!(client.is_visible());

    let lines = log.lines();
    let exit = lines.iter().position(|l| l == "exit").unwrap();
    let second_enter = lines.iter().position(|l| l == "enter Song Y ").unwrap();
    assert!(exit < second_enter);
}
