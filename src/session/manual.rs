use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::data::PlaybackStatus;
use crate::session::source::{
    ChangeCallback, ChangeKind, MediaProperties, MediaSession, MediaSessionSource, SessionError, SubscriptionToken,
    TimelineReading,
};

#[derive(Debug, Clone, Default)]
struct SessionState {
    properties: MediaProperties,
    status: PlaybackStatus,
    position_ms: u64,
    duration_ms: u64,
    position_updated: Option<DateTime<Utc>>,
    thumbnail: Option<Vec<u8>>,
}

/// A session whose state is set by hand. Every setter fires the matching change
/// notification, from the calling thread, like a platform would.
pub struct ManualSession {
    app_id: String,
    state: RwLock<SessionState>,
    subscribers: Mutex<HashMap<SubscriptionToken, (ChangeKind, ChangeCallback)>>,
    next_token: AtomicU64,
    fail_properties: AtomicBool,
    fail_thumbnail: AtomicBool,
    fetch_delay: Mutex<Duration>,
    thumbnail_fetches: AtomicUsize,
}

impl ManualSession {
    pub fn new(app_id: &str) -> Arc<Self> {
        Arc::new(Self {
            app_id: app_id.to_string(),
            state: RwLock::new(SessionState::default()),
            subscribers: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            fail_properties: AtomicBool::new(false),
            fail_thumbnail: AtomicBool::new(false),
            fetch_delay: Mutex::new(Duration::ZERO),
            thumbnail_fetches: AtomicUsize::new(0),
        })
    }

    fn update<F: FnOnce(&mut SessionState)>(&self, kind: ChangeKind, change: F) {
        if let Ok(mut state) = self.state.write() {
            change(&mut state);
        }
        self.fire(kind);
    }

    fn snapshot(&self) -> SessionState {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn fire(&self, kind: ChangeKind) {
        let callbacks: Vec<ChangeCallback> = match self.subscribers.lock() {
            Ok(subscribers) => subscribers
                .values()
                .filter(|(k, _)| *k == kind)
                .map(|(_, cb)| cb.clone())
                .collect(),
            Err(_) => return,
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn set_track(&self, title: &str, artist: &str, album: &str) {
        self.update(ChangeKind::Properties, |s| {
            s.properties = MediaProperties {
                title: title.to_string(),
                artist: artist.to_string(),
                album: album.to_string(),
            };
        });
    }

    /// Fire a properties notification without changing anything
    pub fn touch_properties(&self) {
        self.fire(ChangeKind::Properties);
    }

    pub fn set_status(&self, status: PlaybackStatus) {
        self.update(ChangeKind::Playback, |s| s.status = status);
    }

    pub fn set_timeline(&self, position_ms: u64, duration_ms: u64) {
        self.update(ChangeKind::Timeline, |s| {
            s.position_ms = position_ms;
            s.duration_ms = duration_ms;
            s.position_updated = Some(Utc::now());
        });
    }

    pub fn set_thumbnail(&self, thumbnail: Option<Vec<u8>>) {
        self.update(ChangeKind::Properties, |s| s.thumbnail = thumbnail);
    }

    pub fn fail_properties(&self, fail: bool) {
        self.fail_properties.store(fail, Ordering::SeqCst);
    }

    pub fn fail_thumbnail(&self, fail: bool) {
        self.fail_thumbnail.store(fail, Ordering::SeqCst);
    }

    /// Make property reads take this long, to simulate a slow platform
    pub fn set_fetch_delay(&self, delay: Duration) {
        if let Ok(mut d) = self.fetch_delay.lock() {
            *d = delay;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn thumbnail_fetches(&self) -> usize {
        self.thumbnail_fetches.load(Ordering::SeqCst)
    }
}

impl MediaSession for ManualSession {
    fn app_id(&self) -> String {
        self.app_id.clone()
    }

    fn properties(&self) -> Result<MediaProperties, SessionError> {
        let delay = self.fetch_delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.fail_properties.load(Ordering::SeqCst) {
            return Err(SessionError::fetch("media properties", "simulated failure"));
        }
        Ok(self.snapshot().properties)
    }

    fn timeline(&self) -> Result<TimelineReading, SessionError> {
        let state = self.snapshot();
        Ok(TimelineReading {
            position_ms: state.position_ms,
            duration_ms: state.duration_ms,
            last_updated: state.position_updated,
        })
    }

    fn playback_status(&self) -> Result<PlaybackStatus, SessionError> {
        Ok(self.snapshot().status)
    }

    fn thumbnail(&self) -> Result<Option<Vec<u8>>, SessionError> {
        self.thumbnail_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_thumbnail.load(Ordering::SeqCst) {
            return Err(SessionError::fetch("thumbnail", "simulated failure"));
        }
        Ok(self.snapshot().thumbnail)
    }

    fn subscribe(&self, kind: ChangeKind, callback: ChangeCallback) -> Result<SubscriptionToken, SessionError> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .map_err(|_| SessionError::Subscribe(kind.as_str(), "lock poisoned".to_string()))?
            .insert(token, (kind, callback));
        Ok(token)
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&token);
        }
    }
}

/// One line of the JSON event protocol
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionEvent {
    pub app_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub status: Option<PlaybackStatus>,
    pub duration_ms: Option<u64>,
    pub position_ms: Option<u64>,
    /// Image file to use as the session thumbnail
    pub thumbnail_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// `{"session":null}`: there is no current session any more
    Clear,
    Update(SessionEvent),
}

impl SessionCommand {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        if value.get("session").map(|s| s.is_null()).unwrap_or(false) {
            return Ok(SessionCommand::Clear);
        }
        Ok(SessionCommand::Update(serde_json::from_value(value)?))
    }
}

/// In-process session source. Drivable from code, and from newline-delimited JSON events.
pub struct ManualSessionSource {
    current: RwLock<Option<Arc<ManualSession>>>,
    subscribers: Mutex<HashMap<SubscriptionToken, ChangeCallback>>,
    next_token: AtomicU64,
}

impl ManualSessionSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(None),
            subscribers: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }

    pub fn current(&self) -> Option<Arc<ManualSession>> {
        self.current.read().ok().and_then(|c| c.clone())
    }

    /// Replace the current session and fire the session-changed notification
    pub fn set_current(&self, session: Option<Arc<ManualSession>>) {
        if let Ok(mut current) = self.current.write() {
            *current = session;
        }
        let callbacks: Vec<ChangeCallback> = match self.subscribers.lock() {
            Ok(subscribers) => subscribers.values().cloned().collect(),
            Err(_) => return,
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn apply(&self, command: SessionCommand) {
        let event = match command {
            SessionCommand::Clear => {
                debug!("Clearing the current session");
                self.set_current(None);
                return;
            }
            SessionCommand::Update(event) => event,
        };

        let thumbnail = event.thumbnail_path.as_ref().and_then(|path| match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Could not read thumbnail {:?}: {}", path, e);
                None
            }
        });

        let existing = self.current().filter(|s| s.app_id == event.app_id);
        let session = existing.clone().unwrap_or_else(|| ManualSession::new(&event.app_id));
        let state = session.snapshot();

        let properties = MediaProperties {
            title: event.title.clone(),
            artist: event.artist.clone(),
            album: event.album.clone(),
        };
        if state.properties != properties || thumbnail.is_some() {
            if let Ok(mut s) = session.state.write() {
                s.properties = properties;
                s.thumbnail = thumbnail;
            }
            session.fire(ChangeKind::Properties);
        }
        if let Some(status) = event.status.filter(|s| *s != state.status) {
            session.set_status(status);
        }
        if event.position_ms.is_some() || event.duration_ms.is_some() {
            session.set_timeline(
                event.position_ms.unwrap_or(state.position_ms),
                event.duration_ms.unwrap_or(state.duration_ms),
            );
        }

        if existing.is_none() {
            info!("New session for {}", event.app_id);
            self.set_current(Some(session));
        }
    }

    /// Parse and apply one protocol line
    pub fn apply_line(&self, line: &str) -> Result<(), serde_json::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.apply(SessionCommand::parse(line)?);
        Ok(())
    }

    /// Feed events from standard input until it is closed
    pub fn spawn_stdin_reader(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let source = Arc::clone(self);
        thread::Builder::new().name("stdin-events".to_string()).spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if let Err(e) = source.apply_line(&line) {
                            warn!("Ignoring invalid session event '{}': {}", line, e);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read session events: {}", e);
                        break;
                    }
                }
            }
            debug!("Session event input closed");
        })
    }
}

impl MediaSessionSource for ManualSessionSource {
    fn current_session(&self) -> Result<Option<Arc<dyn MediaSession>>, SessionError> {
        Ok(self.current().map(|s| s as Arc<dyn MediaSession>))
    }

    fn subscribe_session_changed(&self, callback: ChangeCallback) -> Result<SubscriptionToken, SessionError> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .map_err(|_| SessionError::Subscribe("session", "lock poisoned".to_string()))?
            .insert(token, callback);
        Ok(token)
    }

    fn unsubscribe_session_changed(&self, token: SubscriptionToken) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(SessionCommand::parse(r#"{"session":null}"#).unwrap(), SessionCommand::Clear);
        let cmd = SessionCommand::parse(
            r#"{"app_id":"Spotify.exe","title":"Song X","artist":"Artist Y","album":"Album Z","status":"Playing","duration_ms":200000,"position_ms":1000}"#,
        )
        .unwrap();
        match cmd {
            SessionCommand::Update(event) => {
                assert_eq!(event.app_id, "Spotify.exe");
                assert_eq!(event.status, Some(PlaybackStatus::Playing));
                assert_eq!(event.duration_ms, Some(200_000));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(SessionCommand::parse("not json").is_err());
        assert!(SessionCommand::parse(r#"{"status":"Rewinding"}"#).is_err());
    }

    #[test]
    fn test_apply_line_creates_and_updates_session() {
        let source = ManualSessionSource::new();
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        source
            .subscribe_session_changed(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        source
            .apply_line(r#"{"app_id":"Spotify.exe","title":"Song X","artist":"Artist Y","album":"Album Z","status":"Playing"}"#)
            .unwrap();
        let session = source.current().unwrap();
        assert_eq!(session.properties().unwrap().title, "Song X");
        assert_eq!(session.playback_status().unwrap(), PlaybackStatus::Playing);
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        // Same app: the session is updated in place
        source
            .apply_line(r#"{"app_id":"Spotify.exe","title":"Song X","artist":"Artist Y","album":"Album Z","status":"Paused","position_ms":5000}"#)
            .unwrap();
        assert!(Arc::ptr_eq(&session, &source.current().unwrap()));
        assert_eq!(session.playback_status().unwrap(), PlaybackStatus::Paused);
        assert_eq!(session.timeline().unwrap().position_ms, 5000);
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        source.apply_line(r#"{"session":null}"#).unwrap();
        assert!(source.current().is_none());
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_setters_fire_matching_kind() {
        let session = ManualSession::new("app");
        let fired = Arc::new(Mutex::new(Vec::new()));
        for kind in ChangeKind::ALL {
            let fired = fired.clone();
            session.subscribe(kind, Arc::new(move || fired.lock().unwrap().push(kind))).unwrap();
        }
        session.set_status(PlaybackStatus::Paused);
        session.set_timeline(1, 2);
        session.set_track("a", "b", "c");
        assert_eq!(
            *fired.lock().unwrap(),
            vec![ChangeKind::Playback, ChangeKind::Timeline, ChangeKind::Properties]
        );
    }
}
