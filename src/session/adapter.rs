use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, JoinHandle};
use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, info, trace, warn};

use crate::data::{CoverBlob, PlaybackStatus, TrackIdentity};
use crate::session::source::{
    ChangeKind, MediaProperties, MediaSession, MediaSessionSource, SessionError, SubscriptionToken, TimelineReading,
};

/// Everything read from the current session in one recomputation
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReading {
    /// Generation of the attachment this reading was taken under
    pub generation: u64,
    pub app_id: String,
    pub properties: MediaProperties,
    pub status: PlaybackStatus,
    pub timeline: Option<TimelineReading>,
    pub cover: Option<CoverBlob>,
}

impl SessionReading {
    pub fn identity(&self) -> TrackIdentity {
        self.properties.identity()
    }
}

/// Receives the serialized, de-duplicated results of the adapter.
/// `None` means there is no current session.
pub trait SessionListener: Send + Sync {
    fn on_session_update(&self, reading: Option<SessionReading>);
}

enum Signal {
    Recompute { generation: u64 },
    SessionChanged,
    Shutdown,
}

struct Shared {
    source: Arc<dyn MediaSessionSource>,
    generation: AtomicU64,
    listeners: RwLock<Vec<Weak<dyn SessionListener>>>,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn notify(&self, reading: Option<SessionReading>) {
        let listeners: Vec<Arc<dyn SessionListener>> = match self.listeners.read() {
            Ok(listeners) => listeners.iter().filter_map(|l| l.upgrade()).collect(),
            Err(_) => {
                warn!("Failed to acquire read lock for session listeners");
                return;
            }
        };
        trace!("Notifying {} session listener(s)", listeners.len());
        for listener in listeners {
            listener.on_session_update(reading.clone());
        }
    }
}

struct Attached {
    session: Arc<dyn MediaSession>,
    tokens: Vec<SubscriptionToken>,
    generation: u64,
}

/// State owned by the worker thread
struct Worker {
    shared: Arc<Shared>,
    sender: Sender<Signal>,
    attached: Option<Attached>,
    /// Thumbnail of the track it was fetched for
    cover: Option<(TrackIdentity, CoverBlob)>,
}

impl Worker {
    fn run(mut self, receiver: Receiver<Signal>) {
        while let Ok(first) = receiver.recv() {
            let mut session_changed = false;
            let mut recompute = false;
            let mut shutdown = false;

            for signal in std::iter::once(first).chain(receiver.try_iter()) {
                match signal {
                    Signal::SessionChanged => session_changed = true,
                    Signal::Recompute { generation } => {
                        if self.shared.is_current(generation) {
                            recompute = true;
                        } else {
                            trace!("Dropping recompute request of stale generation {}", generation);
                        }
                    }
                    Signal::Shutdown => shutdown = true,
                }
            }

            if shutdown {
                break;
            }
            if session_changed {
                self.reattach();
            } else if recompute {
                self.recompute();
            }
        }

        self.detach();
        debug!("Session adapter worker stopped");
    }

    fn detach(&mut self) {
        if let Some(attached) = self.attached.take() {
            debug!("Detaching {} handler(s) from session of {}", attached.tokens.len(), attached.session.app_id());
            for token in attached.tokens {
                attached.session.unsubscribe(token);
            }
        }
        self.cover = None;
    }

    fn reattach(&mut self) {
        self.detach();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let session = match self.shared.source.current_session() {
            Ok(session) => session,
            Err(e) => {
                debug!("Could not get the current session: {}", e);
                None
            }
        };

        let Some(session) = session else {
            info!("No current media session");
            if self.shared.is_current(generation) {
                self.shared.notify(None);
            }
            return;
        };

        info!("Attaching to media session of {} (generation {})", session.app_id(), generation);
        let mut tokens = Vec::with_capacity(ChangeKind::ALL.len());
        for kind in ChangeKind::ALL {
            let sender = self.sender.clone();
            let callback = Arc::new(move || {
                let _ = sender.send(Signal::Recompute { generation });
            });
            match session.subscribe(kind, callback) {
                Ok(token) => tokens.push(token),
                Err(e) => warn!("{}", e),
            }
        }

        self.attached = Some(Attached { session, tokens, generation });
        self.recompute();
    }

    fn recompute(&mut self) {
        let Some(attached) = &self.attached else {
            return;
        };
        let generation = attached.generation;
        if !self.shared.is_current(generation) {
            return;
        }
        let session = attached.session.clone();

        let reading = match self.read_session(session.as_ref(), generation) {
            Ok(reading) => reading,
            Err(e) => {
                // Transient; the previous snapshot stays until the next event
                debug!("Skipping recomputation: {}", e);
                return;
            }
        };

        if !self.shared.is_current(generation) {
            debug!("Discarding reading of stale generation {}", generation);
            return;
        }
        self.shared.notify(Some(reading));
    }

    fn read_session(&mut self, session: &dyn MediaSession, generation: u64) -> Result<SessionReading, SessionError> {
        let properties = session.properties()?;
        let status = session.playback_status()?;
        let timeline = match session.timeline() {
            Ok(timeline) => Some(timeline),
            Err(e) => {
                debug!("Timeline unavailable: {}", e);
                None
            }
        };

        let identity = properties.identity();
        let cover = match &self.cover {
            Some((cached_for, blob)) if *cached_for == identity => Some(blob.clone()),
            _ => {
                self.cover = None;
                match session.thumbnail() {
                    Ok(Some(bytes)) => CoverBlob::from_bytes(bytes).map(|blob| {
                        debug!("Fetched {} byte thumbnail ({}) for {}", blob.len(), blob.content_type(), identity);
                        self.cover = Some((identity.clone(), blob.clone()));
                        blob
                    }),
                    Ok(None) => None,
                    Err(e) => {
                        debug!("Thumbnail unavailable, publishing without cover: {}", e);
                        None
                    }
                }
            }
        };

        Ok(SessionReading {
            generation,
            app_id: session.app_id(),
            properties,
            status,
            timeline,
            cover,
        })
    }
}

/// Turns the independent notifications of the current media session into one serialized
/// stream of readings.
///
/// All handlers only enqueue a signal; a single worker thread drains the queue, coalesces
/// bursts into one recomputation and tags each attachment with a generation number. Work
/// started under an older generation is discarded before it reaches the listeners.
pub struct SessionAdapter {
    shared: Arc<Shared>,
    sender: Sender<Signal>,
    source_token: Mutex<Option<SubscriptionToken>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionAdapter {
    pub fn new(source: Arc<dyn MediaSessionSource>) -> Self {
        let (sender, receiver) = channel::unbounded();
        let shared = Arc::new(Shared {
            source,
            generation: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        });

        let worker = Worker {
            shared: shared.clone(),
            sender: sender.clone(),
            attached: None,
            cover: None,
        };
        let handle = thread::Builder::new()
            .name("session-adapter".to_string())
            .spawn(move || worker.run(receiver));

        let worker = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn session adapter worker: {}", e);
                None
            }
        };

        Self {
            shared,
            sender,
            source_token: Mutex::new(None),
            worker: Mutex::new(worker),
        }
    }

    pub fn register_listener(&self, listener: Weak<dyn SessionListener>) {
        if let Ok(mut listeners) = self.shared.listeners.write() {
            listeners.retain(|l| l.strong_count() > 0);
            listeners.push(listener);
        } else {
            warn!("Failed to acquire write lock for session listeners");
        }
    }

    /// Subscribe to session replacement and attach to the current session
    pub fn start(&self) -> Result<(), SessionError> {
        let shared = Arc::downgrade(&self.shared);
        let sender = self.sender.clone();
        let token = self.shared.source.subscribe_session_changed(Arc::new(move || {
            // Invalidate in-flight work right away, before the worker gets to the signal
            if let Some(shared) = shared.upgrade() {
                shared.generation.fetch_add(1, Ordering::SeqCst);
            }
            let _ = sender.send(Signal::SessionChanged);
        }))?;

        if let Ok(mut slot) = self.source_token.lock() {
            *slot = Some(token);
        }
        let _ = self.sender.send(Signal::SessionChanged);
        Ok(())
    }

    /// Ask for a recomputation of the current session, e.g. after the filter rules changed
    pub fn refresh(&self) {
        let generation = self.generation();
        let _ = self.sender.send(Signal::Recompute { generation });
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Detach from the source and stop the worker. Safe to call more than once.
    pub fn stop(&self) {
        if let Some(token) = self.source_token.lock().ok().and_then(|mut slot| slot.take()) {
            self.shared.source.unsubscribe_session_changed(token);
        }

        let handle = self.worker.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = self.sender.send(Signal::Shutdown);
            if handle.join().is_err() {
                warn!("Session adapter worker panicked");
            }
        }
    }
}

impl Drop for SessionAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::manual::{ManualSession, ManualSessionSource};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<Option<SessionReading>>>,
        busy: std::sync::atomic::AtomicBool,
        overlapped: std::sync::atomic::AtomicBool,
    }

    impl SessionListener for Recorder {
        fn on_session_update(&self, reading: Option<SessionReading>) {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(1));
            self.updates.lock().unwrap().push(reading);
            self.busy.store(false, Ordering::SeqCst);
        }
    }

    impl Recorder {
        fn wait_for<F: Fn(&[Option<SessionReading>]) -> bool>(&self, condition: F) -> bool {
            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                if condition(&self.updates.lock().unwrap()) {
                    return true;
                }
                thread::sleep(Duration::from_millis(5));
            }
            false
        }

        fn titles(&self) -> Vec<Option<String>> {
            self.updates
                .lock()
                .unwrap()
                .iter()
                .map(|u| u.as_ref().map(|r| r.properties.title.clone()))
                .collect()
        }
    }

    fn started(source: &Arc<ManualSessionSource>) -> (SessionAdapter, Arc<Recorder>) {
        let adapter = SessionAdapter::new(source.clone());
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn SessionListener> = Arc::downgrade(&(recorder.clone() as Arc<dyn SessionListener>));
        adapter.register_listener(weak);
        adapter.start().unwrap();
        (adapter, recorder)
    }

    fn playing(app: &str, title: &str) -> Arc<ManualSession> {
        let session = ManualSession::new(app);
        session.set_track(title, "Artist Y", "Album Z");
        session.set_status(PlaybackStatus::Playing);
        session
    }

    #[test]
    fn test_no_session_reports_none() {
        let source = ManualSessionSource::new();
        let (adapter, recorder) = started(&source);
        assert!(recorder.wait_for(|u| u.len() == 1));
        assert_eq!(recorder.updates.lock().unwrap()[0], None);
        adapter.stop();
    }

    #[test]
    fn test_reading_of_current_session() {
        let source = ManualSessionSource::new();
        let session = playing("Spotify.exe", "Song X");
        session.set_timeline(12_000, 200_000);
        session.set_thumbnail(Some(vec![0xFF, 0xD8, 0xFF, 0xE0]));
        source.set_current(Some(session));

        let (adapter, recorder) = started(&source);
        assert!(recorder.wait_for(|u| !u.is_empty()));
        let reading = recorder.updates.lock().unwrap()[0].clone().unwrap();
        assert_eq!(reading.app_id, "Spotify.exe");
        assert_eq!(reading.properties.title, "Song X");
        assert_eq!(reading.status, PlaybackStatus::Playing);
        assert_eq!(reading.timeline.unwrap().duration_ms, 200_000);
        assert_eq!(reading.cover.unwrap().content_type(), "image/jpeg");
        adapter.stop();
    }

    #[test]
    fn test_reattach_detaches_previous_handlers() {
        let source = ManualSessionSource::new();
        let first = playing("Spotify.exe", "Song X");
        source.set_current(Some(first.clone()));
        let (adapter, recorder) = started(&source);
        assert!(recorder.wait_for(|u| !u.is_empty()));
        assert_eq!(first.subscriber_count(), 3);

        let second = playing("vlc.exe", "Song Q");
        for _ in 0..5 {
            source.set_current(Some(second.clone()));
        }
        assert!(recorder.wait_for(|_| first.subscriber_count() == 0 && second.subscriber_count() == 3));

        // Events of the detached session are no longer heard
        let before = recorder.updates.lock().unwrap().len();
        first.set_track("Ghost", "Nobody", "Nowhere");
        thread::sleep(Duration::from_millis(100));
        let titles = recorder.titles();
        assert!(titles[before..].iter().all(|t| t.as_deref() != Some("Ghost")));
        adapter.stop();
        assert_eq!(second.subscriber_count(), 0);
    }

    #[test]
    fn test_stale_generation_result_discarded() {
        let source = ManualSessionSource::new();
        let slow = playing("Spotify.exe", "Slow Song");
        slow.set_fetch_delay(Duration::from_millis(300));
        source.set_current(Some(slow));

        let (adapter, recorder) = started(&source);
        // Replace the session while the first reading is still in flight
        thread::sleep(Duration::from_millis(50));
        source.set_current(Some(playing("Spotify.exe", "Fast Song")));

        assert!(recorder.wait_for(|u| u.iter().any(|r| r.as_ref().map(|r| r.properties.title.as_str()) == Some("Fast Song"))));
        thread::sleep(Duration::from_millis(350));
        assert!(!recorder.titles().contains(&Some("Slow Song".to_string())));
        adapter.stop();
    }

    #[test]
    fn test_concurrent_events_serialized_and_latest_wins() {
        let source = ManualSessionSource::new();
        let session = playing("Spotify.exe", "Song 0");
        source.set_current(Some(session.clone()));
        let (adapter, recorder) = started(&source);
        assert!(recorder.wait_for(|u| !u.is_empty()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let session = session.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        match i % 3 {
                            0 => session.set_status(PlaybackStatus::Playing),
                            1 => session.set_timeline(1_000, 200_000),
                            _ => session.touch_properties(),
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        session.set_track("Song Final", "Artist Y", "Album Z");

        assert!(recorder.wait_for(|u| {
            u.last().and_then(|r| r.as_ref()).map(|r| r.properties.title.as_str()) == Some("Song Final")
        }));
        assert!(!recorder.overlapped.load(Ordering::SeqCst));
        adapter.stop();
    }

    #[test]
    fn test_properties_failure_keeps_previous() {
        let source = ManualSessionSource::new();
        let session = playing("Spotify.exe", "Song X");
        source.set_current(Some(session.clone()));
        let (adapter, recorder) = started(&source);
        assert!(recorder.wait_for(|u| u.len() == 1));

        session.fail_properties(true);
        session.set_status(PlaybackStatus::Paused);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(recorder.updates.lock().unwrap().len(), 1);

        session.fail_properties(false);
        session.set_status(PlaybackStatus::Paused);
        assert!(recorder.wait_for(|u| u.len() == 2));
        adapter.stop();
    }

    #[test]
    fn test_thumbnail_fetched_once_per_track() {
        let source = ManualSessionSource::new();
        let session = playing("Spotify.exe", "Song X");
        session.set_thumbnail(Some(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]));
        source.set_current(Some(session.clone()));
        let (adapter, recorder) = started(&source);
        assert!(recorder.wait_for(|u| u.len() == 1));
        let fetches = session.thumbnail_fetches();

        session.set_timeline(5_000, 100_000);
        assert!(recorder.wait_for(|u| u.len() == 2));
        assert_eq!(session.thumbnail_fetches(), fetches);
        assert!(recorder.updates.lock().unwrap()[1].as_ref().unwrap().cover.is_some());

        session.set_track("Song Y", "Artist Y", "Album Z");
        assert!(recorder.wait_for(|u| u.len() == 3));
        assert_eq!(session.thumbnail_fetches(), fetches + 1);
        adapter.stop();
    }

    #[test]
    fn test_thumbnail_failure_yields_no_cover() {
        let source = ManualSessionSource::new();
        let session = playing("Spotify.exe", "Song X");
        session.set_thumbnail(Some(vec![0xFF, 0xD8]));
        session.fail_thumbnail(true);
        source.set_current(Some(session));
        let (adapter, recorder) = started(&source);
        assert!(recorder.wait_for(|u| u.len() == 1));
        let reading = recorder.updates.lock().unwrap()[0].clone().unwrap();
        assert!(reading.cover.is_none());
        assert_eq!(reading.properties.title, "Song X");
        adapter.stop();
    }
}
