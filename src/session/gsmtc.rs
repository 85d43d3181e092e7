// Windows media session source (GlobalSystemMediaTransportControls)

use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use futures::executor::block_on;
use log::{debug, warn};
use windows::{
    core::Result as WinResult,
    Foundation::{DateTime as WinDateTime, TimeSpan, TypedEventHandler},
    Media::Control::{
        GlobalSystemMediaTransportControlsSession,
        GlobalSystemMediaTransportControlsSessionManager,
        GlobalSystemMediaTransportControlsSessionMediaProperties,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus,
    },
    Storage::Streams::{DataReader, InputStreamOptions},
    Win32::{
        Foundation::RPC_E_CHANGED_MODE,
        System::Com::{CoInitializeEx, COINIT_MULTITHREADED},
    },
};

use crate::data::PlaybackStatus;
use crate::session::source::{
    ChangeCallback, ChangeKind, MediaProperties, MediaSession, MediaSessionSource, SessionError, SubscriptionToken,
    TimelineReading,
};

const TICKS_PER_MS: i64 = 10_000;
/// 100ns ticks between 1601-01-01 and 1970-01-01
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;
const THUMBNAIL_CHUNK: u32 = 64 * 1024;

fn block_on_operation<O, T>(operation: O) -> WinResult<T>
where
    O: IntoFuture<Output = WinResult<T>>,
{
    block_on(operation.into_future())
}

fn span_to_ms(span: TimeSpan) -> u64 {
    (span.Duration / TICKS_PER_MS).max(0) as u64
}

fn win_time_to_utc(time: WinDateTime) -> Option<DateTime<Utc>> {
    if time.UniversalTime <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis((time.UniversalTime - UNIX_EPOCH_TICKS) / TICKS_PER_MS)
}

fn map_status(status: GlobalSystemMediaTransportControlsSessionPlaybackStatus) -> PlaybackStatus {
    match status {
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Closed => PlaybackStatus::Closed,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Opened => PlaybackStatus::Opened,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Changing => PlaybackStatus::Changing,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Playing => PlaybackStatus::Playing,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Paused => PlaybackStatus::Paused,
        _ => PlaybackStatus::Stopped,
    }
}

fn load_thumbnail_bytes(props: &GlobalSystemMediaTransportControlsSessionMediaProperties) -> WinResult<Option<Vec<u8>>> {
    let reference = match props.Thumbnail() {
        Ok(reference) => reference,
        Err(_) => return Ok(None),
    };

    let stream = block_on_operation(reference.OpenReadAsync()?)?;
    let input_stream = stream.GetInputStreamAt(0)?;
    let reader = DataReader::CreateDataReader(&input_stream)?;
    reader.SetInputStreamOptions(InputStreamOptions::Partial)?;

    let mut buffer = Vec::new();
    loop {
        let loaded = block_on_operation(reader.LoadAsync(THUMBNAIL_CHUNK)?)?;
        if loaded == 0 {
            break;
        }
        let mut chunk = vec![0u8; loaded as usize];
        reader.ReadBytes(&mut chunk)?;
        buffer.extend_from_slice(&chunk);
        if loaded < THUMBNAIL_CHUNK {
            break;
        }
    }

    Ok(if buffer.is_empty() { None } else { Some(buffer) })
}

pub struct GsmtcSession {
    session: GlobalSystemMediaTransportControlsSession,
    registrations: Mutex<HashMap<SubscriptionToken, (ChangeKind, i64)>>,
    next_token: AtomicU64,
}

impl GsmtcSession {
    fn new(session: GlobalSystemMediaTransportControlsSession) -> Self {
        Self {
            session,
            registrations: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    fn media_properties(&self) -> Result<GlobalSystemMediaTransportControlsSessionMediaProperties, SessionError> {
        self.session
            .TryGetMediaPropertiesAsync()
            .and_then(block_on_operation)
            .map_err(|e| SessionError::fetch("media properties", e))
    }
}

impl MediaSession for GsmtcSession {
    fn app_id(&self) -> String {
        self.session
            .SourceAppUserModelId()
            .map(|id| id.to_string_lossy())
            .unwrap_or_default()
    }

    fn properties(&self) -> Result<MediaProperties, SessionError> {
        let props = self.media_properties()?;
        let read = || -> WinResult<MediaProperties> {
            Ok(MediaProperties {
                title: props.Title()?.to_string_lossy(),
                artist: props.Artist()?.to_string_lossy(),
                album: props.AlbumTitle()?.to_string_lossy(),
            })
        };
        read().map_err(|e| SessionError::fetch("media properties", e))
    }

    fn timeline(&self) -> Result<TimelineReading, SessionError> {
        let read = || -> WinResult<TimelineReading> {
            let timeline = self.session.GetTimelineProperties()?;
            let start = span_to_ms(timeline.StartTime()?);
            let end = span_to_ms(timeline.EndTime()?);
            let position = span_to_ms(timeline.Position()?);
            Ok(TimelineReading {
                position_ms: position.saturating_sub(start),
                duration_ms: end.saturating_sub(start),
                last_updated: win_time_to_utc(timeline.LastUpdatedTime()?),
            })
        };
        read().map_err(|e| SessionError::fetch("timeline", e))
    }

    fn playback_status(&self) -> Result<PlaybackStatus, SessionError> {
        self.session
            .GetPlaybackInfo()
            .and_then(|info| info.PlaybackStatus())
            .map(map_status)
            .map_err(|e| SessionError::fetch("playback info", e))
    }

    fn thumbnail(&self) -> Result<Option<Vec<u8>>, SessionError> {
        let props = self.media_properties()?;
        load_thumbnail_bytes(&props).map_err(|e| SessionError::fetch("thumbnail", e))
    }

    fn subscribe(&self, kind: ChangeKind, callback: ChangeCallback) -> Result<SubscriptionToken, SessionError> {
        let registration = match kind {
            ChangeKind::Properties => self.session.MediaPropertiesChanged(&TypedEventHandler::new(move |_, _| {
                callback();
                Ok(())
            })),
            ChangeKind::Timeline => self.session.TimelinePropertiesChanged(&TypedEventHandler::new(move |_, _| {
                callback();
                Ok(())
            })),
            ChangeKind::Playback => self.session.PlaybackInfoChanged(&TypedEventHandler::new(move |_, _| {
                callback();
                Ok(())
            })),
        }
        .map_err(|e| SessionError::Subscribe(kind.as_str(), e.to_string()))?;

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut registrations) = self.registrations.lock() {
            registrations.insert(token, (kind, registration));
        }
        Ok(token)
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        let Some((kind, registration)) = self.registrations.lock().ok().and_then(|mut r| r.remove(&token)) else {
            return;
        };
        let result = match kind {
            ChangeKind::Properties => self.session.RemoveMediaPropertiesChanged(registration),
            ChangeKind::Timeline => self.session.RemoveTimelinePropertiesChanged(registration),
            ChangeKind::Playback => self.session.RemovePlaybackInfoChanged(registration),
        };
        if let Err(e) = result {
            debug!("Failed to remove {} handler: {}", kind.as_str(), e);
        }
    }
}

impl Drop for GsmtcSession {
    fn drop(&mut self) {
        let tokens: Vec<SubscriptionToken> = self
            .registrations
            .lock()
            .map(|r| r.keys().copied().collect())
            .unwrap_or_default();
        for token in tokens {
            self.unsubscribe(token);
        }
    }
}

/// The session manager of the Windows media transport controls
pub struct GsmtcSessionSource {
    manager: GlobalSystemMediaTransportControlsSessionManager,
    registrations: Mutex<HashMap<SubscriptionToken, i64>>,
    next_token: AtomicU64,
}

impl GsmtcSessionSource {
    pub fn new() -> Result<Self, SessionError> {
        // Join the multithreaded apartment so events arrive on pool threads
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            return Err(SessionError::Unavailable(format!("COM init failed: {hr:?}")));
        }

        let manager = GlobalSystemMediaTransportControlsSessionManager::RequestAsync()
            .and_then(block_on_operation)
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        Ok(Self {
            manager,
            registrations: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }
}

impl MediaSessionSource for GsmtcSessionSource {
    fn current_session(&self) -> Result<Option<Arc<dyn MediaSession>>, SessionError> {
        match self.manager.GetCurrentSession() {
            Ok(session) => Ok(Some(Arc::new(GsmtcSession::new(session)))),
            // A null current session surfaces as an error
            Err(e) => {
                debug!("No current session: {}", e);
                Ok(None)
            }
        }
    }

    fn subscribe_session_changed(&self, callback: ChangeCallback) -> Result<SubscriptionToken, SessionError> {
        let registration = self
            .manager
            .CurrentSessionChanged(&TypedEventHandler::new(move |_, _| {
                callback();
                Ok(())
            }))
            .map_err(|e| SessionError::Subscribe("current session", e.to_string()))?;

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut registrations) = self.registrations.lock() {
            registrations.insert(token, registration);
        }
        Ok(token)
    }

    fn unsubscribe_session_changed(&self, token: SubscriptionToken) {
        let Some(registration) = self.registrations.lock().ok().and_then(|mut r| r.remove(&token)) else {
            return;
        };
        if let Err(e) = self.manager.RemoveCurrentSessionChanged(registration) {
            warn!("Failed to remove session changed handler: {}", e);
        }
    }
}
