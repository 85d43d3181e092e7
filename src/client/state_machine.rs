use std::time::Instant;
use chrono::{DateTime, Utc};
use log::{debug, trace};
use strum_macros::Display;

use crate::client::config::OverlayConfig;
use crate::client::progress::extrapolate_progress;
use crate::client::qr::{QrAction, QrCycle};
use crate::client::renderer::{Renderer, TrackView};
use crate::client::timers::{TimerKind, TimerSet};
use crate::data::{NowPlayingSnapshot, TrackIdentity};
use crate::helpers::musicbrainz::TrackMetadata;

/// Named states of the overlay.
///
/// | from            | event                        | to                                 |
/// |-----------------|------------------------------|------------------------------------|
/// | any             | identity differs / forced    | Settling (with settle delay)       |
/// | Settling        | settle timer                 | classify latest value              |
/// | Idle, Waiting   | track change committed       | Entering                           |
/// | Entering        | transition timer             | Visible                            |
/// | Visible         | track change committed       | Exiting, then Entering(new)        |
/// | Visible         | auto-hide timer              | Exiting, then WaitingInterval      |
/// | WaitingInterval | repeat timer                 | forced refresh on next poll        |
/// | Visible         | same track, toggle           | Visible (updated in place)         |
/// | Waiting, Idle   | same track, toggle           | Entering                           |
/// | Exiting         | transition timer             | Entering(next), Idle or Waiting    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ClientState {
    Idle,
    Settling,
    Entering,
    Visible,
    Exiting,
    WaitingInterval,
}

#[derive(Debug, Clone)]
enum AfterExit {
    Enter(NowPlayingSnapshot),
    Idle,
    WaitInterval,
}

fn track_identity(snapshot: &NowPlayingSnapshot) -> Option<TrackIdentity> {
    snapshot.identity().filter(|identity| !identity.is_empty())
}

type CoverLocation = Box<dyn Fn(&str) -> String + Send>;

/// The overlay client's reconciliation logic, driven by polls, timer ticks and enrichment
/// results. It performs no I/O itself: presentation goes to the renderer and enrichment
/// requests are queued for the driver.
pub struct OverlayClient<R: Renderer> {
    config: OverlayConfig,
    renderer: R,
    phase: ClientState,
    displayed: Option<NowPlayingSnapshot>,
    /// Latest value seen while a settle is pending
    pending: Option<NowPlayingSnapshot>,
    after_exit: Option<AfterExit>,
    force_refresh: bool,
    timers: TimerSet,
    qr: QrCycle,
    enrichment_requests: Vec<TrackIdentity>,
    cover_location: Option<CoverLocation>,
}

impl<R: Renderer> OverlayClient<R> {
    pub fn new(config: OverlayConfig, renderer: R, now: Instant) -> Self {
        let mut qr = QrCycle::new(config.qr_enabled(), config.qr_interval, config.qr_duration);
        qr.start(now);
        Self {
            config,
            renderer,
            phase: ClientState::Idle,
            displayed: None,
            pending: None,
            after_exit: None,
            force_refresh: false,
            timers: TimerSet::new(),
            qr,
            enrichment_requests: Vec::new(),
            cover_location: None,
        }
    }

    /// Map snapshot cover paths to locations the renderer can load
    pub fn with_cover_location(mut self, locate: impl Fn(&str) -> String + Send + 'static) -> Self {
        self.cover_location = Some(Box::new(locate));
        self
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn state(&self) -> ClientState {
        if self.pending.is_some() {
            ClientState::Settling
        } else {
            self.phase
        }
    }

    pub fn displayed(&self) -> Option<TrackIdentity> {
        self.displayed.as_ref().and_then(track_identity)
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.phase, ClientState::Entering | ClientState::Visible)
    }

    pub fn qr_showing(&self) -> bool {
        self.qr.is_showing()
    }

    pub fn active_timers(&self) -> Vec<TimerKind> {
        self.timers.active()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.timers.next_deadline(), self.qr.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn take_enrichment_requests(&mut self) -> Vec<TrackIdentity> {
        std::mem::take(&mut self.enrichment_requests)
    }

    /// Treat the next poll as a track change even if the identity is unchanged
    pub fn force_refresh(&mut self) {
        self.force_refresh = true;
    }

    pub fn on_poll(&mut self, snapshot: NowPlayingSnapshot, now: Instant, wall: DateTime<Utc>) {
        if self.pending.is_some() {
            // Only the value present when the settle fires counts
            self.pending = Some(snapshot);
            return;
        }
        self.classify(snapshot, now, wall, true);
    }

    /// Fire every timer due at `now`
    pub fn on_tick(&mut self, now: Instant, wall: DateTime<Utc>) {
        while let Some(kind) = self.timers.pop_due(now) {
            trace!("Timer {} fired in {}", kind, self.state());
            self.on_timer(kind, now, wall);
        }

        while let Some(action) = self.qr.fire(now, self.is_visible()) {
            match action {
                QrAction::ShowQr => self.renderer.show_qr(&self.config.qr_url, &self.config.qr_text),
                QrAction::ShowMusic => self.renderer.show_music(),
            }
        }
    }

    /// Apply an enrichment result if its track is still the displayed one
    pub fn on_enrichment(&mut self, identity: &TrackIdentity, metadata: &TrackMetadata) {
        if self.displayed().as_ref() != Some(identity) {
            debug!("Discarding enrichment for {}, no longer displayed", identity);
            return;
        }
        if !metadata.is_empty() {
            self.renderer.apply_enrichment(metadata);
        }
    }

    fn classify(&mut self, snapshot: NowPlayingSnapshot, now: Instant, wall: DateTime<Utc>, allow_settle: bool) {
        let incoming = track_identity(&snapshot);
        let shown = self.displayed();

        if incoming != shown || self.force_refresh {
            if allow_settle {
                if let Some(delay) = self.config.settle_delay() {
                    self.pending = Some(snapshot);
                    self.timers.schedule(TimerKind::Settle, now, delay);
                    return;
                }
            }
            self.force_refresh = false;
            self.commit_track_change(snapshot, now, wall);
            return;
        }

        let Some(previous) = self.displayed.replace(snapshot.clone()) else {
            return;
        };
        let toggled = previous.is_playing() != snapshot.is_playing();

        match (toggled, self.phase) {
            (true, ClientState::Entering | ClientState::Visible) => {
                let view = self.view(&snapshot, wall);
                self.renderer.update_in_place(&view);
            }
            (true, ClientState::Exiting) => {
                self.after_exit = Some(AfterExit::Enter(snapshot));
            }
            (true, _) => {
                // Hidden: run a full cycle so the change is still seen
                self.timers.cancel_all();
                self.enter(snapshot, now, wall);
            }
            (false, ClientState::Entering | ClientState::Visible) => {
                if let Some(track) = snapshot.track() {
                    let progress = extrapolate_progress(track, wall, self.config.stale_after);
                    self.renderer.progress(progress, track.duration_ms);
                }
            }
            (false, ClientState::Exiting) => {
                // The latest value replaces a queued track change
                if !matches!(self.after_exit, Some(AfterExit::WaitInterval)) {
                    self.after_exit = Some(AfterExit::Enter(snapshot));
                }
            }
            (false, _) => {}
        }
    }

    fn commit_track_change(&mut self, snapshot: NowPlayingSnapshot, now: Instant, wall: DateTime<Utc>) {
        debug!("Track change in {}: {}", self.phase, snapshot);
        if self.phase == ClientState::Exiting {
            self.timers.cancel_all_except(&[TimerKind::Transition]);
        } else {
            self.timers.cancel_all();
        }
        if self.qr.reset(now) {
            self.renderer.show_music();
        }

        let next = track_identity(&snapshot).map(|_| snapshot);
        match self.phase {
            ClientState::Entering | ClientState::Visible => {
                self.renderer.exit(self.config.animation);
                let after = next.map(AfterExit::Enter).unwrap_or(AfterExit::Idle);
                self.begin_exit(after, now, wall);
            }
            ClientState::Exiting => {
                self.after_exit = Some(next.map(AfterExit::Enter).unwrap_or(AfterExit::Idle));
            }
            _ => match next {
                Some(snapshot) => self.enter(snapshot, now, wall),
                None => {
                    self.displayed = None;
                    self.phase = ClientState::Idle;
                }
            },
        }
    }

    fn enter(&mut self, snapshot: NowPlayingSnapshot, now: Instant, wall: DateTime<Utc>) {
        let view = self.view(&snapshot, wall);
        if let Some(identity) = track_identity(&snapshot) {
            self.enrichment_requests.push(identity);
        }
        self.displayed = Some(snapshot);
        self.phase = ClientState::Entering;
        self.renderer.enter(&view, self.config.animation);

        let duration = self.config.transition_duration();
        if duration.is_zero() {
            self.finish_enter(now);
        } else {
            self.timers.schedule(TimerKind::Transition, now, duration);
        }
    }

    fn finish_enter(&mut self, now: Instant) {
        self.phase = ClientState::Visible;
        if let Some(auto_hide) = self.config.auto_hide() {
            self.timers.schedule(TimerKind::AutoHide, now, auto_hide);
        }
    }

    fn begin_exit(&mut self, after: AfterExit, now: Instant, wall: DateTime<Utc>) {
        self.phase = ClientState::Exiting;
        self.after_exit = Some(after);
        let duration = self.config.transition_duration();
        if duration.is_zero() {
            self.finish_exit(now, wall);
        } else {
            self.timers.schedule(TimerKind::Transition, now, duration);
        }
    }

    fn finish_exit(&mut self, now: Instant, wall: DateTime<Utc>) {
        match self.after_exit.take() {
            Some(AfterExit::Enter(snapshot)) => self.enter(snapshot, now, wall),
            Some(AfterExit::WaitInterval) => {
                self.phase = ClientState::WaitingInterval;
                if let Some(repeat) = self.config.repeat_interval() {
                    self.timers.schedule(TimerKind::Repeat, now, repeat);
                }
            }
            Some(AfterExit::Idle) | None => {
                self.displayed = None;
                self.phase = ClientState::Idle;
            }
        }
    }

    fn on_timer(&mut self, kind: TimerKind, now: Instant, wall: DateTime<Utc>) {
        match kind {
            TimerKind::Settle => {
                if let Some(latest) = self.pending.take() {
                    self.classify(latest, now, wall, false);
                }
            }
            TimerKind::Transition => match self.phase {
                ClientState::Exiting => self.finish_exit(now, wall),
                ClientState::Entering => self.finish_enter(now),
                _ => {}
            },
            TimerKind::AutoHide => {
                if self.phase == ClientState::Visible {
                    self.renderer.exit(self.config.animation);
                    self.begin_exit(AfterExit::WaitInterval, now, wall);
                }
            }
            TimerKind::Repeat => {
                if self.phase == ClientState::WaitingInterval {
                    self.force_refresh = true;
                }
            }
        }
    }

    fn view(&self, snapshot: &NowPlayingSnapshot, wall: DateTime<Utc>) -> TrackView {
        let Some(track) = snapshot.track() else {
            return TrackView {
                title: String::new(),
                artist: String::new(),
                album: String::new(),
                is_playing: false,
                progress_ms: 0,
                duration_ms: 0,
                cover: None,
            };
        };
        let mut view = TrackView::from_track(track, extrapolate_progress(track, wall, self.config.stale_after));
        if let (Some(locate), Some(cover)) = (&self.cover_location, view.cover.as_deref()) {
            view.cover = Some(locate(cover));
        }
        view
    }
}
