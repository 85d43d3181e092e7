use std::time::{Duration, Instant};

/// What the QR cycle wants shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrAction {
    ShowQr,
    ShowMusic,
}

/// Alternates between the music view and the QR view on its own clock.
/// The only coupling with track changes is [`QrCycle::reset`].
#[derive(Debug)]
pub struct QrCycle {
    interval: Duration,
    duration: Duration,
    enabled: bool,
    showing: bool,
    next_show: Option<Instant>,
    hide_at: Option<Instant>,
}

impl QrCycle {
    pub fn new(enabled: bool, interval: Duration, duration: Duration) -> Self {
        Self {
            interval,
            duration,
            enabled,
            showing: false,
            next_show: None,
            hide_at: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.enabled {
            self.next_show = Some(now + self.interval);
        }
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.next_show, self.hide_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Advance to `now`. `can_show` is false while no track is visible; the cycle keeps
    /// its rhythm but skips that showing.
    pub fn fire(&mut self, now: Instant, can_show: bool) -> Option<QrAction> {
        if self.hide_at.is_some_and(|at| at <= now) {
            self.hide_at = None;
            self.showing = false;
            return Some(QrAction::ShowMusic);
        }

        self.next_show.filter(|at| *at <= now)?;
        self.next_show = Some(now + self.interval);
        if !can_show || self.showing {
            return None;
        }
        self.showing = true;
        self.hide_at = Some(now + self.duration);
        Some(QrAction::ShowQr)
    }

    /// Back to the music view and restart the interval. Returns whether the QR view was showing.
    pub fn reset(&mut self, now: Instant) -> bool {
        let was_showing = self.showing;
        self.showing = false;
        self.hide_at = None;
        self.start(now);
        was_showing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(60);
    const SHOW: Duration = Duration::from_secs(10);

    #[test]
    fn test_cycle_alternates() {
        let start = Instant::now();
        let mut qr = QrCycle::new(true, INTERVAL, SHOW);
        qr.start(start);
        assert_eq!(qr.next_deadline(), Some(start + INTERVAL));

        assert_eq!(qr.fire(start + Duration::from_secs(30), true), None);
        assert_eq!(qr.fire(start + INTERVAL, true), Some(QrAction::ShowQr));
        assert!(qr.is_showing());
        assert_eq!(qr.next_deadline(), Some(start + INTERVAL + SHOW));
        assert_eq!(qr.fire(start + INTERVAL + SHOW, true), Some(QrAction::ShowMusic));
        assert_eq!(qr.next_deadline(), Some(start + INTERVAL * 2));
    }

    #[test]
    fn test_skips_when_nothing_visible() {
        let start = Instant::now();
        let mut qr = QrCycle::new(true, INTERVAL, SHOW);
        qr.start(start);
        assert_eq!(qr.fire(start + INTERVAL, false), None);
        assert!(!qr.is_showing());
        assert_eq!(qr.next_deadline(), Some(start + INTERVAL * 2));
    }

    #[test]
    fn test_reset_returns_to_music() {
        let start = Instant::now();
        let mut qr = QrCycle::new(true, INTERVAL, SHOW);
        qr.start(start);
        qr.fire(start + INTERVAL, true);

        let now = start + INTERVAL + Duration::from_secs(2);
        assert!(qr.reset(now));
        assert!(!qr.is_showing());
        assert_eq!(qr.next_deadline(), Some(now + INTERVAL));
    }

    #[test]
    fn test_disabled_never_fires() {
        let start = Instant::now();
        let mut qr = QrCycle::new(false, INTERVAL, SHOW);
        qr.start(start);
        assert_eq!(qr.next_deadline(), None);
        assert_eq!(qr.fire(start + INTERVAL, true), None);
    }
}
