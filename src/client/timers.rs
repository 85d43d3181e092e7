use std::collections::HashMap;
use std::time::{Duration, Instant};
use strum_macros::Display;

/// Timers owned by the track state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TimerKind {
    /// Commit a pending track change
    Settle,
    /// An enter or exit animation has finished
    Transition,
    /// The overlay has been visible for the auto-hide duration
    AutoHide,
    /// The hidden track is due to be shown again
    Repeat,
}

/// One deadline per kind. Scheduling a kind again replaces its deadline.
#[derive(Debug, Default)]
pub struct TimerSet {
    deadlines: HashMap<TimerKind, Instant>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TimerKind, now: Instant, after: Duration) {
        self.deadlines.insert(kind, now + after);
    }

    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.deadlines.remove(&kind).is_some()
    }

    /// Cancel every timer except the given kinds
    pub fn cancel_all_except(&mut self, keep: &[TimerKind]) {
        self.deadlines.retain(|kind, _| keep.contains(kind));
    }

    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    pub fn is_active(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    pub fn active(&self) -> Vec<TimerKind> {
        let mut active: Vec<_> = self.deadlines.iter().map(|(k, at)| (*at, *k)).collect();
        active.sort_by_key(|(at, _)| *at);
        active.into_iter().map(|(_, k)| k).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return the earliest timer due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let (kind, _) = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .min_by_key(|(_, at)| **at)
            .map(|(k, at)| (*k, *at))?;
        self.deadlines.remove(&kind);
        Some(kind)
    }
}
