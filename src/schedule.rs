//! Fixed-cadence tick scheduling for layout sessions.
//!
//! The controller never sleeps. It hands a [`TickToken`] to a
//! [`TickScheduler`] and the host feeds the token back through
//! `SyncController::tick` once the delay has elapsed. A token only carries
//! the session it was issued for, so a token belonging to a superseded
//! session is recognised and dropped at the top of the tick.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Identity of one layout session. Strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken {
    session: SessionId,
}

impl TickToken {
    pub const fn new(session: SessionId) -> Self {
        Self { session }
    }

    pub fn session(self) -> SessionId {
        self.session
    }
}

/// Timer facility the controller uses to request its next animation tick.
pub trait TickScheduler {
    fn schedule(&mut self, delay: Duration, token: TickToken);
}

/// Virtual-clock scheduler. Nothing fires on its own; the host advances
/// the clock and collects due tokens.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    seq: u64,
    // Kept sorted by (due, seq).
    queue: Vec<(Duration, u64, TickToken)>,
    scheduled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total number of `schedule` calls seen so far.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled
    }

    pub fn peek_due(&self) -> Option<Duration> {
        self.queue.first().map(|(due, _, _)| *due)
    }

    /// Move the clock to the earliest pending tick and return its token.
    pub fn pop_next(&mut self) -> Option<TickToken> {
        if self.queue.is_empty() {
            return None;
        }
        let (due, _, token) = self.queue.remove(0);
        self.now = self.now.max(due);
        Some(token)
    }

    /// Advance the clock by `elapsed` and drain every token now due.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TickToken> {
        self.now += elapsed;
        let split = self
            .queue
            .iter()
            .position(|(due, _, _)| *due > self.now)
            .unwrap_or(self.queue.len());
        self.queue
            .drain(..split)
            .map(|(_, _, token)| token)
            .collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, token: TickToken) {
        let due = self.now + delay;
        self.seq += 1;
        let entry = (due, self.seq, token);
        let idx = self
            .queue
            .partition_point(|(d, s, _)| (*d, *s) <= (due, entry.1));
        self.queue.insert(idx, entry);
        self.scheduled += 1;
    }
}
