//! Per-(server, kind) notification cooldown.
//!
//! One fired alert per key per window: after a fire, further qualifying
//! crossings of the same key are suppressed until the window has fully
//! elapsed. Falling back under the threshold does not reset anything and
//! produces no recovery notification; the next crossing after the window
//! simply fires again.
//!
//! State is in-memory only. A restart forgets every `last_fired` and the
//! next qualifying crossing fires immediately; that is accepted behavior,
//! not a defect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use vigil_proto::{AlertKind, ServerId};

/// The outcome of one cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    /// Outside the window (or never fired); `last_fired` was advanced and
    /// the caller should dispatch.
    Fire,
    /// Inside the window; nothing changed and nothing may be sent.
    Suppressed {
        /// When this key last fired.
        last_fired: DateTime<Utc>,
    },
}

impl CooldownDecision {
    /// Returns true if the alert may fire.
    #[must_use]
    pub const fn is_fire(&self) -> bool {
        matches!(self, Self::Fire)
    }
}

/// Tracks the last fire time per (server, alert kind) key.
///
/// The read-decide-write of [`CooldownTracker::check_and_set`] happens
/// under one lock acquisition, so concurrent evaluations of the same key
/// cannot double-fire inside the window. Cloning shares state.
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    last_fired: Arc<RwLock<HashMap<(ServerId, AlertKind), DateTime<Utc>>>>,
}

impl CooldownTracker {
    /// Create a tracker with the given cooldown window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The configured window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Atomically decide whether a key may fire now, recording the fire
    /// time if it may.
    ///
    /// Fires when the key has never fired, or when strictly more than the
    /// window has elapsed since the last fire. An elapsed time equal to
    /// the window still suppresses. A `now` at or before the recorded
    /// `last_fired` suppresses without touching state, so a later fire
    /// time is never overwritten by an earlier one.
    pub fn check_and_set(&self, server_id: &ServerId, kind: AlertKind) -> CooldownDecision {
        self.check_and_set_at(server_id, kind, Utc::now())
    }

    /// [`CooldownTracker::check_and_set`] against an explicit clock.
    pub fn check_and_set_at(
        &self,
        server_id: &ServerId,
        kind: AlertKind,
        now: DateTime<Utc>,
    ) -> CooldownDecision {
        let window = chrono::Duration::seconds(self.window.as_secs() as i64);
        let mut last_fired = self.last_fired.write();

        match last_fired.get(&(server_id.clone(), kind)) {
            Some(&last) if now.signed_duration_since(last) <= window => {
                debug!(
                    server_id = %server_id,
                    kind = %kind,
                    last_fired = %last,
                    "alert suppressed by cooldown"
                );
                CooldownDecision::Suppressed { last_fired: last }
            }
            _ => {
                last_fired.insert((server_id.clone(), kind), now);
                CooldownDecision::Fire
            }
        }
    }

    /// When a key last fired, if it has.
    #[must_use]
    pub fn last_fired(&self, server_id: &ServerId, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_fired
            .read()
            .get(&(server_id.clone(), kind))
            .copied()
    }

    /// Number of keys with a recorded fire.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.last_fired.read().len()
    }

    /// Forget every key for one server.
    pub fn remove_server(&self, server_id: &ServerId) {
        self.last_fired
            .write()
            .retain(|(id, _), _| id != server_id);
    }

    /// Forget every key.
    pub fn clear(&self) {
        self.last_fired.write().clear();
    }
}

impl Clone for CooldownTracker {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            last_fired: Arc::clone(&self.last_fired),
        }
    }
}
