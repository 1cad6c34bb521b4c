//! Bounded per-server cache of recent snapshots.
//!
//! This module provides the [`RecentCache`] which keeps the newest
//! snapshots for each server in ingest order, evicting from the front of a
//! buffer once it reaches the configured bound.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use vigil_proto::{MetricSnapshot, ServerId};

/// Default maximum number of snapshots kept per server.
pub const DEFAULT_MAX_PER_SERVER: usize = 500;

/// Thread-safe bounded cache of the most recent snapshots per server.
///
/// Buffers hold snapshots in ingest order, newest at the back. All
/// operations are thread-safe; clones share the same underlying buffers.
#[derive(Debug)]
pub struct RecentCache {
    /// Upper bound on snapshots retained per server.
    max_per_server: usize,
    /// Per-server buffers, newest at the back.
    buffers: Arc<RwLock<HashMap<ServerId, VecDeque<MetricSnapshot>>>>,
}

impl RecentCache {
    /// Creates a new cache retaining at most `max_per_server` snapshots for
    /// each server.
    ///
    /// A bound of zero effectively disables caching: buffers are trimmed to
    /// empty on every append.
    #[must_use]
    pub fn new(max_per_server: usize) -> Self {
        Self {
            max_per_server,
            buffers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the per-server retention bound.
    #[must_use]
    pub const fn max_per_server(&self) -> usize {
        self.max_per_server
    }

    /// Appends a snapshot to its server's buffer, creating the buffer on
    /// first use and evicting the oldest entries past the bound.
    pub fn append(&self, snapshot: MetricSnapshot) {
        let server_id = snapshot.server_id.clone();

        let mut buffers = self.buffers.write();
        let buf = buffers.entry(server_id.clone()).or_default();
        buf.push_back(snapshot);

        let mut evicted = 0usize;
        while buf.len() > self.max_per_server {
            buf.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            debug!(
                server_id = %server_id,
                evicted,
                retained = buf.len(),
                "evicted oldest cached snapshots"
            );
        }
    }

    /// Returns up to `limit` of the newest snapshots for a server in
    /// chronological order (oldest first, newest last).
    ///
    /// Unknown servers and empty buffers yield an empty vector.
    #[must_use]
    pub fn recent(&self, server_id: &ServerId, limit: usize) -> Vec<MetricSnapshot> {
        let buffers = self.buffers.read();
        buffers.get(server_id).map_or_else(Vec::new, |buf| {
            let skip = buf.len().saturating_sub(limit);
            buf.iter().skip(skip).cloned().collect()
        })
    }

    /// Replaces a server's buffer wholesale with history read back from the
    /// durable archive, oldest first.
    ///
    /// Entries beyond the bound are dropped from the front so the newest
    /// `max_per_server` remain.
    pub fn seed(&self, server_id: &ServerId, snapshots: Vec<MetricSnapshot>) {
        let mut buf: VecDeque<MetricSnapshot> = snapshots.into();
        while buf.len() > self.max_per_server {
            buf.pop_front();
        }

        debug!(
            server_id = %server_id,
            seeded = buf.len(),
            "seeded cache from archive"
        );

        let mut buffers = self.buffers.write();
        buffers.insert(server_id.clone(), buf);
    }

    /// Returns the number of cached snapshots for a server.
    #[must_use]
    pub fn len(&self, server_id: &ServerId) -> usize {
        let buffers = self.buffers.read();
        buffers.get(server_id).map_or(0, VecDeque::len)
    }

    /// Returns true if the server has no cached snapshots.
    #[must_use]
    pub fn is_empty(&self, server_id: &ServerId) -> bool {
        self.len(server_id) == 0
    }

    /// Removes a server's buffer entirely.
    ///
    /// Returns `true` if the server had a buffer.
    pub fn remove_server(&self, server_id: &ServerId) -> bool {
        let mut buffers = self.buffers.write();
        buffers.remove(server_id).is_some()
    }

    /// Clears all buffers.
    pub fn clear(&self) {
        let mut buffers = self.buffers.write();
        buffers.clear();
    }

    /// Returns the number of servers with a buffer (possibly empty).
    #[must_use]
    pub fn server_count(&self) -> usize {
        let buffers = self.buffers.read();
        buffers.len()
    }
}

impl Clone for RecentCache {
    fn clone(&self) -> Self {
        Self {
            max_per_server: self.max_per_server,
            buffers: Arc::clone(&self.buffers),
        }
    }
}

impl Default for RecentCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_SERVER)
    }
}
