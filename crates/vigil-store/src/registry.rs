//! Server registry: registration, token rotation, last-seen bookkeeping.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_proto::{ServerId, ValidationError};

use crate::entities::{Server, DEFAULT_REPORT_INTERVAL_SECS};
use crate::error::{Result, StoreError};
use crate::json::JsonStore;

/// Registry of managed servers, snapshotted to JSON on every mutation.
///
/// Registration is idempotent: re-registering an existing server rotates
/// its ingest token in place and keeps everything else.
pub struct ServerRegistry {
    servers: HashMap<ServerId, Server>,
    store: JsonStore,
}

impl ServerRegistry {
    /// Open the registry, loading any existing state from `state_dir`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "servers");
        let servers: HashMap<ServerId, Server> = store.load();
        debug!(count = servers.len(), "loaded server registry");
        Self { servers, store }
    }

    /// Register a server, or rotate the token of an already registered one.
    ///
    /// Returns the stored row including the freshly minted token; the
    /// transport layer hands that token to the agent.
    pub fn register(&mut self, server_id: &ServerId) -> Server {
        let now = Utc::now();
        let token = mint_token();

        let server = match self.servers.get_mut(server_id) {
            Some(existing) => {
                existing.token = token;
                info!(server_id = %server_id, "rotated token for re-registered server");
                existing.clone()
            }
            None => {
                let server = Server {
                    id: server_id.clone(),
                    token,
                    group: None,
                    report_interval_secs: DEFAULT_REPORT_INTERVAL_SECS,
                    registered_at: now,
                    last_seen: now,
                };
                self.servers.insert(server_id.clone(), server.clone());
                info!(server_id = %server_id, "registered new server");
                server
            }
        };

        self.snapshot();
        server
    }

    /// Look up a server.
    #[must_use]
    pub fn get(&self, server_id: &ServerId) -> Option<&Server> {
        self.servers.get(server_id)
    }

    /// Whether the server is registered.
    #[must_use]
    pub fn contains(&self, server_id: &ServerId) -> bool {
        self.servers.contains_key(server_id)
    }

    /// Record an accepted ingest at `at`.
    ///
    /// Out-of-order timestamps never move `last_seen` backwards.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ServerNotFound`] for unregistered servers.
    pub fn touch_last_seen(&mut self, server_id: &ServerId, at: DateTime<Utc>) -> Result<()> {
        let server = self
            .servers
            .get_mut(server_id)
            .ok_or_else(|| StoreError::ServerNotFound(server_id.to_string()))?;

        if at > server.last_seen {
            server.last_seen = at;
        }

        self.snapshot();
        Ok(())
    }

    /// Set or clear a server's group label.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ServerNotFound`] for unregistered servers.
    pub fn set_group(&mut self, server_id: &ServerId, group: Option<String>) -> Result<()> {
        let server = self
            .servers
            .get_mut(server_id)
            .ok_or_else(|| StoreError::ServerNotFound(server_id.to_string()))?;

        server.group = group;
        self.snapshot();
        Ok(())
    }

    /// Update a server's expected reporting cadence.
    ///
    /// # Errors
    ///
    /// Returns an error for unregistered servers or a zero interval.
    pub fn set_report_interval(&mut self, server_id: &ServerId, secs: u64) -> Result<()> {
        if secs == 0 {
            return Err(StoreError::Validation(ValidationError::new(
                "report_interval_secs",
                "must be positive",
            )));
        }

        let server = self
            .servers
            .get_mut(server_id)
            .ok_or_else(|| StoreError::ServerNotFound(server_id.to_string()))?;

        server.report_interval_secs = secs;
        self.snapshot();
        Ok(())
    }

    /// Remove a server from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ServerNotFound`] if the server was not
    /// registered.
    pub fn remove(&mut self, server_id: &ServerId) -> Result<Server> {
        let server = self
            .servers
            .remove(server_id)
            .ok_or_else(|| StoreError::ServerNotFound(server_id.to_string()))?;

        info!(server_id = %server_id, "removed server");
        self.snapshot();
        Ok(server)
    }

    /// All registered servers, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<Server> {
        let mut servers: Vec<Server> = self.servers.values().cloned().collect();
        servers.sort_by(|a, b| a.id.cmp(&b.id));
        servers
    }

    /// Number of registered servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    fn snapshot(&self) {
        if let Err(e) = self.store.save(&self.servers) {
            warn!(error = %e, "failed to snapshot server registry");
        }
    }
}

fn mint_token() -> String {
    Uuid::new_v4().simple().to_string()
}
