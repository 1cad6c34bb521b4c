//! Effective-threshold resolution.
//!
//! Holds a warm, lock-guarded view of the global alert config and the
//! per-server override rows, and answers the only question the evaluator
//! asks: "what threshold applies to this server and metric, if any?"

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use vigil_proto::{MetricKind, ServerId};
use vigil_store::{GlobalAlertConfig, ServerThreshold};

#[derive(Debug)]
struct ResolverState {
    global: GlobalAlertConfig,
    overrides: HashMap<ServerId, ServerThreshold>,
}

/// Shared view of the configured thresholds.
///
/// Precedence per (server, metric kind): an override value set on the
/// server wins over the global default; an override field left unset falls
/// through to the global value. Whichever value wins, zero (or below)
/// means the alert kind is disabled and [`ThresholdResolver::effective`]
/// returns `None`.
///
/// Cloning shares the underlying state, so the engine and the evaluator
/// see every update immediately.
#[derive(Debug)]
pub struct ThresholdResolver {
    state: Arc<RwLock<ResolverState>>,
}

impl ThresholdResolver {
    /// Create a resolver over a config and any existing override rows.
    #[must_use]
    pub fn new(
        global: GlobalAlertConfig,
        overrides: impl IntoIterator<Item = ServerThreshold>,
    ) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|row| (row.server_id.clone(), row))
            .collect();
        Self {
            state: Arc::new(RwLock::new(ResolverState { global, overrides })),
        }
    }

    /// The threshold in effect for one server and metric kind.
    ///
    /// `None` means the kind is disabled for this server and must never
    /// fire, regardless of the observed value.
    #[must_use]
    pub fn effective(&self, server_id: &ServerId, kind: MetricKind) -> Option<f64> {
        let state = self.state.read();
        let value = state
            .overrides
            .get(server_id)
            .and_then(|row| row.value_for(kind))
            .unwrap_or_else(|| state.global.value_for(kind));

        if value <= 0.0 {
            None
        } else {
            Some(value)
        }
    }

    /// The current global config.
    #[must_use]
    pub fn global(&self) -> GlobalAlertConfig {
        self.state.read().global
    }

    /// Replace the global config.
    pub fn set_global(&self, config: GlobalAlertConfig) {
        self.state.write().global = config;
    }

    /// Upsert a server's override row. An empty row (all fields unset)
    /// clears the entry instead.
    pub fn set_override(&self, row: ServerThreshold) {
        let mut state = self.state.write();
        if row.is_empty() {
            state.overrides.remove(&row.server_id);
        } else {
            state.overrides.insert(row.server_id.clone(), row);
        }
    }

    /// Drop a server's override row.
    pub fn remove_override(&self, server_id: &ServerId) {
        self.state.write().overrides.remove(server_id);
    }

    /// Replace the whole override view, e.g. after a bulk import.
    pub fn replace_overrides(&self, rows: impl IntoIterator<Item = ServerThreshold>) {
        let overrides = rows
            .into_iter()
            .filter(|row| !row.is_empty())
            .map(|row| (row.server_id.clone(), row))
            .collect();
        self.state.write().overrides = overrides;
    }

    /// The stored override row for a server, if any.
    #[must_use]
    pub fn override_for(&self, server_id: &ServerId) -> Option<ServerThreshold> {
        self.state.read().overrides.get(server_id).cloned()
    }

    /// Number of servers with an override row.
    #[must_use]
    pub fn override_count(&self) -> usize {
        self.state.read().overrides.len()
    }
}

impl Clone for ThresholdResolver {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for ThresholdResolver {
    fn default() -> Self {
        Self::new(GlobalAlertConfig::default(), [])
    }
}
