//! Threshold persistence: the global default config and per-server overrides.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use vigil_proto::validation::ValidationResult;
use vigil_proto::ServerId;

use crate::entities::{GlobalAlertConfig, ServerThreshold};
use crate::error::{Result, StoreError};
use crate::json::JsonStore;

fn check_threshold(result: &mut ValidationResult, field: &str, value: f64) {
    if !(0.0..=100.0).contains(&value) {
        result.error(field, format!("must be between 0 and 100, got {value}"));
    }
}

/// Persistent singleton holding the fleet-wide default thresholds.
///
/// A fresh deployment starts at the built-in defaults without touching
/// disk; the file appears on the first explicit update.
pub struct AlertConfigStore {
    config: GlobalAlertConfig,
    store: JsonStore,
}

impl AlertConfigStore {
    /// Open the config store, loading any saved config from `state_dir`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "alert_config");
        let config: GlobalAlertConfig = store.load();
        Self { config, store }
    }

    /// The current global config.
    #[must_use]
    pub fn get(&self) -> GlobalAlertConfig {
        self.config
    }

    /// Replace the global thresholds, stamping the update time.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any value falls outside `[0, 100]`.
    pub fn set(&mut self, cpu: f64, memory: f64, disk: f64) -> Result<GlobalAlertConfig> {
        let mut result = ValidationResult::new();
        check_threshold(&mut result, "cpu_percent", cpu);
        check_threshold(&mut result, "memory_percent", memory);
        check_threshold(&mut result, "disk_percent", disk);
        result.into_result().map_err(StoreError::Validation)?;

        self.config = GlobalAlertConfig {
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            updated_at: Utc::now(),
        };

        info!(cpu, memory, disk, "updated global alert config");
        self.snapshot();
        Ok(self.config)
    }

    fn snapshot(&self) {
        if let Err(e) = self.store.save(&self.config) {
            warn!(error = %e, "failed to snapshot alert config");
        }
    }
}

/// Persistent per-server threshold overrides.
pub struct ThresholdStore {
    thresholds: HashMap<ServerId, ServerThreshold>,
    store: JsonStore,
}

impl ThresholdStore {
    /// Open the override store, loading any existing state from `state_dir`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "server_thresholds");
        let thresholds: HashMap<ServerId, ServerThreshold> = store.load();
        debug!(count = thresholds.len(), "loaded threshold overrides");
        Self { thresholds, store }
    }

    /// Replace a server's override row.
    ///
    /// The row is replaced wholesale: a kind passed as `None` falls back to
    /// the global default even if a previous row overrode it. Setting all
    /// three to `None` clears the row entirely.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any value falls outside `[0, 100]`.
    pub fn set(
        &mut self,
        server_id: &ServerId,
        cpu: Option<f64>,
        memory: Option<f64>,
        disk: Option<f64>,
    ) -> Result<ServerThreshold> {
        let mut result = ValidationResult::new();
        if let Some(v) = cpu {
            check_threshold(&mut result, "cpu_percent", v);
        }
        if let Some(v) = memory {
            check_threshold(&mut result, "memory_percent", v);
        }
        if let Some(v) = disk {
            check_threshold(&mut result, "disk_percent", v);
        }
        result.into_result().map_err(StoreError::Validation)?;

        let row = ServerThreshold {
            server_id: server_id.clone(),
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            updated_at: Utc::now(),
        };

        if row.is_empty() {
            self.thresholds.remove(server_id);
            info!(server_id = %server_id, "cleared threshold override");
        } else {
            self.thresholds.insert(server_id.clone(), row.clone());
            info!(server_id = %server_id, "set threshold override");
        }

        self.snapshot();
        Ok(row)
    }

    /// The stored override row for a server, if any.
    #[must_use]
    pub fn get(&self, server_id: &ServerId) -> Option<&ServerThreshold> {
        self.thresholds.get(server_id)
    }

    /// Remove a server's override row. Removing a missing row is a no-op.
    pub fn remove(&mut self, server_id: &ServerId) -> Option<ServerThreshold> {
        let removed = self.thresholds.remove(server_id);
        if removed.is_some() {
            info!(server_id = %server_id, "removed threshold override");
            self.snapshot();
        }
        removed
    }

    /// All override rows, ordered by server id.
    #[must_use]
    pub fn export(&self) -> Vec<ServerThreshold> {
        let mut rows: Vec<ServerThreshold> = self.thresholds.values().cloned().collect();
        rows.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        rows
    }

    /// Bulk-upsert override rows, returning how many were applied.
    ///
    /// The batch is validated up front and rejected as a whole on the
    /// first invalid row; timestamps on imported rows are preserved.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending server and field.
    pub fn import(&mut self, rows: Vec<ServerThreshold>) -> Result<usize> {
        let mut result = ValidationResult::new();
        for row in &rows {
            for (field, value) in [
                ("cpu_percent", row.cpu_percent),
                ("memory_percent", row.memory_percent),
                ("disk_percent", row.disk_percent),
            ] {
                if let Some(v) = value {
                    check_threshold(&mut result, &format!("{}.{field}", row.server_id), v);
                }
            }
        }
        result.into_result().map_err(StoreError::Validation)?;

        let count = rows.len();
        for row in rows {
            if row.is_empty() {
                self.thresholds.remove(&row.server_id);
            } else {
                self.thresholds.insert(row.server_id.clone(), row);
            }
        }

        info!(count, "imported threshold overrides");
        self.snapshot();
        Ok(count)
    }

    /// Number of stored override rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// Whether any overrides are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    fn snapshot(&self) {
        if let Err(e) = self.store.save(&self.thresholds) {
            warn!(error = %e, "failed to snapshot threshold overrides");
        }
    }
}
