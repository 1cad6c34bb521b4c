//! Recipient rule store: scoped e-mail routing rules for alerts.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_proto::validation::{validate_email, validate_server_id, ValidationResult};
use vigil_proto::AlertKind;

use crate::entities::{AlertRule, RuleScope};
use crate::error::{Result, StoreError};
use crate::json::JsonStore;

/// Input for creating a rule; the store assigns the id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAlertRule {
    /// Alert kind the rule routes.
    pub kind: AlertKind,
    /// Scope the rule applies at.
    pub scope: RuleScope,
    /// Server id or group name for narrow scopes; `None` for global.
    pub target: Option<String>,
    /// Recipient addresses.
    pub emails: Vec<String>,
}

/// Persistent store of recipient rules.
pub struct RuleStore {
    rules: HashMap<String, AlertRule>,
    store: JsonStore,
}

impl RuleStore {
    /// Open the rule store, loading any existing state from `state_dir`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "alert_rules");
        let rules: HashMap<String, AlertRule> = store.load();
        debug!(count = rules.len(), "loaded alert rules");
        Self { rules, store }
    }

    /// Validate and persist a new rule.
    ///
    /// Global rules must not carry a target; server and group rules must.
    /// Every address must look like `local@domain.tld`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] describing the first offending
    /// field.
    pub fn add(&mut self, new: NewAlertRule) -> Result<AlertRule> {
        let mut result = ValidationResult::new();

        match (new.scope, new.target.as_deref()) {
            (RuleScope::Global, Some(_)) => {
                result.error("target", "must be empty for global scope");
            }
            (RuleScope::Server, None) | (RuleScope::Group, None) => {
                result.error("target", format!("required for {} scope", new.scope));
            }
            (RuleScope::Server, Some(target)) => {
                if let Err(e) = validate_server_id(target) {
                    result.error("target", e.message);
                }
            }
            (RuleScope::Group, Some(target)) => {
                if target.trim().is_empty() {
                    result.error("target", "group name cannot be blank");
                }
            }
            (RuleScope::Global, None) => {}
        }

        if new.emails.is_empty() {
            result.error("emails", "at least one recipient is required");
        }
        for (idx, email) in new.emails.iter().enumerate() {
            if let Err(e) = validate_email(email) {
                result.error(format!("emails[{idx}]"), e.message);
            }
        }

        result.into_result().map_err(StoreError::Validation)?;

        let rule = AlertRule {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            scope: new.scope,
            target: new.target,
            emails: new.emails,
            created_at: Utc::now(),
        };

        info!(
            rule_id = %rule.id,
            kind = %rule.kind,
            scope = %rule.scope,
            recipients = rule.emails.len(),
            "added alert rule"
        );

        self.rules.insert(rule.id.clone(), rule.clone());
        self.snapshot();
        Ok(rule)
    }

    /// Remove a rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RuleNotFound`] if no rule has that id.
    pub fn remove(&mut self, rule_id: &str) -> Result<AlertRule> {
        let rule = self
            .rules
            .remove(rule_id)
            .ok_or_else(|| StoreError::RuleNotFound(rule_id.to_string()))?;

        info!(rule_id = %rule_id, "removed alert rule");
        self.snapshot();
        Ok(rule)
    }

    /// Look up a rule by id.
    #[must_use]
    pub fn get(&self, rule_id: &str) -> Option<&AlertRule> {
        self.rules.get(rule_id)
    }

    /// All rules, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<AlertRule> {
        let mut rules: Vec<AlertRule> = self.rules.values().cloned().collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rules
    }

    /// All rules for one alert kind, oldest first.
    #[must_use]
    pub fn list_for_kind(&self, kind: AlertKind) -> Vec<AlertRule> {
        let mut rules: Vec<AlertRule> = self
            .rules
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rules
    }

    /// Number of stored rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn snapshot(&self) {
        if let Err(e) = self.store.save(&self.rules) {
            warn!(error = %e, "failed to snapshot alert rules");
        }
    }
}
