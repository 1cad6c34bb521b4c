//! User directory: users and their per-server alert assignments.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_proto::validation::validate_email;
use vigil_proto::{ServerId, ValidationError};

use crate::entities::{User, UserServerAssignment};
use crate::error::{Result, StoreError};
use crate::json::JsonStore;

/// A user subscribed to one server's alerts through an opted-in assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedRecipient {
    /// The subscribed user.
    pub user_id: String,
    /// Delivery address.
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DirectoryState {
    users: HashMap<String, User>,
    assignments: Vec<UserServerAssignment>,
}

/// Persistent directory of users and user-server assignments.
///
/// Subscription is explicit and per-assignment: a user receives a server's
/// alerts only when an assignment links them with `receive_alerts` set.
/// The account-wide [`User::receive_alerts`] flag is carried as data but
/// never consulted here.
pub struct UserDirectory {
    state: DirectoryState,
    store: JsonStore,
}

impl UserDirectory {
    /// Open the directory, loading any existing state from `state_dir`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "users");
        let state: DirectoryState = store.load();
        debug!(
            users = state.users.len(),
            assignments = state.assignments.len(),
            "loaded user directory"
        );
        Self { state, store }
    }

    // ==================== Users ====================

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or malformed address,
    /// and [`StoreError::DuplicateEmail`] if the address is already taken.
    pub fn add_user(&mut self, name: &str, email: &str) -> Result<User> {
        if name.trim().is_empty() {
            return Err(StoreError::Validation(ValidationError::new(
                "name",
                "cannot be blank",
            )));
        }
        validate_email(email)?;

        if self.state.users.values().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail(email.to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            receive_alerts: false,
            created_at: Utc::now(),
        };

        info!(user_id = %user.id, email = %user.email, "added user");
        self.state.users.insert(user.id.clone(), user.clone());
        self.snapshot();
        Ok(user)
    }

    /// Remove a user along with all of their assignments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserNotFound`] if no user has that id.
    pub fn remove_user(&mut self, user_id: &str) -> Result<User> {
        let user = self
            .state
            .users
            .remove(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;

        let before = self.state.assignments.len();
        self.state.assignments.retain(|a| a.user_id != user_id);

        info!(
            user_id = %user_id,
            dropped_assignments = before - self.state.assignments.len(),
            "removed user"
        );
        self.snapshot();
        Ok(user)
    }

    /// Update the legacy account-wide alerting flag.
    ///
    /// Recipient resolution ignores this flag; it is kept so imported
    /// account data round-trips.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserNotFound`] if no user has that id.
    pub fn set_receive_alerts(&mut self, user_id: &str, enabled: bool) -> Result<()> {
        let user = self
            .state
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;

        user.receive_alerts = enabled;
        self.snapshot();
        Ok(())
    }

    /// Look up a user by id.
    #[must_use]
    pub fn get_user(&self, user_id: &str) -> Option<&User> {
        self.state.users.get(user_id)
    }

    /// Look up a user by exact e-mail address.
    #[must_use]
    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.state.users.values().find(|u| u.email == email)
    }

    /// All users, ordered by name then id.
    #[must_use]
    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.state.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        users
    }

    /// Number of users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.state.users.len()
    }

    // ==================== Assignments ====================

    /// Assign a user to a server, or update an existing assignment's
    /// subscription flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserNotFound`] if no user has that id.
    pub fn assign(
        &mut self,
        user_id: &str,
        server_id: &ServerId,
        receive_alerts: bool,
    ) -> Result<UserServerAssignment> {
        if !self.state.users.contains_key(user_id) {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }

        let assignment = match self
            .state
            .assignments
            .iter_mut()
            .find(|a| a.user_id == user_id && a.server_id == *server_id)
        {
            Some(existing) => {
                existing.receive_alerts = receive_alerts;
                existing.clone()
            }
            None => {
                let assignment = UserServerAssignment {
                    user_id: user_id.to_string(),
                    server_id: server_id.clone(),
                    receive_alerts,
                };
                self.state.assignments.push(assignment.clone());
                info!(user_id = %user_id, server_id = %server_id, "assigned user to server");
                assignment
            }
        };

        self.snapshot();
        Ok(assignment)
    }

    /// Remove a user-server assignment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AssignmentNotFound`] if no such link exists.
    pub fn unassign(&mut self, user_id: &str, server_id: &ServerId) -> Result<UserServerAssignment> {
        let position = self
            .state
            .assignments
            .iter()
            .position(|a| a.user_id == user_id && a.server_id == *server_id)
            .ok_or_else(|| StoreError::AssignmentNotFound {
                user_id: user_id.to_string(),
                server_id: server_id.to_string(),
            })?;

        let assignment = self.state.assignments.remove(position);
        info!(user_id = %user_id, server_id = %server_id, "unassigned user from server");
        self.snapshot();
        Ok(assignment)
    }

    /// Toggle the subscription flag on an existing assignment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AssignmentNotFound`] if no such link exists.
    pub fn set_link_receive_alerts(
        &mut self,
        user_id: &str,
        server_id: &ServerId,
        enabled: bool,
    ) -> Result<()> {
        let assignment = self
            .state
            .assignments
            .iter_mut()
            .find(|a| a.user_id == user_id && a.server_id == *server_id)
            .ok_or_else(|| StoreError::AssignmentNotFound {
                user_id: user_id.to_string(),
                server_id: server_id.to_string(),
            })?;

        assignment.receive_alerts = enabled;
        self.snapshot();
        Ok(())
    }

    /// Drop every assignment pointing at a server, returning how many were
    /// removed. Used when a server is deregistered.
    pub fn remove_server_links(&mut self, server_id: &ServerId) -> usize {
        let before = self.state.assignments.len();
        self.state.assignments.retain(|a| a.server_id != *server_id);
        let removed = before - self.state.assignments.len();
        if removed > 0 {
            info!(server_id = %server_id, removed, "dropped assignments for removed server");
            self.snapshot();
        }
        removed
    }

    /// All assignments for a server, subscribed or not.
    #[must_use]
    pub fn assignments_for(&self, server_id: &ServerId) -> Vec<UserServerAssignment> {
        self.state
            .assignments
            .iter()
            .filter(|a| a.server_id == *server_id)
            .cloned()
            .collect()
    }

    /// Total number of assignments.
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.state.assignments.len()
    }

    /// The users subscribed to a server's alerts, ordered by address.
    ///
    /// Only assignments with `receive_alerts` set contribute; the legacy
    /// account-wide flag plays no part. Assignments whose user has since
    /// disappeared are skipped.
    #[must_use]
    pub fn recipients_for(&self, server_id: &ServerId) -> Vec<AssignedRecipient> {
        let mut recipients: Vec<AssignedRecipient> = self
            .state
            .assignments
            .iter()
            .filter(|a| a.server_id == *server_id && a.receive_alerts)
            .filter_map(|a| {
                self.state.users.get(&a.user_id).map(|user| AssignedRecipient {
                    user_id: user.id.clone(),
                    email: user.email.clone(),
                })
            })
            .collect();
        recipients.sort_by(|a, b| a.email.cmp(&b.email));
        recipients
    }

    fn snapshot(&self) {
        if let Err(e) = self.store.save(&self.state) {
            warn!(error = %e, "failed to snapshot user directory");
        }
    }
}
