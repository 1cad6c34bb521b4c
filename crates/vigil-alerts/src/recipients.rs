//! Recipient-set resolution.
//!
//! Who gets an alert is the union of two explicit sources: routing rules
//! whose scope matches the server, and user-server assignments with the
//! subscription flag set. There is no implicit broadcast; a recipient is
//! always traceable to the rule or assignment that added them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use vigil_proto::AlertKind;
use vigil_store::{AlertRule, AssignedRecipient, RuleScope, Server};

/// Where a resolved recipient came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecipientSource {
    /// Matched a routing rule.
    Rule {
        /// Id of the matching rule.
        rule_id: String,
        /// Scope the rule matched at.
        scope: RuleScope,
    },
    /// Subscribed through a user-server assignment.
    Assignment {
        /// The subscribed user.
        user_id: String,
    },
}

/// One resolved recipient with the source that contributed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Delivery address.
    pub email: String,
    /// Which rule or assignment added this address.
    pub source: RecipientSource,
}

/// Resolve the recipient set for one server and alert kind.
///
/// Rules contribute first, in the order given; assignments follow. The
/// set is de-duplicated by exact address, first contributor winning, so
/// the result is deterministic for a given input order. Rules for other
/// kinds or non-matching scopes are ignored.
#[must_use]
pub fn resolve_recipients(
    server: &Server,
    kind: AlertKind,
    rules: &[AlertRule],
    assigned: &[AssignedRecipient],
) -> Vec<Recipient> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut recipients = Vec::new();

    for rule in rules {
        if rule.kind != kind || !rule.applies_to(server) {
            continue;
        }
        for email in &rule.emails {
            if seen.insert(email.as_str()) {
                recipients.push(Recipient {
                    email: email.clone(),
                    source: RecipientSource::Rule {
                        rule_id: rule.id.clone(),
                        scope: rule.scope,
                    },
                });
            }
        }
    }

    for assignment in assigned {
        if seen.insert(assignment.email.as_str()) {
            recipients.push(Recipient {
                email: assignment.email.clone(),
                source: RecipientSource::Assignment {
                    user_id: assignment.user_id.clone(),
                },
            });
        }
    }

    recipients
}
