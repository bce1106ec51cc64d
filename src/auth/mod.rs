//! Per-request authorization context.
//!
//! Every dynamic request owns its own context. The pipeline resets it to the
//! configured baseline after resources are acquired and before dispatch, so
//! roles granted while serving one request never reach another.

use std::collections::BTreeSet;

use crate::config::RoleBaseline;

/// The "all access" role.
pub const ROLE_ALL: &str = "*";

/// Ordered set of active permission roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    baseline: RoleBaseline,
    roles: BTreeSet<String>,
}

impl AuthorizationContext {
    /// An empty context; call [`reset`](Self::reset) to install the baseline.
    pub fn new(baseline: RoleBaseline) -> Self {
        Self {
            baseline,
            roles: BTreeSet::new(),
        }
    }

    /// Drop every held role and install the baseline set.
    pub fn reset(&mut self) {
        self.roles.clear();
        if self.baseline == RoleBaseline::Wildcard {
            self.roles.insert(ROLE_ALL.to_string());
        }
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        self.roles.insert(role.into());
    }

    pub fn remove_role(&mut self, role: &str) -> bool {
        self.roles.remove(role)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Copy of the active roles, in order.
    pub fn snapshot(&self) -> Vec<String> {
        self.roles.iter().cloned().collect()
    }
}
