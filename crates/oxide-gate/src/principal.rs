//! The identity rules check roles and permissions against.

use serde::{Deserialize, Serialize};

/// Anything built-in rules can authorize.
pub trait Principal {
    /// Stable identifier, used for rate-limit and cache keys.
    fn id(&self) -> &str;

    /// Roles held.
    fn roles(&self) -> &[String];

    /// Permissions held, beyond those implied by roles.
    fn permissions(&self) -> &[String] {
        &[]
    }

    /// Returns true if the principal has `role`.
    fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    /// Returns true if the principal has `permission`.
    fn has_permission(&self, permission: &str) -> bool {
        self.permissions().iter().any(|p| p == permission)
    }
}

/// A plain user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: String,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Permission codenames, e.g. `"reports.export"`.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl User {
    /// Creates a user without roles or permissions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Adds a permission.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }
}

impl Principal for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }

    fn permissions(&self) -> &[String] {
        &self.permissions
    }
}
