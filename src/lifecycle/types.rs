//! Core types for user-lifecycle reconciliation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Free-form attribute bag forwarded into profile rows and identity metadata.
pub type AttributeBag = Map<String, Value>;

/// Application role stored on a profile row.
///
/// Only `Owner` and `Admin` may perform lifecycle actions; `Trainer` and
/// `Member` exist as data but never pass the authorization gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Trainer,
    #[default]
    Member,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Trainer => "trainer",
            Self::Member => "member",
        }
    }

    /// Check if this role may invite, delete, or reset passwords.
    #[must_use]
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// Error returned when parsing a role string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    invalid_value: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid role: '{}' (expected: owner, admin, trainer, or member)",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "trainer" => Ok(Self::Trainer),
            "member" => Ok(Self::Member),
            _ => Err(ParseRoleError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authenticated actor issuing a lifecycle request.
///
/// Loaded once per request by the authorization gate, never persisted.
#[derive(Clone, Debug)]
pub struct CallerIdentity {
    pub id: String,
    pub role: Role,
    pub organization_id: Option<String>,
}

impl CallerIdentity {
    /// The caller's organization id, or a lifecycle error when absent.
    ///
    /// Actions that write on behalf of an organization must call this
    /// before touching the target user.
    pub fn require_organization(&self) -> Result<&str, super::error::LifecycleError> {
        self.organization_id
            .as_deref()
            .filter(|org| !org.is_empty())
            .ok_or(super::error::LifecycleError::CallerHasNoOrganization)
    }
}

/// The identity provider's view of a user: credential record plus metadata.
///
/// `organization_id` mirrors what the platform keeps in the elevated
/// metadata blob; `metadata` is the user-editable bag (names, role hints).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthView {
    pub id: String,
    pub email: String,
    pub organization_id: Option<String>,
    #[serde(default)]
    pub metadata: AttributeBag,
}

/// The application's own row describing a user.
///
/// Keyed by the identity record's id. `organization_id` here and the one on
/// [`AuthView`] should agree but are updated by different code paths with no
/// cross-store transaction, so either may lag the other.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub organization_id: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub password_changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ProfileRow {
    /// Build a profile row from an invite attribute bag.
    ///
    /// `first_name`, `last_name` and `role` are lifted out of the bag;
    /// the role defaults to `member` when absent or unparseable.
    pub fn from_attributes(
        user_id: &str,
        organization_id: &str,
        attributes: &AttributeBag,
    ) -> Self {
        let string_attr = |key: &str| {
            attributes
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let role = attributes
            .get("role")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            id: user_id.to_string(),
            organization_id: Some(organization_id.to_string()),
            role,
            first_name: string_attr("first_name"),
            last_name: string_attr("last_name"),
            password_changed: false,
            updated_at: None,
        }
    }
}
