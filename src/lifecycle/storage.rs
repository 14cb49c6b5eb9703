//! Storage traits for the lifecycle flows.
//!
//! The flows never talk to the hosted platform directly; they go through
//! these seams. [`crate::store::RestDirectory`] implements all of them
//! against the platform's REST APIs, and the in-memory directory in
//! [`super::test`] implements them for tests.
//!
//! There is no transactional guarantee across stores. The identity store
//! and profile store can each succeed or fail independently, which is
//! exactly the skew the membership classifier exists to tolerate.

use crate::error::Result;
use async_trait::async_trait;

use super::types::{AttributeBag, AuthView, ProfileRow};

/// Resolves a caller's bearer credential to their user id.
///
/// Implementations must use the caller-scoped credential tier, never the
/// elevated service credential: the authorization gate relies on the
/// platform's own access rules to reject forged or expired tokens.
#[async_trait]
pub trait CallerAuthenticator: Send + Sync {
    /// Returns the caller's user id, or `None` when the credential is
    /// invalid or expired.
    async fn authenticate(&self, bearer_token: &str) -> Result<Option<String>>;
}

/// The identity provider's user records (auth view).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find a user by email, case-insensitive exact match.
    async fn find_by_email(&self, email: &str) -> Result<Option<AuthView>>;

    /// Find a user by id.
    async fn find_by_id(&self, user_id: &str) -> Result<Option<AuthView>>;

    /// Create a new identity record with the organization id in the
    /// elevated metadata and the attribute bag in the user metadata.
    async fn create_user(
        &self,
        email: &str,
        organization_id: &str,
        metadata: &AttributeBag,
    ) -> Result<AuthView>;

    /// Point an existing identity record at an organization, replacing the
    /// user metadata with the supplied attribute bag.
    async fn link_organization(
        &self,
        user_id: &str,
        organization_id: &str,
        metadata: &AttributeBag,
    ) -> Result<()>;

    /// Replace the user's credential.
    async fn update_password(&self, user_id: &str, new_password: &str) -> Result<()>;

    /// Remove the identity record. This is the authoritative deletion
    /// step: a failure here must surface to the caller.
    async fn delete_user(&self, user_id: &str) -> Result<()>;
}

/// The application's profile table (profile view).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<ProfileRow>>;

    /// Insert a fresh profile row.
    async fn insert(&self, row: &ProfileRow) -> Result<()>;

    /// Insert or update a profile row keyed by its id.
    async fn upsert(&self, row: &ProfileRow) -> Result<()>;

    async fn delete(&self, user_id: &str) -> Result<()>;
}

/// Dependent application rows cleaned up before an identity is removed.
#[async_trait]
pub trait MemberDataStore: Send + Sync {
    /// Delete push-notification device tokens referencing the user.
    async fn delete_device_tokens(&self, user_id: &str) -> Result<()>;

    /// Delete the domain-specific member row keyed by the user id.
    async fn delete_member_row(&self, user_id: &str) -> Result<()>;
}

/// Outbound notifications sent during invite.
///
/// Both calls are best-effort from the flow's perspective: a failure is
/// logged but the invite still reports success, because the creation or
/// linking writes have already happened.
#[async_trait]
pub trait InviteNotifier: Send + Sync {
    /// Send a confirmation link to a freshly created user.
    async fn send_confirmation_link(&self, email: &str, metadata: &AttributeBag) -> Result<()>;

    /// Send a one-time sign-in code to a user linked to a new organization.
    async fn send_signin_code(&self, email: &str, metadata: &AttributeBag) -> Result<()>;
}
