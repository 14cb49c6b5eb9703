//! Authorization gate for lifecycle actions.
//!
//! Emits tracing events for security monitoring:
//! - `lifecycle.authorize.denied` - Credential invalid or role insufficient

use tracing::instrument;

use super::error::{LifecycleError, Result};
use super::storage::{CallerAuthenticator, ProfileStore};
use super::types::CallerIdentity;

/// Resolves a bearer credential to a [`CallerIdentity`] and enforces the
/// role requirement shared by every lifecycle action.
///
/// The credential is checked through the caller-scoped tier first; only
/// after the platform vouches for the token does the gate read the
/// caller's profile with elevated access.
pub struct AuthorizationGate<C, P> {
    authenticator: C,
    profiles: P,
}

impl<C, P> AuthorizationGate<C, P>
where
    C: CallerAuthenticator,
    P: ProfileStore,
{
    pub fn new(authenticator: C, profiles: P) -> Self {
        Self {
            authenticator,
            profiles,
        }
    }

    /// Authenticate the caller and require a user-management role.
    ///
    /// Fails `Unauthorized` when the credential is missing/invalid and
    /// `Forbidden` when the caller's role is not owner or admin. The
    /// returned identity carries the caller's organization id, which the
    /// individual actions validate according to their own rules.
    #[instrument(skip_all)]
    pub async fn authorize(&self, bearer_token: Option<&str>) -> Result<CallerIdentity> {
        let token = bearer_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(LifecycleError::Unauthorized)?;

        let caller_id = match self.authenticator.authenticate(token).await? {
            Some(id) => id,
            None => {
                tracing::info!(
                    target: "lifecycle.authorize.denied",
                    reason = "invalid_credential",
                    "Caller credential rejected"
                );
                return Err(LifecycleError::Unauthorized);
            }
        };

        let profile = match self.profiles.find_by_id(&caller_id).await? {
            Some(p) => p,
            None => {
                tracing::info!(
                    target: "lifecycle.authorize.denied",
                    caller_id,
                    reason = "no_profile",
                    "Caller has no profile row"
                );
                return Err(LifecycleError::forbidden("Insufficient permissions"));
            }
        };

        if !profile.role.can_manage_users() {
            tracing::info!(
                target: "lifecycle.authorize.denied",
                caller_id,
                role = %profile.role,
                reason = "insufficient_role",
                "Caller role may not manage users"
            );
            return Err(LifecycleError::forbidden("Insufficient permissions"));
        }

        Ok(CallerIdentity {
            id: caller_id,
            role: profile.role,
            organization_id: profile.organization_id,
        })
    }
}
