//! Admin password reset action.
//!
//! An admin may reset a password only for a member of their own
//! organization who has never set a password themselves. Unlike invite and
//! delete, the organization check here uses the profile view alone with
//! exact equality, not the lenient union rule.
//!
//! Emits tracing events:
//! - `lifecycle.password.reset` - Credential replaced
//! - `lifecycle.password.denied` - Reset refused

use tracing::instrument;

use super::error::{LifecycleError, Result};
use super::storage::{IdentityStore, ProfileStore};
use super::types::CallerIdentity;

/// Minimum accepted password length, matching the platform's own policy.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Handles the admin password reset action.
pub struct PasswordResetFlow<I, P> {
    identity: I,
    profiles: P,
}

impl<I, P> PasswordResetFlow<I, P>
where
    I: IdentityStore,
    P: ProfileStore,
{
    pub fn new(identity: I, profiles: P) -> Self {
        Self { identity, profiles }
    }

    /// Reset a target user's password.
    ///
    /// Validation happens before any target-store access. The
    /// `password_changed` flag is only read here, never written: it is
    /// flipped elsewhere when the user sets their own password.
    #[instrument(skip_all, fields(caller_id = %caller.id, target_user = target_user_id))]
    pub async fn reset(
        &self,
        caller: &CallerIdentity,
        target_user_id: &str,
        new_password: &str,
    ) -> Result<()> {
        let target_user_id = target_user_id.trim();
        if target_user_id.is_empty() {
            return Err(LifecycleError::validation("Missing userId or newPassword"));
        }
        if new_password.is_empty() {
            return Err(LifecycleError::validation("Missing userId or newPassword"));
        }
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(LifecycleError::validation(
                "Password must be at least 6 characters",
            ));
        }

        let target = self
            .profiles
            .find_by_id(target_user_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        // Profile view only, exact equality. Two org-less profiles compare
        // equal, mirroring the platform's own behavior.
        if target.organization_id != caller.organization_id {
            tracing::info!(
                target: "lifecycle.password.denied",
                target_user_id,
                reason = "foreign_organization",
                "Password reset refused"
            );
            return Err(LifecycleError::forbidden(
                "User belongs to a different organization",
            ));
        }

        if target.password_changed {
            tracing::info!(
                target: "lifecycle.password.denied",
                target_user_id,
                reason = "password_already_changed",
                "Password reset refused"
            );
            return Err(LifecycleError::PasswordAlreadyChanged);
        }

        self.identity
            .update_password(target_user_id, new_password)
            .await?;

        tracing::info!(
            target: "lifecycle.password.reset",
            target_user_id,
            "Password reset by admin"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::test::InMemoryDirectory;
    use crate::lifecycle::types::Role;

    fn caller() -> CallerIdentity {
        CallerIdentity {
            id: "caller-1".into(),
            role: Role::Admin,
            organization_id: Some("org-a".into()),
        }
    }

    fn flow(dir: &InMemoryDirectory) -> PasswordResetFlow<InMemoryDirectory, InMemoryDirectory> {
        PasswordResetFlow::new(dir.clone(), dir.clone())
    }

    #[tokio::test]
    async fn short_password_fails_before_any_store_access() {
        let dir = InMemoryDirectory::new();
        // Target deliberately not seeded: a validation failure must win
        // over the would-be NotFound.
        let err = flow(&dir)
            .reset(&caller(), "u-target", "12345")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_fields_fail_validation() {
        let dir = InMemoryDirectory::new();
        let err = flow(&dir).reset(&caller(), "", "secret123").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));

        let err = flow(&dir).reset(&caller(), "u-target", "").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let dir = InMemoryDirectory::new();
        let err = flow(&dir)
            .reset(&caller(), "u-ghost", "secret123")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound));
    }

    #[tokio::test]
    async fn foreign_org_target_is_forbidden() {
        let dir = InMemoryDirectory::new();
        dir.seed_user("u-target", "t@gym.test", Some("org-b"), Role::Member, false);

        let err = flow(&dir)
            .reset(&caller(), "u-target", "secret123")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden { .. }));
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn union_rule_does_not_apply_here() {
        // Auth metadata says org-a but the profile says org-b: invite and
        // delete would accept this user, password reset must not.
        let dir = InMemoryDirectory::new();
        dir.seed_user("u-target", "t@gym.test", Some("org-b"), Role::Member, false);
        dir.seed_auth_user("u-target", "t@gym.test", Some("org-a"));

        let err = flow(&dir)
            .reset(&caller(), "u-target", "secret123")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn already_changed_password_is_refused_without_credential_update() {
        let dir = InMemoryDirectory::new();
        dir.seed_user("u-target", "t@gym.test", Some("org-a"), Role::Member, true);

        let err = flow(&dir)
            .reset(&caller(), "u-target", "perfectly-valid-password")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::PasswordAlreadyChanged));
        // No credential update was attempted.
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn valid_reset_updates_the_credential() {
        let dir = InMemoryDirectory::new();
        dir.seed_user("u-target", "t@gym.test", Some("org-a"), Role::Member, false);

        flow(&dir)
            .reset(&caller(), "u-target", "secret123")
            .await
            .unwrap();
        assert_eq!(dir.write_count(), 1);

        // The flag is not flipped by the admin reset itself.
        assert!(!dir.profile("u-target").unwrap().password_changed);
    }

    #[tokio::test]
    async fn six_character_password_is_accepted() {
        let dir = InMemoryDirectory::new();
        dir.seed_user("u-target", "t@gym.test", Some("org-a"), Role::Member, false);

        flow(&dir).reset(&caller(), "u-target", "123456").await.unwrap();
    }
}
