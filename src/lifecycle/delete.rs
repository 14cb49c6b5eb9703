//! Delete action.
//!
//! Removes a user's dependent rows and identity record in a fixed order.
//! Dependent-row cleanup is best-effort; removing the identity record is
//! the authoritative final step and the only one whose failure surfaces.
//!
//! Emits tracing events:
//! - `lifecycle.delete.completed` - Identity record removed
//! - `lifecycle.delete.rejected` - Target belongs to another organization

use tracing::instrument;

use super::error::{LifecycleError, Result};
use super::membership::{OrgAffiliation, classify_affiliation};
use super::storage::{IdentityStore, MemberDataStore, ProfileStore};
use super::types::CallerIdentity;

/// The deletion sequence. Order matters: dependent rows go first, the
/// identity record last. Only the identity step is fatal.
const CLEANUP_ORDER: [CleanupStep; 4] = [
    CleanupStep {
        target: CleanupTarget::DeviceTokens,
        fatal: false,
    },
    CleanupStep {
        target: CleanupTarget::MemberRow,
        fatal: false,
    },
    CleanupStep {
        target: CleanupTarget::ProfileRow,
        fatal: false,
    },
    CleanupStep {
        target: CleanupTarget::IdentityRecord,
        fatal: true,
    },
];

#[derive(Clone, Copy, Debug)]
struct CleanupStep {
    target: CleanupTarget,
    fatal: bool,
}

#[derive(Clone, Copy, Debug)]
enum CleanupTarget {
    DeviceTokens,
    MemberRow,
    ProfileRow,
    IdentityRecord,
}

impl CleanupTarget {
    fn name(self) -> &'static str {
        match self {
            Self::DeviceTokens => "device_tokens",
            Self::MemberRow => "member_row",
            Self::ProfileRow => "profile_row",
            Self::IdentityRecord => "identity_record",
        }
    }
}

/// Handles the delete action.
pub struct DeleteFlow<I, P, M> {
    identity: I,
    profiles: P,
    member_data: M,
}

impl<I, P, M> DeleteFlow<I, P, M>
where
    I: IdentityStore,
    P: ProfileStore,
    M: MemberDataStore,
{
    pub fn new(identity: I, profiles: P, member_data: M) -> Self {
        Self {
            identity,
            profiles,
            member_data,
        }
    }

    /// Delete a user from the caller's organization.
    ///
    /// The caller must already have passed the authorization gate. The
    /// target is classified against the caller's organization with the
    /// lenient union rule; only an explicitly foreign target is refused.
    #[instrument(skip_all, fields(caller_id = %caller.id, target_user = target_user_id))]
    pub async fn delete(&self, caller: &CallerIdentity, target_user_id: &str) -> Result<()> {
        let target_user_id = target_user_id.trim();
        if target_user_id.is_empty() {
            return Err(LifecycleError::validation("User ID is required"));
        }

        let caller_org = caller
            .require_organization()
            .map_err(|_| LifecycleError::forbidden("Caller has no organization"))?;

        let profile = self.profiles.find_by_id(target_user_id).await?;
        let auth_user = self.identity.find_by_id(target_user_id).await?;

        let profile_org = profile.as_ref().and_then(|p| p.organization_id.as_deref());
        let auth_org = auth_user
            .as_ref()
            .and_then(|u| u.organization_id.as_deref());

        if classify_affiliation(auth_org, profile_org, caller_org)
            == OrgAffiliation::ForeignOrganization
        {
            tracing::info!(
                target: "lifecycle.delete.rejected",
                target_user_id,
                caller_org,
                "Delete refused: target belongs to another organization"
            );
            return Err(LifecycleError::forbidden(
                "User belongs to another organization",
            ));
        }

        for step in CLEANUP_ORDER {
            let result = match step.target {
                CleanupTarget::DeviceTokens => {
                    self.member_data.delete_device_tokens(target_user_id).await
                }
                CleanupTarget::MemberRow => {
                    self.member_data.delete_member_row(target_user_id).await
                }
                CleanupTarget::ProfileRow => self.profiles.delete(target_user_id).await,
                CleanupTarget::IdentityRecord => self.identity.delete_user(target_user_id).await,
            };

            if let Err(e) = result {
                if step.fatal {
                    tracing::error!(
                        target_user_id,
                        step = step.target.name(),
                        error = %e,
                        "Authoritative deletion step failed"
                    );
                    return Err(LifecycleError::Storage(e));
                }
                tracing::warn!(
                    target_user_id,
                    step = step.target.name(),
                    error = %e,
                    "Best-effort cleanup step failed, continuing"
                );
            }
        }

        tracing::info!(
            target: "lifecycle.delete.completed",
            target_user_id,
            caller_org,
            "User deleted"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::test::{FailPoint, InMemoryDirectory};
    use crate::lifecycle::types::{ProfileRow, Role};

    fn caller() -> CallerIdentity {
        CallerIdentity {
            id: "caller-1".into(),
            role: Role::Admin,
            organization_id: Some("org-a".into()),
        }
    }

    fn flow(dir: &InMemoryDirectory) -> DeleteFlow<InMemoryDirectory, InMemoryDirectory, InMemoryDirectory> {
        DeleteFlow::new(dir.clone(), dir.clone(), dir.clone())
    }

    fn seed_target(dir: &InMemoryDirectory, org: Option<&str>) {
        dir.seed_user("u-target", "target@gym.test", org, Role::Member, true);
        dir.seed_device_token("u-target");
        dir.seed_member_row("u-target");
    }

    #[tokio::test]
    async fn missing_user_id_is_a_validation_error() {
        let dir = InMemoryDirectory::new();
        let err = flow(&dir).delete(&caller(), "  ").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));
    }

    #[tokio::test]
    async fn caller_without_organization_is_forbidden() {
        let dir = InMemoryDirectory::new();
        seed_target(&dir, Some("org-a"));
        let orgless = CallerIdentity {
            organization_id: None,
            ..caller()
        };

        let err = flow(&dir).delete(&orgless, "u-target").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden { .. }));
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn same_org_target_is_fully_removed() {
        let dir = InMemoryDirectory::new();
        seed_target(&dir, Some("org-a"));

        flow(&dir).delete(&caller(), "u-target").await.unwrap();

        assert!(dir.auth_user("u-target").is_none());
        assert!(dir.profile("u-target").is_none());
        assert!(!dir.has_device_tokens("u-target"));
        assert!(!dir.has_member_row("u-target"));
    }

    #[tokio::test]
    async fn orphaned_target_is_removed() {
        let dir = InMemoryDirectory::new();
        seed_target(&dir, None);

        flow(&dir).delete(&caller(), "u-target").await.unwrap();
        assert!(dir.auth_user("u-target").is_none());
    }

    #[tokio::test]
    async fn foreign_target_is_refused_with_zero_writes() {
        let dir = InMemoryDirectory::new();
        seed_target(&dir, Some("org-b"));

        let err = flow(&dir).delete(&caller(), "u-target").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden { .. }));
        assert_eq!(err.to_string(), "User belongs to another organization");
        assert_eq!(dir.write_count(), 0);
        assert!(dir.auth_user("u-target").is_some());
        assert!(dir.has_device_tokens("u-target"));
    }

    #[tokio::test]
    async fn disagreeing_views_still_allow_delete_when_one_matches() {
        // Profile says org-b, auth metadata says org-a, caller is org-a:
        // the lenient union rule lets the delete proceed.
        let dir = InMemoryDirectory::new();
        dir.seed_auth_user("u-target", "target@gym.test", Some("org-a"));
        dir.seed_profile(ProfileRow {
            id: "u-target".into(),
            organization_id: Some("org-b".into()),
            role: Role::Member,
            first_name: None,
            last_name: None,
            password_changed: true,
            updated_at: None,
        });

        flow(&dir).delete(&caller(), "u-target").await.unwrap();
        assert!(dir.auth_user("u-target").is_none());
    }

    #[tokio::test]
    async fn device_token_failure_does_not_block_identity_removal() {
        let dir = InMemoryDirectory::new();
        seed_target(&dir, Some("org-a"));
        dir.fail_on(FailPoint::DeviceTokenDelete);

        flow(&dir).delete(&caller(), "u-target").await.unwrap();

        // Device tokens linger but the identity record is gone.
        assert!(dir.has_device_tokens("u-target"));
        assert!(dir.auth_user("u-target").is_none());
        assert!(dir.profile("u-target").is_none());
    }

    #[tokio::test]
    async fn all_best_effort_failures_still_remove_identity() {
        let dir = InMemoryDirectory::new();
        seed_target(&dir, Some("org-a"));
        dir.fail_on(FailPoint::DeviceTokenDelete);
        dir.fail_on(FailPoint::MemberRowDelete);
        dir.fail_on(FailPoint::ProfileDelete);

        flow(&dir).delete(&caller(), "u-target").await.unwrap();
        assert!(dir.auth_user("u-target").is_none());
    }

    #[tokio::test]
    async fn identity_removal_failure_is_fatal() {
        let dir = InMemoryDirectory::new();
        seed_target(&dir, Some("org-a"));
        dir.fail_on(FailPoint::IdentityDelete);

        let err = flow(&dir).delete(&caller(), "u-target").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Storage(_)));
        assert!(dir.auth_user("u-target").is_some());
    }
}
