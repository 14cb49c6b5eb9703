//! Invite action.
//!
//! Reconciles an invited email against both stores and lands in one of
//! four outcomes: create a new user, link an orphaned one, report an
//! existing member, or reject a user owned by another organization.
//!
//! Emits tracing events:
//! - `lifecycle.invite.created` - New identity and profile created
//! - `lifecycle.invite.linked` - Orphaned user linked to the caller's org
//! - `lifecycle.invite.already_member` - No-op, user already belongs
//! - `lifecycle.invite.rejected` - User belongs to another organization

use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use super::error::{LifecycleError, Result};
use super::membership::{OrgAffiliation, classify_affiliation};
use super::storage::{IdentityStore, InviteNotifier, ProfileStore};
use super::types::{AttributeBag, AuthView, CallerIdentity, ProfileRow};

/// An invite request: the target email plus a free-form attribute bag
/// (first_name, last_name, role, ...) forwarded into profile and metadata.
#[derive(Clone, Debug)]
pub struct InviteRequest {
    pub email: String,
    pub attributes: AttributeBag,
}

/// Result of a successful invite.
#[derive(Clone, Debug)]
pub enum InviteOutcome {
    /// A new identity record and profile row were created.
    Created(AuthView),
    /// An existing orphaned user was linked to the caller's organization.
    Linked(AuthView),
    /// The user already belongs to the caller's organization; no writes.
    AlreadyMember(AuthView),
}

impl InviteOutcome {
    /// Human-readable message shown in the admin dashboard.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Created(_) => "User created. A confirmation code was sent to their email.",
            Self::Linked(_) => "User linked to your organization.",
            Self::AlreadyMember(_) => "User is already a member of your organization.",
        }
    }

    #[must_use]
    pub fn user(&self) -> &AuthView {
        match self {
            Self::Created(u) | Self::Linked(u) | Self::AlreadyMember(u) => u,
        }
    }
}

/// Handles the invite action.
pub struct InviteFlow<I, P, N> {
    identity: I,
    profiles: P,
    notifier: N,
}

impl<I, P, N> InviteFlow<I, P, N>
where
    I: IdentityStore,
    P: ProfileStore,
    N: InviteNotifier,
{
    pub fn new(identity: I, profiles: P, notifier: N) -> Self {
        Self {
            identity,
            profiles,
            notifier,
        }
    }

    /// Invite a user into the caller's organization.
    ///
    /// The caller must already have passed the authorization gate.
    /// Notification failures are logged and do not fail the action: by the
    /// time a link or code is sent, the authoritative writes have happened.
    #[instrument(skip_all, fields(caller_id = %caller.id))]
    pub async fn invite(
        &self,
        caller: &CallerIdentity,
        req: InviteRequest,
    ) -> Result<InviteOutcome> {
        let email = req.email.trim();
        if email.is_empty() {
            return Err(LifecycleError::validation("Email is required"));
        }

        let caller_org = caller.require_organization()?;

        match self.identity.find_by_email(email).await? {
            Some(existing) => {
                self.reconcile_existing(caller_org, existing, &req.attributes)
                    .await
            }
            None => self.create_new(caller_org, email, &req.attributes).await,
        }
    }

    /// An identity record already exists for this email: classify it and
    /// either link, no-op, or reject.
    async fn reconcile_existing(
        &self,
        caller_org: &str,
        existing: AuthView,
        attributes: &AttributeBag,
    ) -> Result<InviteOutcome> {
        let profile = self.profiles.find_by_id(&existing.id).await?;
        let profile_org = profile.as_ref().and_then(|p| p.organization_id.as_deref());

        match classify_affiliation(existing.organization_id.as_deref(), profile_org, caller_org) {
            OrgAffiliation::Orphaned => {
                // Linking the identity record is authoritative; the profile
                // upsert and notification afterwards are best-effort.
                self.identity
                    .link_organization(&existing.id, caller_org, attributes)
                    .await?;

                let mut row = ProfileRow::from_attributes(&existing.id, caller_org, attributes);
                row.updated_at = Some(Utc::now().to_rfc3339());
                if let Err(e) = self.profiles.upsert(&row).await {
                    tracing::warn!(
                        user_id = %existing.id,
                        error = %e,
                        "Profile upsert failed while linking orphaned user"
                    );
                }

                if let Err(e) = self.notifier.send_signin_code(&existing.email, attributes).await {
                    tracing::error!(
                        email = %existing.email,
                        error = %e,
                        "Failed to send sign-in code"
                    );
                }

                tracing::info!(
                    target: "lifecycle.invite.linked",
                    user_id = %existing.id,
                    organization_id = caller_org,
                    "Orphaned user linked to organization"
                );

                Ok(InviteOutcome::Linked(AuthView {
                    organization_id: Some(caller_org.to_string()),
                    metadata: attributes.clone(),
                    ..existing
                }))
            }
            OrgAffiliation::SameOrganization => {
                tracing::info!(
                    target: "lifecycle.invite.already_member",
                    user_id = %existing.id,
                    organization_id = caller_org,
                    "Invited user is already a member"
                );
                Ok(InviteOutcome::AlreadyMember(existing))
            }
            OrgAffiliation::ForeignOrganization => {
                tracing::info!(
                    target: "lifecycle.invite.rejected",
                    user_id = %existing.id,
                    "Invited user belongs to another organization"
                );
                Err(LifecycleError::ForeignOrganization)
            }
        }
    }

    /// No identity record exists: create one, create a matching profile
    /// row, and send a confirmation link.
    async fn create_new(
        &self,
        caller_org: &str,
        email: &str,
        attributes: &AttributeBag,
    ) -> Result<InviteOutcome> {
        let mut metadata = attributes.clone();
        metadata.insert("password_changed".to_string(), Value::Bool(false));

        let created = self
            .identity
            .create_user(email, caller_org, &metadata)
            .await?;

        let row = ProfileRow::from_attributes(&created.id, caller_org, attributes);
        if let Err(e) = self.profiles.insert(&row).await {
            tracing::warn!(
                user_id = %created.id,
                error = %e,
                "Profile insert failed for newly created user"
            );
        }

        if let Err(e) = self.notifier.send_confirmation_link(email, attributes).await {
            tracing::error!(email, error = %e, "Failed to send confirmation link");
        }

        tracing::info!(
            target: "lifecycle.invite.created",
            user_id = %created.id,
            organization_id = caller_org,
            "New user created and invited"
        );

        Ok(InviteOutcome::Created(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::test::{FailPoint, InMemoryDirectory};
    use crate::lifecycle::types::Role;
    use serde_json::json;

    fn caller() -> CallerIdentity {
        CallerIdentity {
            id: "caller-1".into(),
            role: Role::Owner,
            organization_id: Some("org-a".into()),
        }
    }

    fn flow(dir: &InMemoryDirectory) -> InviteFlow<InMemoryDirectory, InMemoryDirectory, InMemoryDirectory> {
        InviteFlow::new(dir.clone(), dir.clone(), dir.clone())
    }

    fn request(email: &str) -> InviteRequest {
        InviteRequest {
            email: email.into(),
            attributes: json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "role": "member"
            })
            .as_object()
            .unwrap()
            .clone(),
        }
    }

    #[tokio::test]
    async fn missing_email_is_rejected_before_any_lookup() {
        let dir = InMemoryDirectory::new();
        let outcome = flow(&dir).invite(&caller(), request("   ")).await;
        assert!(matches!(outcome, Err(LifecycleError::Validation { .. })));
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn caller_without_organization_is_rejected() {
        let dir = InMemoryDirectory::new();
        let orgless = CallerIdentity {
            organization_id: None,
            ..caller()
        };
        let outcome = flow(&dir).invite(&orgless, request("new@gym.test")).await;
        assert!(matches!(
            outcome,
            Err(LifecycleError::CallerHasNoOrganization)
        ));
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn unknown_email_creates_user_profile_and_link() {
        let dir = InMemoryDirectory::new();
        let outcome = flow(&dir)
            .invite(&caller(), request("new@gym.test"))
            .await
            .unwrap();

        let InviteOutcome::Created(user) = &outcome else {
            panic!("expected Created, got {outcome:?}");
        };
        assert_eq!(user.email, "new@gym.test");
        assert_eq!(user.organization_id.as_deref(), Some("org-a"));
        assert_eq!(user.metadata.get("password_changed"), Some(&json!(false)));

        let profile = dir.profile(&user.id).unwrap();
        assert_eq!(profile.organization_id.as_deref(), Some("org-a"));
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert!(!profile.password_changed);

        assert_eq!(dir.confirmations_sent(), vec!["new@gym.test".to_string()]);
    }

    #[tokio::test]
    async fn confirmation_link_failure_still_reports_created() {
        let dir = InMemoryDirectory::new();
        dir.fail_on(FailPoint::ConfirmationLink);

        let outcome = flow(&dir)
            .invite(&caller(), request("new@gym.test"))
            .await
            .unwrap();
        assert!(matches!(outcome, InviteOutcome::Created(_)));
        assert!(dir.confirmations_sent().is_empty());
    }

    #[tokio::test]
    async fn orphaned_user_is_linked_and_becomes_same_org() {
        let dir = InMemoryDirectory::new();
        dir.seed_auth_user("u-orphan", "lost@gym.test", None);

        let outcome = flow(&dir)
            .invite(&caller(), request("lost@gym.test"))
            .await
            .unwrap();
        let InviteOutcome::Linked(user) = &outcome else {
            panic!("expected Linked, got {outcome:?}");
        };
        assert_eq!(user.id, "u-orphan");
        assert_eq!(user.organization_id.as_deref(), Some("org-a"));

        // Both views now agree: a second classification is same-org.
        let auth = dir.auth_user("u-orphan").unwrap();
        let profile = dir.profile("u-orphan").unwrap();
        assert_eq!(auth.organization_id.as_deref(), Some("org-a"));
        assert_eq!(profile.organization_id.as_deref(), Some("org-a"));
        assert!(profile.updated_at.is_some());

        assert_eq!(dir.signin_codes_sent(), vec!["lost@gym.test".to_string()]);
    }

    #[tokio::test]
    async fn user_orphaned_in_profile_only_is_still_linked() {
        let dir = InMemoryDirectory::new();
        // Identity has no org; profile row missing entirely.
        dir.seed_auth_user("u-half", "half@gym.test", None);
        assert!(dir.profile("u-half").is_none());

        let outcome = flow(&dir)
            .invite(&caller(), request("half@gym.test"))
            .await
            .unwrap();
        assert!(matches!(outcome, InviteOutcome::Linked(_)));
        assert!(dir.profile("u-half").is_some());
    }

    #[tokio::test]
    async fn same_org_invite_is_idempotent_with_no_writes() {
        let dir = InMemoryDirectory::new();
        dir.seed_user("u-member", "member@gym.test", Some("org-a"), Role::Member, true);
        let f = flow(&dir);

        let first = f.invite(&caller(), request("member@gym.test")).await.unwrap();
        let second = f.invite(&caller(), request("member@gym.test")).await.unwrap();

        assert!(matches!(first, InviteOutcome::AlreadyMember(_)));
        assert!(matches!(second, InviteOutcome::AlreadyMember(_)));
        assert_eq!(first.message(), second.message());
        assert_eq!(dir.write_count(), 0);
        assert!(dir.signin_codes_sent().is_empty());
    }

    #[tokio::test]
    async fn profile_org_match_with_absent_auth_org_is_already_member() {
        let dir = InMemoryDirectory::new();
        dir.seed_auth_user("u-skew", "skew@gym.test", None);
        dir.seed_profile(ProfileRow {
            id: "u-skew".into(),
            organization_id: Some("org-a".into()),
            role: Role::Member,
            first_name: None,
            last_name: None,
            password_changed: false,
            updated_at: None,
        });

        let outcome = flow(&dir)
            .invite(&caller(), request("skew@gym.test"))
            .await
            .unwrap();
        assert!(matches!(outcome, InviteOutcome::AlreadyMember(_)));
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn foreign_user_is_rejected_with_no_writes() {
        let dir = InMemoryDirectory::new();
        dir.seed_user("u-other", "other@gym.test", Some("org-b"), Role::Member, true);

        let outcome = flow(&dir).invite(&caller(), request("other@gym.test")).await;
        assert!(matches!(outcome, Err(LifecycleError::ForeignOrganization)));
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let dir = InMemoryDirectory::new();
        dir.seed_user("u-member", "Member@Gym.Test", Some("org-a"), Role::Member, true);

        let outcome = flow(&dir)
            .invite(&caller(), request("member@gym.test"))
            .await
            .unwrap();
        assert!(matches!(outcome, InviteOutcome::AlreadyMember(_)));
    }

    #[tokio::test]
    async fn link_failure_on_identity_store_surfaces() {
        let dir = InMemoryDirectory::new();
        dir.seed_auth_user("u-orphan", "lost@gym.test", None);
        dir.fail_on(FailPoint::LinkOrganization);

        let outcome = flow(&dir).invite(&caller(), request("lost@gym.test")).await;
        assert!(matches!(outcome, Err(LifecycleError::Storage(_))));
    }
}
