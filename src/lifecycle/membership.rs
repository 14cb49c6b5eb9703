//! Organization-membership classification.
//!
//! A target user's organization id lives in two stores that are updated by
//! different code paths with no cross-store transaction: the identity
//! provider's metadata blob (auth view) and the application profile row
//! (profile view). This module merges the two partial views into a single
//! classification for one request.

/// A target user's affiliation relative to the caller's organization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrgAffiliation {
    /// No organization id in either view.
    Orphaned,
    /// At least one view's organization id equals the caller's.
    SameOrganization,
    /// Every present view's organization id differs from the caller's.
    ForeignOrganization,
}

/// Classify a target user against the caller's organization.
///
/// The rule is a deliberately permissive union: the user counts as
/// belonging to the caller's organization if *either* view says so, and is
/// only foreign when every present view disagrees. This tolerates
/// write-order skew between the two stores; when the views are both
/// present and disagree a warning is emitted so the skew is observable.
///
/// The caller's organization id must already be validated non-empty.
pub fn classify_affiliation(
    auth_org: Option<&str>,
    profile_org: Option<&str>,
    caller_org: &str,
) -> OrgAffiliation {
    let auth_org = auth_org.filter(|org| !org.is_empty());
    let profile_org = profile_org.filter(|org| !org.is_empty());

    if let (Some(a), Some(p)) = (auth_org, profile_org) {
        if a != p {
            tracing::warn!(
                target: "lifecycle.classify.skew",
                auth_org = a,
                profile_org = p,
                "Auth view and profile view disagree on organization"
            );
        }
    }

    if auth_org.is_none() && profile_org.is_none() {
        OrgAffiliation::Orphaned
    } else if auth_org == Some(caller_org) || profile_org == Some(caller_org) {
        OrgAffiliation::SameOrganization
    } else {
        OrgAffiliation::ForeignOrganization
    }
}
