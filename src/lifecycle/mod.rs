//! User-lifecycle reconciliation.
//!
//! The privileged actions of the admin dashboard: invite a user into an
//! organization, delete a user, reset a password, and look up an identity
//! record. Each action authorizes the caller, merges the target's two
//! partial views (identity metadata and profile row), classifies the
//! target's affiliation, and applies a single effect.
//!
//! The flows are generic over the storage traits in [`storage`]; wire them
//! to [`crate::store::RestDirectory`] in production or to
//! [`test::InMemoryDirectory`] in tests.

mod authorize;
mod delete;
mod error;
mod invite;
mod membership;
mod password;
pub mod storage;
mod types;


pub use authorize::AuthorizationGate;
pub use delete::DeleteFlow;
pub use error::LifecycleError;
pub use invite::{InviteFlow, InviteOutcome, InviteRequest};
pub use membership::{OrgAffiliation, classify_affiliation};
pub use password::PasswordResetFlow;
pub use types::{AttributeBag, AuthView, CallerIdentity, ParseRoleError, ProfileRow, Role};
