//! JSON body shapes for the lifecycle endpoints.
//!
//! These mirror what the admin dashboard already consumes: `{ user,
//! message }` on invite, `{ message }` on delete and password reset, and
//! `{ error }` on failure (see [`crate::error::ErrorBody`]).

use serde::Serialize;

use crate::lifecycle::{AttributeBag, AuthView};

/// A user as returned to the dashboard: identity record fields with the
/// organization id under its metadata key.
#[derive(Debug, Serialize)]
pub struct UserBody {
    pub id: String,
    pub email: String,
    pub app_metadata: AppMetadata,
    pub user_metadata: AttributeBag,
}

#[derive(Debug, Serialize)]
pub struct AppMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl From<AuthView> for UserBody {
    fn from(user: AuthView) -> Self {
        Self {
            id: user.id,
            email: user.email,
            app_metadata: AppMetadata {
                organization_id: user.organization_id,
            },
            user_metadata: user.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub user: UserBody,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct GetUserResponse {
    pub user: UserBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_body_matches_dashboard_shape() {
        let user = AuthView {
            id: "u1".into(),
            email: "a@gym.test".into(),
            organization_id: Some("org-a".into()),
            metadata: json!({ "first_name": "Ada" }).as_object().unwrap().clone(),
        };

        let body = serde_json::to_value(UserBody::from(user)).unwrap();
        assert_eq!(
            body,
            json!({
                "id": "u1",
                "email": "a@gym.test",
                "app_metadata": { "organization_id": "org-a" },
                "user_metadata": { "first_name": "Ada" }
            })
        );
    }

    #[test]
    fn orgless_user_omits_organization_id() {
        let user = AuthView {
            id: "u1".into(),
            email: "a@gym.test".into(),
            organization_id: None,
            metadata: AttributeBag::new(),
        };
        let body = serde_json::to_value(UserBody::from(user)).unwrap();
        assert_eq!(body["app_metadata"], json!({}));
    }
}
