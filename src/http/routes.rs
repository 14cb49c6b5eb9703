//! Axum router and handlers for the lifecycle endpoints.
//!
//! Each endpoint is a POST taking a bearer credential and a JSON body,
//! matching the serverless functions the admin dashboard was built
//! against. Preflight `OPTIONS` requests are answered by the CORS layer
//! applied in [`crate::serve`].

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    routing::post,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::lifecycle::{
    AttributeBag, AuthorizationGate, DeleteFlow, InviteFlow, InviteRequest, LifecycleError,
    PasswordResetFlow,
    storage::{CallerAuthenticator, IdentityStore, InviteNotifier, MemberDataStore, ProfileStore},
};

use super::response::{GetUserResponse, InviteResponse, MessageResponse, UserBody};

/// Everything the handlers need from a backing directory.
///
/// Blanket-implemented for any type providing all the storage seams, so
/// the same router runs against the REST directory in production and the
/// in-memory directory in tests.
pub trait Directory:
    CallerAuthenticator
    + IdentityStore
    + ProfileStore
    + MemberDataStore
    + InviteNotifier
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> Directory for T where
    T: CallerAuthenticator
        + IdentityStore
        + ProfileStore
        + MemberDataStore
        + InviteNotifier
        + Clone
        + Send
        + Sync
        + 'static
{
}

/// Shared state: the flows, each holding its own handle to the directory.
pub struct AppState<D: Directory> {
    gate: AuthorizationGate<D, D>,
    invite: InviteFlow<D, D, D>,
    delete: DeleteFlow<D, D, D>,
    password: PasswordResetFlow<D, D>,
    identity: D,
}

impl<D: Directory> AppState<D> {
    pub fn new(directory: D) -> Self {
        Self {
            gate: AuthorizationGate::new(directory.clone(), directory.clone()),
            invite: InviteFlow::new(directory.clone(), directory.clone(), directory.clone()),
            delete: DeleteFlow::new(directory.clone(), directory.clone(), directory.clone()),
            password: PasswordResetFlow::new(directory.clone(), directory.clone()),
            identity: directory,
        }
    }
}

/// Build the lifecycle router.
pub fn router<D: Directory>(state: Arc<AppState<D>>) -> Router {
    Router::new()
        .route("/invite-user", post(invite_user::<D>))
        .route("/delete-user", post(delete_user::<D>))
        .route("/update-user-password", post(update_user_password::<D>))
        .route("/admin-get-user", post(admin_get_user::<D>))
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[derive(Debug, Deserialize)]
struct InviteBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    data: Option<AttributeBag>,
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PasswordResetBody {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
    #[serde(default, rename = "newPassword")]
    new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetUserBody {
    #[serde(default)]
    user_id: Option<String>,
}

async fn invite_user<D: Directory>(
    State(state): State<Arc<AppState<D>>>,
    headers: HeaderMap,
    Json(body): Json<InviteBody>,
) -> Result<Json<InviteResponse>, LifecycleError> {
    let caller = state.gate.authorize(bearer_token(&headers)).await?;

    let request = InviteRequest {
        email: body.email.unwrap_or_default(),
        attributes: body.data.unwrap_or_default(),
    };

    let outcome = state.invite.invite(&caller, request).await?;
    let message = outcome.message().to_string();

    Ok(Json(InviteResponse {
        user: UserBody::from(outcome.user().clone()),
        message,
    }))
}

async fn delete_user<D: Directory>(
    State(state): State<Arc<AppState<D>>>,
    headers: HeaderMap,
    Json(body): Json<DeleteBody>,
) -> Result<Json<MessageResponse>, LifecycleError> {
    let caller = state.gate.authorize(bearer_token(&headers)).await?;

    state
        .delete
        .delete(&caller, &body.user_id.unwrap_or_default())
        .await?;

    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

async fn update_user_password<D: Directory>(
    State(state): State<Arc<AppState<D>>>,
    headers: HeaderMap,
    Json(body): Json<PasswordResetBody>,
) -> Result<Json<MessageResponse>, LifecycleError> {
    let caller = state.gate.authorize(bearer_token(&headers)).await?;

    state
        .password
        .reset(
            &caller,
            &body.user_id.unwrap_or_default(),
            &body.new_password.unwrap_or_default(),
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}

async fn admin_get_user<D: Directory>(
    State(state): State<Arc<AppState<D>>>,
    headers: HeaderMap,
    Json(body): Json<GetUserBody>,
) -> Result<Json<GetUserResponse>, LifecycleError> {
    state.gate.authorize(bearer_token(&headers)).await?;

    let user_id = body.user_id.unwrap_or_default();
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(LifecycleError::validation("User ID required"));
    }

    let user = IdentityStore::find_by_id(&state.identity, user_id)
        .await
        .map_err(LifecycleError::Storage)?
        .ok_or(LifecycleError::NotFound)?;

    Ok(Json(GetUserResponse {
        user: UserBody::from(user),
    }))
}
