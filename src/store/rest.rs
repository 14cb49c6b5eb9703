//! REST adapter for the hosted identity/profile platform.
//!
//! Implements every lifecycle storage trait over the platform's two HTTP
//! APIs: the auth admin API for identity records and the table API for
//! application rows. The caller-scoped anon key is used only by
//! [`CallerAuthenticator::authenticate`]; everything else runs with the
//! elevated service key.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::PlatformConfig;
use crate::error::{FitgateError, Result};
use crate::lifecycle::storage::{
    CallerAuthenticator, IdentityStore, InviteNotifier, MemberDataStore, ProfileStore,
};
use crate::lifecycle::{AttributeBag, AuthView, ProfileRow};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size used when scanning identity records by email. The platform
/// offers no server-side email filter on the admin listing endpoint.
const LIST_USERS_PER_PAGE: u32 = 1000;

/// Client for the platform's auth admin and table APIs.
#[derive(Clone)]
pub struct RestDirectory {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

/// Identity record as the platform serializes it.
#[derive(Debug, Deserialize)]
struct PlatformUser {
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    app_metadata: AttributeBag,
    #[serde(default)]
    user_metadata: AttributeBag,
}

impl From<PlatformUser> for AuthView {
    fn from(user: PlatformUser) -> Self {
        let organization_id = user
            .app_metadata
            .get("organization_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            id: user.id,
            email: user.email,
            organization_id,
            metadata: user.user_metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<PlatformUser>,
}

impl RestDirectory {
    /// Build a directory from platform credentials.
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FitgateError::internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key: config.service_key.clone(),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Attach the elevated service credential to a request.
    fn with_service_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn expect_success(response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(FitgateError::upstream(format!(
            "{context} failed with status {status}: {body}"
        )))
    }
}

#[async_trait]
impl CallerAuthenticator for RestDirectory {
    async fn authenticate(&self, bearer_token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.auth_url("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("caller lookup failed: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user: PlatformUser = response
                    .json()
                    .await
                    .map_err(|e| FitgateError::upstream(format!("caller lookup: {e}")))?;
                Ok(Some(user.id))
            }
            status => Err(FitgateError::upstream(format!(
                "caller lookup failed with status {status}"
            ))),
        }
    }
}

#[async_trait]
impl IdentityStore for RestDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<AuthView>> {
        let per_page = LIST_USERS_PER_PAGE.to_string();
        let response = self
            .with_service_key(self.client.get(self.auth_url("/admin/users")))
            .query(&[("page", "1"), ("per_page", per_page.as_str())])
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("user listing failed: {e}")))?;

        let response = Self::expect_success(response, "user listing").await?;
        let list: UserList = response
            .json()
            .await
            .map_err(|e| FitgateError::upstream(format!("user listing: {e}")))?;

        Ok(list
            .users
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(AuthView::from))
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<AuthView>> {
        let response = self
            .with_service_key(
                self.client
                    .get(self.auth_url(&format!("/admin/users/{user_id}"))),
            )
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("user lookup failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success(response, "user lookup").await?;
        let user: PlatformUser = response
            .json()
            .await
            .map_err(|e| FitgateError::upstream(format!("user lookup: {e}")))?;
        Ok(Some(user.into()))
    }

    async fn create_user(
        &self,
        email: &str,
        organization_id: &str,
        metadata: &AttributeBag,
    ) -> Result<AuthView> {
        let body = json!({
            "email": email,
            "email_confirm": false,
            "user_metadata": metadata,
            "app_metadata": { "organization_id": organization_id },
        });

        let response = self
            .with_service_key(self.client.post(self.auth_url("/admin/users")))
            .json(&body)
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("user creation failed: {e}")))?;

        let response = Self::expect_success(response, "user creation").await?;
        let user: PlatformUser = response
            .json()
            .await
            .map_err(|e| FitgateError::upstream(format!("user creation: {e}")))?;
        Ok(user.into())
    }

    async fn link_organization(
        &self,
        user_id: &str,
        organization_id: &str,
        metadata: &AttributeBag,
    ) -> Result<()> {
        let body = json!({
            "app_metadata": { "organization_id": organization_id },
            "user_metadata": metadata,
        });

        let response = self
            .with_service_key(
                self.client
                    .put(self.auth_url(&format!("/admin/users/{user_id}"))),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("user update failed: {e}")))?;

        Self::expect_success(response, "user update").await?;
        Ok(())
    }

    async fn update_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        let response = self
            .with_service_key(
                self.client
                    .put(self.auth_url(&format!("/admin/users/{user_id}"))),
            )
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("password update failed: {e}")))?;

        Self::expect_success(response, "password update").await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let response = self
            .with_service_key(
                self.client
                    .delete(self.auth_url(&format!("/admin/users/{user_id}"))),
            )
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("user deletion failed: {e}")))?;

        Self::expect_success(response, "user deletion").await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for RestDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        let response = self
            .with_service_key(self.client.get(self.table_url("profiles")))
            .query(&[("id", format!("eq.{user_id}")), ("select", "*".to_string())])
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("profile lookup failed: {e}")))?;

        let response = Self::expect_success(response, "profile lookup").await?;
        let mut rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| FitgateError::upstream(format!("profile lookup: {e}")))?;
        Ok(rows.pop())
    }

    async fn insert(&self, row: &ProfileRow) -> Result<()> {
        let response = self
            .with_service_key(self.client.post(self.table_url("profiles")))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("profile insert failed: {e}")))?;

        Self::expect_success(response, "profile insert").await?;
        Ok(())
    }

    async fn upsert(&self, row: &ProfileRow) -> Result<()> {
        let response = self
            .with_service_key(self.client.post(self.table_url("profiles")))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("profile upsert failed: {e}")))?;

        Self::expect_success(response, "profile upsert").await?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let response = self
            .with_service_key(self.client.delete(self.table_url("profiles")))
            .query(&[("id", format!("eq.{user_id}"))])
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("profile delete failed: {e}")))?;

        Self::expect_success(response, "profile delete").await?;
        Ok(())
    }
}

#[async_trait]
impl MemberDataStore for RestDirectory {
    async fn delete_device_tokens(&self, user_id: &str) -> Result<()> {
        let response = self
            .with_service_key(self.client.delete(self.table_url("fcm_tokens")))
            .query(&[("user_id", format!("eq.{user_id}"))])
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("device token delete failed: {e}")))?;

        Self::expect_success(response, "device token delete").await?;
        Ok(())
    }

    async fn delete_member_row(&self, user_id: &str) -> Result<()> {
        let response = self
            .with_service_key(self.client.delete(self.table_url("members")))
            .query(&[("id", format!("eq.{user_id}"))])
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("member row delete failed: {e}")))?;

        Self::expect_success(response, "member row delete").await?;
        Ok(())
    }
}

#[async_trait]
impl InviteNotifier for RestDirectory {
    async fn send_confirmation_link(&self, email: &str, metadata: &AttributeBag) -> Result<()> {
        let body = json!({
            "type": "signup",
            "email": email,
            "options": { "data": metadata },
        });

        let response = self
            .with_service_key(self.client.post(self.auth_url("/admin/generate_link")))
            .json(&body)
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("confirmation link failed: {e}")))?;

        Self::expect_success(response, "confirmation link").await?;
        Ok(())
    }

    async fn send_signin_code(&self, email: &str, metadata: &AttributeBag) -> Result<()> {
        let body = json!({
            "email": email,
            "create_user": false,
            "data": metadata,
        });

        let response = self
            .with_service_key(self.client.post(self.auth_url("/otp")))
            .json(&body)
            .send()
            .await
            .map_err(|e| FitgateError::upstream(format!("sign-in code failed: {e}")))?;

        Self::expect_success(response, "sign-in code").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platform_user_maps_to_auth_view() {
        let user: PlatformUser = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@gym.test",
            "app_metadata": { "organization_id": "org-a", "provider": "email" },
            "user_metadata": { "first_name": "Ada" }
        }))
        .unwrap();

        let view = AuthView::from(user);
        assert_eq!(view.id, "u1");
        assert_eq!(view.organization_id.as_deref(), Some("org-a"));
        assert_eq!(view.metadata.get("first_name"), Some(&json!("Ada")));
    }

    #[test]
    fn missing_metadata_yields_orgless_view() {
        let user: PlatformUser = serde_json::from_value(json!({ "id": "u1" })).unwrap();
        let view = AuthView::from(user);
        assert!(view.organization_id.is_none());
        assert!(view.metadata.is_empty());
    }

    #[test]
    fn directory_requires_complete_credentials() {
        let config = PlatformConfig {
            url: "https://example.test".into(),
            anon_key: String::new(),
            service_key: "svc".into(),
        };
        assert!(RestDirectory::new(&config).is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = PlatformConfig {
            url: "https://example.test/".into(),
            anon_key: "anon".into(),
            service_key: "svc".into(),
        };
        let dir = RestDirectory::new(&config).unwrap();
        assert_eq!(dir.auth_url("/user"), "https://example.test/auth/v1/user");
        assert_eq!(
            dir.table_url("profiles"),
            "https://example.test/rest/v1/profiles"
        );
    }
}
