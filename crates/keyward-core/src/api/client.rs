//! HTTP client for the authorization service.
//!
//! `AuthClient` maps the remote register/login/refresh/profile/logout
//! operations onto typed results. It holds no session state: every
//! credential it needs is passed in by the caller.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::models::{CredentialPair, LoginRequest, LogoutRequest, Profile, RefreshRequest};

use super::error::Operation;
use super::AuthError;

/// Auth-service client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    /// Create a client rooted at `base_url`. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, mapping the status to an `AuthError` if not.
    async fn check_response(op: Operation, response: Response) -> Result<Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(?op, %status, "Auth service returned error status");
            Err(AuthError::from_status(op, status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(op: Operation, response: Response) -> Result<T, AuthError> {
        let response = Self::check_response(op, response).await?;
        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("{:?} response: {}", op, e)))
    }

    async fn post_credentials<B: Serialize>(
        &self,
        op: Operation,
        path: &str,
        body: &B,
    ) -> Result<CredentialPair, AuthError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::parse_json(op, response).await
    }

    // ===== Remote Operations =====

    /// Create an account and return its first credential pair
    pub async fn register(&self, email: &str, password: &str) -> Result<CredentialPair, AuthError> {
        self.post_credentials(Operation::Register, "/register", &LoginRequest { email, password })
            .await
    }

    /// Exchange email/password for a credential pair
    pub async fn login(&self, email: &str, password: &str) -> Result<CredentialPair, AuthError> {
        self.post_credentials(Operation::Login, "/login", &LoginRequest { email, password })
            .await
    }

    /// Rotate a refresh credential. The one passed in is spent once this succeeds.
    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, AuthError> {
        self.post_credentials(Operation::Refresh, "/refresh", &RefreshRequest { refresh_token })
            .await
    }

    /// Fetch the profile of the user owning `access_token`
    pub async fn fetch_profile(&self, access_token: &str) -> Result<Profile, AuthError> {
        self.get_authorized(Operation::Profile, "/me", access_token).await
    }

    /// Revoke server-side sessions.
    ///
    /// With `all_sessions` every refresh credential of the user is revoked and
    /// no body is sent, even if `refresh_token` is given. Otherwise only
    /// `refresh_token` is revoked.
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        all_sessions: bool,
    ) -> Result<(), AuthError> {
        let mut request = self
            .client
            .post(self.url("/logout"))
            .bearer_auth(access_token)
            .query(&[("all_sessions", if all_sessions { "true" } else { "false" })]);

        if !all_sessions {
            if let Some(refresh_token) = refresh_token {
                request = request.json(&LogoutRequest { refresh_token });
            }
        }

        let response = request.send().await?;
        Self::check_response(Operation::Logout, response).await?;
        Ok(())
    }

    // ===== Protected Resources =====

    /// GET a protected JSON resource on the same service
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, access_token: &str) -> Result<T, AuthError> {
        self.get_authorized(Operation::Resource, path, access_token).await
    }

    async fn get_authorized<T: DeserializeOwned>(
        &self,
        op: Operation,
        path: &str,
        access_token: &str,
    ) -> Result<T, AuthError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::parse_json(op, response).await
    }

    /// POST a JSON body to a protected resource on the same service
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        access_token: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;
        Self::parse_json(Operation::Resource, response).await
    }
}
