use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::api::AuthError;

use super::SessionManager;

/// Runs requests with the session's access credential, recovering once from a 401.
#[derive(Clone)]
pub struct AuthorizedClient {
    session: SessionManager,
}

impl AuthorizedClient {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    /// Call `request` with a valid access credential.
    ///
    /// Waits for any refresh already in flight. If the call comes back
    /// `Unauthorized`, the credential it used is refreshed (single-flight)
    /// and the call is retried exactly once; a second `Unauthorized` is
    /// returned as-is.
    pub async fn call<T, F, Fut>(&self, mut request: F) -> Result<T, AuthError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let token = self.session.ensure_valid(false).await?;

        match request(token.clone()).await {
            Err(AuthError::Unauthorized) => {
                debug!("Request unauthorized, refreshing and retrying once");
                let fresh = self.session.refresh_rejected(&token).await?;
                request(fresh).await
            }
            other => other,
        }
    }

    /// GET a protected JSON resource on the auth service's host
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let client = self.session.client();
        self.call(move |token| async move { client.get_json(path, &token).await })
            .await
    }

    /// POST a JSON body to a protected resource on the auth service's host
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        let client = self.session.client();
        self.call(move |token| async move { client.post_json(path, &token, body).await })
            .await
    }
}
