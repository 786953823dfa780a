//! Session manager: owns the one session and serialises every change to it.
//!
//! Login, register and refresh are the only operations that install
//! credentials. Refreshes are single-flight: the first caller that finds the
//! access credential stale starts one remote refresh and parks a shared
//! future in the session; everybody else who arrives while it runs awaits
//! that same future and sees the same outcome.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::api::{AuthClient, AuthError};
use crate::auth::CredentialStore;
use crate::config::SessionConfig;
use crate::models::{CredentialPair, Profile};
use crate::utils::{validate_login, validate_registration};

use super::request::AuthorizedClient;
use super::state::{Session, SessionSnapshot, SessionState};

/// A refresh in progress; resolves to the new access credential
type PendingRefresh = Shared<BoxFuture<'static, Result<String, AuthError>>>;

/// How a logout went on the server side. Locally it always succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The service confirmed the revocation
    Revoked,
    /// Local state cleared; the remote call was skipped, failed or timed out
    LocalOnly,
}

#[derive(Debug, Clone, Copy)]
enum Credentials {
    Register,
    Login,
}

struct Inner {
    session: Session,
    refresh: Option<PendingRefresh>,
}

struct Core {
    client: AuthClient,
    store: Arc<dyn CredentialStore>,
    config: SessionConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionState>,
}

/// Handle to the process's session. Cloning shares the same session.
#[derive(Clone)]
pub struct SessionManager {
    core: Arc<Core>,
}

impl Core {
    fn publish(&self, state: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(from = current.display_name(), to = state.display_name(), "Session state changed");
                *current = state;
                true
            }
        });
    }

    /// Install a new pair and persist its refresh half. Persistence failure is not fatal.
    fn install(&self, session: &mut Session, pair: CredentialPair) {
        if let Err(e) = self.store.save(&pair.refresh_token) {
            warn!(error = %e, "Failed to persist refresh token; a new login will be needed next launch");
        }
        session.install(pair);
        self.publish(session.state);
    }

    /// End the session and forget the durable credential
    fn terminate(&self, inner: &mut Inner) {
        inner.session.reset();
        inner.refresh = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored refresh token");
        }
        self.publish(inner.session.state);
    }

    async fn run_refresh(
        &self,
        refresh_token: String,
        epoch: u64,
        previous: SessionState,
    ) -> Result<String, AuthError> {
        debug!(epoch, "Refreshing credentials");
        let outcome = match timeout(self.config.auth_timeout, self.client.refresh(&refresh_token)).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::ServiceUnavailable("refresh timed out".to_string())),
        };

        let mut inner = self.inner.lock().await;
        if inner.session.epoch != epoch {
            debug!(epoch, current = inner.session.epoch, "Discarding refresh result for an ended session");
            return Err(AuthError::NotAuthenticated);
        }
        inner.refresh = None;

        match outcome {
            Ok(pair) => {
                let access = pair.access_token.clone();
                self.install(&mut inner.session, pair);
                info!(epoch, "Credentials refreshed");
                Ok(access)
            }
            Err(AuthError::RefreshTokenInvalid) => {
                warn!(epoch, "Refresh token rejected; session ended");
                self.terminate(&mut inner);
                Err(AuthError::RefreshTokenInvalid)
            }
            Err(e) => {
                warn!(epoch, error = %e, "Refresh failed; keeping current session");
                if previous == SessionState::LoggedOut {
                    // Validating a stored credential at startup. Keep it on disk for a later retry.
                    inner.session.reset();
                } else {
                    inner.session.state = previous;
                }
                self.publish(inner.session.state);
                Err(e)
            }
        }
    }
}

impl SessionManager {
    pub fn new(client: AuthClient, store: Arc<dyn CredentialStore>, config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::LoggedOut);
        Self {
            core: Arc::new(Core {
                client,
                store,
                config,
                inner: Mutex::new(Inner {
                    session: Session::new(),
                    refresh: None,
                }),
                state_tx,
            }),
        }
    }

    pub fn client(&self) -> &AuthClient {
        &self.core.client
    }

    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    /// Request wrapper bound to this session
    pub fn authorized(&self) -> AuthorizedClient {
        AuthorizedClient::new(self.clone())
    }

    pub async fn state(&self) -> SessionState {
        self.core.inner.lock().await.session.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.core.inner.lock().await;
        SessionSnapshot::of(&inner.session, self.core.config.access_token_ttl)
    }

    /// Watch state transitions, e.g. to prompt for login when a session expires
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.core.state_tx.subscribe()
    }

    // ===== Establishing a Session =====

    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        validate_login(email, password)?;
        self.authenticate(Credentials::Login, email, password).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        validate_registration(email, password)?;
        self.authenticate(Credentials::Register, email, password).await
    }

    async fn authenticate(&self, kind: Credentials, email: &str, password: &str) -> Result<(), AuthError> {
        let epoch = {
            let mut inner = self.core.inner.lock().await;
            match inner.session.state {
                SessionState::LoggedOut => {}
                SessionState::Authenticating => return Err(AuthError::LoginInProgress),
                SessionState::Authenticated | SessionState::Refreshing => {
                    return Err(AuthError::AlreadyAuthenticated)
                }
            }
            inner.session.state = SessionState::Authenticating;
            self.core.publish(inner.session.state);
            inner.session.begin()
        };

        // Run on its own task so a caller giving up can't strand the session in Authenticating
        let core = Arc::clone(&self.core);
        let (email, password) = (email.to_string(), password.to_string());
        let task = tokio::spawn(async move {
            let request = async {
                match kind {
                    Credentials::Register => core.client.register(&email, &password).await,
                    Credentials::Login => core.client.login(&email, &password).await,
                }
            };
            let outcome = match timeout(core.config.auth_timeout, request).await {
                Ok(result) => result,
                Err(_) => Err(AuthError::ServiceUnavailable(format!("{:?} timed out", kind))),
            };

            let mut inner = core.inner.lock().await;
            if inner.session.epoch != epoch {
                debug!(epoch, "Discarding login result for an ended session");
                return Err(AuthError::NotAuthenticated);
            }
            match outcome {
                Ok(pair) => {
                    inner.session.profile = None;
                    core.install(&mut inner.session, pair);
                    info!(?kind, "Login successful");
                    Ok(())
                }
                Err(e) => {
                    if matches!(e, AuthError::InvalidResponse(_)) {
                        error!(?kind, error = %e, "Login failed");
                    } else {
                        warn!(?kind, error = %e, "Login failed");
                    }
                    inner.session.state = SessionState::LoggedOut;
                    core.publish(inner.session.state);
                    Err(e)
                }
            }
        });

        task.await
            .unwrap_or_else(|e| Err(AuthError::ServiceUnavailable(format!("login task failed: {}", e))))
    }

    /// Resume from a refresh credential persisted by an earlier run.
    ///
    /// Returns `Ok(false)` when nothing is stored. The stored credential is
    /// validated by refreshing it.
    pub async fn restore(&self) -> Result<bool, AuthError> {
        let pending = {
            let mut inner = self.core.inner.lock().await;
            match inner.session.state {
                SessionState::LoggedOut => {}
                SessionState::Authenticating => return Err(AuthError::LoginInProgress),
                _ => return Err(AuthError::AlreadyAuthenticated),
            }

            let stored = match self.core.store.load() {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "Failed to load stored refresh token");
                    None
                }
            };
            let Some(refresh_token) = stored else {
                debug!("No stored refresh token");
                return Ok(false);
            };

            inner.session.begin();
            inner.session.refresh_token = Some(refresh_token);
            self.start_refresh(&mut inner)?
        };

        pending.await.map(|_| true)
    }

    // ===== Credential Access =====

    /// A usable access credential, refreshing first if it is due (or always, with `force`).
    ///
    /// Joins a refresh that is already running instead of starting another.
    pub async fn ensure_valid(&self, force: bool) -> Result<String, AuthError> {
        self.ensure(force, None).await
    }

    /// Forced refresh after the server rejected `rejected`.
    ///
    /// If the session already holds a different access credential, someone
    /// else rotated it in the meantime and that one is returned without a
    /// remote call.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String, AuthError> {
        self.ensure(true, Some(rejected)).await
    }

    /// Current access credential, refreshed if due
    pub async fn access_token(&self) -> Result<String, AuthError> {
        self.ensure_valid(false).await
    }

    async fn ensure(&self, force: bool, rejected: Option<&str>) -> Result<String, AuthError> {
        let pending = {
            let mut inner = self.core.inner.lock().await;
            match inner.session.state {
                SessionState::LoggedOut | SessionState::Authenticating => {
                    return Err(AuthError::NotAuthenticated)
                }
                SessionState::Refreshing => match &inner.refresh {
                    Some(pending) => {
                        debug!("Joining in-flight refresh");
                        pending.clone()
                    }
                    None => return Err(AuthError::NotAuthenticated),
                },
                SessionState::Authenticated => {
                    let config = &self.core.config;
                    if let Some(grant) = &inner.session.access {
                        let still_good = match rejected {
                            Some(rejected) => grant.token != rejected,
                            None => !force && !grant.needs_refresh(config.access_token_ttl, config.refresh_buffer),
                        };
                        if still_good {
                            return Ok(grant.token.clone());
                        }
                        debug!(force, expired = grant.is_expired(config.access_token_ttl), "Access token stale");
                    }
                    self.start_refresh(&mut inner)?
                }
            }
        };

        pending.await
    }

    /// Move to `Refreshing` and park the shared refresh future. Caller holds the lock.
    fn start_refresh(&self, inner: &mut Inner) -> Result<PendingRefresh, AuthError> {
        let refresh_token = inner
            .session
            .refresh_token
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;
        let epoch = inner.session.epoch;
        let previous = inner.session.state;

        inner.session.state = SessionState::Refreshing;
        self.core.publish(inner.session.state);

        let core = Arc::clone(&self.core);
        let pending = async move { core.run_refresh(refresh_token, epoch, previous).await }
            .boxed()
            .shared();
        inner.refresh = Some(pending.clone());

        // Drive it to completion even if every waiter goes away
        tokio::spawn(pending.clone());
        Ok(pending)
    }

    // ===== Profile =====

    /// The logged-in user's profile, from cache or fetched via `/me`
    pub async fn profile(&self) -> Result<Profile, AuthError> {
        let epoch = {
            let inner = self.core.inner.lock().await;
            if let Some(profile) = &inner.session.profile {
                return Ok(profile.clone());
            }
            inner.session.epoch
        };

        let client = self.client();
        let profile = self
            .authorized()
            .call(move |token| async move { client.fetch_profile(&token).await })
            .await?;

        let mut inner = self.core.inner.lock().await;
        if inner.session.epoch == epoch && inner.session.state.is_active() {
            inner.session.profile = Some(profile.clone());
        }
        Ok(profile)
    }

    // ===== Ending a Session =====

    /// Clear the session locally, then tell the service on a best-effort basis.
    ///
    /// Never fails and is safe to repeat. A refresh still in flight finishes
    /// but its result is discarded.
    pub async fn logout(&self, all_sessions: bool) -> LogoutOutcome {
        let (access, refresh) = {
            let mut inner = self.core.inner.lock().await;
            let was = inner.session.state;
            let access = inner.session.access_token().map(str::to_string);
            let refresh = inner.session.refresh_token.clone();
            self.core.terminate(&mut inner);
            info!(was = was.display_name(), all_sessions, "Logged out locally");
            (access, refresh)
        };

        let Some(access) = access else {
            return LogoutOutcome::LocalOnly;
        };

        let remote = self.core.client.logout(&access, refresh.as_deref(), all_sessions);
        match timeout(self.core.config.logout_timeout, remote).await {
            Ok(Ok(())) => LogoutOutcome::Revoked,
            Ok(Err(e)) => {
                warn!(error = %e, "Remote logout failed");
                LogoutOutcome::LocalOnly
            }
            Err(_) => {
                warn!("Remote logout timed out");
                LogoutOutcome::LocalOnly
            }
        }
    }
}
