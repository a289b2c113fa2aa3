use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

use super::endpoints::{self, token_preview};
use super::store::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use super::types::{
    RegisterRequest, Route, SessionEvent, SessionPhase, SessionSnapshot, TokenPair, UserProfile,
};
use crate::error::{ApiError, Result};

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// In-flight refresh shared by every task that needs a new access token
type RefreshFlight = Shared<BoxFuture<'static, Result<String>>>;

/// In-memory session state. Only the manager mutates it.
#[derive(Debug, Default)]
struct SessionState {
    user: Option<UserProfile>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    phase: SessionPhase,
    loading: bool,
    /// Bumped by every login, register, logout and invalidation.
    /// A refresh that started under an older generation must not write.
    generation: u64,
    authenticated_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn clear(&mut self) {
        self.user = None;
        self.access_token = None;
        self.refresh_token = None;
        self.phase = SessionPhase::Unauthenticated;
        self.loading = false;
        self.generation += 1;
        self.authenticated_at = None;
    }

    fn install_tokens(&mut self, tokens: TokenPair) {
        self.access_token = Some(tokens.access_token);
        self.refresh_token = Some(tokens.refresh_token);
    }

    fn install_user(&mut self, user: UserProfile) {
        self.user = Some(user);
        self.phase = SessionPhase::Authenticated;
        self.loading = false;
        self.authenticated_at = Some(Utc::now());
    }
}

fn storage_error(e: anyhow::Error) -> ApiError {
    ApiError::Storage(format!("{:#}", e))
}

/// Session manager
/// Owns the credential pair, the user profile and the session lifecycle.
///
/// Cloning is cheap; every clone shares the same state, store and
/// in-flight refresh. All mutation goes through `login`, `register`,
/// `logout`, `refresh` and `fetch_user`.
#[derive(Clone)]
pub struct SessionManager {
    /// Shared HTTP client (also used by `ApiClient`)
    client: Client,

    /// Backend base URL, e.g. `http://localhost:8000/api/v1`
    base_url: Arc<str>,

    /// Durable credential storage
    store: Arc<dyn CredentialStore>,

    /// Current session state, read at use time by every caller
    state: Arc<RwLock<SessionState>>,

    /// Refresh currently in flight, if any
    in_flight: Arc<Mutex<Option<RefreshFlight>>>,

    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Create a manager and rehydrate tokens and the cached profile from `store`.
    ///
    /// The rehydrated profile is optimistic; call [`bootstrap`](Self::bootstrap)
    /// to verify it against the backend.
    pub fn new(base_url: &str, store: Arc<dyn CredentialStore>, client: Client) -> Result<Self> {
        let access_token = store.get(ACCESS_TOKEN_KEY).map_err(storage_error)?;
        let refresh_token = store.get(REFRESH_TOKEN_KEY).map_err(storage_error)?;

        // No authenticated view without an access token
        let user = match (&access_token, store.get(USER_KEY).map_err(storage_error)?) {
            (Some(_), Some(json)) => match serde_json::from_str::<UserProfile>(&json) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable cached profile");
                    None
                }
            },
            _ => None,
        };

        let phase = if user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        };
        let loading = access_token.is_some() || refresh_token.is_some();

        tracing::debug!(
            has_access_token = access_token.is_some(),
            has_refresh_token = refresh_token.is_some(),
            cached_user = user.is_some(),
            "Session rehydrated from store"
        );

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            store,
            state: Arc::new(RwLock::new(SessionState {
                user,
                access_token,
                refresh_token,
                phase,
                loading,
                generation: 0,
                authenticated_at: None,
            })),
            in_flight: Arc::new(Mutex::new(None)),
            events,
        })
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Backend base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Subscribe to session events (sign-in, refresh, sign-out, navigation)
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // === Read access ===

    /// Current access token together with the session generation it belongs to
    pub async fn access_token_with_generation(&self) -> (Option<String>, u64) {
        let state = self.state.read().await;
        (state.access_token.clone(), state.generation)
    }

    /// Current access token, if one is held
    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.state.read().await.refresh_token.is_some()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            phase: state.phase,
            loading: state.loading,
            user: state.user.clone(),
            has_access_token: state.access_token.is_some(),
            has_refresh_token: state.refresh_token.is_some(),
            authenticated_at: state.authenticated_at,
        }
    }

    /// The signed-in user.
    ///
    /// Re-checks durable storage first: if the access token was removed
    /// from the store behind the manager's back, the profile and token are
    /// dropped and `None` is returned.
    pub async fn user(&self) -> Option<UserProfile> {
        let stored = match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                // Unreadable is not the same as removed
                tracing::warn!(error = %format!("{:#}", e), "Failed to read access token from store");
                return self.state.read().await.user.clone();
            }
        };

        let mut state = self.state.write().await;
        if stored.is_none() && (state.user.is_some() || state.access_token.is_some()) {
            tracing::info!("Access token no longer in store, dropping user profile");
            state.user = None;
            state.access_token = None;
            state.phase = SessionPhase::Unauthenticated;
            state.authenticated_at = None;
        }
        state.user.clone()
    }

    // === Mutation ===

    /// Mark an authentication attempt as started and return the phase to
    /// restore if it fails before touching the session
    async fn begin_attempt(&self) -> SessionPhase {
        let mut state = self.state.write().await;
        let previous = state.phase;
        state.phase = SessionPhase::Authenticating;
        state.loading = true;
        previous
    }

    async fn abandon_attempt(&self, previous: SessionPhase) {
        let mut state = self.state.write().await;
        if state.phase == SessionPhase::Authenticating {
            state.phase = previous;
            state.loading = false;
        }
    }

    /// Persist a fresh credential pair and start a new generation
    async fn start_session(&self, tokens: TokenPair, user: Option<UserProfile>) -> Result<u64> {
        let mut state = self.state.write().await;
        state.generation += 1;

        let persisted = self
            .store
            .set(ACCESS_TOKEN_KEY, &tokens.access_token)
            .and_then(|_| self.store.set(REFRESH_TOKEN_KEY, &tokens.refresh_token))
            .and_then(|_| self.store.remove(USER_KEY));
        if let Err(e) = persisted {
            let _ = self.store.clear();
            state.clear();
            return Err(storage_error(e));
        }

        state.install_tokens(tokens);
        state.user = user;
        Ok(state.generation)
    }

    /// Log in with email and password.
    ///
    /// On failure the stored credentials are left untouched and the server's
    /// message is returned verbatim (`ApiError::Credentials` for bad
    /// credentials).
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let previous = self.begin_attempt().await;

        let response =
            match endpoints::login(&self.client, &self.base_url, email, password).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "Login failed");
                    self.abandon_attempt(previous).await;
                    return Err(e);
                }
            };

        let access_token = response.access_token.clone();
        let generation = self
            .start_session(
                TokenPair {
                    access_token: response.access_token,
                    refresh_token: response.refresh_token,
                },
                response.user,
            )
            .await?;

        let user = self.load_user(&access_token, generation).await?;

        tracing::info!(email = %user.email, "Login successful");
        self.emit(SessionEvent::SignedIn(user.clone()));
        self.emit(SessionEvent::Navigate(Route::Dashboard));
        Ok(user)
    }

    /// Create an account and sign in with the credential pair the backend
    /// returns alongside the new profile.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<UserProfile> {
        let previous = self.begin_attempt().await;

        let request = RegisterRequest {
            username,
            email,
            password,
        };
        let response = match endpoints::register(&self.client, &self.base_url, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Registration failed");
                self.abandon_attempt(previous).await;
                return Err(e);
            }
        };

        let tokens = match (
            response.access_token.filter(|t| !t.is_empty()),
            response.refresh_token.filter(|t| !t.is_empty()),
        ) {
            (Some(access_token), Some(refresh_token)) => TokenPair {
                access_token,
                refresh_token,
            },
            _ => {
                self.abandon_attempt(previous).await;
                return Err(ApiError::InvalidResponse(
                    "Registration response does not contain a credential pair".to_string(),
                ));
            }
        };

        let user = response.user;
        let generation = self.start_session(tokens, None).await?;
        self.install_user(user.clone(), generation).await?;

        tracing::info!(email = %user.email, "Registration successful");
        self.emit(SessionEvent::SignedIn(user.clone()));
        self.emit(SessionEvent::Navigate(Route::Dashboard));
        Ok(user)
    }

    /// Sign out. Never fails.
    ///
    /// The backend is told to revoke the refresh token on a best-effort
    /// basis; local state is cleared regardless of the outcome.
    pub async fn logout(&self) {
        self.end_session(None).await;
    }

    /// Sign out only if the session is still the one started at `generation`.
    ///
    /// Returns `false` and does nothing when a login, register, logout or
    /// invalidation has happened since.
    pub async fn logout_if_current(&self, generation: u64) -> bool {
        self.end_session(Some(generation)).await
    }

    async fn end_session(&self, expected: Option<u64>) -> bool {
        let refresh_token = {
            let mut state = self.state.write().await;
            if let Some(expected) = expected {
                if state.generation != expected {
                    tracing::debug!("Skipping logout of superseded session");
                    return false;
                }
            }
            // Fence off any refresh that is still in flight
            state.generation += 1;
            state.refresh_token.clone()
        };

        if let Some(refresh_token) = refresh_token {
            if let Err(e) = endpoints::logout(&self.client, &self.base_url, &refresh_token).await {
                tracing::warn!(error = %e, "Logout notification failed, clearing local session anyway");
            }
        }

        {
            let mut state = self.state.write().await;
            if let Err(e) = self.store.clear() {
                tracing::error!(error = %format!("{:#}", e), "Failed to clear credential store");
            }
            state.clear();
        }

        tracing::info!("Signed out");
        self.emit(SessionEvent::SignedOut);
        self.emit(SessionEvent::Navigate(Route::Login));
        true
    }

    /// Obtain a new access token with the stored refresh token.
    ///
    /// Concurrent callers share one request. On failure the session is
    /// cleared and the error returned to every waiter.
    pub async fn refresh(&self) -> Result<String> {
        let flight = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!("Joining in-flight token refresh");
                    flight.clone()
                }
                None => {
                    let this = self.clone();
                    let flight = async move {
                        let result = this.run_refresh().await;
                        this.in_flight.lock().await.take();
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    async fn run_refresh(&self) -> Result<String> {
        let (generation, refresh_token) = {
            let mut state = self.state.write().await;
            if state.refresh_token.is_some() {
                state.phase = SessionPhase::Refreshing;
                state.loading = true;
            }
            (state.generation, state.refresh_token.clone())
        };

        let Some(refresh_token) = refresh_token else {
            tracing::warn!("Refresh requested without a refresh token");
            self.invalidate(generation).await;
            return Err(ApiError::MissingRefreshToken);
        };

        let data = match endpoints::refresh(&self.client, &self.base_url, &refresh_token).await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "Token refresh failed");
                self.invalidate(generation).await;
                return Err(e);
            }
        };

        {
            let mut state = self.state.write().await;
            if state.generation != generation {
                tracing::warn!("Discarding refresh result, session changed while it was in flight");
                return Err(ApiError::SessionEnded);
            }

            let persisted = self
                .store
                .set(ACCESS_TOKEN_KEY, &data.access_token)
                .and_then(|_| match data.rotated_refresh_token() {
                    Some(rotated) => self.store.set(REFRESH_TOKEN_KEY, rotated),
                    None => Ok(()),
                });
            if let Err(e) = persisted {
                let _ = self.store.clear();
                state.clear();
                return Err(storage_error(e));
            }

            state.access_token = Some(data.access_token.clone());
            if let Some(rotated) = data.rotated_refresh_token() {
                state.refresh_token = Some(rotated.to_string());
            }
        }

        self.load_user(&data.access_token, generation).await?;

        self.emit(SessionEvent::Refreshed);
        Ok(data.access_token)
    }

    /// Fetch the profile for `token` and install it.
    ///
    /// Any failure is treated as an invalid session: stored credentials and
    /// the user are cleared and the error is returned.
    pub async fn fetch_user(&self, token: &str) -> Result<UserProfile> {
        let generation = self.state.read().await.generation;
        self.load_user(token, generation).await
    }

    async fn load_user(&self, token: &str, generation: u64) -> Result<UserProfile> {
        match endpoints::me(&self.client, &self.base_url, token).await {
            Ok(user) => {
                self.install_user(user.clone(), generation).await?;
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, token = %token_preview(token), "Failed to fetch user");
                self.invalidate(generation).await;
                Err(e)
            }
        }
    }

    async fn install_user(&self, user: UserProfile, generation: u64) -> Result<()> {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return Err(ApiError::SessionEnded);
        }

        match serde_json::to_string(&user) {
            Ok(json) => {
                if let Err(e) = self.store.set(USER_KEY, &json) {
                    tracing::warn!(error = %format!("{:#}", e), "Failed to cache user profile");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize user profile"),
        }

        state.install_user(user);
        Ok(())
    }

    /// Clear the session, unless a newer generation has taken over
    async fn invalidate(&self, generation: u64) {
        let mut state = self.state.write().await;
        if state.generation != generation {
            tracing::debug!("Skipping invalidation of superseded session");
            return;
        }
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %format!("{:#}", e), "Failed to clear credential store");
        }
        state.clear();
        drop(state);

        tracing::info!("Session invalidated");
        self.emit(SessionEvent::SignedOut);
        self.emit(SessionEvent::Navigate(Route::Login));
    }

    /// Restore the session on startup.
    ///
    /// - access token stored: verify it; if that fails, fall back to a
    ///   refresh when a refresh token exists
    /// - only a refresh token: refresh
    /// - nothing stored: unauthenticated, no network calls
    pub async fn bootstrap(&self) -> SessionPhase {
        let (generation, access_token, has_refresh_token) = {
            let state = self.state.read().await;
            (
                state.generation,
                state.access_token.clone(),
                state.refresh_token.is_some(),
            )
        };

        match (access_token, has_refresh_token) {
            (Some(access_token), _) => {
                match endpoints::me(&self.client, &self.base_url, &access_token).await {
                    Ok(user) => {
                        if let Err(e) = self.install_user(user, generation).await {
                            tracing::debug!(error = %e, "Bootstrap superseded");
                        }
                    }
                    Err(e) if has_refresh_token => {
                        tracing::info!(error = %e, "Stored access token rejected, trying refresh");
                        if let Err(e) = self.refresh().await {
                            tracing::info!(error = %e, "No active session");
                        }
                    }
                    Err(e) => {
                        tracing::info!(error = %e, "Stored access token rejected, no refresh token");
                        self.invalidate(generation).await;
                    }
                }
            }
            (None, true) => {
                if let Err(e) = self.refresh().await {
                    tracing::info!(error = %e, "No active session");
                }
            }
            (None, false) => {
                let mut state = self.state.write().await;
                state.loading = false;
                tracing::debug!("No stored credentials");
            }
        }

        self.phase().await
    }
}
