// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Access/refresh credential pair. Both tokens are opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Profile returned by `/auth/me`. Replaced wholesale on refetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_email_verified: bool,

    /// Fields this client does not model (roadmaps, role, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// Where a front end should send the user after a session transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Login,
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unauthenticated,
    /// Login or register in flight
    Authenticating,
    Authenticated,
    /// A refresh is in flight; failed requests wait for it
    Refreshing,
}

/// Notifications published by the session manager
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(UserProfile),
    Refreshed,
    SignedOut,
    Navigate(Route),
}

/// Read-only copy of the in-memory session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub loading: bool,
    pub user: Option<UserProfile>,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub authenticated_at: Option<DateTime<Utc>>,
}

/// `/auth/login` response
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// `/auth/register` request body
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// `/auth/register` response (auto-login contract)
#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserProfile,
}

/// `/auth/refresh` response
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    /// Empty or absent means "keep using the current refresh token"
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl RefreshResponse {
    /// Rotated refresh token, if the backend issued one
    pub fn rotated_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Generic `{"message": ...}` acknowledgement
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
