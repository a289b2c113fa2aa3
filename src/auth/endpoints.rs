// Raw calls against the backend's /auth endpoints
// None of these go through the interceptor

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use super::types::{
    LoginResponse, MessageResponse, RefreshResponse, RegisterRequest, RegisterResponse,
    UserProfile,
};
use crate::error::{ApiError, Result};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const ME_PATH: &str = "/auth/me";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const VERIFY_EMAIL_PATH: &str = "/auth/verify-email";

/// Join the base URL and an absolute API path
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// First characters of a token, for log lines
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}...", prefix)
}

async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e)))
}

/// Exchange email/password (form-encoded) for a credential pair
pub async fn login(
    client: &Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> Result<LoginResponse> {
    let url = endpoint_url(base_url, LOGIN_PATH);
    tracing::debug!(url = %url, email = %email, "Sending login request");

    let response = client
        .post(&url)
        .form(&[("username", email), ("password", password)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "Login rejected");
        return Err(ApiError::from_login_status(status, &error_text));
    }

    let data: LoginResponse = parse_json(response, "login").await?;
    if data.access_token.is_empty() || data.refresh_token.is_empty() {
        return Err(ApiError::InvalidResponse(
            "Login response does not contain a credential pair".to_string(),
        ));
    }
    Ok(data)
}

/// Create an account. The backend logs the new user in immediately.
pub async fn register(
    client: &Client,
    base_url: &str,
    request: &RegisterRequest<'_>,
) -> Result<RegisterResponse> {
    let url = endpoint_url(base_url, REGISTER_PATH);
    tracing::debug!(url = %url, email = %request.email, "Sending register request");

    let response = client.post(&url).json(request).send().await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "Registration rejected");
        return Err(ApiError::from_status(status, &error_text));
    }

    parse_json(response, "register").await
}

/// Fetch the profile belonging to `access_token`
pub async fn me(client: &Client, base_url: &str, access_token: &str) -> Result<UserProfile> {
    let url = endpoint_url(base_url, ME_PATH);
    tracing::debug!(url = %url, token = %token_preview(access_token), "Fetching user profile");

    let response = client.get(&url).bearer_auth(access_token).send().await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status, &error_text));
    }

    parse_json(response, "profile").await
}

/// Mint a new access token from a refresh token
pub async fn refresh(client: &Client, base_url: &str, refresh_token: &str) -> Result<RefreshResponse> {
    let url = endpoint_url(base_url, REFRESH_PATH);
    tracing::info!(token = %token_preview(refresh_token), "Refreshing access token...");

    let response = client.post(&url).bearer_auth(refresh_token).send().await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = %status,
            body = %crate::error::truncate_body(&error_text),
            "Token refresh rejected"
        );
        return Err(ApiError::from_refresh_status(status, &error_text));
    }

    let data: RefreshResponse = parse_json(response, "refresh").await?;
    if data.access_token.is_empty() {
        return Err(ApiError::InvalidResponse(
            "Refresh response does not contain access_token".to_string(),
        ));
    }

    tracing::info!(token = %token_preview(&data.access_token), "Access token refreshed");
    Ok(data)
}

/// Tell the backend to revoke `refresh_token`
pub async fn logout(client: &Client, base_url: &str, refresh_token: &str) -> Result<()> {
    let url = endpoint_url(base_url, LOGOUT_PATH);
    tracing::debug!(url = %url, "Sending logout notification");

    let response = client.post(&url).bearer_auth(refresh_token).send().await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status, &error_text));
    }
    Ok(())
}

/// Confirm an email address with the token from the verification mail
pub async fn verify_email(client: &Client, base_url: &str, token: &str) -> Result<MessageResponse> {
    let mut url = Url::parse(&endpoint_url(base_url, VERIFY_EMAIL_PATH))
        .map_err(|e| ApiError::Internal(format!("Invalid base URL: {}", e)))?;
    // The token is a single path segment, whatever it contains
    url.path_segments_mut()
        .map_err(|_| ApiError::Internal(format!("Base URL cannot take a path: {}", base_url)))?
        .push(token);

    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status, &error_text));
    }

    parse_json(response, "verify-email").await
}
