use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::auth::endpoints::{endpoint_url, token_preview, LOGIN_PATH, REFRESH_PATH};
use crate::auth::SessionManager;
use crate::error::{ApiError, Result};

/// Paths whose 401 means "bad credentials", not "expired access token"
fn is_refresh_exempt(path: &str) -> bool {
    path.ends_with(LOGIN_PATH) || path.ends_with(REFRESH_PATH)
}

fn set_bearer(headers: &mut HeaderMap, token: &str) -> Result<()> {
    let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| ApiError::Internal(format!("Access token is not a valid header value: {}", e)))?;
    headers.insert(AUTHORIZATION, value);
    Ok(())
}

/// HTTP client for the backend API with session handling
///
/// Every request carries the current access token. A 401 on any path other
/// than login/refresh triggers one refresh and one replay; if the refresh
/// fails the session is logged out and the refresh error returned.
#[derive(Clone)]
pub struct ApiClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Session manager (token source and refresh)
    session: SessionManager,
}

impl ApiClient {
    /// Create a client that shares the session manager's connection pool
    pub fn new(session: SessionManager) -> Self {
        Self {
            client: session.client().clone(),
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        endpoint_url(self.session.base_url(), path)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Build and execute a request
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build request: {}", e)))?;
        self.execute(request).await
    }

    /// Execute a request and decode a JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Execute a request and discard the body
    pub async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder).await.map(|_| ())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(self.get(path)).await
    }

    /// Execute a request with bearer injection and refresh-and-replay
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let method = request.method().clone();
        let url = request.url().clone();
        let refresh_allowed = !is_refresh_exempt(url.path());
        let mut retried = false;

        loop {
            // Clone the request for this attempt
            let mut req = request.try_clone().ok_or_else(|| {
                ApiError::Internal("Request body is not cloneable".to_string())
            })?;

            // Read the token now, not when the request was built
            let (sent_token, sent_generation) = self.session.access_token_with_generation().await;
            if let Some(ref token) = sent_token {
                set_bearer(req.headers_mut(), token)?;
            }

            tracing::debug!(
                request_id = %request_id,
                method = %method,
                url = %url,
                replay = retried,
                token = %sent_token.as_deref().map(token_preview).unwrap_or_default(),
                "Sending HTTP request"
            );

            let response = match self.client.execute(req).await {
                Ok(response) => response,
                Err(e) => {
                    let err = ApiError::from(e);
                    tracing::warn!(
                        request_id = %request_id,
                        url = %url,
                        error = %err,
                        "HTTP request error"
                    );
                    return Err(err);
                }
            };

            let status = response.status();
            tracing::debug!(request_id = %request_id, status = %status, "Received HTTP response");

            if status.is_success() {
                return Ok(response);
            }

            // 401: refresh once and replay
            if status == StatusCode::UNAUTHORIZED && refresh_allowed && !retried {
                retried = true;

                let current = self.session.access_token().await;
                if current.is_some() && current != sent_token {
                    tracing::debug!(
                        request_id = %request_id,
                        "Access token changed while request was in flight, replaying"
                    );
                    continue;
                }

                tracing::warn!(request_id = %request_id, url = %url, "Received 401, refreshing token and retrying...");
                match self.session.refresh().await {
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::error!(
                            request_id = %request_id,
                            error = %e,
                            "Auto-refresh failed, logging out"
                        );
                        // Only end the session this request was sent under
                        self.session.logout_if_current(sent_generation).await;
                        return Err(e);
                    }
                }
            }

            // Non-retryable error or replay also failed
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                request_id = %request_id,
                status = status.as_u16(),
                url = %url,
                response_body = %crate::error::truncate_body(&error_text),
                "HTTP request failed with error response"
            );
            return Err(ApiError::from_status(status, &error_text));
        }
    }
}
