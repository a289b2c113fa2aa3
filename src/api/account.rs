// Account endpoints beyond login/logout

use crate::auth::endpoints;
use crate::auth::types::MessageResponse;
use crate::error::Result;
use crate::http_client::ApiClient;

/// Ask the backend to mail a fresh verification link to the signed-in user
pub async fn request_verification_email(api: &ApiClient) -> Result<MessageResponse> {
    api.send_json(api.post("/auth/request-verification-email"))
        .await
}

/// Confirm an email address. Public; no session required.
pub async fn verify_email(api: &ApiClient, token: &str) -> Result<MessageResponse> {
    let session = api.session();
    endpoints::verify_email(session.client(), session.base_url(), token).await
}

/// Delete the signed-in account, then clear the local session
pub async fn delete_account(api: &ApiClient) -> Result<()> {
    api.send_empty(api.delete("/users/me")).await?;
    tracing::info!("Account deleted");
    api.session().logout().await;
    Ok(())
}
