// AI assistant endpoint

use serde_json::json;

use crate::error::Result;
use crate::http_client::ApiClient;
use crate::models::AiChatResponse;

/// Send one message to the assistant and return its reply
pub async fn chat(api: &ApiClient, content: &str) -> Result<AiChatResponse> {
    tracing::debug!(chars = content.chars().count(), "Sending AI chat message");
    api.send_json(api.post("/ai/chat").json(&json!({ "content": content })))
        .await
}
