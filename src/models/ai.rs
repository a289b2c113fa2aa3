use serde::{Deserialize, Serialize};

/// Reply from the backend's AI assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiChatResponse {
    pub response: String,
}
