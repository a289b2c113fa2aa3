// Roadmap endpoints

use serde_json::json;

use crate::error::Result;
use crate::http_client::ApiClient;
use crate::models::{Roadmap, Skill, SkillUpdate};

pub async fn list(api: &ApiClient) -> Result<Vec<Roadmap>> {
    api.get_json("/roadmaps").await
}

pub async fn get(api: &ApiClient, roadmap_id: i64) -> Result<Roadmap> {
    api.get_json(&format!("/roadmaps/{}", roadmap_id)).await
}

/// Create an empty roadmap
pub async fn create(api: &ApiClient, title: &str, description: Option<&str>) -> Result<Roadmap> {
    api.send_json(
        api.post("/roadmaps/")
            .json(&json!({ "title": title, "description": description })),
    )
    .await
}

/// Have the backend generate a roadmap for a career goal.
/// Generation runs an LLM on the backend and can take a while.
pub async fn generate(api: &ApiClient, goal: &str) -> Result<Roadmap> {
    tracing::info!(goal = %goal, "Requesting roadmap generation");
    api.send_json(api.post("/roadmaps/generate").json(&json!({ "goal": goal })))
        .await
}

/// Replace a skill's name, description, estimate and difficulty
pub async fn update_skill(api: &ApiClient, skill_id: i64, update: &SkillUpdate) -> Result<Skill> {
    api.send_json(api.put(&format!("/roadmaps/skills/{}", skill_id)).json(update))
        .await
}

pub async fn update_skill_status(api: &ApiClient, skill_id: i64, status: &str) -> Result<Skill> {
    api.send_json(
        api.put(&format!("/roadmaps/{}/status", skill_id))
            .json(&json!({ "status": status })),
    )
    .await
}

pub async fn delete_skill(api: &ApiClient, skill_id: i64) -> Result<Skill> {
    api.send_json(api.delete(&format!("/roadmaps/skills/{}", skill_id)))
        .await
}
