use serde::{Deserialize, Serialize};

/// Aggregated counters from `/dashboard/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_goals: u32,
    #[serde(default)]
    pub completed_goals: u32,
    #[serde(default)]
    pub total_skills: u32,
    #[serde(default)]
    pub completed_skills: u32,
    #[serde(default)]
    pub roadmap_progress: u32,
}

/// Goal summary from `/dashboard/goals`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardGoal {
    pub id: i64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub progress: u32,
}

/// AI suggestion from `/dashboard/recommendations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    /// `topic`, `subtopic` or `skill`
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub progress: u32,
}
