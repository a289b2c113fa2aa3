// Data models for backend resources

pub mod ai;
pub mod dashboard;
pub mod roadmap;

pub use ai::AiChatResponse;
pub use dashboard::{DashboardGoal, DashboardStats, Recommendation};
pub use roadmap::{Roadmap, Skill, SkillUpdate, Subtopic, Topic};
