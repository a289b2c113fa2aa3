use serde::{Deserialize, Serialize};

/// Skill status value the backend uses for finished skills
pub const SKILL_COMPLETED: &str = "completed";

/// Learning roadmap: topics, subtopics and skills, usually AI-generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: i64,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub roadmap_id: i64,
    #[serde(default)]
    pub subtopics: Vec<Subtopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtopic {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub topic_id: i64,
    #[serde(default)]
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub estimated_hours: i64,
    pub difficulty: String,
    /// `pending`, `in_progress` or `completed`
    pub status: String,
    pub subtopic_id: i64,
}

/// Editable skill fields; `PUT /roadmaps/skills/{id}` replaces all of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillUpdate {
    pub name: String,
    pub description: Option<String>,
    pub estimated_hours: i64,
    pub difficulty: String,
}

impl Skill {
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case(SKILL_COMPLETED)
    }
}

impl Roadmap {
    /// All skills in topic/subtopic order
    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.topics
            .iter()
            .flat_map(|t| t.subtopics.iter())
            .flat_map(|s| s.skills.iter())
    }

    /// Completed skills as a whole percentage (0 for an empty roadmap)
    pub fn progress_percent(&self) -> u8 {
        let (done, total) = self
            .skills()
            .fold((0usize, 0usize), |(d, t), s| (d + s.is_completed() as usize, t + 1));
        if total == 0 {
            0
        } else {
            ((done * 100) / total) as u8
        }
    }

    /// Estimated hours left on skills that are not completed
    pub fn remaining_hours(&self) -> i64 {
        self.skills()
            .filter(|s| !s.is_completed())
            .map(|s| s.estimated_hours)
            .sum()
    }
}
