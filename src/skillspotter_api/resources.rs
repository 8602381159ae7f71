use serde::{Deserialize, Serialize};

use crate::skillspotter_api::types::Role;

/// Uploaded resume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub resume_id: String,
    pub file_name: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub upload_timestamp: Option<String>,
    /// Skills the backend extracted from the document
    #[serde(default)]
    pub extracted_skills: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Skills extracted from a resume
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSkills {
    #[serde(default, alias = "extractedSkills")]
    pub skills: Vec<String>,
}

/// Response to a resume upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub resume_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub post_timestamp: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Payload for creating or updating a job posting
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub required_skills: Vec<String>,
}

/// Score of a resume against a job, as computed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMatch {
    #[serde(default)]
    pub match_id: Option<String>,
    pub job_id: String,
    #[serde(default)]
    pub resume_id: Option<String>,
    /// Embedded job record, when the backend expands it
    #[serde(default)]
    pub job: Option<Job>,
    pub match_score: f64,
    #[serde(default)]
    pub skill_score: Option<f64>,
    #[serde(default)]
    pub matching_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub match_timestamp: Option<String>,
}

/// Skills the backend found in a free-text description
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedSkills {
    #[serde(default)]
    pub skills: Vec<String>,
}

/// User notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Account as listed in the admin panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(alias = "id")]
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub resume_count: Option<u32>,
}

/// Candidate for a job, as listed in the admin panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub resume_id: Option<String>,
    pub match_score: f64,
    #[serde(default)]
    pub matching_skills: Vec<String>,
}

/// Dashboard payloads are summary objects whose fields vary per release
pub type Dashboard = serde_json::Value;
