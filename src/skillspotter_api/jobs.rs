use serde::Serialize;

use crate::skillspotter_api::client::{
    path_segment, RequestBody, RequestOptions, SkillSpotterClient,
};
use crate::skillspotter_api::resources::{Dashboard, ExtractedSkills, Job, JobMatch};
use crate::skillspotter_api::types::SkillSpotterError;

#[derive(Debug, Serialize)]
struct ExtractSkillsRequest<'a> {
    text: &'a str,
}

impl SkillSpotterClient {
    /// List job postings
    pub async fn list_jobs(&self) -> Result<Vec<Job>, SkillSpotterError> {
        Ok(self.get("/jobs", None, None).await?)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job, SkillSpotterError> {
        Ok(self.get(&format!("/jobs/{}", path_segment(job_id)?), None, None).await?)
    }

    /// Matches across all of the current user's resumes
    pub async fn job_matches(&self) -> Result<Vec<JobMatch>, SkillSpotterError> {
        Ok(self.get("/user/job-matches", None, None).await?)
    }

    pub async fn job_match_details(&self, job_id: &str) -> Result<JobMatch, SkillSpotterError> {
        Ok(self
            .get(&format!("/user/job-matches/{}", path_segment(job_id)?), None, None)
            .await?)
    }

    /// Ask the backend to extract skills from free text
    pub async fn extract_skills(&self, text: &str) -> Result<ExtractedSkills, SkillSpotterError> {
        let body = RequestBody::json(&ExtractSkillsRequest { text })?;
        Ok(self
            .post("/jobs/extract-skills", body, RequestOptions::default())
            .await?)
    }

    /// Summary shown on the user's dashboard
    pub async fn user_dashboard(&self) -> Result<Dashboard, SkillSpotterError> {
        Ok(self.get("/user/dashboard", None, None).await?)
    }
}
