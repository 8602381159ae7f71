//! Admin panel endpoints.
//!
//! The backend enforces the admin role; a non-admin session gets a 403
//! which surfaces as [`crate::ApiError::Validation`].

use crate::skillspotter_api::client::{
    path_segment, RequestBody, RequestOptions, SkillSpotterClient,
};
use crate::skillspotter_api::resources::{AdminUser, Candidate, Dashboard, Job, JobDraft};
use crate::skillspotter_api::types::SkillSpotterError;

impl SkillSpotterClient {
    pub async fn create_job(&self, draft: &JobDraft) -> Result<Job, SkillSpotterError> {
        tracing::info!("Creating job posting: title={}", draft.title);
        Ok(self
            .post("/admin/jobs", RequestBody::json(draft)?, RequestOptions::default())
            .await?)
    }

    pub async fn update_job(&self, job_id: &str, draft: &JobDraft) -> Result<Job, SkillSpotterError> {
        Ok(self
            .put(
                &format!("/admin/jobs/{}", path_segment(job_id)?),
                RequestBody::json(draft)?,
                RequestOptions::default(),
            )
            .await?)
    }

    /// Flip a job between active and inactive, returning the updated job
    pub async fn toggle_job_status(&self, job_id: &str) -> Result<Job, SkillSpotterError> {
        Ok(self
            .post(
                &format!("/admin/jobs/{}/toggle", path_segment(job_id)?),
                RequestBody::Empty,
                RequestOptions::default(),
            )
            .await?)
    }

    pub async fn job_candidates(&self, job_id: &str) -> Result<Vec<Candidate>, SkillSpotterError> {
        Ok(self
            .get(&format!("/admin/jobs/{}/candidates", path_segment(job_id)?), None, None)
            .await?)
    }

    pub async fn list_users(&self) -> Result<Vec<AdminUser>, SkillSpotterError> {
        Ok(self.get("/admin/users", None, None).await?)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<AdminUser, SkillSpotterError> {
        Ok(self.get(&format!("/admin/users/{}", path_segment(user_id)?), None, None).await?)
    }

    pub async fn admin_dashboard(&self) -> Result<Dashboard, SkillSpotterError> {
        Ok(self.get("/admin/dashboard", None, None).await?)
    }
}
