use bytes::Bytes;

use crate::skillspotter_api::client::{
    path_segment, RequestBody, RequestOptions, SkillSpotterClient,
};
use crate::skillspotter_api::resources::{JobMatch, Resume, ResumeSkills, UploadResponse};
use crate::skillspotter_api::types::{ApiError, SkillSpotterError};
use crate::validation;

/// Multipart field name the backend expects the file under
const UPLOAD_FIELD: &str = "resume";

impl SkillSpotterClient {
    /// List the current user's resumes
    pub async fn list_resumes(&self) -> Result<Vec<Resume>, SkillSpotterError> {
        Ok(self.get("/resumes", None, None).await?)
    }

    pub async fn get_resume(&self, resume_id: &str) -> Result<Resume, SkillSpotterError> {
        Ok(self.get(&format!("/resumes/{}", path_segment(resume_id)?), None, None).await?)
    }

    /// Upload a resume file
    ///
    /// The content type is derived from the file extension and checked,
    /// together with the size, before anything is sent.
    ///
    /// # Arguments
    ///
    /// * `file_name` - Original file name; its extension selects the content type
    /// * `data` - File contents (pdf, doc, docx, txt or rtf, at most 5 MiB)
    ///
    /// # Returns
    ///
    /// Returns `Ok(UploadResponse)` with the new resume ID, or
    /// `Err(SkillSpotterError::Input)` if the file is rejected locally, or
    /// `Err(SkillSpotterError::Api)` if the upload request fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use skillspotter_sdk::SkillSpotterClient;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = SkillSpotterClient::new("http://localhost:5000/api")?;
    /// let data = std::fs::read("cv.pdf")?;
    /// let uploaded = client.upload_resume("cv.pdf", data).await?;
    /// println!("Stored as {}", uploaded.resume_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn upload_resume(
        &self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<UploadResponse, SkillSpotterError> {
        let content_type = validation::content_type_for(file_name).ok_or_else(|| {
            validation::ValidationError::UnsupportedFileType {
                content_type: file_name.rsplit('.').next().unwrap_or_default().to_string(),
            }
        })?;
        validation::validate_upload(content_type, data.len())?;

        tracing::info!("Uploading resume: file_name={}, size={}", file_name, data.len());

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ApiError::Request(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        Ok(self
            .post("/resumes/upload", RequestBody::Multipart(form), RequestOptions::default())
            .await?)
    }

    /// Download the original resume document
    pub async fn download_resume(&self, resume_id: &str) -> Result<Bytes, SkillSpotterError> {
        Ok(self
            .download(
                &format!("/resumes/{}/download", path_segment(resume_id)?),
                RequestOptions::default(),
            )
            .await?)
    }

    pub async fn delete_resume(&self, resume_id: &str) -> Result<(), SkillSpotterError> {
        self.delete::<serde_json::Value>(
            &format!("/resumes/{}", path_segment(resume_id)?),
            RequestOptions::default(),
        )
        .await?;
        tracing::info!("Deleted resume {}", resume_id);
        Ok(())
    }

    pub async fn resume_skills(&self, resume_id: &str) -> Result<ResumeSkills, SkillSpotterError> {
        Ok(self
            .get(&format!("/resumes/{}/skills", path_segment(resume_id)?), None, None)
            .await?)
    }

    /// Jobs matched against one resume
    pub async fn resume_matches(&self, resume_id: &str) -> Result<Vec<JobMatch>, SkillSpotterError> {
        Ok(self
            .get(&format!("/resumes/{}/matches", path_segment(resume_id)?), None, None)
            .await?)
    }
}
