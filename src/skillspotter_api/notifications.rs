use crate::skillspotter_api::client::{
    path_segment, RequestBody, RequestOptions, SkillSpotterClient,
};
use crate::skillspotter_api::resources::Notification;
use crate::skillspotter_api::types::SkillSpotterError;

impl SkillSpotterClient {
    pub async fn list_notifications(&self) -> Result<Vec<Notification>, SkillSpotterError> {
        Ok(self.get("/notifications", None, None).await?)
    }

    pub async fn mark_notification_read(
        &self,
        notification_id: &str,
    ) -> Result<(), SkillSpotterError> {
        self.post::<serde_json::Value>(
            &format!("/notifications/{}/read", path_segment(notification_id)?),
            RequestBody::Empty,
            RequestOptions::default(),
        )
        .await?;
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), SkillSpotterError> {
        self.post::<serde_json::Value>(
            "/notifications/read-all",
            RequestBody::Empty,
            RequestOptions::default(),
        )
        .await?;
        Ok(())
    }

    /// Number of unread notifications
    pub async fn unread_notification_count(&self) -> Result<usize, SkillSpotterError> {
        Ok(self
            .list_notifications()
            .await?
            .iter()
            .filter(|n| !n.read)
            .count())
    }
}
