use match_engine::models::NotificationCategory;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub category: Option<NotificationCategory>,
}
