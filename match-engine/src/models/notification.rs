use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    MatchInvitation,
    InvitationAccepted,
    MatchReminder,
    ChatMessage,
    RatingRequest,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::MatchInvitation => "match_invitation",
            NotificationType::InvitationAccepted => "invitation_accepted",
            NotificationType::MatchReminder => "match_reminder",
            NotificationType::ChatMessage => "chat_message",
            NotificationType::RatingRequest => "rating_request",
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            NotificationType::MatchInvitation | NotificationType::InvitationAccepted => {
                NotificationCategory::Invitations
            }
            NotificationType::ChatMessage => NotificationCategory::Chat,
            NotificationType::MatchReminder | NotificationType::RatingRequest => {
                NotificationCategory::System
            }
        }
    }
}

/// Inbox tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Invitations,
    Chat,
    System,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub data: NotificationData,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub read_at: Option<DateTime<Utc>>,
}

/// A notification waiting in the outbox. `created_at` is fixed at enqueue time.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingNotification {
    pub user_id: String,
    pub kind: NotificationType,
    pub title: String,
    pub description: String,
    pub data: NotificationData,
    pub created_at: DateTime<Utc>,
}

impl OutgoingNotification {
    pub fn match_invitation(
        user_id: &str,
        match_id: &str,
        invitation_id: &str,
        location: &str,
        date_time: &str,
        inviter_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: NotificationType::MatchInvitation,
            title: "Match Invitation".to_string(),
            description: format!(
                "You were invited to join a match at {location} on {date_time}."
            ),
            data: NotificationData {
                match_id: Some(match_id.to_string()),
                invitation_id: Some(invitation_id.to_string()),
                match_location: Some(location.to_string()),
                match_date_time: Some(date_time.to_string()),
                inviter_name: Some(inviter_name.to_string()),
                ..Default::default()
            },
            created_at: now,
        }
    }

    pub fn invitation_accepted(
        user_id: &str,
        match_id: &str,
        invitation_id: &str,
        location: &str,
        accepter_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: NotificationType::InvitationAccepted,
            title: "Invitation Accepted".to_string(),
            description: format!(
                "{accepter_name} accepted your invitation for the match at {location}."
            ),
            data: NotificationData {
                match_id: Some(match_id.to_string()),
                invitation_id: Some(invitation_id.to_string()),
                match_location: Some(location.to_string()),
                accepter_name: Some(accepter_name.to_string()),
                ..Default::default()
            },
            created_at: now,
        }
    }

    pub fn match_reminder(
        user_id: &str,
        match_id: &str,
        location: &str,
        date_time: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: NotificationType::MatchReminder,
            title: "Match Reminder".to_string(),
            description: format!("Your match starts in 2 hours at {location}."),
            data: NotificationData {
                match_id: Some(match_id.to_string()),
                match_location: Some(location.to_string()),
                match_date_time: Some(date_time.to_string()),
                ..Default::default()
            },
            created_at: now,
        }
    }

    pub fn chat_message(
        user_id: &str,
        match_id: &str,
        chat_id: &str,
        message_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let noun = if message_count == 1 { "message" } else { "messages" };
        Self {
            user_id: user_id.to_string(),
            kind: NotificationType::ChatMessage,
            title: "New Chat Message".to_string(),
            description: format!("You have {message_count} new {noun} in the match chat."),
            data: NotificationData {
                match_id: Some(match_id.to_string()),
                chat_id: Some(chat_id.to_string()),
                message_count: Some(message_count),
                ..Default::default()
            },
            created_at: now,
        }
    }

    pub fn rating_request(
        user_id: &str,
        match_id: &str,
        location: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: NotificationType::RatingRequest,
            title: "Rating Request".to_string(),
            description: format!("Please rate the players from your last match at {location}."),
            data: NotificationData {
                match_id: Some(match_id.to_string()),
                match_location: Some(location.to_string()),
                ..Default::default()
            },
            created_at: now,
        }
    }

    pub fn into_record(self) -> Notification {
        Notification {
            id: String::new(),
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            description: self.description,
            read: false,
            data: self.data,
            created_at: self.created_at,
            read_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}
