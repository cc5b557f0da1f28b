use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::Role;

/// The caller on whose behalf a workflow operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: Role::User,
        }
    }

    pub fn admin(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            role: Role::Admin,
            ..Self::new(id, display_name)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedUp { user_id: String },
    SignedIn { user_id: String },
    SignedOut { user_id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("{0}")]
    Invalid(String),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Identity backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<String, IdentityError>;

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError>;

    /// `None` for a missing, expired or revoked token.
    async fn current_user(&self, token: &str) -> Option<Identity>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
