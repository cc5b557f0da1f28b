use async_trait::async_trait;
use chrono::Utc;
use match_engine::models::format_instant;
use match_engine::services::PlayerDirectory;
use match_engine::store::{DocumentStore, Query};
use match_engine::{AuthEvent, Identity, IdentityError, IdentityProvider, Session};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::middleware::auth::{generate_token, verify_token};

pub const CREDENTIALS: &str = "credentials";

fn backend(e: impl std::fmt::Display) -> IdentityError {
    IdentityError::Backend(e.to_string())
}

/// Email/password accounts in the document store, sessions as signed JWTs.
pub struct LocalIdentityProvider {
    store: Arc<dyn DocumentStore>,
    players: PlayerDirectory,
    jwt: JwtConfig,
    /// Revoked token ids mapped to their expiry.
    revoked: Arc<RwLock<HashMap<String, i64>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl LocalIdentityProvider {
    pub fn new(store: Arc<dyn DocumentStore>, players: PlayerDirectory, jwt: JwtConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            players,
            jwt,
            revoked: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    fn publish(&self, event: AuthEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = email.trim().to_lowercase();
        let docs = self
            .store
            .query(CREDENTIALS, &Query::new().eq("email", email.as_str()).limit(1))
            .await
            .map_err(backend)?;
        let doc = docs
            .into_iter()
            .next()
            .ok_or(IdentityError::InvalidCredentials)?;

        let hash = doc.body["passwordHash"].as_str().unwrap_or_default();
        let valid = bcrypt::verify(password, hash).map_err(backend)?;
        if !valid {
            tracing::info!(email = %email, "sign-in rejected");
            return Err(IdentityError::InvalidCredentials);
        }

        let user_id = doc.body["userId"].as_str().unwrap_or(&doc.id).to_string();
        let access_token =
            generate_token(&user_id, &email, &self.jwt.secret, self.jwt.access_expiry_secs)
                .map_err(backend)?;

        tracing::info!(user_id = %user_id, "signed in");
        self.publish(AuthEvent::SignedIn {
            user_id: user_id.clone(),
        });
        Ok(Session {
            user_id,
            email,
            access_token,
            expires_in: self.jwt.access_expiry_secs,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<String, IdentityError> {
        let email = email.trim().to_lowercase();
        let display_name = display_name.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(IdentityError::Invalid("A valid email is required".into()));
        }
        if password.len() < 6 {
            return Err(IdentityError::Invalid(
                "Password must be at least 6 characters".into(),
            ));
        }
        if display_name.is_empty() {
            return Err(IdentityError::Invalid("Display name is required".into()));
        }

        let password_hash = bcrypt::hash(password, self.jwt.bcrypt_cost).map_err(backend)?;
        let user_id = Uuid::new_v4().to_string();
        let created = self
            .store
            .create_unless_exists(
                CREDENTIALS,
                &Query::new().eq("email", email.as_str()),
                json!({
                    "userId": user_id,
                    "email": email,
                    "passwordHash": password_hash,
                    "createdAt": format_instant(Utc::now()),
                }),
            )
            .await
            .map_err(backend)?;
        if created.is_none() {
            return Err(IdentityError::EmailTaken);
        }

        self.players
            .register(&user_id, &email, display_name)
            .await
            .map_err(backend)?;

        tracing::info!(user_id = %user_id, "signed up");
        self.publish(AuthEvent::SignedUp {
            user_id: user_id.clone(),
        });
        Ok(user_id)
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        let claims =
            verify_token(token, &self.jwt.secret).map_err(|_| IdentityError::InvalidToken)?;
        let now = Utc::now().timestamp();

        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti, claims.exp);
        drop(revoked);

        tracing::info!(user_id = %claims.sub, "signed out");
        self.publish(AuthEvent::SignedOut {
            user_id: claims.sub,
        });
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Option<Identity> {
        let claims = verify_token(token, &self.jwt.secret).ok()?;
        if self.revoked.read().await.contains_key(&claims.jti) {
            return None;
        }
        Some(Identity {
            id: claims.sub,
            email: claims.email,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
