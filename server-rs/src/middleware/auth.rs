use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use match_engine::models::Role;
use match_engine::Actor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    /// Token id, used for sign-out revocation.
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct AuthPlayer {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

impl AuthPlayer {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
        }
    }
}

pub fn generate_token(
    user_id: &str,
    email: &str,
    secret: &str,
    expiry_secs: i64,
) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        jti: Uuid::new_v4().to_string(),
        exp: now + expiry_secs,
        iat: now,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

/// Middleware: requires a live session. Sets AuthPlayer in extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer(req.headers())
        .ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;

    let identity = state
        .identity
        .current_user(&token)
        .await
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    let profile = state
        .workflow
        .players
        .profile(&identity.id)
        .await
        .map_err(|_| AppError::Unauthorized("Unknown user".into()))?;

    req.extensions_mut().insert(AuthPlayer {
        id: identity.id,
        email: identity.email,
        display_name: profile.display_name,
        role: profile.role,
    });

    Ok(next.run(req).await)
}
