use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;
use crate::middleware::auth::AuthPlayer;
use crate::AppState;

/// Expired windows are purged once the table grows past this many keys.
const EVICT_ABOVE: usize = 10_000;

/// Fixed-window counter per client key.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    max_requests: u32,
    window: Duration,
}

struct Window {
    count: u32,
    resets_at: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Counts one hit for `key`. On refusal returns the seconds until the window resets.
    pub async fn hit(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        if windows.len() > EVICT_ABOVE {
            windows.retain(|_, w| w.resets_at > now);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            resets_at: now + self.window,
        });
        if now >= window.resets_at {
            window.count = 0;
            window.resets_at = now + self.window;
        }

        window.count += 1;
        if window.count <= self.max_requests {
            Ok(())
        } else {
            let wait = window.resets_at.saturating_duration_since(now);
            Err(wait.as_secs().max(1))
        }
    }
}

/// Signed-in user first, then the socket address, then the first forwarded hop.
fn client_key(req: &Request) -> String {
    if let Some(player) = req.extensions().get::<AuthPlayer>() {
        return format!("user:{}", player.id);
    }
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| format!("ip:{}", ip.trim()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

async fn enforce(
    limiter: &RateLimiter,
    scope: &str,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("{scope}:{}", client_key(&req));
    if let Err(retry_after) = limiter.hit(&key).await {
        tracing::warn!(client = %key, retry_after, "rate limit hit");
        return Err(AppError::RateLimited { retry_after });
    }
    Ok(next.run(req).await)
}

/// Middleware: general limit on every request.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state.rate_limiter, "global", req, next).await
}

/// Middleware: stricter limit on sending invitations and join requests.
pub async fn write_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state.write_rate_limiter, "write", req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn window_refuses_past_max_then_resets() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.hit("user:a").await.is_ok());
        assert!(limiter.hit("user:a").await.is_ok());
        assert_eq!(limiter.hit("user:a").await, Err(60));
        assert!(limiter.hit("user:b").await.is_ok());

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(limiter.hit("user:a").await, Err(15));

        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(limiter.hit("user:a").await.is_ok());
    }

    #[test]
    fn forwarded_header_keys_anonymous_clients() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "ip:203.0.113.9");

        let bare = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "ip:unknown");
    }
}
