#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use match_engine::store::{Document, DocumentStore, Query, StoreError, StoreResult, USERS};
use match_engine::{Dispatcher, FixedClock, MemoryStore};
use serde_json::{json, Value};
use tower::ServiceExt;

use padel_mate_api::config::{Config, StoreBackend};
use padel_mate_api::{build_router, AppState};

/// Memory store whose queries can be made to fail per collection.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_queries: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn fail_queries(&self, collection: &str) {
        self.failing_queries
            .lock()
            .unwrap()
            .insert(collection.to_string());
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create(&self, collection: &str, body: Value) -> StoreResult<String> {
        self.inner.create(collection, body).await
    }

    async fn put(&self, collection: &str, id: &str, body: Value) -> StoreResult<()> {
        self.inner.put(collection, id, body).await
    }

    async fn create_unless_exists(
        &self,
        collection: &str,
        guard: &Query,
        body: Value,
    ) -> StoreResult<Option<String>> {
        self.inner.create_unless_exists(collection, guard, body).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        if self.failing_queries.lock().unwrap().contains(collection) {
            return Err(StoreError::Backend(format!("{collection} unavailable")));
        }
        self.inner.query(collection, query).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        self.inner.update(collection, id, patch).await
    }

    async fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> StoreResult<bool> {
        self.inner
            .update_if_version(collection, id, expected_version, patch)
            .await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dispatcher: Dispatcher,
    pub store: Arc<FlakyStore>,
    pub clock: FixedClock,
}

/// 2026-10-19 12:00 UTC.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub fn test_config() -> Config {
    let mut config = Config::from_env();
    config.cors_origins = vec!["*".into()];
    config.store.backend = StoreBackend::Memory;
    config.jwt.secret = "integration-test-secret".into();
    config.jwt.access_expiry_secs = 3600;
    config.jwt.bcrypt_cost = 4;
    config.rate_limit.max_requests = 10_000;
    config.rate_limit.write_max = 1_000;
    config.workflow.notify_backoff_ms = 1;
    config
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

pub fn spawn_app_with(config: Config) -> TestApp {
    let store = Arc::new(FlakyStore::default());
    let clock = FixedClock::new(start());
    let (state, dispatcher) =
        AppState::new(config, store.clone(), None, Arc::new(clock.clone()));
    TestApp {
        router: build_router(state.clone()),
        state,
        dispatcher,
        store,
        clock,
    }
}

impl TestApp {
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Signs up a player and returns `(token, user_id)`.
    pub async fn sign_up(&self, name: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/signup",
                None,
                Some(json!({
                    "email": format!("{}@example.com", name.to_lowercase()),
                    "password": "padel-pass",
                    "displayName": name,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Promotes a user to admin directly in the store.
    pub async fn promote(&self, user_id: &str) {
        self.store
            .update(USERS, user_id, json!({ "role": "admin" }))
            .await
            .unwrap();
    }

    /// Creates a match `hours_ahead` from the start instant and returns its id.
    pub async fn create_match(&self, token: &str, players_needed: u32, hours_ahead: i64) -> String {
        let at = start() + Duration::hours(hours_ahead);
        let (status, body) = self
            .post(
                "/api/v1/matches",
                token,
                json!({
                    "date": at.format("%Y-%m-%d").to_string(),
                    "time": at.format("%H:%M").to_string(),
                    "location": "Club Central",
                    "playersNeeded": players_needed,
                    "skillPreference": "intermediate",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["match"]["id"].as_str().unwrap().to_string()
    }
}
