use axum::{
    http::HeaderValue,
    middleware as axum_mw,
    routing::{delete, get, post},
    Router,
};
use match_engine::{Clock, Dispatcher, DocumentStore, IdentityProvider, Workflow};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;

use config::Config;
use identity::LocalIdentityProvider;
use middleware::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Workflow,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<Config>,
    pub rate_limiter: RateLimiter,
    pub write_rate_limiter: RateLimiter,
    /// Set when the store is PostgreSQL; used by the health check.
    pub db: Option<sqlx::PgPool>,
}

impl AppState {
    /// The dispatcher must be driven for notifications to reach the store.
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        db: Option<sqlx::PgPool>,
        clock: Arc<dyn Clock>,
    ) -> (Self, Dispatcher) {
        let (workflow, dispatcher) =
            Workflow::new(store.clone(), clock, config.workflow_settings());
        let identity = LocalIdentityProvider::new(
            store.clone(),
            workflow.players.clone(),
            config.jwt.clone(),
        );
        let rate_limiter =
            RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs);
        let write_rate_limiter =
            RateLimiter::new(config.rate_limit.write_max, config.rate_limit.window_secs);

        let state = Self {
            workflow,
            identity: Arc::new(identity),
            config: Arc::new(config),
            rate_limiter,
            write_rate_limiter,
            db,
        };
        (state, dispatcher)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect::<Vec<_>>(),
        )
    };
    CorsLayer::new()
        .allow_origin(allow)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    // --- Auth routes (no auth required, except signout/me) ---
    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::sign_up))
        .route("/signin", post(routes::auth::sign_in))
        .route("/signout", post(routes::auth::sign_out))
        .route(
            "/me",
            get(routes::auth::me).layer(axum_mw::from_fn_with_state(
                state.clone(),
                middleware::auth::authenticate,
            )),
        );

    // --- Authenticated routes ---
    let player_routes = Router::new()
        .route("/", get(routes::players::discover))
        .route(
            "/me",
            get(routes::players::get_me).put(routes::players::update_me),
        )
        .route("/:id", get(routes::players::get_player))
        .route("/:id/ratings", get(routes::ratings::player_ratings))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let write_limit = axum_mw::from_fn_with_state(
        state.clone(),
        middleware::rate_limit::write_rate_limit,
    );

    let match_routes = Router::new()
        .route(
            "/",
            get(routes::matches::list_matches).post(routes::matches::create_match),
        )
        .route("/mine", get(routes::matches::my_matches))
        .route("/invitable", get(routes::matches::invitable_matches))
        .route("/:id", get(routes::matches::get_match))
        .route("/:id/join", post(routes::matches::join_match))
        .route("/:id/leave", post(routes::matches::leave_match))
        .route(
            "/:id/invitations",
            post(routes::invitations::send_invitation).layer(write_limit.clone()),
        )
        .route(
            "/:id/requests",
            post(routes::requests::send_request)
                .layer(write_limit)
                .delete(routes::requests::cancel_request),
        )
        .route("/:id/ratings", post(routes::ratings::submit_rating))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let invitation_routes = Router::new()
        .route("/", get(routes::invitations::my_invitations))
        .route("/:id/accept", post(routes::invitations::accept_invitation))
        .route("/:id/decline", post(routes::invitations::decline_invitation))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let request_routes = Router::new()
        .route("/incoming", get(routes::requests::incoming_requests))
        .route("/outgoing", get(routes::requests::outgoing_requests))
        .route("/:id/accept", post(routes::requests::accept_request))
        .route("/:id/reject", post(routes::requests::reject_request))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let notification_routes = Router::new()
        .route("/", get(routes::notifications::list_notifications))
        .route("/read-all", post(routes::notifications::mark_all_read))
        .route("/:id/read", post(routes::notifications::mark_read))
        .route("/:id", delete(routes::notifications::delete_notification))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/users/:id/role", post(routes::admin::set_role))
        .route("/matches", get(routes::admin::list_matches))
        .route("/matches/:id", delete(routes::admin::delete_match))
        .layer(axum_mw::from_fn(middleware::admin::require_admin))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    // --- Compose full API ---
    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/players", player_routes)
        .nest("/matches", match_routes)
        .nest("/invitations", invitation_routes)
        .nest("/requests", request_routes)
        .nest("/notifications", notification_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(routes::health::health))
        // Global middleware
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
