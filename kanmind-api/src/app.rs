/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use kanmind_api::{app::{build_router, AppState}, config::Config};
/// use kanmind_shared::store::memory::MemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use kanmind_shared::{
    auth::{jwt::TokenKeys, middleware::require_bearer, policy::AccessPolicy},
    store::EntityStore,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};

/// Shared application state
///
/// Cloned into every handler; all fields are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub config: Arc<Config>,
    pub tokens: Arc<TokenKeys>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, config: Config) -> Self {
        let tokens = Arc::new(TokenKeys::new(&config.jwt.secret));

        Self {
            store,
            config: Arc::new(config),
            tokens,
        }
    }

    /// Policy evaluator bound to this state's store
    pub fn policy(&self) -> AccessPolicy<'_> {
        AccessPolicy::new(self.store.as_ref())
    }
}

/// Builds the complete router
///
/// ```text
/// /health                                   public
/// /api/registration, /api/login             public
/// /api/token/refresh                        public
/// /api/profiles[/:user_id], /api/email-check
/// /api/boards[/:board_id]
/// /api/tasks[/assigned-to-me|/reviewing|/:task_id]
/// /api/tasks/:task_id/comments[/:comment_id]
/// ```
///
/// Everything under `/api` except the three public routes requires an access
/// token. Layers, outermost first: security headers, CORS, tracing.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/registration", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/token/refresh", post(routes::auth::refresh));

    let protected = Router::new()
        .route("/profiles", get(routes::profiles::list_profiles))
        .route("/profiles/:user_id", get(routes::profiles::get_profile))
        .route("/email-check", get(routes::profiles::email_check))
        .route(
            "/boards",
            get(routes::boards::list_boards).post(routes::boards::create_board),
        )
        .route(
            "/boards/:board_id",
            get(routes::boards::get_board)
                .patch(routes::boards::update_board)
                .delete(routes::boards::delete_board),
        )
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route("/tasks/assigned-to-me", get(routes::tasks::assigned_to_me))
        .route("/tasks/reviewing", get(routes::tasks::reviewing))
        .route(
            "/tasks/:task_id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/tasks/:task_id/comments",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route(
            "/tasks/:task_id/comments/:comment_id",
            delete(routes::comments::delete_comment),
        )
        .route_layer(from_fn_with_state(state.tokens.clone(), require_bearer));

    let cors = cors_layer(&state.config);
    let production = state.config.api.production;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", public.merge(protected))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
